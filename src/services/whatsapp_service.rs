// src/services/whatsapp_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        db_utils::found,
        error::AppError,
        phone::{normalize_uae_phone, strip_whatsapp_prefix},
    },
    db::{whatsapp_repo::MessageLinks, Repositories},
    models::{activity::EntityRef, auth::User, whatsapp::WhatsappMessage},
    services::{lead_service::ensure_selected, notification_service::NotificationService},
};

/// Mensagem recebida, já extraída do formulário do Twilio.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message_sid: String,
    pub from: String,
    pub body: Option<String>,
    pub media_urls: Vec<String>,
}

/// `whatsapp:+971...` → `+971...`; números fora do padrão ficam como vieram.
pub fn inbound_number(from: &str) -> (String, bool) {
    let bare = strip_whatsapp_prefix(from);
    match normalize_uae_phone(bare) {
        Some(number) => (number, true),
        None => (bare.to_string(), false),
    }
}

fn preview(message: &InboundMessage) -> String {
    match message.body.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        Some(body) if body.chars().count() > 80 => format!("{}…", body.chars().take(80).collect::<String>()),
        Some(body) => body.to_string(),
        None => format!("{} attachment(s)", message.media_urls.len()),
    }
}

#[derive(Clone)]
pub struct WhatsappService {
    pool: PgPool,
    repos: Repositories,
    notifier: NotificationService,
}

impl WhatsappService {
    pub fn new(pool: PgPool, repos: Repositories, notifier: NotificationService) -> Self {
        Self { pool, repos, notifier }
    }

    /// Grava a mensagem e a vincula a cliente/phonebook/lead aberto pelo telefone.
    /// `None` quando o MessageSid já tinha sido recebido.
    pub async fn receive(&self, message: InboundMessage) -> Result<Option<WhatsappMessage>, AppError> {
        let (number, recognised) = inbound_number(&message.from);

        let mut tx = self.pool.begin().await?;
        let mut links = MessageLinks::default();
        let mut open_lead = None;

        if recognised {
            if let Some(client) = self.repos.clients.find_by_any_phone(&mut *tx, &number).await? {
                links.client_id = Some(client.id);
                open_lead = self.repos.leads.find_open_by_client(&mut *tx, client.id).await?;
                links.lead_id = open_lead.as_ref().map(|l| l.id);
            }
            links.phonebook_id = self.repos.phonebook.find_by_number(&mut *tx, &number).await?.map(|e| e.id);
        }

        let Some(stored) = self
            .repos
            .whatsapp
            .insert(
                &mut *tx,
                &message.message_sid,
                &number,
                message.body.as_deref(),
                &message.media_urls,
                links,
            )
            .await?
        else {
            tracing::debug!("Mensagem {} já recebida, ignorando", message.message_sid);
            return Ok(None);
        };

        let mut notifications = Vec::new();
        if let Some(lead) = open_lead {
            let remark = format!("WhatsApp from {}: {}", number, preview(&message));
            // Sem autor humano: o histórico fica em nome do criador do lead
            self.repos
                .activity
                .insert_log(&mut *tx, EntityRef::lead(lead.id), lead.created_by, "WhatsApp Message", &remark)
                .await?;
            let receivers: Vec<Uuid> = lead.selected_users.clone();
            notifications = self
                .repos
                .activity
                .insert_notifications(&mut *tx, &receivers, lead.created_by, &remark, EntityRef::lead(lead.id))
                .await?;
        }

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;

        if links.client_id.is_none() && links.phonebook_id.is_none() {
            tracing::info!("📥 WhatsApp de número desconhecido {}", number);
        }
        Ok(Some(stored))
    }

    /// Conversa do lead, só para quem está nos selected_users.
    pub async fn list_for_lead(&self, actor: &User, lead_id: Uuid) -> Result<Vec<WhatsappMessage>, AppError> {
        let lead = found(self.repos.leads.find(&self.pool, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;
        self.repos.whatsapp.list_for_lead(lead.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(body: Option<&str>, media: usize) -> InboundMessage {
        InboundMessage {
            message_sid: "SM1".into(),
            from: "whatsapp:+971501234567".into(),
            body: body.map(str::to_string),
            media_urls: (0..media).map(|i| format!("https://media/{}", i)).collect(),
        }
    }

    #[test]
    fn strips_prefix_and_normalizes() {
        assert_eq!(inbound_number("whatsapp:+971501234567"), ("+971501234567".to_string(), true));
        assert_eq!(inbound_number("whatsapp:0501234567"), ("+971501234567".to_string(), true));
    }

    #[test]
    fn foreign_numbers_are_kept_raw() {
        assert_eq!(inbound_number("whatsapp:+4915112345678"), ("+4915112345678".to_string(), false));
    }

    #[test]
    fn preview_falls_back_to_attachments() {
        assert_eq!(preview(&message(Some(" hello "), 0)), "hello");
        assert_eq!(preview(&message(None, 2)), "2 attachment(s)");
        assert_eq!(preview(&message(Some("   "), 1)), "1 attachment(s)");
    }

    #[test]
    fn long_bodies_are_cut() {
        let body = "a".repeat(120);
        let p = preview(&message(Some(&body), 0));
        assert_eq!(p.chars().count(), 81);
        assert!(p.ends_with('…'));
    }
}
