// src/db/whatsapp_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::whatsapp::WhatsappMessage};

const MESSAGE_COLUMNS: &str = r#"
    id, message_sid, from_number, body, media_urls, client_id, phonebook_id, lead_id, created_at
"#;

/// Vínculos resolvidos para uma mensagem recebida.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageLinks {
    pub client_id: Option<Uuid>,
    pub phonebook_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct WhatsappRepository {
    pool: PgPool,
}

impl WhatsappRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Grava a mensagem. `None` quando o MessageSid já foi recebido (reentrega do Twilio).
    pub async fn insert<'e, E>(
        &self,
        executor: E,
        message_sid: &str,
        from_number: &str,
        body: Option<&str>,
        media_urls: &[String],
        links: MessageLinks,
    ) -> Result<Option<WhatsappMessage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, WhatsappMessage>(&format!(
            r#"
            INSERT INTO whatsapp_messages
                (message_sid, from_number, body, media_urls, client_id, phonebook_id, lead_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (message_sid) DO NOTHING
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
            .bind(message_sid)
            .bind(from_number)
            .bind(body)
            .bind(media_urls)
            .bind(links.client_id)
            .bind(links.phonebook_id)
            .bind(links.lead_id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn list_for_lead(&self, lead_id: Uuid) -> Result<Vec<WhatsappMessage>, AppError> {
        let rows = sqlx::query_as::<_, WhatsappMessage>(&format!(
            "SELECT {} FROM whatsapp_messages WHERE lead_id = $1 ORDER BY created_at ASC",
            MESSAGE_COLUMNS
        ))
            .bind(lead_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
