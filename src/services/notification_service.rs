// src/services/notification_service.rs

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ActivityRepository,
    models::activity::Notification,
};

/// Sala de push de um usuário.
pub fn user_room(user_id: Uuid) -> String {
    format!("user_{}", user_id)
}

/// Entrega em tempo real. Falhas aqui nunca desfazem a transição já gravada.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn push(&self, room: &str, notification: &Notification) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct PushEnvelope {
    pub room: String,
    pub notification: Notification,
}

/// Hub em memória: um canal broadcast, cada assinante filtra a própria sala.
#[derive(Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<PushEnvelope>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEnvelope> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl PushGateway for BroadcastHub {
    async fn push(&self, room: &str, notification: &Notification) -> Result<(), AppError> {
        let envelope = PushEnvelope {
            room: room.to_string(),
            notification: notification.clone(),
        };

        // Sem assinantes conectados não é erro: a notificação já está no banco.
        if self.sender.send(envelope).is_err() {
            tracing::debug!("Nenhum assinante conectado para a sala {}", room);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationService {
    repo: ActivityRepository,
    gateway: Arc<dyn PushGateway>,
}

impl NotificationService {
    pub fn new(repo: ActivityRepository, gateway: Arc<dyn PushGateway>) -> Self {
        Self { repo, gateway }
    }

    /// Empurra as notificações já commitadas, uma sala por destinatário.
    pub async fn deliver(&self, notifications: &[Notification]) {
        for notification in notifications {
            let room = user_room(notification.receiver_id);
            if let Err(e) = self.gateway.push(&room, notification).await {
                tracing::warn!(
                    "⚠️ Falha no push da notificação {} para {}: {}",
                    notification.id,
                    room,
                    e
                );
            }
        }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>, AppError> {
        self.repo.list_for_receiver(user_id).await
    }

    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Notification, AppError> {
        self.repo
            .mark_read(id, user_id)
            .await?
            .ok_or(AppError::NotFound("Notification"))
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.repo.mark_all_read(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::EntityKind;
    use chrono::Utc;

    fn notification(receiver_id: Uuid) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            receiver_id,
            sender_id: Uuid::new_v4(),
            message: "Lead rejected".into(),
            reference_kind: EntityKind::Lead,
            reference_id: Uuid::new_v4(),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rooms_are_prefixed_with_user() {
        let id = Uuid::nil();
        assert_eq!(user_room(id), format!("user_{}", id));
    }

    #[tokio::test]
    async fn hub_delivers_to_subscribers() {
        let hub = BroadcastHub::new(16);
        let mut rx = hub.subscribe();
        let receiver = Uuid::new_v4();
        let n = notification(receiver);

        hub.push(&user_room(receiver), &n).await.unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.room, user_room(receiver));
        assert_eq!(envelope.notification.id, n.id);
    }

    struct FailingGateway;

    #[async_trait]
    impl PushGateway for FailingGateway {
        async fn push(&self, _room: &str, _notification: &Notification) -> Result<(), AppError> {
            Err(AppError::InternalServerError(anyhow::anyhow!("socket closed")))
        }
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/crm_test")
            .unwrap();
        let service = NotificationService::new(ActivityRepository::new(pool), Arc::new(FailingGateway));

        // Não pode entrar em pânico nem propagar o erro.
        service.deliver(&[notification(Uuid::new_v4())]).await;
    }

    #[tokio::test]
    async fn pushing_without_subscribers_is_not_an_error() {
        let hub = BroadcastHub::new(4);
        assert!(hub.push("user_x", &notification(Uuid::new_v4())).await.is_ok());
    }
}
