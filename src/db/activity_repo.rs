// src/db/activity_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::activity::{ActivityLog, EntityRef, Notification},
};

const NOTIFICATION_COLUMNS: &str = r#"
    id, receiver_id, sender_id, message, reference_kind, reference_id, is_read, created_at
"#;

// Trilha de auditoria e notificações (sempre gravadas na transação da transição)
#[derive(Clone)]
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  ACTIVITY LOG
    // =========================================================================

    pub async fn insert_log<'e, E>(
        &self,
        executor: E,
        entity: EntityRef,
        user_id: Uuid,
        log_type: &str,
        remark: &str,
    ) -> Result<ActivityLog, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let log = sqlx::query_as::<_, ActivityLog>(
            r#"
            INSERT INTO activity_logs (entity_kind, entity_id, user_id, log_type, remark)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, entity_kind, entity_id, user_id, log_type, remark, created_at
            "#,
        )
            .bind(entity.kind)
            .bind(entity.id)
            .bind(user_id)
            .bind(log_type)
            .bind(remark)
            .fetch_one(executor)
            .await?;
        Ok(log)
    }

    pub async fn list_logs(&self, entity: EntityRef) -> Result<Vec<ActivityLog>, AppError> {
        let logs = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, entity_kind, entity_id, user_id, log_type, remark, created_at
            FROM activity_logs
            WHERE entity_kind = $1 AND entity_id = $2
            ORDER BY created_at ASC
            "#,
        )
            .bind(entity.kind)
            .bind(entity.id)
            .fetch_all(&self.pool)
            .await?;
        Ok(logs)
    }

    // =========================================================================
    //  NOTIFICAÇÕES
    // =========================================================================

    /// Uma linha por destinatário, num único INSERT.
    pub async fn insert_notifications<'e, E>(
        &self,
        executor: E,
        receivers: &[Uuid],
        sender_id: Uuid,
        message: &str,
        reference: EntityRef,
    ) -> Result<Vec<Notification>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if receivers.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (receiver_id, sender_id, message, reference_kind, reference_id)
            SELECT r, $2, $3, $4, $5 FROM UNNEST($1::uuid[]) AS r
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
            .bind(receivers)
            .bind(sender_id)
            .bind(message)
            .bind(reference.kind)
            .bind(reference.id)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    pub async fn list_for_receiver(&self, receiver_id: Uuid) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {} FROM notifications WHERE receiver_id = $1 ORDER BY created_at DESC",
            NOTIFICATION_COLUMNS
        ))
            .bind(receiver_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn mark_read(&self, id: Uuid, receiver_id: Uuid) -> Result<Option<Notification>, AppError> {
        let row = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications SET is_read = true
            WHERE id = $1 AND receiver_id = $2
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
            .bind(id)
            .bind(receiver_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn mark_all_read(&self, receiver_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true WHERE receiver_id = $1 AND is_read = false",
        )
            .bind(receiver_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
