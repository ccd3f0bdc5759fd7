// src/services/journal.rs

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ActivityRepository,
    models::{
        activity::{EntityRef, Notification},
        auth::User,
    },
    services::stakeholders::{notification_recipients, Audience},
};

/// Uma entrada de histórico + as notificações correspondentes, na mesma transação.
pub struct JournalEntry<'a> {
    pub target: EntityRef,
    pub log_type: &'a str,
    pub remark: &'a str,
    /// Selecionados do registro; o público filtra dentro deles.
    pub selected: &'a [Uuid],
    pub audience: Audience<'a>,
}

/// Grava o log e as notificações. O push fica para depois do commit.
pub async fn record(
    activity: &ActivityRepository,
    conn: &mut PgConnection,
    actor: &User,
    users: &[User],
    entry: JournalEntry<'_>,
) -> Result<Vec<Notification>, AppError> {
    activity
        .insert_log(&mut *conn, entry.target, actor.id, entry.log_type, entry.remark)
        .await?;

    let recipients = notification_recipients(entry.selected, users, actor.id, entry.audience);
    activity
        .insert_notifications(&mut *conn, &recipients, actor.id, entry.remark, entry.target)
        .await
}
