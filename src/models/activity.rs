// src/models/activity.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

// Tipo de registro referenciado por logs e notificações
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "entity_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Lead,
    Contract,
    Deal,
}

/// Referência tipada para um Lead, Contrato ou Deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    pub fn lead(id: Uuid) -> Self {
        Self { kind: EntityKind::Lead, id }
    }

    pub fn contract(id: Uuid) -> Self {
        Self { kind: EntityKind::Contract, id }
    }

    pub fn deal(id: Uuid) -> Self {
        Self { kind: EntityKind::Deal, id }
    }
}

// Trilha de auditoria: só cresce, nunca é alterada
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Uuid,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "Lead Created")]
    pub log_type: String,
    pub remark: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub receiver_id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
    pub reference_kind: EntityKind,
    pub reference_id: Uuid,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
