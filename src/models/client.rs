// src/models/client.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

// Status de bloqueio (DNCR no cliente, blocklist no phonebook)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "block_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockStatus {
    #[serde(rename = "Waiting")]
    Waiting,
    #[serde(rename = "BLOCKED")]
    Blocked,
    #[serde(rename = "UNBLOCKED")]
    Unblocked,
}

impl BlockStatus {
    /// Aceita os valores da planilha sem diferenciar maiúsculas.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "WAITING" => Some(BlockStatus::Waiting),
            "BLOCKED" => Some(BlockStatus::Blocked),
            "UNBLOCKED" => Some(BlockStatus::Unblocked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    #[schema(example = "+971501234567")]
    pub phone: String,
    pub w_phone: Option<String>,
    // Emirates ID
    #[schema(example = "784-1990-1234567-1")]
    pub e_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub dncr_status: BlockStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_case_insensitively() {
        assert_eq!(BlockStatus::parse("blocked"), Some(BlockStatus::Blocked));
        assert_eq!(BlockStatus::parse(" UNBLOCKED "), Some(BlockStatus::Unblocked));
        assert_eq!(BlockStatus::parse("Waiting"), Some(BlockStatus::Waiting));
        assert_eq!(BlockStatus::parse("maybe"), None);
    }
}
