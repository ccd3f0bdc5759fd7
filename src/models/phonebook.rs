// src/models/phonebook.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

use crate::models::client::BlockStatus;

// Mapeia o CREATE TYPE call_status do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "call_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    #[serde(rename = "Req to call")]
    ReqToCall,
    #[serde(rename = "Convert to Lead")]
    ConvertToLead,
    #[serde(rename = "No Answer")]
    NoAnswer,
    #[serde(rename = "Not Interested")]
    NotInterested,
    #[serde(rename = "Follow Up")]
    FollowUp,
    #[serde(rename = "Offline")]
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhonebookEntry {
    pub id: Uuid,
    #[schema(example = "+971501234567")]
    pub number: String,
    // Quem vai ligar
    pub user_id: Uuid,
    pub pipeline_id: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub status: BlockStatus,
    pub calstatus: CallStatus,
    // Quem pode ver / gerenciar o número
    pub visibility: Vec<Uuid>,
    pub lead_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhonebookComment {
    pub id: Uuid,
    pub phonebook_id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "Pediu retorno na segunda")]
    pub remarks: String,
    pub created_at: DateTime<Utc>,
}

// Resultado do upload em massa
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub inserted_numbers: Vec<String>,
    // Já existiam no phonebook
    pub skipped_numbers: Vec<String>,
    // Já são clientes
    pub existing_client_numbers: Vec<String>,
    pub incorrect_numbers: Vec<String>,
    // Cortados pela cota de "Req to call"
    pub truncated_numbers: Vec<String>,
    pub remaining_slots: i64,
}

// Resultado das atualizações de status via planilha (blocklist e DNCR)
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateReport {
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub not_found: Vec<String>,
    pub invalid: Vec<String>,
}
