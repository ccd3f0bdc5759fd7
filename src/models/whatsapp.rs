// src/models/whatsapp.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

// Mensagem recebida pelo webhook do WhatsApp (Twilio)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WhatsappMessage {
    pub id: Uuid,
    #[schema(example = "SM0123456789abcdef")]
    pub message_sid: String,
    pub from_number: String,
    pub body: Option<String>,
    pub media_urls: Vec<String>,
    // Vínculos resolvidos pelo telefone (podem não existir)
    pub client_id: Option<Uuid>,
    pub phonebook_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
