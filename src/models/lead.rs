// src/models/lead.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;
use utoipa::ToSchema;

use crate::models::{activity::ActivityLog, client::Client};

/// Fotografia do roteamento antes de uma transferência.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferSnapshot {
    pub pipeline_id: Uuid,
    pub branch_id: Uuid,
    pub product_stage_id: Uuid,
    pub product_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub client_id: Uuid,
    pub created_by: Uuid,
    // Criador original, preservado quando o lead é transferido
    pub ref_created_by: Option<Uuid>,

    // Conjunto de usuários com acesso (fan-out)
    pub selected_users: Vec<Uuid>,

    // Roteamento
    pub pipeline_id: Uuid,
    pub branch_id: Uuid,
    pub product_stage_id: Uuid,
    pub lead_type_id: Uuid,
    pub source_id: Uuid,
    pub product_id: Uuid,

    #[schema(example = "ACME Trading LLC")]
    pub company_name: Option<String>,
    pub description: Option<String>,

    // Estado
    pub is_active: bool,
    pub is_converted: bool,
    pub is_reject: bool,
    pub is_transfer: bool,
    pub is_move: bool,
    pub reject_reason: Option<String>,
    pub rejected_by: Option<Uuid>,

    #[schema(value_type = Option<TransferSnapshot>)]
    pub transfer_from: Option<Json<TransferSnapshot>>,

    #[schema(example = json!(["hot", "vip"]))]
    pub labels: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn routing(&self) -> TransferSnapshot {
        TransferSnapshot {
            pipeline_id: self.pipeline_id,
            branch_id: self.branch_id,
            product_stage_id: self.product_stage_id,
            product_id: self.product_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadDiscussion {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub author_id: Uuid,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadFile {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub uploaded_by: Uuid,
    #[schema(example = "passport.pdf")]
    pub file_name: String,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}

// Lead completo (cabeçalho + cliente + discussões + arquivos + histórico)
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetail {
    #[serde(flatten)]
    pub lead: Lead,
    pub client: Client,
    pub discussions: Vec<LeadDiscussion>,
    pub files: Vec<LeadFile>,
    pub activity_logs: Vec<ActivityLog>,
}
