// src/models/contract.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

use crate::models::{activity::ActivityLog, commission::CommissionSheet};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,
    pub client_id: Uuid,
    pub lead_id: Uuid,
    pub created_by: Uuid,
    pub product_id: Uuid,
    pub pipeline_id: Uuid,
    pub branch_id: Uuid,
    pub lead_type_id: Uuid,
    pub source_id: Uuid,
    pub contract_stage_id: Uuid,
    // selected_users do lead + todos os contadores
    pub selected_users: Vec<Uuid>,
    pub service_commission_id: Uuid,
    pub is_converted: bool,
    pub is_reject: bool,
    pub reject_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetail {
    #[serde(flatten)]
    pub contract: Contract,
    pub commission: CommissionSheet,
    pub activity_logs: Vec<ActivityLog>,
}
