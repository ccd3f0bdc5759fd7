// src/models/deal.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

use crate::models::{
    activity::ActivityLog,
    commission::{CommissionPayment, CommissionSheet},
};

/// Nome da etapa terminal do deal.
pub const COLLECTED_STAGE: &str = "Collected";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: Uuid,
    pub client_id: Uuid,
    pub lead_id: Uuid,
    pub contract_id: Uuid,
    pub created_by: Uuid,
    pub product_id: Uuid,
    pub pipeline_id: Uuid,
    pub branch_id: Uuid,
    pub lead_type_id: Uuid,
    pub source_id: Uuid,
    pub deal_stage_id: Uuid,
    pub selected_users: Vec<Uuid>,
    pub service_commission_id: Uuid,
    pub is_reject: bool,
    pub reject_reason: Option<String>,
    pub is_report_generated: bool,
    pub is_report_generated_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Deal + comissão + pagamentos + histórico
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DealDetail {
    #[serde(flatten)]
    pub deal: Deal,
    pub commission: CommissionSheet,
    pub payments: Vec<CommissionPayment>,
    pub activity_logs: Vec<ActivityLog>,
}
