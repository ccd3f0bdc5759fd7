// src/db/deal_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::{contract::Contract, deal::Deal},
};

const DEAL_COLUMNS: &str = r#"
    id, client_id, lead_id, contract_id, created_by, product_id, pipeline_id, branch_id,
    lead_type_id, source_id, deal_stage_id, selected_users, service_commission_id,
    is_reject, reject_reason, is_report_generated, is_report_generated_approved,
    created_at, updated_at
"#;

#[derive(Clone)]
pub struct DealRepository {
    pool: PgPool,
}

impl DealRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Deal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let deal = sqlx::query_as::<_, Deal>(&format!(
            "SELECT {} FROM deals WHERE id = $1",
            DEAL_COLUMNS
        ))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(deal)
    }

    pub async fn find_for_update<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Deal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let deal = sqlx::query_as::<_, Deal>(&format!(
            "SELECT {} FROM deals WHERE id = $1 FOR UPDATE",
            DEAL_COLUMNS
        ))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(deal)
    }

    pub async fn find_by_contract<'e, E>(
        &self,
        executor: E,
        contract_id: Uuid,
    ) -> Result<Option<Deal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let deal = sqlx::query_as::<_, Deal>(&format!(
            "SELECT {} FROM deals WHERE contract_id = $1",
            DEAL_COLUMNS
        ))
            .bind(contract_id)
            .fetch_optional(executor)
            .await?;
        Ok(deal)
    }

    pub async fn list_visible(&self, viewer_id: Uuid) -> Result<Vec<Deal>, AppError> {
        let deals = sqlx::query_as::<_, Deal>(&format!(
            "SELECT {} FROM deals WHERE $1 = ANY(selected_users) ORDER BY created_at DESC",
            DEAL_COLUMNS
        ))
            .bind(viewer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(deals)
    }

    /// O deal herda tudo do contrato, inclusive a mesma ServiceCommission.
    pub async fn create_from_contract<'e, E>(
        &self,
        executor: E,
        contract: &Contract,
        created_by: Uuid,
        deal_stage_id: Uuid,
    ) -> Result<Deal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let deal = sqlx::query_as::<_, Deal>(&format!(
            r#"
            INSERT INTO deals (
                client_id, lead_id, contract_id, created_by, product_id, pipeline_id, branch_id,
                lead_type_id, source_id, deal_stage_id, selected_users, service_commission_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            DEAL_COLUMNS
        ))
            .bind(contract.client_id)
            .bind(contract.lead_id)
            .bind(contract.id)
            .bind(created_by)
            .bind(contract.product_id)
            .bind(contract.pipeline_id)
            .bind(contract.branch_id)
            .bind(contract.lead_type_id)
            .bind(contract.source_id)
            .bind(deal_stage_id)
            .bind(&contract.selected_users)
            .bind(contract.service_commission_id)
            .fetch_one(executor)
            .await
            // Conversões concorrentes: a segunda esbarra no UNIQUE
            .map_err(|e| map_unique_violation(e, "deal already exists for this contract"))?;
        Ok(deal)
    }

    pub async fn set_stage<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        deal_stage_id: Uuid,
    ) -> Result<Deal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let deal = sqlx::query_as::<_, Deal>(&format!(
            r#"
            UPDATE deals SET deal_stage_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            DEAL_COLUMNS
        ))
            .bind(id)
            .bind(deal_stage_id)
            .fetch_one(executor)
            .await?;
        Ok(deal)
    }

    /// `reason = None` restaura; `Some` rejeita.
    pub async fn set_rejection<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<Deal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let deal = sqlx::query_as::<_, Deal>(&format!(
            r#"
            UPDATE deals
            SET is_reject = $2, reject_reason = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            DEAL_COLUMNS
        ))
            .bind(id)
            .bind(reason.is_some())
            .bind(reason)
            .fetch_one(executor)
            .await?;
        Ok(deal)
    }

    pub async fn set_report_flags<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        generated: bool,
        approved: bool,
    ) -> Result<Deal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let deal = sqlx::query_as::<_, Deal>(&format!(
            r#"
            UPDATE deals
            SET is_report_generated = $2, is_report_generated_approved = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            DEAL_COLUMNS
        ))
            .bind(id)
            .bind(generated)
            .bind(approved)
            .fetch_one(executor)
            .await?;
        Ok(deal)
    }

    pub async fn set_selected_users<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        selected_users: &[Uuid],
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE deals SET selected_users = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(selected_users)
            .execute(executor)
            .await?;
        Ok(())
    }
}
