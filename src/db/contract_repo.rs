// src/db/contract_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::{contract::Contract, lead::Lead},
};

const CONTRACT_COLUMNS: &str = r#"
    id, client_id, lead_id, created_by, product_id, pipeline_id, branch_id,
    lead_type_id, source_id, contract_stage_id, selected_users, service_commission_id,
    is_converted, is_reject, reject_reason, created_at, updated_at
"#;

#[derive(Clone)]
pub struct ContractRepository {
    pool: PgPool,
}

impl ContractRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Contract>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contract = sqlx::query_as::<_, Contract>(&format!(
            "SELECT {} FROM contracts WHERE id = $1",
            CONTRACT_COLUMNS
        ))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(contract)
    }

    pub async fn find_for_update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<Contract>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contract = sqlx::query_as::<_, Contract>(&format!(
            "SELECT {} FROM contracts WHERE id = $1 FOR UPDATE",
            CONTRACT_COLUMNS
        ))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(contract)
    }

    pub async fn find_by_lead<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
    ) -> Result<Option<Contract>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contract = sqlx::query_as::<_, Contract>(&format!(
            "SELECT {} FROM contracts WHERE lead_id = $1",
            CONTRACT_COLUMNS
        ))
            .bind(lead_id)
            .fetch_optional(executor)
            .await?;
        Ok(contract)
    }

    pub async fn list_visible(&self, viewer_id: Uuid) -> Result<Vec<Contract>, AppError> {
        let contracts = sqlx::query_as::<_, Contract>(&format!(
            "SELECT {} FROM contracts WHERE $1 = ANY(selected_users) ORDER BY created_at DESC",
            CONTRACT_COLUMNS
        ))
            .bind(viewer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(contracts)
    }

    /// Cria o contrato copiando o roteamento do lead.
    pub async fn create_from_lead<'e, E>(
        &self,
        executor: E,
        lead: &Lead,
        created_by: Uuid,
        contract_stage_id: Uuid,
        selected_users: &[Uuid],
        service_commission_id: Uuid,
    ) -> Result<Contract, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contract = sqlx::query_as::<_, Contract>(&format!(
            r#"
            INSERT INTO contracts (
                client_id, lead_id, created_by, product_id, pipeline_id, branch_id,
                lead_type_id, source_id, contract_stage_id, selected_users, service_commission_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            CONTRACT_COLUMNS
        ))
            .bind(lead.client_id)
            .bind(lead.id)
            .bind(created_by)
            .bind(lead.product_id)
            .bind(lead.pipeline_id)
            .bind(lead.branch_id)
            .bind(lead.lead_type_id)
            .bind(lead.source_id)
            .bind(contract_stage_id)
            .bind(selected_users)
            .bind(service_commission_id)
            .fetch_one(executor)
            .await
            // Conversões concorrentes: a segunda esbarra no UNIQUE
            .map_err(|e| map_unique_violation(e, "contract already exists for this lead"))?;
        Ok(contract)
    }

    pub async fn set_stage<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        contract_stage_id: Uuid,
    ) -> Result<Contract, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contract = sqlx::query_as::<_, Contract>(&format!(
            r#"
            UPDATE contracts SET contract_stage_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CONTRACT_COLUMNS
        ))
            .bind(id)
            .bind(contract_stage_id)
            .fetch_one(executor)
            .await?;
        Ok(contract)
    }

    /// `reason = None` restaura; `Some` rejeita.
    pub async fn set_rejection<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<Contract, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contract = sqlx::query_as::<_, Contract>(&format!(
            r#"
            UPDATE contracts
            SET is_reject = $2, reject_reason = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CONTRACT_COLUMNS
        ))
            .bind(id)
            .bind(reason.is_some())
            .bind(reason)
            .fetch_one(executor)
            .await?;
        Ok(contract)
    }

    pub async fn mark_converted<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE contracts SET is_converted = true, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
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
        sqlx::query("UPDATE contracts SET selected_users = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(selected_users)
            .execute(executor)
            .await?;
        Ok(())
    }
}
