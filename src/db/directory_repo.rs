// src/db/directory_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::directory::{
        Branch, ContractStage, DealStage, LeadType, Pipeline, Product, ProductStage, Source,
    },
};

#[derive(Clone)]
pub struct DirectoryRepository {
    pool: PgPool,
}

impl DirectoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  LISTAGENS (telas de cadastro / selects do frontend)
    // =========================================================================

    pub async fn list_branches(&self) -> Result<Vec<Branch>, AppError> {
        let rows = sqlx::query_as::<_, Branch>("SELECT id, name, created_at FROM branches ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_pipelines(&self) -> Result<Vec<Pipeline>, AppError> {
        let rows = sqlx::query_as::<_, Pipeline>("SELECT id, name, created_at FROM pipelines ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let rows = sqlx::query_as::<_, Product>(
            "SELECT id, name, pipeline_id, created_at FROM products ORDER BY name",
        )
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_product_stages(&self, product_id: Uuid) -> Result<Vec<ProductStage>, AppError> {
        let rows = sqlx::query_as::<_, ProductStage>(
            r#"
            SELECT id, product_id, name, stage_order
            FROM product_stages
            WHERE product_id = $1
            ORDER BY stage_order ASC
            "#,
        )
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_lead_types(&self) -> Result<Vec<LeadType>, AppError> {
        let rows = sqlx::query_as::<_, LeadType>("SELECT id, name FROM lead_types ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>, AppError> {
        let rows = sqlx::query_as::<_, Source>("SELECT id, name, lead_type_id FROM sources ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_deal_stages(&self) -> Result<Vec<DealStage>, AppError> {
        let rows = sqlx::query_as::<_, DealStage>(
            "SELECT id, name, stage_order FROM deal_stages ORDER BY stage_order",
        )
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_contract_stages(&self) -> Result<Vec<ContractStage>, AppError> {
        let rows = sqlx::query_as::<_, ContractStage>(
            "SELECT id, name, stage_order FROM contract_stages ORDER BY stage_order",
        )
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // =========================================================================
    //  BUSCAS PONTUAIS (validação de referências dentro das transações)
    // =========================================================================

    pub async fn find_branch<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Branch>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, Branch>("SELECT id, name, created_at FROM branches WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_pipeline<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Pipeline>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, Pipeline>("SELECT id, name, created_at FROM pipelines WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_product<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, Product>(
            "SELECT id, name, pipeline_id, created_at FROM products WHERE id = $1",
        )
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_product_stage<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<ProductStage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ProductStage>(
            "SELECT id, product_id, name, stage_order FROM product_stages WHERE id = $1",
        )
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Etapa do produto pela ordem (0 = entrada do "move", 1 = entrada da "transfer").
    pub async fn find_product_stage_by_order<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        stage_order: i32,
    ) -> Result<Option<ProductStage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ProductStage>(
            r#"
            SELECT id, product_id, name, stage_order
            FROM product_stages
            WHERE product_id = $1 AND stage_order = $2
            "#,
        )
            .bind(product_id)
            .bind(stage_order)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_lead_type<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<LeadType>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, LeadType>("SELECT id, name FROM lead_types WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_lead_type_by_name<'e, E>(
        &self,
        executor: E,
        name: &str,
    ) -> Result<Option<LeadType>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, LeadType>("SELECT id, name FROM lead_types WHERE name = $1")
            .bind(name)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_source<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Source>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, Source>("SELECT id, name, lead_type_id FROM sources WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_source_by_name<'e, E>(
        &self,
        executor: E,
        name: &str,
    ) -> Result<Option<Source>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, Source>("SELECT id, name, lead_type_id FROM sources WHERE name = $1")
            .bind(name)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_deal_stage<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<DealStage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, DealStage>("SELECT id, name, stage_order FROM deal_stages WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_deal_stage_by_name<'e, E>(
        &self,
        executor: E,
        name: &str,
    ) -> Result<Option<DealStage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, DealStage>(
            "SELECT id, name, stage_order FROM deal_stages WHERE name = $1",
        )
            .bind(name)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_deal_stage_by_order<'e, E>(
        &self,
        executor: E,
        stage_order: i32,
    ) -> Result<Option<DealStage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, DealStage>(
            "SELECT id, name, stage_order FROM deal_stages WHERE stage_order = $1",
        )
            .bind(stage_order)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_contract_stage<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<ContractStage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ContractStage>(
            "SELECT id, name, stage_order FROM contract_stages WHERE id = $1",
        )
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_contract_stage_by_order<'e, E>(
        &self,
        executor: E,
        stage_order: i32,
    ) -> Result<Option<ContractStage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ContractStage>(
            "SELECT id, name, stage_order FROM contract_stages WHERE stage_order = $1",
        )
            .bind(stage_order)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }
}
