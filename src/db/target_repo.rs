// src/db/target_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::target::{Target, TargetOwner, TargetStatus},
};

const TARGET_COLUMNS: &str = r#"
    id, assigned_to_kind, assigned_to_id, finance_amount, achieved_finance_amount,
    start_date, end_date, status, is_renewed, created_at, updated_at
"#;

#[derive(Clone)]
pub struct TargetRepository {
    pool: PgPool,
}

impl TargetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        owner: TargetOwner,
        finance_amount: Decimal,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Target, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let target = sqlx::query_as::<_, Target>(&format!(
            r#"
            INSERT INTO targets (assigned_to_kind, assigned_to_id, finance_amount, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            TARGET_COLUMNS
        ))
            .bind(owner.kind)
            .bind(owner.id)
            .bind(finance_amount)
            .bind(start_date)
            .bind(end_date)
            .fetch_one(executor)
            .await?;
        Ok(target)
    }

    pub async fn list(&self) -> Result<Vec<Target>, AppError> {
        let targets = sqlx::query_as::<_, Target>(&format!(
            "SELECT {} FROM targets ORDER BY start_date DESC, created_at DESC",
            TARGET_COLUMNS
        ))
            .fetch_all(&self.pool)
            .await?;
        Ok(targets)
    }

    /// Meta vigente do dono na data (travada para o acúmulo).
    pub async fn find_active_for_update<'e, E>(
        &self,
        executor: E,
        owner: TargetOwner,
        today: NaiveDate,
    ) -> Result<Option<Target>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let target = sqlx::query_as::<_, Target>(&format!(
            r#"
            SELECT {} FROM targets
            WHERE assigned_to_kind = $1 AND assigned_to_id = $2
              AND start_date <= $3 AND end_date >= $3
            ORDER BY start_date DESC
            LIMIT 1
            FOR UPDATE
            "#,
            TARGET_COLUMNS
        ))
            .bind(owner.kind)
            .bind(owner.id)
            .bind(today)
            .fetch_optional(executor)
            .await?;
        Ok(target)
    }

    pub async fn update_progress<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        achieved: Decimal,
        status: TargetStatus,
    ) -> Result<Target, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let target = sqlx::query_as::<_, Target>(&format!(
            r#"
            UPDATE targets
            SET achieved_finance_amount = $2, status = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TARGET_COLUMNS
        ))
            .bind(id)
            .bind(achieved)
            .bind(status)
            .fetch_one(executor)
            .await?;
        Ok(target)
    }

    pub async fn list_due_for_renewal<'e, E>(
        &self,
        executor: E,
        today: NaiveDate,
    ) -> Result<Vec<Target>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let targets = sqlx::query_as::<_, Target>(&format!(
            r#"
            SELECT {} FROM targets
            WHERE is_renewed = false AND end_date <= $1
            ORDER BY end_date ASC
            FOR UPDATE SKIP LOCKED
            "#,
            TARGET_COLUMNS
        ))
            .bind(today)
            .fetch_all(executor)
            .await?;
        Ok(targets)
    }

    /// Marca como renovada. `false` se outra execução já renovou.
    pub async fn mark_renewed<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE targets SET is_renewed = true, updated_at = NOW() WHERE id = $1 AND is_renewed = false",
        )
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
