// src/db/commission_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::commission::{CommissionEntry, CommissionPayment, ServiceCommission},
};

const COMMISSION_COLUMNS: &str = r#"
    id, contract_id, finance_amount, bank_commission, customer_commission,
    with_vat_commission, without_vat_commission, created_at, updated_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, deal_id, user_id, total_commission, paid_commission, remaining_commission,
    payment_method, created_at, updated_at
"#;

/// Valores da comissão de serviço informados na conversão ou no back-fill.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommissionFigures {
    pub finance_amount: Decimal,
    pub bank_commission: Decimal,
    pub customer_commission: Decimal,
    pub with_vat_commission: Decimal,
    pub without_vat_commission: Decimal,
}

#[derive(Clone)]
pub struct CommissionRepository {
    pool: PgPool,
}

impl CommissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  SERVICE COMMISSION
    // =========================================================================

    pub async fn find<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<ServiceCommission>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ServiceCommission>(&format!(
            "SELECT {} FROM service_commissions WHERE id = $1",
            COMMISSION_COLUMNS
        ))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Criada antes do contrato; `contract_id` fica nulo até o back-fill.
    pub async fn create<'e, E>(
        &self,
        executor: E,
        figures: &CommissionFigures,
    ) -> Result<ServiceCommission, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ServiceCommission>(&format!(
            r#"
            INSERT INTO service_commissions (
                finance_amount, bank_commission, customer_commission,
                with_vat_commission, without_vat_commission
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            COMMISSION_COLUMNS
        ))
            .bind(figures.finance_amount)
            .bind(figures.bank_commission)
            .bind(figures.customer_commission)
            .bind(figures.with_vat_commission)
            .bind(figures.without_vat_commission)
            .fetch_one(executor)
            .await?;
        Ok(row)
    }

    pub async fn attach_contract<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        contract_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE service_commissions SET contract_id = $2, updated_at = NOW() WHERE id = $1",
        )
            .bind(id)
            .bind(contract_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn update_figures<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        figures: &CommissionFigures,
    ) -> Result<ServiceCommission, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ServiceCommission>(&format!(
            r#"
            UPDATE service_commissions
            SET finance_amount = $2, bank_commission = $3, customer_commission = $4,
                with_vat_commission = $5, without_vat_commission = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            COMMISSION_COLUMNS
        ))
            .bind(id)
            .bind(figures.finance_amount)
            .bind(figures.bank_commission)
            .bind(figures.customer_commission)
            .bind(figures.with_vat_commission)
            .bind(figures.without_vat_commission)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::NotFound("ServiceCommission"))?;
        Ok(row)
    }

    // =========================================================================
    //  DIVISÃO POR USUÁRIO (uma linha por usuário)
    // =========================================================================

    pub async fn list_entries<'e, E>(
        &self,
        executor: E,
        service_commission_id: Uuid,
    ) -> Result<Vec<CommissionEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, CommissionEntry>(
            r#"
            SELECT service_commission_id, user_id, commission_percentage, commission_amount
            FROM commission_entries
            WHERE service_commission_id = $1
            ORDER BY user_id
            "#,
        )
            .bind(service_commission_id)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    pub async fn upsert_entry<'e, E>(
        &self,
        executor: E,
        service_commission_id: Uuid,
        user_id: Uuid,
        commission_percentage: Decimal,
        commission_amount: Decimal,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO commission_entries
                (service_commission_id, user_id, commission_percentage, commission_amount)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (service_commission_id, user_id)
            DO UPDATE SET commission_percentage = EXCLUDED.commission_percentage,
                          commission_amount = EXCLUDED.commission_amount
            "#,
        )
            .bind(service_commission_id)
            .bind(user_id)
            .bind(commission_percentage)
            .bind(commission_amount)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete_entry<'e, E>(
        &self,
        executor: E,
        service_commission_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "DELETE FROM commission_entries WHERE service_commission_id = $1 AND user_id = $2",
        )
            .bind(service_commission_id)
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    //  PAGAMENTOS
    // =========================================================================

    pub async fn create_payment<'e, E>(
        &self,
        executor: E,
        deal_id: Uuid,
        user_id: Uuid,
        total_commission: Decimal,
        payment_method: Option<&str>,
    ) -> Result<CommissionPayment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, CommissionPayment>(&format!(
            r#"
            INSERT INTO commission_payments
                (deal_id, user_id, total_commission, paid_commission, remaining_commission, payment_method)
            VALUES ($1, $2, $3, 0, $3, $4)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
            .bind(deal_id)
            .bind(user_id)
            .bind(total_commission)
            .bind(payment_method)
            .fetch_one(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_payment_for_update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<CommissionPayment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, CommissionPayment>(&format!(
            "SELECT {} FROM commission_payments WHERE id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn record_payment<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        paid: Decimal,
        remaining: Decimal,
        payment_method: Option<&str>,
    ) -> Result<CommissionPayment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, CommissionPayment>(&format!(
            r#"
            UPDATE commission_payments
            SET paid_commission = $2, remaining_commission = $3,
                payment_method = COALESCE($4, payment_method), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
            .bind(id)
            .bind(paid)
            .bind(remaining)
            .bind(payment_method)
            .fetch_one(executor)
            .await?;
        Ok(row)
    }

    pub async fn list_payments_for_deal(&self, deal_id: Uuid) -> Result<Vec<CommissionPayment>, AppError> {
        let rows = sqlx::query_as::<_, CommissionPayment>(&format!(
            "SELECT {} FROM commission_payments WHERE deal_id = $1 ORDER BY created_at ASC",
            PAYMENT_COLUMNS
        ))
            .bind(deal_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
