// src/services/target_service.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::Repositories,
    models::target::{Target, TargetOwner, TargetOwnerKind},
};

pub fn validate_target(finance_amount: Decimal, start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if finance_amount <= Decimal::ZERO {
        return Err(AppError::InvalidField("financeAmount"));
    }
    if end < start {
        return Err(AppError::InvalidField("endDate"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct TargetService {
    pool: PgPool,
    repos: Repositories,
}

impl TargetService {
    pub fn new(pool: PgPool, repos: Repositories) -> Self {
        Self { pool, repos }
    }

    pub async fn create(
        &self,
        owner: TargetOwner,
        finance_amount: Decimal,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Target, AppError> {
        validate_target(finance_amount, start, end)?;

        let owner_exists = match owner.kind {
            TargetOwnerKind::User => self.repos.users.exists(&self.pool, owner.id).await?,
            TargetOwnerKind::Pipeline => self.repos.directory.find_pipeline(&self.pool, owner.id).await?.is_some(),
        };
        if !owner_exists {
            return Err(AppError::NotFound("TargetOwner"));
        }

        self.repos.targets.create(&self.pool, owner, finance_amount, start, end).await
    }

    pub async fn list(&self) -> Result<Vec<Target>, AppError> {
        self.repos.targets.list().await
    }

    /// Cria as metas sucessoras das vencidas e não renovadas. Idempotente:
    /// cada meta é travada e só renovada uma vez.
    pub async fn renew_due(&self, today: NaiveDate) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;
        let due = self.repos.targets.list_due_for_renewal(&mut *tx, today).await?;

        let mut renewed = 0;
        for target in due.iter().filter(|t| t.is_due_for_renewal(today)) {
            if !self.repos.targets.mark_renewed(&mut *tx, target.id).await? {
                continue;
            }
            let (start, end) = target.successor_period();
            let successor = self
                .repos
                .targets
                .create(&mut *tx, target.owner(), target.finance_amount, start, end)
                .await?;
            tracing::debug!("Meta {} renovada como {} ({} → {})", target.id, successor.id, start, end);
            renewed += 1;
        }

        tx.commit().await?;
        Ok(renewed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn target_needs_positive_amount() {
        let err = validate_target(Decimal::ZERO, date(2025, 1, 1), date(2025, 1, 31)).unwrap_err();
        assert!(matches!(err, AppError::InvalidField("financeAmount")));
    }

    #[test]
    fn target_period_cannot_be_inverted() {
        let err = validate_target(Decimal::from(10), date(2025, 2, 1), date(2025, 1, 31)).unwrap_err();
        assert!(matches!(err, AppError::InvalidField("endDate")));
        assert!(validate_target(Decimal::from(10), date(2025, 1, 1), date(2025, 1, 1)).is_ok());
    }
}
