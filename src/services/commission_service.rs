// src/services/commission_service.rs

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{db_utils::found, error::AppError},
    db::Repositories,
    models::{
        activity::EntityRef,
        auth::User,
        commission::{ensure_payable, CommissionPayment, CommissionSheet},
    },
};

/// Percentual e valor de uma linha de comissão não podem ser negativos.
pub fn validate_entry(percentage: Decimal, amount: Decimal) -> Result<(), AppError> {
    if percentage < Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
        return Err(AppError::InvalidField("commissionPercentage"));
    }
    if amount < Decimal::ZERO {
        return Err(AppError::InvalidField("commissionAmount"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct CommissionService {
    pool: PgPool,
    repos: Repositories,
}

impl CommissionService {
    pub fn new(pool: PgPool, repos: Repositories) -> Self {
        Self { pool, repos }
    }

    pub async fn sheet(&self, service_commission_id: Uuid) -> Result<CommissionSheet, AppError> {
        let commission = found(
            self.repos.commissions.find(&self.pool, service_commission_id).await?,
            "ServiceCommission",
        )?;
        let entries = self.repos.commissions.list_entries(&self.pool, commission.id).await?;
        Ok(CommissionSheet::new(commission, entries))
    }

    /// Uma linha por usuário: grava ou substitui.
    pub async fn upsert_entry(
        &self,
        actor: &User,
        service_commission_id: Uuid,
        user_id: Uuid,
        percentage: Decimal,
        amount: Decimal,
    ) -> Result<CommissionSheet, AppError> {
        validate_entry(percentage, amount)?;

        let mut tx = self.pool.begin().await?;
        let commission = found(
            self.repos.commissions.find(&mut *tx, service_commission_id).await?,
            "ServiceCommission",
        )?;
        if !self.repos.users.exists(&mut *tx, user_id).await? {
            return Err(AppError::NotFound("User"));
        }

        self.repos
            .commissions
            .upsert_entry(&mut *tx, commission.id, user_id, percentage, amount)
            .await?;

        if let Some(contract_id) = commission.contract_id {
            self.repos
                .activity
                .insert_log(
                    &mut *tx,
                    EntityRef::contract(contract_id),
                    actor.id,
                    "Commission Entry",
                    &format!("{} set a commission of {} ({}%) for user {}", actor.name, amount, percentage, user_id),
                )
                .await?;
        }

        let entries = self.repos.commissions.list_entries(&mut *tx, commission.id).await?;
        tx.commit().await?;

        Ok(CommissionSheet::new(commission, entries))
    }

    pub async fn remove_entry(
        &self,
        actor: &User,
        service_commission_id: Uuid,
        user_id: Uuid,
    ) -> Result<CommissionSheet, AppError> {
        let mut tx = self.pool.begin().await?;
        let commission = found(
            self.repos.commissions.find(&mut *tx, service_commission_id).await?,
            "ServiceCommission",
        )?;

        if !self.repos.commissions.delete_entry(&mut *tx, commission.id, user_id).await? {
            return Err(AppError::NotFound("CommissionEntry"));
        }

        if let Some(contract_id) = commission.contract_id {
            self.repos
                .activity
                .insert_log(
                    &mut *tx,
                    EntityRef::contract(contract_id),
                    actor.id,
                    "Commission Entry Removed",
                    &format!("{} removed the commission of user {}", actor.name, user_id),
                )
                .await?;
        }

        let entries = self.repos.commissions.list_entries(&mut *tx, commission.id).await?;
        tx.commit().await?;

        Ok(CommissionSheet::new(commission, entries))
    }

    // =========================================================================
    //  PAGAMENTOS
    // =========================================================================

    pub async fn create_payment(
        &self,
        actor: &User,
        deal_id: Uuid,
        user_id: Uuid,
        total_commission: Decimal,
        payment_method: Option<&str>,
    ) -> Result<CommissionPayment, AppError> {
        ensure_payable(total_commission)?;

        let mut tx = self.pool.begin().await?;
        let deal = found(self.repos.deals.find(&mut *tx, deal_id).await?, "Deal")?;
        if !self.repos.users.exists(&mut *tx, user_id).await? {
            return Err(AppError::NotFound("User"));
        }

        let payment = self
            .repos
            .commissions
            .create_payment(&mut *tx, deal.id, user_id, total_commission, payment_method)
            .await?;

        self.repos
            .activity
            .insert_log(
                &mut *tx,
                EntityRef::deal(deal.id),
                actor.id,
                "Commission Payment Created",
                &format!("{} opened a commission payment of {} for user {}", actor.name, total_commission, user_id),
            )
            .await?;

        tx.commit().await?;
        Ok(payment)
    }

    /// Aplica um pagamento parcial ou total. pago + restante continua igual ao total.
    pub async fn apply_payment(
        &self,
        actor: &User,
        payment_id: Uuid,
        amount: Decimal,
        payment_method: Option<&str>,
    ) -> Result<CommissionPayment, AppError> {
        let mut tx = self.pool.begin().await?;

        let payment = found(
            self.repos.commissions.find_payment_for_update(&mut *tx, payment_id).await?,
            "CommissionPayment",
        )?;
        let (paid, remaining) = payment.apply_payment(amount)?;

        let payment = self
            .repos
            .commissions
            .record_payment(&mut *tx, payment.id, paid, remaining, payment_method)
            .await?;

        self.repos
            .activity
            .insert_log(
                &mut *tx,
                EntityRef::deal(payment.deal_id),
                actor.id,
                "Commission Payment",
                &format!("{} paid {} to user {} (remaining {})", actor.name, amount, payment.user_id, remaining),
            )
            .await?;

        tx.commit().await?;
        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_values_must_be_in_range() {
        assert!(validate_entry(Decimal::new(25, 1), Decimal::from(1250)).is_ok());
        assert!(validate_entry(Decimal::ZERO, Decimal::ZERO).is_ok());

        assert!(matches!(
            validate_entry(Decimal::from(-1), Decimal::ZERO),
            Err(AppError::InvalidField("commissionPercentage"))
        ));
        assert!(matches!(
            validate_entry(Decimal::from(101), Decimal::ZERO),
            Err(AppError::InvalidField("commissionPercentage"))
        ));
        assert!(matches!(
            validate_entry(Decimal::ONE, Decimal::from(-10)),
            Err(AppError::InvalidField("commissionAmount"))
        ));
    }
}
