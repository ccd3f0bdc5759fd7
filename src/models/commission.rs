// src/models/commission.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

use crate::common::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCommission {
    pub id: Uuid,
    // Preenchido depois que o contrato é criado
    pub contract_id: Option<Uuid>,
    #[schema(example = "250000.00")]
    pub finance_amount: Decimal,
    pub bank_commission: Decimal,
    pub customer_commission: Decimal,
    pub with_vat_commission: Decimal,
    pub without_vat_commission: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Uma linha por usuário (chave: service_commission_id + user_id)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommissionEntry {
    pub service_commission_id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "2.50")]
    pub commission_percentage: Decimal,
    #[schema(example = "1250.00")]
    pub commission_amount: Decimal,
}

// Comissão + divisão por usuário. O total é derivado, nunca gravado.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommissionSheet {
    #[serde(flatten)]
    pub commission: ServiceCommission,
    pub commissions: Vec<CommissionEntry>,
    pub total_commission_amount: Decimal,
}

impl CommissionSheet {
    pub fn new(commission: ServiceCommission, commissions: Vec<CommissionEntry>) -> Self {
        let total_commission_amount = commissions.iter().map(|c| c.commission_amount).sum();
        Self { commission, commissions, total_commission_amount }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommissionPayment {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub user_id: Uuid,
    pub total_commission: Decimal,
    pub paid_commission: Decimal,
    pub remaining_commission: Decimal,
    #[schema(example = "Bank Transfer")]
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Casas decimais das colunas NUMERIC(14,2) do ledger.
pub const MONEY_SCALE: u32 = 2;

/// Valor positivo em centavos; frações menores seriam arredondadas pelo banco.
pub fn ensure_payable(amount: Decimal) -> Result<(), AppError> {
    if amount <= Decimal::ZERO || amount.normalize().scale() > MONEY_SCALE {
        return Err(AppError::InvalidPaymentAmount);
    }
    Ok(())
}

impl CommissionPayment {
    /// Calcula (pago, restante) após um pagamento. Invariante: pago + restante == total.
    pub fn apply_payment(&self, amount: Decimal) -> Result<(Decimal, Decimal), AppError> {
        ensure_payable(amount)?;
        if amount > self.remaining_commission {
            return Err(AppError::PaymentExceedsRemaining);
        }

        let paid = self.paid_commission + amount;
        Ok((paid, self.total_commission - paid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(total: i64, paid: i64) -> CommissionPayment {
        CommissionPayment {
            id: Uuid::new_v4(),
            deal_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            total_commission: Decimal::from(total),
            paid_commission: Decimal::from(paid),
            remaining_commission: Decimal::from(total - paid),
            payment_method: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn partial_payment_keeps_the_balance() {
        let p = payment(1000, 200);
        let (paid, remaining) = p.apply_payment(Decimal::new(30050, 2)).unwrap();
        assert_eq!(paid, Decimal::new(50050, 2));
        assert_eq!(paid + remaining, p.total_commission);
    }

    #[test]
    fn paying_exactly_the_remaining_settles_it() {
        let (paid, remaining) = payment(1000, 400).apply_payment(Decimal::from(600)).unwrap();
        assert_eq!(paid, Decimal::from(1000));
        assert_eq!(remaining, Decimal::ZERO);
    }

    #[test]
    fn overpayment_is_rejected() {
        let err = payment(1000, 900).apply_payment(Decimal::from(101)).unwrap_err();
        assert!(matches!(err, AppError::PaymentExceedsRemaining));
    }

    #[test]
    fn zero_or_negative_payment_is_rejected() {
        assert!(matches!(
            payment(1000, 0).apply_payment(Decimal::ZERO),
            Err(AppError::InvalidPaymentAmount)
        ));
        assert!(matches!(
            payment(1000, 0).apply_payment(Decimal::from(-5)),
            Err(AppError::InvalidPaymentAmount)
        ));
    }

    #[test]
    fn sub_cent_payment_is_rejected() {
        let err = payment(100, 0).apply_payment(Decimal::new(5, 3)).unwrap_err();
        assert!(matches!(err, AppError::InvalidPaymentAmount));

        // Zeros à direita não contam como precisão extra
        let (paid, remaining) = payment(100, 0).apply_payment(Decimal::new(1500, 3)).unwrap();
        assert_eq!(paid, Decimal::new(150, 2));
        assert_eq!(paid + remaining, Decimal::from(100));
    }

    #[test]
    fn totals_must_fit_in_cents() {
        assert!(ensure_payable(Decimal::new(10001, 2)).is_ok());
        assert!(matches!(ensure_payable(Decimal::new(100001, 3)), Err(AppError::InvalidPaymentAmount)));
    }

    #[test]
    fn sheet_total_is_the_sum_of_entries() {
        let sc_id = Uuid::new_v4();
        let commission = ServiceCommission {
            id: sc_id,
            contract_id: None,
            finance_amount: Decimal::from(100_000),
            bank_commission: Decimal::ZERO,
            customer_commission: Decimal::ZERO,
            with_vat_commission: Decimal::ZERO,
            without_vat_commission: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let entries = vec![
            CommissionEntry {
                service_commission_id: sc_id,
                user_id: Uuid::new_v4(),
                commission_percentage: Decimal::from(1),
                commission_amount: Decimal::from(1000),
            },
            CommissionEntry {
                service_commission_id: sc_id,
                user_id: Uuid::new_v4(),
                commission_percentage: Decimal::new(5, 1),
                commission_amount: Decimal::from(500),
            },
        ];

        let sheet = CommissionSheet::new(commission, entries);
        assert_eq!(sheet.total_commission_amount, Decimal::from(1500));
    }
}
