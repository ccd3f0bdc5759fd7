// src/models/target.rs

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "target_owner_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetOwnerKind {
    User,
    Pipeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "target_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetStatus {
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl TargetStatus {
    pub fn for_progress(achieved: Decimal, goal: Decimal) -> Self {
        if achieved >= goal {
            TargetStatus::Completed
        } else {
            TargetStatus::InProgress
        }
    }
}

/// Dono da meta: um usuário ou um pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetOwner {
    pub kind: TargetOwnerKind,
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: Uuid,
    pub assigned_to_kind: TargetOwnerKind,
    pub assigned_to_id: Uuid,
    #[schema(example = "1000000.00")]
    pub finance_amount: Decimal,
    pub achieved_finance_amount: Decimal,
    #[schema(value_type = String, format = Date, example = "2025-01-01")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = Date, example = "2025-01-31")]
    pub end_date: NaiveDate,
    pub status: TargetStatus,
    pub is_renewed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Target {
    pub fn owner(&self) -> TargetOwner {
        TargetOwner { kind: self.assigned_to_kind, id: self.assigned_to_id }
    }

    /// Novo (realizado, status) depois de somar `amount`.
    pub fn accrue(&self, amount: Decimal) -> (Decimal, TargetStatus) {
        let achieved = self.achieved_finance_amount + amount;
        (achieved, TargetStatus::for_progress(achieved, self.finance_amount))
    }

    /// Período da meta sucessora: começa no dia seguinte ao fim e tem a mesma duração.
    pub fn successor_period(&self) -> (NaiveDate, NaiveDate) {
        let span = self.end_date - self.start_date;
        let start = self.end_date + Duration::days(1);
        (start, start + span)
    }

    pub fn is_due_for_renewal(&self, today: NaiveDate) -> bool {
        !self.is_renewed && self.end_date <= today
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(goal: i64, achieved: i64, start: NaiveDate, end: NaiveDate) -> Target {
        Target {
            id: Uuid::new_v4(),
            assigned_to_kind: TargetOwnerKind::Pipeline,
            assigned_to_id: Uuid::new_v4(),
            finance_amount: Decimal::from(goal),
            achieved_finance_amount: Decimal::from(achieved),
            start_date: start,
            end_date: end,
            status: TargetStatus::Pending,
            is_renewed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn accrual_below_goal_is_in_progress() {
        let t = target(1000, 100, date(2025, 1, 1), date(2025, 1, 31));
        assert_eq!(t.accrue(Decimal::from(300)), (Decimal::from(400), TargetStatus::InProgress));
    }

    #[test]
    fn reaching_the_goal_completes_the_target() {
        let t = target(1000, 700, date(2025, 1, 1), date(2025, 1, 31));
        assert_eq!(t.accrue(Decimal::from(300)), (Decimal::from(1000), TargetStatus::Completed));
        assert_eq!(t.accrue(Decimal::from(900)).1, TargetStatus::Completed);
    }

    #[test]
    fn successor_is_contiguous_and_keeps_duration() {
        let t = target(1000, 0, date(2025, 1, 1), date(2025, 1, 31));
        let (start, end) = t.successor_period();
        assert_eq!(start, date(2025, 2, 1));
        assert_eq!(end, date(2025, 3, 3));
        assert_eq!(end - start, t.end_date - t.start_date);
    }

    #[test]
    fn only_expired_unrenewed_targets_are_due() {
        let mut t = target(1000, 0, date(2025, 1, 1), date(2025, 1, 31));
        assert!(!t.is_due_for_renewal(date(2025, 1, 30)));
        assert!(t.is_due_for_renewal(date(2025, 1, 31)));
        t.is_renewed = true;
        assert!(!t.is_due_for_renewal(date(2025, 2, 10)));
    }
}
