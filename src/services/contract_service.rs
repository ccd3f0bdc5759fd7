// src/services/contract_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{db_utils::found, error::AppError},
    db::{commission_repo::CommissionFigures, Repositories},
    models::{
        activity::EntityRef,
        auth::User,
        commission::{CommissionSheet, ServiceCommission},
        contract::{Contract, ContractDetail},
        deal::Deal,
    },
    services::{
        journal::{self, JournalEntry},
        lead_service::{ensure_selected, require_reason},
        notification_service::NotificationService,
        stakeholders::Audience,
    },
};

/// Contrato convertido ou rejeitado não avança mais.
pub fn ensure_convertible(contract: &Contract) -> Result<(), AppError> {
    if contract.is_converted {
        return Err(AppError::ContractAlreadyConverted);
    }
    if contract.is_reject {
        return Err(AppError::ContractRejected);
    }
    Ok(())
}

pub fn ensure_not_converted(contract: &Contract) -> Result<(), AppError> {
    if contract.is_converted {
        Err(AppError::ContractAlreadyConverted)
    } else {
        Ok(())
    }
}

/// Só contrato rejeitado (e não convertido) volta.
pub fn ensure_restorable(contract: &Contract) -> Result<(), AppError> {
    ensure_not_converted(contract)?;
    if !contract.is_reject {
        return Err(AppError::ContractNotRejected);
    }
    Ok(())
}

#[derive(Clone)]
pub struct ContractService {
    pool: PgPool,
    repos: Repositories,
    notifier: NotificationService,
}

impl ContractService {
    pub fn new(pool: PgPool, repos: Repositories, notifier: NotificationService) -> Self {
        Self { pool, repos, notifier }
    }

    pub async fn list(&self, actor: &User) -> Result<Vec<Contract>, AppError> {
        self.repos.contracts.list_visible(actor.id).await
    }

    pub async fn detail(&self, actor: &User, contract_id: Uuid) -> Result<ContractDetail, AppError> {
        let contract = found(self.repos.contracts.find(&self.pool, contract_id).await?, "Contract")?;
        ensure_selected(&contract.selected_users, actor)?;

        let commission = found(
            self.repos.commissions.find(&self.pool, contract.service_commission_id).await?,
            "ServiceCommission",
        )?;
        let entries = self.repos.commissions.list_entries(&self.pool, commission.id).await?;
        let activity_logs = self.repos.activity.list_logs(EntityRef::contract(contract.id)).await?;

        Ok(ContractDetail {
            contract,
            commission: CommissionSheet::new(commission, entries),
            activity_logs,
        })
    }

    pub async fn update_stage(&self, actor: &User, contract_id: Uuid, stage_id: Uuid) -> Result<Contract, AppError> {
        let mut tx = self.pool.begin().await?;

        let contract = found(self.repos.contracts.find_for_update(&mut *tx, contract_id).await?, "Contract")?;
        ensure_selected(&contract.selected_users, actor)?;
        ensure_not_converted(&contract)?;

        let new_stage = found(self.repos.directory.find_contract_stage(&mut *tx, stage_id).await?, "ContractStage")?;
        let old_stage = self
            .repos
            .directory
            .find_contract_stage(&mut *tx, contract.contract_stage_id)
            .await?
            .map(|s| s.name)
            .unwrap_or_default();

        let contract = self.repos.contracts.set_stage(&mut *tx, contract.id, new_stage.id).await?;

        let users = self.repos.users.list_active(&mut *tx).await?;
        let remark = format!("{} changed the contract stage: {} → {}", actor.name, old_stage, new_stage.name);
        let notifications = journal::record(
            &self.repos.activity,
            &mut tx,
            actor,
            &users,
            JournalEntry {
                target: EntityRef::contract(contract.id),
                log_type: "Contract Stage Updated",
                remark: &remark,
                selected: &contract.selected_users,
                audience: Audience::Everyone,
            },
        )
        .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(contract)
    }

    pub async fn reject(&self, actor: &User, contract_id: Uuid, reason: Option<&str>) -> Result<Contract, AppError> {
        let reason = require_reason(reason)?;
        let mut tx = self.pool.begin().await?;

        let contract = found(self.repos.contracts.find_for_update(&mut *tx, contract_id).await?, "Contract")?;
        ensure_selected(&contract.selected_users, actor)?;
        ensure_not_converted(&contract)?;

        let contract = self.repos.contracts.set_rejection(&mut *tx, contract.id, Some(&reason)).await?;

        let users = self.repos.users.list_active(&mut *tx).await?;
        let remark = format!("Contract rejected by {}: {}", actor.name, reason);
        let notifications = journal::record(
            &self.repos.activity,
            &mut tx,
            actor,
            &users,
            JournalEntry {
                target: EntityRef::contract(contract.id),
                log_type: "Reject Contract",
                remark: &remark,
                selected: &contract.selected_users,
                audience: Audience::Everyone,
            },
        )
        .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(contract)
    }

    pub async fn restore(&self, actor: &User, contract_id: Uuid) -> Result<Contract, AppError> {
        let mut tx = self.pool.begin().await?;

        let contract = found(self.repos.contracts.find_for_update(&mut *tx, contract_id).await?, "Contract")?;
        ensure_selected(&contract.selected_users, actor)?;
        ensure_restorable(&contract)?;

        let contract = self.repos.contracts.set_rejection(&mut *tx, contract.id, None).await?;

        let users = self.repos.users.list_active(&mut *tx).await?;
        let remark = format!("Contract restored by {}", actor.name);
        let notifications = journal::record(
            &self.repos.activity,
            &mut tx,
            actor,
            &users,
            JournalEntry {
                target: EntityRef::contract(contract.id),
                log_type: "Restore Contract",
                remark: &remark,
                selected: &contract.selected_users,
                audience: Audience::Everyone,
            },
        )
        .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(contract)
    }

    /// Gera o deal na etapa de ordem 0, herdando a mesma ServiceCommission.
    pub async fn convert(&self, actor: &User, contract_id: Uuid) -> Result<Deal, AppError> {
        let mut tx = self.pool.begin().await?;

        let contract = found(self.repos.contracts.find_for_update(&mut *tx, contract_id).await?, "Contract")?;
        ensure_selected(&contract.selected_users, actor)?;
        ensure_convertible(&contract)?;

        let stage = self
            .repos
            .directory
            .find_deal_stage_by_order(&mut *tx, 0)
            .await?
            .ok_or(AppError::StageMissing("deal stage (order 0)"))?;

        let deal = self
            .repos
            .deals
            .create_from_contract(&mut *tx, &contract, actor.id, stage.id)
            .await?;
        self.repos.contracts.mark_converted(&mut *tx, contract.id).await?;

        let remark = format!("Contract converted to deal by {}", actor.name);
        self.repos
            .activity
            .insert_log(&mut *tx, EntityRef::contract(contract.id), actor.id, "Contract Conversion", &remark)
            .await?;

        let users = self.repos.users.list_active(&mut *tx).await?;
        let notifications = journal::record(
            &self.repos.activity,
            &mut tx,
            actor,
            &users,
            JournalEntry {
                target: EntityRef::deal(deal.id),
                log_type: "Deal Created",
                remark: &remark,
                selected: &deal.selected_users,
                audience: Audience::Everyone,
            },
        )
        .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;

        tracing::info!("💼 Contrato {} convertido no deal {}", contract.id, deal.id);
        Ok(deal)
    }

    /// Preenche os valores da ServiceCommission criada vazia na conversão do lead.
    pub async fn update_commission(
        &self,
        actor: &User,
        contract_id: Uuid,
        figures: CommissionFigures,
    ) -> Result<ServiceCommission, AppError> {
        let mut tx = self.pool.begin().await?;

        let contract = found(self.repos.contracts.find(&mut *tx, contract_id).await?, "Contract")?;
        ensure_selected(&contract.selected_users, actor)?;

        let commission = self
            .repos
            .commissions
            .update_figures(&mut *tx, contract.service_commission_id, &figures)
            .await?;

        self.repos
            .activity
            .insert_log(
                &mut *tx,
                EntityRef::contract(contract.id),
                actor.id,
                "Commission Updated",
                &format!("{} updated the service commission (finance amount {})", actor.name, figures.finance_amount),
            )
            .await?;

        tx.commit().await?;
        Ok(commission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn contract() -> Contract {
        Contract {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            lead_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            pipeline_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            lead_type_id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            contract_stage_id: Uuid::new_v4(),
            selected_users: Vec::new(),
            service_commission_id: Uuid::new_v4(),
            is_converted: false,
            is_reject: false,
            reject_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn only_rejected_contracts_are_restored() {
        let mut c = contract();
        assert!(matches!(ensure_restorable(&c), Err(AppError::ContractNotRejected)));

        c.is_reject = true;
        assert!(ensure_restorable(&c).is_ok());

        c.is_converted = true;
        assert!(matches!(ensure_restorable(&c), Err(AppError::ContractAlreadyConverted)));
    }

    #[test]
    fn open_contract_can_be_converted() {
        assert!(ensure_convertible(&contract()).is_ok());
    }

    #[test]
    fn converted_contract_cannot_be_converted_again() {
        let mut c = contract();
        c.is_converted = true;
        assert!(matches!(ensure_convertible(&c), Err(AppError::ContractAlreadyConverted)));
        assert!(matches!(ensure_not_converted(&c), Err(AppError::ContractAlreadyConverted)));
    }

    #[test]
    fn rejected_contract_must_be_restored_first() {
        let mut c = contract();
        c.is_reject = true;
        assert!(matches!(ensure_convertible(&c), Err(AppError::ContractRejected)));
        assert!(ensure_not_converted(&c).is_ok());
    }
}
