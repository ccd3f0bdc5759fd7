// src/services/deal_service.rs

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::{db_utils::found, error::AppError},
    db::Repositories,
    models::{
        activity::{EntityRef, Notification},
        auth::{Role, User},
        commission::CommissionSheet,
        deal::{Deal, DealDetail, COLLECTED_STAGE},
        directory::DealStage,
        target::{Target, TargetOwner, TargetOwnerKind},
    },
    services::{
        journal::{self, JournalEntry},
        lead_service::{ensure_selected, require_reason},
        notification_service::NotificationService,
        stakeholders::{Audience, DEAL_REJECT_AUDIENCE},
    },
};

/// Como a etapa de destino é identificada. Os dois caminhos usam a mesma transição.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageRef {
    Id(Uuid),
    Name(String),
}

impl StageRef {
    pub fn collected() -> Self {
        StageRef::Name(COLLECTED_STAGE.to_string())
    }
}

/// Valida a troca de etapa. Retorna `true` quando o deal está entrando em "Collected".
pub fn check_stage_change(deal: &Deal, current: &str, next: &str, role: Role) -> Result<bool, AppError> {
    if current == COLLECTED_STAGE {
        return Err(AppError::DealAlreadyCollected);
    }
    if deal.is_reject {
        return Err(AppError::DealRejected);
    }

    let entering_collected = next == COLLECTED_STAGE;
    if entering_collected && !role.can_collect() {
        return Err(AppError::RoleNotPermitted);
    }
    Ok(entering_collected)
}

/// Relatório só pode ser aprovado por CEO/MD/Accountant e depois de gerado.
pub fn check_report_approval(deal: &Deal, role: Role) -> Result<(), AppError> {
    if !role.can_collect() {
        return Err(AppError::RoleNotPermitted);
    }
    if !deal.is_report_generated {
        return Err(AppError::ReportNotGenerated);
    }
    Ok(())
}

/// Sales agents do deal, na ordem em que aparecem em `selected_users`.
pub fn ensure_restorable(deal: &Deal) -> Result<(), AppError> {
    if deal.is_reject {
        Ok(())
    } else {
        Err(AppError::DealNotRejected)
    }
}

pub fn sales_agents(selected: &[Uuid], users: &[User]) -> Vec<Uuid> {
    selected
        .iter()
        .filter(|id| users.iter().any(|u| u.id == **id && u.role == Role::SalesAgent))
        .copied()
        .collect()
}

#[derive(Clone)]
pub struct DealService {
    pool: PgPool,
    repos: Repositories,
    notifier: NotificationService,
}

impl DealService {
    pub fn new(pool: PgPool, repos: Repositories, notifier: NotificationService) -> Self {
        Self { pool, repos, notifier }
    }

    pub async fn list(&self, actor: &User) -> Result<Vec<Deal>, AppError> {
        self.repos.deals.list_visible(actor.id).await
    }

    pub async fn detail(&self, actor: &User, deal_id: Uuid) -> Result<DealDetail, AppError> {
        let deal = found(self.repos.deals.find(&self.pool, deal_id).await?, "Deal")?;
        ensure_selected(&deal.selected_users, actor)?;

        let commission = found(
            self.repos.commissions.find(&self.pool, deal.service_commission_id).await?,
            "ServiceCommission",
        )?;
        let entries = self.repos.commissions.list_entries(&self.pool, commission.id).await?;
        let payments = self.repos.commissions.list_payments_for_deal(deal.id).await?;
        let activity_logs = self.repos.activity.list_logs(EntityRef::deal(deal.id)).await?;

        Ok(DealDetail {
            deal,
            commission: CommissionSheet::new(commission, entries),
            payments,
            activity_logs,
        })
    }

    // =========================================================================
    //  TRANSIÇÃO DE ETAPA
    // =========================================================================

    /// Única transição de etapa do deal: por id ou por nome ("Collected").
    pub async fn update_stage(&self, actor: &User, deal_id: Uuid, target: StageRef) -> Result<Deal, AppError> {
        let mut tx = self.pool.begin().await?;

        let deal = found(self.repos.deals.find_for_update(&mut *tx, deal_id).await?, "Deal")?;
        ensure_selected(&deal.selected_users, actor)?;

        let next = self.resolve_stage(&mut tx, &target).await?;
        let current = self
            .repos
            .directory
            .find_deal_stage(&mut *tx, deal.deal_stage_id)
            .await?
            .map(|s| s.name)
            .unwrap_or_default();

        let entering_collected = check_stage_change(&deal, &current, &next.name, actor.role)?;
        let deal = self.repos.deals.set_stage(&mut *tx, deal.id, next.id).await?;

        let users = self.repos.users.list_active(&mut *tx).await?;
        let mut remark = format!("{} changed the deal stage: {} → {}", actor.name, current, next.name);

        if entering_collected {
            let accrued = self.accrue_targets(&mut tx, &deal, &users).await?;
            remark.push_str(&format!(" (targets credited with {})", accrued));
        }

        let notifications = journal::record(
            &self.repos.activity,
            &mut tx,
            actor,
            &users,
            JournalEntry {
                target: EntityRef::deal(deal.id),
                log_type: "Deal Stage Updated",
                remark: &remark,
                selected: &deal.selected_users,
                audience: Audience::Everyone,
            },
        )
        .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;

        if entering_collected {
            tracing::info!("💰 Deal {} coletado por {}", deal.id, actor.id);
        }
        Ok(deal)
    }

    async fn resolve_stage(&self, conn: &mut PgConnection, target: &StageRef) -> Result<DealStage, AppError> {
        let stage = match target {
            StageRef::Id(id) => self.repos.directory.find_deal_stage(&mut *conn, *id).await?,
            StageRef::Name(name) => self.repos.directory.find_deal_stage_by_name(&mut *conn, name).await?,
        };
        found(stage, "DealStage")
    }

    /// Soma o finance_amount na meta do pipeline e na do primeiro sales agent com meta ativa.
    async fn accrue_targets(&self, conn: &mut PgConnection, deal: &Deal, users: &[User]) -> Result<Decimal, AppError> {
        let commission = found(
            self.repos.commissions.find(&mut *conn, deal.service_commission_id).await?,
            "ServiceCommission",
        )?;
        let amount = commission.finance_amount;
        let today = Utc::now().date_naive();

        let pipeline_owner = TargetOwner { kind: TargetOwnerKind::Pipeline, id: deal.pipeline_id };
        if let Some(target) = self.repos.targets.find_active_for_update(&mut *conn, pipeline_owner, today).await? {
            self.credit(&mut *conn, &target, amount).await?;
        } else {
            tracing::debug!("Pipeline {} sem meta ativa em {}", deal.pipeline_id, today);
        }

        if let Some(target) = self.agent_target(&mut *conn, &deal.selected_users, users, today).await? {
            self.credit(&mut *conn, &target, amount).await?;
        }

        Ok(amount)
    }

    async fn agent_target(
        &self,
        conn: &mut PgConnection,
        selected: &[Uuid],
        users: &[User],
        today: NaiveDate,
    ) -> Result<Option<Target>, AppError> {
        for agent_id in sales_agents(selected, users) {
            let owner = TargetOwner { kind: TargetOwnerKind::User, id: agent_id };
            if let Some(target) = self.repos.targets.find_active_for_update(&mut *conn, owner, today).await? {
                return Ok(Some(target));
            }
        }
        Ok(None)
    }

    async fn credit(&self, conn: &mut PgConnection, target: &Target, amount: Decimal) -> Result<(), AppError> {
        let (achieved, status) = target.accrue(amount);
        self.repos.targets.update_progress(&mut *conn, target.id, achieved, status).await?;
        tracing::info!("🎯 Meta {} agora em {} ({:?})", target.id, achieved, status);
        Ok(())
    }

    // =========================================================================
    //  REJECT / RESTORE
    // =========================================================================

    pub async fn reject(&self, actor: &User, deal_id: Uuid, reason: Option<&str>) -> Result<Deal, AppError> {
        let reason = require_reason(reason)?;
        let mut tx = self.pool.begin().await?;

        let deal = found(self.repos.deals.find_for_update(&mut *tx, deal_id).await?, "Deal")?;
        ensure_selected(&deal.selected_users, actor)?;

        let deal = self.repos.deals.set_rejection(&mut *tx, deal.id, Some(&reason)).await?;
        let remark = format!("Deal rejected by {}: {}", actor.name, reason);
        let notifications = self.journal_management(&mut tx, actor, &deal, "Reject Deal", &remark).await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(deal)
    }

    pub async fn restore(&self, actor: &User, deal_id: Uuid) -> Result<Deal, AppError> {
        let mut tx = self.pool.begin().await?;

        let deal = found(self.repos.deals.find_for_update(&mut *tx, deal_id).await?, "Deal")?;
        ensure_selected(&deal.selected_users, actor)?;
        ensure_restorable(&deal)?;

        let deal = self.repos.deals.set_rejection(&mut *tx, deal.id, None).await?;
        let remark = format!("Deal restored by {}", actor.name);
        let notifications = self.journal_management(&mut tx, actor, &deal, "Restore Deal", &remark).await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(deal)
    }

    async fn journal_management(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        deal: &Deal,
        log_type: &str,
        remark: &str,
    ) -> Result<Vec<Notification>, AppError> {
        let users = self.repos.users.list_active(&mut *conn).await?;
        journal::record(
            &self.repos.activity,
            conn,
            actor,
            &users,
            JournalEntry {
                target: EntityRef::deal(deal.id),
                log_type,
                remark,
                selected: &deal.selected_users,
                audience: Audience::Only(DEAL_REJECT_AUDIENCE),
            },
        )
        .await
    }

    // =========================================================================
    //  RELATÓRIO
    // =========================================================================

    /// Alterna `is_report_generated`. Desmarcar também desfaz a aprovação.
    pub async fn toggle_report(&self, actor: &User, deal_id: Uuid) -> Result<Deal, AppError> {
        let mut tx = self.pool.begin().await?;

        let deal = found(self.repos.deals.find_for_update(&mut *tx, deal_id).await?, "Deal")?;
        ensure_selected(&deal.selected_users, actor)?;

        let generated = !deal.is_report_generated;
        let approved = generated && deal.is_report_generated_approved;
        let deal = self.repos.deals.set_report_flags(&mut *tx, deal.id, generated, approved).await?;

        let remark = if generated {
            format!("{} marked the deal report as generated", actor.name)
        } else {
            format!("{} unmarked the deal report", actor.name)
        };
        self.repos
            .activity
            .insert_log(&mut *tx, EntityRef::deal(deal.id), actor.id, "Deal Report", &remark)
            .await?;

        tx.commit().await?;
        Ok(deal)
    }

    pub async fn approve_report(&self, actor: &User, deal_id: Uuid) -> Result<Deal, AppError> {
        let mut tx = self.pool.begin().await?;

        let deal = found(self.repos.deals.find_for_update(&mut *tx, deal_id).await?, "Deal")?;
        ensure_selected(&deal.selected_users, actor)?;
        check_report_approval(&deal, actor.role)?;

        let deal = self.repos.deals.set_report_flags(&mut *tx, deal.id, true, true).await?;

        let users = self.repos.users.list_active(&mut *tx).await?;
        let remark = format!("{} approved the deal report", actor.name);
        let notifications = journal::record(
            &self.repos.activity,
            &mut tx,
            actor,
            &users,
            JournalEntry {
                target: EntityRef::deal(deal.id),
                log_type: "Deal Report Approved",
                remark: &remark,
                selected: &deal.selected_users,
                audience: Audience::Everyone,
            },
        )
        .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(deal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal() -> Deal {
        Deal {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            lead_id: Uuid::new_v4(),
            contract_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            pipeline_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            lead_type_id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            deal_stage_id: Uuid::new_v4(),
            selected_users: Vec::new(),
            service_commission_id: Uuid::new_v4(),
            is_reject: false,
            reject_reason: None,
            is_report_generated: false,
            is_report_generated_approved: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn active_deal_is_not_restored() {
        let mut d = deal();
        assert!(matches!(ensure_restorable(&d), Err(AppError::DealNotRejected)));
        d.is_reject = true;
        assert!(ensure_restorable(&d).is_ok());
    }

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: format!("{:?}", role),
            email: String::new(),
            password_hash: String::new(),
            role,
            branch_id: None,
            pipeline_ids: Vec::new(),
            product_ids: Vec::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn collected_is_terminal_for_every_role() {
        for role in [Role::Ceo, Role::Md, Role::Accountant, Role::SalesAgent] {
            let err = check_stage_change(&deal(), COLLECTED_STAGE, "Documents", role).unwrap_err();
            assert!(matches!(err, AppError::DealAlreadyCollected));

            let err = check_stage_change(&deal(), COLLECTED_STAGE, COLLECTED_STAGE, role).unwrap_err();
            assert!(matches!(err, AppError::DealAlreadyCollected));
        }
    }

    #[test]
    fn only_ceo_md_and_accountant_may_collect() {
        for role in [Role::Ceo, Role::Md, Role::Accountant] {
            assert!(check_stage_change(&deal(), "Approved", COLLECTED_STAGE, role).unwrap());
        }
        for role in [Role::Manager, Role::SalesAgent, Role::Admin] {
            let err = check_stage_change(&deal(), "Approved", COLLECTED_STAGE, role).unwrap_err();
            assert!(matches!(err, AppError::RoleNotPermitted));
        }
    }

    #[test]
    fn ordinary_stage_changes_do_not_accrue() {
        assert!(!check_stage_change(&deal(), "New", "Approved", Role::SalesAgent).unwrap());
    }

    #[test]
    fn rejected_deals_do_not_move() {
        let mut d = deal();
        d.is_reject = true;
        assert!(matches!(
            check_stage_change(&d, "New", "Approved", Role::Ceo),
            Err(AppError::DealRejected)
        ));
    }

    #[test]
    fn both_collect_paths_resolve_to_the_same_stage_name() {
        assert_eq!(StageRef::collected(), StageRef::Name("Collected".to_string()));
    }

    #[test]
    fn report_approval_needs_role_and_generated_report() {
        let mut d = deal();
        assert!(matches!(check_report_approval(&d, Role::Manager), Err(AppError::RoleNotPermitted)));
        assert!(matches!(check_report_approval(&d, Role::Ceo), Err(AppError::ReportNotGenerated)));

        d.is_report_generated = true;
        assert!(check_report_approval(&d, Role::Accountant).is_ok());
    }

    #[test]
    fn sales_agents_keep_selection_order() {
        let manager = user(Role::Manager);
        let first = user(Role::SalesAgent);
        let second = user(Role::SalesAgent);
        let users = vec![manager.clone(), first.clone(), second.clone()];

        let agents = sales_agents(&[manager.id, second.id, first.id], &users);
        assert_eq!(agents, vec![second.id, first.id]);
    }
}
