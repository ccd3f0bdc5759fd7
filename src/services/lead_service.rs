// src/services/lead_service.rs

use std::collections::BTreeSet;

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::{db_utils::found, error::AppError, phone::normalize_uae_phone},
    db::{commission_repo::CommissionFigures, lead_repo::{LeadFilter, NewLead}, Repositories},
    models::{
        activity::{EntityKind, EntityRef, Notification},
        auth::{Role, User},
        client::Client,
        contract::Contract,
        lead::{Lead, LeadDetail, LeadDiscussion, LeadFile, TransferSnapshot},
    },
    services::{
        notification_service::NotificationService,
        journal::{self, JournalEntry},
        stakeholders::{
            merge_users, resolve_stakeholders, Audience, StakeholderContext, StakeholderRules,
            LEAD_REJECT_SILENCED,
        },
    },
};

/// Tipo e origem forçados quando o lead nasce de um número do phonebook.
pub const PHONEBOOK_LEAD_TYPE: &str = "Phonebook";
pub const PHONEBOOK_SOURCE: &str = "Phonebook";
pub const MARKETING_LEAD_TYPE: &str = "Marketing";
pub const LEAD_CREATED_LOG: &str = "Lead Created";

/// Etapa de entrada do produto: transfer cai na ordem 1, move na ordem 0.
pub const TRANSFER_STAGE_ORDER: i32 = 1;
pub const MOVE_STAGE_ORDER: i32 = 0;

// --- Entradas do serviço ---

#[derive(Debug, Clone)]
pub struct CreateLeadInput {
    pub client_phone: String,
    pub client_w_phone: Option<String>,
    pub client_e_id: Option<String>,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub company_name: Option<String>,
    pub description: Option<String>,
    pub pipeline_id: Option<Uuid>,
    pub branch_id: Uuid,
    pub product_id: Uuid,
    pub product_stage_id: Uuid,
    pub lead_type_id: Option<Uuid>,
    pub source_id: Option<Uuid>,
}

/// Destino de restore/transfer/move. Campos opcionais viram 400 quando exigidos.
#[derive(Debug, Clone, Default)]
pub struct RoutingInput {
    pub pipeline_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub product_stage_id: Option<Uuid>,
}

/// Nomes legíveis do roteamento, usados no remark de transfer/move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingNames {
    pub pipeline: String,
    pub branch: String,
    pub product_stage: String,
    pub product: String,
}

// =============================================================================
//  REGRAS PURAS
// =============================================================================

pub fn require_reason(reason: Option<&str>) -> Result<String, AppError> {
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => Ok(r.to_string()),
        _ => Err(AppError::MissingField("reject_reason")),
    }
}

pub fn ensure_selected(selected_users: &[Uuid], actor: &User) -> Result<(), AppError> {
    if selected_users.contains(&actor.id) {
        Ok(())
    } else {
        Err(AppError::NotSelectedUser)
    }
}

/// Lead convertido não aceita mais as transições de lead.
pub fn ensure_open(lead: &Lead) -> Result<(), AppError> {
    if lead.is_converted {
        Err(AppError::LeadLocked)
    } else {
        Ok(())
    }
}

/// Conversão acontece uma vez só.
pub fn ensure_not_converted(lead: &Lead) -> Result<(), AppError> {
    if lead.is_converted {
        Err(AppError::LeadAlreadyConverted)
    } else {
        Ok(())
    }
}

/// Membros de um lead para o roteamento dado: criador + fan-out por cargo.
pub fn routing_members(
    creator: Uuid,
    routing: &TransferSnapshot,
    is_marketing: bool,
    users: &[User],
    rules: &StakeholderRules,
) -> BTreeSet<Uuid> {
    let ctx = StakeholderContext {
        creator,
        branch_id: routing.branch_id,
        pipeline_id: routing.pipeline_id,
        product_id: routing.product_id,
        is_marketing,
    };
    resolve_stakeholders(&ctx, users, rules)
}

pub fn check_transfer(lead: &Lead, new_product_id: Uuid) -> Result<(), AppError> {
    if lead.product_id == new_product_id {
        return Err(AppError::SameProductTransfer);
    }
    Ok(())
}

pub fn check_move(lead: &Lead, new_pipeline_id: Uuid) -> Result<(), AppError> {
    if lead.pipeline_id == new_pipeline_id {
        return Err(AppError::SamePipelineMove);
    }
    Ok(())
}

/// "Pipeline: A → B, Product: X → Y" com apenas os campos que mudaram.
pub fn routing_diff_remark(before: &RoutingNames, after: &RoutingNames) -> String {
    let fields = [
        ("Pipeline", &before.pipeline, &after.pipeline),
        ("Branch", &before.branch, &after.branch),
        ("Product Stage", &before.product_stage, &after.product_stage),
        ("Product", &before.product, &after.product),
    ];

    let changes: Vec<String> = fields
        .iter()
        .filter(|(_, old, new)| old != new)
        .map(|(label, old, new)| format!("{}: {} → {}", label, old, new))
        .collect();

    if changes.is_empty() {
        "No routing changes".to_string()
    } else {
        changes.join(", ")
    }
}

fn required(value: Option<Uuid>, field: &'static str) -> Result<Uuid, AppError> {
    value.ok_or(AppError::MissingField(field))
}

fn client_label(client: &Client) -> String {
    client.name.clone().unwrap_or_else(|| client.phone.clone())
}

// =============================================================================
//  SERVIÇO
// =============================================================================

#[derive(Clone)]
pub struct LeadService {
    pool: PgPool,
    repos: Repositories,
    notifier: NotificationService,
    rules: StakeholderRules,
}

impl LeadService {
    pub fn new(
        pool: PgPool,
        repos: Repositories,
        notifier: NotificationService,
        rules: StakeholderRules,
    ) -> Self {
        Self { pool, repos, notifier, rules }
    }

    // -------------------------------------------------------------------------
    //  LEITURAS
    // -------------------------------------------------------------------------

    pub async fn list(&self, actor: &User, filter: &LeadFilter) -> Result<Vec<Lead>, AppError> {
        self.repos.leads.list_visible(actor.id, filter).await
    }

    pub async fn detail(&self, actor: &User, lead_id: Uuid) -> Result<LeadDetail, AppError> {
        let lead = found(self.repos.leads.find(&self.pool, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;

        let client = found(self.repos.clients.find_by_id(&self.pool, lead.client_id).await?, "Client")?;
        let discussions = self.repos.leads.list_discussions(lead.id).await?;
        let files = self.repos.leads.list_files(lead.id).await?;
        let activity_logs = self.repos.activity.list_logs(EntityRef::lead(lead.id)).await?;

        Ok(LeadDetail { lead, client, discussions, files, activity_logs })
    }

    // -------------------------------------------------------------------------
    //  CREATE
    // -------------------------------------------------------------------------

    pub async fn create(&self, actor: &User, input: CreateLeadInput) -> Result<Lead, AppError> {
        let phone = normalize_uae_phone(&input.client_phone).ok_or(AppError::InvalidField("clientPhone"))?;
        let w_phone = match input.client_w_phone.as_deref().filter(|w| !w.trim().is_empty()) {
            Some(raw) => Some(normalize_uae_phone(raw).ok_or(AppError::InvalidField("clientWPhone"))?),
            None => None,
        };

        let mut tx = self.pool.begin().await?;

        // 1. Referências obrigatórias
        let product = found(self.repos.directory.find_product(&mut *tx, input.product_id).await?, "Product")?;
        found(self.repos.directory.find_branch(&mut *tx, input.branch_id).await?, "Branch")?;
        let stage = found(
            self.repos.directory.find_product_stage(&mut *tx, input.product_stage_id).await?,
            "ProductStage",
        )?;
        if stage.product_id != product.id {
            return Err(AppError::InvalidField("productStageId"));
        }
        let pipeline_id = input
            .pipeline_id
            .or(product.pipeline_id)
            .ok_or(AppError::MissingField("pipelineId"))?;
        found(self.repos.directory.find_pipeline(&mut *tx, pipeline_id).await?, "Pipeline")?;

        // 2. Cliente: telefone, depois Emirates ID, senão cria
        let client = self.resolve_client(&mut tx, &phone, w_phone.as_deref(), &input).await?;

        if self
            .repos
            .leads
            .exists_for_client_product(&mut *tx, client.id, product.id)
            .await?
        {
            return Err(AppError::DuplicateLead);
        }

        // 3. Número no phonebook força tipo/origem "Phonebook"
        let phonebook_entry = self.repos.phonebook.find_unblocked_by_number(&mut *tx, &phone).await?;

        let (lead_type, source_id) = if phonebook_entry.is_some() {
            let lead_type = found(
                self.repos.directory.find_lead_type_by_name(&mut *tx, PHONEBOOK_LEAD_TYPE).await?,
                "LeadType",
            )?;
            let source = found(
                self.repos.directory.find_source_by_name(&mut *tx, PHONEBOOK_SOURCE).await?,
                "Source",
            )?;
            (lead_type, source.id)
        } else {
            let lead_type_id = required(input.lead_type_id, "leadTypeId")?;
            let source_id = required(input.source_id, "sourceId")?;
            let lead_type = found(self.repos.directory.find_lead_type(&mut *tx, lead_type_id).await?, "LeadType")?;
            found(self.repos.directory.find_source(&mut *tx, source_id).await?, "Source")?;
            (lead_type, source_id)
        };

        // 4. Fan-out
        let routing = TransferSnapshot {
            pipeline_id,
            branch_id: input.branch_id,
            product_stage_id: stage.id,
            product_id: product.id,
        };
        let users = self.repos.users.list_active(&mut *tx).await?;
        let selected: Vec<Uuid> = self
            .stakeholders(actor.id, &routing, lead_type.name == MARKETING_LEAD_TYPE, &users)
            .into_iter()
            .collect();

        let lead = self
            .repos
            .leads
            .create(
                &mut *tx,
                &NewLead {
                    client_id: client.id,
                    created_by: actor.id,
                    selected_users: &selected,
                    routing: &routing,
                    lead_type_id: lead_type.id,
                    source_id,
                    company_name: input.company_name.as_deref(),
                    description: input.description.as_deref(),
                },
            )
            .await?;

        if let Some(entry) = phonebook_entry {
            let copied = self.repos.leads.copy_phonebook_comments(&mut *tx, lead.id, entry.id).await?;
            self.repos.phonebook.mark_converted(&mut *tx, entry.id, lead.id).await?;
            tracing::info!("📞 Número {} convertido em lead ({} comentários copiados)", phone, copied);
        }

        let remark = format!("New lead for {} created by {}", client_label(&client), actor.name);
        let notifications = journal::record(
            &self.repos.activity,
            &mut tx,
            actor,
            &users,
            JournalEntry {
                target: EntityRef::lead(lead.id),
                log_type: LEAD_CREATED_LOG,
                remark: &remark,
                selected: &lead.selected_users,
                audience: Audience::Everyone,
            },
        )
        .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;

        tracing::info!("✅ Lead {} criado por {}", lead.id, actor.id);
        Ok(lead)
    }

    async fn resolve_client(
        &self,
        conn: &mut PgConnection,
        phone: &str,
        w_phone: Option<&str>,
        input: &CreateLeadInput,
    ) -> Result<Client, AppError> {
        if let Some(client) = self.repos.clients.find_by_phone(&mut *conn, phone).await? {
            return Ok(client);
        }

        let e_id = input.client_e_id.as_deref().map(str::trim).filter(|e| !e.is_empty());
        if let Some(e_id) = e_id {
            if let Some(client) = self.repos.clients.find_by_e_id(&mut *conn, e_id).await? {
                return Ok(client);
            }
        }

        self.repos
            .clients
            .create(
                &mut *conn,
                phone,
                w_phone,
                e_id,
                input.client_name.as_deref(),
                input.client_email.as_deref(),
            )
            .await
    }

    // -------------------------------------------------------------------------
    //  REJECT / RESTORE
    // -------------------------------------------------------------------------

    pub async fn reject(&self, actor: &User, lead_id: Uuid, reason: Option<&str>) -> Result<Lead, AppError> {
        let reason = require_reason(reason)?;

        let mut tx = self.pool.begin().await?;
        let lead = found(self.repos.leads.find_for_update(&mut *tx, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;
        ensure_open(&lead)?;

        let lead = self.repos.leads.reject(&mut *tx, lead.id, &reason, actor.id).await?;

        let users = self.repos.users.list_active(&mut *tx).await?;
        let remark = format!("Lead rejected by {}: {}", actor.name, reason);
        let notifications = journal::record(
            &self.repos.activity,
            &mut tx,
            actor,
            &users,
            JournalEntry {
                target: EntityRef::lead(lead.id),
                log_type: "Reject Lead",
                remark: &remark,
                selected: &lead.selected_users,
                audience: Audience::Excluding(LEAD_REJECT_SILENCED),
            },
        )
        .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(lead)
    }

    pub async fn restore(&self, actor: &User, lead_id: Uuid, target: RoutingInput) -> Result<Lead, AppError> {
        let branch_id = required(target.branch_id, "branch")?;
        let pipeline_id = required(target.pipeline_id, "pipeline")?;
        let product_id = required(target.product_id, "products")?;
        let product_stage_id = required(target.product_stage_id, "product_stage")?;

        let mut tx = self.pool.begin().await?;

        found(self.repos.directory.find_branch(&mut *tx, branch_id).await?, "Branch")?;
        found(self.repos.directory.find_pipeline(&mut *tx, pipeline_id).await?, "Pipeline")?;
        found(self.repos.directory.find_product(&mut *tx, product_id).await?, "Product")?;
        let stage = found(
            self.repos.directory.find_product_stage(&mut *tx, product_stage_id).await?,
            "ProductStage",
        )?;
        if stage.product_id != product_id {
            return Err(AppError::InvalidField("product_stage"));
        }

        let lead = found(self.repos.leads.find_for_update(&mut *tx, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;
        ensure_open(&lead)?;
        if !lead.is_reject {
            return Err(AppError::LeadNotRejected);
        }

        let routing = TransferSnapshot { pipeline_id, branch_id, product_stage_id, product_id };
        let users = self.repos.users.list_active(&mut *tx).await?;

        // Só recalcula quando produto ou pipeline mudam, preservando quem já estava
        let selected = if routing.product_id != lead.product_id || routing.pipeline_id != lead.pipeline_id {
            let is_marketing = self.is_marketing(&mut tx, lead.lead_type_id).await?;
            let fresh = self.stakeholders(lead.created_by, &routing, is_marketing, &users);
            merge_users(&lead.selected_users, fresh)
        } else {
            lead.selected_users.clone()
        };

        let lead = self.repos.leads.restore(&mut *tx, lead.id, &routing, &selected).await?;

        let remark = format!("Lead restored by {}", actor.name);
        let notifications = self
            .journal(&mut tx, actor, EntityRef::lead(lead.id), &lead.selected_users, &users, "Restore Lead", &remark)
            .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(lead)
    }

    // -------------------------------------------------------------------------
    //  TRANSFER / MOVE
    // -------------------------------------------------------------------------

    pub async fn transfer(&self, actor: &User, lead_id: Uuid, target: RoutingInput) -> Result<Lead, AppError> {
        let pipeline_id = required(target.pipeline_id, "pipeline")?;
        let branch_id = required(target.branch_id, "branch")?;
        let product_id = required(target.product_id, "products")?;

        let mut tx = self.pool.begin().await?;
        let lead = found(self.repos.leads.find_for_update(&mut *tx, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;
        ensure_open(&lead)?;
        check_transfer(&lead, product_id)?;

        found(self.repos.directory.find_pipeline(&mut *tx, pipeline_id).await?, "Pipeline")?;
        found(self.repos.directory.find_branch(&mut *tx, branch_id).await?, "Branch")?;
        found(self.repos.directory.find_product(&mut *tx, product_id).await?, "Product")?;

        let stage = self
            .repos
            .directory
            .find_product_stage_by_order(&mut *tx, product_id, TRANSFER_STAGE_ORDER)
            .await?
            .ok_or(AppError::StageMissing("product stage (order 1)"))?;

        let previous = lead.routing();
        let routing = TransferSnapshot { pipeline_id, branch_id, product_stage_id: stage.id, product_id };

        let users = self.repos.users.list_active(&mut *tx).await?;
        let is_marketing = self.is_marketing(&mut tx, lead.lead_type_id).await?;
        let fresh: Vec<Uuid> = self.stakeholders(actor.id, &routing, is_marketing, &users).into_iter().collect();
        // O criador original continua acompanhando o lead
        let selected = merge_users(&fresh, [lead.created_by]);

        let before = self.describe(&mut tx, &previous).await?;
        let after = self.describe(&mut tx, &routing).await?;

        let lead = self
            .repos
            .leads
            .transfer(&mut *tx, lead.id, &routing, &previous, actor.id, &selected)
            .await?;

        let remark = routing_diff_remark(&before, &after);
        let notifications = self
            .journal(&mut tx, actor, EntityRef::lead(lead.id), &lead.selected_users, &users, "Transfer Lead", &remark)
            .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(lead)
    }

    pub async fn move_lead(&self, actor: &User, lead_id: Uuid, target: RoutingInput) -> Result<Lead, AppError> {
        let pipeline_id = required(target.pipeline_id, "pipeline")?;
        let branch_id = required(target.branch_id, "branch")?;
        let product_id = required(target.product_id, "products")?;

        let mut tx = self.pool.begin().await?;
        let lead = found(self.repos.leads.find_for_update(&mut *tx, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;
        ensure_open(&lead)?;
        check_move(&lead, pipeline_id)?;

        found(self.repos.directory.find_pipeline(&mut *tx, pipeline_id).await?, "Pipeline")?;
        found(self.repos.directory.find_branch(&mut *tx, branch_id).await?, "Branch")?;
        found(self.repos.directory.find_product(&mut *tx, product_id).await?, "Product")?;

        let stage = self
            .repos
            .directory
            .find_product_stage_by_order(&mut *tx, product_id, MOVE_STAGE_ORDER)
            .await?
            .ok_or(AppError::StageMissing("product stage (order 0)"))?;

        let previous = lead.routing();
        let routing = TransferSnapshot { pipeline_id, branch_id, product_stage_id: stage.id, product_id };

        let users = self.repos.users.list_active(&mut *tx).await?;
        let is_marketing = self.is_marketing(&mut tx, lead.lead_type_id).await?;
        let fresh: Vec<Uuid> = self
            .stakeholders(lead.created_by, &routing, is_marketing, &users)
            .into_iter()
            .collect();
        let selected = merge_users(&fresh, [actor.id]);

        let before = self.describe(&mut tx, &previous).await?;
        let after = self.describe(&mut tx, &routing).await?;

        let lead = self.repos.leads.move_to(&mut *tx, lead.id, &routing, &selected).await?;

        let remark = routing_diff_remark(&before, &after);
        let notifications = self
            .journal(&mut tx, actor, EntityRef::lead(lead.id), &lead.selected_users, &users, "Move Lead", &remark)
            .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(lead)
    }

    // -------------------------------------------------------------------------
    //  CONVERT
    // -------------------------------------------------------------------------

    pub async fn convert(
        &self,
        actor: &User,
        lead_id: Uuid,
        figures: CommissionFigures,
    ) -> Result<Contract, AppError> {
        let mut tx = self.pool.begin().await?;

        let lead = found(self.repos.leads.find_for_update(&mut *tx, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;
        ensure_not_converted(&lead)?;

        let commission = self.repos.commissions.create(&mut *tx, &figures).await?;

        let stage = self
            .repos
            .directory
            .find_contract_stage_by_order(&mut *tx, 0)
            .await?
            .ok_or(AppError::StageMissing("contract stage (order 0)"))?;

        let accountants = self.repos.users.list_ids_by_roles(&mut *tx, &[Role::Accountant]).await?;
        let selected = merge_users(&lead.selected_users, accountants);

        let contract = self
            .repos
            .contracts
            .create_from_lead(&mut *tx, &lead, actor.id, stage.id, &selected, commission.id)
            .await?;

        self.repos.commissions.attach_contract(&mut *tx, commission.id, contract.id).await?;
        self.repos.leads.mark_converted(&mut *tx, lead.id).await?;

        let remark = format!("Lead converted to contract by {}", actor.name);
        self.repos
            .activity
            .insert_log(&mut *tx, EntityRef::lead(lead.id), actor.id, "Lead Conversion", &remark)
            .await?;

        let users = self.repos.users.list_active(&mut *tx).await?;
        let notifications = self
            .journal(
                &mut tx,
                actor,
                EntityRef::contract(contract.id),
                &contract.selected_users,
                &users,
                "Contract Created",
                &remark,
            )
            .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;

        tracing::info!("📄 Lead {} convertido no contrato {}", lead.id, contract.id);
        Ok(contract)
    }

    // -------------------------------------------------------------------------
    //  USUÁRIOS, DISCUSSÕES, ARQUIVOS, LABELS
    // -------------------------------------------------------------------------

    pub async fn add_user(&self, actor: &User, lead_id: Uuid, user_id: Uuid) -> Result<Lead, AppError> {
        let mut tx = self.pool.begin().await?;
        let lead = found(self.repos.leads.find_for_update(&mut *tx, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;

        if !self.repos.users.exists(&mut *tx, user_id).await? {
            return Err(AppError::NotFound("User"));
        }

        let selected = merge_users(&lead.selected_users, [user_id]);
        let lead = self.repos.leads.set_selected_users(&mut *tx, lead.id, &selected).await?;
        let target = self.sync_converted_users(&mut tx, &lead, &[]).await?;

        let users = self.repos.users.list_active(&mut *tx).await?;
        let added = users.iter().find(|u| u.id == user_id).map(|u| u.name.as_str()).unwrap_or("user");
        let remark = format!("{} added {} to the lead", actor.name, added);
        let notifications = self
            .journal(&mut tx, actor, target, &lead.selected_users, &users, "Add User", &remark)
            .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(lead)
    }

    pub async fn remove_user(&self, actor: &User, lead_id: Uuid, user_id: Uuid) -> Result<Lead, AppError> {
        let mut tx = self.pool.begin().await?;
        let lead = found(self.repos.leads.find_for_update(&mut *tx, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;

        if !lead.selected_users.contains(&user_id) {
            return Err(AppError::NotFound("User"));
        }

        let selected: Vec<Uuid> = lead.selected_users.iter().copied().filter(|id| *id != user_id).collect();
        let users = self.repos.users.list_active(&mut *tx).await?;
        let removed = users.iter().find(|u| u.id == user_id).map(|u| u.name.clone()).unwrap_or_default();

        let lead = self.repos.leads.set_selected_users(&mut *tx, lead.id, &selected).await?;
        let target = self.sync_converted_users(&mut tx, &lead, &[user_id]).await?;

        // O removido também é avisado
        let audience = merge_users(&lead.selected_users, [user_id]);
        let remark = format!("{} removed {} from the lead", actor.name, removed);
        let notifications = self
            .journal(&mut tx, actor, target, &audience, &users, "Remove User", &remark)
            .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(lead)
    }

    pub async fn add_discussion(
        &self,
        actor: &User,
        lead_id: Uuid,
        comment: &str,
    ) -> Result<LeadDiscussion, AppError> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(AppError::MissingField("comment"));
        }

        let mut tx = self.pool.begin().await?;
        let lead = found(self.repos.leads.find(&mut *tx, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;

        let discussion = self.repos.leads.add_discussion(&mut *tx, lead.id, actor.id, comment).await?;
        let target = self.log_target(&mut tx, &lead).await?;
        let users = self.repos.users.list_active(&mut *tx).await?;
        let remark = format!("{} commented: {}", actor.name, comment);
        let notifications = self
            .journal(&mut tx, actor, target, &lead.selected_users, &users, "Discussion", &remark)
            .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(discussion)
    }

    pub async fn add_file(
        &self,
        actor: &User,
        lead_id: Uuid,
        file_name: &str,
        file_url: &str,
    ) -> Result<LeadFile, AppError> {
        let mut tx = self.pool.begin().await?;
        let lead = found(self.repos.leads.find(&mut *tx, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;

        let file = self.repos.leads.add_file(&mut *tx, lead.id, actor.id, file_name, file_url).await?;
        let target = self.log_target(&mut tx, &lead).await?;
        let users = self.repos.users.list_active(&mut *tx).await?;
        let remark = format!("{} uploaded {}", actor.name, file_name);
        let notifications = self
            .journal(&mut tx, actor, target, &lead.selected_users, &users, "File Upload", &remark)
            .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(file)
    }

    pub async fn delete_file(&self, actor: &User, lead_id: Uuid, file_id: Uuid) -> Result<LeadFile, AppError> {
        let mut tx = self.pool.begin().await?;
        let lead = found(self.repos.leads.find(&mut *tx, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;

        let file = found(self.repos.leads.delete_file(&mut *tx, lead.id, file_id).await?, "File")?;
        let target = self.log_target(&mut tx, &lead).await?;
        let users = self.repos.users.list_active(&mut *tx).await?;
        let remark = format!("{} deleted {}", actor.name, file.file_name);
        let notifications = self
            .journal(&mut tx, actor, target, &lead.selected_users, &users, "File Delete", &remark)
            .await?;

        tx.commit().await?;
        self.notifier.deliver(&notifications).await;
        Ok(file)
    }

    pub async fn set_labels(&self, actor: &User, lead_id: Uuid, labels: Vec<String>) -> Result<Lead, AppError> {
        let labels: Vec<String> = labels
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut tx = self.pool.begin().await?;
        let lead = found(self.repos.leads.find_for_update(&mut *tx, lead_id).await?, "Lead")?;
        ensure_selected(&lead.selected_users, actor)?;

        let lead = self.repos.leads.set_labels(&mut *tx, lead.id, &labels).await?;
        self.repos
            .activity
            .insert_log(
                &mut *tx,
                EntityRef::lead(lead.id),
                actor.id,
                "Labels Updated",
                &format!("Labels set to [{}]", labels.join(", ")),
            )
            .await?;

        tx.commit().await?;
        Ok(lead)
    }

    // -------------------------------------------------------------------------
    //  AUXILIARES
    // -------------------------------------------------------------------------

    fn stakeholders(
        &self,
        creator: Uuid,
        routing: &TransferSnapshot,
        is_marketing: bool,
        users: &[User],
    ) -> BTreeSet<Uuid> {
        routing_members(creator, routing, is_marketing, users, &self.rules)
    }

    async fn is_marketing(&self, conn: &mut PgConnection, lead_type_id: Uuid) -> Result<bool, AppError> {
        let lead_type = self.repos.directory.find_lead_type(&mut *conn, lead_type_id).await?;
        Ok(lead_type.is_some_and(|t| t.name == MARKETING_LEAD_TYPE))
    }

    async fn describe(&self, conn: &mut PgConnection, routing: &TransferSnapshot) -> Result<RoutingNames, AppError> {
        let pipeline = self.repos.directory.find_pipeline(&mut *conn, routing.pipeline_id).await?;
        let branch = self.repos.directory.find_branch(&mut *conn, routing.branch_id).await?;
        let stage = self.repos.directory.find_product_stage(&mut *conn, routing.product_stage_id).await?;
        let product = self.repos.directory.find_product(&mut *conn, routing.product_id).await?;

        Ok(RoutingNames {
            pipeline: pipeline.map(|p| p.name).unwrap_or_default(),
            branch: branch.map(|b| b.name).unwrap_or_default(),
            product_stage: stage.map(|s| s.name).unwrap_or_default(),
            product: product.map(|p| p.name).unwrap_or_default(),
        })
    }

    /// Onde registrar ações num lead: no próprio lead, no contrato ou no deal.
    async fn log_target(&self, conn: &mut PgConnection, lead: &Lead) -> Result<EntityRef, AppError> {
        if !lead.is_converted {
            return Ok(EntityRef::lead(lead.id));
        }

        let Some(contract) = self.repos.contracts.find_by_lead(&mut *conn, lead.id).await? else {
            return Ok(EntityRef::lead(lead.id));
        };
        if !contract.is_converted {
            return Ok(EntityRef::contract(contract.id));
        }

        match self.repos.deals.find_by_contract(&mut *conn, contract.id).await? {
            Some(deal) => Ok(EntityRef::deal(deal.id)),
            None => Ok(EntityRef::contract(contract.id)),
        }
    }

    /// Replica os usuários do lead no contrato/deal já existente; `removed` sai de lá também.
    async fn sync_converted_users(
        &self,
        conn: &mut PgConnection,
        lead: &Lead,
        removed: &[Uuid],
    ) -> Result<EntityRef, AppError> {
        let target = self.log_target(&mut *conn, lead).await?;
        match target.kind {
            EntityKind::Contract => {
                let contract = found(self.repos.contracts.find(&mut *conn, target.id).await?, "Contract")?;
                let selected = sync_membership(&contract.selected_users, &lead.selected_users, removed);
                self.repos.contracts.set_selected_users(&mut *conn, contract.id, &selected).await?;
            }
            EntityKind::Deal => {
                let deal = found(self.repos.deals.find(&mut *conn, target.id).await?, "Deal")?;
                let selected = sync_membership(&deal.selected_users, &lead.selected_users, removed);
                self.repos.deals.set_selected_users(&mut *conn, deal.id, &selected).await?;
            }
            EntityKind::Lead => {}
        }
        Ok(target)
    }

    #[allow(clippy::too_many_arguments)]
    async fn journal(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        target: EntityRef,
        selected: &[Uuid],
        users: &[User],
        log_type: &str,
        remark: &str,
    ) -> Result<Vec<Notification>, AppError> {
        let entry = JournalEntry { target, log_type, remark, selected, audience: Audience::Everyone };
        journal::record(&self.repos.activity, conn, actor, users, entry).await
    }
}

/// Membros do contrato/deal depois de mudar o lead: mantém quem não veio do lead
/// (ex.: contadores), espelha o resto e tira quem saiu do lead.
fn sync_membership(current: &[Uuid], lead_users: &[Uuid], removed: &[Uuid]) -> Vec<Uuid> {
    merge_users(lead_users, current.iter().copied())
        .into_iter()
        .filter(|id| !removed.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn actor(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Omar".into(),
            email: "omar@crm.ae".into(),
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

    fn lead(selected: Vec<Uuid>) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            ref_created_by: None,
            selected_users: selected,
            pipeline_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            product_stage_id: Uuid::new_v4(),
            lead_type_id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            company_name: None,
            description: None,
            is_active: true,
            is_converted: false,
            is_reject: false,
            is_transfer: false,
            is_move: false,
            reject_reason: None,
            rejected_by: None,
            transfer_from: None,
            labels: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn names(pipeline: &str, branch: &str, stage: &str, product: &str) -> RoutingNames {
        RoutingNames {
            pipeline: pipeline.into(),
            branch: branch.into(),
            product_stage: stage.into(),
            product: product.into(),
        }
    }

    #[test]
    fn reject_reason_is_required_and_trimmed() {
        assert!(matches!(require_reason(None), Err(AppError::MissingField("reject_reason"))));
        assert!(matches!(require_reason(Some("   ")), Err(AppError::MissingField(_))));
        assert_eq!(require_reason(Some("  not reachable ")).unwrap(), "not reachable");
    }

    #[test]
    fn only_selected_users_may_act() {
        let a = actor(Role::SalesAgent);
        let l = lead(vec![Uuid::new_v4()]);
        assert!(matches!(ensure_selected(&l.selected_users, &a), Err(AppError::NotSelectedUser)));

        let l = lead(vec![a.id]);
        assert!(ensure_selected(&l.selected_users, &a).is_ok());
    }

    #[test]
    fn second_conversion_is_refused() {
        let mut l = lead(vec![]);
        assert!(ensure_not_converted(&l).is_ok());

        l.is_converted = true;
        let err = ensure_not_converted(&l).unwrap_err();
        assert!(matches!(err, AppError::LeadAlreadyConverted));
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn new_lead_includes_creator_and_top_roles() {
        let creator = actor(Role::SalesAgent);
        let ceo = actor(Role::Ceo);
        let md = actor(Role::Md);
        let admin = actor(Role::Admin);
        let outsider = actor(Role::SalesAgent);
        let roster = vec![creator.clone(), ceo.clone(), md.clone(), admin.clone(), outsider.clone()];

        let routing = TransferSnapshot {
            pipeline_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            product_stage_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
        };
        let members = routing_members(creator.id, &routing, false, &roster, &StakeholderRules::default());

        for id in [creator.id, ceo.id, md.id, admin.id] {
            assert!(members.contains(&id));
        }
        assert!(!members.contains(&outsider.id));
        assert_eq!(LEAD_CREATED_LOG, "Lead Created");
    }

    #[test]
    fn converted_leads_are_locked() {
        let mut l = lead(Vec::new());
        assert!(ensure_open(&l).is_ok());
        l.is_converted = true;
        assert!(matches!(ensure_open(&l), Err(AppError::LeadLocked)));
    }

    #[test]
    fn transfer_requires_a_different_product() {
        let l = lead(Vec::new());
        assert!(matches!(check_transfer(&l, l.product_id), Err(AppError::SameProductTransfer)));
        assert!(check_transfer(&l, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn move_requires_a_different_pipeline() {
        let l = lead(Vec::new());
        assert!(matches!(check_move(&l, l.pipeline_id), Err(AppError::SamePipelineMove)));
        assert!(check_move(&l, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn remark_lists_only_changed_fields() {
        let before = names("Loans", "Dubai", "New", "Mortgage");
        let after = names("Loans", "Abu Dhabi", "Documents", "Car Loan");

        let remark = routing_diff_remark(&before, &after);
        assert_eq!(
            remark,
            "Branch: Dubai → Abu Dhabi, Product Stage: New → Documents, Product: Mortgage → Car Loan"
        );
    }

    #[test]
    fn remark_without_changes() {
        let same = names("Loans", "Dubai", "New", "Mortgage");
        assert_eq!(routing_diff_remark(&same, &same), "No routing changes");
    }

    #[test]
    fn membership_sync_keeps_non_lead_members() {
        let agent = Uuid::new_v4();
        let accountant = Uuid::new_v4();
        let added = Uuid::new_v4();

        let synced = sync_membership(&[agent, accountant], &[agent, added], &[]);
        assert_eq!(synced, vec![agent, added, accountant]);
    }

    #[test]
    fn user_removed_from_lead_leaves_the_contract() {
        let agent = Uuid::new_v4();
        let removed = Uuid::new_v4();
        let accountant = Uuid::new_v4();

        let synced = sync_membership(&[agent, removed, accountant], &[agent], &[removed]);
        assert_eq!(synced, vec![agent, accountant]);
    }

    #[test]
    fn transfer_lands_after_the_first_stage() {
        assert_eq!(TRANSFER_STAGE_ORDER, 1);
        assert_eq!(MOVE_STAGE_ORDER, 0);
    }
}
