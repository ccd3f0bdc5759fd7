// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::get_me,
        handlers::auth::get_my_permissions,

        // --- Directory ---
        handlers::directory::list_products,
        handlers::directory::list_product_stages,
        handlers::directory::list_pipelines,
        handlers::directory::list_branches,
        handlers::directory::list_lead_types,
        handlers::directory::list_sources,
        handlers::directory::list_deal_stages,
        handlers::directory::list_contract_stages,

        // --- Leads ---
        handlers::leads::create_lead,
        handlers::leads::list_leads,
        handlers::leads::get_lead,
        handlers::leads::reject_lead,
        handlers::leads::restore_lead,
        handlers::leads::transfer_lead,
        handlers::leads::move_lead,
        handlers::leads::convert_lead,
        handlers::leads::add_lead_user,
        handlers::leads::remove_lead_user,
        handlers::leads::add_discussion,
        handlers::leads::add_file,
        handlers::leads::delete_file,
        handlers::leads::set_labels,
        handlers::leads::list_whatsapp,

        // --- Contracts ---
        handlers::contracts::list_contracts,
        handlers::contracts::get_contract,
        handlers::contracts::update_stage,
        handlers::contracts::reject_contract,
        handlers::contracts::restore_contract,
        handlers::contracts::convert_contract,
        handlers::contracts::update_commission,

        // --- Deals ---
        handlers::deals::list_deals,
        handlers::deals::get_deal,
        handlers::deals::update_stage,
        handlers::deals::mark_collected,
        handlers::deals::reject_deal,
        handlers::deals::restore_deal,
        handlers::deals::toggle_report,
        handlers::deals::approve_report,

        // --- Commissions ---
        handlers::commissions::get_sheet,
        handlers::commissions::upsert_entry,
        handlers::commissions::remove_entry,
        handlers::commissions::create_payment,
        handlers::commissions::apply_payment,

        // --- Targets ---
        handlers::targets::create_target,
        handlers::targets::list_targets,

        // --- Phonebook ---
        handlers::phonebook::upload,
        handlers::phonebook::update_statuses,
        handlers::phonebook::update_dncr,
        handlers::phonebook::list_entries,
        handlers::phonebook::update_calstatus,
        handlers::phonebook::list_comments,
        handlers::phonebook::add_comment,
        handlers::phonebook::delete_entry,

        // --- Notifications ---
        handlers::notifications::list_notifications,
        handlers::notifications::mark_read,
        handlers::notifications::mark_all_read,
        handlers::notifications::stream,

        // --- WhatsApp ---
        handlers::whatsapp::webhook,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Directory ---
            models::directory::Branch,
            models::directory::Pipeline,
            models::directory::Product,
            models::directory::ProductStage,
            models::directory::LeadType,
            models::directory::Source,
            models::directory::DealStage,
            models::directory::ContractStage,

            // --- Clients / Phonebook ---
            models::client::BlockStatus,
            models::client::Client,
            models::phonebook::CallStatus,
            models::phonebook::PhonebookEntry,
            models::phonebook::PhonebookComment,
            models::phonebook::UploadReport,
            models::phonebook::StatusUpdateReport,

            // --- Lifecycle ---
            models::lead::TransferSnapshot,
            models::lead::Lead,
            models::lead::LeadDiscussion,
            models::lead::LeadFile,
            models::lead::LeadDetail,
            models::contract::Contract,
            models::contract::ContractDetail,
            models::deal::Deal,
            models::deal::DealDetail,

            // --- Ledger ---
            models::commission::ServiceCommission,
            models::commission::CommissionEntry,
            models::commission::CommissionSheet,
            models::commission::CommissionPayment,
            models::target::TargetOwnerKind,
            models::target::TargetStatus,
            models::target::TargetOwner,
            models::target::Target,

            // --- Activity ---
            models::activity::EntityKind,
            models::activity::EntityRef,
            models::activity::ActivityLog,
            models::activity::Notification,
            models::whatsapp::WhatsappMessage,

            // --- Payloads ---
            handlers::leads::CreateLeadPayload,
            handlers::leads::RejectPayload,
            handlers::leads::RoutingPayload,
            handlers::leads::LeadUserPayload,
            handlers::leads::DiscussionPayload,
            handlers::leads::LeadFilePayload,
            handlers::leads::LabelsPayload,
            handlers::contracts::ContractStagePayload,
            handlers::deals::DealStagePayload,
            handlers::commissions::CommissionFiguresPayload,
            handlers::commissions::CommissionEntryPayload,
            handlers::commissions::CreatePaymentPayload,
            handlers::commissions::ApplyPaymentPayload,
            handlers::targets::CreateTargetPayload,
            handlers::phonebook::UploadPhonebookPayload,
            handlers::phonebook::StatusCsvPayload,
            handlers::phonebook::CallStatusPayload,
            handlers::phonebook::PhonebookCommentPayload,
            handlers::notifications::MarkAllReadResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Login e perfil do usuário"),
        (name = "Directory", description = "Dados de referência (produtos, pipelines, etapas)"),
        (name = "Leads", description = "Ciclo de vida do lead"),
        (name = "Contracts", description = "Ciclo de vida do contrato"),
        (name = "Deals", description = "Ciclo de vida do deal até Collected"),
        (name = "Commissions", description = "Comissões por usuário e pagamentos"),
        (name = "Targets", description = "Metas financeiras de usuários e pipelines"),
        (name = "Phonebook", description = "Fila de ligações, blocklist e DNCR"),
        (name = "Notifications", description = "Notificações e push em tempo real"),
        (name = "WhatsApp", description = "Webhook de mensagens recebidas")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_lifecycle_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/leads/{id}/convert"));
        assert!(doc.paths.paths.contains_key("/api/deals/{id}/stage/collected"));
        assert!(doc.components.unwrap().security_schemes.contains_key("api_jwt"));
    }
}
