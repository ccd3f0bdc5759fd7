// src/handlers/leads.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    db::lead_repo::LeadFilter,
    handlers::commissions::CommissionFiguresPayload,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{
            PermConvertLead, PermCreateLead, PermLeadDiscussion, PermLeadFiles, PermManageLeadUsers,
            PermMoveLead, PermRejectLead, PermRestoreLead, PermTransferLead, RequirePermission,
        },
    },
    models::{
        contract::Contract,
        lead::{Lead, LeadDetail, LeadDiscussion, LeadFile},
        whatsapp::WhatsappMessage,
    },
    services::lead_service::{CreateLeadInput, RoutingInput},
};

// =============================================================================
//  ÁREA 1: CRIAÇÃO E LEITURA
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "0501234567")]
    pub client_phone: String,
    pub client_w_phone: Option<String>,
    #[schema(example = "784-1990-1234567-1")]
    pub client_e_id: Option<String>,
    #[schema(example = "Omar Haddad")]
    pub client_name: Option<String>,
    #[validate(email(message = "invalid_email"))]
    pub client_email: Option<String>,
    pub company_name: Option<String>,
    pub description: Option<String>,

    /// Quando ausente, usa o pipeline do produto.
    pub pipeline_id: Option<Uuid>,
    pub branch_id: Uuid,
    pub product_id: Uuid,
    pub product_stage_id: Uuid,
    pub lead_type_id: Option<Uuid>,
    pub source_id: Option<Uuid>,
}

impl From<CreateLeadPayload> for CreateLeadInput {
    fn from(p: CreateLeadPayload) -> Self {
        CreateLeadInput {
            client_phone: p.client_phone,
            client_w_phone: p.client_w_phone,
            client_e_id: p.client_e_id,
            client_name: p.client_name,
            client_email: p.client_email,
            company_name: p.company_name,
            description: p.description,
            pipeline_id: p.pipeline_id,
            branch_id: p.branch_id,
            product_id: p.product_id,
            product_stage_id: p.product_stage_id,
            lead_type_id: p.lead_type_id,
            source_id: p.source_id,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LeadListQuery {
    pub pipeline_id: Option<Uuid>,
    pub is_reject: Option<bool>,
    pub is_converted: Option<bool>,
}

#[utoipa::path(
    post,
    path = "/api/leads",
    tag = "Leads",
    request_body = CreateLeadPayload,
    responses(
        (status = 201, description = "Lead criado", body = Lead),
        (status = 400, description = "Dados inválidos ou lead duplicado"),
        (status = 404, description = "Referência inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermCreateLead>,
    Json(payload): Json<CreateLeadPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let lead = app_state
        .lead_service
        .create(&user, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(lead)))
}

#[utoipa::path(
    get,
    path = "/api/leads",
    tag = "Leads",
    params(LeadListQuery),
    responses((status = 200, description = "Leads em que o usuário está selecionado", body = Vec<Lead>)),
    security(("api_jwt" = []))
)]
pub async fn list_leads(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<LeadListQuery>,
) -> Result<Json<Vec<Lead>>, ApiError> {
    let filter = LeadFilter {
        pipeline_id: query.pipeline_id,
        is_reject: query.is_reject,
        is_converted: query.is_converted,
    };

    let leads = app_state
        .lead_service
        .list(&user, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(leads))
}

#[utoipa::path(
    get,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Lead com discussões, arquivos e histórico", body = LeadDetail),
        (status = 403, description = "Usuário não selecionado no lead")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadDetail>, ApiError> {
    let detail = app_state
        .lead_service
        .detail(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(detail))
}

// =============================================================================
//  ÁREA 2: TRANSIÇÕES
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectPayload {
    #[schema(example = "Client not reachable")]
    pub reject_reason: Option<String>,
}

/// Destino de restore, transfer e move. Cada operação exige os seus campos.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutingPayload {
    pub pipeline_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub product_stage_id: Option<Uuid>,
}

impl From<RoutingPayload> for RoutingInput {
    fn from(p: RoutingPayload) -> Self {
        RoutingInput {
            pipeline_id: p.pipeline_id,
            branch_id: p.branch_id,
            product_id: p.product_id,
            product_stage_id: p.product_stage_id,
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/leads/{id}/reject",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Lead rejeitado", body = Lead),
        (status = 400, description = "Motivo ausente")
    ),
    security(("api_jwt" = []))
)]
pub async fn reject_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermRejectLead>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectPayload>,
) -> Result<Json<Lead>, ApiError> {
    let lead = app_state
        .lead_service
        .reject(&user, id, payload.reject_reason.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(lead))
}

#[utoipa::path(
    put,
    path = "/api/leads/{id}/restore",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = RoutingPayload,
    responses(
        (status = 200, description = "Lead restaurado", body = Lead),
        (status = 400, description = "Destino incompleto ou lead não rejeitado")
    ),
    security(("api_jwt" = []))
)]
pub async fn restore_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermRestoreLead>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RoutingPayload>,
) -> Result<Json<Lead>, ApiError> {
    let lead = app_state
        .lead_service
        .restore(&user, id, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(lead))
}

#[utoipa::path(
    put,
    path = "/api/leads/{id}/transfer",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = RoutingPayload,
    responses(
        (status = 200, description = "Lead transferido para outro produto", body = Lead),
        (status = 400, description = "Mesmo produto")
    ),
    security(("api_jwt" = []))
)]
pub async fn transfer_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermTransferLead>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RoutingPayload>,
) -> Result<Json<Lead>, ApiError> {
    let lead = app_state
        .lead_service
        .transfer(&user, id, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(lead))
}

#[utoipa::path(
    put,
    path = "/api/leads/{id}/move",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = RoutingPayload,
    responses(
        (status = 200, description = "Lead movido para outro pipeline", body = Lead),
        (status = 400, description = "Mesmo pipeline")
    ),
    security(("api_jwt" = []))
)]
pub async fn move_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermMoveLead>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RoutingPayload>,
) -> Result<Json<Lead>, ApiError> {
    let lead = app_state
        .lead_service
        .move_lead(&user, id, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(lead))
}

#[utoipa::path(
    post,
    path = "/api/leads/{id}/convert",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = CommissionFiguresPayload,
    responses(
        (status = 201, description = "Contrato criado a partir do lead", body = Contract),
        (status = 400, description = "Lead já convertido")
    ),
    security(("api_jwt" = []))
)]
pub async fn convert_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermConvertLead>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommissionFiguresPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let contract = app_state
        .lead_service
        .convert(&user, id, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(contract)))
}

// =============================================================================
//  ÁREA 3: USUÁRIOS, DISCUSSÕES, ARQUIVOS E LABELS
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadUserPayload {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Client asked for a call back on Monday")]
    pub comment: String,
}

/// Metadados do arquivo já enviado ao storage.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadFilePayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "passport.pdf")]
    pub file_name: String,
    #[validate(url(message = "invalid_url"))]
    #[schema(example = "https://files.crm.ae/leads/passport.pdf")]
    pub file_url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelsPayload {
    #[schema(example = json!(["hot", "vip"]))]
    pub labels: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/api/leads/{id}/users",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = LeadUserPayload,
    responses((status = 200, description = "Usuário adicionado", body = Lead)),
    security(("api_jwt" = []))
)]
pub async fn add_lead_user(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermManageLeadUsers>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LeadUserPayload>,
) -> Result<Json<Lead>, ApiError> {
    let lead = app_state
        .lead_service
        .add_user(&user, id, payload.user_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(lead))
}

#[utoipa::path(
    delete,
    path = "/api/leads/{id}/users/{user_id}",
    tag = "Leads",
    params(
        ("id" = Uuid, Path, description = "ID do lead"),
        ("user_id" = Uuid, Path, description = "Usuário a remover")
    ),
    responses((status = 200, description = "Usuário removido", body = Lead)),
    security(("api_jwt" = []))
)]
pub async fn remove_lead_user(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermManageLeadUsers>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Lead>, ApiError> {
    let lead = app_state
        .lead_service
        .remove_user(&user, id, user_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(lead))
}

#[utoipa::path(
    post,
    path = "/api/leads/{id}/discussions",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = DiscussionPayload,
    responses((status = 201, description = "Comentário adicionado", body = LeadDiscussion)),
    security(("api_jwt" = []))
)]
pub async fn add_discussion(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermLeadDiscussion>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DiscussionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let discussion = app_state
        .lead_service
        .add_discussion(&user, id, &payload.comment)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(discussion)))
}

#[utoipa::path(
    post,
    path = "/api/leads/{id}/files",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = LeadFilePayload,
    responses((status = 201, description = "Arquivo vinculado ao lead", body = LeadFile)),
    security(("api_jwt" = []))
)]
pub async fn add_file(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermLeadFiles>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LeadFilePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let file = app_state
        .lead_service
        .add_file(&user, id, &payload.file_name, &payload.file_url)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(file)))
}

#[utoipa::path(
    delete,
    path = "/api/leads/{id}/files/{file_id}",
    tag = "Leads",
    params(
        ("id" = Uuid, Path, description = "ID do lead"),
        ("file_id" = Uuid, Path, description = "ID do arquivo")
    ),
    responses((status = 200, description = "Arquivo removido", body = LeadFile)),
    security(("api_jwt" = []))
)]
pub async fn delete_file(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermLeadFiles>,
    Path((id, file_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<LeadFile>, ApiError> {
    let file = app_state
        .lead_service
        .delete_file(&user, id, file_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(file))
}

#[utoipa::path(
    patch,
    path = "/api/leads/{id}/labels",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = LabelsPayload,
    responses((status = 200, description = "Labels substituídas", body = Lead)),
    security(("api_jwt" = []))
)]
pub async fn set_labels(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<LabelsPayload>,
) -> Result<Json<Lead>, ApiError> {
    let lead = app_state
        .lead_service
        .set_labels(&user, id, payload.labels)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(lead))
}

#[utoipa::path(
    get,
    path = "/api/leads/{id}/whatsapp",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses((status = 200, description = "Mensagens de WhatsApp vinculadas ao lead", body = Vec<WhatsappMessage>)),
    security(("api_jwt" = []))
)]
pub async fn list_whatsapp(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<WhatsappMessage>>, ApiError> {
    let messages = app_state
        .whatsapp_service
        .list_for_lead(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(messages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_payload_requires_a_phone() {
        let payload: CreateLeadPayload = serde_json::from_value(serde_json::json!({
            "clientPhone": "",
            "branchId": Uuid::new_v4(),
            "productId": Uuid::new_v4(),
            "productStageId": Uuid::new_v4(),
        }))
        .unwrap();

        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("client_phone"));
    }

    #[test]
    fn create_payload_rejects_a_bad_email() {
        let payload: CreateLeadPayload = serde_json::from_value(serde_json::json!({
            "clientPhone": "0501234567",
            "clientEmail": "not-an-email",
            "branchId": Uuid::new_v4(),
            "productId": Uuid::new_v4(),
            "productStageId": Uuid::new_v4(),
        }))
        .unwrap();

        assert!(payload.validate().unwrap_err().field_errors().contains_key("client_email"));
    }

    #[test]
    fn routing_payload_keeps_missing_fields_empty() {
        let payload: RoutingPayload = serde_json::from_str(r#"{"productId":"550e8400-e29b-41d4-a716-446655440000"}"#).unwrap();
        let input = RoutingInput::from(payload);
        assert!(input.product_id.is_some());
        assert!(input.pipeline_id.is_none() && input.branch_id.is_none());
    }
}
