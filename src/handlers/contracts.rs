// src/handlers/contracts.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    handlers::{commissions::CommissionFiguresPayload, leads::RejectPayload},
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermConvertContract, PermManageCommission, PermRejectContract, PermUpdateContractStage, RequirePermission},
    },
    models::{
        commission::ServiceCommission,
        contract::{Contract, ContractDetail},
        deal::Deal,
    },
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractStagePayload {
    pub contract_stage_id: Uuid,
}

#[utoipa::path(
    get,
    path = "/api/contracts",
    tag = "Contracts",
    responses((status = 200, description = "Contratos em que o usuário está selecionado", body = Vec<Contract>)),
    security(("api_jwt" = []))
)]
pub async fn list_contracts(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Contract>>, ApiError> {
    let contracts = app_state
        .contract_service
        .list(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(contracts))
}

#[utoipa::path(
    get,
    path = "/api/contracts/{id}",
    tag = "Contracts",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    responses((status = 200, description = "Contrato com comissão e histórico", body = ContractDetail)),
    security(("api_jwt" = []))
)]
pub async fn get_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ContractDetail>, ApiError> {
    let detail = app_state
        .contract_service
        .detail(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(detail))
}

#[utoipa::path(
    put,
    path = "/api/contracts/{id}/stage",
    tag = "Contracts",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    request_body = ContractStagePayload,
    responses(
        (status = 200, description = "Etapa alterada", body = Contract),
        (status = 404, description = "Etapa inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_stage(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermUpdateContractStage>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ContractStagePayload>,
) -> Result<Json<Contract>, ApiError> {
    let contract = app_state
        .contract_service
        .update_stage(&user, id, payload.contract_stage_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(contract))
}

#[utoipa::path(
    put,
    path = "/api/contracts/{id}/reject",
    tag = "Contracts",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Contrato rejeitado", body = Contract),
        (status = 400, description = "Motivo ausente")
    ),
    security(("api_jwt" = []))
)]
pub async fn reject_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermRejectContract>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectPayload>,
) -> Result<Json<Contract>, ApiError> {
    let contract = app_state
        .contract_service
        .reject(&user, id, payload.reject_reason.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(contract))
}

#[utoipa::path(
    put,
    path = "/api/contracts/{id}/restore",
    tag = "Contracts",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    responses((status = 200, description = "Contrato restaurado", body = Contract)),
    security(("api_jwt" = []))
)]
pub async fn restore_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermRejectContract>,
    Path(id): Path<Uuid>,
) -> Result<Json<Contract>, ApiError> {
    let contract = app_state
        .contract_service
        .restore(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(contract))
}

#[utoipa::path(
    post,
    path = "/api/contracts/{id}/convert",
    tag = "Contracts",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    responses(
        (status = 201, description = "Deal criado a partir do contrato", body = Deal),
        (status = 400, description = "Contrato já convertido ou rejeitado")
    ),
    security(("api_jwt" = []))
)]
pub async fn convert_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermConvertContract>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deal = app_state
        .contract_service
        .convert(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::CREATED, Json(deal)))
}

#[utoipa::path(
    put,
    path = "/api/contracts/{id}/commission",
    tag = "Contracts",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    request_body = CommissionFiguresPayload,
    responses((status = 200, description = "Valores da comissão atualizados", body = ServiceCommission)),
    security(("api_jwt" = []))
)]
pub async fn update_commission(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermManageCommission>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommissionFiguresPayload>,
) -> Result<Json<ServiceCommission>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let commission = app_state
        .contract_service
        .update_commission(&user, id, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(commission))
}
