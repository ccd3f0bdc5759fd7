// src/handlers/deals.rs

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    handlers::leads::RejectPayload,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermDealReport, PermRejectDeal, PermUpdateDealStage, RequirePermission},
    },
    models::deal::{Deal, DealDetail},
    services::deal_service::StageRef,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DealStagePayload {
    pub deal_stage_id: Uuid,
}

#[utoipa::path(
    get,
    path = "/api/deals",
    tag = "Deals",
    responses((status = 200, description = "Deals em que o usuário está selecionado", body = Vec<Deal>)),
    security(("api_jwt" = []))
)]
pub async fn list_deals(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Deal>>, ApiError> {
    let deals = app_state
        .deal_service
        .list(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(deals))
}

#[utoipa::path(
    get,
    path = "/api/deals/{id}",
    tag = "Deals",
    params(("id" = Uuid, Path, description = "ID do deal")),
    responses((status = 200, description = "Deal com comissão, pagamentos e histórico", body = DealDetail)),
    security(("api_jwt" = []))
)]
pub async fn get_deal(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DealDetail>, ApiError> {
    let detail = app_state
        .deal_service
        .detail(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(detail))
}

// =============================================================================
//  ÁREA 1: ETAPAS (os dois endpoints passam pela mesma transição)
// =============================================================================

#[utoipa::path(
    put,
    path = "/api/deals/{id}/stage",
    tag = "Deals",
    params(("id" = Uuid, Path, description = "ID do deal")),
    request_body = DealStagePayload,
    responses(
        (status = 200, description = "Etapa alterada", body = Deal),
        (status = 400, description = "Deal já em Collected"),
        (status = 403, description = "Cargo não pode marcar Collected")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_stage(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermUpdateDealStage>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DealStagePayload>,
) -> Result<Json<Deal>, ApiError> {
    let deal = app_state
        .deal_service
        .update_stage(&user, id, StageRef::Id(payload.deal_stage_id))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(deal))
}

#[utoipa::path(
    put,
    path = "/api/deals/{id}/stage/collected",
    tag = "Deals",
    params(("id" = Uuid, Path, description = "ID do deal")),
    responses(
        (status = 200, description = "Deal marcado como Collected", body = Deal),
        (status = 400, description = "Deal já em Collected"),
        (status = 403, description = "Cargo não pode marcar Collected")
    ),
    security(("api_jwt" = []))
)]
pub async fn mark_collected(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermUpdateDealStage>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deal>, ApiError> {
    let deal = app_state
        .deal_service
        .update_stage(&user, id, StageRef::collected())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(deal))
}

// =============================================================================
//  ÁREA 2: REJEIÇÃO E RELATÓRIO
// =============================================================================

#[utoipa::path(
    put,
    path = "/api/deals/{id}/reject",
    tag = "Deals",
    params(("id" = Uuid, Path, description = "ID do deal")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Deal rejeitado", body = Deal),
        (status = 400, description = "Motivo ausente")
    ),
    security(("api_jwt" = []))
)]
pub async fn reject_deal(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermRejectDeal>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectPayload>,
) -> Result<Json<Deal>, ApiError> {
    let deal = app_state
        .deal_service
        .reject(&user, id, payload.reject_reason.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(deal))
}

#[utoipa::path(
    put,
    path = "/api/deals/{id}/restore",
    tag = "Deals",
    params(("id" = Uuid, Path, description = "ID do deal")),
    responses((status = 200, description = "Deal restaurado", body = Deal)),
    security(("api_jwt" = []))
)]
pub async fn restore_deal(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermRejectDeal>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deal>, ApiError> {
    let deal = app_state
        .deal_service
        .restore(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(deal))
}

#[utoipa::path(
    put,
    path = "/api/deals/{id}/report",
    tag = "Deals",
    params(("id" = Uuid, Path, description = "ID do deal")),
    responses((status = 200, description = "Flag de relatório alternada", body = Deal)),
    security(("api_jwt" = []))
)]
pub async fn toggle_report(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermDealReport>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deal>, ApiError> {
    let deal = app_state
        .deal_service
        .toggle_report(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(deal))
}

#[utoipa::path(
    put,
    path = "/api/deals/{id}/report/approve",
    tag = "Deals",
    params(("id" = Uuid, Path, description = "ID do deal")),
    responses(
        (status = 200, description = "Relatório aprovado", body = Deal),
        (status = 400, description = "Relatório ainda não gerado"),
        (status = 403, description = "Só CEO, MD ou Accountant")
    ),
    security(("api_jwt" = []))
)]
pub async fn approve_report(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Deal>, ApiError> {
    let deal = app_state
        .deal_service
        .approve_report(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(deal))
}
