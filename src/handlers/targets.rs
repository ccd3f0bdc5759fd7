// src/handlers/targets.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermManageTargets, RequirePermission},
    },
    models::target::{Target, TargetOwner},
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetPayload {
    pub assigned_to: TargetOwner,
    #[schema(example = "1000000.00")]
    pub finance_amount: Decimal,
    #[schema(value_type = String, format = Date, example = "2025-01-01")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = Date, example = "2025-01-31")]
    pub end_date: NaiveDate,
}

#[utoipa::path(
    post,
    path = "/api/targets",
    tag = "Targets",
    request_body = CreateTargetPayload,
    responses(
        (status = 201, description = "Meta criada", body = Target),
        (status = 400, description = "Valor ou período inválido"),
        (status = 404, description = "Usuário ou pipeline inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_target(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermManageTargets>,
    Json(payload): Json<CreateTargetPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let target = app_state
        .target_service
        .create(payload.assigned_to, payload.finance_amount, payload.start_date, payload.end_date)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(target)))
}

#[utoipa::path(
    get,
    path = "/api/targets",
    tag = "Targets",
    responses((status = 200, description = "Metas", body = Vec<Target>)),
    security(("api_jwt" = []))
)]
pub async fn list_targets(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<Target>>, ApiError> {
    let targets = app_state
        .target_service
        .list()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(targets))
}
