// src/handlers/phonebook.rs

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
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermDeletePhonebook, PermUpdatePhonebookStatus, PermUploadPhonebook, RequirePermission},
    },
    models::phonebook::{CallStatus, PhonebookComment, PhonebookEntry, StatusUpdateReport, UploadReport},
};

// =============================================================================
//  ÁREA 1: PLANILHAS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadPhonebookPayload {
    /// Dono da fila (quem vai ligar).
    pub user_id: Uuid,
    pub pipeline_id: Option<Uuid>,
    /// Conteúdo CSV `number[,status]`.
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "number,status\n0501234567,\n971507654321,UNBLOCKED")]
    pub csv: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCsvPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "number,status\n0501234567,BLOCKED")]
    pub csv: String,
}

#[utoipa::path(
    post,
    path = "/api/phonebook/upload",
    tag = "Phonebook",
    request_body = UploadPhonebookPayload,
    responses(
        (status = 201, description = "Números inseridos e relatório de descartes", body = UploadReport),
        (status = 400, description = "CSV inválido ou cota esgotada")
    ),
    security(("api_jwt" = []))
)]
pub async fn upload(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermUploadPhonebook>,
    Json(payload): Json<UploadPhonebookPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let report = app_state
        .phonebook_service
        .upload(&user, payload.user_id, payload.pipeline_id, &payload.csv)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    post,
    path = "/api/phonebook/status",
    tag = "Phonebook",
    request_body = StatusCsvPayload,
    responses((status = 200, description = "Status de bloqueio aplicado às entradas", body = StatusUpdateReport)),
    security(("api_jwt" = []))
)]
pub async fn update_statuses(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermUpdatePhonebookStatus>,
    Json(payload): Json<StatusCsvPayload>,
) -> Result<Json<StatusUpdateReport>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let report = app_state
        .phonebook_service
        .update_statuses(&payload.csv)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/api/phonebook/dncr",
    tag = "Phonebook",
    request_body = StatusCsvPayload,
    responses((status = 200, description = "Status DNCR aplicado aos clientes", body = StatusUpdateReport)),
    security(("api_jwt" = []))
)]
pub async fn update_dncr(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermUpdatePhonebookStatus>,
    Json(payload): Json<StatusCsvPayload>,
) -> Result<Json<StatusUpdateReport>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let report = app_state
        .phonebook_service
        .update_dncr(&payload.csv)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(report))
}

// =============================================================================
//  ÁREA 2: FILA DE LIGAÇÕES
// =============================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PhonebookQuery {
    #[param(value_type = Option<String>, example = "Req to call")]
    pub calstatus: Option<CallStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallStatusPayload {
    pub calstatus: CallStatus,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhonebookCommentPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Asked to call back after 5pm")]
    pub remarks: String,
}

#[utoipa::path(
    get,
    path = "/api/phonebook",
    tag = "Phonebook",
    params(PhonebookQuery),
    responses((status = 200, description = "Entradas visíveis ao usuário", body = Vec<PhonebookEntry>)),
    security(("api_jwt" = []))
)]
pub async fn list_entries(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PhonebookQuery>,
) -> Result<Json<Vec<PhonebookEntry>>, ApiError> {
    let entries = app_state
        .phonebook_service
        .list(&user, query.calstatus)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(entries))
}

#[utoipa::path(
    put,
    path = "/api/phonebook/{id}/calstatus",
    tag = "Phonebook",
    params(("id" = Uuid, Path, description = "ID da entrada")),
    request_body = CallStatusPayload,
    responses(
        (status = 200, description = "Status da ligação atualizado", body = PhonebookEntry),
        (status = 400, description = "'Convert to Lead' é reservado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_calstatus(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CallStatusPayload>,
) -> Result<Json<PhonebookEntry>, ApiError> {
    let entry = app_state
        .phonebook_service
        .update_calstatus(&user, id, payload.calstatus)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(entry))
}

#[utoipa::path(
    get,
    path = "/api/phonebook/{id}/comments",
    tag = "Phonebook",
    params(("id" = Uuid, Path, description = "ID da entrada")),
    responses((status = 200, description = "Comentários da entrada", body = Vec<PhonebookComment>)),
    security(("api_jwt" = []))
)]
pub async fn list_comments(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PhonebookComment>>, ApiError> {
    let comments = app_state
        .phonebook_service
        .comments(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(comments))
}

#[utoipa::path(
    post,
    path = "/api/phonebook/{id}/comments",
    tag = "Phonebook",
    params(("id" = Uuid, Path, description = "ID da entrada")),
    request_body = PhonebookCommentPayload,
    responses((status = 201, description = "Comentário adicionado", body = PhonebookComment)),
    security(("api_jwt" = []))
)]
pub async fn add_comment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PhonebookCommentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let comment = app_state
        .phonebook_service
        .add_comment(&user, id, &payload.remarks)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    delete,
    path = "/api/phonebook/{id}",
    tag = "Phonebook",
    params(("id" = Uuid, Path, description = "ID da entrada")),
    responses(
        (status = 204, description = "Entrada removida"),
        (status = 403, description = "Entrada fora da visibilidade do usuário")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_entry(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermDeletePhonebook>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    app_state
        .phonebook_service
        .delete(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calstatus_uses_the_display_names() {
        let payload: CallStatusPayload = serde_json::from_str(r#"{"calstatus":"Follow Up"}"#).unwrap();
        assert_eq!(payload.calstatus, CallStatus::FollowUp);
    }

    #[test]
    fn empty_csv_fails_validation() {
        let payload = StatusCsvPayload { csv: String::new() };
        assert!(payload.validate().is_err());
    }
}
