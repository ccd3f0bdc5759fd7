// src/handlers/commissions.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    db::commission_repo::CommissionFigures,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermManageCommission, RequirePermission},
    },
    models::commission::{CommissionPayment, CommissionSheet},
};

pub(crate) fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        return Err(err.with_message("not_negative".into()));
    }
    Ok(())
}

// =============================================================================
//  ÁREA 1: VALORES DA COMISSÃO DE SERVIÇO
// =============================================================================

/// Valores informados na conversão do lead e no back-fill do contrato.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CommissionFiguresPayload {
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(example = "250000.00")]
    pub finance_amount: Decimal,
    #[validate(custom(function = "validate_not_negative"))]
    pub bank_commission: Decimal,
    #[validate(custom(function = "validate_not_negative"))]
    pub customer_commission: Decimal,
    #[validate(custom(function = "validate_not_negative"))]
    pub with_vat_commission: Decimal,
    #[validate(custom(function = "validate_not_negative"))]
    pub without_vat_commission: Decimal,
}

impl From<CommissionFiguresPayload> for CommissionFigures {
    fn from(p: CommissionFiguresPayload) -> Self {
        CommissionFigures {
            finance_amount: p.finance_amount,
            bank_commission: p.bank_commission,
            customer_commission: p.customer_commission,
            with_vat_commission: p.with_vat_commission,
            without_vat_commission: p.without_vat_commission,
        }
    }
}

// =============================================================================
//  ÁREA 2: DIVISÃO POR USUÁRIO
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommissionEntryPayload {
    pub user_id: Uuid,
    #[schema(example = "2.5")]
    pub commission_percentage: Decimal,
    #[schema(example = "6250.00")]
    pub commission_amount: Decimal,
}

#[utoipa::path(
    get,
    path = "/api/commissions/{id}",
    tag = "Commissions",
    params(("id" = Uuid, Path, description = "ID da ServiceCommission")),
    responses((status = 200, description = "Comissão com as linhas e o total derivado", body = CommissionSheet)),
    security(("api_jwt" = []))
)]
pub async fn get_sheet(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CommissionSheet>, ApiError> {
    let sheet = app_state
        .commission_service
        .sheet(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(sheet))
}

#[utoipa::path(
    put,
    path = "/api/commissions/{id}/entries",
    tag = "Commissions",
    params(("id" = Uuid, Path, description = "ID da ServiceCommission")),
    request_body = CommissionEntryPayload,
    responses(
        (status = 200, description = "Linha gravada (uma por usuário)", body = CommissionSheet),
        (status = 400, description = "Percentual ou valor fora da faixa")
    ),
    security(("api_jwt" = []))
)]
pub async fn upsert_entry(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermManageCommission>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommissionEntryPayload>,
) -> Result<Json<CommissionSheet>, ApiError> {
    let sheet = app_state
        .commission_service
        .upsert_entry(&user, id, payload.user_id, payload.commission_percentage, payload.commission_amount)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(sheet))
}

#[utoipa::path(
    delete,
    path = "/api/commissions/{id}/entries/{user_id}",
    tag = "Commissions",
    params(
        ("id" = Uuid, Path, description = "ID da ServiceCommission"),
        ("user_id" = Uuid, Path, description = "Usuário da linha")
    ),
    responses((status = 200, description = "Linha removida", body = CommissionSheet)),
    security(("api_jwt" = []))
)]
pub async fn remove_entry(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermManageCommission>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CommissionSheet>, ApiError> {
    let sheet = app_state
        .commission_service
        .remove_entry(&user, id, user_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(sheet))
}

// =============================================================================
//  ÁREA 3: PAGAMENTOS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentPayload {
    pub deal_id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "6250.00")]
    pub total_commission: Decimal,
    #[validate(length(min = 1, message = "required"))]
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPaymentPayload {
    #[schema(example = "2000.00")]
    pub amount: Decimal,
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Bank Transfer")]
    pub payment_method: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/commissions/payments",
    tag = "Commissions",
    request_body = CreatePaymentPayload,
    responses(
        (status = 201, description = "Pagamento aberto (pago 0, restante = total)", body = CommissionPayment),
        (status = 400, description = "Total inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermManageCommission>,
    Json(payload): Json<CreatePaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let payment = app_state
        .commission_service
        .create_payment(
            &user,
            payload.deal_id,
            payload.user_id,
            payload.total_commission,
            payload.payment_method.as_deref(),
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(payment)))
}

#[utoipa::path(
    put,
    path = "/api/commissions/payments/{id}",
    tag = "Commissions",
    params(("id" = Uuid, Path, description = "ID do pagamento")),
    request_body = ApplyPaymentPayload,
    responses(
        (status = 200, description = "Pagamento aplicado", body = CommissionPayment),
        (status = 400, description = "Valor menor ou igual a zero, ou acima do restante")
    ),
    security(("api_jwt" = []))
)]
pub async fn apply_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermManageCommission>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApplyPaymentPayload>,
) -> Result<Json<CommissionPayment>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let payment = app_state
        .commission_service
        .apply_payment(&user, id, payload.amount, payload.payment_method.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(payment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_figures_fail_validation() {
        let payload = CommissionFiguresPayload {
            finance_amount: Decimal::from(-1),
            ..Default::default()
        };
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("finance_amount"));
    }

    #[test]
    fn missing_figures_default_to_zero() {
        let payload: CommissionFiguresPayload = serde_json::from_str(r#"{"financeAmount": 1000}"#).unwrap();
        let figures = CommissionFigures::from(payload);
        assert_eq!(figures.finance_amount, Decimal::from(1000));
        assert_eq!(figures.bank_commission, Decimal::ZERO);
    }
}
