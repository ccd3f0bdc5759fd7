// src/handlers/directory.rs

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::directory::{Branch, ContractStage, DealStage, LeadType, Pipeline, Product, ProductStage, Source},
};

// Tabelas de referência: só leitura, para qualquer usuário autenticado

#[utoipa::path(get, path = "/api/directory/products", tag = "Directory",
    responses((status = 200, description = "Produtos", body = Vec<Product>)),
    security(("api_jwt" = [])))]
pub async fn list_products(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<Json<Vec<Product>>, ApiError> {
    let rows = app_state
        .repos
        .directory
        .list_products()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(rows))
}

#[utoipa::path(get, path = "/api/directory/products/{id}/stages", tag = "Directory",
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses((status = 200, description = "Etapas do produto, por ordem", body = Vec<ProductStage>)),
    security(("api_jwt" = [])))]
pub async fn list_product_stages(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<ProductStage>>, ApiError> {
    let rows = app_state
        .repos
        .directory
        .list_product_stages(product_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(rows))
}

#[utoipa::path(get, path = "/api/directory/pipelines", tag = "Directory",
    responses((status = 200, description = "Pipelines", body = Vec<Pipeline>)),
    security(("api_jwt" = [])))]
pub async fn list_pipelines(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<Json<Vec<Pipeline>>, ApiError> {
    let rows = app_state
        .repos
        .directory
        .list_pipelines()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(rows))
}

#[utoipa::path(get, path = "/api/directory/branches", tag = "Directory",
    responses((status = 200, description = "Filiais", body = Vec<Branch>)),
    security(("api_jwt" = [])))]
pub async fn list_branches(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<Json<Vec<Branch>>, ApiError> {
    let rows = app_state
        .repos
        .directory
        .list_branches()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(rows))
}

#[utoipa::path(get, path = "/api/directory/lead-types", tag = "Directory",
    responses((status = 200, description = "Tipos de lead", body = Vec<LeadType>)),
    security(("api_jwt" = [])))]
pub async fn list_lead_types(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<Json<Vec<LeadType>>, ApiError> {
    let rows = app_state
        .repos
        .directory
        .list_lead_types()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(rows))
}

#[utoipa::path(get, path = "/api/directory/sources", tag = "Directory",
    responses((status = 200, description = "Origens", body = Vec<Source>)),
    security(("api_jwt" = [])))]
pub async fn list_sources(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<Json<Vec<Source>>, ApiError> {
    let rows = app_state
        .repos
        .directory
        .list_sources()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(rows))
}

#[utoipa::path(get, path = "/api/directory/deal-stages", tag = "Directory",
    responses((status = 200, description = "Etapas de deal", body = Vec<DealStage>)),
    security(("api_jwt" = [])))]
pub async fn list_deal_stages(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<Json<Vec<DealStage>>, ApiError> {
    let rows = app_state
        .repos
        .directory
        .list_deal_stages()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(rows))
}

#[utoipa::path(get, path = "/api/directory/contract-stages", tag = "Directory",
    responses((status = 200, description = "Etapas de contrato", body = Vec<ContractStage>)),
    security(("api_jwt" = [])))]
pub async fn list_contract_stages(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<Json<Vec<ContractStage>>, ApiError> {
    let rows = app_state
        .repos
        .directory
        .list_contract_stages()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok(Json(rows))
}
