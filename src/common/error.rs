// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::common::i18n::I18nStore;
use crate::middleware::i18n::Locale;

// Nosso tipo de erro de domínio. Cada variante tem um código estável
// (usado no catálogo de traduções) e um status HTTP.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Campo obrigatório ausente: {0}")]
    MissingField(&'static str),

    #[error("Campo inválido: {0}")]
    InvalidField(&'static str),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("{0} não encontrado")]
    NotFound(&'static str),

    #[error("Usuário não faz parte do registro")]
    NotSelectedUser,

    #[error("Permissão ausente: {0}")]
    PermissionDenied(String),

    #[error("Cargo sem permissão para esta transição")]
    RoleNotPermitted,

    // --- Regras de negócio do Lead ---
    #[error("Lead duplicado para cliente+produto")]
    DuplicateLead,

    #[error("Transferência para o mesmo produto")]
    SameProductTransfer,

    #[error("Movimentação para o mesmo pipeline")]
    SamePipelineMove,

    #[error("Lead já convertido")]
    LeadAlreadyConverted,

    #[error("Lead convertido não pode ser alterado")]
    LeadLocked,

    #[error("Lead não está rejeitado")]
    LeadNotRejected,

    // --- Regras de Contrato / Deal ---
    #[error("Contrato já convertido")]
    ContractAlreadyConverted,

    #[error("Contrato rejeitado")]
    ContractRejected,

    #[error("Contrato não está rejeitado")]
    ContractNotRejected,

    #[error("Deal já está em Collected")]
    DealAlreadyCollected,

    #[error("Deal rejeitado")]
    DealRejected,

    #[error("Deal não está rejeitado")]
    DealNotRejected,

    #[error("Relatório do deal ainda não gerado")]
    ReportNotGenerated,

    #[error("Etapa inicial ausente: {0}")]
    StageMissing(&'static str),

    // --- Comissões ---
    #[error("Valor de pagamento inválido")]
    InvalidPaymentAmount,

    #[error("Pagamento excede o saldo restante")]
    PaymentExceedsRemaining,

    // --- Phonebook ---
    #[error("Phonebook: cota de 'Req to call' esgotada")]
    PhonebookQuotaExhausted,

    #[error("Status de chamada reservado")]
    ReservedCallStatus,

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    #[error("Erro ao ler CSV: {0}")]
    CsvError(#[from] csv::Error),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

/// Erro já traduzido, pronto para virar resposta HTTP.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::MissingField(_)
            | AppError::InvalidField(_)
            | AppError::DuplicateLead
            | AppError::SameProductTransfer
            | AppError::SamePipelineMove
            | AppError::LeadAlreadyConverted
            | AppError::LeadNotRejected
            | AppError::ContractAlreadyConverted
            | AppError::ContractRejected
            | AppError::ContractNotRejected
            | AppError::DealAlreadyCollected
            | AppError::DealRejected
            | AppError::DealNotRejected
            | AppError::ReportNotGenerated
            | AppError::InvalidPaymentAmount
            | AppError::PaymentExceedsRemaining
            | AppError::PhonebookQuotaExhausted
            | AppError::ReservedCallStatus
            | AppError::CsvError(_) => StatusCode::BAD_REQUEST,

            AppError::InvalidCredentials | AppError::InvalidToken | AppError::JwtError(_) => {
                StatusCode::UNAUTHORIZED
            }

            AppError::NotSelectedUser
            | AppError::PermissionDenied(_)
            | AppError::RoleNotPermitted
            | AppError::LeadLocked => StatusCode::FORBIDDEN,

            AppError::NotFound(_) => StatusCode::NOT_FOUND,

            AppError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,

            AppError::StageMissing(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Código estável usado como chave no catálogo de mensagens.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation.failed",
            AppError::MissingField(_) => "validation.required",
            AppError::InvalidField(_) => "validation.invalid",
            AppError::InvalidCredentials => "auth.invalid_credentials",
            AppError::InvalidToken | AppError::JwtError(_) => "auth.invalid_token",
            AppError::NotFound(_) => "common.not_found",
            AppError::NotSelectedUser => "access.not_selected_user",
            AppError::PermissionDenied(_) => "access.permission_denied",
            AppError::RoleNotPermitted => "access.role_not_permitted",
            AppError::DuplicateLead => "lead.duplicate",
            AppError::SameProductTransfer => "lead.transfer_same_product",
            AppError::SamePipelineMove => "lead.move_same_pipeline",
            AppError::LeadAlreadyConverted => "lead.already_converted",
            AppError::LeadLocked => "lead.locked",
            AppError::LeadNotRejected => "lead.not_rejected",
            AppError::ContractAlreadyConverted => "contract.already_converted",
            AppError::ContractRejected => "contract.rejected",
            AppError::ContractNotRejected => "contract.not_rejected",
            AppError::DealAlreadyCollected => "deal.already_collected",
            AppError::DealRejected => "deal.rejected",
            AppError::DealNotRejected => "deal.not_rejected",
            AppError::ReportNotGenerated => "deal.report_not_generated",
            AppError::StageMissing(_) => "stage.missing",
            AppError::InvalidPaymentAmount => "commission.invalid_amount",
            AppError::PaymentExceedsRemaining => "commission.exceeds_remaining",
            AppError::PhonebookQuotaExhausted => "phonebook.quota_exhausted",
            AppError::ReservedCallStatus => "phonebook.reserved_calstatus",
            AppError::UniqueConstraintViolation(_) => "common.conflict",
            AppError::CsvError(_) => "csv.invalid",
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_) => "common.internal",
        }
    }

    fn message_args(&self) -> Vec<(&'static str, String)> {
        match self {
            AppError::MissingField(field) | AppError::InvalidField(field) => {
                vec![("field", (*field).to_string())]
            }
            AppError::NotFound(entity) => vec![("entity", (*entity).to_string())],
            AppError::PermissionDenied(slug) => vec![("permission", slug.clone())],
            AppError::StageMissing(stage) => vec![("stage", (*stage).to_string())],
            AppError::UniqueConstraintViolation(detail) => vec![("detail", detail.clone())],
            AppError::CsvError(e) => vec![("detail", e.to_string())],
            _ => Vec::new(),
        }
    }

    /// Converte o erro de domínio numa resposta localizada.
    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        let status = self.status();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // O detalhe fica só no log; o cliente recebe a mensagem genérica.
            tracing::error!("🔥 Erro Interno do Servidor: {}", self);
        }

        let details = match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            let code = e
                                .message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string());
                            Value::String(store.translate(&locale.0, &format!("field.{}", code), &[]))
                        })
                        .collect();
                    details.insert(field.to_string(), Value::Array(messages));
                }
                Some(Value::Object(details))
            }
            _ => None,
        };

        let args = self.message_args();
        let args_ref: Vec<(&str, &str)> = args.iter().map(|(k, v)| (*k, v.as_str())).collect();

        ApiError {
            status,
            error: store.translate(&locale.0, self.code(), &args_ref),
            details,
        }
    }
}

impl IntoResponse for AppError {
    // Usado por middlewares que não têm acesso ao Locale (ex.: auth_guard).
    fn into_response(self) -> Response {
        let locale = Locale::default();
        self.to_api_error(&locale, I18nStore::global()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_conflicts_map_to_bad_request() {
        assert_eq!(AppError::DuplicateLead.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::SameProductTransfer.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::DealAlreadyCollected.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::LeadAlreadyConverted.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn access_errors_map_to_forbidden() {
        assert_eq!(AppError::NotSelectedUser.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::RoleNotPermitted.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::PermissionDenied("reject_deal".into()).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn missing_stage_is_a_server_error() {
        assert_eq!(
            AppError::StageMissing("product stage").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn api_error_carries_translated_message() {
        let store = I18nStore::global();
        let api = AppError::MissingField("reject_reason")
            .to_api_error(&Locale("en".into()), store);

        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert!(api.error.contains("reject_reason"));
        assert!(api.details.is_none());
    }

    #[test]
    fn internal_errors_hide_the_detail() {
        let store = I18nStore::global();
        let err = AppError::InternalServerError(anyhow::anyhow!("connection reset by peer"));
        let api = err.to_api_error(&Locale("en".into()), store);

        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.error.contains("connection reset"));
    }
}
