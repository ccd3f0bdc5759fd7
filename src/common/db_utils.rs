// src/common/db_utils.rs

use crate::common::error::AppError;

/// Traduz violação de chave única em `UniqueConstraintViolation`; o resto vira `DatabaseError`.
pub(crate) fn map_unique_violation(e: sqlx::Error, detail: impl Into<String>) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::UniqueConstraintViolation(detail.into());
        }
    }
    e.into()
}

/// Converte `fetch_optional` em 404 com o nome da entidade.
pub(crate) fn found<T>(value: Option<T>, entity: &'static str) -> Result<T, AppError> {
    value.ok_or(AppError::NotFound(entity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_row_becomes_not_found() {
        let err = found::<u8>(None, "Lead").unwrap_err();
        assert!(matches!(err, AppError::NotFound("Lead")));
        assert_eq!(found(Some(3), "Lead").unwrap(), 3);
    }

    #[test]
    fn non_database_errors_are_not_conflicts() {
        let err = map_unique_violation(sqlx::Error::RowNotFound, "dup");
        assert!(matches!(err, AppError::DatabaseError(_)));
    }
}
