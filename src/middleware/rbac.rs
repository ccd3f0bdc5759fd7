// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
};

/// 1. O Trait que define o que é uma Permissão
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// 2. O Extractor (Guardião): o cargo do usuário precisa ter a permissão
pub struct RequirePermission<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let locale = Locale::from_request_parts(parts, state)
            .await
            .unwrap_or_default();
        let reject = |err: AppError| err.to_api_error(&locale, &app_state.i18n_store);

        // A. Extrai Usuário (posto pelo auth_guard)
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or(AppError::InvalidToken)
            .map_err(reject)?;

        // B. Verifica no Banco
        let required_perm = T::slug();
        let has_permission = app_state
            .repos
            .rbac
            .role_has_permission(user.0.role, required_perm)
            .await
            .map_err(reject)?;

        if !has_permission {
            tracing::debug!("Cargo {:?} sem a permissão '{}'", user.0.role, required_perm);
            return Err(reject(AppError::PermissionDenied(required_perm.to_string())));
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

macro_rules! permission {
    ($name:ident, $slug:literal) => {
        pub struct $name;
        impl PermissionDef for $name {
            fn slug() -> &'static str {
                $slug
            }
        }
    };
}

// Leads
permission!(PermCreateLead, "create_lead");
permission!(PermRejectLead, "reject_lead");
permission!(PermRestoreLead, "restore_lead");
permission!(PermTransferLead, "transfer_lead");
permission!(PermMoveLead, "move_lead");
permission!(PermConvertLead, "convert_lead");
permission!(PermManageLeadUsers, "manage_lead_users");
permission!(PermLeadDiscussion, "lead_discussion");
permission!(PermLeadFiles, "lead_files");

// Contratos
permission!(PermUpdateContractStage, "update_contract_stage");
permission!(PermConvertContract, "convert_contract");
permission!(PermRejectContract, "reject_contract");
permission!(PermManageCommission, "manage_commission");

// Deals
permission!(PermUpdateDealStage, "update_deal_stage");
permission!(PermRejectDeal, "reject_deal");
permission!(PermDealReport, "deal_report");

// Phonebook
permission!(PermUploadPhonebook, "upload_phonebook");
permission!(PermUpdatePhonebookStatus, "update_phonebook_status");
permission!(PermDeletePhonebook, "delete_phonebook");

// Metas
permission!(PermManageTargets, "manage_targets");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_match_the_seeded_permissions() {
        assert_eq!(PermCreateLead::slug(), "create_lead");
        assert_eq!(PermRejectDeal::slug(), "reject_deal");
        assert_eq!(PermUpdatePhonebookStatus::slug(), "update_phonebook_status");
    }
}
