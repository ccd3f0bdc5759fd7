// src/db/rbac_repo.rs

use sqlx::PgPool;

use crate::common::error::AppError;
use crate::models::auth::Role;

#[derive(Clone)]
pub struct RbacRepository {
    pool: PgPool,
}

impl RbacRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // O cargo tem a permissão nomeada? ("create_lead", "reject_deal", ...)
    pub async fn role_has_permission(
        &self,
        role: Role,
        permission_slug: &str,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM role_permissions
                WHERE role = $1 AND permission = $2
            )
            "#,
        )
            .bind(role)
            .bind(permission_slug)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    // Lista as permissões de um cargo (para o frontend montar menus)
    pub async fn permissions_for_role(&self, role: Role) -> Result<Vec<String>, AppError> {
        let permissions = sqlx::query_scalar::<_, String>(
            "SELECT permission FROM role_permissions WHERE role = $1 ORDER BY permission",
        )
            .bind(role)
            .fetch_all(&self.pool)
            .await?;

        Ok(permissions)
    }
}
