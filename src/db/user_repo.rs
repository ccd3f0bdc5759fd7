// src/db/user_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{Role, User},
};

const USER_COLUMNS: &str = r#"
    id, name, email, password_hash, role, branch_id,
    pipeline_ids, product_ids, is_active, created_at, updated_at
"#;

// O repositório de usuários, responsável por todas as interações com a tabela 'users'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Busca um usuário pelo seu e-mail (login)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    // Busca um usuário ativo pelo seu ID
    pub async fn find_active_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1 AND is_active = true",
            USER_COLUMNS
        ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Todos os usuários ativos: é o diretório usado no cálculo do fan-out.
    pub async fn list_active<'e, E>(&self, executor: E) -> Result<Vec<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE is_active = true ORDER BY name ASC",
            USER_COLUMNS
        ))
            .fetch_all(executor)
            .await?;
        Ok(users)
    }

    pub async fn list_ids_by_roles<'e, E>(
        &self,
        executor: E,
        roles: &[Role],
    ) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM users WHERE is_active = true AND role = ANY($1)",
        )
            .bind(roles)
            .fetch_all(executor)
            .await?;
        Ok(ids)
    }

    pub async fn exists<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND is_active = true)",
        )
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(exists)
    }

    /// Trava a linha do usuário até o fim da transação. Serializa uploads para a mesma fila.
    pub async fn lock_active<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM users WHERE id = $1 AND is_active = true FOR UPDATE",
        )
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(locked.is_some())
    }
}
