// src/db/client_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::client::{BlockStatus, Client},
};

const CLIENT_COLUMNS: &str = r#"
    id, phone, w_phone, e_id, name, email, dncr_status, created_at, updated_at
"#;

// Registro de clientes. Deduplicação por telefone e Emirates ID.
// Toda consulta recebe o executor do chamador (sempre dentro de uma transação).
#[derive(Clone, Default)]
pub struct ClientRepository;

impl ClientRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE id = $1",
            CLIENT_COLUMNS
        ))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(client)
    }

    pub async fn find_by_phone<'e, E>(&self, executor: E, phone: &str) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE phone = $1 ORDER BY created_at ASC LIMIT 1",
            CLIENT_COLUMNS
        ))
            .bind(phone)
            .fetch_optional(executor)
            .await?;
        Ok(client)
    }

    pub async fn find_by_e_id<'e, E>(&self, executor: E, e_id: &str) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE e_id = $1 ORDER BY created_at ASC LIMIT 1",
            CLIENT_COLUMNS
        ))
            .bind(e_id)
            .fetch_optional(executor)
            .await?;
        Ok(client)
    }

    // Mensagens do WhatsApp podem vir do número de WhatsApp, não do telefone principal
    pub async fn find_by_any_phone<'e, E>(
        &self,
        executor: E,
        phone: &str,
    ) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE phone = $1 OR w_phone = $1 ORDER BY created_at ASC LIMIT 1",
            CLIENT_COLUMNS
        ))
            .bind(phone)
            .fetch_optional(executor)
            .await?;
        Ok(client)
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        phone: &str,
        w_phone: Option<&str>,
        e_id: Option<&str>,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (phone, w_phone, e_id, name, email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
            .bind(phone)
            .bind(w_phone)
            .bind(e_id)
            .bind(name)
            .bind(email)
            .fetch_one(executor)
            .await?;
        Ok(client)
    }

    /// Quais destes telefones já pertencem a clientes?
    pub async fn existing_phones<'e, E>(
        &self,
        executor: E,
        phones: &[String],
    ) -> Result<Vec<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let phones = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT phone FROM clients WHERE phone = ANY($1)",
        )
            .bind(phones)
            .fetch_all(executor)
            .await?;
        Ok(phones)
    }

    /// Atualiza o DNCR de todos os clientes com o telefone. Retorna (encontrados, alterados).
    pub async fn update_dncr_status<'e, E>(
        &self,
        executor: E,
        phone: &str,
        status: BlockStatus,
    ) -> Result<(i64, i64), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH matched AS (
                SELECT id, dncr_status FROM clients WHERE phone = $1
            ),
            changed AS (
                UPDATE clients c
                SET dncr_status = $2, updated_at = NOW()
                FROM matched m
                WHERE c.id = m.id AND m.dncr_status <> $2
                RETURNING c.id
            )
            SELECT (SELECT COUNT(*) FROM matched), (SELECT COUNT(*) FROM changed)
            "#,
        )
            .bind(phone)
            .bind(status)
            .fetch_one(executor)
            .await?;
        Ok(counts)
    }
}
