// src/db/phonebook_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        client::BlockStatus,
        phonebook::{CallStatus, PhonebookComment, PhonebookEntry},
    },
};

const ENTRY_COLUMNS: &str = r#"
    id, number, user_id, pipeline_id, uploaded_by, status, calstatus,
    visibility, lead_id, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PhonebookRepository {
    pool: PgPool,
}

impl PhonebookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  LEITURAS
    // =========================================================================

    pub async fn find<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<PhonebookEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entry = sqlx::query_as::<_, PhonebookEntry>(&format!(
            "SELECT {} FROM phonebook WHERE id = $1",
            ENTRY_COLUMNS
        ))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(entry)
    }

    /// Entrada não bloqueada para o número (usada na conversão em lead).
    pub async fn find_unblocked_by_number<'e, E>(
        &self,
        executor: E,
        number: &str,
    ) -> Result<Option<PhonebookEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entry = sqlx::query_as::<_, PhonebookEntry>(&format!(
            r#"
            SELECT {} FROM phonebook
            WHERE number = $1 AND status <> 'BLOCKED'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            ENTRY_COLUMNS
        ))
            .bind(number)
            .fetch_optional(executor)
            .await?;
        Ok(entry)
    }

    pub async fn find_by_number<'e, E>(
        &self,
        executor: E,
        number: &str,
    ) -> Result<Option<PhonebookEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entry = sqlx::query_as::<_, PhonebookEntry>(&format!(
            "SELECT {} FROM phonebook WHERE number = $1 ORDER BY created_at DESC LIMIT 1",
            ENTRY_COLUMNS
        ))
            .bind(number)
            .fetch_optional(executor)
            .await?;
        Ok(entry)
    }

    pub async fn existing_numbers<'e, E>(
        &self,
        executor: E,
        numbers: &[String],
    ) -> Result<Vec<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let found = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT number FROM phonebook WHERE number = ANY($1)",
        )
            .bind(numbers)
            .fetch_all(executor)
            .await?;
        Ok(found)
    }

    /// Entradas "Req to call" não bloqueadas do usuário (consomem a cota).
    pub async fn count_active_queue<'e, E>(&self, executor: E, user_id: Uuid) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM phonebook
            WHERE user_id = $1 AND calstatus = 'REQ_TO_CALL' AND status <> 'BLOCKED'
            "#,
        )
            .bind(user_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    pub async fn list_visible(
        &self,
        viewer_id: Uuid,
        calstatus: Option<CallStatus>,
    ) -> Result<Vec<PhonebookEntry>, AppError> {
        let entries = sqlx::query_as::<_, PhonebookEntry>(&format!(
            r#"
            SELECT {} FROM phonebook
            WHERE $1 = ANY(visibility)
              AND ($2::call_status IS NULL OR calstatus = $2)
            ORDER BY created_at DESC
            "#,
            ENTRY_COLUMNS
        ))
            .bind(viewer_id)
            .bind(calstatus)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    pub async fn list_comments<'e, E>(
        &self,
        executor: E,
        phonebook_id: Uuid,
    ) -> Result<Vec<PhonebookComment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let comments = sqlx::query_as::<_, PhonebookComment>(
            r#"
            SELECT id, phonebook_id, user_id, remarks, created_at
            FROM phonebook_comments
            WHERE phonebook_id = $1
            ORDER BY created_at ASC
            "#,
        )
            .bind(phonebook_id)
            .fetch_all(executor)
            .await?;
        Ok(comments)
    }

    // =========================================================================
    //  ESCRITAS
    // =========================================================================

    /// Insere o lote inteiro de uma vez (UNNEST), todos com "Req to call".
    pub async fn insert_many<'e, E>(
        &self,
        executor: E,
        numbers: &[String],
        user_id: Uuid,
        pipeline_id: Option<Uuid>,
        uploaded_by: Uuid,
        visibility: &[Uuid],
    ) -> Result<Vec<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Número já gravado por outro upload concorrente é ignorado; devolve só o que entrou
        let stored = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO phonebook (number, user_id, pipeline_id, uploaded_by, visibility)
            SELECT n, $2, $3, $4, $5
            FROM UNNEST($1::text[]) AS n
            ON CONFLICT (number) DO NOTHING
            RETURNING number
            "#,
        )
            .bind(numbers)
            .bind(user_id)
            .bind(pipeline_id)
            .bind(uploaded_by)
            .bind(visibility)
            .fetch_all(executor)
            .await?;
        Ok(stored)
    }

    pub async fn mark_converted<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        lead_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE phonebook
            SET calstatus = 'CONVERT_TO_LEAD', lead_id = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
            .bind(id)
            .bind(lead_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn update_calstatus<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        calstatus: CallStatus,
    ) -> Result<PhonebookEntry, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entry = sqlx::query_as::<_, PhonebookEntry>(&format!(
            r#"
            UPDATE phonebook SET calstatus = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
            .bind(id)
            .bind(calstatus)
            .fetch_one(executor)
            .await?;
        Ok(entry)
    }

    /// Atualiza o status de bloqueio pelo número. Retorna (encontrados, alterados).
    pub async fn update_status_by_number<'e, E>(
        &self,
        executor: E,
        number: &str,
        status: BlockStatus,
    ) -> Result<(i64, i64), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH matched AS (
                SELECT id, status FROM phonebook WHERE number = $1
            ),
            changed AS (
                UPDATE phonebook p
                SET status = $2, updated_at = NOW()
                FROM matched m
                WHERE p.id = m.id AND m.status <> $2
                RETURNING p.id
            )
            SELECT (SELECT COUNT(*) FROM matched), (SELECT COUNT(*) FROM changed)
            "#,
        )
            .bind(number)
            .bind(status)
            .fetch_one(executor)
            .await?;
        Ok(counts)
    }

    pub async fn add_comment<'e, E>(
        &self,
        executor: E,
        phonebook_id: Uuid,
        user_id: Uuid,
        remarks: &str,
    ) -> Result<PhonebookComment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let comment = sqlx::query_as::<_, PhonebookComment>(
            r#"
            INSERT INTO phonebook_comments (phonebook_id, user_id, remarks)
            VALUES ($1, $2, $3)
            RETURNING id, phonebook_id, user_id, remarks, created_at
            "#,
        )
            .bind(phonebook_id)
            .bind(user_id)
            .bind(remarks)
            .fetch_one(executor)
            .await?;
        Ok(comment)
    }

    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM phonebook WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mantém apenas as `keep` entradas "Req to call" mais recentes de cada usuário.
    pub async fn trim_queues(&self, keep: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM phonebook
            WHERE id IN (
                SELECT id FROM (
                    SELECT id,
                           ROW_NUMBER() OVER (
                               PARTITION BY user_id ORDER BY created_at DESC, id DESC
                           ) AS rn
                    FROM phonebook
                    WHERE calstatus = 'REQ_TO_CALL' AND status <> 'BLOCKED'
                ) ranked
                WHERE ranked.rn > $1
            )
            "#,
        )
            .bind(keep)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
