// src/db/lead_repo.rs

use sqlx::{types::Json, Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::lead::{Lead, LeadDiscussion, LeadFile, TransferSnapshot},
};

const LEAD_COLUMNS: &str = r#"
    id, client_id, created_by, ref_created_by, selected_users,
    pipeline_id, branch_id, product_stage_id, lead_type_id, source_id, product_id,
    company_name, description,
    is_active, is_converted, is_reject, is_transfer, is_move,
    reject_reason, rejected_by, transfer_from, labels,
    created_at, updated_at
"#;

/// Dados de um lead novo, já resolvidos pelo serviço.
pub struct NewLead<'a> {
    pub client_id: Uuid,
    pub created_by: Uuid,
    pub selected_users: &'a [Uuid],
    pub routing: &'a TransferSnapshot,
    pub lead_type_id: Uuid,
    pub source_id: Uuid,
    pub company_name: Option<&'a str>,
    pub description: Option<&'a str>,
}

/// Filtros da listagem de leads.
#[derive(Debug, Default, Clone)]
pub struct LeadFilter {
    pub pipeline_id: Option<Uuid>,
    pub is_reject: Option<bool>,
    pub is_converted: Option<bool>,
}

#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  LEITURAS
    // =========================================================================

    pub async fn find<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            "SELECT {} FROM leads WHERE id = $1",
            LEAD_COLUMNS
        ))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(lead)
    }

    /// Trava a linha até o fim da transação (duas transições no mesmo lead não se cruzam).
    pub async fn find_for_update<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            "SELECT {} FROM leads WHERE id = $1 FOR UPDATE",
            LEAD_COLUMNS
        ))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(lead)
    }

    pub async fn exists_for_client_product<'e, E>(
        &self,
        executor: E,
        client_id: Uuid,
        product_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM leads WHERE client_id = $1 AND product_id = $2)",
        )
            .bind(client_id)
            .bind(product_id)
            .fetch_one(executor)
            .await?;
        Ok(exists)
    }

    /// Lead mais recente ainda aberto (não convertido, não rejeitado) do cliente.
    pub async fn find_open_by_client<'e, E>(
        &self,
        executor: E,
        client_id: Uuid,
    ) -> Result<Option<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            SELECT {} FROM leads
            WHERE client_id = $1 AND is_converted = false AND is_reject = false
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            LEAD_COLUMNS
        ))
            .bind(client_id)
            .fetch_optional(executor)
            .await?;
        Ok(lead)
    }

    pub async fn list_visible(&self, viewer_id: Uuid, filter: &LeadFilter) -> Result<Vec<Lead>, AppError> {
        let leads = sqlx::query_as::<_, Lead>(&format!(
            r#"
            SELECT {} FROM leads
            WHERE $1 = ANY(selected_users)
              AND ($2::uuid IS NULL OR pipeline_id = $2)
              AND ($3::bool IS NULL OR is_reject = $3)
              AND ($4::bool IS NULL OR is_converted = $4)
            ORDER BY created_at DESC
            "#,
            LEAD_COLUMNS
        ))
            .bind(viewer_id)
            .bind(filter.pipeline_id)
            .bind(filter.is_reject)
            .bind(filter.is_converted)
            .fetch_all(&self.pool)
            .await?;
        Ok(leads)
    }

    pub async fn list_discussions(&self, lead_id: Uuid) -> Result<Vec<LeadDiscussion>, AppError> {
        let rows = sqlx::query_as::<_, LeadDiscussion>(
            r#"
            SELECT id, lead_id, author_id, comment, created_at
            FROM lead_discussions WHERE lead_id = $1
            ORDER BY created_at ASC
            "#,
        )
            .bind(lead_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_files(&self, lead_id: Uuid) -> Result<Vec<LeadFile>, AppError> {
        let rows = sqlx::query_as::<_, LeadFile>(
            r#"
            SELECT id, lead_id, uploaded_by, file_name, file_url, created_at
            FROM lead_files WHERE lead_id = $1
            ORDER BY created_at ASC
            "#,
        )
            .bind(lead_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // =========================================================================
    //  ESCRITAS
    // =========================================================================

    pub async fn create<'e, E>(&self, executor: E, new: &NewLead<'_>) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            INSERT INTO leads (
                client_id, created_by, selected_users,
                pipeline_id, branch_id, product_stage_id, product_id,
                lead_type_id, source_id, company_name, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
            .bind(new.client_id)
            .bind(new.created_by)
            .bind(new.selected_users)
            .bind(new.routing.pipeline_id)
            .bind(new.routing.branch_id)
            .bind(new.routing.product_stage_id)
            .bind(new.routing.product_id)
            .bind(new.lead_type_id)
            .bind(new.source_id)
            .bind(new.company_name)
            .bind(new.description)
            .fetch_one(executor)
            .await?;
        Ok(lead)
    }

    pub async fn reject<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        reason: &str,
        rejected_by: Uuid,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads
            SET is_reject = true, reject_reason = $2, rejected_by = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
            .bind(id)
            .bind(reason)
            .bind(rejected_by)
            .fetch_one(executor)
            .await?;
        Ok(lead)
    }

    pub async fn restore<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        routing: &TransferSnapshot,
        selected_users: &[Uuid],
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads
            SET is_reject = false, reject_reason = NULL, rejected_by = NULL,
                pipeline_id = $2, branch_id = $3, product_stage_id = $4, product_id = $5,
                selected_users = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
            .bind(id)
            .bind(routing.pipeline_id)
            .bind(routing.branch_id)
            .bind(routing.product_stage_id)
            .bind(routing.product_id)
            .bind(selected_users)
            .fetch_one(executor)
            .await?;
        Ok(lead)
    }

    /// Transferência: quem transfere vira o criador; o anterior fica em `ref_created_by`.
    pub async fn transfer<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        routing: &TransferSnapshot,
        previous: &TransferSnapshot,
        created_by: Uuid,
        selected_users: &[Uuid],
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads
            SET pipeline_id = $2, branch_id = $3, product_stage_id = $4, product_id = $5,
                transfer_from = $6, ref_created_by = created_by, created_by = $7,
                selected_users = $8, is_transfer = true, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
            .bind(id)
            .bind(routing.pipeline_id)
            .bind(routing.branch_id)
            .bind(routing.product_stage_id)
            .bind(routing.product_id)
            .bind(Json(previous))
            .bind(created_by)
            .bind(selected_users)
            .fetch_one(executor)
            .await?;
        Ok(lead)
    }

    pub async fn move_to<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        routing: &TransferSnapshot,
        selected_users: &[Uuid],
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads
            SET pipeline_id = $2, branch_id = $3, product_stage_id = $4, product_id = $5,
                selected_users = $6, is_move = true, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
            .bind(id)
            .bind(routing.pipeline_id)
            .bind(routing.branch_id)
            .bind(routing.product_stage_id)
            .bind(routing.product_id)
            .bind(selected_users)
            .fetch_one(executor)
            .await?;
        Ok(lead)
    }

    pub async fn mark_converted<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE leads SET is_converted = true, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn set_selected_users<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        selected_users: &[Uuid],
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads SET selected_users = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
            .bind(id)
            .bind(selected_users)
            .fetch_one(executor)
            .await?;
        Ok(lead)
    }

    pub async fn set_labels<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        labels: &[String],
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads SET labels = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
            .bind(id)
            .bind(labels)
            .fetch_one(executor)
            .await?;
        Ok(lead)
    }

    // --- Discussões e arquivos ---

    pub async fn add_discussion<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        author_id: Uuid,
        comment: &str,
    ) -> Result<LeadDiscussion, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, LeadDiscussion>(
            r#"
            INSERT INTO lead_discussions (lead_id, author_id, comment)
            VALUES ($1, $2, $3)
            RETURNING id, lead_id, author_id, comment, created_at
            "#,
        )
            .bind(lead_id)
            .bind(author_id)
            .bind(comment)
            .fetch_one(executor)
            .await?;
        Ok(row)
    }

    /// Copia os comentários do phonebook como discussões do lead.
    pub async fn copy_phonebook_comments<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        phonebook_id: Uuid,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO lead_discussions (lead_id, author_id, comment, created_at)
            SELECT $1, user_id, remarks, created_at
            FROM phonebook_comments
            WHERE phonebook_id = $2
            ORDER BY created_at ASC
            "#,
        )
            .bind(lead_id)
            .bind(phonebook_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn add_file<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        uploaded_by: Uuid,
        file_name: &str,
        file_url: &str,
    ) -> Result<LeadFile, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, LeadFile>(
            r#"
            INSERT INTO lead_files (lead_id, uploaded_by, file_name, file_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, lead_id, uploaded_by, file_name, file_url, created_at
            "#,
        )
            .bind(lead_id)
            .bind(uploaded_by)
            .bind(file_name)
            .bind(file_url)
            .fetch_one(executor)
            .await?;
        Ok(row)
    }

    pub async fn delete_file<'e, E>(
        &self,
        executor: E,
        lead_id: Uuid,
        file_id: Uuid,
    ) -> Result<Option<LeadFile>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, LeadFile>(
            r#"
            DELETE FROM lead_files WHERE id = $1 AND lead_id = $2
            RETURNING id, lead_id, uploaded_by, file_name, file_url, created_at
            "#,
        )
            .bind(file_id)
            .bind(lead_id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }
}
