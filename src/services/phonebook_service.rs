// src/services/phonebook_service.rs

use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        csv_rows::{parse_number_rows, NumberRow},
        db_utils::found,
        error::AppError,
        phone::normalize_uae_phone,
    },
    db::Repositories,
    models::{
        auth::{Role, User},
        client::BlockStatus,
        phonebook::{CallStatus, PhonebookComment, PhonebookEntry, StatusUpdateReport, UploadReport},
    },
    services::stakeholders::merge_users,
};

/// Máximo de números "Req to call" ativos por usuário.
pub const REQ_TO_CALL_QUOTA: i64 = 500;

/// Tamanho da fila mantida pela limpeza periódica.
pub const QUEUE_RETENTION: i64 = 400;

const PIPELINE_SUPERVISORS: &[Role] = &[Role::Hod, Role::Manager, Role::Hom];
const GLOBAL_VIEWERS: &[Role] = &[Role::Ceo, Role::Md, Role::Admin];

// =============================================================================
//  PLANEJAMENTO DO UPLOAD (puro)
// =============================================================================

/// Separa as linhas da planilha nos baldes do relatório e decide o que inserir.
pub fn plan_upload(
    rows: &[NumberRow],
    existing_entries: &HashSet<String>,
    existing_clients: &HashSet<String>,
    active_queue: i64,
    quota: i64,
) -> (Vec<String>, UploadReport) {
    let mut report = UploadReport::default();
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for row in rows {
        let Some(number) = normalize_uae_phone(&row.number) else {
            report.incorrect_numbers.push(row.number.clone());
            continue;
        };

        if existing_clients.contains(&number) {
            report.existing_client_numbers.push(number);
        } else if existing_entries.contains(&number) || !seen.insert(number.clone()) {
            report.skipped_numbers.push(number);
        } else {
            candidates.push(number);
        }
    }

    let headroom = (quota - active_queue).max(0) as usize;
    let keep = candidates.len().min(headroom);
    report.truncated_numbers = candidates.split_off(keep);
    report.remaining_slots = (headroom - keep) as i64;
    report.inserted_numbers = candidates.clone();

    (candidates, report)
}

/// Ajusta o relatório ao que o banco de fato gravou: o que perdeu a corrida
/// para outro upload vira "ignorado" e devolve a vaga.
pub fn settle_conflicts(report: &mut UploadReport, stored: &[String]) {
    let stored: HashSet<&str> = stored.iter().map(String::as_str).collect();
    let (kept, lost): (Vec<String>, Vec<String>) = std::mem::take(&mut report.inserted_numbers)
        .into_iter()
        .partition(|n| stored.contains(n.as_str()));

    report.remaining_slots += lost.len() as i64;
    report.skipped_numbers.extend(lost);
    report.inserted_numbers = kept;
}

/// Quem enxerga os números enviados: o dono da fila, quem enviou,
/// supervisores do pipeline e a diretoria.
pub fn upload_visibility(owner: Uuid, uploader: Uuid, pipeline_id: Option<Uuid>, users: &[User]) -> Vec<Uuid> {
    let supervisors = users.iter().filter(|u| {
        u.is_active
            && PIPELINE_SUPERVISORS.contains(&u.role)
            && pipeline_id.is_some_and(|p| u.pipeline_ids.contains(&p))
    });
    let global = users.iter().filter(|u| u.is_active && GLOBAL_VIEWERS.contains(&u.role));

    merge_users(&[owner, uploader], supervisors.chain(global).map(|u| u.id))
}

/// Classifica uma linha de atualização de status. `Err` com o número original quando é inválida.
fn parse_status_row(row: &NumberRow) -> Result<(String, BlockStatus), String> {
    let number = normalize_uae_phone(&row.number).ok_or_else(|| row.number.clone())?;
    let status = row
        .status
        .as_deref()
        .and_then(BlockStatus::parse)
        .ok_or_else(|| row.number.clone())?;
    Ok((number, status))
}

fn bucket(report: &mut StatusUpdateReport, number: String, (matched, changed): (i64, i64)) {
    if matched == 0 {
        report.not_found.push(number);
    } else if changed == 0 {
        report.unchanged.push(number);
    } else {
        report.updated.push(number);
    }
}

fn ensure_visible(entry: &PhonebookEntry, actor: &User) -> Result<(), AppError> {
    if entry.visibility.contains(&actor.id) {
        Ok(())
    } else {
        Err(AppError::NotSelectedUser)
    }
}

// =============================================================================
//  SERVIÇO
// =============================================================================

#[derive(Clone)]
pub struct PhonebookService {
    pool: PgPool,
    repos: Repositories,
}

impl PhonebookService {
    pub fn new(pool: PgPool, repos: Repositories) -> Self {
        Self { pool, repos }
    }

    pub async fn upload(
        &self,
        actor: &User,
        owner_id: Uuid,
        pipeline_id: Option<Uuid>,
        csv: &str,
    ) -> Result<UploadReport, AppError> {
        let rows = parse_number_rows(csv)?;

        let mut tx = self.pool.begin().await?;

        // A trava no dono vale até o commit: contagem e inserção não se intercalam
        if !self.repos.users.lock_active(&mut *tx, owner_id).await? {
            return Err(AppError::NotFound("User"));
        }
        if let Some(pipeline_id) = pipeline_id {
            found(self.repos.directory.find_pipeline(&mut *tx, pipeline_id).await?, "Pipeline")?;
        }

        let normalized: Vec<String> = rows.iter().filter_map(|r| normalize_uae_phone(&r.number)).collect();
        let existing_entries: HashSet<String> = self
            .repos
            .phonebook
            .existing_numbers(&mut *tx, &normalized)
            .await?
            .into_iter()
            .collect();
        let existing_clients: HashSet<String> = self
            .repos
            .clients
            .existing_phones(&mut *tx, &normalized)
            .await?
            .into_iter()
            .collect();
        let active_queue = self.repos.phonebook.count_active_queue(&mut *tx, owner_id).await?;

        let (to_insert, mut report) =
            plan_upload(&rows, &existing_entries, &existing_clients, active_queue, REQ_TO_CALL_QUOTA);

        if to_insert.is_empty() && !report.truncated_numbers.is_empty() {
            return Err(AppError::PhonebookQuotaExhausted);
        }

        if !to_insert.is_empty() {
            let users = self.repos.users.list_active(&mut *tx).await?;
            let visibility = upload_visibility(owner_id, actor.id, pipeline_id, &users);
            let stored = self
                .repos
                .phonebook
                .insert_many(&mut *tx, &to_insert, owner_id, pipeline_id, actor.id, &visibility)
                .await?;
            settle_conflicts(&mut report, &stored);
        }

        tx.commit().await?;

        tracing::info!(
            "📇 Upload de {} para {}: {} inseridos, {} ignorados, {} já clientes, {} inválidos, {} cortados",
            actor.id,
            owner_id,
            report.inserted_numbers.len(),
            report.skipped_numbers.len(),
            report.existing_client_numbers.len(),
            report.incorrect_numbers.len(),
            report.truncated_numbers.len()
        );
        Ok(report)
    }

    pub async fn list(&self, actor: &User, calstatus: Option<CallStatus>) -> Result<Vec<PhonebookEntry>, AppError> {
        self.repos.phonebook.list_visible(actor.id, calstatus).await
    }

    pub async fn comments(&self, actor: &User, entry_id: Uuid) -> Result<Vec<PhonebookComment>, AppError> {
        let entry = found(self.repos.phonebook.find(&self.pool, entry_id).await?, "PhonebookEntry")?;
        ensure_visible(&entry, actor)?;
        self.repos.phonebook.list_comments(&self.pool, entry.id).await
    }

    /// "Convert to Lead" é reservado para a criação do lead.
    pub async fn update_calstatus(
        &self,
        actor: &User,
        entry_id: Uuid,
        calstatus: CallStatus,
    ) -> Result<PhonebookEntry, AppError> {
        if calstatus == CallStatus::ConvertToLead {
            return Err(AppError::ReservedCallStatus);
        }

        let entry = found(self.repos.phonebook.find(&self.pool, entry_id).await?, "PhonebookEntry")?;
        ensure_visible(&entry, actor)?;
        if entry.calstatus == CallStatus::ConvertToLead {
            return Err(AppError::ReservedCallStatus);
        }

        self.repos.phonebook.update_calstatus(&self.pool, entry.id, calstatus).await
    }

    pub async fn add_comment(&self, actor: &User, entry_id: Uuid, remarks: &str) -> Result<PhonebookComment, AppError> {
        let remarks = remarks.trim();
        if remarks.is_empty() {
            return Err(AppError::MissingField("remarks"));
        }

        let entry = found(self.repos.phonebook.find(&self.pool, entry_id).await?, "PhonebookEntry")?;
        ensure_visible(&entry, actor)?;

        self.repos.phonebook.add_comment(&self.pool, entry.id, actor.id, remarks).await
    }

    pub async fn delete(&self, actor: &User, entry_id: Uuid) -> Result<(), AppError> {
        let entry = found(self.repos.phonebook.find(&self.pool, entry_id).await?, "PhonebookEntry")?;
        ensure_visible(&entry, actor)?;

        if !self.repos.phonebook.delete(&self.pool, entry.id).await? {
            return Err(AppError::NotFound("PhonebookEntry"));
        }
        tracing::info!("🗑️ Número {} removido do phonebook por {}", entry.number, actor.id);
        Ok(())
    }

    // =========================================================================
    //  ATUALIZAÇÕES VIA PLANILHA
    // =========================================================================

    /// Planilha `number,status` → status de bloqueio das entradas do phonebook.
    pub async fn update_statuses(&self, csv: &str) -> Result<StatusUpdateReport, AppError> {
        let rows = parse_number_rows(csv)?;
        let mut report = StatusUpdateReport::default();
        let mut tx = self.pool.begin().await?;

        for row in &rows {
            match parse_status_row(row) {
                Ok((number, status)) => {
                    let counts = self.repos.phonebook.update_status_by_number(&mut *tx, &number, status).await?;
                    bucket(&mut report, number, counts);
                }
                Err(raw) => report.invalid.push(raw),
            }
        }

        tx.commit().await?;
        Ok(report)
    }

    /// Planilha `number,status` → DNCR dos clientes.
    pub async fn update_dncr(&self, csv: &str) -> Result<StatusUpdateReport, AppError> {
        let rows = parse_number_rows(csv)?;
        let mut report = StatusUpdateReport::default();
        let mut tx = self.pool.begin().await?;

        for row in &rows {
            match parse_status_row(row) {
                Ok((number, status)) => {
                    let counts = self.repos.clients.update_dncr_status(&mut *tx, &number, status).await?;
                    bucket(&mut report, number, counts);
                }
                Err(raw) => report.invalid.push(raw),
            }
        }

        tx.commit().await?;
        Ok(report)
    }

    /// Mantém apenas os `QUEUE_RETENTION` "Req to call" mais recentes de cada usuário.
    pub async fn trim_queues(&self) -> Result<u64, AppError> {
        self.repos.phonebook.trim_queues(QUEUE_RETENTION).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(number: &str) -> NumberRow {
        NumberRow { number: number.to_string(), status: None }
    }

    fn set(numbers: &[&str]) -> HashSet<String> {
        numbers.iter().map(|n| n.to_string()).collect()
    }

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: format!("{:?}", role),
            email: String::new(),
            password_hash: String::new(),
            role,
            branch_id: None,
            pipeline_ids: Vec::new(),
            product_ids: Vec::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn upload_sorts_rows_into_buckets() {
        let rows = vec![
            row("0501111111"),
            row("0502222222"),
            row("0503333333"),
            row("12345"),
            row("0501111111"),
        ];
        let (insert, report) = plan_upload(
            &rows,
            &set(&["+971502222222"]),
            &set(&["+971503333333"]),
            0,
            REQ_TO_CALL_QUOTA,
        );

        assert_eq!(insert, vec!["+971501111111".to_string()]);
        assert_eq!(report.inserted_numbers, insert);
        assert_eq!(report.skipped_numbers, vec!["+971502222222", "+971501111111"]);
        assert_eq!(report.existing_client_numbers, vec!["+971503333333"]);
        assert_eq!(report.incorrect_numbers, vec!["12345"]);
        assert!(report.truncated_numbers.is_empty());
        assert_eq!(report.remaining_slots, REQ_TO_CALL_QUOTA - 1);
    }

    #[test]
    fn quota_truncates_the_batch() {
        let rows = vec![row("0501000001"), row("0501000002"), row("0501000003")];
        let (insert, report) = plan_upload(&rows, &HashSet::new(), &HashSet::new(), 498, REQ_TO_CALL_QUOTA);

        assert_eq!(insert.len(), 2);
        assert_eq!(report.truncated_numbers, vec!["+971501000003"]);
        assert_eq!(report.remaining_slots, 0);
        assert!(498 + insert.len() as i64 <= REQ_TO_CALL_QUOTA);
    }

    #[test]
    fn full_queue_inserts_nothing() {
        let rows = vec![row("0501000001")];
        let (insert, report) = plan_upload(&rows, &HashSet::new(), &HashSet::new(), 520, REQ_TO_CALL_QUOTA);

        assert!(insert.is_empty());
        assert_eq!(report.truncated_numbers.len(), 1);
        assert_eq!(report.remaining_slots, 0);
    }

    #[test]
    fn second_upload_of_the_same_number_is_skipped() {
        let rows = vec![row("0501234567")];
        let (first, _) = plan_upload(&rows, &HashSet::new(), &HashSet::new(), 0, REQ_TO_CALL_QUOTA);
        let existing: HashSet<String> = first.into_iter().collect();

        let (second, report) = plan_upload(&rows, &existing, &HashSet::new(), 1, REQ_TO_CALL_QUOTA);
        assert!(second.is_empty());
        assert_eq!(report.skipped_numbers, vec!["+971501234567"]);
        assert!(report.inserted_numbers.is_empty());
    }

    #[test]
    fn number_taken_by_a_parallel_upload_is_reported_as_skipped() {
        let rows = vec![row("0501000001"), row("0501000002")];
        let (insert, mut report) = plan_upload(&rows, &HashSet::new(), &HashSet::new(), 498, REQ_TO_CALL_QUOTA);
        assert_eq!(insert.len(), 2);

        settle_conflicts(&mut report, &["+971501000002".to_string()]);

        assert_eq!(report.inserted_numbers, vec!["+971501000002"]);
        assert_eq!(report.skipped_numbers, vec!["+971501000001"]);
        assert_eq!(report.remaining_slots, 1);
        assert!(498 + report.inserted_numbers.len() as i64 <= REQ_TO_CALL_QUOTA);
    }

    #[test]
    fn visibility_covers_owner_uploader_supervisors_and_leadership() {
        let pipeline = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let uploader = Uuid::new_v4();

        let mut hod = user(Role::Hod);
        hod.pipeline_ids = vec![pipeline];
        let mut other_manager = user(Role::Manager);
        other_manager.pipeline_ids = vec![Uuid::new_v4()];
        let ceo = user(Role::Ceo);
        let agent = user(Role::SalesAgent);

        let users = vec![hod.clone(), other_manager.clone(), ceo.clone(), agent.clone()];
        let visibility = upload_visibility(owner, uploader, Some(pipeline), &users);

        assert_eq!(&visibility[..2], &[owner, uploader]);
        assert!(visibility.contains(&hod.id));
        assert!(visibility.contains(&ceo.id));
        assert!(!visibility.contains(&other_manager.id));
        assert!(!visibility.contains(&agent.id));
    }

    #[test]
    fn status_rows_need_a_valid_number_and_status() {
        let ok = NumberRow { number: "0501234567".into(), status: Some("blocked".into()) };
        assert_eq!(parse_status_row(&ok), Ok(("+971501234567".to_string(), BlockStatus::Blocked)));

        let no_status = NumberRow { number: "0501234567".into(), status: None };
        assert_eq!(parse_status_row(&no_status), Err("0501234567".to_string()));

        let bad_status = NumberRow { number: "0501234567".into(), status: Some("maybe".into()) };
        assert!(parse_status_row(&bad_status).is_err());

        let bad_number = NumberRow { number: "abc".into(), status: Some("BLOCKED".into()) };
        assert_eq!(parse_status_row(&bad_number), Err("abc".to_string()));
    }

    #[test]
    fn status_counts_choose_the_bucket() {
        let mut report = StatusUpdateReport::default();
        bucket(&mut report, "a".into(), (0, 0));
        bucket(&mut report, "b".into(), (1, 0));
        bucket(&mut report, "c".into(), (2, 2));

        assert_eq!(report.not_found, vec!["a"]);
        assert_eq!(report.unchanged, vec!["b"]);
        assert_eq!(report.updated, vec!["c"]);
    }
}
