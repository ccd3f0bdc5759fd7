// src/services/scheduler.rs

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::services::{phonebook_service::PhonebookService, target_service::TargetService};

/// Varreduras periódicas do sistema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    TargetRenewal,
    PhonebookCleanup,
}

impl Job {
    fn name(self) -> &'static str {
        match self {
            Job::TargetRenewal => "target-renewal",
            Job::PhonebookCleanup => "phonebook-cleanup",
        }
    }
}

struct ScheduledJob {
    job: Job,
    schedule: Schedule,
    next_run: Option<DateTime<Utc>>,
}

pub fn parse_schedule(expression: &str) -> anyhow::Result<Schedule> {
    Schedule::from_str(expression)
        .map_err(|e| anyhow::anyhow!("Expressão cron inválida '{}': {}", expression, e))
}

/// Próxima execução estritamente depois de `now`.
pub fn next_run_after(schedule: &Schedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&now).next()
}

pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    targets: TargetService,
    phonebook: PhonebookService,
}

impl Scheduler {
    pub fn new(
        target_renewal_cron: &str,
        phonebook_cleanup_cron: &str,
        targets: TargetService,
        phonebook: PhonebookService,
    ) -> anyhow::Result<Self> {
        let now = Utc::now();
        let jobs = [
            (Job::TargetRenewal, target_renewal_cron),
            (Job::PhonebookCleanup, phonebook_cleanup_cron),
        ]
        .into_iter()
        .map(|(job, expression)| {
            let schedule = parse_schedule(expression)?;
            let next_run = next_run_after(&schedule, now);
            Ok(ScheduledJob { job, schedule, next_run })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self { jobs, targets, phonebook })
    }

    /// Loop de fundo: acorda a cada minuto e roda o que venceu.
    pub fn start(mut self) {
        tokio::spawn(async move {
            for job in &self.jobs {
                tracing::info!("⏰ Job {} agendado para {:?}", job.job.name(), job.next_run);
            }

            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                self.run_due(Utc::now()).await;
            }
        });
    }

    async fn run_due(&mut self, now: DateTime<Utc>) {
        let due: Vec<Job> = self
            .jobs
            .iter()
            .filter(|j| j.next_run.is_some_and(|at| at <= now))
            .map(|j| j.job)
            .collect();

        for job in due {
            self.execute(job, now).await;
            if let Some(entry) = self.jobs.iter_mut().find(|j| j.job == job) {
                entry.next_run = next_run_after(&entry.schedule, now);
            }
        }
    }

    async fn execute(&self, job: Job, now: DateTime<Utc>) {
        // Falha de uma execução só é logada; a próxima tenta de novo.
        match job {
            Job::TargetRenewal => match self.targets.renew_due(now.date_naive()).await {
                Ok(0) => tracing::debug!("Nenhuma meta para renovar"),
                Ok(n) => tracing::info!("🎯 {} meta(s) renovada(s)", n),
                Err(e) => tracing::error!("🔥 Falha na renovação de metas: {}", e),
            },
            Job::PhonebookCleanup => match self.phonebook.trim_queues().await {
                Ok(n) => tracing::info!("🧹 Limpeza do phonebook removeu {} número(s)", n),
                Err(e) => tracing::error!("🔥 Falha na limpeza do phonebook: {}", e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_expressions_parse() {
        assert!(parse_schedule("0 0 * * * *").is_ok());
        assert!(parse_schedule("0 0 3 * * *").is_ok());
    }

    #[test]
    fn garbage_expression_is_rejected() {
        assert!(parse_schedule("every hour").is_err());
    }

    #[test]
    fn hourly_job_fires_on_the_next_hour() {
        let schedule = parse_schedule("0 0 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 14, 25, 0).unwrap();
        assert_eq!(
            next_run_after(&schedule, now),
            Some(Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap())
        );
    }

    #[test]
    fn daily_cleanup_rolls_over_to_tomorrow() {
        let schedule = parse_schedule("0 0 3 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 3, 0, 0).unwrap();
        assert_eq!(
            next_run_after(&schedule, now),
            Some(Utc.with_ymd_and_hms(2025, 3, 11, 3, 0, 0).unwrap())
        );
    }
}
