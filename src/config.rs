// src/config.rs

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::Repositories,
    services::{
        auth::AuthService,
        commission_service::CommissionService,
        contract_service::ContractService,
        deal_service::DealService,
        lead_service::LeadService,
        notification_service::{BroadcastHub, NotificationService},
        phonebook_service::PhonebookService,
        stakeholders::StakeholderRules,
        target_service::TargetService,
        whatsapp_service::WhatsappService,
    },
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_TARGET_RENEWAL_CRON: &str = "0 0 * * * *";
const DEFAULT_PHONEBOOK_CLEANUP_CRON: &str = "0 0 3 * * *";
const PUSH_CHANNEL_CAPACITY: usize = 1024;

/// Configuração lida do ambiente (.env incluso).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub target_renewal_cron: String,
    pub phonebook_cleanup_cron: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR inválido")?;

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.parse().context("DB_MAX_CONNECTIONS inválido")?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            db_max_connections,
            target_renewal_cron: lookup("TARGET_RENEWAL_CRON")
                .unwrap_or_else(|| DEFAULT_TARGET_RENEWAL_CRON.to_string()),
            phonebook_cleanup_cron: lookup("PHONEBOOK_CLEANUP_CRON")
                .unwrap_or_else(|| DEFAULT_PHONEBOOK_CLEANUP_CRON.to_string()),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: AppConfig,
    pub i18n_store: Arc<I18nStore>,
    pub repos: Repositories,
    pub push_hub: BroadcastHub,

    pub auth_service: AuthService,
    pub notification_service: NotificationService,
    pub lead_service: LeadService,
    pub contract_service: ContractService,
    pub deal_service: DealService,
    pub commission_service: CommissionService,
    pub target_service: TargetService,
    pub phonebook_service: PhonebookService,
    pub whatsapp_service: WhatsappService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = AppConfig::from_env()?;

        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::build(db_pool, config, I18nStore::load()?))
    }

    // --- Monta o gráfico de dependências ---
    fn build(db_pool: PgPool, config: AppConfig, i18n_store: I18nStore) -> Self {
        let repos = Repositories::new(&db_pool);
        let push_hub = BroadcastHub::new(PUSH_CHANNEL_CAPACITY);
        let notification_service = NotificationService::new(repos.activity.clone(), Arc::new(push_hub.clone()));

        let auth_service = AuthService::new(repos.users.clone(), config.jwt_secret.clone());
        let lead_service = LeadService::new(
            db_pool.clone(),
            repos.clone(),
            notification_service.clone(),
            StakeholderRules::default(),
        );
        let contract_service = ContractService::new(db_pool.clone(), repos.clone(), notification_service.clone());
        let deal_service = DealService::new(db_pool.clone(), repos.clone(), notification_service.clone());
        let commission_service = CommissionService::new(db_pool.clone(), repos.clone());
        let target_service = TargetService::new(db_pool.clone(), repos.clone());
        let phonebook_service = PhonebookService::new(db_pool.clone(), repos.clone());
        let whatsapp_service = WhatsappService::new(db_pool.clone(), repos.clone(), notification_service.clone());

        Self {
            db_pool,
            config,
            i18n_store: Arc::new(i18n_store),
            repos,
            push_hub,
            auth_service,
            notification_service,
            lead_service,
            contract_service,
            deal_service,
            commission_service,
            target_service,
            phonebook_service,
            whatsapp_service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/crm"),
            ("JWT_SECRET", "segredo"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.target_renewal_cron, DEFAULT_TARGET_RENEWAL_CRON);
        assert_eq!(config.phonebook_cleanup_cron, DEFAULT_PHONEBOOK_CLEANUP_CRON);
    }

    #[test]
    fn missing_secret_fails() {
        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/crm")])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn invalid_numbers_fail_startup() {
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/crm"),
            ("JWT_SECRET", "segredo"),
            ("DB_MAX_CONNECTIONS", "muitas"),
        ]));
        assert!(result.is_err());
    }
}
