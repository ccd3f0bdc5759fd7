//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;
use crate::services::scheduler::Scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new().await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    Scheduler::new(
        &app_state.config.target_renewal_cron,
        &app_state.config.phonebook_cleanup_cron,
        app_state.target_service.clone(),
        app_state.phonebook_service.clone(),
    )?
    .start();

    let bind_addr = app_state.config.bind_addr;
    let app = router(app_state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(app_state: AppState) -> Router {
    // Tudo abaixo passa pelo auth_guard
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route("/me/permissions", get(handlers::auth::get_my_permissions));

    let directory_routes = Router::new()
        .route("/products", get(handlers::directory::list_products))
        .route("/products/{id}/stages", get(handlers::directory::list_product_stages))
        .route("/pipelines", get(handlers::directory::list_pipelines))
        .route("/branches", get(handlers::directory::list_branches))
        .route("/lead-types", get(handlers::directory::list_lead_types))
        .route("/sources", get(handlers::directory::list_sources))
        .route("/deal-stages", get(handlers::directory::list_deal_stages))
        .route("/contract-stages", get(handlers::directory::list_contract_stages));

    let lead_routes = Router::new()
        .route("/"
               ,post(handlers::leads::create_lead)
               .get(handlers::leads::list_leads)
        )
        .route("/{id}", get(handlers::leads::get_lead))
        .route("/{id}/reject", put(handlers::leads::reject_lead))
        .route("/{id}/restore", put(handlers::leads::restore_lead))
        .route("/{id}/transfer", put(handlers::leads::transfer_lead))
        .route("/{id}/move", put(handlers::leads::move_lead))
        .route("/{id}/convert", post(handlers::leads::convert_lead))
        .route("/{id}/users", post(handlers::leads::add_lead_user))
        .route("/{id}/users/{user_id}", delete(handlers::leads::remove_lead_user))
        .route("/{id}/discussions", post(handlers::leads::add_discussion))
        .route("/{id}/files", post(handlers::leads::add_file))
        .route("/{id}/files/{file_id}", delete(handlers::leads::delete_file))
        .route("/{id}/labels", patch(handlers::leads::set_labels))
        .route("/{id}/whatsapp", get(handlers::leads::list_whatsapp));

    let contract_routes = Router::new()
        .route("/", get(handlers::contracts::list_contracts))
        .route("/{id}", get(handlers::contracts::get_contract))
        .route("/{id}/stage", put(handlers::contracts::update_stage))
        .route("/{id}/reject", put(handlers::contracts::reject_contract))
        .route("/{id}/restore", put(handlers::contracts::restore_contract))
        .route("/{id}/convert", post(handlers::contracts::convert_contract))
        .route("/{id}/commission", put(handlers::contracts::update_commission));

    let deal_routes = Router::new()
        .route("/", get(handlers::deals::list_deals))
        .route("/{id}", get(handlers::deals::get_deal))
        .route("/{id}/stage", put(handlers::deals::update_stage))
        .route("/{id}/stage/collected", put(handlers::deals::mark_collected))
        .route("/{id}/reject", put(handlers::deals::reject_deal))
        .route("/{id}/restore", put(handlers::deals::restore_deal))
        .route("/{id}/report", put(handlers::deals::toggle_report))
        .route("/{id}/report/approve", put(handlers::deals::approve_report));

    let commission_routes = Router::new()
        .route("/payments", post(handlers::commissions::create_payment))
        .route("/payments/{id}", put(handlers::commissions::apply_payment))
        .route("/{id}", get(handlers::commissions::get_sheet))
        .route("/{id}/entries", put(handlers::commissions::upsert_entry))
        .route("/{id}/entries/{user_id}", delete(handlers::commissions::remove_entry));

    let target_routes = Router::new().route(
        "/",
        post(handlers::targets::create_target).get(handlers::targets::list_targets),
    );

    let phonebook_routes = Router::new()
        .route("/", get(handlers::phonebook::list_entries))
        .route("/upload", post(handlers::phonebook::upload))
        .route("/status", post(handlers::phonebook::update_statuses))
        .route("/dncr", post(handlers::phonebook::update_dncr))
        .route("/{id}", delete(handlers::phonebook::delete_entry))
        .route("/{id}/calstatus", put(handlers::phonebook::update_calstatus))
        .route("/{id}/comments"
               ,get(handlers::phonebook::list_comments)
               .post(handlers::phonebook::add_comment)
        );

    let notification_routes = Router::new()
        .route("/", get(handlers::notifications::list_notifications))
        .route("/stream", get(handlers::notifications::stream))
        .route("/read-all", put(handlers::notifications::mark_all_read))
        .route("/{id}/read", put(handlers::notifications::mark_read));

    let protected = Router::new()
        .nest("/api/auth", user_routes)
        .nest("/api/directory", directory_routes)
        .nest("/api/leads", lead_routes)
        .nest("/api/contracts", contract_routes)
        .nest("/api/deals", deal_routes)
        .nest("/api/commissions", commission_routes)
        .nest("/api/targets", target_routes)
        .nest("/api/phonebook", phonebook_routes)
        .nest("/api/notifications", notification_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        // Rotas públicas
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/whatsapp/webhook", post(handlers::whatsapp::webhook))
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}
