//! fincontrol API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use fincontrol_application::{
    AuditInterceptor, AuditLogService, AuditedEntityRepository, AuthorizationService,
    RecordService,
};
use fincontrol_core::AppError;
use fincontrol_infrastructure::{
    PostgresAuditLogRepository, PostgresAuditRecordStore, PostgresAuthorizationRepository,
    PostgresEntityRepository,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, init_tracing};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    if config.audit_policy.is_enabled() {
        info!(
            redacted_fields = config.audit_policy.redaction().fields().count(),
            "audit capture enabled"
        );
    } else {
        warn!("audit capture disabled by AUDIT_ENABLED");
    }

    let authorization_service =
        AuthorizationService::new(Arc::new(PostgresAuthorizationRepository::new(pool.clone())));
    let interceptor = AuditInterceptor::new(
        Arc::new(PostgresAuditRecordStore::new(pool.clone())),
        config.audit_policy.clone(),
    );
    let entity_repository = Arc::new(AuditedEntityRepository::new(
        Arc::new(PostgresEntityRepository::new(pool.clone())),
        interceptor,
    ));

    let app_state = AppState {
        record_service: RecordService::new(authorization_service.clone(), entity_repository),
        audit_log_service: AuditLogService::new(
            authorization_service,
            Arc::new(PostgresAuditLogRepository::new(pool.clone())),
        ),
        identity_header: config.identity_header.clone(),
        audit_enabled: config.audit_policy.is_enabled(),
        postgres_pool: pool,
    };

    let protected_routes = Router::new()
        .route(
            "/api/entities/{entity}/records",
            get(handlers::records::list_records_handler)
                .post(handlers::records::create_record_handler),
        )
        .route(
            "/api/entities/{entity}/records/bulk",
            post(handlers::records::bulk_create_records_handler)
                .patch(handlers::records::bulk_update_records_handler)
                .delete(handlers::records::bulk_delete_records_handler),
        )
        .route(
            "/api/entities/{entity}/records/{record_id}",
            get(handlers::records::get_record_handler)
                .patch(handlers::records::update_record_handler)
                .put(handlers::records::save_record_handler)
                .delete(handlers::records::delete_record_handler),
        )
        .route(
            "/api/entities/{entity}/records/{record_id}/soft-delete",
            post(handlers::records::soft_delete_record_handler),
        )
        .route(
            "/api/audit-log",
            get(handlers::audit_log::list_audit_log_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_actor,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "fincontrol-api listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
