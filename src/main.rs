//! Registration service entry point
//!
//! Serves the registration API over HTTP, backed by Postgres (or the
//! in-memory store in development).

use recruit_registrations::config::{AppConfig, LogFormat, StoreBackend};
use recruit_registrations::database::{create_pool, run_migrations};
use recruit_registrations::notifications::{
    AuditLogNotifier, CompositeNotifier, DiscordWebhookNotifier, NoopNotifier, Notifier,
};
use recruit_registrations::repositories::{
    InMemoryRegistrationRepository, PgRegistrationRepository, RegistrationRepository,
};
use recruit_registrations::{router, AppError, AppResult, AppState, RegistrationService, SystemClock};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "recruit_registrations={},tower_http={},sqlx=warn",
            config.log_level, config.log_level
        )
        .into()
    });

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

fn build_notifier(app_config: &AppConfig) -> Arc<dyn Notifier> {
    let config = &app_config.notifier;
    let mut composite = CompositeNotifier::new(Vec::new());

    if let Some(url) = &config.discord_webhook_url {
        match DiscordWebhookNotifier::new(url.clone()) {
            Ok(discord) => {
                composite.push(Arc::new(discord));
                info!("✓ Discord notifier enabled");
            }
            Err(e) => warn!("Discord notifier disabled: {}", e),
        }
    }

    if let Some(dir) = &config.audit_log_dir {
        match AuditLogNotifier::new(dir) {
            Ok(audit) => {
                info!("✓ Audit log notifier writing to {}", audit.log_directory().display());
                composite.push(Arc::new(audit));
            }
            Err(e) => warn!("Audit log notifier disabled: {}", e),
        }
    }

    if composite.is_empty() {
        if app_config.is_production() {
            warn!("No notifiers configured; admin actions will not be announced or audited");
        } else {
            info!("No notifiers configured");
        }
        Arc::new(NoopNotifier)
    } else {
        Arc::new(composite)
    }
}

async fn build_repository(config: &AppConfig) -> AppResult<Arc<dyn RegistrationRepository>> {
    match config.store_backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost on shutdown");
            Ok(Arc::new(InMemoryRegistrationRepository::new()))
        }
        StoreBackend::Postgres => {
            info!("Connecting to database...");
            let pool = create_pool(&config.database).await.map_err(|e| {
                error!("Failed to create database pool: {}", e);
                AppError::Database(e)
            })?;
            info!("Max connections: {}", config.database.max_connections);

            info!("Running database migrations...");
            run_migrations(&pool, None).await.map_err(|e| {
                error!("Database migration failed: {}", e);
                AppError::Database(e)
            })?;
            info!("Database migrations completed successfully");

            Ok(Arc::new(PgRegistrationRepository::new(pool)))
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    init_tracing(&config);

    info!("Registration service starting");
    info!("Environment: {}", config.environment);
    info!("Store backend: {:?}", config.store_backend);

    let repository = build_repository(&config).await?;
    let notifier = build_notifier(&config);

    let service = RegistrationService::new(repository, Arc::new(SystemClock), notifier)
        .with_retry(config.retry);
    let app = router(AppState::new(Arc::new(service)));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid HTTP address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind HTTP server: {}", e)))?;

    info!("✓ HTTP server listening on {}", addr);
    info!("Press Ctrl+C to shutdown gracefully");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("HTTP server exited unexpectedly: {}", e);
            }
        }
    }

    info!("Registration service shutdown complete");
    Ok(())
}
