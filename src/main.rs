use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use magma::config::Config;
use magma::db::{create_pool, init_db, queries, AppState};
use magma::email::EmailService;
use magma::handlers;
use magma::models::{CreateCoupon, CreateProduct};
use magma::payments::{MoneyMotionClient, SessionCache};

#[derive(Parser, Debug)]
#[command(name = "magma")]
#[command(about = "Storefront and licensing backend for Magma products")]
struct Cli {
    /// Seed the database with dev data (products, a test coupon)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for testing.
/// Only runs in dev mode and when the catalog is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing = queries::list_products(&conn).expect("Failed to list products");
    if !existing.is_empty() {
        tracing::info!("Database already has products, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    for (slug, name) in [
        ("apex", "Magma Apex"),
        ("warzone", "Magma Warzone"),
        ("rust-ultimate", "Magma Rust Ultimate"),
    ] {
        let product = queries::create_product(
            &conn,
            &CreateProduct {
                slug: slug.to_string(),
                name: name.to_string(),
            },
        )
        .expect("Failed to create dev product");
        tracing::info!("Product: {} (id: {}, slug: {})", product.name, product.id, product.slug);
    }

    let coupon = queries::create_coupon(
        &conn,
        &CreateCoupon {
            code: "LAUNCH20".to_string(),
            discount_percent: 20,
            max_uses: 100,
            valid_until: None,
        },
    )
    .expect("Failed to create dev coupon");
    tracing::info!("Coupon: {} ({}% off)", coupon.code, coupon.discount_percent);

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED SUCCESSFULLY");
    tracing::info!("============================================");
}

/// Spawns the maintenance loop: drains the email outbox (safety net for
/// lost dispatch triggers) and ages out expired licenses.
/// Runs every 5 minutes.
fn spawn_maintenance_task(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(5 * 60);

        loop {
            tokio::time::sleep(interval).await;

            match handlers::emails::drain_outbox(&state).await {
                Ok(result) if result.processed > 0 => {
                    tracing::debug!(
                        "maintenance: drained outbox (sent={}, failed={})",
                        result.sent,
                        result.failed
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("maintenance: outbox drain failed: {}", e);
                }
            }

            match state.db.get() {
                Ok(conn) => match queries::mark_expired_licenses(&conn) {
                    Ok(count) if count > 0 => {
                        tracing::debug!("maintenance: expired {} licenses", count);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("maintenance: license expiry sweep failed: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("maintenance: failed to get db connection: {}", e);
                }
            }
        }
    });

    tracing::info!("Background maintenance task started (runs every 5 minutes)");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "magma=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    // Create database connection pool and initialize schema
    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let moneymotion = config
        .moneymotion_api_key
        .as_deref()
        .map(|key| MoneyMotionClient::new(key, &config.moneymotion_api_url));

    if moneymotion.is_none() {
        tracing::warn!("No MoneyMotion API key configured - checkout runs in local mock mode");
    }
    if config.admin_api_key.is_none() {
        tracing::warn!("No admin API key configured - admin routes are disabled");
    }

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        license_key_prefix: config.license_key_prefix.clone(),
        admin_api_key: config.admin_api_key.clone(),
        moneymotion,
        moneymotion_webhook_secret: config.moneymotion_webhook_secret.clone(),
        sessions: Arc::new(SessionCache::new()),
        email_service: Arc::new(EmailService::new(
            config.resend_api_key.clone(),
            config.email_from.clone(),
        )),
        http_client: reqwest::Client::new(),
    };

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set MAGMA_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    spawn_maintenance_task(state.clone());

    // Build the application router
    let app = Router::new()
        .merge(handlers::purchase::router())
        .merge(handlers::payments::router())
        .merge(handlers::webhooks::router())
        .merge(handlers::emails::router())
        .merge(handlers::admin::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Magma server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
        tracing::info!("Ephemeral cleanup complete");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
