mod schema;
pub mod from_row;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::email::EmailService;
use crate::payments::{MoneyMotionClient, SessionCache};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Main database pool (products, orders, licenses, coupons, outbox)
    pub db: DbPool,
    /// Base URL for webhook callbacks and the dispatch trigger
    pub base_url: String,
    /// Prefix for generated license keys
    pub license_key_prefix: String,
    /// Admin back-office key; admin routes reject everything when unset
    pub admin_api_key: Option<String>,
    /// MoneyMotion API client; None = local mock checkout mode
    pub moneymotion: Option<MoneyMotionClient>,
    /// Webhook signature secret; None = verification skipped
    pub moneymotion_webhook_secret: Option<String>,
    /// Process-local payment session cache
    pub sessions: Arc<SessionCache>,
    /// Confirmation email delivery
    pub email_service: Arc<EmailService>,
    /// Shared HTTP client for fire-and-forget outbox triggers
    pub http_client: reqwest::Client,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
