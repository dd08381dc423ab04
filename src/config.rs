use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    /// Prefix for generated license keys (e.g. "MGMA")
    pub license_key_prefix: String,
    /// Admin back-office key; admin routes are disabled when unset
    pub admin_api_key: Option<String>,
    /// MoneyMotion API key; without it checkout falls back to local mock sessions
    pub moneymotion_api_key: Option<String>,
    pub moneymotion_api_url: String,
    /// Webhook signature secret; verification is skipped when unset
    pub moneymotion_webhook_secret: Option<String>,
    /// Resend API key for confirmation emails; log-only delivery when unset
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("MAGMA_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "magma.db".to_string()),
            base_url,
            license_key_prefix: env::var("MAGMA_LICENSE_KEY_PREFIX")
                .unwrap_or_else(|_| "MGMA".to_string()),
            admin_api_key: env::var("MAGMA_ADMIN_API_KEY").ok(),
            moneymotion_api_key: env::var("MAGMA_MONEYMOTION_API_KEY").ok(),
            moneymotion_api_url: env::var("MAGMA_MONEYMOTION_API_URL")
                .unwrap_or_else(|_| "https://api.moneymotion.io/v1".to_string()),
            moneymotion_webhook_secret: env::var("MAGMA_MONEYMOTION_WEBHOOK_SECRET").ok(),
            resend_api_key: env::var("MAGMA_RESEND_API_KEY").ok(),
            email_from: env::var("MAGMA_EMAIL_FROM")
                .unwrap_or_else(|_| "Magma Shop <orders@magma.gg>".to_string()),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
