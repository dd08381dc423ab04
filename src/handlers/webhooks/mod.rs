pub mod common;
pub mod gateway;
pub mod moneymotion;

pub use gateway::handle_gateway_webhook;
pub use moneymotion::handle_moneymotion_webhook;

use axum::{routing::post, Router};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/payments/webhook", post(handle_gateway_webhook))
        .route(
            "/api/payments/moneymotion/webhook",
            post(handle_moneymotion_webhook),
        )
}
