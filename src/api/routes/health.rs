//! Liveness endpoints

use chrono::Utc;

/// GET /
pub async fn banner() -> String {
    format!(
        "Keep-alive monitor is running. Time: {}",
        Utc::now().to_rfc3339()
    )
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}
