use crate::error::{api_success, ApiResponse};
use crate::server::PharmacyServer;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the store is unreachable
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "2025-01-15T10:30:00Z")]
    pub timestamp: String,
    #[schema(example = "0.1.0")]
    pub version: String,
    /// Seconds since the server started
    #[schema(example = 3600)]
    pub uptime: u64,
    pub checks: BTreeMap<String, String>,
}

/// Version information response
#[derive(Debug, Serialize, ToSchema)]
pub struct VersionResponse {
    #[schema(example = "pharmacy-server")]
    pub name: String,
    #[schema(example = "0.1.0")]
    pub version: String,
    pub features: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "System is healthy", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(
    State(server): State<PharmacyServer>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let mut checks = BTreeMap::new();
    let database_ok = match server.store.ping().await {
        Ok(()) => {
            checks.insert("database".to_string(), "healthy".to_string());
            true
        }
        Err(err) => {
            tracing::error!(error = %err, "Health check: store ping failed");
            checks.insert("database".to_string(), format!("unhealthy: {err}"));
            false
        }
    };

    let (status_code, status) = if database_ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let response = HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: server.uptime_secs(),
        checks,
    };

    (status_code, Json(api_success(response)))
}

#[utoipa::path(
    get,
    path = "/version",
    tag = "health",
    responses(
        (status = 200, description = "Version information", body = VersionResponse)
    )
)]
pub async fn version_info() -> Json<ApiResponse<VersionResponse>> {
    let features = [
        "prescription_fulfillment",
        "inventory",
        "pricing",
        "payments",
        "billing_log",
        "jwt_auth",
    ]
    .iter()
    .map(|f| f.to_string())
    .collect();

    Json(api_success(VersionResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        features,
    }))
}
