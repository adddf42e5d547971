use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::{ApiQuery, AuthContext};
use crate::server::PharmacyServer;
use crate::services::identity;
use axum::{extract::State, Json};
use database_layer::BillingLogEntry;
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogQuery {
    /// Case-insensitive match on drug or patient name
    pub search: Option<String>,
}

/// Billing history of the pharmacy, ordered by patient then newest first.
#[utoipa::path(
    get,
    path = "/api/v1/pharmacy/logs",
    params(LogQuery),
    responses(
        (status = 200, description = "Billing log entries", body = Vec<BillingLogEntry>),
        (status = 404, description = "No matching billing records, or no active pharmacy")
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn billing_log(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
    ApiQuery(query): ApiQuery<LogQuery>,
) -> Result<Json<ApiResponse<Vec<BillingLogEntry>>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let entries = server.store.billing_log(pharmacy.pharmacy_id, search).await?;
    if entries.is_empty() {
        return Err(ApiError::not_found("No billing records found"));
    }
    Ok(Json(api_success(entries)))
}
