//! Pharmacy work queues and the dispense step

use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::{ApiPath, AuthContext};
use crate::server::PharmacyServer;
use crate::services::{fulfillment, identity, DispenseOutcome};
use axum::{extract::State, Json};
use database_layer::{PatientSummary, PendingRequest, Pharmacy, PrescriptionStatus, QueueEntry};

/// Pending prescriptions with the stock on hand for each.
#[utoipa::path(
    get,
    path = "/api/v1/pharmacy/requests",
    responses(
        (status = 200, description = "Pending requests with inventory flags", body = Vec<PendingRequest>),
        (status = 404, description = "No active pharmacy for the caller")
    ),
    tag = "pharmacy",
    security(("bearer_auth" = []))
)]
pub async fn pending_requests(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<PendingRequest>>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let requests = server.store.pending_requests(pharmacy.pharmacy_id).await?;
    Ok(Json(api_success(requests)))
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacy/queue",
    responses(
        (status = 200, description = "Pending prescriptions, oldest first", body = Vec<QueueEntry>),
        (status = 404, description = "No active pharmacy for the caller")
    ),
    tag = "pharmacy",
    security(("bearer_auth" = []))
)]
pub async fn queue(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<QueueEntry>>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let entries = server
        .store
        .prescriptions_by_status(pharmacy.pharmacy_id, PrescriptionStatus::Pending)
        .await?;
    Ok(Json(api_success(entries)))
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacy/prescriptions/filled",
    responses(
        (status = 200, description = "Filled prescriptions awaiting dispense, oldest first", body = Vec<QueueEntry>),
        (status = 404, description = "No active pharmacy for the caller")
    ),
    tag = "pharmacy",
    security(("bearer_auth" = []))
)]
pub async fn filled_prescriptions(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<QueueEntry>>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let entries = server
        .store
        .prescriptions_by_status(pharmacy.pharmacy_id, PrescriptionStatus::Filled)
        .await?;
    Ok(Json(api_success(entries)))
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacy/patients",
    responses(
        (status = 200, description = "Patients with prescriptions at this pharmacy", body = Vec<PatientSummary>),
        (status = 404, description = "No active pharmacy for the caller")
    ),
    tag = "pharmacy",
    security(("bearer_auth" = []))
)]
pub async fn patients(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<PatientSummary>>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let patients = server.store.pharmacy_patients(pharmacy.pharmacy_id).await?;
    Ok(Json(api_success(patients)))
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacy/me",
    responses(
        (status = 200, description = "The caller's active pharmacy", body = Pharmacy),
        (status = 404, description = "No active pharmacy for the caller")
    ),
    tag = "pharmacy",
    security(("bearer_auth" = []))
)]
pub async fn current_pharmacy(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Pharmacy>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    Ok(Json(api_success(pharmacy)))
}

#[utoipa::path(
    post,
    path = "/api/v1/pharmacy/prescriptions/{id}/dispense",
    params(("id" = i64, Path, description = "Prescription ID")),
    responses(
        (status = 200, description = "Dispensed and payment recorded", body = DispenseOutcome),
        (status = 404, description = "No pharmacy, or prescription not filled at this pharmacy"),
        (status = 409, description = "No price set for the drug")
    ),
    tag = "pharmacy",
    security(("bearer_auth" = []))
)]
pub async fn dispense_prescription(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
    ApiPath(prescription_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<DispenseOutcome>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let outcome = fulfillment::dispense(
        server.store.as_ref(),
        pharmacy.pharmacy_id,
        prescription_id,
        server.config.billing.fallback_amount,
    )
    .await?;
    Ok(Json(api_success(outcome)))
}
