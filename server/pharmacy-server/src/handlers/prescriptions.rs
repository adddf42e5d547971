use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, AuthContext};
use crate::server::PharmacyServer;
use crate::services::intake::{self, PrescriptionRequest};
use crate::services::{fulfillment, identity, FulfillmentOutcome};
use crate::types::PaginationParams;
use axum::{extract::State, http::StatusCode, Json};
use database_layer::{PrescriptionSearch, PrescriptionStatus, PrescriptionSummary, SearchTerm};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PrescriptionListQuery {
    /// All digits matches the prescription id; anything else is a drug-name substring
    pub search: Option<String>,
    #[param(example = 1, minimum = 1)]
    pub page: Option<u32>,
    #[param(example = 20, minimum = 1, maximum = 100)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PrescriptionCreated {
    pub prescription_id: i64,
    pub status: PrescriptionStatus,
    pub pharmacy_id: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/prescriptions",
    params(PrescriptionListQuery),
    responses(
        (status = 200, description = "Prescriptions of the caller's pharmacy", body = Vec<PrescriptionSummary>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No active pharmacy for the caller"),
        (status = 500, description = "Internal server error")
    ),
    tag = "prescriptions",
    security(("bearer_auth" = []))
)]
pub async fn list_prescriptions(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
    ApiQuery(query): ApiQuery<PrescriptionListQuery>,
) -> Result<Json<ApiResponse<Vec<PrescriptionSummary>>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let pagination = PaginationParams::new(query.page, query.page_size);
    let search = PrescriptionSearch {
        term: query.search.as_deref().and_then(SearchTerm::parse),
        limit: pagination.limit(),
        offset: pagination.offset(),
    };

    let page = server
        .store
        .search_prescriptions(pharmacy.pharmacy_id, &search)
        .await?;
    Ok(Json(pagination.wrap_response(page.items, page.total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/prescriptions/{id}",
    params(("id" = i64, Path, description = "Prescription ID")),
    responses(
        (status = 200, description = "Prescription", body = PrescriptionSummary),
        (status = 400, description = "Non-integer id"),
        (status = 404, description = "Not found at the caller's pharmacy")
    ),
    tag = "prescriptions",
    security(("bearer_auth" = []))
)]
pub async fn get_prescription(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
    ApiPath(prescription_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<PrescriptionSummary>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let summary = server
        .store
        .get_prescription_summary(pharmacy.pharmacy_id, prescription_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Prescription {prescription_id} not found")))?;
    Ok(Json(api_success(summary)))
}

#[utoipa::path(
    post,
    path = "/api/v1/prescriptions/request",
    request_body = PrescriptionRequest,
    responses(
        (status = 201, description = "Prescription created in pending status", body = PrescriptionCreated),
        (status = 400, description = "Missing or invalid field, or no preferred pharmacy"),
        (status = 403, description = "Caller is not the prescribing doctor"),
        (status = 404, description = "Unknown drug or patient")
    ),
    tag = "prescriptions",
    security(("bearer_auth" = []))
)]
pub async fn request_prescription(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
    ApiJson(request): ApiJson<PrescriptionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PrescriptionCreated>>), ApiError> {
    let doctor = identity::resolve_doctor(server.store.as_ref(), &auth).await?;
    let prescription = intake::submit(
        server.store.as_ref(),
        &server.config.intake,
        &doctor,
        request,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(api_success(PrescriptionCreated {
            prescription_id: prescription.prescription_id,
            status: prescription.status,
            pharmacy_id: prescription.pharmacy_id,
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/prescriptions/{id}/fulfill",
    params(("id" = i64, Path, description = "Prescription ID")),
    responses(
        (status = 200, description = "Prescription moved to filled", body = FulfillmentOutcome),
        (status = 400, description = "Out of stock"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No pharmacy, or prescription not pending at this pharmacy")
    ),
    tag = "prescriptions",
    security(("bearer_auth" = []))
)]
pub async fn fulfill_prescription(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
    ApiPath(prescription_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<FulfillmentOutcome>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let outcome =
        fulfillment::fulfill(server.store.as_ref(), pharmacy.pharmacy_id, prescription_id).await?;
    Ok(Json(api_success(outcome)))
}
