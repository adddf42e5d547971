use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::AuthContext;
use crate::server::PharmacyServer;
use crate::services::identity;
use axum::{extract::State, Json};
use database_layer::Patient;

/// Patient record linked to the caller's account.
#[utoipa::path(
    get,
    path = "/api/v1/patient/me",
    responses(
        (status = 200, description = "The caller's patient record", body = Patient),
        (status = 403, description = "Caller is not a patient account"),
        (status = 404, description = "No patient record for the caller")
    ),
    tag = "patient",
    security(("bearer_auth" = []))
)]
pub async fn current_patient(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Patient>>, ApiError> {
    let patient = identity::resolve_patient(server.store.as_ref(), &auth).await?;
    Ok(Json(api_success(patient)))
}
