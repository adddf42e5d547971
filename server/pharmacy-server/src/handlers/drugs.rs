use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::AuthContext;
use crate::server::PharmacyServer;
use axum::{extract::State, Json};
use database_layer::Drug;

/// Drug catalogue, available to any authenticated principal.
#[utoipa::path(
    get,
    path = "/api/v1/drugs",
    responses(
        (status = 200, description = "Drug catalogue", body = Vec<Drug>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    tag = "drugs",
    security(("bearer_auth" = []))
)]
pub async fn list_drugs(
    State(server): State<PharmacyServer>,
    _auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<Drug>>>, ApiError> {
    let drugs = server.store.list_drugs().await?;
    Ok(Json(api_success(drugs)))
}
