use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::{ApiJson, AuthContext};
use crate::server::PharmacyServer;
use crate::services::identity;
use crate::validation::RequestValidation;
use crate::{validate_field, validate_range};
use axum::{extract::State, http::StatusCode, Json};
use database_layer::{DatabaseError, InventoryItem};
use serde::Deserialize;
use utoipa::ToSchema;

const MAX_RESTOCK: i32 = 100_000;

/// Restock by `drug_id`, or by drug name when no id is given.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddStockRequest {
    #[schema(example = 3)]
    pub drug_id: Option<i64>,
    #[schema(example = "Orlistat")]
    pub drug_name: Option<String>,
    #[schema(example = 25)]
    pub quantity: i32,
}

impl RequestValidation for AddStockRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_field!(
            self.drug_id,
            self.drug_id.is_some() || self.drug_name.is_some(),
            "Either drug_id or drug_name is required"
        );
        validate_field!(
            self.drug_id,
            self.drug_id.map_or(true, |id| id > 0),
            "drug_id must be a positive integer"
        );
        validate_range!(
            self.quantity,
            1,
            MAX_RESTOCK,
            format!("quantity must be between 1 and {MAX_RESTOCK}")
        );
        Ok(())
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacy/inventory",
    responses(
        (status = 200, description = "Stock levels", body = Vec<InventoryItem>),
        (status = 404, description = "No active pharmacy for the caller")
    ),
    tag = "inventory",
    security(("bearer_auth" = []))
)]
pub async fn list_inventory(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<InventoryItem>>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let items = server.store.list_inventory(pharmacy.pharmacy_id).await?;
    Ok(Json(api_success(items)))
}

#[utoipa::path(
    post,
    path = "/api/v1/pharmacy/inventory/add",
    request_body = AddStockRequest,
    responses(
        (status = 201, description = "Stock incremented", body = InventoryItem),
        (status = 400, description = "Invalid quantity or missing drug"),
        (status = 404, description = "Unknown drug or no active pharmacy")
    ),
    tag = "inventory",
    security(("bearer_auth" = []))
)]
pub async fn add_stock(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
    ApiJson(request): ApiJson<AddStockRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InventoryItem>>), ApiError> {
    request.validate()?;
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let drug = identity::resolve_drug(
        server.store.as_ref(),
        request.drug_id,
        request.drug_name.as_deref(),
    )
    .await?;

    let item = server
        .store
        .add_stock(pharmacy.pharmacy_id, drug.drug_id, request.quantity)
        .await
        .map_err(|err| match err {
            DatabaseError::StockLimitExceeded { .. } => ApiError::validation(err.to_string()),
            other => ApiError::from(other),
        })?;
    tracing::info!(
        pharmacy_id = pharmacy.pharmacy_id,
        drug_id = drug.drug_id,
        added = request.quantity,
        stock_quantity = item.stock_quantity,
        "Inventory restocked"
    );
    Ok((StatusCode::CREATED, Json(api_success(item))))
}
