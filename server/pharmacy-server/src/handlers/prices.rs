use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::{ApiJson, AuthContext};
use crate::server::PharmacyServer;
use crate::services::{identity, pricing};
use crate::validation::RequestValidation;
use crate::validate_positive_id;
use axum::{extract::State, Json};
use database_layer::{DrugPrice, UpsertOutcome};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePriceRequest {
    #[schema(example = 2)]
    pub drug_id: i64,
    /// Accepts a JSON number or a decimal string
    #[schema(value_type = String, example = "12.50")]
    pub price: Decimal,
}

impl RequestValidation for UpdatePriceRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_positive_id!(self.drug_id, "drug_id must be a positive integer");
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PriceUpdated {
    #[schema(example = "Price updated")]
    pub message: String,
    pub operation: UpsertOutcome,
}

#[utoipa::path(
    get,
    path = "/api/v1/prices/current-prices",
    responses(
        (status = 200, description = "Prices set by the caller's pharmacy", body = Vec<DrugPrice>),
        (status = 404, description = "No active pharmacy for the caller")
    ),
    tag = "prices",
    security(("bearer_auth" = []))
)]
pub async fn current_prices(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<DrugPrice>>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let prices = server.store.list_prices(pharmacy.pharmacy_id).await?;
    Ok(Json(api_success(prices)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/prices/update",
    request_body = UpdatePriceRequest,
    responses(
        (status = 200, description = "Price inserted or updated", body = PriceUpdated),
        (status = 400, description = "Negative price or malformed body"),
        (status = 404, description = "Unknown drug or no active pharmacy")
    ),
    tag = "prices",
    security(("bearer_auth" = []))
)]
pub async fn update_price(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
    ApiJson(request): ApiJson<UpdatePriceRequest>,
) -> Result<Json<ApiResponse<PriceUpdated>>, ApiError> {
    request.validate()?;
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let operation = pricing::update_price(
        server.store.as_ref(),
        pharmacy.pharmacy_id,
        request.drug_id,
        request.price,
    )
    .await?;

    Ok(Json(api_success(PriceUpdated {
        message: "Price updated".to_string(),
        operation,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drug_id_must_be_positive() {
        let request = UpdatePriceRequest {
            drug_id: 0,
            price: Decimal::new(1250, 2),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn well_formed_request_is_valid() {
        let request = UpdatePriceRequest {
            drug_id: 2,
            price: Decimal::ZERO,
        };
        assert!(request.validate().is_ok());
    }
}
