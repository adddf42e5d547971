use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::{ApiPath, AuthContext};
use crate::server::PharmacyServer;
use crate::services::identity;
use axum::{extract::State, Json};
use database_layer::{Payment, PaymentView};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct PaymentsByStatus {
    pub fulfilled: Vec<PaymentView>,
    pub unfulfilled: Vec<PaymentView>,
}

/// Split payments by `is_fulfilled`, keeping the input order in each group.
pub fn partition_payments(payments: Vec<PaymentView>) -> PaymentsByStatus {
    let (fulfilled, unfulfilled) = payments.into_iter().partition(|p| p.is_fulfilled);
    PaymentsByStatus {
        fulfilled,
        unfulfilled,
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/pharmacy/payments",
    responses(
        (status = 200, description = "Payments split into fulfilled and unfulfilled", body = PaymentsByStatus),
        (status = 404, description = "No active pharmacy for the caller")
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn list_payments(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<PaymentsByStatus>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let payments = server.store.list_payments(pharmacy.pharmacy_id).await?;
    Ok(Json(api_success(partition_payments(payments))))
}

#[utoipa::path(
    post,
    path = "/api/v1/pharmacy/payments/{id}/fulfill",
    params(("id" = i64, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment marked as collected", body = Payment),
        (status = 404, description = "Payment not found at this pharmacy")
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn fulfill_payment(
    State(server): State<PharmacyServer>,
    auth: AuthContext,
    ApiPath(payment_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Payment>>, ApiError> {
    let pharmacy = identity::resolve_pharmacy(server.store.as_ref(), &auth).await?;
    let payment = server
        .store
        .mark_payment_fulfilled(pharmacy.pharmacy_id, payment_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Payment {payment_id} not found")))?;
    tracing::info!(pharmacy_id = pharmacy.pharmacy_id, payment_id, "Payment fulfilled");
    Ok(Json(api_success(payment)))
}
