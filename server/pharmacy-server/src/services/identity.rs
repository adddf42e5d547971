//! Resolution of the acting principal to pharmacy, doctor and drug records

use crate::auth::Role;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthContext;
use database_layer::{normalize_drug_name, Doctor, Drug, Patient, Pharmacy, PharmacyStore};
use tracing::instrument;

pub const NO_ACTIVE_PHARMACY: &str = "No active pharmacy found for that user";

/// The single active pharmacy owned by the principal.
#[instrument(skip(store, auth), fields(user_id = auth.user_id))]
pub async fn resolve_pharmacy(store: &dyn PharmacyStore, auth: &AuthContext) -> ApiResult<Pharmacy> {
    auth.require_role(Role::Pharmacy)?;
    store
        .active_pharmacy_for_user(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NO_ACTIVE_PHARMACY))
}

#[instrument(skip(store, auth), fields(user_id = auth.user_id))]
pub async fn resolve_doctor(store: &dyn PharmacyStore, auth: &AuthContext) -> ApiResult<Doctor> {
    auth.require_role(Role::Doctor)?;
    store
        .doctor_for_user(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No doctor profile found for that user"))
}

#[instrument(skip(store, auth), fields(user_id = auth.user_id))]
pub async fn resolve_patient(store: &dyn PharmacyStore, auth: &AuthContext) -> ApiResult<Patient> {
    auth.require_role(Role::Patient)?;
    store
        .patient_for_user(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No patient record found for that user"))
}

/// Look a drug up by id, or by case/whitespace-insensitive name.
pub async fn resolve_drug(
    store: &dyn PharmacyStore,
    drug_id: Option<i64>,
    drug_name: Option<&str>,
) -> ApiResult<Drug> {
    if let Some(id) = drug_id {
        return store
            .find_drug(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Drug {id} not found")));
    }

    let name = drug_name
        .map(normalize_drug_name)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::validation("Either drug_id or drug_name is required"))?;

    store
        .find_drug_by_name(&name)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Drug '{name}' not found")))
}
