//! Doctor-submitted prescription requests

use crate::config::IntakeSettings;
use crate::error::{ApiError, ApiResult};
use crate::validation::RequestValidation;
use crate::{validate_positive_id, validate_required};
use database_layer::{Doctor, NewPrescription, PharmacyStore, Prescription};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PrescriptionRequest {
    #[schema(example = 5)]
    pub doctor_id: i64,
    #[schema(example = 7)]
    pub patient_id: i64,
    #[schema(example = 3)]
    pub drug_id: i64,
    #[schema(example = "120mg")]
    pub dosage: String,
    #[schema(example = "Take with each main meal")]
    pub instructions: String,
}

impl RequestValidation for PrescriptionRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_positive_id!(self.doctor_id, "doctor_id must be a positive integer");
        validate_positive_id!(self.patient_id, "patient_id must be a positive integer");
        validate_positive_id!(self.drug_id, "drug_id must be a positive integer");
        validate_required!(self.dosage, "dosage is required");
        validate_required!(self.instructions, "instructions is required");
        Ok(())
    }
}

/// Record a new `pending` prescription routed to the patient's preferred pharmacy.
#[instrument(skip(store, settings, request), fields(doctor_id = doctor.doctor_id, patient_id = request.patient_id))]
pub async fn submit(
    store: &dyn PharmacyStore,
    settings: &IntakeSettings,
    doctor: &Doctor,
    request: PrescriptionRequest,
) -> ApiResult<Prescription> {
    request.validate()?;

    if request.doctor_id != doctor.doctor_id {
        return Err(ApiError::authorization(
            "doctor_id does not match the authenticated doctor",
        ));
    }
    if store.find_drug(request.drug_id).await?.is_none() {
        return Err(ApiError::not_found(format!("Drug {} not found", request.drug_id)));
    }
    if store.find_patient(request.patient_id).await?.is_none() {
        return Err(ApiError::not_found(format!(
            "Patient {} not found",
            request.patient_id
        )));
    }

    let pharmacy_id = store.preferred_pharmacy(request.patient_id).await?;
    if pharmacy_id.is_none() && settings.require_preferred_pharmacy {
        return Err(ApiError::validation(format!(
            "No preferred pharmacy set for patient {}",
            request.patient_id
        )));
    }

    let prescription = store
        .insert_prescription(NewPrescription {
            doctor_id: doctor.doctor_id,
            patient_id: request.patient_id,
            pharmacy_id,
            drug_id: request.drug_id,
            dosage: request.dosage.trim().to_string(),
            instructions: request.instructions.trim().to_string(),
        })
        .await?;

    info!(
        prescription_id = prescription.prescription_id,
        pharmacy_id = ?prescription.pharmacy_id,
        "Prescription requested"
    );
    Ok(prescription)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use database_layer::{InMemoryStore, MemoryState, PrescriptionStatus};

    fn doctor() -> Doctor {
        Doctor {
            doctor_id: 5,
            user_id: 50,
            first_name: "Gregory".into(),
            last_name: "House".into(),
        }
    }

    fn request() -> PrescriptionRequest {
        PrescriptionRequest {
            doctor_id: 5,
            patient_id: 7,
            drug_id: 3,
            dosage: "120mg".into(),
            instructions: "With meals".into(),
        }
    }

    fn state() -> MemoryState {
        MemoryState::default()
            .with_pharmacy(5, 10, "Preferred", true)
            .with_doctor(5, 50, "Gregory", "House")
            .with_patient(7, "Ada", "Lovelace")
            .with_patient(8, "Alan", "Turing")
            .with_drug(3, "Orlistat")
            .with_preferred_pharmacy(7, 5)
    }

    #[tokio::test]
    async fn routes_to_preferred_pharmacy() {
        let store = InMemoryStore::new(state());
        let created = submit(&store, &IntakeSettings::default(), &doctor(), request())
            .await
            .unwrap();
        assert_eq!(created.pharmacy_id, Some(5));
        assert_eq!(created.status, PrescriptionStatus::Pending);
    }

    #[tokio::test]
    async fn missing_preference_is_rejected_by_default() {
        let store = InMemoryStore::new(state());
        let mut req = request();
        req.patient_id = 8;
        let err = submit(&store, &IntakeSettings::default(), &doctor(), req)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("No preferred pharmacy set for patient 8"));
        assert!(store.snapshot().await.prescriptions.is_empty());
    }

    #[tokio::test]
    async fn missing_preference_can_be_left_unassigned() {
        let store = InMemoryStore::new(state());
        let settings = IntakeSettings {
            require_preferred_pharmacy: false,
        };
        let mut req = request();
        req.patient_id = 8;
        let created = submit(&store, &settings, &doctor(), req).await.unwrap();
        assert_eq!(created.pharmacy_id, None);
    }

    #[tokio::test]
    async fn unknown_drug_is_not_found() {
        let store = InMemoryStore::new(state());
        let mut req = request();
        req.drug_id = 99;
        let err = submit(&store, &IntakeSettings::default(), &doctor(), req)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn doctor_mismatch_is_forbidden() {
        let store = InMemoryStore::new(state());
        let mut req = request();
        req.doctor_id = 6;
        let err = submit(&store, &IntakeSettings::default(), &doctor(), req)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn blank_dosage_fails_validation() {
        let mut req = request();
        req.dosage = " ".into();
        assert!(req.validate().is_err());
    }
}
