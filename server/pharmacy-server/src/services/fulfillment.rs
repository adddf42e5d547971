//! Prescription state machine: `pending -> filled -> dispensed`
//!
//! Filling takes one unit of stock; dispensing records the payment. Each
//! transition runs in a single unit of work and is rolled back on any error,
//! so a failed request never leaves stock, status and payments out of step.

use crate::error::ApiError;
use database_layer::{
    to_money_scale, DatabaseError, NewPayment, PharmacyStore, Prescription, PrescriptionStatus,
    UnitOfWork,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

pub const OUT_OF_STOCK: &str = "Out of stock";

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("Prescription not found or not in {expected} status")]
    NotInStatus {
        prescription_id: i64,
        expected: PrescriptionStatus,
    },

    #[error("Out of stock")]
    OutOfStock { drug_id: i64 },

    #[error("No price set for drug {drug_id} at this pharmacy")]
    PriceNotSet { drug_id: i64 },

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::NotInStatus { .. } => ApiError::not_found(err.to_string()),
            FulfillmentError::OutOfStock { .. } => ApiError::inventory_conflict(OUT_OF_STOCK),
            FulfillmentError::PriceNotSet { .. } => ApiError::conflict(err.to_string()),
            FulfillmentError::Store(db) => ApiError::Database(db),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FulfillmentOutcome {
    #[schema(example = "Prescription fulfilled")]
    pub message: String,
    pub prescription_id: i64,
    pub status: PrescriptionStatus,
    pub remaining_stock: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DispenseOutcome {
    pub prescription_id: i64,
    pub payment_id: i64,
    #[schema(value_type = String, example = "12.50")]
    pub amount: Decimal,
    pub status: PrescriptionStatus,
}

/// Move a pending prescription to `filled`, taking one unit of stock.
#[instrument(skip(store))]
pub async fn fulfill(
    store: &dyn PharmacyStore,
    pharmacy_id: i64,
    prescription_id: i64,
) -> Result<FulfillmentOutcome, FulfillmentError> {
    let mut uow = store.begin().await?;
    let result = fill_in(uow.as_mut(), pharmacy_id, prescription_id).await;
    let outcome = finish(uow, result).await?;

    info!(
        pharmacy_id,
        prescription_id,
        remaining_stock = outcome.remaining_stock,
        "Prescription filled"
    );
    Ok(outcome)
}

/// Move a filled prescription to `dispensed` and record its payment.
///
/// The amount is the pharmacy's price for the drug, or `fallback_amount`
/// when no price row exists.
#[instrument(skip(store))]
pub async fn dispense(
    store: &dyn PharmacyStore,
    pharmacy_id: i64,
    prescription_id: i64,
    fallback_amount: Option<Decimal>,
) -> Result<DispenseOutcome, FulfillmentError> {
    let mut uow = store.begin().await?;
    let result = dispense_in(uow.as_mut(), pharmacy_id, prescription_id, fallback_amount).await;
    let outcome = finish(uow, result).await?;

    info!(
        pharmacy_id,
        prescription_id,
        payment_id = outcome.payment_id,
        amount = %outcome.amount,
        "Prescription dispensed"
    );
    Ok(outcome)
}

/// Commit on success; roll back and surface the original error otherwise.
async fn finish<T>(
    mut uow: Box<dyn UnitOfWork>,
    result: Result<T, FulfillmentError>,
) -> Result<T, FulfillmentError> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            match &err {
                FulfillmentError::Store(_) => {}
                other => warn!(reason = %other, "Transition rejected"),
            }
            Err(err)
        }
    }
}

async fn lock_in_status(
    uow: &mut dyn UnitOfWork,
    pharmacy_id: i64,
    prescription_id: i64,
    expected: PrescriptionStatus,
) -> Result<Prescription, FulfillmentError> {
    uow.lock_prescription(pharmacy_id, prescription_id)
        .await?
        .filter(|p| p.status == expected)
        .ok_or(FulfillmentError::NotInStatus {
            prescription_id,
            expected,
        })
}

/// Move the prescription one step along its lifecycle and return the new status.
async fn advance(
    uow: &mut dyn UnitOfWork,
    prescription_id: i64,
    from: PrescriptionStatus,
) -> Result<PrescriptionStatus, FulfillmentError> {
    let not_in_status = FulfillmentError::NotInStatus {
        prescription_id,
        expected: from,
    };
    let Some(to) = from.next() else {
        return Err(not_in_status);
    };
    if uow.transition_status(prescription_id, from, to).await? {
        Ok(to)
    } else {
        Err(not_in_status)
    }
}

async fn fill_in(
    uow: &mut dyn UnitOfWork,
    pharmacy_id: i64,
    prescription_id: i64,
) -> Result<FulfillmentOutcome, FulfillmentError> {
    let from = PrescriptionStatus::Pending;
    let prescription = lock_in_status(uow, pharmacy_id, prescription_id, from).await?;
    let drug_id = prescription.drug_id;

    let in_stock = uow
        .lock_inventory(pharmacy_id, drug_id)
        .await?
        .is_some_and(|item| item.stock_quantity > 0);
    if !in_stock {
        return Err(FulfillmentError::OutOfStock { drug_id });
    }

    let remaining_stock = uow
        .decrement_stock(pharmacy_id, drug_id)
        .await?
        .ok_or(FulfillmentError::OutOfStock { drug_id })?;
    let status = advance(uow, prescription_id, from).await?;

    Ok(FulfillmentOutcome {
        message: "Prescription fulfilled".to_string(),
        prescription_id,
        status,
        remaining_stock,
    })
}

async fn dispense_in(
    uow: &mut dyn UnitOfWork,
    pharmacy_id: i64,
    prescription_id: i64,
    fallback_amount: Option<Decimal>,
) -> Result<DispenseOutcome, FulfillmentError> {
    let from = PrescriptionStatus::Filled;
    let prescription = lock_in_status(uow, pharmacy_id, prescription_id, from).await?;

    let amount = match uow.price_for(pharmacy_id, prescription.drug_id).await? {
        Some(price) => price,
        None => fallback_amount
            .map(to_money_scale)
            .ok_or(FulfillmentError::PriceNotSet {
                drug_id: prescription.drug_id,
            })?,
    };

    let status = advance(uow, prescription_id, from).await?;
    let payment = uow
        .insert_payment(NewPayment {
            prescription_id,
            pharmacy_id,
            patient_id: prescription.patient_id,
            amount,
        })
        .await?;

    Ok(DispenseOutcome {
        prescription_id,
        payment_id: payment.payment_id,
        amount: payment.amount,
        status,
    })
}
