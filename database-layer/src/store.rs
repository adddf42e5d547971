//! Store seams used by the HTTP layer.
//!
//! `PharmacyStore` covers single-statement reads and writes. Anything that
//! spans several statements goes through a `UnitOfWork`, which holds one
//! transaction (and its row locks) until `commit` or `rollback`. Dropping a
//! unit of work without committing discards every write it made.

use crate::error::DatabaseResult;
use crate::models::{
    BillingLogEntry, Doctor, Drug, DrugPrice, InventoryItem, NewPayment, NewPrescription, Page,
    Patient, PatientSummary, Payment, PaymentView, PendingRequest, Pharmacy, Prescription,
    PrescriptionSearch, PrescriptionStatus, PrescriptionSummary, QueueEntry, UpsertOutcome,
};
use async_trait::async_trait;
use rust_decimal::Decimal;

#[async_trait]
pub trait PharmacyStore: Send + Sync {
    /// Round-trip to the backing store.
    async fn ping(&self) -> DatabaseResult<()>;

    /// Open a unit of work.
    async fn begin(&self) -> DatabaseResult<Box<dyn UnitOfWork>>;

    /// First active pharmacy owned by the user, lowest id wins.
    async fn active_pharmacy_for_user(&self, user_id: i64) -> DatabaseResult<Option<Pharmacy>>;

    async fn doctor_for_user(&self, user_id: i64) -> DatabaseResult<Option<Doctor>>;

    async fn find_patient(&self, patient_id: i64) -> DatabaseResult<Option<Patient>>;

    /// Patient record linked to the user account, lowest id wins.
    async fn patient_for_user(&self, user_id: i64) -> DatabaseResult<Option<Patient>>;

    async fn list_drugs(&self) -> DatabaseResult<Vec<Drug>>;

    async fn find_drug(&self, drug_id: i64) -> DatabaseResult<Option<Drug>>;

    /// Lookup by an already-normalized name.
    async fn find_drug_by_name(&self, normalized_name: &str) -> DatabaseResult<Option<Drug>>;

    async fn preferred_pharmacy(&self, patient_id: i64) -> DatabaseResult<Option<i64>>;

    async fn insert_prescription(&self, new: NewPrescription) -> DatabaseResult<Prescription>;

    async fn search_prescriptions(
        &self,
        pharmacy_id: i64,
        search: &PrescriptionSearch,
    ) -> DatabaseResult<Page<PrescriptionSummary>>;

    async fn get_prescription_summary(
        &self,
        pharmacy_id: i64,
        prescription_id: i64,
    ) -> DatabaseResult<Option<PrescriptionSummary>>;

    /// Prescriptions in one status, oldest first.
    async fn prescriptions_by_status(
        &self,
        pharmacy_id: i64,
        status: PrescriptionStatus,
    ) -> DatabaseResult<Vec<QueueEntry>>;

    async fn pending_requests(&self, pharmacy_id: i64) -> DatabaseResult<Vec<PendingRequest>>;

    async fn pharmacy_patients(&self, pharmacy_id: i64) -> DatabaseResult<Vec<PatientSummary>>;

    async fn list_inventory(&self, pharmacy_id: i64) -> DatabaseResult<Vec<InventoryItem>>;

    /// Increment stock, creating the row when absent.
    async fn add_stock(
        &self,
        pharmacy_id: i64,
        drug_id: i64,
        quantity: i32,
    ) -> DatabaseResult<InventoryItem>;

    async fn list_prices(&self, pharmacy_id: i64) -> DatabaseResult<Vec<DrugPrice>>;

    async fn upsert_price(
        &self,
        pharmacy_id: i64,
        drug_id: i64,
        price: Decimal,
    ) -> DatabaseResult<UpsertOutcome>;

    /// Payments newest first.
    async fn list_payments(&self, pharmacy_id: i64) -> DatabaseResult<Vec<PaymentView>>;

    /// Idempotent; `None` when the payment does not belong to the pharmacy.
    async fn mark_payment_fulfilled(
        &self,
        pharmacy_id: i64,
        payment_id: i64,
    ) -> DatabaseResult<Option<Payment>>;

    async fn billing_log(
        &self,
        pharmacy_id: i64,
        search: Option<&str>,
    ) -> DatabaseResult<Vec<BillingLogEntry>>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    /// Load and lock a prescription owned by the pharmacy.
    async fn lock_prescription(
        &mut self,
        pharmacy_id: i64,
        prescription_id: i64,
    ) -> DatabaseResult<Option<Prescription>>;

    async fn lock_inventory(
        &mut self,
        pharmacy_id: i64,
        drug_id: i64,
    ) -> DatabaseResult<Option<InventoryItem>>;

    /// Take one unit out of stock. `None` when nothing was left to take.
    async fn decrement_stock(&mut self, pharmacy_id: i64, drug_id: i64)
        -> DatabaseResult<Option<i32>>;

    /// Move `from -> to`; false when the prescription was not in `from`.
    async fn transition_status(
        &mut self,
        prescription_id: i64,
        from: PrescriptionStatus,
        to: PrescriptionStatus,
    ) -> DatabaseResult<bool>;

    async fn price_for(&mut self, pharmacy_id: i64, drug_id: i64)
        -> DatabaseResult<Option<Decimal>>;

    async fn insert_payment(&mut self, new: NewPayment) -> DatabaseResult<Payment>;

    async fn commit(&mut self) -> DatabaseResult<()>;

    async fn rollback(&mut self) -> DatabaseResult<()>;
}
