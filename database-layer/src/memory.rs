//! In-process store with the same observable semantics as the Postgres one.
//!
//! Every unit of work holds the state mutex for its whole lifetime and writes
//! into a private copy that replaces the shared state on `commit`. Do not call
//! the store itself while holding a unit of work: the mutex is not reentrant.

use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{
    normalize_drug_name, BillingLogEntry, Doctor, Drug, DrugPrice, InventoryItem, NewPayment,
    NewPrescription, Page, Patient, PatientSummary, Payment, PaymentView, PendingRequest,
    Pharmacy, Prescription, PrescriptionSearch, PrescriptionStatus, PrescriptionSummary,
    QueueEntry, SearchTerm, UpsertOutcome,
};
use crate::store::{PharmacyStore, UnitOfWork};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone)]
pub struct PriceRow {
    pub pharmacy_id: i64,
    pub drug_id: i64,
    pub price: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Table contents. Public so tests can seed and inspect it.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub pharmacies: Vec<Pharmacy>,
    pub doctors: Vec<Doctor>,
    pub patients: Vec<Patient>,
    pub drugs: Vec<Drug>,
    pub preferred_pharmacies: BTreeMap<i64, i64>,
    pub prescriptions: Vec<Prescription>,
    pub inventory: Vec<InventoryItem>,
    pub prices: Vec<PriceRow>,
    pub payments: Vec<Payment>,
}

fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0) + 1
}

/// Deterministic timestamps for seeded rows, one minute apart.
fn seed_time(minutes: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_else(Utc::now) + Duration::minutes(minutes)
}

fn constraint_violation(detail: &str) -> DatabaseError {
    DatabaseError::QueryFailed(format!("constraint violation: {detail}"))
}

impl MemoryState {
    pub fn with_pharmacy(mut self, pharmacy_id: i64, user_id: i64, name: &str, is_active: bool) -> Self {
        self.pharmacies.push(Pharmacy {
            pharmacy_id,
            user_id,
            name: name.to_string(),
            is_active,
        });
        self
    }

    pub fn with_doctor(mut self, doctor_id: i64, user_id: i64, first_name: &str, last_name: &str) -> Self {
        self.doctors.push(Doctor {
            doctor_id,
            user_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        });
        self
    }

    pub fn with_patient(mut self, patient_id: i64, first_name: &str, last_name: &str) -> Self {
        self.patients.push(Patient {
            patient_id,
            user_id: None,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        });
        self
    }

    /// Link an already seeded patient to a user account.
    pub fn with_patient_user(mut self, patient_id: i64, user_id: i64) -> Self {
        if let Some(patient) = self.patients.iter_mut().find(|p| p.patient_id == patient_id) {
            patient.user_id = Some(user_id);
        }
        self
    }

    pub fn with_drug(mut self, drug_id: i64, name: &str) -> Self {
        self.drugs.push(Drug {
            drug_id,
            name: name.to_string(),
            description: None,
        });
        self
    }

    pub fn with_preferred_pharmacy(mut self, patient_id: i64, pharmacy_id: i64) -> Self {
        self.preferred_pharmacies.insert(patient_id, pharmacy_id);
        self
    }

    pub fn with_stock(mut self, pharmacy_id: i64, drug_id: i64, stock_quantity: i32) -> Self {
        let inventory_id = next_id(self.inventory.iter().map(|i| i.inventory_id));
        let drug_name = self.drug_name(drug_id).unwrap_or_default();
        self.inventory.push(InventoryItem {
            inventory_id,
            pharmacy_id,
            drug_id,
            drug_name,
            stock_quantity,
            updated_at: seed_time(0),
        });
        self
    }

    pub fn with_price(mut self, pharmacy_id: i64, drug_id: i64, price: Decimal) -> Self {
        self.prices.push(PriceRow {
            pharmacy_id,
            drug_id,
            price,
            updated_at: seed_time(0),
        });
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_prescription(
        mut self,
        prescription_id: i64,
        doctor_id: i64,
        patient_id: i64,
        pharmacy_id: Option<i64>,
        drug_id: i64,
        status: PrescriptionStatus,
    ) -> Self {
        let created_at = seed_time(prescription_id);
        self.prescriptions.push(Prescription {
            prescription_id,
            doctor_id,
            patient_id,
            pharmacy_id,
            drug_id,
            dosage: "1 tablet".to_string(),
            instructions: "Take once daily".to_string(),
            status,
            created_at,
            updated_at: created_at,
        });
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_payment(
        mut self,
        payment_id: i64,
        prescription_id: i64,
        pharmacy_id: i64,
        patient_id: i64,
        amount: Decimal,
        is_fulfilled: bool,
        minutes: i64,
    ) -> Self {
        self.payments.push(Payment {
            payment_id,
            prescription_id,
            pharmacy_id,
            patient_id,
            amount,
            is_fulfilled,
            payment_date: seed_time(minutes),
            fulfilled_at: None,
        });
        self
    }

    fn drug_name(&self, drug_id: i64) -> Option<String> {
        self.drugs
            .iter()
            .find(|d| d.drug_id == drug_id)
            .map(|d| d.name.clone())
    }

    fn patient(&self, patient_id: i64) -> Option<&Patient> {
        self.patients.iter().find(|p| p.patient_id == patient_id)
    }

    fn summarize(&self, p: &Prescription) -> Option<PrescriptionSummary> {
        Some(PrescriptionSummary {
            prescription_id: p.prescription_id,
            patient_id: p.patient_id,
            patient_name: self.patient(p.patient_id)?.full_name(),
            drug_id: p.drug_id,
            medication_name: self.drug_name(p.drug_id)?,
            dosage: p.dosage.clone(),
            instructions: p.instructions.clone(),
            status: p.status,
            created_at: p.created_at,
        })
    }

    fn oldest_first(&self, pharmacy_id: i64, status: PrescriptionStatus) -> Vec<&Prescription> {
        let mut rows: Vec<&Prescription> = self
            .prescriptions
            .iter()
            .filter(|p| p.pharmacy_id == Some(pharmacy_id) && p.status == status)
            .collect();
        rows.sort_by_key(|p| (p.created_at, p.prescription_id));
        rows
    }

    fn payment_view(&self, pay: &Payment) -> Option<PaymentView> {
        let prescription = self
            .prescriptions
            .iter()
            .find(|p| p.prescription_id == pay.prescription_id)?;
        Some(PaymentView {
            payment_id: pay.payment_id,
            prescription_id: pay.prescription_id,
            patient_name: self.patient(pay.patient_id)?.full_name(),
            medication_name: self.drug_name(prescription.drug_id)?,
            amount: pay.amount,
            is_fulfilled: pay.is_fulfilled,
            payment_date: pay.payment_date,
        })
    }

    fn price_row(&self, pharmacy_id: i64, drug_id: i64) -> Option<&PriceRow> {
        self.prices
            .iter()
            .find(|p| p.pharmacy_id == pharmacy_id && p.drug_id == drug_id)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new(state: MemoryState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Copy of the current committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl PharmacyStore for InMemoryStore {
    async fn ping(&self) -> DatabaseResult<()> {
        Ok(())
    }

    async fn begin(&self) -> DatabaseResult<Box<dyn UnitOfWork>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard: Some(guard),
            working,
        }))
    }

    async fn active_pharmacy_for_user(&self, user_id: i64) -> DatabaseResult<Option<Pharmacy>> {
        let state = self.state.lock().await;
        Ok(state
            .pharmacies
            .iter()
            .filter(|p| p.user_id == user_id && p.is_active)
            .min_by_key(|p| p.pharmacy_id)
            .cloned())
    }

    async fn doctor_for_user(&self, user_id: i64) -> DatabaseResult<Option<Doctor>> {
        let state = self.state.lock().await;
        Ok(state
            .doctors
            .iter()
            .filter(|d| d.user_id == user_id)
            .min_by_key(|d| d.doctor_id)
            .cloned())
    }

    async fn find_patient(&self, patient_id: i64) -> DatabaseResult<Option<Patient>> {
        let state = self.state.lock().await;
        Ok(state.patient(patient_id).cloned())
    }

    async fn patient_for_user(&self, user_id: i64) -> DatabaseResult<Option<Patient>> {
        let state = self.state.lock().await;
        Ok(state
            .patients
            .iter()
            .filter(|p| p.user_id == Some(user_id))
            .min_by_key(|p| p.patient_id)
            .cloned())
    }

    async fn list_drugs(&self) -> DatabaseResult<Vec<Drug>> {
        let state = self.state.lock().await;
        let mut drugs = state.drugs.clone();
        drugs.sort_by_key(|d| d.drug_id);
        Ok(drugs)
    }

    async fn find_drug(&self, drug_id: i64) -> DatabaseResult<Option<Drug>> {
        let state = self.state.lock().await;
        Ok(state.drugs.iter().find(|d| d.drug_id == drug_id).cloned())
    }

    async fn find_drug_by_name(&self, normalized_name: &str) -> DatabaseResult<Option<Drug>> {
        let state = self.state.lock().await;
        Ok(state
            .drugs
            .iter()
            .find(|d| normalize_drug_name(&d.name) == normalized_name)
            .cloned())
    }

    async fn preferred_pharmacy(&self, patient_id: i64) -> DatabaseResult<Option<i64>> {
        let state = self.state.lock().await;
        Ok(state.preferred_pharmacies.get(&patient_id).copied())
    }

    async fn insert_prescription(&self, new: NewPrescription) -> DatabaseResult<Prescription> {
        let mut state = self.state.lock().await;
        if state.drug_name(new.drug_id).is_none() {
            return Err(constraint_violation("prescriptions.drug_id foreign key"));
        }
        if state.patient(new.patient_id).is_none() {
            return Err(constraint_violation("prescriptions.patient_id foreign key"));
        }
        let now = Utc::now();
        let prescription = Prescription {
            prescription_id: next_id(state.prescriptions.iter().map(|p| p.prescription_id)),
            doctor_id: new.doctor_id,
            patient_id: new.patient_id,
            pharmacy_id: new.pharmacy_id,
            drug_id: new.drug_id,
            dosage: new.dosage,
            instructions: new.instructions,
            status: PrescriptionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.prescriptions.push(prescription.clone());
        Ok(prescription)
    }

    async fn search_prescriptions(
        &self,
        pharmacy_id: i64,
        search: &PrescriptionSearch,
    ) -> DatabaseResult<Page<PrescriptionSummary>> {
        let state = self.state.lock().await;
        let mut matches: Vec<PrescriptionSummary> = state
            .prescriptions
            .iter()
            .filter(|p| p.pharmacy_id == Some(pharmacy_id))
            .filter_map(|p| state.summarize(p))
            .filter(|s| match &search.term {
                Some(SearchTerm::Id(id)) => s.prescription_id == *id,
                Some(SearchTerm::Medication(name)) => s
                    .medication_name
                    .to_lowercase()
                    .contains(&name.to_lowercase()),
                None => true,
            })
            .collect();
        matches.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.prescription_id.cmp(&a.prescription_id))
        });
        let total = i64::try_from(matches.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(search.offset).unwrap_or(0);
        let limit = usize::try_from(search.limit).unwrap_or(0);
        let items = matches.into_iter().skip(offset).take(limit).collect();
        Ok(Page { items, total })
    }

    async fn get_prescription_summary(
        &self,
        pharmacy_id: i64,
        prescription_id: i64,
    ) -> DatabaseResult<Option<PrescriptionSummary>> {
        let state = self.state.lock().await;
        Ok(state
            .prescriptions
            .iter()
            .find(|p| p.prescription_id == prescription_id && p.pharmacy_id == Some(pharmacy_id))
            .and_then(|p| state.summarize(p)))
    }

    async fn prescriptions_by_status(
        &self,
        pharmacy_id: i64,
        status: PrescriptionStatus,
    ) -> DatabaseResult<Vec<QueueEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .oldest_first(pharmacy_id, status)
            .into_iter()
            .filter_map(|p| {
                Some(QueueEntry {
                    prescription_id: p.prescription_id,
                    patient_name: state.patient(p.patient_id)?.full_name(),
                    medication_name: state.drug_name(p.drug_id)?,
                    dosage: p.dosage.clone(),
                    requested_at: p.created_at,
                })
            })
            .collect())
    }

    async fn pending_requests(&self, pharmacy_id: i64) -> DatabaseResult<Vec<PendingRequest>> {
        let state = self.state.lock().await;
        Ok(state
            .oldest_first(pharmacy_id, PrescriptionStatus::Pending)
            .into_iter()
            .filter_map(|p| {
                let stock_quantity = state
                    .inventory
                    .iter()
                    .find(|i| i.pharmacy_id == pharmacy_id && i.drug_id == p.drug_id)
                    .map(|i| i.stock_quantity);
                Some(PendingRequest {
                    prescription_id: p.prescription_id,
                    patient_name: state.patient(p.patient_id)?.full_name(),
                    medication_name: state.drug_name(p.drug_id)?,
                    dosage: p.dosage.clone(),
                    status: p.status,
                    stock_quantity,
                    inventory_conflict: stock_quantity.map_or(true, |q| q <= 0),
                })
            })
            .collect())
    }

    async fn pharmacy_patients(&self, pharmacy_id: i64) -> DatabaseResult<Vec<PatientSummary>> {
        let state = self.state.lock().await;
        let mut seen = BTreeMap::new();
        for p in state
            .prescriptions
            .iter()
            .filter(|p| p.pharmacy_id == Some(pharmacy_id))
        {
            if let Some(patient) = state.patient(p.patient_id) {
                seen.insert(patient.patient_id, patient.full_name());
            }
        }
        let mut patients: Vec<PatientSummary> = seen
            .into_iter()
            .map(|(patient_id, patient_name)| PatientSummary {
                patient_id,
                patient_name,
            })
            .collect();
        patients.sort_by(|a, b| {
            a.patient_name
                .cmp(&b.patient_name)
                .then(a.patient_id.cmp(&b.patient_id))
        });
        Ok(patients)
    }

    async fn list_inventory(&self, pharmacy_id: i64) -> DatabaseResult<Vec<InventoryItem>> {
        let state = self.state.lock().await;
        let mut items: Vec<InventoryItem> = state
            .inventory
            .iter()
            .filter(|i| i.pharmacy_id == pharmacy_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.drug_name.cmp(&b.drug_name).then(a.drug_id.cmp(&b.drug_id)));
        Ok(items)
    }

    async fn add_stock(
        &self,
        pharmacy_id: i64,
        drug_id: i64,
        quantity: i32,
    ) -> DatabaseResult<InventoryItem> {
        let mut state = self.state.lock().await;
        let drug_name = state
            .drug_name(drug_id)
            .ok_or_else(|| constraint_violation("pharmacy_inventory.drug_id foreign key"))?;
        let next_inventory_id = next_id(state.inventory.iter().map(|i| i.inventory_id));
        let now = Utc::now();
        if let Some(item) = state
            .inventory
            .iter_mut()
            .find(|i| i.pharmacy_id == pharmacy_id && i.drug_id == drug_id)
        {
            let updated = item
                .stock_quantity
                .checked_add(quantity)
                .ok_or(DatabaseError::StockLimitExceeded {
                    pharmacy_id,
                    drug_id,
                })?;
            if updated < 0 {
                return Err(constraint_violation("stock_quantity >= 0"));
            }
            item.stock_quantity = updated;
            item.updated_at = now;
            return Ok(item.clone());
        }
        if quantity < 0 {
            return Err(constraint_violation("stock_quantity >= 0"));
        }
        let item = InventoryItem {
            inventory_id: next_inventory_id,
            pharmacy_id,
            drug_id,
            drug_name,
            stock_quantity: quantity,
            updated_at: now,
        };
        state.inventory.push(item.clone());
        Ok(item)
    }

    async fn list_prices(&self, pharmacy_id: i64) -> DatabaseResult<Vec<DrugPrice>> {
        let state = self.state.lock().await;
        let mut prices: Vec<DrugPrice> = state
            .prices
            .iter()
            .filter(|p| p.pharmacy_id == pharmacy_id)
            .filter_map(|row| {
                let drug = state.drugs.iter().find(|d| d.drug_id == row.drug_id)?;
                Some(DrugPrice {
                    pharmacy_id: row.pharmacy_id,
                    drug_id: row.drug_id,
                    name: drug.name.clone(),
                    description: drug.description.clone(),
                    price: row.price,
                    updated_at: row.updated_at,
                })
            })
            .collect();
        prices.sort_by_key(|p| p.drug_id);
        Ok(prices)
    }

    async fn upsert_price(
        &self,
        pharmacy_id: i64,
        drug_id: i64,
        price: Decimal,
    ) -> DatabaseResult<UpsertOutcome> {
        if price.is_sign_negative() {
            return Err(constraint_violation("price >= 0"));
        }
        let mut state = self.state.lock().await;
        if state.drug_name(drug_id).is_none() {
            return Err(constraint_violation("pharmacy_drug_prices.drug_id foreign key"));
        }
        let now = Utc::now();
        if let Some(row) = state
            .prices
            .iter_mut()
            .find(|p| p.pharmacy_id == pharmacy_id && p.drug_id == drug_id)
        {
            row.price = price;
            row.updated_at = now;
            return Ok(UpsertOutcome::Updated);
        }
        state.prices.push(PriceRow {
            pharmacy_id,
            drug_id,
            price,
            updated_at: now,
        });
        Ok(UpsertOutcome::Inserted)
    }

    async fn list_payments(&self, pharmacy_id: i64) -> DatabaseResult<Vec<PaymentView>> {
        let state = self.state.lock().await;
        let mut payments: Vec<PaymentView> = state
            .payments
            .iter()
            .filter(|p| p.pharmacy_id == pharmacy_id)
            .filter_map(|p| state.payment_view(p))
            .collect();
        payments.sort_by(|a, b| {
            b.payment_date
                .cmp(&a.payment_date)
                .then(b.payment_id.cmp(&a.payment_id))
        });
        Ok(payments)
    }

    async fn mark_payment_fulfilled(
        &self,
        pharmacy_id: i64,
        payment_id: i64,
    ) -> DatabaseResult<Option<Payment>> {
        let mut state = self.state.lock().await;
        let Some(payment) = state
            .payments
            .iter_mut()
            .find(|p| p.payment_id == payment_id && p.pharmacy_id == pharmacy_id)
        else {
            return Ok(None);
        };
        payment.is_fulfilled = true;
        if payment.fulfilled_at.is_none() {
            payment.fulfilled_at = Some(Utc::now());
        }
        Ok(Some(payment.clone()))
    }

    async fn billing_log(
        &self,
        pharmacy_id: i64,
        search: Option<&str>,
    ) -> DatabaseResult<Vec<BillingLogEntry>> {
        let state = self.state.lock().await;
        let needle = search.map(str::to_lowercase);
        let mut rows: Vec<(String, String, BillingLogEntry)> = state
            .payments
            .iter()
            .filter(|p| p.pharmacy_id == pharmacy_id)
            .filter_map(|pay| {
                let patient = state.patient(pay.patient_id)?;
                let view = state.payment_view(pay)?;
                Some((
                    patient.last_name.clone(),
                    patient.first_name.clone(),
                    BillingLogEntry {
                        payment_id: view.payment_id,
                        prescription_id: view.prescription_id,
                        patient_name: view.patient_name,
                        medication_name: view.medication_name,
                        amount_billed: view.amount,
                        timestamp: view.payment_date,
                    },
                ))
            })
            .filter(|(_, _, entry)| match &needle {
                Some(n) => {
                    entry.medication_name.to_lowercase().contains(n)
                        || entry.patient_name.to_lowercase().contains(n)
                }
                None => true,
            })
            .collect();
        rows.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(b.2.timestamp.cmp(&a.2.timestamp))
        });
        Ok(rows.into_iter().map(|(_, _, entry)| entry).collect())
    }
}

pub struct MemoryUnitOfWork {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    working: MemoryState,
}

impl MemoryUnitOfWork {
    fn ensure_open(&self) -> DatabaseResult<()> {
        if self.guard.is_some() {
            Ok(())
        } else {
            Err(DatabaseError::TransactionClosed)
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_prescription(
        &mut self,
        pharmacy_id: i64,
        prescription_id: i64,
    ) -> DatabaseResult<Option<Prescription>> {
        self.ensure_open()?;
        Ok(self
            .working
            .prescriptions
            .iter()
            .find(|p| p.prescription_id == prescription_id && p.pharmacy_id == Some(pharmacy_id))
            .cloned())
    }

    async fn lock_inventory(
        &mut self,
        pharmacy_id: i64,
        drug_id: i64,
    ) -> DatabaseResult<Option<InventoryItem>> {
        self.ensure_open()?;
        Ok(self
            .working
            .inventory
            .iter()
            .find(|i| i.pharmacy_id == pharmacy_id && i.drug_id == drug_id)
            .cloned())
    }

    async fn decrement_stock(
        &mut self,
        pharmacy_id: i64,
        drug_id: i64,
    ) -> DatabaseResult<Option<i32>> {
        self.ensure_open()?;
        let Some(item) = self
            .working
            .inventory
            .iter_mut()
            .find(|i| i.pharmacy_id == pharmacy_id && i.drug_id == drug_id && i.stock_quantity > 0)
        else {
            return Ok(None);
        };
        item.stock_quantity -= 1;
        item.updated_at = Utc::now();
        Ok(Some(item.stock_quantity))
    }

    async fn transition_status(
        &mut self,
        prescription_id: i64,
        from: PrescriptionStatus,
        to: PrescriptionStatus,
    ) -> DatabaseResult<bool> {
        self.ensure_open()?;
        let Some(prescription) = self
            .working
            .prescriptions
            .iter_mut()
            .find(|p| p.prescription_id == prescription_id && p.status == from)
        else {
            return Ok(false);
        };
        prescription.status = to;
        prescription.updated_at = Utc::now();
        Ok(true)
    }

    async fn price_for(
        &mut self,
        pharmacy_id: i64,
        drug_id: i64,
    ) -> DatabaseResult<Option<Decimal>> {
        self.ensure_open()?;
        Ok(self.working.price_row(pharmacy_id, drug_id).map(|p| p.price))
    }

    async fn insert_payment(&mut self, new: NewPayment) -> DatabaseResult<Payment> {
        self.ensure_open()?;
        if self
            .working
            .payments
            .iter()
            .any(|p| p.prescription_id == new.prescription_id)
        {
            return Err(constraint_violation("payments.prescription_id unique"));
        }
        let payment = Payment {
            payment_id: next_id(self.working.payments.iter().map(|p| p.payment_id)),
            prescription_id: new.prescription_id,
            pharmacy_id: new.pharmacy_id,
            patient_id: new.patient_id,
            amount: new.amount,
            is_fulfilled: false,
            payment_date: Utc::now(),
            fulfilled_at: None,
        };
        self.working.payments.push(payment.clone());
        Ok(payment)
    }

    async fn commit(&mut self) -> DatabaseResult<()> {
        let mut guard = self.guard.take().ok_or(DatabaseError::TransactionClosed)?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(&mut self) -> DatabaseResult<()> {
        self.guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryStore {
        InMemoryStore::new(
            MemoryState::default()
                .with_pharmacy(1, 10, "Main Street", true)
                .with_patient(7, "Ada", "Lovelace")
                .with_drug(3, "Orlistat")
                .with_stock(1, 3, 1)
                .with_prescription(100, 1, 7, Some(1), 3, PrescriptionStatus::Pending),
        )
    }

    #[tokio::test]
    async fn dropped_unit_of_work_discards_writes() {
        let store = seeded();
        {
            let mut uow = store.begin().await.unwrap();
            assert_eq!(uow.decrement_stock(1, 3).await.unwrap(), Some(0));
        }
        let state = store.snapshot().await;
        assert_eq!(state.inventory[0].stock_quantity, 1);
    }

    #[tokio::test]
    async fn committed_unit_of_work_is_visible() {
        let store = seeded();
        let mut uow = store.begin().await.unwrap();
        uow.decrement_stock(1, 3).await.unwrap();
        assert!(uow
            .transition_status(100, PrescriptionStatus::Pending, PrescriptionStatus::Filled)
            .await
            .unwrap());
        uow.commit().await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.inventory[0].stock_quantity, 0);
        assert_eq!(state.prescriptions[0].status, PrescriptionStatus::Filled);
    }

    #[tokio::test]
    async fn decrement_never_goes_negative() {
        let store = seeded();
        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.decrement_stock(1, 3).await.unwrap(), Some(0));
        assert_eq!(uow.decrement_stock(1, 3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn transition_is_guarded_by_source_status() {
        let store = seeded();
        let mut uow = store.begin().await.unwrap();
        assert!(!uow
            .transition_status(100, PrescriptionStatus::Filled, PrescriptionStatus::Dispensed)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn commit_twice_reports_closed() {
        let store = seeded();
        let mut uow = store.begin().await.unwrap();
        uow.commit().await.unwrap();
        assert!(matches!(
            uow.commit().await,
            Err(DatabaseError::TransactionClosed)
        ));
    }

    #[tokio::test]
    async fn payment_is_unique_per_prescription() {
        let store = seeded();
        let mut uow = store.begin().await.unwrap();
        let new = NewPayment {
            prescription_id: 100,
            pharmacy_id: 1,
            patient_id: 7,
            amount: Decimal::new(1250, 2),
        };
        uow.insert_payment(new.clone()).await.unwrap();
        assert!(uow.insert_payment(new).await.is_err());
    }

    #[tokio::test]
    async fn upsert_price_reports_branch() {
        let store = seeded();
        let price = Decimal::new(999, 2);
        assert_eq!(
            store.upsert_price(1, 3, price).await.unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            store.upsert_price(1, 3, price).await.unwrap(),
            UpsertOutcome::Updated
        );
        assert_eq!(store.snapshot().await.prices.len(), 1);
    }

    #[tokio::test]
    async fn add_stock_creates_then_increments() {
        let store = seeded();
        let item = store.add_stock(2, 3, 5).await.unwrap();
        assert_eq!(item.stock_quantity, 5);
        assert_eq!(item.drug_name, "Orlistat");
        let item = store.add_stock(2, 3, 2).await.unwrap();
        assert_eq!(item.stock_quantity, 7);
    }

    #[tokio::test]
    async fn restock_past_integer_range_is_refused() {
        let store = InMemoryStore::new(
            MemoryState::default()
                .with_drug(3, "Orlistat")
                .with_stock(2, 3, i32::MAX - 1),
        );
        let err = store.add_stock(2, 3, 2).await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::StockLimitExceeded {
                pharmacy_id: 2,
                drug_id: 3
            }
        ));
        assert_eq!(store.snapshot().await.inventory[0].stock_quantity, i32::MAX - 1);
    }

    #[tokio::test]
    async fn patient_is_found_by_linked_user() {
        let store = InMemoryStore::new(
            MemoryState::default()
                .with_patient(7, "Ada", "Lovelace")
                .with_patient(8, "Alan", "Turing")
                .with_patient_user(8, 80),
        );
        let patient = store.patient_for_user(80).await.unwrap().unwrap();
        assert_eq!(patient.patient_id, 8);
        assert!(store.patient_for_user(70).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_pharmacy_ignores_inactive_rows() {
        let store = InMemoryStore::new(
            MemoryState::default()
                .with_pharmacy(1, 10, "Closed", false)
                .with_pharmacy(2, 10, "Open", true)
                .with_pharmacy(3, 10, "Also open", true),
        );
        let pharmacy = store.active_pharmacy_for_user(10).await.unwrap().unwrap();
        assert_eq!(pharmacy.pharmacy_id, 2);
        assert!(store.active_pharmacy_for_user(11).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn drug_lookup_by_normalized_name() {
        let store = seeded();
        let drug = store.find_drug_by_name("orlistat").await.unwrap();
        assert_eq!(drug.map(|d| d.drug_id), Some(3));
    }
}
