//! Postgres-backed store.

use crate::connection::DatabasePool;
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{
    BillingLogEntry, Doctor, Drug, DrugPrice, InventoryItem, NewPayment, NewPrescription, Page,
    Patient, PatientSummary, Payment, PaymentView, PendingRequest, Pharmacy, Prescription,
    PrescriptionSearch, PrescriptionStatus, PrescriptionSummary, QueueEntry, SearchTerm,
    UpsertOutcome,
};
use crate::query::PaginatedQuery;
use crate::store::{PharmacyStore, UnitOfWork};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use tracing::debug;

const PRESCRIPTION_COLUMNS: &str = "prescription_id, doctor_id, patient_id, pharmacy_id, drug_id, \
     dosage, instructions, status, created_at, updated_at";

const SUMMARY_SELECT: &str = "SELECT p.prescription_id, p.patient_id, \
     pa.first_name || ' ' || pa.last_name AS patient_name, p.drug_id, \
     d.name AS medication_name, p.dosage, p.instructions, p.status, p.created_at \
     FROM prescriptions p \
     JOIN patients pa ON pa.patient_id = p.patient_id \
     JOIN drugs d ON d.drug_id = p.drug_id \
     WHERE 1=1";

const SUMMARY_COUNT: &str = "SELECT COUNT(*) FROM prescriptions p \
     JOIN drugs d ON d.drug_id = p.drug_id \
     WHERE 1=1";

const PAYMENT_COLUMNS: &str = "payment_id, prescription_id, pharmacy_id, patient_id, amount, \
     is_fulfilled, payment_date, fulfilled_at";

fn apply_search_term(query: &mut PaginatedQuery<'_>, term: Option<&SearchTerm>) {
    match term {
        Some(SearchTerm::Id(id)) => {
            query.add_base_filter("p.prescription_id", *id);
        }
        Some(SearchTerm::Medication(name)) => {
            query.filter_ilike(&["d.name"], Some(name));
        }
        None => {}
    }
}

#[derive(Clone, Debug)]
pub struct PgPharmacyStore {
    db: DatabasePool,
}

impl PgPharmacyStore {
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &DatabasePool {
        &self.db
    }
}

#[async_trait]
impl PharmacyStore for PgPharmacyStore {
    async fn ping(&self) -> DatabaseResult<()> {
        sqlx::query("SELECT 1").execute(self.db.pool()).await?;
        Ok(())
    }

    async fn begin(&self) -> DatabaseResult<Box<dyn UnitOfWork>> {
        let tx = self.db.pool().begin().await?;
        debug!("Transaction started");
        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }

    async fn active_pharmacy_for_user(&self, user_id: i64) -> DatabaseResult<Option<Pharmacy>> {
        let pharmacy = sqlx::query_as::<_, Pharmacy>(
            "SELECT pharmacy_id, user_id, name, is_active FROM pharmacies \
             WHERE user_id = $1 AND is_active = TRUE \
             ORDER BY pharmacy_id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(pharmacy)
    }

    async fn doctor_for_user(&self, user_id: i64) -> DatabaseResult<Option<Doctor>> {
        let doctor = sqlx::query_as::<_, Doctor>(
            "SELECT doctor_id, user_id, first_name, last_name FROM doctors \
             WHERE user_id = $1 ORDER BY doctor_id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(doctor)
    }

    async fn find_patient(&self, patient_id: i64) -> DatabaseResult<Option<Patient>> {
        let patient = sqlx::query_as::<_, Patient>(
            "SELECT patient_id, user_id, first_name, last_name FROM patients WHERE patient_id = $1",
        )
        .bind(patient_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(patient)
    }

    async fn patient_for_user(&self, user_id: i64) -> DatabaseResult<Option<Patient>> {
        let patient = sqlx::query_as::<_, Patient>(
            "SELECT patient_id, user_id, first_name, last_name FROM patients \
             WHERE user_id = $1 ORDER BY patient_id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(patient)
    }

    async fn list_drugs(&self) -> DatabaseResult<Vec<Drug>> {
        let drugs = sqlx::query_as::<_, Drug>(
            "SELECT drug_id, name, description FROM drugs ORDER BY drug_id",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(drugs)
    }

    async fn find_drug(&self, drug_id: i64) -> DatabaseResult<Option<Drug>> {
        let drug = sqlx::query_as::<_, Drug>(
            "SELECT drug_id, name, description FROM drugs WHERE drug_id = $1",
        )
        .bind(drug_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(drug)
    }

    async fn find_drug_by_name(&self, normalized_name: &str) -> DatabaseResult<Option<Drug>> {
        let drug = sqlx::query_as::<_, Drug>(
            "SELECT drug_id, name, description FROM drugs WHERE lower(btrim(name)) = $1",
        )
        .bind(normalized_name)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(drug)
    }

    async fn preferred_pharmacy(&self, patient_id: i64) -> DatabaseResult<Option<i64>> {
        let pharmacy_id = sqlx::query_scalar::<_, i64>(
            "SELECT pharmacy_id FROM patient_preferred_pharmacy WHERE patient_id = $1",
        )
        .bind(patient_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(pharmacy_id)
    }

    async fn insert_prescription(&self, new: NewPrescription) -> DatabaseResult<Prescription> {
        let sql = format!(
            "INSERT INTO prescriptions \
             (doctor_id, patient_id, pharmacy_id, drug_id, dosage, instructions, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PRESCRIPTION_COLUMNS}"
        );
        let prescription = sqlx::query_as::<_, Prescription>(&sql)
            .bind(new.doctor_id)
            .bind(new.patient_id)
            .bind(new.pharmacy_id)
            .bind(new.drug_id)
            .bind(new.dosage)
            .bind(new.instructions)
            .bind(PrescriptionStatus::Pending.as_str())
            .fetch_one(self.db.pool())
            .await?;
        Ok(prescription)
    }

    async fn search_prescriptions(
        &self,
        pharmacy_id: i64,
        search: &PrescriptionSearch,
    ) -> DatabaseResult<Page<PrescriptionSummary>> {
        let mut count = PaginatedQuery::new(SUMMARY_COUNT);
        count.add_base_filter("p.pharmacy_id", pharmacy_id);
        apply_search_term(&mut count, search.term.as_ref());
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(self.db.pool())
            .await?;

        let mut query = PaginatedQuery::new(SUMMARY_SELECT);
        query.add_base_filter("p.pharmacy_id", pharmacy_id);
        apply_search_term(&mut query, search.term.as_ref());
        query
            .order_by("p.created_at", "DESC")
            .then_by("p.prescription_id", "DESC")
            .limit_offset(search.limit, search.offset);
        debug!(sql = query.sql(), "Searching prescriptions");

        let items = query
            .build_query_as::<PrescriptionSummary>()
            .fetch_all(self.db.pool())
            .await?;
        Ok(Page { items, total })
    }

    async fn get_prescription_summary(
        &self,
        pharmacy_id: i64,
        prescription_id: i64,
    ) -> DatabaseResult<Option<PrescriptionSummary>> {
        let mut query = PaginatedQuery::new(SUMMARY_SELECT);
        query
            .add_base_filter("p.pharmacy_id", pharmacy_id)
            .add_base_filter("p.prescription_id", prescription_id);
        let summary = query
            .build_query_as::<PrescriptionSummary>()
            .fetch_optional(self.db.pool())
            .await?;
        Ok(summary)
    }

    async fn prescriptions_by_status(
        &self,
        pharmacy_id: i64,
        status: PrescriptionStatus,
    ) -> DatabaseResult<Vec<QueueEntry>> {
        let entries = sqlx::query_as::<_, QueueEntry>(
            "SELECT p.prescription_id, pa.first_name || ' ' || pa.last_name AS patient_name, \
             d.name AS medication_name, p.dosage, p.created_at AS requested_at \
             FROM prescriptions p \
             JOIN patients pa ON pa.patient_id = p.patient_id \
             JOIN drugs d ON d.drug_id = p.drug_id \
             WHERE p.pharmacy_id = $1 AND p.status = $2 \
             ORDER BY p.created_at ASC, p.prescription_id ASC",
        )
        .bind(pharmacy_id)
        .bind(status.as_str())
        .fetch_all(self.db.pool())
        .await?;
        Ok(entries)
    }

    async fn pending_requests(&self, pharmacy_id: i64) -> DatabaseResult<Vec<PendingRequest>> {
        let requests = sqlx::query_as::<_, PendingRequest>(
            "SELECT p.prescription_id, pa.first_name || ' ' || pa.last_name AS patient_name, \
             d.name AS medication_name, p.dosage, p.status, pi.stock_quantity, \
             (pi.stock_quantity IS NULL OR pi.stock_quantity <= 0) AS inventory_conflict \
             FROM prescriptions p \
             JOIN patients pa ON pa.patient_id = p.patient_id \
             JOIN drugs d ON d.drug_id = p.drug_id \
             LEFT JOIN pharmacy_inventory pi \
               ON pi.pharmacy_id = p.pharmacy_id AND pi.drug_id = p.drug_id \
             WHERE p.pharmacy_id = $1 AND p.status = $2 \
             ORDER BY p.created_at ASC, p.prescription_id ASC",
        )
        .bind(pharmacy_id)
        .bind(PrescriptionStatus::Pending.as_str())
        .fetch_all(self.db.pool())
        .await?;
        Ok(requests)
    }

    async fn pharmacy_patients(&self, pharmacy_id: i64) -> DatabaseResult<Vec<PatientSummary>> {
        let patients = sqlx::query_as::<_, PatientSummary>(
            "SELECT DISTINCT pa.patient_id, pa.first_name || ' ' || pa.last_name AS patient_name \
             FROM prescriptions p \
             JOIN patients pa ON pa.patient_id = p.patient_id \
             WHERE p.pharmacy_id = $1 \
             ORDER BY patient_name, pa.patient_id",
        )
        .bind(pharmacy_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(patients)
    }

    async fn list_inventory(&self, pharmacy_id: i64) -> DatabaseResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(
            "SELECT pi.inventory_id, pi.pharmacy_id, pi.drug_id, d.name AS drug_name, \
             pi.stock_quantity, pi.updated_at \
             FROM pharmacy_inventory pi \
             JOIN drugs d ON d.drug_id = pi.drug_id \
             WHERE pi.pharmacy_id = $1 \
             ORDER BY d.name, pi.drug_id",
        )
        .bind(pharmacy_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(items)
    }

    async fn add_stock(
        &self,
        pharmacy_id: i64,
        drug_id: i64,
        quantity: i32,
    ) -> DatabaseResult<InventoryItem> {
        let item = sqlx::query_as::<_, InventoryItem>(
            "WITH upserted AS ( \
                 INSERT INTO pharmacy_inventory (pharmacy_id, drug_id, stock_quantity) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (pharmacy_id, drug_id) DO UPDATE \
                 SET stock_quantity = pharmacy_inventory.stock_quantity + EXCLUDED.stock_quantity, \
                     updated_at = NOW() \
                 WHERE pharmacy_inventory.stock_quantity <= 2147483647 - EXCLUDED.stock_quantity \
                 RETURNING inventory_id, pharmacy_id, drug_id, stock_quantity, updated_at \
             ) \
             SELECT u.inventory_id, u.pharmacy_id, u.drug_id, d.name AS drug_name, \
                    u.stock_quantity, u.updated_at \
             FROM upserted u JOIN drugs d ON d.drug_id = u.drug_id",
        )
        .bind(pharmacy_id)
        .bind(drug_id)
        .bind(quantity)
        .fetch_optional(self.db.pool())
        .await?;
        // The guarded update returns no row when the sum would not fit an INTEGER
        item.ok_or(DatabaseError::StockLimitExceeded {
            pharmacy_id,
            drug_id,
        })
    }

    async fn list_prices(&self, pharmacy_id: i64) -> DatabaseResult<Vec<DrugPrice>> {
        let prices = sqlx::query_as::<_, DrugPrice>(
            "SELECT pp.pharmacy_id, pp.drug_id, d.name, d.description, pp.price, pp.updated_at \
             FROM pharmacy_drug_prices pp \
             JOIN drugs d ON d.drug_id = pp.drug_id \
             WHERE pp.pharmacy_id = $1 \
             ORDER BY pp.drug_id",
        )
        .bind(pharmacy_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(prices)
    }

    async fn upsert_price(
        &self,
        pharmacy_id: i64,
        drug_id: i64,
        price: Decimal,
    ) -> DatabaseResult<UpsertOutcome> {
        // xmax is zero only for a freshly inserted tuple
        let inserted = sqlx::query_scalar::<_, bool>(
            "INSERT INTO pharmacy_drug_prices (pharmacy_id, drug_id, price) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (pharmacy_id, drug_id) DO UPDATE \
             SET price = EXCLUDED.price, updated_at = NOW() \
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(pharmacy_id)
        .bind(drug_id)
        .bind(price)
        .fetch_one(self.db.pool())
        .await?;
        Ok(UpsertOutcome::from_inserted(inserted))
    }

    async fn list_payments(&self, pharmacy_id: i64) -> DatabaseResult<Vec<PaymentView>> {
        let payments = sqlx::query_as::<_, PaymentView>(
            "SELECT pay.payment_id, pay.prescription_id, \
             pa.first_name || ' ' || pa.last_name AS patient_name, \
             d.name AS medication_name, pay.amount, pay.is_fulfilled, pay.payment_date \
             FROM payments pay \
             JOIN prescriptions p ON p.prescription_id = pay.prescription_id \
             JOIN patients pa ON pa.patient_id = pay.patient_id \
             JOIN drugs d ON d.drug_id = p.drug_id \
             WHERE pay.pharmacy_id = $1 \
             ORDER BY pay.payment_date DESC, pay.payment_id DESC",
        )
        .bind(pharmacy_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(payments)
    }

    async fn mark_payment_fulfilled(
        &self,
        pharmacy_id: i64,
        payment_id: i64,
    ) -> DatabaseResult<Option<Payment>> {
        let sql = format!(
            "UPDATE payments \
             SET is_fulfilled = TRUE, fulfilled_at = COALESCE(fulfilled_at, NOW()) \
             WHERE payment_id = $1 AND pharmacy_id = $2 \
             RETURNING {PAYMENT_COLUMNS}"
        );
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_id)
            .bind(pharmacy_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(payment)
    }

    async fn billing_log(
        &self,
        pharmacy_id: i64,
        search: Option<&str>,
    ) -> DatabaseResult<Vec<BillingLogEntry>> {
        let mut query = PaginatedQuery::new(
            "SELECT pay.payment_id, pay.prescription_id, \
             pa.first_name || ' ' || pa.last_name AS patient_name, \
             d.name AS medication_name, pay.amount AS amount_billed, \
             pay.payment_date AS timestamp \
             FROM payments pay \
             JOIN prescriptions p ON p.prescription_id = pay.prescription_id \
             JOIN patients pa ON pa.patient_id = pay.patient_id \
             JOIN drugs d ON d.drug_id = p.drug_id \
             WHERE 1=1",
        );
        query
            .add_base_filter("pay.pharmacy_id", pharmacy_id)
            .filter_ilike(
                &["d.name", "(pa.first_name || ' ' || pa.last_name)"],
                search,
            )
            .order_by("pa.last_name", "ASC")
            .then_by("pa.first_name", "ASC")
            .then_by("pay.payment_date", "DESC");
        let entries = query
            .build_query_as::<BillingLogEntry>()
            .fetch_all(self.db.pool())
            .await?;
        Ok(entries)
    }
}

/// One Postgres transaction. Dropping it without `commit` rolls back.
pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    fn tx(&mut self) -> DatabaseResult<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(DatabaseError::TransactionClosed)
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_prescription(
        &mut self,
        pharmacy_id: i64,
        prescription_id: i64,
    ) -> DatabaseResult<Option<Prescription>> {
        let sql = format!(
            "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions \
             WHERE prescription_id = $1 AND pharmacy_id = $2 \
             FOR UPDATE"
        );
        let tx = self.tx()?;
        let prescription = sqlx::query_as::<_, Prescription>(&sql)
            .bind(prescription_id)
            .bind(pharmacy_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(prescription)
    }

    async fn lock_inventory(
        &mut self,
        pharmacy_id: i64,
        drug_id: i64,
    ) -> DatabaseResult<Option<InventoryItem>> {
        let tx = self.tx()?;
        let item = sqlx::query_as::<_, InventoryItem>(
            "SELECT pi.inventory_id, pi.pharmacy_id, pi.drug_id, d.name AS drug_name, \
             pi.stock_quantity, pi.updated_at \
             FROM pharmacy_inventory pi \
             JOIN drugs d ON d.drug_id = pi.drug_id \
             WHERE pi.pharmacy_id = $1 AND pi.drug_id = $2 \
             FOR UPDATE OF pi",
        )
        .bind(pharmacy_id)
        .bind(drug_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(item)
    }

    async fn decrement_stock(
        &mut self,
        pharmacy_id: i64,
        drug_id: i64,
    ) -> DatabaseResult<Option<i32>> {
        let tx = self.tx()?;
        let remaining = sqlx::query_scalar::<_, i32>(
            "UPDATE pharmacy_inventory \
             SET stock_quantity = stock_quantity - 1, updated_at = NOW() \
             WHERE pharmacy_id = $1 AND drug_id = $2 AND stock_quantity > 0 \
             RETURNING stock_quantity",
        )
        .bind(pharmacy_id)
        .bind(drug_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(remaining)
    }

    async fn transition_status(
        &mut self,
        prescription_id: i64,
        from: PrescriptionStatus,
        to: PrescriptionStatus,
    ) -> DatabaseResult<bool> {
        let tx = self.tx()?;
        let result = sqlx::query(
            "UPDATE prescriptions SET status = $3, updated_at = NOW() \
             WHERE prescription_id = $1 AND status = $2",
        )
        .bind(prescription_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn price_for(
        &mut self,
        pharmacy_id: i64,
        drug_id: i64,
    ) -> DatabaseResult<Option<Decimal>> {
        let tx = self.tx()?;
        let price = sqlx::query_scalar::<_, Decimal>(
            "SELECT price FROM pharmacy_drug_prices WHERE pharmacy_id = $1 AND drug_id = $2",
        )
        .bind(pharmacy_id)
        .bind(drug_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(price)
    }

    async fn insert_payment(&mut self, new: NewPayment) -> DatabaseResult<Payment> {
        let sql = format!(
            "INSERT INTO payments (prescription_id, pharmacy_id, patient_id, amount, is_fulfilled) \
             VALUES ($1, $2, $3, $4, FALSE) \
             RETURNING {PAYMENT_COLUMNS}"
        );
        let tx = self.tx()?;
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(new.prescription_id)
            .bind(new.pharmacy_id)
            .bind(new.patient_id)
            .bind(new.amount)
            .fetch_one(&mut **tx)
            .await?;
        Ok(payment)
    }

    async fn commit(&mut self) -> DatabaseResult<()> {
        let tx = self.tx.take().ok_or(DatabaseError::TransactionClosed)?;
        tx.commit().await?;
        debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> DatabaseResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            debug!("Transaction rolled back");
        }
        Ok(())
    }
}
