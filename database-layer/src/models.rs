// Database models
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle of a prescription: `pending -> filled -> dispensed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrescriptionStatus {
    Pending,
    Filled,
    Dispensed,
}

impl PrescriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrescriptionStatus::Pending => "pending",
            PrescriptionStatus::Filled => "filled",
            PrescriptionStatus::Dispensed => "dispensed",
        }
    }

    /// The status a prescription moves to from this one, if any.
    pub fn next(&self) -> Option<PrescriptionStatus> {
        match self {
            PrescriptionStatus::Pending => Some(PrescriptionStatus::Filled),
            PrescriptionStatus::Filled => Some(PrescriptionStatus::Dispensed),
            PrescriptionStatus::Dispensed => None,
        }
    }
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown prescription status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for PrescriptionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PrescriptionStatus::Pending),
            "filled" => Ok(PrescriptionStatus::Filled),
            "dispensed" => Ok(PrescriptionStatus::Dispensed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for PrescriptionStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Normalized form used for drug-name comparisons: trimmed and lowercased.
pub fn normalize_drug_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Decimal places kept by the `NUMERIC(10, 2)` money columns.
pub const MONEY_SCALE: u32 = 2;

/// Exclusive upper bound of a `NUMERIC(10, 2)` column: 10^8.
pub const MONEY_LIMIT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// True when `amount` is stored by a money column without rounding or overflow.
pub fn fits_money_column(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE && amount.abs() < MONEY_LIMIT
}

/// `amount` at the scale the money columns return, so both stores render alike.
pub fn to_money_scale(mut amount: Decimal) -> Decimal {
    amount.rescale(MONEY_SCALE);
    amount
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Pharmacy {
    pub pharmacy_id: i64,
    pub user_id: i64,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Doctor {
    pub doctor_id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Patient {
    pub patient_id: i64,
    pub user_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Drug {
    pub drug_id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Prescription {
    pub prescription_id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub pharmacy_id: Option<i64>,
    pub drug_id: i64,
    pub dosage: String,
    pub instructions: String,
    #[sqlx(try_from = "String")]
    pub status: PrescriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub doctor_id: i64,
    pub patient_id: i64,
    pub pharmacy_id: Option<i64>,
    pub drug_id: i64,
    pub dosage: String,
    pub instructions: String,
}

/// Prescription joined with patient and drug names, as shown to pharmacy staff.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct PrescriptionSummary {
    pub prescription_id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    pub drug_id: i64,
    pub medication_name: String,
    pub dosage: String,
    pub instructions: String,
    #[sqlx(try_from = "String")]
    pub status: PrescriptionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct QueueEntry {
    pub prescription_id: i64,
    pub patient_name: String,
    pub medication_name: String,
    pub dosage: String,
    pub requested_at: DateTime<Utc>,
}

/// Pending prescription with the stock the pharmacy currently holds for it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct PendingRequest {
    pub prescription_id: i64,
    pub patient_name: String,
    pub medication_name: String,
    pub dosage: String,
    #[sqlx(try_from = "String")]
    pub status: PrescriptionStatus,
    pub stock_quantity: Option<i32>,
    pub inventory_conflict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct PatientSummary {
    pub patient_id: i64,
    pub patient_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct InventoryItem {
    pub inventory_id: i64,
    pub pharmacy_id: i64,
    pub drug_id: i64,
    pub drug_name: String,
    pub stock_quantity: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct DrugPrice {
    pub pharmacy_id: i64,
    pub drug_id: i64,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "12.50")]
    pub price: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Which branch of an upsert was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

impl UpsertOutcome {
    pub fn from_inserted(inserted: bool) -> Self {
        if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Payment {
    pub payment_id: i64,
    pub prescription_id: i64,
    pub pharmacy_id: i64,
    pub patient_id: i64,
    #[schema(value_type = String, example = "12.50")]
    pub amount: Decimal,
    pub is_fulfilled: bool,
    pub payment_date: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub prescription_id: i64,
    pub pharmacy_id: i64,
    pub patient_id: i64,
    pub amount: Decimal,
}

/// Payment joined with patient and drug names.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct PaymentView {
    pub payment_id: i64,
    pub prescription_id: i64,
    pub patient_name: String,
    pub medication_name: String,
    #[schema(value_type = String, example = "12.50")]
    pub amount: Decimal,
    pub is_fulfilled: bool,
    pub payment_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct BillingLogEntry {
    pub payment_id: i64,
    pub prescription_id: i64,
    pub patient_name: String,
    pub medication_name: String,
    #[schema(value_type = String, example = "12.50")]
    pub amount_billed: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Free-text prescription search: an all-digit term matches the id,
/// anything else is a case-insensitive substring of the drug name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTerm {
    Id(i64),
    Medication(String),
}

impl SearchTerm {
    pub fn parse(raw: &str) -> Option<Self> {
        let term = raw.trim();
        if term.is_empty() {
            return None;
        }
        if term.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = term.parse::<i64>() {
                return Some(SearchTerm::Id(id));
            }
        }
        Some(SearchTerm::Medication(term.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct PrescriptionSearch {
    pub term: Option<SearchTerm>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}
