//! Postgres-backed store tests.
//!
//! These run only when `TEST_DATABASE_URL` points at a disposable database;
//! otherwise each test returns immediately.

use database_layer::{
    DatabasePool, PgPharmacyStore, PharmacyStore, PoolSettings, PrescriptionStatus, UpsertOutcome,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

async fn connect() -> Option<PgPharmacyStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = DatabasePool::new(&url, &PoolSettings::default())
        .await
        .expect("connect to TEST_DATABASE_URL");
    pool.run_migrations().await.expect("apply migrations");
    Some(PgPharmacyStore::new(pool))
}

struct Fixture {
    pharmacy_id: i64,
    drug_id: i64,
    patient_id: i64,
    doctor_id: i64,
}

async fn seed(store: &PgPharmacyStore, stock: i32) -> Fixture {
    let pool = store.database().pool();
    let tag = unique_tag();
    let user_id: i64 = unique_user_id();

    let pharmacy_id: i64 = sqlx::query_scalar(
        "INSERT INTO pharmacies (user_id, name) VALUES ($1, $2) RETURNING pharmacy_id",
    )
    .bind(user_id)
    .bind(format!("Test Pharmacy {tag}"))
    .fetch_one(pool)
    .await
    .unwrap();
    let drug_id: i64 =
        sqlx::query_scalar("INSERT INTO drugs (name) VALUES ($1) RETURNING drug_id")
            .bind(format!("Testdrug {tag}"))
            .fetch_one(pool)
            .await
            .unwrap();
    let patient_id: i64 = sqlx::query_scalar(
        "INSERT INTO patients (first_name, last_name) VALUES ('Test', $1) RETURNING patient_id",
    )
    .bind(tag.clone())
    .fetch_one(pool)
    .await
    .unwrap();
    let doctor_id: i64 = sqlx::query_scalar(
        "INSERT INTO doctors (user_id, first_name, last_name) VALUES ($1, 'Doc', $2) RETURNING doctor_id",
    )
    .bind(user_id)
    .bind(tag)
    .fetch_one(pool)
    .await
    .unwrap();
    store.add_stock(pharmacy_id, drug_id, stock).await.unwrap();

    Fixture {
        pharmacy_id,
        drug_id,
        patient_id,
        doctor_id,
    }
}

static SEQUENCE: AtomicI64 = AtomicI64::new(0);

fn unique_user_id() -> i64 {
    chrono::Utc::now().timestamp_micros() * 100 + SEQUENCE.fetch_add(1, Ordering::SeqCst) % 100
}

fn unique_tag() -> String {
    unique_user_id().to_string()
}

#[tokio::test]
async fn concurrent_last_unit_is_taken_once() {
    let Some(store) = connect().await else {
        return;
    };
    let fixture = seed(&store, 1).await;
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = Arc::clone(&store);
        let (pharmacy_id, drug_id) = (fixture.pharmacy_id, fixture.drug_id);
        handles.push(tokio::spawn(async move {
            let mut uow = store.begin().await.unwrap();
            let locked = uow.lock_inventory(pharmacy_id, drug_id).await.unwrap();
            let taken = match locked {
                Some(item) if item.stock_quantity > 0 => {
                    uow.decrement_stock(pharmacy_id, drug_id).await.unwrap()
                }
                _ => None,
            };
            uow.commit().await.unwrap();
            taken.is_some()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);

    let inventory = store.list_inventory(fixture.pharmacy_id).await.unwrap();
    assert_eq!(inventory[0].stock_quantity, 0);
}

#[tokio::test]
async fn price_upsert_replay_keeps_one_row() {
    let Some(store) = connect().await else {
        return;
    };
    let fixture = seed(&store, 0).await;
    let price = Decimal::new(1999, 2);

    let first = store
        .upsert_price(fixture.pharmacy_id, fixture.drug_id, price)
        .await
        .unwrap();
    let second = store
        .upsert_price(fixture.pharmacy_id, fixture.drug_id, price)
        .await
        .unwrap();

    assert_eq!(first, UpsertOutcome::Inserted);
    assert_eq!(second, UpsertOutcome::Updated);
    let prices = store.list_prices(fixture.pharmacy_id).await.unwrap();
    assert_eq!(prices.len(), 1);
    assert_eq!(prices[0].price, price);
}

#[tokio::test]
async fn rolled_back_transition_leaves_no_trace() {
    let Some(store) = connect().await else {
        return;
    };
    let fixture = seed(&store, 3).await;
    let prescription = store
        .insert_prescription(database_layer::NewPrescription {
            doctor_id: fixture.doctor_id,
            patient_id: fixture.patient_id,
            pharmacy_id: Some(fixture.pharmacy_id),
            drug_id: fixture.drug_id,
            dosage: "10mg".into(),
            instructions: "Daily".into(),
        })
        .await
        .unwrap();

    let mut uow = store.begin().await.unwrap();
    uow.decrement_stock(fixture.pharmacy_id, fixture.drug_id)
        .await
        .unwrap();
    assert!(uow
        .transition_status(
            prescription.prescription_id,
            PrescriptionStatus::Pending,
            PrescriptionStatus::Filled,
        )
        .await
        .unwrap());
    uow.rollback().await.unwrap();

    let inventory = store.list_inventory(fixture.pharmacy_id).await.unwrap();
    assert_eq!(inventory[0].stock_quantity, 3);
    let summary = store
        .get_prescription_summary(fixture.pharmacy_id, prescription.prescription_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.status, PrescriptionStatus::Pending);
}
