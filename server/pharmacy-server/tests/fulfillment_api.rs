//! Prescription lifecycle over HTTP: intake, fill, dispense.

mod common;

use axum::http::{Method, StatusCode};
use common::*;
use database_layer::PrescriptionStatus;
use serde_json::json;

#[tokio::test]
async fn out_of_stock_fill_is_rejected_without_mutation() {
    let app = TestApp::new();
    let token = app.pharmacy_token();

    let (status, body) = app
        .post("/api/v1/prescriptions/100/fulfill", &token, None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Out of stock"));
    assert_eq!(body["error_type"], "inventory_conflict");
    assert_eq!(app.status_of(100).await, PrescriptionStatus::Pending);
    assert_eq!(app.stock_of(1, ORLISTAT).await, 0);
    assert_eq!(app.store.snapshot().await.payments.len(), 3);
}

#[tokio::test]
async fn fill_decrements_stock_and_second_fill_is_not_found() {
    let app = TestApp::new();
    let token = app.pharmacy_token();

    let (status, body) = app
        .post("/api/v1/prescriptions/101/fulfill", &token, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "filled");
    assert_eq!(body["data"]["remaining_stock"], 9);
    assert_eq!(body["data"]["prescription_id"], 101);
    assert_eq!(app.stock_of(1, METFORMIN).await, 9);

    let (status, body) = app
        .post("/api/v1/prescriptions/101/fulfill", &token, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["message"],
        "Prescription not found or not in pending status"
    );
    assert_eq!(app.stock_of(1, METFORMIN).await, 9);
}

#[tokio::test]
async fn restock_by_name_unblocks_fill() {
    let app = TestApp::new();
    let token = app.pharmacy_token();

    let (status, body) = app
        .post(
            "/api/v1/pharmacy/inventory/add",
            &token,
            Some(json!({ "drug_name": "  ORLISTAT ", "quantity": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["stock_quantity"], 5);
    assert_eq!(body["data"]["drug_id"], ORLISTAT);

    let (status, _) = app
        .post("/api/v1/prescriptions/100/fulfill", &token, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.stock_of(1, ORLISTAT).await, 4);
}

#[tokio::test]
async fn intake_routes_to_preferred_pharmacy() {
    let app = TestApp::new();
    let token = app.doctor_token();

    let (status, body) = app
        .post(
            "/api/v1/prescriptions/request",
            &token,
            Some(json!({
                "doctor_id": 5,
                "patient_id": 7,
                "drug_id": ORLISTAT,
                "dosage": "120mg",
                "instructions": "Take with each main meal"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["pharmacy_id"], 5);
    let id = body["data"]["prescription_id"].as_i64().unwrap();
    assert_eq!(app.status_of(id).await, PrescriptionStatus::Pending);
}

#[tokio::test]
async fn intake_rejects_missing_fields_and_unknown_drug() {
    let app = TestApp::new();
    let token = app.doctor_token();

    let (status, _) = app
        .post(
            "/api/v1/prescriptions/request",
            &token,
            Some(json!({ "doctor_id": 5, "patient_id": 7, "drug_id": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/v1/prescriptions/request",
            &token,
            Some(json!({
                "doctor_id": 5,
                "patient_id": 7,
                "drug_id": 999,
                "dosage": "1 tablet",
                "instructions": "Daily"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn intake_by_pharmacy_account_is_forbidden() {
    let app = TestApp::new();
    let token = app.pharmacy_token();

    let (status, _) = app
        .post(
            "/api/v1/prescriptions/request",
            &token,
            Some(json!({
                "doctor_id": 5,
                "patient_id": 7,
                "drug_id": 3,
                "dosage": "1 tablet",
                "instructions": "Daily"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn priced_dispense_creates_exactly_one_payment() {
    let app = TestApp::new();
    let token = app.pharmacy_token();

    let (status, _) = app
        .patch(
            "/api/v1/prices/update",
            &token,
            json!({ "drug_id": METFORMIN, "price": "12.50" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/api/v1/pharmacy/prescriptions/102/dispense", &token, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["amount"], "12.50");
    assert_eq!(body["data"]["status"], "dispensed");
    assert_eq!(app.status_of(102).await, PrescriptionStatus::Dispensed);

    let (status, _) = app
        .post("/api/v1/pharmacy/prescriptions/102/dispense", &token, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let payments = app.store.snapshot().await.payments;
    assert_eq!(payments.len(), 4);
    assert_eq!(payments.iter().filter(|p| p.prescription_id == 102).count(), 1);
}

#[tokio::test]
async fn dispense_without_price_conflicts() {
    let app = TestApp::new();
    let token = app.pharmacy_token();

    let (status, body) = app
        .post("/api/v1/pharmacy/prescriptions/102/dispense", &token, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_type"], "conflict");
    assert_eq!(app.status_of(102).await, PrescriptionStatus::Filled);
    assert_eq!(app.store.snapshot().await.payments.len(), 3);
}

#[tokio::test]
async fn non_integer_id_is_bad_request() {
    let app = TestApp::new();
    let token = app.pharmacy_token();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/prescriptions/abc/fulfill",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "bad_request");
}

#[tokio::test]
async fn configured_fallback_is_billed_in_cents() {
    let mut config = test_config();
    config.billing.fallback_amount = Some(rust_decimal::Decimal::new(55, 1));
    let app = TestApp::with(seeded_state(), config);
    let token = app.pharmacy_token();

    let (status, body) = app
        .post("/api/v1/pharmacy/prescriptions/102/dispense", &token, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["amount"], "5.50");
}

#[tokio::test]
async fn restock_beyond_integer_range_is_bad_request() {
    let state = seeded_state().with_stock(1, 99, i32::MAX - 5).with_drug(99, "Insulin");
    let app = TestApp::with(state, test_config());
    let token = app.pharmacy_token();

    let (status, body) = app
        .post(
            "/api/v1/pharmacy/inventory/add",
            &token,
            Some(json!({ "drug_id": 99, "quantity": 10 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
    assert_eq!(app.stock_of(1, 99).await, i32::MAX - 5);
}
