//! Shared fixture: the full router over an in-memory store.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use database_layer::{InMemoryStore, MemoryState, PrescriptionStatus};
use pharmacy_server::auth::{JwtService, Role};
use pharmacy_server::{create_app, AppConfig, PharmacyServer};
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";

pub const PHARMACY_USER: i64 = 1;
pub const PREFERRED_PHARMACY_USER: i64 = 5;
pub const DOCTOR_USER: i64 = 50;
pub const PATIENT_USER: i64 = 70;

pub const METFORMIN: i64 = 2;
pub const ORLISTAT: i64 = 3;

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = SECRET.to_string();
    config
}

/// Pharmacy 1 (user 1) has no Orlistat, ten Metformin and three historic
/// payments. Pharmacy 5 (user 5) is patient 7's preferred pharmacy.
pub fn seeded_state() -> MemoryState {
    MemoryState::default()
        .with_pharmacy(1, PHARMACY_USER, "Main Street Pharmacy", true)
        .with_pharmacy(5, PREFERRED_PHARMACY_USER, "Preferred Pharmacy", true)
        .with_doctor(5, DOCTOR_USER, "Gregory", "House")
        .with_patient(7, "Ada", "Lovelace")
        .with_patient(8, "Alan", "Turing")
        .with_patient_user(7, PATIENT_USER)
        .with_drug(METFORMIN, "Metformin")
        .with_drug(ORLISTAT, "Orlistat")
        .with_preferred_pharmacy(7, 5)
        .with_preferred_pharmacy(8, 1)
        .with_stock(1, ORLISTAT, 0)
        .with_stock(1, METFORMIN, 10)
        .with_prescription(100, 5, 7, Some(1), ORLISTAT, PrescriptionStatus::Pending)
        .with_prescription(101, 5, 8, Some(1), METFORMIN, PrescriptionStatus::Pending)
        .with_prescription(102, 5, 8, Some(1), METFORMIN, PrescriptionStatus::Filled)
        .with_prescription(103, 5, 7, Some(1), ORLISTAT, PrescriptionStatus::Dispensed)
        .with_prescription(104, 5, 8, Some(1), METFORMIN, PrescriptionStatus::Dispensed)
        .with_prescription(105, 5, 8, Some(1), ORLISTAT, PrescriptionStatus::Dispensed)
        .with_payment(1, 103, 1, 7, Decimal::new(1999, 2), true, 10)
        .with_payment(2, 104, 1, 8, Decimal::new(875, 2), false, 20)
        .with_payment(3, 105, 1, 8, Decimal::new(1999, 2), true, 30)
}

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryStore,
    tokens: Arc<JwtService>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(seeded_state(), test_config())
    }

    pub fn with(state: MemoryState, config: AppConfig) -> Self {
        let store = InMemoryStore::new(state);
        let server = PharmacyServer::with_store(config, Arc::new(store.clone()));
        let tokens = Arc::clone(&server.tokens);
        Self {
            router: create_app(server),
            store,
            tokens,
        }
    }

    pub fn token(&self, user_id: i64, role: Role) -> String {
        self.tokens.issue(user_id, role, None).unwrap()
    }

    pub fn pharmacy_token(&self) -> String {
        self.token(PHARMACY_USER, Role::Pharmacy)
    }

    pub fn doctor_token(&self) -> String {
        self.token(DOCTOR_USER, Role::Doctor)
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), body).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn status_of(&self, prescription_id: i64) -> PrescriptionStatus {
        self.store
            .snapshot()
            .await
            .prescriptions
            .iter()
            .find(|p| p.prescription_id == prescription_id)
            .map(|p| p.status)
            .unwrap()
    }

    pub async fn stock_of(&self, pharmacy_id: i64, drug_id: i64) -> i32 {
        self.store
            .snapshot()
            .await
            .inventory
            .iter()
            .find(|i| i.pharmacy_id == pharmacy_id && i.drug_id == drug_id)
            .map(|i| i.stock_quantity)
            .unwrap()
    }
}
