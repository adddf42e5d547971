pub mod paths;

use crate::{
    handlers::{
        drugs, health, inventory, logs, patient, payments, pharmacy, prescriptions, prices,
    },
    openapi,
    server::PharmacyServer,
};
use axum::{
    routing::{get, patch, post},
    Router,
};

/// Liveness and build info, no authentication
pub fn health_routes() -> Router<PharmacyServer> {
    Router::new()
        .route(paths::health::HEALTH, get(health::health_check))
        .route(paths::health::VERSION, get(health::version_info))
}

pub fn prescription_routes() -> Router<PharmacyServer> {
    use paths::api_v1::*;
    Router::new()
        .route(PRESCRIPTIONS, get(prescriptions::list_prescriptions))
        .route(PRESCRIPTION_REQUEST, post(prescriptions::request_prescription))
        .route(PRESCRIPTION_BY_ID, get(prescriptions::get_prescription))
        .route(PRESCRIPTION_FULFILL, post(prescriptions::fulfill_prescription))
}

pub fn pharmacy_routes() -> Router<PharmacyServer> {
    use paths::api_v1::*;
    Router::new()
        .route(PHARMACY_ME, get(pharmacy::current_pharmacy))
        .route(PHARMACY_REQUESTS, get(pharmacy::pending_requests))
        .route(PHARMACY_QUEUE, get(pharmacy::queue))
        .route(PHARMACY_FILLED, get(pharmacy::filled_prescriptions))
        .route(PHARMACY_DISPENSE, post(pharmacy::dispense_prescription))
        .route(PHARMACY_PATIENTS, get(pharmacy::patients))
        // Inventory
        .route(PHARMACY_INVENTORY, get(inventory::list_inventory))
        .route(PHARMACY_INVENTORY_ADD, post(inventory::add_stock))
        // Billing
        .route(PHARMACY_PAYMENTS, get(payments::list_payments))
        .route(PHARMACY_PAYMENT_FULFILL, post(payments::fulfill_payment))
        .route(PHARMACY_LOGS, get(logs::billing_log))
}

pub fn price_routes() -> Router<PharmacyServer> {
    use paths::api_v1::*;
    Router::new()
        .route(PRICES_CURRENT, get(prices::current_prices))
        .route(PRICES_UPDATE, patch(prices::update_price))
}

/// Everything under `/api/v1`, bearer token required
pub fn api_v1_routes() -> Router<PharmacyServer> {
    Router::new()
        .route(paths::api_v1::DRUGS, get(drugs::list_drugs))
        .route(paths::api_v1::PATIENT_ME, get(patient::current_patient))
        .merge(prescription_routes())
        .merge(pharmacy_routes())
        .merge(price_routes())
}

pub fn create_routes() -> Router<PharmacyServer> {
    Router::new()
        .merge(health_routes())
        .merge(openapi::create_docs_routes())
        .nest(paths::API_V1, api_v1_routes())
}
