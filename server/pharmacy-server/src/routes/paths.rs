//! Route path constants
//!
//! Runtime routes use axum's `:param` syntax; the `#[utoipa::path]`
//! attributes spell the same paths with `{param}`.

pub const API_V1: &str = "/api/v1";

pub mod health {
    pub const HEALTH: &str = "/health";
    pub const VERSION: &str = "/version";
}

pub mod docs {
    pub const SWAGGER_UI: &str = "/swagger-ui";
    pub const OPENAPI_JSON: &str = "/api-docs/openapi.json";
}

/// Relative to `API_V1`
pub mod api_v1 {
    pub const DRUGS: &str = "/drugs";

    pub const PRESCRIPTIONS: &str = "/prescriptions";
    pub const PRESCRIPTION_BY_ID: &str = "/prescriptions/:id";
    pub const PRESCRIPTION_REQUEST: &str = "/prescriptions/request";
    pub const PRESCRIPTION_FULFILL: &str = "/prescriptions/:id/fulfill";

    pub const PHARMACY_ME: &str = "/pharmacy/me";
    pub const PHARMACY_REQUESTS: &str = "/pharmacy/requests";
    pub const PHARMACY_QUEUE: &str = "/pharmacy/queue";
    pub const PHARMACY_FILLED: &str = "/pharmacy/prescriptions/filled";
    pub const PHARMACY_DISPENSE: &str = "/pharmacy/prescriptions/:id/dispense";
    pub const PHARMACY_PATIENTS: &str = "/pharmacy/patients";
    pub const PHARMACY_INVENTORY: &str = "/pharmacy/inventory";
    pub const PHARMACY_INVENTORY_ADD: &str = "/pharmacy/inventory/add";
    pub const PHARMACY_PAYMENTS: &str = "/pharmacy/payments";
    pub const PHARMACY_PAYMENT_FULFILL: &str = "/pharmacy/payments/:id/fulfill";
    pub const PHARMACY_LOGS: &str = "/pharmacy/logs";

    pub const PATIENT_ME: &str = "/patient/me";

    pub const PRICES_CURRENT: &str = "/prices/current-prices";
    pub const PRICES_UPDATE: &str = "/prices/update";
}
