use crate::routes::paths;
use crate::server::PharmacyServer;
use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::health::version_info,
        crate::handlers::drugs::list_drugs,
        crate::handlers::prescriptions::list_prescriptions,
        crate::handlers::prescriptions::get_prescription,
        crate::handlers::prescriptions::request_prescription,
        crate::handlers::prescriptions::fulfill_prescription,
        crate::handlers::pharmacy::pending_requests,
        crate::handlers::pharmacy::queue,
        crate::handlers::pharmacy::filled_prescriptions,
        crate::handlers::pharmacy::patients,
        crate::handlers::pharmacy::current_pharmacy,
        crate::handlers::pharmacy::dispense_prescription,
        crate::handlers::inventory::list_inventory,
        crate::handlers::inventory::add_stock,
        crate::handlers::prices::current_prices,
        crate::handlers::prices::update_price,
        crate::handlers::payments::list_payments,
        crate::handlers::payments::fulfill_payment,
        crate::handlers::logs::billing_log,
        crate::handlers::patient::current_patient,
    ),
    components(
        schemas(
            crate::error::ApiErrorResponse,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::VersionResponse,
            crate::handlers::prescriptions::PrescriptionCreated,
            crate::handlers::inventory::AddStockRequest,
            crate::handlers::prices::UpdatePriceRequest,
            crate::handlers::prices::PriceUpdated,
            crate::handlers::payments::PaymentsByStatus,
            crate::services::intake::PrescriptionRequest,
            crate::services::FulfillmentOutcome,
            crate::services::DispenseOutcome,
            database_layer::PrescriptionStatus,
            database_layer::PrescriptionSummary,
            database_layer::PendingRequest,
            database_layer::QueueEntry,
            database_layer::PatientSummary,
            database_layer::Pharmacy,
            database_layer::Patient,
            database_layer::Drug,
            database_layer::InventoryItem,
            database_layer::DrugPrice,
            database_layer::UpsertOutcome,
            database_layer::Payment,
            database_layer::PaymentView,
            database_layer::BillingLogEntry,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and build information"),
        (name = "drugs", description = "Drug catalogue"),
        (name = "prescriptions", description = "Prescription intake, search and fulfillment"),
        (name = "pharmacy", description = "Pharmacy work queues and dispensing"),
        (name = "inventory", description = "Per-pharmacy stock levels"),
        (name = "prices", description = "Per-pharmacy drug pricing"),
        (name = "payments", description = "Payments and billing history"),
        (name = "patient", description = "Patient self-service"),
    ),
    info(
        title = "Pharmacy Operations API",
        version = "0.1.0",
        description = "Prescription fulfillment, inventory, pricing and payments for pharmacies.",
        license(name = "AGPL-3.0-only"),
    ),
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the handlers.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn create_docs_routes() -> Router<PharmacyServer> {
    Router::new().merge(
        SwaggerUi::new(paths::docs::SWAGGER_UI).url(paths::docs::OPENAPI_JSON, ApiDoc::openapi()),
    )
}
