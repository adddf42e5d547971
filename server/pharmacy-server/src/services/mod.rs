//! Business operations invoked by the handlers

pub mod fulfillment;
pub mod identity;
pub mod intake;
pub mod pricing;

pub use fulfillment::{DispenseOutcome, FulfillmentError, FulfillmentOutcome};
