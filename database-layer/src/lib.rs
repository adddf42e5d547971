//! Persistence layer for the pharmacy operations engine.
//!
//! Row models, the `PharmacyStore` / `UnitOfWork` seams the HTTP layer talks
//! to, a Postgres implementation backed by a pooled `sqlx` connection, and an
//! in-memory implementation with the same semantics for tests.
//!
//! State transitions that touch several rows (fulfil: inventory and status;
//! dispense: status and payment) run inside one `UnitOfWork`. Nothing is
//! written unless the unit of work is committed.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use database_layer::{DatabasePool, PgPharmacyStore, PharmacyStore, PoolSettings};
//!
//! let pool = DatabasePool::new("postgresql://localhost/pharmacy", &PoolSettings::default()).await?;
//! pool.run_migrations().await?;
//! let store = PgPharmacyStore::new(pool);
//! let pharmacy = store.active_pharmacy_for_user(42).await?;
//! ```

pub mod connection;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod query;
pub mod store;

pub use connection::{DatabasePool, PoolSettings};
pub use error::{DatabaseError, DatabaseResult};
pub use memory::{InMemoryStore, MemoryState};
pub use models::*;
pub use postgres::PgPharmacyStore;
pub use store::{PharmacyStore, UnitOfWork};
