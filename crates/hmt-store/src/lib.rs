//! Persistence for the HMT signal gateway.
//!
//! [`Store`] covers every table the gateway touches. Two backends:
//! - [`MemoryStore`]: concurrent maps, optionally seeded from JSON
//! - [`PgStore`]: PostgreSQL via sqlx, schema under `migrations/`

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, SeedData};
pub use postgres::PgStore;
pub use store::{BoxFuture, DynStore, OrderFillUpdate, Store};
