//! `reregion-store`: dependency-aware batched persistence into SQLite.
//!
//! Tables are created in parent-first order, loaded with chunked
//! parameterized upserts, and finished off with a set of derived views.

pub mod batch;
pub mod engine;
pub mod error;
pub mod schema;

pub use batch::{build_batches, build_upsert_statement, max_rows_per_batch, normalize, plan_batches, Batch, Bind};
pub use engine::{EngineOptions, PersistenceEngine, SQLITE_MAX_PARAMS, UNKNOWN_ID};
pub use error::StoreError;
pub use schema::{dependents, lookup, Column, ColumnKind, ScriptKind, Table, TableSpec};
