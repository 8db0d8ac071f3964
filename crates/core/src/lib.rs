//! `reregion-core`: shared row types for the ETL pipeline.
//!
//! Every type here is plain data. Extraction produces them, reconciliation
//! enriches them and the store binds them to table columns.

pub mod geo;
pub mod jurisdiction;
pub mod tax;

pub use geo::CanonicalGeoRecord;
pub use jurisdiction::{RawJurisdictionRecord, ResolvedJurisdictionRecord, TaxComponents};
pub use tax::{FederalBracket, FederalDeductions, StateBracket, StateTaxRecord};
