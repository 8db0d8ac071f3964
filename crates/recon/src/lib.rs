//! `reregion-recon`: local tax jurisdiction reconciliation.
//!
//! Pure engine crate: receives canonical geography and raw jurisdiction rows,
//! returns resolved records. No CLI or IO dependencies.

pub mod coordinator;
pub mod description;
pub mod diagnostics;
pub mod resolver;
pub mod similarity;

pub use coordinator::{collect_raw_records, reconcile, reconcile_with_workers, ReconcileOutput};
pub use description::{classify, parse_description, DescriptionClass};
pub use diagnostics::{Anomaly, CollectingDiagnostics, Diagnostics, LogDiagnostics, ReconcileSummary};
pub use resolver::{resolve, CountyMatch, EntityResolver};
