//! `reregion-extract`: source adapters for the ETL pipeline.
//!
//! Census geography over HTTP, tax tables from spreadsheets. Every source
//! sits behind a trait so stages can run against fixed rows in tests.

pub mod census;
pub mod error;
pub mod federal_tax;
pub mod local_tax;
pub mod sheet;
pub mod state_tax;

pub use census::{get_census_data, parse_geography, CensusClient, GeographySource, CENSUS_FIELDS};
pub use error::ExtractError;
pub use federal_tax::{get_federal_tax_data, read_federal_tax_data};
pub use local_tax::get_local_tax_data;
pub use sheet::{SheetSource, WorkbookReader};
pub use state_tax::{get_state_tax_data, read_state_tax_data, StateTaxData};
