//! `reregion-cli`: stage orchestration behind the `reregion` binary.

pub mod error;
pub mod exit_codes;
pub mod pipeline;

pub use error::{EtlError, EtlErrorKind};
pub use pipeline::{census_client, engine_options, open_engine, Pipeline, RunOptions, RunReport, Stage, StageSelection};
