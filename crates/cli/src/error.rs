use std::fmt;

use reregion_config::ConfigError;
use reregion_extract::ExtractError;
use reregion_store::StoreError;

use crate::exit_codes;
use crate::pipeline::Stage;

#[derive(Debug)]
pub enum EtlErrorKind {
    Config(ConfigError),
    Extract(ExtractError),
    Store(StoreError),
}

/// A fatal failure, tagged with the stage that hit it.
#[derive(Debug)]
pub struct EtlError {
    pub stage: Stage,
    pub kind: EtlErrorKind,
}

impl EtlError {
    pub fn extract(stage: Stage, err: ExtractError) -> Self {
        Self { stage, kind: EtlErrorKind::Extract(err) }
    }

    pub fn store(stage: Stage, err: StoreError) -> Self {
        Self { stage, kind: EtlErrorKind::Store(err) }
    }

    pub fn config(err: ConfigError) -> Self {
        Self { stage: Stage::Config, kind: EtlErrorKind::Config(err) }
    }

    pub fn exit_code(&self) -> u8 {
        match &self.kind {
            EtlErrorKind::Config(e) => exit_codes::config_exit_code(e),
            EtlErrorKind::Extract(e) => exit_codes::extract_exit_code(e),
            EtlErrorKind::Store(e) => exit_codes::store_exit_code(e),
        }
    }
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EtlErrorKind::Config(e) => write!(f, "{} stage failed: {e}", self.stage),
            EtlErrorKind::Extract(e) => write!(f, "{} stage failed: {e}", self.stage),
            EtlErrorKind::Store(e) => write!(f, "{} stage failed: {e}", self.stage),
        }
    }
}

impl std::error::Error for EtlError {}
