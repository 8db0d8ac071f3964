//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `reregion` exit codes.
//! Scripts and schedulers rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                                 |
//! |---------|------------|---------------------------------------------|
//! | 0       | Universal  | Success                                     |
//! | 2       | Universal  | CLI usage error (bad args, nothing to do)   |
//! | 3-9     | config     | Configuration file codes                    |
//! | 10-19   | extract    | Census API and spreadsheet sources          |
//! | 20-29   | store      | Database load and view codes                |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in the matching `*_exit_code` function

use reregion_config::ConfigError;
use reregion_extract::ExtractError;
use reregion_store::StoreError;

// =============================================================================
// Universal (0, 2)
// =============================================================================

/// Success - every requested stage completed.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, or neither `-l` nor `-v` given.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Config (3-9)
// =============================================================================

/// Config file exists but cannot be read.
pub const EXIT_CONFIG_READ: u8 = 3;

/// Config file is not valid TOML or has wrong types.
pub const EXIT_CONFIG_PARSE: u8 = 4;

/// Config parsed but a value is out of range.
pub const EXIT_CONFIG_INVALID: u8 = 5;

/// Log file cannot be opened for appending.
pub const EXIT_LOG_FILE: u8 = 6;

// =============================================================================
// Extract (10-19)
// =============================================================================

/// Source unreachable after every retry (transport error, 429, 5xx).
pub const EXIT_EXTRACT_NETWORK: u8 = 10;

/// Source refused the request (non-retryable 4xx).
pub const EXIT_EXTRACT_REJECTED: u8 = 11;

/// Source answered, but not in the expected shape.
pub const EXIT_EXTRACT_MALFORMED: u8 = 12;

/// Spreadsheet missing, unreadable, or without the named sheet.
pub const EXIT_EXTRACT_SOURCE: u8 = 13;

// =============================================================================
// Store (20-29)
// =============================================================================

/// Table created before the table it references.
pub const EXIT_STORE_DEPENDENCY: u8 = 20;

/// Row data does not fit the table (arity or parameter limit).
pub const EXIT_STORE_ROWS: u8 = 21;

/// Statement failed in the database.
pub const EXIT_STORE_SQL: u8 = 22;

/// A view script failed or the views directory is unreadable.
pub const EXIT_STORE_VIEWS: u8 = 23;

/// Clear refused: a table outside the run still references the cleared one.
pub const EXIT_STORE_DEPENDENT_ROWS: u8 = 24;

pub fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::Read { .. } => EXIT_CONFIG_READ,
        ConfigError::Parse { .. } => EXIT_CONFIG_PARSE,
        ConfigError::Invalid(_) => EXIT_CONFIG_INVALID,
    }
}

pub fn extract_exit_code(err: &ExtractError) -> u8 {
    match err {
        ExtractError::Network { .. } => EXIT_EXTRACT_NETWORK,
        ExtractError::Rejected { .. } => EXIT_EXTRACT_REJECTED,
        ExtractError::Malformed(_) => EXIT_EXTRACT_MALFORMED,
        ExtractError::SourceRead { .. } => EXIT_EXTRACT_SOURCE,
    }
}

pub fn store_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::MissingDependency { .. } => EXIT_STORE_DEPENDENCY,
        StoreError::DependentRows { .. } => EXIT_STORE_DEPENDENT_ROWS,
        StoreError::RowTooWide { .. } | StoreError::RowShape { .. } => EXIT_STORE_ROWS,
        StoreError::MissingScript(_) | StoreError::Sql(_) => EXIT_STORE_SQL,
        StoreError::View { .. } | StoreError::Io { .. } => EXIT_STORE_VIEWS,
    }
}
