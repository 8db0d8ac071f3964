use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExtractError {
    /// Transport failure or retryable status after every attempt was used.
    Network { source: String, attempts: u32, message: String },
    /// Non-retryable HTTP status.
    Rejected { source: String, status: u16 },
    /// Response or sheet content is not in the expected shape.
    Malformed(String),
    /// Spreadsheet could not be opened or the sheet read.
    SourceRead { path: PathBuf, message: String },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { source, attempts, message } => {
                write!(f, "exceeded {attempts} attempts trying to reach the {source} API: {message}")
            }
            Self::Rejected { source, status } => {
                write!(f, "{source} API rejected the request with status {status}")
            }
            Self::Malformed(msg) => write!(f, "malformed source data: {msg}"),
            Self::SourceRead { path, message } => {
                write!(f, "error reading {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for ExtractError {}
