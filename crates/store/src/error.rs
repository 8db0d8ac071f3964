use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum StoreError {
    /// A table was created before the table it references.
    MissingDependency { table: String, depends_on: String },
    /// A clear would orphan rows of a table that is not cleared with it.
    DependentRows { table: String, dependent: String },
    /// One row alone needs more placeholders than the backend allows.
    RowTooWide { table: String, columns: usize, max_params: usize },
    /// An input row does not carry one cell per data column.
    RowShape { table: String, row: usize, expected: usize, found: usize },
    /// No embedded script at this path.
    MissingScript(String),
    /// A view script failed.
    View { name: String, message: String },
    Sql(String),
    Io { path: PathBuf, message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDependency { table, depends_on } => {
                write!(f, "the dependent table {depends_on} does not exist, so {table} cannot be created")
            }
            Self::DependentRows { table, dependent } => {
                write!(f, "cannot clear {table} while {dependent} still references it; clear {dependent} too")
            }
            Self::RowTooWide { table, columns, max_params } => {
                write!(f, "table {table}: {columns} columns per row exceed the {max_params} parameter limit")
            }
            Self::RowShape { table, row, expected, found } => {
                write!(f, "table {table}, row {row}: expected {expected} cells, found {found}")
            }
            Self::MissingScript(path) => write!(f, "no SQL script {path}"),
            Self::View { name, message } => write!(f, "view {name}: {message}"),
            Self::Sql(msg) => write!(f, "SQL error: {msg}"),
            Self::Io { path, message } => write!(f, "{}: {message}", path.display()),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sql(e.to_string())
    }
}
