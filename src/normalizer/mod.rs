mod column_mapping;
mod loader;
mod normalize;

#[cfg(test)]
pub use column_mapping::ColumnMappingBuilder;
pub use column_mapping::ColumnMapping;
pub use loader::load_rows;
pub use normalize::{Defaults, Row, normalize};

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("no column is mapped to '{0}'")]
    MissingMapping(&'static str),
    #[error("mapped column '{0}' does not exist in the input")]
    MissingColumn(String),
    #[error("failed to read '{}': {source}", path.display())]
    Io { source: io::Error, path: PathBuf },
    #[error("'{}' is not a JSON array of rows: {source}", path.display())]
    Json { source: serde_json::Error, path: PathBuf },
    #[error(transparent)]
    JoinError(#[from] JoinError),
}
