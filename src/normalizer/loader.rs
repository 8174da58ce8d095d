use crate::extensions::path_ext::InputLabel;
use crate::normalizer::{NormalizeError, Row};
use std::path::Path;
use tokio::{fs, task};
use tracing::{info, instrument};

/// Reads the rows of a spreadsheet that was exported as a JSON array of objects.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn load_rows(path: &Path) -> Result<Vec<Row>, NormalizeError> {
    info!("📁 Loading '{}'...", path.input_label());
    let content = fs::read_to_string(path).await.map_err(|source| NormalizeError::Io {
        source,
        path: path.to_path_buf(),
    })?;

    let owned_path = path.to_path_buf();
    let rows = task::spawn_blocking(move || {
        serde_json::from_str::<Vec<Row>>(&content).map_err(|source| NormalizeError::Json { source, path: owned_path })
    })
    .await??;

    info!("📁 Loading '{}'... OK, {} rows", path.input_label(), rows.len());
    Ok(rows)
}
