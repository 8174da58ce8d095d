use crate::domain::BatchResult;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

/// Writes the batch result to `<directory>/<prefix>_<start time>.json` and returns the path.
///
/// An existing report is never overwritten, the name gets a counter suffix instead.
#[instrument(skip(result))]
pub async fn write_report(result: &BatchResult, directory: &Path, prefix: &str) -> Result<PathBuf, ReportError> {
    info!("💾 Writing report...");
    fs::create_dir_all(directory).await.map_err(|source| ReportError::Io {
        source,
        path: directory.to_path_buf(),
    })?;

    let json = serde_json::to_vec_pretty(result)?;
    let stamp = result.started_at.format("%Y%m%d_%H%M%S_%3f").to_string();
    let (path, mut file) = create_report_file(directory, prefix, &stamp).await?;
    let written = async {
        file.write_all(&json).await?;
        file.flush().await
    };
    written.await.map_err(|source| ReportError::Io { source, path: path.clone() })?;

    info!("💾 Writing report... OK, {}", path.display());
    Ok(path)
}

async fn create_report_file(directory: &Path, prefix: &str, stamp: &str) -> Result<(PathBuf, File), ReportError> {
    let mut attempt = 0;
    loop {
        let name = match attempt {
            0 => format!("{}_{}.json", prefix, stamp),
            n => format!("{}_{}_{}.json", prefix, stamp, n),
        };
        let path = directory.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => return Err(ReportError::Io { source, path }),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write '{}': {source}", path.display())]
    Io { source: io::Error, path: PathBuf },
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
