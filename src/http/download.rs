//! Persistence of download responses to stable storage.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::errors::Error;
use crate::task::Destination;

/// Counter for unique temp-file names within one process.
static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Resolves a destination to the concrete path bytes will be written to.
///
/// # Errors
///
/// Returns [`Error::Io`] with `AlreadyExists` when the destination names an
/// existing file and does not permit overwriting.
pub(crate) fn resolve(destination: &Destination) -> Result<PathBuf, Error> {
    match destination {
        Destination::TempFile => {
            let sequence = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
            Ok(std::env::temp_dir().join(format!(
                "courier-download-{}-{sequence}",
                std::process::id()
            )))
        }
        Destination::Path { path, overwrite } => {
            if !overwrite && path.exists() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("{} already exists", path.display()),
                )));
            }
            Ok(path.clone())
        }
    }
}

/// Streams response chunks into the resolved destination, returning the
/// final location.
pub(crate) async fn persist_stream<S>(
    destination: &Destination,
    stream: S,
) -> Result<PathBuf, Error>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    let path = resolve(destination)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(&path).await?;
    futures_util::pin_mut!(stream);
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    debug!(path = %path.display(), bytes = written, "download persisted");
    Ok(path)
}

/// Writes an in-memory body to the resolved destination, returning the final
/// location. Used by transports that already hold the full body.
pub(crate) async fn persist_bytes(
    destination: &Destination,
    body: &[u8],
) -> Result<PathBuf, Error> {
    let path = resolve(destination)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, body).await?;
    Ok(path)
}
