//! Archive download into the cache.

use super::error::PkgError;
use futures::StreamExt;
use reqwest::Client;
use spm_util::fs::sibling_temp_path;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Maximum archive size (200 MB).
pub const MAX_ARCHIVE_SIZE: u64 = 200 * 1024 * 1024;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stream the archive at `url` into `cache_path`.
///
/// The body is written chunk by chunk to a temp file beside `cache_path`
/// and renamed over it only once the stream has ended cleanly. On any
/// error the temp file is removed and `cache_path` is left untouched.
///
/// Returns the number of bytes written.
///
/// # Errors
/// Returns a transfer error on a non-success status, a stream failure or an
/// oversized body, and a cache error if the file cannot be written.
pub async fn fetch(client: &Client, url: &str, cache_path: &Path) -> Result<u64, PkgError> {
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PkgError::transfer_failed(format!("Failed to download '{url}': {e}")))?;

    if !response.status().is_success() {
        return Err(PkgError::transfer_failed(format!(
            "Download failed with status {} for '{url}'",
            response.status()
        )));
    }

    if let Some(len) = response.content_length() {
        if len > MAX_ARCHIVE_SIZE {
            return Err(PkgError::transfer_failed(format!(
                "Archive too large: {len} bytes (max: {MAX_ARCHIVE_SIZE})"
            )));
        }
    }

    let tag = format!("part{}", TEMP_COUNTER.fetch_add(1, Ordering::Relaxed));
    let temp_path = sibling_temp_path(cache_path, &tag);

    let written = match stream_to_file(response, url, &temp_path).await {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(&temp_path, cache_path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    debug!(url, path = %cache_path.display(), bytes = written, "Archive stored in cache");
    Ok(written)
}

async fn stream_to_file(
    response: reqwest::Response,
    url: &str,
    path: &Path,
) -> Result<u64, PkgError> {
    let mut file = File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            PkgError::transfer_failed(format!("Failed to read response body from '{url}': {e}"))
        })?;

        written += chunk.len() as u64;
        if written > MAX_ARCHIVE_SIZE {
            return Err(PkgError::transfer_failed(format!(
                "Archive too large: over {MAX_ARCHIVE_SIZE} bytes"
            )));
        }

        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
