use crate::error::{RegistryError, Result};
use futures_util::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::debug;

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "downloaded_blobs";

/// Suffix appended to every stored blob.
pub const BLOB_EXTENSION: &str = ".tar.gz";

/// Number of digest characters kept in a blob file name.
const NAME_LEN: usize = 12;

/// Flat directory of downloaded layer blobs, named `<12 hex chars>.tar.gz`.
///
/// Names are truncated digests: two digests sharing their first 12 hex
/// characters map to the same file.  Each blob is streamed into its own
/// `.part` file and renamed into place, so the file always holds one whole
/// blob: whichever download finished last.
#[derive(Debug)]
pub struct BlobStore {
    output_dir: PathBuf,
    created: OnceCell<()>,
    next_part: AtomicU64,
}

impl BlobStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            created: OnceCell::new(),
            next_part: AtomicU64::new(0),
        }
    }

    /// File name for a blob: the 12 characters after `sha256:` plus
    /// [`BLOB_EXTENSION`].
    pub fn file_name(digest: &str) -> String {
        let hex = digest.strip_prefix("sha256:").unwrap_or(digest);
        let short: String = hex.chars().take(NAME_LEN).collect();
        format!("{short}{BLOB_EXTENSION}")
    }

    /// Reject digests that would name a path outside the output directory.
    pub fn check_digest(digest: &str) -> Result<()> {
        let separator = |c: char| c == '/' || c == '\\';
        if digest.is_empty() || digest.contains(separator) || digest.contains("..") {
            return Err(RegistryError::Shape(format!(
                "refusing unsafe blob digest {:?}",
                digest
            )));
        }
        Ok(())
    }

    /// Return the path a blob with `digest` is written to.
    pub fn blob_path(&self, digest: &str) -> Result<PathBuf> {
        Self::check_digest(digest)?;
        Ok(self.output_dir.join(Self::file_name(digest)))
    }

    /// Create the output directory.  Runs at most once per store and is a
    /// no-op when the directory already exists.
    pub async fn ensure_dir(&self) -> Result<()> {
        self.created
            .get_or_try_init(|| async {
                fs::create_dir_all(&self.output_dir)
                    .await
                    .map_err(|e| RegistryError::io(&self.output_dir, e))?;
                debug!(dir = %self.output_dir.display(), "output directory ready");
                Ok::<(), RegistryError>(())
            })
            .await?;
        Ok(())
    }

    /// Write a chunk stream to the file for `digest`, replacing any previous
    /// content.  Returns the file path and the number of bytes written.
    pub async fn write_stream<S, B, E>(&self, digest: &str, mut chunks: S) -> Result<(PathBuf, u64)>
    where
        S: Stream<Item = std::result::Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Into<RegistryError>,
    {
        let path = self.blob_path(digest)?;
        self.ensure_dir().await?;

        let part = self.part_path(digest);
        let written = match write_part(&part, &mut chunks).await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&part).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&part, &path).await {
            let _ = fs::remove_file(&part).await;
            return Err(RegistryError::io(&path, e));
        }

        debug!(path = %path.display(), bytes = written, "stored blob");
        Ok((path, written))
    }

    /// Return a reference to the output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Unique in-progress path for one download of `digest`.
    fn part_path(&self, digest: &str) -> PathBuf {
        let n = self.next_part.fetch_add(1, Ordering::Relaxed);
        self.output_dir.join(format!(
            ".{}.{}-{}.part",
            Self::file_name(digest),
            std::process::id(),
            n
        ))
    }
}

impl Default for BlobStore {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

async fn write_part<S, B, E>(part: &Path, chunks: &mut S) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<RegistryError>,
{
    let mut file = fs::File::create(part)
        .await
        .map_err(|e| RegistryError::io(part, e))?;

    let mut written = 0u64;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| -> RegistryError { e.into() })?;
        let chunk = chunk.as_ref();
        file.write_all(chunk)
            .await
            .map_err(|e| RegistryError::io(part, e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| RegistryError::io(part, e))?;
    Ok(written)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
