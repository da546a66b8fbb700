//! Local storage for uploaded payloads.

use std::path::{Path, PathBuf};

use courier_core::Result;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Writes uploads under one directory, each with a unique prefix so a new
/// upload never overwrites a payload an older job still points at.
#[derive(Debug, Clone)]
pub struct UploadStorage {
    dir: PathBuf,
}

impl UploadStorage {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `bytes` for the (already sanitised) `filename`.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(format!("{}-{}", Uuid::now_v7(), filename));
        tokio::fs::write(&path, bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "upload stored");
        Ok(path)
    }

    /// Best-effort removal of a payload no job will deliver. Paths outside
    /// the upload directory are left alone.
    pub async fn discard(&self, path: &Path) {
        if !path.starts_with(&self.dir) {
            warn!(path = %path.display(), "refusing to remove file outside upload dir");
            return;
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "upload removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "could not remove upload: {e}"),
        }
    }
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Directory parts are dropped, whitespace becomes `_`, and only ASCII
/// letters, digits, `.`, `-` and `_` survive. Leading dots are stripped so
/// the result is never hidden or a parent reference. May return an empty
/// string, which callers treat as "no file".
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .trim()
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}
