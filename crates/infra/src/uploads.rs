//! Product image upload ingestion.
//!
//! Every file is handled on its own: a rejected or failed file is reported
//! and the rest are still written. Files already written stay on disk.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Public URL prefix the stored files are served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub dir: PathBuf,
    pub max_bytes: usize,
    /// Lowercase file extensions without the dot, e.g. `png`.
    pub allowed_types: Vec<String>,
}

impl UploadPolicy {
    pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

    pub fn default_types() -> Vec<String> {
        ["jpeg", "jpg", "png", "webp", "gif"].map(String::from).to_vec()
    }

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_bytes: Self::DEFAULT_MAX_BYTES,
            allowed_types: Self::default_types(),
        }
    }

    fn allows(&self, kind: &str) -> bool {
        self.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(kind))
    }

    /// Extension of an acceptable file, lowercased.
    fn check(&self, file: &IncomingFile) -> Result<String, UploadError> {
        let ext = Path::new(&file.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|e| self.allows(e))
            .ok_or_else(|| UploadError::TypeNotAllowed(file.filename.clone()))?;

        if let Some(content_type) = &file.content_type {
            let subtype = content_type.strip_prefix("image/").unwrap_or_default();
            if !self.allows(subtype) {
                return Err(UploadError::TypeNotAllowed(content_type.clone()));
            }
        }
        if file.bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if file.bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge { limit: self.max_bytes });
        }
        Ok(ext)
    }
}

#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file type not allowed: {0}")]
    TypeNotAllowed(String),

    #[error("file exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("file is empty")]
    Empty,

    #[error("failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    /// Public URLs of the stored files, in input order.
    pub uploaded: Vec<String>,
    pub failed: Vec<UploadFailure>,
}

/// `images-<millis>-<random>.<ext>`
fn unique_name(ext: &str) -> String {
    let random = (Uuid::now_v7().as_u128() & u128::from(u64::MAX)) as u64 % 1_000_000_000;
    format!("images-{}-{random}.{ext}", Utc::now().timestamp_millis())
}

#[derive(Debug, Clone)]
pub struct UploadIngestor {
    policy: UploadPolicy,
}

impl UploadIngestor {
    pub fn new(policy: UploadPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn ingest(&self, files: Vec<IncomingFile>) -> UploadReport {
        let mut report = UploadReport::default();
        for file in files {
            match self.store_one(&file).await {
                Ok(url) => report.uploaded.push(url),
                Err(err) => {
                    warn!(filename = %file.filename, error = %err, "upload rejected");
                    report.failed.push(UploadFailure {
                        filename: file.filename,
                        reason: err.to_string(),
                    });
                }
            }
        }
        info!(uploaded = report.uploaded.len(), failed = report.failed.len(), "uploads processed");
        report
    }

    async fn store_one(&self, file: &IncomingFile) -> Result<String, UploadError> {
        let ext = self.policy.check(file)?;
        tokio::fs::create_dir_all(&self.policy.dir).await?;

        let name = unique_name(&ext);
        let path = self.policy.dir.join(&name);
        let out = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        write_or_discard(out, &path, &file.bytes).await?;
        Ok(format!("{PUBLIC_PREFIX}/{name}"))
    }
}

/// Write `bytes` to a freshly created file; a failed write removes `path` so no
/// partial file is left behind.
async fn write_or_discard(mut out: impl AsyncWrite + Unpin, path: &Path, bytes: &[u8]) -> Result<(), UploadError> {
    let written = match out.write_all(bytes).await {
        Ok(()) => out.flush().await,
        Err(err) => Err(err),
    };
    if let Err(err) = written {
        drop(out);
        if let Err(cleanup) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %cleanup, "partial upload not removed");
        }
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use super::*;

    /// Accepts nothing; every write fails.
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::other("no space left on device")))
        }
        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn file(name: &str, content_type: Option<&str>, len: usize) -> IncomingFile {
        IncomingFile {
            filename: name.into(),
            content_type: content_type.map(str::to_string),
            bytes: vec![7; len],
        }
    }

    #[tokio::test]
    async fn good_files_are_written_and_bad_ones_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = UploadPolicy::new(dir.path().join("uploads"));
        policy.max_bytes = 16;
        let ingestor = UploadIngestor::new(policy);

        let report = ingestor
            .ingest(vec![
                file("front.PNG", Some("image/png"), 8),
                file("notes.txt", Some("text/plain"), 8),
                file("huge.jpg", Some("image/jpeg"), 64),
                file("back.webp", None, 4),
            ])
            .await;

        assert_eq!(report.uploaded.len(), 2);
        assert!(report.uploaded[0].starts_with("/uploads/images-"));
        assert!(report.uploaded[0].ends_with(".png"));
        assert_eq!(
            report.failed.iter().map(|f| f.filename.as_str()).collect::<Vec<_>>(),
            ["notes.txt", "huge.jpg"]
        );

        let written = std::fs::read_dir(dir.path().join("uploads")).unwrap().count();
        assert_eq!(written, 2);
    }

    #[test]
    fn mismatched_content_type_is_rejected() {
        let policy = UploadPolicy::new("unused");
        assert!(matches!(
            policy.check(&file("cat.png", Some("application/pdf"), 3)),
            Err(UploadError::TypeNotAllowed(_))
        ));
        assert!(matches!(policy.check(&file("cat.gif", None, 0)), Err(UploadError::Empty)));
    }

    #[tokio::test]
    async fn failed_write_removes_the_created_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images-1-2.png");
        std::fs::write(&path, b"").unwrap();

        match write_or_discard(FullDisk, &path, &[7; 8]).await {
            Err(UploadError::Io(err)) if err.to_string().contains("no space") => {}
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn successful_write_keeps_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images-1-3.png");
        let out = tokio::fs::File::create(&path).await.unwrap();

        write_or_discard(out, &path, &[7; 8]).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![7; 8]);
    }

    #[test]
    fn generated_names_differ() {
        assert_ne!(unique_name("png"), unique_name("png"));
    }
}
