//! Attachment storage. Uploads are written under unique, timestamp-prefixed names so
//! concurrent uploads never overwrite each other.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store bytes under `name` and return a retrieval locator.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String>;
    /// `None` when nothing is stored under `name`.
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// Reduce a client-supplied file name to a single safe path component.
pub fn sanitize_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() { "archivo".to_string() } else { trimmed.to_string() }
}

/// `<unix millis>_<8 hex>_<sanitized name>`.
pub fn unique_name(original: &str, now: DateTime<Utc>) -> String {
    let tag = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", now.timestamp_millis(), &tag[..8], sanitize_name(original))
}

pub const LOCATOR_PREFIX: &str = "/archivos/";

/// Files on local disk under a root directory, created on first write.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name != sanitize_name(name) {
            bail!("invalid stored file name: {:?}", name);
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating upload directory {}", self.root.display()))?;
        let mut f = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(bytes).await?;
        f.flush().await?;
        info!(target: "filestore", name = name, size = bytes.len(), "stored upload");
        Ok(format!("{}{}", LOCATOR_PREFIX, name))
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(target: "filestore", name = name, "not found");
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sanitize_strips_paths_and_odd_chars() {
        assert_eq!(sanitize_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_name("C:\\docs\\cédula escaneada.pdf"), "c_dula_escaneada.pdf");
        assert_eq!(sanitize_name("..."), "archivo");
        assert_eq!(sanitize_name(".env"), "env");
        assert_eq!(sanitize_name("ok-name_1.png"), "ok-name_1.png");
    }

    #[test]
    fn unique_names_differ_for_same_instant() {
        let now = Utc::now();
        let a = unique_name("foto.jpg", now);
        let b = unique_name("foto.jpg", now);
        assert_ne!(a, b);
        assert!(a.starts_with(&now.timestamp_millis().to_string()));
        assert!(a.ends_with("_foto.jpg"));
    }

    #[tokio::test]
    async fn directory_is_created_lazily() -> Result<()> {
        let tmp = tempdir()?;
        let root = tmp.path().join("uploads");
        let store = LocalFileStore::new(&root);
        assert!(!root.exists());
        let loc = store.put("1_abc_doc.pdf", b"%PDF").await?;
        assert_eq!(loc, "/archivos/1_abc_doc.pdf");
        assert!(root.exists());
        assert_eq!(store.get("1_abc_doc.pdf").await?, Some(b"%PDF".to_vec()));
        assert_eq!(store.get("missing.pdf").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn existing_names_are_not_overwritten() -> Result<()> {
        let tmp = tempdir()?;
        let store = LocalFileStore::new(tmp.path());
        store.put("a.txt", b"one").await?;
        assert!(store.put("a.txt", b"two").await.is_err());
        assert_eq!(store.get("a.txt").await?, Some(b"one".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn traversal_names_are_refused() {
        let tmp = tempdir().unwrap();
        let store = LocalFileStore::new(tmp.path());
        assert!(store.put("../x.txt", b"x").await.is_err());
        assert!(store.get("sub/x.txt").await.is_err());
    }
}
