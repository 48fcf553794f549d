use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// On-disk store for uploaded images (recipe photos, profile pictures).
///
/// Files live flat in one directory under generated names of the form
/// `{timestamp}_{sanitised original name}`. Rows refer to them by name only.
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a stored name. Names with path separators are refused so a
    /// row can never point outside the upload directory.
    pub fn file_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            bail!("invalid stored file name '{}'", name);
        }
        Ok(self.dir.join(name))
    }

    /// Write a new file and return its generated name. Never overwrites: a
    /// name clash fails instead.
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<String> {
        let name = generated_name(original_name, Utc::now());
        let path = self.file_path(&name)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;

        info!("Stored upload {} ({} bytes)", name, data.len());
        Ok(name)
    }

    /// Delete a stored file. A file that is already gone is not an error.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = self.file_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted upload {}", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Upload {} already gone", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort delete for cleanup paths where the request has already
    /// succeeded; failures are only logged.
    pub async fn discard(&self, name: Option<&str>) {
        if let Some(name) = name {
            if let Err(e) = self.delete(name).await {
                warn!("Failed to delete upload {}: {}", name, e);
            }
        }
    }
}

/// Reduce an untrusted upload name to `[A-Za-z0-9._-]`, keeping only the last
/// path component and no leading dots.
pub fn sanitize_filename(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']);
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Timestamp (to the microsecond) plus sanitised original name.
pub fn generated_name(original: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", now.format("%Y%m%d%H%M%S%6f"), sanitize_filename(original))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sanitizes_untrusted_names() {
        assert_eq!(sanitize_filename("bolo.png"), "bolo.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\fotos\\pão de queijo.jpg"), "p_o_de_queijo.jpg");
        assert_eq!(sanitize_filename(".hidden.gif"), "hidden.gif");
        assert_eq!(sanitize_filename("///"), "upload");
    }

    #[test]
    fn generated_names_carry_timestamp() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(generated_name("bolo.png", now), "20250102030405000000_bolo.png");
    }

    #[tokio::test]
    async fn save_and_delete_are_idempotent_safe() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("uploads")).await.unwrap();

        let name = store.save("bolo.png", b"png-bytes").await.unwrap();
        assert!(name.ends_with("_bolo.png"));
        let path = store.file_path(&name).unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"png-bytes");

        store.delete(&name).await.unwrap();
        assert!(!path.exists());
        // Second delete of the same name is fine.
        store.delete(&name).await.unwrap();
    }

    #[test]
    fn refuses_paths_outside_the_directory() {
        let store = ImageStore { dir: PathBuf::from("/tmp/uploads") };
        assert!(store.file_path("../secret").is_err());
        assert!(store.file_path("a/b.png").is_err());
        assert!(store.file_path("").is_err());
        assert!(store.file_path("ok.png").is_ok());
    }
}
