use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_AVATAR_SIZE: usize = 5 * 1024 * 1024;
pub const MAX_KIDS_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Content types accepted for profile pictures, with the extension stored.
pub const AVATAR_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

pub const KIDS_FILE_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
];

/// Disk-backed object store.
///
/// Objects live at `{dir}/{key}` where keys look like `avatars/{uuid}.png`.
/// The same directory is served under `/files`, so every stored object is
/// publicly readable at [`Storage::public_url`].
pub struct Storage {
    dir: PathBuf,
    public_url: String,
}

impl Storage {
    pub async fn new(dir: PathBuf, public_url: &str) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("File storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh key under `prefix`.
    pub fn new_key(prefix: &str, ext: &str) -> String {
        format!("{}/{}.{}", prefix, Uuid::new_v4(), ext)
    }

    /// Keys are generated server-side, but anything that could escape the
    /// storage root is refused regardless.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            bail!("invalid storage key {:?}", key);
        }
        Ok(self.dir.join(relative))
    }

    pub async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        Ok(())
    }

    /// Removing a missing object is not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted stored file {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort delete used after the database no longer references the key.
    pub async fn delete_quietly(&self, key: &str) {
        if let Err(e) = self.delete(key).await {
            warn!("Failed to delete stored file {}: {}", key, e);
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/files/{}", self.public_url, key)
    }
}

/// Maps a `Content-Type` value to a stored extension if it is in `allowed`.
/// Parameters such as `; charset=...` are ignored.
pub fn extension_for(content_type: &str, allowed: &[(&str, &'static str)]) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    allowed
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_storage() -> Storage {
        let dir = std::env::temp_dir().join(format!("fellowship-storage-{}", Uuid::new_v4()));
        Storage::new(dir, "https://church.example/").await.unwrap()
    }

    #[test]
    fn content_types_map_to_extensions() {
        assert_eq!(extension_for("image/png", AVATAR_TYPES), Some("png"));
        assert_eq!(extension_for("IMAGE/JPEG; charset=binary", AVATAR_TYPES), Some("jpg"));
        assert_eq!(extension_for("application/pdf", AVATAR_TYPES), None);
        assert_eq!(extension_for("application/pdf", KIDS_FILE_TYPES), Some("pdf"));
    }

    #[test]
    fn keys_carry_prefix_and_extension() {
        let key = Storage::new_key("avatars", "webp");
        assert!(key.starts_with("avatars/"));
        assert!(key.ends_with(".webp"));
    }

    #[tokio::test]
    async fn put_and_delete() {
        let storage = temp_storage().await;
        let key = Storage::new_key("kids", "pdf");

        storage.put(&key, b"%PDF-1.7").await.unwrap();
        assert_eq!(fs::read(storage.dir().join(&key)).await.unwrap(), b"%PDF-1.7");

        storage.delete(&key).await.unwrap();
        storage.delete(&key).await.unwrap();
        assert!(!storage.dir().join(&key).exists());

        let _ = fs::remove_dir_all(storage.dir()).await;
    }

    #[tokio::test]
    async fn traversal_keys_are_refused() {
        let storage = temp_storage().await;
        assert!(storage.put("../escape.txt", b"x").await.is_err());
        assert!(storage.put("/etc/passwd", b"x").await.is_err());
        assert_eq!(
            storage.public_url("avatars/a.png"),
            "https://church.example/files/avatars/a.png"
        );
        let _ = fs::remove_dir_all(storage.dir()).await;
    }
}
