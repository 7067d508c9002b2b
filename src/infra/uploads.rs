//! Filesystem storage for uploaded images.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

/// Extensions accepted for image uploads.
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("file extension is not an allowed image type")]
    DisallowedExtension,
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file exceeds the configured size limit")]
    PayloadTooLarge,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result of storing an upload payload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: i64,
}

/// Filesystem-backed upload storage rooted at a single directory.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
    max_bytes: u64,
}

impl UploadStorage {
    /// Initialise storage rooted at `root`, creating the directory if needed.
    pub fn new(root: PathBuf, max_bytes: u64) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, max_bytes })
    }

    /// Store an image payload under a collision-free generated name.
    ///
    /// The stored path embeds a UUID token, so two concurrent uploads of the
    /// same filename never clash.
    pub async fn store_image(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }
        if data.len() as u64 > self.max_bytes {
            return Err(UploadStorageError::PayloadTooLarge);
        }

        let extension = image_extension(original_name)?;
        let stored_path = self.build_stored_path(original_name, &extension);
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        if let Err(err) = file.write_all(&data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(err.into());
        }
        file.flush().await?;

        let checksum = hex::encode(Sha256::digest(&data));
        let size_bytes = data.len() as i64;

        Ok(StoredUpload {
            stored_path,
            checksum,
            size_bytes,
        })
    }

    /// Read a stored payload into memory.
    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove a stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    /// Resolve a stored path below the storage root, rejecting traversal.
    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }

    fn build_stored_path(&self, original_name: &str, extension: &str) -> String {
        let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
        let stem = Path::new(original_name)
            .file_stem()
            .and_then(|value| value.to_str())
            .unwrap_or("upload");
        let mut base = slugify(stem);
        if base.is_empty() {
            base = "upload".to_string();
        }
        let token = Uuid::new_v4().simple();
        format!("{year}/{:02}/{:02}/{token}-{base}.{extension}", month as u8, day)
    }
}

fn image_extension(original_name: &str) -> Result<String, UploadStorageError> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or(UploadStorageError::DisallowedExtension)?;

    if ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(UploadStorageError::DisallowedExtension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage() -> (UploadStorage, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf(), 1024).expect("storage");
        (storage, dir)
    }

    #[tokio::test]
    async fn stores_and_reads_back_an_image() {
        let (storage, _dir) = storage();

        let stored = storage
            .store_image("Cover Photo.PNG", Bytes::from_static(b"fake png"))
            .await
            .expect("store");

        assert!(stored.stored_path.ends_with("-cover-photo.png"));
        assert_eq!(stored.size_bytes, 8);

        let read_back = storage.read(&stored.stored_path).await.expect("read");
        assert_eq!(read_back, Bytes::from_static(b"fake png"));
    }

    #[tokio::test]
    async fn same_name_twice_never_collides() {
        let (storage, _dir) = storage();

        let first = storage
            .store_image("a.png", Bytes::from_static(b"one"))
            .await
            .expect("first");
        let second = storage
            .store_image("a.png", Bytes::from_static(b"two"))
            .await
            .expect("second");

        assert_ne!(first.stored_path, second.stored_path);
    }

    #[tokio::test]
    async fn rejects_non_image_extensions() {
        let (storage, _dir) = storage();

        let err = storage
            .store_image("notes.txt", Bytes::from_static(b"text"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadStorageError::DisallowedExtension));

        let err = storage
            .store_image("no-extension", Bytes::from_static(b"data"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadStorageError::DisallowedExtension));
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized_payloads() {
        let (storage, _dir) = storage();

        let err = storage
            .store_image("a.png", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadStorageError::EmptyPayload));

        let err = storage
            .store_image("a.png", Bytes::from(vec![0u8; 2048]))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadStorageError::PayloadTooLarge));
    }

    #[tokio::test]
    async fn read_rejects_path_traversal() {
        let (storage, _dir) = storage();

        let err = storage.read("../secrets").await.unwrap_err();
        assert!(matches!(err, UploadStorageError::InvalidPath));

        let err = storage.read("/etc/passwd").await.unwrap_err();
        assert!(matches!(err, UploadStorageError::InvalidPath));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (storage, _dir) = storage();

        let stored = storage
            .store_image("a.png", Bytes::from_static(b"bytes"))
            .await
            .expect("store");

        storage.delete(&stored.stored_path).await.expect("delete");
        storage
            .delete(&stored.stored_path)
            .await
            .expect("second delete is a no-op");
        assert!(matches!(
            storage.read(&stored.stored_path).await.unwrap_err(),
            UploadStorageError::Io(_)
        ));
    }
}
