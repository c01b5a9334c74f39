//! Uploaded media storage. Files live at `{owner_id}/{hash_name}` under a root directory.

use crate::config::FileField;
use crate::error::{AppError, ValidationErrors};
use async_trait::async_trait;
use axum::body::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A file part received with a write request.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn put(&self, owner: Uuid, name: &str, bytes: &[u8]) -> Result<(), AppError>;

    /// Missing files are not an error.
    async fn delete(&self, owner: Uuid, name: &str) -> Result<(), AppError>;
}

#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalFileStorage { root: root.into() }
    }

    fn path(&self, owner: Uuid, name: &str) -> Result<PathBuf, AppError> {
        let file = Path::new(name)
            .file_name()
            .filter(|f| f.len() == name.len())
            .ok_or_else(|| AppError::BadRequest(format!("invalid stored file name: {}", name)))?;
        Ok(self.root.join(owner.to_string()).join(file))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn put(&self, owner: Uuid, name: &str, bytes: &[u8]) -> Result<(), AppError> {
        let path = self.path(owner, name)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "stored upload");
        Ok(())
    }

    async fn delete(&self, owner: Uuid, name: &str) -> Result<(), AppError> {
        let path = self.path(owner, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "deleted upload");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Random 32-hex-char name keeping the original extension, e.g. `3f2a...9c.mp4`.
pub fn hash_name(original: Option<&str>) -> String {
    let stem = Uuid::new_v4().simple().to_string();
    let ext = original
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.bytes().all(|b| b.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{}.{}", stem, ext.to_ascii_lowercase()),
        None => stem,
    }
}

/// Record MIME type and size violations of `file` against its field definition.
pub fn validate_upload(field: &FileField, file: &UploadedFile, errors: &mut ValidationErrors) {
    if file.file_name.is_none() {
        errors.add(&field.field, format!("{} must be a file", field.field));
        return;
    }
    if !field.mime_types.is_empty() {
        let mime = file
            .content_type
            .as_deref()
            .and_then(|c| c.split(';').next())
            .map(|c| c.trim().to_ascii_lowercase());
        let ok = mime
            .as_deref()
            .map(|m| field.mime_types.iter().any(|t| t.eq_ignore_ascii_case(m)))
            .unwrap_or(false);
        if !ok {
            errors.add(
                &field.field,
                format!("{} must be a file of type: {}", field.field, field.mime_types.join(", ")),
            );
        }
    }
    if file.bytes.len() as u64 > field.max_bytes {
        errors.add(
            &field.field,
            format!("{} may not be greater than {} kilobytes", field.field, field.max_bytes / 1024),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_field(max_kb: u64) -> FileField {
        FileField {
            field: "video_file".into(),
            mime_types: vec!["video/mp4".into()],
            max_bytes: max_kb * 1024,
        }
    }

    fn upload(content_type: &str, size: usize) -> UploadedFile {
        UploadedFile {
            field: "video_file".into(),
            file_name: Some("clip.MP4".into()),
            content_type: Some(content_type.into()),
            bytes: Bytes::from(vec![0u8; size]),
        }
    }

    #[test]
    fn hash_name_keeps_extension() {
        let name = hash_name(Some("clip.MP4"));
        assert_eq!(name.len(), 36);
        assert!(name.ends_with(".mp4"));
        assert_eq!(hash_name(None).len(), 32);
    }

    #[test]
    fn rejects_wrong_type_and_oversize() {
        let field = video_field(1);
        let mut errors = ValidationErrors::new();
        validate_upload(&field, &upload("video/mp4", 1024), &mut errors);
        assert!(errors.is_empty());
        validate_upload(&field, &upload("image/png", 2048), &mut errors);
        assert_eq!(errors.messages("video_file").len(), 2);
    }

    #[tokio::test]
    async fn stores_under_owner_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());
        let owner = Uuid::new_v4();
        storage.put(owner, "a.mp4", b"data").await.unwrap();
        let path = dir.path().join(owner.to_string()).join("a.mp4");
        assert!(path.is_file());
        storage.delete(owner, "a.mp4").await.unwrap();
        storage.delete(owner, "a.mp4").await.unwrap();
        assert!(!path.exists());
        assert!(storage.put(owner, "../escape", b"x").await.is_err());
    }
}
