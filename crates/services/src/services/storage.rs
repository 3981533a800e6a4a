use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use super::config::StorageConfig;

const MAX_FILE_NAME_LEN: usize = 120;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("File too large: {0} bytes (max {1})")]
    TooLarge(u64, u64),
    #[error("Unsupported file type: {0}")]
    InvalidFormat(String),
    #[error("Empty upload")]
    Empty,
    #[error("File not found")]
    NotFound,
    #[error("Invalid storage path")]
    InvalidPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Photo,
    Document,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Relative to the storage root.
    pub storage_path: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
}

#[derive(Clone)]
pub struct StorageService {
    root: PathBuf,
    limits: StorageConfig,
}

/// Keeps ascii alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.len() > MAX_FILE_NAME_LEN {
        let keep = cleaned.len() - MAX_FILE_NAME_LEN;
        cleaned = cleaned[keep..].to_string();
    }
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

fn type_matches(pattern: &str, content_type: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    match pattern.strip_suffix("/*") {
        Some(family) => content_type
            .split_once('/')
            .is_some_and(|(kind, _)| kind == family),
        None => pattern == content_type,
    }
}

impl StorageService {
    pub fn new(root: impl Into<PathBuf>, limits: StorageConfig) -> Self {
        Self {
            root: root.into(),
            limits,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.limits.max_upload_bytes
    }

    /// Prefers the declared type; falls back to guessing from the file name.
    pub fn content_type_for(file_name: &str, declared: Option<&str>) -> String {
        let declared = declared
            .map(|t| t.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty() && t != "application/octet-stream");
        declared.unwrap_or_else(|| {
            mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        })
    }

    pub fn check_allowed(&self, kind: UploadKind, content_type: &str) -> Result<(), StorageError> {
        let allowed = match kind {
            UploadKind::Photo => type_matches("image/*", content_type),
            UploadKind::Document => self
                .limits
                .allowed_document_types
                .iter()
                .any(|pattern| type_matches(pattern, content_type)),
        };
        if allowed {
            Ok(())
        } else {
            Err(StorageError::InvalidFormat(content_type.to_string()))
        }
    }

    fn resolve(&self, storage_path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(storage_path);
        let safe = !storage_path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidPath);
        }
        Ok(self.root.join(relative))
    }

    pub async fn store(
        &self,
        user_id: Uuid,
        kind: UploadKind,
        file_name: &str,
        declared_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let size = bytes.len() as u64;
        if size == 0 {
            return Err(StorageError::Empty);
        }
        if size > self.limits.max_upload_bytes {
            return Err(StorageError::TooLarge(size, self.limits.max_upload_bytes));
        }
        let content_type = Self::content_type_for(file_name, declared_type);
        self.check_allowed(kind, &content_type)?;

        let safe_name = sanitize_file_name(file_name);
        let storage_path = format!("{user_id}/{}-{safe_name}", Uuid::new_v4());
        let full_path = self.resolve(&storage_path)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, bytes).await?;
        tracing::debug!(%user_id, path = storage_path.as_str(), size, "stored upload");

        Ok(StoredFile {
            storage_path,
            file_name: safe_name,
            content_type,
            size_bytes: size as i64,
        })
    }

    pub async fn read(&self, storage_path: &str) -> Result<Vec<u8>, StorageError> {
        let full_path = self.resolve(storage_path)?;
        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// A file that is already gone is logged, not treated as an error.
    pub async fn delete(&self, storage_path: &str) -> Result<(), StorageError> {
        let full_path = self.resolve(storage_path)?;
        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = storage_path, "stored file already missing");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Best effort cleanup after the owning rows are gone.
    pub async fn delete_all<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            if let Err(err) = self.delete(path.as_ref()).await {
                tracing::warn!(path = path.as_ref(), error = %err, "failed to remove stored file");
            }
        }
    }
}
