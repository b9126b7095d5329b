use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use file_format::FileFormat;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::error::DomainError;

/// Directory (relative to the media root) post images are uploaded to.
pub const UPLOAD_DIR: &str = "posts";

/// An uploaded file whose content was recognised as an image.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub data: Bytes,
    pub extension: String,
}

impl UploadedImage {
    /// Returns `None` unless the bytes look like an image.
    pub fn sniff(data: Bytes) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        let format = FileFormat::from_bytes(&data);
        match format {
            FileFormat::GraphicsInterchangeFormat
            | FileFormat::PortableNetworkGraphics
            | FileFormat::JointPhotographicExpertsGroup
            | FileFormat::Webp
            | FileFormat::WindowsBitmap => Some(Self {
                extension: format.extension().to_owned(),
                data,
            }),
            _ => None,
        }
    }
}

pub fn media_type(data: &[u8]) -> String {
    FileFormat::from_bytes(data).media_type().to_string()
}

fn generate_path(extension: &str) -> String {
    format!("{UPLOAD_DIR}/{}.{extension}", Uuid::new_v4())
}

/// Only plain relative paths below the upload directory are served.
pub fn is_servable(path: &str) -> bool {
    let path = Path::new(path);
    path.starts_with(UPLOAD_DIR) && path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the image under a generated name and returns its relative path.
    async fn save(&self, image: &UploadedImage) -> Result<String, DomainError>;
    async fn read(&self, path: &str) -> Result<Option<Bytes>, DomainError>;
}

#[derive(Debug)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub async fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        debug!(root = %root.display(), "setting up local media store");
        tokio::fs::create_dir_all(root.join(UPLOAD_DIR)).await?;
        Ok(Self { root })
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn save(&self, image: &UploadedImage) -> Result<String, DomainError> {
        let path = generate_path(&image.extension);
        tokio::fs::write(self.root.join(&path), &image.data)
            .await
            .map_err(|e| {
                error!("failed to write image {}: {}", path, e);
                DomainError::Internal(format!("media error: {}", e))
            })?;
        info!(path = %path, size = image.data.len(), "image stored");
        Ok(path)
    }

    /// Directories and other non-files read as missing.
    async fn read(&self, path: &str) -> Result<Option<Bytes>, DomainError> {
        if !is_servable(path) {
            return Ok(None);
        }
        let full_path = self.root.join(path);
        match tokio::fs::metadata(&full_path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                error!("failed to stat image {}: {}", path, e);
                return Err(DomainError::Internal(format!("media error: {}", e)));
            }
        }
        match tokio::fs::read(&full_path).await {
            Ok(data) => Ok(Some(data.into())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                error!("failed to read image {}: {}", path, e);
                Err(DomainError::Internal(format!("media error: {}", e)))
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryImageStore {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn save(&self, image: &UploadedImage) -> Result<String, DomainError> {
        let path = generate_path(&image.extension);
        self.files
            .write()
            .await
            .insert(path.clone(), image.data.clone());
        Ok(path)
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>, DomainError> {
        if !is_servable(path) {
            return Ok(None);
        }
        Ok(self.files.read().await.get(path).cloned())
    }
}
