pub mod local_service;
pub mod s3_service;

use image::ImageFormat;
use sha2::{Digest, Sha256};

use local_service::LocalService;
use s3_service::S3Service;

const MAX_IMAGE_SIZE: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 error: {0}")]
    S3(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid file format")]
    InvalidFormat,
    #[error("File too large")]
    FileTooLarge,
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
    #[error("Image not found: {0}")]
    NotFound(String),
}

/// Where uploaded originals live: S3 when a bucket is configured, otherwise
/// a local directory.
#[derive(Clone)]
pub enum ImageStorage {
    S3(S3Service),
    Local(LocalService),
}

impl ImageStorage {
    pub async fn put(&self, key: &str, data: &[u8], mime_type: &str) -> Result<(), StorageError> {
        match self {
            ImageStorage::S3(s3) => s3.upload_image(data, key, mime_type).await,
            ImageStorage::Local(local) => local.upload_image(data, key).await,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        match self {
            ImageStorage::S3(s3) => s3.get_image(key).await,
            ImageStorage::Local(local) => local.get_image(key).await,
        }
    }
}

pub fn calculate_image_hash(image_data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_data);
    hex::encode(hasher.finalize())
}

pub fn generate_key(batch_id: &str, image_hash: &str, file_extension: &str) -> String {
    format!("{}/{}.{}", batch_id, image_hash, file_extension)
}

/// Checks size and sniffs the content. Returns the file extension.
pub fn validate_image(image_data: &[u8]) -> Result<&'static str, StorageError> {
    if image_data.len() > MAX_IMAGE_SIZE {
        return Err(StorageError::FileTooLarge);
    }
    match image::guess_format(image_data) {
        Ok(ImageFormat::Jpeg) => Ok("jpg"),
        Ok(ImageFormat::Png) => Ok("png"),
        Ok(ImageFormat::WebP) => Ok("webp"),
        Ok(ImageFormat::Gif) => Ok("gif"),
        _ => Err(StorageError::InvalidFormat),
    }
}

pub fn mime_type_for_key(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
