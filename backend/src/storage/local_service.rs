use std::path::{Component, Path, PathBuf};

use super::StorageError;

/// Stores images under a directory on the local filesystem.
#[derive(Clone)]
pub struct LocalService {
    root: PathBuf,
}

impl LocalService {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    pub async fn upload_image(&self, image_data: &[u8], key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, image_data).await?;
        log::debug!("Stored {}", path.display());
        Ok(())
    }

    pub async fn get_image(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_keys_are_rejected() {
        let service = LocalService::new(PathBuf::from("/tmp/uploads"));
        assert!(service.resolve("../etc/passwd").is_err());
        assert!(service.resolve("/etc/passwd").is_err());
        assert!(service.resolve("").is_err());
        assert_eq!(
            service.resolve("b1/abc.png").unwrap(),
            PathBuf::from("/tmp/uploads/b1/abc.png")
        );
    }

    #[tokio::test]
    async fn stored_images_read_back() {
        let root = std::env::temp_dir().join(format!("local-service-{}", uuid::Uuid::new_v4()));
        let service = LocalService::new(root.clone());
        service.upload_image(b"bytes", "b1/x.png").await.unwrap();
        assert_eq!(service.get_image("b1/x.png").await.unwrap(), b"bytes");
        assert!(matches!(
            service.get_image("b1/missing.png").await,
            Err(StorageError::NotFound(_))
        ));
        let _ = std::fs::remove_dir_all(root);
    }
}
