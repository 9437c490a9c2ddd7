use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use shared::{
    endpoints, ActivityType, Batch, BatchStatus, BatchStore, ExportRequest, ExportResponse,
    ExportType, Image, NewImage, RetouchResponse, StatusResponse, StoreError, UploadResponse,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::storage::{
    calculate_image_hash, generate_key, mime_type_for_key, validate_image, ImageStorage,
};

/// One image part received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Owns every batch created through the API together with its status log.
#[derive(Clone)]
pub struct BatchService {
    store: Arc<Mutex<BatchStore>>,
    logs: Arc<Mutex<HashMap<String, Vec<String>>>>,
    storage: ImageStorage,
}

impl BatchService {
    pub fn new(storage: ImageStorage) -> Self {
        Self {
            store: Arc::new(Mutex::new(BatchStore::new())),
            logs: Arc::new(Mutex::new(HashMap::new())),
            storage,
        }
    }

    pub fn storage(&self) -> &ImageStorage {
        &self.storage
    }

    fn store(&self) -> Result<MutexGuard<'_, BatchStore>, ApiError> {
        self.store
            .lock()
            .map_err(|_| ApiError::Internal("batch store lock poisoned".to_string()))
    }

    fn append_log(&self, batch_id: &str, line: String) {
        match self.logs.lock() {
            Ok(mut logs) => {
                let stamped = format!("[{}] {}", Utc::now().format("%H:%M:%S"), line);
                logs.entry(batch_id.to_string()).or_default().push(stamped);
            }
            Err(_) => log::error!("Status log lock poisoned; dropped line for {}", batch_id),
        }
    }

    /// Validates and stores every image, then registers a queued batch.
    pub async fn create_batch(
        &self,
        instructions: String,
        images: Vec<UploadedImage>,
        user: &str,
    ) -> Result<UploadResponse, ApiError> {
        if images.is_empty() {
            return Err(ApiError::BadRequest("No images provided".to_string()));
        }
        if instructions.trim().is_empty() {
            return Err(ApiError::BadRequest("No instructions provided".to_string()));
        }

        let batch_id = Uuid::new_v4().to_string();
        let mut new_images = Vec::with_capacity(images.len());
        for image in images {
            let extension = validate_image(&image.data)?;
            let hash = calculate_image_hash(&image.data);
            let key = generate_key(&batch_id, &hash, extension);
            self.storage
                .put(&key, &image.data, mime_type_for_key(&key))
                .await?;
            new_images.push(NewImage {
                original_name: image.file_name,
                original_url: endpoints::image(&key),
                size: image.data.len() as u64,
            });
        }

        let image_count = new_images.len();
        {
            let mut store = self.store()?;
            store.create_batch_with_images(&batch_id, &instructions, new_images)?;
            store.add_log(
                ActivityType::Upload,
                "Uploaded batch",
                &format!("{} image(s) in batch {}", image_count, batch_id),
                user,
            );
        }
        self.append_log(&batch_id, format!("Batch created with {} image(s)", image_count));
        log::info!("Created batch {} with {} image(s)", batch_id, image_count);

        Ok(UploadResponse {
            batch_id,
            message: "Upload successful".to_string(),
            image_count,
        })
    }

    pub fn status(&self, batch_id: &str) -> Result<StatusResponse, ApiError> {
        let (progress, status) = {
            let store = self.store()?;
            let batch = store
                .get_batch(batch_id)
                .ok_or_else(|| StoreError::BatchNotFound(batch_id.to_string()))?;
            (batch.progress, batch.status)
        };
        let logs = self
            .logs
            .lock()
            .map_err(|_| ApiError::Internal("status log lock poisoned".to_string()))?
            .get(batch_id)
            .cloned()
            .unwrap_or_default();
        Ok(StatusResponse {
            progress,
            status,
            logs,
        })
    }

    pub fn results(&self, batch_id: &str) -> Result<Batch, ApiError> {
        let store = self.store()?;
        store
            .get_batch(batch_id)
            .cloned()
            .ok_or_else(|| StoreError::BatchNotFound(batch_id.to_string()).into())
    }

    /// Records an amendment for the image. The amended result points at the
    /// stored original with a version suffix.
    pub fn retouch(
        &self,
        image_id: &str,
        instruction: &str,
        user: &str,
    ) -> Result<RetouchResponse, ApiError> {
        if instruction.trim().is_empty() {
            return Err(ApiError::BadRequest("Instruction must not be empty".to_string()));
        }
        let (batch_id, version) = {
            let mut store = self.store()?;
            let (batch_id, processed_url) = {
                let (batch, image) = store
                    .find_image(image_id)
                    .ok_or_else(|| StoreError::ImageNotFound(image_id.to_string()))?;
                let url = format!("{}?v={}", image.original_url, image.versions.len() + 1);
                (batch.id.clone(), url)
            };
            let version =
                store.retouch_image(image_id, processed_url, instruction.to_string())?;
            store.add_log(
                ActivityType::Retouch,
                "Requested retouch",
                &format!("{}: {}", image_id, instruction),
                user,
            );
            (batch_id, version)
        };
        self.append_log(&batch_id, format!("Retouched {}", image_id));

        Ok(RetouchResponse {
            success: true,
            processed_url: version.processed_url,
        })
    }

    pub fn export(&self, request: &ExportRequest, user: &str) -> Result<ExportResponse, ApiError> {
        if request.export_type == ExportType::Dam && request.dam_url.is_none() {
            return Err(ApiError::BadRequest("damUrl is required for DAM export".to_string()));
        }
        let mut store = self.store()?;
        let batch = store
            .get_batch(&request.batch_id)
            .ok_or_else(|| StoreError::BatchNotFound(request.batch_id.clone()))?;
        let urls: Vec<String> = batch
            .live_images()
            .filter(|img| match &request.image_ids {
                Some(ids) => ids.contains(&img.id),
                None => true,
            })
            .filter_map(|img| img.processed_url.clone())
            .collect();
        let exported = urls.len();

        let description = match &request.export_type {
            ExportType::Download => format!("Prepared {} download(s) for {}", exported, batch.id),
            ExportType::Dam => format!(
                "Exported {} image(s) from {} to {}",
                exported,
                batch.id,
                request.dam_url.as_deref().unwrap_or_default()
            ),
        };
        store.add_log(ActivityType::Export, "Exported images", &description, user);

        Ok(ExportResponse {
            success: true,
            exported,
            download_urls: (request.export_type == ExportType::Download).then_some(urls),
        })
    }

    /// Splits the requested images into deliverable ones and skipped ids.
    /// Only processed, non-deleted images of the batch can be delivered.
    pub fn deliverable_images(
        &self,
        batch_id: &str,
        image_ids: &[String],
    ) -> Result<(Vec<Image>, Vec<String>), ApiError> {
        let store = self.store()?;
        let batch = store
            .get_batch(batch_id)
            .ok_or_else(|| StoreError::BatchNotFound(batch_id.to_string()))?;
        let mut deliverable = Vec::new();
        let mut skipped = Vec::new();
        for id in image_ids {
            match batch.image(id) {
                Some(img) if img.is_live() && img.is_processed() => deliverable.push(img.clone()),
                _ => skipped.push(id.clone()),
            }
        }
        Ok((deliverable, skipped))
    }

    pub fn record_delivery(&self, batch_id: &str, count: usize, target: &str, user: &str) {
        match self.store() {
            Ok(mut store) => {
                store.add_log(
                    ActivityType::Export,
                    "Sent to DAM",
                    &format!("{} image(s) from {} to {}", count, batch_id, target),
                    user,
                );
            }
            Err(e) => log::error!("Could not record delivery for {}: {}", batch_id, e),
        }
        self.append_log(batch_id, format!("Delivered {} image(s) to {}", count, target));
    }

    /// Processes the next pending image. Returns `false` once the batch has
    /// nothing left to do.
    pub fn process_next(&self, batch_id: &str) -> Result<bool, ApiError> {
        let (line, more) = {
            let mut store = self.store()?;
            let batch = store
                .get_batch_mut(batch_id)
                .ok_or_else(|| StoreError::BatchNotFound(batch_id.to_string()))?;
            if batch.is_terminal() {
                return Ok(false);
            }
            let line = match batch.next_pending_mut() {
                Some(image) => {
                    let url = image.original_url.clone();
                    image.record_processed(url);
                    Some(format!("Processed {}", image.original_name))
                }
                None => None,
            };
            batch.recompute();
            if line.is_none() && !batch.is_terminal() {
                // Every pending image was deleted before processing reached it.
                batch.fail();
            }
            if batch.status == BatchStatus::Completed {
                store.add_log(
                    ActivityType::Process,
                    "Processing completed",
                    &format!("Batch {} finished", batch_id),
                    "system",
                );
            }
            let more = store
                .get_batch(batch_id)
                .map(|b| !b.is_terminal())
                .unwrap_or(false);
            (line, more)
        };

        if let Some(line) = line {
            self.append_log(batch_id, line);
        }
        if !more {
            self.append_log(batch_id, "Processing finished".to_string());
        }
        Ok(more)
    }

    pub fn fail_batch(&self, batch_id: &str, reason: &str) {
        if let Ok(mut store) = self.store() {
            if let Some(batch) = store.get_batch_mut(batch_id) {
                batch.fail();
            }
        }
        self.append_log(batch_id, format!("Processing failed: {}", reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::local_service::LocalService;
    use shared::store::image_id;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0";

    fn service() -> BatchService {
        let root = std::env::temp_dir().join(format!("batch-service-{}", Uuid::new_v4()));
        BatchService::new(ImageStorage::Local(LocalService::new(root)))
    }

    fn png(name: &str) -> UploadedImage {
        UploadedImage {
            file_name: name.to_string(),
            data: PNG.to_vec(),
        }
    }

    #[tokio::test]
    async fn upload_creates_queued_batch() {
        let service = service();
        let response = service
            .create_batch("brighten".into(), vec![png("a.png"), png("b.png")], "u1")
            .await
            .unwrap();
        assert_eq!(response.image_count, 2);

        let status = service.status(&response.batch_id).unwrap();
        assert_eq!(status.status, BatchStatus::Queued);
        assert_eq!(status.progress, 0);
        assert_eq!(status.logs.len(), 1);

        let batch = service.results(&response.batch_id).unwrap();
        assert!(batch.images[0].original_url.starts_with("/api/images/"));
    }

    #[tokio::test]
    async fn upload_rejects_missing_parts_and_non_images() {
        let service = service();
        assert!(matches!(
            service.create_batch("x".into(), vec![], "u1").await,
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            service.create_batch("  ".into(), vec![png("a.png")], "u1").await,
            Err(ApiError::BadRequest(_))
        ));
        let text = UploadedImage {
            file_name: "notes.txt".into(),
            data: b"hello".to_vec(),
        };
        assert!(matches!(
            service.create_batch("x".into(), vec![text], "u1").await,
            Err(ApiError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn processing_runs_to_completion() {
        let service = service();
        let id = service
            .create_batch("x".into(), vec![png("a.png"), png("b.png")], "u1")
            .await
            .unwrap()
            .batch_id;

        assert!(service.process_next(&id).unwrap());
        assert_eq!(service.status(&id).unwrap().progress, 50);
        assert!(!service.process_next(&id).unwrap());

        let status = service.status(&id).unwrap();
        assert_eq!(status.status, BatchStatus::Completed);
        assert_eq!(status.progress, 100);
        assert!(!service.process_next(&id).unwrap());
    }

    #[tokio::test]
    async fn retouch_appends_versions() {
        let service = service();
        let id = service
            .create_batch("x".into(), vec![png("a.png")], "u1")
            .await
            .unwrap()
            .batch_id;
        let image = image_id(&id, 0);

        assert!(matches!(
            service.retouch(&image, "warmer", "u1"),
            Err(ApiError::Store(StoreError::ImageNotProcessed(_)))
        ));

        service.process_next(&id).unwrap();
        let response = service.retouch(&image, "warmer", "u1").unwrap();
        assert!(response.processed_url.ends_with("?v=2"));
        let batch = service.results(&id).unwrap();
        assert_eq!(batch.images[0].versions.len(), 2);
        assert!(batch.images[0].versions[1].is_amendment);
    }

    #[test]
    fn unknown_batches_are_not_found() {
        let service = service();
        assert!(matches!(
            service.status("missing"),
            Err(ApiError::Store(StoreError::BatchNotFound(_)))
        ));
        assert!(matches!(
            service.process_next("missing"),
            Err(ApiError::Store(StoreError::BatchNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn export_lists_processed_images() {
        let service = service();
        let id = service
            .create_batch("x".into(), vec![png("a.png"), png("b.png")], "u1")
            .await
            .unwrap()
            .batch_id;
        service.process_next(&id).unwrap();

        let request = ExportRequest {
            batch_id: id.clone(),
            export_type: ExportType::Download,
            dam_url: None,
            image_ids: None,
        };
        let response = service.export(&request, "u1").unwrap();
        assert_eq!(response.exported, 1);
        assert_eq!(response.download_urls.unwrap().len(), 1);

        let dam = ExportRequest {
            export_type: ExportType::Dam,
            ..request
        };
        assert!(matches!(service.export(&dam, "u1"), Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn export_skips_images_deleted_on_the_client() {
        let service = service();
        let photo = UploadedImage {
            file_name: "b.jpg".to_string(),
            data: JPEG.to_vec(),
        };
        let id = service
            .create_batch("x".into(), vec![png("a.png"), photo], "u1")
            .await
            .unwrap()
            .batch_id;
        service.process_next(&id).unwrap();
        service.process_next(&id).unwrap();

        let mut client = BatchStore::new();
        client.sync_batch(service.results(&id).unwrap());
        client.delete_image(&image_id(&id, 1)).unwrap();
        let live: Vec<String> = client
            .get_batch(&id)
            .unwrap()
            .live_images()
            .map(|img| img.id.clone())
            .collect();

        let request = ExportRequest {
            batch_id: id.clone(),
            export_type: ExportType::Download,
            dam_url: None,
            image_ids: Some(live),
        };
        let response = service.export(&request, "u1").unwrap();
        let deleted_url = service
            .results(&id)
            .unwrap()
            .image(&image_id(&id, 1))
            .and_then(|img| img.processed_url.clone())
            .unwrap();
        let urls = response.download_urls.unwrap();
        assert_eq!(response.exported, 1);
        assert!(!urls.contains(&deleted_url));
    }

    #[tokio::test]
    async fn only_processed_images_are_deliverable() {
        let service = service();
        let id = service
            .create_batch("x".into(), vec![png("a.png"), png("b.png")], "u1")
            .await
            .unwrap()
            .batch_id;
        service.process_next(&id).unwrap();
        let ids = vec![image_id(&id, 0), image_id(&id, 1), "nope".to_string()];
        let (deliverable, skipped) = service.deliverable_images(&id, &ids).unwrap();
        assert_eq!(deliverable.len(), 1);
        assert_eq!(skipped, vec![image_id(&id, 1), "nope".to_string()]);
    }
}
