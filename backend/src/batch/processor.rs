use std::time::Duration;

use super::batch_service::BatchService;

/// Time between two processed images.
#[derive(Debug, Clone, Copy)]
pub struct ProcessingSettings {
    pub tick: Duration,
}

/// Processes the batch one image per tick until it reaches a terminal state.
pub fn spawn_processing(service: BatchService, batch_id: String, tick: Duration) {
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(tick);
        // The first tick completes immediately.
        interval.tick().await;
        log::info!("Processing batch {}", batch_id);

        loop {
            interval.tick().await;
            match service.process_next(&batch_id) {
                Ok(true) => continue,
                Ok(false) => {
                    log::info!("Batch {} finished processing", batch_id);
                    break;
                }
                Err(e) => {
                    log::error!("Processing batch {} failed: {}", batch_id, e);
                    service.fail_batch(&batch_id, &e.to_string());
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::batch_service::UploadedImage;
    use crate::storage::local_service::LocalService;
    use crate::storage::ImageStorage;
    use shared::BatchStatus;

    #[actix_web::test]
    async fn ticker_completes_batch() {
        let root = std::env::temp_dir().join(format!("processor-{}", uuid::Uuid::new_v4()));
        let service = BatchService::new(ImageStorage::Local(LocalService::new(root.clone())));
        let image = UploadedImage {
            file_name: "a.png".into(),
            data: b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec(),
        };
        let id = service
            .create_batch("x".into(), vec![image.clone(), image], "u1")
            .await
            .unwrap()
            .batch_id;

        spawn_processing(service.clone(), id.clone(), Duration::from_millis(5));
        for _ in 0..100 {
            if service.status(&id).unwrap().status.is_terminal() {
                break;
            }
            actix_web::rt::time::sleep(Duration::from_millis(5)).await;
        }
        let status = service.status(&id).unwrap();
        assert_eq!(status.status, BatchStatus::Completed);
        assert_eq!(status.progress, 100);
        let _ = std::fs::remove_dir_all(root);
    }
}
