use std::collections::VecDeque;

use chrono::Utc;
use log::{debug, warn};
use uuid::Uuid;

use crate::api::StatusResponse;
use crate::dam::DamConnection;
use crate::error::StoreError;
use crate::model::{ActivityLogEntry, ActivityType, Batch, Image, ImageStatus, Order, Version};

/// An image known to the caller at batch creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    pub original_name: String,
    pub original_url: String,
    pub size: u64,
}

pub fn image_id(batch_id: &str, index: usize) -> String {
    format!("{}-img-{}", batch_id, index + 1)
}

/// In-memory source of truth for batches, the activity log and DAM
/// connections. Lives for one session; nothing here is persisted.
#[derive(Debug, Default, Clone)]
pub struct BatchStore {
    batches: Vec<Batch>,
    activity_log: VecDeque<ActivityLogEntry>,
    dam_connections: Vec<DamConnection>,
    active_connection: Option<String>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_batch(
        &mut self,
        id: &str,
        instructions: &str,
        image_count: usize,
    ) -> Result<&Batch, StoreError> {
        let images = (0..image_count)
            .map(|i| NewImage {
                original_name: format!("image-{}", i + 1),
                original_url: String::new(),
                size: 0,
            })
            .collect();
        self.create_batch_with_images(id, instructions, images)
    }

    pub fn create_batch_with_images(
        &mut self,
        id: &str,
        instructions: &str,
        images: Vec<NewImage>,
    ) -> Result<&Batch, StoreError> {
        let images = images
            .into_iter()
            .enumerate()
            .map(|(i, img)| {
                Image::pending(image_id(id, i), img.original_name, img.original_url, img.size)
            })
            .collect();
        self.insert_batch(Batch::new(id.to_string(), instructions.to_string(), images))
    }

    pub fn insert_batch(&mut self, batch: Batch) -> Result<&Batch, StoreError> {
        if self.get_batch(&batch.id).is_some() {
            warn!("Rejected duplicate batch id {}", batch.id);
            return Err(StoreError::DuplicateBatch(batch.id));
        }
        debug!("Created batch {} with {} images", batch.id, batch.images.len());
        self.batches.push(batch);
        Ok(&self.batches[self.batches.len() - 1])
    }

    pub fn get_batch(&self, batch_id: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.id == batch_id)
    }

    pub fn get_batch_mut(&mut self, batch_id: &str) -> Option<&mut Batch> {
        self.batches.iter_mut().find(|b| b.id == batch_id)
    }

    pub fn get_order(&self, order_id: &str) -> Result<Order, StoreError> {
        self.get_batch(order_id)
            .map(Batch::to_order)
            .ok_or_else(|| StoreError::BatchNotFound(order_id.to_string()))
    }

    /// Most recently created batch.
    pub fn current_batch(&self) -> Option<&Batch> {
        self.batches.last()
    }

    pub fn orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.batches.iter().rev().map(Batch::to_order).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    pub fn find_image(&self, image_id: &str) -> Option<(&Batch, &Image)> {
        self.batches
            .iter()
            .find_map(|b| b.image(image_id).map(|img| (b, img)))
    }

    fn with_image<T>(
        &mut self,
        image_id: &str,
        f: impl FnOnce(&mut Image) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.image(image_id).is_some())
            .ok_or_else(|| StoreError::ImageNotFound(image_id.to_string()))?;
        let image = batch
            .image_mut(image_id)
            .ok_or_else(|| StoreError::ImageNotFound(image_id.to_string()))?;
        let out = f(image)?;
        batch.recompute();
        Ok(out)
    }

    /// Moves an image to `status`. Repeating a call with the same target is a
    /// no-op. A URL with `Processed` or `Amendment` records a new version.
    pub fn update_image_status(
        &mut self,
        image_id: &str,
        status: ImageStatus,
        url: Option<String>,
    ) -> Result<(), StoreError> {
        match status {
            ImageStatus::Approved => self.approve_image(image_id),
            ImageStatus::Deleted => self.delete_image(image_id),
            _ => self.with_image(image_id, |image| {
                let repeated = image.status == status
                    && (url.is_none() || url.as_deref() == image.processed_url.as_deref());
                if repeated {
                    return Ok(());
                }
                if image.is_locked() {
                    return Err(StoreError::ImageLocked(image.id.clone()));
                }
                match (status, url) {
                    (ImageStatus::Processed, Some(url)) => {
                        image.record_processed(url);
                    }
                    (ImageStatus::Amendment, Some(url)) => {
                        image.record_amendment(url, String::new())?;
                    }
                    (ImageStatus::Pending, _) => image.status = ImageStatus::Pending,
                    (_, None) if image.is_processed() => image.status = status,
                    _ => return Err(StoreError::ImageNotProcessed(image.id.clone())),
                }
                Ok(())
            }),
        }
    }

    /// Approves an image. Approving twice leaves it approved.
    pub fn approve_image(&mut self, image_id: &str) -> Result<(), StoreError> {
        self.with_image(image_id, |image| match image.status {
            ImageStatus::Approved => Ok(()),
            ImageStatus::Deleted => Err(StoreError::ImageDeleted(image.id.clone())),
            _ if !image.is_processed() => Err(StoreError::ImageNotProcessed(image.id.clone())),
            _ => {
                image.status = ImageStatus::Approved;
                Ok(())
            }
        })
    }

    pub fn retouch_image(
        &mut self,
        image_id: &str,
        processed_url: String,
        prompt: String,
    ) -> Result<Version, StoreError> {
        self.with_image(image_id, |image| match image.status {
            ImageStatus::Approved => Err(StoreError::ImageLocked(image.id.clone())),
            ImageStatus::Deleted => Err(StoreError::ImageDeleted(image.id.clone())),
            _ => image.record_amendment(processed_url, prompt).cloned(),
        })
    }

    pub fn delete_image(&mut self, image_id: &str) -> Result<(), StoreError> {
        self.with_image(image_id, |image| {
            if image.is_locked() {
                return Err(StoreError::ImageLocked(image.id.clone()));
            }
            image.status = ImageStatus::Deleted;
            Ok(())
        })
    }

    /// Replaces a batch with a server snapshot. Approvals and deletions made
    /// locally survive the sync.
    pub fn sync_batch(&mut self, mut remote: Batch) {
        match self.get_batch_mut(&remote.id) {
            Some(local) => {
                for image in remote.images.iter_mut() {
                    if let Some(previous) = local.image(&image.id) {
                        if matches!(previous.status, ImageStatus::Approved | ImageStatus::Deleted) {
                            image.status = previous.status;
                        }
                    }
                }
                remote.recompute();
                *local = remote;
            }
            None => {
                remote.recompute();
                self.batches.push(remote);
            }
        }
    }

    pub fn apply_status(
        &mut self,
        batch_id: &str,
        status: &StatusResponse,
    ) -> Result<bool, StoreError> {
        let batch = self
            .get_batch_mut(batch_id)
            .ok_or_else(|| StoreError::BatchNotFound(batch_id.to_string()))?;
        let changed = batch.status != status.status || batch.progress != status.progress;
        batch.status = status.status;
        batch.progress = status.progress.min(100);
        Ok(changed)
    }

    pub fn add_log(
        &mut self,
        activity_type: ActivityType,
        action: &str,
        description: &str,
        user: &str,
    ) -> &ActivityLogEntry {
        self.activity_log.push_front(ActivityLogEntry {
            id: Uuid::new_v4().to_string(),
            activity_type,
            action: action.to_string(),
            description: description.to_string(),
            timestamp: Utc::now(),
            user: user.to_string(),
        });
        &self.activity_log[0]
    }

    /// Newest entry first.
    pub fn activity_log(&self) -> &VecDeque<ActivityLogEntry> {
        &self.activity_log
    }

    pub fn dam_connections(&self) -> &[DamConnection] {
        &self.dam_connections
    }

    /// Adds (or replaces) a connection and makes it the active upload target.
    pub fn add_dam_connection(&mut self, connection: DamConnection) {
        let id = connection.connection_id.clone();
        match self
            .dam_connections
            .iter_mut()
            .find(|c| c.connection_id == id)
        {
            Some(existing) => *existing = connection,
            None => self.dam_connections.push(connection),
        }
        if self.set_active_dam_connection(&id).is_err() {
            debug!("Connection {} added but left inactive", id);
        }
    }

    pub fn set_active_dam_connection(&mut self, connection_id: &str) -> Result<(), StoreError> {
        let connection = self
            .dam_connections
            .iter()
            .find(|c| c.connection_id == connection_id)
            .ok_or_else(|| StoreError::ConnectionNotFound(connection_id.to_string()))?;
        if !connection.is_active {
            return Err(StoreError::ConnectionInactive(connection_id.to_string()));
        }
        self.active_connection = Some(connection_id.to_string());
        Ok(())
    }

    pub fn active_dam_connection(&self) -> Option<&DamConnection> {
        let id = self.active_connection.as_deref()?;
        self.dam_connections
            .iter()
            .find(|c| c.connection_id == id && c.is_active)
    }

    pub fn remove_dam_connection(
        &mut self,
        connection_id: &str,
    ) -> Result<DamConnection, StoreError> {
        let index = self
            .dam_connections
            .iter()
            .position(|c| c.connection_id == connection_id)
            .ok_or_else(|| StoreError::ConnectionNotFound(connection_id.to_string()))?;
        if self.active_connection.as_deref() == Some(connection_id) {
            self.active_connection = None;
        }
        Ok(self.dam_connections.remove(index))
    }

    /// Replaces the connection list with a server listing, keeping the
    /// active pointer when its target is still present and active.
    pub fn replace_dam_connections(&mut self, connections: Vec<DamConnection>) {
        self.dam_connections = connections;
        if self.active_dam_connection().is_none() {
            self.active_connection = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BatchStatus;
    use std::collections::BTreeMap;

    fn processed_store(n: usize) -> BatchStore {
        let mut store = BatchStore::new();
        store.create_batch("b1", "make it pop", n).unwrap();
        for i in 0..n {
            let url = Some(format!("/p/{}", i));
            store
                .update_image_status(&image_id("b1", i), ImageStatus::Processed, url)
                .unwrap();
        }
        store
    }

    fn connection(id: &str, active: bool) -> DamConnection {
        DamConnection {
            connection_id: id.into(),
            system_code: None,
            configuration: BTreeMap::new(),
            endpoint: "sftp.example.com".into(),
            is_active: active,
        }
    }

    #[test]
    fn created_batch_resolves_by_id_with_requested_image_count() {
        let mut store = BatchStore::new();
        store.create_batch("batch-42", "remove background", 5).unwrap();

        let order = store.get_order("batch-42").unwrap();
        assert_eq!(order.images.len(), 5);
        assert!(!order.status.is_terminal());
        assert_eq!(store.current_batch().unwrap().id, "batch-42");
    }

    #[test]
    fn unknown_order_is_not_found() {
        let store = BatchStore::new();
        assert_eq!(
            store.get_order("missing").unwrap_err(),
            StoreError::BatchNotFound("missing".into())
        );
    }

    #[test]
    fn duplicate_batch_id_is_rejected() {
        let mut store = BatchStore::new();
        store.create_batch("b1", "x", 1).unwrap();
        assert!(matches!(
            store.create_batch("b1", "y", 2),
            Err(StoreError::DuplicateBatch(_))
        ));
    }

    #[test]
    fn approving_twice_keeps_image_approved() {
        let mut store = processed_store(2);
        let id = image_id("b1", 0);
        store.approve_image(&id).unwrap();
        store.approve_image(&id).unwrap();
        assert_eq!(store.find_image(&id).unwrap().1.status, ImageStatus::Approved);
        assert_eq!(store.get_order("b1").unwrap().approved_count, 1);
    }

    #[test]
    fn pending_image_cannot_be_approved() {
        let mut store = BatchStore::new();
        store.create_batch("b1", "x", 1).unwrap();
        let id = image_id("b1", 0);
        assert_eq!(store.approve_image(&id), Err(StoreError::ImageNotProcessed(id)));
    }

    #[test]
    fn approved_image_is_locked() {
        let mut store = processed_store(1);
        let id = image_id("b1", 0);
        store.approve_image(&id).unwrap();

        assert!(matches!(store.delete_image(&id), Err(StoreError::ImageLocked(_))));
        assert!(matches!(
            store.retouch_image(&id, "/r".into(), "warmer".into()),
            Err(StoreError::ImageLocked(_))
        ));
        assert!(matches!(
            store.update_image_status(&id, ImageStatus::Processed, Some("/q".into())),
            Err(StoreError::ImageLocked(_))
        ));
    }

    #[test]
    fn repeated_status_update_is_idempotent() {
        let mut store = processed_store(1);
        let id = image_id("b1", 0);
        store
            .update_image_status(&id, ImageStatus::Processed, Some("/p/0".into()))
            .unwrap();
        let (_, image) = store.find_image(&id).unwrap();
        assert_eq!(image.versions.len(), 1);
        assert!(image.versions[0].is_original());
    }

    #[test]
    fn versions_start_with_original_processed_result() {
        let mut store = processed_store(1);
        let id = image_id("b1", 0);
        store
            .update_image_status(&id, ImageStatus::Processed, Some("/p/again".into()))
            .unwrap();
        store.retouch_image(&id, "/r/1".into(), "warmer".into()).unwrap();

        let (_, image) = store.find_image(&id).unwrap();
        assert_eq!(image.versions.len(), 3);
        assert!(image.versions[0].is_original());
        assert_eq!(image.versions[0].processed_url, "/p/0");
        assert!(image.versions[1].is_reprocess);
        assert_eq!(image.versions[2].prompt.as_deref(), Some("warmer"));
    }

    #[test]
    fn processing_every_image_completes_batch() {
        let store = processed_store(3);
        let order = store.get_order("b1").unwrap();
        assert_eq!(order.status, BatchStatus::Completed);
        assert_eq!(order.progress, 100);
        assert_eq!(order.processed_count, 3);
    }

    #[test]
    fn activity_log_is_newest_first() {
        let mut store = BatchStore::new();
        let first = store
            .add_log(ActivityType::Upload, "Uploaded", "3 images", "me")
            .id
            .clone();
        let second = store
            .add_log(ActivityType::Approve, "Approved", "1 image", "me")
            .id
            .clone();

        assert_eq!(store.activity_log()[0].id, second);
        assert_eq!(store.activity_log()[1].id, first);
    }

    #[test]
    fn sync_keeps_local_approvals() {
        let mut store = processed_store(2);
        let id = image_id("b1", 0);
        store.approve_image(&id).unwrap();

        let mut remote = store.get_batch("b1").unwrap().clone();
        for image in remote.images.iter_mut() {
            image.status = ImageStatus::Processed;
        }
        store.sync_batch(remote);

        assert_eq!(store.find_image(&id).unwrap().1.status, ImageStatus::Approved);
    }

    #[test]
    fn apply_status_reports_changes() {
        let mut store = BatchStore::new();
        store.create_batch("b1", "x", 2).unwrap();
        let status = StatusResponse {
            progress: 50,
            status: BatchStatus::Processing,
            logs: vec![],
        };
        assert!(store.apply_status("b1", &status).unwrap());
        assert!(!store.apply_status("b1", &status).unwrap());
    }

    #[test]
    fn only_one_connection_is_active() {
        let mut store = BatchStore::new();
        store.add_dam_connection(connection("c1", true));
        store.add_dam_connection(connection("c2", true));
        assert_eq!(store.active_dam_connection().unwrap().connection_id, "c2");

        store.set_active_dam_connection("c1").unwrap();
        assert_eq!(store.active_dam_connection().unwrap().connection_id, "c1");

        store.add_dam_connection(connection("c3", false));
        assert_eq!(store.active_dam_connection().unwrap().connection_id, "c1");
        assert_eq!(
            store.set_active_dam_connection("c3"),
            Err(StoreError::ConnectionInactive("c3".into()))
        );

        store.remove_dam_connection("c1").unwrap();
        assert!(store.active_dam_connection().is_none());
    }
}
