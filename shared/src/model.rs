use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BatchStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageStatus {
    #[default]
    Pending,
    Processed,
    Approved,
    Amendment,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: String,
    pub processed_url: String,
    pub timestamp: DateTime<Utc>,
    pub is_reprocess: bool,
    pub is_amendment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Version {
    pub fn is_original(&self) -> bool {
        !self.is_reprocess && !self.is_amendment
    }

    pub fn label(&self) -> &'static str {
        if self.is_amendment {
            "Amendment"
        } else if self.is_reprocess {
            "Reprocess"
        } else {
            "Original Processed"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    pub original_name: String,
    pub original_url: String,
    #[serde(default)]
    pub processed_url: Option<String>,
    pub status: ImageStatus,
    #[serde(default)]
    pub versions: Vec<Version>,
    #[serde(default)]
    pub size: u64,
}

impl Image {
    pub fn pending(id: String, original_name: String, original_url: String, size: u64) -> Self {
        Self {
            id,
            original_name,
            original_url,
            processed_url: None,
            status: ImageStatus::Pending,
            versions: Vec::new(),
            size,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status != ImageStatus::Deleted
    }

    pub fn is_processed(&self) -> bool {
        !self.versions.is_empty()
    }

    pub fn is_locked(&self) -> bool {
        self.status == ImageStatus::Approved
    }

    pub fn original_version(&self) -> Option<&Version> {
        self.versions.first()
    }

    pub fn latest_version(&self) -> Option<&Version> {
        self.versions.last()
    }

    pub fn has_amendments(&self) -> bool {
        self.versions.iter().any(|v| v.is_amendment)
    }

    /// Records a processing result. The first result becomes the original
    /// processed version; any later one is a reprocess.
    pub fn record_processed(&mut self, processed_url: String) -> &Version {
        let is_reprocess = self.is_processed();
        self.status = ImageStatus::Processed;
        self.push_version(processed_url, is_reprocess, false, None)
    }

    pub fn record_amendment(
        &mut self,
        processed_url: String,
        prompt: String,
    ) -> Result<&Version, StoreError> {
        if !self.is_processed() {
            return Err(StoreError::ImageNotProcessed(self.id.clone()));
        }
        self.status = ImageStatus::Amendment;
        Ok(self.push_version(processed_url, false, true, Some(prompt)))
    }

    fn push_version(
        &mut self,
        processed_url: String,
        is_reprocess: bool,
        is_amendment: bool,
        prompt: Option<String>,
    ) -> &Version {
        // Keep versions ordered by timestamp even if the clock steps back.
        let now = Utc::now();
        let timestamp = match self.versions.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        self.processed_url = Some(processed_url.clone());
        self.versions.push(Version {
            id: Uuid::new_v4().to_string(),
            processed_url,
            timestamp,
            is_reprocess,
            is_amendment,
            prompt,
        });
        &self.versions[self.versions.len() - 1]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: String,
    pub name: String,
    pub instructions: String,
    pub total_images: usize,
    pub processed_count: usize,
    pub progress: u8,
    pub status: BatchStatus,
    pub images: Vec<Image>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    pub fn new(id: String, instructions: String, images: Vec<Image>) -> Self {
        let short: String = id.chars().take(8).collect();
        let mut batch = Self {
            name: format!("Batch {}", short),
            id,
            instructions,
            total_images: images.len(),
            processed_count: 0,
            progress: 0,
            status: BatchStatus::Queued,
            images,
            created_at: Utc::now(),
            completed_at: None,
        };
        batch.recompute();
        batch
    }

    pub fn image(&self, image_id: &str) -> Option<&Image> {
        self.images.iter().find(|img| img.id == image_id)
    }

    pub fn image_mut(&mut self, image_id: &str) -> Option<&mut Image> {
        self.images.iter_mut().find(|img| img.id == image_id)
    }

    pub fn live_images(&self) -> impl Iterator<Item = &Image> {
        self.images.iter().filter(|img| img.is_live())
    }

    pub fn next_pending_mut(&mut self) -> Option<&mut Image> {
        self.images
            .iter_mut()
            .find(|img| img.status == ImageStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Recomputes counters, progress and status from image state.
    pub fn recompute(&mut self) {
        let live = self.live_images().count();
        let processed = self.live_images().filter(|img| img.is_processed()).count();
        self.total_images = self.images.len();
        self.processed_count = processed;
        self.progress = if live == 0 {
            0
        } else {
            ((processed * 100) / live) as u8
        };

        if self.status == BatchStatus::Failed {
            return;
        }
        if live > 0 && processed == live {
            self.status = BatchStatus::Completed;
            if self.completed_at.is_none() {
                self.completed_at = Some(Utc::now());
            }
        } else if processed > 0 {
            self.status = BatchStatus::Processing;
        }
    }

    pub fn fail(&mut self) {
        self.status = BatchStatus::Failed;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn to_order(&self) -> Order {
        let live: Vec<&Image> = self.live_images().collect();
        let failed_count = if self.status == BatchStatus::Failed {
            live.iter().filter(|img| !img.is_processed()).count()
        } else {
            0
        };
        Order {
            id: self.id.clone(),
            name: self.name.clone(),
            instructions: self.instructions.clone(),
            status: self.status,
            progress: self.progress,
            total_images: self.total_images,
            processed_count: self.processed_count,
            images: self.images.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
            approved_count: live
                .iter()
                .filter(|img| img.status == ImageStatus::Approved)
                .count(),
            retouch_count: live.iter().filter(|img| img.has_amendments()).count(),
            failed_count,
            tokens: self.images.iter().map(|img| img.versions.len() as u64).sum(),
            size: self.images.iter().map(|img| img.size).sum(),
        }
    }
}

/// Read model of a batch as shown on order pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub name: String,
    pub instructions: String,
    pub status: BatchStatus,
    pub progress: u8,
    pub total_images: usize,
    pub processed_count: usize,
    pub images: Vec<Image>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub approved_count: usize,
    pub retouch_count: usize,
    pub failed_count: usize,
    pub tokens: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActivityType {
    Upload,
    Process,
    Retouch,
    Approve,
    Delete,
    Export,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub action: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub user: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_with(n: usize) -> Batch {
        let images = (0..n)
            .map(|i| Image::pending(format!("img-{}", i), format!("{}.jpg", i), String::new(), 10))
            .collect();
        Batch::new("batch-123456789".into(), "remove background".into(), images)
    }

    #[test]
    fn new_batch_is_queued_with_zero_progress() {
        let batch = batch_with(3);
        assert_eq!(batch.status, BatchStatus::Queued);
        assert_eq!(batch.progress, 0);
        assert_eq!(batch.total_images, 3);
        assert_eq!(batch.name, "Batch batch-12");
    }

    #[test]
    fn first_result_is_original_and_later_ones_are_reprocesses() {
        let mut image = Image::pending("a".into(), "a.jpg".into(), String::new(), 0);
        image.record_processed("/p/1".into());
        image.record_processed("/p/2".into());
        image.record_amendment("/p/3".into(), "brighter".into()).unwrap();

        assert!(image.versions[0].is_original());
        assert_eq!(image.versions[0].label(), "Original Processed");
        assert!(image.versions[1].is_reprocess);
        assert!(image.versions[2].is_amendment);
        assert_eq!(image.status, ImageStatus::Amendment);
        assert_eq!(image.processed_url.as_deref(), Some("/p/3"));
        assert!(image
            .versions
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn amendment_requires_a_processed_image() {
        let mut image = Image::pending("a".into(), "a.jpg".into(), String::new(), 0);
        let err = image.record_amendment("/p".into(), "x".into()).unwrap_err();
        assert_eq!(err, StoreError::ImageNotProcessed("a".into()));
    }

    #[test]
    fn recompute_tracks_progress_and_completion() {
        let mut batch = batch_with(4);
        batch.images[0].record_processed("/p/0".into());
        batch.recompute();
        assert_eq!(batch.progress, 25);
        assert_eq!(batch.status, BatchStatus::Processing);

        batch.images[1].status = ImageStatus::Deleted;
        for img in batch.images.iter_mut().skip(2) {
            img.record_processed("/p".into());
        }
        batch.recompute();
        assert_eq!(batch.progress, 100);
        assert_eq!(batch.status, BatchStatus::Completed);
        assert!(batch.completed_at.is_some());
    }

    #[test]
    fn order_counts_reflect_image_state() {
        let mut batch = batch_with(3);
        batch.images[0].record_processed("/p/0".into());
        batch.images[0].status = ImageStatus::Approved;
        batch.images[1].record_processed("/p/1".into());
        batch.images[1]
            .record_amendment("/p/1b".into(), "crop".into())
            .unwrap();
        batch.fail();
        batch.recompute();

        let order = batch.to_order();
        assert_eq!(order.approved_count, 1);
        assert_eq!(order.retouch_count, 1);
        assert_eq!(order.failed_count, 1);
        assert_eq!(order.tokens, 3);
        assert_eq!(order.size, 30);
        assert_eq!(order.status, BatchStatus::Failed);
    }

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&BatchStatus::Processing).unwrap(), "\"processing\"");
        assert_eq!(ImageStatus::Amendment.to_string(), "amendment");
        assert_eq!("approved".parse::<ImageStatus>().unwrap(), ImageStatus::Approved);
    }
}
