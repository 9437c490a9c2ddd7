use std::collections::BTreeSet;

use log::debug;
use strum_macros::Display;

use crate::api::{ExportRequest, ExportType, RetouchResponse};
use crate::error::{ActionError, StoreError};
use crate::model::{ActivityType, Batch, BatchStatus, Version};
use crate::store::BatchStore;

/// Cadence of status polling while a batch is not terminal.
pub const POLL_INTERVAL_MS: u32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum ActionKind {
    Retouch,
    Export,
    SendToDam,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    pub deleted: usize,
    pub locked: usize,
}

/// UI state of one batch's processing page: selection, running actions and
/// the last status seen while polling.
#[derive(Debug, Clone, Default)]
pub struct ProcessingView {
    batch_id: String,
    selected: BTreeSet<String>,
    running: BTreeSet<ActionKind>,
    last_status: Option<BatchStatus>,
}

impl ProcessingView {
    pub fn new(batch_id: &str) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            ..Self::default()
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    pub fn is_selected(&self, image_id: &str) -> bool {
        self.selected.contains(image_id)
    }

    /// Returns whether the image is selected afterwards.
    pub fn toggle(&mut self, image_id: &str) -> bool {
        if self.selected.remove(image_id) {
            false
        } else {
            self.selected.insert(image_id.to_string());
            true
        }
    }

    pub fn select_all(&mut self, batch: &Batch) {
        self.selected = batch.live_images().map(|img| img.id.clone()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Drops selected ids that are gone or deleted.
    pub fn prune(&mut self, batch: &Batch) {
        self.selected
            .retain(|id| batch.image(id).map(|img| img.is_live()).unwrap_or(false));
    }

    pub fn begin(&mut self, kind: ActionKind) -> Result<(), ActionError> {
        if !self.running.insert(kind) {
            return Err(ActionError::AlreadyRunning(kind.to_string()));
        }
        Ok(())
    }

    pub fn finish(&mut self, kind: ActionKind) {
        self.running.remove(&kind);
    }

    pub fn is_running(&self, kind: ActionKind) -> bool {
        self.running.contains(&kind)
    }

    pub fn should_poll(&self, batch: &Batch) -> bool {
        !batch.is_terminal()
    }

    /// Records a polled status. Returns true when it differs from the last one.
    pub fn observe_status(&mut self, status: BatchStatus) -> bool {
        let changed = self.last_status != Some(status);
        self.last_status = Some(status);
        changed
    }

    /// Whether a poll should be followed by a results fetch: the status
    /// moved, the batch is not in the store yet, or an image finished.
    pub fn needs_results(changed: bool, known: bool, progressed: bool) -> bool {
        changed || !known || progressed
    }

    /// Approves every selected image that can be approved and clears the
    /// selection. Returns how many were approved.
    pub fn approve_selected(&mut self, store: &mut BatchStore, user: &str) -> usize {
        let mut approved = 0;
        for id in std::mem::take(&mut self.selected) {
            match store.approve_image(&id) {
                Ok(()) => approved += 1,
                Err(e) => debug!("Skipping approval of {}: {}", id, e),
            }
        }
        if approved > 0 {
            store.add_log(
                ActivityType::Approve,
                "Approved images",
                &format!("{} image(s) approved in batch {}", approved, self.batch_id),
                user,
            );
        }
        approved
    }

    /// Deletes the selection. Approved images are locked and stay selected.
    pub fn delete_selected(&mut self, store: &mut BatchStore, user: &str) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        let mut kept = BTreeSet::new();
        for id in std::mem::take(&mut self.selected) {
            match store.delete_image(&id) {
                Ok(()) => outcome.deleted += 1,
                Err(StoreError::ImageLocked(_)) => {
                    outcome.locked += 1;
                    kept.insert(id);
                }
                Err(e) => debug!("Skipping deletion of {}: {}", id, e),
            }
        }
        self.selected = kept;
        if outcome.deleted > 0 {
            store.add_log(
                ActivityType::Delete,
                "Deleted images",
                &format!("{} image(s) deleted from batch {}", outcome.deleted, self.batch_id),
                user,
            );
        }
        outcome
    }

    /// Processed URLs of the selection, or of every processed image when
    /// nothing is selected.
    pub fn download_targets(&self, batch: &Batch) -> Vec<String> {
        batch
            .live_images()
            .filter(|img| self.selected.is_empty() || self.selected.contains(&img.id))
            .filter_map(|img| img.processed_url.clone())
            .collect()
    }

    pub fn record_retouch(
        &self,
        store: &mut BatchStore,
        image_id: &str,
        response: &RetouchResponse,
        prompt: &str,
        user: &str,
    ) -> Result<Version, StoreError> {
        let version =
            store.retouch_image(image_id, response.processed_url.clone(), prompt.to_string())?;
        store.add_log(
            ActivityType::Retouch,
            "Requested retouch",
            &format!("{}: {}", image_id, prompt),
            user,
        );
        Ok(version)
    }

    /// Download export of every image still live in this client. The server
    /// never sees local deletions, so the ids travel with the request.
    pub fn export_request(&self, batch: &Batch) -> ExportRequest {
        ExportRequest {
            batch_id: self.batch_id.clone(),
            export_type: ExportType::Download,
            dam_url: None,
            image_ids: Some(batch.live_images().map(|img| img.id.clone()).collect()),
        }
    }

    pub fn record_export(
        &self,
        store: &mut BatchStore,
        export_type: ExportType,
        count: usize,
        user: &str,
    ) {
        let batch_id = &self.batch_id;
        let description = match export_type {
            ExportType::Download => {
                format!("Downloaded {} image(s) from batch {}", count, batch_id)
            }
            ExportType::Dam => format!("Sent {} image(s) from batch {} to DAM", count, batch_id),
        };
        store.add_log(ActivityType::Export, "Exported images", &description, user);
    }
}
