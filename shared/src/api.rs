use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::model::BatchStatus;

pub mod endpoints {
    pub const UPLOAD: &str = "/api/upload";
    pub const EXPORT: &str = "/api/export";
    pub const DAM_UPLOAD: &str = "/api/dam/upload";
    pub const DAM_SYSTEMS: &str = "/api/dam/systems";
    pub const DAM_CONNECTIONS: &str = "/api/dam/connections";
    pub const DAM_CONNECTION_TEST: &str = "/api/dam/connections/test";
    pub const DAM_CONNECTION_STATUS: &str = "/api/dam/connections/status";

    pub fn status(batch_id: &str) -> String {
        format!("/api/status/{}", batch_id)
    }

    pub fn retouch(image_id: &str) -> String {
        format!("/api/retouch/{}", image_id)
    }

    pub fn results(batch_id: &str) -> String {
        format!("/api/results/{}", batch_id)
    }

    pub fn dam_systems(only_active: bool) -> String {
        format!("{}?onlyActive={}", DAM_SYSTEMS, only_active)
    }

    pub fn image(key: &str) -> String {
        format!("/api/images/{}", key)
    }
}

/// Multipart field names accepted by the upload endpoint.
pub mod upload_fields {
    pub const IMAGES: &str = "images";
    pub const INSTRUCTIONS: &str = "instructions";
    pub const INSTRUCTION_FILE: &str = "instructionFile";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub batch_id: String,
    pub message: String,
    pub image_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub progress: u8,
    pub status: BatchStatus,
    #[serde(default)]
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetouchRequest {
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetouchResponse {
    pub success: bool,
    pub processed_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportType {
    Download,
    Dam,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub batch_id: String,
    #[serde(rename = "type")]
    pub export_type: ExportType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dam_url: Option<String>,
    /// Restricts the export to these images. Deletions only exist on the
    /// client, so it sends the ids it still considers live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub success: bool,
    pub exported: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_urls: Option<Vec<String>>,
}

/// Target of a DAM delivery, selected explicitly by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamConfig {
    pub connection_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamUploadRequest {
    pub image_ids: Vec<String>,
    pub dam_config: DamConfig,
    pub batch_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamUploadResponse {
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConnectionStatusRequest {
    pub connection_id: String,
    pub is_active: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
}
