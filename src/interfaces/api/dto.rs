use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::entities::file_info::FileInfo;

/// The `{code, msg, data}` envelope every `/api` response shares (spec.md §6).
/// `code == 0` is success.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub code: i32,
    pub msg: String,
    pub data: Value,
}

impl Envelope {
    pub fn ok(data: impl Serialize) -> Self {
        Self { code: 0, msg: "ok".to_string(), data: json!(data) }
    }

    pub fn ok_empty() -> Self {
        Self { code: 0, msg: "ok".to_string(), data: Value::Null }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub root: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Deserialize)]
pub struct MkdirRequest {
    pub root: String,
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub root: String,
    pub path: String,
    #[serde(rename = "newName")]
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub root: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: Vec<String>,
    pub failed: Vec<DeleteFailure>,
}

#[derive(Debug, Serialize)]
pub struct DeleteFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub root: String,
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub root: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub bytes_written: u64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirm: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub principal: String,
    pub roots: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminStatusResponse {
    pub shares: Vec<ShareStatus>,
    pub users: Vec<String>,
    pub custom_urls: Vec<String>,
    pub metrics: crate::application::services::metrics::MetricsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ShareStatus {
    pub name: String,
    pub quota: crate::application::services::quota_manager::QuotaStatus,
}

#[derive(Debug, Deserialize)]
pub struct QuotaRequest {
    #[serde(default)]
    pub quota: Option<i64>,
    #[serde(rename = "quotaBytes", default)]
    pub quota_bytes: Option<i64>,
}

impl QuotaRequest {
    pub fn resolved(&self) -> Option<i64> {
        self.quota_bytes.or(self.quota)
    }
}

#[derive(Debug, Deserialize)]
pub struct CustomUrlsRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminUsersResponse {
    pub users: Vec<AdminUserEntry>,
}

#[derive(Debug, Serialize)]
pub struct AdminUserEntry {
    pub name: String,
    pub dynamic: bool,
}

#[derive(Debug, Deserialize)]
pub struct DirectTransferSendRequest {
    pub recipient: String,
    #[serde(rename = "expiresIn", default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DirectTransferCreatedResponse {
    pub id: String,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub struct DirectTransferListQuery {
    pub direction: String,
}

#[derive(Debug, Serialize)]
pub struct DirectTransferListResponse {
    pub transfers: Vec<crate::domain::entities::direct_transfer::DirectTransfer>,
}

#[derive(Debug, Serialize)]
pub struct DirectTransferDeleteResponse {
    pub action: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RecipientsResponse {
    pub recipients: Vec<String>,
}
