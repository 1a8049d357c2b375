use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::entities::direct_transfer::DirectTransfer;
use crate::infrastructure::fs_atomic;

/// `data/direct_transfers/transfers.json`: `{transfers: [DirectTransfer]}`.
/// Payload files live alongside as `data/direct_transfers/{id}{ext}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TransfersFile {
    #[serde(default)]
    transfers: Vec<DirectTransfer>,
}

pub struct TransferStore {
    metadata_path: PathBuf,
    pub payload_dir: PathBuf,
}

impl TransferStore {
    pub fn new(data_dir: &Path) -> Self {
        let payload_dir = data_dir.join("direct_transfers");
        Self { metadata_path: payload_dir.join("transfers.json"), payload_dir }
    }

    pub async fn load(&self) -> Vec<DirectTransfer> {
        let file: TransfersFile = fs_atomic::read_json_or_default(&self.metadata_path).await;
        file.transfers
    }

    pub async fn save(&self, transfers: &[DirectTransfer]) -> std::io::Result<()> {
        fs_atomic::write_json_atomic(&self.metadata_path, &TransfersFile { transfers: transfers.to_vec() }).await
    }

    pub fn payload_path(&self, stored_filename: &str) -> PathBuf {
        self.payload_dir.join(stored_filename)
    }
}
