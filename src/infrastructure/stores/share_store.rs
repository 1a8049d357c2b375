use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::infrastructure::fs_atomic;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ShareOverride {
    pub quota_bytes: Option<i64>,
}

/// `data/shares.json`: `{shares: {name: {quota_bytes: int}}}`. Per-share
/// quota overrides written by `PUT /api/admin/shares/{name}/quota`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SharesFile {
    #[serde(default)]
    shares: HashMap<String, ShareOverride>,
}

pub struct ShareStore {
    path: PathBuf,
}

impl ShareStore {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("shares.json") }
    }

    pub async fn load(&self) -> HashMap<String, ShareOverride> {
        let file: SharesFile = fs_atomic::read_json_or_default(&self.path).await;
        file.shares
    }

    /// `0` or `None` clears the override.
    pub async fn set_quota(&self, share_name: &str, quota_bytes: Option<i64>) -> std::io::Result<()> {
        let mut file: SharesFile = fs_atomic::read_json_or_default(&self.path).await;
        match quota_bytes.filter(|q| *q > 0) {
            Some(q) => {
                file.shares.insert(share_name.to_string(), ShareOverride { quota_bytes: Some(q) });
            }
            None => {
                file.shares.remove(share_name);
            }
        }
        fs_atomic::write_json_atomic(&self.path, &file).await
    }
}
