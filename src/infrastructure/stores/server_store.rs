use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::infrastructure::fs_atomic;

/// `data/server.json`: `{custom_urls: [string]}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ServerFile {
    #[serde(default)]
    custom_urls: Vec<String>,
}

pub struct ServerStore {
    path: PathBuf,
}

impl ServerStore {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("server.json") }
    }

    pub async fn load(&self) -> Vec<String> {
        let file: ServerFile = fs_atomic::read_json_or_default(&self.path).await;
        file.custom_urls
    }

    pub async fn set_custom_urls(&self, urls: Vec<String>) -> std::io::Result<()> {
        let mut deduped = Vec::new();
        for u in urls {
            if !deduped.contains(&u) {
                deduped.push(u);
            }
        }
        fs_atomic::write_json_atomic(&self.path, &ServerFile { custom_urls: deduped }).await
    }
}
