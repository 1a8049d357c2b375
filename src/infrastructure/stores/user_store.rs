use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::entities::user::User;
use crate::infrastructure::fs_atomic;

/// `data/users.json`: `{users: [{name, pass_hash, is_bcrypt, rules: [...]}]}`.
/// Append-only from the registration path; admin delete removes an entry.
#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<User>,
}

pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("users.json") }
    }

    pub async fn load(&self) -> Vec<User> {
        let file: UsersFile = fs_atomic::read_json_or_default(&self.path).await;
        file.users.into_iter().map(|mut u| {
            u.dynamic = true;
            u
        }).collect()
    }

    pub async fn append(&self, user: User) -> std::io::Result<()> {
        let mut file: UsersFile = fs_atomic::read_json_or_default(&self.path).await;
        file.users.retain(|u| u.name != user.name);
        file.users.push(user);
        fs_atomic::write_json_atomic(&self.path, &file).await
    }

    /// Removes a dynamic user and their rule entries. Returns `true` if a
    /// user was actually removed.
    pub async fn remove(&self, username: &str) -> std::io::Result<bool> {
        let mut file: UsersFile = fs_atomic::read_json_or_default(&self.path).await;
        let before = file.users.len();
        file.users.retain(|u| u.name != username);
        let removed = file.users.len() != before;
        if removed {
            fs_atomic::write_json_atomic(&self.path, &file).await?;
        }
        Ok(removed)
    }
}
