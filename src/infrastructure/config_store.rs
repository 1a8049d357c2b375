use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::common::errors::{DomainError, ErrorKind};
use crate::domain::entities::rule::Rule;
use crate::domain::entities::share::Share;
use crate::domain::entities::user::User;
use crate::infrastructure::stores::{server_store::ServerStore, share_store::ShareStore, user_store::UserStore};

/// Raw deserialization target for `chfs.yaml`. Kept separate from
/// [`ConfigSnapshot`] because the snapshot also folds in the dynamic-user
/// and share-override stores (spec.md §4.6).
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    shares: Vec<RawShare>,
    #[serde(default)]
    users: Vec<RawUser>,
    #[serde(default)]
    rules: Vec<Rule>,
    #[serde(default)]
    rate_limit: RateLimitConfig,
    #[serde(default)]
    concurrency: ConcurrencyConfig,
    #[serde(default)]
    ip_filter: GlobalIpFilterConfig,
    #[serde(default)]
    webdav: WebDavConfig,
    #[serde(default)]
    hot_reload: HotReloadConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct RawServer {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    registration_enabled: Option<bool>,
    /// Ceiling applied to both `/api/upload` and `/direct-transfer/send`
    /// payloads; `None` means unbounded.
    #[serde(default)]
    max_upload_size: Option<u64>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for RawServer {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), registration_enabled: None, max_upload_size: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawShare {
    name: String,
    path: PathBuf,
    #[serde(default)]
    quota_bytes: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawUser {
    name: String,
    pass_hash: String,
    #[serde(default)]
    is_bcrypt: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rps")]
    pub rps: f64,
    #[serde(default = "default_burst")]
    pub burst: f64,
}

fn default_rps() -> f64 {
    50.0
}
fn default_burst() -> f64 {
    100.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { rps: default_rps(), burst: default_burst() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_concurrent() -> usize {
    64
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { max_concurrent: default_max_concurrent() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalIpFilterConfig {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebDavConfig {
    #[serde(default = "default_webdav_mount")]
    pub mount_path: String,
    #[serde(default)]
    pub lock_system_enabled: bool,
}

fn default_webdav_mount() -> String {
    "/webdav".to_string()
}

impl Default for WebDavConfig {
    fn default() -> Self {
        Self { mount_path: default_webdav_mount(), lock_system_enabled: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotReloadConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    1000
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self { enabled: false, debounce_ms: default_debounce_ms() }
    }
}

/// Immutable per-load snapshot. Ownership: the [`ConfigStore`] exclusively
/// owns the current snapshot; consumers receive `Arc<ConfigSnapshot>`
/// references and read them once per request (spec.md §3, §5).
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub host: String,
    pub port: u16,
    pub registration_enabled: bool,
    pub max_upload_size: Option<u64>,
    pub shares: Vec<Share>,
    pub users: Vec<User>,
    pub rules: Vec<Rule>,
    pub rate_limit: RateLimitConfig,
    pub concurrency: ConcurrencyConfig,
    pub ip_filter: GlobalIpFilterConfig,
    pub webdav: WebDavConfig,
    pub hot_reload: HotReloadConfig,
    pub custom_urls: Vec<String>,
}

impl ConfigSnapshot {
    pub fn share(&self, name: &str) -> Option<&Share> {
        self.shares.iter().find(|s| s.name == name)
    }

    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn share_names(&self) -> Vec<String> {
        self.shares.iter().map(|s| s.name.clone()).collect()
    }
}

type ChangeCallback = Box<dyn Fn(&ConfigSnapshot, &ConfigSnapshot) + Send + Sync>;

/// Owns the current config snapshot exclusively; dynamic-user and
/// share-override writers call into it (never the reverse — see
/// DESIGN.md's note on inverting the source's config<->stores cycle).
pub struct ConfigStore {
    yaml_path: PathBuf,
    data_dir: PathBuf,
    current: RwLock<Arc<ConfigSnapshot>>,
    callbacks: Mutex<Vec<ChangeCallback>>,
    user_store: UserStore,
    share_store: ShareStore,
    server_store: ServerStore,
}

impl ConfigStore {
    pub async fn load(yaml_path: PathBuf, data_dir: PathBuf) -> Result<Arc<Self>, DomainError> {
        std::fs::create_dir_all(&data_dir).map_err(DomainError::from)?;
        let user_store = UserStore::new(&data_dir);
        let share_store = ShareStore::new(&data_dir);
        let server_store = ServerStore::new(&data_dir);

        let snapshot = build_snapshot(&yaml_path, &user_store, &share_store, &server_store).await?;

        Ok(Arc::new(Self {
            yaml_path,
            data_dir,
            current: RwLock::new(Arc::new(snapshot)),
            callbacks: Mutex::new(Vec::new()),
            user_store,
            share_store,
            server_store,
        }))
    }

    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.current.read().expect("config lock poisoned").clone()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn on_change(&self, cb: impl Fn(&ConfigSnapshot, &ConfigSnapshot) + Send + Sync + 'static) {
        self.callbacks.lock().expect("config lock poisoned").push(Box::new(cb));
    }

    /// Reloads from disk. On parse failure the previous snapshot is
    /// retained and the error is logged, never surfaced to callers
    /// (spec.md §4.6).
    pub async fn reload(&self) {
        match build_snapshot(&self.yaml_path, &self.user_store, &self.share_store, &self.server_store).await {
            Ok(new_snapshot) => {
                let old = self.current();
                let new = Arc::new(new_snapshot);
                *self.current.write().expect("config lock poisoned") = new.clone();
                for cb in self.callbacks.lock().expect("config lock poisoned").iter() {
                    cb(&old, &new);
                }
                info!("config reloaded");
            }
            Err(e) => {
                error!(error = %e.message, "config reload failed, retaining previous snapshot");
            }
        }
    }

    pub async fn register_dynamic_user(&self, user: User) -> Result<(), DomainError> {
        self.user_store
            .append(user)
            .await
            .map_err(|e| DomainError::internal_error("config_store", e.to_string()))?;
        self.reload().await;
        Ok(())
    }

    /// Admin delete: removes a dynamic user and their rule entries. Static
    /// users (not present in `users.json`) cannot be removed.
    pub async fn remove_dynamic_user(&self, username: &str) -> Result<bool, DomainError> {
        let removed = self
            .user_store
            .remove(username)
            .await
            .map_err(|e| DomainError::internal_error("config_store", e.to_string()))?;
        if removed {
            self.reload().await;
        }
        Ok(removed)
    }

    pub async fn set_share_quota(&self, share_name: &str, quota_bytes: Option<i64>) -> Result<(), DomainError> {
        if self.current().share(share_name).is_none() {
            return Err(DomainError::not_found("config_store", format!("unknown share '{share_name}'")));
        }
        self.share_store
            .set_quota(share_name, quota_bytes)
            .await
            .map_err(|e| DomainError::internal_error("config_store", e.to_string()))?;
        self.reload().await;
        Ok(())
    }

    pub async fn set_custom_urls(&self, urls: Vec<String>) -> Result<(), DomainError> {
        for url in &urls {
            let parsed = url::Url::parse(url).map_err(|_| DomainError::bad_request("config_store", "invalid URL"))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(DomainError::bad_request("config_store", "URL scheme must be http or https"));
            }
        }
        self.server_store
            .set_custom_urls(urls)
            .await
            .map_err(|e| DomainError::internal_error("config_store", e.to_string()))?;
        self.reload().await;
        Ok(())
    }

    /// Spawns a dedicated worker thread watching the YAML's parent
    /// directory, debounced by `hot_reload.debounce_ms`, that triggers
    /// `reload()` through a tokio handle. Running the filesystem watcher on
    /// its own thread (rather than mixing a sync watcher into async
    /// handlers) is the REDESIGN FLAGS-mandated fix for the source's
    /// uneasy sync/async mix.
    pub fn spawn_hot_reload(self: &Arc<Self>, handle: tokio::runtime::Handle) {
        let store = self.clone();
        let watch_dir = self
            .yaml_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let debounce = Duration::from_millis(self.current().hot_reload.debounce_ms);
        let yaml_path = self.yaml_path.clone();

        std::thread::spawn(move || {
            let (tx, rx) = std::sync::mpsc::channel();
            let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            }) {
                Ok(w) => w,
                Err(e) => {
                    error!(error = %e, "failed to start config watcher");
                    return;
                }
            };
            if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
                error!(error = %e, "failed to watch config directory");
                return;
            }

            loop {
                let Ok(event) = rx.recv() else { break };
                if !event.paths.iter().any(|p| p == &yaml_path) {
                    continue;
                }
                // Debounce: drain any further events that arrive within the window.
                while rx.recv_timeout(debounce).is_ok() {}
                info!("config file changed, reloading");
                let store = store.clone();
                handle.spawn(async move { store.reload().await });
            }
            warn!("config watcher thread exiting");
        });
    }
}

async fn build_snapshot(
    yaml_path: &Path,
    user_store: &UserStore,
    share_store: &ShareStore,
    server_store: &ServerStore,
) -> Result<ConfigSnapshot, DomainError> {
    let yaml_bytes = tokio::fs::read(yaml_path)
        .await
        .map_err(|e| DomainError::new(ErrorKind::InternalError, "config", format!("cannot read {}: {e}", yaml_path.display())))?;
    let raw: RawConfig = serde_yaml::from_slice(&yaml_bytes)
        .map_err(|e| DomainError::new(ErrorKind::InternalError, "config", format!("invalid YAML: {e}")))?;

    let overrides = share_store.load().await;
    let shares: Vec<Share> = raw
        .shares
        .iter()
        .map(|s| {
            let quota = overrides.get(&s.name).and_then(|o| o.quota_bytes).or(s.quota_bytes);
            Share::new(&s.name, s.path.clone(), quota)
        })
        .collect();

    let mut users: Vec<User> = raw
        .users
        .iter()
        .map(|u| User::static_user(&u.name, &u.pass_hash, u.is_bcrypt))
        .collect();

    let mut rules = raw.rules.clone();

    for dynamic_user in user_store.load().await {
        rules.push(Rule::default_for_dynamic_user(&dynamic_user.name));
        users.push(dynamic_user);
    }

    let custom_urls = server_store.load().await;

    Ok(ConfigSnapshot {
        host: raw.server.host,
        port: raw.server.port,
        registration_enabled: raw.server.registration_enabled.unwrap_or(true),
        max_upload_size: raw.server.max_upload_size,
        shares,
        users,
        rules,
        rate_limit: raw.rate_limit,
        concurrency: raw.concurrency,
        ip_filter: raw.ip_filter,
        webdav: raw.webdav,
        hot_reload: raw.hot_reload,
        custom_urls,
    })
}
