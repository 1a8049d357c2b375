use std::sync::Arc;

use tokio::sync::{RwLock, Semaphore};

use crate::application::services::auth_service::AuthService;
use crate::application::services::direct_transfer_service::DirectTransferService;
use crate::application::services::metrics::Metrics;
use crate::application::services::quota_manager::QuotaManager;
use crate::application::services::rate_limiter::TokenBucket;
use crate::application::services::storage_gateway::StorageGateway;
use crate::infrastructure::config_store::ConfigStore;

/// Everything a handler or middleware layer needs, shared behind `Arc` and
/// cheap to clone per spec.md §5's "config snapshot read once per request"
/// discipline: `config` is read fresh on every access, while the rate
/// limiter and concurrency semaphore are swapped out wholesale on a config
/// change (§4.8) rather than mutated in place.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub storage: Arc<StorageGateway>,
    pub quota: Arc<QuotaManager>,
    pub auth: Arc<AuthService>,
    pub transfers: Arc<DirectTransferService>,
    pub metrics: Arc<Metrics>,
    pub rate_limiter: Arc<RwLock<Arc<TokenBucket>>>,
    pub concurrency: Arc<RwLock<Arc<Semaphore>>>,
}

impl AppState {
    pub fn new(config: Arc<ConfigStore>, transfers: DirectTransferService) -> Self {
        let snapshot = config.current();
        let quota = Arc::new(QuotaManager::new());
        let bucket = TokenBucket::new(snapshot.rate_limit.burst, snapshot.rate_limit.rps);
        let semaphore = Semaphore::new(snapshot.concurrency.max_concurrent);

        Self {
            config,
            storage: Arc::new(StorageGateway::new(quota.clone())),
            quota,
            auth: Arc::new(AuthService::new()),
            transfers: Arc::new(transfers),
            metrics: Arc::new(Metrics::new()),
            rate_limiter: Arc::new(RwLock::new(Arc::new(bucket))),
            concurrency: Arc::new(RwLock::new(Arc::new(semaphore))),
        }
    }

    /// Wired to `ConfigStore::on_change`: replaces the rate limiter and
    /// concurrency semaphore wholesale, never mutating the old ones in
    /// place. Existing semaphore permit holders keep their permits and
    /// release into the old (now-orphaned) semaphore, draining naturally.
    pub async fn apply_config_change(&self, new: &crate::infrastructure::config_store::ConfigSnapshot) {
        let bucket = TokenBucket::new(new.rate_limit.burst, new.rate_limit.rps);
        *self.rate_limiter.write().await = Arc::new(bucket);

        let semaphore = Semaphore::new(new.concurrency.max_concurrent);
        *self.concurrency.write().await = Arc::new(semaphore);
    }
}
