use std::net::IpAddr;

use base64::Engine;
use tracing::warn;

use crate::common::errors::DomainError;
use crate::domain::entities::user::{Principal, User};
use crate::infrastructure::config_store::ConfigSnapshot;

/// Verifies HTTP Basic credentials and local-admin access (spec.md §4.7).
/// Holds no state of its own; every check reads straight off the
/// [`ConfigSnapshot`] handed in by the caller.
pub struct AuthService;

impl AuthService {
    pub fn new() -> Self {
        Self
    }

    /// Parses an `Authorization: Basic <base64>` header value and verifies
    /// the credentials against `snapshot.users`. Returns the authenticated
    /// [`Principal`] or `None` if the header is missing, malformed, or the
    /// credentials don't match. Bcrypt users are checked with `bcrypt::verify`;
    /// everyone else is checked in constant time against the stored password.
    pub fn authenticate(&self, snapshot: &ConfigSnapshot, header: Option<&str>) -> Option<Principal> {
        let header = header?;
        let encoded = header.strip_prefix("Basic ")?;
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (name, password) = decoded.split_once(':')?;

        let user = snapshot.user(name)?;
        if self.verify_password(user, password) {
            Some(Principal::from(user))
        } else {
            None
        }
    }

    fn verify_password(&self, user: &User, candidate: &str) -> bool {
        if user.is_bcrypt {
            bcrypt::verify(candidate, &user.pass_hash).unwrap_or_else(|e| {
                warn!(user = %user.name, error = %e, "bcrypt verification failed");
                false
            })
        } else {
            constant_time_eq(candidate.as_bytes(), user.pass_hash.as_bytes())
        }
    }

    /// True only for requests originating from loopback, regardless of
    /// credentials (spec.md §4.7: admin endpoints are local-only).
    pub fn is_local_admin(&self, ip: IpAddr) -> bool {
        ip.is_loopback()
    }

    pub fn require_local_admin(&self, ip: IpAddr) -> Result<(), DomainError> {
        if self.is_local_admin(ip) {
            Ok(())
        } else {
            Err(DomainError::forbidden("auth_service", "admin endpoints are local-only"))
        }
    }
}

impl Default for AuthService {
    fn default() -> Self {
        Self::new()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::rule::Rule;
    use crate::infrastructure::config_store::{ConcurrencyConfig, GlobalIpFilterConfig, HotReloadConfig, RateLimitConfig, WebDavConfig};

    fn snapshot_with(users: Vec<User>) -> ConfigSnapshot {
        ConfigSnapshot {
            host: "0.0.0.0".into(),
            port: 8080,
            registration_enabled: true,
            max_upload_size: None,
            shares: Vec::new(),
            users,
            rules: Vec::<Rule>::new(),
            rate_limit: RateLimitConfig { rps: 50.0, burst: 100.0 },
            concurrency: ConcurrencyConfig { max_concurrent: 64 },
            ip_filter: GlobalIpFilterConfig::default(),
            webdav: WebDavConfig { mount_path: "/webdav".into(), lock_system_enabled: false },
            hot_reload: HotReloadConfig { enabled: false, debounce_ms: 1000 },
            custom_urls: Vec::new(),
        }
    }

    fn basic_header(name: &str, pass: &str) -> String {
        let raw = format!("{name}:{pass}");
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw))
    }

    #[test]
    fn plaintext_user_authenticates() {
        let snapshot = snapshot_with(vec![User::static_user("alice", "secret", false)]);
        let auth = AuthService::new();
        let header = basic_header("alice", "secret");
        let principal = auth.authenticate(&snapshot, Some(&header));
        assert_eq!(principal.unwrap().name, "alice");
    }

    #[test]
    fn wrong_password_is_rejected() {
        let snapshot = snapshot_with(vec![User::static_user("alice", "secret", false)]);
        let auth = AuthService::new();
        let header = basic_header("alice", "wrong");
        assert!(auth.authenticate(&snapshot, Some(&header)).is_none());
    }

    #[test]
    fn missing_header_is_rejected() {
        let snapshot = snapshot_with(vec![]);
        let auth = AuthService::new();
        assert!(auth.authenticate(&snapshot, None).is_none());
    }

    #[test]
    fn unknown_user_is_rejected() {
        let snapshot = snapshot_with(vec![User::static_user("alice", "secret", false)]);
        let auth = AuthService::new();
        let header = basic_header("bob", "secret");
        assert!(auth.authenticate(&snapshot, Some(&header)).is_none());
    }

    #[test]
    fn bcrypt_user_authenticates() {
        let hash = bcrypt::hash("hunter2", bcrypt::DEFAULT_COST).unwrap();
        let snapshot = snapshot_with(vec![User::static_user("alice", hash, true)]);
        let auth = AuthService::new();
        let header = basic_header("alice", "hunter2");
        assert!(auth.authenticate(&snapshot, Some(&header)).is_some());
    }

    #[test]
    fn loopback_is_local_admin() {
        let auth = AuthService::new();
        assert!(auth.is_local_admin("127.0.0.1".parse().unwrap()));
        assert!(!auth.is_local_admin("10.0.0.1".parse().unwrap()));
    }
}
