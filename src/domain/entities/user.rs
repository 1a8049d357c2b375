use serde::{Deserialize, Serialize};

use super::rule::Rule;

/// A registered principal. Source is either the static YAML config or the
/// dynamic-user store (`data/users.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub pass_hash: String,
    pub is_bcrypt: bool,
    /// Rules synthesized for this user (dynamic users carry their default
    /// rule here; static users' rules live in the main rule list instead).
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// True for users created via `/api/register` and persisted in
    /// `data/users.json`; static users loaded from `chfs.yaml` are never
    /// dynamic and cannot be removed by the admin API.
    #[serde(default)]
    pub dynamic: bool,
}

impl User {
    pub fn static_user(name: impl Into<String>, pass_hash: impl Into<String>, is_bcrypt: bool) -> Self {
        Self {
            name: name.into(),
            pass_hash: pass_hash.into(),
            is_bcrypt,
            rules: Vec::new(),
            dynamic: false,
        }
    }
}

/// An authenticated principal attached to a request, distinct from the
/// stored [`User`] record (no password material travels past auth).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
}

impl From<&User> for Principal {
    fn from(u: &User) -> Self {
        Principal { name: u.name.clone() }
    }
}
