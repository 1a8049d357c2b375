use serde::{Deserialize, Serialize};

use super::permission::Permission;

/// A conjunctive policy atom: a request is allowed if any applicable rule
/// matches all of `who`, `allow`, `roots`, `paths`, and the rule-local IP
/// filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Username, or `"*"` for any authenticated principal.
    pub who: String,
    pub allow: Vec<Permission>,
    /// Share names this rule applies to, or `["*"]` for all configured shares.
    pub roots: Vec<String>,
    /// Path globs this rule applies to (see [`path_matches`]).
    pub paths: Vec<String>,
    #[serde(default = "default_ip_allow")]
    pub ip_allow: Vec<String>,
    #[serde(default)]
    pub ip_deny: Vec<String>,
}

fn default_ip_allow() -> Vec<String> {
    vec!["*".to_string()]
}

impl Rule {
    pub fn matches_who(&self, username: &str) -> bool {
        self.who == "*" || self.who == username
    }

    pub fn matches_permission(&self, perm: Permission) -> bool {
        self.allow.contains(&perm)
    }

    pub fn matches_share(&self, share_name: &str) -> bool {
        self.roots.iter().any(|r| r == "*" || r == share_name)
    }

    pub fn matches_path(&self, rel: &str) -> bool {
        self.paths.iter().any(|glob| path_matches(rel, glob))
    }

    /// The default rule synthesized for freshly registered dynamic users:
    /// full access to every share, from any IP.
    pub fn default_for_dynamic_user(username: &str) -> Self {
        Rule {
            who: username.to_string(),
            allow: vec![Permission::Read, Permission::Write, Permission::Delete],
            roots: vec!["*".to_string()],
            paths: vec!["/".to_string()],
            ip_allow: vec!["*".to_string()],
            ip_deny: Vec::new(),
        }
    }
}

/// Normalizes a path to a leading `/` with forward slashes, for comparison
/// purposes only (does not resolve `..` or decode percent-escapes — that is
/// the Path Resolver's job).
pub fn normalize_path(p: &str) -> String {
    let mut s = p.replace('\\', "/");
    if !s.starts_with('/') {
        s = format!("/{s}");
    }
    s
}

/// Path-glob semantics (spec.md §3):
/// a path `p` matches an entry `e` if:
/// - `e` is `"*"` or `"/*"`;
/// - `p == e`;
/// - `e` ends in `/` and `p` is a prefix-match under it;
/// - `p == e` or `p` starts with `e + "/"`.
pub fn path_matches(p: &str, e: &str) -> bool {
    if e == "*" || e == "/*" {
        return true;
    }
    let p = normalize_path(p);
    let e = normalize_path(e);
    if p == e {
        return true;
    }
    if e.ends_with('/') {
        return p.starts_with(&e);
    }
    let prefix = format!("{e}/");
    p.starts_with(&prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_everything() {
        assert!(path_matches("/a/b", "*"));
        assert!(path_matches("/a/b", "/*"));
    }

    #[test]
    fn exact_match() {
        assert!(path_matches("/a/b", "/a/b"));
        assert!(path_matches("a/b", "/a/b"));
    }

    #[test]
    fn prefix_with_trailing_slash() {
        assert!(path_matches("/a/b/c", "/a/"));
        assert!(path_matches("/a", "/a/"));
    }

    #[test]
    fn prefix_without_trailing_slash_requires_separator() {
        assert!(path_matches("/a/b", "/a"));
        assert!(!path_matches("/ab", "/a"));
    }

    #[test]
    fn no_match() {
        assert!(!path_matches("/x/y", "/a/b"));
    }
}
