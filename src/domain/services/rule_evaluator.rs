use std::net::IpAddr;

use crate::domain::entities::permission::{Operation, Permission};
use crate::domain::entities::rule::Rule;

use super::ip_filter;

/// Reason a request was denied; also doubles as the reason a particular
/// rule failed to match, so the evaluator can report the last failure when
/// nothing matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    AuthRequired,
    NoRule,
    OperationNotAllowed,
    ShareNotAllowed,
    PathNotAllowed,
    IpNotAllowed,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::AuthRequired => "AUTH_REQUIRED",
            DenyReason::NoRule => "NO_RULE",
            DenyReason::OperationNotAllowed => "OPERATION_NOT_ALLOWED",
            DenyReason::ShareNotAllowed => "SHARE_NOT_ALLOWED",
            DenyReason::PathNotAllowed => "PATH_NOT_ALLOWED",
            DenyReason::IpNotAllowed => "IP_NOT_ALLOWED",
        }
    }
}

/// Maps (principal, operation, share, path, origin) -> allow/deny with
/// reason (spec.md §4.3). `rules` should already be the full, merged rule
/// set (static rules plus dynamic users' synthesized rules).
pub fn evaluate(
    rules: &[Rule],
    username: Option<&str>,
    op: Operation,
    share: &str,
    rel: &str,
    ip: IpAddr,
) -> Result<(), DenyReason> {
    let username = username.ok_or(DenyReason::AuthRequired)?;
    let perm = op.required_permission();

    let mut last_reason = DenyReason::NoRule;
    let mut any_rule_for_user = false;

    for rule in rules.iter().filter(|r| r.matches_who(username)) {
        any_rule_for_user = true;
        if !rule.matches_permission(perm) {
            last_reason = DenyReason::OperationNotAllowed;
            continue;
        }
        if !rule.matches_share(share) {
            last_reason = DenyReason::ShareNotAllowed;
            continue;
        }
        if !rule.matches_path(rel) {
            last_reason = DenyReason::PathNotAllowed;
            continue;
        }
        if !ip_filter::check(ip, &rule.ip_allow, &rule.ip_deny) {
            last_reason = DenyReason::IpNotAllowed;
            continue;
        }
        return Ok(());
    }

    if !any_rule_for_user {
        last_reason = DenyReason::NoRule;
    }
    Err(last_reason)
}

/// The union of `roots` across rules matching `username` and `ip` (ignoring
/// the operation/path dimensions, per spec.md §4.3's `accessible_roots`).
/// If `"*"` appears in any matching rule, the result is intersected with
/// `configured_shares`.
pub fn accessible_roots(
    rules: &[Rule],
    username: &str,
    ip: IpAddr,
    configured_shares: &[String],
) -> Vec<String> {
    let mut saw_wildcard = false;
    let mut roots: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();

    for rule in rules.iter().filter(|r| r.matches_who(username)) {
        if !ip_filter::check(ip, &rule.ip_allow, &rule.ip_deny) {
            continue;
        }
        for root in &rule.roots {
            if root == "*" {
                saw_wildcard = true;
            } else {
                roots.insert(root.clone());
            }
        }
    }

    if saw_wildcard {
        for s in configured_shares {
            roots.insert(s.clone());
        }
    }

    roots.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::permission::Operation;

    fn rule(who: &str, allow: Vec<Permission>, roots: &[&str], paths: &[&str]) -> Rule {
        Rule {
            who: who.to_string(),
            allow,
            roots: roots.iter().map(|s| s.to_string()).collect(),
            paths: paths.iter().map(|s| s.to_string()).collect(),
            ip_allow: vec!["*".to_string()],
            ip_deny: vec![],
        }
    }

    #[test]
    fn nil_user_denies() {
        let rules = vec![rule("*", vec![Permission::Read], &["*"], &["/*"])];
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        assert_eq!(
            evaluate(&rules, None, Operation::List, "pub", "/", ip),
            Err(DenyReason::AuthRequired)
        );
    }

    #[test]
    fn matching_rule_allows() {
        let rules = vec![rule("alice", vec![Permission::Read, Permission::Write, Permission::Delete], &["pub"], &["/"])];
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        assert_eq!(evaluate(&rules, Some("alice"), Operation::List, "pub", "/a/b", ip), Ok(()));
    }

    #[test]
    fn no_matching_rule_denies_with_no_rule() {
        let rules: Vec<Rule> = vec![];
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        assert_eq!(
            evaluate(&rules, Some("bob"), Operation::List, "pub", "/", ip),
            Err(DenyReason::NoRule)
        );
    }

    #[test]
    fn default_deny_is_conjunctive_per_rule() {
        // Rule matches share and path but not the operation -> denied, not silently allowed.
        let rules = vec![rule("alice", vec![Permission::Read], &["pub"], &["/"])];
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        assert_eq!(
            evaluate(&rules, Some("alice"), Operation::Delete, "pub", "/", ip),
            Err(DenyReason::OperationNotAllowed)
        );
    }

    #[test]
    fn accessible_roots_union_and_wildcard_intersection() {
        let rules = vec![
            rule("alice", vec![Permission::Read], &["a"], &["/"]),
            rule("alice", vec![Permission::Read], &["*"], &["/"]),
        ];
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        let shares = vec!["a".to_string(), "b".to_string()];
        let roots = accessible_roots(&rules, "alice", ip, &shares);
        assert_eq!(roots, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn required_permission_helper_matches_operation_mapping() {
        assert_eq!(Operation::Upload.required_permission(), Permission::Write);
        assert_eq!(Operation::Delete.required_permission(), Permission::Delete);
    }
}
