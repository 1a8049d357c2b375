use std::net::IpAddr;

use crate::common::errors::DomainError;
use crate::domain::entities::permission::Operation;
use crate::domain::entities::share::Share;
use crate::domain::services::rule_evaluator;
use crate::infrastructure::config_store::ConfigSnapshot;

/// Resolves `share_name` against the snapshot and runs the Rule Evaluator
/// for `(principal, op, share, rel, ip)`, converting a [`DenyReason`] into
/// the matching [`DomainError`] (spec.md §4.3, §4.9: "Authorization calls
/// into the Rule Evaluator with op mapped from the URL").
pub fn authorize<'a>(
    snapshot: &'a ConfigSnapshot,
    principal: &str,
    op: Operation,
    share_name: &str,
    rel: &str,
    ip: IpAddr,
) -> Result<&'a Share, DomainError> {
    let share = snapshot
        .share(share_name)
        .ok_or_else(|| DomainError::not_found("authz", format!("unknown share '{share_name}'")))?;
    rule_evaluator::evaluate(&snapshot.rules, Some(principal), op, share_name, rel, ip)?;
    Ok(share)
}
