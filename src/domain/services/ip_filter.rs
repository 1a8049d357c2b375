use std::net::IpAddr;

use ipnet::IpNet;

/// Parses a filter-list entry. `"*"` becomes the catch-all network for the
/// address family it is later compared against (resolved lazily by the
/// caller, since a bare `"*"` has no family of its own); everything else is
/// a CIDR or a bare address (which becomes `/32` or `/128`).
fn parse_entry(entry: &str, family: AddrFamily) -> Option<IpNet> {
    if entry == "*" {
        return Some(match family {
            AddrFamily::V4 => "0.0.0.0/0".parse().unwrap(),
            AddrFamily::V6 => "::/0".parse().unwrap(),
        });
    }
    if let Ok(net) = entry.parse::<IpNet>() {
        return Some(net);
    }
    if let Ok(addr) = entry.parse::<IpAddr>() {
        return Some(IpNet::new(addr, if addr.is_ipv4() { 32 } else { 128 }).unwrap());
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddrFamily {
    V4,
    V6,
}

fn family_of(ip: IpAddr) -> AddrFamily {
    if ip.is_ipv4() {
        AddrFamily::V4
    } else {
        AddrFamily::V6
    }
}

/// The most specific (largest prefix length) network among `entries` that
/// contains `ip`, restricted to entries of `ip`'s address family.
fn most_specific_match(ip: IpAddr, entries: &[String], family: AddrFamily) -> Option<IpNet> {
    entries
        .iter()
        .filter_map(|e| parse_entry(e, family))
        .filter(|net| same_family(*net, family) && net.contains(&ip))
        .max_by_key(|net| net.prefix_len())
}

fn same_family(net: IpNet, family: AddrFamily) -> bool {
    match (net, family) {
        (IpNet::V4(_), AddrFamily::V4) => true,
        (IpNet::V6(_), AddrFamily::V6) => true,
        _ => false,
    }
}

/// CIDR-aware allow/deny decision for a client address (spec.md §4.2).
///
/// Fails closed (deny) if `ip` cannot be parsed by the caller — this
/// function takes an already-parsed [`IpAddr`], so that failure mode lives
/// at the call site (client-IP extraction).
pub fn check(ip: IpAddr, allow: &[String], deny: &[String]) -> bool {
    let family = family_of(ip);
    let matched_allow = most_specific_match(ip, allow, family);
    let matched_deny = most_specific_match(ip, deny, family);

    match (matched_allow, matched_deny) {
        (Some(_), None) => true,
        (Some(a), Some(d)) => a.prefix_len() >= d.prefix_len(),
        (None, Some(_)) => false,
        (None, None) => allow.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn empty_lists_allow_everything() {
        assert!(check(ip("1.2.3.4"), &[], &[]));
    }

    #[test]
    fn deny_only_blocks_matched() {
        let deny = vec!["10.0.0.0/8".to_string()];
        assert!(!check(ip("10.1.2.3"), &[], &deny));
        assert!(check(ip("11.1.2.3"), &[], &deny));
    }

    #[test]
    fn allow_list_enforced_when_nonempty() {
        let allow = vec!["192.168.0.0/16".to_string()];
        assert!(check(ip("192.168.1.1"), &allow, &[]));
        assert!(!check(ip("10.0.0.1"), &allow, &[]));
    }

    #[test]
    fn specificity_tiebreak_goes_to_allow() {
        let allow = vec!["10.0.0.0/24".to_string()];
        let deny = vec!["10.0.0.0/24".to_string()];
        assert!(check(ip("10.0.0.5"), &allow, &deny));
    }

    #[test]
    fn more_specific_deny_wins_over_broader_allow() {
        let allow = vec!["10.0.0.0/8".to_string()];
        let deny = vec!["10.0.0.0/24".to_string()];
        assert!(!check(ip("10.0.0.5"), &allow, &deny));
        assert!(check(ip("10.1.0.5"), &allow, &deny));
    }

    #[test]
    fn more_specific_allow_wins_over_broader_deny() {
        let allow = vec!["10.0.0.0/24".to_string()];
        let deny = vec!["10.0.0.0/8".to_string()];
        assert!(check(ip("10.0.0.5"), &allow, &deny));
        assert!(!check(ip("10.1.0.5"), &allow, &deny));
    }

    #[test]
    fn wildcard_entries() {
        let allow = vec!["*".to_string()];
        assert!(check(ip("8.8.8.8"), &allow, &[]));
        assert!(check(ip("::1"), &allow, &[]));
    }

    #[test]
    fn bare_address_becomes_single_host() {
        let allow = vec!["1.2.3.4".to_string()];
        assert!(check(ip("1.2.3.4"), &allow, &[]));
        assert!(!check(ip("1.2.3.5"), &allow, &[]));
    }

    #[test]
    fn monotonicity_adding_more_specific_allow_does_not_deny_existing_allows() {
        let allow = vec!["*".to_string()];
        assert!(check(ip("1.2.3.4"), &allow, &[]));
        let allow2 = vec!["*".to_string(), "1.2.3.0/24".to_string()];
        assert!(check(ip("1.2.3.4"), &allow2, &[]));
    }
}
