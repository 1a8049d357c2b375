/// A single `Range:` header value, one of the three forms RFC 7233 allows
/// for a byte-range-spec (multiple ranges are not supported; only the first
/// is honored by the caller, per spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRange {
    StartEnd { start: u64, end: u64 },
    Start { start: u64 },
    Suffix { suffix_length: u64 },
}

/// An inclusive `[start, end]` byte range resolved against a known total
/// size. `ResolvedRange::is_empty` is true for the zero-length sentinel
/// `[N, N-1]` (represented here as `start > end`, so `N == 0` naturally
/// produces the `[0, -1]`-equivalent empty range via saturating subtraction).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ResolvedRange {
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }
}

/// Resolves a `Range` header against a total size `N`, per spec.md §3:
/// - `{suffix_length: k}` -> `[max(0, N-k), N-1]`.
/// - `{start: s, end: e}` -> clamp `s in [0, N]`, `e in [-1, N-1]`; if
///   `s > N-1` produce the empty range `[N, N-1]`.
/// - If `N == 0`, result is the empty range regardless of the requested range.
pub fn resolve(range: HttpRange, total: u64) -> ResolvedRange {
    if total == 0 {
        // Empty sentinel: start > end, unambiguous regardless of `total`.
        return ResolvedRange { start: 1, end: 0, total };
    }
    let last = total - 1;
    match range {
        HttpRange::Suffix { suffix_length } => {
            let start = total.saturating_sub(suffix_length);
            ResolvedRange { start, end: last, total }
        }
        HttpRange::Start { start } => {
            let start = start.min(total);
            if start > last {
                ResolvedRange { start: total, end: last, total }
            } else {
                ResolvedRange { start, end: last, total }
            }
        }
        HttpRange::StartEnd { start, end } => {
            let start = start.min(total);
            let end = end.min(last);
            if start > last {
                ResolvedRange { start: total, end: last, total }
            } else {
                ResolvedRange { start, end, total }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_is_empty_range() {
        let r = resolve(HttpRange::Start { start: 0 }, 0);
        assert!(r.is_empty());
        assert_eq!(r.len(), 0);
    }

    #[test]
    fn suffix_range() {
        let r = resolve(HttpRange::Suffix { suffix_length: 4 }, 10);
        assert_eq!((r.start, r.end), (6, 9));
        let r = resolve(HttpRange::Suffix { suffix_length: 100 }, 10);
        assert_eq!((r.start, r.end), (0, 9));
    }

    #[test]
    fn start_only_range() {
        let r = resolve(HttpRange::Start { start: 3 }, 10);
        assert_eq!((r.start, r.end), (3, 9));
    }

    #[test]
    fn start_end_range_clamped() {
        let r = resolve(HttpRange::StartEnd { start: 0, end: 3 }, 5);
        assert_eq!((r.start, r.end), (0, 3));
        let r = resolve(HttpRange::StartEnd { start: 2, end: 1000 }, 5);
        assert_eq!((r.start, r.end), (2, 4));
    }

    #[test]
    fn start_past_end_is_empty() {
        let r = resolve(HttpRange::Start { start: 100 }, 10);
        assert!(r.is_empty());
    }

    #[test]
    fn invariant_bounds_hold() {
        for n in [0u64, 1, 5, 100] {
            for s in [0u64, 1, 5, 100, 1000] {
                for e in [0u64, 1, 5, 100, 1000] {
                    let r = resolve(HttpRange::StartEnd { start: s, end: e }, n);
                    assert!(r.start <= n.max(1));
                    if !r.is_empty() {
                        assert!(r.end <= n.saturating_sub(1));
                        assert!(r.start <= r.end);
                    }
                }
            }
        }
    }
}
