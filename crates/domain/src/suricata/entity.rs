use std::net::IpAddr;

use regex::bytes::Regex;

use crate::common::entity::{Direction, RuleAction};

/// Transport protocols the signature store matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigProtocol {
    Tcp,
    Udp,
}

impl SigProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

/// Address side of a signature header: `any`, or a (possibly negated)
/// list of literal addresses and CIDR blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum AddrPattern {
    Any,
    Set {
        negated: bool,
        entries: Vec<AddrEntry>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AddrEntry {
    Ip(IpAddr),
    Cidr { net: IpAddr, prefix: u8 },
}

impl AddrEntry {
    fn contains(&self, ip: &IpAddr) -> bool {
        match self {
            Self::Ip(a) => a == ip,
            Self::Cidr { net, prefix } => cidr_contains(net, *prefix, ip),
        }
    }
}

fn cidr_contains(net: &IpAddr, prefix: u8, ip: &IpAddr) -> bool {
    match (net, ip) {
        (IpAddr::V4(net), IpAddr::V4(ip)) => {
            if prefix == 0 {
                return true;
            }
            if prefix > 32 {
                return false;
            }
            let mask = u32::MAX << (32 - u32::from(prefix));
            (u32::from(*net) & mask) == (u32::from(*ip) & mask)
        }
        (IpAddr::V6(net), IpAddr::V6(ip)) => {
            if prefix == 0 {
                return true;
            }
            if prefix > 128 {
                return false;
            }
            let mask = u128::MAX << (128 - u32::from(prefix));
            (u128::from(*net) & mask) == (u128::from(*ip) & mask)
        }
        _ => false,
    }
}

impl AddrPattern {
    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            Self::Any => true,
            Self::Set { negated, entries } => {
                entries.iter().any(|e| e.contains(ip)) != *negated
            }
        }
    }
}

/// Port side of a signature header: `any`, or a (possibly negated) list of
/// ports and inclusive ranges.
#[derive(Debug, Clone, PartialEq)]
pub enum PortPattern {
    Any,
    Set {
        negated: bool,
        entries: Vec<PortSpan>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpan {
    pub start: u16,
    pub end: u16,
}

impl PortPattern {
    pub fn matches(&self, port: u16) -> bool {
        match self {
            Self::Any => true,
            Self::Set { negated, entries } => {
                entries
                    .iter()
                    .any(|span| span.start <= port && port <= span.end)
                    != *negated
            }
        }
    }
}

/// One `content` option with its modifiers, matched against the transport
/// payload. `offset` skips leading payload bytes; `depth` bounds how far
/// past the offset the match may begin looking.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentMatch {
    pub pattern: Vec<u8>,
    pub nocase: bool,
    pub offset: Option<usize>,
    pub depth: Option<usize>,
    pub negated: bool,
}

impl ContentMatch {
    pub fn matches(&self, payload: &[u8]) -> bool {
        self.found_in(payload) != self.negated
    }

    fn found_in(&self, payload: &[u8]) -> bool {
        if self.pattern.is_empty() {
            return true;
        }
        let start = self.offset.unwrap_or(0);
        if start >= payload.len() {
            return false;
        }
        let window = &payload[start..];
        let window = match self.depth {
            Some(depth) => &window[..window.len().min(depth)],
            None => window,
        };
        if window.len() < self.pattern.len() {
            return false;
        }
        window.windows(self.pattern.len()).any(|candidate| {
            if self.nocase {
                candidate.eq_ignore_ascii_case(&self.pattern)
            } else {
                candidate == self.pattern.as_slice()
            }
        })
    }
}

/// Payload-size constraint (`dsize`). The `<>` form is exclusive on both
/// ends, matching Suricata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsizeBound {
    Exact(usize),
    Less(usize),
    Greater(usize),
    Between(usize, usize),
}

impl DsizeBound {
    pub fn matches(&self, len: usize) -> bool {
        match self {
            Self::Exact(n) => len == *n,
            Self::Less(n) => len < *n,
            Self::Greater(n) => len > *n,
            Self::Between(lo, hi) => len > *lo && len < *hi,
        }
    }
}

/// A `pcre` option compiled at load time (never per packet), with DoS
/// limits applied to the build.
#[derive(Debug, Clone)]
pub struct PcreMatch {
    pub raw: String,
    pub negated: bool,
    pub regex: Regex,
}

impl PcreMatch {
    pub fn matches(&self, payload: &[u8]) -> bool {
        self.regex.is_match(payload) != self.negated
    }
}

/// One parsed signature. Stored in file order; that order is the match
/// tie-break.
#[derive(Debug, Clone)]
pub struct SignatureRule {
    pub action: RuleAction,
    pub protocol: SigProtocol,
    pub src_addrs: AddrPattern,
    pub src_ports: PortPattern,
    pub direction: Direction,
    pub dst_addrs: AddrPattern,
    pub dst_ports: PortPattern,
    pub sid: u32,
    pub rev: u32,
    pub msg: String,
    pub classtype: Option<String>,
    pub contents: Vec<ContentMatch>,
    pub dsize: Option<DsizeBound>,
    pub pcre: Option<PcreMatch>,
}

impl SignatureRule {
    pub fn matches_header(&self, src: (IpAddr, u16), dst: (IpAddr, u16)) -> bool {
        let forward = self.matches_oriented(src, dst);
        match self.direction {
            Direction::Uni => forward,
            Direction::Bi => forward || self.matches_oriented(dst, src),
        }
    }

    fn matches_oriented(&self, src: (IpAddr, u16), dst: (IpAddr, u16)) -> bool {
        self.src_addrs.matches(&src.0)
            && self.src_ports.matches(src.1)
            && self.dst_addrs.matches(&dst.0)
            && self.dst_ports.matches(dst.1)
    }

    pub fn matches_payload(&self, payload: &[u8]) -> bool {
        if let Some(dsize) = &self.dsize
            && !dsize.matches(payload.len())
        {
            return false;
        }
        if !self.contents.iter().all(|c| c.matches(payload)) {
            return false;
        }
        if let Some(pcre) = &self.pcre
            && !pcre.matches(payload)
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ip(s: &str) -> IpAddr {
        IpAddr::from_str(s).unwrap()
    }

    // ── address patterns ─────────────────────────────────────────

    #[test]
    fn addr_any_matches_everything() {
        assert!(AddrPattern::Any.matches(&ip("10.0.0.1")));
        assert!(AddrPattern::Any.matches(&ip("2001:db8::1")));
    }

    #[test]
    fn addr_cidr_membership() {
        let pattern = AddrPattern::Set {
            negated: false,
            entries: vec![AddrEntry::Cidr {
                net: ip("192.168.0.0"),
                prefix: 16,
            }],
        };
        assert!(pattern.matches(&ip("192.168.44.7")));
        assert!(!pattern.matches(&ip("192.169.0.1")));
    }

    #[test]
    fn addr_negation_inverts() {
        let pattern = AddrPattern::Set {
            negated: true,
            entries: vec![AddrEntry::Ip(ip("10.0.0.1"))],
        };
        assert!(!pattern.matches(&ip("10.0.0.1")));
        assert!(pattern.matches(&ip("10.0.0.2")));
    }

    #[test]
    fn addr_cidr_family_mismatch_never_matches() {
        let pattern = AddrPattern::Set {
            negated: false,
            entries: vec![AddrEntry::Cidr {
                net: ip("192.168.0.0"),
                prefix: 16,
            }],
        };
        assert!(!pattern.matches(&ip("2001:db8::1")));
    }

    // ── port patterns ────────────────────────────────────────────

    #[test]
    fn port_span_inclusive() {
        let pattern = PortPattern::Set {
            negated: false,
            entries: vec![PortSpan {
                start: 1000,
                end: 2000,
            }],
        };
        assert!(pattern.matches(1000));
        assert!(pattern.matches(2000));
        assert!(!pattern.matches(999));
    }

    #[test]
    fn port_negated_list() {
        let pattern = PortPattern::Set {
            negated: true,
            entries: vec![
                PortSpan { start: 80, end: 80 },
                PortSpan {
                    start: 443,
                    end: 443,
                },
            ],
        };
        assert!(!pattern.matches(80));
        assert!(pattern.matches(8080));
    }

    // ── content ──────────────────────────────────────────────────

    #[test]
    fn content_plain_substring() {
        let content = ContentMatch {
            pattern: b"admin".to_vec(),
            nocase: false,
            offset: None,
            depth: None,
            negated: false,
        };
        assert!(content.matches(b"GET /admin HTTP/1.1"));
        assert!(!content.matches(b"GET /Admin HTTP/1.1"));
    }

    #[test]
    fn content_nocase() {
        let content = ContentMatch {
            pattern: b"admin".to_vec(),
            nocase: true,
            offset: None,
            depth: None,
            negated: false,
        };
        assert!(content.matches(b"GET /ADMIN HTTP/1.1"));
    }

    #[test]
    fn content_offset_skips_prefix() {
        let content = ContentMatch {
            pattern: b"abc".to_vec(),
            nocase: false,
            offset: Some(4),
            depth: None,
            negated: false,
        };
        assert!(!content.matches(b"abcdxxxx"));
        assert!(content.matches(b"xxxxabcd"));
    }

    #[test]
    fn content_depth_bounds_match_start() {
        let content = ContentMatch {
            pattern: b"abc".to_vec(),
            nocase: false,
            offset: None,
            depth: Some(3),
            negated: false,
        };
        assert!(content.matches(b"abcxxx"));
        assert!(!content.matches(b"xxxabc"));
    }

    #[test]
    fn content_negated() {
        let content = ContentMatch {
            pattern: b"abc".to_vec(),
            nocase: false,
            offset: None,
            depth: None,
            negated: true,
        };
        assert!(content.matches(b"xyz"));
        assert!(!content.matches(b"xxabcxx"));
    }

    // ── dsize ────────────────────────────────────────────────────

    #[test]
    fn dsize_bounds() {
        assert!(DsizeBound::Exact(4).matches(4));
        assert!(!DsizeBound::Exact(4).matches(5));
        assert!(DsizeBound::Less(10).matches(9));
        assert!(!DsizeBound::Less(10).matches(10));
        assert!(DsizeBound::Greater(10).matches(11));
        assert!(DsizeBound::Between(300, 400).matches(301));
        assert!(!DsizeBound::Between(300, 400).matches(300));
        assert!(!DsizeBound::Between(300, 400).matches(400));
    }
}
