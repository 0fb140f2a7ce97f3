//! Address allowlist for clients exempt from all limiting.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::IpAddr;
use tracing::warn;

/// Ordered, immutable set of exempt network ranges.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    entries: Vec<IpNet>,
}

impl Allowlist {
    /// Parse address and CIDR entries.
    ///
    /// A bare address becomes a single-host range (/32 or /128). Blank and
    /// malformed entries are skipped.
    pub fn parse<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();

        for entry in entries {
            let candidate = entry.as_ref().trim();
            if candidate.is_empty() {
                continue;
            }

            match parse_entry(candidate) {
                Some(net) => parsed.push(net),
                None => warn!(
                    subsystem = "http_ddos_guard",
                    entry = %candidate,
                    "Ignoring malformed allowlist entry"
                ),
            }
        }

        Self { entries: parsed }
    }

    /// True if `client` is an IP address inside any entry. Non-address
    /// identities (such as the `unknown` sentinel) never match.
    pub fn contains(&self, client: &str) -> bool {
        match client.trim().parse::<IpAddr>() {
            Ok(ip) => self.contains_ip(ip),
            Err(_) => false,
        }
    }

    /// IPv4-mapped IPv6 addresses match IPv4 entries.
    pub fn contains_ip(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.entries.iter().any(|net| net.contains(&ip))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entry(candidate: &str) -> Option<IpNet> {
    if let Ok(ip) = candidate.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => Ipv4Net::new(v4, 32).ok().map(IpNet::V4),
            IpAddr::V6(v6) => Ipv6Net::new(v6, 128).ok().map(IpNet::V6),
        };
    }

    candidate.parse::<IpNet>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_address_is_exact_match() {
        let allowlist = Allowlist::parse(["192.168.1.10"]);
        assert!(allowlist.contains("192.168.1.10"));
        assert!(!allowlist.contains("192.168.1.11"));
    }

    #[test]
    fn test_cidr_range() {
        let allowlist = Allowlist::parse(["10.0.0.0/8"]);
        assert!(allowlist.contains("10.1.2.3"));
        assert!(allowlist.contains("10.255.255.255"));
        assert!(!allowlist.contains("11.0.0.1"));
    }

    #[test]
    fn test_ipv6_entries() {
        let allowlist = Allowlist::parse(["::1", "2001:db8::/32"]);
        assert!(allowlist.contains("::1"));
        assert!(allowlist.contains("2001:db8:abcd::42"));
        assert!(!allowlist.contains("2001:db9::1"));
        assert!(!allowlist.contains("127.0.0.1"));
    }

    #[test]
    fn test_ipv4_mapped_address_matches_ipv4_entry() {
        let allowlist = Allowlist::parse(["127.0.0.1/32", "10.0.0.0/8"]);
        assert!(allowlist.contains("::ffff:127.0.0.1"));
        assert!(allowlist.contains("::ffff:10.4.5.6"));
        assert!(!allowlist.contains("::ffff:11.0.0.1"));
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let allowlist = Allowlist::parse(["", "  ", "not-an-ip", "300.1.1.1", "10.0.0.0/99", " 127.0.0.1/32 "]);
        assert_eq!(allowlist.len(), 1);
        assert!(allowlist.contains("127.0.0.1"));
    }

    #[test]
    fn test_non_address_client_never_matches() {
        let allowlist = Allowlist::parse(["0.0.0.0/0", "::/0"]);
        assert!(!allowlist.contains("unknown"));
        assert!(!allowlist.contains(""));
        assert!(allowlist.contains("203.0.113.7"));
    }

    #[test]
    fn test_empty_allowlist() {
        let allowlist = Allowlist::parse(Vec::<String>::new());
        assert!(allowlist.is_empty());
        assert!(!allowlist.contains("127.0.0.1"));
    }
}
