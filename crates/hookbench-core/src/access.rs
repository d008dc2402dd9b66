//! Source address allow-list.
//!
//! Entries are bare IPs or CIDR blocks. Anything that does not parse as
//! either is kept as a literal string and matched exactly, so hostnames
//! such as `testclient` still work.

use std::{collections::HashSet, net::IpAddr};

use ipnet::IpNet;

/// Static allow-list gate applied before any request processing.
///
/// A disabled filter admits everyone. An enabled filter with no entries
/// admits no one.
#[derive(Debug, Clone, Default)]
pub struct AccessFilter {
    enabled: bool,
    networks: Vec<IpNet>,
    literals: HashSet<String>,
}

impl AccessFilter {
    /// Creates a filter that allows every address.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Creates an enabled filter from allow-list entries.
    pub fn allow_list<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self { enabled: true, ..Self::default() };
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            match parse_ip_or_cidr(entry) {
                Some(net) => filter.networks.push(net),
                None => {
                    filter.literals.insert(entry.to_string());
                },
            }
        }
        filter
    }

    /// Builds a filter from configuration toggles.
    pub fn from_config<I, S>(enabled: bool, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if enabled {
            Self::allow_list(entries)
        } else {
            Self::disabled()
        }
    }

    /// Whether the filter is enforcing an allow-list.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of allow-list entries.
    pub fn len(&self) -> usize {
        self.networks.len() + self.literals.len()
    }

    /// Whether the allow-list has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decides whether `address` may use the service.
    pub fn is_allowed(&self, address: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let address = address.trim();
        if self.literals.contains(address) {
            return true;
        }

        match address.parse::<IpAddr>() {
            Ok(ip) => self.contains_ip(ip),
            Err(_) => false,
        }
    }

    /// Decides whether `ip` may use the service.
    pub fn is_allowed_ip(&self, ip: IpAddr) -> bool {
        if !self.enabled {
            return true;
        }
        self.literals.contains(&ip.to_string()) || self.contains_ip(ip)
    }

    fn contains_ip(&self, ip: IpAddr) -> bool {
        let ip = canonical(ip);
        self.networks.iter().any(|net| net.contains(&ip))
    }
}

fn parse_ip_or_cidr(s: &str) -> Option<IpNet> {
    s.parse::<IpNet>()
        .ok()
        .map(|net| match net {
            IpNet::V6(v6) => match v6.network().to_ipv4_mapped() {
                Some(v4) if v6.prefix_len() >= 96 => {
                    ipnet::Ipv4Net::new(v4, v6.prefix_len() - 96).map(IpNet::V4).unwrap_or(net)
                },
                _ => net,
            },
            IpNet::V4(_) => net,
        })
        .or_else(|| s.parse::<IpAddr>().ok().and_then(|ip| host_net(canonical(ip))))
}

fn host_net(ip: IpAddr) -> Option<IpNet> {
    match ip {
        IpAddr::V4(v4) => ipnet::Ipv4Net::new(v4, 32).ok().map(IpNet::V4),
        IpAddr::V6(v6) => ipnet::Ipv6Net::new(v6, 128).ok().map(IpNet::V6),
    }
}

/// Collapses IPv4-mapped IPv6 addresses to plain IPv4.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        IpAddr::V4(_) => ip,
    }
}
