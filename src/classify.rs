//! Address classification against the IANA special-purpose registries.
//!
//! Classification is an allowlist: an address is [`HostClassification::Public`]
//! only when it is globally routable unicast. IPv4 addresses are public unless
//! they fall in a special-purpose block; IPv6 addresses must additionally sit
//! inside global unicast space (2000::/3).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{Ipv4Net, Ipv6Net};

/// What kind of destination an address (or hostname) represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostClassification {
    Public,
    Loopback,
    LinkLocal,
    PrivateUseNetwork,
    ReservedOrUnspecified,
    /// Never produced by [`classify_ip`]; URLs that fail to parse or
    /// resolve get this from [`Gate::classify_url`](crate::Gate::classify_url).
    UnresolvableOrMalformed,
}

impl HostClassification {
    pub fn is_public(self) -> bool {
        self == Self::Public
    }
}

impl fmt::Display for HostClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Public => "public",
            Self::Loopback => "loopback",
            Self::LinkLocal => "link-local",
            Self::PrivateUseNetwork => "private-use network",
            Self::ReservedOrUnspecified => "reserved or unspecified",
            Self::UnresolvableOrMalformed => "unresolvable or malformed",
        };
        f.write_str(s)
    }
}

use HostClassification::{LinkLocal, Loopback, PrivateUseNetwork, ReservedOrUnspecified};

const fn v4(a: u8, b: u8, c: u8, d: u8, prefix: u8) -> Ipv4Net {
    Ipv4Net::new_assert(Ipv4Addr::new(a, b, c, d), prefix)
}

#[allow(clippy::too_many_arguments)]
const fn v6(a: u16, b: u16, c: u16, d: u16, e: u16, f: u16, g: u16, h: u16, prefix: u8) -> Ipv6Net {
    Ipv6Net::new_assert(Ipv6Addr::new(a, b, c, d, e, f, g, h), prefix)
}

/// IPv4 special-purpose blocks (RFC 6890 and successors). First match wins.
const IPV4_SPECIAL: &[(Ipv4Net, HostClassification, &str)] = &[
    (v4(0, 0, 0, 0, 8), ReservedOrUnspecified, "this network (0.0.0.0/8)"),
    (v4(10, 0, 0, 0, 8), PrivateUseNetwork, "private-use (10.0.0.0/8)"),
    (v4(100, 64, 0, 0, 10), PrivateUseNetwork, "shared address space (100.64.0.0/10)"),
    (v4(127, 0, 0, 0, 8), Loopback, "loopback (127.0.0.0/8)"),
    (v4(169, 254, 0, 0, 16), LinkLocal, "link-local (169.254.0.0/16)"),
    (v4(172, 16, 0, 0, 12), PrivateUseNetwork, "private-use (172.16.0.0/12)"),
    (v4(192, 0, 0, 0, 24), ReservedOrUnspecified, "IETF protocol assignments (192.0.0.0/24)"),
    (v4(192, 0, 2, 0, 24), ReservedOrUnspecified, "documentation (192.0.2.0/24)"),
    (v4(192, 88, 99, 0, 24), ReservedOrUnspecified, "6to4 relay anycast (192.88.99.0/24)"),
    (v4(192, 168, 0, 0, 16), PrivateUseNetwork, "private-use (192.168.0.0/16)"),
    (v4(198, 18, 0, 0, 15), ReservedOrUnspecified, "benchmarking (198.18.0.0/15)"),
    (v4(198, 51, 100, 0, 24), ReservedOrUnspecified, "documentation (198.51.100.0/24)"),
    (v4(203, 0, 113, 0, 24), ReservedOrUnspecified, "documentation (203.0.113.0/24)"),
    (v4(224, 0, 0, 0, 4), ReservedOrUnspecified, "multicast (224.0.0.0/4)"),
    (v4(255, 255, 255, 255, 32), ReservedOrUnspecified, "limited broadcast (255.255.255.255)"),
    (v4(240, 0, 0, 0, 4), ReservedOrUnspecified, "reserved (240.0.0.0/4)"),
];

/// IPv6 special-purpose blocks. IPv4-mapped and NAT64 addresses are unwrapped
/// before this table is consulted. First match wins.
const IPV6_SPECIAL: &[(Ipv6Net, HostClassification, &str)] = &[
    (v6(0, 0, 0, 0, 0, 0, 0, 0, 128), ReservedOrUnspecified, "unspecified (::)"),
    (v6(0, 0, 0, 0, 0, 0, 0, 1, 128), Loopback, "loopback (::1)"),
    (v6(0, 0, 0, 0, 0, 0, 0, 0, 96), ReservedOrUnspecified, "IPv4-compatible (::/96)"),
    (v6(0x64, 0xff9b, 1, 0, 0, 0, 0, 0, 48), PrivateUseNetwork, "local-use NAT64 (64:ff9b:1::/48)"),
    (v6(0x100, 0, 0, 0, 0, 0, 0, 0, 64), ReservedOrUnspecified, "discard-only (100::/64)"),
    (v6(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0, 32), ReservedOrUnspecified, "documentation (2001:db8::/32)"),
    (v6(0x2001, 0, 0, 0, 0, 0, 0, 0, 23), ReservedOrUnspecified, "IETF protocol assignments (2001::/23)"),
    (v6(0x2002, 0, 0, 0, 0, 0, 0, 0, 16), ReservedOrUnspecified, "6to4 (2002::/16)"),
    (v6(0x3fff, 0, 0, 0, 0, 0, 0, 0, 20), ReservedOrUnspecified, "documentation (3fff::/20)"),
    (v6(0x5f00, 0, 0, 0, 0, 0, 0, 0, 16), ReservedOrUnspecified, "segment routing SIDs (5f00::/16)"),
    (v6(0xfc00, 0, 0, 0, 0, 0, 0, 0, 7), PrivateUseNetwork, "unique-local (fc00::/7)"),
    (v6(0xfe80, 0, 0, 0, 0, 0, 0, 0, 10), LinkLocal, "link-local (fe80::/10)"),
    (v6(0xfec0, 0, 0, 0, 0, 0, 0, 0, 10), PrivateUseNetwork, "site-local (fec0::/10)"),
    (v6(0xff00, 0, 0, 0, 0, 0, 0, 0, 8), ReservedOrUnspecified, "multicast (ff00::/8)"),
];

const NAT64_WELL_KNOWN: Ipv6Net = v6(0x64, 0xff9b, 0, 0, 0, 0, 0, 0, 96);
const GLOBAL_UNICAST: Ipv6Net = v6(0x2000, 0, 0, 0, 0, 0, 0, 0, 3);

/// Hostnames that are always blocked, matched exactly.
const BLOCKED_HOSTNAMES: &[&str] = &[
    "localhost",
    "metadata.google.internal",
    "metadata.goog",
    "metadata.azure.internal",
    "instance-data",
];

/// Suffixes reserved for local networks or service discovery. The bare
/// suffix (without the leading dot) is blocked too.
const BLOCKED_SUFFIXES: &[&str] = &[".localhost", ".local", ".localdomain", ".internal", ".home.arpa"];

/// Classify a single address.
pub fn classify_ip(ip: IpAddr) -> HostClassification {
    classify_ip_with_reason(ip).0
}

/// Classify an address and name the registry block it matched.
pub(crate) fn classify_ip_with_reason(ip: IpAddr) -> (HostClassification, &'static str) {
    match ip {
        IpAddr::V4(v4) => classify_ipv4(v4),
        IpAddr::V6(v6) => classify_ipv6(v6),
    }
}

fn classify_ipv4(ip: Ipv4Addr) -> (HostClassification, &'static str) {
    IPV4_SPECIAL
        .iter()
        .find(|(net, _, _)| net.contains(&ip))
        .map(|&(_, class, name)| (class, name))
        .unwrap_or((HostClassification::Public, "global unicast"))
}

fn classify_ipv6(ip: Ipv6Addr) -> (HostClassification, &'static str) {
    // ::ffff:a.b.c.d reaches the IPv4 host directly
    if let Some(v4) = ip.to_ipv4_mapped() {
        return classify_ipv4(v4);
    }

    if NAT64_WELL_KNOWN.contains(&ip) {
        let [.., a, b] = ip.segments();
        let v4 = Ipv4Addr::new((a >> 8) as u8, a as u8, (b >> 8) as u8, b as u8);
        return classify_ipv4(v4);
    }

    if let Some(&(_, class, name)) = IPV6_SPECIAL.iter().find(|(net, _, _)| net.contains(&ip)) {
        return (class, name);
    }

    if !GLOBAL_UNICAST.contains(&ip) {
        return (ReservedOrUnspecified, "outside global unicast (2000::/3)");
    }

    (HostClassification::Public, "global unicast")
}

/// Check a normalized (lowercase, no trailing dot) hostname against the
/// built-in blocklist. Returns the matched entry.
pub fn is_hostname_blocked(host: &str) -> Option<&'static str> {
    let host = host.to_ascii_lowercase();

    if let Some(&blocked) = BLOCKED_HOSTNAMES.iter().find(|&&b| host == b) {
        return Some(blocked);
    }

    BLOCKED_SUFFIXES
        .iter()
        .find(|&&suffix| host.ends_with(suffix) || host == suffix[1..])
        .copied()
}
