//! Network location constraints.

use ipnet::IpNet;
use std::net::IpAddr;

/// True if `entry` is a bare IPv4 or IPv6 address.
pub fn is_ip(entry: &str) -> bool {
    entry.parse::<IpAddr>().is_ok()
}

/// True if `entry` is a CIDR block. Host bits may be set (`192.168.1.1/24`).
pub fn is_cidr(entry: &str) -> bool {
    entry.parse::<IpNet>().is_ok()
}

pub fn is_ip_or_cidr(entry: &str) -> bool {
    is_ip(entry) || is_cidr(entry)
}

/// Whether `ip` satisfies a location list.
///
/// An empty list places no constraint. Otherwise `ip` must fall inside one
/// of the CIDR blocks or equal one of the literal addresses.
pub fn contains<S: AsRef<str>>(locations: &[S], ip: IpAddr) -> bool {
    if locations.is_empty() {
        return true;
    }
    locations.iter().any(|entry| {
        let entry = entry.as_ref();
        if let Ok(net) = entry.parse::<IpNet>() {
            net.contains(&ip)
        } else if let Ok(addr) = entry.parse::<IpAddr>() {
            addr == ip
        } else {
            entry == ip.to_string()
        }
    })
}
