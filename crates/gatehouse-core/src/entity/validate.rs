//! Syntax validation for IP literals and DNS names

use std::net::IpAddr;

/// Check whether a string is a syntactically valid IP address literal.
pub fn is_valid_ip(ip: &str) -> bool {
    ip.parse::<IpAddr>().is_ok()
}

/// Parse an IP literal and return its canonical textual form.
///
/// ACL records are always keyed by this canonical form, so lookups are
/// insensitive to cosmetic differences in the input (leading zeros,
/// IPv6 case, etc).
pub fn canonical_ip(ip: &str) -> Option<String> {
    ip.parse::<IpAddr>().ok().map(|addr| addr.to_string())
}

/// Validate a DNS name against RFC 1035 label rules.
///
/// An IP literal is not a DNS name, even though it would pass the
/// character checks below.
pub fn is_valid_dns_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 || is_valid_ip(name) {
        return false;
    }

    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
