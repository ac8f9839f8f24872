//! Identifier and address validation run before any request is sent.

use std::net::IpAddr;

use crate::error::SnowError;

/// Length of a ServiceNow sys_id.
pub const SYS_ID_LEN: usize = 32;

/// True for exactly 32 ASCII hex digits, either case.
pub fn is_sys_id(value: &str) -> bool {
    value.len() == SYS_ID_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Checks a required sys_id and returns it trimmed.
///
/// # Errors
///
/// `"{label} is required for this action"` when absent or blank, otherwise
/// `"Invalid {label} format: ..."` for anything but 32 hex characters.
pub fn validate_sys_id(value: Option<&str>, label: &str) -> Result<String, SnowError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(SnowError::validation(format!(
            "{} is required for this action",
            label
        )));
    }
    if !is_sys_id(value) {
        return Err(SnowError::validation(format!(
            "Invalid {} format: '{}'. Expected a 32-character hexadecimal string.",
            label, value
        )));
    }
    Ok(value.to_string())
}

/// Checks a sys_id only when one was given.
pub fn validate_optional_sys_id(value: Option<&str>, label: &str) -> Result<Option<String>, SnowError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => validate_sys_id(Some(value), label).map(Some),
        None => Ok(None),
    }
}

/// Parses a single IPv4 or IPv6 address.
pub fn validate_ip_address(value: &str, label: &str) -> Result<IpAddr, SnowError> {
    let value = value.trim();
    value.parse::<IpAddr>().map_err(|e| {
        SnowError::validation(format!("Invalid IP address for {}: '{}'. {}", label, value, e))
    })
}

/// Parses `address[/prefix]`. Host bits may be set.
pub fn validate_cidr(value: &str, label: &str) -> Result<(IpAddr, u8), SnowError> {
    let value = value.trim();
    let invalid = |reason: &str| {
        SnowError::validation(format!(
            "Invalid CIDR network for {}: '{}'. {}",
            label, value, reason
        ))
    };

    let (address, prefix) = match value.split_once('/') {
        Some((address, prefix)) => (address, Some(prefix)),
        None => (value, None),
    };
    let address: IpAddr = address
        .parse()
        .map_err(|_| invalid("does not appear to be an IPv4 or IPv6 network"))?;
    let max_prefix = if address.is_ipv4() { 32 } else { 128 };
    let prefix = match prefix {
        Some(prefix) => prefix
            .parse::<u8>()
            .ok()
            .filter(|p| *p <= max_prefix)
            .ok_or_else(|| invalid(&format!("'{}' is not a valid netmask", prefix)))?,
        None => max_prefix,
    };
    Ok((address, prefix))
}

fn family(address: &IpAddr) -> &'static str {
    match address {
        IpAddr::V4(_) => "IPv4",
        IpAddr::V6(_) => "IPv6",
    }
}

/// Requires both ends in one address family with `end >= start`.
pub fn validate_ip_range(start: &str, end: &str) -> Result<(), SnowError> {
    let start_addr = validate_ip_address(start, "range_start")?;
    let end_addr = validate_ip_address(end, "range_end")?;

    let ordered = match (start_addr, end_addr) {
        (IpAddr::V4(s), IpAddr::V4(e)) => u32::from(e) >= u32::from(s),
        (IpAddr::V6(s), IpAddr::V6(e)) => u128::from(e) >= u128::from(s),
        _ => {
            return Err(SnowError::validation(format!(
                "IP address family mismatch: start={} ({}) vs end={} ({})",
                start.trim(),
                family(&start_addr),
                end.trim(),
                family(&end_addr)
            )))
        }
    };

    if ordered {
        Ok(())
    } else {
        Err(SnowError::validation(format!(
            "Range end ({}) must be >= range start ({})",
            end.trim(),
            start.trim()
        )))
    }
}

/// Cuts `text` to `max_chars` characters, appending `...` when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

/// Renders a list the way validation messages quote allowed values.
pub fn quoted_list(values: &[&str]) -> String {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let quoted: Vec<String> = sorted.iter().map(|v| format!("'{}'", v)).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ID: &str = "0123456789abcdef0123456789ABCDEF";

    #[test]
    fn test_validate_sys_id_accepts_hex() {
        assert_eq!(validate_sys_id(Some(&format!("  {}  ", ID)), "sys_id").unwrap(), ID);
    }

    #[test]
    fn test_validate_sys_id_missing() {
        let err = validate_sys_id(None, "scan_sys_id").unwrap_err();
        assert_eq!(err.to_string(), "scan_sys_id is required for this action");
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(validate_sys_id(Some("   "), "x").is_err());
    }

    #[test]
    fn test_validate_sys_id_bad_format() {
        let err = validate_sys_id(Some("abc123"), "sys_id").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid sys_id format: 'abc123'. Expected a 32-character hexadecimal string."
        );
        assert!(!is_sys_id("g123456789abcdef0123456789abcdef"));
        assert!(!is_sys_id(&format!("{}0", ID)));
    }

    #[test]
    fn test_optional_sys_id() {
        assert_eq!(validate_optional_sys_id(None, "s").unwrap(), None);
        assert_eq!(validate_optional_sys_id(Some(" "), "s").unwrap(), None);
        assert!(validate_optional_sys_id(Some("nope"), "s").is_err());
    }

    #[test]
    fn test_ip_range_order() {
        assert!(validate_ip_range("10.0.0.1", "10.0.0.254").is_ok());
        assert!(validate_ip_range("10.0.0.1", "10.0.0.1").is_ok());
        let err = validate_ip_range("10.0.0.254", "10.0.0.1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Range end (10.0.0.1) must be >= range start (10.0.0.254)"
        );
    }

    #[test]
    fn test_ip_range_numeric_not_lexical() {
        assert!(validate_ip_range("10.0.0.9", "10.0.0.10").is_ok());
        assert!(validate_ip_range("::1", "::ff").is_ok());
    }

    #[test]
    fn test_ip_range_family_mismatch() {
        let err = validate_ip_range("10.0.0.1", "::1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "IP address family mismatch: start=10.0.0.1 (IPv4) vs end=::1 (IPv6)"
        );
    }

    #[test]
    fn test_validate_cidr() {
        assert_eq!(
            validate_cidr("10.0.0.0/24", "range_start").unwrap(),
            ("10.0.0.0".parse().unwrap(), 24)
        );
        assert_eq!(validate_cidr("10.0.0.5/24", "r").unwrap().1, 24);
        assert_eq!(validate_cidr("fe80::/10", "r").unwrap().1, 10);
        assert_eq!(validate_cidr("192.168.1.1", "r").unwrap().1, 32);
        assert!(validate_cidr("10.0.0.0/33", "r").is_err());
        assert!(validate_cidr("10.0.0/24", "r").is_err());
        assert!(validate_cidr("10.0.0.0/x", "r")
            .unwrap_err()
            .to_string()
            .starts_with("Invalid CIDR network for r: '10.0.0.0/x'."));
    }

    #[test]
    fn test_validate_ip_address_message() {
        let err = validate_ip_address("999.1.1.1", "range_start").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Invalid IP address for range_start: '999.1.1.1'."));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_quoted_list_sorts() {
        assert_eq!(quoted_list(&["week", "day"]), "['day', 'week']");
    }
}
