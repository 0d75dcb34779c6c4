//! Input validation for user-supplied configuration values
//!
//! Centralized checks for everything that ends up in the configuration
//! file, so the CLI (and any other front end) rejects bad values before
//! they are persisted.

use std::net::IpAddr;

/// Validates a HANA system identifier: a 3-character SID (uppercase letter
/// followed by uppercase letters or digits) plus a 2-digit instance number,
/// e.g. `TTT00`.
///
/// # Errors
///
/// Returns `Err` with a user-facing message when the format is violated.
pub fn validate_hana_system(value: &str) -> Result<String, String> {
    if value.len() != 5 {
        return Err("HANA system must be a 3-character SID plus a 2-digit instance number".into());
    }
    let (sid, instance) = value.split_at(3);
    if !sid.starts_with(|c: char| c.is_ascii_uppercase())
        || !sid.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err("SID must be 3 uppercase letters or digits, starting with a letter".into());
    }
    if !instance.chars().all(|c| c.is_ascii_digit()) {
        return Err("Instance number must be 2 digits".into());
    }
    Ok(value.to_owned())
}

/// Validates a network interface name.
///
/// Linux kernel interface name rules:
/// - Max 15 characters (IFNAMSIZ - 1)
/// - Alphanumeric, dot, dash, underscore only
/// - Cannot be "." or ".."
///
/// # Errors
///
/// Returns `Err` if the name violates kernel constraints.
pub fn validate_interface(name: &str) -> Result<String, String> {
    if name.is_empty() {
        return Err("Interface name cannot be empty".into());
    }
    if name.len() > 15 {
        return Err("Interface name too long (max 15 characters)".into());
    }
    if name == "." || name == ".." {
        return Err("Invalid interface name".into());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err("Interface name contains invalid characters".into());
    }
    Ok(name.to_owned())
}

/// Validates a service source restriction: a bare IP address or a CIDR
/// block.
///
/// # Errors
///
/// Returns `Err` when the value parses as neither.
pub fn validate_source(value: &str) -> Result<String, String> {
    if value.parse::<IpAddr>().is_ok() || value.parse::<ipnetwork::IpNetwork>().is_ok() {
        Ok(value.to_owned())
    } else {
        Err(format!("{value} is not an IP address or CIDR block"))
    }
}
