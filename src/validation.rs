//! Small validation helpers used by [`crate::config::LoggerConfig::validate`].
use std::net::IpAddr;
use std::ops::RangeInclusive;

/// Validates if a given u16 value is a usable listening port.
/// By type, the port is already within the 0-65535 range.
/// This function checks that the port is not 0, which would ask the OS for an ephemeral port.
///
/// # Arguments
///
/// * `port` - The u16 value to validate.
///
/// # Returns
///
/// * `Ok(())` if the port is valid.
/// * `Err(&'static str)` if the port is invalid.
pub fn is_valid_port(port: u16) -> Result<(), &'static str> {
    if port > 0 {
        Ok(())
    } else {
        Err("Port number must be greater than 0")
    }
}

/// Validates if a given string is a valid IP address.
pub fn is_valid_ip(ip: &str) -> Result<(), &'static str> {
    ip.parse::<IpAddr>().map(|_| ()).map_err(|_| "Invalid IP address")
}

/// Validates if a given string is a valid directory path.
pub fn is_valid_path(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("File path cannot be empty");
    }
    if path.contains('\0') {
        return Err("File path cannot contain null bytes");
    }
    Ok(())
}

/// Validates if a given value is within a specified numeric range.
///
/// # Arguments
///
/// * `value` - The value to validate.
/// * `range` - The inclusive range to validate against.
pub fn is_in_range<T: PartialOrd>(value: T, range: RangeInclusive<T>) -> Result<(), &'static str> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err("Value is outside the specified range")
    }
}

/// Validates if a given string is not empty.
pub fn is_not_empty(value: &str) -> Result<(), &'static str> {
    if !value.is_empty() {
        Ok(())
    } else {
        Err("Value cannot be empty")
    }
}

/// Validates a CSV column name.
///
/// Column names end up verbatim in the log header, so they must not contain the field
/// separator, whitespace or control characters.
pub fn is_valid_column_name(name: &str) -> Result<(), &'static str> {
    is_not_empty(name)?;
    if name
        .chars()
        .any(|c| c == ',' || c.is_whitespace() || c.is_control())
    {
        return Err("Column name cannot contain commas, whitespace or control characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_zero_is_rejected() {
        assert!(is_valid_port(0).is_err());
        assert!(is_valid_port(23).is_ok());
    }

    #[test]
    fn ip_addresses() {
        assert!(is_valid_ip("0.0.0.0").is_ok());
        assert!(is_valid_ip("::1").is_ok());
        assert!(is_valid_ip("insole.local").is_err());
    }

    #[test]
    fn ranges() {
        assert!(is_in_range(5, 1..=10).is_ok());
        assert!(is_in_range(0, 1..=10).is_err());
    }

    #[test]
    fn column_names() {
        assert!(is_valid_column_name("f1LV").is_ok());
        assert!(is_valid_column_name("").is_err());
        assert!(is_valid_column_name("f1,LV").is_err());
        assert!(is_valid_column_name("f1 LV").is_err());
    }

    #[test]
    fn paths() {
        assert!(is_valid_path("data").is_ok());
        assert!(is_valid_path("").is_err());
        assert!(is_valid_path("da\0ta").is_err());
    }
}
