//! Local destination names and wildcard link names
//!
//! Outbound link names may be filters over the broker's destination
//! hierarchy:
//! - `/` separates levels
//! - `+` matches exactly one level and must occupy the entire level
//! - `#` matches zero or more trailing levels and must be the last level
//! - Destinations starting with `$` are not matched by a leading wildcard

/// Whether a link name contains wildcard levels
pub fn is_filter(name: &str) -> bool {
    name.split('/').any(|level| level == "+" || level == "#")
}

/// Validate a local destination name or link filter
pub fn validate_link_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("destination name cannot be empty");
    }

    if name.contains('\0') {
        return Err("destination name cannot contain null character");
    }

    let levels: Vec<&str> = name.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') {
            if *level != "#" {
                return Err("multi-level wildcard must occupy entire level");
            }
            if i != levels.len() - 1 {
                return Err("multi-level wildcard must be last level");
            }
        }

        if level.contains('+') && *level != "+" {
            return Err("single-level wildcard must occupy entire level");
        }
    }

    Ok(())
}

/// Check if a link filter matches a destination name
pub fn matches_filter(destination: &str, filter: &str) -> bool {
    if destination.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut levels = destination.split('/');
    let mut filter_levels = filter.split('/');

    loop {
        match (filter_levels.next(), levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(d)) if f == d => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_link_name() {
        assert!(validate_link_name("orders").is_ok());
        assert!(validate_link_name("local/orders").is_ok());
        assert!(validate_link_name("sensors/+/temp").is_ok());
        assert!(validate_link_name("sensors/#").is_ok());
        assert!(validate_link_name("#").is_ok());

        assert!(validate_link_name("").is_err());
        assert!(validate_link_name("sensors+").is_err());
        assert!(validate_link_name("sensors/#/temp").is_err());
        assert!(validate_link_name("a#").is_err());
    }

    #[test]
    fn test_is_filter() {
        assert!(is_filter("sensors/#"));
        assert!(is_filter("+/temp"));
        assert!(!is_filter("local.orders"));
        assert!(!is_filter("a/b/c"));
    }

    #[test]
    fn test_matches_filter() {
        assert!(matches_filter("orders", "orders"));
        assert!(!matches_filter("orders", "orders/eu"));
        assert!(!matches_filter("orders/eu", "orders"));

        assert!(matches_filter("sensors/1/temp", "sensors/+/temp"));
        assert!(!matches_filter("sensors/1/2/temp", "sensors/+/temp"));
        assert!(!matches_filter("sensors", "+/+"));

        assert!(matches_filter("sensors", "sensors/#"));
        assert!(matches_filter("sensors/1/temp", "sensors/#"));
        assert!(matches_filter("anything/at/all", "#"));
        assert!(!matches_filter("other/1", "sensors/#"));

        assert!(!matches_filter("$SYS/uptime", "#"));
        assert!(!matches_filter("$SYS/uptime", "+/uptime"));
        assert!(matches_filter("$SYS/uptime", "$SYS/+"));
    }
}
