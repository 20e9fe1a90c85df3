//! Best-effort typing of string-valued properties.
//!
//! Used only for external systems whose native property values are strings
//! (notification fan-out and the pub/sub log).

use super::{PropertyMap, TypedValue};

/// Parse a raw string property into the most specific [`TypedValue`].
///
/// - `true` / `false` (any case) become booleans
/// - tokens containing `.` that parse as floats become `Float64`
/// - integer tokens become `Int32`, or `Int64` when they do not fit 32 bits
/// - everything else stays a string
pub fn parse_value(raw: &str) -> TypedValue {
    if raw.eq_ignore_ascii_case("true") {
        return TypedValue::Boolean(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return TypedValue::Boolean(false);
    }

    if raw.contains('.') {
        if let Ok(v) = raw.parse::<f64>() {
            return TypedValue::Float64(v);
        }
        return TypedValue::String(raw.to_string());
    }

    if let Ok(v) = raw.parse::<i32>() {
        return TypedValue::Int32(v);
    }
    if let Ok(v) = raw.parse::<i64>() {
        return TypedValue::Int64(v);
    }

    TypedValue::String(raw.to_string())
}

/// Convert a sequence of string properties into a typed property map
pub fn parse_properties<I, K, V>(properties: I) -> PropertyMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: AsRef<str>,
{
    properties
        .into_iter()
        .map(|(k, v)| (k.into(), parse_value(v.as_ref())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("true", TypedValue::Boolean(true) ; "lower true")]
    #[test_case("TRUE", TypedValue::Boolean(true) ; "upper true")]
    #[test_case("False", TypedValue::Boolean(false) ; "mixed false")]
    #[test_case("12", TypedValue::Int32(12) ; "int")]
    #[test_case("-40", TypedValue::Int32(-40) ; "negative int")]
    #[test_case("4294967296", TypedValue::Int64(4_294_967_296) ; "wide int")]
    #[test_case("1.5", TypedValue::Float64(1.5) ; "float")]
    #[test_case("abc", TypedValue::String("abc".into()) ; "plain string")]
    #[test_case("1.2.3", TypedValue::String("1.2.3".into()) ; "dotted version")]
    #[test_case("", TypedValue::String(String::new()) ; "empty")]
    #[test_case("yes", TypedValue::String("yes".into()) ; "not a bool")]
    fn test_parse_value(raw: &str, expected: TypedValue) {
        assert_eq!(parse_value(raw), expected);
    }

    #[test]
    fn test_parse_properties() {
        let map = parse_properties([("qty", "3"), ("express", "true"), ("note", "fragile")]);
        assert_eq!(map.get("qty"), Some(&TypedValue::Int32(3)));
        assert_eq!(map.get("express"), Some(&TypedValue::Boolean(true)));
        assert_eq!(map.get("note"), Some(&TypedValue::from("fragile")));
    }
}
