//! Field validators shared by label normalization and the read paths.
//!
//! Every failure names the offending field so callers can attach the
//! message to the right input.

use uuid::Uuid;

const KEY_MIN_LEN: usize = 3;
const KEY_MAX_LEN: usize = 255;
const VALUE_MAX_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value for '{field}': {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Parse an opaque entity identifier into a UUID.
pub fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Uuid::parse_str(trimmed).map_err(|_| ValidationError::new(field, "must be a valid UUID"))
}

/// Validate a label key of the form `prefix/name`.
///
/// The prefix is lowercase ASCII letters, digits, `.` and `-`, and must start
/// and end with a letter or digit. The name may hold any printable text
/// except whitespace, `=` and `!`, which callers use as search separators.
pub fn label_key(field: &str, key: &str) -> Result<(), ValidationError> {
    let len = key.chars().count();
    if len < KEY_MIN_LEN || len > KEY_MAX_LEN {
        return Err(ValidationError::new(
            field,
            format!("must be between {KEY_MIN_LEN} and {KEY_MAX_LEN} characters"),
        ));
    }

    let Some((prefix, name)) = key.split_once('/') else {
        return Err(ValidationError::new(
            field,
            "must be in the format 'prefix/name'",
        ));
    };

    if prefix.is_empty() {
        return Err(ValidationError::new(field, "prefix must not be empty"));
    }
    if !prefix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(ValidationError::new(
            field,
            "prefix may only contain lowercase letters, digits, '.' and '-'",
        ));
    }
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !edge_ok(prefix.chars().next()) || !edge_ok(prefix.chars().last()) {
        return Err(ValidationError::new(
            field,
            "prefix must start and end with a letter or digit",
        ));
    }

    if name.is_empty() {
        return Err(ValidationError::new(field, "name must not be empty"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || *c == '=' || *c == '!')
    {
        return Err(ValidationError::new(
            field,
            format!("name must not contain {bad:?}"),
        ));
    }

    Ok(())
}

/// Validate a label value. The empty string is accepted; it is the
/// tombstone marker.
pub fn label_value(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > VALUE_MAX_LEN {
        return Err(ValidationError::new(
            field,
            format!("must be at most {VALUE_MAX_LEN} characters"),
        ));
    }
    if value.chars().any(char::is_control) {
        return Err(ValidationError::new(
            field,
            "must not contain control characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uuid_accepts_surrounding_whitespace() {
        let id = Uuid::new_v4();
        let parsed = parse_uuid("UserID", &format!("  {id} ")).expect("valid uuid");
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_uuid_names_the_field() {
        let err = parse_uuid("ServiceID", "not-a-uuid").unwrap_err();
        assert_eq!(err.field, "ServiceID");
        assert!(err.to_string().contains("ServiceID"));

        let err = parse_uuid("UserID", "").unwrap_err();
        assert_eq!(err.message, "must not be empty");
    }

    #[test]
    fn label_key_accepts_namespaced_keys() {
        for key in ["team/department", "org/team", "a.b-c/Some_Name", "x1/y"] {
            label_key("Key", key).unwrap_or_else(|e| panic!("{key}: {e}"));
        }
    }

    #[test]
    fn label_key_rejects_malformed_keys() {
        let cases = [
            "ab",                 // too short
            "nodelimiter",        // no slash
            "/name",              // empty prefix
            "Team/department",    // uppercase prefix
            "-team/department",   // prefix edge
            "team-/department",   // prefix edge
            "team/",              // empty name
            "team/has space",     // whitespace
            "team/a=b",           // search separator
            "team/a!b",           // search separator
        ];
        for key in cases {
            assert!(label_key("Key", key).is_err(), "{key} should be rejected");
        }

        let long = format!("team/{}", "x".repeat(KEY_MAX_LEN));
        assert!(label_key("Key", &long).is_err());
    }

    #[test]
    fn label_value_allows_empty_and_rejects_control_chars() {
        label_value("Value", "").expect("empty is the tombstone");
        label_value("Value", "engineering").expect("plain text");
        assert!(label_value("Value", "a\u{7}b").is_err());
        assert!(label_value("Value", &"v".repeat(VALUE_MAX_LEN + 1)).is_err());
    }
}
