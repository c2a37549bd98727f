//! Schema constants and identifier helpers
//!
//! Validation bounds for constructor spec records. Entities reject
//! malformed identifiers and out-of-range names at the construction
//! boundary; everything past it can assume well-formed input.

use uuid::Uuid;

/// Maximum accepted entity name length
pub const NAME_MAX_LEN: usize = 256;

/// Check that an identifier is a well-formed UUID
pub fn valid_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Check that a name is non-empty, within bounds, and not whitespace-only
pub fn valid_name(name: &str) -> bool {
    !name.trim().is_empty() && name.len() <= NAME_MAX_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_id() {
        assert!(valid_id("018f3c2e-1111-7def-8000-000000000001"));
        assert!(!valid_id(""));
        assert!(!valid_id("not-a-uuid"));
    }

    #[test]
    fn test_valid_name() {
        assert!(valid_name("web-frontend"));
        assert!(!valid_name(""));
        assert!(!valid_name("   "));
        assert!(!valid_name(&"x".repeat(NAME_MAX_LEN + 1)));
    }
}
