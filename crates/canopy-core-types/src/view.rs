//! Visibility scope for properties and checks
//!
//! Every property and check carries a view. The distinguished views are
//! `any` (matches every view during constraint evaluation) and `local`
//! (checks in this view never compile into instances).

use serde::{Deserialize, Serialize};

/// Named visibility scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct View(String);

impl View {
    /// Create a view from a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The `any` view, matching every other view
    pub fn any() -> Self {
        Self("any".to_string())
    }

    /// The `local` view; checks in it are never compiled
    pub fn local() -> Self {
        Self("local".to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the `any` view
    pub fn is_any(&self) -> bool {
        self.0 == "any"
    }

    /// Check if this is the `local` view
    pub fn is_local(&self) -> bool {
        self.0 == "local"
    }

    /// View match rule: equal views match, and `any` matches everything
    pub fn matches(&self, other: &View) -> bool {
        self.is_any() || other.is_any() || self.0 == other.0
    }
}

impl Default for View {
    fn default() -> Self {
        Self::any()
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for View {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_matching() {
        assert!(View::any().matches(&View::new("internal")));
        assert!(View::new("internal").matches(&View::any()));
        assert!(View::new("internal").matches(&View::new("internal")));
        assert!(!View::new("internal").matches(&View::new("external")));
    }

    #[test]
    fn test_local_flag() {
        assert!(View::local().is_local());
        assert!(!View::any().is_local());
    }
}
