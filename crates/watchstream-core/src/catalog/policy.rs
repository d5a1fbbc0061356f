//! Database naming policy.

use regex::Regex;

use crate::error::Error;

/// Default database naming pattern: a fixed prefix, anything, then `_00`
/// followed by one or more digits.
pub const DEFAULT_DATABASE_PATTERN: &str = r"^cryptobroker_prod_.*_00[0-9]+$";

/// Default collections watched in every qualifying database.
pub const DEFAULT_COLLECTIONS: &[&str] = &["orders", "trades"];

/// Compiled rule deciding which database names qualify.
///
/// Matching is case-sensitive; database names are compared exactly as the
/// store lists them.
#[derive(Debug, Clone)]
pub struct NamingPolicy {
    regex: Regex,
}

impl NamingPolicy {
    /// Compile a policy from a regular expression.
    pub fn new(pattern: &str) -> Result<Self, Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// Compile the default policy.
    pub fn default_policy() -> Result<Self, Error> {
        Self::new(DEFAULT_DATABASE_PATTERN)
    }

    /// Check if a database name qualifies.
    #[inline]
    pub fn matches(&self, database: &str) -> bool {
        self.regex.is_match(database)
    }

    /// The source pattern.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}
