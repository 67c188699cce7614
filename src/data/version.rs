//! Version counters for optimistic concurrency.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonic record version. Starts at 1 and never wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u32);

impl Version {
    pub const INITIAL: Version = Version(1);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// The version after one successful update, or `None` once exhausted.
    pub fn next(self) -> Option<Version> {
        self.0.checked_add(1).map(Version)
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record guarded by a version counter.
pub trait Versioned: Clone + Send + Sync + 'static {
    /// Record kind for logs, e.g. `"movie"`.
    const KIND: &'static str;

    fn id(&self) -> i64;
    fn version(&self) -> Version;
    fn set_version(&mut self, version: Version);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_increments_by_one() {
        assert_eq!(Version::INITIAL.next(), Some(Version::new(2)));
    }

    #[test]
    fn test_next_never_wraps() {
        assert_eq!(Version::new(u32::MAX).next(), None);
    }

    #[test]
    fn test_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&Version::new(7)).unwrap(), "7");
    }
}
