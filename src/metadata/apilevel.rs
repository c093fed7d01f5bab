//! Platform API levels and applicability windows.
//!
//! [`ApiLevelRange`] keys the API-level dependent parts of a desugared library specification.
//! Its ordering is total and deterministic, so specification tables keyed by ranges iterate in
//! a stable order:
//!
//! ```rust
//! use vivify::metadata::apilevel::{AndroidApiLevel, ApiLevelRange};
//!
//! let mut ranges = vec![
//!     ApiLevelRange::new(AndroidApiLevel::new(30), None),
//!     ApiLevelRange::new(AndroidApiLevel::new(30), Some(AndroidApiLevel::new(21))),
//!     ApiLevelRange::new(AndroidApiLevel::new(29), Some(AndroidApiLevel::new(21))),
//! ];
//! ranges.sort();
//! assert_eq!(ranges[0].below_or_equal().level(), 29);
//! assert!(ranges[1].greater_or_equal().is_some());
//! assert!(ranges[2].greater_or_equal().is_none());
//! ```

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

/// A platform API level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AndroidApiLevel(u32);

impl AndroidApiLevel {
    /// Android 1.0
    pub const B: AndroidApiLevel = AndroidApiLevel(1);
    /// Android 5.0, first level with `java.util.Objects` fully available
    pub const L: AndroidApiLevel = AndroidApiLevel(21);
    /// Android 7.0, first level supporting default and static interface methods
    pub const N: AndroidApiLevel = AndroidApiLevel(24);
    /// Android 8.0, first level shipping `java.time`
    pub const O: AndroidApiLevel = AndroidApiLevel(26);

    /// Creates an API level.
    #[must_use]
    pub const fn new(level: u32) -> Self {
        AndroidApiLevel(level)
    }

    /// The numeric level.
    #[must_use]
    pub const fn level(self) -> u32 {
        self.0
    }
}

impl Default for AndroidApiLevel {
    fn default() -> Self {
        AndroidApiLevel::B
    }
}

impl fmt::Display for AndroidApiLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An applicability window of API levels: `greater_or_equal <= level <= below_or_equal`.
///
/// A missing lower bound means the window is open below.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ApiLevelRange {
    below_or_equal: AndroidApiLevel,
    greater_or_equal: Option<AndroidApiLevel>,
}

impl ApiLevelRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(
        below_or_equal: AndroidApiLevel,
        greater_or_equal: Option<AndroidApiLevel>,
    ) -> Self {
        ApiLevelRange {
            below_or_equal,
            greater_or_equal,
        }
    }

    /// Inclusive upper bound.
    #[must_use]
    pub const fn below_or_equal(&self) -> AndroidApiLevel {
        self.below_or_equal
    }

    /// Inclusive lower bound, if any.
    #[must_use]
    pub const fn greater_or_equal(&self) -> Option<AndroidApiLevel> {
        self.greater_or_equal
    }

    /// True if `level` falls within the window.
    #[must_use]
    pub fn contains(&self, level: AndroidApiLevel) -> bool {
        level <= self.below_or_equal && self.greater_or_equal.is_none_or(|lower| level >= lower)
    }
}

impl Ord for ApiLevelRange {
    fn cmp(&self, other: &Self) -> Ordering {
        self.below_or_equal
            .cmp(&other.below_or_equal)
            .then_with(|| match (self.greater_or_equal, other.greater_or_equal) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(lhs), Some(rhs)) => lhs.cmp(&rhs),
            })
    }
}

impl PartialOrd for ApiLevelRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ApiLevelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.greater_or_equal {
            Some(lower) => write!(f, "[{lower}, {}]", self.below_or_equal),
            None => write!(f, "[.., {}]", self.below_or_equal),
        }
    }
}
