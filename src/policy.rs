//! Cache policies controlling how staleness and locking affect hit/miss
//! classification.
//!
//! Policies are a bitmask so they can combine (`OLD | PRECOMPUTE`). When both
//! apply, first match wins in the miss decision: `OLD` dominates while the key
//! is locked.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde_json::Value;
use time::Duration;

/// Bitmask of cache policies for a read.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CachePolicy(u8);

impl CachePolicy {
    /// Plain hit/miss: absent or expired means miss.
    pub const NONE: Self = Self(0);
    /// Serve the stale value while another party holds the lock.
    pub const OLD: Self = Self(1 << 1);
    /// Regenerate proactively within a window before actual expiry.
    pub const PRECOMPUTE: Self = Self(1 << 2);
    /// Return a fallback value immediately while the key is locked.
    pub const VALUE: Self = Self(1 << 3);

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for CachePolicy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CachePolicy {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (bit, name) in [
            (Self::OLD, "OLD"),
            (Self::PRECOMPUTE, "PRECOMPUTE"),
            (Self::VALUE, "VALUE"),
        ] {
            if self.contains(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Auxiliary parameter whose meaning depends on the active policy.
///
/// An explicit enum rather than an untyped scalar: the precompute window and
/// the fallback value cannot be confused for one another.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PolicyData {
    #[default]
    None,
    /// How long before actual expiry `PRECOMPUTE` starts reporting a miss.
    PrecomputeWindow(Duration),
    /// Value returned by `VALUE` reads while the key is locked.
    Fallback(Value),
}

impl PolicyData {
    /// Shorthand for a precompute window expressed in seconds.
    pub fn window_secs(secs: i64) -> Self {
        Self::PrecomputeWindow(Duration::seconds(secs))
    }

    /// Shorthand for a fallback value.
    pub fn fallback_value(value: impl Into<Value>) -> Self {
        Self::Fallback(value.into())
    }

    pub(crate) fn precompute_window_ms(&self) -> Option<i64> {
        match self {
            Self::PrecomputeWindow(window) => Some(window.whole_milliseconds() as i64),
            _ => None,
        }
    }

    pub(crate) fn fallback(&self) -> Option<&Value> {
        match self {
            Self::Fallback(value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_combine() {
        let policy = CachePolicy::OLD | CachePolicy::PRECOMPUTE;
        assert!(policy.contains(CachePolicy::OLD));
        assert!(policy.contains(CachePolicy::PRECOMPUTE));
        assert!(!policy.contains(CachePolicy::VALUE));
    }

    #[test]
    fn none_contains_nothing() {
        assert!(!CachePolicy::NONE.contains(CachePolicy::OLD));
        assert!(!CachePolicy::NONE.contains(CachePolicy::VALUE));
    }

    #[test]
    fn debug_lists_active_bits() {
        assert_eq!(format!("{:?}", CachePolicy::NONE), "NONE");
        let policy = CachePolicy::OLD | CachePolicy::VALUE;
        assert_eq!(format!("{policy:?}"), "OLD|VALUE");
    }

    #[test]
    fn policy_data_accessors() {
        assert_eq!(PolicyData::window_secs(110).precompute_window_ms(), Some(110_000));
        assert_eq!(PolicyData::None.precompute_window_ms(), None);

        let fallback = PolicyData::fallback_value("stale");
        assert_eq!(fallback.fallback(), Some(&serde_json::json!("stale")));
        assert_eq!(PolicyData::None.fallback(), None);
    }
}
