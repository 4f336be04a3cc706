//! Simulation Tick
//!
//! The discrete time base shared by server and clients.
//!
//! ## Encoding
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  raw u32: [IIIIIIIIIIIIIIIIIIIIIIIIIIIIIII][V]              │
//! │            └────── 31-bit tick index ──────┘ └─ valid bit   │
//! │                                                             │
//! │  raw == 0        → INVALID                                  │
//! │  index wraps at 2^31                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ordering is defined by the signed 31-bit difference between two ticks,
//! never by raw numeric comparison, so a long-running session survives
//! wraparound. `SimulationTick` deliberately does not implement `PartialOrd`.

use std::cmp::Ordering;
use std::fmt;
use serde::{Serialize, Deserialize};

/// Mask for the 31-bit tick index.
const INDEX_MASK: u32 = 0x7FFF_FFFF;

/// A wrapping simulation step number.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SimulationTick(u32);

impl SimulationTick {
    /// Sentinel for "no tick".
    pub const INVALID: Self = Self(0);

    /// Create a valid tick from a tick index (wrapped to 31 bits).
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(((index & INDEX_MASK) << 1) | 1)
    }

    /// Is this a real tick (not [`SimulationTick::INVALID`])?
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// The tick index of a valid tick.
    #[inline]
    pub fn tick_index(self) -> u32 {
        debug_assert!(self.is_valid(), "tick_index() on an invalid tick");
        self.0 >> 1
    }

    /// This tick advanced by `n` steps.
    #[inline]
    #[must_use]
    pub fn add(self, n: u32) -> Self {
        debug_assert!(self.is_valid(), "add() on an invalid tick");
        Self::new(self.tick_index().wrapping_add(n))
    }

    /// This tick moved back by `n` steps.
    #[inline]
    #[must_use]
    pub fn subtract(self, n: u32) -> Self {
        debug_assert!(self.is_valid(), "subtract() on an invalid tick");
        Self::new(self.tick_index().wrapping_sub(n))
    }

    /// Signed number of ticks from `other` to `self`.
    ///
    /// Positive when `self` is newer. Only meaningful when both ticks are
    /// within 2^30 steps of each other.
    #[inline]
    pub fn ticks_since(self, other: Self) -> i32 {
        debug_assert!(self.is_valid() && other.is_valid(), "ticks_since() on an invalid tick");
        // Both raw values carry the valid bit, so the raw difference is the
        // index difference shifted left by one; an arithmetic shift restores it.
        (self.0.wrapping_sub(other.0) as i32) >> 1
    }

    /// Is `self` strictly newer than `other`?
    #[inline]
    pub fn is_newer_than(self, other: Self) -> bool {
        self.ticks_since(other) > 0
    }

    /// Has this tick reached `target` (equal to or newer than it)?
    #[inline]
    pub fn has_reached(self, target: Self) -> bool {
        self == target || self.is_newer_than(target)
    }

    /// Wrap-aware ordering for sorting ticks that lie within 2^30 steps of
    /// each other. [`SimulationTick::INVALID`] sorts before every valid tick.
    #[inline]
    pub fn wrapping_cmp(self, other: Self) -> Ordering {
        match (self.is_valid(), other.is_valid()) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => self.ticks_since(other).cmp(&0),
        }
    }

    /// Raw encoded value (for hashing and wire formats).
    #[inline]
    pub const fn to_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for SimulationTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "SimulationTick({})", self.tick_index())
        } else {
            write!(f, "SimulationTick(INVALID)")
        }
    }
}

impl fmt::Display for SimulationTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.tick_index())
        } else {
            write!(f, "invalid")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_invalid_tick() {
        assert!(!SimulationTick::INVALID.is_valid());
        assert!(SimulationTick::new(0).is_valid());
        assert_eq!(SimulationTick::default(), SimulationTick::INVALID);
        assert_eq!(SimulationTick::INVALID.to_string(), "invalid");
    }

    #[test]
    fn test_add_subtract() {
        let t = SimulationTick::new(1000);
        assert_eq!(t.add(100).tick_index(), 1100);
        assert_eq!(t.subtract(1).tick_index(), 999);
        assert_eq!(t.add(5).subtract(5), t);
    }

    #[test]
    fn test_is_newer_than() {
        let a = SimulationTick::new(10);
        let b = SimulationTick::new(11);
        assert!(b.is_newer_than(a));
        assert!(!a.is_newer_than(b));
        assert!(!a.is_newer_than(a));
        assert!(a.has_reached(a));
        assert!(b.has_reached(a));
        assert!(!a.has_reached(b));
    }

    #[test]
    fn test_wraparound_ordering() {
        let last = SimulationTick::new(INDEX_MASK);
        let wrapped = last.add(1);
        assert_eq!(wrapped.tick_index(), 0);
        assert!(wrapped.is_newer_than(last));
        assert_eq!(wrapped.ticks_since(last), 1);
        assert_eq!(last.ticks_since(wrapped), -1);
    }

    #[test]
    fn test_wrapping_cmp() {
        let last = SimulationTick::new(INDEX_MASK);
        let wrapped = last.add(1);
        assert_eq!(wrapped.wrapping_cmp(last), Ordering::Greater);
        assert_eq!(last.wrapping_cmp(wrapped), Ordering::Less);
        assert_eq!(last.wrapping_cmp(last), Ordering::Equal);

        let invalid = SimulationTick::INVALID;
        assert_eq!(invalid.wrapping_cmp(SimulationTick::new(0)), Ordering::Less);
        assert_eq!(wrapped.wrapping_cmp(invalid), Ordering::Greater);
        assert_eq!(invalid.wrapping_cmp(invalid), Ordering::Equal);
    }

    proptest! {
        #[test]
        fn prop_add_is_newer(start in 0u32..=INDEX_MASK, n in 1u32..(1 << 30)) {
            let t = SimulationTick::new(start);
            let later = t.add(n);
            prop_assert!(later.is_newer_than(t));
            prop_assert!(!t.is_newer_than(later));
            prop_assert_eq!(later.ticks_since(t), n as i32);
            prop_assert_eq!(later.subtract(n), t);
        }
    }
}
