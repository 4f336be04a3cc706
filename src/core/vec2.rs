//! Fixed-Point 2D Vector
//!
//! Ground-plane world positions. The simulation is top-down, so height
//! never participates in gameplay.

use std::fmt;
use std::ops::{Add, Sub};
use serde::{Serialize, Deserialize};

use super::fixed::{Fixed, FIXED_SCALE, fixed_mul, fixed_div, fixed_sqrt, from_int, to_float};

/// 2D vector with Q16.16 components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FixedVec2 {
    /// X component
    pub x: Fixed,
    /// Y component
    pub y: Fixed,
}

impl FixedVec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create from fixed-point components.
    #[inline]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create from whole units.
    #[inline]
    pub const fn from_ints(x: i32, y: i32) -> Self {
        Self {
            x: from_int(x),
            y: from_int(y),
        }
    }

    /// Component-wise wrapping add.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_add(other.x),
            y: self.y.wrapping_add(other.y),
        }
    }

    /// Component-wise wrapping subtract.
    #[inline]
    pub fn sub(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_sub(other.x),
            y: self.y.wrapping_sub(other.y),
        }
    }

    /// Scale by a fixed-point scalar.
    #[inline]
    pub fn scale(self, scalar: Fixed) -> Self {
        Self {
            x: fixed_mul(self.x, scalar),
            y: fixed_mul(self.y, scalar),
        }
    }

    /// Squared length, saturating at `Fixed::MAX` (about 181 units).
    #[inline]
    pub fn length_squared(self) -> Fixed {
        let (x, y) = (self.x as i64, self.y as i64);
        let wide = (x * x).saturating_add(y * y) >> FIXED_SCALE;
        wide.min(Fixed::MAX as i64) as Fixed
    }

    /// Length.
    #[inline]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.length_squared())
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Self) -> Fixed {
        other.sub(self).length_squared()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Unit vector in the same direction, or ZERO for a zero vector.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0 {
            return Self::ZERO;
        }
        Self {
            x: fixed_div(self.x, len),
            y: fixed_div(self.y, len),
        }
    }

    /// Step from `self` toward `target` by at most `max_step`.
    ///
    /// Lands exactly on `target` when it is within reach.
    pub fn move_towards(self, target: Self, max_step: Fixed) -> Self {
        let delta = target.sub(self);
        let distance = delta.length();
        if distance <= max_step || distance == 0 {
            return target;
        }
        self.add(delta.normalize().scale(max_step))
    }

    /// Convert to floats for display.
    #[inline]
    pub fn to_floats(self) -> (f32, f32) {
        (to_float(self.x), to_float(self.y))
    }
}

impl Add for FixedVec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        FixedVec2::add(self, rhs)
    }
}

impl Sub for FixedVec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        FixedVec2::sub(self, rhs)
    }
}

impl fmt::Debug for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.to_floats();
        write!(f, "FixedVec2({:.3}, {:.3})", x, y)
    }
}
