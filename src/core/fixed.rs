//! Q16.16 Fixed-Point Arithmetic
//!
//! World-space scalars (positions, speeds, radii) are Q16.16 integers so
//! that server, clients and resimulation passes produce bit-identical
//! results. Floats only appear when converting for display.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  [S][IIIIIIIIIIIIIII][FFFFFFFFFFFFFFFF]  (i32)              │
//! │  Range: -32768.0 to +32767.99998                            │
//! │  Precision: 1/65536                                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

/// Q16.16 fixed-point number stored as i32.
pub type Fixed = i32;

/// Number of fractional bits.
pub const FIXED_SCALE: i32 = 16;

/// 1.0 in fixed-point.
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE;

/// 0.5 in fixed-point.
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1;

/// Convert a compile-time float to fixed-point.
///
/// Only for constants and configuration; never inside a tick.
///
/// ```
/// use lane_clash::core::fixed::{to_fixed, FIXED_ONE};
/// const SPEED: i32 = to_fixed(2.5);
/// assert_eq!(SPEED, FIXED_ONE * 2 + FIXED_ONE / 2);
/// ```
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FIXED_ONE as f64)) as Fixed
}

/// Whole units to fixed-point.
#[inline]
pub const fn from_int(units: i32) -> Fixed {
    units << FIXED_SCALE
}

/// Fixed-point to float, for display only.
#[inline]
pub fn to_float(f: Fixed) -> f32 {
    f as f32 / FIXED_ONE as f32
}

/// Multiply two fixed-point numbers (i64 intermediate, truncating).
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    (((a as i64) * (b as i64)) >> FIXED_SCALE) as Fixed
}

/// Divide two fixed-point numbers. Divide-by-zero yields 0.
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        return 0;
    }
    (((a as i64) << FIXED_SCALE) / b as i64) as Fixed
}

/// Square root of a fixed-point number. Non-positive input yields 0.
///
/// Exact integer square root of the widened value, so the result does not
/// depend on an iteration count.
#[inline]
pub fn fixed_sqrt(x: Fixed) -> Fixed {
    if x <= 0 {
        return 0;
    }
    isqrt_u64((x as u64) << FIXED_SCALE) as Fixed
}

/// Floor square root of a u64 (bit-by-bit).
fn isqrt_u64(n: u64) -> u64 {
    let mut remainder = n;
    let mut root = 0u64;
    let mut bit = 1u64 << 62;
    while bit > remainder {
        bit >>= 2;
    }
    while bit != 0 {
        if remainder >= root + bit {
            remainder -= root + bit;
            root = (root >> 1) + bit;
        } else {
            root >>= 1;
        }
        bit >>= 2;
    }
    root
}
