use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Simulation clock value, in minutes. Fixed-point so that event ordering
/// is exact and identical across platforms.
pub type SimTime = Fixed64;

/// Quantise a duration or timestamp computed in `f64` physics onto the clock.
///
/// Negative and NaN inputs clamp to zero; values beyond the clock range
/// saturate.
#[inline]
pub fn minutes(v: f64) -> SimTime {
    if v.is_nan() || v <= 0.0 {
        return SimTime::ZERO;
    }
    SimTime::saturating_from_num(v)
}

/// Convert a clock value back to `f64` minutes for physics and reporting.
#[inline]
pub fn to_minutes(t: SimTime) -> f64 {
    t.to_num::<f64>()
}

/// Saturating `now + delay`.
#[inline]
pub fn after(now: SimTime, delay: SimTime) -> SimTime {
    now.saturating_add(delay)
}
