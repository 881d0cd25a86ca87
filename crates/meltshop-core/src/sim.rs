//! Simulation step results and state hashing.

use crate::fixed::SimTime;

// ---------------------------------------------------------------------------
// Advance result
// ---------------------------------------------------------------------------

/// Result of an `Engine::advance()` or `Engine::step()` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceResult {
    /// Number of task resumptions executed.
    pub steps_run: u64,
    /// Clock value after the call.
    pub now: SimTime,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A deterministic hash of observable plant state, used to compare runs.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    /// Hash a clock value by its exact fixed-point bits.
    pub fn write_time(&mut self, v: SimTime) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn write_str(&mut self, s: &str) {
        self.write(s.as_bytes());
        self.write(&[0xff]);
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_hash_deterministic() {
        let mut h1 = StateHash::new();
        h1.write_u64(42);
        h1.write_str("bay1_EAF_1");
        let mut h2 = StateHash::new();
        h2.write_u64(42);
        h2.write_str("bay1_EAF_1");
        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_sensitive_to_order() {
        let mut h1 = StateHash::new();
        h1.write_u32(1);
        h1.write_u32(2);
        let mut h2 = StateHash::new();
        h2.write_u32(2);
        h2.write_u32(1);
        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn string_terminator_separates_fields() {
        let mut h1 = StateHash::new();
        h1.write_str("ab");
        h1.write_str("c");
        let mut h2 = StateHash::new();
        h2.write_str("a");
        h2.write_str("bc");
        assert_ne!(h1.finish(), h2.finish());
    }
}
