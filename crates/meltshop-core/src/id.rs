use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a production unit (EAF, LMF, degasser, caster).
    pub struct UnitId;

    /// Identifies an overhead crane.
    pub struct CraneId;

    /// Identifies a ladle car.
    pub struct CarId;

    /// Identifies a ladle in the fleet.
    pub struct LadleId;
}

/// Identifies a heat. Allocated sequentially from 1 by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HeatId(pub u32);

impl std::fmt::Display for HeatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "H{:04}", self.0)
    }
}
