/// Faults raised inside an equipment state machine.
///
/// Recoverable faults send the equipment through its error state and a
/// short cooldown, keeping queued work. Critical faults force it straight
/// to idle with every in-flight reference cleared and apply a longer
/// cooldown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EquipmentFault {
    /// A task step ran with no task assigned.
    #[error("no active task in state {state}")]
    NoActiveTask { state: &'static str },

    /// A step needed a ladle that is not held.
    #[error("no ladle held while {state}")]
    MissingLadle { state: &'static str },

    /// A pickup or drop-off location could not be resolved.
    #[error("site '{site}' cannot be resolved")]
    UnknownSite { site: String },

    /// The path planner refused a route.
    #[error("no path: {detail}")]
    NoPath { detail: String },

    /// Internal bookkeeping disagrees with itself.
    #[error("invariant violated: {detail}")]
    Invariant { detail: String },
}

impl EquipmentFault {
    pub fn is_critical(&self) -> bool {
        matches!(self, EquipmentFault::Invariant { .. })
    }

    /// Cooldown before normal operation resumes, minutes.
    pub fn cooldown(&self) -> f64 {
        if self.is_critical() {
            CRITICAL_COOLDOWN
        } else {
            RECOVERABLE_COOLDOWN
        }
    }
}

pub const RECOVERABLE_COOLDOWN: f64 = 3.0;
pub const CRITICAL_COOLDOWN: f64 = 5.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invariant_faults_are_critical() {
        let recoverable = EquipmentFault::MissingLadle { state: "lowering" };
        let critical = EquipmentFault::Invariant {
            detail: "ladle held while lifting".into(),
        };
        assert!(!recoverable.is_critical());
        assert!(critical.is_critical());
        assert_eq!(recoverable.cooldown(), 3.0);
        assert_eq!(critical.cooldown(), 5.0);
    }

    #[test]
    fn messages_carry_context() {
        let f = EquipmentFault::UnknownSite {
            site: "bay9_LMF_1".into(),
        };
        assert_eq!(f.to_string(), "site 'bay9_LMF_1' cannot be resolved");
    }
}
