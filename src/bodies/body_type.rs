#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Type of rigid body, determining how it behaves in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum RigidBodyType {
    /// Dynamic bodies are fully simulated and respond to constraint impulses
    Dynamic,

    /// Kinematic bodies move with a user-set velocity but ignore impulses
    Kinematic,

    /// Static bodies never move and are never part of an island
    Static,
}

impl RigidBodyType {
    /// Returns true for bodies that respond to impulses
    #[inline]
    pub fn is_dynamic(self) -> bool {
        self == Self::Dynamic
    }

    /// Returns true for bodies that have a velocity (dynamic and kinematic)
    #[inline]
    pub fn is_moving(self) -> bool {
        self != Self::Static
    }
}
