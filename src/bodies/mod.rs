mod body_type;
mod motion_properties;
mod rigid_body;

pub use self::body_type::RigidBodyType;
pub use self::motion_properties::MotionProperties;
pub use self::rigid_body::RigidBody;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Index of a body that is not in the active body list (static or sleeping).
///
/// This is the largest possible `u32` so that `min(first, second)` of a body
/// pair always selects the active body when only one of the two is active.
pub const INACTIVE_INDEX: u32 = u32::MAX;

/// Opaque handle identifying a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct BodyId(pub(crate) u32);

impl BodyId {
    /// Sentinel for "no body"
    pub const INVALID: BodyId = BodyId(u32::MAX);

    /// Creates a body id from a raw index
    #[inline]
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index of this body
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    /// Returns whether this id refers to a body
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for BodyId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Degrees of freedom a dynamic body is allowed to move in
pub mod dofs {
    use bitflags::bitflags;

    #[cfg(feature = "serialize")]
    use serde::{Deserialize, Serialize};

    bitflags! {
        /// Flags selecting the translation and rotation axes a body may move along
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
        pub struct AllowedDofs: u8 {
            /// Body can move along the world X axis
            const TRANSLATION_X = 0b000001;

            /// Body can move along the world Y axis
            const TRANSLATION_Y = 0b000010;

            /// Body can move along the world Z axis
            const TRANSLATION_Z = 0b000100;

            /// Body can rotate around the world X axis
            const ROTATION_X = 0b001000;

            /// Body can rotate around the world Y axis
            const ROTATION_Y = 0b010000;

            /// Body can rotate around the world Z axis
            const ROTATION_Z = 0b100000;

            /// Body can move in the XY plane and rotate around Z
            const PLANE_2D = Self::TRANSLATION_X.bits() | Self::TRANSLATION_Y.bits() | Self::ROTATION_Z.bits();

            /// All degrees of freedom
            const ALL = 0b111111;
        }
    }

    impl Default for AllowedDofs {
        fn default() -> Self {
            Self::ALL
        }
    }
}

pub use self::dofs::AllowedDofs;
