#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// How the spring strength of a soft constraint is specified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum SpringMode {
    /// Oscillation frequency (Hz) and damping ratio, independent of the body masses
    #[default]
    FrequencyAndDamping,

    /// Stiffness (N/m) and damping (N·s/m) as in `F = -k * x - c * v`
    StiffnessAndDamping,
}

/// Settings for a soft constraint.
///
/// A spring with a frequency or stiffness of zero (or less) turns the constraint rigid.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SpringSettings {
    /// How `frequency_or_stiffness` is interpreted
    pub mode: SpringMode,

    /// Frequency (Hz) in `FrequencyAndDamping` mode, stiffness (N/m) otherwise
    pub frequency_or_stiffness: f32,

    /// Damping ratio (0 = no damping, 1 = critical) in `FrequencyAndDamping` mode,
    /// damping coefficient (N·s/m) otherwise
    pub damping: f32,
}

impl SpringSettings {
    /// Creates spring settings with an explicit mode
    pub fn new(mode: SpringMode, frequency_or_stiffness: f32, damping: f32) -> Self {
        Self {
            mode,
            frequency_or_stiffness,
            damping,
        }
    }

    /// A spring oscillating at `frequency` Hz with the given damping ratio
    pub fn with_frequency(frequency: f32, damping_ratio: f32) -> Self {
        Self::new(SpringMode::FrequencyAndDamping, frequency, damping_ratio)
    }

    /// A spring with stiffness `k` and damping coefficient `c`
    pub fn with_stiffness(stiffness: f32, damping: f32) -> Self {
        Self::new(SpringMode::StiffnessAndDamping, stiffness, damping)
    }

    /// A rigid constraint
    pub fn rigid() -> Self {
        Self::with_frequency(0.0, 0.0)
    }

    /// Returns the frequency, only meaningful in `FrequencyAndDamping` mode
    #[inline]
    pub fn frequency(&self) -> f32 {
        debug_assert_eq!(self.mode, SpringMode::FrequencyAndDamping);
        self.frequency_or_stiffness
    }

    /// Returns the stiffness, only meaningful in `StiffnessAndDamping` mode
    #[inline]
    pub fn stiffness(&self) -> f32 {
        debug_assert_eq!(self.mode, SpringMode::StiffnessAndDamping);
        self.frequency_or_stiffness
    }

    /// Returns true if the spring softens the constraint
    #[inline]
    pub fn has_stiffness(&self) -> bool {
        self.frequency_or_stiffness > 0.0
    }
}

impl Default for SpringSettings {
    fn default() -> Self {
        Self::rigid()
    }
}
