use crate::bodies::INACTIVE_INDEX;
use crate::error::PhysicsError;
use crate::math::Vec3;
use crate::Result;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Configuration parameters for the physics simulation
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct PhysicsSettings {
    /// The maximum number of bodies that can be active at the same time
    pub max_active_bodies: u32,

    /// The maximum number of contacts that can be queued for one step
    pub max_contacts: u32,

    /// Size in bytes of the scratch allocator used during a step
    pub temp_allocator_size: usize,

    /// The number of iterations to run for solving velocity constraints
    pub num_velocity_steps: u32,

    /// The default number of iterations to run for solving position constraints.
    /// Bodies can ask for more. Must be less than 256.
    pub num_position_steps: u32,

    /// The fraction of the position error corrected per position iteration
    pub baumgarte: f32,

    /// Constant gravity applied to dynamic bodies
    pub gravity: Vec3,

    /// Whether to reuse the previous step's impulses as a starting point
    pub use_warm_start: bool,

    /// Number of worker threads, 0 to use one per available core
    pub worker_threads: usize,
}

impl PhysicsSettings {
    /// Checks that all settings are within range
    pub fn validate(&self) -> Result<()> {
        if self.max_active_bodies == 0 || self.max_active_bodies >= INACTIVE_INDEX {
            return Err(PhysicsError::InvalidParameter(format!(
                "max_active_bodies must be in 1..{}, got {}",
                INACTIVE_INDEX, self.max_active_bodies
            )));
        }

        if self.num_velocity_steps == 0 {
            return Err(PhysicsError::InvalidParameter(
                "num_velocity_steps must be at least 1".to_string(),
            ));
        }

        if self.num_position_steps >= 256 {
            return Err(PhysicsError::InvalidParameter(format!(
                "num_position_steps must be less than 256, got {}",
                self.num_position_steps
            )));
        }

        if !(0.0..=1.0).contains(&self.baumgarte) {
            return Err(PhysicsError::InvalidParameter(format!(
                "baumgarte must be in [0, 1], got {}",
                self.baumgarte
            )));
        }

        if self.temp_allocator_size == 0 {
            return Err(PhysicsError::InvalidParameter(
                "temp_allocator_size must not be zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            max_active_bodies: 10_240,
            max_contacts: 10_240,
            temp_allocator_size: 10 * 1024 * 1024,
            num_velocity_steps: 10,
            num_position_steps: 2,
            baumgarte: 0.2,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            use_warm_start: true,
            worker_threads: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(PhysicsSettings::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_settings_are_rejected() {
        let settings = PhysicsSettings {
            num_position_steps: 256,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = PhysicsSettings {
            baumgarte: 1.5,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = PhysicsSettings {
            max_active_bodies: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
