pub mod math;
pub mod core;
pub mod bodies;
pub mod constraints;

/// Re-export common types for easier usage
pub use crate::core::{PhysicsWorld, PhysicsSettings, StepStats, ConstraintId};
pub use crate::bodies::{BodyId, MotionProperties, RigidBody, RigidBodyType};
pub use crate::constraints::{Constraint, ContactConstraint, DistanceConstraint, SpringSettings};
pub use crate::math::Vec3;

/// Error types for the physics engine
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum PhysicsError {
        #[error("Invalid parameter: {0}")]
        InvalidParameter(String),

        #[error("Resource not found: {0}")]
        ResourceNotFound(String),

        #[error("Scratch allocator exhausted: requested {requested} bytes, {remaining} remaining")]
        StackExhausted { requested: usize, remaining: usize },

        #[error("Thread pool error: {0}")]
        ThreadPool(String),
    }
}

/// Result type for physics engine operations
pub type Result<T> = std::result::Result<T, error::PhysicsError>;

/// Engine version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
