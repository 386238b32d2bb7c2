mod axis_constraint_part;
mod constraint;
mod contact;
mod distance;
mod spring_part;
mod spring_settings;

pub use self::axis_constraint_part::AxisConstraintPart;
pub use self::constraint::Constraint;
pub use self::contact::ContactConstraint;
pub use self::distance::DistanceConstraint;
pub use self::spring_part::SpringPart;
pub use self::spring_settings::{SpringMode, SpringSettings};
