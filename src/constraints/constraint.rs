use crate::bodies::BodyId;
use crate::core::BodyStorage;
use std::any::Any;

/// Base trait for constraints solved per island
pub trait Constraint: Send + Sync + 'static {
    /// Returns the type name of the constraint
    fn constraint_type(&self) -> &'static str;

    /// Returns the two bodies involved in the constraint
    fn bodies(&self) -> [BodyId; 2];

    /// Computes the Jacobian terms and effective mass for this step
    fn setup_velocity_constraint(&mut self, dt: f32, bodies: &BodyStorage);

    /// Applies the impulse of the previous step scaled by `warm_start_ratio`
    fn warm_start_velocity_constraint(&mut self, warm_start_ratio: f32, bodies: &mut BodyStorage);

    /// Runs one velocity iteration, returns true if any velocity changed
    fn solve_velocity_constraint(&mut self, dt: f32, bodies: &mut BodyStorage) -> bool;

    /// Runs one position iteration, returns true if any body was moved
    fn solve_position_constraint(&mut self, dt: f32, baumgarte: f32, bodies: &mut BodyStorage) -> bool;

    /// Returns false if the constraint had nothing to do after the last setup
    fn is_active(&self) -> bool;

    /// Disabled constraints are not linked into islands and not solved
    fn is_enabled(&self) -> bool {
        true
    }

    /// Returns the impulse accumulated along the constraint axis
    fn total_lambda(&self) -> f32;

    /// Returns a dynamic reference to any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Returns a dynamic mutable reference to any for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
