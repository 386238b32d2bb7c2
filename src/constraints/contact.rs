use crate::bodies::{BodyId, RigidBody};
use crate::constraints::{AxisConstraintPart, Constraint};
use crate::core::BodyStorage;
use crate::math::{is_normalized, Vec3, NORMALIZED_TOLERANCE};
use std::any::Any;

/// Non-penetration constraint for one contact point found by collision detection.
///
/// The normal points from body 1 towards body 2. The contact can push the bodies apart
/// but never pull them together.
#[derive(Debug, Clone)]
pub struct ContactConstraint {
    body1: BodyId,
    body2: BodyId,

    /// Contact point on body 1, relative to its center of mass
    local_point1: Vec3,

    /// Contact point on body 2, relative to its center of mass
    local_point2: Vec3,

    /// World space contact normal
    normal: Vec3,

    axis_constraint: AxisConstraintPart,
}

impl ContactConstraint {
    /// Creates a contact from the world space points on both surfaces and the contact normal
    pub fn new(body1: &RigidBody, body2: &RigidBody, point1: Vec3, point2: Vec3, normal: Vec3) -> Self {
        debug_assert!(is_normalized(&normal, NORMALIZED_TOLERANCE), "contact normal must be normalized");

        Self {
            body1: body1.get_id(),
            body2: body2.get_id(),
            local_point1: body1.world_to_local(&point1),
            local_point2: body2.world_to_local(&point2),
            normal,
            axis_constraint: AxisConstraintPart::default(),
        }
    }

    /// Returns the contact normal
    pub fn get_normal(&self) -> Vec3 {
        self.normal
    }

    /// Signed distance between the contact points along the normal, negative when penetrating
    pub fn get_separation(&self, body1: &RigidBody, body2: &RigidBody) -> f32 {
        let (p1, p2) = self.world_points(body1, body2);
        (p2 - p1).dot(&self.normal)
    }

    fn world_points(&self, body1: &RigidBody, body2: &RigidBody) -> (Vec3, Vec3) {
        (body1.local_to_world(&self.local_point1), body2.local_to_world(&self.local_point2))
    }

    fn calculate_constraint_properties(&mut self, body1: &RigidBody, body2: &RigidBody) {
        let (p1, p2) = self.world_points(body1, body2);
        let r1 = p1 - body1.get_position();
        let r2 = p2 - body2.get_position();
        self.axis_constraint
            .calculate_constraint_properties(body1, &r1, body2, &r2, &self.normal, 0.0);
    }
}

impl Constraint for ContactConstraint {
    fn constraint_type(&self) -> &'static str {
        "Contact"
    }

    fn bodies(&self) -> [BodyId; 2] {
        [self.body1, self.body2]
    }

    fn setup_velocity_constraint(&mut self, _dt: f32, bodies: &BodyStorage) {
        match (bodies.get_body(self.body1), bodies.get_body(self.body2)) {
            (Ok(body1), Ok(body2)) => self.calculate_constraint_properties(body1, body2),
            _ => self.axis_constraint.deactivate(),
        }
    }

    fn warm_start_velocity_constraint(&mut self, warm_start_ratio: f32, bodies: &mut BodyStorage) {
        if let Ok((body1, body2)) = bodies.get_pair_mut(self.body1, self.body2) {
            self.axis_constraint.warm_start(body1, body2, &self.normal, warm_start_ratio);
        }
    }

    fn solve_velocity_constraint(&mut self, _dt: f32, bodies: &mut BodyStorage) -> bool {
        let Ok((body1, body2)) = bodies.get_pair_mut(self.body1, self.body2) else {
            return false;
        };

        self.axis_constraint
            .solve_velocity_constraint(body1, body2, &self.normal, 0.0, f32::MAX)
    }

    fn solve_position_constraint(&mut self, _dt: f32, baumgarte: f32, bodies: &mut BodyStorage) -> bool {
        let Ok((body1, body2)) = bodies.get_pair_mut(self.body1, self.body2) else {
            return false;
        };

        let separation = self.get_separation(body1, body2);
        if separation >= 0.0 {
            return false;
        }

        self.calculate_constraint_properties(body1, body2);
        self.axis_constraint
            .solve_position_constraint(body1, body2, &self.normal, separation, baumgarte)
    }

    fn is_active(&self) -> bool {
        self.axis_constraint.is_active()
    }

    fn total_lambda(&self) -> f32 {
        self.axis_constraint.get_total_lambda()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
