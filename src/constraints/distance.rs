use crate::bodies::{BodyId, RigidBody};
use crate::constraints::{AxisConstraintPart, Constraint, SpringSettings};
use crate::core::BodyStorage;
use crate::math::{Vec3, EPSILON};
use std::any::Any;
use tracing::{trace, warn};

/// A distance constraint keeps two anchor points on different bodies between a minimum
/// and a maximum distance
#[derive(Debug, Clone)]
pub struct DistanceConstraint {
    /// The first body in the constraint
    body1: BodyId,

    /// The second body in the constraint
    body2: BodyId,

    /// The anchor point on the first body (relative to its center of mass)
    local_anchor1: Vec3,

    /// The anchor point on the second body (relative to its center of mass)
    local_anchor2: Vec3,

    /// The minimum distance allowed
    min_distance: f32,

    /// The maximum distance allowed
    max_distance: f32,

    /// Makes the constraint soft when it has a frequency or stiffness
    spring_settings: SpringSettings,

    /// Whether the constraint is enabled
    enabled: bool,

    // Per step data
    world_space_normal: Vec3,
    min_lambda: f32,
    max_lambda: f32,
    axis_constraint: AxisConstraintPart,
}

impl DistanceConstraint {
    /// Creates a rigid rod keeping the anchors at exactly `distance`
    pub fn new(body1: BodyId, body2: BodyId, local_anchor1: Vec3, local_anchor2: Vec3, distance: f32) -> Self {
        Self::with_limits(body1, body2, local_anchor1, local_anchor2, distance, distance)
    }

    /// Creates a constraint that only acts when the anchor distance leaves `[min_distance, max_distance]`
    pub fn with_limits(
        body1: BodyId,
        body2: BodyId,
        local_anchor1: Vec3,
        local_anchor2: Vec3,
        min_distance: f32,
        max_distance: f32,
    ) -> Self {
        let mut constraint = Self {
            body1,
            body2,
            local_anchor1,
            local_anchor2,
            min_distance: 0.0,
            max_distance: 0.0,
            spring_settings: SpringSettings::rigid(),
            enabled: true,
            world_space_normal: Vec3::y(),
            min_lambda: 0.0,
            max_lambda: 0.0,
            axis_constraint: AxisConstraintPart::default(),
        };
        constraint.set_distance(min_distance, max_distance);
        constraint
    }

    /// Creates a spring pulling the anchors towards `distance`
    pub fn new_spring(
        body1: BodyId,
        body2: BodyId,
        local_anchor1: Vec3,
        local_anchor2: Vec3,
        distance: f32,
        spring_settings: SpringSettings,
    ) -> Self {
        let mut constraint = Self::new(body1, body2, local_anchor1, local_anchor2, distance);
        constraint.spring_settings = spring_settings;
        constraint
    }

    /// Creates a rope: the anchors can get closer but never further apart than `max_distance`
    pub fn new_rope(body1: BodyId, body2: BodyId, local_anchor1: Vec3, local_anchor2: Vec3, max_distance: f32) -> Self {
        Self::with_limits(body1, body2, local_anchor1, local_anchor2, 0.0, max_distance)
    }

    /// Creates a rod between two world space points, using the current distance between them
    pub fn from_world_anchors(body1: &RigidBody, body2: &RigidBody, anchor1: Vec3, anchor2: Vec3) -> Self {
        Self::new(
            body1.get_id(),
            body2.get_id(),
            body1.world_to_local(&anchor1),
            body2.world_to_local(&anchor2),
            (anchor2 - anchor1).norm(),
        )
    }

    /// Returns the minimum and maximum distance
    pub fn get_distance(&self) -> (f32, f32) {
        (self.min_distance, self.max_distance)
    }

    /// Sets the allowed distance range. Negative values are treated as zero.
    pub fn set_distance(&mut self, min_distance: f32, max_distance: f32) {
        let mut min_distance = min_distance.max(0.0);
        let max_distance = max_distance.max(0.0);
        if min_distance > max_distance {
            warn!(min_distance, max_distance, "distance constraint minimum above maximum, clamped");
            min_distance = max_distance;
        }

        self.min_distance = min_distance;
        self.max_distance = max_distance;
    }

    /// Returns the spring settings
    pub fn get_spring_settings(&self) -> &SpringSettings {
        &self.spring_settings
    }

    /// Sets the spring settings
    pub fn set_spring_settings(&mut self, spring_settings: SpringSettings) {
        self.spring_settings = spring_settings;
    }

    /// Returns whether the constraint is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets whether the constraint is enabled
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns the axis the constraint acted along during the last step
    pub fn get_world_space_normal(&self) -> Vec3 {
        self.world_space_normal
    }

    /// Returns the anchors in world space together with the lever arms `r1 + u` and `r2`
    fn world_anchors(&self, body1: &RigidBody, body2: &RigidBody) -> (Vec3, Vec3, Vec3, Vec3) {
        let p1 = body1.local_to_world(&self.local_anchor1);
        let p2 = body2.local_to_world(&self.local_anchor2);
        let r1_plus_u = p2 - body1.get_position();
        let r2 = p2 - body2.get_position();
        (p1, p2, r1_plus_u, r2)
    }

    fn calculate_constraint_properties(&mut self, dt: f32, body1: &RigidBody, body2: &RigidBody) {
        let (p1, p2, r1_plus_u, r2) = self.world_anchors(body1, body2);

        let delta = p2 - p1;
        let length = delta.norm();
        // Coinciding anchors keep the previous axis.
        if length > EPSILON {
            self.world_space_normal = delta / length;
        }

        let c = if self.min_distance == self.max_distance {
            self.min_lambda = -f32::MAX;
            self.max_lambda = f32::MAX;
            length - self.min_distance
        } else if length <= self.min_distance {
            self.min_lambda = 0.0;
            self.max_lambda = f32::MAX;
            length - self.min_distance
        } else if length >= self.max_distance {
            self.min_lambda = -f32::MAX;
            self.max_lambda = 0.0;
            length - self.max_distance
        } else {
            trace!(length, "distance constraint within limits");
            self.axis_constraint.deactivate();
            return;
        };

        self.axis_constraint.calculate_constraint_properties_with_settings(
            dt,
            body1,
            &r1_plus_u,
            body2,
            &r2,
            &self.world_space_normal,
            0.0,
            c,
            &self.spring_settings,
        );
    }
}

impl Constraint for DistanceConstraint {
    fn constraint_type(&self) -> &'static str {
        "Distance"
    }

    fn bodies(&self) -> [BodyId; 2] {
        [self.body1, self.body2]
    }

    fn setup_velocity_constraint(&mut self, dt: f32, bodies: &BodyStorage) {
        let (Ok(body1), Ok(body2)) = (bodies.get_body(self.body1), bodies.get_body(self.body2)) else {
            self.axis_constraint.deactivate();
            return;
        };

        if !self.enabled {
            self.axis_constraint.deactivate();
            return;
        }

        self.calculate_constraint_properties(dt, body1, body2);
    }

    fn warm_start_velocity_constraint(&mut self, warm_start_ratio: f32, bodies: &mut BodyStorage) {
        let Ok((body1, body2)) = bodies.get_pair_mut(self.body1, self.body2) else {
            return;
        };

        self.axis_constraint
            .warm_start(body1, body2, &self.world_space_normal, warm_start_ratio);
    }

    fn solve_velocity_constraint(&mut self, _dt: f32, bodies: &mut BodyStorage) -> bool {
        if !self.axis_constraint.is_active() {
            return false;
        }

        let Ok((body1, body2)) = bodies.get_pair_mut(self.body1, self.body2) else {
            return false;
        };

        self.axis_constraint.solve_velocity_constraint(
            body1,
            body2,
            &self.world_space_normal,
            self.min_lambda,
            self.max_lambda,
        )
    }

    fn solve_position_constraint(&mut self, _dt: f32, baumgarte: f32, bodies: &mut BodyStorage) -> bool {
        // Soft constraints correct drift through the velocity bias only.
        if !self.enabled || self.spring_settings.has_stiffness() {
            return false;
        }

        let Ok((body1, body2)) = bodies.get_pair_mut(self.body1, self.body2) else {
            return false;
        };

        let (p1, p2, r1_plus_u, r2) = self.world_anchors(body1, body2);
        let distance = (p2 - p1).dot(&self.world_space_normal);

        let position_error = if distance < self.min_distance {
            distance - self.min_distance
        } else if distance > self.max_distance {
            distance - self.max_distance
        } else {
            0.0
        };

        if position_error == 0.0 {
            return false;
        }

        self.axis_constraint.calculate_constraint_properties(
            body1,
            &r1_plus_u,
            body2,
            &r2,
            &self.world_space_normal,
            0.0,
        );
        self.axis_constraint.solve_position_constraint(
            body1,
            body2,
            &self.world_space_normal,
            position_error,
            baumgarte,
        )
    }

    fn is_active(&self) -> bool {
        self.axis_constraint.is_active()
    }

    fn is_enabled(&self) -> bool {
        self.enabled
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
