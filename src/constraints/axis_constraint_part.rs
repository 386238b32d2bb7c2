use crate::bodies::RigidBody;
use crate::constraints::{SpringMode, SpringPart, SpringSettings};
use crate::math::{clamp, is_normalized, Mat3, Vec3, NORMALIZED_TOLERANCE};

/// Constraint that removes the relative motion of two bodies along a single axis.
///
/// Position constraint:
///
/// ```text
/// C = (p2 - p1) . n
/// ```
///
/// Velocity constraint (Jacobian applied to the body velocities):
///
/// ```text
/// J v = [-n, -(r1 + u) x n, n, r2 x n] . [v1, w1, v2, w2]
/// ```
///
/// With `r1 + u` the vector from the center of mass of body 1 to `p2`, `r2` the vector from
/// the center of mass of body 2 to `p2` and `n` the normalized world space axis.
///
/// Only dynamic bodies receive impulses. Kinematic bodies still contribute their velocity
/// to `J v`; static bodies contribute nothing.
#[derive(Debug, Clone, Default)]
pub struct AxisConstraintPart {
    r1_plus_u_x_axis: Vec3,
    r2_x_axis: Vec3,
    inv_i1_r1_plus_u_x_axis: Vec3,
    inv_i2_r2_x_axis: Vec3,
    effective_mass: f32,
    spring_part: SpringPart,
    total_lambda: f32,
}

impl AxisConstraintPart {
    /// Calculates the Jacobian terms and effective mass for a rigid constraint.
    ///
    /// `bias` is the velocity bias `b` in `J v + b = 0`.
    pub fn calculate_constraint_properties(
        &mut self,
        body1: &RigidBody,
        r1_plus_u: &Vec3,
        body2: &RigidBody,
        r2: &Vec3,
        axis: &Vec3,
        bias: f32,
    ) {
        let inv_effective_mass = self.calculate_inverse_effective_mass(
            body1.get_inverse_mass(),
            &body1.get_inverse_inertia(),
            r1_plus_u,
            body2.get_inverse_mass(),
            &body2.get_inverse_inertia(),
            r2,
            axis,
        );

        if inv_effective_mass == 0.0 {
            self.deactivate();
        } else {
            self.effective_mass = 1.0 / inv_effective_mass;
            self.spring_part.calculate_spring_properties_with_bias(bias);
        }
    }

    /// Same as [`calculate_constraint_properties`](Self::calculate_constraint_properties) but
    /// with the inverse masses replaced and the inverse inertias scaled. The bodies themselves
    /// are left untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_constraint_properties_with_mass_override(
        &mut self,
        body1: &RigidBody,
        inv_mass1: f32,
        inv_inertia_scale1: f32,
        r1_plus_u: &Vec3,
        body2: &RigidBody,
        inv_mass2: f32,
        inv_inertia_scale2: f32,
        r2: &Vec3,
        axis: &Vec3,
        bias: f32,
    ) {
        let inv_mass1 = if body1.is_dynamic() { inv_mass1 } else { 0.0 };
        let inv_mass2 = if body2.is_dynamic() { inv_mass2 } else { 0.0 };

        let inv_effective_mass = self.calculate_inverse_effective_mass(
            inv_mass1,
            &(body1.get_inverse_inertia() * inv_inertia_scale1),
            r1_plus_u,
            inv_mass2,
            &(body2.get_inverse_inertia() * inv_inertia_scale2),
            r2,
            axis,
        );

        if inv_effective_mass == 0.0 {
            self.deactivate();
        } else {
            self.effective_mass = 1.0 / inv_effective_mass;
            self.spring_part.calculate_spring_properties_with_bias(bias);
        }
    }

    /// Calculates the constraint properties for a soft constraint given as an oscillation
    /// frequency (Hz) and damping ratio. `c` is the current position error.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_constraint_properties_with_frequency_and_damping(
        &mut self,
        dt: f32,
        body1: &RigidBody,
        r1_plus_u: &Vec3,
        body2: &RigidBody,
        r2: &Vec3,
        axis: &Vec3,
        bias: f32,
        c: f32,
        frequency: f32,
        damping: f32,
    ) {
        let inv_effective_mass = self.calculate_body_inverse_effective_mass(body1, r1_plus_u, body2, r2, axis);
        if inv_effective_mass == 0.0 {
            self.deactivate();
        } else {
            self.effective_mass = self
                .spring_part
                .calculate_spring_properties_with_frequency_and_damping(dt, inv_effective_mass, bias, c, frequency, damping);
        }
    }

    /// Calculates the constraint properties for a soft constraint given as a stiffness (N/m)
    /// and damping coefficient (N·s/m). `c` is the current position error.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_constraint_properties_with_stiffness_and_damping(
        &mut self,
        dt: f32,
        body1: &RigidBody,
        r1_plus_u: &Vec3,
        body2: &RigidBody,
        r2: &Vec3,
        axis: &Vec3,
        bias: f32,
        c: f32,
        stiffness: f32,
        damping: f32,
    ) {
        let inv_effective_mass = self.calculate_body_inverse_effective_mass(body1, r1_plus_u, body2, r2, axis);
        if inv_effective_mass == 0.0 {
            self.deactivate();
        } else {
            self.effective_mass = self
                .spring_part
                .calculate_spring_properties_with_stiffness_and_damping(dt, inv_effective_mass, bias, c, stiffness, damping);
        }
    }

    /// Calculates the constraint properties using [`SpringSettings`]
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_constraint_properties_with_settings(
        &mut self,
        dt: f32,
        body1: &RigidBody,
        r1_plus_u: &Vec3,
        body2: &RigidBody,
        r2: &Vec3,
        axis: &Vec3,
        bias: f32,
        c: f32,
        settings: &SpringSettings,
    ) {
        let inv_effective_mass = self.calculate_body_inverse_effective_mass(body1, r1_plus_u, body2, r2, axis);
        if inv_effective_mass == 0.0 {
            self.deactivate();
            return;
        }

        self.effective_mass = match settings.mode {
            SpringMode::FrequencyAndDamping => self.spring_part.calculate_spring_properties_with_frequency_and_damping(
                dt,
                inv_effective_mass,
                bias,
                c,
                settings.frequency_or_stiffness,
                settings.damping,
            ),
            SpringMode::StiffnessAndDamping => self.spring_part.calculate_spring_properties_with_stiffness_and_damping(
                dt,
                inv_effective_mass,
                bias,
                c,
                settings.frequency_or_stiffness,
                settings.damping,
            ),
        };
    }

    /// Turns the constraint off and forgets the accumulated impulse
    #[inline]
    pub fn deactivate(&mut self) {
        self.effective_mass = 0.0;
        self.total_lambda = 0.0;
    }

    /// Returns false if the last setup found the constraint degenerate
    #[inline]
    pub fn is_active(&self) -> bool {
        self.effective_mass != 0.0
    }

    /// Returns the effective mass along the axis (including the spring softness)
    #[inline]
    pub fn get_effective_mass(&self) -> f32 {
        self.effective_mass
    }

    /// Returns the spring part computed by the last setup
    #[inline]
    pub fn get_spring_part(&self) -> &SpringPart {
        &self.spring_part
    }

    /// Applies the impulse of the previous step, scaled by `warm_start_ratio`.
    ///
    /// The ratio should be `dt / previous_dt` so the impulse stays consistent when the time
    /// step changes.
    pub fn warm_start(&mut self, body1: &mut RigidBody, body2: &mut RigidBody, axis: &Vec3, warm_start_ratio: f32) {
        self.total_lambda *= warm_start_ratio;

        let inv_mass1 = body1.get_inverse_mass();
        let inv_mass2 = body2.get_inverse_mass();
        self.apply_velocity_step(body1, inv_mass1, body2, inv_mass2, axis, self.total_lambda);
    }

    /// First half of an iteration: the unclamped accumulated impulse after this iteration.
    ///
    /// Split from [`solve_velocity_constraint_apply_lambda`](Self::solve_velocity_constraint_apply_lambda)
    /// so the caller can clamp against limits that depend on another axis.
    pub fn solve_velocity_constraint_get_total_lambda(&self, body1: &RigidBody, body2: &RigidBody, axis: &Vec3) -> f32 {
        let jv = axis.dot(&(body1.get_linear_velocity() - body2.get_linear_velocity()))
            + self.r1_plus_u_x_axis.dot(&body1.get_angular_velocity())
            - self.r2_x_axis.dot(&body2.get_angular_velocity());

        let lambda = self.effective_mass * (jv - self.spring_part.get_bias(self.total_lambda));
        self.total_lambda + lambda
    }

    /// Second half of an iteration: stores `total_lambda` and applies the change in impulse.
    ///
    /// Returns true if any velocity was changed.
    pub fn solve_velocity_constraint_apply_lambda(
        &mut self,
        body1: &mut RigidBody,
        body2: &mut RigidBody,
        axis: &Vec3,
        total_lambda: f32,
    ) -> bool {
        if !self.is_active() {
            return false;
        }

        let inv_mass1 = body1.get_inverse_mass();
        let inv_mass2 = body2.get_inverse_mass();
        self.apply_lambda(body1, inv_mass1, body2, inv_mass2, axis, total_lambda)
    }

    /// Runs one velocity iteration, keeping the accumulated impulse within
    /// `[min_lambda, max_lambda]`. Returns true if any velocity was changed.
    pub fn solve_velocity_constraint(
        &mut self,
        body1: &mut RigidBody,
        body2: &mut RigidBody,
        axis: &Vec3,
        min_lambda: f32,
        max_lambda: f32,
    ) -> bool {
        let inv_mass1 = body1.get_inverse_mass();
        let inv_mass2 = body2.get_inverse_mass();
        self.solve_velocity_constraint_with_mass_override(body1, inv_mass1, body2, inv_mass2, axis, min_lambda, max_lambda)
    }

    /// Same as [`solve_velocity_constraint`](Self::solve_velocity_constraint) with the given
    /// inverse masses instead of the bodies' own
    #[allow(clippy::too_many_arguments)]
    pub fn solve_velocity_constraint_with_mass_override(
        &mut self,
        body1: &mut RigidBody,
        inv_mass1: f32,
        body2: &mut RigidBody,
        inv_mass2: f32,
        axis: &Vec3,
        min_lambda: f32,
        max_lambda: f32,
    ) -> bool {
        if !self.is_active() {
            return false;
        }

        let total_lambda = clamp(
            self.solve_velocity_constraint_get_total_lambda(body1, body2, axis),
            min_lambda,
            max_lambda,
        );
        self.apply_lambda(body1, inv_mass1, body2, inv_mass2, axis, total_lambda)
    }

    /// Moves the bodies to reduce the position error `c` (Baumgarte stabilization).
    ///
    /// Does nothing while the spring is active; a soft constraint corrects drift through its
    /// velocity bias. Returns true if the bodies were moved.
    pub fn solve_position_constraint(
        &self,
        body1: &mut RigidBody,
        body2: &mut RigidBody,
        axis: &Vec3,
        c: f32,
        baumgarte: f32,
    ) -> bool {
        let inv_mass1 = body1.get_inverse_mass();
        let inv_mass2 = body2.get_inverse_mass();
        self.solve_position_constraint_with_mass_override(body1, inv_mass1, body2, inv_mass2, axis, c, baumgarte)
    }

    /// Same as [`solve_position_constraint`](Self::solve_position_constraint) with the given
    /// inverse masses instead of the bodies' own
    #[allow(clippy::too_many_arguments)]
    pub fn solve_position_constraint_with_mass_override(
        &self,
        body1: &mut RigidBody,
        inv_mass1: f32,
        body2: &mut RigidBody,
        inv_mass2: f32,
        axis: &Vec3,
        c: f32,
        baumgarte: f32,
    ) -> bool {
        if c == 0.0 || !self.is_active() || self.spring_part.is_active() {
            return false;
        }

        let lambda = -self.effective_mass * baumgarte * c;
        if body1.is_dynamic() {
            body1.sub_position_step(&(axis * (lambda * inv_mass1)));
            body1.sub_rotation_step(&(self.inv_i1_r1_plus_u_x_axis * lambda));
        }
        if body2.is_dynamic() {
            body2.add_position_step(&(axis * (lambda * inv_mass2)));
            body2.add_rotation_step(&(self.inv_i2_r2_x_axis * lambda));
        }
        true
    }

    /// Overrides the accumulated impulse
    #[inline]
    pub fn set_total_lambda(&mut self, lambda: f32) {
        self.total_lambda = lambda;
    }

    /// Returns the accumulated impulse
    #[inline]
    pub fn get_total_lambda(&self) -> f32 {
        self.total_lambda
    }

    fn apply_lambda(
        &mut self,
        body1: &mut RigidBody,
        inv_mass1: f32,
        body2: &mut RigidBody,
        inv_mass2: f32,
        axis: &Vec3,
        total_lambda: f32,
    ) -> bool {
        let delta_lambda = total_lambda - self.total_lambda;
        self.total_lambda = total_lambda;
        self.apply_velocity_step(body1, inv_mass1, body2, inv_mass2, axis, delta_lambda)
    }

    fn apply_velocity_step(
        &self,
        body1: &mut RigidBody,
        inv_mass1: f32,
        body2: &mut RigidBody,
        inv_mass2: f32,
        axis: &Vec3,
        lambda: f32,
    ) -> bool {
        if lambda == 0.0 {
            return false;
        }

        if body1.is_dynamic() {
            if let Some(motion) = body1.get_motion_properties_mut() {
                motion.sub_linear_velocity_step(&(axis * (lambda * inv_mass1)));
                motion.sub_angular_velocity_step(&(self.inv_i1_r1_plus_u_x_axis * lambda));
            }
        }
        if body2.is_dynamic() {
            if let Some(motion) = body2.get_motion_properties_mut() {
                motion.add_linear_velocity_step(&(axis * (lambda * inv_mass2)));
                motion.add_angular_velocity_step(&(self.inv_i2_r2_x_axis * lambda));
            }
        }
        true
    }

    fn calculate_body_inverse_effective_mass(
        &mut self,
        body1: &RigidBody,
        r1_plus_u: &Vec3,
        body2: &RigidBody,
        r2: &Vec3,
        axis: &Vec3,
    ) -> f32 {
        self.calculate_inverse_effective_mass(
            body1.get_inverse_mass(),
            &body1.get_inverse_inertia(),
            r1_plus_u,
            body2.get_inverse_mass(),
            &body2.get_inverse_inertia(),
            r2,
            axis,
        )
    }

    /// Caches the Jacobian terms and returns `K = J M^-1 J^T`.
    ///
    /// Non-dynamic bodies come in with a zero inverse mass and inertia, so they add nothing.
    #[allow(clippy::too_many_arguments)]
    fn calculate_inverse_effective_mass(
        &mut self,
        inv_mass1: f32,
        inv_i1: &Mat3,
        r1_plus_u: &Vec3,
        inv_mass2: f32,
        inv_i2: &Mat3,
        r2: &Vec3,
        axis: &Vec3,
    ) -> f32 {
        debug_assert!(is_normalized(axis, NORMALIZED_TOLERANCE), "constraint axis must be normalized");

        self.r1_plus_u_x_axis = r1_plus_u.cross(axis);
        self.r2_x_axis = r2.cross(axis);
        self.inv_i1_r1_plus_u_x_axis = inv_i1 * self.r1_plus_u_x_axis;
        self.inv_i2_r2_x_axis = inv_i2 * self.r2_x_axis;

        inv_mass1
            + self.inv_i1_r1_plus_u_x_axis.dot(&self.r1_plus_u_x_axis)
            + inv_mass2
            + self.inv_i2_r2_x_axis.dot(&self.r2_x_axis)
    }
}
