use crate::bodies::{BodyId, MotionProperties, RigidBodyType, INACTIVE_INDEX};
use crate::math::{Mat3, Quat, Vec3, EPSILON};

/// A rigid body as seen by the island builder and the constraint solver
#[derive(Debug, Clone)]
pub struct RigidBody {
    /// Handle of this body
    id: BodyId,

    /// The body's type (dynamic, kinematic, or static)
    body_type: RigidBodyType,

    /// World space position of the center of mass
    position: Vec3,

    /// World space orientation
    rotation: Quat,

    /// Velocity and mass state, `None` for static bodies
    motion: Option<MotionProperties>,

    /// Index in the active body list, `INACTIVE_INDEX` when not active
    active_index: u32,
}

impl RigidBody {
    /// Creates a new rigid body. Static bodies never carry motion properties.
    pub fn new(
        id: BodyId,
        body_type: RigidBodyType,
        position: Vec3,
        rotation: Quat,
        motion: MotionProperties,
    ) -> Self {
        Self {
            id,
            body_type,
            position,
            rotation,
            motion: body_type.is_moving().then_some(motion),
            active_index: INACTIVE_INDEX,
        }
    }

    /// Creates a new dynamic rigid body at the given position
    pub fn new_dynamic(id: BodyId, position: Vec3, motion: MotionProperties) -> Self {
        Self::new(id, RigidBodyType::Dynamic, position, Quat::identity(), motion)
    }

    /// Creates a new kinematic rigid body at the given position
    pub fn new_kinematic(id: BodyId, position: Vec3) -> Self {
        Self::new(
            id,
            RigidBodyType::Kinematic,
            position,
            Quat::identity(),
            MotionProperties::point_mass(0.0),
        )
    }

    /// Creates a new static rigid body at the given position
    pub fn new_static(id: BodyId, position: Vec3) -> Self {
        Self::new(
            id,
            RigidBodyType::Static,
            position,
            Quat::identity(),
            MotionProperties::point_mass(0.0),
        )
    }

    /// Returns the id of this body
    #[inline]
    pub fn get_id(&self) -> BodyId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: BodyId) {
        self.id = id;
    }

    /// Returns the type of this body
    #[inline]
    pub fn get_body_type(&self) -> RigidBodyType {
        self.body_type
    }

    /// Returns true if the body is dynamic
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.body_type.is_dynamic()
    }

    /// Returns true if the body is static
    #[inline]
    pub fn is_static(&self) -> bool {
        self.body_type == RigidBodyType::Static
    }

    /// Returns the position of the center of mass
    #[inline]
    pub fn get_position(&self) -> Vec3 {
        self.position
    }

    /// Sets the position of the center of mass
    #[inline]
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Returns the orientation
    #[inline]
    pub fn get_rotation(&self) -> Quat {
        self.rotation
    }

    /// Sets the orientation
    #[inline]
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    /// Returns the motion properties, `None` for static bodies
    #[inline]
    pub fn get_motion_properties(&self) -> Option<&MotionProperties> {
        self.motion.as_ref()
    }

    /// Returns the motion properties mutably, `None` for static bodies
    #[inline]
    pub fn get_motion_properties_mut(&mut self) -> Option<&mut MotionProperties> {
        self.motion.as_mut()
    }

    /// Returns the linear velocity, zero for static bodies
    pub fn get_linear_velocity(&self) -> Vec3 {
        self.motion
            .as_ref()
            .map_or_else(Vec3::zeros, MotionProperties::get_linear_velocity)
    }

    /// Sets the linear velocity. Ignored for static bodies.
    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        if let Some(motion) = self.motion.as_mut() {
            motion.set_linear_velocity(velocity);
        }
    }

    /// Returns the angular velocity, zero for static bodies
    pub fn get_angular_velocity(&self) -> Vec3 {
        self.motion
            .as_ref()
            .map_or_else(Vec3::zeros, MotionProperties::get_angular_velocity)
    }

    /// Sets the angular velocity. Ignored for static bodies.
    pub fn set_angular_velocity(&mut self, velocity: Vec3) {
        if let Some(motion) = self.motion.as_mut() {
            motion.set_angular_velocity(velocity);
        }
    }

    /// Returns the inverse mass, zero unless the body is dynamic
    pub fn get_inverse_mass(&self) -> f32 {
        match &self.motion {
            Some(motion) if self.is_dynamic() => motion.get_inverse_mass(),
            _ => 0.0,
        }
    }

    /// Returns the world space inverse inertia, zero unless the body is dynamic
    pub fn get_inverse_inertia(&self) -> Mat3 {
        match &self.motion {
            Some(motion) if self.is_dynamic() => motion.get_inverse_inertia_for_rotation(&self.rotation),
            _ => Mat3::zeros(),
        }
    }

    /// Returns the index of this body in the active body list
    #[inline]
    pub fn get_active_index(&self) -> u32 {
        self.active_index
    }

    /// Returns true if this body is in the active body list
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active_index != INACTIVE_INDEX
    }

    pub(crate) fn set_active_index(&mut self, index: u32) {
        self.active_index = index;
    }

    /// Converts a point in body space (relative to the center of mass) to world space
    #[inline]
    pub fn local_to_world(&self, local: &Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    /// Converts a world space point to body space (relative to the center of mass)
    #[inline]
    pub fn world_to_local(&self, world: &Vec3) -> Vec3 {
        self.rotation.inverse_transform_vector(&(world - self.position))
    }

    /// Moves the body along `delta`, respecting locked translation axes
    pub(crate) fn add_position_step(&mut self, delta: &Vec3) {
        let delta = self.locked_translation(delta);
        self.position += delta;
    }

    /// Moves the body along `-delta`, respecting locked translation axes
    pub(crate) fn sub_position_step(&mut self, delta: &Vec3) {
        let delta = self.locked_translation(delta);
        self.position -= delta;
    }

    /// Rotates the body by the rotation vector `delta` (axis times angle)
    pub(crate) fn add_rotation_step(&mut self, delta: &Vec3) {
        if delta.norm_squared() > EPSILON * EPSILON {
            self.rotation = Quat::from_scaled_axis(*delta) * self.rotation;
            self.rotation.renormalize();
        }
    }

    /// Rotates the body by the rotation vector `-delta`
    pub(crate) fn sub_rotation_step(&mut self, delta: &Vec3) {
        self.add_rotation_step(&-delta);
    }

    /// Advances position and orientation by the current velocities over `dt`
    pub(crate) fn integrate_position(&mut self, dt: f32) {
        if self.motion.is_none() {
            return;
        }

        let linear = self.get_linear_velocity() * dt;
        let angular = self.get_angular_velocity() * dt;
        self.position += linear;
        self.add_rotation_step(&angular);
    }

    fn locked_translation(&self, delta: &Vec3) -> Vec3 {
        self.motion
            .as_ref()
            .map_or(*delta, |motion| motion.lock_translation(delta))
    }
}
