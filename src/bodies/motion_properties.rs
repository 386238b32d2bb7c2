use crate::bodies::AllowedDofs;
use crate::math::{mask_vector, Mat3, Quat, Vec3};

/// Velocity and mass state of a body that can move
#[derive(Debug, Clone)]
pub struct MotionProperties {
    /// World space linear velocity of the center of mass
    linear_velocity: Vec3,

    /// World space angular velocity
    angular_velocity: Vec3,

    /// Inverse of the body mass (0 for infinite mass)
    inverse_mass: f32,

    /// Diagonal of the inverse inertia tensor in the principal inertia frame
    inverse_inertia_diagonal: Vec3,

    /// Rotation from the principal inertia frame to body space
    inertia_rotation: Quat,

    /// Degrees of freedom the body can move in
    allowed_dofs: AllowedDofs,

    /// Number of position solver steps this body asks for (0 = use the default)
    num_position_steps_override: u8,
}

impl MotionProperties {
    /// Creates motion properties from a mass and principal moments of inertia
    pub fn new(mass: f32, principal_inertia: Vec3) -> Self {
        let invert = |value: f32| if value > 0.0 { 1.0 / value } else { 0.0 };

        Self {
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            inverse_mass: invert(mass),
            inverse_inertia_diagonal: principal_inertia.map(invert),
            inertia_rotation: Quat::identity(),
            allowed_dofs: AllowedDofs::ALL,
            num_position_steps_override: 0,
        }
    }

    /// Creates motion properties of a solid sphere
    pub fn solid_sphere(mass: f32, radius: f32) -> Self {
        let inertia = 0.4 * mass * radius * radius;
        Self::new(mass, Vec3::repeat(inertia))
    }

    /// Creates motion properties with a mass but a zero inverse inertia, so impulses never
    /// change the angular velocity of the body.
    pub fn point_mass(mass: f32) -> Self {
        Self::new(mass, Vec3::zeros())
    }

    /// Returns the linear velocity
    #[inline]
    pub fn get_linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    /// Sets the linear velocity, removing motion along locked axes
    #[inline]
    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.linear_velocity = self.lock_translation(&velocity);
    }

    /// Returns the angular velocity
    #[inline]
    pub fn get_angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    /// Sets the angular velocity, removing rotation around locked axes
    #[inline]
    pub fn set_angular_velocity(&mut self, velocity: Vec3) {
        self.angular_velocity = self.lock_angular(&velocity);
    }

    /// Returns the inverse mass
    #[inline]
    pub fn get_inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    /// Sets the inverse mass
    #[inline]
    pub fn set_inverse_mass(&mut self, inverse_mass: f32) {
        debug_assert!(inverse_mass >= 0.0);
        self.inverse_mass = inverse_mass;
    }

    /// Returns the diagonal of the inverse inertia in the principal frame
    #[inline]
    pub fn get_inverse_inertia_diagonal(&self) -> Vec3 {
        self.inverse_inertia_diagonal
    }

    /// Sets the inverse inertia as a diagonal plus the rotation of its principal frame
    pub fn set_inverse_inertia(&mut self, diagonal: Vec3, rotation: Quat) {
        self.inverse_inertia_diagonal = diagonal;
        self.inertia_rotation = rotation;
    }

    /// Returns the degrees of freedom this body can move in
    #[inline]
    pub fn get_allowed_dofs(&self) -> AllowedDofs {
        self.allowed_dofs
    }

    /// Restricts the degrees of freedom and clears velocity along the removed ones
    pub fn set_allowed_dofs(&mut self, dofs: AllowedDofs) {
        self.allowed_dofs = dofs;
        self.linear_velocity = self.lock_translation(&self.linear_velocity);
        self.angular_velocity = self.lock_angular(&self.angular_velocity);
    }

    /// Returns the number of position steps this body requests, 0 if it uses the default
    #[inline]
    pub fn get_num_position_steps_override(&self) -> u32 {
        u32::from(self.num_position_steps_override)
    }

    /// Sets the number of position steps this body requests. Must be less than 256.
    pub fn set_num_position_steps_override(&mut self, steps: u32) {
        debug_assert!(steps < 256);
        self.num_position_steps_override = steps.min(255) as u8;
    }

    /// Zeroes the components of `v` that correspond to locked translation axes
    #[inline]
    pub fn lock_translation(&self, v: &Vec3) -> Vec3 {
        v.component_mul(&self.linear_dofs_mask())
    }

    /// Zeroes the components of `v` that correspond to locked rotation axes
    #[inline]
    pub fn lock_angular(&self, v: &Vec3) -> Vec3 {
        v.component_mul(&self.angular_dofs_mask())
    }

    /// World space inverse inertia for a body with the given orientation.
    ///
    /// Rows and columns belonging to locked rotation axes are zero.
    pub fn get_inverse_inertia_for_rotation(&self, body_rotation: &Quat) -> Mat3 {
        let rotation = (body_rotation * self.inertia_rotation)
            .to_rotation_matrix()
            .into_inner();
        let inverse_inertia =
            rotation * Mat3::from_diagonal(&self.inverse_inertia_diagonal) * rotation.transpose();

        if self.allowed_dofs.contains(AllowedDofs::ROTATION_X | AllowedDofs::ROTATION_Y | AllowedDofs::ROTATION_Z) {
            inverse_inertia
        } else {
            let mask = Mat3::from_diagonal(&self.angular_dofs_mask());
            mask * inverse_inertia * mask
        }
    }

    pub(crate) fn add_linear_velocity_step(&mut self, delta: &Vec3) {
        self.linear_velocity = self.lock_translation(&(self.linear_velocity + delta));
        debug_assert!(!self.linear_velocity.iter().any(|c| c.is_nan()));
    }

    pub(crate) fn sub_linear_velocity_step(&mut self, delta: &Vec3) {
        self.linear_velocity = self.lock_translation(&(self.linear_velocity - delta));
        debug_assert!(!self.linear_velocity.iter().any(|c| c.is_nan()));
    }

    pub(crate) fn add_angular_velocity_step(&mut self, delta: &Vec3) {
        self.angular_velocity += delta;
        debug_assert!(!self.angular_velocity.iter().any(|c| c.is_nan()));
    }

    pub(crate) fn sub_angular_velocity_step(&mut self, delta: &Vec3) {
        self.angular_velocity -= delta;
        debug_assert!(!self.angular_velocity.iter().any(|c| c.is_nan()));
    }

    fn linear_dofs_mask(&self) -> Vec3 {
        mask_vector(
            self.allowed_dofs.contains(AllowedDofs::TRANSLATION_X),
            self.allowed_dofs.contains(AllowedDofs::TRANSLATION_Y),
            self.allowed_dofs.contains(AllowedDofs::TRANSLATION_Z),
        )
    }

    fn angular_dofs_mask(&self) -> Vec3 {
        mask_vector(
            self.allowed_dofs.contains(AllowedDofs::ROTATION_X),
            self.allowed_dofs.contains(AllowedDofs::ROTATION_Y),
            self.allowed_dofs.contains(AllowedDofs::ROTATION_Z),
        )
    }
}
