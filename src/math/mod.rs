use nalgebra as na;

/// A 3D vector used for positions, velocities and constraint axes
pub type Vec3 = na::Vector3<f32>;

/// A 3x3 matrix, used for (inverse) inertia tensors
pub type Mat3 = na::Matrix3<f32>;

/// A unit quaternion describing a body orientation
pub type Quat = na::UnitQuaternion<f32>;

/// Constant for a very small number, used for comparisons
pub const EPSILON: f32 = 1.0e-6;

/// Tolerance used when checking that a constraint axis is normalized
pub const NORMALIZED_TOLERANCE: f32 = 1.0e-5;

/// Clamps a value between a minimum and maximum value
#[inline]
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

/// Returns true if the vector has unit length within `tolerance` (on the squared length)
#[inline]
pub fn is_normalized(v: &Vec3, tolerance: f32) -> bool {
    approx::abs_diff_eq!(v.norm_squared(), 1.0, epsilon = tolerance)
}

/// Returns a vector with 1.0 in every component whose flag is set and 0.0 elsewhere
#[inline]
pub fn mask_vector(x: bool, y: bool, z: bool) -> Vec3 {
    Vec3::new(
        if x { 1.0 } else { 0.0 },
        if y { 1.0 } else { 0.0 },
        if z { 1.0 } else { 0.0 },
    )
}
