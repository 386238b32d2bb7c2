use std::f32::consts::PI;

/// Computes the softness and bias terms that turn a rigid constraint into a damped spring.
///
/// Feeding [`get_bias`](Self::get_bias) into the velocity solve together with the reduced
/// effective mass turns every iteration into an implicit Euler step of
/// `F = -k * C - c * dC/dt` expressed as an impulse.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpringPart {
    bias: f32,
    softness: f32,
}

impl SpringPart {
    /// Turns off the spring and uses a plain velocity bias
    #[inline]
    pub fn calculate_spring_properties_with_bias(&mut self, bias: f32) {
        self.softness = 0.0;
        self.bias = bias;
    }

    /// Sets up the spring from an oscillation frequency (Hz) and damping ratio.
    ///
    /// `c` is the current value of the position constraint. A `frequency` of zero or less
    /// makes the constraint rigid. Returns the effective mass to use with this spring.
    pub fn calculate_spring_properties_with_frequency_and_damping(
        &mut self,
        dt: f32,
        inv_effective_mass: f32,
        bias: f32,
        c: f32,
        frequency: f32,
        damping: f32,
    ) -> f32 {
        let effective_mass = 1.0 / inv_effective_mass;
        if frequency > 0.0 {
            let omega = 2.0 * PI * frequency;
            let stiffness = effective_mass * omega * omega;
            let damping = 2.0 * effective_mass * damping * omega;
            self.calculate_spring_properties(dt, inv_effective_mass, bias, c, stiffness, damping)
        } else {
            self.calculate_spring_properties_with_bias(bias);
            effective_mass
        }
    }

    /// Sets up the spring from a stiffness (N/m) and damping coefficient (N·s/m).
    ///
    /// A `stiffness` of zero or less makes the constraint rigid. Returns the effective
    /// mass to use with this spring.
    pub fn calculate_spring_properties_with_stiffness_and_damping(
        &mut self,
        dt: f32,
        inv_effective_mass: f32,
        bias: f32,
        c: f32,
        stiffness: f32,
        damping: f32,
    ) -> f32 {
        if stiffness > 0.0 {
            self.calculate_spring_properties(dt, inv_effective_mass, bias, c, stiffness, damping)
        } else {
            self.calculate_spring_properties_with_bias(bias);
            1.0 / inv_effective_mass
        }
    }

    /// Returns true if the spring softens the constraint
    #[inline]
    pub fn is_active(&self) -> bool {
        self.softness != 0.0
    }

    /// Returns the bias term for the velocity constraint given the impulse applied so far
    #[inline]
    pub fn get_bias(&self, total_lambda: f32) -> f32 {
        self.softness * total_lambda + self.bias
    }

    /// Returns the softness term
    #[inline]
    pub fn get_softness(&self) -> f32 {
        self.softness
    }

    fn calculate_spring_properties(
        &mut self,
        dt: f32,
        inv_effective_mass: f32,
        bias: f32,
        c: f32,
        stiffness: f32,
        damping: f32,
    ) -> f32 {
        self.softness = 1.0 / (dt * (damping + dt * stiffness));
        self.bias = bias + dt * stiffness * self.softness * c;
        1.0 / (inv_effective_mass + self.softness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn stiffness_terms() {
        let mut part = SpringPart::default();
        let dt = 0.02;
        let effective_mass = part.calculate_spring_properties_with_stiffness_and_damping(dt, 0.5, 0.1, 0.3, 100.0, 4.0);

        let softness = 1.0 / (dt * (4.0 + dt * 100.0));
        assert_relative_eq!(part.get_softness(), softness);
        assert_relative_eq!(part.get_bias(0.0), 0.1 + dt * 100.0 * softness * 0.3);
        assert_relative_eq!(effective_mass, 1.0 / (0.5 + softness));
        assert!(part.is_active());
    }

    #[test]
    fn frequency_converts_to_stiffness() {
        let dt = 1.0 / 60.0;
        let inv_effective_mass = 0.25;
        let omega = 2.0 * PI * 2.0;
        let k = 4.0 * omega * omega;
        let damping = 2.0 * 4.0 * 0.5 * omega;

        let mut by_frequency = SpringPart::default();
        let mass_f = by_frequency.calculate_spring_properties_with_frequency_and_damping(dt, inv_effective_mass, 0.0, 0.1, 2.0, 0.5);

        let mut by_stiffness = SpringPart::default();
        let mass_s = by_stiffness.calculate_spring_properties_with_stiffness_and_damping(dt, inv_effective_mass, 0.0, 0.1, k, damping);

        assert_relative_eq!(mass_f, mass_s, max_relative = 1.0e-5);
        assert_relative_eq!(by_frequency.get_softness(), by_stiffness.get_softness(), max_relative = 1.0e-5);
        assert_relative_eq!(by_frequency.get_bias(1.0), by_stiffness.get_bias(1.0), max_relative = 1.0e-5);
    }

    #[test]
    fn non_positive_stiffness_is_rigid() {
        let mut part = SpringPart::default();
        let effective_mass = part.calculate_spring_properties_with_stiffness_and_damping(0.01, 0.5, 0.7, 1.0, -3.0, 1.0);
        assert!(!part.is_active());
        assert_eq!(effective_mass, 2.0);
        assert_eq!(part.get_bias(10.0), 0.7);
    }
}
