use approx::assert_relative_eq;
use island_solver::bodies::{BodyId, MotionProperties, RigidBody};
use island_solver::constraints::{AxisConstraintPart, Constraint, DistanceConstraint, SpringPart, SpringSettings};
use island_solver::core::{BodyStorage, Storage};
use island_solver::math::Vec3;
use std::f32::consts::PI;

const DT: f32 = 1.0 / 60.0;

fn point_mass(id: u32, x: f32, mass: f32) -> RigidBody {
    RigidBody::new_dynamic(BodyId::new(id), Vec3::new(x, 0.0, 0.0), MotionProperties::point_mass(mass))
}

fn rigid_part(body1: &RigidBody, body2: &RigidBody) -> AxisConstraintPart {
    let mut part = AxisConstraintPart::default();
    part.calculate_constraint_properties(body1, &Vec3::zeros(), body2, &Vec3::zeros(), &Vec3::x(), 0.0);
    part
}

#[test]
fn test_effective_mass_of_two_point_masses() {
    let body1 = point_mass(0, 0.0, 2.0);
    let body2 = point_mass(1, 1.0, 4.0);

    let part = rigid_part(&body1, &body2);
    assert!(part.is_active());
    assert_relative_eq!(part.get_effective_mass(), 1.0 / (0.5 + 0.25));
}

#[test]
fn test_zero_frequency_behaves_like_plain_bias() {
    let body1 = point_mass(0, 0.0, 1.0);
    let body2 = point_mass(1, 1.0, 3.0);

    let mut rigid = AxisConstraintPart::default();
    rigid.calculate_constraint_properties(&body1, &Vec3::zeros(), &body2, &Vec3::zeros(), &Vec3::x(), 0.3);

    let mut soft = AxisConstraintPart::default();
    soft.calculate_constraint_properties_with_frequency_and_damping(
        DT,
        &body1,
        &Vec3::zeros(),
        &body2,
        &Vec3::zeros(),
        &Vec3::x(),
        0.3,
        0.5,
        0.0,
        0.7,
    );

    assert!(!soft.get_spring_part().is_active());
    assert_relative_eq!(soft.get_effective_mass(), rigid.get_effective_mass());
    assert_relative_eq!(soft.get_spring_part().get_bias(0.0), 0.3);
    assert_relative_eq!(soft.get_spring_part().get_bias(10.0), 0.3);
}

#[test]
fn test_spring_from_stiffness_and_damping() {
    let mut spring = SpringPart::default();
    let effective_mass = spring.calculate_spring_properties_with_stiffness_and_damping(0.1, 1.0, 0.0, 1.0, 100.0, 10.0);

    // softness = 1 / (dt * (c + dt * k)) = 1 / (0.1 * 20)
    assert!(spring.is_active());
    assert_relative_eq!(spring.get_softness(), 0.5);
    assert_relative_eq!(spring.get_bias(0.0), 5.0);
    assert_relative_eq!(spring.get_bias(2.0), 6.0);
    assert_relative_eq!(effective_mass, 1.0 / 1.5);
}

#[test]
fn test_spring_from_frequency_and_damping() {
    let dt = 0.1;
    let inv_effective_mass = 0.5;
    let mut spring = SpringPart::default();
    let effective_mass =
        spring.calculate_spring_properties_with_frequency_and_damping(dt, inv_effective_mass, 0.0, 1.0, 1.0, 0.5);

    let mass = 1.0 / inv_effective_mass;
    let omega = 2.0 * PI;
    let stiffness = mass * omega * omega;
    let damping = 2.0 * mass * 0.5 * omega;
    let softness = 1.0 / (dt * (damping + dt * stiffness));

    assert_relative_eq!(spring.get_softness(), softness, epsilon = 1.0e-5);
    assert_relative_eq!(spring.get_bias(0.0), dt * stiffness * softness, epsilon = 1.0e-5);
    assert_relative_eq!(effective_mass, 1.0 / (inv_effective_mass + softness), epsilon = 1.0e-5);
}

#[test]
fn test_warm_start_applies_scaled_impulse() {
    for (ratio, expected) in [(1.0, 2.0), (0.5, 1.0)] {
        let mut body1 = point_mass(0, 0.0, 1.0);
        let mut body2 = point_mass(1, 1.0, 2.0);
        let mut part = rigid_part(&body1, &body2);
        part.set_total_lambda(2.0);

        part.warm_start(&mut body1, &mut body2, &Vec3::x(), ratio);

        assert_relative_eq!(part.get_total_lambda(), expected);
        assert_relative_eq!(body1.get_linear_velocity(), Vec3::new(-expected, 0.0, 0.0));
        assert_relative_eq!(body2.get_linear_velocity(), Vec3::new(expected * 0.5, 0.0, 0.0));
    }
}

#[test]
fn test_warm_start_with_zero_ratio_does_nothing() {
    let mut body1 = point_mass(0, 0.0, 1.0);
    let mut body2 = point_mass(1, 1.0, 1.0);
    let mut part = rigid_part(&body1, &body2);
    part.set_total_lambda(2.0);

    part.warm_start(&mut body1, &mut body2, &Vec3::x(), 0.0);

    assert_eq!(part.get_total_lambda(), 0.0);
    assert_eq!(body1.get_linear_velocity(), Vec3::zeros());
    assert_eq!(body2.get_linear_velocity(), Vec3::zeros());
}

#[test]
fn test_velocity_solve_removes_relative_velocity() {
    let mut body1 = point_mass(0, 0.0, 1.0);
    let mut body2 = point_mass(1, 1.0, 1.0);
    body1.set_linear_velocity(Vec3::new(1.0, 0.0, 0.0));

    let mut part = rigid_part(&body1, &body2);
    assert!(part.solve_velocity_constraint(&mut body1, &mut body2, &Vec3::x(), -f32::MAX, f32::MAX));

    assert_relative_eq!(part.get_total_lambda(), 0.5);
    assert_relative_eq!(body1.get_linear_velocity(), Vec3::new(0.5, 0.0, 0.0));
    assert_relative_eq!(body2.get_linear_velocity(), Vec3::new(0.5, 0.0, 0.0));

    // Converged: a second iteration changes nothing
    assert!(!part.solve_velocity_constraint(&mut body1, &mut body2, &Vec3::x(), -f32::MAX, f32::MAX));
}

#[test]
fn test_velocity_solve_respects_lambda_limits() {
    let mut body1 = point_mass(0, 0.0, 1.0);
    let mut body2 = point_mass(1, 1.0, 1.0);
    // Separating along the axis, a push-only constraint must not pull them back
    body1.set_linear_velocity(Vec3::new(-1.0, 0.0, 0.0));

    let mut part = rigid_part(&body1, &body2);
    assert!(!part.solve_velocity_constraint(&mut body1, &mut body2, &Vec3::x(), 0.0, f32::MAX));
    assert_eq!(part.get_total_lambda(), 0.0);
    assert_relative_eq!(body1.get_linear_velocity(), Vec3::new(-1.0, 0.0, 0.0));

    // A pull-only constraint limited to a small impulse
    let mut part = rigid_part(&body1, &body2);
    assert!(part.solve_velocity_constraint(&mut body1, &mut body2, &Vec3::x(), -0.1, 0.0));
    assert_relative_eq!(part.get_total_lambda(), -0.1);
    assert_relative_eq!(body1.get_linear_velocity(), Vec3::new(-0.9, 0.0, 0.0));
    assert_relative_eq!(body2.get_linear_velocity(), Vec3::new(-0.1, 0.0, 0.0));
}

#[test]
fn test_position_solve_corrects_fraction_of_error() {
    let mut body1 = point_mass(0, 0.0, 1.0);
    let mut body2 = point_mass(1, 1.0, 1.0);
    let part = rigid_part(&body1, &body2);

    // Bodies overlap by 0.1 along the axis, correct 20% of it
    assert!(part.solve_position_constraint(&mut body1, &mut body2, &Vec3::x(), -0.1, 0.2));
    assert_relative_eq!(body1.get_position(), Vec3::new(-0.01, 0.0, 0.0), epsilon = 1.0e-6);
    assert_relative_eq!(body2.get_position(), Vec3::new(1.01, 0.0, 0.0), epsilon = 1.0e-6);

    assert!(!part.solve_position_constraint(&mut body1, &mut body2, &Vec3::x(), 0.0, 0.2));
}

#[test]
fn test_spring_suppresses_position_solve() {
    let mut body1 = point_mass(0, 0.0, 1.0);
    let mut body2 = point_mass(1, 2.0, 1.0);

    let mut part = AxisConstraintPart::default();
    part.calculate_constraint_properties_with_settings(
        DT,
        &body1,
        &Vec3::zeros(),
        &body2,
        &Vec3::zeros(),
        &Vec3::x(),
        0.0,
        1.0,
        &SpringSettings::with_frequency(2.0, 0.5),
    );

    assert!(part.get_spring_part().is_active());
    assert!(!part.solve_position_constraint(&mut body1, &mut body2, &Vec3::x(), 1.0, 0.2));
    assert_eq!(body1.get_position(), Vec3::zeros());
    assert_eq!(body2.get_position(), Vec3::new(2.0, 0.0, 0.0));
}

#[test]
fn test_static_body_is_never_moved() {
    let mut body1 = point_mass(0, 0.0, 1.0);
    let mut body2 = RigidBody::new_static(BodyId::new(1), Vec3::new(1.0, 0.0, 0.0));
    body1.set_linear_velocity(Vec3::new(1.0, 0.0, 0.0));

    let mut part = rigid_part(&body1, &body2);
    assert_relative_eq!(part.get_effective_mass(), 1.0);
    part.solve_velocity_constraint(&mut body1, &mut body2, &Vec3::x(), 0.0, f32::MAX);
    part.solve_position_constraint(&mut body1, &mut body2, &Vec3::x(), -0.5, 1.0);

    assert_relative_eq!(body1.get_linear_velocity(), Vec3::zeros());
    assert_relative_eq!(body1.get_position(), Vec3::new(-0.5, 0.0, 0.0));
    assert_eq!(body2.get_position(), Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(body2.get_linear_velocity(), Vec3::zeros());
}

#[test]
fn test_distance_constraint_pulls_bodies_to_length() {
    let mut bodies = BodyStorage::new();
    let first = bodies.add(point_mass(0, 0.0, 1.0));
    let second = bodies.add(point_mass(0, 2.0, 1.0));

    let mut rod = DistanceConstraint::new(first, second, Vec3::zeros(), Vec3::zeros(), 1.0);
    rod.setup_velocity_constraint(DT, &bodies);
    assert!(rod.is_active());
    assert_relative_eq!(rod.get_world_space_normal(), Vec3::x());

    assert!(rod.solve_position_constraint(DT, 1.0, &mut bodies));
    let p1 = bodies.get_body(first).unwrap().get_position();
    let p2 = bodies.get_body(second).unwrap().get_position();
    assert_relative_eq!((p2 - p1).norm(), 1.0, epsilon = 1.0e-5);
    assert_relative_eq!(p1.x, 0.5, epsilon = 1.0e-5);

    assert!(!rod.solve_position_constraint(DT, 1.0, &mut bodies));
}

#[test]
fn test_distance_constraint_inactive_within_limits() {
    let mut bodies = BodyStorage::new();
    let first = bodies.add(point_mass(0, 0.0, 1.0));
    let second = bodies.add(point_mass(0, 1.5, 1.0));

    let mut rope = DistanceConstraint::with_limits(first, second, Vec3::zeros(), Vec3::zeros(), 1.0, 2.0);
    rope.setup_velocity_constraint(DT, &bodies);
    assert!(!rope.is_active());
    assert!(!rope.solve_velocity_constraint(DT, &mut bodies));
    assert!(!rope.solve_position_constraint(DT, 0.2, &mut bodies));
}

#[test]
fn test_rope_only_pulls() {
    let mut bodies = BodyStorage::new();
    let first = bodies.add(point_mass(0, 0.0, 1.0));
    let second = bodies.add(point_mass(0, 3.0, 1.0));
    bodies.get_body_mut(second).unwrap().set_linear_velocity(Vec3::new(-1.0, 0.0, 0.0));

    // Overstretched but already closing in: nothing to do this iteration
    let mut rope = DistanceConstraint::new_rope(first, second, Vec3::zeros(), Vec3::zeros(), 2.0);
    rope.setup_velocity_constraint(DT, &bodies);
    assert!(rope.is_active());
    assert!(!rope.solve_velocity_constraint(DT, &mut bodies));

    // Moving apart gets stopped
    bodies.get_body_mut(second).unwrap().set_linear_velocity(Vec3::new(1.0, 0.0, 0.0));
    assert!(rope.solve_velocity_constraint(DT, &mut bodies));
    let v1 = bodies.get_body(first).unwrap().get_linear_velocity();
    let v2 = bodies.get_body(second).unwrap().get_linear_velocity();
    assert_relative_eq!(v1.x, v2.x, epsilon = 1.0e-6);
    assert!(rope.total_lambda() < 0.0);
}

#[test]
fn test_disabled_distance_constraint_does_nothing() {
    let mut bodies = BodyStorage::new();
    let first = bodies.add(point_mass(0, 0.0, 1.0));
    let second = bodies.add(point_mass(0, 2.0, 1.0));

    let mut rod = DistanceConstraint::new(first, second, Vec3::zeros(), Vec3::zeros(), 1.0);
    rod.set_enabled(false);
    assert!(!Constraint::is_enabled(&rod));

    rod.setup_velocity_constraint(DT, &bodies);
    assert!(!rod.is_active());
    assert!(!rod.solve_position_constraint(DT, 1.0, &mut bodies));
}

#[test]
fn test_soft_distance_constraint_skips_position_solve() {
    let mut bodies = BodyStorage::new();
    let first = bodies.add(point_mass(0, 0.0, 1.0));
    let second = bodies.add(point_mass(0, 2.0, 1.0));

    let mut spring = DistanceConstraint::new_spring(
        first,
        second,
        Vec3::zeros(),
        Vec3::zeros(),
        1.0,
        SpringSettings::with_stiffness(50.0, 1.0),
    );
    spring.setup_velocity_constraint(DT, &bodies);
    assert!(spring.is_active());
    assert!(!spring.solve_position_constraint(DT, 1.0, &mut bodies));

    // The spring pulls the stretched bodies together through the velocity solve
    assert!(spring.solve_velocity_constraint(DT, &mut bodies));
    let v1 = bodies.get_body(first).unwrap().get_linear_velocity();
    let v2 = bodies.get_body(second).unwrap().get_linear_velocity();
    assert!(v1.x > 0.0);
    assert!(v2.x < 0.0);
}
