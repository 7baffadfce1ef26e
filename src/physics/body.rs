//! Rigid bodies and contact resolution

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::shape::{collide, Contact, Shape};

/// A rigid body: point mass plus a list of collision shapes whose centers
/// track the body position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Force accumulator expressed as acceleration, cleared every substep
    pub acceleration: Vec3,
    pub on_ground: bool,
    /// Reciprocal mass. Inverted so infinite mass is representable (0) and
    /// zero mass is not.
    pub inverse_mass: f32,
    /// Bounciness, combined across a contact pair via `min`
    pub restitution: f32,
    pub shapes: Vec<Shape>,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            on_ground: true,
            inverse_mass: 1.0,
            restitution: 0.0,
            shapes: Vec::new(),
        }
    }
}

impl Body {
    pub fn with_shape(shape: Shape) -> Self {
        Self {
            shapes: vec![shape],
            ..Self::default()
        }
    }

    /// A body that never moves: infinite mass, parked at `position`
    pub fn fixed(shape: Shape, position: Vec3) -> Self {
        let mut body = Self {
            position,
            inverse_mass: 0.0,
            shapes: vec![shape],
            ..Self::default()
        };
        body.sync_shape_centers();
        body
    }

    pub fn is_static(&self) -> bool {
        self.inverse_mass == 0.0
    }

    /// Invariant: every shape's center equals the body position.
    /// Call after any position change.
    pub fn sync_shape_centers(&mut self) {
        for shape in &mut self.shapes {
            shape.set_center(self.position);
        }
    }

    pub fn apply_force(&mut self, force: Vec3) {
        self.acceleration += force * self.inverse_mass;
    }

    /// Applies an instantaneous velocity change. An impulse that is mostly
    /// upward (normalized dot with the up axis above 0.5) re-grounds the
    /// body, which is what gates jump eligibility.
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        self.velocity += impulse * self.inverse_mass;
        let len = impulse.length();
        if len > 0.0 && impulse.dot(Vec3::Y) / len > 0.5 {
            self.on_ground = true;
        }
    }

    /// Trapezoidal integration: average of old and new velocity moves the
    /// position. Clears the force accumulator and re-syncs shape centers.
    pub fn integrate(&mut self, dt: f32) {
        let original_velocity = self.velocity;
        self.velocity += self.acceleration * dt;
        self.position += (original_velocity + self.velocity) * 0.5 * dt;
        self.acceleration = Vec3::ZERO;
        self.sync_shape_centers();
    }

    /// The single deepest contact among all shape pairings with `other`,
    /// or a non-hit contact when nothing overlaps. Not a full manifold.
    pub fn deepest_contact_with(&self, other: &Body) -> Contact {
        let mut best = Contact::default();
        for shape_a in &self.shapes {
            for shape_b in &other.shapes {
                let contact = collide(shape_a, shape_b);
                if contact.penetration > 0.0 && contact.penetration > best.penetration {
                    best = contact;
                }
            }
        }
        best
    }
}

/// Resolves one contact between two bodies: positional correction split by
/// inverse-mass share, then a restitution impulse along the normal. The
/// normal must point from `b` toward `a`. Two static bodies no-op.
pub fn solve_contact(a: &mut Body, b: &mut Body, contact: &Contact) {
    let inv_sum = a.inverse_mass + b.inverse_mass;
    if inv_sum == 0.0 {
        return;
    }

    let normal = contact.normal;
    a.position += normal * contact.penetration * (a.inverse_mass / inv_sum);
    b.position -= normal * contact.penetration * (b.inverse_mass / inv_sum);
    a.sync_shape_centers();
    b.sync_shape_centers();

    let along_normal = (a.velocity - b.velocity).dot(normal);
    if along_normal >= 0.0 {
        // already separating, no impulse
        return;
    }

    let e = a.restitution.min(b.restitution);
    let j = -(1.0 + e) * along_normal / inv_sum;
    a.apply_impulse(normal * j);
    b.apply_impulse(-normal * j);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dynamic_sphere(position: Vec3, radius: f32) -> Body {
        let mut body = Body::with_shape(Shape::sphere(radius));
        body.position = position;
        body.sync_shape_centers();
        body
    }

    #[test]
    fn force_on_static_body_is_ignored() {
        let mut body = Body::fixed(Shape::sphere(1.0), Vec3::ZERO);
        body.apply_force(Vec3::new(0.0, -1000.0, 0.0));
        body.integrate(1.0);
        assert_eq!(body.position, Vec3::ZERO);
        assert_eq!(body.velocity, Vec3::ZERO);
    }

    #[test]
    fn mostly_upward_impulse_sets_on_ground() {
        let mut body = Body::with_shape(Shape::sphere(1.0));
        body.on_ground = false;
        body.apply_impulse(Vec3::new(0.3, 1.0, 0.0));
        assert!(body.on_ground);

        body.on_ground = false;
        body.apply_impulse(Vec3::new(1.0, 0.1, 0.0));
        assert!(!body.on_ground);
    }

    #[test]
    fn integration_is_trapezoidal() {
        let mut body = Body::with_shape(Shape::sphere(1.0));
        body.apply_force(Vec3::new(2.0, 0.0, 0.0));
        body.integrate(1.0);
        // v: 0 -> 2, position moves by avg(0, 2) * 1
        assert_relative_eq!(body.velocity.x, 2.0);
        assert_relative_eq!(body.position.x, 1.0);
        assert_eq!(body.acceleration, Vec3::ZERO);
        assert_eq!(body.shapes[0].center(), body.position);
    }

    #[test]
    fn deepest_contact_wins_across_shape_pairs() {
        let mut a = Body::default();
        a.shapes = vec![Shape::sphere(1.0), Shape::sphere(3.0)];
        a.position = Vec3::new(2.0, 0.0, 0.0);
        a.sync_shape_centers();

        let b = dynamic_sphere(Vec3::ZERO, 1.0);

        // radius-3 shape overlaps by 2, radius-1 shape misses
        let contact = a.deepest_contact_with(&b);
        assert_relative_eq!(contact.penetration, 2.0);
    }

    #[test]
    fn equal_masses_with_restitution_one_swap_velocities() {
        let mut a = dynamic_sphere(Vec3::new(1.9, 0.0, 0.0), 1.0);
        let mut b = dynamic_sphere(Vec3::ZERO, 1.0);
        a.restitution = 1.0;
        b.restitution = 1.0;
        a.velocity = Vec3::new(-5.0, 0.0, 0.0);
        b.velocity = Vec3::new(5.0, 0.0, 0.0);

        let contact = a.deepest_contact_with(&b);
        assert!(contact.hit());
        solve_contact(&mut a, &mut b, &contact);

        assert_relative_eq!(a.velocity.x, 5.0, epsilon = 1e-4);
        assert_relative_eq!(b.velocity.x, -5.0, epsilon = 1e-4);
    }

    #[test]
    fn static_body_never_displaces() {
        let mut floor = Body::fixed(Shape::aabb(Vec3::new(100.0, 1.0, 100.0)), Vec3::ZERO);
        let mut ball = dynamic_sphere(Vec3::new(0.0, 1.5, 0.0), 1.0);
        ball.velocity = Vec3::new(0.0, -10.0, 0.0);

        let contact = ball.deepest_contact_with(&floor);
        assert!(contact.hit());
        solve_contact(&mut ball, &mut floor, &contact);

        assert_eq!(floor.position, Vec3::ZERO);
        // full correction applied to the dynamic body
        assert!(ball.position.y > 1.5);
        assert!(ball.velocity.y >= 0.0);
    }

    #[test]
    fn two_static_bodies_no_op() {
        let mut a = Body::fixed(Shape::sphere(2.0), Vec3::new(1.0, 0.0, 0.0));
        let mut b = Body::fixed(Shape::sphere(2.0), Vec3::ZERO);
        let contact = a.deepest_contact_with(&b);
        assert!(contact.hit());
        solve_contact(&mut a, &mut b, &contact);
        assert_eq!(a.position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(b.position, Vec3::ZERO);
    }

    #[test]
    fn separating_bodies_receive_no_impulse() {
        let mut a = dynamic_sphere(Vec3::new(1.0, 0.0, 0.0), 1.0);
        let mut b = dynamic_sphere(Vec3::ZERO, 1.0);
        a.velocity = Vec3::new(3.0, 0.0, 0.0);
        b.velocity = Vec3::ZERO;

        let contact = a.deepest_contact_with(&b);
        solve_contact(&mut a, &mut b, &contact);
        // positions corrected, velocities untouched
        assert_relative_eq!(a.velocity.x, 3.0);
        assert_relative_eq!(b.velocity.x, 0.0);
    }

    #[test]
    fn resolved_pair_no_longer_penetrates_much() {
        let mut a = dynamic_sphere(Vec3::new(0.0, 1.0, 0.0), 1.0);
        let mut b = dynamic_sphere(Vec3::ZERO, 1.0);

        for _ in 0..4 {
            let contact = a.deepest_contact_with(&b);
            if !contact.hit() {
                break;
            }
            solve_contact(&mut a, &mut b, &contact);
        }
        let remaining = a.deepest_contact_with(&b);
        assert!(remaining.penetration <= 1e-4);
    }
}
