//! Collision shapes and the pairwise narrow-phase kernel

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Sphere collision shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub radius: f32,
    pub center: Vec3,
}

impl Sphere {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            center: Vec3::ZERO,
        }
    }
}

/// Axis-aligned box collision shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub half_extents: Vec3,
    pub center: Vec3,
}

impl Aabb {
    pub fn new(half_extents: Vec3) -> Self {
        Self {
            half_extents,
            center: Vec3::ZERO,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }
}

/// A collision shape attached to a body. The center is kept equal to the
/// owning body's position after every integration substep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Sphere(Sphere),
    Box(Aabb),
}

impl Shape {
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere(Sphere::new(radius))
    }

    pub fn aabb(half_extents: Vec3) -> Self {
        Self::Box(Aabb::new(half_extents))
    }

    pub fn center(&self) -> Vec3 {
        match self {
            Shape::Sphere(s) => s.center,
            Shape::Box(b) => b.center,
        }
    }

    pub fn set_center(&mut self, center: Vec3) {
        match self {
            Shape::Sphere(s) => s.center = center,
            Shape::Box(b) => b.center = center,
        }
    }

    /// Lowest point of the shape on the vertical axis, used for terrain contact
    pub fn lowest_y(&self) -> f32 {
        match self {
            Shape::Sphere(s) => s.center.y - s.radius,
            Shape::Box(b) => b.center.y - b.half_extents.y,
        }
    }
}

/// Result of a narrow-phase test. The normal points from the second shape
/// toward the first; `penetration > 0` means the shapes overlap, anything
/// non-positive is "no collision" and must not be resolved.
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    pub normal: Vec3,
    pub penetration: f32,
}

impl Contact {
    pub fn hit(&self) -> bool {
        self.penetration > 0.0
    }

    /// Solve the BA case when only AB is implemented
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            penetration: self.penetration,
        }
    }
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            normal: Vec3::ZERO,
            penetration: -1.0,
        }
    }
}

pub fn collide_sphere_sphere(a: &Sphere, b: &Sphere) -> Contact {
    let diff = a.center - b.center;
    Contact {
        // concentric spheres have no direction; normalize_or_zero avoids NaN
        normal: diff.normalize_or_zero(),
        penetration: (a.radius + b.radius) - diff.length(),
    }
}

pub fn collide_sphere_box(s: &Sphere, b: &Aabb) -> Contact {
    let closest = s.center.clamp(b.min(), b.max());
    let diff = s.center - closest;
    Contact {
        normal: diff.normalize_or_zero(),
        penetration: s.radius - diff.length(),
    }
}

pub fn collide_box_box(a: &Aabb, b: &Aabb) -> Contact {
    let overlap = a.max().min(b.max()) - a.min().max(b.min());
    if overlap.x <= 0.0 || overlap.y <= 0.0 || overlap.z <= 0.0 {
        return Contact::default();
    }

    // Separate along the axis of minimum overlap, sign chosen so the normal
    // points away from the box whose far face is greater on that axis.
    if overlap.x < overlap.y && overlap.x < overlap.z {
        Contact {
            normal: Vec3::new(if a.max().x > b.max().x { 1.0 } else { -1.0 }, 0.0, 0.0),
            penetration: overlap.x,
        }
    } else if overlap.y < overlap.z {
        Contact {
            normal: Vec3::new(0.0, if a.max().y > b.max().y { 1.0 } else { -1.0 }, 0.0),
            penetration: overlap.y,
        }
    } else {
        Contact {
            normal: Vec3::new(0.0, 0.0, if a.max().z > b.max().z { 1.0 } else { -1.0 }),
            penetration: overlap.z,
        }
    }
}

/// Narrow-phase dispatch over every shape pairing. The contact normal always
/// points from `b` toward `a`.
pub fn collide(a: &Shape, b: &Shape) -> Contact {
    match (a, b) {
        (Shape::Sphere(sa), Shape::Sphere(sb)) => collide_sphere_sphere(sa, sb),
        (Shape::Sphere(s), Shape::Box(bx)) => collide_sphere_box(s, bx),
        (Shape::Box(bx), Shape::Sphere(s)) => collide_sphere_box(s, bx).flipped(),
        (Shape::Box(ba), Shape::Box(bb)) => collide_box_box(ba, bb),
    }
}
