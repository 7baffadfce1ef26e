//! Heightfield terrain and body-vs-terrain contact

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::body::{solve_contact, Body};
use super::shape::Contact;

/// A regular grid of terrain heights. Sampling is bilinear between the four
/// surrounding posts; surface normals come from central differences, so the
/// field behaves like a smooth surface to the contact solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heightfield {
    /// Row-major, `width` samples per row, `depth` rows
    heights: Vec<f32>,
    width: usize,
    depth: usize,
    /// World-space spacing between neighboring samples
    cell_size: f32,
    /// World x/z of sample (0, 0)
    origin: Vec2,
}

impl Heightfield {
    pub fn from_heights(
        heights: Vec<f32>,
        width: usize,
        depth: usize,
        cell_size: f32,
        origin: Vec2,
    ) -> Self {
        debug_assert_eq!(heights.len(), width * depth);
        Self {
            heights,
            width,
            depth,
            cell_size,
            origin,
        }
    }

    /// A flat field at `height`, centered on the world origin
    pub fn flat(height: f32, width: usize, depth: usize, cell_size: f32) -> Self {
        let origin = Vec2::new(
            -((width - 1) as f32) * cell_size * 0.5,
            -((depth - 1) as f32) * cell_size * 0.5,
        );
        Self::from_heights(vec![height; width * depth], width, depth, cell_size, origin)
    }

    fn post(&self, ix: usize, iz: usize) -> f32 {
        let ix = ix.min(self.width - 1);
        let iz = iz.min(self.depth - 1);
        self.heights[iz * self.width + ix]
    }

    /// Bilinear height under the world position (x, z). Positions outside
    /// the grid clamp to the border posts.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let gx = ((x - self.origin.x) / self.cell_size).max(0.0);
        let gz = ((z - self.origin.y) / self.cell_size).max(0.0);

        let ix = (gx as usize).min(self.width - 1);
        let iz = (gz as usize).min(self.depth - 1);
        let fx = (gx - ix as f32).clamp(0.0, 1.0);
        let fz = (gz - iz as f32).clamp(0.0, 1.0);

        let h00 = self.post(ix, iz);
        let h10 = self.post(ix + 1, iz);
        let h01 = self.post(ix, iz + 1);
        let h11 = self.post(ix + 1, iz + 1);

        let bottom = h00 + (h10 - h00) * fx;
        let top = h01 + (h11 - h01) * fx;
        bottom + (top - bottom) * fz
    }

    /// Surface normal from central differences of the sampled height
    pub fn normal_at(&self, x: f32, z: f32) -> Vec3 {
        let e = self.cell_size;
        let dx = self.height_at(x - e, z) - self.height_at(x + e, z);
        let dz = self.height_at(x, z - e) - self.height_at(x, z + e);
        let normal = Vec3::new(dx, 2.0 * e, dz).normalize_or_zero();
        if normal == Vec3::ZERO {
            Vec3::Y
        } else {
            normal
        }
    }

    /// Pushes a body out of the terrain, treating the field as an
    /// infinite-mass body and reusing the pairwise impulse math.
    pub fn solve_body_contact(&self, body: &mut Body) {
        let lowest = body
            .shapes
            .iter()
            .map(|s| s.lowest_y())
            .fold(f32::INFINITY, f32::min);
        if !lowest.is_finite() {
            return;
        }

        let ground = self.height_at(body.position.x, body.position.z);
        let penetration = ground - lowest;
        if penetration <= 0.0 {
            return;
        }

        let contact = Contact {
            normal: self.normal_at(body.position.x, body.position.z),
            penetration,
        };
        let mut terrain = Body {
            inverse_mass: 0.0,
            shapes: Vec::new(),
            ..Body::default()
        };
        solve_contact(body, &mut terrain, &contact);
    }
}
