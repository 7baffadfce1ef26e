//! Rigid-body physics: shapes, narrow phase, contact response, terrain

pub mod body;
pub mod shape;
pub mod terrain;

pub use body::{solve_contact, Body};
pub use shape::{collide, Aabb, Contact, Shape, Sphere};
pub use terrain::Heightfield;

/// Downward acceleration applied to every dynamic body
pub const GRAVITY: f32 = 220.0;
/// Linear drag coefficient (force = -DRAG * velocity)
pub const DRAG: f32 = 2.0;
/// Horizontal movement speed constant for player input impulses
pub const HOR_SPEED: f32 = 160.0;
/// Vertical velocity set on jump
pub const JUMP_IMPULSE: f32 = 120.0;
/// Physics sub-iterations per simulation tick
pub const SUBSTEPS: u32 = 10;
