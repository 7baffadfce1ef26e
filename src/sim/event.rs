//! Game events and player input payloads

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// One frame of player input, produced by the input-capture collaborator.
/// Direction keys are held state; mouse deltas are accumulated since the
/// previous frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct InputFrame {
    /// Accumulated yaw delta (radians)
    pub mouse_dx: f32,
    /// Accumulated pitch delta (radians)
    pub mouse_dy: f32,
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

impl InputFrame {
    /// Normalized movement axis: x is forward/back, y is right/left
    pub fn axis(&self) -> Vec2 {
        let f = self.forward as i8 - self.back as i8;
        let r = self.right as i8 - self.left as i8;
        Vec2::new(f as f32, r as f32).normalize_or_zero()
    }

    pub fn is_empty(&self) -> bool {
        self.mouse_dx == 0.0 && self.mouse_dy == 0.0 && self.axis() == Vec2::ZERO && !self.jump
    }

    /// Split accumulated deltas across `steps` catch-up simulation steps so
    /// one long render frame does not multiply mouse movement. Held keys are
    /// untouched; they already scale with the number of steps applied.
    pub fn divide(&mut self, steps: u32) {
        if steps > 1 {
            self.mouse_dx /= steps as f32;
            self.mouse_dy /= steps as f32;
        }
    }
}

/// Per-player events driving the deterministic state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Player connected: spawn and bind an actor
    Join,
    /// Player disconnected: despawn and unbind
    Leave,
    /// One tick of player input
    Input(InputFrame),
}
