//! World store: keyed actors plus the fixed-substep physics update

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::physics::{self, solve_contact, Body, Heightfield};

/// Identifies an actor within one world. Keys are handed out in increasing
/// order and never reused, even after removal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ActorKey(pub u32);

/// Opaque render tag consumed by the drawing collaborator; the core never
/// interprets it beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelTag {
    #[default]
    Prop,
    Player,
    Crate,
}

/// A simulated entity: rigid body plus view orientation and render tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub body: Body,
    pub yaw: f32,
    pub pitch: f32,
    pub model: ModelTag,
}

impl Actor {
    pub fn new(body: Body, model: ModelTag) -> Self {
        Self {
            body,
            yaw: 0.0,
            pitch: 0.0,
            model,
        }
    }

    /// View direction from yaw/pitch
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
    }

    /// Strafe direction, horizontal only
    pub fn right(&self) -> Vec3 {
        let yaw = self.yaw + std::f32::consts::FRAC_PI_2;
        Vec3::new(yaw.cos() * self.pitch.cos(), 0.0, yaw.sin() * self.pitch.cos())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("actor {0:?} does not exist")]
    ActorNotFound(ActorKey),
}

/// Keyed collection of actors. All mutation is synchronous and
/// single-threaded within one simulation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct World {
    next_key: ActorKey,
    actors: BTreeMap<ActorKey, Actor>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an actor under a freshly assigned key
    pub fn add_actor(&mut self, actor: Actor) -> ActorKey {
        let key = self.next_key;
        self.insert_actor(key, actor);
        key
    }

    /// Adds an actor under an explicit key, used when reconstructing a world
    /// from a snapshot. Keeps `next_key` above every live key.
    pub fn insert_actor(&mut self, key: ActorKey, actor: Actor) {
        self.actors.insert(key, actor);
        self.next_key = self.next_key.max(ActorKey(key.0 + 1));
    }

    pub fn remove_actor(&mut self, key: ActorKey) -> Option<Actor> {
        self.actors.remove(&key)
    }

    pub fn contains(&self, key: ActorKey) -> bool {
        self.actors.contains_key(&key)
    }

    pub fn actor(&self, key: ActorKey) -> Result<&Actor, WorldError> {
        self.actors.get(&key).ok_or(WorldError::ActorNotFound(key))
    }

    pub fn actor_mut(&mut self, key: ActorKey) -> Result<&mut Actor, WorldError> {
        self.actors
            .get_mut(&key)
            .ok_or(WorldError::ActorNotFound(key))
    }

    pub fn actors(&self) -> impl Iterator<Item = (ActorKey, &Actor)> {
        self.actors.iter().map(|(k, a)| (*k, a))
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// One fixed-time physics update, split into `SUBSTEPS` sub-iterations
    pub fn step(&mut self, dt: f32, terrain: &Heightfield) {
        let sub_dt = dt / physics::SUBSTEPS as f32;
        for _ in 0..physics::SUBSTEPS {
            self.substep(sub_dt, terrain);
        }
    }

    fn substep(&mut self, sub_dt: f32, terrain: &Heightfield) {
        // Broad phase: every unique unordered pair, no acceleration structure.
        // Contacts are detected against pre-solve positions, then each pair is
        // re-queried at resolution time so stacked corrections do not overshoot.
        let keys: Vec<ActorKey> = self.actors.keys().copied().collect();
        let mut colliding: Vec<(ActorKey, ActorKey)> = Vec::new();
        for (i, &ka) in keys.iter().enumerate() {
            for &kb in keys.iter().skip(i + 1) {
                let (Some(a), Some(b)) = (self.actors.get(&ka), self.actors.get(&kb)) else {
                    continue;
                };
                if a.body.deepest_contact_with(&b.body).hit() {
                    colliding.push((ka, kb));
                }
            }
        }

        for (ka, kb) in colliding {
            if let Some(mut a) = self.actors.remove(&ka) {
                if let Some(b) = self.actors.get_mut(&kb) {
                    let contact = a.body.deepest_contact_with(&b.body);
                    if contact.hit() {
                        solve_contact(&mut a.body, &mut b.body, &contact);
                    }
                }
                self.actors.insert(ka, a);
            }
        }

        for actor in self.actors.values_mut() {
            terrain.solve_body_contact(&mut actor.body);
        }

        for actor in self.actors.values_mut() {
            let body = &mut actor.body;
            if !body.is_static() {
                // gravity scaled by mass so acceleration is GRAVITY for all
                // dynamic bodies, plus linear drag
                body.apply_force(Vec3::new(0.0, -physics::GRAVITY / body.inverse_mass, 0.0));
                body.apply_force(body.velocity * -physics::DRAG);
            }
            body.integrate(sub_dt);
        }
    }
}
