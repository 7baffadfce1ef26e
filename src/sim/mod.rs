//! Deterministic game simulation: state, event application, replay

pub mod event;
pub mod log;
pub mod metadata;
pub mod snapshot;

use std::collections::BTreeMap;
use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::physics::{Body, Shape, HOR_SPEED, JUMP_IMPULSE};
use crate::sim::log::EventLog;
use crate::sim::metadata::Metadata;
use crate::util::time::{tick_delta, Tick};
use crate::world::{Actor, ActorKey, ModelTag, World};

pub use event::{GameEvent, InputFrame};

pub type PlayerId = u32;

pub const PLAYER_RADIUS: f32 = 13.0;
pub const SPAWN_HEIGHT: f32 = 10.0;
pub const SPAWN_SCATTER: f32 = 60.0;
/// Cameras stop just short of straight up/down so the forward basis never
/// degenerates.
pub const PITCH_LIMIT: f32 = 0.9 * FRAC_PI_2;

/// Binds a player id to its actor in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSlot {
    pub actor_key: ActorKey,
}

/// The full replayable state of a match. Everything event application reads
/// or writes lives here, including the rng used for spawn placement, so two
/// replays of the same event log from the same state cannot diverge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub players: BTreeMap<PlayerId, PlayerSlot>,
    pub world: World,
    rng: ChaCha8Rng,
}

impl GameState {
    pub fn new(seed: u64) -> Self {
        Self {
            players: BTreeMap::new(),
            world: World::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn actor_of(&self, player_id: PlayerId) -> Option<&Actor> {
        let slot = self.players.get(&player_id)?;
        self.world.actor(slot.actor_key).ok()
    }

    fn spawn_position(&mut self) -> Vec3 {
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = self.rng.gen_range(0.0..SPAWN_SCATTER);
        Vec3::new(
            angle.cos() * distance,
            SPAWN_HEIGHT,
            angle.sin() * distance,
        )
    }
}

fn body_at(shape: Shape, position: Vec3) -> Body {
    let mut body = Body::with_shape(shape);
    body.position = position;
    body.sync_shape_centers();
    body
}

/// Populates the fixed arena geometry: a static floor slab, a dynamic
/// platform, a pushable crate and a stack of spheres.
pub fn init_arena(state: &mut GameState) {
    state.world.add_actor(Actor::new(
        Body::fixed(
            Shape::aabb(Vec3::new(1000.0, 100.0, 1000.0)),
            Vec3::new(0.0, -100.0, 0.0),
        ),
        ModelTag::Prop,
    ));

    state.world.add_actor(Actor::new(
        body_at(
            Shape::aabb(Vec3::new(30.0, 5.0, 30.0)),
            Vec3::new(40.0, 20.0, 0.0),
        ),
        ModelTag::Prop,
    ));

    state.world.add_actor(Actor::new(
        body_at(Shape::aabb(Vec3::splat(11.0)), Vec3::new(0.0, 20.0, 40.0)),
        ModelTag::Crate,
    ));

    for i in 1..=4 {
        state.world.add_actor(Actor::new(
            body_at(
                Shape::sphere(10.0),
                Vec3::new(40.0, 20.0 * i as f32, 40.0),
            ),
            ModelTag::Prop,
        ));
    }
}

/// Event log plus the immutable per-match context (terrain, player names).
/// State itself is passed through [`Simulation::apply_events`] by value; the
/// simulation never owns it.
#[derive(Debug, Clone)]
pub struct Simulation {
    log: EventLog,
    metadata: Metadata,
}

impl Simulation {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            log: EventLog::default(),
            metadata,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn add_event(&mut self, tick: Tick, player_id: PlayerId, event: GameEvent) {
        self.log.push(tick, player_id, event);
    }

    /// Forget events strictly before `tick`. Replays must never start below
    /// the prune point afterwards.
    pub fn drop_event_history(&mut self, tick: Tick) {
        self.log.prune(tick);
    }

    /// Advance `state` from `from` (inclusive) to `to` (exclusive): for each
    /// tick, apply that tick's logged events in player-id order, then run one
    /// physics step. Empty ranges return the state unchanged.
    pub fn apply_events(&self, mut state: GameState, from: Tick, to: Tick) -> GameState {
        for tick in from..to {
            for (player_id, event) in self.log.events_at(tick) {
                apply_event(&mut state, player_id, event);
            }
            state.world.step(tick_delta(), self.metadata.terrain());
        }
        state
    }
}

/// Applies one event to the state. Events addressing players or actors that
/// no longer exist are no-ops so a replay straddling a disconnect stays
/// well defined.
pub fn apply_event(state: &mut GameState, player_id: PlayerId, event: &GameEvent) {
    match event {
        GameEvent::Join => {
            if state.players.contains_key(&player_id) {
                return;
            }
            let position = state.spawn_position();
            let actor = Actor::new(
                body_at(Shape::sphere(PLAYER_RADIUS), position),
                ModelTag::Player,
            );
            let key = state.world.add_actor(actor);
            state.players.insert(player_id, PlayerSlot { actor_key: key });
        }
        GameEvent::Leave => {
            if let Some(slot) = state.players.remove(&player_id) {
                state.world.remove_actor(slot.actor_key);
            }
        }
        GameEvent::Input(input) => {
            let Some(slot) = state.players.get(&player_id) else {
                return;
            };
            let Ok(actor) = state.world.actor_mut(slot.actor_key) else {
                return;
            };
            apply_input(actor, input);
        }
    }
}

fn apply_input(actor: &mut Actor, input: &InputFrame) {
    let axis = input.axis();
    // Movement uses the basis from before this frame's mouse delta, and
    // forward is flattened so looking down does not slow walking.
    let forward = actor.forward() * Vec3::new(1.0, 0.0, 1.0) * axis.x;
    let right = actor.right() * axis.y;
    actor.body.velocity += (forward + right) * tick_delta() * HOR_SPEED;

    actor.yaw += input.mouse_dx;
    actor.pitch = (actor.pitch + input.mouse_dy).clamp(-PITCH_LIMIT, PITCH_LIMIT);

    if input.jump && actor.body.on_ground {
        actor.body.velocity.y = JUMP_IMPULSE;
        actor.body.on_ground = false;
    }
}
