//! Client-side prediction and snapshot reconciliation
//!
//! The client runs the same deterministic simulation as the server, one
//! snapshot interval ahead of the authoritative timeline. Incoming snapshots
//! replace the prediction base; the local player's buffered inputs are
//! replayed on top so their own motion never snaps, while everyone else is
//! interpolated between the two most recent snapshots.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::sim::{GameState, PlayerId, Simulation};
use crate::util::time::{tick_delta, Tick, MAX_LATENESS, SIMULATION_TPS};
use crate::world::ActorKey;

/// Position interpolation between two states, keyed by actor. `alpha` is
/// clamped to [0, 1]; 0 yields `a`'s positions, 1 yields `b`'s. Everything
/// else comes from `b`. Actors in `except` are copied from `a` untouched
/// regardless of alpha; actors present in only one state keep `b`'s version.
pub fn lerp_states(
    a: &GameState,
    b: &GameState,
    alpha: f32,
    except: &BTreeSet<ActorKey>,
) -> GameState {
    let alpha = alpha.clamp(0.0, 1.0);
    let mut out = b.clone();
    let keys: Vec<ActorKey> = out.world.actors().map(|(key, _)| key).collect();
    for key in keys {
        let Ok(source) = a.world.actor(key) else {
            continue;
        };
        let Ok(target) = out.world.actor_mut(key) else {
            continue;
        };
        if except.contains(&key) {
            *target = source.clone();
            continue;
        }
        target.body.position = source.body.position.lerp(target.body.position, alpha);
        target.body.sync_shape_centers();
    }
    out
}

/// Estimates the tick the client should simulate at so its inputs arrive at
/// the server just in time: the server's announced tick plus half the
/// measured round trip, in ticks.
pub fn biased_tick(server_tick: Tick, round_trip: Duration) -> Tick {
    let lead = round_trip.as_secs_f32() * 0.5 * SIMULATION_TPS as f32;
    server_tick + lead.round() as Tick
}

/// Converts wall-clock frame time into whole simulation steps, carrying the
/// remainder so long-term tick rate matches real time regardless of frame
/// rate.
#[derive(Debug, Default)]
pub struct TickAccumulator {
    accumulated: f32,
}

impl TickAccumulator {
    /// Steps owed after `frame_dt` more seconds have passed
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        self.accumulated += frame_dt;
        let mut steps = 0;
        while self.accumulated >= tick_delta() {
            self.accumulated -= tick_delta();
            steps += 1;
        }
        steps
    }
}

/// Reconciles authoritative snapshots with local prediction
#[derive(Debug, Clone)]
pub struct Reconciler {
    local_player: PlayerId,
    prev: GameState,
    prev_tick: Tick,
    last: GameState,
    last_tick: Tick,
    /// Local timeline: last snapshot plus replayed buffered inputs
    predicted: GameState,
    /// Interpolated remote timeline, refreshed every local step
    others: GameState,
    ticks_since_snapshot: Tick,
}

impl Reconciler {
    pub fn new(local_player: PlayerId, initial: GameState) -> Self {
        Self {
            local_player,
            prev: initial.clone(),
            prev_tick: 0,
            last: initial.clone(),
            last_tick: 0,
            predicted: initial.clone(),
            others: initial,
            ticks_since_snapshot: 0,
        }
    }

    /// Adopts an authoritative snapshot taken at `tick`: the previous pair
    /// shifts down, prediction restarts from the snapshot with the buffered
    /// inputs up to `local_tick` replayed, and events old enough to never be
    /// replayed again are pruned from the log.
    pub fn receive_snapshot(
        &mut self,
        sim: &mut Simulation,
        state: GameState,
        tick: Tick,
        local_tick: Tick,
    ) {
        self.prev = std::mem::replace(&mut self.last, state.clone());
        self.prev_tick = self.last_tick;
        self.last_tick = tick;
        self.ticks_since_snapshot = 0;
        self.predicted = sim.apply_events(state, tick, local_tick.saturating_sub(1));
        sim.drop_event_history(tick.saturating_sub(MAX_LATENESS));
    }

    /// Runs one predicted step at `local_tick` and refreshes the
    /// interpolated remote state.
    pub fn advance(&mut self, sim: &Simulation, local_tick: Tick) {
        self.predicted = sim.apply_events(self.predicted.clone(), local_tick, local_tick + 1);

        let span = self.last_tick.saturating_sub(self.prev_tick).max(1);
        let alpha = self.ticks_since_snapshot as f32 / span as f32;
        self.others = lerp_states(&self.prev, &self.last, alpha, &BTreeSet::new());
        self.ticks_since_snapshot += 1;
    }

    /// The state to draw this frame: interpolated remotes with the local
    /// player's predicted actor layered on top.
    pub fn render_state(&self) -> GameState {
        let remote_keys: BTreeSet<ActorKey> = self
            .others
            .players
            .iter()
            .filter(|(id, _)| **id != self.local_player)
            .map(|(_, slot)| slot.actor_key)
            .collect();
        lerp_states(&self.others, &self.predicted, 1.0, &remote_keys)
    }

    pub fn predicted(&self) -> &GameState {
        &self.predicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::Heightfield;
    use crate::sim::event::{GameEvent, InputFrame};
    use crate::sim::metadata::Metadata;
    use approx::assert_relative_eq;

    fn test_sim() -> Simulation {
        Simulation::new(Metadata::new(Heightfield::flat(-500.0, 8, 8, 200.0)))
    }

    fn forward() -> GameEvent {
        GameEvent::Input(InputFrame {
            forward: true,
            ..InputFrame::default()
        })
    }

    #[test]
    fn lerp_endpoints_reproduce_inputs() {
        let mut sim = test_sim();
        sim.add_event(0, 1, GameEvent::Join);
        let a = sim.apply_events(GameState::new(4), 0, 1);
        for tick in 1..10 {
            sim.add_event(tick, 1, forward());
        }
        let b = sim.apply_events(a.clone(), 1, 10);

        let none = BTreeSet::new();
        let at_a = lerp_states(&a, &b, 0.0, &none);
        let at_b = lerp_states(&a, &b, 1.0, &none);

        let key = a.players[&1].actor_key;
        assert_eq!(
            at_a.world.actor(key).unwrap().body.position,
            a.world.actor(key).unwrap().body.position
        );
        assert_eq!(
            at_b.world.actor(key).unwrap().body.position,
            b.world.actor(key).unwrap().body.position
        );
    }

    #[test]
    fn excepted_actors_come_from_a_verbatim() {
        let mut sim = test_sim();
        sim.add_event(0, 1, GameEvent::Join);
        let a = sim.apply_events(GameState::new(4), 0, 1);
        for tick in 1..10 {
            sim.add_event(tick, 1, forward());
        }
        let b = sim.apply_events(a.clone(), 1, 10);

        let key = a.players[&1].actor_key;
        let except: BTreeSet<ActorKey> = [key].into();
        let out = lerp_states(&a, &b, 1.0, &except);
        assert_eq!(out.world.actor(key).unwrap(), a.world.actor(key).unwrap());
    }

    #[test]
    fn lerp_midpoint_is_between_endpoints() {
        let mut sim = test_sim();
        sim.add_event(0, 1, GameEvent::Join);
        let a = sim.apply_events(GameState::new(4), 0, 1);
        for tick in 1..20 {
            sim.add_event(tick, 1, forward());
        }
        let b = sim.apply_events(a.clone(), 1, 20);

        let key = a.players[&1].actor_key;
        let mid = lerp_states(&a, &b, 0.5, &BTreeSet::new());
        let ax = a.world.actor(key).unwrap().body.position.x;
        let bx = b.world.actor(key).unwrap().body.position.x;
        let mx = mid.world.actor(key).unwrap().body.position.x;
        assert_relative_eq!(mx, (ax + bx) * 0.5, epsilon = 1e-4);
    }

    #[test]
    fn local_prediction_survives_snapshot_adoption() {
        let mut sim = test_sim();
        sim.add_event(0, 1, GameEvent::Join);
        let base = sim.apply_events(GameState::new(4), 0, 1);

        // Inputs the client has sent but the server has not yet confirmed
        for tick in 1..30 {
            sim.add_event(tick, 1, forward());
        }
        let mut reconciler = Reconciler::new(1, base.clone());
        for tick in 1..30 {
            reconciler.advance(&sim, tick);
        }
        let before = reconciler.predicted().actor_of(1).unwrap().body.position;

        // Authoritative snapshot from tick 1; replaying the same buffered
        // inputs must land the local player in the same place.
        reconciler.receive_snapshot(&mut sim, base, 1, 31);
        let after = reconciler.predicted().actor_of(1).unwrap().body.position;
        assert_relative_eq!(before.x, after.x, epsilon = 1e-3);
    }

    #[test]
    fn render_state_layers_prediction_over_interpolation() {
        let mut sim = test_sim();
        sim.add_event(0, 1, GameEvent::Join);
        sim.add_event(0, 2, GameEvent::Join);
        let base = sim.apply_events(GameState::new(4), 0, 1);

        let mut reconciler = Reconciler::new(1, base.clone());
        for tick in 1..5 {
            sim.add_event(tick, 1, forward());
            reconciler.advance(&sim, tick);
        }

        let render = reconciler.render_state();
        let self_key = base.players[&1].actor_key;
        let other_key = base.players[&2].actor_key;
        assert_eq!(
            render.world.actor(self_key).unwrap().body.position,
            reconciler.predicted().actor_of(1).unwrap().body.position
        );
        // Remote player comes from the interpolated timeline
        assert_eq!(
            render.world.actor(other_key).unwrap(),
            reconciler.others.world.actor(other_key).unwrap()
        );
    }

    #[test]
    fn biased_tick_leads_by_half_the_round_trip() {
        assert_eq!(biased_tick(100, Duration::ZERO), 100);
        // 100ms rtt at 60 tps: 3 ticks of lead
        assert_eq!(biased_tick(100, Duration::from_millis(100)), 103);
    }

    #[test]
    fn accumulator_owes_whole_steps_only() {
        let mut acc = TickAccumulator::default();
        assert_eq!(acc.advance(tick_delta() * 0.5), 0);
        assert_eq!(acc.advance(tick_delta() * 0.6), 1);
        assert_eq!(acc.advance(tick_delta() * 3.0), 3);
    }

    #[test]
    fn lerp_skips_actors_missing_from_either_side() {
        let mut sim = test_sim();
        sim.add_event(0, 1, GameEvent::Join);
        let a = sim.apply_events(GameState::new(4), 0, 1);
        let mut b = a.clone();
        sim.add_event(1, 2, GameEvent::Join);
        b = sim.apply_events(b, 1, 2);

        let out = lerp_states(&a, &b, 0.5, &BTreeSet::new());
        let new_key = b.players[&2].actor_key;
        // Actor only in b keeps b's transform
        assert_eq!(
            out.world.actor(new_key).unwrap().body.position,
            b.world.actor(new_key).unwrap().body.position
        );
    }
}
