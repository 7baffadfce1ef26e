//! Tick-indexed event log

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sim::event::GameEvent;
use crate::sim::PlayerId;
use crate::util::time::Tick;

/// Events bucketed by the tick they take effect at. Iteration order within a
/// bucket is fixed by ascending player id so every replay of the same log
/// produces the same state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    buckets: BTreeMap<Tick, Vec<(PlayerId, GameEvent)>>,
}

impl EventLog {
    pub fn push(&mut self, tick: Tick, player_id: PlayerId, event: GameEvent) {
        self.buckets.entry(tick).or_default().push((player_id, event));
    }

    /// Events scheduled for `tick`, ordered by player id. Events from the
    /// same player keep their arrival order.
    pub fn events_at(&self, tick: Tick) -> Vec<(PlayerId, &GameEvent)> {
        let Some(bucket) = self.buckets.get(&tick) else {
            return Vec::new();
        };
        let mut events: Vec<(PlayerId, &GameEvent)> =
            bucket.iter().map(|(id, ev)| (*id, ev)).collect();
        events.sort_by_key(|(id, _)| *id);
        events
    }

    /// Drop every bucket strictly before `tick`. Those ticks are settled and
    /// will never be replayed again.
    pub fn prune(&mut self, tick: Tick) {
        self.buckets = self.buckets.split_off(&tick);
    }

    pub fn earliest_tick(&self) -> Option<Tick> {
        self.buckets.keys().next().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
