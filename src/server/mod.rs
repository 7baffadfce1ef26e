//! Authoritative server session
//!
//! The session advances two copies of the state. The confirmed state trails
//! real time by the full receive window, so every input that can still
//! legally arrive has already been folded in when a tick is settled. The
//! broadcast state is re-derived from the confirmed state each snapshot
//! interval and sits `SERVER_LATENESS` ticks behind the session clock, which
//! is exactly the slack late inputs are allowed.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::physics::Heightfield;
use crate::protocol::ServerMsg;
use crate::sim::event::{GameEvent, InputFrame};
use crate::sim::metadata::Metadata;
use crate::sim::snapshot::encode_state;
use crate::sim::{init_arena, GameState, PlayerId, Simulation};
use crate::util::time::{
    Tick, Timer, MAX_LATENESS, METADATA_TICK_PERIOD, RECEIVE_WINDOW, SERVER_LATENESS,
    SIMULATION_TPS, TICK_PERIOD,
};

/// Commands delivered by transport tasks to the session
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Connect { player_id: PlayerId },
    Disconnect { player_id: PlayerId },
    Input {
        player_id: PlayerId,
        tick: Tick,
        frame: InputFrame,
    },
    SetName { player_id: PlayerId, name: String },
    Ping { t: u64 },
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub command_tx: mpsc::Sender<SessionCommand>,
    pub msg_tx: broadcast::Sender<ServerMsg>,
    player_count: Arc<AtomicUsize>,
    next_player_id: Arc<AtomicU32>,
    metadata_cache: Arc<RwLock<Bytes>>,
}

impl SessionHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Hands out fresh player ids; transport tasks call this before sending
    /// Connect.
    pub fn allocate_player_id(&self) -> PlayerId {
        self.next_player_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Latest encoded metadata, sent to clients that connect between
    /// metadata broadcasts
    pub fn metadata_bytes(&self) -> Bytes {
        self.metadata_cache.read().clone()
    }
}

/// The authoritative game session
pub struct ServerSession {
    tick: Tick,
    /// All inputs settled up to its tick; the replay base
    confirmed: GameState,
    /// Derived from `confirmed`, what clients last saw
    broadcast_state: GameState,
    sim: Simulation,
    command_rx: mpsc::Receiver<SessionCommand>,
    msg_tx: broadcast::Sender<ServerMsg>,
    player_count: Arc<AtomicUsize>,
    metadata_cache: Arc<RwLock<Bytes>>,
}

impl ServerSession {
    pub fn new(seed: u64, terrain: Heightfield) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (msg_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));
        let metadata_cache = Arc::new(RwLock::new(Bytes::new()));

        let handle = SessionHandle {
            command_tx,
            msg_tx: msg_tx.clone(),
            player_count: player_count.clone(),
            next_player_id: Arc::new(AtomicU32::new(1)),
            metadata_cache: metadata_cache.clone(),
        };

        let mut confirmed = GameState::new(seed);
        init_arena(&mut confirmed);
        let broadcast_state = confirmed.clone();

        let mut session = Self {
            tick: 0,
            confirmed,
            broadcast_state,
            sim: Simulation::new(Metadata::new(terrain)),
            command_rx,
            msg_tx,
            player_count,
            metadata_cache,
        };
        session.refresh_metadata();

        (session, handle)
    }

    /// Run the authoritative tick loop. Returns when every command sender
    /// has been dropped.
    pub async fn run(mut self) {
        info!("session started");

        let tick_duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            if !self.process_commands() {
                info!(tick = self.tick, "command channel closed, session ending");
                break;
            }

            self.run_tick();
        }
    }

    /// Drain pending commands. Returns false once the channel is closed.
    fn process_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.handle_command(command),
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect { player_id } => self.handle_connect(player_id),
            SessionCommand::Disconnect { player_id } => self.handle_disconnect(player_id),
            SessionCommand::Input {
                player_id,
                tick,
                frame,
            } => self.handle_input(player_id, tick, frame),
            SessionCommand::SetName { player_id, name } => {
                self.sim.metadata_mut().set_player_name(player_id, name);
                self.refresh_metadata();
                let _ = self.msg_tx.send(ServerMsg::Metadata {
                    bytes: self.metadata_bytes(),
                });
            }
            SessionCommand::Ping { t } => {
                let _ = self.msg_tx.send(ServerMsg::Pong { t });
            }
        }
    }

    fn handle_connect(&mut self, player_id: PlayerId) {
        info!(player_id, tick = self.tick, "player connected");
        self.sim.add_event(self.tick, player_id, GameEvent::Join);
        self.sim
            .metadata_mut()
            .set_player_name(player_id, format!("player_{player_id}"));
        self.refresh_metadata();
        self.player_count.fetch_add(1, Ordering::Relaxed);

        let _ = self.msg_tx.send(ServerMsg::Welcome {
            player_id,
            tick: self.tick,
        });
    }

    fn handle_disconnect(&mut self, player_id: PlayerId) {
        info!(player_id, tick = self.tick, "player disconnected");
        self.sim.add_event(self.tick, player_id, GameEvent::Leave);
        self.sim.metadata_mut().remove_player_name(player_id);
        self.refresh_metadata();
        self.player_count.fetch_sub(1, Ordering::Relaxed);
    }

    /// Schedules an input at the client's claimed tick, clamped into the
    /// receive window around the session clock. Clamping instead of dropping
    /// keeps a badly skewed client playable while bounding how far its
    /// inputs can time-travel.
    fn handle_input(&mut self, player_id: PlayerId, tick: Tick, frame: InputFrame) {
        let earliest = self.tick.saturating_sub(RECEIVE_WINDOW);
        let latest = self.tick + RECEIVE_WINDOW;
        let clamped = tick.clamp(earliest, latest);
        if clamped != tick {
            debug!(player_id, tick, clamped, "input outside receive window");
        }
        self.sim
            .add_event(clamped, player_id, GameEvent::Input(frame));
    }

    fn run_tick(&mut self) {
        let timer = Timer::new();

        if self.tick % TICK_PERIOD == 0 && self.tick >= MAX_LATENESS {
            self.advance_and_broadcast();
        }

        if self.tick % METADATA_TICK_PERIOD == 0 {
            let _ = self.msg_tx.send(ServerMsg::Metadata {
                bytes: self.metadata_bytes(),
            });
            let _ = self.msg_tx.send(ServerMsg::Tick { tick: self.tick });
        }

        let elapsed = timer.elapsed_micros();
        if elapsed > 1_000_000 / SIMULATION_TPS as u64 {
            warn!(tick = self.tick, elapsed_us = elapsed, "tick took longer than the interval");
        }

        self.tick += 1;
    }

    /// One snapshot interval: settle the ticks whose receive window has
    /// closed into the confirmed state, re-derive the broadcast state from
    /// it, publish, and prune events below the settled boundary.
    fn advance_and_broadcast(&mut self) {
        let current = self.tick - SERVER_LATENESS;
        let settled = current - RECEIVE_WINDOW;
        let previously_settled = settled - TICK_PERIOD;

        self.confirmed = self
            .sim
            .apply_events(self.confirmed.clone(), previously_settled, settled);
        self.broadcast_state = self
            .sim
            .apply_events(self.confirmed.clone(), settled, current);

        match encode_state(&self.broadcast_state, current) {
            Ok(snapshot) => {
                let _ = self.msg_tx.send(ServerMsg::Snapshot {
                    tick: snapshot.tick,
                    bytes: snapshot.bytes,
                });
            }
            Err(err) => {
                error!(tick = current, error = %err, "snapshot encoding failed, skipping broadcast");
            }
        }

        self.sim.drop_event_history(previously_settled);
    }

    fn refresh_metadata(&mut self) {
        match self.sim.metadata().encode() {
            Ok(bytes) => *self.metadata_cache.write() = bytes,
            Err(err) => error!(error = %err, "metadata encoding failed"),
        }
    }

    fn metadata_bytes(&self) -> Bytes {
        self.metadata_cache.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::snapshot::decode_state;

    fn test_session() -> (ServerSession, SessionHandle) {
        ServerSession::new(11, Heightfield::flat(-500.0, 8, 8, 200.0))
    }

    fn run_ticks(session: &mut ServerSession, count: u32) {
        for _ in 0..count {
            session.run_tick();
        }
    }

    #[test]
    fn no_snapshots_before_the_pipeline_fills() {
        let (mut session, handle) = test_session();
        let mut rx = handle.msg_tx.subscribe();
        run_ticks(&mut session, MAX_LATENESS);

        while let Ok(msg) = rx.try_recv() {
            assert!(!matches!(msg, ServerMsg::Snapshot { .. }));
        }
    }

    #[test]
    fn snapshots_lag_the_session_clock_by_server_lateness() {
        let (mut session, handle) = test_session();
        let mut rx = handle.msg_tx.subscribe();
        run_ticks(&mut session, MAX_LATENESS + 1);

        let mut snapshot_tick = None;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::Snapshot { tick, .. } = msg {
                snapshot_tick = Some(tick);
            }
        }
        assert_eq!(snapshot_tick, Some(MAX_LATENESS - SERVER_LATENESS));
    }

    #[test]
    fn connected_player_appears_in_broadcast_state() {
        let (mut session, handle) = test_session();
        let mut rx = handle.msg_tx.subscribe();

        session.handle_command(SessionCommand::Connect { player_id: 1 });
        run_ticks(&mut session, MAX_LATENESS * 2);

        let mut last = None;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::Snapshot { tick, bytes } = msg {
                last = Some(crate::sim::snapshot::Snapshot { tick, bytes });
            }
        }
        let state = decode_state(&last.unwrap()).unwrap();
        assert!(state.players.contains_key(&1));
        assert_eq!(handle.player_count(), 1);
    }

    #[test]
    fn late_input_is_clamped_into_the_receive_window() {
        let (mut session, _handle) = test_session();
        run_ticks(&mut session, 100);
        assert_eq!(session.tick, 100);

        session.handle_input(1, 5, InputFrame::default());
        let earliest = session.sim.log().earliest_tick();
        assert_eq!(earliest, Some(100 - RECEIVE_WINDOW));
    }

    #[test]
    fn confirmed_and_broadcast_states_stay_consistent() {
        let (mut session, handle) = test_session();
        let mut rx = handle.msg_tx.subscribe();
        session.handle_command(SessionCommand::Connect { player_id: 1 });
        for tick in 1..120 {
            session.handle_input(
                1,
                tick,
                InputFrame {
                    forward: true,
                    ..InputFrame::default()
                },
            );
            session.run_tick();
        }

        // Re-deriving the last snapshot from the confirmed state gives the
        // same bytes that were broadcast.
        let mut last = None;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::Snapshot { tick, bytes } = msg {
                last = Some((tick, bytes));
            }
        }
        let (tick, bytes) = last.unwrap();
        let settled = tick - RECEIVE_WINDOW;
        let rebuilt = session
            .sim
            .apply_events(session.confirmed.clone(), settled, tick);
        assert_eq!(encode_state(&rebuilt, tick).unwrap().bytes, bytes);
    }

    #[test]
    fn metadata_cache_tracks_name_changes() {
        let (mut session, handle) = test_session();
        session.handle_command(SessionCommand::Connect { player_id: 3 });
        let before = Metadata::decode(&handle.metadata_bytes()).unwrap();
        assert_eq!(before.player_name(3), Some("player_3"));

        session.handle_command(SessionCommand::SetName {
            player_id: 3,
            name: "ada".into(),
        });
        let after = Metadata::decode(&handle.metadata_bytes()).unwrap();
        assert_eq!(after.player_name(3), Some("ada"));
    }
}
