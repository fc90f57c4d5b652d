//! Client runtime: wires the connection, handshake, movement loop, and
//! world store together and drives them from a single cooperative tick.
//!
//! All socket handling, input sampling, and state mutation run on one
//! execution context; handlers run to completion before the next event
//! is processed.

use crate::connection::Connection;
use crate::handshake::{HandshakePhase, RoomHandshake};
use crate::movement::MovementTracker;
use crate::world::WorldStore;
use log::{error, info};
use shared::{EventKind, ServerEvent, CLIENT_TICK_MS};
use std::time::{Duration, Instant};
use tokio::time::interval;

/// Raw-input collaborator: is the special action (steal/catch) key
/// held right now? Rendering and input devices live outside this crate.
pub trait InputSource {
    fn special_action_requested(&mut self) -> bool;
}

/// Input source that never requests the special action.
pub struct IdleInput;

impl InputSource for IdleInput {
    fn special_action_requested(&mut self) -> bool {
        false
    }
}

/// How the session enters play once the connection is live.
pub enum EntryMode {
    /// Normal flow: enter the matchmaking lobby.
    Room { is_kem: bool },
    /// Tournament flow: launch directly with an external session id.
    Tournament {
        game_session_id: String,
        account_id: Option<String>,
    },
}

// Give up after the bounded reconnect window has clearly lapsed.
const DISCONNECT_GRACE_TICKS: u32 = 5000 / CLIENT_TICK_MS as u32;

pub struct GameClient {
    connection: Connection,
    handshake: RoomHandshake,
    movement: MovementTracker,
    world: WorldStore,
    input: Box<dyn InputSource>,
    entry: EntryMode,
    entry_requested: bool,
    disconnected_ticks: u32,
}

impl GameClient {
    pub fn new(
        mut connection: Connection,
        char_type: u8,
        entry: EntryMode,
        input: Box<dyn InputSource>,
    ) -> Self {
        let world = WorldStore::new();

        // The snapshot subscription is the store's single writer.
        let store = world.clone();
        connection.subscribe(
            EventKind::GameState,
            Box::new(move |event| {
                if let ServerEvent::GameState(snapshot) = event {
                    store.apply_snapshot(snapshot.clone());
                }
            }),
        );

        connection.subscribe(
            EventKind::StealLog,
            Box::new(|event| {
                if let ServerEvent::StealLog(log) = event {
                    info!(
                        "{} stole a gift from {}",
                        log.actor.nick_name, log.victim.nick_name
                    );
                }
            }),
        );
        connection.subscribe(
            EventKind::StealComboLog,
            Box::new(|event| {
                if let ServerEvent::StealComboLog(log) = event {
                    info!(
                        "{} is on a x{} steal combo",
                        log.actor.nick_name, log.combo_count
                    );
                }
            }),
        );

        Self {
            connection,
            handshake: RoomHandshake::new(char_type),
            movement: MovementTracker::new(),
            world,
            input,
            entry,
            entry_requested: false,
            disconnected_ticks: 0,
        }
    }

    /// Handle for readers (rendering, tests). Cloning shares the state.
    pub fn world(&self) -> WorldStore {
        self.world.clone()
    }

    pub fn phase(&self) -> HandshakePhase {
        self.handshake.phase()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// One cooperative tick: drain the transport, route handshake
    /// events, then sample the local player for a movement update.
    pub fn tick(&mut self, now: Instant) {
        for event in self.connection.poll(now) {
            match &event {
                ServerEvent::Connected => {
                    if !self.entry_requested {
                        self.request_entry();
                    }
                }
                ServerEvent::Disconnected { .. } => {
                    // Reconnection must re-establish a fresh baseline
                    // rather than computing a delta across the gap.
                    self.movement.reset();
                }
                _ => {}
            }

            if let Err(e) = self.handshake.handle_event(&mut self.connection, &event) {
                error!("handshake fault on '{}': {}", event.name(), e);
            }

            // Launched sessions announce themselves under the assigned
            // identity once the server signals readiness; the lobby
            // flow has no assigned identity and emits nothing here.
            if matches!(event, ServerEvent::GameReady { .. }) {
                self.handshake.join_game(&mut self.connection);
            }
        }

        // Sampling pauses while disconnected; the baseline re-forms on
        // the first snapshot after reconnection.
        if !self.connection.is_connected() {
            return;
        }

        let local_id = self
            .handshake
            .assigned_user_id()
            .unwrap_or(self.connection.identity())
            .to_string();
        if let Some(character) = self.world.player(&local_id) {
            let special = self.input.special_action_requested();
            if let Some(sample) = self.movement.tick(&character, special, now) {
                self.connection.update_movement(&sample);
            }
        }
    }

    /// Runs the tick loop until the round ends or the session is lost
    /// for good (bounded reconnection exhausted).
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut ticker = interval(Duration::from_millis(CLIENT_TICK_MS));

        loop {
            ticker.tick().await;
            self.tick(Instant::now());

            if self.handshake.phase() == HandshakePhase::Over {
                info!("round over");
                break;
            }

            if self.connection.is_connected() {
                self.disconnected_ticks = 0;
            } else {
                self.disconnected_ticks += 1;
                if self.disconnected_ticks > DISCONNECT_GRACE_TICKS {
                    info!("session lost, giving up");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Tears the session down: round state cleared, subscriptions
    /// removed, transport closed. Idempotent.
    pub fn shutdown(&mut self) {
        self.world.clear();
        self.connection.disconnect();
    }

    fn request_entry(&mut self) {
        self.entry_requested = true;
        match &self.entry {
            EntryMode::Room { is_kem } => {
                let is_kem = *is_kem;
                self.handshake.enter_room(&mut self.connection, is_kem);
            }
            EntryMode::Tournament {
                game_session_id,
                account_id,
            } => {
                let game_session_id = game_session_id.clone();
                let account_id = account_id.clone();
                self.handshake
                    .launch_game(&mut self.connection, game_session_id, account_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{push_event, sent_events, FakeTransport, FakeWire};
    use shared::{Character, ClientEvent, GameSnapshot, Vec3, POSITION_THRESHOLD};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct HeldKey(bool);

    impl InputSource for HeldKey {
        fn special_action_requested(&mut self) -> bool {
            self.0
        }
    }

    fn room_client(held: bool) -> (GameClient, Rc<RefCell<FakeWire>>) {
        let (transport, wire) = FakeTransport::new();
        let connection = Connection::open(Box::new(transport), "p1");
        let client = GameClient::new(
            connection,
            1,
            EntryMode::Room { is_kem: false },
            Box::new(HeldKey(held)),
        );
        (client, wire)
    }

    fn snapshot(position: Vec3, remain: f32) -> GameSnapshot {
        let mut character = Character::new("p1", 1);
        character.position = position;
        GameSnapshot {
            remain_running_time: remain,
            characters: vec![character],
            map_items: Vec::new(),
        }
    }

    #[test]
    fn test_connected_event_triggers_room_entry_once() {
        let (mut client, wire) = room_client(false);

        push_event(&wire, &ServerEvent::Connected);
        client.tick(Instant::now());
        client.tick(Instant::now());

        let enters = sent_events(&wire)
            .into_iter()
            .filter(|e| matches!(e, ClientEvent::RoomEnter { .. }))
            .count();
        assert_eq!(enters, 1);
        assert_eq!(client.phase(), HandshakePhase::Entering);
    }

    #[test]
    fn test_snapshot_feeds_world_store() {
        let (mut client, wire) = room_client(false);
        let world = client.world();

        push_event(&wire, &ServerEvent::Connected);
        push_event(
            &wire,
            &ServerEvent::GameState(snapshot(Vec3::default(), 120.0)),
        );
        client.tick(Instant::now());

        assert_eq!(world.remaining_time(), 120.0);
        assert_eq!(world.player_count(), 1);
        assert!(world.player("p1").is_some());
    }

    #[test]
    fn test_movement_emitted_after_threshold_crossing() {
        let (mut client, wire) = room_client(false);
        let now = Instant::now();

        push_event(&wire, &ServerEvent::Connected);
        push_event(
            &wire,
            &ServerEvent::GameState(snapshot(Vec3::default(), 120.0)),
        );
        // First tick with a visible local player only baselines.
        client.tick(now);
        assert!(!sent_events(&wire)
            .iter()
            .any(|e| matches!(e, ClientEvent::Move(_))));

        push_event(
            &wire,
            &ServerEvent::GameState(snapshot(
                Vec3::new(POSITION_THRESHOLD * 3.0, 0.0, 0.0),
                119.0,
            )),
        );
        client.tick(now + Duration::from_millis(CLIENT_TICK_MS));

        let moves: Vec<_> = sent_events(&wire)
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::Move(sample) => Some(sample),
                _ => None,
            })
            .collect();
        assert_eq!(moves.len(), 1);
        assert!(!moves[0].shift);
    }

    #[test]
    fn test_disconnect_rebaselines_movement() {
        let (mut client, wire) = room_client(false);
        let mut now = Instant::now();

        push_event(&wire, &ServerEvent::Connected);
        push_event(
            &wire,
            &ServerEvent::GameState(snapshot(Vec3::default(), 120.0)),
        );
        client.tick(now);

        push_event(
            &wire,
            &ServerEvent::Disconnected {
                reason: "transport lost".to_string(),
            },
        );
        now += Duration::from_millis(CLIENT_TICK_MS);
        client.tick(now);

        // Reconnected with the player far away: the first tick after
        // the gap must only re-baseline, not transmit the jump.
        push_event(&wire, &ServerEvent::Connected);
        push_event(
            &wire,
            &ServerEvent::GameState(snapshot(Vec3::new(40.0, 0.0, 40.0), 100.0)),
        );
        now += Duration::from_millis(CLIENT_TICK_MS);
        client.tick(now);

        assert!(!sent_events(&wire)
            .iter()
            .any(|e| matches!(e, ClientEvent::Move(_))));
    }

    #[test]
    fn test_shutdown_clears_world_and_session() {
        let (mut client, wire) = room_client(false);
        let world = client.world();

        push_event(&wire, &ServerEvent::Connected);
        push_event(
            &wire,
            &ServerEvent::GameState(snapshot(Vec3::default(), 120.0)),
        );
        client.tick(Instant::now());
        assert_eq!(world.player_count(), 1);

        client.shutdown();
        assert_eq!(world.player_count(), 0);
        assert!(!client.connection().is_connected());

        // Idempotent.
        client.shutdown();
    }
}
