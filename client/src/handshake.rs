//! Room entry, launch, and confirm handshake.
//!
//! Drives the sequence: enter room → wait for room state → launch →
//! confirm → join → start. The tournament branch skips the lobby and
//! launches straight from `Idle` when an external game session id is
//! supplied. The machine owns the transition flags; snapshot data
//! lives in the world store.

use crate::connection::Connection;
use log::{debug, info};
use shared::ServerEvent;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Idle,
    Entering,
    InRoom,
    LaunchRequested,
    AwaitingConfirmResponse,
    Confirmed,
    Joining,
    InGame,
    Over,
}

/// Sequencing faults the machine refuses to paper over.
#[derive(Debug, PartialEq, Eq)]
pub enum HandshakeError {
    /// A launch acknowledgment arrived but no game session id was
    /// recorded for the launch attempt, so the mandatory confirm
    /// round-trip cannot be emitted. The machine stays in
    /// `LaunchRequested` rather than silently continuing.
    MissingGameSession,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::MissingGameSession => {
                write!(f, "cannot confirm room: no game session id for this launch")
            }
        }
    }
}

impl Error for HandshakeError {}

pub struct RoomHandshake {
    phase: HandshakePhase,
    char_type: u8,
    game_session_id: Option<String>,
    assigned_user_id: Option<String>,
    nick_name: Option<String>,
    is_guest: bool,
}

impl RoomHandshake {
    pub fn new(char_type: u8) -> Self {
        Self {
            phase: HandshakePhase::Idle,
            char_type,
            game_session_id: None,
            assigned_user_id: None,
            nick_name: None,
            is_guest: false,
        }
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    /// Canonical identity assigned by the server during launch, once known.
    pub fn assigned_user_id(&self) -> Option<&str> {
        self.assigned_user_id.as_deref()
    }

    pub fn nick_name(&self) -> Option<&str> {
        self.nick_name.as_deref()
    }

    pub fn is_guest(&self) -> bool {
        self.is_guest
    }

    /// Requests lobby entry. Suppressed (no error) when the connection
    /// is down, a room was already entered, or a round is in flight.
    pub fn enter_room(&mut self, connection: &mut Connection, is_kem: bool) {
        if !matches!(self.phase, HandshakePhase::Idle | HandshakePhase::Over) {
            debug!("room entry suppressed in phase {:?}", self.phase);
            return;
        }
        if connection.enter_room(self.char_type, is_kem) {
            self.phase = HandshakePhase::Entering;
        }
    }

    /// Requests a game launch, from the lobby or — with an externally
    /// supplied game session id — straight from `Idle` (tournament
    /// branch). Dropped without queueing when the connection is down.
    pub fn launch_game(
        &mut self,
        connection: &mut Connection,
        game_session_id: String,
        account_id: Option<String>,
    ) {
        if !connection.is_connected() {
            debug!("room.launchGame dropped: not connected");
            return;
        }
        if !matches!(
            self.phase,
            HandshakePhase::Idle | HandshakePhase::InRoom | HandshakePhase::Over
        ) {
            debug!("launch suppressed in phase {:?}", self.phase);
            return;
        }

        connection.launch_game(self.char_type, &game_session_id, account_id.as_deref());
        self.game_session_id = Some(game_session_id);
        self.phase = HandshakePhase::LaunchRequested;
    }

    /// Leaves the lobby; only valid while `InRoom`.
    pub fn leave_room(&mut self, connection: &mut Connection) {
        if self.phase != HandshakePhase::InRoom {
            debug!("room.leave suppressed in phase {:?}", self.phase);
            return;
        }
        connection.leave_room();
        self.phase = HandshakePhase::Idle;
    }

    /// Emits the dual-use `game.join` action under the assigned identity.
    pub fn join_game(&mut self, connection: &mut Connection) {
        if let Some(user_id) = self.assigned_user_id.clone() {
            connection.join_game(&user_id);
        } else {
            debug!("game.join suppressed: no assigned identity yet");
        }
    }

    /// Applies one inbound event. Out-of-sequence events are ignored;
    /// the only hard fault is a launch acknowledgment with no recorded
    /// game session id, which is surfaced instead of silently skipped.
    pub fn handle_event(
        &mut self,
        connection: &mut Connection,
        event: &ServerEvent,
    ) -> Result<(), HandshakeError> {
        match event {
            ServerEvent::RoomChangeState(info) => {
                if self.phase == HandshakePhase::Entering {
                    info!(
                        "joined room '{}' ({}/{} players)",
                        info.room_id, info.player_cnt, info.max_player_cnt
                    );
                    self.phase = HandshakePhase::InRoom;
                }
                // Occupancy updates recur freely while in the room.
            }

            ServerEvent::RoomLaunchGameResponse {
                user_id,
                nick_name,
                is_guest,
            } => {
                if self.phase != HandshakePhase::LaunchRequested {
                    debug!("launch response ignored in phase {:?}", self.phase);
                    return Ok(());
                }

                // The server-assigned identity supersedes whatever the
                // client held before; the confirm must echo it back.
                self.assigned_user_id = Some(user_id.clone());
                self.nick_name = Some(nick_name.clone());
                self.is_guest = *is_guest;

                let game_session_id = match &self.game_session_id {
                    Some(id) => id.clone(),
                    None => return Err(HandshakeError::MissingGameSession),
                };

                connection.confirm_room(user_id, self.char_type, &game_session_id);
                self.phase = HandshakePhase::AwaitingConfirmResponse;
            }

            ServerEvent::GameReady { .. } => {
                if matches!(
                    self.phase,
                    HandshakePhase::InRoom | HandshakePhase::AwaitingConfirmResponse
                ) {
                    self.phase = HandshakePhase::Confirmed;
                }
            }

            ServerEvent::GameJoin { .. } => {
                if matches!(
                    self.phase,
                    HandshakePhase::AwaitingConfirmResponse | HandshakePhase::Confirmed
                ) {
                    self.phase = HandshakePhase::Joining;
                }
            }

            ServerEvent::GameStart => {
                if matches!(
                    self.phase,
                    HandshakePhase::Confirmed | HandshakePhase::Joining
                ) {
                    info!("game started");
                    self.phase = HandshakePhase::InGame;
                }
            }

            ServerEvent::GameOver { room_id } => {
                info!("game over in room '{}'", room_id);
                self.phase = HandshakePhase::Over;
                self.game_session_id = None;
            }

            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{established_connection, push_event, sent_events, FakeTransport};
    use shared::{ClientEvent, RoomInfo};
    use std::time::Instant;

    fn room_info(player_cnt: u32) -> RoomInfo {
        RoomInfo {
            room_id: "room-1".to_string(),
            player_cnt,
            state: "waiting".to_string(),
            max_player_cnt: 8,
        }
    }

    fn launch_response(user_id: &str) -> ServerEvent {
        ServerEvent::RoomLaunchGameResponse {
            user_id: user_id.to_string(),
            nick_name: "rudolph".to_string(),
            is_guest: false,
        }
    }

    #[test]
    fn test_normal_room_flow() {
        let (transport, wire) = FakeTransport::new();
        let mut connection = established_connection(transport, &wire, "p1");
        let mut handshake = RoomHandshake::new(1);

        handshake.enter_room(&mut connection, false);
        assert_eq!(handshake.phase(), HandshakePhase::Entering);

        handshake
            .handle_event(&mut connection, &ServerEvent::RoomChangeState(room_info(1)))
            .unwrap();
        assert_eq!(handshake.phase(), HandshakePhase::InRoom);

        // Occupancy updates recur without changing phase.
        handshake
            .handle_event(&mut connection, &ServerEvent::RoomChangeState(room_info(3)))
            .unwrap();
        assert_eq!(handshake.phase(), HandshakePhase::InRoom);

        handshake
            .handle_event(
                &mut connection,
                &ServerEvent::GameReady {
                    user_id: "p1".to_string(),
                    char_type: 1,
                    game_session_id: String::new(),
                },
            )
            .unwrap();
        assert_eq!(handshake.phase(), HandshakePhase::Confirmed);

        handshake
            .handle_event(&mut connection, &ServerEvent::GameStart)
            .unwrap();
        assert_eq!(handshake.phase(), HandshakePhase::InGame);
    }

    #[test]
    fn test_tournament_branch_confirms_assigned_identity() {
        let (transport, wire) = FakeTransport::new();
        let mut connection = established_connection(transport, &wire, "provisional");
        let mut handshake = RoomHandshake::new(2);

        handshake.launch_game(&mut connection, "session-42".to_string(), None);
        assert_eq!(handshake.phase(), HandshakePhase::LaunchRequested);

        handshake
            .handle_event(&mut connection, &launch_response("server-assigned"))
            .unwrap();
        assert_eq!(handshake.phase(), HandshakePhase::AwaitingConfirmResponse);
        assert_eq!(handshake.assigned_user_id(), Some("server-assigned"));

        let confirm = sent_events(&wire)
            .into_iter()
            .find_map(|e| match e {
                ClientEvent::RoomConfirm {
                    user_id,
                    char_type,
                    game_session_id,
                } => Some((user_id, char_type, game_session_id)),
                _ => None,
            })
            .expect("confirm frame emitted");
        assert_eq!(confirm.0, "server-assigned");
        assert_eq!(confirm.1, 2);
        assert_eq!(confirm.2, "session-42");

        handshake
            .handle_event(
                &mut connection,
                &ServerEvent::GameJoin {
                    user_id: "server-assigned".to_string(),
                },
            )
            .unwrap();
        assert_eq!(handshake.phase(), HandshakePhase::Joining);

        handshake
            .handle_event(&mut connection, &ServerEvent::GameStart)
            .unwrap();
        assert_eq!(handshake.phase(), HandshakePhase::InGame);
    }

    #[test]
    fn test_no_confirm_without_launch_response() {
        let (transport, wire) = FakeTransport::new();
        let mut connection = established_connection(transport, &wire, "p1");
        let mut handshake = RoomHandshake::new(1);

        handshake.enter_room(&mut connection, false);
        handshake
            .handle_event(&mut connection, &ServerEvent::RoomChangeState(room_info(1)))
            .unwrap();
        handshake
            .handle_event(&mut connection, &ServerEvent::GameStart)
            .unwrap();

        assert!(!sent_events(&wire)
            .iter()
            .any(|e| matches!(e, ClientEvent::RoomConfirm { .. })));
    }

    #[test]
    fn test_launch_response_without_session_id_fails_loudly() {
        let (transport, wire) = FakeTransport::new();
        let mut connection = established_connection(transport, &wire, "p1");
        let mut handshake = RoomHandshake::new(1);

        handshake.enter_room(&mut connection, false);
        handshake
            .handle_event(&mut connection, &ServerEvent::RoomChangeState(room_info(1)))
            .unwrap();

        // Force the gap directly: a launch acknowledgment with no
        // recorded session id.
        handshake.phase = HandshakePhase::LaunchRequested;
        let result = handshake.handle_event(&mut connection, &launch_response("u-1"));
        assert_eq!(result, Err(HandshakeError::MissingGameSession));
        assert_eq!(handshake.phase(), HandshakePhase::LaunchRequested);
        assert!(!sent_events(&wire)
            .iter()
            .any(|e| matches!(e, ClientEvent::RoomConfirm { .. })));
    }

    #[test]
    fn test_launch_dropped_without_connection() {
        let (transport, wire) = FakeTransport::new();
        let mut connection = Connection::open(Box::new(transport), "p1");
        let mut handshake = RoomHandshake::new(1);

        handshake.launch_game(&mut connection, "session-1".to_string(), None);
        assert_eq!(handshake.phase(), HandshakePhase::Idle);
        assert!(!sent_events(&wire)
            .iter()
            .any(|e| matches!(e, ClientEvent::RoomLaunchGame { .. })));
    }

    #[test]
    fn test_game_over_allows_fresh_entry() {
        let (transport, wire) = FakeTransport::new();
        let mut connection = established_connection(transport, &wire, "p1");
        let mut handshake = RoomHandshake::new(1);

        handshake.enter_room(&mut connection, false);
        handshake
            .handle_event(&mut connection, &ServerEvent::RoomChangeState(room_info(1)))
            .unwrap();

        push_event(
            &wire,
            &ServerEvent::GameOver {
                room_id: "room-1".to_string(),
            },
        );
        for event in connection.poll(Instant::now()) {
            handshake.handle_event(&mut connection, &event).unwrap();
        }
        assert_eq!(handshake.phase(), HandshakePhase::Over);

        handshake.enter_room(&mut connection, false);
        assert_eq!(handshake.phase(), HandshakePhase::Entering);

        let enters = sent_events(&wire)
            .into_iter()
            .filter(|e| matches!(e, ClientEvent::RoomEnter { .. }))
            .count();
        assert_eq!(enters, 2);
    }

    #[test]
    fn test_leave_room_only_valid_in_room() {
        let (transport, wire) = FakeTransport::new();
        let mut connection = established_connection(transport, &wire, "p1");
        let mut handshake = RoomHandshake::new(1);

        handshake.leave_room(&mut connection);
        assert!(!sent_events(&wire)
            .iter()
            .any(|e| matches!(e, ClientEvent::RoomLeave)));

        handshake.enter_room(&mut connection, false);
        handshake
            .handle_event(&mut connection, &ServerEvent::RoomChangeState(room_info(1)))
            .unwrap();
        handshake.leave_room(&mut connection);
        assert_eq!(handshake.phase(), HandshakePhase::Idle);
        assert!(sent_events(&wire)
            .iter()
            .any(|e| matches!(e, ClientEvent::RoomLeave)));
    }
}
