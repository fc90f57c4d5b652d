//! Connection manager: one logical session over one transport channel.
//!
//! The connection is constructed explicitly and passed by handle to
//! every consumer; lifecycle belongs to the composition root, not a
//! hidden static accessor. Only one logical session should exist per
//! process — opening a second concurrent connection under a different
//! identity is unsupported.
//!
//! Outbound actions are fire-and-forget: anything emitted while the
//! session is not live is silently dropped so transient disconnects
//! never crash input handling.

use crate::transport::Transport;
use bincode::{deserialize, serialize};
use log::{debug, info, warn};
use shared::{
    ClientEvent, EventKind, MovementSample, ServerEvent, RECONNECT_ATTEMPTS, RECONNECT_DELAY_MS,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Callback invoked for each inbound event of a subscribed kind.
pub type EventHandler = Box<dyn FnMut(&ServerEvent)>;

/// Capability returned by [`Connection::subscribe`]; removes exactly
/// that registration when passed to [`Connection::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

pub struct Connection {
    transport: Box<dyn Transport>,
    identity: String,
    connected: bool,
    entered_room: bool,
    handlers: HashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>,
    next_subscription: u64,
    retries_left: u8,
    next_retry_at: Option<Instant>,
}

impl Connection {
    /// Opens a session, attaching `identity` as the connection-time
    /// credential. The `Connect` frame goes out immediately; liveness
    /// flips once the server acknowledges with `Connected`. Connect
    /// failures inside the bounded retry window (3 attempts, 1 s apart)
    /// are invisible to callers — exhaustion is observable only through
    /// [`Connection::is_connected`] or a `Disconnected` event.
    pub fn open(transport: Box<dyn Transport>, identity: impl Into<String>) -> Self {
        let mut connection = Self {
            transport,
            identity: identity.into(),
            connected: false,
            entered_room: false,
            handlers: HashMap::new(),
            next_subscription: 0,
            retries_left: RECONNECT_ATTEMPTS,
            next_retry_at: None,
        };

        connection.send_frame(&ClientEvent::Connect {
            client_id: connection.identity.clone(),
        });
        connection
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn has_entered_room(&self) -> bool {
        self.entered_room
    }

    /// Registers `handler` for a named server-pushed event kind.
    /// Handlers for the same kind are independent and run in
    /// registration order.
    pub fn subscribe(&mut self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        for list in self.handlers.values_mut() {
            list.retain(|(registered, _)| *registered != id);
        }
    }

    /// Fire-and-forget emission; dropped without error when not live.
    pub fn emit(&mut self, event: &ClientEvent) {
        if !self.connected {
            debug!("dropping '{}' while disconnected", event.name());
            return;
        }
        self.send_frame(event);
    }

    /// Requests room entry. Suppressed when not live or already in a
    /// room; returns whether a frame actually went out.
    pub fn enter_room(&mut self, char_type: u8, is_kem: bool) -> bool {
        if !self.connected {
            debug!("room.enter suppressed: not connected");
            return false;
        }
        if self.entered_room {
            debug!("room.enter suppressed: already in room");
            return false;
        }

        self.send_frame(&ClientEvent::RoomEnter { char_type, is_kem });
        self.entered_room = true;
        true
    }

    pub fn launch_game(&mut self, char_type: u8, game_session_id: &str, account_id: Option<&str>) {
        self.emit(&ClientEvent::RoomLaunchGame {
            char_type,
            game_session_id: game_session_id.to_string(),
            account_id: account_id.map(str::to_string),
        });
    }

    pub fn confirm_room(&mut self, user_id: &str, char_type: u8, game_session_id: &str) {
        self.emit(&ClientEvent::RoomConfirm {
            user_id: user_id.to_string(),
            char_type,
            game_session_id: game_session_id.to_string(),
        });
    }

    pub fn join_game(&mut self, user_id: &str) {
        self.emit(&ClientEvent::GameJoin {
            user_id: user_id.to_string(),
        });
    }

    pub fn leave_room(&mut self) {
        self.emit(&ClientEvent::RoomLeave);
        self.entered_room = false;
    }

    pub fn update_movement(&mut self, sample: &MovementSample) {
        self.emit(&ClientEvent::Move(sample.clone()));
    }

    /// Removes all subscriptions, then terminates the transport. Safe
    /// to call when already disconnected. The connection is never
    /// recreated automatically afterwards.
    pub fn disconnect(&mut self) {
        self.handlers.clear();
        if self.transport.is_open() {
            if self.connected {
                self.send_frame(&ClientEvent::Disconnect);
            }
            self.transport.close();
        }
        self.connected = false;
        self.entered_room = false;
        self.next_retry_at = None;
    }

    /// Drains the transport: decodes pending frames, applies lifecycle
    /// effects, dispatches to subscribers, and returns the events in
    /// arrival order for the caller's own routing. Also drives the
    /// bounded reconnection window while the session is down.
    pub fn poll(&mut self, now: Instant) -> Vec<ServerEvent> {
        self.drive_reconnect(now);

        let mut events = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            match self.transport.try_recv(&mut buf) {
                Ok(Some(len)) => match deserialize::<ServerEvent>(&buf[0..len]) {
                    Ok(event) => events.push(event),
                    Err(e) => warn!("discarding malformed frame: {}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("transport receive error: {}", e);
                    break;
                }
            }
        }

        for event in &events {
            self.apply_lifecycle(event, now);
            if let Some(list) = self.handlers.get_mut(&event.kind()) {
                for (_, handler) in list.iter_mut() {
                    handler(event);
                }
            }
        }

        events
    }

    fn apply_lifecycle(&mut self, event: &ServerEvent, now: Instant) {
        match event {
            ServerEvent::Connected => {
                info!("session live as '{}'", self.identity);
                self.connected = true;
                self.retries_left = RECONNECT_ATTEMPTS;
                self.next_retry_at = None;
            }
            ServerEvent::Disconnected { reason } => {
                warn!("disconnected: {}", reason);
                self.connected = false;
                self.retries_left = RECONNECT_ATTEMPTS;
                self.next_retry_at = Some(now + Duration::from_millis(RECONNECT_DELAY_MS));
            }
            ServerEvent::GameOver { .. } => {
                // A fresh room entry must be accepted after the round ends.
                self.entered_room = false;
            }
            _ => {}
        }
    }

    fn drive_reconnect(&mut self, now: Instant) {
        if self.connected || !self.transport.is_open() {
            return;
        }

        match self.next_retry_at {
            None => {
                self.next_retry_at = Some(now + Duration::from_millis(RECONNECT_DELAY_MS));
            }
            Some(at) if now >= at => {
                if self.retries_left > 0 {
                    self.retries_left -= 1;
                    debug!(
                        "reconnect attempt ({} left) as '{}'",
                        self.retries_left, self.identity
                    );
                    self.send_frame(&ClientEvent::Connect {
                        client_id: self.identity.clone(),
                    });
                    self.next_retry_at = Some(now + Duration::from_millis(RECONNECT_DELAY_MS));
                } else {
                    info!("reconnect attempts exhausted");
                    self.next_retry_at = None;
                }
            }
            Some(_) => {}
        }
    }

    fn send_frame(&mut self, event: &ClientEvent) {
        let data = match serialize(event) {
            Ok(data) => data,
            Err(e) => {
                warn!("failed to encode '{}': {}", event.name(), e);
                return;
            }
        };
        if let Err(e) = self.transport.send(&data) {
            debug!("dropping '{}': {}", event.name(), e);
        }
    }
}
