//! # Gift Rush Sync Client
//!
//! Client-side half of the game-state synchronization protocol for the
//! gift-stealing party game: the socket session lifecycle, the
//! room/launch/confirm handshake, and the movement reconciliation loop
//! that keeps outbound traffic small without dropping discrete actions.
//!
//! ## Architecture Overview
//!
//! One logical connection per process carries the whole session. The
//! server is authoritative: it broadcasts full-replace world snapshots
//! at its own tick rate, and the client merges nothing — every
//! `game.state` arrival wholesale replaces the previous one in the
//! world store that rendering reads.
//!
//! ### Session setup
//! A UI action drives the handshake machine, which emits room actions
//! through the connection; server events flow back through the same
//! connection and advance the machine. The launch/confirm round-trip
//! is how a provisional local identity becomes the server-assigned
//! canonical one.
//!
//! ### Send-rate reduction
//! Movement is sampled once per render tick. A sliding dead-zone
//! baseline suppresses near-zero deltas; special actions always
//! transmit but their flag is cooldown-gated so a held key fires
//! exactly once per window.
//!
//! ## Module Organization
//!
//! - [`transport`] — the single-channel byte transport seam (UDP in
//!   production, scripted in tests).
//! - [`connection`] — connection manager: lifecycle, typed event
//!   subscriptions, fire-and-forget emission, bounded reconnection.
//! - [`handshake`] — room entry / launch / confirm state machine,
//!   including the tournament branch.
//! - [`movement`] — dead-zone plus cooldown movement reconciliation.
//! - [`world`] — the single-writer, shared-reader world state store.
//! - [`session`] — registration and tournament OAuth (PKCE) helpers
//!   around external HTTP/storage collaborators.
//! - [`game`] — composition root tying the pieces to one cooperative
//!   tick loop.
//!
//! ## Design Notes
//!
//! Network faults never surface as errors into callers: outbound
//! actions while disconnected are dropped, reconnection is bounded and
//! silent, and exhaustion is visible only as a disconnected state.
//! Rendering, input devices, audio, and the HTTP stack are external
//! collaborators consumed through traits.

pub mod connection;
pub mod game;
pub mod handshake;
pub mod movement;
pub mod session;
pub mod transport;
pub mod world;

#[cfg(test)]
pub(crate) mod testutil;
