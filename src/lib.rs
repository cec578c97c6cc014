//! Codecrack Client Library
//!
//! This crate provides the client-side session runtime for codecrack, a
//! two-player real-time code-breaking game.
//!
//! # Overview
//!
//! Each player picks a secret five-peg combination, then every round both
//! players guess the other's secret and the server answers with feedback
//! pegs. The state module provides:
//!
//! - **Session State Machine** - Matchmaking handshake, rounds, forced
//!   submission and the final result, with validated transitions.
//!
//! - **Connection Management** - Owns the socket; the only component that
//!   sends packets. No reconnection.
//!
//! - **Round Timer** - Advisory countdown that forces a submission on expiry.
//!
//! - **Board Histories** - The player's own rows and the opponent's feedback.
//!
//! # Design Principles
//!
//! 1. **The server is authoritative** - Scoring, pairing and round resolution
//!    all happen server-side; the client applies what it is told.
//!
//! 2. **No rendering** - `Session::to_json_at` hands a view model to whatever
//!    draws the board.
//!
//! 3. **Cooperative, single-threaded** - The owner calls `Session::poll`
//!    from its loop. Only the socket handshake waits, and it is bounded by a
//!    timeout; nothing spawns threads.
//!
//! # Example
//!
//! ```rust
//! use codecrack_client::{MemoryTransport, Session, SessionConfig, SessionState};
//!
//! let mut session = Session::new(SessionConfig::default(), MemoryTransport::new());
//!
//! // Pick a secret, then look for a game
//! for slot in 0..5 {
//!     session.place(slot, 3);
//! }
//! session.find_game("alice").unwrap();
//! assert_eq!(session.state(), SessionState::AwaitingMatch);
//!
//! // Server pairs us
//! session
//!     .connection_mut()
//!     .transport_mut()
//!     .push_inbound(r#"{"op":2,"d":{"opponent":"bob"}}"#);
//! session.poll();
//! assert_eq!(session.state(), SessionState::RoundActive);
//! assert_eq!(session.round(), Some(1));
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
