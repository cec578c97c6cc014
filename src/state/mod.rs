//! Client state for a codecrack match.
//!
//! - `protocol` - Wire packets, colours and board rows
//! - `connection` - Socket ownership, send/receive, transports
//! - `websocket` - WebSocket transport
//! - `timer` - Per-round countdown
//! - `combination` - The five slots being built
//! - `history` - Own board and opponent feedback
//! - `session` - State machine tying it all together
//! - `config` - Session tunables
//! - `profile` - Display-name storage
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                          Session                           │
//! │                                                            │
//! │  ┌──────────────┐  ┌─────────────────┐  ┌───────────────┐  │
//! │  │  Connection  │  │   Combination   │  │ BoardHistory  │  │
//! │  │              │  │     Builder     │  │               │  │
//! │  │  Transport ◀─┼──┼── Submit        │  │ own rows      │  │
//! │  │     │        │  └─────────────────┘  │  (replaced)   │  │
//! │  │     ▼        │                       │ opponent pegs │  │
//! │  │ InboundPacket├────────┐              │  (appended)   │  │
//! │  └──────────────┘        ▼              └───────────────┘  │
//! │                    SessionState ◀──── RoundTimer expiry    │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod combination;
pub mod config;
pub mod connection;
pub mod history;
pub mod profile;
pub mod protocol;
pub mod session;
pub mod timer;
pub mod websocket;

// Re-export commonly used types
pub use combination::{CombinationBuilder, SubmitError};
pub use config::{SessionConfig, DEFAULT_SERVER_URL};
pub use connection::{Connection, ConnectionStatus, MemoryTransport, Transport, TransportError};
pub use history::BoardHistory;
pub use profile::{JsonFileNameStore, MemoryNameStore, NameStore, NameStoreError, NAME_KEY};
pub use protocol::{
    BoardRow, Colour, Combination, InOpcode, InboundPacket, OutOpcode, OutboundPacket, Packet,
    ProtocolError, COMBINATION_LEN, EMPTY_COMBINATION,
};
pub use session::{
    GameResult, InvalidTransition, Session, SessionError, SessionEvent, SessionState,
};
pub use timer::{RoundTimer, TimerEvent, DEFAULT_ROUND_SECONDS};
pub use websocket::{WebSocketTransport, DEFAULT_HANDSHAKE_TIMEOUT};
