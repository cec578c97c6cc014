//! Wire protocol shared with the game server.
//!
//! Every message in either direction is a single JSON text frame shaped as
//! `{ "op": <opcode>, "d": <payload> }`. Opcodes are small integers and the
//! inbound and outbound sets overlap numerically, so the direction of a frame
//! decides which table its `op` is read from.
//!
//! Inbound frames decode into [`InboundPacket`], one variant per opcode with
//! its own typed payload. Frames with an opcode this client does not know
//! decode to `Ok(None)` so newer servers can add opcodes without breaking
//! older clients.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of pegs in a combination.
pub const COMBINATION_LEN: usize = 5;

/// Number of selectable colours (ids 1..=8).
pub const COLOUR_COUNT: u8 = 8;

/// Peg colour.
///
/// `None` doubles as "empty slot" in a combination and "no peg" in feedback.
/// Feedback pegs reuse the palette: `Black` marks an exact match and `White`
/// a right colour in the wrong position, so sorting feedback descending by
/// id always puts black pegs first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Colour {
    #[default]
    None = 0,
    White = 1,
    Black = 2,
    Red = 3,
    Green = 4,
    Blue = 5,
    Yellow = 6,
    Orange = 7,
    Brown = 8,
}

impl Colour {
    /// All colours a player can place, in id order.
    pub const SELECTABLE: [Colour; COLOUR_COUNT as usize] = [
        Colour::White,
        Colour::Black,
        Colour::Red,
        Colour::Green,
        Colour::Blue,
        Colour::Yellow,
        Colour::Orange,
        Colour::Brown,
    ];

    /// Look up a colour by its wire id.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::None),
            1..=COLOUR_COUNT => Some(Self::SELECTABLE[usize::from(id) - 1]),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// True for every colour except the `None` sentinel.
    pub fn is_set(self) -> bool {
        self != Self::None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::White => "white",
            Self::Black => "black",
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::Brown => "brown",
        }
    }
}

impl From<Colour> for u8 {
    fn from(colour: Colour) -> Self {
        colour.id()
    }
}

impl TryFrom<u8> for Colour {
    type Error = InvalidColour;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or(InvalidColour(id))
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A colour id outside `0..=8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("colour id {0} is out of range")]
pub struct InvalidColour(pub u8);

/// Five ordered pegs.
pub type Combination = [Colour; COMBINATION_LEN];

/// An all-`None` combination.
pub const EMPTY_COMBINATION: Combination = [Colour::None; COMBINATION_LEN];

/// True iff no slot holds `Colour::None`.
pub fn is_complete(combi: &Combination) -> bool {
    combi.iter().all(|c| c.is_set())
}

/// One row of a player's own board, echoed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRow {
    /// The guess submitted that round
    pub pieces: Combination,
    /// Feedback pegs, unordered, zero entries meaning "no peg"
    pub check: Vec<Colour>,
}

impl BoardRow {
    /// Feedback pegs with empties removed, black before white.
    pub fn sorted_feedback(&self) -> Vec<Colour> {
        sorted_feedback(&self.check)
    }
}

/// Drop `None` pegs and sort the rest descending by id.
pub fn sorted_feedback(pegs: &[Colour]) -> Vec<Colour> {
    let mut pegs: Vec<Colour> = pegs.iter().copied().filter(|c| c.is_set()).collect();
    pegs.sort_unstable_by(|a, b| b.cmp(a));
    pegs
}

/// Generic wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet<T> {
    pub op: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<T>,
}

// ============================================================================
// Opcodes
// ============================================================================

/// Server-to-client opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InOpcode {
    Ping = 0,
    Matchmaking = 1,
    GameStart = 2,
    GameEnd = 3,
    RoundStart = 4,
    RoundEnd = 5,
    BoardUpdate = 6,
    OpponentStatus = 7,
    ForceSubmit = 8,
}

impl InOpcode {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::Ping,
            1 => Self::Matchmaking,
            2 => Self::GameStart,
            3 => Self::GameEnd,
            4 => Self::RoundStart,
            5 => Self::RoundEnd,
            6 => Self::BoardUpdate,
            7 => Self::OpponentStatus,
            8 => Self::ForceSubmit,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Client-to-server opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OutOpcode {
    Pong = 0,
    FindGame = 1,
    Submit = 2,
}

impl OutOpcode {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::Pong,
            1 => Self::FindGame,
            2 => Self::Submit,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStartParams {
    pub opponent: String,
}

/// Final result. `win` is `None` for a draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEndParams {
    #[serde(default)]
    pub win: Option<bool>,
    /// Set by the server when the match was torn down abnormally
    #[serde(default)]
    pub error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStartParams {
    #[serde(rename = "roundNum")]
    pub round_num: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentStatusParams {
    pub status: Vec<Colour>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindGameParams {
    pub username: String,
    pub combi: Combination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitParams {
    pub combi: Combination,
}

// ============================================================================
// Typed packets
// ============================================================================

/// A decoded server-to-client packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPacket {
    Ping,
    Matchmaking,
    GameStart(GameStartParams),
    GameEnd(GameEndParams),
    RoundStart(RoundStartParams),
    RoundEnd,
    /// Full self board, oldest round first
    BoardUpdate(Vec<BoardRow>),
    OpponentStatus(OpponentStatusParams),
    ForceSubmit,
}

impl InboundPacket {
    pub fn opcode(&self) -> InOpcode {
        match self {
            Self::Ping => InOpcode::Ping,
            Self::Matchmaking => InOpcode::Matchmaking,
            Self::GameStart(_) => InOpcode::GameStart,
            Self::GameEnd(_) => InOpcode::GameEnd,
            Self::RoundStart(_) => InOpcode::RoundStart,
            Self::RoundEnd => InOpcode::RoundEnd,
            Self::BoardUpdate(_) => InOpcode::BoardUpdate,
            Self::OpponentStatus(_) => InOpcode::OpponentStatus,
            Self::ForceSubmit => InOpcode::ForceSubmit,
        }
    }

    /// Decode one text frame.
    ///
    /// Returns `Ok(None)` for an opcode outside the inbound table.
    pub fn decode(frame: &str) -> Result<Option<Self>, ProtocolError> {
        let raw: RawPacket = serde_json::from_str(frame).map_err(ProtocolError::Envelope)?;
        let Some(op) = InOpcode::from_code(raw.op) else {
            return Ok(None);
        };

        let packet = match op {
            InOpcode::Ping => Self::Ping,
            InOpcode::Matchmaking => Self::Matchmaking,
            InOpcode::GameStart => Self::GameStart(payload(op, raw.d)?),
            InOpcode::GameEnd => Self::GameEnd(payload(op, raw.d)?),
            InOpcode::RoundStart => Self::RoundStart(payload(op, raw.d)?),
            InOpcode::RoundEnd => Self::RoundEnd,
            InOpcode::BoardUpdate => Self::BoardUpdate(payload(op, raw.d)?),
            InOpcode::OpponentStatus => Self::OpponentStatus(payload(op, raw.d)?),
            InOpcode::ForceSubmit => Self::ForceSubmit,
        };
        Ok(Some(packet))
    }
}

/// A client-to-server packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPacket {
    Pong,
    FindGame(FindGameParams),
    Submit(SubmitParams),
}

impl OutboundPacket {
    pub fn opcode(&self) -> OutOpcode {
        match self {
            Self::Pong => OutOpcode::Pong,
            Self::FindGame(_) => OutOpcode::FindGame,
            Self::Submit(_) => OutOpcode::Submit,
        }
    }

    /// Serialize to a text frame. Payload-less packets omit `d`.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let op = self.opcode().code();
        let encoded = match self {
            Self::Pong => serde_json::to_string(&Packet::<()> { op, d: None }),
            Self::FindGame(params) => serde_json::to_string(&Packet {
                op,
                d: Some(params),
            }),
            Self::Submit(params) => serde_json::to_string(&Packet {
                op,
                d: Some(params),
            }),
        };
        encoded.map_err(|source| ProtocolError::Encode {
            op: self.opcode(),
            source,
        })
    }

    /// Decode a frame this client would have sent. Used by test transports
    /// and tooling that inspect outbound traffic.
    pub fn decode(frame: &str) -> Result<Option<Self>, ProtocolError> {
        let raw: RawPacket = serde_json::from_str(frame).map_err(ProtocolError::Envelope)?;
        let Some(op) = OutOpcode::from_code(raw.op) else {
            return Ok(None);
        };

        let packet = match op {
            OutOpcode::Pong => Self::Pong,
            OutOpcode::FindGame => Self::FindGame(outbound_payload(op, raw.d)?),
            OutOpcode::Submit => Self::Submit(outbound_payload(op, raw.d)?),
        };
        Ok(Some(packet))
    }
}

/// Envelope with the payload left undecoded until the opcode is known.
#[derive(Deserialize)]
struct RawPacket {
    op: i64,
    #[serde(default)]
    d: Value,
}

fn payload<T: DeserializeOwned>(op: InOpcode, d: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(d).map_err(|source| ProtocolError::Payload { op, source })
}

fn outbound_payload<T: DeserializeOwned>(op: OutOpcode, d: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(d).map_err(|source| ProtocolError::OutboundPayload { op, source })
}

/// Protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed packet envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("malformed {op:?} payload: {source}")]
    Payload {
        op: InOpcode,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed outbound {op:?} payload: {source}")]
    OutboundPayload {
        op: OutOpcode,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {op:?}: {source}")]
    Encode {
        op: OutOpcode,
        #[source]
        source: serde_json::Error,
    },
}
