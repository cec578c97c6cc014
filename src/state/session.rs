//! Session state machine.
//!
//! Owns everything one client needs for one match: the connection, the
//! combination builder, both board histories and the round timer. Inbound
//! packets are applied strictly in delivery order.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────┐ find_game ┌───────────────┐ GameStart ┌─────────┐
//! │ Idle │──────────▶│ AwaitingMatch │──────────▶│ Matched │
//! └──────┘           └───────┬───────┘           └────┬────┘
//!                      ▲     │ Matchmaking            │ round 1
//!                      └─────┘                        ▼
//!                                  RoundStart  ┌─────────────┐
//!                              ┌──────────────▶│ RoundActive │
//!                              │               └──────┬──────┘
//!                              │                      │ submit / timeout / ForceSubmit
//!                              │               ┌──────▼─────────┐
//!                              └───────────────│ RoundSubmitted │
//!                                              └────────────────┘
//!
//!   GameEnd from any state but Idle ──▶ GameOver (terminal)
//! ```
//!
//! `BoardUpdate` and `OpponentStatus` only touch the histories and never
//! change state.

use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::state::combination::{CombinationBuilder, SubmitError};
use crate::state::config::SessionConfig;
use crate::state::connection::{Connection, Transport, TransportError};
use crate::state::history::BoardHistory;
use crate::state::protocol::{
    Combination, FindGameParams, GameEndParams, InboundPacket, OutboundPacket, SubmitParams,
};
use crate::state::timer::{RoundTimer, TimerEvent};

/// Where the session is in the match lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Not connected; the builder holds the player's secret
    #[default]
    Idle,
    /// Connected, waiting for the server to pair us
    AwaitingMatch,
    /// Paired; passes straight into round 1
    Matched,
    /// Builder open for this round's guess
    RoundActive,
    /// Guess sent, waiting for the next round
    RoundSubmitted,
    /// Final result received
    GameOver,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingMatch => "awaiting_match",
            Self::Matched => "matched",
            Self::RoundActive => "round_active",
            Self::RoundSubmitted => "round_submitted",
            Self::GameOver => "game_over",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GameOver)
    }

    /// A match has been paired and is not over.
    pub fn is_in_match(&self) -> bool {
        matches!(self, Self::Matched | Self::RoundActive | Self::RoundSubmitted)
    }

    /// Apply an event, returning the new state or an error.
    pub fn apply(&self, event: &SessionEvent) -> Result<Self, InvalidTransition> {
        use SessionEvent::*;
        use SessionState::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: *self,
            event: event.clone(),
            reason,
        };

        match (self, event) {
            // FindGame: Idle -> AwaitingMatch
            (Idle, FindGame) => Ok(AwaitingMatch),
            (_, FindGame) => Err(invalid("Already connected")),

            // Matchmaking: keep-alive while searching
            (AwaitingMatch, Matchmaking) => Ok(AwaitingMatch),
            (_, Matchmaking) => Err(invalid("Not searching for a match")),

            // GameStart: AwaitingMatch -> Matched
            (AwaitingMatch, GameStart { .. }) => Ok(Matched),
            (Idle, GameStart { .. }) => Err(invalid("Not connected")),
            (_, GameStart { .. }) => Err(invalid("Match already started")),

            // RoundStart: Matched/RoundActive/RoundSubmitted -> RoundActive
            (Matched | RoundActive | RoundSubmitted, RoundStart { .. }) => Ok(RoundActive),
            (_, RoundStart { .. }) => Err(invalid("No match in progress")),

            // Submit: RoundActive -> RoundSubmitted
            (RoundActive, Submit) => Ok(RoundSubmitted),
            (RoundSubmitted, Submit) => Err(invalid("Already submitted this round")),
            (_, Submit) => Err(invalid("No round active")),

            // GameEnd: any connected state -> GameOver
            (Idle, GameEnd { .. }) => Err(invalid("Not connected")),
            (GameOver, GameEnd { .. }) => Err(invalid("Game already over")),
            (_, GameEnd { .. }) => Ok(GameOver),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State transition events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    FindGame,
    Matchmaking,
    GameStart { opponent: String },
    RoundStart { round: u32 },
    Submit,
    GameEnd { result: GameResult },
}

/// Error when a state transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid transition from {from} via {event:?}: {reason}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub event: SessionEvent,
    pub reason: &'static str,
}

/// Final outcome from this player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

impl GameResult {
    /// `win` is tri-state on the wire: true, false, or absent for a draw.
    pub fn from_win(win: Option<bool>) -> Self {
        match win {
            Some(true) => Self::Win,
            Some(false) => Self::Loss,
            None => Self::Draw,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Loss => "loss",
            Self::Draw => "draw",
        }
    }

    /// Banner text for the end screen.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Win => "won!",
            Self::Loss => "lost.",
            Self::Draw => "drew.",
        }
    }
}

/// Why matchmaking could not start.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a display name is required")]
    EmptyUsername,

    #[error("the secret combination has empty slots")]
    IncompleteSecret,

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// One client's view of one match.
#[derive(Debug)]
pub struct Session<T: Transport> {
    config: SessionConfig,
    connection: Connection<T>,
    state: SessionState,
    builder: CombinationBuilder,
    history: BoardHistory,
    timer: RoundTimer,
    username: String,
    /// Own secret, fixed at `find_game`
    secret: Option<Combination>,
    /// Set once at GameStart
    opponent: Option<String>,
    /// Current round; `None` until the match starts at round 1
    round: Option<u32>,
    result: Option<GameResult>,
}

impl<T: Transport> Session<T> {
    pub fn new(config: SessionConfig, transport: T) -> Self {
        let timer = RoundTimer::with_tick_interval(config.tick_seconds);
        Self {
            config,
            connection: Connection::new(transport),
            state: SessionState::Idle,
            builder: CombinationBuilder::new(),
            history: BoardHistory::new(),
            timer,
            username: String::new(),
            secret: None,
            opponent: None,
            round: None,
            result: None,
        }
    }

    // Accessors

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn round(&self) -> Option<u32> {
        self.round
    }

    pub fn opponent(&self) -> Option<&str> {
        self.opponent.as_deref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> Option<&Combination> {
        self.secret.as_ref()
    }

    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn builder(&self) -> &CombinationBuilder {
        &self.builder
    }

    pub fn history(&self) -> &BoardHistory {
        &self.history
    }

    pub fn timer(&self) -> &RoundTimer {
        &self.timer
    }

    pub fn connection(&self) -> &Connection<T> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection<T> {
        &mut self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    pub fn seconds_remaining_at(&self, now: DateTime<Utc>) -> u32 {
        self.timer.remaining_at(now)
    }

    /// Whether the player may submit right now.
    pub fn can_submit(&self) -> bool {
        self.state == SessionState::RoundActive
            && !self.builder.is_submitted()
            && self.builder.is_complete()
    }

    // Player actions

    /// Place a colour from the input surface.
    ///
    /// Accepted while picking the secret and during an open round; ignored
    /// otherwise, as are out-of-range slots and colours.
    pub fn place(&mut self, slot: usize, colour_id: u8) -> bool {
        let open = match self.state {
            SessionState::Idle => true,
            SessionState::RoundActive => !self.builder.is_submitted(),
            _ => false,
        };
        open && self.builder.place(slot, colour_id)
    }

    /// Connect to the configured server and ask for a game with the secret
    /// currently in the builder.
    pub fn find_game(&mut self, username: &str) -> Result<(), SessionError> {
        let next = self.state.apply(&SessionEvent::FindGame)?;
        if username.is_empty() {
            return Err(SessionError::EmptyUsername);
        }
        if !self.builder.is_complete() {
            return Err(SessionError::IncompleteSecret);
        }

        let secret = self.builder.snapshot();
        let url = self.config.url.clone();
        self.connection.connect(
            &url,
            FindGameParams {
                username: username.to_string(),
                combi: secret,
            },
        )?;

        info!("Searching for a game as {}", username);
        self.username = username.to_string();
        self.secret = Some(secret);
        self.state = next;
        Ok(())
    }

    /// Player-initiated submission. Incomplete combinations are refused.
    pub fn submit(&mut self) -> Result<Combination, SubmitError> {
        if self.state != SessionState::RoundActive {
            return Err(if self.state == SessionState::RoundSubmitted {
                SubmitError::AlreadySubmitted
            } else {
                SubmitError::NotInRound
            });
        }

        let combi = self.builder.submit()?;
        self.dispatch_submit(combi);
        Ok(combi)
    }

    /// Submission without player action.
    ///
    /// Reads the builder snapshot as-is, empty slots included, then sends it.
    /// Does nothing outside an unsubmitted round.
    pub fn force_submit(&mut self) -> Option<Combination> {
        if self.state != SessionState::RoundActive {
            return None;
        }
        let combi = self.builder.force_submit()?;
        if combi.iter().any(|c| !c.is_set()) {
            warn!(
                "Forced submission of incomplete combination in round {}",
                self.round.unwrap_or_default()
            );
        }
        self.dispatch_submit(combi);
        Some(combi)
    }

    fn dispatch_submit(&mut self, combi: Combination) {
        self.connection
            .send(&OutboundPacket::Submit(SubmitParams { combi }));
        self.transition(SessionEvent::Submit);
    }

    // Event loop

    /// One step of the event loop using the wall clock.
    pub fn poll(&mut self) {
        self.poll_at(Utc::now());
    }

    /// Drain pending packets in delivery order, then tick the round timer.
    pub fn poll_at(&mut self, now: DateTime<Utc>) {
        for packet in self.connection.poll() {
            self.handle_packet_at(packet, now);
        }
        self.tick_at(now);
    }

    /// Feed one raw text frame, for transports that push instead of poll.
    pub fn handle_frame_at(&mut self, frame: &str, now: DateTime<Utc>) {
        if let Some(packet) = self.connection.receive(frame) {
            self.handle_packet_at(packet, now);
        }
    }

    /// Advance the round timer; expiry during an open round forces a submit.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> Option<TimerEvent> {
        let event = self.timer.tick_at(now)?;
        if event == TimerEvent::Expired {
            debug!("Round {:?} timer expired", self.round);
            self.force_submit();
        }
        Some(event)
    }

    /// Apply one inbound packet.
    pub fn handle_packet_at(&mut self, packet: InboundPacket, now: DateTime<Utc>) {
        if self.state.is_terminal() {
            debug!("Game over, ignoring {:?}", packet.opcode());
            return;
        }

        match packet {
            InboundPacket::Ping | InboundPacket::RoundEnd => {
                debug!("Received {:?}", packet.opcode());
            }
            InboundPacket::Matchmaking => {
                self.transition(SessionEvent::Matchmaking);
            }
            InboundPacket::GameStart(params) => self.on_game_start(params.opponent, now),
            InboundPacket::RoundStart(params) => self.on_round_start(params.round_num, now),
            InboundPacket::ForceSubmit => {
                if self.force_submit().is_none() {
                    debug!("ForceSubmit ignored in {}", self.state);
                }
            }
            InboundPacket::BoardUpdate(rows) => {
                if self.state == SessionState::Idle {
                    return;
                }
                debug!("Board now has {} rows", rows.len());
                self.history.replace_rows(rows);
            }
            InboundPacket::OpponentStatus(params) => {
                if self.state == SessionState::Idle {
                    return;
                }
                self.history.push_opponent(params.status);
            }
            InboundPacket::GameEnd(params) => self.on_game_end(params),
        }
    }

    fn on_game_start(&mut self, opponent: String, now: DateTime<Utc>) {
        let event = SessionEvent::GameStart {
            opponent: opponent.clone(),
        };
        if !self.transition(event) {
            return;
        }

        info!("Matched against {}", opponent);
        self.opponent = Some(opponent);
        self.builder.clear();
        self.on_round_start(1, now);
        self.connection.send(&OutboundPacket::Pong);
    }

    fn on_round_start(&mut self, round: u32, now: DateTime<Utc>) {
        if !self.transition(SessionEvent::RoundStart { round }) {
            return;
        }

        let current = self.round.unwrap_or(round);
        if round < current {
            warn!("Server announced round {} after round {}", round, current);
        }
        self.round = Some(current.max(round));
        self.builder.reset_round();
        self.timer.start_at(now, self.config.round_seconds);
    }

    fn on_game_end(&mut self, params: GameEndParams) {
        let result = GameResult::from_win(params.win);
        if !self.transition(SessionEvent::GameEnd { result }) {
            return;
        }

        if params.error {
            warn!("Server reported an error ending the game");
        }
        info!("Game over after round {:?}: {}", self.round, result.as_str());
        self.result = Some(result);
        self.timer.stop();
    }

    /// Apply an event to the state. Invalid transitions are logged and
    /// leave the state unchanged.
    fn transition(&mut self, event: SessionEvent) -> bool {
        match self.state.apply(&event) {
            Ok(next) => {
                if next != self.state {
                    debug!("Session {} -> {}", self.state, next);
                }
                self.state = next;
                true
            }
            Err(e) => {
                debug!("{}", e);
                false
            }
        }
    }

    /// Render-ready snapshot of the session.
    pub fn to_json_at(&self, now: DateTime<Utc>) -> serde_json::Value {
        let history = self.history.to_json();
        serde_json::json!({
            "state": self.state.as_str(),
            "connection": self.connection.status.as_str(),
            "username": self.username,
            "opponent": self.opponent,
            "round": self.round,
            "seconds_remaining": self.seconds_remaining_at(now),
            "secret": self.secret,
            "combination": self.builder.slots(),
            "submitted": self.builder.is_submitted(),
            "can_submit": self.can_submit(),
            "result": self.result.map(|r| r.as_str()),
            "result_message": self.result.map(|r| r.message()),
            "board": history["board"],
            "opponent_pegs": history["opponent"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::connection::MemoryTransport;
    use crate::state::protocol::{BoardRow, Colour, COMBINATION_LEN, EMPTY_COMBINATION};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn push(session: &mut Session<MemoryTransport>, frame: &str) {
        session.connection_mut().transport_mut().push_inbound(frame);
    }

    fn sent(session: &Session<MemoryTransport>) -> Vec<OutboundPacket> {
        session.connection().transport().sent_packets()
    }

    fn fill(session: &mut Session<MemoryTransport>, ids: [u8; COMBINATION_LEN]) {
        for (slot, id) in ids.into_iter().enumerate() {
            assert!(session.place(slot, id));
        }
    }

    fn searching() -> Session<MemoryTransport> {
        let mut session = Session::new(SessionConfig::default(), MemoryTransport::new());
        fill(&mut session, [8, 8, 8, 8, 8]);
        session.find_game("alice").unwrap();
        session
    }

    fn in_round() -> Session<MemoryTransport> {
        let mut session = searching();
        push(&mut session, r#"{"op":2,"d":{"opponent":"bob"}}"#);
        session.poll_at(t0());
        session
    }

    fn submit_packet(combi: Combination) -> OutboundPacket {
        OutboundPacket::Submit(SubmitParams { combi })
    }

    const GUESS: Combination = [
        Colour::White,
        Colour::Black,
        Colour::Red,
        Colour::Green,
        Colour::Blue,
    ];

    #[test]
    fn test_find_game_requires_name_and_secret() {
        let mut session = Session::new(SessionConfig::default(), MemoryTransport::new());
        session.place(0, 1);
        assert!(matches!(
            session.find_game("alice"),
            Err(SessionError::IncompleteSecret)
        ));

        fill(&mut session, [1, 2, 3, 4, 5]);
        assert!(matches!(
            session.find_game(""),
            Err(SessionError::EmptyUsername)
        ));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(sent(&session).is_empty());
    }

    #[test]
    fn test_find_game_sends_secret() {
        let session = searching();

        assert_eq!(session.state(), SessionState::AwaitingMatch);
        assert_eq!(session.secret(), Some(&[Colour::Brown; COMBINATION_LEN]));
        assert_eq!(
            sent(&session),
            vec![OutboundPacket::FindGame(FindGameParams {
                username: "alice".to_string(),
                combi: [Colour::Brown; COMBINATION_LEN],
            })]
        );
    }

    #[test]
    fn test_find_game_connect_failure_stays_idle() {
        let mut transport = MemoryTransport::new();
        transport.refuse_open = true;
        let mut session = Session::new(SessionConfig::default(), transport);
        fill(&mut session, [1, 1, 1, 1, 1]);

        assert!(matches!(
            session.find_game("alice"),
            Err(SessionError::Transport(_))
        ));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.secret(), None);
    }

    #[test]
    fn test_find_game_twice_rejected() {
        let mut session = searching();
        assert!(matches!(
            session.find_game("alice"),
            Err(SessionError::InvalidTransition(_))
        ));
        assert_eq!(sent(&session).len(), 1);
    }

    #[test]
    fn test_matchmaking_is_idempotent() {
        let mut session = searching();
        push(&mut session, r#"{"op":1}"#);
        push(&mut session, r#"{"op":1}"#);
        session.poll_at(t0());

        assert_eq!(session.state(), SessionState::AwaitingMatch);
        assert_eq!(session.round(), None);
        assert_eq!(session.opponent(), None);
        assert_eq!(sent(&session).len(), 1);
        assert!(!session.timer().is_running());
    }

    #[test]
    fn test_game_start_opens_round_one() {
        let session = in_round();

        assert_eq!(session.state(), SessionState::RoundActive);
        assert_eq!(session.round(), Some(1));
        assert_eq!(session.opponent(), Some("bob"));
        assert_eq!(session.seconds_remaining_at(t0()), 30);
        assert_eq!(session.builder().snapshot(), EMPTY_COMBINATION);
        assert_eq!(sent(&session).last(), Some(&OutboundPacket::Pong));
    }

    #[test]
    fn test_second_game_start_ignored() {
        let mut session = in_round();
        push(&mut session, r#"{"op":2,"d":{"opponent":"mallory"}}"#);
        session.poll_at(t0());

        assert_eq!(session.opponent(), Some("bob"));
        assert_eq!(sent(&session).len(), 2);
    }

    #[test]
    fn test_submit_complete_combination() {
        let mut session = in_round();
        fill(&mut session, [1, 2, 3, 4, 5]);
        assert!(session.can_submit());

        assert_eq!(session.submit(), Ok(GUESS));
        assert_eq!(sent(&session).last(), Some(&submit_packet(GUESS)));
        assert_eq!(session.builder().snapshot(), EMPTY_COMBINATION);
        assert_eq!(session.state(), SessionState::RoundSubmitted);

        assert_eq!(session.submit(), Err(SubmitError::AlreadySubmitted));
        assert!(!session.place(0, 1));
    }

    #[test]
    fn test_submit_incomplete_rejected() {
        let mut session = in_round();
        session.place(0, 1);
        session.place(1, 2);

        assert_eq!(session.submit(), Err(SubmitError::Incomplete));
        assert_eq!(session.state(), SessionState::RoundActive);
        assert_eq!(sent(&session).len(), 2);
    }

    #[test]
    fn test_submit_outside_round() {
        let mut session = searching();
        assert_eq!(session.submit(), Err(SubmitError::NotInRound));
    }

    #[test]
    fn test_round_start_reopens_builder() {
        let mut session = in_round();
        fill(&mut session, [1, 2, 3, 4, 5]);
        session.submit().unwrap();

        let later = t0() + Duration::seconds(12);
        push(&mut session, r#"{"op":4,"d":{"roundNum":2}}"#);
        session.poll_at(later);

        assert_eq!(session.state(), SessionState::RoundActive);
        assert_eq!(session.round(), Some(2));
        assert_eq!(session.seconds_remaining_at(later), 30);
        assert!(!session.builder().is_submitted());
    }

    #[test]
    fn test_round_one_start_after_game_start_keeps_placements() {
        let mut session = in_round();
        session.place(0, 4);

        push(&mut session, r#"{"op":4,"d":{"roundNum":1}}"#);
        session.poll_at(t0() + Duration::seconds(1));

        assert_eq!(session.round(), Some(1));
        assert_eq!(session.builder().slots()[0], Colour::Green);
    }

    #[test]
    fn test_round_counter_never_decreases() {
        let mut session = in_round();
        push(&mut session, r#"{"op":4,"d":{"roundNum":3}}"#);
        push(&mut session, r#"{"op":4,"d":{"roundNum":2}}"#);
        session.poll_at(t0());
        assert_eq!(session.round(), Some(3));
    }

    #[test]
    fn test_history_updates_keep_state() {
        let mut session = in_round();
        fill(&mut session, [1, 2, 3, 4, 5]);
        session.submit().unwrap();

        push(
            &mut session,
            r#"{"op":6,"d":[{"pieces":[1,1,1,1,1],"check":[0,0,0,0,0]}]}"#,
        );
        push(
            &mut session,
            r#"{"op":6,"d":[{"pieces":[1,1,1,1,1],"check":[0,0,0,0,0]},{"pieces":[1,2,3,4,5],"check":[2,2,1,0,0]}]}"#,
        );
        push(&mut session, r#"{"op":7,"d":{"status":[2,0,0,0,0]}}"#);
        push(&mut session, r#"{"op":7,"d":{"status":[1,1,0,0,0]}}"#);
        session.poll_at(t0());

        assert_eq!(session.state(), SessionState::RoundSubmitted);
        assert_eq!(
            session.history().rows(),
            &[
                BoardRow {
                    pieces: [Colour::White; COMBINATION_LEN],
                    check: vec![Colour::None; COMBINATION_LEN],
                },
                BoardRow {
                    pieces: GUESS,
                    check: vec![
                        Colour::Black,
                        Colour::Black,
                        Colour::White,
                        Colour::None,
                        Colour::None
                    ],
                },
            ][..]
        );
        assert_eq!(session.history().opponent().len(), 2);
        let newest = session.history().opponent_recent_first().next().unwrap();
        assert_eq!(newest, vec![Colour::White, Colour::White]);
    }

    #[test]
    fn test_force_submit_sends_partial_combination() {
        let mut session = in_round();
        session.place(0, 1);

        push(&mut session, r#"{"op":8}"#);
        push(&mut session, r#"{"op":8}"#);
        session.poll_at(t0());

        let partial = [
            Colour::White,
            Colour::None,
            Colour::None,
            Colour::None,
            Colour::None,
        ];
        let submits: Vec<OutboundPacket> = sent(&session)
            .into_iter()
            .filter(|p| matches!(p, OutboundPacket::Submit(_)))
            .collect();
        assert_eq!(submits, vec![submit_packet(partial)]);
        assert_eq!(session.state(), SessionState::RoundSubmitted);
    }

    #[test]
    fn test_timer_expiry_forces_submit() {
        let mut session = in_round();
        fill(&mut session, [3, 3, 3, 3, 3]);

        session.poll_at(t0() + Duration::seconds(10));
        assert_eq!(session.state(), SessionState::RoundActive);

        session.poll_at(t0() + Duration::seconds(31));
        assert_eq!(session.state(), SessionState::RoundSubmitted);
        assert_eq!(
            sent(&session).last(),
            Some(&submit_packet([Colour::Red; COMBINATION_LEN]))
        );
    }

    #[test]
    fn test_timer_expiry_after_submit_sends_nothing() {
        let mut session = in_round();
        fill(&mut session, [1, 2, 3, 4, 5]);
        session.submit().unwrap();
        let count = sent(&session).len();

        session.poll_at(t0() + Duration::seconds(40));
        assert_eq!(sent(&session).len(), count);
        assert_eq!(session.state(), SessionState::RoundSubmitted);
    }

    #[test]
    fn test_game_end_draw_from_any_state() {
        let draw = r#"{"op":3,"d":{"win":null,"error":false}}"#;

        let mut awaiting = searching();
        let mut active = in_round();
        let mut submitted = in_round();
        fill(&mut submitted, [1, 2, 3, 4, 5]);
        submitted.submit().unwrap();

        for session in [&mut awaiting, &mut active, &mut submitted] {
            push(session, draw);
            session.poll_at(t0());
            assert_eq!(session.state(), SessionState::GameOver);
            assert_eq!(session.result(), Some(GameResult::Draw));
            assert!(!session.timer().is_running());
        }
    }

    #[test]
    fn test_game_end_win_and_loss() {
        let mut won = in_round();
        push(&mut won, r#"{"op":3,"d":{"win":true}}"#);
        won.poll_at(t0());
        assert_eq!(won.result(), Some(GameResult::Win));

        let mut lost = in_round();
        push(&mut lost, r#"{"op":3,"d":{"win":false,"error":true}}"#);
        lost.poll_at(t0());
        assert_eq!(lost.result(), Some(GameResult::Loss));
    }

    #[test]
    fn test_game_over_is_terminal() {
        let mut session = in_round();
        push(&mut session, r#"{"op":3,"d":{"win":true}}"#);
        push(&mut session, r#"{"op":4,"d":{"roundNum":2}}"#);
        push(&mut session, r#"{"op":8}"#);
        push(&mut session, r#"{"op":7,"d":{"status":[2,2,2,2,2]}}"#);
        push(&mut session, r#"{"op":3,"d":{"win":false}}"#);
        session.poll_at(t0());

        assert_eq!(session.state(), SessionState::GameOver);
        assert_eq!(session.result(), Some(GameResult::Win));
        assert_eq!(session.round(), Some(1));
        assert!(session.history().opponent().is_empty());
        assert_eq!(sent(&session).len(), 2);
        assert!(!session.place(0, 1));
    }

    #[test]
    fn test_noise_is_ignored() {
        let mut session = in_round();
        push(&mut session, "{");
        push(&mut session, r#"{"op":77,"d":{}}"#);
        push(&mut session, r#"{"op":4,"d":"two"}"#);
        push(&mut session, r#"{"op":0}"#);
        push(&mut session, r#"{"op":5}"#);
        session.poll_at(t0());

        assert_eq!(session.state(), SessionState::RoundActive);
        assert_eq!(session.round(), Some(1));
        assert_eq!(sent(&session).len(), 2);
    }

    #[test]
    fn test_socket_drop_leaves_session_stuck() {
        let mut session = in_round();
        session.connection_mut().transport_mut().drop_when_drained = true;
        session.poll_at(t0());

        assert!(!session.is_connected());
        assert_eq!(session.state(), SessionState::RoundActive);

        fill(&mut session, [1, 2, 3, 4, 5]);
        assert_eq!(session.submit(), Ok(GUESS));
        assert_eq!(sent(&session).len(), 2);
    }

    #[test]
    fn test_handle_frame_directly() {
        let mut session = searching();
        session.handle_frame_at(r#"{"op":2,"d":{"opponent":"carol"}}"#, t0());
        assert_eq!(session.state(), SessionState::RoundActive);
        assert_eq!(session.opponent(), Some("carol"));
    }

    #[test]
    fn test_round_unset_before_match() {
        let mut session = searching();
        assert_eq!(session.round(), None);
        assert_eq!(session.to_json_at(t0())["round"], serde_json::Value::Null);

        push(&mut session, r#"{"op":2,"d":{"opponent":"bob"}}"#);
        session.poll_at(t0());
        assert_eq!(session.round(), Some(1));
        assert_eq!(session.to_json_at(t0())["round"], 1);
    }

    #[test]
    fn test_to_json_view() {
        let mut session = in_round();
        push(
            &mut session,
            r#"{"op":6,"d":[{"pieces":[1,2,3,4,5],"check":[1,0,2,0,0]}]}"#,
        );
        push(&mut session, r#"{"op":7,"d":{"status":[0,1,0,0,0]}}"#);
        session.poll_at(t0() + Duration::seconds(5));
        session.place(2, 6);

        assert_eq!(
            session.to_json_at(t0() + Duration::seconds(5)),
            serde_json::json!({
                "state": "round_active",
                "connection": "open",
                "username": "alice",
                "opponent": "bob",
                "round": 1,
                "seconds_remaining": 25,
                "secret": [8, 8, 8, 8, 8],
                "combination": [0, 0, 6, 0, 0],
                "submitted": false,
                "can_submit": false,
                "result": null,
                "result_message": null,
                "board": [{"round": "01", "pieces": [1, 2, 3, 4, 5], "pegs": [2, 1]}],
                "opponent_pegs": [[1]]
            })
        );
    }

    #[test]
    fn test_transition_table() {
        use SessionEvent::*;

        let idle = SessionState::Idle;
        assert_eq!(idle.apply(&FindGame), Ok(SessionState::AwaitingMatch));
        assert!(idle.apply(&Submit).is_err());
        assert!(idle
            .apply(&GameEnd {
                result: GameResult::Draw
            })
            .is_err());

        let matched = SessionState::AwaitingMatch
            .apply(&GameStart {
                opponent: "bob".to_string(),
            })
            .unwrap();
        assert_eq!(matched, SessionState::Matched);
        assert_eq!(
            matched.apply(&RoundStart { round: 1 }),
            Ok(SessionState::RoundActive)
        );

        let err = SessionState::RoundSubmitted.apply(&Submit).unwrap_err();
        assert_eq!(err.reason, "Already submitted this round");
        assert_eq!(
            err.to_string(),
            "Invalid transition from round_submitted via Submit: Already submitted this round"
        );

        assert!(SessionState::GameOver
            .apply(&RoundStart { round: 2 })
            .is_err());
    }

    #[test]
    fn test_state_predicates() {
        assert!(!SessionState::Idle.is_in_match());
        assert!(!SessionState::AwaitingMatch.is_in_match());
        assert!(SessionState::Matched.is_in_match());
        assert!(SessionState::RoundActive.is_in_match());
        assert!(SessionState::RoundSubmitted.is_in_match());
        assert!(!SessionState::GameOver.is_in_match());
        assert!(SessionState::GameOver.is_terminal());
        assert!(!SessionState::RoundSubmitted.is_terminal());
    }

    #[test]
    fn test_game_result_mapping() {
        assert_eq!(GameResult::from_win(Some(true)), GameResult::Win);
        assert_eq!(GameResult::from_win(Some(false)), GameResult::Loss);
        assert_eq!(GameResult::from_win(None), GameResult::Draw);
        assert_eq!(GameResult::Draw.message(), "drew.");
    }
}
