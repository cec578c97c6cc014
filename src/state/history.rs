//! Board histories for both players.
//!
//! Storage is always oldest-first. The `*_recent_first` views reverse it for
//! display without touching the stored order.

use crate::state::protocol::{sorted_feedback, BoardRow, Colour};

#[derive(Debug, Clone, Default)]
pub struct BoardHistory {
    /// Own rows, as last pushed by the server
    rows: Vec<BoardRow>,
    /// Opponent feedback, one entry per round
    opponent: Vec<Vec<Colour>>,
}

impl BoardHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the own board wholesale. The server always sends every row.
    pub fn replace_rows(&mut self, rows: Vec<BoardRow>) {
        self.rows = rows;
    }

    /// Append one round of opponent feedback.
    pub fn push_opponent(&mut self, status: Vec<Colour>) {
        self.opponent.push(status);
    }

    pub fn rows(&self) -> &[BoardRow] {
        &self.rows
    }

    pub fn opponent(&self) -> &[Vec<Colour>] {
        &self.opponent
    }

    /// Own rows newest first, each paired with its 1-based round label.
    pub fn rows_recent_first(&self) -> impl Iterator<Item = (usize, &BoardRow)> {
        self.rows
            .iter()
            .enumerate()
            .rev()
            .map(|(i, row)| (i + 1, row))
    }

    /// Opponent feedback newest first, pegs sorted black before white.
    pub fn opponent_recent_first(&self) -> impl Iterator<Item = Vec<Colour>> + '_ {
        self.opponent.iter().rev().map(|pegs| sorted_feedback(pegs))
    }

    pub fn to_json(&self) -> serde_json::Value {
        let board: Vec<serde_json::Value> = self
            .rows_recent_first()
            .map(|(round, row)| {
                serde_json::json!({
                    "round": format!("{:02}", round),
                    "pieces": row.pieces,
                    "pegs": row.sorted_feedback()
                })
            })
            .collect();
        let opponent: Vec<Vec<Colour>> = self.opponent_recent_first().collect();

        serde_json::json!({
            "board": board,
            "opponent": opponent
        })
    }
}
