//! Shared types for the QUINIELA agency client.
//!
//! The session state machine, transport, and protocol modules all depend on
//! the error taxonomy and command vocabulary defined here, so this module
//! must not depend on any of them.

use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Session sub-protocol commands
// ---------------------------------------------------------------------------

/// Command strings exchanged with the lottery server on top of plain-string
/// messages. Fields are comma-joined ASCII.
pub mod commands {
    /// Announces that batches of bets follow.
    pub fn load_batches(agency_id: u32) -> String {
        format!("LOAD_BATCHES,{agency_id}")
    }

    /// Announces that this agency has finished submitting bets.
    pub fn all_bets_sent(agency_id: u32) -> String {
        format!("ALL_BETS_SENT,{agency_id}")
    }

    /// Asks the server for the draw results.
    pub fn results_request(agency_id: u32) -> String {
        format!("RESULTS_REQUEST,{agency_id}")
    }

    /// Terminates the batch stream (and, best effort, the whole session).
    pub const END: &str = "END";

    /// Server reply while the draw has not been computed yet.
    ///
    /// The spelling is the protocol constant used by the server; it must be
    /// matched byte for byte.
    pub const IN_PROGRESS: &str = "LOTERY_IN_PROGRESS";
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Phase of the client session. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    Uploading,
    Notified,
    Polling,
    Done,
    Failed,
}

impl SessionState {
    /// Whether the session has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connected => "connected",
            SessionState::Uploading => "uploading",
            SessionState::Notified => "notified",
            SessionState::Polling => "polling",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Draw results
// ---------------------------------------------------------------------------

/// Outcome of a completed draw: the document ids of the winning bets for
/// this agency, in the order the server reported them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawResults {
    pub winners: Vec<String>,
}

impl DrawResults {
    pub fn new(winners: Vec<String>) -> Self {
        Self { winners }
    }

    pub fn winner_count(&self) -> usize {
        self.winners.len()
    }
}

impl fmt::Display for DrawResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} winner(s)", self.winners.len())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong in a client session.
///
/// None of these are retried automatically; the only retry in the protocol
/// is the results-polling loop, which repeats solely on an explicit
/// in-progress reply from the server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Message could not be encoded: {0}")]
    Encode(String),

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Malformed message: {0}")]
    Format(String),

    #[error("Incomplete message: expected {expected} bytes, read {read}")]
    Incomplete { expected: usize, read: usize },

    #[error("Record source error: {0}")]
    Source(String),

    #[error("Session cancelled by shutdown signal")]
    Cancelled,

    #[error("Unexpected server reply: {0:?}")]
    UnexpectedReply(String),

    #[error("Draw still in progress after {0} poll attempts")]
    PollLimit(u32),
}

impl ClientError {
    /// True when the failure was caused by a deliberate shutdown rather
    /// than a defect; callers report these at info level, not error level.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
