use std::fmt;

use crate::rules_engine::MoveRejection;
use crate::session::{EndResult, MatchPhase};


// Failures of the local session state machine. These are defensive checks against duplicated,
// reordered or contradictory server pushes. The server is the source of truth, so these are logged
// and dropped, never shown to the user.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SessionError {
    InvalidSnapshot(String),
    IllegalTransition {
        from: MatchPhase,
        operation: &'static str,
    },
    StaleMove {
        received: u64,
        current: u64,
    },
    ConflictingResult {
        recorded: EndResult,
        received: EndResult,
    },
}

// Problems that the user needs to know about. Shown as a transient notification.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ClientFault {
    // The server sent an explicit `error` envelope.
    ServerError(String),
    // The channel was closed or failed.
    TransportFault(String),
}

// An inbound envelope that could not be interpreted at all (as opposed to one that was understood
// but could not be applied, which is a `SessionError`).
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EventError {
    Malformed(String),
    UnattributableWinner(String),
}

// A user command that could not be carried out. Unlike the errors above, these are a direct
// response to something the user did, so front ends show them right away.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum CommandError {
    NoMatch,
    NotAllowed(SessionError),
    NotYourTurn,
    AwaitingConfirmation,
    IllegalMove(MoveRejection),
    Disconnected,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidSnapshot(reason) => write!(f, "invalid snapshot: {reason}"),
            SessionError::IllegalTransition { from, operation } => {
                write!(f, "cannot {operation} while {from:?}")
            }
            SessionError::StaleMove { received, current } => {
                write!(f, "stale move #{received}, already at #{current}")
            }
            SessionError::ConflictingResult { recorded, received } => write!(
                f,
                "conflicting result: recorded {:?} ({}), received {:?} ({})",
                recorded.outcome, recorded.reason, received.outcome, received.reason
            ),
        }
    }
}

impl fmt::Display for ClientFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientFault::ServerError(message) => write!(f, "{message}"),
            ClientFault::TransportFault(message) => write!(f, "Connection problem: {message}"),
        }
    }
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::Malformed(message) => write!(f, "malformed event: {message}"),
            EventError::UnattributableWinner(winner) => {
                write!(f, "cannot tell which side winner '{winner}' played")
            }
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::NoMatch => write!(f, "No match in progress"),
            CommandError::NotAllowed(err) => write!(f, "Not allowed: {err}"),
            CommandError::NotYourTurn => write!(f, "Not your turn"),
            CommandError::AwaitingConfirmation => {
                write!(f, "Previous move is not confirmed by the server yet")
            }
            CommandError::IllegalMove(rejection) => write!(f, "Illegal move: {rejection}"),
            CommandError::Disconnected => write!(f, "Not connected to the server"),
        }
    }
}

impl std::error::Error for SessionError {}
impl std::error::Error for ClientFault {}
impl std::error::Error for EventError {}
impl std::error::Error for CommandError {}
