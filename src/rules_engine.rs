// Contract with the chess rules implementation. The client never decides legality itself: it asks
// the engine for a prediction and lets the server have the final word.

use std::fmt;

use derive_new::new;
use itertools::Itertools;

use crate::coord::Square;
use crate::position::Position;


// A move as entered by the user: origin and destination. Promotions always produce a queen.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, new)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum MoveRejection {
    IllegalMove,
    // The engine could not work with the position it was given.
    EngineFailure(String),
}

pub trait RulesEngine {
    fn apply_move(&self, position: &Position, request: MoveRequest)
    -> Result<Position, MoveRejection>;

    // Destinations of all legal moves starting at `from`. Empty if there is no piece of the side
    // to move there.
    fn legal_destinations(&self, position: &Position, from: Square) -> Vec<Square>;
}

impl MoveRequest {
    // Coordinate notation used on the wire, e.g. "e2e4".
    pub fn to_coordinate_notation(self) -> String {
        format!("{}{}", self.from.to_algebraic(), self.to.to_algebraic())
    }

    pub fn from_coordinate_notation(s: &str) -> Option<Self> {
        let s = s.trim();
        if !s.is_ascii() || s.len() != 4 {
            return None;
        }
        let (from, to) = (&s[..2], &s[2..]);
        Some(MoveRequest::new(Square::from_algebraic(from)?, Square::from_algebraic(to)?))
    }
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_coordinate_notation())
    }
}

impl fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveRejection::IllegalMove => write!(f, "not a legal move"),
            MoveRejection::EngineFailure(message) => write!(f, "rules engine failure: {message}"),
        }
    }
}

impl std::error::Error for MoveRejection {}

pub fn format_destinations(destinations: &[Square]) -> String {
    destinations.iter().map(|sq| sq.to_algebraic()).join(" ")
}
