// Test utilities shared by unit tests and the "tests" folder.

use std::collections::HashMap;
use std::time::Duration;

use rand::{Rng, SeedableRng};

use crate::coord::Square;
use crate::identity::PlayerId;
use crate::position::Position;
use crate::rules_engine::{MoveRejection, MoveRequest, RulesEngine};
use crate::session::{MatchId, MatchSnapshot};
use crate::side::Side;


pub const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
pub const AFTER_E4_E5: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2";

pub fn deterministic_rng() -> impl Rng { rand::rngs::StdRng::from_seed([0; 32]) }

pub fn after_e4() -> Position { Position::parse(AFTER_E4).unwrap() }
pub fn after_e4_e5() -> Position { Position::parse(AFTER_E4_E5).unwrap() }

// Fresh match "m1": we play White with 5 minutes on the clock, nobody has joined yet.
pub fn sample_snapshot() -> MatchSnapshot {
    MatchSnapshot::new(
        MatchId::new("m1"),
        Position::start(),
        Side::White,
        Duration::from_millis(300_000),
        None,
        0,
    )
}

pub fn sample_opponent() -> PlayerId { PlayerId::new("0xOpponent0000000000000000000000000000ab12") }

// Rules engine that knows only the moves it was told about.
#[derive(Default)]
pub struct ScriptedRules {
    moves: HashMap<(String, MoveRequest), Position>,
}

impl ScriptedRules {
    pub fn new() -> Self { Self::default() }

    // 1. e4 e5
    pub fn opening() -> Self {
        let after_e3 =
            Position::parse("rnbqkbnr/pppppppp/8/8/8/4P3/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap();
        let mut rules = Self::new();
        rules.add(&Position::start(), MoveRequest::new(Square::E2, Square::E3), after_e3);
        rules.add(&Position::start(), MoveRequest::new(Square::E2, Square::E4), after_e4());
        rules.add(&after_e4(), MoveRequest::new(Square::E7, Square::E5), after_e4_e5());
        rules
    }

    pub fn add(&mut self, position: &Position, request: MoveRequest, result: Position) {
        self.moves.insert((position.as_str().to_owned(), request), result);
    }
}

impl RulesEngine for ScriptedRules {
    fn apply_move(
        &self, position: &Position, request: MoveRequest,
    ) -> Result<Position, MoveRejection> {
        self.moves
            .get(&(position.as_str().to_owned(), request))
            .cloned()
            .ok_or(MoveRejection::IllegalMove)
    }

    fn legal_destinations(&self, position: &Position, from: Square) -> Vec<Square> {
        let mut destinations: Vec<Square> = self
            .moves
            .keys()
            .filter(|(notation, request)| notation == position.as_str() && request.from == from)
            .map(|(_, request)| request.to)
            .collect();
        destinations.sort_by_key(|sq| sq.to_algebraic());
        destinations
    }
}
