// Position codec. The canonical position string is FEN as produced by the rules engine. We never
// build one ourselves: the only producers are the server and the rules engine. This module only
// validates the string and exposes the parts the client needs for rendering and turn order.
//
// Differences from a full FEN validator:
//   - Castling rights and en passant target are checked for shape only. Whether they make sense
//     is the rules engine's business.
//   - Halfmove clock is accepted but ignored.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::coord::{File, NUM_FILES, NUM_RANKS, Rank, Square};
use crate::piece::{Piece, piece_from_ascii};
use crate::side::Side;


pub const START_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PositionError(pub String);

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid position: {}", self.0)
    }
}

impl std::error::Error for PositionError {}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Position {
    notation: String,
    grid: [Option<Piece>; (NUM_RANKS * NUM_FILES) as usize],
    side_to_move: Side,
    full_move_number: u32,
}

fn grid_index(sq: Square) -> usize {
    (sq.rank.to_zero_based() * NUM_FILES + sq.file.to_zero_based()) as usize
}

impl Position {
    pub fn start() -> Self {
        // Cannot fail: covered by tests.
        Self::parse(START_POSITION).unwrap()
    }

    pub fn parse(notation: &str) -> Result<Self, PositionError> {
        let err = |msg: String| PositionError(msg);
        let (placement, active, castling, en_passant, half_move_clock, full_move_number) =
            notation
                .split_whitespace()
                .collect_tuple()
                .ok_or_else(|| err(format!("expected 6 fields: {notation}")))?;

        let mut grid = [None; (NUM_RANKS * NUM_FILES) as usize];
        let ranks = placement.split('/').collect_vec();
        if ranks.len() != NUM_RANKS as usize {
            return Err(err(format!("has {} ranks, expected {}", ranks.len(), NUM_RANKS)));
        }
        for (rank_idx, rank_notation) in ranks.iter().rev().enumerate() {
            let rank = Rank::from_zero_based(rank_idx as u8);
            let mut file_idx: u8 = 0;
            for ch in rank_notation.chars() {
                if let Some(n) = ch.to_digit(10) {
                    if n == 0 || file_idx + n as u8 > NUM_FILES {
                        return Err(err(format!("bad empty-square count '{ch}'")));
                    }
                    file_idx += n as u8;
                } else if let Some(piece) = piece_from_ascii(ch) {
                    if file_idx >= NUM_FILES {
                        return Err(err(format!("rank {} is too long", rank.to_algebraic())));
                    }
                    let sq = Square::new(rank, File::from_zero_based(file_idx));
                    grid[grid_index(sq)] = Some(piece);
                    file_idx += 1;
                } else {
                    return Err(err(format!("unknown piece '{ch}'")));
                }
            }
            if file_idx != NUM_FILES {
                return Err(err(format!(
                    "rank {} has {} files, expected {}",
                    rank.to_algebraic(),
                    file_idx,
                    NUM_FILES
                )));
            }
        }

        let side_to_move = Side::from_code(active).map_err(err)?;
        if castling != "-" && !castling.chars().all(|ch| "KQkqABCDEFGHabcdefgh".contains(ch)) {
            return Err(err(format!("bad castling rights '{castling}'")));
        }
        if en_passant != "-" && Square::from_algebraic(en_passant).is_none() {
            return Err(err(format!("bad en passant target '{en_passant}'")));
        }
        half_move_clock
            .parse::<u32>()
            .map_err(|_| err(format!("bad halfmove clock '{half_move_clock}'")))?;
        let full_move_number = full_move_number
            .parse::<u32>()
            .map_err(|_| err(format!("bad full move number '{full_move_number}'")))?;

        Ok(Position {
            notation: notation.to_owned(),
            grid,
            side_to_move,
            full_move_number,
        })
    }

    pub fn as_str(&self) -> &str { &self.notation }
    pub fn side_to_move(&self) -> Side { self.side_to_move }
    pub fn full_move_number(&self) -> u32 { self.full_move_number }
    pub fn piece_at(&self, sq: Square) -> Option<Piece> { self.grid[grid_index(sq)] }

    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all_top_down().filter_map(|sq| self.piece_at(sq).map(|piece| (sq, piece)))
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.notation)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.notation) }
}

impl TryFrom<String> for Position {
    type Error = PositionError;
    fn try_from(s: String) -> Result<Self, Self::Error> { Position::parse(&s) }
}

impl From<Position> for String {
    fn from(position: Position) -> Self { position.notation }
}
