// Rules engine backed by the `chess` crate. Only used for local prediction and move highlighting:
// the server validates every move again.

use std::str::FromStr;

use chess::{Board, ChessMove, MoveGen};
use itertools::Itertools;
use log::warn;

use wager_chess::coord::{File, Rank, Square};
use wager_chess::position::Position;
use wager_chess::rules_engine::{MoveRejection, MoveRequest, RulesEngine};
use wager_chess::side::Side;


pub struct ChessCrateRules;

fn to_chess_square(sq: Square) -> chess::Square {
    chess::Square::make_square(
        chess::Rank::from_index(sq.rank.to_zero_based().into()),
        chess::File::from_index(sq.file.to_zero_based().into()),
    )
}

fn from_chess_square(sq: chess::Square) -> Square {
    Square::new(
        Rank::from_zero_based(sq.get_rank().to_index() as u8),
        File::from_zero_based(sq.get_file().to_index() as u8),
    )
}

fn read_board(position: &Position) -> Result<Board, MoveRejection> {
    Board::from_str(position.as_str()).map_err(|err| {
        MoveRejection::EngineFailure(format!("cannot read {}: {err:?}", position.as_str()))
    })
}

// `Board` does not keep move counters, so they are carried over from the original position.
fn with_move_counters(placement_etc: &str, before: &Position, reset_half_moves: bool) -> String {
    let fields = placement_etc.split_whitespace().take(4).join(" ");
    let half_moves = if reset_half_moves {
        0
    } else {
        let previous = before.as_str().split_whitespace().nth(4);
        previous.and_then(|s| s.parse::<u32>().ok()).unwrap_or(0) + 1
    };
    let full_moves = match before.side_to_move() {
        Side::White => before.full_move_number(),
        Side::Black => before.full_move_number() + 1,
    };
    format!("{fields} {half_moves} {full_moves}")
}

impl RulesEngine for ChessCrateRules {
    fn apply_move(
        &self, position: &Position, request: MoveRequest,
    ) -> Result<Position, MoveRejection> {
        let board = read_board(position)?;
        let from = to_chess_square(request.from);
        let to = to_chess_square(request.to);
        let is_pawn = board.piece_on(from) == Some(chess::Piece::Pawn);
        let promotion = (is_pawn
            && request.to.rank == Rank::promotion_rank(position.side_to_move()))
        .then_some(chess::Piece::Queen);
        let mv = ChessMove::new(from, to, promotion);
        if !board.legal(mv) {
            return Err(MoveRejection::IllegalMove);
        }
        let is_capture = board.piece_on(to).is_some();
        let next = board.make_move_new(mv);
        let notation = with_move_counters(&next.to_string(), position, is_pawn || is_capture);
        Position::parse(&notation).map_err(|err| MoveRejection::EngineFailure(err.to_string()))
    }

    fn legal_destinations(&self, position: &Position, from: Square) -> Vec<Square> {
        let board = match read_board(position) {
            Ok(board) => board,
            Err(err) => {
                warn!("{err}");
                return vec![];
            }
        };
        let from = to_chess_square(from);
        MoveGen::new_legal(&board)
            .filter(|mv| mv.get_source() == from)
            .map(|mv| from_chess_square(mv.get_dest()))
            .unique()
            .sorted_by_key(|sq| sq.to_algebraic())
            .collect()
    }
}
