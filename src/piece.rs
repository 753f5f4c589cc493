use derive_new::new;
use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use crate::side::Side;


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Enum, EnumIter, Serialize, Deserialize)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, new, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub side: Side,
}

impl PieceKind {
    pub fn to_ascii_lowercase(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn from_ascii_lowercase(ch: char) -> Option<Self> {
        match ch {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }
}

// Position-string letters: uppercase for White, lowercase for Black.
pub fn piece_from_ascii(ch: char) -> Option<Piece> {
    let kind = PieceKind::from_ascii_lowercase(ch.to_ascii_lowercase())?;
    let side = if ch.is_ascii_uppercase() { Side::White } else { Side::Black };
    Some(Piece { kind, side })
}

pub fn piece_to_ascii(piece: Piece) -> char {
    let ch = piece.kind.to_ascii_lowercase();
    match piece.side {
        Side::White => ch.to_ascii_uppercase(),
        Side::Black => ch,
    }
}

pub fn piece_to_pictogram(piece: Piece) -> char {
    use self::PieceKind::*;
    use self::Side::*;
    match (piece.side, piece.kind) {
        (White, Pawn) => '♙',
        (White, Knight) => '♘',
        (White, Bishop) => '♗',
        (White, Rook) => '♖',
        (White, Queen) => '♕',
        (White, King) => '♔',
        (Black, Pawn) => '♟',
        (Black, Knight) => '♞',
        (Black, Bishop) => '♝',
        (Black, Rook) => '♜',
        (Black, Queen) => '♛',
        (Black, King) => '♚',
    }
}


#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn ascii_round_trip() {
        for kind in PieceKind::iter() {
            for side in [Side::White, Side::Black] {
                let piece = Piece::new(kind, side);
                assert_eq!(piece_from_ascii(piece_to_ascii(piece)), Some(piece));
            }
        }
        assert_eq!(piece_from_ascii('x'), None);
        assert_eq!(piece_from_ascii('1'), None);
    }

    #[test]
    fn pictograms() {
        assert_eq!(piece_to_pictogram(Piece::new(PieceKind::Knight, Side::White)), '♘');
        assert_eq!(piece_to_pictogram(Piece::new(PieceKind::King, Side::Black)), '♚');
    }
}
