use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::side::Side;


pub const NUM_RANKS: u8 = 8;
pub const NUM_FILES: u8 = 8;


const fn const_char_sub(a: char, b: char) -> u8 {
    let a_idx = a as u32;
    let b_idx = b as u32;
    assert!(a_idx >= b_idx);
    let diff = a_idx - b_idx;
    assert!(diff <= u8::MAX as u32);
    diff as u8
}


#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Rank {
    idx: u8, // 0-based: rank '1' is 0
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct File {
    idx: u8, // 0-based: file 'a' is 0
}

// A board square. Serialized in algebraic notation ("e4").
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square {
    pub rank: Rank,
    pub file: File,
}

impl Rank {
    pub const fn from_zero_based(idx: u8) -> Self {
        assert!(idx < NUM_RANKS);
        Self { idx }
    }
    pub fn from_algebraic(ch: char) -> Option<Self> {
        ('1'..='8').contains(&ch).then(|| Self { idx: ch as u8 - b'1' })
    }
    pub const fn to_zero_based(self) -> u8 { self.idx }
    pub const fn to_algebraic(self) -> char { (self.idx + b'1') as char }
    pub fn all() -> impl DoubleEndedIterator<Item = Self> + Clone {
        (0..NUM_RANKS).map(Self::from_zero_based)
    }
    // The rank where pawns of `side` promote.
    pub fn promotion_rank(side: Side) -> Self {
        match side {
            Side::White => Self::from_zero_based(NUM_RANKS - 1),
            Side::Black => Self::from_zero_based(0),
        }
    }
}

impl File {
    pub const fn from_zero_based(idx: u8) -> Self {
        assert!(idx < NUM_FILES);
        Self { idx }
    }
    pub fn from_algebraic(ch: char) -> Option<Self> {
        ('a'..='h').contains(&ch).then(|| Self { idx: ch as u8 - b'a' })
    }
    pub const fn to_zero_based(self) -> u8 { self.idx }
    pub const fn to_algebraic(self) -> char { (self.idx + b'a') as char }
    pub fn all() -> impl DoubleEndedIterator<Item = Self> + Clone {
        (0..NUM_FILES).map(Self::from_zero_based)
    }
}

impl Square {
    pub const fn new(rank: Rank, file: File) -> Self { Self { rank, file } }
    const fn from_chars(file: char, rank: char) -> Self {
        Self::new(
            Rank::from_zero_based(const_char_sub(rank, '1')),
            File::from_zero_based(const_char_sub(file, 'a')),
        )
    }

    pub fn from_algebraic(s: &str) -> Option<Self> {
        let (file, rank) = s.chars().collect_tuple()?;
        Some(Self::new(Rank::from_algebraic(rank)?, File::from_algebraic(file)?))
    }
    pub fn to_algebraic(self) -> String {
        format!("{}{}", self.file.to_algebraic(), self.rank.to_algebraic())
    }

    pub fn is_light(self) -> bool { (self.rank.idx + self.file.idx) % 2 == 1 }

    // All squares in the order they are laid out on screen with White at the bottom: rank 8
    // first, files from 'a' to 'h' within a rank.
    pub fn all_top_down() -> impl Iterator<Item = Square> {
        Rank::all()
            .rev()
            .cartesian_product(File::all())
            .map(|(rank, file)| Square { rank, file })
    }
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Square({})", self.to_algebraic())
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.to_algebraic()) }
}

impl TryFrom<String> for Square {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Square::from_algebraic(&s).ok_or_else(|| format!("invalid square: {s}"))
    }
}

impl From<Square> for String {
    fn from(sq: Square) -> Self { sq.to_algebraic() }
}


// Only the squares that show up in common openings and tests. Use `Square::from_algebraic`
// for the rest.
impl Square {
    pub const A1: Square = Square::from_chars('a', '1');
    pub const A8: Square = Square::from_chars('a', '8');
    pub const B1: Square = Square::from_chars('b', '1');
    pub const C3: Square = Square::from_chars('c', '3');
    pub const C6: Square = Square::from_chars('c', '6');
    pub const D2: Square = Square::from_chars('d', '2');
    pub const D4: Square = Square::from_chars('d', '4');
    pub const D5: Square = Square::from_chars('d', '5');
    pub const D7: Square = Square::from_chars('d', '7');
    pub const E1: Square = Square::from_chars('e', '1');
    pub const E2: Square = Square::from_chars('e', '2');
    pub const E3: Square = Square::from_chars('e', '3');
    pub const E4: Square = Square::from_chars('e', '4');
    pub const E5: Square = Square::from_chars('e', '5');
    pub const E7: Square = Square::from_chars('e', '7');
    pub const E8: Square = Square::from_chars('e', '8');
    pub const F3: Square = Square::from_chars('f', '3');
    pub const G1: Square = Square::from_chars('g', '1');
    pub const G8: Square = Square::from_chars('g', '8');
    pub const H1: Square = Square::from_chars('h', '1');
    pub const H3: Square = Square::from_chars('h', '3');
    pub const H8: Square = Square::from_chars('h', '8');
}
