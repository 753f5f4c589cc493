use std::fmt;

use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumIter;


#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Enum, EnumIter, Serialize, Deserialize,
)]
pub enum Side {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

// Side requested when creating a match or asking for a pairing. The server makes the final
// choice for `Random`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SideChoice {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
    #[serde(rename = "random")]
    Random,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    // Single-letter code shared by the wire format and the position string.
    pub fn to_code(self) -> char {
        match self {
            Side::White => 'w',
            Side::Black => 'b',
        }
    }
    pub fn from_code(s: &str) -> Result<Side, String> {
        match s {
            "w" => Ok(Side::White),
            "b" => Ok(Side::Black),
            _ => Err(format!("invalid side: {s}")),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::White => "White",
            Side::Black => "Black",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl From<Side> for SideChoice {
    fn from(side: Side) -> Self {
        match side {
            Side::White => SideChoice::White,
            Side::Black => SideChoice::Black,
        }
    }
}

impl SideChoice {
    pub fn from_user_input(s: &str) -> Result<SideChoice, String> {
        match s.to_ascii_lowercase().as_str() {
            "w" | "white" => Ok(SideChoice::White),
            "b" | "black" => Ok(SideChoice::Black),
            "random" | "any" => Ok(SideChoice::Random),
            _ => Err(format!("unexpected side: {s}")),
        }
    }
}
