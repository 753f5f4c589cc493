// Wire envelopes. JSON objects tagged with "type", fields in camelCase. Older servers use
// "gameId" instead of "matchId", "fen" instead of "position" and "gameState" with a "game" field
// instead of "matchState"; these are accepted on input.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::identity::PlayerId;
use crate::position::Position;
use crate::session::{MatchId, MatchSnapshot, Outcome};
use crate::side::{Side, SideChoice};


// Betting message shape. The client only relays it; the transaction itself happens elsewhere.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wager {
    pub amount: f64,
    pub transaction_id: String,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Create {
        player: PlayerId,
        side: SideChoice,
        #[serde(with = "duration_millis")]
        duration: Duration,
        category: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        betting: Option<Wager>,
    },
    Join {
        match_id: MatchId,
        player: PlayerId,
    },
    PairRequest {
        player: PlayerId,
        side: SideChoice,
    },
    ListMatches,
    Move {
        match_id: MatchId,
        player: PlayerId,
        #[serde(rename = "move")]
        move_notation: String,
        // Our prediction. The server uses it for cross-validation only.
        resulting_position: Position,
        client_time: i64, // unix millis
    },
    Resign {
        match_id: MatchId,
        player: PlayerId,
    },
    OfferDraw {
        match_id: MatchId,
        player: PlayerId,
    },
    ClaimCheckmate {
        match_id: MatchId,
        player: PlayerId,
    },
    Chat {
        match_id: MatchId,
        player: PlayerId,
        message: String,
    },
    // Asks the server to resend the full match state, e.g. after a reconnection.
    StateMatch {
        match_id: MatchId,
    },
}

// Everything the server tells us when it puts us into a match.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchAssignment {
    #[serde(alias = "gameId")]
    pub match_id: MatchId,
    pub color: Side,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    #[serde(alias = "fen")]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent: Option<PlayerId>,
    #[serde(default)]
    pub move_seq: u64,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEnded {
    #[serde(alias = "gameId")]
    pub match_id: MatchId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_color: Option<Side>,
    pub reason: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    #[serde(alias = "gameId")]
    pub match_id: MatchId,
    pub status: String,
    pub players: u8,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Created(MatchAssignment),
    Joined(MatchAssignment),
    Paired(MatchAssignment),
    #[serde(alias = "gameState")]
    MatchState {
        #[serde(rename = "match", alias = "game")]
        assignment: MatchAssignment,
    },
    #[serde(alias = "gameList")]
    MatchList {
        #[serde(alias = "games")]
        matches: Vec<MatchSummary>,
    },
    Move {
        #[serde(alias = "gameId")]
        match_id: MatchId,
        #[serde(alias = "fen")]
        position: Position,
        // Absent on servers that do not number moves.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        move_seq: Option<u64>,
    },
    GameEnded(GameEnded),
    Chat {
        #[serde(alias = "gameId")]
        match_id: MatchId,
        sender: String,
        message: String,
    },
    Error {
        message: String,
    },
    // Matchmaking progress notice.
    Pairing {
        message: String,
    },
}

impl ClientEvent {
    pub fn match_id(&self) -> Option<&MatchId> {
        use ClientEvent::*;
        match self {
            Join { match_id, .. }
            | Move { match_id, .. }
            | Resign { match_id, .. }
            | OfferDraw { match_id, .. }
            | ClaimCheckmate { match_id, .. }
            | Chat { match_id, .. }
            | StateMatch { match_id } => Some(match_id),
            Create { .. } | PairRequest { .. } | ListMatches => None,
        }
    }
}

impl ServerEvent {
    pub fn match_id(&self) -> Option<&MatchId> {
        use ServerEvent::*;
        match self {
            Created(a) | Joined(a) | Paired(a) | MatchState { assignment: a } => Some(&a.match_id),
            Move { match_id, .. } | Chat { match_id, .. } => Some(match_id),
            ServerEvent::GameEnded(ended) => Some(&ended.match_id),
            MatchList { .. } | Error { .. } | Pairing { .. } => None,
        }
    }

    // Wire name of the event, for logs.
    pub fn type_name(&self) -> &'static str {
        use ServerEvent::*;
        match self {
            Created(_) => "created",
            Joined(_) => "joined",
            Paired(_) => "paired",
            MatchState { .. } => "matchState",
            MatchList { .. } => "matchList",
            Move { .. } => "move",
            ServerEvent::GameEnded(_) => "gameEnded",
            Chat { .. } => "chat",
            Error { .. } => "error",
            Pairing { .. } => "pairing",
        }
    }

    // Events that can establish a match on their own.
    pub fn assignment(&self) -> Option<&MatchAssignment> {
        use ServerEvent::*;
        match self {
            Created(a) | Joined(a) | Paired(a) | MatchState { assignment: a } => Some(a),
            _ => None,
        }
    }
}

impl MatchAssignment {
    pub fn to_snapshot(&self) -> MatchSnapshot {
        MatchSnapshot::new(
            self.match_id.clone(),
            self.position.clone(),
            self.color,
            self.duration,
            self.opponent.clone(),
            self.move_seq,
        )
    }
}

impl GameEnded {
    // Attributes the winner to a side. The explicit color wins over the identity; an identity is
    // either ours, the opponent's, or the literal "opponent". No winner at all means a draw.
    pub fn outcome(
        &self, local_side: Side, me: &PlayerId, opponent: Option<&PlayerId>,
    ) -> Result<Outcome, EventError> {
        if let Some(color) = self.winner_color {
            return Ok(Outcome::win_for(color));
        }
        let Some(winner) = self.winner.as_deref().filter(|w| !w.is_empty()) else {
            return Ok(Outcome::Draw);
        };
        if winner == me.as_str() {
            Ok(Outcome::win_for(local_side))
        } else if winner == "opponent" || opponent.is_some_and(|opp| opp.as_str() == winner) {
            Ok(Outcome::win_for(local_side.opponent()))
        } else {
            Err(EventError::UnattributableWinner(winner.to_owned()))
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
