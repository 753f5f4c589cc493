// Render-ready snapshot of the client state. Front ends draw this and nothing else; all decisions
// about what is shown are made here, so that different front ends agree.

use std::time::Duration;

use enum_map::{EnumMap, enum_map};
use instant::Instant;

use crate::client::ClientState;
use crate::clock::{ClockShowing, duration_to_mmss};
use crate::coord::Square;
use crate::event::MatchSummary;
use crate::piece::piece_to_pictogram;
use crate::session::{LocalResult, MatchPhase};
use crate::side::Side;


// How long the creator of a match waits for an opponent before giving up. Purely local: the
// server is not notified.
pub const WAITING_ROOM_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const OPPONENT_PLACEHOLDER: &str = "Waiting...";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TurnIndicator {
    MyTurn,
    OpponentTurn,
    WaitingForOpponent,
    Over,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SquareView {
    pub square: Square,
    pub piece_symbol: Option<char>,
    pub is_light: bool,
    pub selected: bool,
    pub possible_move: bool,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MatchView {
    pub match_id: String,
    pub phase: MatchPhase,
    pub local_side: Side,
    pub squares: Vec<SquareView>, // rank 8 first
    pub clocks: EnumMap<Side, ClockShowing>,
    pub turn: TurnIndicator,
    pub players: EnumMap<Side, String>,
    pub awaiting_confirmation: bool,
    pub waiting_time_left: Option<Duration>,
    pub banner: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LobbyView {
    pub rows: Vec<String>,
}

impl MatchView {
    // `None` until a match is established.
    pub fn build(client: &ClientState, now: Instant) -> Option<Self> {
        let session = client.session()?;
        let match_id = session.match_id()?.to_string();
        let local_side = session.local_side()?;
        let phase = session.phase();

        let position = session.displayed_position();
        let selection = client.selection();
        let squares = Square::all_top_down()
            .map(|square| SquareView {
                square,
                piece_symbol: position.piece_at(square).map(piece_to_pictogram),
                is_light: square.is_light(),
                selected: selection.is_some_and(|s| s.from == square),
                possible_move: selection.is_some_and(|s| s.destinations.contains(&square)),
            })
            .collect();

        let clock = session.clock();
        let clocks = enum_map! { side => clock.showing_for(side, now) };

        let turn = match phase {
            MatchPhase::Uninitialized | MatchPhase::AwaitingOpponent => {
                TurnIndicator::WaitingForOpponent
            }
            MatchPhase::Active if session.side_to_move() == local_side => TurnIndicator::MyTurn,
            MatchPhase::Active => TurnIndicator::OpponentTurn,
            MatchPhase::Ended => TurnIndicator::Over,
        };

        let me = client.me().short();
        let opponent = session.opponent().map_or(OPPONENT_PLACEHOLDER.to_owned(), |id| id.short());
        let players = enum_map! {
            side => if side == local_side { me.clone() } else { opponent.clone() },
        };

        let waiting_time_left = waiting_time_left(client, now);

        let banner = session.end_result().map(|result| {
            let headline = match result.outcome.for_side(local_side) {
                LocalResult::Win => "You Won!",
                LocalResult::Loss => "You Lost!",
                LocalResult::Draw => "Draw",
            };
            format!("{headline} ({})", result.reason)
        });

        Some(MatchView {
            match_id,
            phase,
            local_side,
            squares,
            clocks,
            turn,
            players,
            awaiting_confirmation: session.pending_move().is_some(),
            waiting_time_left,
            banner,
        })
    }
}

impl LobbyView {
    pub fn build(matches: &[MatchSummary]) -> Self {
        let rows = matches
            .iter()
            .map(|m| format!("{} · {} · {}/2", m.match_id, m.status, m.players))
            .collect();
        LobbyView { rows }
    }
}

pub fn waiting_time_left(client: &ClientState, now: Instant) -> Option<Duration> {
    let since = client.waiting_since()?;
    Some(WAITING_ROOM_TIMEOUT.saturating_sub(now.saturating_duration_since(since)))
}

// The front end should give up on the waiting room and go back to the lobby.
pub fn waiting_room_expired(client: &ClientState, now: Instant) -> bool {
    waiting_time_left(client, now).is_some_and(|left| left.is_zero())
}

pub fn waiting_time_string(left: Duration) -> String { duration_to_mmss(left) }
