// Rust-upgrade (https://github.com/rust-lang/rust/issues/46379):
//   remove `#[allow(dead_code)]` before public functions.

use std::sync::mpsc;
use std::time::Duration;

use instant::Instant;
use wager_chess::client::ClientState;
use wager_chess::event::{ClientEvent, GameEnded, MatchAssignment, ServerEvent};
use wager_chess::identity::PlayerId;
use wager_chess::position::Position;
use wager_chess::reconcile::NotableEvent;
use wager_chess::session::MatchId;
use wager_chess::side::Side;
use wager_chess::test_util::ScriptedRules;


pub const ME: &str = "0xAaaa000000000000000000000000000000001111";
pub const OPPONENT: &str = "0xBbbb000000000000000000000000000000002222";
pub const FIVE_MINUTES: Duration = Duration::from_millis(300_000);

// Client connected to a fake server: outgoing events are collected instead of being sent.
pub struct TestClient {
    pub state: ClientState,
    pub sent_rx: mpsc::Receiver<ClientEvent>,
    pub t0: Instant,
}

impl TestClient {
    #[allow(dead_code)]
    pub fn new() -> Self {
        let (tx, sent_rx) = mpsc::channel();
        let state = ClientState::new(PlayerId::new(ME), tx, Box::new(ScriptedRules::opening()));
        TestClient { state, sent_rx, t0: Instant::now() }
    }

    #[allow(dead_code)]
    pub fn at(&self, millis: u64) -> Instant { self.t0 + Duration::from_millis(millis) }

    #[allow(dead_code)]
    pub fn receive(&mut self, event: ServerEvent, millis: u64) -> Vec<NotableEvent> {
        let now = self.at(millis);
        self.state.process_server_event(event, now);
        self.notable_events()
    }

    #[allow(dead_code)]
    pub fn tick(&mut self, millis: u64) -> Vec<NotableEvent> {
        let now = self.at(millis);
        self.state.tick(now);
        self.notable_events()
    }

    #[allow(dead_code)]
    pub fn notable_events(&mut self) -> Vec<NotableEvent> {
        std::iter::from_fn(|| self.state.next_notable_event()).collect()
    }

    #[allow(dead_code)]
    pub fn sent_events(&self) -> Vec<ClientEvent> { self.sent_rx.try_iter().collect() }
}

#[allow(dead_code)]
pub fn assignment(match_id: &str, color: Side, opponent: Option<&str>) -> MatchAssignment {
    MatchAssignment {
        match_id: MatchId::new(match_id),
        color,
        duration: FIVE_MINUTES,
        position: Position::start(),
        opponent: opponent.map(PlayerId::new),
        move_seq: 0,
    }
}

#[allow(dead_code)]
pub fn move_event(match_id: &str, position: Position, move_seq: u64) -> ServerEvent {
    ServerEvent::Move {
        match_id: MatchId::new(match_id),
        position,
        move_seq: Some(move_seq),
    }
}

#[allow(dead_code)]
pub fn game_ended(match_id: &str, winner_color: Option<Side>, reason: &str) -> ServerEvent {
    ServerEvent::GameEnded(GameEnded {
        match_id: MatchId::new(match_id),
        winner: None,
        winner_color,
        reason: reason.to_owned(),
    })
}
