mod common;

use std::time::Duration;

use common::*;
use pretty_assertions::assert_eq;
use wager_chess::chat::ChatParty;
use wager_chess::coord::Square;
use wager_chess::error::{ClientFault, CommandError, SessionError};
use wager_chess::event::{ClientEvent, ServerEvent, Wager};
use wager_chess::identity::PlayerId;
use wager_chess::position::Position;
use wager_chess::reconcile::NotableEvent;
use wager_chess::session::{MatchId, MatchPhase, Outcome};
use wager_chess::side::{Side, SideChoice};
use wager_chess::test_util::{after_e4, after_e4_e5};
use wager_chess::view::{MatchView, OPPONENT_PLACEHOLDER, TurnIndicator, WAITING_ROOM_TIMEOUT};


fn started_as_white() -> TestClient {
    let mut client = TestClient::new();
    client.state.create_match(SideChoice::White, FIVE_MINUTES, "blitz".to_owned(), None).unwrap();
    client.sent_events();
    let events = client.receive(ServerEvent::Created(assignment("m1", Side::White, None)), 0);
    assert_eq!(events, vec![NotableEvent::MatchStarted]);
    let events = client.receive(ServerEvent::Joined(assignment("m1", Side::White, Some(OPPONENT))), 0);
    assert_eq!(events, vec![NotableEvent::OpponentJoined]);
    client
}

#[test]
fn create_wait_join() {
    let mut client = TestClient::new();
    let wager = Wager { amount: 0.5, transaction_id: "tx1".to_owned() };
    client
        .state
        .create_match(SideChoice::Random, FIVE_MINUTES, "rapid".to_owned(), Some(wager.clone()))
        .unwrap();
    assert_eq!(client.sent_events(), vec![ClientEvent::Create {
        player: PlayerId::new(ME),
        side: SideChoice::Random,
        duration: FIVE_MINUTES,
        category: "rapid".to_owned(),
        betting: Some(wager),
    }]);

    client.receive(ServerEvent::Created(assignment("m1", Side::White, None)), 0);
    let view = MatchView::build(&client.state, client.at(1_000)).unwrap();
    assert_eq!(view.phase, MatchPhase::AwaitingOpponent);
    assert_eq!(view.turn, TurnIndicator::WaitingForOpponent);
    assert_eq!(view.players[Side::Black], OPPONENT_PLACEHOLDER);
    assert_eq!(view.players[Side::White], "0xAaaa...1111");
    assert_eq!(view.waiting_time_left, Some(WAITING_ROOM_TIMEOUT - Duration::from_secs(1)));
    assert_eq!(view.clocks[Side::White].ui_string(), "05:00");
    assert!(!view.clocks[Side::White].is_active);

    let events = client.receive(ServerEvent::Joined(assignment("m1", Side::White, Some(OPPONENT))), 2_000);
    assert_eq!(events, vec![NotableEvent::OpponentJoined]);
    let view = MatchView::build(&client.state, client.at(3_000)).unwrap();
    assert_eq!(view.turn, TurnIndicator::MyTurn);
    assert_eq!(view.players[Side::Black], "0xBbbb...2222");
    assert_eq!(view.waiting_time_left, None);
    assert_eq!(view.clocks[Side::White].ui_string(), "04:59");
    assert_eq!(view.clocks[Side::Black].ui_string(), "05:00");

    // Redelivered join.
    let events = client.receive(ServerEvent::Joined(assignment("m1", Side::White, Some(OPPONENT))), 3_000);
    assert!(events.is_empty());
    assert_eq!(client.state.reconciler().stats().session_errors, 0);
}

#[test]
fn play_a_move_by_clicking() {
    let mut client = started_as_white();

    // Empty square with nothing selected: nothing happens.
    client.state.select_square(Square::E4).unwrap();
    assert_eq!(client.state.selection(), None);

    client.state.select_square(Square::E2).unwrap();
    let view = MatchView::build(&client.state, client.at(0)).unwrap();
    let possible = view.squares.iter().filter(|sq| sq.possible_move).map(|sq| sq.square).collect::<Vec<_>>();
    assert_eq!(possible, vec![Square::E4, Square::E3]);
    assert!(view.squares.iter().any(|sq| sq.selected && sq.square == Square::E2));

    // Click again to deselect.
    client.state.select_square(Square::E2).unwrap();
    assert_eq!(client.state.selection(), None);

    client.state.select_square(Square::E2).unwrap();
    client.state.select_square(Square::E4).unwrap();
    let sent = client.sent_events();
    assert_eq!(sent.len(), 1);
    let ClientEvent::Move { match_id, player, move_notation, resulting_position, .. } = &sent[0] else {
        panic!("expected a move, got {sent:?}");
    };
    assert_eq!(match_id, &MatchId::new("m1"));
    assert_eq!(player, &PlayerId::new(ME));
    assert_eq!(move_notation, "e2e4");
    assert_eq!(resulting_position, &after_e4());

    // Prediction is shown, but the server position is kept until confirmed.
    let view = MatchView::build(&client.state, client.at(0)).unwrap();
    assert!(view.awaiting_confirmation);
    assert_eq!(client.state.session().unwrap().displayed_position(), &after_e4());
    assert_eq!(client.state.session().unwrap().position(), &Position::start());
    assert_eq!(client.state.select_square(Square::D2), Err(CommandError::AwaitingConfirmation));

    let events = client.receive(move_event("m1", after_e4(), 1), 5_000);
    assert_eq!(events, vec![NotableEvent::MyMoveConfirmed]);
    let view = MatchView::build(&client.state, client.at(5_000)).unwrap();
    assert_eq!(view.turn, TurnIndicator::OpponentTurn);
    assert!(!view.awaiting_confirmation);
    assert_eq!(client.state.select_square(Square::D2), Err(CommandError::NotYourTurn));

    let events = client.receive(move_event("m1", after_e4_e5(), 2), 9_000);
    assert_eq!(events, vec![NotableEvent::OpponentMoved]);
    let session = client.state.session().unwrap();
    assert_eq!(session.move_seq(), 2);
    assert_eq!(session.move_log().len(), 2);
    assert_eq!(session.clock().time_left(Side::White, client.at(9_000)), Duration::from_secs(295));
    assert_eq!(session.clock().time_left(Side::Black, client.at(9_000)), Duration::from_secs(296));
}

#[test]
fn illegal_move_keeps_selection() {
    let mut client = started_as_white();
    client.state.select_square(Square::E2).unwrap();
    assert!(matches!(client.state.select_square(Square::E5), Err(CommandError::IllegalMove(_))));
    assert_eq!(client.state.selection().unwrap().from, Square::E2);
    assert!(client.sent_events().is_empty());
}

#[test]
fn stale_moves_do_not_change_state() {
    let mut client = started_as_white();
    client.receive(move_event("m1", after_e4(), 1), 1_000);
    let before = client.state.session().cloned();
    for seq in [1, 0, 1] {
        let events = client.receive(move_event("m1", after_e4_e5(), seq), 2_000);
        assert!(events.is_empty());
    }
    assert_eq!(client.state.session().cloned(), before);
    assert_eq!(client.state.reconciler().stats().session_errors, 3);
}

#[test]
fn resign_waits_for_server() {
    let mut client = started_as_white();
    client.state.resign().unwrap();
    assert_eq!(client.sent_events(), vec![ClientEvent::Resign {
        match_id: MatchId::new("m1"),
        player: PlayerId::new(ME),
    }]);
    assert_eq!(client.state.session().unwrap().phase(), MatchPhase::Active);

    let events = client.receive(game_ended("m1", Some(Side::Black), "resignation"), 1_000);
    assert_eq!(events, vec![NotableEvent::MatchEnded {
        outcome: Outcome::BlackWins,
        reason: "resignation".to_owned(),
        local_win: false,
    }]);
    let view = MatchView::build(&client.state, client.at(1_000)).unwrap();
    assert_eq!(view.turn, TurnIndicator::Over);
    assert_eq!(view.banner.as_deref(), Some("You Lost! (resignation)"));

    // Duplicate and conflicting results are absorbed.
    assert!(client.receive(game_ended("m1", Some(Side::Black), "resignation"), 2_000).is_empty());
    assert!(client.receive(game_ended("m1", Some(Side::White), "timeout"), 2_000).is_empty());
    let session = client.state.session().unwrap();
    assert_eq!(session.end_result().unwrap().outcome, Outcome::BlackWins);
    assert_eq!(client.state.reconciler().stats().session_errors, 1);

    assert!(matches!(
        client.state.offer_draw(),
        Err(CommandError::NotAllowed(SessionError::IllegalTransition { from: MatchPhase::Ended, .. }))
    ));
}

#[test]
fn win_by_identity() {
    let mut client = started_as_white();
    client.state.claim_checkmate().unwrap();
    let ended = ServerEvent::GameEnded(wager_chess::event::GameEnded {
        match_id: MatchId::new("m1"),
        winner: Some(ME.to_owned()),
        winner_color: None,
        reason: "checkmate".to_owned(),
    });
    let events = client.receive(ended, 1_000);
    assert_eq!(events, vec![NotableEvent::MatchEnded {
        outcome: Outcome::WhiteWins,
        reason: "checkmate".to_owned(),
        local_win: true,
    }]);
    let view = MatchView::build(&client.state, client.at(1_000)).unwrap();
    assert_eq!(view.banner.as_deref(), Some("You Won! (checkmate)"));
}

#[test]
fn local_timeout_is_advisory() {
    let mut client = started_as_white();
    assert!(client.tick(299_000).is_empty());
    assert_eq!(client.tick(300_001), vec![NotableEvent::TimeoutCandidate(Side::White)]);
    assert!(client.tick(301_000).is_empty());
    let session = client.state.session().unwrap();
    assert_eq!(session.phase(), MatchPhase::Active);
    assert_eq!(session.clock().remaining().white_remaining, Duration::ZERO);
    let view = MatchView::build(&client.state, client.at(301_000)).unwrap();
    assert!(view.clocks[Side::White].flag_pending);
    assert_eq!(view.clocks[Side::White].ui_string(), "00:00");

    let events = client.receive(game_ended("m1", Some(Side::Black), "timeout"), 302_000);
    assert_eq!(events.len(), 1);
    assert_eq!(client.state.session().unwrap().phase(), MatchPhase::Ended);
}

#[test]
fn chat_and_notices() {
    let mut client = started_as_white();
    client.state.send_chat("   ").unwrap();
    client.state.send_chat("  good luck ").unwrap();
    assert_eq!(client.sent_events(), vec![ClientEvent::Chat {
        match_id: MatchId::new("m1"),
        player: PlayerId::new(ME),
        message: "good luck".to_owned(),
    }]);

    for sender in [ME, OPPONENT, "Server"] {
        client.receive(
            ServerEvent::Chat {
                match_id: MatchId::new("m1"),
                sender: sender.to_owned(),
                message: "hi".to_owned(),
            },
            0,
        );
    }
    let senders = client.state.chat().lines().map(|line| line.sender.clone()).collect::<Vec<_>>();
    assert_eq!(senders, vec![
        ChatParty::Myself,
        ChatParty::Opponent("0xBbbb...2222".to_owned()),
        ChatParty::Server,
    ]);

    let events = client.receive(ServerEvent::Error { message: "Game not found".to_owned() }, 0);
    assert_eq!(events, vec![NotableEvent::Fault(ClientFault::ServerError(
        "Game not found".to_owned()
    ))]);
    let events = client.receive(ServerEvent::Pairing { message: "Looking for opponent".to_owned() }, 0);
    assert_eq!(events, vec![NotableEvent::Info("Looking for opponent".to_owned())]);
}

#[test]
fn commands_without_match() {
    let mut client = TestClient::new();
    assert_eq!(client.state.resign(), Err(CommandError::NoMatch));
    assert_eq!(client.state.select_square(Square::E2), Err(CommandError::NoMatch));
    assert_eq!(client.state.confirm_move(Square::E2, Square::E4), Err(CommandError::NoMatch));
    assert_eq!(client.state.send_chat("hello"), Err(CommandError::NoMatch));
    assert!(client.sent_events().is_empty());
}

#[test]
fn disconnected_channel() {
    let client = started_as_white();
    let TestClient { mut state, sent_rx, .. } = client;
    drop(sent_rx);
    assert_eq!(state.confirm_move(Square::E2, Square::E4), Err(CommandError::Disconnected));
    // The move never left, so it is not pending either.
    assert!(state.session().unwrap().can_move_locally());
    assert_eq!(state.list_matches(), Err(CommandError::Disconnected));
}
