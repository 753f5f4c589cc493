use console::Style;
use itertools::Itertools;

use wager_chess::chat::{ChatHistory, ChatParty};
use wager_chess::clock::ClockShowing;
use wager_chess::side::Side;
use wager_chess::view::{LobbyView, MatchView, SquareView, TurnIndicator, waiting_time_string};


const SQUARE_WIDTH: usize = 3;
const BOARD_WIDTH: usize = (8 + 2) * SQUARE_WIDTH;

fn render_clock(showing: &ClockShowing) -> (String, usize) {
    let mut clock_str = showing.ui_string();
    let clock_str_len = clock_str.len();
    if showing.out_of_time {
        clock_str = Style::new().on_red().apply_to(clock_str).to_string();
    } else if showing.flag_pending {
        clock_str = Style::new().red().reverse().apply_to(clock_str).to_string();
    } else if showing.is_active {
        clock_str = Style::new().reverse().apply_to(clock_str).to_string();
    }
    (clock_str, clock_str_len)
}

fn render_header(view: &MatchView, side: Side) -> String {
    let (clock_str, clock_str_len) = render_clock(&view.clocks[side]);
    let player = &view.players[side];
    let player_len = player.chars().count();
    let space = " ".repeat(BOARD_WIDTH.saturating_sub(clock_str_len + player_len));
    format!("{player}{space}{clock_str}")
}

fn render_square(square: &SquareView) -> String {
    let mut style = Style::new().color256(232);
    style = if square.selected {
        style.on_color256(220)
    } else if square.possible_move {
        style.on_color256(114)
    } else if square.is_light {
        style.on_color256(230)
    } else {
        style.on_color256(180)
    };
    let symbol = match (square.piece_symbol, square.possible_move) {
        (Some(ch), _) => ch,
        (None, true) => '·',
        (None, false) => ' ',
    };
    style.apply_to(format!(" {symbol} ")).to_string()
}

// Our side is always at the bottom.
pub fn render_board(view: &MatchView) -> String {
    let mut rows = view.squares.chunks(8).collect_vec();
    let mut files = "abcdefgh".chars().collect_vec();
    if view.local_side == Side::Black {
        rows.reverse();
        files.reverse();
    }
    let mut out = String::new();
    let file_labels = files.iter().map(|f| format!(" {f} ")).join("");
    out.push_str(&format!("   {file_labels}   \n"));
    for row in rows {
        let mut cells = row.iter().collect_vec();
        if view.local_side == Side::Black {
            cells.reverse();
        }
        let rank = cells.first().map_or(' ', |sq| sq.square.rank.to_algebraic());
        let line = cells.into_iter().map(render_square).join("");
        out.push_str(&format!(" {rank} {line} {rank} \n"));
    }
    out.push_str(&format!("   {file_labels}   "));
    out
}

fn turn_line(view: &MatchView) -> String {
    if let Some(banner) = &view.banner {
        return Style::new().magenta().bold().apply_to(banner).to_string();
    }
    match view.turn {
        TurnIndicator::WaitingForOpponent => {
            let countdown = view.waiting_time_left.map(waiting_time_string);
            match countdown {
                Some(left) => format!("Waiting for an opponent... {left}"),
                None => "Waiting for an opponent...".to_owned(),
            }
        }
        TurnIndicator::MyTurn if view.awaiting_confirmation => {
            "Move sent, waiting for the server...".to_owned()
        }
        TurnIndicator::MyTurn => Style::new().green().apply_to("Your move").to_string(),
        TurnIndicator::OpponentTurn => "Opponent's move".to_owned(),
        TurnIndicator::Over => "Game over".to_owned(),
    }
}

pub fn render_match(view: &MatchView) -> String {
    let me = view.local_side;
    format!(
        "Match {} · playing {}\n\n{}\n{}\n{}\n\n{}",
        view.match_id,
        me,
        render_header(view, me.opponent()),
        render_board(view),
        render_header(view, me),
        turn_line(view),
    )
}

pub fn render_lobby(view: &LobbyView, me: &str) -> String {
    let mut out = format!("Signed in as {me}\n\n");
    if view.rows.is_empty() {
        out.push_str("No open matches. Use /create or /pair to start one.\n");
    } else {
        out.push_str("Open matches:\n");
        for row in &view.rows {
            out.push_str(&format!("  • {row}\n"));
        }
    }
    out
}

// Most recent `max_lines` messages, oldest first.
pub fn render_chat(chat: &ChatHistory, max_lines: usize) -> String {
    let skip = chat.len().saturating_sub(max_lines);
    chat.lines()
        .skip(skip)
        .map(|line| {
            let style = match line.sender {
                ChatParty::Myself => Style::new().cyan(),
                ChatParty::Opponent(_) => Style::new().yellow(),
                ChatParty::Server => Style::new().dim(),
            };
            format!("{} {}", style.apply_to(format!("{}:", line.sender.label())), line.text)
        })
        .join("\n")
}

pub const HELP: &str = "\
Moves: e2e4, or a square (e2) to select and another one to move.
Lobby: /create [w|b|random] [minutes] [wager], /pair [w|b|random], /list, /join <id>
Match: /resign, /draw, /checkmate, /chat <text>, /state [id], /leave
/help, /quit";


#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use instant::Instant;
    use pretty_assertions::assert_eq;
    use wager_chess::client::ClientState;
    use wager_chess::event::{MatchAssignment, MatchSummary, ServerEvent};
    use wager_chess::identity::PlayerId;
    use wager_chess::reconcile::NotableEvent;
    use wager_chess::session::MatchId;
    use wager_chess::test_util::{ScriptedRules, sample_snapshot};

    use super::*;

    fn plain(s: &str) -> String { console::strip_ansi_codes(s).into_owned() }

    fn waiting_client(side: Side, now: Instant) -> ClientState {
        let (tx, _rx) = mpsc::channel();
        let mut client =
            ClientState::new(PlayerId::new("0xMe"), tx, Box::new(ScriptedRules::opening()));
        let snapshot = sample_snapshot();
        let assignment = MatchAssignment {
            match_id: snapshot.match_id,
            color: side,
            duration: snapshot.duration,
            position: snapshot.position,
            opponent: None,
            move_seq: 0,
        };
        client.process_server_event(ServerEvent::Created(assignment), now);
        assert_eq!(client.next_notable_event(), Some(NotableEvent::MatchStarted));
        client
    }

    #[test]
    fn board_orientation() {
        let now = Instant::now();
        let client = waiting_client(Side::White, now);
        let view = MatchView::build(&client, now).unwrap();
        let board = plain(&render_board(&view));
        let lines = board.lines().collect_vec();
        assert_eq!(lines.len(), 10);
        assert!(lines[0].starts_with("    a "));
        assert!(lines[1].starts_with(" 8 "));
        assert!(lines[8].starts_with(" 1 "));

        let client = waiting_client(Side::Black, now);
        let view = MatchView::build(&client, now).unwrap();
        let board = plain(&render_board(&view));
        let lines = board.lines().collect_vec();
        assert!(lines[0].starts_with("    h "));
        assert!(lines[1].starts_with(" 1 "));
        assert!(lines[8].starts_with(" 8 "));
    }

    #[test]
    fn waiting_match() {
        let now = Instant::now();
        let client = waiting_client(Side::White, now);
        let view = MatchView::build(&client, now).unwrap();
        let text = plain(&render_match(&view));
        assert!(text.starts_with("Match m1 · playing White\n"), "{text}");
        assert!(text.contains("Waiting..."), "{text}");
        assert!(text.contains("05:00"), "{text}");
        assert!(text.ends_with("Waiting for an opponent... 05:00"), "{text}");
    }

    #[test]
    fn lobby() {
        assert_eq!(
            render_lobby(&LobbyView::build(&[]), "0xAbCd...1234"),
            "Signed in as 0xAbCd...1234\n\nNo open matches. Use /create or /pair to start one.\n"
        );
        let view = LobbyView::build(&[MatchSummary {
            match_id: MatchId::new("g1"),
            status: "waiting".to_owned(),
            players: 1,
        }]);
        assert!(render_lobby(&view, "me").ends_with("Open matches:\n  • g1 · waiting · 1/2\n"));
    }

    #[test]
    fn clock_width_ignores_styling() {
        let showing = ClockShowing {
            is_active: true,
            time_left: std::time::Duration::from_secs(61),
            flag_pending: false,
            out_of_time: false,
        };
        let (text, len) = render_clock(&showing);
        assert_eq!(len, 5);
        assert_eq!(plain(&text), "01:01");
    }
}
