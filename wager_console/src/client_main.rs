use std::fmt;
use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

use crossterm::style::{self, Stylize};
use crossterm::{cursor, event as term_event, execute, terminal};
use instant::Instant;
use log::{info, warn};
use rand::Rng;
use scopeguard::defer;
use tungstenite::WebSocket;
use tungstenite::protocol::Role;
use url::Url;

use wager_chess::client::ClientState;
use wager_chess::coord::Square;
use wager_chess::error::{ClientFault, CommandError};
use wager_chess::event::{ClientEvent, ServerEvent, Wager};
use wager_chess::identity::PlayerId;
use wager_chess::reconcile::NotableEvent;
use wager_chess::rules_engine::MoveRequest;
use wager_chess::session::MatchId;
use wager_chess::side::SideChoice;
use wager_chess::view::{LobbyView, MatchView, WAITING_ROOM_TIMEOUT, waiting_room_expired};

use crate::config::ReconnectPolicy;
use crate::network::{self, CommunicationError};
use crate::rules_engine::ChessCrateRules;
use crate::tui;


const CHAT_LINES_SHOWN: usize = 8;
const TRANSACTION_ID_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub struct PlayConfig {
    pub server_url: Url,
    pub me: PlayerId,
    pub match_id: Option<MatchId>,
    pub tick_interval: Duration,
    pub reconnect: ReconnectPolicy,
    pub match_duration: Duration,
    pub category: String,
}

enum IncomingEvent {
    Network(ServerEvent),
    Disconnected(String),
    Terminal(term_event::Event),
    Tick,
}

type SharedSocket = Arc<Mutex<Option<WebSocket<TcpStream>>>>;

#[derive(Clone, PartialEq, Debug)]
enum UserCommand {
    Create { side: SideChoice, minutes: Option<u64>, wager: Option<f64> },
    Pair(SideChoice),
    List,
    Join(MatchId),
    State(Option<MatchId>),
    Resign,
    OfferDraw,
    ClaimCheckmate,
    Chat(String),
    Leave,
    Help,
    Quit,
    Move(MoveRequest),
    Select(Square),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum MessageKind {
    Info,
    Error,
}

// Front-end only state: what the user is typing and the last notification.
struct Ui {
    keyboard_input: String,
    message: Option<(MessageKind, String)>,
    show_help: bool,
}

impl Ui {
    fn info(&mut self, text: impl Into<String>) {
        self.message = Some((MessageKind::Info, text.into()));
    }
    fn error(&mut self, text: impl Into<String>) {
        self.message = Some((MessageKind::Error, text.into()));
    }
}

fn parse_side(arg: Option<&str>) -> Result<SideChoice, String> {
    arg.map_or(Ok(SideChoice::Random), SideChoice::from_user_input)
}

fn parse_command(input: &str) -> Result<UserCommand, String> {
    let input = input.trim();
    if let Some(cmd) = input.strip_prefix('/') {
        let (name, rest) = cmd.split_once(' ').unwrap_or((cmd, ""));
        let rest = rest.trim();
        let mut args = rest.split_whitespace();
        let command = match name {
            "create" => {
                let side = parse_side(args.next())?;
                let minutes = args
                    .next()
                    .map(|s| s.parse::<u64>().map_err(|_| format!("Invalid duration: '{s}'")))
                    .transpose()?;
                if minutes == Some(0) {
                    return Err("Duration must be positive".to_owned());
                }
                let wager = args
                    .next()
                    .map(|s| match s.parse::<f64>() {
                        Ok(amount) if amount > 0.0 && amount.is_finite() => Ok(amount),
                        _ => Err(format!("Invalid wager: '{s}'")),
                    })
                    .transpose()?;
                UserCommand::Create { side, minutes, wager }
            }
            "pair" => UserCommand::Pair(parse_side(args.next())?),
            "list" => UserCommand::List,
            "join" => match args.next() {
                Some(id) => UserCommand::Join(MatchId::new(id)),
                None => return Err("Usage: /join <match id>".to_owned()),
            },
            "state" => UserCommand::State(args.next().map(MatchId::new)),
            "resign" => UserCommand::Resign,
            "draw" => UserCommand::OfferDraw,
            "checkmate" => UserCommand::ClaimCheckmate,
            "chat" => UserCommand::Chat(rest.to_owned()),
            "leave" => UserCommand::Leave,
            "help" => UserCommand::Help,
            "quit" => UserCommand::Quit,
            _ => return Err(format!("Unknown command: '{name}'")),
        };
        Ok(command)
    } else if let Some(request) = MoveRequest::from_coordinate_notation(input) {
        Ok(UserCommand::Move(request))
    } else if let Some(square) = Square::from_algebraic(input) {
        Ok(UserCommand::Select(square))
    } else {
        Err(format!("Cannot parse '{input}'. Type /help for the list of commands."))
    }
}

fn simulated_transaction_id(rng: &mut impl Rng) -> String {
    let suffix: String = (0..10)
        .map(|_| TRANSACTION_ID_CHARS[rng.random_range(0..TRANSACTION_ID_CHARS.len())] as char)
        .collect();
    format!("simulated_tx_{suffix}")
}

fn writeln_raw(stdout: &mut io::Stdout, v: impl fmt::Display) -> io::Result<()> {
    let s = v.to_string();
    // Note. Not using `lines()` because it removes trailing new line.
    for line in s.split('\n') {
        execute!(
            stdout,
            style::Print(line),
            terminal::Clear(terminal::ClearType::UntilNewLine),
            cursor::MoveToNextLine(1),
            cursor::Hide
        )?;
    }
    Ok(())
}

fn render(
    stdout: &mut io::Stdout, app_start_time: Instant, client_state: &ClientState, ui: &Ui,
) -> io::Result<()> {
    let now = Instant::now();
    execute!(stdout, cursor::MoveTo(0, 0))?;
    let mut highlight_input = false;
    if let Some(view) = MatchView::build(client_state, now) {
        writeln_raw(stdout, format!("{}\n", tui::render_match(&view)))?;
        highlight_input = client_state.session().is_some_and(|s| s.can_move_locally());
        let chat = tui::render_chat(client_state.chat(), CHAT_LINES_SHOWN);
        if !chat.is_empty() {
            writeln_raw(stdout, format!("{chat}\n"))?;
        }
    } else {
        let lobby = LobbyView::build(client_state.lobby());
        writeln_raw(stdout, tui::render_lobby(&lobby, &client_state.me().short()))?;
    }
    if ui.show_help {
        writeln_raw(stdout, format!("{}\n", tui::HELP))?;
    }

    // Simulate cursor: real cursor blinking is broken with Show/Hide.
    let show_cursor = now.duration_since(app_start_time).as_millis() % 1000 >= 500;
    let cursor = if show_cursor { '▂' } else { ' ' };
    let input_with_cursor = format!("{}{}", ui.keyboard_input, cursor);
    let input_style = if highlight_input { style::Color::White } else { style::Color::DarkGrey };
    writeln_raw(stdout, format!("{}\n", input_with_cursor.with(input_style)))?;

    if let Some((kind, text)) = &ui.message {
        let color = match kind {
            MessageKind::Info => style::Color::Cyan,
            MessageKind::Error => style::Color::Red,
        };
        writeln_raw(stdout, text.clone().with(color))?;
    }
    execute!(stdout, terminal::Clear(terminal::ClearType::FromCursorDown))?;
    Ok(())
}

fn spawn_reader(mut socket: WebSocket<TcpStream>, tx: mpsc::Sender<IncomingEvent>) {
    thread::spawn(move || {
        loop {
            let event = match network::read_server_event(&mut socket) {
                Ok(Some(event)) => IncomingEvent::Network(event),
                Ok(None) => continue,
                Err(err) if !err.is_fatal() => {
                    warn!("Ignoring inbound message: {err}");
                    continue;
                }
                Err(err) => {
                    // The main loop may be gone already; there is nobody else to tell.
                    let _ = tx.send(IncomingEvent::Disconnected(err.to_string()));
                    return;
                }
            };
            if tx.send(event).is_err() {
                return;
            }
        }
    });
}

// Events sent while the connection is down are dropped. They are never retried: the client
// asks for a fresh snapshot after reconnecting instead.
fn spawn_writer(server_rx: mpsc::Receiver<ClientEvent>, socket: SharedSocket) {
    thread::spawn(move || {
        for event in server_rx {
            let mut guard = socket.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(socket_out) = guard.as_mut() else {
                warn!("Not connected, dropping {event:?}");
                continue;
            };
            if let Err(err) = network::write_obj(socket_out, &event) {
                warn!("Failed to send {event:?}: {err}");
                if let CommunicationError::Socket(_) = err {
                    // Wakes up the reader, which reports the disconnection.
                    let _ = socket_out.get_mut().shutdown(Shutdown::Both);
                    *guard = None;
                }
            }
        }
    });
}

fn install_socket(
    socket_in: WebSocket<TcpStream>, socket_out: &SharedSocket, tx: &mpsc::Sender<IncomingEvent>,
) -> io::Result<()> {
    let out = network::clone_websocket(&socket_in, Role::Client)?;
    *socket_out.lock().unwrap_or_else(PoisonError::into_inner) = Some(out);
    spawn_reader(socket_in, tx.clone());
    Ok(())
}

// Returns `false` when the user wants to quit.
fn execute_command(
    command: UserCommand, client_state: &mut ClientState, ui: &mut Ui, config: &PlayConfig,
) -> Result<bool, CommandError> {
    match command {
        UserCommand::Create { side, minutes, wager } => {
            let duration = minutes.map_or(config.match_duration, |m| Duration::from_secs(m.saturating_mul(60)));
            let wager = wager.map(|amount| Wager {
                amount,
                transaction_id: simulated_transaction_id(&mut rand::rng()),
            });
            client_state.create_match(side, duration, config.category.clone(), wager)?;
            ui.info("Creating a match...");
        }
        UserCommand::Pair(side) => {
            client_state.pair(side)?;
            ui.info("Searching for an opponent...");
        }
        UserCommand::List => client_state.list_matches()?,
        UserCommand::Join(match_id) => client_state.join(match_id)?,
        UserCommand::State(match_id) => {
            let match_id = match_id
                .or_else(|| client_state.tracked_match().cloned())
                .ok_or(CommandError::NoMatch)?;
            client_state.request_state(match_id)?;
        }
        UserCommand::Resign => client_state.resign()?,
        UserCommand::OfferDraw => {
            client_state.offer_draw()?;
            ui.info("Draw offered");
        }
        UserCommand::ClaimCheckmate => client_state.claim_checkmate()?,
        UserCommand::Chat(text) => client_state.send_chat(&text)?,
        UserCommand::Leave => {
            client_state.abandon();
            client_state.list_matches()?;
        }
        UserCommand::Help => ui.show_help = !ui.show_help,
        UserCommand::Quit => return Ok(false),
        UserCommand::Move(request) => client_state.confirm_move(request.from, request.to)?,
        UserCommand::Select(square) => client_state.select_square(square)?,
    }
    Ok(true)
}

fn process_notable_events(client_state: &mut ClientState, ui: &mut Ui) {
    while let Some(event) = client_state.next_notable_event() {
        match event {
            NotableEvent::MatchStarted => ui.message = None,
            NotableEvent::OpponentJoined => ui.info("Opponent joined. Good luck!"),
            NotableEvent::OpponentMoved | NotableEvent::MyMoveConfirmed => {}
            NotableEvent::MatchEnded { .. } => {
                // The banner says it all.
                ui.message = None;
            }
            NotableEvent::TimeoutCandidate(side) => {
                ui.info(format!("{side} is out of time. Waiting for the server to confirm..."));
            }
            NotableEvent::Chat(_) | NotableEvent::MatchListUpdated => {}
            NotableEvent::Info(message) => ui.info(message),
            NotableEvent::Fault(fault @ ClientFault::ServerError(_)) => ui.error(fault.to_string()),
            NotableEvent::Fault(fault @ ClientFault::TransportFault(_)) => {
                ui.error(format!("{fault}. Reconnecting..."))
            }
        }
    }
}

pub fn run(config: PlayConfig) -> anyhow::Result<()> {
    println!("Connecting to {}...", config.server_url);
    let socket_in = network::connect(&config.server_url)?;
    info!("Connected to {} as {}", config.server_url, config.me.as_str());

    let mut stdout = io::stdout();
    terminal::enable_raw_mode()?;
    execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;
    defer! {
        let _ = execute!(io::stdout(), terminal::LeaveAlternateScreen, cursor::Show);
        let _ = terminal::disable_raw_mode();
    };
    let app_start_time = Instant::now();

    let (tx, rx) = mpsc::channel();
    let socket_out: SharedSocket = Arc::new(Mutex::new(None));
    install_socket(socket_in, &socket_out, &tx)?;
    let tx_local = tx.clone();
    thread::spawn(move || {
        while let Ok(ev) = term_event::read() {
            if tx_local.send(IncomingEvent::Terminal(ev)).is_err() {
                return;
            }
        }
    });
    let tx_tick = tx.clone();
    let tick_interval = config.tick_interval;
    thread::spawn(move || {
        loop {
            thread::sleep(tick_interval);
            if tx_tick.send(IncomingEvent::Tick).is_err() {
                return;
            }
        }
    });

    let (server_tx, server_rx) = mpsc::channel();
    spawn_writer(server_rx, Arc::clone(&socket_out));

    let mut client_state =
        ClientState::new(config.me.clone(), server_tx, Box::new(ChessCrateRules));
    let mut ui = Ui { keyboard_input: String::new(), message: None, show_help: false };
    match &config.match_id {
        Some(match_id) => client_state.request_state(match_id.clone())?,
        None => client_state.list_matches()?,
    }
    render(&mut stdout, app_start_time, &client_state, &ui)?;

    for event in rx {
        let now = Instant::now();
        match event {
            IncomingEvent::Network(event) => {
                client_state.process_server_event(event, now);
            }
            IncomingEvent::Disconnected(reason) => {
                warn!("Connection lost: {reason}");
                client_state.transport_fault(reason);
                process_notable_events(&mut client_state, &mut ui);
                render(&mut stdout, app_start_time, &client_state, &ui)?;
                let socket_in = network::reconnect(&config.server_url, &config.reconnect, |n| {
                    let attempts = config.reconnect.attempts;
                    ui.info(format!("Reconnecting (attempt {n} of {attempts})..."));
                    // Best effort: the loop is blocked, so this is the only repaint until we are back.
                    let _ = render(&mut stdout, app_start_time, &client_state, &ui);
                })?;
                install_socket(socket_in, &socket_out, &tx)?;
                ui.info("Reconnected");
                if let Some(match_id) = client_state.tracked_match().cloned() {
                    client_state.request_state(match_id)?;
                }
            }
            IncomingEvent::Terminal(event) => {
                if let term_event::Event::Key(event) = event {
                    if event.kind != term_event::KeyEventKind::Press {
                        continue;
                    }
                    match event.code {
                        term_event::KeyCode::Char(ch) => {
                            ui.keyboard_input.push(ch);
                        }
                        term_event::KeyCode::Backspace => {
                            ui.keyboard_input.pop();
                        }
                        term_event::KeyCode::Esc => {
                            ui.keyboard_input.clear();
                        }
                        term_event::KeyCode::Enter => {
                            let input = std::mem::take(&mut ui.keyboard_input);
                            ui.message = None;
                            match parse_command(&input) {
                                Ok(command) => match execute_command(
                                    command,
                                    &mut client_state,
                                    &mut ui,
                                    &config,
                                ) {
                                    Ok(true) => {}
                                    Ok(false) => return Ok(()),
                                    Err(err) => ui.error(err.to_string()),
                                },
                                Err(err) => ui.error(err),
                            }
                        }
                        _ => {}
                    }
                }
            }
            IncomingEvent::Tick => {
                client_state.tick(now);
                if waiting_room_expired(&client_state, now) {
                    client_state.abandon();
                    client_state.list_matches()?;
                    ui.info(format!(
                        "Nobody joined in {} minutes. Back to the lobby.",
                        WAITING_ROOM_TIMEOUT.as_secs() / 60
                    ));
                }
            }
        }
        process_notable_events(&mut client_state, &mut ui);
        render(&mut stdout, app_start_time, &client_state, &ui)?;
    }
    anyhow::bail!("Unexpected end of events stream");
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use wager_chess::test_util::deterministic_rng;

    use super::*;

    #[test]
    fn lobby_commands() {
        assert_eq!(
            parse_command("/create w 10 2.5"),
            Ok(UserCommand::Create { side: SideChoice::White, minutes: Some(10), wager: Some(2.5) })
        );
        assert_eq!(
            parse_command("/create"),
            Ok(UserCommand::Create { side: SideChoice::Random, minutes: None, wager: None })
        );
        assert_eq!(parse_command("/pair black"), Ok(UserCommand::Pair(SideChoice::Black)));
        assert_eq!(parse_command("/join m7"), Ok(UserCommand::Join(MatchId::new("m7"))));
        assert_eq!(parse_command("/state"), Ok(UserCommand::State(None)));
        assert_eq!(parse_command("  /list  "), Ok(UserCommand::List));
    }

    #[test]
    fn bad_lobby_commands() {
        assert!(parse_command("/create w 0").is_err());
        assert!(parse_command("/create w five").is_err());
        assert!(parse_command("/create w 5 -1").is_err());
        assert!(parse_command("/pair green").is_err());
        assert!(parse_command("/join").is_err());
        assert!(parse_command("/dance").is_err());
    }

    #[test]
    fn match_commands() {
        let e2e4 = MoveRequest::new(Square::E2, Square::E4);
        assert_eq!(parse_command("e2e4"), Ok(UserCommand::Move(e2e4)));
        assert_eq!(parse_command("e2"), Ok(UserCommand::Select(Square::E2)));
        assert_eq!(
            parse_command("/chat  good game "),
            Ok(UserCommand::Chat("good game".to_owned()))
        );
        assert_eq!(parse_command("/draw"), Ok(UserCommand::OfferDraw));
        assert!(parse_command("e9").is_err());
        assert!(parse_command("hello").is_err());
    }

    #[test]
    fn transaction_id() {
        let id = simulated_transaction_id(&mut deterministic_rng());
        let suffix = id.strip_prefix("simulated_tx_").unwrap();
        assert_eq!(suffix.len(), 10);
        assert!(suffix.bytes().all(|b| TRANSACTION_ID_CHARS.contains(&b)));
    }
}
