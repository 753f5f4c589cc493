// Improvement potential. Support "wss://". The socket is cloned for the writer thread, which only
//   works for a plain TCP stream.

use std::fmt;
use std::io;
use std::net::TcpStream;
use std::thread;

use anyhow::Context;
use log::{info, warn};
use serde::Serialize;
use tungstenite::protocol::Role;
use tungstenite::{Message, WebSocket};
use url::Url;

use wager_chess::error::EventError;
use wager_chess::event::ServerEvent;
use wager_chess::network::{decode_server_event, encode_obj};

use crate::config::ReconnectPolicy;


#[derive(Debug)]
pub enum CommunicationError {
    Socket(tungstenite::Error),
    Serde(serde_json::Error),
    // The frame was delivered fine, but we cannot make sense of it. The connection is still usable.
    Protocol(String),
    Event(EventError),
}

impl fmt::Display for CommunicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommunicationError::Socket(err) => write!(f, "socket error: {err}"),
            CommunicationError::Serde(err) => write!(f, "serialization error: {err}"),
            CommunicationError::Protocol(message) => write!(f, "protocol error: {message}"),
            CommunicationError::Event(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for CommunicationError {}

impl CommunicationError {
    pub fn is_fatal(&self) -> bool { matches!(self, CommunicationError::Socket(_)) }
}

pub fn write_obj<T, S>(socket: &mut WebSocket<S>, obj: &T) -> Result<(), CommunicationError>
where
    T: Serialize,
    S: io::Read + io::Write,
{
    let serialized = encode_obj(obj).map_err(CommunicationError::Serde)?;
    socket.send(Message::text(serialized)).map_err(CommunicationError::Socket)
}

// Returns `None` for control frames.
pub fn read_server_event<S>(
    socket: &mut WebSocket<S>,
) -> Result<Option<ServerEvent>, CommunicationError>
where
    S: io::Read + io::Write,
{
    let msg = socket.read().map_err(CommunicationError::Socket)?;
    match msg {
        Message::Text(text) => {
            decode_server_event(text.as_str()).map(Some).map_err(CommunicationError::Event)
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(None),
        // The next read reports the connection as closed.
        Message::Close(_) => Ok(None),
        Message::Binary(_) => {
            Err(CommunicationError::Protocol("expected text, got binary message".to_owned()))
        }
    }
}

pub fn parse_server_url(s: &str) -> anyhow::Result<Url> {
    let url = Url::parse(s).with_context(|| format!("Invalid server URL '{s}'."))?;
    anyhow::ensure!(url.scheme() == "ws", "Unsupported URL scheme in '{s}': expected ws://");
    anyhow::ensure!(url.host_str().is_some(), "No host in server URL '{s}'.");
    Ok(url)
}

pub fn connect(url: &Url) -> anyhow::Result<WebSocket<TcpStream>> {
    let addrs = url
        .socket_addrs(|| Some(80))
        .with_context(|| format!("Cannot resolve '{url}'."))?;
    let stream =
        TcpStream::connect(&addrs[..]).with_context(|| format!("Cannot connect to '{url}'."))?;
    // Improvement potential: Test if nodelay helps.
    let (socket, _) = tungstenite::client(url.as_str(), stream)
        .map_err(|err| anyhow::anyhow!("Websocket handshake with '{url}' failed: {err}"))?;
    Ok(socket)
}

// Blocks the calling thread for the backoff delays.
pub fn reconnect(
    url: &Url, policy: &ReconnectPolicy, mut on_attempt: impl FnMut(u32),
) -> anyhow::Result<WebSocket<TcpStream>> {
    let mut last_error = None;
    for attempt in 0..policy.attempts {
        thread::sleep(policy.delay_before(attempt));
        on_attempt(attempt + 1);
        match connect(url) {
            Ok(socket) => {
                info!("Reconnected to {url} on attempt {}", attempt + 1);
                return Ok(socket);
            }
            Err(err) => {
                warn!("Reconnection attempt {} failed: {err:#}", attempt + 1);
                last_error = Some(err);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| anyhow::anyhow!("reconnection is disabled"))
        .context(format!("Gave up reconnecting after {} attempts.", policy.attempts)))
}

pub fn clone_websocket(
    socket: &WebSocket<TcpStream>, role: Role,
) -> io::Result<WebSocket<TcpStream>> {
    let stream = socket.get_ref().try_clone()?;
    let config = *socket.get_config();
    Ok(WebSocket::from_raw_socket(stream, role, Some(config)))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_url() {
        assert_eq!(parse_server_url("ws://localhost:8080").unwrap().port(), Some(8080));
        assert!(parse_server_url("wss://chess.example").is_err());
        assert!(parse_server_url("http://chess.example").is_err());
        assert!(parse_server_url("localhost:8080").is_err());
    }

    #[test]
    fn only_socket_errors_are_fatal() {
        assert!(CommunicationError::Socket(tungstenite::Error::ConnectionClosed).is_fatal());
        assert!(!CommunicationError::Protocol("binary".to_owned()).is_fatal());
        assert!(!CommunicationError::Event(EventError::Malformed("{".to_owned())).is_fatal());
    }
}
