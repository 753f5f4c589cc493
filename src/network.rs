// Text framing for the transport channel. The channel itself (websocket handshake, reconnection)
// belongs to front ends; this module only turns envelopes into text and back.

use serde::{Serialize, de};

use crate::error::EventError;
use crate::event::{ClientEvent, ServerEvent};


pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8080";

pub fn encode_obj(obj: &impl Serialize) -> Result<String, serde_json::Error> {
    serde_json::to_string(obj)
}

pub fn parse_obj<T: de::DeserializeOwned>(s: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(s)
}

pub fn encode_client_event(event: &ClientEvent) -> Result<String, serde_json::Error> {
    encode_obj(event)
}

pub fn decode_server_event(s: &str) -> Result<ServerEvent, EventError> {
    parse_obj(s).map_err(|err| EventError::Malformed(format!("{err}: {s}")))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MatchId;

    #[test]
    fn decode() {
        let event = decode_server_event(r#"{"type": "error", "message": "Game not found"}"#).unwrap();
        assert_eq!(event, ServerEvent::Error { message: "Game not found".to_owned() });

        let event = decode_server_event(r#"{"type": "stateMatch", "matchId": "m1"}"#);
        assert!(matches!(event, Err(EventError::Malformed(_))));
        assert!(decode_server_event("not json").is_err());
    }

    #[test]
    fn encode() {
        let event = ClientEvent::StateMatch { match_id: MatchId::new("m1") };
        let text = encode_client_event(&event).unwrap();
        assert_eq!(text, r#"{"type":"stateMatch","matchId":"m1"}"#);
        assert_eq!(parse_obj::<ClientEvent>(&text).unwrap(), event);
    }
}
