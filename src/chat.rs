use std::collections::VecDeque;

use crate::identity::{PlayerId, shorten_address};
use crate::utc_time::UtcDateTime;


pub const MAX_CHAT_MESSAGES: usize = 1000;
pub const MAX_CHAT_MESSAGE_LENGTH: usize = 500;

// Sender name the server uses for its own announcements.
pub const SERVER_SENDER: &str = "Server";

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ChatParty {
    Myself,
    Opponent(String), // display label
    Server,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChatLine {
    pub sender: ChatParty,
    pub text: String,
    pub time: UtcDateTime,
}

impl ChatParty {
    // Anyone who is neither us nor the server is shown as the opponent: there are only two
    // players in a match.
    pub fn classify(sender: &str, me: &PlayerId, opponent: Option<&PlayerId>) -> Self {
        if sender == me.as_str() {
            ChatParty::Myself
        } else if sender == SERVER_SENDER {
            ChatParty::Server
        } else {
            let label = match opponent {
                Some(opponent) => opponent.short(),
                None => shorten_address(sender),
            };
            ChatParty::Opponent(label)
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ChatParty::Myself => "You",
            ChatParty::Opponent(label) => label,
            ChatParty::Server => SERVER_SENDER,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ChatHistory {
    lines: VecDeque<ChatLine>,
}

impl ChatHistory {
    pub fn new() -> Self { Self::default() }

    pub fn lines(&self) -> impl ExactSizeIterator<Item = &ChatLine> { self.lines.iter() }
    pub fn len(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    pub fn add(&mut self, line: ChatLine) {
        self.lines.push_back(line);
        while self.lines.len() > MAX_CHAT_MESSAGES {
            self.lines.pop_front();
        }
    }

    pub fn clear(&mut self) { self.lines.clear(); }
}

// Trims the text and cuts it to the length limit. Returns `None` if nothing is left to send.
pub fn prepare_outgoing_text(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(MAX_CHAT_MESSAGE_LENGTH).collect())
}
