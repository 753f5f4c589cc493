#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod chat;
pub mod client;
pub mod clock;
pub mod coord;
pub mod error;
pub mod event;
pub mod identity;
pub mod network;
pub mod piece;
pub mod position;
pub mod reconcile;
pub mod rules_engine;
pub mod session;
pub mod side;
pub mod test_util;
pub mod utc_time;
pub mod util;
pub mod view;
