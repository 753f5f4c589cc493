use std::fmt;
use std::time::Duration;

use enum_map::{EnumMap, enum_map};
use instant::Instant;

use crate::side::Side;


const MILLIS_PER_SEC: u128 = 1000;

pub fn duration_to_mmss(d: Duration) -> String {
    let mut ret = String::new();
    // Writing to a `String` never fails.
    let _ = format_duration_to_mmss(d, &mut ret);
    ret
}

// Seconds are rounded up, so that a side which hasn't run out of time never shows "00:00".
fn format_duration_to_mmss(d: Duration, f: &mut impl fmt::Write) -> fmt::Result {
    let s = d.as_millis().div_ceil(MILLIS_PER_SEC);
    let minutes = s / 60;
    let seconds = s % 60;
    write!(f, "{minutes:02}:{seconds:02}")
}


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ClockReading {
    pub white_remaining: Duration,
    pub black_remaining: Duration,
}

impl ClockReading {
    pub fn get(&self, side: Side) -> Duration {
        match side {
            Side::White => self.white_remaining,
            Side::Black => self.black_remaining,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ClockShowing {
    pub is_active: bool,
    pub time_left: Duration,
    // Active side has no time left, but the server hasn't said the game is over. Could mean a
    // clock skew between us and the server, so this is shown differently from `out_of_time`.
    pub flag_pending: bool,
    pub out_of_time: bool,
}

impl ClockShowing {
    pub fn ui_string(&self) -> String { duration_to_mmss(self.time_left) }
}


// Per-side time budget for one match. The time of the side to move runs from the moment its turn
// started; the other side's time is frozen. Remaining time is never negative.
//
// Improvement potential. Support increments. The server is the source of truth for them anyway,
//   so we would need them in the snapshot first.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MatchClock {
    duration: Duration,
    turn_state: Option<(Side, Instant)>, // side, turn start
    banked: EnumMap<Side, Duration>,     // remaining time as of the turn start
    projected: EnumMap<Side, Duration>,  // as of the latest `project` call
}

impl MatchClock {
    pub fn new(duration: Duration) -> Self {
        MatchClock {
            duration,
            turn_state: None,
            banked: enum_map! { _ => duration },
            projected: enum_map! { _ => duration },
        }
    }

    pub fn duration(&self) -> Duration { self.duration }
    pub fn is_running(&self) -> bool { self.turn_state.is_some() }
    pub fn active_side(&self) -> Option<Side> { self.turn_state.map(|(side, _)| side) }

    pub fn time_left(&self, side: Side, now: Instant) -> Duration {
        let mut ret = self.banked[side];
        if let Some((active_side, turn_start)) = self.turn_state {
            if side == active_side {
                ret = ret.saturating_sub(now.saturating_duration_since(turn_start));
            }
        }
        ret
    }

    // Starts the clock for `side`, banking the time used by the side that was running before.
    pub fn switch_to(&mut self, side: Side, now: Instant) {
        if let Some((prev_side, _)) = self.turn_state {
            self.banked[prev_side] = self.time_left(prev_side, now);
        }
        self.turn_state = Some((side, now));
        self.project(now);
    }

    pub fn stop(&mut self, now: Instant) {
        if let Some((prev_side, _)) = self.turn_state {
            self.banked[prev_side] = self.time_left(prev_side, now);
        }
        self.turn_state = None;
        self.project(now);
    }

    // Refreshes the cached reading. Doesn't change which side is running, so calling it any
    // number of times with the same `now` is a no-op.
    pub fn project(&mut self, now: Instant) -> ClockReading {
        for (side, projected) in self.projected.iter_mut() {
            *projected = self.banked[side];
            if let Some((active_side, turn_start)) = self.turn_state {
                if side == active_side {
                    *projected = projected.saturating_sub(now.saturating_duration_since(turn_start));
                }
            }
        }
        self.remaining()
    }

    pub fn remaining(&self) -> ClockReading {
        ClockReading {
            white_remaining: self.projected[Side::White],
            black_remaining: self.projected[Side::Black],
        }
    }

    pub fn showing_for(&self, side: Side, now: Instant) -> ClockShowing {
        let is_active = self.active_side() == Some(side);
        let time_left = self.time_left(side, now);
        ClockShowing {
            is_active,
            time_left,
            flag_pending: is_active && time_left.is_zero(),
            out_of_time: !is_active && time_left.is_zero(),
        }
    }
}
