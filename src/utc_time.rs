use serde::{Deserialize, Serialize};
use time::macros::offset;
use time::{OffsetDateTime, PrimitiveDateTime};


// Wall-clock time. Only used for things the user reads (chat timestamps) and for the advisory
// `clientTime` field on outgoing moves. Game clocks use monotonic `instant::Instant` instead.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtcDateTime(PrimitiveDateTime);

impl UtcDateTime {
    pub fn now() -> Self { Self::from(OffsetDateTime::now_utc()) }

    pub fn from_unix_millis(ms: i64) -> Option<Self> {
        OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000).ok().map(Self::from)
    }
    pub fn unix_millis(self) -> i64 {
        (OffsetDateTime::from(self).unix_timestamp_nanos() / 1_000_000) as i64
    }

    pub fn to_hh_mm(self) -> String { format!("{:02}:{:02}", self.0.hour(), self.0.minute()) }
}

impl From<OffsetDateTime> for UtcDateTime {
    fn from(odt: OffsetDateTime) -> Self {
        let utc = odt.to_offset(offset!(UTC));
        Self(PrimitiveDateTime::new(utc.date(), utc.time()))
    }
}

impl From<UtcDateTime> for OffsetDateTime {
    fn from(udt: UtcDateTime) -> Self { udt.0.assume_utc() }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_millis() {
        let t = UtcDateTime::from_unix_millis(1_700_000_123_456).unwrap();
        assert_eq!(t.unix_millis(), 1_700_000_123_456);
        // 2023-11-14 22:15:23 UTC
        assert_eq!(t.to_hh_mm(), "22:15");
    }
}
