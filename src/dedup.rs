use crate::types::{SensorKind, Timestamp};

/// Per-sensor staleness filter.
///
/// The sensors tick at different rates, so a single poll usually repeats the
/// previous reading for the slower ones. A reading is only fresh when its
/// timestamp is strictly greater than the last one accepted for the same kind.
#[derive(Clone, Debug, Default)]
pub struct TimestampDeduplicator {
    last: [Option<Timestamp>; 3],
}

impl TimestampDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and records `timestamp` if it is newer than the last
    /// accepted reading of `kind`. Equal or older timestamps are dropped
    /// without touching state.
    pub fn is_new(&mut self, kind: SensorKind, timestamp: Timestamp) -> bool {
        let slot = &mut self.last[kind.index()];
        match *slot {
            Some(last) if timestamp <= last => false,
            _ => {
                *slot = Some(timestamp);
                true
            }
        }
    }

    pub fn last_accepted(&self, kind: SensorKind) -> Option<Timestamp> {
        self.last[kind.index()]
    }
}
