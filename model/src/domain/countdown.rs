use chrono::{DateTime, Utc};

const MILLIS_PER_DAY: i64 = 86_400_000;
const MILLIS_PER_HOUR: i64 = 3_600_000;
const MILLIS_PER_MINUTE: i64 = 60_000;
const MILLIS_PER_SECOND: i64 = 1_000;

/// Where the auction stands relative to the wall clock, derived purely from
/// `(now, start, end)`. The server-side `status` field may transiently
/// disagree with this; the server is authoritative for closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Upcoming,
    Active,
    Ended,
}

/// One evaluation of the countdown, recomputed every tick and never stored.
/// `total_seconds` is the source of truth; days/hours/minutes/seconds are a
/// display decomposition of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownState {
    pub phase:         Phase,
    pub days:          i64,
    pub hours:         i64,
    pub minutes:       i64,
    pub seconds:       i64,
    pub total_seconds: i64,
}

impl CountdownState {
    /// While the auction is upcoming the countdown runs towards the start,
    /// once started it runs towards the end. A missing end time degrades to
    /// an upcoming auction with a zeroed countdown instead of failing.
    pub fn evaluate(
        now: DateTime<Utc>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        let Some(end) = end else {
            return Self::zeroed(Phase::Upcoming);
        };

        let (phase, target) = match start {
            Some(start) if now < start => (Phase::Upcoming, start),
            _ if now < end => (Phase::Active, end),
            _ => (Phase::Ended, end),
        };

        let distance =
            (target - now).num_milliseconds().max(0);

        CountdownState {
            phase,
            days: distance / MILLIS_PER_DAY,
            hours: (distance % MILLIS_PER_DAY) / MILLIS_PER_HOUR,
            minutes: (distance % MILLIS_PER_HOUR) / MILLIS_PER_MINUTE,
            seconds: (distance % MILLIS_PER_MINUTE) / MILLIS_PER_SECOND,
            total_seconds: distance / MILLIS_PER_SECOND,
        }
    }

    pub fn zeroed(phase: Phase) -> Self {
        CountdownState {
            phase,
            days: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
            total_seconds: 0,
        }
    }
}
