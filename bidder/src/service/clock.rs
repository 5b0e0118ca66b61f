use chrono::{DateTime, Utc};
use model::domain::countdown::{CountdownState, Phase};
use tracing::trace;

/// A one-shot notification raised by the clock at a precise transition
/// point. Whether it becomes audible is the presentation layer's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockCue {
    /// The countdown crossed into its final seconds; carries 3, 2 or 1.
    Threshold(u8),
    /// The countdown ran out while the auction was live.
    Ended,
}

#[derive(Debug)]
pub struct ClockStep {
    pub countdown: CountdownState,
    pub cues:      Vec<ClockCue>,
}

/// Derives the countdown from the two server timestamps and the wall
/// clock. The clock holds no timer of its own: the owner steps it once
/// per second with an explicit `now`, which also makes it trivially
/// testable.
///
/// Each cue fires at most once per countdown run; re-seeding (a snipe
/// extension moved the end time) re-arms all of them.
#[derive(Debug)]
pub struct AuctionClock {
    start: Option<DateTime<Utc>>,
    end:   Option<DateTime<Utc>>,
    ended_armed: bool,
    thresholds_armed: [bool; 3],
}

impl AuctionClock {
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        Self { start, end, ended_armed: true, thresholds_armed: [true; 3] }
    }

    pub fn end(&self) -> Option<DateTime<Utc>> { self.end }

    /// Replace the countdown targets and re-arm every one-shot cue.
    pub fn reseed(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) {
        trace!("Re-seeding the clock, new end time: {:?}", end);
        self.start = start;
        self.end = end;
        self.ended_armed = true;
        self.thresholds_armed = [true; 3];
    }

    /// One evaluation step. Pure in `now`: the caller decides the cadence.
    pub fn tick(&mut self, now: DateTime<Utc>) -> ClockStep {
        let countdown =
            CountdownState::evaluate(now, self.start, self.end);
        let mut cues = Vec::new();

        match countdown.phase {
            Phase::Active => {
                let remaining = countdown.total_seconds;
                if (1..=3).contains(&remaining) {
                    let slot = (remaining - 1) as usize;
                    if self.thresholds_armed[slot] {
                        self.thresholds_armed[slot] = false;
                        cues.push(ClockCue::Threshold(remaining as u8));
                    }
                }
            }
            Phase::Ended => {
                if self.ended_armed {
                    self.ended_armed = false;
                    cues.push(ClockCue::Ended);
                }
            }
            Phase::Upcoming => {}
        }

        ClockStep { countdown, cues }
    }
}
