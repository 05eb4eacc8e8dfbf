use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::dao::models::{DEFAULT_TIMER_MINUTES, TimerRecord};

/// Local view of the shared room countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not started, or reset; shows the full duration.
    Idle,
    /// Counting down from an epoch start shared by every participant.
    Running {
        /// Wall-clock instant the countdown (virtually) started at.
        started_at: OffsetDateTime,
        /// Locally decremented display value, re-derived on every snapshot.
        remaining_seconds: u32,
    },
    /// Stopped with time left.
    Paused {
        /// Seconds left when the countdown was paused.
        remaining_seconds: u32,
    },
    /// Ran down to zero.
    Expired,
}

/// Coarse phase of a [`TimerState`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerPhase {
    /// See [`TimerState::Idle`].
    Idle,
    /// See [`TimerState::Running`].
    Running,
    /// See [`TimerState::Paused`].
    Paused,
    /// See [`TimerState::Expired`].
    Expired,
}

impl TimerState {
    /// Phase of this state.
    pub fn phase(&self) -> TimerPhase {
        match self {
            TimerState::Idle => TimerPhase::Idle,
            TimerState::Running { .. } => TimerPhase::Running,
            TimerState::Paused { .. } => TimerPhase::Paused,
            TimerState::Expired => TimerPhase::Expired,
        }
    }
}

/// User-issued timer commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Start from idle, or resume from paused.
    Start {
        /// Local wall-clock time of the command.
        at: OffsetDateTime,
    },
    /// Freeze the countdown.
    Pause {
        /// Local wall-clock time of the command.
        at: OffsetDateTime,
    },
    /// Return to the full duration.
    Reset,
    /// Change the countdown length.
    SetDuration(u32),
}

/// Notifications produced while the countdown advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerNotice {
    /// The countdown reached zero on this client.
    TimeUp,
}

/// Error returned when a timer command does not apply to the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timer transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Phase the timer was in when the command was received.
    pub from: TimerPhase,
    /// Command that was refused.
    pub event: TimerEvent,
}

/// Remaining seconds of a countdown started at `started_at`, as seen at `now`.
///
/// Elapsed time is floored to whole seconds and clamped at zero in both
/// directions, so clock skew that puts `started_at` in the future reads as a
/// full countdown.
pub fn derive_remaining(
    duration_minutes: u32,
    started_at: OffsetDateTime,
    now: OffsetDateTime,
) -> u32 {
    let total = i128::from(duration_minutes) * 60;
    let elapsed_ms = (now - started_at).whole_milliseconds().max(0);
    let elapsed = elapsed_ms.div_euclid(1000);
    let remaining = (total - elapsed).clamp(0, total);
    u32::try_from(remaining).unwrap_or(u32::MAX)
}

/// Render seconds as `MM:SS`, minutes unbounded.
pub fn format_remaining(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Countdown state machine shared by every participant of a room.
///
/// Commands return the [`TimerRecord`] to write back; incoming records are
/// folded in through [`TimerStateMachine::observe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerStateMachine {
    duration_minutes: u32,
    state: TimerState,
}

impl Default for TimerStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_TIMER_MINUTES)
    }
}

impl TimerStateMachine {
    /// Idle timer of the given length.
    pub fn new(duration_minutes: u32) -> Self {
        Self {
            duration_minutes,
            state: TimerState::Idle,
        }
    }

    /// Timer reflecting a shared record as seen at `now`.
    pub fn from_record(record: &TimerRecord, now: OffsetDateTime) -> Self {
        let mut machine = Self::new(record.duration_minutes);
        machine.observe(record, now);
        machine
    }

    /// Current state.
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Current phase without its payload.
    pub fn phase(&self) -> TimerPhase {
        self.state.phase()
    }

    /// Configured countdown length.
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Whether the countdown is running.
    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    fn total_seconds(&self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }

    /// Seconds currently displayed.
    pub fn remaining_seconds(&self) -> u32 {
        match self.state {
            TimerState::Idle => self.total_seconds(),
            TimerState::Running {
                remaining_seconds, ..
            }
            | TimerState::Paused { remaining_seconds } => remaining_seconds,
            TimerState::Expired => 0,
        }
    }

    /// Displayed time as `MM:SS`.
    pub fn display(&self) -> String {
        format_remaining(self.remaining_seconds())
    }

    /// Shared record describing the current state.
    pub fn record(&self) -> TimerRecord {
        let (is_running, remaining_seconds, started_at) = match self.state {
            TimerState::Idle => (false, self.total_seconds(), None),
            TimerState::Running {
                started_at,
                remaining_seconds,
            } => (true, remaining_seconds, Some(started_at)),
            TimerState::Paused { remaining_seconds } => (false, remaining_seconds, None),
            TimerState::Expired => (false, 0, None),
        };

        TimerRecord {
            is_running,
            duration_minutes: self.duration_minutes,
            remaining_seconds,
            started_at,
        }
    }

    /// Start from idle or resume from paused.
    ///
    /// On resume the start epoch is moved back by the time already consumed so
    /// every reader derives the paused remaining value.
    pub fn start(&mut self, now: OffsetDateTime) -> Result<TimerRecord, InvalidTransition> {
        self.apply(TimerEvent::Start { at: now })
    }

    /// Pause a running countdown, keeping the time derived at `now`.
    pub fn pause(&mut self, now: OffsetDateTime) -> Result<TimerRecord, InvalidTransition> {
        self.apply(TimerEvent::Pause { at: now })
    }

    /// Return to idle with the full duration. Valid from every state.
    pub fn reset(&mut self) -> TimerRecord {
        self.state = TimerState::Idle;
        self.record()
    }

    /// Change the countdown length; refused while running.
    pub fn set_duration(&mut self, minutes: u32) -> Result<TimerRecord, InvalidTransition> {
        self.apply(TimerEvent::SetDuration(minutes))
    }

    fn apply(&mut self, event: TimerEvent) -> Result<TimerRecord, InvalidTransition> {
        let (duration_minutes, next) = self.compute_transition(event)?;
        self.duration_minutes = duration_minutes;
        self.state = next;
        Ok(self.record())
    }

    fn compute_transition(
        &self,
        event: TimerEvent,
    ) -> Result<(u32, TimerState), InvalidTransition> {
        let total = self.total_seconds();
        let refused = || InvalidTransition {
            from: self.phase(),
            event,
        };

        let next = match (self.state, event) {
            (TimerState::Idle, TimerEvent::Start { at }) if total > 0 => TimerState::Running {
                started_at: at,
                remaining_seconds: total,
            },
            (TimerState::Paused { remaining_seconds }, TimerEvent::Start { at })
                if remaining_seconds > 0 =>
            {
                let consumed = total.saturating_sub(remaining_seconds);
                TimerState::Running {
                    started_at: at - Duration::seconds(i64::from(consumed)),
                    remaining_seconds: remaining_seconds.min(total),
                }
            }
            (TimerState::Running { started_at, .. }, TimerEvent::Pause { at }) => {
                let remaining_seconds = derive_remaining(self.duration_minutes, started_at, at);
                if remaining_seconds == 0 {
                    return Err(refused());
                }
                TimerState::Paused { remaining_seconds }
            }
            (_, TimerEvent::Reset) => TimerState::Idle,
            (state, TimerEvent::SetDuration(minutes))
                if minutes > 0 && !matches!(state, TimerState::Running { .. }) =>
            {
                return Ok((minutes, TimerState::Idle));
            }
            _ => return Err(refused()),
        };

        Ok((self.duration_minutes, next))
    }

    /// Decrement the local display by one second while running.
    pub fn tick(&mut self) -> Option<TimerNotice> {
        let TimerState::Running {
            started_at,
            remaining_seconds,
        } = self.state
        else {
            return None;
        };

        let remaining_seconds = remaining_seconds.saturating_sub(1);
        if remaining_seconds == 0 {
            self.state = TimerState::Expired;
            return Some(TimerNotice::TimeUp);
        }
        self.state = TimerState::Running {
            started_at,
            remaining_seconds,
        };
        None
    }

    /// Re-derive a running countdown from its start epoch.
    pub fn catch_up(&mut self, now: OffsetDateTime) -> Option<TimerNotice> {
        let TimerState::Running { started_at, .. } = self.state else {
            return None;
        };

        let remaining_seconds = derive_remaining(self.duration_minutes, started_at, now);
        if remaining_seconds == 0 {
            self.state = TimerState::Expired;
            return Some(TimerNotice::TimeUp);
        }
        self.state = TimerState::Running {
            started_at,
            remaining_seconds,
        };
        None
    }

    /// Replace local state with the shared record, deriving the running value at `now`.
    ///
    /// Returns [`TimerNotice::TimeUp`] only when a countdown this client was
    /// showing as running is found to be over.
    pub fn observe(&mut self, record: &TimerRecord, now: OffsetDateTime) -> Option<TimerNotice> {
        let was_running = self.is_running();
        self.duration_minutes = record.duration_minutes;
        let total = self.total_seconds();

        self.state = match (record.is_running, record.started_at) {
            (true, Some(started_at)) => {
                match derive_remaining(record.duration_minutes, started_at, now) {
                    0 => TimerState::Expired,
                    remaining_seconds => TimerState::Running {
                        started_at,
                        remaining_seconds,
                    },
                }
            }
            (true, None) => {
                warn!(
                    remaining_seconds = record.remaining_seconds,
                    "running timer record has no start time; treating as paused"
                );
                stopped_state(record.remaining_seconds, total)
            }
            (false, _) => stopped_state(record.remaining_seconds, total),
        };

        (was_running && self.state == TimerState::Expired).then_some(TimerNotice::TimeUp)
    }
}

fn stopped_state(remaining_seconds: u32, total: u32) -> TimerState {
    if remaining_seconds == 0 || remaining_seconds >= total {
        TimerState::Idle
    } else {
        TimerState::Paused { remaining_seconds }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const T0: OffsetDateTime = datetime!(2025-03-01 10:00:00 UTC);

    fn running_record(started_at: OffsetDateTime) -> TimerRecord {
        TimerRecord {
            is_running: true,
            duration_minutes: 25,
            remaining_seconds: 1500,
            started_at: Some(started_at),
        }
    }

    #[test]
    fn derives_remaining_from_epoch() {
        assert_eq!(derive_remaining(25, T0, T0 + Duration::seconds(10)), 1490);
        assert_eq!(derive_remaining(25, T0, T0 + Duration::seconds(1600)), 0);
    }

    #[test]
    fn partial_seconds_are_floored() {
        let now = T0 + Duration::milliseconds(10_999);
        assert_eq!(derive_remaining(25, T0, now), 1490);
    }

    #[test]
    fn future_start_reads_as_full_duration() {
        assert_eq!(derive_remaining(25, T0 + Duration::seconds(30), T0), 1500);
    }

    #[test]
    fn observing_expired_record_moves_to_expired() {
        let mut timer = TimerStateMachine::default();
        timer.observe(&running_record(T0), T0 + Duration::seconds(10));
        assert_eq!(timer.remaining_seconds(), 1490);

        let notice = timer.observe(&running_record(T0), T0 + Duration::seconds(1600));
        assert_eq!(timer.state(), TimerState::Expired);
        assert_eq!(notice, Some(TimerNotice::TimeUp));
    }

    #[test]
    fn late_joiner_shows_derived_time() {
        let timer =
            TimerStateMachine::from_record(&running_record(T0), T0 + Duration::seconds(5));
        assert_eq!(timer.display(), "24:55");
        assert_eq!(timer.phase(), TimerPhase::Running);
    }

    #[test]
    fn joining_an_expired_room_raises_no_notice() {
        let mut timer = TimerStateMachine::default();
        let notice = timer.observe(&running_record(T0), T0 + Duration::hours(1));
        assert_eq!(timer.phase(), TimerPhase::Expired);
        assert_eq!(notice, None);
    }

    #[test]
    fn start_writes_running_record() {
        let mut timer = TimerStateMachine::default();
        let record = timer.start(T0).unwrap();
        assert!(record.is_running);
        assert_eq!(record.started_at, Some(T0));
        assert_eq!(record.remaining_seconds, 1500);
    }

    #[test]
    fn pause_then_resume_keeps_remaining_time() {
        let mut timer = TimerStateMachine::default();
        timer.start(T0).unwrap();

        let paused = timer.pause(T0 + Duration::seconds(100)).unwrap();
        assert!(!paused.is_running);
        assert_eq!(paused.remaining_seconds, 1400);

        let resume_at = T0 + Duration::minutes(10);
        let resumed = timer.start(resume_at).unwrap();
        let started_at = resumed.started_at.unwrap();
        assert_eq!(started_at, resume_at - Duration::seconds(100));
        assert_eq!(derive_remaining(25, started_at, resume_at), 1400);
    }

    #[test]
    fn invalid_commands_are_refused() {
        let mut timer = TimerStateMachine::default();
        let err = timer.pause(T0).unwrap_err();
        assert_eq!(err.from, TimerPhase::Idle);

        timer.start(T0).unwrap();
        assert!(timer.start(T0).is_err());
        assert!(timer.set_duration(50).is_err());
        assert_eq!(timer.phase(), TimerPhase::Running);
    }

    #[test]
    fn tick_counts_down_to_expiry() {
        let mut timer = TimerStateMachine::new(1);
        timer.start(T0).unwrap();
        for _ in 0..59 {
            assert_eq!(timer.tick(), None);
        }
        assert_eq!(timer.remaining_seconds(), 1);
        assert_eq!(timer.tick(), Some(TimerNotice::TimeUp));
        assert_eq!(timer.phase(), TimerPhase::Expired);
        assert_eq!(timer.tick(), None);
    }

    #[test]
    fn expired_timer_needs_reset_before_start() {
        let mut timer = TimerStateMachine::new(1);
        timer.start(T0).unwrap();
        timer.catch_up(T0 + Duration::minutes(2));
        assert!(timer.start(T0 + Duration::minutes(2)).is_err());

        let record = timer.reset();
        assert_eq!(record.remaining_seconds, 60);
        assert!(timer.start(T0 + Duration::minutes(3)).is_ok());
    }

    #[test]
    fn set_duration_returns_to_idle() {
        let mut timer = TimerStateMachine::default();
        timer.start(T0).unwrap();
        timer.pause(T0 + Duration::seconds(30)).unwrap();

        let record = timer.set_duration(50).unwrap();
        assert_eq!(record.duration_minutes, 50);
        assert_eq!(record.remaining_seconds, 3000);
        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert!(timer.set_duration(0).is_err());
    }

    #[test]
    fn stopped_records_map_to_idle_or_paused() {
        let mut timer = TimerStateMachine::default();
        timer.observe(&TimerRecord::default(), T0);
        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert_eq!(timer.remaining_seconds(), 1500);

        let paused = TimerRecord {
            remaining_seconds: 600,
            ..TimerRecord::default()
        };
        timer.observe(&paused, T0);
        assert_eq!(timer.state(), TimerState::Paused { remaining_seconds: 600 });
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_remaining(1495), "24:55");
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(6000), "100:00");
    }
}
