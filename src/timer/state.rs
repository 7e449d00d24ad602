use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TWO_MINUTE_WARNING_MS: u64 = 2 * 60 * 1000;
pub const ONE_MINUTE_WARNING_MS: u64 = 60 * 1000;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Expired,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Idle => "Idle",
            TimerStatus::Running => "Running",
            TimerStatus::Paused => "Paused",
            TimerStatus::Expired => "Expired",
        }
    }
}

/// Durable countdown record. Survives process death and reboots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub remaining_ms: u64,
    pub last_updated_at: DateTime<Utc>,
    /// True while the countdown is logically running. Also set on the
    /// zero-remaining record written at expiry.
    pub is_active: bool,
}

impl TimerState {
    pub fn running(remaining_ms: u64, at: DateTime<Utc>) -> Self {
        Self {
            remaining_ms,
            last_updated_at: at,
            is_active: true,
        }
    }

    pub fn paused(remaining_ms: u64, at: DateTime<Utc>) -> Self {
        Self {
            remaining_ms,
            last_updated_at: at,
            is_active: false,
        }
    }

    pub fn expired(at: DateTime<Utc>) -> Self {
        Self::running(0, at)
    }

    /// Remaining time as of `now`.
    ///
    /// A paused record does not erode. An active one loses the wall-clock time
    /// since it was written, floored at zero; a clock that moved backwards
    /// counts as no time passing.
    pub fn adjusted_remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        if !self.is_active {
            return self.remaining_ms;
        }
        let elapsed = (now - self.last_updated_at).num_milliseconds().max(0) as u64;
        self.remaining_ms.saturating_sub(elapsed)
    }

    /// The record written when the countdown hit zero in front of us, as
    /// opposed to one that ran out while nobody was watching.
    pub fn is_expiry_marker(&self) -> bool {
        self.is_active && self.remaining_ms == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Warning {
    TwoMinutes,
    OneMinute,
}

impl Warning {
    pub fn message(&self) -> &'static str {
        match self {
            Warning::TwoMinutes => "2 minutes left!",
            Warning::OneMinute => "1 minute left! The monster is coming!",
        }
    }
}

/// One-shot threshold flags, reset whenever a `Running` episode starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarningFlags {
    two_minute_shown: bool,
    one_minute_shown: bool,
}

impl WarningFlags {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn evaluate(&mut self, remaining_ms: u64) -> Option<Warning> {
        if !self.two_minute_shown
            && remaining_ms <= TWO_MINUTE_WARNING_MS
            && remaining_ms > ONE_MINUTE_WARNING_MS
        {
            self.two_minute_shown = true;
            return Some(Warning::TwoMinutes);
        }

        if !self.one_minute_shown && remaining_ms <= ONE_MINUTE_WARNING_MS {
            self.one_minute_shown = true;
            return Some(Warning::OneMinute);
        }

        None
    }
}
