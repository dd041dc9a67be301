use crate::domain::models::{PlannerState, TimerHistoryEntry};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

pub const REWARD_BLOCK_SECONDS: u64 = 10 * 60;
pub const COINS_PER_BLOCK: u64 = 10;

/// Focus session lifecycle.
///
/// `PendingRecovery` marks a session that was still accruing when the host went
/// away; it is finalized at the next startup rather than resumed as a pause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running {
        started_at: DateTime<Utc>,
        elapsed: u64,
    },
    Paused {
        elapsed: u64,
    },
    PendingRecovery {
        elapsed: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Running,
    Paused,
    PendingRecovery,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::PendingRecovery => "pending_recovery",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickEvent {
    pub elapsed_seconds: u64,
    /// Number of completed reward blocks, set only on the tick that completes one.
    pub milestone: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub date: NaiveDate,
    pub seconds: u64,
    pub earned_coins: u64,
}

impl SessionState {
    pub fn from_persisted(saved_session_time: u64, timer_running_state: bool) -> Self {
        match (saved_session_time, timer_running_state) {
            (elapsed, true) => Self::PendingRecovery { elapsed },
            (0, false) => Self::Idle,
            (elapsed, false) => Self::Paused { elapsed },
        }
    }

    /// `(savedSessionTime, timerRunningState)` as written to the persisted record.
    pub fn persisted(&self) -> (u64, bool) {
        match self {
            Self::Idle => (0, false),
            Self::Running { elapsed, .. } => (*elapsed, true),
            Self::Paused { elapsed } => (*elapsed, false),
            Self::PendingRecovery { elapsed } => (*elapsed, true),
        }
    }

    pub fn elapsed(&self) -> u64 {
        match self {
            Self::Idle => 0,
            Self::Running { elapsed, .. }
            | Self::Paused { elapsed }
            | Self::PendingRecovery { elapsed } => *elapsed,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match self {
            Self::Idle => SessionPhase::Idle,
            Self::Running { .. } => SessionPhase::Running,
            Self::Paused { .. } => SessionPhase::Paused,
            Self::PendingRecovery { .. } => SessionPhase::PendingRecovery,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Running { started_at, .. } => Some(*started_at),
            _ => None,
        }
    }

    pub fn start(&self, now: DateTime<Utc>) -> Result<Self, String> {
        match self {
            Self::Idle => Ok(Self::Running {
                started_at: now,
                elapsed: 0,
            }),
            // A suspended session can pick up again while the process is still alive.
            Self::Paused { elapsed } | Self::PendingRecovery { elapsed } => Ok(Self::Running {
                started_at: now,
                elapsed: *elapsed,
            }),
            Self::Running { .. } => Err("session is already running".to_string()),
        }
    }

    pub fn tick(&mut self) -> Option<TickEvent> {
        let Self::Running { elapsed, .. } = self else {
            return None;
        };
        *elapsed += 1;
        let milestone = (*elapsed % REWARD_BLOCK_SECONDS == 0).then(|| *elapsed / REWARD_BLOCK_SECONDS);
        Some(TickEvent {
            elapsed_seconds: *elapsed,
            milestone,
        })
    }

    pub fn pause(&self) -> Result<Self, String> {
        match self {
            Self::Running { elapsed, .. } => Ok(Self::Paused { elapsed: *elapsed }),
            _ => Err("session is not running".to_string()),
        }
    }

    /// Host went inactive. Accrual stops but the running flag stays set.
    pub fn suspend(&self) -> Self {
        match self {
            Self::Running { elapsed, .. } => Self::PendingRecovery { elapsed: *elapsed },
            other => other.clone(),
        }
    }

    /// Ends the session and returns the seconds to be rewarded.
    pub fn stop(&self) -> Result<(Self, u64), String> {
        match self {
            Self::Idle => Err("no session to stop".to_string()),
            other => Ok((Self::Idle, other.elapsed())),
        }
    }
}

pub fn session_reward(seconds: u64) -> u64 {
    (seconds / REWARD_BLOCK_SECONDS) * COINS_PER_BLOCK
}

/// Credits coins and folds the session into today's timer history entry.
/// Every finished session counts, including one stopped before its first tick.
pub fn record_session(state: &mut PlannerState, today: NaiveDate, seconds: u64) -> SessionSummary {
    let earned_coins = session_reward(seconds);
    state.coins += earned_coins;
    let index = match state.timer_history.iter().position(|entry| entry.date == today) {
        Some(index) => index,
        None => {
            state.timer_history.push(TimerHistoryEntry::empty(today));
            state.timer_history.len() - 1
        }
    };
    let entry = &mut state.timer_history[index];
    entry.total_time += seconds;
    entry.sessions += 1;
    entry.max_duration = entry.max_duration.max(seconds);

    SessionSummary {
        date: today,
        seconds,
        earned_coins,
    }
}

/// Finalizes a session left running by a previous process. At most once per
/// interruption: the session is cleared in the same step.
pub fn recover_interrupted(state: &mut PlannerState, today: NaiveDate) -> Option<SessionSummary> {
    let SessionState::PendingRecovery { elapsed } = state.session else {
        return None;
    };
    state.session = SessionState::Idle;
    Some(record_session(state, today, elapsed))
}
