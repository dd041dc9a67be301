use crate::domain::models::{HistoryEntry, PlannerState, Task};
use crate::domain::weekly_badge::{WeeklyBadge, evaluate_weekly_badge};
use chrono::{NaiveDate, Weekday};
use serde::Serialize;
use tracing::{info, warn};

// A whole-number percent floors to itself: 29/100 gives 29, not 28.
const PERCENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RolloverPolicy {
    /// Settle every skipped day with zero progress instead of only the last active day.
    pub backfill_missed_days: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailySettlement {
    pub date: NaiveDate,
    pub percent: u8,
    pub earned_coins: u64,
    pub is_perfect: bool,
    pub streak: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RolloverOutcome {
    pub closed_day: NaiveDate,
    pub today: NaiveDate,
    pub settlement: Option<DailySettlement>,
    pub backfilled: Vec<DailySettlement>,
    pub weekly_badge: Option<WeeklyBadge>,
}

pub fn completion_percent(tasks: &[Task]) -> u8 {
    if tasks.is_empty() {
        return 0;
    }
    let total: f64 = tasks.iter().map(Task::completion_ratio).sum();
    let percent = (total / tasks.len() as f64 * 100.0 + PERCENT_EPSILON).floor();
    percent.clamp(0.0, 100.0) as u8
}

/// Judges one day against the current task progress. Days with no tasks are not judged.
pub fn settle_day(state: &mut PlannerState, date: NaiveDate) -> Option<DailySettlement> {
    if state.tasks.is_empty() {
        return None;
    }

    let percent = completion_percent(&state.tasks);
    let is_perfect = percent == 100;
    state.streak = if percent > 0 { state.streak + 1 } else { 0 };
    let earned_coins = u64::from(percent);
    state.coins += earned_coins;
    state.history.push(HistoryEntry {
        date,
        percent,
        is_perfect,
    });

    Some(DailySettlement {
        date,
        percent,
        earned_coins,
        is_perfect,
        streak: state.streak,
    })
}

/// Closes `state.last_date` when the virtual day has moved forward.
///
/// Returns `None` when the record is already settled for `today`. A clock that
/// moved backwards is also left alone so `last_date` never regresses.
pub fn roll_over(
    state: &mut PlannerState,
    today: NaiveDate,
    weekday: Weekday,
    policy: RolloverPolicy,
) -> Option<RolloverOutcome> {
    if today == state.last_date {
        return None;
    }
    if today < state.last_date {
        warn!(last_date = %state.last_date, %today, "virtual day moved backwards; skipping rollover");
        return None;
    }

    let closed_day = state.last_date;
    let settlement = settle_day(state, closed_day);
    state.tasks.iter_mut().for_each(Task::reset_progress);

    let mut backfilled = Vec::new();
    if policy.backfill_missed_days {
        for missed in closed_day.iter_days().skip(1).take_while(|day| *day < today) {
            if let Some(missed_settlement) = settle_day(state, missed) {
                backfilled.push(missed_settlement);
            }
        }
    }

    let weekly_badge = if settlement.is_some() && weekday == Weekday::Mon {
        evaluate_weekly_badge(&state.history)
    } else {
        None
    };

    state.last_date = today;
    info!(
        %closed_day,
        %today,
        percent = settlement.as_ref().map(|settled| settled.percent),
        backfilled = backfilled.len(),
        "rolled over to new day"
    );

    Some(RolloverOutcome {
        closed_day,
        today,
        settlement,
        backfilled,
        weekly_badge,
    })
}
