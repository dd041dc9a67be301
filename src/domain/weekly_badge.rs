use crate::domain::models::HistoryEntry;
use serde::Serialize;

pub const WEEK_WINDOW: usize = 7;
pub const MIN_WEEK_ENTRIES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeeklyBadge {
    PerfectWeek,
    ContinuousWeek,
}

impl WeeklyBadge {
    pub fn label(self) -> &'static str {
        match self {
            Self::PerfectWeek => "Perfect Week",
            Self::ContinuousWeek => "Continuous Week",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::PerfectWeek => "Every task hit 100% across the past week.",
            Self::ContinuousWeek => "Not every day was perfect, but you studied every single day.",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BadgeReport {
    pub label: String,
    pub description: String,
}

impl From<WeeklyBadge> for BadgeReport {
    fn from(badge: WeeklyBadge) -> Self {
        Self {
            label: badge.label().to_string(),
            description: badge.description().to_string(),
        }
    }
}

/// Classifies the last (up to) seven history entries by insertion order.
/// Calendar contiguity is not checked.
pub fn evaluate_weekly_badge(history: &[HistoryEntry]) -> Option<WeeklyBadge> {
    let window = &history[history.len().saturating_sub(WEEK_WINDOW)..];
    if window.len() < MIN_WEEK_ENTRIES {
        return None;
    }

    if window.iter().all(|entry| entry.is_perfect) {
        Some(WeeklyBadge::PerfectWeek)
    } else if window.iter().all(|entry| entry.percent > 0) {
        Some(WeeklyBadge::ContinuousWeek)
    } else {
        None
    }
}
