use crate::domain::session::SessionState;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

pub const DEFAULT_THEME_ID: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub subject: String,
    pub workbook: String,
    pub goal: u32,
    pub unit: String,
    pub current: u32,
    pub completed: bool,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.subject, "task.subject")?;
        validate_non_empty(&self.workbook, "task.workbook")?;
        if self.goal == 0 {
            return Err("task.goal must be > 0".to_string());
        }
        Ok(())
    }

    /// Share of the goal reached today, clamped to `[0, 1]`. A zero goal counts as no progress.
    pub fn completion_ratio(&self) -> f64 {
        if self.goal == 0 {
            return 0.0;
        }
        (f64::from(self.current) / f64::from(self.goal)).min(1.0)
    }

    pub fn reset_progress(&mut self) {
        self.current = 0;
        self.completed = false;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub percent: u8,
    pub is_perfect: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerHistoryEntry {
    pub date: NaiveDate,
    pub total_time: u64,
    pub max_duration: u64,
    pub sessions: u32,
}

impl TimerHistoryEntry {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_time: 0,
            max_duration: 0,
            sessions: 0,
        }
    }
}

/// In-memory planner record. The session is held as an explicit variant; the
/// persisted flag pair only exists on [`StoredPlannerState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerState {
    pub last_date: NaiveDate,
    pub streak: u32,
    pub coins: u64,
    pub history: Vec<HistoryEntry>,
    pub tasks: Vec<Task>,
    pub sound_enabled: bool,
    pub timer_history: Vec<TimerHistoryEntry>,
    pub session: SessionState,
    pub inventory: Vec<String>,
    pub current_theme: String,
}

impl PlannerState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            last_date: today,
            streak: 0,
            coins: 0,
            history: Vec::new(),
            tasks: Vec::new(),
            sound_enabled: true,
            timer_history: Vec::new(),
            session: SessionState::Idle,
            inventory: Vec::new(),
            current_theme: DEFAULT_THEME_ID.to_string(),
        }
    }

    pub fn task_mut(&mut self, task_id: i64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == task_id)
    }

    pub fn owns_item(&self, item_id: &str) -> bool {
        item_id == DEFAULT_THEME_ID || self.inventory.iter().any(|owned| owned == item_id)
    }
}

/// Wire layout of the single persisted record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredPlannerState {
    pub last_date: NaiveDate,
    pub streak: u32,
    pub coins: u64,
    pub history: Vec<HistoryEntry>,
    pub tasks: Vec<Task>,
    pub sound_enabled: bool,
    pub timer_history: Vec<TimerHistoryEntry>,
    pub saved_session_time: u64,
    pub timer_running_state: bool,
    pub inventory: Vec<String>,
    pub current_theme: String,
}

impl StoredPlannerState {
    /// Reads a persisted record field by field. Missing or malformed fields take
    /// their default; malformed list elements are dropped.
    pub fn from_value_lenient(value: Value, today: NaiveDate) -> Self {
        let defaults = StoredPlannerState::from(&PlannerState::new(today));
        let Value::Object(mut fields) = value else {
            warn!("persisted planner record is not an object; using defaults");
            return defaults;
        };

        Self {
            last_date: take_field(&mut fields, "lastDate").unwrap_or(defaults.last_date),
            streak: take_field(&mut fields, "streak").unwrap_or(defaults.streak),
            coins: take_field(&mut fields, "coins").unwrap_or(defaults.coins),
            history: take_list(&mut fields, "history"),
            tasks: take_list(&mut fields, "tasks"),
            sound_enabled: take_field(&mut fields, "soundEnabled")
                .unwrap_or(defaults.sound_enabled),
            timer_history: take_list(&mut fields, "timerHistory"),
            saved_session_time: take_field(&mut fields, "savedSessionTime")
                .unwrap_or(defaults.saved_session_time),
            timer_running_state: take_field(&mut fields, "timerRunningState")
                .unwrap_or(defaults.timer_running_state),
            inventory: take_list(&mut fields, "inventory"),
            current_theme: take_field(&mut fields, "currentTheme")
                .unwrap_or(defaults.current_theme),
        }
    }
}

impl From<&PlannerState> for StoredPlannerState {
    fn from(state: &PlannerState) -> Self {
        let (saved_session_time, timer_running_state) = state.session.persisted();
        Self {
            last_date: state.last_date,
            streak: state.streak,
            coins: state.coins,
            history: state.history.clone(),
            tasks: state.tasks.clone(),
            sound_enabled: state.sound_enabled,
            timer_history: state.timer_history.clone(),
            saved_session_time,
            timer_running_state,
            inventory: state.inventory.clone(),
            current_theme: state.current_theme.clone(),
        }
    }
}

impl From<StoredPlannerState> for PlannerState {
    fn from(stored: StoredPlannerState) -> Self {
        Self {
            last_date: stored.last_date,
            streak: stored.streak,
            coins: stored.coins,
            history: stored.history,
            tasks: stored.tasks,
            sound_enabled: stored.sound_enabled,
            timer_history: stored.timer_history,
            session: SessionState::from_persisted(
                stored.saved_session_time,
                stored.timer_running_state,
            ),
            inventory: stored.inventory,
            current_theme: stored.current_theme,
        }
    }
}

fn take_field<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    let raw = fields.remove(key)?;
    match serde_json::from_value(raw) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(field = key, %error, "ignoring malformed persisted field");
            None
        }
    }
}

fn take_list<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Vec<T> {
    let Some(raw) = fields.remove(key) else {
        return Vec::new();
    };
    let Value::Array(items) = raw else {
        warn!(field = key, "persisted field is not a list; using empty list");
        return Vec::new();
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(field = key, index, %error, "dropping malformed persisted entry");
                None
            }
        })
        .collect()
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
