use crate::application::bootstrap::{BootstrapResult, bootstrap_workspace};
use crate::application::theme::{NoopThemeRenderer, ThemeRenderer};
use crate::domain::day::DayClock;
use crate::domain::models::{
    DEFAULT_THEME_ID, HistoryEntry, PlannerState, StoredPlannerState, Task, TimerHistoryEntry,
    validate_non_empty,
};
use crate::domain::session::{
    SessionPhase, SessionState, SessionSummary, TickEvent, record_session, recover_interrupted,
};
use crate::domain::settlement::{RolloverOutcome, RolloverPolicy, roll_over};
use crate::domain::weekly_badge::{BadgeReport, evaluate_weekly_badge};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::snapshot::{read_snapshot, write_snapshot};
use crate::infrastructure::state_repository::{PlannerRepository, SqlitePlannerRepository};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

/// Owner of the planner record. Every mutating command validates, mutates a
/// draft, persists it, and only then replaces the live record.
pub struct AppState {
    config: AppConfig,
    clock: DayClock,
    logs_dir: PathBuf,
    repository: Box<dyn PlannerRepository>,
    planner: Mutex<PlannerState>,
    renderer: Arc<dyn ThemeRenderer>,
    startup: StartupReport,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::open(workspace_root, Utc::now(), Arc::new(NoopThemeRenderer))
    }

    /// Loads the record, settles any pending day change and finalizes an
    /// interrupted session before handing out the state.
    pub fn open(
        workspace_root: PathBuf,
        now: DateTime<Utc>,
        renderer: Arc<dyn ThemeRenderer>,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let repository = SqlitePlannerRepository::new(&bootstrap.database_path);
        Self::with_repository(bootstrap, Box::new(repository), now, renderer)
    }

    pub fn with_repository(
        bootstrap: BootstrapResult,
        repository: Box<dyn PlannerRepository>,
        now: DateTime<Utc>,
        renderer: Arc<dyn ThemeRenderer>,
    ) -> Result<Self, InfraError> {
        let clock = DayClock::new(bootstrap.config.timezone, bootstrap.config.day_boundary);
        let today = clock.virtual_day(now);

        let planner = match repository.load()? {
            Some(raw) => PlannerState::from(StoredPlannerState::from_value_lenient(raw, today)),
            None => PlannerState::new(today),
        };

        let mut state = Self {
            config: bootstrap.config,
            clock,
            logs_dir: bootstrap.logs_dir,
            repository,
            planner: Mutex::new(planner),
            renderer,
            startup: StartupReport::quiet(today),
            log_guard: Mutex::new(()),
        };
        state.startup = run_startup(&state, now)?;
        Ok(state)
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.clock.virtual_day(now)
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        info!(command, "{message}");
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        error!(command, "{message}");
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StartupReport {
    pub today: NaiveDate,
    pub rollover: Option<RolloverOutcome>,
    pub weekly_badge: Option<BadgeReport>,
    pub recovered_session: Option<SessionSummary>,
}

impl StartupReport {
    fn quiet(today: NaiveDate) -> Self {
        Self {
            today,
            rollover: None,
            weekly_badge: None,
            recovered_session: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionStateResponse {
    pub phase: String,
    pub elapsed_seconds: u64,
    pub started_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlannerSummaryResponse {
    pub today: NaiveDate,
    pub last_date: NaiveDate,
    pub streak: u32,
    pub coins: u64,
    pub task_count: usize,
    pub sound_enabled: bool,
    pub current_theme: String,
    pub inventory: Vec<String>,
    pub session: SessionStateResponse,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PurchaseResponse {
    pub item_id: String,
    pub price: u64,
    pub coins: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportResponse {
    pub last_date: NaiveDate,
    pub task_count: usize,
    pub history_count: usize,
}

fn run_startup(state: &AppState, now: DateTime<Utc>) -> Result<StartupReport, InfraError> {
    let rollover = check_day_boundary_impl(state, now)?;
    let recovered_session = recover_session(state, now)?;
    let weekly_badge = rollover
        .as_ref()
        .and_then(|outcome| outcome.weekly_badge)
        .map(BadgeReport::from);

    Ok(StartupReport {
        today: state.today(now),
        rollover,
        weekly_badge,
        recovered_session,
    })
}

/// Best-effort like rollover: a failed save is logged and the in-memory
/// recovery kept so the session is not paid twice in this process.
fn recover_session(state: &AppState, now: DateTime<Utc>) -> Result<Option<SessionSummary>, InfraError> {
    let today = state.today(now);
    let (summary, saved) = {
        let mut planner = lock_planner(state)?;
        let Some(summary) = recover_interrupted(&mut planner, today) else {
            return Ok(None);
        };
        let saved = state.repository.save(&StoredPlannerState::from(&*planner));
        (summary, saved)
    };

    if let Err(error) = saved {
        state.log_error(
            "recover_session",
            &format!("recovered session kept in memory but not persisted: {error}"),
        );
    }
    state.log_info(
        "recover_session",
        &format!(
            "finalized interrupted session seconds={} earned_coins={}",
            summary.seconds, summary.earned_coins
        ),
    );
    Ok(Some(summary))
}

/// Settles the previous virtual day if `now` falls on a later one.
///
/// Rollover is best-effort: a failed save is logged and the in-memory record
/// keeps the rollover.
pub fn check_day_boundary_impl(
    state: &AppState,
    now: DateTime<Utc>,
) -> Result<Option<RolloverOutcome>, InfraError> {
    let today = state.clock.virtual_day(now);
    let weekday = state.clock.weekday(now);
    let policy = RolloverPolicy {
        backfill_missed_days: state.config.backfill_missed_days,
    };

    let (outcome, saved) = {
        let mut planner = lock_planner(state)?;
        let Some(outcome) = roll_over(&mut planner, today, weekday, policy) else {
            return Ok(None);
        };
        let saved = state.repository.save(&StoredPlannerState::from(&*planner));
        (outcome, saved)
    };

    if let Err(error) = saved {
        state.log_error(
            "check_day_boundary",
            &format!("rollover to {today} kept in memory but not persisted: {error}"),
        );
    }
    state.log_info(
        "check_day_boundary",
        &format!(
            "closed day={} percent={:?} today={today}",
            outcome.closed_day,
            outcome.settlement.as_ref().map(|settled| settled.percent)
        ),
    );
    Ok(Some(outcome))
}

pub fn startup_report_impl(state: &AppState) -> StartupReport {
    state.startup.clone()
}

pub fn summary_impl(state: &AppState, now: DateTime<Utc>) -> Result<PlannerSummaryResponse, InfraError> {
    let planner = lock_planner(state)?;
    Ok(PlannerSummaryResponse {
        today: state.today(now),
        last_date: planner.last_date,
        streak: planner.streak,
        coins: planner.coins,
        task_count: planner.tasks.len(),
        sound_enabled: planner.sound_enabled,
        current_theme: planner.current_theme.clone(),
        inventory: planner.inventory.clone(),
        session: to_session_response(&planner.session),
    })
}

pub fn list_tasks_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    Ok(lock_planner(state)?.tasks.clone())
}

pub fn history_impl(state: &AppState) -> Result<Vec<HistoryEntry>, InfraError> {
    Ok(lock_planner(state)?.history.clone())
}

pub fn timer_history_impl(state: &AppState) -> Result<Vec<TimerHistoryEntry>, InfraError> {
    Ok(lock_planner(state)?.timer_history.clone())
}

pub fn weekly_report_impl(state: &AppState) -> Result<Option<BadgeReport>, InfraError> {
    let planner = lock_planner(state)?;
    Ok(evaluate_weekly_badge(&planner.history).map(BadgeReport::from))
}

pub fn add_task_impl(
    state: &AppState,
    now: DateTime<Utc>,
    subject: String,
    workbook: String,
    goal: String,
    unit: String,
) -> Result<Task, InfraError> {
    let subject = required_text(&subject, "subject")?;
    let workbook = required_text(&workbook, "workbook")?;
    let goal = parse_count(&goal, "goal")?;
    if goal == 0 {
        return Err(InfraError::InvalidInput("goal must be greater than 0".to_string()));
    }

    let task = mutate_planner(state, |planner| {
        let mut id = now.timestamp_millis();
        while planner.tasks.iter().any(|task| task.id == id) {
            id += 1;
        }
        let task = Task {
            id,
            subject,
            workbook,
            goal,
            unit: unit.trim().to_string(),
            current: 0,
            completed: false,
        };
        planner.tasks.push(task.clone());
        Ok(task)
    })?;

    state.log_info("add_task", &format!("created task_id={}", task.id));
    Ok(task)
}

pub fn update_progress_impl(state: &AppState, task_id: i64, value: String) -> Result<Task, InfraError> {
    let current = parse_count(&value, "progress")?;
    let task = mutate_planner(state, |planner| {
        let task = planner
            .task_mut(task_id)
            .ok_or_else(|| InfraError::NotFound(format!("task not found: {task_id}")))?;
        task.current = current;
        task.completed = task.goal > 0 && current >= task.goal;
        Ok(task.clone())
    })?;

    state.log_info(
        "update_progress",
        &format!("task_id={task_id} current={}/{}", task.current, task.goal),
    );
    Ok(task)
}

pub fn edit_task_impl(
    state: &AppState,
    task_id: i64,
    subject: Option<String>,
    workbook: Option<String>,
    goal: Option<String>,
    unit: Option<String>,
) -> Result<Task, InfraError> {
    let goal = goal.map(|raw| parse_count(&raw, "goal")).transpose()?;
    let task = mutate_planner(state, |planner| {
        let task = planner
            .task_mut(task_id)
            .ok_or_else(|| InfraError::NotFound(format!("task not found: {task_id}")))?;
        if let Some(subject) = subject {
            task.subject = subject.trim().to_string();
        }
        if let Some(workbook) = workbook {
            task.workbook = workbook.trim().to_string();
        }
        if let Some(goal) = goal {
            task.goal = goal;
        }
        if let Some(unit) = unit {
            task.unit = unit.trim().to_string();
        }
        task.validate().map_err(InfraError::InvalidInput)?;
        task.completed = task.current >= task.goal;
        Ok(task.clone())
    })?;

    state.log_info("edit_task", &format!("updated task_id={task_id}"));
    Ok(task)
}

/// Returns `false` when the user declined or the task does not exist.
pub fn delete_task_impl(state: &AppState, task_id: i64, confirmed: bool) -> Result<bool, InfraError> {
    if !confirmed {
        state.log_info("delete_task", &format!("declined task_id={task_id}"));
        return Ok(false);
    }

    let removed = mutate_planner(state, |planner| {
        let before = planner.tasks.len();
        planner.tasks.retain(|task| task.id != task_id);
        Ok(planner.tasks.len() != before)
    })?;
    if removed {
        state.log_info("delete_task", &format!("deleted task_id={task_id}"));
    }
    Ok(removed)
}

pub fn get_session_state_impl(state: &AppState) -> Result<SessionStateResponse, InfraError> {
    Ok(to_session_response(&lock_planner(state)?.session))
}

pub fn start_session_impl(state: &AppState, now: DateTime<Utc>) -> Result<SessionStateResponse, InfraError> {
    let (response, theme) = mutate_planner(state, |planner| {
        planner.session = planner.session.start(now).map_err(InfraError::InvalidSession)?;
        Ok((to_session_response(&planner.session), planner.current_theme.clone()))
    })?;

    state.renderer.apply(&theme);
    state.log_info(
        "start_session",
        &format!("running from elapsed={}", response.elapsed_seconds),
    );
    Ok(response)
}

/// Advances a running session by one second and persists the checkpoint.
/// Returns `None` without touching the store when no session is running.
pub fn tick_session_impl(state: &AppState) -> Result<Option<TickEvent>, InfraError> {
    let mut planner = lock_planner(state)?;
    if planner.session.phase() != SessionPhase::Running {
        return Ok(None);
    }

    let mut draft = planner.clone();
    let event = draft.session.tick();
    state.repository.save(&StoredPlannerState::from(&draft))?;
    *planner = draft;
    Ok(event)
}

pub fn pause_session_impl(state: &AppState) -> Result<SessionStateResponse, InfraError> {
    let response = mutate_planner(state, |planner| {
        planner.session = planner.session.pause().map_err(InfraError::InvalidSession)?;
        Ok(to_session_response(&planner.session))
    })?;

    state.log_info("pause_session", &format!("paused at elapsed={}", response.elapsed_seconds));
    Ok(response)
}

/// The host went inactive mid-session. The record keeps its running flag so the
/// next startup finalizes the session.
pub fn suspend_session_impl(state: &AppState) -> Result<SessionStateResponse, InfraError> {
    let response = mutate_planner(state, |planner| {
        planner.session = planner.session.suspend();
        Ok(to_session_response(&planner.session))
    })?;

    state.log_info("suspend_session", &format!("phase={}", response.phase));
    Ok(response)
}

/// Ends the session and pays out its reward. Returns `None` when declined.
pub fn stop_session_impl(
    state: &AppState,
    now: DateTime<Utc>,
    confirmed: bool,
) -> Result<Option<SessionSummary>, InfraError> {
    if !confirmed {
        state.log_info("stop_session", "declined");
        return Ok(None);
    }

    let today = state.today(now);
    let summary = mutate_planner(state, |planner| {
        let (next, seconds) = planner.session.stop().map_err(InfraError::InvalidSession)?;
        planner.session = next;
        Ok(record_session(planner, today, seconds))
    })?;

    state.renderer.clear();
    state.log_info(
        "stop_session",
        &format!(
            "finished seconds={} earned_coins={}",
            summary.seconds, summary.earned_coins
        ),
    );
    Ok(Some(summary))
}

pub fn toggle_sound_impl(state: &AppState) -> Result<bool, InfraError> {
    let enabled = mutate_planner(state, |planner| {
        planner.sound_enabled = !planner.sound_enabled;
        Ok(planner.sound_enabled)
    })?;
    state.log_info("toggle_sound", &format!("sound_enabled={enabled}"));
    Ok(enabled)
}

/// Spends coins on a shop item. The catalog and its prices belong to the host.
pub fn purchase_item_impl(
    state: &AppState,
    item_id: String,
    price: u64,
    confirmed: bool,
) -> Result<Option<PurchaseResponse>, InfraError> {
    let item_id = required_text(&item_id, "item_id")?;
    let response = {
        let planner = lock_planner(state)?;
        if planner.owns_item(&item_id) {
            return Err(InfraError::InvalidInput(format!("item already owned: {item_id}")));
        }
        if planner.coins < price {
            return Err(InfraError::InsufficientCoins {
                required: price,
                available: planner.coins,
            });
        }
        drop(planner);
        if !confirmed {
            state.log_info("purchase_item", &format!("declined item_id={item_id}"));
            return Ok(None);
        }

        mutate_planner(state, |planner| {
            planner.coins = planner.coins.checked_sub(price).ok_or(InfraError::InsufficientCoins {
                required: price,
                available: planner.coins,
            })?;
            planner.inventory.push(item_id.clone());
            Ok(PurchaseResponse {
                item_id: item_id.clone(),
                price,
                coins: planner.coins,
            })
        })?
    };

    state.log_info(
        "purchase_item",
        &format!("item_id={} price={price} coins_left={}", response.item_id, response.coins),
    );
    Ok(Some(response))
}

pub fn equip_theme_impl(state: &AppState, theme_id: String) -> Result<String, InfraError> {
    let theme_id = required_text(&theme_id, "theme_id")?;
    let running = mutate_planner(state, |planner| {
        if !planner.owns_item(&theme_id) {
            return Err(InfraError::NotFound(format!("theme not owned: {theme_id}")));
        }
        planner.current_theme = theme_id.clone();
        Ok(planner.session.phase() == SessionPhase::Running)
    })?;

    if running {
        state.renderer.apply(&theme_id);
    }
    state.log_info("equip_theme", &format!("theme_id={theme_id}"));
    Ok(theme_id)
}

/// Wipes the record and starts over from today.
pub fn reset_all_impl(state: &AppState, now: DateTime<Utc>, confirmed: bool) -> Result<bool, InfraError> {
    if !confirmed {
        state.log_info("reset_all", "declined");
        return Ok(false);
    }

    let today = state.today(now);
    {
        let mut planner = lock_planner(state)?;
        state.repository.clear()?;
        *planner = PlannerState::new(today);
    }
    state.renderer.clear();
    state.log_info("reset_all", &format!("record reset for {today}"));
    Ok(true)
}

pub fn export_snapshot_impl(state: &AppState, path: PathBuf) -> Result<PathBuf, InfraError> {
    let record = StoredPlannerState::from(&*lock_planner(state)?);
    write_snapshot(&path, &record)?;
    state.log_info("export_snapshot", &format!("wrote {}", path.display()));
    Ok(path)
}

/// Replaces the whole record with a snapshot file. Structurally invalid
/// snapshots are rejected and leave the current record untouched.
pub fn import_snapshot_impl(
    state: &AppState,
    path: PathBuf,
    now: DateTime<Utc>,
) -> Result<ImportResponse, InfraError> {
    let raw = read_snapshot(&path)?;
    let imported = PlannerState::from(StoredPlannerState::from_value_lenient(raw, state.today(now)));

    let response = mutate_planner(state, |planner| {
        *planner = imported;
        Ok(ImportResponse {
            last_date: planner.last_date,
            task_count: planner.tasks.len(),
            history_count: planner.history.len(),
        })
    })?;

    state.log_info(
        "import_snapshot",
        &format!("restored {} task_count={}", path.display(), response.task_count),
    );
    Ok(response)
}

fn mutate_planner<T>(
    state: &AppState,
    mutation: impl FnOnce(&mut PlannerState) -> Result<T, InfraError>,
) -> Result<T, InfraError> {
    let mut planner = lock_planner(state)?;
    let mut draft = planner.clone();
    let value = mutation(&mut draft)?;
    state.repository.save(&StoredPlannerState::from(&draft))?;
    *planner = draft;
    Ok(value)
}

fn lock_planner(state: &AppState) -> Result<MutexGuard<'_, PlannerState>, InfraError> {
    state
        .planner
        .lock()
        .map_err(|error| InfraError::LockPoisoned(format!("planner lock poisoned: {error}")))
}

fn to_session_response(session: &SessionState) -> SessionStateResponse {
    SessionStateResponse {
        phase: session.phase().as_str().to_string(),
        elapsed_seconds: session.elapsed(),
        started_at: session.started_at().map(|value| value.to_rfc3339()),
    }
}

fn required_text(value: &str, field_name: &str) -> Result<String, InfraError> {
    validate_non_empty(value, field_name).map_err(InfraError::InvalidInput)?;
    Ok(value.trim().to_string())
}

fn parse_count(value: &str, field_name: &str) -> Result<u32, InfraError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| InfraError::InvalidInput(format!("{field_name} must be a non-negative integer")))
}
