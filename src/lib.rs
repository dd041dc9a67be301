pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    AppState, StartupReport, add_task_impl, check_day_boundary_impl, delete_task_impl, edit_task_impl,
    equip_theme_impl, export_snapshot_impl, get_session_state_impl, history_impl,
    import_snapshot_impl, list_tasks_impl, pause_session_impl, purchase_item_impl,
    reset_all_impl, start_session_impl, startup_report_impl, stop_session_impl, summary_impl,
    suspend_session_impl, timer_history_impl, toggle_sound_impl, update_progress_impl,
    weekly_report_impl,
};
use application::focus_loop::{FocusEvent, run_focus_loop};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "study-planner", version, about = "Daily study tracker with streaks and focus rewards")]
struct Cli {
    /// Workspace directory holding config, state and logs.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Streak, coins, task count and session state.
    Summary,
    /// Settlement, badge and recovered session produced at startup.
    Report,
    /// Re-check the day boundary without restarting.
    CheckDay,
    Tasks,
    Add {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        workbook: String,
        #[arg(long)]
        goal: String,
        #[arg(long, default_value = "")]
        unit: String,
    },
    Progress {
        task_id: i64,
        value: String,
    },
    Edit {
        task_id: i64,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        workbook: Option<String>,
        #[arg(long)]
        goal: Option<String>,
        #[arg(long)]
        unit: Option<String>,
    },
    Delete {
        task_id: i64,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    History,
    Weekly,
    /// Start or resume the focus timer and tick until Ctrl-C, which pauses it.
    Focus,
    Pause,
    /// Record that the host went inactive while the timer was running.
    Suspend,
    Stop {
        #[arg(long)]
        yes: bool,
    },
    Session,
    TimerHistory,
    Sound,
    Buy {
        item_id: String,
        price: u64,
        #[arg(long)]
        yes: bool,
    },
    Equip {
        theme_id: String,
    },
    Export {
        path: PathBuf,
    },
    Import {
        path: PathBuf,
    },
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

pub fn run() -> Result<(), String> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing::subscriber::set_global_default(log_subscriber(log_filter(directives.as_deref())))
        .map_err(|error| error.to_string())?;

    let cli = Cli::parse();
    let workspace_root = match cli.root {
        Some(path) => path,
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };
    let state = AppState::new(workspace_root).map_err(|error| error.to_string())?;

    let report = startup_report_impl(&state);
    if announces_startup(&report, &cli.command) {
        print_json(&report)?;
    }

    match cli.command {
        Command::Summary => print_json(&command(&state, "summary", summary_impl(&state, Utc::now()))?),
        Command::Report => print_json(&report),
        Command::CheckDay => print_json(&command(
            &state,
            "check_day_boundary",
            check_day_boundary_impl(&state, Utc::now()),
        )?),
        Command::Tasks => print_json(&command(&state, "list_tasks", list_tasks_impl(&state))?),
        Command::Add {
            subject,
            workbook,
            goal,
            unit,
        } => print_json(&command(
            &state,
            "add_task",
            add_task_impl(&state, Utc::now(), subject, workbook, goal, unit),
        )?),
        Command::Progress { task_id, value } => print_json(&command(
            &state,
            "update_progress",
            update_progress_impl(&state, task_id, value),
        )?),
        Command::Edit {
            task_id,
            subject,
            workbook,
            goal,
            unit,
        } => print_json(&command(
            &state,
            "edit_task",
            edit_task_impl(&state, task_id, subject, workbook, goal, unit),
        )?),
        Command::Delete { task_id, yes } => {
            let confirmed = yes || confirm("Delete this task?")?;
            print_json(&command(
                &state,
                "delete_task",
                delete_task_impl(&state, task_id, confirmed),
            )?)
        }
        Command::History => print_json(&command(&state, "history", history_impl(&state))?),
        Command::Weekly => print_json(&command(&state, "weekly_report", weekly_report_impl(&state))?),
        Command::Focus => focus(&state),
        Command::Pause => print_json(&command(&state, "pause_session", pause_session_impl(&state))?),
        Command::Suspend => {
            print_json(&command(&state, "suspend_session", suspend_session_impl(&state))?)
        }
        Command::Stop { yes } => {
            let confirmed = yes || confirm("End the focus session?")?;
            print_json(&command(
                &state,
                "stop_session",
                stop_session_impl(&state, Utc::now(), confirmed),
            )?)
        }
        Command::Session => {
            print_json(&command(&state, "get_session_state", get_session_state_impl(&state))?)
        }
        Command::TimerHistory => {
            print_json(&command(&state, "timer_history", timer_history_impl(&state))?)
        }
        Command::Sound => print_json(&command(&state, "toggle_sound", toggle_sound_impl(&state))?),
        Command::Buy { item_id, price, yes } => {
            let confirmed = yes || confirm("Buy this item?")?;
            print_json(&command(
                &state,
                "purchase_item",
                purchase_item_impl(&state, item_id, price, confirmed),
            )?)
        }
        Command::Equip { theme_id } => {
            print_json(&command(&state, "equip_theme", equip_theme_impl(&state, theme_id))?)
        }
        Command::Export { path } => {
            print_json(&command(&state, "export_snapshot", export_snapshot_impl(&state, path))?)
        }
        Command::Import { path } => print_json(&command(
            &state,
            "import_snapshot",
            import_snapshot_impl(&state, path, Utc::now()),
        )?),
        Command::Reset { yes } => {
            let confirmed = yes || confirm("Reset all data? This cannot be undone.")?;
            print_json(&command(
                &state,
                "reset_all",
                reset_all_impl(&state, Utc::now(), confirmed),
            )?)
        }
    }
}

/// `RUST_LOG` directives, falling back to `info` when unset or unparseable.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn log_subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish()
}

/// `report` prints the startup report itself.
fn announces_startup(report: &StartupReport, command: &Command) -> bool {
    let eventful = report.rollover.is_some() || report.recovered_session.is_some();
    eventful && !matches!(command, Command::Report)
}

fn focus(state: &AppState) -> Result<(), String> {
    print_json(&command(state, "start_session", start_session_impl(state, Utc::now()))?)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|error| error.to_string())?;
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let result = runtime.block_on(run_focus_loop(state, shutdown, Utc::now, |event| {
        if let FocusEvent::Tick(tick) = &event {
            if tick.milestone.is_none() && tick.elapsed_seconds % 60 != 0 {
                return;
            }
        }
        if let Ok(line) = serde_json::to_string(&event) {
            println!("{line}");
        }
    }));
    command(state, "focus_loop", result)?;

    if get_session_state_impl(state).is_ok_and(|session| session.phase == "running") {
        print_json(&command(state, "pause_session", pause_session_impl(state))?)?;
    }
    Ok(())
}

fn command<T>(
    state: &AppState,
    name: &str,
    result: Result<T, infrastructure::error::InfraError>,
) -> Result<T, String> {
    result.map_err(|error| state.command_error(name, &error))
}

fn confirm(prompt: &str) -> Result<bool, String> {
    print!("{prompt} [y/N] ");
    io::stdout().flush().map_err(|error| error.to_string())?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|error| error.to_string())?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let formatted = serde_json::to_string_pretty(value).map_err(|error| error.to_string())?;
    println!("{formatted}");
    Ok(())
}
