use crate::application::commands::{AppState, check_day_boundary_impl, tick_session_impl};
use crate::domain::session::TickEvent;
use crate::domain::settlement::RolloverOutcome;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FocusEvent {
    Tick(TickEvent),
    DayRolledOver(RolloverOutcome),
}

/// Drives a running session once per second until `shutdown` resolves or the
/// session stops running. Each tick also re-checks the day boundary.
///
/// Returns the number of ticks applied.
pub async fn run_focus_loop<S, C, F>(
    state: &AppState,
    shutdown: S,
    clock: C,
    mut on_event: F,
) -> Result<u64, InfraError>
where
    S: Future<Output = ()>,
    C: Fn() -> DateTime<Utc>,
    F: FnMut(FocusEvent),
{
    let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut ticks = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let Some(event) = tick_session_impl(state)? else {
                    break;
                };
                ticks += 1;
                on_event(FocusEvent::Tick(event));
                if let Some(outcome) = check_day_boundary_impl(state, clock())? {
                    on_event(FocusEvent::DayRolledOver(outcome));
                }
            }
        }
    }
    Ok(ticks)
}
