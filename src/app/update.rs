use std::time::Duration;

use tracing::{debug, error, info};

use crate::app::actions::{Action, SideEffect};
use crate::app::state::{RefreshState, Snapshot};

/// Scheduler-owned state. Only `update` mutates it.
#[derive(Debug, Default)]
pub struct SchedulerState {
    pub snapshot: Snapshot,
    /// `Some` while auto-refresh is armed.
    pub auto_refresh: Option<Duration>,
}

pub fn update(state: &mut SchedulerState, action: Action) -> Vec<SideEffect> {
    match action {
        Action::Refresh | Action::Tick => begin_cycle(state),
        Action::StartAutoRefresh(interval) => {
            state.auto_refresh = Some(interval);
            vec![SideEffect::ArmTimer(interval)]
        }
        Action::StopAutoRefresh => {
            state.auto_refresh = None;
            vec![SideEffect::DisarmTimer]
        }
        Action::ConfigChanged { refresh_interval } => {
            let mut effects = Vec::new();
            if let Some(current) = state.auto_refresh
                && current != refresh_interval
            {
                state.auto_refresh = Some(refresh_interval);
                effects.push(SideEffect::ArmTimer(refresh_interval));
            }
            effects.extend(begin_cycle(state));
            effects
        }
        Action::CycleFinished(outcome) => {
            match outcome {
                Ok(report) => {
                    info!(
                        queries = report.results.len(),
                        login = %report.viewer_login,
                        "Refresh cycle complete"
                    );
                    state.snapshot.current_user_login = Some(report.viewer_login);
                    state.snapshot.last_refresh = Some(chrono::Utc::now());
                    state.snapshot.state = RefreshState::Loaded(report.results);
                }
                Err(e) => {
                    error!(error = %e, "Refresh cycle failed");
                    state.snapshot.state = RefreshState::Error(e.user_message());
                }
            }
            vec![]
        }
    }
}

/// The single-flight guard: a cycle only starts from a non-loading state.
fn begin_cycle(state: &mut SchedulerState) -> Vec<SideEffect> {
    if state.snapshot.state.is_loading() {
        debug!("Refresh already in flight, ignoring");
        return vec![];
    }
    state.snapshot.state = RefreshState::Loading;
    vec![SideEffect::StartCycle]
}
