use std::time::Duration;

use crate::app::fetch::CycleReport;
use crate::github::error::ApiError;

#[derive(Debug)]
pub enum Action {
    /// Explicit refresh request.
    Refresh,
    /// Auto-refresh timer fired.
    Tick,
    StartAutoRefresh(Duration),
    StopAutoRefresh,
    /// Settings store signalled a change; carries the current interval.
    ConfigChanged { refresh_interval: Duration },
    CycleFinished(Result<CycleReport, ApiError>),
}

#[derive(Debug, PartialEq, Eq)]
pub enum SideEffect {
    StartCycle,
    /// Cancel any armed timer, then arm a new one.
    ArmTimer(Duration),
    DisarmTimer,
}
