use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::app::actions::{Action, SideEffect};
use crate::app::context::AppContext;
use crate::app::fetch::{CycleReport, Orchestrator};
use crate::app::state::{RefreshState, Snapshot};
use crate::app::update::{SchedulerState, update};
use crate::github::error::ApiError;

#[derive(Debug)]
enum Command {
    Refresh(oneshot::Sender<bool>),
    StartAutoRefresh(Duration),
    StopAutoRefresh,
    Shutdown,
}

/// Cheap, cloneable front door to a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl SchedulerHandle {
    /// Request a cycle. Resolves to `false` when one is already in flight or
    /// the scheduler has stopped.
    pub async fn refresh(&self) -> bool {
        let (reply, accepted) = oneshot::channel();
        if self.commands.send(Command::Refresh(reply)).is_err() {
            return false;
        }
        accepted.await.unwrap_or(false)
    }

    /// (Re)arm the timer. Any previously armed timer is cancelled first.
    pub fn start_auto_refresh(&self, interval: Duration) {
        let _ = self.commands.send(Command::StartAutoRefresh(interval));
    }

    pub fn stop_auto_refresh(&self) {
        let _ = self.commands.send(Command::StopAutoRefresh);
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    pub fn state(&self) -> RefreshState {
        self.snapshots.borrow().state.clone()
    }

    pub fn current_user_login(&self) -> Option<String> {
        self.snapshots.borrow().current_user_login.clone()
    }

    pub fn last_refresh_time(&self) -> Option<DateTime<Utc>> {
        self.snapshots.borrow().last_refresh
    }

    pub fn pending_actions_count(&self) -> usize {
        self.snapshots.borrow().pending_actions_count()
    }

    /// Wait for the next snapshot that satisfies `predicate`.
    pub async fn wait_for(&self, predicate: impl FnMut(&Snapshot) -> bool) -> Option<Snapshot> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx.wait_for(predicate).await.ok().map(|s| s.clone());
        snapshot
    }
}

pub struct Scheduler {
    ctx: AppContext,
    orchestrator: Arc<Orchestrator>,
    state: SchedulerState,
    commands: mpsc::UnboundedReceiver<Command>,
    finished_tx: mpsc::UnboundedSender<Result<CycleReport, ApiError>>,
    finished_rx: mpsc::UnboundedReceiver<Result<CycleReport, ApiError>>,
    settings_changes: watch::Receiver<u64>,
    timer: Option<Interval>,
    publisher: watch::Sender<Snapshot>,
}

impl Scheduler {
    /// Start the scheduler loop on the current tokio runtime.
    pub fn spawn(ctx: AppContext) -> (SchedulerHandle, JoinHandle<()>) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let (publisher, snapshots) = watch::channel(Snapshot::default());
        let settings_changes = ctx.settings.changes();

        let orchestrator = Arc::new(Orchestrator::new(ctx.gateway.clone(), ctx.fetch.clone()));
        let scheduler = Scheduler {
            ctx,
            orchestrator,
            state: SchedulerState::default(),
            commands,
            finished_tx,
            finished_rx,
            settings_changes,
            timer: None,
            publisher,
        };

        let task = tokio::spawn(scheduler.run());
        let handle = SchedulerHandle {
            commands: commands_tx,
            snapshots,
        };
        (handle, task)
    }

    async fn run(mut self) {
        info!("Scheduler started");
        let mut settings_open = true;

        loop {
            // Commands are drained before timer and settings events.
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    match command {
                        Some(Command::Refresh(reply)) => {
                            let started = self.dispatch(Action::Refresh);
                            let _ = reply.send(started);
                        }
                        Some(Command::StartAutoRefresh(interval)) => {
                            self.dispatch(Action::StartAutoRefresh(interval));
                        }
                        Some(Command::StopAutoRefresh) => {
                            self.dispatch(Action::StopAutoRefresh);
                        }
                        Some(Command::Shutdown) | None => break,
                    }
                }
                Some(outcome) = self.finished_rx.recv() => {
                    self.dispatch(Action::CycleFinished(outcome));
                }
                _ = next_tick(&mut self.timer) => {
                    debug!("Auto-refresh tick");
                    self.dispatch(Action::Tick);
                }
                changed = self.settings_changes.changed(), if settings_open => {
                    if changed.is_ok() {
                        let refresh_interval = self.ctx.settings.refresh_interval();
                        info!("Settings changed, refreshing");
                        self.dispatch(Action::ConfigChanged { refresh_interval });
                    } else {
                        settings_open = false;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Apply one action, publish the resulting snapshot, run side effects.
    /// Returns whether a cycle was started.
    fn dispatch(&mut self, action: Action) -> bool {
        let effects = update(&mut self.state, action);
        self.publish();

        let mut started = false;
        for effect in effects {
            match effect {
                SideEffect::StartCycle => {
                    self.start_cycle();
                    started = true;
                }
                SideEffect::ArmTimer(interval) => self.arm_timer(interval),
                SideEffect::DisarmTimer => self.timer = None,
            }
        }
        started
    }

    fn publish(&self) {
        let next = &self.state.snapshot;
        self.publisher.send_if_modified(|current| {
            if *current == *next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
    }

    fn arm_timer(&mut self, interval: Duration) {
        self.timer = None;
        let interval = interval.max(Duration::from_millis(1));
        let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        debug!(secs = interval.as_secs(), "Auto-refresh armed");
    }

    fn start_cycle(&self) {
        let queries = self.ctx.settings.queries();
        let credential = self.ctx.secrets.get_credential();
        let orchestrator = self.orchestrator.clone();
        let finished = self.finished_tx.clone();

        tokio::spawn(async move {
            let outcome = match credential {
                Some(credential) => orchestrator.fetch_all(&queries, &credential).await,
                None => Err(ApiError::MissingCredential),
            };
            let _ = finished.send(outcome);
        });
    }
}

async fn next_tick(timer: &mut Option<Interval>) -> Instant {
    match timer {
        Some(timer) => timer.tick().await,
        None => std::future::pending().await,
    }
}
