mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeGateway, graphql_handler, pr_node, query};
use prwatch::app::{AppContext, FetchOptions, RefreshState, Scheduler, SchedulerHandle};
use prwatch::github::ApiError;
use prwatch::store::{MemorySecretStore, MemorySettingsStore, Settings};

fn settings(ids: &[&str], interval_secs: u64) -> Settings {
    Settings {
        queries: ids.iter().map(|id| query(id)).collect(),
        refresh_interval: Duration::from_secs(interval_secs),
    }
}

struct Harness {
    handle: SchedulerHandle,
    gateway: Arc<FakeGateway>,
    settings: Arc<MemorySettingsStore>,
}

fn spawn(gateway: FakeGateway, initial: Settings, credential: Option<&str>) -> Harness {
    let gateway = Arc::new(gateway);
    let settings = Arc::new(MemorySettingsStore::new(initial));
    let secrets = match credential {
        Some(c) => MemorySecretStore::with_credential(c),
        None => MemorySecretStore::new(),
    };
    let ctx = AppContext::new(
        gateway.clone(),
        settings.clone(),
        Arc::new(secrets),
        FetchOptions::default(),
    );
    let (handle, _task) = Scheduler::spawn(ctx);
    Harness {
        handle,
        gateway,
        settings,
    }
}

async fn settled(handle: &SchedulerHandle) -> RefreshState {
    handle
        .wait_for(|s| s.state.is_settled())
        .await
        .expect("scheduler stopped")
        .state
}

#[tokio::test]
async fn test_initial_state_is_idle() {
    let h = spawn(
        FakeGateway::new(graphql_handler("me", vec![])),
        settings(&["a"], 300),
        Some("token"),
    );
    assert_eq!(h.handle.state(), RefreshState::Idle);
    assert!(h.handle.current_user_login().is_none());
    assert!(h.handle.last_refresh_time().is_none());
    assert_eq!(h.handle.pending_actions_count(), 0);
}

#[tokio::test]
async fn test_refresh_while_loading_is_rejected() {
    let (gateway, release) = FakeGateway::new(graphql_handler(
        "me",
        vec![("search-a", Ok(vec![pr_node(1, "x")]))],
    ))
    .held();
    let h = spawn(gateway, settings(&["a", "b"], 300), Some("token"));

    assert!(h.handle.refresh().await);
    assert!(h.handle.state().is_loading());

    assert!(!h.handle.refresh().await);
    assert!(!h.handle.refresh().await);
    assert!(h.handle.state().is_loading());

    release.send(true).unwrap();
    let state = settled(&h.handle).await;

    assert!(matches!(state, RefreshState::Loaded(ref r) if r.len() == 2));
    assert_eq!(h.gateway.viewer_calls(), 1);
    assert_eq!(h.gateway.calls().len(), 3);
}

#[tokio::test]
async fn test_loaded_state_exposes_login_and_time() {
    let h = spawn(
        FakeGateway::new(graphql_handler(
            "me",
            vec![("search-a", Ok(vec![pr_node(1, "me")]))],
        )),
        settings(&["a"], 300),
        Some("token"),
    );

    assert!(h.handle.refresh().await);
    let state = settled(&h.handle).await;

    assert_eq!(state.results()[0].pull_requests.len(), 1);
    assert_eq!(h.handle.current_user_login().as_deref(), Some("me"));
    assert!(h.handle.last_refresh_time().is_some());
}

#[tokio::test]
async fn test_failing_query_still_loads() {
    let h = spawn(
        FakeGateway::new(graphql_handler(
            "me",
            vec![
                ("search-a", Ok(vec![pr_node(1, "x")])),
                ("search-b", Err(ApiError::Http(502))),
                ("search-c", Ok(vec![pr_node(3, "x")])),
            ],
        )),
        settings(&["a", "b", "c"], 300),
        Some("token"),
    );

    h.handle.refresh().await;
    let state = settled(&h.handle).await;

    let RefreshState::Loaded(results) = state else {
        panic!("expected loaded, got {state:?}");
    };
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].pull_requests.len(), 1);
    assert!(results[1].pull_requests.is_empty());
    assert_eq!(results[2].pull_requests.len(), 1);
}

#[tokio::test]
async fn test_viewer_failure_surfaces_error() {
    let h = spawn(
        FakeGateway::new(|_: &prwatch::github::ApiRequest| {
            Err(ApiError::RateLimited { reset_at: None })
        }),
        settings(&["a"], 300),
        Some("token"),
    );

    h.handle.refresh().await;
    let state = settled(&h.handle).await;
    assert_eq!(
        state,
        RefreshState::Error(ApiError::RateLimited { reset_at: None }.user_message())
    );
    assert!(h.handle.last_refresh_time().is_none());
}

#[tokio::test]
async fn test_missing_credential_surfaces_error() {
    let h = spawn(
        FakeGateway::new(graphql_handler("me", vec![])),
        settings(&["a"], 300),
        None,
    );

    h.handle.refresh().await;
    let state = settled(&h.handle).await;
    assert_eq!(
        state,
        RefreshState::Error(ApiError::MissingCredential.user_message())
    );
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timer_triggers_cycles() {
    let h = spawn(
        FakeGateway::new(graphql_handler("me", vec![])),
        settings(&["a"], 60),
        Some("token"),
    );
    h.handle.start_auto_refresh(Duration::from_secs(60));

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(h.gateway.viewer_calls(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    settled(&h.handle).await;
    assert_eq!(h.gateway.viewer_calls(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.gateway.viewer_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_cancels_previous_timer() {
    let h = spawn(
        FakeGateway::new(graphql_handler("me", vec![])),
        settings(&["a"], 60),
        Some("token"),
    );
    h.handle.start_auto_refresh(Duration::from_secs(60));
    h.handle.start_auto_refresh(Duration::from_secs(100));

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(h.gateway.viewer_calls(), 0);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(h.gateway.viewer_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_auto_refresh() {
    let h = spawn(
        FakeGateway::new(graphql_handler("me", vec![])),
        settings(&["a"], 10),
        Some("token"),
    );
    h.handle.start_auto_refresh(Duration::from_secs(10));
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(h.gateway.viewer_calls(), 1);

    h.handle.stop_auto_refresh();
    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(h.gateway.viewer_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tick_during_cycle_does_not_start_another() {
    let (gateway, release) = FakeGateway::new(graphql_handler("me", vec![])).held();
    let h = spawn(gateway, settings(&["a"], 10), Some("token"));

    h.handle.start_auto_refresh(Duration::from_secs(10));
    assert!(h.handle.refresh().await);

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert!(h.handle.state().is_loading());
    assert_eq!(h.gateway.viewer_calls(), 1);

    release.send(true).unwrap();
    settled(&h.handle).await;
    assert_eq!(h.gateway.viewer_calls(), 1);
}

#[tokio::test]
async fn test_settings_change_triggers_refresh_with_new_queries() {
    let h = spawn(
        FakeGateway::new(graphql_handler(
            "me",
            vec![
                ("search-a", Ok(vec![pr_node(1, "x")])),
                ("search-b", Ok(vec![pr_node(2, "x")])),
            ],
        )),
        settings(&["a"], 300),
        Some("token"),
    );

    h.settings.replace(settings(&["b", "a"], 300));
    let state = settled(&h.handle).await;

    let ids: Vec<_> = state.results().iter().map(|r| r.query.id.clone()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(h.gateway.viewer_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_settings_change_rearms_timer() {
    let h = spawn(
        FakeGateway::new(graphql_handler("me", vec![])),
        settings(&["a"], 100),
        Some("token"),
    );
    h.handle.start_auto_refresh(Duration::from_secs(100));

    h.settings.replace(settings(&["a"], 20));
    settled(&h.handle).await;
    assert_eq!(h.gateway.viewer_calls(), 1);

    tokio::time::sleep(Duration::from_secs(21)).await;
    assert_eq!(h.gateway.viewer_calls(), 2);
}

#[tokio::test]
async fn test_shutdown_stops_loop() {
    let gateway = Arc::new(FakeGateway::new(graphql_handler("me", vec![])));
    let ctx = AppContext::new(
        gateway,
        Arc::new(MemorySettingsStore::new(settings(&["a"], 300))),
        Arc::new(MemorySecretStore::with_credential("token")),
        FetchOptions::default(),
    );
    let (handle, task) = Scheduler::spawn(ctx);

    handle.shutdown();
    task.await.unwrap();
    assert!(!handle.refresh().await);
}
