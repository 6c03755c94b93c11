mod common;

use chrono::{Duration, Utc};

use common::{completed, pull_request, query};
use prwatch::app::state::{QueryResult, RefreshState, Snapshot};
use prwatch::app::view::render_summary;
use prwatch::github::models::CheckConclusion;
use prwatch::util::config::DisplayLayout;

fn loaded(results: Vec<QueryResult>) -> Snapshot {
    Snapshot {
        state: RefreshState::Loaded(results),
        current_user_login: Some("me".into()),
        last_refresh: Some(Utc::now() - Duration::minutes(5)),
    }
}

#[test]
fn test_detailed_layout_lists_each_pr() {
    let mut failing = pull_request(12, "me");
    failing.title = "Fix the flake".into();
    failing.check_runs = vec![completed(1, CheckConclusion::Failure)];

    let snapshot = loaded(vec![QueryResult {
        query: query("mine"),
        pull_requests: vec![failing, pull_request(13, "me")],
    }]);
    let out = render_summary(&snapshot, Utc::now());

    assert!(out.starts_with("me | 1 pending | refreshed 5m ago\n"));
    assert!(out.contains("== MINE (2) =="));
    assert!(out.contains("x acme/widgets#12 Fix the flake"));
    assert!(out.contains("failing"));
    assert!(out.contains("? acme/widgets#13"));
}

#[test]
fn test_compact_layout_shows_counts_only() {
    let mut q = query("team");
    q.layout = DisplayLayout::Compact;
    let mut green = pull_request(1, "x");
    green.check_runs = vec![completed(1, CheckConclusion::Success)];

    let snapshot = loaded(vec![QueryResult {
        query: q,
        pull_requests: vec![green, pull_request(2, "x")],
    }]);
    let out = render_summary(&snapshot, Utc::now());

    assert!(out.contains("1 passing, 0 failing, 0 running, 1 unknown"));
    assert!(!out.contains("#1"));
}

#[test]
fn test_error_and_idle_states() {
    let snapshot = Snapshot {
        state: RefreshState::Error("Could not reach GitHub.".into()),
        ..Snapshot::default()
    };
    let out = render_summary(&snapshot, Utc::now());
    assert!(out.starts_with("? | 0 pending | refreshed never\n"));
    assert!(out.contains("Error: Could not reach GitHub."));

    let out = render_summary(&Snapshot::default(), Utc::now());
    assert!(out.contains("Not refreshed yet"));
}
