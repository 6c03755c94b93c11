use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::app::state::{QueryResult, RefreshState, Snapshot};
use crate::github::models::PullRequest;
use crate::reconcile::{UnifiedStatus, reconcile};
use crate::util::config::DisplayLayout;
use crate::util::time::relative_time_from;

/// Plain-text rendering of a snapshot for terminal output.
pub fn render_summary(snapshot: &Snapshot, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    let login = snapshot.current_user_login.as_deref().unwrap_or("?");
    let refreshed = snapshot
        .last_refresh
        .map(|t| relative_time_from(&t, now))
        .unwrap_or_else(|| "never".to_string());
    let _ = writeln!(
        out,
        "{} | {} pending | refreshed {}",
        login,
        snapshot.pending_actions_count(),
        refreshed
    );

    match &snapshot.state {
        RefreshState::Idle => out.push_str("Not refreshed yet\n"),
        RefreshState::Loading => out.push_str("Refreshing...\n"),
        RefreshState::Error(message) => {
            let _ = writeln!(out, "Error: {message}");
        }
        RefreshState::Loaded(results) => {
            for result in results {
                render_query(&mut out, result, now);
            }
        }
    }

    out
}

fn render_query(out: &mut String, result: &QueryResult, now: DateTime<Utc>) {
    let prs = &result.pull_requests;
    let _ = writeln!(out, "== {} ({}) ==", result.query.title, prs.len());

    match result.query.layout {
        DisplayLayout::Compact => {
            let count = |status: UnifiedStatus| {
                prs.iter().filter(|pr| reconcile(pr) == status).count()
            };
            let _ = writeln!(
                out,
                "  {} passing, {} failing, {} running, {} unknown",
                count(UnifiedStatus::Success),
                count(UnifiedStatus::Failed),
                count(UnifiedStatus::InProgress),
                count(UnifiedStatus::Unknown),
            );
        }
        DisplayLayout::Detailed => {
            for pr in prs {
                render_pr(out, pr, now);
            }
        }
    }
}

fn render_pr(out: &mut String, pr: &PullRequest, now: DateTime<Utc>) {
    let status = reconcile(pr);
    let marker = match status {
        UnifiedStatus::Success => '+',
        UnifiedStatus::Failed => 'x',
        UnifiedStatus::InProgress => '~',
        UnifiedStatus::Unknown => '?',
    };
    let repo = pr.repo_full_name().unwrap_or_else(|| "?".to_string());
    let draft = if pr.is_draft { " [draft]" } else { "" };
    let _ = writeln!(
        out,
        "  {marker} {repo}#{} {}{draft} ({}, {}) {}",
        pr.number,
        pr.title,
        pr.author,
        relative_time_from(&pr.updated_at, now),
        status.label(),
    );
}
