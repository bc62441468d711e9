//! Integrity Repair Background Job
//!
//! Follow edges and post deletions span several documents without a shared
//! transaction, so a crash between steps can leave:
//! - comments whose post is gone (interrupted cascade)
//! - post `comment_ids` entries whose comment is gone (interrupted detach)
//! - follow edges present on only one of the two user documents
//!
//! Each cycle detects and repairs all three. `source.following` is the
//! authoritative side for follow edges: a missing `followers` entry is
//! added, a `followers` entry without its `following` counterpart is removed.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::domain::User;
use crate::metrics;
use crate::store::EdgeSide;

/// Repairs applied during one cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
    pub orphaned_comments: usize,
    pub dangling_refs: usize,
    pub edges_completed: usize,
    pub edges_retracted: usize,
}

impl RepairReport {
    pub fn total(&self) -> usize {
        self.orphaned_comments + self.dangling_refs + self.edges_completed + self.edges_retracted
    }
}

pub async fn start_integrity_repair(state: AppState, interval: Duration) {
    info!(
        interval_secs = interval.as_secs(),
        "Starting integrity repair background job"
    );

    loop {
        sleep(interval).await;

        let cycle_start = Instant::now();
        match run_repair_cycle(&state).await {
            Ok(report) => {
                metrics::record_repair_run("success");
                info!(
                    orphaned_comments = report.orphaned_comments,
                    dangling_refs = report.dangling_refs,
                    edges_completed = report.edges_completed,
                    edges_retracted = report.edges_retracted,
                    duration_ms = cycle_start.elapsed().as_millis() as u64,
                    "Integrity repair cycle completed"
                );
            }
            Err(e) => {
                metrics::record_repair_run("error");
                error!(
                    error = ?e,
                    duration_ms = cycle_start.elapsed().as_millis() as u64,
                    "Integrity repair cycle failed"
                );
            }
        }
    }
}

/// Run one detection and repair pass.
pub async fn run_repair_cycle(state: &AppState) -> Result<RepairReport> {
    let orphaned_comments = sweep_orphaned_comments(state).await?;
    metrics::record_repair("orphaned_comment", orphaned_comments);

    let dangling_refs = detach_dangling_refs(state).await?;
    metrics::record_repair("dangling_comment_ref", dangling_refs);

    let (edges_completed, edges_retracted) = repair_follow_edges(state).await?;
    metrics::record_repair("edge_completed", edges_completed);
    metrics::record_repair("edge_retracted", edges_retracted);

    Ok(RepairReport {
        orphaned_comments,
        dangling_refs,
        edges_completed,
        edges_retracted,
    })
}

async fn sweep_orphaned_comments(state: &AppState) -> Result<usize> {
    let post_ids = state
        .store
        .orphaned_comment_post_ids()
        .await
        .context("Failed to list orphaned comments")?;

    let mut swept = 0;
    for post_id in post_ids {
        match state.cascade.sweep_comments(post_id, "repair").await {
            Ok(n) => swept += n,
            Err(e) => {
                warn!(
                    post_id = %post_id,
                    code = e.code(),
                    error = %e,
                    "Orphaned comment sweep failed; will retry next cycle"
                );
            }
        }
    }
    Ok(swept)
}

async fn detach_dangling_refs(state: &AppState) -> Result<usize> {
    let refs = state
        .store
        .dangling_comment_refs()
        .await
        .context("Failed to list dangling comment references")?;

    let mut detached = 0;
    for (post_id, comment_id) in refs {
        if state
            .store
            .pull_comment_ref(post_id, comment_id)
            .await
            .with_context(|| format!("Failed to detach comment {} from post {}", comment_id, post_id))?
        {
            debug!(post_id = %post_id, comment_id = %comment_id, "Detached dangling comment reference");
            detached += 1;
        }
    }
    Ok(detached)
}

/// Returns `(edges completed, edges retracted)`.
async fn repair_follow_edges(state: &AppState) -> Result<(usize, usize)> {
    let users: HashMap<Uuid, User> = state
        .store
        .list_users()
        .await
        .context("Failed to list users")?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let mut completed = 0;
    let mut retracted = 0;

    for user in users.values() {
        for &target in &user.following {
            match users.get(&target) {
                None => {
                    if mutate(state, user.id, EdgeSide::Following, target, false).await? {
                        retracted += 1;
                    }
                }
                Some(t) if !t.is_followed_by(user.id) => {
                    if mutate(state, target, EdgeSide::Followers, user.id, true).await? {
                        completed += 1;
                    }
                }
                Some(_) => {}
            }
        }

        for &source in &user.followers {
            let backed = users
                .get(&source)
                .map(|s| s.is_following(user.id))
                .unwrap_or(false);
            if !backed && mutate(state, user.id, EdgeSide::Followers, source, false).await? {
                retracted += 1;
            }
        }
    }

    Ok((completed, retracted))
}

async fn mutate(
    state: &AppState,
    user_id: Uuid,
    side: EdgeSide,
    member: Uuid,
    add: bool,
) -> Result<bool> {
    let outcome = if add {
        state.store.add_edge(user_id, side, member).await
    } else {
        state.store.remove_edge(user_id, side, member).await
    }
    .with_context(|| format!("Failed to repair {} of user {}", side.as_str(), user_id))?;

    let changed = outcome.map(|m| m.changed).unwrap_or(false);
    if changed {
        info!(
            user_id = %user_id,
            side = side.as_str(),
            member = %member,
            added = add,
            "Repaired follow edge"
        );
    }
    Ok(changed)
}
