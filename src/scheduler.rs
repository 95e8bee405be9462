//! Picks and runs one task per cycle for an active user.
//!
//! Each cycle:
//!  1. filters the [`TaskCatalog`] down to the tasks eligible for the user's pool,
//!  2. draws one of them at random, proportionally to its weight,
//!  3. runs it, recording the outcome and updating the pool,
//!  4. sleeps a random think time before the next cycle.
//!
//! Failures are recorded and never retried; the next cycle simply draws again.

use rand::Rng;
use std::time::Duration;

use crate::catalog::{Task, TaskCatalog, TaskKind};
use crate::client::{Expect, SwarmMethod, Target};
use crate::metrics::Outcome;
use crate::pool::ResourcePool;
use crate::user::{SwarmUser, SwarmUserCommand};

/// Default minimum think time between cycles, in milliseconds.
pub const DEFAULT_MIN_THINK_TIME: usize = 1_000;
/// Default maximum think time between cycles, in milliseconds.
pub const DEFAULT_MAX_THINK_TIME: usize = 2_000;

/// Never sleep more than this many milliseconds at once, so exiting stays responsive.
const MAXIMUM_SLEEP_TIME: u64 = 500;

/// Draw one eligible task, weighted.
///
/// Returns `None` only if no task is eligible, which a valid catalog never allows.
///
/// # Example
/// ```rust
/// use notesync_swarm::catalog::{TaskCatalog, TaskKind, TaskWeights};
/// use notesync_swarm::pool::ResourcePool;
/// use notesync_swarm::scheduler::select_task;
///
/// let catalog = TaskCatalog::new(&TaskWeights::default()).unwrap();
/// let pool = ResourcePool::default();
/// let task = select_task(&catalog, &pool, &mut rand::rng()).unwrap();
/// // An empty pool can't be updated or deleted from.
/// assert!(!matches!(task.kind, TaskKind::Update | TaskKind::Delete));
/// ```
pub fn select_task<'a, R: Rng + ?Sized>(
    catalog: &'a TaskCatalog,
    pool: &ResourcePool,
    rng: &mut R,
) -> Option<&'a Task> {
    let total: usize = catalog.eligible(pool).map(|task| task.weight).sum();
    if total == 0 {
        return None;
    }

    let mut draw = rng.random_range(0..total);
    for task in catalog.eligible(pool) {
        if draw < task.weight {
            return Some(task);
        }
        draw -= task.weight;
    }
    None
}

/// Run one scheduler cycle. Inactive sessions never run tasks.
pub(crate) async fn run_cycle(user: &mut SwarmUser) -> Option<(TaskKind, Outcome)> {
    if !user.session.is_active() {
        debug!("user {}: session not active, not scheduling", user.index);
        return None;
    }

    let catalog = user.catalog.clone();
    let kind = match select_task(&catalog, &user.pool, &mut user.rng) {
        Some(task) => task.kind,
        None => {
            warn!("user {}: no eligible task", user.index);
            return None;
        }
    };

    let outcome = execute_task(user, kind).await?;
    Some((kind, outcome))
}

/// Perform one task and apply its effect on the pool.
pub(crate) async fn execute_task(user: &mut SwarmUser, kind: TaskKind) -> Option<Outcome> {
    let routes = user.client.routes.clone();
    let outcome = match kind {
        TaskKind::ListAll | TaskKind::ListOwn => {
            let path = if kind == TaskKind::ListAll {
                routes.list_all()
            } else {
                routes.list_own()
            };
            user.request(
                Target::Api,
                kind.label(),
                Some(kind),
                SwarmMethod::Get,
                &path,
                None,
                Expect::Json,
            )
            .await
            .1
        }
        TaskKind::Create => user.create_note(kind.label(), Some(kind)).await,
        TaskKind::Update => {
            let id = user
                .pool
                .sample_for_update(&mut user.rng)
                .map(str::to_string)?;
            let note = serde_json::json!({
                "title": format!("{} note {} (edited)", user.session.identity().username, id),
                "content": format!("Updated by user {}.", user.index),
            });
            user.request(
                Target::Api,
                kind.label(),
                Some(kind),
                SwarmMethod::Put,
                &routes.note(&id),
                Some(&note),
                Expect::Nothing,
            )
            .await
            .1
        }
        TaskKind::Delete => {
            // Gone from the pool whatever the response.
            let id = user.pool.pop_oldest_for_delete()?;
            user.request(
                Target::Api,
                kind.label(),
                Some(kind),
                SwarmMethod::Delete,
                &routes.note(&id),
                None,
                Expect::Nothing,
            )
            .await
            .1
        }
    };
    Some(outcome)
}

/// Random think time in `[min, max]` milliseconds.
pub fn think_time<R: Rng + ?Sized>(min: usize, max: usize, rng: &mut R) -> usize {
    if max <= min {
        min
    } else {
        rng.random_range(min..=max)
    }
}

/// Sleep between cycles. Returns true if the user was asked to exit.
pub(crate) async fn pace(
    user: &mut SwarmUser,
    receiver: &flume::Receiver<SwarmUserCommand>,
) -> bool {
    let (min, max) = user.config.think_time();
    let mut wait_time = think_time(min, max, &mut user.rng) as u64;

    while wait_time > 0 {
        if user.received_exit(receiver) {
            return true;
        }
        let sleep_duration = wait_time.min(MAXIMUM_SLEEP_TIME);
        wait_time -= sleep_duration;
        trace!("user {} sleeping {} ms...", user.index, sleep_duration);
        tokio::time::sleep(Duration::from_millis(sleep_duration)).await;
    }

    user.received_exit(receiver)
}
