//! The fixed table of API operations a [`SwarmUser`](../user/struct.SwarmUser.html) can run.
//!
//! Each operation is a [`Task`] with a relative weight. Weights are configured with the
//! `--weights` run-time option (or [`SwarmDefault::Weights`](../config/enum.SwarmDefault.html#variant.Weights)),
//! for example:
//!
//! ```text
//! --weights "list-all=3,list-own=2,create=4,update=2,delete=1"
//! ```
//!
//! Any task not named keeps its default weight. A weight of 0 disables the task.
//!
//! The [`TaskCatalog`] is built one time when the load test starts and is then shared
//! read-only by all users.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::client::SwarmMethod;
use crate::pool::ResourcePool;
use crate::SwarmError;

lazy_static! {
    static ref WEIGHT_PAIR: Regex =
        Regex::new(r"^\s*(?P<task>[A-Za-z_\- ]+?)\s*[=:]\s*(?P<weight>\d+)\s*$")
            .expect("failed to compile weights regex");
}

/// Every operation the swarm knows how to perform against the notes API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, Serialize, Deserialize,
)]
pub enum TaskKind {
    /// Load every note.
    ListAll,
    /// Load the notes owned by the authenticated user.
    ListOwn,
    /// Create a note.
    Create,
    /// Update a note this user created.
    Update,
    /// Delete the oldest note this user created.
    Delete,
}

impl TaskKind {
    /// The short name used on the command line and in the task table.
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::ListAll => "list-all",
            TaskKind::ListOwn => "list-own",
            TaskKind::Create => "create",
            TaskKind::Update => "update",
            TaskKind::Delete => "delete",
        }
    }

    /// The route name requests are aggregated under.
    ///
    /// Requests for different note ids all share one label.
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::ListAll => "list all notes",
            TaskKind::ListOwn => "list own notes",
            TaskKind::Create => "create note",
            TaskKind::Update => "update note",
            TaskKind::Delete => "delete note",
        }
    }

    /// The HTTP method used to perform this task.
    pub fn method(&self) -> SwarmMethod {
        match self {
            TaskKind::ListAll | TaskKind::ListOwn => SwarmMethod::Get,
            TaskKind::Create => SwarmMethod::Post,
            TaskKind::Update => SwarmMethod::Put,
            TaskKind::Delete => SwarmMethod::Delete,
        }
    }

    /// Whether the task can run given the current state of the user's pool.
    pub fn is_eligible(&self, pool: &ResourcePool) -> bool {
        match self {
            TaskKind::ListAll | TaskKind::ListOwn | TaskKind::Create => true,
            TaskKind::Update => pool.eligible_for_update(),
            TaskKind::Delete => pool.eligible_for_delete(),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Allow `list-all`, `list_all`, `ListAll` and so on.
impl FromStr for TaskKind {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '_', ' '], "");
        TaskKind::iter()
            .find(|kind| kind.name().replace('-', "") == normalized)
            .ok_or_else(|| SwarmError::InvalidOption {
                option: "--weights".to_string(),
                value: s.to_string(),
                detail: format!(
                    "Unknown task, expected one of: {}",
                    TaskKind::iter()
                        .map(|kind| kind.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
    }
}

/// Relative weight of each task.
///
/// Defaults favor reads and creates over destructive operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWeights {
    pub list_all: usize,
    pub list_own: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl Default for TaskWeights {
    fn default() -> Self {
        TaskWeights {
            list_all: 3,
            list_own: 2,
            create: 4,
            update: 2,
            delete: 1,
        }
    }
}

impl TaskWeights {
    /// The weight configured for a given task.
    pub fn get(&self, kind: TaskKind) -> usize {
        match kind {
            TaskKind::ListAll => self.list_all,
            TaskKind::ListOwn => self.list_own,
            TaskKind::Create => self.create,
            TaskKind::Update => self.update,
            TaskKind::Delete => self.delete,
        }
    }

    /// Change the weight of one task.
    pub fn set(&mut self, kind: TaskKind, weight: usize) {
        match kind {
            TaskKind::ListAll => self.list_all = weight,
            TaskKind::ListOwn => self.list_own = weight,
            TaskKind::Create => self.create = weight,
            TaskKind::Update => self.update = weight,
            TaskKind::Delete => self.delete = weight,
        }
    }
}

impl fmt::Display for TaskWeights {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let weights = TaskKind::iter()
            .map(|kind| format!("{}={}", kind, self.get(kind)))
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}", weights)
    }
}

/// Parse `--weights` strings such as `create=4, delete=0`.
impl FromStr for TaskWeights {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut weights = TaskWeights::default();
        for entry in s.split(',').filter(|entry| !entry.trim().is_empty()) {
            let captures = WEIGHT_PAIR.captures(entry).ok_or_else(|| SwarmError::InvalidOption {
                option: "--weights".to_string(),
                value: s.to_string(),
                detail: format!("Invalid weight `{}`, expected TASK=WEIGHT.", entry.trim()),
            })?;
            let kind = captures["task"].parse::<TaskKind>()?;
            let weight = captures["weight"]
                .parse::<usize>()
                .map_err(|e| SwarmError::InvalidOption {
                    option: "--weights".to_string(),
                    value: s.to_string(),
                    detail: format!("Invalid weight for {}: {}", kind, e),
                })?;
            weights.set(kind, weight);
        }
        Ok(weights)
    }
}

/// One weighted operation in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Which operation this is.
    pub kind: TaskKind,
    /// Relative weight, 0 disables the task.
    pub weight: usize,
}

impl Task {
    /// The route name the task's requests are aggregated under.
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    /// Whether the task may be drawn right now.
    pub fn is_eligible(&self, pool: &ResourcePool) -> bool {
        self.weight > 0 && self.kind.is_eligible(pool)
    }
}

/// The complete, immutable set of tasks available to every user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCatalog {
    tasks: Vec<Task>,
}

impl TaskCatalog {
    /// Build the catalog from configured weights.
    ///
    /// At least one task must have a non-zero weight, and at least one of the
    /// always-eligible tasks (list-all, list-own, create) must be enabled or a user
    /// would have nothing to do with an empty pool.
    ///
    /// # Example
    /// ```rust
    /// use notesync_swarm::catalog::{TaskCatalog, TaskWeights};
    ///
    /// let catalog = TaskCatalog::new(&TaskWeights::default()).unwrap();
    /// assert_eq!(catalog.tasks().len(), 5);
    /// assert_eq!(catalog.total_weight(), 12);
    /// ```
    pub fn new(weights: &TaskWeights) -> Result<Self, SwarmError> {
        let tasks: Vec<Task> = TaskKind::iter()
            .map(|kind| Task {
                kind,
                weight: weights.get(kind),
            })
            .collect();

        if tasks.iter().all(|task| task.weight == 0) {
            return Err(SwarmError::NoTasks {
                detail: "All task weights are 0.".to_string(),
            });
        }

        let always_eligible = [TaskKind::ListAll, TaskKind::ListOwn, TaskKind::Create];
        if !tasks
            .iter()
            .any(|task| task.weight > 0 && always_eligible.contains(&task.kind))
        {
            return Err(SwarmError::InvalidWeight {
                weight: 0,
                detail: "At least one of list-all, list-own or create must have a non-zero weight."
                    .to_string(),
            });
        }

        // Draws sum the weights, the total must fit.
        if tasks
            .iter()
            .try_fold(0usize, |total, task| total.checked_add(task.weight))
            .is_none()
        {
            return Err(SwarmError::InvalidWeight {
                weight: tasks.iter().map(|task| task.weight).max().unwrap_or(0),
                detail: "The sum of all task weights is too large.".to_string(),
            });
        }

        Ok(TaskCatalog { tasks })
    }

    /// All tasks, including disabled ones.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> usize {
        self.tasks.iter().map(|task| task.weight).sum()
    }

    /// The tasks that may be drawn given the current pool.
    pub fn eligible<'a, 'p>(
        &'a self,
        pool: &'p ResourcePool,
    ) -> impl Iterator<Item = &'a Task> + 'p
    where
        'a: 'p,
    {
        self.tasks.iter().filter(move |task| task.is_eligible(pool))
    }

    /// Print the catalog, used by `--list`.
    pub fn print(&self) {
        println!("Available tasks:");
        for task in &self.tasks {
            println!(
                " - {} ({} {}, weight: {})",
                task.kind,
                task.kind.method(),
                task.label(),
                task.weight
            );
        }
    }
}
