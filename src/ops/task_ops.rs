use chrono::Utc;
use rand::Rng;

use crate::model::task::{EMOJI_POOL, Task, TaskPath};
use crate::ops::index::TaskIndex;
use crate::ops::path;

/// Error type for task operations
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task text cannot be empty")]
    EmptyText,
    #[error("a task path needs at least one index")]
    EmptyPath,
    #[error("no task at path {0}")]
    NotFound(TaskPath),
    #[error("no task with id #{0}")]
    UnknownId(String),
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Build a new task for insertion into `roots`.
///
/// The text must contain something other than whitespace; it is stored as
/// given. The id is the current timestamp in milliseconds, bumped past any id
/// already present in the tree.
pub fn new_task(roots: &[Task], text: &str) -> Result<Task, TaskError> {
    if text.trim().is_empty() {
        return Err(TaskError::EmptyText);
    }
    Ok(Task::new(mint_id(roots), text.to_string(), random_emoji()))
}

/// Append a new task, at the root (`parent = None`) or under `parent`.
/// Adding under a parent expands it so the new child is visible.
pub fn add_task(
    roots: &[Task],
    text: &str,
    parent: Option<&TaskPath>,
) -> Result<Vec<Task>, TaskError> {
    let task = new_task(roots, text)?;
    insert_task(roots, task, parent)
}

/// Append an already-built task. See [`add_task`].
pub fn insert_task(
    roots: &[Task],
    task: Task,
    parent: Option<&TaskPath>,
) -> Result<Vec<Task>, TaskError> {
    let mut next = roots.to_vec();
    match parent {
        None => next.push(task),
        Some(parent_path) => {
            let parent = path::get_mut(&mut next, parent_path)?;
            parent.subtasks.push(task);
            parent.is_expanded = true;
        }
    }
    Ok(next)
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// Flip `completed` on one node. Parents and children are left alone.
pub fn toggle_completed(roots: &[Task], at: &TaskPath) -> Result<Vec<Task>, TaskError> {
    let mut next = roots.to_vec();
    let task = path::get_mut(&mut next, at)?;
    task.completed = !task.completed;
    Ok(next)
}

/// Flip `is_expanded` on one node.
pub fn toggle_expanded(roots: &[Task], at: &TaskPath) -> Result<Vec<Task>, TaskError> {
    let mut next = roots.to_vec();
    let task = path::get_mut(&mut next, at)?;
    task.is_expanded = !task.is_expanded;
    Ok(next)
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

/// Remove the node at `at` together with its whole subtree.
pub fn delete_task(roots: &[Task], at: &TaskPath) -> Result<Vec<Task>, TaskError> {
    let mut next = roots.to_vec();
    let (siblings, index) = path::resolve_mut(&mut next, at)?;
    siblings.remove(index);
    Ok(next)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn mint_id(roots: &[Task]) -> String {
    let index = TaskIndex::build(roots);
    let mut candidate = Utc::now().timestamp_millis();
    while index.contains(&candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

fn random_emoji() -> String {
    let i = rand::rng().random_range(0..EMOJI_POOL.len());
    EMOJI_POOL[i].to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
