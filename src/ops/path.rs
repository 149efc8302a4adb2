//! Positional path resolution.
//!
//! A path resolves to the sequence that directly contains the target plus the
//! target's index in it. Every index is bounds-checked; an out-of-range index
//! at any depth yields [`TaskError::NotFound`].

use crate::model::task::{Task, TaskPath};
use crate::ops::task_ops::TaskError;

/// Resolve `path` to `(containing sequence, index)`.
pub fn resolve<'a>(roots: &'a [Task], path: &TaskPath) -> Result<(&'a [Task], usize), TaskError> {
    let (&last, parents) = path.indices().split_last().ok_or(TaskError::EmptyPath)?;
    let mut current = roots;
    for &i in parents {
        current = current
            .get(i)
            .ok_or_else(|| TaskError::NotFound(path.clone()))?
            .subtasks
            .as_slice();
    }
    if last >= current.len() {
        return Err(TaskError::NotFound(path.clone()));
    }
    Ok((current, last))
}

/// Mutable counterpart of [`resolve`].
pub fn resolve_mut<'a>(
    roots: &'a mut Vec<Task>,
    path: &TaskPath,
) -> Result<(&'a mut Vec<Task>, usize), TaskError> {
    let (&last, parents) = path.indices().split_last().ok_or(TaskError::EmptyPath)?;
    let mut current = roots;
    for &i in parents {
        current = &mut current
            .get_mut(i)
            .ok_or_else(|| TaskError::NotFound(path.clone()))?
            .subtasks;
    }
    if last >= current.len() {
        return Err(TaskError::NotFound(path.clone()));
    }
    Ok((current, last))
}

/// The task at `path`
pub fn get<'a>(roots: &'a [Task], path: &TaskPath) -> Result<&'a Task, TaskError> {
    let (seq, i) = resolve(roots, path)?;
    Ok(&seq[i])
}

/// The task at `path`, mutably
pub fn get_mut<'a>(roots: &'a mut Vec<Task>, path: &TaskPath) -> Result<&'a mut Task, TaskError> {
    let (seq, i) = resolve_mut(roots, path)?;
    Ok(&mut seq[i])
}
