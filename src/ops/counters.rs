use serde::Serialize;

use crate::model::task::Task;

/// Completed/total counts over a whole forest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub completed: usize,
    pub total: usize,
}

/// Number of completed tasks at any depth
pub fn count_completed(roots: &[Task]) -> usize {
    roots
        .iter()
        .map(|t| usize::from(t.completed) + count_completed(&t.subtasks))
        .sum()
}

/// Number of tasks at any depth
pub fn count_total(roots: &[Task]) -> usize {
    roots.iter().map(|t| 1 + count_total(&t.subtasks)).sum()
}

pub fn stats(roots: &[Task]) -> TreeStats {
    TreeStats {
        completed: count_completed(roots),
        total: count_total(roots),
    }
}
