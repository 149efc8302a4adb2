use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Decorative emoji assigned to a task at creation
pub const EMOJI_POOL: [&str; 10] = ["🌟", "🎨", "🚀", "🌈", "✨", "🎭", "🦄", "🌸", "🎪", "🎯"];

/// A node in the task forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Tree-unique ID, minted from the creation timestamp
    pub id: String,
    /// User-supplied label
    pub text: String,
    /// Completion flag (never propagated to parents or children)
    pub completed: bool,
    /// Child tasks, owned exclusively by this node
    #[serde(default)]
    pub subtasks: Vec<Task>,
    /// Whether the children are shown when rendering
    #[serde(default)]
    pub is_expanded: bool,
    /// Decorative emoji from [`EMOJI_POOL`]
    #[serde(default)]
    pub emoji: String,
}

impl Task {
    /// Create a fresh, incomplete, collapsed task with no children
    pub fn new(id: String, text: String, emoji: String) -> Self {
        Task {
            id,
            text,
            completed: false,
            subtasks: Vec::new(),
            is_expanded: false,
            emoji,
        }
    }

    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }
}

/// The tree shown on first run, before anything has been cached.
pub fn default_tree() -> Vec<Task> {
    vec![Task {
        id: "1".into(),
        text: "Create project".into(),
        completed: true,
        is_expanded: true,
        emoji: "🚀".into(),
        subtasks: vec![Task {
            id: "1-1".into(),
            text: "Think of idea".into(),
            completed: true,
            is_expanded: false,
            emoji: "💡".into(),
            subtasks: Vec::new(),
        }],
    }]
}

/// Positional address of a node: `[root index, child index, ...]`.
///
/// Paths are only valid for the tree they were computed against. Any
/// insertion or deletion of an earlier sibling along the path shifts them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskPath(Vec<usize>);

impl TaskPath {
    pub fn new(indices: Vec<usize>) -> Self {
        TaskPath(indices)
    }

    pub fn root(index: usize) -> Self {
        TaskPath(vec![index])
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of the `index`-th child of this node
    pub fn child(&self, index: usize) -> TaskPath {
        let mut indices = self.0.clone();
        indices.push(index);
        TaskPath(indices)
    }

    /// Path of the containing node, or `None` for roots and the empty path
    pub fn parent(&self) -> Option<TaskPath> {
        if self.0.len() < 2 {
            return None;
        }
        Some(TaskPath(self.0[..self.0.len() - 1].to_vec()))
    }
}

impl From<Vec<usize>> for TaskPath {
    fn from(indices: Vec<usize>) -> Self {
        TaskPath(indices)
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathParseError {
    #[error("empty path")]
    Empty,
    #[error("invalid path segment '{0}': expected a non-negative integer")]
    BadSegment(String),
}

impl FromStr for TaskPath {
    type Err = PathParseError;

    /// Parse the dotted form, e.g. `0.2.1`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PathParseError::Empty);
        }
        let indices = s
            .split('.')
            .map(|seg| {
                seg.parse::<usize>()
                    .map_err(|_| PathParseError::BadSegment(seg.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TaskPath(indices))
    }
}
