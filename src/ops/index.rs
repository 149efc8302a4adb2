//! Id-based addressing on top of positional paths.
//!
//! Positional paths shift whenever an earlier sibling is inserted or removed.
//! The index maps each task id to where that task currently lives, so a
//! caller can keep a stable `#id` and turn it into a path right before each
//! mutation. It is a snapshot: rebuild it after every change to the tree.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::model::task::{PathParseError, Task, TaskPath};
use crate::ops::task_ops::TaskError;

/// How a caller names a task: by position (`0.2`) or by id (`#1718000000000`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Path(TaskPath),
    Id(String),
}

impl Target {
    /// Turn the target into a path against the current tree.
    pub fn resolve(&self, roots: &[Task]) -> Result<TaskPath, TaskError> {
        match self {
            Target::Path(path) => {
                crate::ops::path::resolve(roots, path)?;
                Ok(path.clone())
            }
            Target::Id(id) => TaskIndex::build(roots).path_of(id),
        }
    }
}

impl FromStr for Target {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().strip_prefix('#') {
            Some(id) if id.is_empty() => Err(PathParseError::Empty),
            Some(id) => Ok(Target::Id(id.to_string())),
            None => Ok(Target::Path(s.parse()?)),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Path(path) => write!(f, "{}", path),
            Target::Id(id) => write!(f, "#{}", id),
        }
    }
}

/// Location of one task in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: TaskPath,
    /// Id of the containing task, `None` for roots
    pub parent: Option<String>,
    /// 0 for roots
    pub depth: usize,
}

/// Id → location, in depth-first document order.
#[derive(Debug, Clone, Default)]
pub struct TaskIndex {
    entries: IndexMap<String, IndexEntry>,
    duplicates: Vec<String>,
}

impl TaskIndex {
    pub fn build(roots: &[Task]) -> Self {
        let mut index = TaskIndex::default();
        index.visit(roots, &TaskPath::default(), None);
        index
    }

    fn visit(&mut self, tasks: &[Task], prefix: &TaskPath, parent: Option<&str>) {
        for (i, task) in tasks.iter().enumerate() {
            let path = prefix.child(i);
            let entry = IndexEntry {
                depth: path.len() - 1,
                path: path.clone(),
                parent: parent.map(str::to_string),
            };
            // First occurrence wins; later ones are reported as duplicates
            if self.entries.contains_key(&task.id) {
                self.duplicates.push(task.id.clone());
            } else {
                self.entries.insert(task.id.clone(), entry);
            }
            self.visit(&task.subtasks, &path, Some(&task.id));
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    /// Current path of the task with `id`
    pub fn path_of(&self, id: &str) -> Result<TaskPath, TaskError> {
        self.entries
            .get(id)
            .map(|e| e.path.clone())
            .ok_or_else(|| TaskError::UnknownId(id.to_string()))
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.entries.get(id).and_then(|e| e.parent.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids seen more than once. Trees built through `task_ops` never have any,
    /// but a hand-edited cache or a remote payload might.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexEntry)> {
        self.entries.iter().map(|(id, e)| (id.as_str(), e))
    }
}
