use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::model::session::User;
use crate::model::task::Task;

/// Slot holding the serialized task tree
pub const TASKS_FILE: &str = "todos.json";
/// Slot holding the serialized session
pub const SESSION_FILE: &str = "user.json";

/// Error type for the local cache
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("could not serialize local state: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// The durable on-device cache: two independent JSON slots in one directory.
///
/// A slot that is missing or blank reads as `None`. A slot that does not
/// parse is moved aside to `<name>.bak` and also reads as `None`; if it
/// cannot be moved aside, the read fails and the slot is left in place.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Open (creating if needed) the cache directory
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|e| StoreError::WriteError {
            path: dir.to_path_buf(),
            source: e,
        })?;
        Ok(LocalStore {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn read_tasks(&self) -> Result<Option<Vec<Task>>, StoreError> {
        self.read_slot(TASKS_FILE)
    }

    pub fn write_tasks(&self, tasks: &[Task]) -> Result<(), StoreError> {
        self.write_slot(TASKS_FILE, tasks)
    }

    pub fn read_session(&self) -> Result<Option<User>, StoreError> {
        self.read_slot(SESSION_FILE)
    }

    pub fn write_session(&self, user: &User) -> Result<(), StoreError> {
        self.write_slot(SESSION_FILE, user)
    }

    pub fn clear_session(&self) -> Result<(), StoreError> {
        self.remove_slot(SESSION_FILE)
    }

    fn read_slot<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        let path = self.dir.join(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::ReadError { path, source: e }),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let bak = path.with_extension("json.bak");
                // Without a backup the caller must not overwrite the slot
                fs::rename(&path, &bak).map_err(|source| StoreError::WriteError {
                    path: bak.clone(),
                    source,
                })?;
                warn!(
                    slot = name,
                    backup = %bak.display(),
                    error = %e,
                    "could not parse local slot; moved it aside"
                );
                Ok(None)
            }
        }
    }

    fn write_slot<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let path = self.dir.join(name);
        let content = serde_json::to_string_pretty(value)?;
        atomic_write(&path, content.as_bytes())
            .map_err(|e| StoreError::WriteError { path, source: e })?;
        debug!(slot = name, bytes = content.len(), "wrote local slot");
        Ok(())
    }

    fn remove_slot(&self, name: &str) -> Result<(), StoreError> {
        let path = self.dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::WriteError { path, source: e }),
        }
    }
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn deep_tree() -> Vec<Task> {
        let mut leaf = Task::new("3".into(), "leaf".into(), "🦄".into());
        leaf.completed = true;
        let mut mid = Task::new("2".into(), "mid".into(), "🌸".into());
        mid.subtasks.push(leaf);
        mid.is_expanded = true;
        let mut root = Task::new("1".into(), "root".into(), "🎪".into());
        root.subtasks.push(mid);
        root.subtasks.push(Task::new("4".into(), "sibling".into(), "🎭".into()));
        vec![root, Task::new("5".into(), "second root".into(), "🌟".into())]
    }

    #[test]
    fn missing_slots_read_as_none() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).unwrap();
        assert!(store.read_tasks().unwrap().is_none());
        assert!(store.read_session().unwrap().is_none());
    }

    #[test]
    fn open_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested/data");
        let store = LocalStore::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir.as_path());
    }

    #[test]
    fn deep_tree_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).unwrap();
        let tree = deep_tree();
        store.write_tasks(&tree).unwrap();
        assert_eq!(store.read_tasks().unwrap(), Some(tree));
    }

    #[test]
    fn empty_list_is_not_absent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).unwrap();
        store.write_tasks(&[]).unwrap();
        assert_eq!(store.read_tasks().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn blank_slot_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(TASKS_FILE), "  \n").unwrap();
        let store = LocalStore::open(tmp.path()).unwrap();
        assert!(store.read_tasks().unwrap().is_none());
    }

    #[test]
    fn corrupt_slot_is_backed_up() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(TASKS_FILE), "not json {{{").unwrap();
        let store = LocalStore::open(tmp.path()).unwrap();
        assert!(store.read_tasks().unwrap().is_none());
        assert!(!tmp.path().join(TASKS_FILE).exists());
        let bak = fs::read_to_string(tmp.path().join("todos.json.bak")).unwrap();
        assert_eq!(bak, "not json {{{");
    }

    #[test]
    fn corrupt_slot_stays_put_when_backup_fails() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(TASKS_FILE), "not json {{{").unwrap();
        let blocker = tmp.path().join("todos.json.bak");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();

        let store = LocalStore::open(tmp.path()).unwrap();
        assert!(matches!(
            store.read_tasks(),
            Err(StoreError::WriteError { .. })
        ));
        let left = fs::read_to_string(tmp.path().join(TASKS_FILE)).unwrap();
        assert_eq!(left, "not json {{{");
    }

    #[test]
    fn session_slot_write_read_clear() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).unwrap();
        let user = User {
            id: 9,
            email: "me@example.com".into(),
        };
        store.write_session(&user).unwrap();
        assert_eq!(store.read_session().unwrap(), Some(user));
        store.clear_session().unwrap();
        assert!(store.read_session().unwrap().is_none());
        // Clearing twice is fine
        store.clear_session().unwrap();
    }

    #[test]
    fn slots_are_independent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).unwrap();
        store.write_tasks(&deep_tree()).unwrap();
        store
            .write_session(&User {
                id: 1,
                email: "x@y.z".into(),
            })
            .unwrap();
        store.clear_session().unwrap();
        assert_eq!(store.read_tasks().unwrap(), Some(deep_tree()));
    }
}
