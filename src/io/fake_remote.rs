//! In-process stand-ins for the remote endpoints, for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::io::remote::{IdentityService, RemoteError, TaskStore};
use crate::model::session::User;
use crate::model::task::Task;

pub fn offline_error() -> RemoteError {
    RemoteError::Connectivity {
        url: "fake://remote".into(),
        message: "connection refused".into(),
    }
}

/// Remote task store keeping one tree per process, recording every push.
#[derive(Default)]
pub struct FakeStore {
    pub tree: Mutex<Vec<Task>>,
    pub pushes: Mutex<Vec<(i64, Vec<Task>)>>,
    pub fetches: AtomicUsize,
    pub offline: AtomicBool,
}

impl FakeStore {
    pub fn with_tree(tree: Vec<Task>) -> Self {
        let store = FakeStore::default();
        *store.tree.lock().unwrap() = tree;
        store
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn pushes(&self) -> Vec<(i64, Vec<Task>)> {
        self.pushes.lock().unwrap().clone()
    }
}

impl TaskStore for FakeStore {
    fn fetch(&self, _user_id: i64) -> Result<Vec<Task>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(offline_error());
        }
        Ok(self.tree.lock().unwrap().clone())
    }

    fn push(&self, user_id: i64, tasks: &[Task]) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(offline_error());
        }
        *self.tree.lock().unwrap() = tasks.to_vec();
        self.pushes.lock().unwrap().push((user_id, tasks.to_vec()));
        Ok(())
    }
}

/// Identity endpoint returning a fixed response.
pub struct FakeIdentity {
    pub response: Result<User, RemoteError>,
    pub calls: AtomicUsize,
    pub last_email: Mutex<Option<String>>,
}

impl FakeIdentity {
    pub fn accepting(id: i64) -> Self {
        FakeIdentity {
            response: Ok(User {
                id,
                email: String::new(),
            }),
            calls: AtomicUsize::new(0),
            last_email: Mutex::new(None),
        }
    }

    pub fn failing(err: RemoteError) -> Self {
        FakeIdentity {
            response: Err(err),
            calls: AtomicUsize::new(0),
            last_email: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdentityService for FakeIdentity {
    fn login(&self, email: &str) -> Result<User, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_email.lock().unwrap() = Some(email.to_string());
        // Echo the email back the way the real endpoint does
        self.response.clone().map(|u| User {
            id: u.id,
            email: email.to_string(),
        })
    }
}
