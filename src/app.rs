//! The application context: the task tree, the session and the persistence
//! machinery, owned by one value.
//!
//! [`App::open`] takes the data directory lock and runs the initial load;
//! [`App::close`] waits for queued remote pushes. Every mutation goes through
//! `commit`, which persists before replacing the in-memory tree, so a failed
//! local write leaves the state untouched.

use std::path::Path;

use tracing::{debug, info};

use crate::io::config_io::ConfigError;
use crate::io::gateway::{LoadOutcome, LoadSource, PersistenceGateway};
use crate::io::local_store::{LocalStore, StoreError};
use crate::io::lock::{LockError, StoreLock};
use crate::io::remote::{RemoteError, Services};
use crate::model::config::AppConfig;
use crate::model::session::User;
use crate::model::task::{PathParseError, Task, TaskPath};
use crate::ops::counters::{self, TreeStats};
use crate::ops::identity::{IdentityError, IdentitySession, normalize_email};
use crate::ops::index::Target;
use crate::ops::path;
use crate::ops::task_ops::{self, TaskError};

/// Coarse classification of [`AppError`] for callers that only need to know
/// what kind of thing went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input: empty text or email, malformed or dangling target
    Validation,
    /// The server rejected the credentials, or there is no session
    Auth,
    /// The server could not be reached
    Connectivity,
    /// Local disk state could not be read or written
    Storage,
    /// Configuration problem
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Target(#[from] PathParseError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not encode config: {0}")]
    Toml(#[from] toml::ser::Error),
    #[error("not logged in (run `tw login <email>`)")]
    NotLoggedIn,
    #[error("no task store endpoint configured (set remote.tasks_url)")]
    SyncUnavailable,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Task(_) | AppError::Target(_) => ErrorKind::Validation,
            AppError::Identity(e) => match e {
                IdentityError::EmptyEmail | IdentityError::LoginInProgress => {
                    ErrorKind::Validation
                }
                IdentityError::Rejected(_) => ErrorKind::Auth,
                IdentityError::Connectivity(_) => ErrorKind::Connectivity,
                IdentityError::Unavailable => ErrorKind::Config,
            },
            AppError::Remote(RemoteError::Status { .. }) => ErrorKind::Auth,
            AppError::Remote(RemoteError::Setup { .. }) => ErrorKind::Config,
            AppError::Remote(_) => ErrorKind::Connectivity,
            AppError::Store(_) | AppError::Lock(_) | AppError::Json(_) | AppError::Toml(_) => {
                ErrorKind::Storage
            }
            AppError::Config(_) | AppError::SyncUnavailable => ErrorKind::Config,
            AppError::NotLoggedIn => ErrorKind::Auth,
        }
    }
}

pub struct App {
    config: AppConfig,
    gateway: PersistenceGateway,
    identity: Option<IdentitySession>,
    session: Option<User>,
    tasks: Vec<Task>,
    source: LoadSource,
    _lock: StoreLock,
}

impl App {
    /// Lock `data_dir`, restore the session, and load the starting tree.
    pub fn open(config: AppConfig, data_dir: &Path, services: Services) -> Result<Self, AppError> {
        let local = LocalStore::open(data_dir)?;
        let lock = StoreLock::acquire_default(data_dir)?;
        let session = local.read_session()?;
        let gateway = PersistenceGateway::new(local, services.task_store);
        let identity = services.identity.map(IdentitySession::new);

        let mut app = App {
            config,
            gateway,
            identity,
            session,
            tasks: Vec::new(),
            source: LoadSource::DefaultSeed,
            _lock: lock,
        };
        let outcome = app.gateway.load_initial(app.session.as_ref())?;
        app.adopt(outcome, false)?;
        Ok(app)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn session(&self) -> Option<&User> {
        self.session.as_ref()
    }

    /// Where the current tree came from at the last load
    pub fn source(&self) -> LoadSource {
        self.source
    }

    pub fn stats(&self) -> TreeStats {
        counters::stats(&self.tasks)
    }

    pub fn has_remote(&self) -> bool {
        self.gateway.has_remote()
    }

    /// Resolve a target against the current tree
    pub fn resolve(&self, target: &Target) -> Result<TaskPath, AppError> {
        Ok(target.resolve(&self.tasks)?)
    }

    pub fn task(&self, target: &Target) -> Result<(TaskPath, &Task), AppError> {
        let at = self.resolve(target)?;
        let task = path::get(&self.tasks, &at)?;
        Ok((at, task))
    }

    // -----------------------------------------------------------------------
    // Tree mutations
    // -----------------------------------------------------------------------

    /// Add a task at the root or under `parent`; returns the new task's path.
    pub fn add_task(&mut self, text: &str, parent: Option<&Target>) -> Result<TaskPath, AppError> {
        let parent = parent.map(|t| self.resolve(t)).transpose()?;
        let next = task_ops::add_task(&self.tasks, text, parent.as_ref())?;
        let added = match &parent {
            None => TaskPath::root(next.len() - 1),
            Some(p) => p.child(path::get(&next, p)?.subtasks.len() - 1),
        };
        self.commit(next)?;
        Ok(added)
    }

    pub fn toggle_completed(&mut self, target: &Target) -> Result<TaskPath, AppError> {
        let at = self.resolve(target)?;
        let next = task_ops::toggle_completed(&self.tasks, &at)?;
        self.commit(next)?;
        Ok(at)
    }

    pub fn toggle_expanded(&mut self, target: &Target) -> Result<TaskPath, AppError> {
        let at = self.resolve(target)?;
        let next = task_ops::toggle_expanded(&self.tasks, &at)?;
        self.commit(next)?;
        Ok(at)
    }

    /// Delete a task and its subtree; returns the removed task.
    pub fn delete_task(&mut self, target: &Target) -> Result<Task, AppError> {
        let at = self.resolve(target)?;
        let removed = path::get(&self.tasks, &at)?.clone();
        let next = task_ops::delete_task(&self.tasks, &at)?;
        self.commit(next)?;
        Ok(removed)
    }

    fn commit(&mut self, next: Vec<Task>) -> Result<(), AppError> {
        self.gateway.persist(&next, self.session.as_ref())?;
        self.tasks = next;
        Ok(())
    }

    /// Install a loaded tree. Remote trees are already mirrored locally; a
    /// seeded tree (or any tree when `publish` is set) goes through the
    /// normal persist path so the cache and remote see it.
    fn adopt(&mut self, outcome: LoadOutcome, publish: bool) -> Result<(), AppError> {
        debug!(source = ?outcome.source, roots = outcome.tasks.len(), "adopting tree");
        self.source = outcome.source;
        if outcome.source == LoadSource::DefaultSeed
            || (publish && outcome.source != LoadSource::Remote)
        {
            self.commit(outcome.tasks)
        } else {
            self.tasks = outcome.tasks;
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Log in, persist the session, and reload. If the account has no remote
    /// tree yet, the local one is uploaded to it.
    pub fn login(&mut self, email: &str) -> Result<&User, AppError> {
        normalize_email(email)?;
        let identity = self.identity.as_ref().ok_or(IdentityError::Unavailable)?;
        let user = identity.login(email)?;

        self.gateway.local().write_session(&user)?;
        self.gateway.invalidate();
        self.session = Some(user);

        let outcome = self.gateway.load_initial(self.session.as_ref())?;
        self.adopt(outcome, true)?;
        Ok(self.session.as_ref().ok_or(AppError::NotLoggedIn)?)
    }

    /// Forget the session. The task cache stays unless
    /// `session.clear_cache_on_logout` is set, in which case the tree is
    /// emptied. Returns the user that was logged in, if any.
    pub fn logout(&mut self) -> Result<Option<User>, AppError> {
        self.gateway.local().clear_session()?;
        self.gateway.invalidate();
        let previous = self.session.take();
        if let Some(user) = &previous {
            info!(user_id = user.id, "logged out");
        }
        if self.config.session.clear_cache_on_logout {
            self.commit(Vec::new())?;
        }
        Ok(previous)
    }

    // -----------------------------------------------------------------------
    // Explicit sync
    // -----------------------------------------------------------------------

    /// Re-run the initial load (remote first, then cache).
    pub fn pull(&mut self) -> Result<LoadSource, AppError> {
        if self.session.is_none() {
            return Err(AppError::NotLoggedIn);
        }
        if !self.gateway.has_remote() {
            return Err(AppError::SyncUnavailable);
        }
        let outcome = self.gateway.load_initial(self.session.as_ref())?;
        self.adopt(outcome, false)?;
        Ok(self.source)
    }

    /// Push the current tree now and report whether it worked.
    pub fn push(&self) -> Result<(), AppError> {
        let user = self.session.as_ref().ok_or(AppError::NotLoggedIn)?;
        if self.gateway.push_now(&self.tasks, user)? {
            Ok(())
        } else {
            Err(AppError::SyncUnavailable)
        }
    }

    /// Wait for background pushes, then release everything.
    pub fn close(mut self) {
        self.gateway.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fake_remote::{FakeIdentity, FakeStore, offline_error};
    use crate::io::remote::{IdentityService, TaskStore};
    use crate::model::task::default_tree;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn services(identity: Option<Arc<FakeIdentity>>, store: Option<Arc<FakeStore>>) -> Services {
        Services {
            identity: identity.map(|i| i as Arc<dyn IdentityService>),
            task_store: store.map(|s| s as Arc<dyn TaskStore>),
        }
    }

    fn open(tmp: &TempDir, services: Services) -> App {
        App::open(AppConfig::default(), tmp.path(), services).unwrap()
    }

    fn root(text: &str) -> Task {
        Task::new(format!("r-{}", text), text.into(), "🌈".into())
    }

    #[test]
    fn first_run_seeds_and_persists_default_tree() {
        let tmp = TempDir::new().unwrap();
        let app = open(&tmp, Services::offline());
        assert_eq!(app.tasks(), default_tree().as_slice());
        assert_eq!(app.source(), LoadSource::DefaultSeed);
        app.close();

        let store = LocalStore::open(tmp.path()).unwrap();
        assert_eq!(store.read_tasks().unwrap(), Some(default_tree()));
    }

    #[test]
    fn mutations_persist_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let mut app = open(&tmp, Services::offline());
        let milk = app.add_task("Buy milk", None).unwrap();
        assert_eq!(milk, TaskPath::root(1));
        let sub = app
            .add_task("2%", Some(&Target::Path(milk.clone())))
            .unwrap();
        assert_eq!(sub.to_string(), "1.0");
        app.toggle_completed(&Target::Path(sub)).unwrap();
        app.delete_task(&Target::Path(TaskPath::root(0))).unwrap();
        let expected = app.tasks().to_vec();
        app.close();

        let app = open(&tmp, Services::offline());
        assert_eq!(app.source(), LoadSource::LocalCache);
        assert_eq!(app.tasks(), expected.as_slice());
        assert_eq!(app.tasks()[0].text, "Buy milk");
        assert!(app.tasks()[0].is_expanded);
        assert!(app.tasks()[0].subtasks[0].completed);
        assert_eq!(app.stats(), TreeStats { completed: 1, total: 2 });
    }

    #[test]
    fn failed_validation_changes_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut app = open(&tmp, Services::offline());
        let before = app.tasks().to_vec();
        let err = app.add_task("   ", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = app
            .add_task("x", Some(&"4.4".parse().unwrap()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(app.tasks(), before.as_slice());
    }

    #[test]
    fn id_targets_follow_the_task() {
        let tmp = TempDir::new().unwrap();
        let mut app = open(&tmp, Services::offline());
        let at = app.add_task("Target me", None).unwrap();
        let id = app.task(&Target::Path(at)).unwrap().1.id.clone();
        app.delete_task(&Target::Path(TaskPath::root(0))).unwrap();
        let at = app.toggle_completed(&Target::Id(id.clone())).unwrap();
        assert_eq!(at, TaskPath::root(0));
        assert!(app.task(&Target::Id(id)).unwrap().1.completed);
    }

    #[test]
    fn empty_email_is_rejected_before_any_request() {
        let tmp = TempDir::new().unwrap();
        let identity = Arc::new(FakeIdentity::accepting(3));
        let mut app = open(&tmp, services(Some(identity.clone()), None));
        let err = app.login("  ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(identity.calls(), 0);
        assert!(app.session().is_none());
    }

    #[test]
    fn login_without_endpoint_is_a_config_error() {
        let tmp = TempDir::new().unwrap();
        let mut app = open(&tmp, Services::offline());
        assert_eq!(app.login("a@b.c").unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn rejected_login_leaves_session_unchanged() {
        let tmp = TempDir::new().unwrap();
        let identity = Arc::new(FakeIdentity::failing(RemoteError::Status {
            status: 401,
            message: Some("nope".into()),
        }));
        let mut app = open(&tmp, services(Some(identity), None));
        let err = app.login("a@b.c").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(err.to_string(), "nope");
        assert!(app.session().is_none());
        assert!(LocalStore::open(tmp.path()).unwrap().read_session().unwrap().is_none());
    }

    #[test]
    fn login_connectivity_failure_is_distinct() {
        let tmp = TempDir::new().unwrap();
        let identity = Arc::new(FakeIdentity::failing(offline_error()));
        let mut app = open(&tmp, services(Some(identity), None));
        assert_eq!(app.login("a@b.c").unwrap_err().kind(), ErrorKind::Connectivity);
    }

    #[test]
    fn login_adopts_remote_tree() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FakeStore::with_tree(vec![root("from server")]));
        let mut app = open(
            &tmp,
            services(Some(Arc::new(FakeIdentity::accepting(11))), Some(store.clone())),
        );
        let user = app.login("Me@Example.com").unwrap().clone();
        assert_eq!(user, User { id: 11, email: "me@example.com".into() });
        assert_eq!(app.source(), LoadSource::Remote);
        assert_eq!(app.tasks(), &[root("from server")]);
        app.close();

        // Session survives a restart
        let app = open(&tmp, services(None, Some(store)));
        assert_eq!(app.session(), Some(&user));
        assert_eq!(app.tasks(), &[root("from server")]);
    }

    #[test]
    fn login_to_empty_account_uploads_local_tree() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FakeStore::default());
        let mut app = open(
            &tmp,
            services(Some(Arc::new(FakeIdentity::accepting(5))), Some(store.clone())),
        );
        app.add_task("mine", None).unwrap();
        let local = app.tasks().to_vec();
        app.login("me@x.y").unwrap();
        assert_eq!(app.source(), LoadSource::LocalCache);
        assert_eq!(app.tasks(), local.as_slice());
        app.close();
        assert_eq!(store.pushes().last(), Some(&(5, local)));
    }

    #[test]
    fn edits_while_logged_in_are_mirrored() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FakeStore::default());
        let mut app = open(
            &tmp,
            services(Some(Arc::new(FakeIdentity::accepting(8))), Some(store.clone())),
        );
        app.login("me@x.y").unwrap();
        app.add_task("synced", None).unwrap();
        let expected = app.tasks().to_vec();
        app.close();
        assert_eq!(*store.tree.lock().unwrap(), expected);
    }

    #[test]
    fn logout_keeps_tasks_by_default() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FakeStore::default());
        let mut app = open(
            &tmp,
            services(Some(Arc::new(FakeIdentity::accepting(8))), Some(store.clone())),
        );
        app.login("me@x.y").unwrap();
        let tasks = app.tasks().to_vec();
        let previous = app.logout().unwrap();
        assert_eq!(previous.map(|u| u.id), Some(8));
        assert!(app.session().is_none());
        assert_eq!(app.tasks(), tasks.as_slice());

        // Edits after logout stay local
        app.add_task("anonymous edit", None).unwrap();
        app.close();
        assert!(
            store
                .pushes()
                .iter()
                .all(|(_, tree)| tree.iter().all(|t| t.text != "anonymous edit"))
        );
        assert!(LocalStore::open(tmp.path()).unwrap().read_session().unwrap().is_none());
    }

    #[test]
    fn logout_can_clear_the_cache() {
        let tmp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.session.clear_cache_on_logout = true;
        let mut app = App::open(
            config,
            tmp.path(),
            services(Some(Arc::new(FakeIdentity::accepting(2))), None),
        )
        .unwrap();
        app.login("me@x.y").unwrap();
        app.logout().unwrap();
        assert!(app.tasks().is_empty());
        app.close();
        let store = LocalStore::open(tmp.path()).unwrap();
        assert_eq!(store.read_tasks().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn remote_empty_on_open_keeps_cache() {
        let tmp = TempDir::new().unwrap();
        let local = LocalStore::open(tmp.path()).unwrap();
        local.write_tasks(&[root("cached")]).unwrap();
        local
            .write_session(&User {
                id: 4,
                email: "c@d.e".into(),
            })
            .unwrap();

        let app = open(&tmp, services(None, Some(Arc::new(FakeStore::default()))));
        assert_eq!(app.source(), LoadSource::LocalCache);
        assert_eq!(app.tasks(), &[root("cached")]);
    }

    #[test]
    fn pull_and_push_need_a_session_and_a_store() {
        let tmp = TempDir::new().unwrap();
        let mut app = open(&tmp, Services::offline());
        assert!(matches!(app.pull(), Err(AppError::NotLoggedIn)));
        assert!(matches!(app.push(), Err(AppError::NotLoggedIn)));
    }

    #[test]
    fn push_surfaces_connectivity_errors() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FakeStore::default());
        let mut app = open(
            &tmp,
            services(Some(Arc::new(FakeIdentity::accepting(1))), Some(store.clone())),
        );
        app.login("me@x.y").unwrap();
        store.set_offline(true);
        assert_eq!(app.push().unwrap_err().kind(), ErrorKind::Connectivity);
        store.set_offline(false);
        app.push().unwrap();
    }

    #[test]
    fn client_setup_failure_is_a_config_error() {
        let err = AppError::from(RemoteError::Setup {
            message: "bad settings".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(!err.to_string().contains("could not reach"));
    }

    #[test]
    fn unbackupable_corrupt_cache_is_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("todos.json");
        std::fs::write(&cache, "[{\"id\": \"1\", broken").unwrap();
        let blocker = tmp.path().join("todos.json.bak");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();

        let err = App::open(AppConfig::default(), tmp.path(), Services::offline())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(
            std::fs::read_to_string(&cache).unwrap(),
            "[{\"id\": \"1\", broken"
        );
    }
}
