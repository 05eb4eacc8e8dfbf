use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        cache_store::CacheStore,
        models::{Program, Task},
        remote::{Backend, RemoteError, RemoteResult},
    },
    dto::program::NewTaskInput,
    error::SyncError,
    state::program::ProgramView,
};

/// What a reconciliation did with the visible program list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Non-empty remote list replaced the view and the cache.
    Replaced {
        /// Number of programs now shown.
        count: usize,
    },
    /// Remote list was empty; the previous view was kept.
    KeptOnEmpty,
    /// No response was received; the previous view was kept and marked stale.
    KeptOnNetworkError,
    /// The backend answered with a failure; the previous view was kept.
    KeptOnServerError,
}

/// Keeps the program view consistent with both the local cache and the backend.
///
/// Reads never let an empty or failed response erase known programs. Writes are
/// committed synchronously: the view and cache change only after the backend
/// acknowledged the new task list.
pub struct SyncCoordinator {
    backend: Arc<dyn Backend>,
    cache: CacheStore,
    identity: String,
    view: ProgramView,
    stale: watch::Sender<bool>,
}

impl SyncCoordinator {
    /// Build a coordinator whose view starts from the cached programs of `identity`.
    pub fn new(backend: Arc<dyn Backend>, cache: CacheStore, identity: impl Into<String>) -> Self {
        let identity = identity.into();
        let view = ProgramView::from_programs(cache.programs(&identity));
        let (stale, _rx) = watch::channel(false);
        debug!(identity = %identity, programs = view.len(), "program view hydrated from cache");

        Self {
            backend,
            cache,
            identity,
            view,
            stale,
        }
    }

    /// Identity whose cache namespace this coordinator owns.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Programs currently shown.
    pub fn view(&self) -> &ProgramView {
        &self.view
    }

    /// Subscribe to changes of the stale-data indicator.
    pub fn stale_watcher(&self) -> watch::Receiver<bool> {
        self.stale.subscribe()
    }

    /// Reload the view from the cache when the cache holds programs.
    ///
    /// Returns the number of programs shown afterwards.
    pub fn hydrate(&mut self) -> usize {
        let cached = self.cache.programs(&self.identity);
        if !cached.is_empty() {
            self.view.replace(cached);
        }
        self.view.len()
    }

    /// Fetch the program list of `profile_id` and reconcile it.
    pub async fn refresh(&mut self, profile_id: &str) -> ReconcileOutcome {
        let result = self.backend.list_programs(profile_id).await;
        self.reconcile(result)
    }

    /// Fold a remote read into the view.
    ///
    /// Only a non-empty list is authoritative. Empty lists and failures leave
    /// the view and cache exactly as they were.
    pub fn reconcile(&mut self, remote: RemoteResult<Vec<Program>>) -> ReconcileOutcome {
        match remote {
            Ok(programs) if programs.is_empty() => {
                debug!(
                    identity = %self.identity,
                    cached = self.view.len(),
                    "backend returned no programs; keeping current view"
                );
                ReconcileOutcome::KeptOnEmpty
            }
            Ok(programs) => {
                let count = programs.len();
                if !self.cache.save_programs(&self.identity, programs.clone()) {
                    warn!(identity = %self.identity, "program list shown but not cached durably");
                }
                self.view.replace(programs);
                self.set_stale(false);
                ReconcileOutcome::Replaced { count }
            }
            Err(err) if err.is_network() => {
                warn!(identity = %self.identity, error = %err, "program refresh failed; showing cached data");
                self.set_stale(true);
                ReconcileOutcome::KeptOnNetworkError
            }
            Err(err) => {
                error!(identity = %self.identity, error = %err, "backend rejected program refresh");
                ReconcileOutcome::KeptOnServerError
            }
        }
    }

    /// Pick the program shown on the dashboard.
    pub fn select_program(&mut self, program_id: &str) -> Result<(), SyncError> {
        if self.view.select(program_id) {
            Ok(())
        } else {
            Err(SyncError::NotFound(format!("program `{program_id}` not found")))
        }
    }

    /// Flip the completion flag of one task.
    pub async fn toggle_task(&mut self, program_id: &str, task_id: &str) -> Result<(), SyncError> {
        if self.view.task(program_id, task_id).is_none() {
            return Err(task_not_found(program_id, task_id));
        }

        let tasks = self
            .current_tasks(program_id)?
            .into_iter()
            .map(|task| {
                if task.id == task_id {
                    Task {
                        completed: !task.completed,
                        ..task
                    }
                } else {
                    task
                }
            })
            .collect::<Vec<_>>();

        self.commit_tasks(program_id, tasks).await
    }

    /// Append a new task to a program.
    pub async fn add_task(
        &mut self,
        program_id: &str,
        input: NewTaskInput,
    ) -> Result<Task, SyncError> {
        input.validate()?;

        let mut tasks = self.current_tasks(program_id)?;
        let mut task = input.into_task();
        while tasks.iter().any(|existing| existing.id == task.id) {
            task.id = Uuid::new_v4().to_string();
        }
        tasks.push(task.clone());

        self.commit_tasks(program_id, tasks).await?;
        Ok(task)
    }

    /// Remove one task from a program.
    pub async fn delete_task(&mut self, program_id: &str, task_id: &str) -> Result<(), SyncError> {
        let mut tasks = self.current_tasks(program_id)?;
        let before = tasks.len();
        tasks.retain(|task| task.id != task_id);
        if tasks.len() == before {
            return Err(task_not_found(program_id, task_id));
        }

        self.commit_tasks(program_id, tasks).await
    }

    /// Drop the cached record of this identity and forget the view.
    pub fn logout(self) {
        self.cache.clear(&self.identity);
        info!(identity = %self.identity, "cleared cached data on logout");
    }

    fn current_tasks(&self, program_id: &str) -> Result<Vec<Task>, SyncError> {
        self.view
            .get(program_id)
            .map(|program| program.tasks.clone())
            .ok_or_else(|| SyncError::NotFound(format!("program `{program_id}` not found")))
    }

    async fn commit_tasks(&mut self, program_id: &str, tasks: Vec<Task>) -> Result<(), SyncError> {
        let stored = self
            .backend
            .replace_tasks(program_id, tasks)
            .await
            .map_err(|err| log_mutation_failure(program_id, err))?;

        self.view.upsert(stored);
        if !self.cache.save_programs(&self.identity, self.view.to_vec()) {
            warn!(program_id, "task update applied but not cached durably");
        }
        Ok(())
    }

    fn set_stale(&mut self, stale: bool) {
        self.view.set_stale(stale);
        self.stale.send_if_modified(|current| {
            if *current == stale {
                return false;
            }
            *current = stale;
            true
        });
    }
}

fn task_not_found(program_id: &str, task_id: &str) -> SyncError {
    SyncError::NotFound(format!("task `{task_id}` not found in program `{program_id}`"))
}

fn log_mutation_failure(program_id: &str, err: RemoteError) -> SyncError {
    if err.is_network() {
        warn!(program_id, error = %err, "task update not delivered");
    } else {
        error!(program_id, error = %err, "backend rejected task update");
    }
    err.into()
}
