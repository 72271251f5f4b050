//! The signed-in user's task collection, kept in step with a
//! [`RemoteStore`].
//!
//! Local state lives behind one mutex that is never held across an
//! `.await`. Each operation runs in three steps: a critical section that
//! checks ownership and claims the task id, the remote call, and a second
//! critical section that confirms or reverts. A result that comes back
//! after the signed-in user changed is dropped instead of being applied
//! to someone else's collection.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::auth::Session;
use crate::error::{Operation, StoreError};
use crate::form::TaskFormData;
use crate::notify::{Notice, Notifier};
use crate::remote::{RemoteStore, TaskRecord};
use crate::task::{Task, TaskId, UserId};

pub struct TaskStore {
    remote: Arc<dyn RemoteStore>,
    session: Session,
    notifier: Arc<dyn Notifier>,
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    owner: Option<UserId>,
    /// Bumped on every identity change; in-flight calls compare against it.
    epoch: u64,
    tasks: Vec<Task>,
    in_flight: HashSet<TaskId>,
}

impl StoreState {
    fn reset(&mut self, owner: Option<UserId>) {
        self.owner = owner;
        self.epoch += 1;
        self.tasks.clear();
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }
}

/// Marks a task id busy until dropped.
struct InFlight<'a> {
    store: &'a TaskStore,
    id: TaskId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.store.state.lock().in_flight.remove(&self.id);
    }
}

impl TaskStore {
    pub fn new(remote: Arc<dyn RemoteStore>, session: Session, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            remote,
            session,
            notifier,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn owner(&self) -> Option<UserId> {
        self.state.lock().owner.clone()
    }

    /// Current collection. Empty whenever the session no longer matches the
    /// owner the collection was loaded for, even before any reload ran.
    pub fn list(&self) -> Vec<Task> {
        let mut state = self.state.lock();
        if state.owner.is_some() && state.owner != self.session.current_user() {
            debug!(owner = ?state.owner, "session changed under the store; clearing");
            state.reset(None);
        }
        state.tasks.clone()
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.list().into_iter().find(|task| task.id == id)
    }

    /// Drops everything held for the previous user. Synchronous so nothing
    /// stale can be read after a logout.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let count = state.tasks.len();
        state.reset(None);
        info!(dropped = count, "cleared task collection");
    }

    /// Reacts to a login, logout or user switch.
    #[instrument(skip(self))]
    pub async fn handle_auth_change(&self, user: Option<UserId>) -> Result<usize, StoreError> {
        match user {
            None => {
                self.clear();
                Ok(0)
            }
            Some(user) => {
                self.state.lock().reset(Some(user));
                self.reload().await
            }
        }
    }

    /// Follows the session for as long as the returned future is polled.
    pub async fn follow_session(&self) {
        let mut rx = self.session.subscribe();
        loop {
            let user = rx.borrow_and_update().clone();
            if let Err(err) = self.handle_auth_change(user).await {
                warn!(error = %err, "reload after identity change failed");
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Replaces the collection with the owner's remote rows, earliest due
    /// first. A failed fetch leaves the collection empty, never stale.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<usize, StoreError> {
        let (owner, epoch) = {
            let state = self.state.lock();
            self.authorize(&state)?
        };

        let fetched = self.remote.list_for_owner(&owner).await;

        let mut state = self.state.lock();
        if state.epoch != epoch {
            debug!(owner = %owner, "identity changed during fetch; discarding rows");
            return Ok(0);
        }

        match fetched {
            Ok(records) => {
                let mut tasks: Vec<Task> = records
                    .into_iter()
                    .filter(|record| record.owner_id == owner)
                    .map(TaskRecord::into_task)
                    .collect();
                tasks.sort_by_key(|task| task.due);
                state.tasks = tasks;
                info!(owner = %owner, count = state.tasks.len(), "loaded tasks");
                Ok(state.tasks.len())
            }
            Err(err) => {
                state.tasks.clear();
                drop(state);
                let err = StoreError::remote(Operation::Load, err);
                warn!(error = %err, "failed to load tasks");
                self.notifier.notify(Notice::error(err.user_message(Operation::Load)));
                Err(err)
            }
        }
    }

    /// Inserts a validated task and appends it to the collection. The
    /// success notice follows the remote outcome, so a create that lands
    /// after a user switch is still announced but not appended.
    #[instrument(skip(self, form))]
    pub async fn create(&self, form: &TaskFormData) -> Result<Task, StoreError> {
        let result = self.create_inner(form).await;
        self.finish(Operation::Create, result, |_| "Task created successfully".to_string())
    }

    async fn create_inner(&self, form: &TaskFormData) -> Result<Task, StoreError> {
        let (owner, epoch) = {
            let state = self.state.lock();
            self.authorize(&state)?
        };
        let draft = form.into_draft().map_err(StoreError::Validation)?;

        let inserted = self
            .remote
            .insert(&owner, &draft)
            .await
            .map_err(|err| StoreError::remote(Operation::Create, err))?;
        let task = TaskRecord::new(&owner, &draft, inserted).into_task();

        let mut state = self.state.lock();
        if state.epoch == epoch {
            // A reload that landed while the insert was in flight may
            // already hold this row.
            match state.position(task.id) {
                Some(idx) => state.tasks[idx] = task.clone(),
                None => state.tasks.push(task.clone()),
            }
        } else {
            debug!(id = %task.id, "identity changed during create; not appending");
        }
        Ok(task)
    }

    /// Full replace of the descriptive fields. Nothing changes locally
    /// unless the remote accepted the edit.
    #[instrument(skip(self, form), fields(id = %id))]
    pub async fn update(&self, id: TaskId, form: &TaskFormData) -> Result<Task, StoreError> {
        let result = self.update_inner(id, form).await;
        self.finish(Operation::Update, result, |_| "Task updated successfully".to_string())
    }

    async fn update_inner(&self, id: TaskId, form: &TaskFormData) -> Result<Task, StoreError> {
        let (owner, epoch, mut edited, claim) = {
            let mut state = self.state.lock();
            let (owner, epoch) = self.authorize(&state)?;
            let idx = state.position(id).ok_or(StoreError::NotFound(id))?;
            let claim = self.claim(&mut state, id)?;
            let base = state.tasks[idx].clone();
            (owner, epoch, base, claim)
        };
        let draft = form.into_draft().map_err(StoreError::Validation)?;
        edited.replace_fields(&draft);

        self.remote
            .update(&owner, id, &draft)
            .await
            .map_err(|err| StoreError::remote(Operation::Update, err))?;

        {
            let mut state = self.state.lock();
            if state.epoch == epoch
                && let Some(idx) = state.position(id)
            {
                state.tasks[idx] = edited.clone();
            }
        }
        drop(claim);
        Ok(edited)
    }

    /// Flips `completed` on the record as it is in the collection right
    /// now, and rolls the flip back if the remote refuses it.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn toggle_complete(&self, id: TaskId) -> Result<bool, StoreError> {
        let result = self.toggle_inner(id).await;
        self.finish(Operation::Toggle, result, |completed| {
            if *completed {
                "Task marked as complete".to_string()
            } else {
                "Task marked as incomplete".to_string()
            }
        })
    }

    async fn toggle_inner(&self, id: TaskId) -> Result<bool, StoreError> {
        let (owner, epoch, snapshot, claim) = {
            let mut state = self.state.lock();
            let (owner, epoch) = self.authorize(&state)?;
            let idx = state.position(id).ok_or(StoreError::NotFound(id))?;
            let claim = self.claim(&mut state, id)?;
            let snapshot = state.tasks[idx].clone();
            state.tasks[idx].completed = !snapshot.completed;
            (owner, epoch, snapshot, claim)
        };
        let next = !snapshot.completed;
        debug!(from = snapshot.completed, to = next, "optimistic toggle applied");

        let outcome = self.remote.set_completed(&owner, id, next).await;

        if let Err(err) = outcome {
            let mut state = self.state.lock();
            if state.epoch == epoch
                && let Some(idx) = state.position(id)
            {
                state.tasks[idx] = snapshot;
                debug!("optimistic toggle rolled back");
            }
            drop(state);
            drop(claim);
            return Err(StoreError::remote(Operation::Toggle, err));
        }

        drop(claim);
        Ok(next)
    }

    /// Removes the task once the remote confirms. Deleting an id that is
    /// not in the collection succeeds without a remote call.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        let result = self.delete_inner(id).await;
        self.finish(Operation::Delete, result, |_| "Task deleted successfully".to_string())
    }

    async fn delete_inner(&self, id: TaskId) -> Result<(), StoreError> {
        let (owner, epoch, claim) = {
            let mut state = self.state.lock();
            let (owner, epoch) = self.authorize(&state)?;
            if state.position(id).is_none() {
                debug!("delete of unknown id is a no-op");
                return Ok(());
            }
            let claim = self.claim(&mut state, id)?;
            (owner, epoch, claim)
        };

        self.remote
            .delete(&owner, id)
            .await
            .map_err(|err| StoreError::remote(Operation::Delete, err))?;

        {
            let mut state = self.state.lock();
            if state.epoch == epoch {
                state.tasks.retain(|task| task.id != id);
            }
        }
        drop(claim);
        Ok(())
    }

    fn authorize(&self, state: &StoreState) -> Result<(UserId, u64), StoreError> {
        match (&state.owner, self.session.current_user()) {
            (Some(owner), Some(current)) if *owner == current => Ok((current, state.epoch)),
            _ => Err(StoreError::Unauthorized),
        }
    }

    fn claim(&self, state: &mut StoreState, id: TaskId) -> Result<InFlight<'_>, StoreError> {
        if !state.in_flight.insert(id) {
            return Err(StoreError::Busy(id));
        }
        Ok(InFlight { store: self, id })
    }

    /// Emits exactly one notice for `op`. The notice reports what the
    /// remote did; when the signed-in user changed mid-flight the local
    /// collection was left alone even though the notice says success.
    fn finish<T>(
        &self,
        op: Operation,
        result: Result<T, StoreError>,
        success: impl FnOnce(&T) -> String,
    ) -> Result<T, StoreError> {
        match &result {
            Ok(value) => self.notifier.notify(Notice::success(success(value))),
            Err(err) => {
                warn!(%op, error = %err, "task operation failed");
                self.notifier.notify(Notice::error(err.user_message(op)));
            }
        }
        result
    }
}
