//! Persistence collaborator contract and the record shape it stores.
//!
//! The store only ever talks to a [`RemoteStore`]; the in-process
//! [`MemoryRemote`] and the file-backed
//! [`DataStore`](crate::datastore::DataStore) both implement it.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datetime::local_now;
use crate::form::TaskDraft;
use crate::task::{Task, TaskId, TaskType, UserId};

/// One persisted row, with every descriptive field in its own column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: TaskId,
    pub owner_id: UserId,
    pub course_name: String,
    pub module_name: String,
    pub module_code: String,
    pub task_topic: String,
    pub task_type: TaskType,
    pub due: NaiveDateTime,
    /// `HH:MM`, kept next to `due` for queries that only look at the clock.
    pub due_time: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: NaiveDateTime,
}

/// What an insert hands back: the identity the persistence layer chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    pub id: TaskId,
    pub created_at: NaiveDateTime,
}

impl TaskRecord {
    pub fn new(owner: &UserId, draft: &TaskDraft, inserted: Inserted) -> Self {
        let mut record = Self {
            id: inserted.id,
            owner_id: owner.clone(),
            course_name: String::new(),
            module_name: String::new(),
            module_code: String::new(),
            task_topic: String::new(),
            task_type: draft.task_type,
            due: draft.due,
            due_time: String::new(),
            completed: false,
            created_at: inserted.created_at,
        };
        record.replace_fields(draft);
        record
    }

    /// Full replace of the descriptive columns. `completed`, `id` and
    /// `created_at` are left alone.
    pub fn replace_fields(&mut self, draft: &TaskDraft) {
        self.course_name = draft.course_name.clone();
        self.module_name = draft.module_name.clone();
        self.module_code = draft.module_code.clone();
        self.task_topic = draft.task_topic.clone();
        self.task_type = draft.task_type;
        self.due = draft.due;
        self.due_time = draft.due.format("%H:%M").to_string();
    }

    pub fn into_task(self) -> Task {
        Task {
            id: self.id,
            course_name: self.course_name,
            module_name: self.module_name,
            module_code: self.module_code,
            task_type: self.task_type,
            task_topic: self.task_topic,
            due: self.due,
            completed: self.completed,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every record owned by `owner`, earliest due first.
    async fn list_for_owner(&self, owner: &UserId) -> anyhow::Result<Vec<TaskRecord>>;

    async fn insert(&self, owner: &UserId, draft: &TaskDraft) -> anyhow::Result<Inserted>;

    async fn update(&self, owner: &UserId, id: TaskId, draft: &TaskDraft) -> anyhow::Result<()>;

    async fn set_completed(&self, owner: &UserId, id: TaskId, completed: bool)
    -> anyhow::Result<()>;

    async fn delete(&self, owner: &UserId, id: TaskId) -> anyhow::Result<()>;
}

/// Row operations shared by the bundled backends. Each takes the full
/// row set and leaves it in the state the call describes.
pub(crate) mod rows {
    use super::*;

    pub fn list_for_owner(records: &[TaskRecord], owner: &UserId) -> Vec<TaskRecord> {
        let mut out: Vec<TaskRecord> = records
            .iter()
            .filter(|record| &record.owner_id == owner)
            .cloned()
            .collect();
        out.sort_by_key(|record| record.due);
        out
    }

    pub fn insert(records: &mut Vec<TaskRecord>, owner: &UserId, draft: &TaskDraft) -> Inserted {
        let inserted = Inserted {
            id: TaskId::new(),
            created_at: local_now(),
        };
        records.push(TaskRecord::new(owner, draft, inserted));
        inserted
    }

    pub fn find_mut<'a>(
        records: &'a mut [TaskRecord],
        owner: &UserId,
        id: TaskId,
    ) -> anyhow::Result<&'a mut TaskRecord> {
        records
            .iter_mut()
            .find(|record| record.id == id && &record.owner_id == owner)
            .ok_or_else(|| anyhow!("task {id} not found for {owner}"))
    }

    pub fn delete(records: &mut Vec<TaskRecord>, owner: &UserId, id: TaskId) -> anyhow::Result<()> {
        let idx = records
            .iter()
            .position(|record| record.id == id && &record.owner_id == owner)
            .ok_or_else(|| anyhow!("task {id} not found for {owner}"))?;
        records.remove(idx);
        Ok(())
    }
}

/// Non-durable backend; handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    records: Mutex<Vec<TaskRecord>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<TaskRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn records(&self) -> Vec<TaskRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn list_for_owner(&self, owner: &UserId) -> anyhow::Result<Vec<TaskRecord>> {
        let records = self.records.lock();
        Ok(rows::list_for_owner(&records, owner))
    }

    async fn insert(&self, owner: &UserId, draft: &TaskDraft) -> anyhow::Result<Inserted> {
        let mut records = self.records.lock();
        let inserted = rows::insert(&mut records, owner, draft);
        debug!(id = %inserted.id, owner = %owner, "memory insert");
        Ok(inserted)
    }

    async fn update(&self, owner: &UserId, id: TaskId, draft: &TaskDraft) -> anyhow::Result<()> {
        let mut records = self.records.lock();
        rows::find_mut(&mut records, owner, id)?.replace_fields(draft);
        Ok(())
    }

    async fn set_completed(
        &self,
        owner: &UserId,
        id: TaskId,
        completed: bool,
    ) -> anyhow::Result<()> {
        let mut records = self.records.lock();
        rows::find_mut(&mut records, owner, id)?.completed = completed;
        Ok(())
    }

    async fn delete(&self, owner: &UserId, id: TaskId) -> anyhow::Result<()> {
        let mut records = self.records.lock();
        rows::delete(&mut records, owner, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::normalize;

    fn draft(topic: &str, date: &str) -> TaskDraft {
        TaskDraft {
            course_name: "Economics".to_string(),
            module_name: "Micro".to_string(),
            module_code: "ECO110".to_string(),
            task_type: TaskType::Presentation,
            task_topic: topic.to_string(),
            due: normalize(date, "14:15").expect("valid due"),
        }
    }

    #[tokio::test]
    async fn list_is_scoped_to_owner_and_ordered_by_due() {
        let remote = MemoryRemote::new();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        remote.insert(&alice, &draft("later", "2026-09-10")).await.expect("insert");
        remote.insert(&bob, &draft("bobs", "2026-09-01")).await.expect("insert");
        remote.insert(&alice, &draft("sooner", "2026-09-02")).await.expect("insert");

        let listed = remote.list_for_owner(&alice).await.expect("list");
        let topics: Vec<&str> = listed.iter().map(|r| r.task_topic.as_str()).collect();
        assert_eq!(topics, vec!["sooner", "later"]);
        assert!(listed.iter().all(|r| r.due_time == "14:15"));
    }

    #[tokio::test]
    async fn other_owners_rows_cannot_be_touched() {
        let remote = MemoryRemote::new();
        let alice = UserId::new("alice");
        let mallory = UserId::new("mallory");
        let inserted = remote.insert(&alice, &draft("mine", "2026-09-10")).await.expect("insert");

        assert!(remote.set_completed(&mallory, inserted.id, true).await.is_err());
        assert!(remote.delete(&mallory, inserted.id).await.is_err());
        assert_eq!(remote.records().len(), 1);
        assert!(!remote.records()[0].completed);
    }

    #[tokio::test]
    async fn update_replaces_fields_but_keeps_completion() {
        let remote = MemoryRemote::new();
        let alice = UserId::new("alice");
        let inserted = remote.insert(&alice, &draft("v1", "2026-09-10")).await.expect("insert");
        remote.set_completed(&alice, inserted.id, true).await.expect("complete");

        remote
            .update(&alice, inserted.id, &draft("v2", "2026-09-12"))
            .await
            .expect("update");

        let record = &remote.records()[0];
        assert_eq!(record.task_topic, "v2");
        assert_eq!(record.due.format("%Y-%m-%d").to_string(), "2026-09-12");
        assert!(record.completed);
        assert_eq!(record.created_at, inserted.created_at);
    }
}
