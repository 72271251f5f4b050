use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::form::TaskDraft;
use crate::remote::{Inserted, RemoteStore, TaskRecord, rows};
use crate::task::{TaskId, UserId};

/// File-backed record store: one JSON record per line in `tasks.data`,
/// rewritten atomically on every change.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub session_path: PathBuf,
    write_lock: Mutex<()>,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        let session_path = data_dir.join("session.data");

        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }
        if !session_path.exists() {
            fs::write(&session_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            session = %session_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            session_path,
            write_lock: Mutex::new(()),
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_records(&self) -> anyhow::Result<Vec<TaskRecord>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    #[tracing::instrument(skip(self, records))]
    pub fn save_records(&self, records: &[TaskRecord]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, records).context("failed to save tasks.data")
    }

    /// Loads every row, lets `change` edit them, and writes the result back
    /// only if `change` succeeded.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Vec<TaskRecord>) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let _guard = self.write_lock.lock();
        let mut records = self.load_records()?;
        let out = change(&mut records)?;
        self.save_records(&records)?;
        Ok(out)
    }

    /// The user remembered between CLI invocations.
    #[tracing::instrument(skip(self))]
    pub fn active_user(&self) -> anyhow::Result<Option<UserId>> {
        let raw = fs::read_to_string(&self.session_path)
            .with_context(|| format!("failed reading {}", self.session_path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(UserId::new(trimmed)))
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn set_active_user(&self, user: Option<&UserId>) -> anyhow::Result<()> {
        let payload = user.map(UserId::as_str).unwrap_or_default();
        fs::write(&self.session_path, payload)
            .with_context(|| format!("failed writing {}", self.session_path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for DataStore {
    async fn list_for_owner(&self, owner: &UserId) -> anyhow::Result<Vec<TaskRecord>> {
        let records = self.load_records()?;
        Ok(rows::list_for_owner(&records, owner))
    }

    async fn insert(&self, owner: &UserId, draft: &TaskDraft) -> anyhow::Result<Inserted> {
        let inserted = self.mutate(|records| Ok(rows::insert(records, owner, draft)))?;
        debug!(id = %inserted.id, owner = %owner, "inserted task record");
        Ok(inserted)
    }

    async fn update(&self, owner: &UserId, id: TaskId, draft: &TaskDraft) -> anyhow::Result<()> {
        self.mutate(|records| {
            rows::find_mut(records, owner, id)?.replace_fields(draft);
            Ok(())
        })
    }

    async fn set_completed(
        &self,
        owner: &UserId,
        id: TaskId,
        completed: bool,
    ) -> anyhow::Result<()> {
        self.mutate(|records| {
            rows::find_mut(records, owner, id)?.completed = completed;
            Ok(())
        })
    }

    async fn delete(&self, owner: &UserId, id: TaskId) -> anyhow::Result<()> {
        self.mutate(|records| rows::delete(records, owner, id))
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<TaskRecord>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: TaskRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, records))]
fn save_jsonl_atomic(path: &Path, records: &[TaskRecord]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
