use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::form::TaskDraft;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First block of the uuid, enough to pick a task on the command line.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Owner of a task collection, as handed out by the session provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TaskType {
    Test,
    #[default]
    Assignment,
    Presentation,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [TaskType::Test, TaskType::Assignment, TaskType::Presentation];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Test => "Test",
            TaskType::Assignment => "Assignment",
            TaskType::Presentation => "Presentation",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" | "exam" => Ok(TaskType::Test),
            "assignment" | "hw" => Ok(TaskType::Assignment),
            "presentation" | "talk" => Ok(TaskType::Presentation),
            other => Err(anyhow!(
                "unknown task type: {other} (expected test, assignment or presentation)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub course_name: String,
    pub module_name: String,
    pub module_code: String,
    pub task_type: TaskType,
    pub task_topic: String,
    pub due: NaiveDateTime,
    pub completed: bool,
    pub created_at: NaiveDateTime,
}

impl Task {
    pub fn title(&self) -> String {
        format!("{} - {}", self.course_name, self.module_name)
    }

    /// Overwrites every descriptive field; `completed` and the identity
    /// fields are untouched.
    pub fn replace_fields(&mut self, draft: &TaskDraft) {
        self.course_name = draft.course_name.clone();
        self.module_name = draft.module_name.clone();
        self.module_code = draft.module_code.clone();
        self.task_type = draft.task_type;
        self.task_topic = draft.task_topic.clone();
        self.due = draft.due;
    }
}
