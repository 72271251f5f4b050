use std::cmp::Ordering;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use tracing::trace;

use crate::datetime::{
  Urgency,
  status
};
use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  clap::ValueEnum,
)]
pub enum FilterMode {
  #[default]
  All,
  Active,
  Completed,
  Overdue
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  clap::ValueEnum,
)]
pub enum SortKey {
  #[default]
  #[value(alias = "due")]
  DueDate,
  #[value(alias = "created")]
  CreatedAt,
  #[value(alias = "course")]
  CourseName,
  #[value(alias = "type")]
  TaskType
}

impl FromStr for FilterMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(Self::All),
      | "active" | "open" => {
        Ok(Self::Active)
      }
      | "completed" | "done" => {
        Ok(Self::Completed)
      }
      | "overdue" => Ok(Self::Overdue),
      | other => {
        Err(anyhow!(
          "unknown filter: {other}"
        ))
      }
    }
  }
}

impl FromStr for SortKey {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "due" | "duedate"
      | "due-date" => Ok(Self::DueDate),
      | "created" | "createdat"
      | "created-at" => {
        Ok(Self::CreatedAt)
      }
      | "course" | "coursename"
      | "course-name" => {
        Ok(Self::CourseName)
      }
      | "type" | "tasktype"
      | "task-type" => {
        Ok(Self::TaskType)
      }
      | other => {
        Err(anyhow!(
          "unknown sort key: {other}"
        ))
      }
    }
  }
}

impl FilterMode {
  pub fn matches(
    &self,
    task: &Task,
    now: NaiveDateTime
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Active => !task.completed,
      | Self::Completed => {
        task.completed
      }
      // Red already implies incomplete;
      // checked again so the view never
      // depends on that.
      | Self::Overdue => {
        status(task, now) == Urgency::Red
          && !task.completed
      }
    }
  }
}

#[must_use]
pub fn filter(
  tasks: &[Task],
  mode: FilterMode,
  now: NaiveDateTime
) -> Vec<Task> {
  let out: Vec<Task> = tasks
    .iter()
    .filter(|task| {
      mode.matches(task, now)
    })
    .cloned()
    .collect();
  trace!(
    ?mode,
    before = tasks.len(),
    after = out.len(),
    "filtered tasks"
  );
  out
}

/// Stable sort; equal keys keep their
/// input order.
pub fn sort(
  tasks: &mut [Task],
  key: SortKey
) {
  tasks.sort_by(|a, b| {
    compare(a, b, key)
  });
}

#[must_use]
pub fn project(
  tasks: &[Task],
  mode: FilterMode,
  key: SortKey,
  now: NaiveDateTime
) -> Vec<Task> {
  let mut out =
    filter(tasks, mode, now);
  sort(&mut out, key);
  out
}

fn compare(
  a: &Task,
  b: &Task,
  key: SortKey
) -> Ordering {
  match key {
    | SortKey::DueDate => {
      a.due.cmp(&b.due)
    }
    | SortKey::CreatedAt => {
      b.created_at.cmp(&a.created_at)
    }
    | SortKey::CourseName => {
      locale_cmp(
        &a.course_name,
        &b.course_name
      )
    }
    | SortKey::TaskType => {
      locale_cmp(
        a.task_type.as_str(),
        b.task_type.as_str()
      )
    }
  }
}

/// Case-folded comparison first so
/// `algebra` sorts next to `Algebra`,
/// then raw order to break the tie.
fn locale_cmp(
  a: &str,
  b: &str
) -> Ordering {
  a.to_lowercase()
    .cmp(&b.to_lowercase())
    .then_with(|| a.cmp(b))
}
