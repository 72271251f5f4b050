//! Compatibility shim for the older row layout that packed two fields
//! into each of `title` and `description`:
//!
//! - `title` = `"<course> - <module>"`
//! - `description` = `"<module code> - <topic>"`
//!
//! Only `import`/`export` go through here; the live store keeps every
//! field in its own column. A course or module code that itself contains
//! `" - "` cannot be told apart from the delimiter; the first occurrence
//! always wins.

use anyhow::{Context, anyhow};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::form::{TaskFormData, split_due};
use crate::task::{Task, TaskType, UserId};

const DELIMITER: &str = " - ";
const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegacyTaskRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub due_date: String,
    #[serde(default)]
    pub due_time: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A decoded legacy row: a form ready for validation plus the completion
/// flag, which forms do not carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTask {
    pub form: TaskFormData,
    pub completed: bool,
}

pub fn encode(task: &Task, owner: &UserId) -> LegacyTaskRow {
    LegacyTaskRow {
        id: Some(task.id.to_string()),
        user_id: owner.to_string(),
        title: format!("{}{DELIMITER}{}", task.course_name, task.module_name),
        description: format!("{}{DELIMITER}{}", task.module_code, task.task_topic),
        due_date: task.due.format(WIRE_FORMAT).to_string(),
        due_time: Some(task.due.format("%H:%M").to_string()),
        priority: Some(task.task_type.to_string()),
        completed: task.completed,
        created_at: Some(task.created_at.format(WIRE_FORMAT).to_string()),
    }
}

pub fn decode(row: &LegacyTaskRow) -> anyhow::Result<LegacyTask> {
    let (course_name, module_name) = match row.title.split_once(DELIMITER) {
        Some((course, module)) => (course.to_string(), module.to_string()),
        None => (row.title.clone(), String::new()),
    };

    let (module_code, task_topic) = match row.description.split_once(DELIMITER) {
        Some((code, topic)) if !topic.is_empty() => (code.to_string(), topic.to_string()),
        Some((code, _)) => (code.to_string(), row.description.clone()),
        None => (row.description.clone(), row.description.clone()),
    };

    let task_type = match row.priority.as_deref() {
        Some(raw) => raw.parse::<TaskType>().unwrap_or_else(|err| {
            warn!(priority = raw, error = %err, "unknown legacy priority; using Assignment");
            TaskType::Assignment
        }),
        None => TaskType::Assignment,
    };

    let due = parse_wire_timestamp(&row.due_date)
        .with_context(|| format!("invalid due_date in legacy row {:?}", row.id))?;
    let (due_date, due_time) = split_due(due);

    Ok(LegacyTask {
        form: TaskFormData {
            course_name,
            module_name,
            module_code,
            task_type,
            task_topic,
            due_date,
            due_time,
        },
        completed: row.completed,
    })
}

/// Accepts both the naive wall-clock form this crate writes and the
/// RFC 3339 instants older exports carry, which are shown in local time.
fn parse_wire_timestamp(raw: &str) -> anyhow::Result<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(naive) = trimmed.parse::<NaiveDateTime>() {
        return Ok(naive);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Local).naive_local());
    }
    Err(anyhow!("unrecognized timestamp: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::normalize;
    use crate::task::TaskId;

    fn row(title: &str, description: &str, priority: Option<&str>) -> LegacyTaskRow {
        LegacyTaskRow {
            id: Some("42".to_string()),
            user_id: "u1".to_string(),
            title: title.to_string(),
            description: description.to_string(),
            due_date: "2026-12-01T08:30:00".to_string(),
            due_time: Some("08:30".to_string()),
            priority: priority.map(str::to_string),
            completed: true,
            created_at: None,
        }
    }

    #[test]
    fn decodes_composite_columns_on_first_delimiter() {
        let decoded = decode(&row(
            "Mathematics - Linear Algebra",
            "MAT204 - Eigenvalues - part 2",
            Some("Test"),
        ))
        .expect("decode");

        assert_eq!(decoded.form.course_name, "Mathematics");
        assert_eq!(decoded.form.module_name, "Linear Algebra");
        assert_eq!(decoded.form.module_code, "MAT204");
        assert_eq!(decoded.form.task_topic, "Eigenvalues - part 2");
        assert_eq!(decoded.form.task_type, TaskType::Test);
        assert_eq!(decoded.form.due_date, "2026-12-01");
        assert_eq!(decoded.form.due_time, "08:30");
        assert!(decoded.completed);
    }

    #[test]
    fn missing_delimiters_fall_back_like_old_rows() {
        let decoded = decode(&row("Mathematics", "Eigenvalues", Some("Homework")))
            .expect("decode");
        assert_eq!(decoded.form.course_name, "Mathematics");
        assert_eq!(decoded.form.module_name, "");
        assert_eq!(decoded.form.module_code, "Eigenvalues");
        assert_eq!(decoded.form.task_topic, "Eigenvalues");
        assert_eq!(decoded.form.task_type, TaskType::Assignment);
    }

    #[test]
    fn encode_then_decode_keeps_fields() {
        let due = normalize("2027-01-15", "17:45").expect("due");
        let task = Task {
            id: TaskId::new(),
            course_name: "Art".to_string(),
            module_name: "Sculpture".to_string(),
            module_code: "ART150".to_string(),
            task_type: TaskType::Presentation,
            task_topic: "Bronze casting".to_string(),
            due,
            completed: false,
            created_at: due,
        };
        let encoded = encode(&task, &UserId::new("owner"));
        assert_eq!(encoded.title, "Art - Sculpture");
        assert_eq!(encoded.description, "ART150 - Bronze casting");
        assert_eq!(encoded.priority.as_deref(), Some("Presentation"));

        let decoded = decode(&encoded).expect("decode");
        assert_eq!(decoded.form, TaskFormData::from_task(&task));
    }

    #[test]
    fn garbage_due_date_is_an_error() {
        let mut bad = row("A - B", "C - D", None);
        bad.due_date = "next tuesday".to_string();
        assert!(decode(&bad).is_err());
    }
}
