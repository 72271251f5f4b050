//! Task edit form: required-field validation and the date/time merge
//! that turns two form strings into one wall-clock due timestamp.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::task::{Task, TaskType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormField {
    CourseName,
    ModuleName,
    ModuleCode,
    TaskTopic,
    DueDate,
    DueTime,
}

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::CourseName => "courseName",
            FormField::ModuleName => "moduleName",
            FormField::ModuleCode => "moduleCode",
            FormField::TaskTopic => "taskTopic",
            FormField::DueDate => "dueDate",
            FormField::DueTime => "dueTime",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name to human-readable message. Empty means the form is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<FormField, String>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: FormField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn insert(&mut self, field: FormField, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (FormField, &str)> {
        self.0.iter().map(|(field, msg)| (*field, msg.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, msg)| format!("{field}: {msg}"))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DueDateError {
    #[error("invalid calendar date: {0:?}")]
    InvalidDate(String),
    #[error("invalid 24-hour time: {0:?}")]
    InvalidTime(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TaskFormData {
    pub course_name: String,
    pub module_name: String,
    pub module_code: String,
    pub task_type: TaskType,
    pub task_topic: String,
    /// `YYYY-MM-DD`
    pub due_date: String,
    /// `HH:MM`
    pub due_time: String,
}

/// Validated, trimmed payload with the due date already merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub course_name: String,
    pub module_name: String,
    pub module_code: String,
    pub task_type: TaskType,
    pub task_topic: String,
    pub due: NaiveDateTime,
}

impl TaskFormData {
    /// Pre-fills the edit form from a stored task.
    pub fn from_task(task: &Task) -> Self {
        let (due_date, due_time) = split_due(task.due);
        Self {
            course_name: task.course_name.clone(),
            module_name: task.module_name.clone(),
            module_code: task.module_code.clone(),
            task_type: task.task_type,
            task_topic: task.task_topic.clone(),
            due_date,
            due_time,
        }
    }

    pub fn into_draft(&self) -> Result<TaskDraft, FieldErrors> {
        let errors = validate(self);
        if !errors.is_empty() {
            debug!(errors = %errors, "form rejected");
            return Err(errors);
        }

        let due = normalize(&self.due_date, &self.due_time).map_err(|err| {
            let mut errors = FieldErrors::default();
            match err {
                DueDateError::InvalidDate(_) => errors.insert(FormField::DueDate, err.to_string()),
                DueDateError::InvalidTime(_) => errors.insert(FormField::DueTime, err.to_string()),
            }
            errors
        })?;

        Ok(TaskDraft {
            course_name: self.course_name.trim().to_string(),
            module_name: self.module_name.trim().to_string(),
            module_code: self.module_code.trim().to_string(),
            task_type: self.task_type,
            task_topic: self.task_topic.trim().to_string(),
            due,
        })
    }
}

pub fn validate(form: &TaskFormData) -> FieldErrors {
    let mut errors = FieldErrors::default();

    let required = [
        (FormField::CourseName, &form.course_name, "Course name is required"),
        (FormField::ModuleName, &form.module_name, "Module name is required"),
        (FormField::ModuleCode, &form.module_code, "Module code is required"),
        (FormField::TaskTopic, &form.task_topic, "Task topic is required"),
    ];
    for (field, value, message) in required {
        if value.trim().is_empty() {
            errors.insert(field, message);
        }
    }

    if form.due_date.trim().is_empty() {
        errors.insert(FormField::DueDate, "Due date is required");
    } else if parse_calendar_date(&form.due_date).is_err() {
        errors.insert(FormField::DueDate, "Due date must be a valid date (YYYY-MM-DD)");
    }

    if form.due_time.trim().is_empty() {
        errors.insert(FormField::DueTime, "Due time is required");
    } else if parse_clock(&form.due_time).is_err() {
        errors.insert(FormField::DueTime, "Due time must be a valid time (HH:MM)");
    }

    errors
}

/// Merges `YYYY-MM-DD` and `HH:MM` into one local timestamp. Out-of-range
/// components (Feb 30, 24:00, ...) are errors, never rolled over.
pub fn normalize(due_date: &str, due_time: &str) -> Result<NaiveDateTime, DueDateError> {
    let date = parse_calendar_date(due_date)?;
    let time = parse_clock(due_time)?;
    Ok(date.and_time(time))
}

/// Inverse of [`normalize`] for whole-minute timestamps.
pub fn split_due(due: NaiveDateTime) -> (String, String) {
    (
        due.format("%Y-%m-%d").to_string(),
        due.format("%H:%M").to_string(),
    )
}

fn parse_calendar_date(raw: &str) -> Result<NaiveDate, DueDateError> {
    let invalid = || DueDateError::InvalidDate(raw.to_string());
    let re = Regex::new(r"^(?P<year>\d{4})-(?P<month>\d{1,2})-(?P<day>\d{1,2})$")
        .map_err(|_| invalid())?;
    let caps = re.captures(raw.trim()).ok_or_else(invalid)?;

    let year: i32 = caps["year"].parse().map_err(|_| invalid())?;
    let month: u32 = caps["month"].parse().map_err(|_| invalid())?;
    let day: u32 = caps["day"].parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

fn parse_clock(raw: &str) -> Result<NaiveTime, DueDateError> {
    let invalid = || DueDateError::InvalidTime(raw.to_string());
    let re = Regex::new(r"^(?P<hour>\d{1,2}):(?P<minute>\d{2})$").map_err(|_| invalid())?;
    let caps = re.captures(raw.trim()).ok_or_else(invalid)?;

    let hour: u32 = caps["hour"].parse().map_err(|_| invalid())?;
    let minute: u32 = caps["minute"].parse().map_err(|_| invalid())?;

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Timelike};

    use super::*;

    fn filled() -> TaskFormData {
        TaskFormData {
            course_name: "Computer Science".to_string(),
            module_name: "Algorithms".to_string(),
            module_code: "CS201".to_string(),
            task_type: TaskType::Assignment,
            task_topic: "Graph search".to_string(),
            due_date: "2026-11-03".to_string(),
            due_time: "09:30".to_string(),
        }
    }

    #[test]
    fn complete_form_has_no_errors() {
        assert!(validate(&filled()).is_empty());
    }

    #[test]
    fn blank_text_fields_are_reported_individually() {
        let mut form = filled();
        form.course_name = "   ".to_string();
        form.task_topic = String::new();

        let errors = validate(&form);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get(FormField::CourseName), Some("Course name is required"));
        assert_eq!(errors.get(FormField::TaskTopic), Some("Task topic is required"));
        assert_eq!(errors.get(FormField::ModuleName), None);
    }

    #[test]
    fn missing_and_malformed_due_parts() {
        let mut form = filled();
        form.due_date = String::new();
        form.due_time = "9.30".to_string();

        let errors = validate(&form);
        assert_eq!(errors.get(FormField::DueDate), Some("Due date is required"));
        assert_eq!(
            errors.get(FormField::DueTime),
            Some("Due time must be a valid time (HH:MM)")
        );
    }

    #[test]
    fn normalize_merges_date_and_time() {
        let due = normalize("2026-02-28", "23:59").expect("valid");
        assert_eq!(due.format("%Y-%m-%d %H:%M").to_string(), "2026-02-28 23:59");
    }

    #[test]
    fn impossible_dates_are_errors_not_rollovers() {
        assert_eq!(
            normalize("2026-02-31", "10:00"),
            Err(DueDateError::InvalidDate("2026-02-31".to_string()))
        );
        assert_eq!(
            normalize("2026-13-01", "10:00"),
            Err(DueDateError::InvalidDate("2026-13-01".to_string()))
        );
        assert_eq!(
            normalize("2026-04-01", "24:00"),
            Err(DueDateError::InvalidTime("24:00".to_string()))
        );
        assert_eq!(
            normalize("2026-04-01", "10:60"),
            Err(DueDateError::InvalidTime("10:60".to_string()))
        );
    }

    #[test]
    fn impossible_date_blocks_the_draft() {
        let mut form = filled();
        form.due_date = "2025-02-29".to_string();
        let errors = form.into_draft().expect_err("not a leap year");
        assert!(errors.get(FormField::DueDate).is_some());
    }

    #[test]
    fn draft_is_trimmed() {
        let mut form = filled();
        form.course_name = "  Computer Science ".to_string();
        let draft = form.into_draft().expect("valid form");
        assert_eq!(draft.course_name, "Computer Science");
        assert_eq!(draft.due.hour(), 9);
        assert_eq!(draft.due.minute(), 30);
    }

    #[test]
    fn split_is_zero_padded() {
        let due = normalize("2026-1-5", "7:05").expect("valid");
        assert_eq!(split_due(due), ("2026-01-05".to_string(), "07:05".to_string()));
    }

    #[test]
    fn split_then_normalize_round_trips_whole_minutes() {
        let mut due = normalize("2024-02-28", "00:00").expect("valid");
        for _ in 0..500 {
            let (date, time) = split_due(due);
            assert_eq!(normalize(&date, &time).expect("round trip"), due);
            due += Duration::minutes(877);
        }
    }

    #[test]
    fn prefill_matches_task() {
        let form = filled();
        let draft = form.into_draft().expect("valid");
        let task = Task {
            id: crate::task::TaskId::new(),
            course_name: draft.course_name,
            module_name: draft.module_name,
            module_code: draft.module_code,
            task_type: draft.task_type,
            task_topic: draft.task_topic,
            due: draft.due,
            completed: false,
            created_at: draft.due,
        };
        assert_eq!(TaskFormData::from_task(&task), form);
    }
}
