use anyhow::anyhow;
use chrono::{Duration, NaiveDateTime};

use crate::task::Task;

pub const DEFAULT_LOOKAHEAD_HOURS: i64 = 24;

/// A positive lookahead of `hours`, or an error when chrono cannot
/// represent it.
pub fn lookahead_window(hours: i64) -> anyhow::Result<Duration> {
    if hours <= 0 {
        return Err(anyhow!("lookahead must be positive, got {hours} hours"));
    }
    Duration::try_hours(hours).ok_or_else(|| anyhow!("lookahead of {hours} hours is out of range"))
}

/// Incomplete tasks whose due time falls in `[now, now + lookahead]`,
/// earliest first.
pub fn due_within(
    tasks: &[Task],
    now: NaiveDateTime,
    lookahead: Duration,
) -> anyhow::Result<Vec<Task>> {
    let horizon = now
        .checked_add_signed(lookahead)
        .ok_or_else(|| anyhow!("lookahead of {lookahead} runs past the last representable date"))?;
    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|task| !task.completed && task.due >= now && task.due <= horizon)
        .cloned()
        .collect();
    out.sort_by_key(|task| task.due);
    Ok(out)
}

pub fn reminder_text(task: &Task, now: NaiveDateTime) -> String {
    let minutes = (task.due - now).num_minutes().max(0);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    format!(
        "{} ({}) {} due in {hours}h {minutes:02}m: {}",
        task.module_code, task.course_name, task.task_type, task.task_topic
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::normalize;
    use crate::task::{TaskId, TaskType};

    fn task(due: &str, completed: bool) -> Task {
        let (date, time) = due.split_once(' ').expect("date and time");
        let due = normalize(date, time).expect("due");
        Task {
            id: TaskId::new(),
            course_name: "Biology".to_string(),
            module_name: "Genetics".to_string(),
            module_code: "BIO230".to_string(),
            task_type: TaskType::Test,
            task_topic: "Mendel".to_string(),
            due,
            completed,
            created_at: due,
        }
    }

    #[test]
    fn window_is_inclusive_and_skips_done_and_past() {
        let now = normalize("2026-04-01", "09:00").expect("now");
        let tasks = vec![
            task("2026-04-02 09:00", false),
            task("2026-04-01 08:59", false),
            task("2026-04-01 12:00", true),
            task("2026-04-01 10:00", false),
            task("2026-04-02 09:01", false),
        ];

        let window = lookahead_window(DEFAULT_LOOKAHEAD_HOURS).expect("window");
        let due = due_within(&tasks, now, window).expect("due");
        let stamps: Vec<String> = due.iter().map(|t| t.due.format("%d %H:%M").to_string()).collect();
        assert_eq!(stamps, vec!["01 10:00", "02 09:00"]);
    }

    #[test]
    fn huge_lookahead_is_an_error_not_a_panic() {
        let now = normalize("2026-04-01", "09:00").expect("now");

        assert!(lookahead_window(3_000_000_000).is_err());
        assert!(lookahead_window(0).is_err());
        assert!(lookahead_window(-5).is_err());

        let representable = lookahead_window(2_500_000_000).expect("fits in a duration");
        assert!(due_within(&[task("2026-04-01 10:00", false)], now, representable).is_err());
    }

    #[test]
    fn text_counts_hours_and_minutes() {
        let now = normalize("2026-04-01", "09:00").expect("now");
        let t = task("2026-04-01 11:05", false);
        assert_eq!(reminder_text(&t, now), "BIO230 (Biology) Test due in 2h 05m: Mendel");
    }
}
