use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::task::Task;

/// Tasks bucketed by the calendar date they are due on. Within a day the
/// input order is kept, so grouping an already sorted projection keeps
/// that sort inside each bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarView {
    groups: BTreeMap<NaiveDate, Vec<Task>>,
}

impl CalendarView {
    /// Distinct due days, earliest first.
    pub fn days(&self) -> Vec<NaiveDate> {
        self.groups.keys().copied().collect()
    }

    pub fn tasks_on(&self, day: NaiveDate) -> &[Task] {
        self.groups.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &[Task])> {
        self.groups.iter().map(|(day, tasks)| (*day, tasks.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

pub fn group_by_calendar_day(tasks: &[Task]) -> CalendarView {
    let mut groups: BTreeMap<NaiveDate, Vec<Task>> = BTreeMap::new();
    for task in tasks {
        groups.entry(task.due.date()).or_default().push(task.clone());
    }
    CalendarView { groups }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDateTime};

    use super::*;
    use crate::task::{TaskId, TaskType};

    fn due_at(raw: &str, topic: &str) -> Task {
        let due = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").expect("valid due");
        Task {
            id: TaskId::new(),
            course_name: "History".to_string(),
            module_name: "Modern Europe".to_string(),
            module_code: "HIS210".to_string(),
            task_type: TaskType::Assignment,
            task_topic: topic.to_string(),
            due,
            completed: false,
            created_at: due - Duration::days(30),
        }
    }

    #[test]
    fn groups_by_date_ignoring_time() {
        let tasks = vec![
            due_at("2026-06-02 23:00", "late"),
            due_at("2026-06-01 09:00", "first"),
            due_at("2026-06-02 08:00", "early"),
        ];
        let view = group_by_calendar_day(&tasks);

        let days: Vec<String> = view.days().iter().map(|d| d.to_string()).collect();
        assert_eq!(days, vec!["2026-06-01", "2026-06-02"]);

        let june_2 = view.days()[1];
        let topics: Vec<&str> = view
            .tasks_on(june_2)
            .iter()
            .map(|t| t.task_topic.as_str())
            .collect();
        assert_eq!(topics, vec!["late", "early"]);
    }

    #[test]
    fn many_days_produce_no_empty_groups() {
        let start = NaiveDateTime::parse_from_str("2026-01-01 10:00", "%Y-%m-%d %H:%M")
            .expect("valid start");
        let tasks: Vec<Task> = (0..120)
            .rev()
            .map(|i| {
                let mut task = due_at("2026-01-01 10:00", &format!("t{i}"));
                task.due = start + Duration::days(i / 2 * 3);
                task
            })
            .collect();

        let view = group_by_calendar_day(&tasks);
        assert_eq!(view.len(), 60);
        assert!(view.iter().all(|(_, tasks)| !tasks.is_empty()));
        assert!(view.days().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(view.iter().map(|(_, t)| t.len()).sum::<usize>(), 120);
    }

    #[test]
    fn empty_input_is_empty_view() {
        let view = group_by_calendar_day(&[]);
        assert!(view.is_empty());
        assert!(view.days().is_empty());
    }
}
