use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDateTime;
use unicode_width::UnicodeWidthStr;

use crate::calendar::CalendarView;
use crate::config::Config;
use crate::datetime::{
    Urgency, days_remaining, format_date_time, format_day_heading, format_time, status,
    status_text,
};
use crate::notify::{Notice, NoticeLevel};
use crate::reminders::reminder_text;
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks, now))]
    pub fn print_task_grid(&self, tasks: &[Task], now: NaiveDateTime) -> anyhow::Result<()> {
        let color = self.color && io::stdout().is_terminal();
        write_grid(io::stdout().lock(), tasks, now, color)
    }

    #[tracing::instrument(skip(self, view, now))]
    pub fn print_calendar(&self, view: &CalendarView, now: NaiveDateTime) -> anyhow::Result<()> {
        let color = self.color && io::stdout().is_terminal();
        write_calendar(io::stdout().lock(), view, now, color)
    }

    pub fn print_reminders(&self, tasks: &[Task], now: NaiveDateTime) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if tasks.is_empty() {
            writeln!(out, "Nothing due soon.")?;
            return Ok(());
        }
        for task in tasks {
            writeln!(out, "{}  {}", task.id.short(), reminder_text(task, now))?;
        }
        Ok(())
    }

    pub fn print_notices(&self, notices: &[Notice]) -> anyhow::Result<()> {
        let color = self.color && io::stderr().is_terminal();
        let mut err = io::stderr().lock();
        for notice in notices {
            let line = match notice.level {
                NoticeLevel::Success => paint(&notice.message, "32", color),
                NoticeLevel::Error => paint(&notice.message, "31", color),
            };
            writeln!(err, "{line}")?;
        }
        Ok(())
    }
}

fn urgency_code(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Green => "32",
        Urgency::Yellow => "33",
        Urgency::Red => "31",
    }
}

fn status_cell(task: &Task, now: NaiveDateTime, color: bool) -> String {
    let urgency = status(task, now);
    let text = if task.completed {
        "Completed".to_string()
    } else {
        status_text(urgency, days_remaining(task.due, now))
    };
    paint(&text, urgency_code(urgency), color)
}

fn write_grid<W: Write>(
    mut writer: W,
    tasks: &[Task],
    now: NaiveDateTime,
    color: bool,
) -> anyhow::Result<()> {
    if tasks.is_empty() {
        writeln!(writer, "No tasks.")?;
        return Ok(());
    }

    let headers = ["ID", "Code", "Course", "Module", "Type", "Topic", "Due", "Status"]
        .into_iter()
        .map(str::to_string)
        .collect();

    let rows = tasks
        .iter()
        .map(|task| {
            vec![
                task.id.short(),
                task.module_code.clone(),
                task.course_name.clone(),
                task.module_name.clone(),
                task.task_type.to_string(),
                task.task_topic.clone(),
                format_date_time(task.due),
                status_cell(task, now, color),
            ]
        })
        .collect();

    write_table(&mut writer, headers, rows)
}

fn write_calendar<W: Write>(
    mut writer: W,
    view: &CalendarView,
    now: NaiveDateTime,
    color: bool,
) -> anyhow::Result<()> {
    if view.is_empty() {
        writeln!(writer, "No tasks.")?;
        return Ok(());
    }

    for (idx, (day, tasks)) in view.iter().enumerate() {
        if idx > 0 {
            writeln!(writer)?;
        }
        writeln!(writer, "{}", format_day_heading(day))?;
        for task in tasks {
            let mark = if task.completed { "x" } else { " " };
            writeln!(
                writer,
                "  [{mark}] {}  {}  {} {}: {}  ({})",
                format_time(task.due),
                task.id.short(),
                task.module_code,
                task.task_type,
                task.task_topic,
                status_cell(task, now, color),
            )?;
        }
    }
    Ok(())
}

fn paint(text: &str, code: &str, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(header.as_str()))
        .collect();

    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| format!("{header:width$}"))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let visible = UnicodeWidthStr::width(strip_ansi(cell).as_str());
                format!("{cell}{}", " ".repeat(width.saturating_sub(visible)))
            })
            .collect();
        writeln!(writer, "{}", cells.join(" ").trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::group_by_calendar_day;
    use crate::form::normalize;
    use crate::task::{TaskId, TaskType};

    fn task(code: &str, date: &str, time: &str, completed: bool) -> Task {
        let due = normalize(date, time).expect("due");
        Task {
            id: TaskId::new(),
            course_name: "Chemistry".to_string(),
            module_name: "Organic".to_string(),
            module_code: code.to_string(),
            task_type: TaskType::Assignment,
            task_topic: "Alkenes".to_string(),
            due,
            completed,
            created_at: due,
        }
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> anyhow::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn grid_aligns_colored_cells_by_visible_width() {
        let now = normalize("2026-10-18", "12:00").expect("now");
        let tasks = vec![
            task("CHM101", "2026-10-17", "09:00", false),
            task("CHM1", "2026-10-30", "09:00", false),
        ];

        let text = render(|buf| write_grid(buf, &tasks, now, true));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].contains("\x1b[31mOverdue by 1 days\x1b[0m"));
        assert!(lines[3].contains("\x1b[32mOn track - 12 days remaining\x1b[0m"));

        let plain: Vec<String> = lines.iter().map(|line| strip_ansi(line)).collect();
        let due_col = plain[0].find("Due").expect("due header");
        assert_eq!(plain[2].find("Oct 17, 2026"), Some(due_col));
        assert_eq!(plain[3].find("Oct 30, 2026"), Some(due_col));
    }

    #[test]
    fn calendar_prints_one_heading_per_day() {
        let now = normalize("2026-10-18", "12:00").expect("now");
        let tasks = vec![
            task("A", "2026-10-19", "08:00", false),
            task("B", "2026-10-19", "14:30", true),
            task("C", "2026-10-21", "10:00", false),
        ];
        let view = group_by_calendar_day(&tasks);

        let text = render(|buf| write_calendar(buf, &view, now, false));
        assert!(text.starts_with("Monday, October 19, 2026\n"));
        assert!(text.contains("  [x] 02:30 PM"));
        assert!(text.contains("\nWednesday, October 21, 2026\n"));
        assert_eq!(text.matches("day, October").count(), 2);
    }

    #[test]
    fn empty_views_say_so() {
        let now = normalize("2026-10-18", "12:00").expect("now");
        assert_eq!(render(|buf| write_grid(buf, &[], now, false)), "No tasks.\n");
        assert_eq!(
            render(|buf| write_calendar(buf, &CalendarView::default(), now, false)),
            "No tasks.\n"
        );
    }

    #[test]
    fn rejects_unknown_color_setting() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides(vec![("color".to_string(), "sometimes".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }
}
