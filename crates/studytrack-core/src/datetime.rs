use chrono::{
  Local,
  NaiveDateTime
};
use serde::{
  Deserialize,
  Serialize
};

use crate::task::Task;

const DUE_SOON_DAYS: i64 = 3;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
  Green,
  Yellow,
  Red
}

impl Urgency {
  pub fn as_str(&self) -> &'static str {
    match self {
      | Self::Green => "green",
      | Self::Yellow => "yellow",
      | Self::Red => "red"
    }
  }
}

/// Wall-clock "now" for callers at the
/// edge. Everything below takes `now`
/// as an argument instead.
#[must_use]
pub fn local_now() -> NaiveDateTime {
  Local::now().naive_local()
}

/// Whole calendar days between the date
/// of `now` and the date of `due`.
///
/// Time of day is dropped from both
/// sides, so anything due later today
/// (or earlier today) is `0`.
#[must_use]
pub fn days_remaining(
  due: NaiveDateTime,
  now: NaiveDateTime
) -> i64 {
  (due.date() - now.date()).num_days()
}

#[must_use]
pub fn status(
  task: &Task,
  now: NaiveDateTime
) -> Urgency {
  if task.completed {
    return Urgency::Green;
  }

  let days =
    days_remaining(task.due, now);
  if days < 0 {
    Urgency::Red
  } else if days <= DUE_SOON_DAYS {
    Urgency::Yellow
  } else {
    Urgency::Green
  }
}

#[must_use]
pub fn status_text(
  status: Urgency,
  days_remaining: i64
) -> String {
  match status {
    | Urgency::Green => {
      format!(
        "On track - {days_remaining} \
         days remaining"
      )
    }
    | Urgency::Yellow => {
      format!(
        "Due soon - {days_remaining} \
         days remaining"
      )
    }
    | Urgency::Red
      if days_remaining == 0 =>
    {
      "Due today".to_string()
    }
    | Urgency::Red => {
      format!(
        "Overdue by {} days",
        days_remaining.abs()
      )
    }
  }
}

/// `Oct 18, 2026`
#[must_use]
pub fn format_date(
  dt: NaiveDateTime
) -> String {
  dt.format("%b %-d, %Y").to_string()
}

/// `03:05 PM`
#[must_use]
pub fn format_time(
  dt: NaiveDateTime
) -> String {
  dt.format("%I:%M %p").to_string()
}

#[must_use]
pub fn format_date_time(
  dt: NaiveDateTime
) -> String {
  format!(
    "{} at {}",
    format_date(dt),
    format_time(dt)
  )
}

/// `Sunday, October 18, 2026`
#[must_use]
pub fn format_day_heading(
  date: chrono::NaiveDate
) -> String {
  date
    .format("%A, %B %-d, %Y")
    .to_string()
}
