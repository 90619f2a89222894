use chrono::{DateTime, Local, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier assigned by the store when a task is first saved.
pub type TaskId = i64;

/// A single task, saved as an entry in the task table.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: Option<TaskId>,
    pub name: String,
    pub description: String,
    pub assignee: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub status: Status,
    pub priority: Priority,
}

/// The progress of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    InProgress,
    Completed,
}

/// How urgent a task is. Ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// A snapshot of a deleted task, saved as an entry in the history table.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub id: Option<i64>,
    pub original_id: Option<TaskId>,
    pub name: String,
    pub description: String,
    pub assignee: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub status: Status,
    pub priority: Priority,
    pub deleted_at: DateTime<Local>,
    pub action: String,
}

/// Action label of records created by deleting a task.
pub const DELETION: &str = "DELETION";

/// Returned when a status or priority label is not recognized.
#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseLabelError {
    kind: &'static str,
    value: String,
}

impl Task {
    /// A new, not yet persisted task: pending, low priority, no dates.
    pub fn new(name: &str) -> Task {
        Task {
            id: None,
            name: name.to_string(),
            description: String::new(),
            assignee: String::new(),
            start_date: None,
            due_date: None,
            status: Status::Pending,
            priority: Priority::Low,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    /// Whole days left until the due date, negative once it has passed.
    /// None if the task has no due date.
    pub fn days_remaining(&self, today: NaiveDate) -> Option<i64> {
        self.due_date
            .map(|due| due.signed_duration_since(today).num_days())
    }

    /// Whether the task is active and its due date is today or earlier.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_completed() && matches!(self.due_date, Some(due) if due <= today)
    }
}

impl HistoryRecord {
    /// Snapshot a task at the moment an action (usually a deletion) is
    /// performed on it.
    pub fn snapshot(task: &Task, action: &str, at: DateTime<Local>) -> HistoryRecord {
        HistoryRecord {
            id: None,
            original_id: task.id,
            name: task.name.clone(),
            description: task.description.clone(),
            assignee: task.assignee.clone(),
            start_date: task.start_date,
            due_date: task.due_date,
            status: task.status,
            priority: task.priority,
            deleted_at: at,
            action: action.to_string(),
        }
    }

    /// Rebuild the task this record was taken from. The original
    /// identifier is not carried over: the task is saved as a new one.
    pub fn to_task(&self) -> Task {
        Task {
            id: None,
            name: self.name.clone(),
            description: self.description.clone(),
            assignee: self.assignee.clone(),
            start_date: self.start_date,
            due_date: self.due_date,
            status: self.status,
            priority: self.priority,
        }
    }
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in-progress",
            Status::Completed => "completed",
        }
    }
}

impl Priority {
    /// The priority a task deserves given the days left until it is due.
    /// Boundaries are inclusive: one day or less is high, three days or
    /// less is medium.
    pub fn for_days_remaining(days: i64) -> Priority {
        if days <= 1 {
            Priority::High
        } else if days <= 3 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Status {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "in-progress" | "inprogress" | "in_progress" => Ok(Status::InProgress),
            "completed" | "done" => Ok(Status::Completed),
            _ => Err(ParseLabelError {
                kind: "status",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Priority {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ParseLabelError {
                kind: "priority",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Labels are stored as text in the journal.

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Formatting helpers used when rendering tables.
pub trait TaskLabels {
    fn fmt_id(&self) -> String;
    fn fmt_start_date(&self) -> String;
    fn fmt_due_date(&self) -> String;
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => "-".to_string(),
    }
}

impl TaskLabels for Task {
    fn fmt_id(&self) -> String {
        self.id.map_or_else(|| "-".to_string(), |id| id.to_string())
    }

    fn fmt_start_date(&self) -> String {
        fmt_date(self.start_date)
    }

    fn fmt_due_date(&self) -> String {
        fmt_date(self.due_date)
    }
}

impl TaskLabels for HistoryRecord {
    fn fmt_id(&self) -> String {
        self.id.map_or_else(|| "-".to_string(), |id| id.to_string())
    }

    fn fmt_start_date(&self) -> String {
        fmt_date(self.start_date)
    }

    fn fmt_due_date(&self) -> String {
        fmt_date(self.due_date)
    }
}
