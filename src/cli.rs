use chrono::NaiveDate;
use humantime::parse_duration;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

use crate::model::{Priority, Status, TaskId};

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Add a new task.
    Add {
        /// The task name.
        #[structopt()]
        name: String,

        #[structopt(short, long, default_value = "")]
        description: String,

        /// Who is responsible for the task.
        #[structopt(short, long, default_value = "")]
        assignee: String,

        /// Start date (YYYY-MM-DD).
        #[structopt(long)]
        start: Option<NaiveDate>,

        /// Due date (YYYY-MM-DD).
        #[structopt(long)]
        due: Option<NaiveDate>,

        /// pending, in-progress or completed.
        #[structopt(short, long, default_value = "pending")]
        status: Status,

        /// low, medium or high.
        #[structopt(short, long, default_value = "low")]
        priority: Priority,
    },
    /// List all tasks.
    List,
    /// Change fields of a task.
    Edit {
        #[structopt()]
        id: TaskId,

        #[structopt(short, long)]
        name: Option<String>,

        #[structopt(short, long)]
        description: Option<String>,

        #[structopt(short, long)]
        assignee: Option<String>,

        #[structopt(long)]
        start: Option<NaiveDate>,

        #[structopt(long)]
        due: Option<NaiveDate>,

        /// Remove the due date. Wins over --due.
        #[structopt(long)]
        no_due: bool,

        #[structopt(short, long)]
        status: Option<Status>,

        #[structopt(short, long)]
        priority: Option<Priority>,
    },
    /// Mark a task as completed.
    Done {
        #[structopt()]
        id: TaskId,
    },
    /// Delete a task, keeping a copy in the history.
    Rm {
        #[structopt()]
        id: TaskId,
    },
    /// List deleted tasks.
    History,
    /// Restore a deleted task from the history.
    Recover {
        /// The history record id.
        #[structopt()]
        id: i64,
    },
    /// Permanently delete a history record.
    Purge {
        /// The history record id.
        #[structopt()]
        id: i64,
    },
    /// Recompute priorities from due dates.
    Priorities,
    /// Look for overdue tasks.
    Scan,
    /// Show overdue task notifications and mark them as seen.
    Notifications,
    /// Dismiss the notification of a task.
    Dismiss {
        #[structopt()]
        id: TaskId,
    },
    /// Apply the priority and overdue rules periodically.
    Watch {
        /// Time between runs (parse_duration)
        #[structopt(long, default_value = "1h", parse(try_from_str=parse_duration))]
        every: Duration,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "overdue",
    about = "A task tracker that escalates priorities as deadlines approach."
)]
pub struct CommandLineArgs {
    #[structopt(subcommand)]
    pub action: Command,

    /// Use a different journal file.
    #[structopt(parse(from_os_str), short, long, env = "OVERDUE_JOURNAL")]
    pub journal_file: Option<PathBuf>,

    /// Pretend today is this date (YYYY-MM-DD).
    #[structopt(long)]
    pub today: Option<NaiveDate>,

    /// Log more (-v, -vv).
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,
}
