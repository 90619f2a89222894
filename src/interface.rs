use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate};
use prettytable::Table;
use rusqlite::Connection;

use crate::history;
use crate::model::{HistoryRecord, Priority, Status, Task, TaskId, TaskLabels};
use crate::priority::recompute_priorities;
use crate::store::{load_tracker, save_tracker, write_transaction, HistoryStore, TaskStore};

const DESCRIPTION_WIDTH: usize = 40;

/// Fields of a task to change. Unset fields are kept.
#[derive(Debug, Default)]
pub struct TaskChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<Option<NaiveDate>>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
}

fn find_task(db: &Connection, id: TaskId) -> Result<Task> {
    db.task(id)?
        .ok_or_else(|| anyhow!("There is no task {}.", id))
}

pub fn add_task(db: &Connection, task: Task) -> Result<Task> {
    if task.name.trim().is_empty() {
        bail!("The task name can not be empty.");
    }
    let task = db.save_task(&task)?;
    println!("{}. {} ({}, {})", task.fmt_id(), task.name, task.priority, task.fmt_due_date());
    Ok(task)
}

pub fn edit_task(db: &Connection, id: TaskId, changes: TaskChanges) -> Result<Task> {
    let tx = write_transaction(db)?;
    let mut task = find_task(&tx, id)?;
    if let Some(name) = changes.name {
        if name.trim().is_empty() {
            bail!("The task name can not be empty.");
        }
        task.name = name;
    }
    if let Some(description) = changes.description {
        task.description = description;
    }
    if let Some(assignee) = changes.assignee {
        task.assignee = assignee;
    }
    if let Some(start_date) = changes.start_date {
        task.start_date = Some(start_date);
    }
    if let Some(due_date) = changes.due_date {
        task.due_date = due_date;
    }
    if let Some(status) = changes.status {
        task.status = status;
    }
    if let Some(priority) = changes.priority {
        task.priority = priority;
    }

    let task = tx.save_task(&task)?;
    if task.is_completed() {
        forget_notification(&tx, id)?;
    }
    tx.commit().context("Failed to save task.")?;
    Ok(task)
}

/// Mark a task as completed and dismiss its notification, if any.
pub fn finish_task(db: &Connection, id: TaskId) -> Result<Task> {
    let task = edit_task(
        db,
        id,
        TaskChanges {
            status: Some(Status::Completed),
            ..TaskChanges::default()
        },
    )?;
    println!("{}. {} completed.", task.fmt_id(), task.name);
    Ok(task)
}

/// Delete a task, keeping it in the history, and dismiss its notification.
pub fn remove_task(db: &Connection, id: TaskId) -> Result<HistoryRecord> {
    let tx = write_transaction(db)?;
    let task = find_task(&tx, id)?;
    let record = history::delete_task(&*tx, &task, Local::now())?;
    forget_notification(&tx, id)?;
    tx.commit().context("Failed to remove task.")?;
    println!(
        "{}. {} moved to history as record {}.",
        task.fmt_id(),
        task.name,
        record.fmt_id()
    );
    Ok(record)
}

fn forget_notification(db: &Connection, id: TaskId) -> Result<()> {
    let mut tracker = load_tracker(db)?;
    tracker.dismiss(id);
    save_tracker(db, &tracker)
}

pub fn list(db: &Connection) -> Result<()> {
    let tasks = db.tasks()?;
    if tasks.is_empty() {
        println!("No tasks. Use 'overdue add' to add new tasks.");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["id", "task", "assignee", "start", "due", "status", "priority", "description"]);
    for task in tasks {
        table.add_row(row![
            task.fmt_id(),
            task.name,
            task.assignee,
            task.fmt_start_date(),
            task.fmt_due_date(),
            task.status,
            task.priority,
            textwrap::fill(&task.description, DESCRIPTION_WIDTH)
        ]);
    }
    table.printstd();
    Ok(())
}

pub fn list_history(db: &Connection) -> Result<()> {
    let records = db.history()?;
    if records.is_empty() {
        println!("History is empty.");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["record", "task", "assignee", "due", "status", "priority", "action", "deleted at"]);
    for record in records {
        table.add_row(row![
            record.fmt_id(),
            record.name,
            record.assignee,
            record.fmt_due_date(),
            record.status,
            record.priority,
            record.action,
            record.deleted_at.format("%Y-%m-%d %T")
        ]);
    }
    table.printstd();
    Ok(())
}

pub fn recover(db: &Connection, record_id: i64) -> Result<Task> {
    let tx = write_transaction(db)?;
    let task = history::recover(&*tx, record_id)?;
    tx.commit().context("Failed to recover task.")?;
    println!("Record {} recovered as task {}.", record_id, task.fmt_id());
    Ok(task)
}

pub fn purge(db: &Connection, record_id: i64) -> Result<()> {
    let tx = write_transaction(db)?;
    let record = history::purge(&*tx, record_id)?;
    tx.commit().context("Failed to purge record.")?;
    println!("Record {} ({}) permanently deleted.", record_id, record.name);
    Ok(())
}

pub fn priorities(db: &Connection, today: NaiveDate) -> Result<usize> {
    let tx = write_transaction(db)?;
    let mut tasks = tx.tasks()?;
    let changed = recompute_priorities(&*tx, &mut tasks, today)?;
    tx.commit().context("Failed to save priorities.")?;
    println!("{} task(s) changed priority.", changed);
    Ok(changed)
}

pub fn scan(db: &Connection, today: NaiveDate) -> Result<usize> {
    let tx = write_transaction(db)?;
    let tasks = tx.tasks()?;
    let mut tracker = load_tracker(&tx)?;
    let found = tracker.scan(&*tx, &tasks, today)?;
    save_tracker(&tx, &tracker)?;
    tx.commit().context("Failed to save notifications.")?;
    println!(
        "{} new overdue task(s), {} pending notification(s).",
        found,
        tracker.count()
    );
    Ok(found)
}

/// Show the tracked overdue tasks. Looking at them marks them as seen.
pub fn notifications(db: &Connection, today: NaiveDate) -> Result<()> {
    let tx = write_transaction(db)?;
    let mut tracker = load_tracker(&tx)?;
    if tracker.count() == 0 {
        println!("No overdue tasks.");
    } else {
        if tracker.has_unseen() {
            println!("New overdue tasks!");
        }
        let mut table = Table::new();
        table.add_row(row!["id", "task", "assignee", "due", "days late", "priority"]);
        for task in tracker.list_pending() {
            let late = task
                .days_remaining(today)
                .map_or_else(|| "-".to_string(), |days| (-days).to_string());
            table.add_row(row![
                task.fmt_id(),
                task.name,
                task.assignee,
                task.fmt_due_date(),
                late,
                task.priority
            ]);
        }
        table.printstd();
    }
    tracker.acknowledge_all();
    save_tracker(&tx, &tracker)?;
    tx.commit().context("Failed to save notifications.")?;
    Ok(())
}

pub fn dismiss(db: &Connection, id: TaskId) -> Result<()> {
    let tx = write_transaction(db)?;
    let mut tracker = load_tracker(&tx)?;
    let before = tracker.count();
    tracker.dismiss(id);
    if tracker.count() == before {
        println!("Task {} has no notification.", id);
        return Ok(());
    }
    save_tracker(&tx, &tracker)?;
    tx.commit().context("Failed to dismiss notification.")?;
    println!("Notification for task {} dismissed.", id);
    Ok(())
}
