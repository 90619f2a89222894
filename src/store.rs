use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use tracing::debug;

use crate::model::{HistoryRecord, Task, TaskId};
use crate::notify::NotificationTracker;

/// Where tasks live. Saving a task without an identifier inserts it and
/// returns it with the identifier the store assigned.
pub trait TaskStore {
    fn tasks(&self) -> Result<Vec<Task>>;
    fn task(&self, id: TaskId) -> Result<Option<Task>>;
    fn save_task(&self, task: &Task) -> Result<Task>;
    fn delete_task(&self, task: &Task) -> Result<()>;
}

/// Where snapshots of deleted tasks live, keyed independently from tasks.
pub trait HistoryStore {
    fn history(&self) -> Result<Vec<HistoryRecord>>;
    fn history_record(&self, id: i64) -> Result<Option<HistoryRecord>>;
    fn save_record(&self, record: &HistoryRecord) -> Result<HistoryRecord>;
    fn delete_record(&self, record: &HistoryRecord) -> Result<()>;
}

/// Initialize the journal database. Safe to run on an existing journal.
pub fn init_journal(db: &Connection) -> Result<()> {
    db.execute(
        "CREATE TABLE if not exists task (
                  id              INTEGER PRIMARY KEY AUTOINCREMENT,
                  name            TEXT NOT NULL,
                  description     TEXT NOT NULL,
                  assignee        TEXT NOT NULL,
                  start_date      TEXT,
                  due_date        TEXT,
                  status          TEXT NOT NULL,
                  priority        TEXT NOT NULL
                  )",
        [],
    )
    .context("Failed to create task table.")?;

    db.execute(
        "CREATE TABLE if not exists history (
                  id              INTEGER PRIMARY KEY AUTOINCREMENT,
                  original_id     INTEGER,
                  name            TEXT NOT NULL,
                  description     TEXT NOT NULL,
                  assignee        TEXT NOT NULL,
                  start_date      TEXT,
                  due_date        TEXT,
                  status          TEXT NOT NULL,
                  priority        TEXT NOT NULL,
                  deleted_at      TEXT NOT NULL,
                  action          TEXT NOT NULL
                  )",
        [],
    )
    .context("Failed to create history table.")?;

    db.execute(
        "CREATE TABLE if not exists notification (
                  position        INTEGER PRIMARY KEY AUTOINCREMENT,
                  task_id         INTEGER NOT NULL UNIQUE
                  )",
        [],
    )
    .context("Failed to create notification table.")?;

    db.execute(
        "CREATE TABLE if not exists tracker_state (
                  id              INTEGER PRIMARY KEY CHECK (id = 1),
                  unseen          INTEGER NOT NULL
                  )",
        [],
    )
    .context("Failed to create tracker_state table.")?;

    db.execute("CREATE INDEX if not exists due_date_index ON task (due_date)", [])
        .context("Failed to create due date index on task table.")?;

    Ok(())
}

/// Start a transaction that holds the journal's write lock from the
/// start, so state read inside it can not be changed by another
/// connection before it is written back.
pub fn write_transaction(db: &Connection) -> Result<Transaction<'_>> {
    Transaction::new_unchecked(db, TransactionBehavior::Immediate)
        .context("Failed to start transaction.")
}

/// Return a task from a row in this order: [id, name, description,
/// assignee, start_date, due_date, status, priority]
fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        assignee: row.get(3)?,
        start_date: row.get(4)?,
        due_date: row.get(5)?,
        status: row.get(6)?,
        priority: row.get(7)?,
    })
}

/// Return a history record from a row in this order: [id, original_id,
/// name, description, assignee, start_date, due_date, status, priority,
/// deleted_at, action]
fn record_from_row(row: &Row) -> rusqlite::Result<HistoryRecord> {
    Ok(HistoryRecord {
        id: row.get(0)?,
        original_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        assignee: row.get(4)?,
        start_date: row.get(5)?,
        due_date: row.get(6)?,
        status: row.get(7)?,
        priority: row.get(8)?,
        deleted_at: row.get(9)?,
        action: row.get(10)?,
    })
}

const TASK_COLUMNS: &str =
    "id, name, description, assignee, start_date, due_date, status, priority";

const RECORD_COLUMNS: &str = "id, original_id, name, description, assignee, start_date, due_date, status, priority, deleted_at, action";

impl TaskStore for Connection {
    fn tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .prepare(&format!("SELECT {} FROM task ORDER BY id", TASK_COLUMNS))
            .context("Failed to fetch tasks from database.")?;
        let mapped_rows = stmt
            .query_map([], task_from_row)
            .context("Failed to fetch tasks from database.")?;

        let mut tasks = Vec::new();
        for task in mapped_rows {
            tasks.push(task.context("Failed to read task from database.")?);
        }
        Ok(tasks)
    }

    fn task(&self, id: TaskId) -> Result<Option<Task>> {
        let task = self
            .query_row(
                &format!("SELECT {} FROM task WHERE id = ?1", TASK_COLUMNS),
                params![id],
                task_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to get task {} from database.", id))?;
        Ok(task)
    }

    fn save_task(&self, task: &Task) -> Result<Task> {
        match task.id {
            Some(id) => {
                let updated = self.execute(
                    "UPDATE task SET name = ?1, description = ?2, assignee = ?3, start_date = ?4,
                     due_date = ?5, status = ?6, priority = ?7 WHERE id = ?8",
                    params![
                        task.name,
                        task.description,
                        task.assignee,
                        task.start_date,
                        task.due_date,
                        task.status,
                        task.priority,
                        id
                    ],
                )
                .with_context(|| format!("Failed to update task {} in database.", id))?;
                if updated == 0 {
                    bail!("There is no task {}.", id);
                }
                debug!(id, "task updated");
                Ok(task.clone())
            }
            None => {
                self.execute(
                    "INSERT INTO task (name, description, assignee, start_date, due_date, status, priority)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        task.name,
                        task.description,
                        task.assignee,
                        task.start_date,
                        task.due_date,
                        task.status,
                        task.priority
                    ],
                )
                .context("Failed to insert task to database.")?;
                let id = self.last_insert_rowid();
                debug!(id, "task inserted");
                Ok(Task {
                    id: Some(id),
                    ..task.clone()
                })
            }
        }
    }

    fn delete_task(&self, task: &Task) -> Result<()> {
        if let Some(id) = task.id {
            self.execute("DELETE FROM task WHERE id = ?1", params![id])
                .with_context(|| format!("Failed to remove task {} from database.", id))?;
        }
        Ok(())
    }
}

impl HistoryStore for Connection {
    fn history(&self) -> Result<Vec<HistoryRecord>> {
        let mut stmt = self
            .prepare(&format!(
                "SELECT {} FROM history ORDER BY id DESC",
                RECORD_COLUMNS
            ))
            .context("Failed to fetch history from database.")?;
        let mapped_rows = stmt
            .query_map([], record_from_row)
            .context("Failed to fetch history from database.")?;

        let mut records = Vec::new();
        for record in mapped_rows {
            records.push(record.context("Failed to read history record from database.")?);
        }
        Ok(records)
    }

    fn history_record(&self, id: i64) -> Result<Option<HistoryRecord>> {
        let record = self
            .query_row(
                &format!("SELECT {} FROM history WHERE id = ?1", RECORD_COLUMNS),
                params![id],
                record_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to get history record {} from database.", id))?;
        Ok(record)
    }

    fn save_record(&self, record: &HistoryRecord) -> Result<HistoryRecord> {
        self.execute(
            "INSERT OR REPLACE INTO history (id, original_id, name, description, assignee, start_date,
             due_date, status, priority, deleted_at, action)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.id,
                record.original_id,
                record.name,
                record.description,
                record.assignee,
                record.start_date,
                record.due_date,
                record.status,
                record.priority,
                record.deleted_at,
                record.action
            ],
        )
        .context("Failed to insert history record to database.")?;
        Ok(HistoryRecord {
            id: Some(record.id.unwrap_or_else(|| self.last_insert_rowid())),
            ..record.clone()
        })
    }

    fn delete_record(&self, record: &HistoryRecord) -> Result<()> {
        if let Some(id) = record.id {
            self.execute("DELETE FROM history WHERE id = ?1", params![id])
                .with_context(|| format!("Failed to remove history record {} from database.", id))?;
        }
        Ok(())
    }
}

/// Rebuild the notification tracker from the journal. Tracked tasks that
/// no longer exist are dropped.
pub fn load_tracker(db: &Connection) -> Result<NotificationTracker> {
    let mut stmt = db
        .prepare(
            "SELECT t.id, t.name, t.description, t.assignee, t.start_date, t.due_date, t.status, t.priority
             FROM notification n JOIN task t ON t.id = n.task_id ORDER BY n.position",
        )
        .context("Failed to fetch notifications from database.")?;
    let mapped_rows = stmt
        .query_map([], task_from_row)
        .context("Failed to fetch notifications from database.")?;

    let mut pending = Vec::new();
    for task in mapped_rows {
        pending.push(task.context("Failed to read notification from database.")?);
    }

    let unseen = db
        .query_row("SELECT unseen FROM tracker_state WHERE id = 1", [], |row| {
            row.get::<_, bool>(0)
        })
        .optional()
        .context("Failed to read tracker state from database.")?
        .unwrap_or(false);

    Ok(NotificationTracker::restore(pending, unseen))
}

/// Replace the tracker saved in the journal with the given one.
pub fn save_tracker(db: &Connection, tracker: &NotificationTracker) -> Result<()> {
    db.execute("DELETE FROM notification", [])
        .context("Failed to clear notifications in database.")?;
    for task in tracker.list_pending() {
        if let Some(id) = task.id {
            db.execute(
                "INSERT OR IGNORE INTO notification (task_id) VALUES (?1)",
                params![id],
            )
            .context("Failed to insert notification to database.")?;
        }
    }
    db.execute(
        "INSERT OR REPLACE INTO tracker_state (id, unseen) VALUES (1, ?1)",
        params![tracker.has_unseen()],
    )
    .context("Failed to save tracker state to database.")?;
    Ok(())
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// In-memory task store for tests. Records every save and can be told
    /// to fail after a number of successful saves.
    #[derive(Default)]
    pub struct MemoryStore {
        tasks: RefCell<Vec<Task>>,
        next_id: Cell<TaskId>,
        pub saves: RefCell<Vec<Task>>,
        pub fail_after: Cell<Option<usize>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Save all tasks and return them with their identifiers.
        pub fn seed(&self, tasks: Vec<Task>) -> Vec<Task> {
            let seeded = tasks
                .iter()
                .map(|t| self.save_task(t).unwrap())
                .collect();
            self.saves.borrow_mut().clear();
            seeded
        }
    }

    impl TaskStore for MemoryStore {
        fn tasks(&self) -> Result<Vec<Task>> {
            Ok(self.tasks.borrow().clone())
        }

        fn task(&self, id: TaskId) -> Result<Option<Task>> {
            Ok(self
                .tasks
                .borrow()
                .iter()
                .find(|t| t.id == Some(id))
                .cloned())
        }

        fn save_task(&self, task: &Task) -> Result<Task> {
            if let Some(limit) = self.fail_after.get() {
                if self.saves.borrow().len() >= limit {
                    bail!("store unavailable");
                }
            }
            let saved = match task.id {
                Some(id) => {
                    if self.task(id)?.is_none() {
                        bail!("There is no task {}.", id);
                    }
                    task.clone()
                }
                None => {
                    self.next_id.set(self.next_id.get() + 1);
                    Task {
                        id: Some(self.next_id.get()),
                        ..task.clone()
                    }
                }
            };
            let mut tasks = self.tasks.borrow_mut();
            match tasks.iter_mut().find(|t| t.id == saved.id) {
                Some(existing) => *existing = saved.clone(),
                None => tasks.push(saved.clone()),
            }
            self.saves.borrow_mut().push(saved.clone());
            Ok(saved)
        }

        fn delete_task(&self, task: &Task) -> Result<()> {
            self.tasks.borrow_mut().retain(|t| t.id != task.id);
            Ok(())
        }
    }
}
