use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use tracing::info;

use crate::model::{HistoryRecord, Task, DELETION};
use crate::store::{HistoryStore, TaskStore};

/// Delete a task, keeping a snapshot of it in the history so it can be
/// recovered later.
pub fn delete_task<S>(store: &S, task: &Task, at: DateTime<Local>) -> Result<HistoryRecord>
where
    S: TaskStore + HistoryStore + ?Sized,
{
    let record = store.save_record(&HistoryRecord::snapshot(task, DELETION, at))?;
    store.delete_task(task)?;
    info!("Task {:?} moved to history as record {:?}", task.id, record.id);
    Ok(record)
}

/// Restore the task a history record was taken from and drop the record.
/// The task comes back as a new one, with a new identifier.
pub fn recover<S>(store: &S, record_id: i64) -> Result<Task>
where
    S: TaskStore + HistoryStore + ?Sized,
{
    let record = store
        .history_record(record_id)?
        .ok_or_else(|| anyhow!("There is no history record {}.", record_id))?;
    let task = store.save_task(&record.to_task())?;
    store.delete_record(&record)?;
    info!("Record {} recovered as task {:?}", record_id, task.id);
    Ok(task)
}

/// Delete a history record for good.
pub fn purge<S: HistoryStore + ?Sized>(store: &S, record_id: i64) -> Result<HistoryRecord> {
    let record = store
        .history_record(record_id)?
        .ok_or_else(|| anyhow!("There is no history record {}.", record_id))?;
    store.delete_record(&record)?;
    info!("Record {} permanently deleted", record_id);
    Ok(record)
}
