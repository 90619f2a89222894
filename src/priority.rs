use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::model::{Priority, Task};
use crate::store::TaskStore;

/// Recompute the priority of every active task from the days left until
/// its due date, saving each task whose priority changes. Completed tasks
/// and tasks without a due date are left alone.
///
/// Returns the number of tasks whose priority changed. A failed save
/// aborts the batch; tasks saved before it keep their new priority.
pub fn recompute_priorities<S: TaskStore + ?Sized>(
    store: &S,
    tasks: &mut [Task],
    today: NaiveDate,
) -> Result<usize> {
    let mut changed = 0;
    for task in tasks.iter_mut() {
        if task.is_completed() {
            continue;
        }
        let days = match task.days_remaining(today) {
            Some(days) => days,
            None => {
                debug!(id = ?task.id, "no due date, priority left as is");
                continue;
            }
        };

        let priority = Priority::for_days_remaining(days);
        if priority != task.priority {
            info!(
                "Task {}: priority changed from {} to {} ({} days remaining)",
                task.name, task.priority, priority, days
            );
            let updated = Task {
                priority,
                ..task.clone()
            };
            *task = store.save_task(&updated)?;
            changed += 1;
        }
    }
    info!("Priority update completed. {} tasks updated", changed);
    Ok(changed)
}
