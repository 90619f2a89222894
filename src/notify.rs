use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::model::{Priority, Task, TaskId};
use crate::store::TaskStore;

/// Keeps track of overdue tasks the user has not dismissed yet, and of
/// whether any of them arrived since the user last looked.
///
/// The tracker holds no thread. Callers running `scan` from a scheduler
/// and `dismiss` from user actions on different threads must serialize
/// access to it.
#[derive(Debug, Default)]
pub struct NotificationTracker {
    pending: Vec<Task>,
    unseen: bool,
}

impl NotificationTracker {
    /// Rebuild a tracker from previously saved state.
    pub fn restore(pending: Vec<Task>, unseen: bool) -> Self {
        NotificationTracker { pending, unseen }
    }

    /// Look for active tasks due today or earlier. Every such task is
    /// raised to high priority (and saved) if it is not already, and added
    /// to the tracked set unless it is there. Entries for tasks that were
    /// completed or are no longer overdue are dropped.
    ///
    /// Returns the number of newly tracked tasks; if there is at least one
    /// the tracker is flagged as having unseen notifications.
    pub fn scan<S: TaskStore + ?Sized>(
        &mut self,
        store: &S,
        tasks: &[Task],
        today: NaiveDate,
    ) -> Result<usize> {
        let mut found = 0;
        for task in tasks {
            let id = match task.id {
                Some(id) => id,
                None => continue,
            };

            if !task.is_overdue(today) {
                if self.position(id).is_some() {
                    debug!(id, "task no longer overdue, notification dropped");
                    self.dismiss(id);
                }
                continue;
            }

            let task = if task.priority != Priority::High {
                let escalated = Task {
                    priority: Priority::High,
                    ..task.clone()
                };
                let saved = store.save_task(&escalated)?;
                info!("Task {}: changed to high priority, it is overdue", id);
                saved
            } else {
                task.clone()
            };

            match self.position(id) {
                Some(index) => self.pending[index] = task,
                None => {
                    self.pending.push(task);
                    found += 1;
                }
            }
        }

        if found > 0 {
            self.unseen = true;
            info!("Found {} new overdue tasks to notify", found);
        }
        Ok(found)
    }

    /// A copy of the tracked tasks, oldest first.
    pub fn list_pending(&self) -> Vec<Task> {
        self.pending.clone()
    }

    /// Stop tracking one task. The unseen flag is left as is.
    pub fn dismiss(&mut self, id: TaskId) {
        self.pending.retain(|task| task.id != Some(id));
    }

    /// Mark every tracked task as seen without dismissing any.
    pub fn acknowledge_all(&mut self) {
        self.unseen = false;
    }

    pub fn has_unseen(&self) -> bool {
        self.unseen
    }

    pub fn count(&self) -> usize {
        self.pending.len()
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.pending.iter().position(|task| task.id == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use crate::store::memory::MemoryStore;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn due(name: &str, due: &str, status: Status, priority: Priority) -> Task {
        Task {
            due_date: Some(date(due)),
            status,
            priority,
            ..Task::new(name)
        }
    }

    fn ids(tracker: &NotificationTracker) -> Vec<Option<TaskId>> {
        tracker.list_pending().iter().map(|t| t.id).collect()
    }

    #[test]
    fn scan_tracks_overdue_active_tasks() {
        let store = MemoryStore::new();
        let today = date("2024-06-10");
        let tasks = store.seed(vec![
            due("today", "2024-06-10", Status::Pending, Priority::Low),
            due("late", "2024-06-01", Status::InProgress, Priority::High),
            due("future", "2024-06-11", Status::Pending, Priority::Low),
            due("done", "2024-06-09", Status::Completed, Priority::Low),
            Task::new("undated"),
        ]);

        let mut tracker = NotificationTracker::default();
        let found = tracker.scan(&store, &tasks, today).unwrap();

        assert_eq!(found, 2);
        assert_eq!(ids(&tracker), vec![tasks[0].id, tasks[1].id]);
        assert!(tracker.has_unseen());
        assert_eq!(tracker.count(), 2);
    }

    #[test]
    fn scan_escalates_overdue_tasks_and_leaves_completed_alone() {
        let store = MemoryStore::new();
        let tasks = store.seed(vec![
            due("late", "2024-06-01", Status::Pending, Priority::Medium),
            due("done", "2024-06-01", Status::Completed, Priority::Low),
        ]);

        let mut tracker = NotificationTracker::default();
        tracker.scan(&store, &tasks, date("2024-06-10")).unwrap();

        let stored = store.tasks().unwrap();
        assert_eq!(stored[0].priority, Priority::High);
        assert_eq!(stored[1].priority, Priority::Low);
        assert_eq!(store.saves.borrow().len(), 1);
        assert_eq!(tracker.list_pending()[0].priority, Priority::High);
    }

    #[test]
    fn scan_is_idempotent_on_membership() {
        let store = MemoryStore::new();
        let today = date("2024-06-10");
        let tasks = store.seed(vec![due("late", "2024-06-09", Status::Pending, Priority::Low)]);

        let mut tracker = NotificationTracker::default();
        assert_eq!(tracker.scan(&store, &tasks, today).unwrap(), 1);
        let tasks = store.tasks().unwrap();
        assert_eq!(tracker.scan(&store, &tasks, today).unwrap(), 0);
        assert_eq!(tracker.count(), 1);
    }

    #[test]
    fn repeated_scans_do_not_flag_unseen_again() {
        let store = MemoryStore::new();
        let today = date("2024-06-10");
        let tasks = store.seed(vec![due("late", "2024-06-09", Status::Pending, Priority::High)]);

        let mut tracker = NotificationTracker::default();
        tracker.scan(&store, &tasks, today).unwrap();
        tracker.acknowledge_all();
        tracker.scan(&store, &tasks, today).unwrap();

        assert!(!tracker.has_unseen());
    }

    #[test]
    fn dismiss_removes_until_rescanned() {
        let store = MemoryStore::new();
        let today = date("2024-06-10");
        let tasks = store.seed(vec![
            due("a", "2024-06-09", Status::Pending, Priority::High),
            due("b", "2024-06-08", Status::Pending, Priority::High),
        ]);
        let a = tasks[0].id.unwrap();

        let mut tracker = NotificationTracker::default();
        tracker.scan(&store, &tasks, today).unwrap();
        tracker.acknowledge_all();
        tracker.dismiss(a);

        assert_eq!(ids(&tracker), vec![tasks[1].id]);
        assert!(!tracker.has_unseen());

        // still overdue and active, so a later scan brings it back
        assert_eq!(tracker.scan(&store, &tasks, today).unwrap(), 1);
        assert_eq!(ids(&tracker), vec![tasks[1].id, Some(a)]);
        assert!(tracker.has_unseen());
    }

    #[test]
    fn dismiss_keeps_unseen_flag() {
        let store = MemoryStore::new();
        let tasks = store.seed(vec![due("a", "2024-06-09", Status::Pending, Priority::High)]);

        let mut tracker = NotificationTracker::default();
        tracker.scan(&store, &tasks, date("2024-06-10")).unwrap();
        tracker.dismiss(tasks[0].id.unwrap());

        assert!(tracker.has_unseen());
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn acknowledge_all_keeps_entries() {
        let store = MemoryStore::new();
        let tasks = store.seed(vec![
            due("a", "2024-06-09", Status::Pending, Priority::High),
            due("b", "2024-06-10", Status::Pending, Priority::High),
        ]);

        let mut tracker = NotificationTracker::default();
        tracker.scan(&store, &tasks, date("2024-06-10")).unwrap();
        tracker.acknowledge_all();

        assert!(!tracker.has_unseen());
        assert_eq!(tracker.count(), 2);
    }

    #[test]
    fn completed_tasks_drop_out_on_next_scan() {
        let store = MemoryStore::new();
        let today = date("2024-06-10");
        let tasks = store.seed(vec![
            due("a", "2024-06-09", Status::Pending, Priority::High),
            due("b", "2024-06-09", Status::Pending, Priority::High),
        ]);

        let mut tracker = NotificationTracker::default();
        tracker.scan(&store, &tasks, today).unwrap();

        let finished = Task {
            status: Status::Completed,
            ..tasks[0].clone()
        };
        store.save_task(&finished).unwrap();
        tracker.scan(&store, &store.tasks().unwrap(), today).unwrap();

        assert_eq!(ids(&tracker), vec![tasks[1].id]);
    }

    #[test]
    fn unsaved_tasks_are_ignored() {
        let store = MemoryStore::new();
        let mut tracker = NotificationTracker::default();
        let unsaved = due("draft", "2024-06-01", Status::Pending, Priority::Low);

        assert_eq!(tracker.scan(&store, &[unsaved], date("2024-06-10")).unwrap(), 0);
        assert!(store.saves.borrow().is_empty());
        assert!(!tracker.has_unseen());
    }

    #[test]
    fn failed_escalation_aborts_the_scan() {
        let store = MemoryStore::new();
        let tasks = store.seed(vec![
            due("a", "2024-06-09", Status::Pending, Priority::Low),
            due("b", "2024-06-09", Status::Pending, Priority::Low),
        ]);
        store.fail_after.set(Some(1));

        let mut tracker = NotificationTracker::default();
        assert!(tracker.scan(&store, &tasks, date("2024-06-10")).is_err());
        assert_eq!(tracker.count(), 1);
        assert!(!tracker.has_unseen());
    }

    #[test]
    fn empty_list_finds_nothing() {
        let store = MemoryStore::new();
        let mut tracker = NotificationTracker::default();
        assert_eq!(tracker.scan(&store, &[], date("2024-06-10")).unwrap(), 0);
        assert!(!tracker.has_unseen());
    }
}
