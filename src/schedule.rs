use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

use crate::clock::Clock;
use crate::notify::NotificationTracker;
use crate::priority::recompute_priorities;
use crate::store::{load_tracker, save_tracker, write_transaction, TaskStore};

/// What a single run of the rules did.
#[derive(Debug, PartialEq, Eq)]
pub struct RuleReport {
    pub reprioritized: usize,
    pub newly_overdue: usize,
    pub pending: usize,
    pub unseen: bool,
}

/// Run both rules once against the journal: recompute priorities, then
/// scan for overdue tasks. Everything happens in one transaction, so a
/// failed save leaves the journal as it was.
pub fn tick(db: &Connection, today: NaiveDate) -> Result<RuleReport> {
    let tx = write_transaction(db)?;

    let mut tasks = tx.tasks()?;
    let reprioritized = recompute_priorities(&*tx, &mut tasks, today)?;

    let mut tracker = load_tracker(&tx)?;
    let newly_overdue = tracker.scan(&*tx, &tasks, today)?;
    save_tracker(&tx, &tracker)?;

    tx.commit().context("Failed to commit rules.")?;
    Ok(report(reprioritized, newly_overdue, &tracker))
}

fn report(reprioritized: usize, newly_overdue: usize, tracker: &NotificationTracker) -> RuleReport {
    RuleReport {
        reprioritized,
        newly_overdue,
        pending: tracker.count(),
        unseen: tracker.has_unseen(),
    }
}

/// Run the rules every `every` until the process is stopped. A failed
/// run is logged and retried on the next one.
pub fn watch(db: &Connection, clock: &dyn Clock, every: Duration) -> Result<()> {
    info!("Running rules every {}", humantime::format_duration(every));
    loop {
        let today = clock.today();
        match tick(db, today) {
            Ok(report) => {
                info!(
                    %today,
                    reprioritized = report.reprioritized,
                    newly_overdue = report.newly_overdue,
                    pending = report.pending,
                    "rules applied"
                );
                if report.newly_overdue > 0 {
                    println!(
                        "{}: {} new overdue task(s), {} pending notification(s).",
                        today, report.newly_overdue, report.pending
                    );
                }
            }
            Err(e) => error!("Failed to apply rules: {:#}", e),
        }
        thread::sleep(every);
    }
}
