#[macro_use]
extern crate prettytable;

use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

mod cli;
mod clock;
mod history;
mod interface;
mod model;
mod notify;
mod priority;
mod schedule;
mod store;

use rusqlite::Connection;

use crate::interface::TaskChanges;
use crate::model::Task;
use crate::store::init_journal;
use cli::{Command::*, CommandLineArgs};

fn find_default_journal_file() -> anyhow::Result<PathBuf> {
    let base_dirs = ProjectDirs::from("com", "gozque", "overdue")
        .ok_or(anyhow!("Failed to find journal file."))?;
    let root_dir = base_dirs.data_dir();
    if !root_dir.exists() {
        std::fs::create_dir_all(root_dir)
            .with_context(|| format!("Failed to create directory {}.", root_dir.display()))?;
    }
    let mut path = PathBuf::from(root_dir);
    path.push("db.sqlite");
    Ok(path)
}

/// Get a connection to the journal database, creating it if it does
/// not exist.
pub fn get_journal_db(journal_path: &Path) -> anyhow::Result<Connection> {
    let db = Connection::open(journal_path)
        .with_context(|| format!("Failed to open journal {}.", journal_path.display()))?;
    init_journal(&db)?;
    Ok(db)
}

/// Log to stderr so tables on stdout stay clean. RUST_LOG wins over -v.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "overdue=warn",
        1 => "overdue=info",
        _ => "overdue=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    // Get the command-line arguments.
    let CommandLineArgs {
        action,
        journal_file,
        today,
        verbose,
    } = CommandLineArgs::from_args();

    // The watcher is only useful if it says what it does.
    let verbose = match action {
        Watch { .. } => verbose.max(1),
        _ => verbose,
    };
    init_logging(verbose);

    // Unpack the journal file.
    let journal_file = match journal_file {
        Some(path) => path,
        None => find_default_journal_file()?,
    };

    let database = get_journal_db(&journal_file)?;
    let clock = clock::from_override(today);

    // Perform the action.
    match action {
        Add {
            name,
            description,
            assignee,
            start,
            due,
            status,
            priority,
        } => {
            let task = Task {
                description,
                assignee,
                start_date: start,
                due_date: due,
                status,
                priority,
                ..Task::new(&name)
            };
            interface::add_task(&database, task).map(|_| ())
        }
        List => interface::list(&database),
        Edit {
            id,
            name,
            description,
            assignee,
            start,
            due,
            no_due,
            status,
            priority,
        } => {
            let changes = TaskChanges {
                name,
                description,
                assignee,
                start_date: start,
                due_date: if no_due { Some(None) } else { due.map(Some) },
                status,
                priority,
            };
            interface::edit_task(&database, id, changes).map(|_| ())
        }
        Done { id } => interface::finish_task(&database, id).map(|_| ()),
        Rm { id } => interface::remove_task(&database, id).map(|_| ()),
        History => interface::list_history(&database),
        Recover { id } => interface::recover(&database, id).map(|_| ()),
        Purge { id } => interface::purge(&database, id),
        Priorities => interface::priorities(&database, clock.today()).map(|_| ()),
        Scan => interface::scan(&database, clock.today()).map(|_| ()),
        Notifications => interface::notifications(&database, clock.today()),
        Dismiss { id } => interface::dismiss(&database, id),
        Watch { every } => schedule::watch(&database, &*clock, every),
    }?;
    Ok(())
}
