use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Message {
    Run(Job),
    Close,
}

/// Owns the thread holding the connection; joined when the last
/// `Database` clone is dropped.
struct Worker {
    jobs: mpsc::Sender<Message>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        if self.jobs.send(Message::Close).is_err() {
            warn!("database worker stopped before close");
        }
        if thread.join().is_err() {
            error!("database worker panicked");
        }
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("WAL journal unavailable, using default: {err}");
    }
    // Point deletion relies on ON DELETE CASCADE.
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;
    run_migrations(&mut conn).context("failed to run database migrations")?;

    Ok(conn)
}

fn serve(mut conn: Connection, inbox: mpsc::Receiver<Message>) {
    for message in inbox {
        match message {
            Message::Run(job) => job(&mut conn),
            Message::Close => break,
        }
    }
    info!("Database worker exiting");
}

/// SQLite handle. Every statement runs on one dedicated thread; async callers
/// hand it closures through [`Database::execute`].
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<Path>,
}

impl Database {
    /// Opens or creates the database at `path` and applies pending
    /// migrations before returning.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create database directory {}", dir.display()))?;
        }

        let conn = open_connection(&path)?;
        let (jobs, inbox) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("fittrack-db".into())
            .spawn(move || serve(conn, inbox))
            .context("failed to spawn database worker thread")?;

        info!("Workout database opened at {}", path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                jobs,
                thread: Some(thread),
            }),
            path: path.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn execute<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // The caller may have gone away; the statement already ran.
            let _ = reply.send(job(conn));
        });

        self.worker
            .jobs
            .send(Message::Run(job))
            .map_err(|_| anyhow!("database worker has stopped"))?;

        result
            .await
            .map_err(|_| anyhow!("database worker dropped the request"))?
    }
}
