use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread,
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::oneshot;

mod auth;
mod migrations;

pub use auth::{TOKEN_KEY, USER_KEY};
use migrations::run_migrations;

type Job = Box<dyn FnOnce(&mut Connection) + Send>;

/// Persistent key/value store backing the client session (auth token, cached
/// user). The connection lives on a dedicated thread that runs queued jobs
/// in order and exits once every handle is dropped.
#[derive(Clone)]
pub struct LocalStorage {
    jobs: mpsc::Sender<Job>,
    path: Arc<PathBuf>,
}

impl LocalStorage {
    /// Opens and migrates the store before handing the connection to its
    /// thread, so schema errors surface here.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create storage directory {}", parent.display())
            })?;
        }

        let mut conn = Connection::open(&path)
            .with_context(|| format!("failed to open SQLite storage at {}", path.display()))?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("Storage stays in rollback journal mode: {err}");
        }
        run_migrations(&mut conn).context("failed to run storage migrations")?;

        let (jobs, queue) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name("bizskill-storage".into())
            .spawn(move || {
                for job in queue {
                    job(&mut conn);
                }
                info!("Storage connection closed");
            })
            .context("failed to spawn storage thread")?;

        info!("Local storage opened at {}", path.display());
        Ok(Self {
            jobs,
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Runs `task` against the connection and waits for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // A caller that stopped waiting needs no answer.
            let _ = reply.send(task(conn));
        });
        self.jobs
            .send(job)
            .map_err(|_| anyhow!("storage thread has stopped"))?;
        response
            .await
            .map_err(|_| anyhow!("storage thread dropped the request"))?
    }

    pub async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("failed to read storage key {key}"))
        })
        .await
    }

    pub async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO local_storage (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write storage key {key}"))?;
            Ok(())
        })
        .await
    }

    pub async fn remove_item(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM local_storage WHERE key = ?1", params![key])
                .with_context(|| format!("failed to remove storage key {key}"))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn items_round_trip_and_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.sqlite3");

        {
            let storage = LocalStorage::new(path.clone()).unwrap();
            assert_eq!(storage.get_item("token").await.unwrap(), None);
            storage.set_item("token", "first").await.unwrap();
            storage.set_item("token", "second").await.unwrap();
            assert_eq!(
                storage.get_item("token").await.unwrap().as_deref(),
                Some("second")
            );
        }

        let reopened = LocalStorage::new(path).unwrap();
        assert_eq!(
            reopened.get_item("token").await.unwrap().as_deref(),
            Some("second")
        );
        reopened.remove_item("token").await.unwrap();
        reopened.remove_item("token").await.unwrap();
        assert_eq!(reopened.get_item("token").await.unwrap(), None);
    }

    #[test]
    fn store_written_by_a_newer_client_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.sqlite3");
        Connection::open(&path)
            .unwrap()
            .pragma_update(None, "user_version", 99)
            .unwrap();

        let err = LocalStorage::new(path).err().unwrap();
        assert!(format!("{err:#}").contains("newer client"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn jobs_run_in_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("storage.sqlite3")).unwrap();
        let (first, second, third) = tokio::join!(
            storage.set_item("last", "1"),
            storage.set_item("last", "2"),
            storage.set_item("last", "3"),
        );
        first.and(second).and(third).unwrap();
        assert_eq!(storage.get_item("last").await.unwrap().as_deref(), Some("3"));
    }
}
