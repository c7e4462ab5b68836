//! Asynchronous jobs for long-running destructive operations
//!
//! A job is submitted with a future, gets an identifier immediately and runs
//! on its own task. Its status lives in a `JobStore`: the in-process table, or
//! `{uuid}.status` files holding one of the literal status strings.

use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lunar_core::{Job, JobStatus};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where job status records are kept
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or overwrite the record for `job.id`
    async fn put(&self, job: &Job) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Job>;
}

/// Job records in a process-local table
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn put(&self, job: &Job) -> Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Job> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RuntimeError::job_not_found(id.to_string()))
    }
}

/// Job status files in a directory
///
/// The file content is the status text alone. Descriptions and timestamps of
/// jobs still running in this process are kept alongside in memory. Finished
/// jobs, and files left by an earlier process, are reported with the file's
/// modification time.
pub struct FileJobStore {
    dir: PathBuf,
    known: RwLock<HashMap<Uuid, Job>>,
}

impl FileJobStore {
    /// Open (creating if needed) a status directory
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            RuntimeError::job_store(format!("cannot create {}: {}", dir.display(), e))
        })?;
        info!("Job status directory: {}", dir.display());
        Ok(Self {
            dir,
            known: RwLock::new(HashMap::new()),
        })
    }

    pub fn status_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.status", id))
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn put(&self, job: &Job) -> Result<()> {
        let path = self.status_path(job.id);
        tokio::fs::write(&path, job.status.as_text())
            .await
            .map_err(|e| {
                RuntimeError::job_store(format!("cannot write {}: {}", path.display(), e))
            })?;
        // once terminal, the file alone answers status queries
        let mut known = self.known.write().await;
        if job.status.is_terminal() {
            known.remove(&job.id);
        } else {
            known.insert(job.id, job.clone());
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Job> {
        let path = self.status_path(id);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RuntimeError::job_not_found(id.to_string()));
            }
            Err(e) => {
                return Err(RuntimeError::job_store(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let status = JobStatus::from_text(&text);

        if let Some(job) = self.known.read().await.get(&id) {
            return Ok(Job {
                status,
                ..job.clone()
            });
        }

        let modified: DateTime<Utc> = tokio::fs::metadata(&path)
            .await
            .and_then(|m| m.modified())
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(Job {
            id,
            description: String::new(),
            finished_at: status.is_terminal().then_some(modified),
            status,
            submitted_at: modified,
        })
    }
}

/// Runs submitted futures as jobs and answers status queries
pub struct JobTracker {
    store: Arc<dyn JobStore>,
    handles: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl JobTracker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            handles: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Record the job as in progress, start it, and return its identifier
    pub async fn submit<F>(&self, description: impl Into<String>, task: F) -> Result<Uuid>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(RuntimeError::job_store(
                "shutting down, no new jobs are accepted",
            ));
        }

        let job = Job::new(description);
        let id = job.id;
        self.store.put(&job).await?;
        info!("Job {} started: {}", id, job.description);

        let store = self.store.clone();
        let handle = tokio::spawn(async move {
            let status = match task.await {
                Ok(()) => {
                    info!("Job {} completed", job.id);
                    JobStatus::Succeeded
                }
                Err(e) => {
                    warn!("Job {} failed: {}", job.id, e);
                    JobStatus::Failed(e.to_string())
                }
            };
            let finished = job.finish(status);
            if let Err(e) = store.put(&finished).await {
                error!("Failed to record status of job {}: {}", finished.id, e);
            }
        });

        let mut handles = self.handles.lock().await;
        handles.retain(|_, h| !h.is_finished());
        handles.insert(id, handle);
        Ok(id)
    }

    pub async fn status(&self, id: Uuid) -> Result<Job> {
        self.store.get(id).await
    }

    /// Wait for a job to finish and return its final record
    pub async fn wait(&self, id: Uuid) -> Result<Job> {
        let handle = self.handles.lock().await.remove(&id);
        if let Some(handle) = handle {
            self.join(id, handle).await?;
        }
        self.store.get(id).await
    }

    /// Refuse new jobs and wait for the running ones
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<(Uuid, JoinHandle<()>)> = self.handles.lock().await.drain().collect();
        debug!("Waiting for {} job(s)", handles.len());
        for (id, handle) in handles {
            if let Err(e) = self.join(id, handle).await {
                error!("Job {}: {}", id, e);
            }
        }
    }

    /// Await a job task; a panicked task is recorded as failed
    async fn join(&self, id: Uuid, handle: JoinHandle<()>) -> Result<()> {
        if let Err(e) = handle.await {
            let job = self.store.get(id).await?;
            self.store
                .put(&job.finish(JobStatus::Failed(format!("job aborted: {}", e))))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_support::*;
    use crate::zfs::DatasetManager;
    use lunar_core::{ByteSize, CreateVolumeRequest, ExportRequest, JOB_STATUS_SUCCEEDED};
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_job_reports_in_progress_then_success() {
        let tracker = JobTracker::new(Arc::new(MemoryJobStore::new()));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let id = tracker
            .submit("wait for signal", async move {
                rx.await
                    .map_err(|e| RuntimeError::internal_error(e.to_string()))
            })
            .await
            .unwrap();

        assert_eq!(tracker.status(id).await.unwrap().status, JobStatus::InProgress);
        tx.send(()).unwrap();

        let job = tracker.wait(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.description, "wait for signal");
        assert!(job.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_job_keeps_error_text() {
        let tracker = JobTracker::new(Arc::new(MemoryJobStore::new()));
        let id = tracker
            .submit("fail", async {
                Err(RuntimeError::command_failed(
                    "zfs destroy tank/v",
                    1,
                    "dataset is busy",
                ))
            })
            .await
            .unwrap();

        match tracker.wait(id).await.unwrap().status {
            JobStatus::Failed(message) => assert!(message.contains("dataset is busy")),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let tracker = JobTracker::new(Arc::new(MemoryJobStore::new()));
        let err = tracker.status(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::JobNotFound { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_refuses() {
        let tracker = JobTracker::new(Arc::new(MemoryJobStore::new()));
        let id = tracker
            .submit("slow", async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(())
            })
            .await
            .unwrap();

        tracker.shutdown().await;
        assert_eq!(tracker.status(id).await.unwrap().status, JobStatus::Succeeded);
        assert!(tracker.submit("late", async { Ok(()) }).await.is_err());
    }

    #[tokio::test]
    async fn test_file_store_writes_literal_status() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileJobStore::open(dir.path().join("jobs")).await.unwrap());
        let tracker = JobTracker::new(store.clone());

        let (go, ready) = tokio::sync::oneshot::channel::<()>();
        let id = tracker
            .submit("noop", async move {
                ready
                    .await
                    .map_err(|e| RuntimeError::internal_error(e.to_string()))
            })
            .await
            .unwrap();
        assert_eq!(store.get(id).await.unwrap().description, "noop");
        assert_eq!(store.known.read().await.len(), 1);

        go.send(()).unwrap();
        tracker.wait(id).await.unwrap();

        let text = std::fs::read_to_string(store.status_path(id)).unwrap();
        assert_eq!(text, JOB_STATUS_SUCCEEDED);
        // finished jobs are not retained in memory
        assert!(store.known.read().await.is_empty());
        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_file_store_reads_foreign_status_files() {
        let dir = tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).await.unwrap();

        let id = Uuid::new_v4();
        std::fs::write(store.status_path(id), "cannot destroy: dataset is busy").unwrap();
        let job = store.get(id).await.unwrap();
        assert_eq!(
            job.status,
            JobStatus::Failed("cannot destroy: dataset is busy".to_string())
        );
        assert!(job.finished_at.is_some());

        let running = Uuid::new_v4();
        std::fs::write(store.status_path(running), "In Progress").unwrap();
        assert!(store.get(running).await.unwrap().finished_at.is_none());

        assert!(store.get(Uuid::new_v4()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_volume_lifecycle_end_to_end() {
        let h = harness_with_project().await;
        h.orchestrator.create_host_group("hg1").await.unwrap();
        h.orchestrator.create_target_group("tg1").await.unwrap();

        let request = CreateVolumeRequest {
            alias: "vol1".to_string(),
            volsize: ByteSize(256 * MIB),
            ..Default::default()
        };
        let lu = h
            .orchestrator
            .create_volume(&h.project, &request)
            .await
            .unwrap();
        assert_eq!(lu.backing_store, "tank/dom/proj/vol1");

        let export = ExportRequest {
            hostgroup: "hg1".to_string(),
            targetgroup: "tg1".to_string(),
            lun: None,
        };
        h.orchestrator
            .export_volume(&h.project, &lu.id, &export)
            .await
            .unwrap();
        let views = h.orchestrator.list_exports(&h.project, &lu.id).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].lun, 0);

        h.orchestrator
            .unexport_volume(&h.project, &lu.id, &export)
            .await
            .unwrap();
        assert!(h
            .orchestrator
            .list_exports(&h.project, &lu.id)
            .await
            .unwrap()
            .is_empty());

        let dir = tempdir().unwrap();
        let tracker = JobTracker::new(Arc::new(FileJobStore::open(dir.path()).await.unwrap()));
        let orchestrator = Arc::new(h.orchestrator);
        let (go, ready) = tokio::sync::oneshot::channel::<()>();
        let id = {
            let orchestrator = orchestrator.clone();
            let project = h.project.clone();
            let lu_id = lu.id.clone();
            tracker
                .submit(format!("destroy volume {}", lu_id), async move {
                    ready
                        .await
                        .map_err(|e| RuntimeError::internal_error(e.to_string()))?;
                    orchestrator.destroy_volume(&project, &lu_id).await
                })
                .await
                .unwrap()
        };

        assert_eq!(tracker.status(id).await.unwrap().status.as_text(), "In Progress");
        go.send(()).unwrap();
        let job = tracker.wait(id).await.unwrap();
        assert_eq!(job.status.as_text(), "Completed Successfully");

        assert!(orchestrator.list_volumes(&h.project).await.unwrap().is_empty());
        assert!(!h.zfs.exists("tank/dom/proj/vol1").await.unwrap());
    }
}
