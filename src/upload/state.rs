/// Upload State (state machine)
///
/// Coordinates a bounded worker pool, cleanup of temporary resources, and cancellation across
/// many in-flight shards (§4.3). States: `Building` -> `Transferring` -> `Finalizing` -> `Done`,
/// with `Failed`/`Killed` reachable from any state.
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use crate::error::DfsResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    Building,
    Transferring,
    Finalizing,
    Done,
    Failed(String),
    Killed,
}

/// A handle to a data channel opened by a shard worker, registered with the state so `kill`
/// and terminal `cleanup` can close it without the worker's cooperation.
#[derive(Clone)]
pub struct DataChannelHandle {
    closed: Arc<AtomicBool>,
}

impl DataChannelHandle {
    fn new() -> Self {
        Self {
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct UploadStateInner {
    phase: UploadPhase,
    completed: usize,
    clean_queue: Vec<PathBuf>,
    data_channels: Vec<DataChannelHandle>,
}

pub struct UploadState {
    pub bucket_id: String,
    pub source_path: PathBuf,
    pub num_shards: usize,
    semaphore: Arc<Semaphore>,
    inner: Mutex<UploadStateInner>,
    killed: AtomicBool,
}

impl UploadState {
    pub fn new(bucket_id: String, source_path: PathBuf, num_shards: usize, concurrency: usize) -> Self {
        Self {
            bucket_id,
            source_path,
            num_shards,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            inner: Mutex::new(UploadStateInner {
                phase: UploadPhase::Building,
                completed: 0,
                clean_queue: Vec::new(),
                data_channels: Vec::new(),
            }),
            killed: AtomicBool::new(false),
        }
    }

    /// Acquire one of the bounded `C` worker-pool slots. The demuxer is implicitly backpressured
    /// because it awaits this permit before pushing the next shard's task.
    pub async fn acquire_permit(&self) -> SemaphorePermit<'_> {
        // A closed semaphore only happens after `kill`, at which point callers stop acquiring.
        self.semaphore.acquire().await.expect("upload semaphore never closes while in use")
    }

    pub async fn set_phase(&self, phase: UploadPhase) {
        self.inner.lock().await.phase = phase;
    }

    pub async fn phase(&self) -> UploadPhase {
        self.inner.lock().await.phase.clone()
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub async fn register_temp_file(&self, path: PathBuf) {
        self.inner.lock().await.clean_queue.push(path);
    }

    pub async fn register_data_channel(&self) -> DataChannelHandle {
        let handle = DataChannelHandle::new();
        self.inner.lock().await.data_channels.push(handle.clone());
        handle
    }

    /// A worker's shard completed successfully. Returns `true` exactly when this was the last
    /// shard and the state is eligible to move to `Finalizing` (not killed, not already failed).
    pub async fn mark_shard_complete(&self) -> bool {
        let mut inner = self.inner.lock().await;
        inner.completed += 1;
        let ready = inner.completed == self.num_shards
            && !self.is_killed()
            && !matches!(inner.phase, UploadPhase::Failed(_) | UploadPhase::Killed);
        if ready {
            inner.phase = UploadPhase::Finalizing;
        }
        ready
    }

    pub async fn completed_count(&self) -> usize {
        self.inner.lock().await.completed
    }

    /// Enter `Failed`: cleanup, then the caller is responsible for invoking the completion
    /// callback exactly once (§4.3, §7 propagation policy).
    pub async fn fail(&self, reason: String) -> DfsResult<()> {
        {
            let mut inner = self.inner.lock().await;
            if matches!(inner.phase, UploadPhase::Failed(_) | UploadPhase::Killed) {
                return Ok(()); // idempotent: already terminal
            }
            inner.phase = UploadPhase::Failed(reason);
        }
        self.cleanup().await
    }

    /// External kill (§5 cancellation sequence). Idempotent: a second call is a no-op.
    pub async fn kill(&self) -> DfsResult<()> {
        if self.killed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.set_phase(UploadPhase::Killed).await;
        self.semaphore.close();
        self.cleanup().await
    }

    /// Removes every path in `clean_queue` and closes every channel in `data_channels`.
    /// Idempotent and safe after any state (§4.3).
    pub async fn cleanup(&self) -> DfsResult<()> {
        let mut inner = self.inner.lock().await;

        for path in inner.clean_queue.drain(..) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        for channel in &inner.data_channels {
            channel.close();
        }

        Ok(())
    }
}
