//! Fixed-size worker pool.
//!
//! Requests go onto a bounded queue shared by N worker tasks. Each request
//! carries a UUID correlation id; the caller parks a oneshot sender in the
//! pending map and the worker that finishes the job routes the result back
//! through it. Entries leave the map on response, timeout, cancellation or
//! shutdown.

use futures_util::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::task::{execute_task, SourceFile, WorkerTask};
use crate::analysis::SyntaxValidator;
use crate::error::{ToolError, ToolResult};

const QUEUE_DEPTH: usize = 256;

type Pending = Arc<Mutex<HashMap<Uuid, oneshot::Sender<ToolResult<Value>>>>>;

struct Job {
    id: Uuid,
    task: WorkerTask,
}

/// Result of a pooled call, flagged when it ran in-process instead.
#[derive(Debug, Clone)]
pub struct Offloaded {
    pub value: Value,
    pub fallback: bool,
}

pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    pending: Pending,
    validator: Arc<SyntaxValidator>,
    request_timeout: Duration,
    shutdown: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
    workers: usize,
}

impl WorkerPool {
    /// Spawn `workers` tasks on the current runtime. Zero workers gives a
    /// pool that rejects everything, so every call takes the fallback path.
    pub fn new(workers: usize, request_timeout: Duration, validator: Arc<SyntaxValidator>) -> Self {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        if workers == 0 {
            return Self {
                sender: Mutex::new(None),
                pending,
                validator,
                request_timeout,
                shutdown,
                handles: Mutex::new(Vec::new()),
                workers,
            };
        }

        let (tx, rx) = mpsc::channel::<Job>(QUEUE_DEPTH);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    rx.clone(),
                    pending.clone(),
                    validator.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();
        info!(workers, timeout_ms = request_timeout.as_millis() as u64, "worker pool started");

        Self {
            sender: Mutex::new(Some(tx)),
            pending,
            validator,
            request_timeout,
            shutdown,
            handles: Mutex::new(handles),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn forget(&self, id: &Uuid) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(id);
        }
    }

    /// Run `task` on a worker, bounded by the request timeout. A timed-out
    /// request is a `WorkerFailure`; caller cancellation is a `Timeout`.
    pub async fn process(&self, task: WorkerTask) -> ToolResult<Value> {
        self.process_with_cancel(task, &CancellationToken::new()).await
    }

    pub async fn process_with_cancel(
        &self,
        task: WorkerTask,
        cancel: &CancellationToken,
    ) -> ToolResult<Value> {
        let sender = self
            .sender
            .lock()
            .ok()
            .and_then(|s| s.clone())
            .ok_or_else(|| ToolError::WorkerFailure("Worker pool is not running".to_string()))?;

        let id = Uuid::new_v4();
        let kind = task.kind();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| ToolError::WorkerFailure("Worker pending map poisoned".to_string()))?
            .insert(id, tx);

        if sender.send(Job { id, task }).await.is_err() {
            self.forget(&id);
            return Err(ToolError::WorkerFailure("Worker queue is closed".to_string()));
        }
        debug!(request = %id, kind, "queued worker request");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.forget(&id);
                Err(ToolError::Timeout(format!("Worker request {} was cancelled", kind)))
            }
            outcome = tokio::time::timeout(self.request_timeout, rx) => match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(ToolError::WorkerFailure(format!(
                    "Worker dropped request {} ({})",
                    id, kind
                ))),
                Err(_) => {
                    self.forget(&id);
                    Err(ToolError::WorkerFailure(format!(
                        "Worker request {} timed out after {}ms",
                        kind,
                        self.request_timeout.as_millis()
                    )))
                }
            }
        }
    }

    /// Pooled execution; worker failures, timeouts included, rerun the task
    /// in-process.
    pub async fn run_with_fallback(&self, task: WorkerTask) -> ToolResult<Offloaded> {
        let kind = task.kind();
        match self.process(task.clone()).await {
            Ok(value) => Ok(Offloaded {
                value,
                fallback: false,
            }),
            Err(ToolError::WorkerFailure(reason)) => {
                warn!(kind, fallback = true, "worker unavailable, running in-process: {}", reason);
                let validator = self.validator.clone();
                let value = tokio::task::spawn_blocking(move || execute_task(&task, &validator))
                    .await
                    .map_err(|e| ToolError::Internal(format!("In-process {} failed: {}", kind, e)))??;
                Ok(Offloaded {
                    value,
                    fallback: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// `processFile(kind, payload)`.
    pub async fn process_file(&self, kind: &str, payload: Value) -> ToolResult<Offloaded> {
        self.run_with_fallback(WorkerTask::from_request(kind, payload)?)
            .await
    }

    /// Fan tasks out across the workers; results keep input order.
    pub async fn execute_batch(&self, tasks: Vec<WorkerTask>) -> Vec<ToolResult<Offloaded>> {
        join_all(tasks.into_iter().map(|t| self.run_with_fallback(t))).await
    }

    pub async fn parse_ast(
        &self,
        content: String,
        path: String,
        include_nested: bool,
    ) -> ToolResult<Offloaded> {
        self.run_with_fallback(WorkerTask::ParseAst {
            file: SourceFile { path, content },
            include_nested,
        })
        .await
    }

    /// Stop the workers and fail whatever is still pending.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let dropped = self
            .pending
            .lock()
            .map(|mut p| {
                let n = p.len();
                p.clear();
                n
            })
            .unwrap_or(0);
        if let Ok(mut handles) = self.handles.lock() {
            for handle in handles.drain(..) {
                handle.abort();
            }
        }
        info!(dropped, "worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    pending: Pending,
    validator: Arc<SyntaxValidator>,
    shutdown: CancellationToken,
) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => None,
                job = rx.recv() => job,
            }
        };
        let Some(Job { id, task }) = job else {
            break;
        };

        let expired = pending.lock().map(|p| !p.contains_key(&id)).unwrap_or(true);
        if expired {
            debug!(worker_id, request = %id, "skipping expired request");
            continue;
        }

        let kind = task.kind();
        let validator = validator.clone();
        let result = match tokio::task::spawn_blocking(move || execute_task(&task, &validator)).await {
            Ok(result) => result,
            Err(e) => Err(ToolError::WorkerFailure(format!(
                "Worker {} failed on {}: {}",
                worker_id, kind, e
            ))),
        };

        let sender = pending.lock().ok().and_then(|mut p| p.remove(&id));
        match sender {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => debug!(worker_id, request = %id, "response arrived after timeout"),
        }
    }
    debug!(worker_id, "worker exiting");
}
