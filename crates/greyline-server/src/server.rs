//! Background task server — one worker, a bounded FIFO queue, and a ring
//! buffer of recent outcomes.
//!
//! State machine: Stopped → Running → Stopped, nothing else. `start` while
//! running and `stop` while stopped are logged no-ops. The worker drains
//! the queue with a non-blocking dequeue and sleeps between empty checks;
//! it terminates only through `stop`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};

use greyline_core::{NotifyStore, ServerSettings};

use crate::handlers::TaskHandler;
use crate::tasks::{ServerStatus, TaskOutcome, TaskRequest};

/// Outcome history and counters, kept under one lock so the
/// processed = succeeded + failed invariant holds for every reader.
struct Records {
    started_at: Option<DateTime<Utc>>,
    processed: u64,
    succeeded: u64,
    failed: u64,
    last_task_at: Option<DateTime<Utc>>,
    outcomes: VecDeque<TaskOutcome>,
}

/// The background task server.
pub struct TaskServer {
    settings: ServerSettings,
    store: Arc<NotifyStore>,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    queue: Mutex<VecDeque<TaskRequest>>,
    records: Mutex<Records>,
    running: AtomicBool,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TaskServer {
    /// Build a server with its one-time handler registry. Handlers cannot
    /// be added after construction.
    pub fn new(
        settings: ServerSettings,
        store: Arc<NotifyStore>,
        handlers: Vec<Arc<dyn TaskHandler>>,
    ) -> Self {
        let handlers: HashMap<String, Arc<dyn TaskHandler>> = handlers
            .into_iter()
            .map(|h| (h.kind().to_string(), h))
            .collect();
        tracing::info!("task server: {} handler(s) registered", handlers.len());
        Self {
            settings,
            store,
            handlers,
            queue: Mutex::new(VecDeque::new()),
            records: Mutex::new(Records {
                started_at: None,
                processed: 0,
                succeeded: 0,
                failed: 0,
                last_task_at: None,
                outcomes: VecDeque::new(),
            }),
            running: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Submit a request. Returns false when the queue is at capacity
    /// (reject-on-overflow) — the request is not enqueued.
    pub fn submit(&self, request: TaskRequest) -> bool {
        let mut queue = self.queue.lock().expect("task queue lock poisoned");
        if queue.len() >= self.settings.queue_capacity {
            tracing::warn!(
                "task queue full ({} requests), rejecting '{}'",
                queue.len(),
                request.kind
            );
            return false;
        }
        tracing::debug!("task queued: {} '{}'", request.kind, request.name);
        queue.push_back(request);
        true
    }

    /// Spawn the single worker. No-op when already running.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::info!("task server already running");
            return;
        }
        self.records.lock().expect("records lock poisoned").started_at = Some(Utc::now());

        let server = Arc::clone(self);
        let handle = tokio::spawn(async move { server.run_worker().await });
        *self.worker.lock().expect("worker lock poisoned") = Some(handle);
        tracing::info!("task server started");
    }

    /// Signal the worker to exit and join it with a bounded timeout.
    /// An in-flight task runs to completion; the remaining queue is
    /// discarded. No-op when already stopped.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            tracing::info!("task server not running");
            return;
        }
        let handle = self.worker.lock().expect("worker lock poisoned").take();
        if let Some(handle) = handle {
            let join_timeout = std::time::Duration::from_secs(self.settings.join_timeout_secs);
            if tokio::time::timeout(join_timeout, handle).await.is_err() {
                tracing::warn!("worker did not stop within {join_timeout:?}, detaching");
            }
        }
        let dropped = {
            let mut queue = self.queue.lock().expect("task queue lock poisoned");
            let n = queue.len();
            queue.clear();
            n
        };
        if dropped > 0 {
            tracing::info!("discarded {dropped} queued request(s) on shutdown");
        }
        tracing::info!("task server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Point-in-time status, readable from any thread.
    pub fn status(&self) -> ServerStatus {
        let queue_depth = self.queue.lock().expect("task queue lock poisoned").len();
        let records = self.records.lock().expect("records lock poisoned");
        ServerStatus {
            running: self.is_running(),
            uptime_secs: records
                .started_at
                .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0)
                .unwrap_or(0.0),
            queue_depth,
            tasks_processed: records.processed,
            tasks_succeeded: records.succeeded,
            tasks_failed: records.failed,
            last_task_at: records.last_task_at,
        }
    }

    /// Most recent outcomes, newest first.
    pub fn recent_outcomes(&self, limit: usize) -> Vec<TaskOutcome> {
        let records = self.records.lock().expect("records lock poisoned");
        records.outcomes.iter().rev().take(limit).cloned().collect()
    }

    async fn run_worker(self: Arc<Self>) {
        tracing::info!("worker loop running");
        let mut interval =
            tokio::time::interval(std::time::Duration::from_millis(self.settings.poll_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_heartbeat = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            interval.tick().await;

            // Drain everything currently queued, strictly FIFO. stop()
            // only prevents picking up the next request; the one in
            // flight finishes.
            while let Some(request) = self.dequeue() {
                self.process(request).await;
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
            }

            if self.settings.heartbeat
                && last_heartbeat.elapsed().as_secs_f64() >= self.store.watchdog_interval()
            {
                self.heartbeat();
                last_heartbeat = Instant::now();
            }
        }
        tracing::info!("worker loop exited");
    }

    fn dequeue(&self) -> Option<TaskRequest> {
        self.queue.lock().expect("task queue lock poisoned").pop_front()
    }

    async fn process(&self, request: TaskRequest) {
        let success = match self.handlers.get(&request.kind) {
            Some(handler) => match handler.run(&request).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("task {} '{}' failed: {e}", request.kind, request.name);
                    false
                }
            },
            None => {
                tracing::warn!("unknown task kind '{}', counting as failed", request.kind);
                false
            }
        };

        let mut records = self.records.lock().expect("records lock poisoned");
        records.processed += 1;
        if success {
            records.succeeded += 1;
        } else {
            records.failed += 1;
        }
        let now = Utc::now();
        records.last_task_at = Some(now);
        let id = format!("{}_{}", request.kind, records.processed);
        records.outcomes.push_back(TaskOutcome {
            id,
            success,
            timestamp: now,
            request,
        });
        while records.outcomes.len() > self.settings.history_size {
            records.outcomes.pop_front();
        }
    }

    fn heartbeat(&self) {
        let status = self.status();
        tracing::info!(
            "heartbeat: uptime {:.0}s, queue {}, processed {}, ok {}, failed {}",
            status.uptime_secs,
            status.queue_depth,
            status.tasks_processed,
            status.tasks_succeeded,
            status.tasks_failed,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use greyline_core::error::AgentError;

    struct EchoHandler {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl TaskHandler for EchoHandler {
        fn kind(&self) -> &str {
            "Echo"
        }
        async fn run(&self, request: &TaskRequest) -> greyline_core::Result<()> {
            self.log.lock().unwrap().push(request.name.clone());
            Ok(())
        }
    }

    struct BoomHandler;

    #[async_trait]
    impl TaskHandler for BoomHandler {
        fn kind(&self) -> &str {
            "Boom"
        }
        async fn run(&self, _request: &TaskRequest) -> greyline_core::Result<()> {
            Err(AgentError::Task("intentional".into()))
        }
    }

    fn fast_settings() -> ServerSettings {
        ServerSettings {
            poll_interval_ms: 5,
            queue_capacity: 4,
            history_size: 3,
            heartbeat: false,
            join_timeout_secs: 2,
        }
    }

    fn test_server(log: &Arc<Mutex<Vec<String>>>) -> Arc<TaskServer> {
        Arc::new(TaskServer::new(
            fast_settings(),
            Arc::new(NotifyStore::new()),
            vec![
                Arc::new(EchoHandler { log: log.clone() }),
                Arc::new(BoomHandler),
            ],
        ))
    }

    async fn wait_for_processed(server: &TaskServer, n: u64) {
        let deadline = Instant::now() + std::time::Duration::from_secs(2);
        while server.status().tasks_processed < n {
            assert!(Instant::now() < deadline, "timed out waiting for {n} tasks");
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_fifo_processing_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let server = test_server(&log);
        for name in ["A", "B", "C"] {
            assert!(server.submit(TaskRequest::new("Echo", name)));
        }
        server.start();
        wait_for_processed(&server, 3).await;
        server.stop().await;

        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C"]);
        // Outcomes recorded in the same order, newest first when queried.
        let outcomes = server.recent_outcomes(3);
        let names: Vec<_> = outcomes.iter().rev().map(|o| o.request.name.clone()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_unknown_kind_fails_without_stopping_worker() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let server = test_server(&log);
        server.start();
        assert!(server.submit(TaskRequest::new("NoSuchKind", "x")));
        assert!(server.submit(TaskRequest::new("Echo", "after")));
        wait_for_processed(&server, 2).await;
        server.stop().await;

        let status = server.status();
        assert_eq!(status.tasks_processed, 2);
        assert_eq!(status.tasks_failed, 1);
        assert_eq!(status.tasks_succeeded, 1);
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[tokio::test]
    async fn test_handler_error_counts_as_failed() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let server = test_server(&log);
        server.start();
        server.submit(TaskRequest::new("Boom", "b1"));
        wait_for_processed(&server, 1).await;
        server.stop().await;

        let status = server.status();
        assert_eq!(status.tasks_failed, 1);
        assert_eq!(
            status.tasks_processed,
            status.tasks_succeeded + status.tasks_failed
        );
        let outcomes = server.recent_outcomes(1);
        assert!(!outcomes[0].success);
        assert_eq!(outcomes[0].id, "Boom_1");
    }

    #[tokio::test]
    async fn test_queue_rejects_when_full() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let server = test_server(&log); // capacity 4, not started
        for i in 0..4 {
            assert!(server.submit(TaskRequest::new("Echo", &format!("t{i}"))));
        }
        assert!(!server.submit(TaskRequest::new("Echo", "overflow")));
        assert_eq!(server.status().queue_depth, 4);
    }

    #[tokio::test]
    async fn test_outcome_history_is_bounded() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let server = test_server(&log); // history_size 3
        server.start();
        for i in 0..4 {
            server.submit(TaskRequest::new("Echo", &format!("t{i}")));
        }
        wait_for_processed(&server, 4).await;
        server.stop().await;

        let outcomes = server.recent_outcomes(10);
        assert_eq!(outcomes.len(), 3);
        // Oldest outcome was evicted.
        assert!(outcomes.iter().all(|o| o.request.name != "t0"));
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let server = test_server(&log);
        server.stop().await; // stopped: no-op
        server.start();
        server.start(); // running: no-op
        assert!(server.is_running());
        server.stop().await;
        server.stop().await;
        assert!(!server.is_running());

        // Restart works (Stopped → Running again).
        server.start();
        assert!(server.is_running());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_stop_discards_remaining_queue() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let server = test_server(&log);
        // Not started: nothing consumes the queue.
        server.submit(TaskRequest::new("Echo", "pending"));
        server.start();
        server.stop().await;
        assert_eq!(server.status().queue_depth, 0);
    }
}
