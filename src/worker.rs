//! Bounded background work queue.
//!
//! Webhook handlers submit jobs and return immediately; a small pool of
//! workers drains the queue and runs the pipeline. The queue is in-process
//! and non-durable: jobs in flight are lost on restart, and a full queue
//! drops the submission (the webhook still acknowledges, so the platform
//! does not retry forever).

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::pipeline::types::{JobHandler, ReceiptJob};

/// Handle for submitting jobs to the worker pool.
#[derive(Clone)]
pub struct WorkerPool {
    tx: mpsc::Sender<ReceiptJob>,
}

impl WorkerPool {
    /// Spawn `workers` drain tasks over a queue of `capacity` jobs.
    pub fn spawn(handler: Arc<dyn JobHandler>, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<ReceiptJob>(capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        for worker_id in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            let _handle: JoinHandle<()> = tokio::spawn(async move {
                loop {
                    let job = rx.lock().await.recv().await;
                    match job {
                        Some(job) => {
                            info!(worker_id, job_id = %job.job_id(), "Worker picked up job");
                            handler.handle(job).await;
                        }
                        None => break,
                    }
                }
            });
        }

        info!(workers = workers.max(1), capacity, "Worker pool started");
        Self { tx }
    }

    /// Submit a job without blocking. Returns `false` when the queue is
    /// full and the job was dropped.
    pub fn submit(&self, job: ReceiptJob) -> bool {
        let job_id = job.job_id();
        let channel = job.channel();
        match self.tx.try_send(job) {
            Ok(()) => {
                info!(%job_id, channel, "Job queued");
                true
            }
            Err(e) => {
                warn!(%job_id, channel, error = %e, "Job dropped; queue unavailable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;

    struct RecordingHandler {
        jobs: Mutex<Vec<ReceiptJob>>,
        notify: Notify,
        /// When set, handlers park until released, so tests can fill the queue.
        gate: Option<Notify>,
    }

    impl RecordingHandler {
        fn new(gated: bool) -> Arc<Self> {
            Arc::new(Self {
                jobs: Mutex::new(Vec::new()),
                notify: Notify::new(),
                gate: gated.then(Notify::new),
            })
        }
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        async fn handle(&self, job: ReceiptJob) {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.jobs.lock().unwrap().push(job);
            self.notify.notify_one();
        }
    }

    #[tokio::test]
    async fn submitted_jobs_reach_the_handler() {
        let handler = RecordingHandler::new(false);
        let pool = WorkerPool::spawn(handler.clone(), 2, 8);

        assert!(pool.submit(ReceiptJob::slack("F1", "C1", "U1")));
        assert!(pool.submit(ReceiptJob::whatsapp("whatsapp:+55", "https://m/1")));

        tokio::time::timeout(Duration::from_secs(2), async {
            while handler.jobs.lock().unwrap().len() < 2 {
                handler.notify.notified().await;
            }
        })
        .await
        .expect("jobs not drained");

        assert_eq!(handler.jobs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn submit_never_blocks_and_reports_overflow() {
        let handler = RecordingHandler::new(true);
        // One parked worker + capacity 1: the second or third submit must
        // overflow rather than block.
        let pool = WorkerPool::spawn(handler.clone(), 1, 1);

        let mut accepted = 0;
        for _ in 0..3 {
            if pool.submit(ReceiptJob::slack("F", "C", "U")) {
                accepted += 1;
            }
        }
        assert!(accepted < 3);
        assert!(accepted >= 1);
    }
}
