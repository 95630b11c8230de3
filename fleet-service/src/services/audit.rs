//! Detached audit record persistence.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use service_core::error::AppError;
use tokio::sync::Notify;

use super::metrics::{record_audit, record_audit_dropped};
use crate::models::AuditLog;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write_audit_log(&self, record: &AuditLog) -> Result<(), AppError>;
}

struct AuditQueue {
    records: Mutex<VecDeque<AuditLog>>,
    capacity: usize,
    ready: Notify,
}

impl AuditQueue {
    fn pop(&self) -> Option<AuditLog> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

/// Bounded queue of audit records drained by one background task. Submitting
/// never blocks; when full the oldest record is discarded.
#[derive(Clone)]
pub struct AuditWriter {
    queue: Arc<AuditQueue>,
}

impl AuditWriter {
    pub fn spawn(sink: Arc<dyn AuditSink>, capacity: usize) -> Self {
        let queue = Arc::new(AuditQueue {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            ready: Notify::new(),
        });

        let worker = queue.clone();
        tokio::spawn(async move {
            loop {
                worker.ready.notified().await;
                while let Some(mut record) = worker.pop() {
                    record.truncate_for_storage();
                    match sink.write_audit_log(&record).await {
                        Ok(()) => record_audit("written"),
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                request_id = %record.request_id,
                                tenant_id = %record.tenant_id,
                                "Failed to write audit log"
                            );
                            record_audit("failed");
                        }
                    }
                }
            }
        });

        Self { queue }
    }

    pub fn submit(&self, record: AuditLog) {
        {
            let mut records = self
                .queue
                .records
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if records.len() >= self.queue.capacity {
                if let Some(dropped) = records.pop_front() {
                    tracing::warn!(request_id = %dropped.request_id, "Audit queue full, dropping oldest record");
                }
                record_audit_dropped();
            }
            records.push_back(record);
        }
        self.queue.ready.notify_one();
    }

    /// Records waiting to be written.
    pub fn pending(&self) -> usize {
        self.queue
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Sink that blocks until permits are released.
    struct GatedSink {
        gate: Semaphore,
        written: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AuditSink for GatedSink {
        async fn write_audit_log(&self, record: &AuditLog) -> Result<(), AppError> {
            let permit = self.gate.acquire().await.map_err(anyhow::Error::from)?;
            permit.forget();
            self.written.lock().unwrap().push(record.request_id.clone());
            Ok(())
        }
    }

    fn record(id: &str) -> AuditLog {
        AuditLog::from_request(
            &Method::POST,
            &"/v1.0/projects".parse().unwrap(),
            &HeaderMap::new(),
            id,
            "host",
        )
    }

    #[tokio::test]
    async fn overflow_drops_oldest_records() {
        let sink = Arc::new(GatedSink {
            gate: Semaphore::new(0),
            written: Mutex::new(Vec::new()),
        });
        let writer = AuditWriter::spawn(sink.clone(), 2);

        writer.submit(record("r1"));
        // Let the worker take r1 and block on the gate.
        tokio::time::sleep(Duration::from_millis(20)).await;
        writer.submit(record("r2"));
        writer.submit(record("r3"));
        writer.submit(record("r4"));
        assert_eq!(writer.pending(), 2);

        sink.gate.add_permits(10);
        for _ in 0..50 {
            if sink.written.lock().unwrap().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*sink.written.lock().unwrap(), vec!["r1", "r3", "r4"]);
    }
}
