//! Asynchronous audit logger
//!
//! Entries are queued on a bounded channel and written by a single background
//! worker, so a slow or failing audit store never delays or fails the request
//! that produced the entry.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::domain::audit::{AuditLogEntry, AuditLogRepository};

enum Command {
    Record(Box<AuditLogEntry>),
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget handle to the audit worker
#[derive(Debug, Clone)]
pub struct AuditLogger {
    sender: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Record(entry) => f.debug_tuple("Record").field(entry).finish(),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl AuditLogger {
    pub const DEFAULT_BUFFER_SIZE: usize = 1024;

    /// Start the worker on the current runtime
    pub fn spawn(repository: Arc<dyn AuditLogRepository>, buffer_size: usize) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        tokio::spawn(run_worker(repository, receiver));
        Self { sender }
    }

    /// Queue an entry without waiting. Returns false if it had to be dropped.
    pub fn record(&self, entry: AuditLogEntry) -> bool {
        info!(
            target: "audit",
            method = %entry.request.method,
            path = %entry.request.path,
            client_ip = entry.request.client_ip.as_deref().unwrap_or("-"),
            key_prefix = %entry.key_prefix,
            api_key_id = entry.api_key_id.map(|id| id.value()),
            success = entry.success,
            reason = entry.failure_reason.map(|r| r.code()).unwrap_or("-"),
            suspicious = entry.suspicious,
            "API key authentication"
        );

        match self.sender.try_send(Command::Record(Box::new(entry))) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Audit queue full, dropping entry");
                counter!("api_key_audit_dropped_total", "cause" => "queue_full").increment(1);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Audit worker stopped, dropping entry");
                counter!("api_key_audit_dropped_total", "cause" => "closed").increment(1);
                false
            }
        }
    }

    /// Wait until every entry queued before this call has reached the store
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();

        if self.sender.send(Command::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}

async fn run_worker(
    repository: Arc<dyn AuditLogRepository>,
    mut receiver: mpsc::Receiver<Command>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Record(entry) => {
                if let Err(e) = repository.append(*entry).await {
                    warn!("Failed to persist audit entry: {}", e);
                    counter!("api_key_audit_dropped_total", "cause" => "store_error").increment(1);
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
