//! Run context
//!
//! Per-run state shared by the orchestrator's components:
//! - Run identifier (also names the artifact store subdirectory)
//! - The trigger event
//! - Log buffer collecting the run's user-facing log lines

use shipyard_core::domain::log::{LogEntry, LogLevel};
use shipyard_core::domain::trigger::TriggerEvent;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Execution context shared across a pipeline run
pub struct RunContext {
    pub run_id: Uuid,

    pub trigger: TriggerEvent,

    log_buffer: Mutex<Vec<LogEntry>>,
}

impl RunContext {
    /// Creates a new run context with a fresh run id
    pub fn new(trigger: TriggerEvent) -> Arc<Self> {
        Arc::new(Self {
            run_id: Uuid::new_v4(),
            trigger,
            log_buffer: Mutex::new(Vec::new()),
        })
    }

    /// Adds a log entry to the buffer
    pub fn add_log(&self, entry: LogEntry) {
        let mut buffer = self.log_buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.push(entry);
    }

    fn log(&self, level: LogLevel, message: String) {
        self.add_log(LogEntry {
            timestamp: chrono::Utc::now(),
            level,
            message,
        });
    }

    pub fn log_debug(&self, message: String) {
        self.log(LogLevel::Debug, message);
    }

    pub fn log_info(&self, message: String) {
        self.log(LogLevel::Info, message);
    }

    pub fn log_warning(&self, message: String) {
        self.log(LogLevel::Warning, message);
    }

    pub fn log_error(&self, message: String) {
        self.log(LogLevel::Error, message);
    }

    /// Drains all log entries from the buffer
    pub fn drain_logs(&self) -> Vec<LogEntry> {
        let mut buffer = self.log_buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.drain(..).collect()
    }

    /// Gets a snapshot of current logs without draining
    pub fn peek_logs(&self) -> Vec<LogEntry> {
        let buffer = self.log_buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.clone()
    }
}
