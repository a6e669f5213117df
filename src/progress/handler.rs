//! Progress handler trait and events

use std::time::Duration;

/// Events emitted while a document is being built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Build requested for a document
    BuildStarted { document: String },

    /// Content digest matched the marker; no tool will run
    CacheHit {
        document: String,
        content_hash: String,
    },

    /// Stage started
    StageStarted { document: String, stage: String },

    /// Stage finished, successfully or not
    StageComplete {
        document: String,
        stage: String,
        duration: Duration,
        success: bool,
    },

    /// Render and trace both succeeded and the marker advanced
    BuildCompleted {
        document: String,
        total_time: Duration,
    },

    /// Build stopped at a failing stage
    BuildFailed { document: String, error: String },
}

/// Trait for handling progress events during a build
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Handler that keeps every event, for inspection in tests
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressHandler for RecordingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
