use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::task::TaskId;

/// Telemetry callback signature installed on the kernel.
pub type TelemetryHook = Arc<dyn Fn(&TelemetryEvent) + Send + Sync>;

/// Event emitted on task and scheduler milestones.
#[derive(Debug, Clone)]
pub struct TelemetryEvent {
    pub kind: TelemetryEventKind,
    pub task: TaskId,
    /// Fault cause code for `TaskFault`.
    pub cause: Option<i32>,
    /// Instructions executed, for `Quantum`.
    pub steps: Option<usize>,
}

impl TelemetryEvent {
    pub fn new(kind: TelemetryEventKind, task: TaskId) -> Self {
        Self {
            kind,
            task,
            cause: None,
            steps: None,
        }
    }

    pub fn with_cause(mut self, cause: i32) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = Some(steps);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TelemetryEventKind {
    TaskSpawn,
    TaskHalt,
    TaskFault,
    TaskBlock,
    TaskWake,
    Quantum,
}

/// JSON-serialisable view of a recorded event.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    pub kind: TelemetryEventKind,
    pub task: TaskId,
    pub cause: Option<i32>,
    pub steps: Option<usize>,
    pub timestamp_utc: String,
}

impl TelemetryRecord {
    fn from_event(event: &TelemetryEvent) -> Self {
        Self {
            kind: event.kind,
            task: event.task,
            cause: event.cause,
            steps: event.steps,
            timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Collects telemetry events for later inspection.
#[derive(Clone, Default)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryRecord>>>,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hook(&self) -> TelemetryHook {
        let collector = self.clone();
        Arc::new(move |event: &TelemetryEvent| {
            collector.record(event);
        })
    }

    fn record(&self, event: &TelemetryEvent) {
        self.events.lock().push(TelemetryRecord::from_event(event));
    }

    pub fn snapshot(&self) -> Vec<TelemetryRecord> {
        self.events.lock().clone()
    }

    /// Records of one kind, in emission order.
    pub fn of_kind(&self, kind: TelemetryEventKind) -> Vec<TelemetryRecord> {
        self.events
            .lock()
            .iter()
            .filter(|record| record.kind == kind)
            .cloned()
            .collect()
    }
}
