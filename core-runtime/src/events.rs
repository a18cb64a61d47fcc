//! # Event Bus System
//!
//! Typed progress events for the scan engine and the task sequencer, fanned
//! out over a `broadcast` channel.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────┐     emit      ┌───────────┐
//! │ SyncEngine  ├──────────────>│           │     subscribe    ┌────────────┐
//! └─────────────┘               │ EventBus  ├─────────────────>│ Web UI     │
//!                               │ (broadcast│                  └────────────┘
//! ┌─────────────┐     emit      │  channel) │     subscribe    ┌────────────┐
//! │TaskSequencer├──────────────>│           ├─────────────────>│ Bot status │
//! └─────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! Emission never blocks and never fails a run: publishers call
//! `emit(..).ok()` and move on, whether or not anyone is listening.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ScanEvent};
//!
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Scan(ScanEvent::Started {
//!     job_id: 3,
//!     batch_no: "20240101120000000".to_string(),
//!     source_path: "/Movies".to_string(),
//! }))
//! .ok();
//!
//! assert!(rx.try_recv().is_ok());
//! ```

use core_async::sync::broadcast::{self, error::RecvError, error::SendError};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Scan engine events
    Scan(ScanEvent),
    /// Task sequencer events
    Task(TaskEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Scan(e) => e.description(),
            CoreEvent::Task(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Scan(ScanEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Task(TaskEvent::StageCompleted { failed, .. }) if !failed.is_empty() => {
                EventSeverity::Warning
            }
            CoreEvent::Scan(ScanEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Scan(ScanEvent::Completed { .. })
            | CoreEvent::Scan(ScanEvent::PreloadCompleted { .. })
            | CoreEvent::Task(TaskEvent::SequenceCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Scan Events
// ============================================================================

/// Lifecycle of one scan engine run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ScanEvent {
    Started {
        job_id: u32,
        batch_no: String,
        source_path: String,
    },
    Completed {
        job_id: u32,
        batch_no: String,
        directories: u64,
        records: u64,
        duration_ms: u64,
    },
    /// Directory-only preload finished (or was skipped for its depth).
    PreloadCompleted {
        job_id: u32,
        depth: Option<usize>,
        directories: u64,
    },
    Failed {
        job_id: u32,
        message: String,
    },
    Cancelled {
        job_id: u32,
        directories: u64,
    },
}

impl ScanEvent {
    fn description(&self) -> &str {
        match self {
            ScanEvent::Started { .. } => "Scan started",
            ScanEvent::Completed { .. } => "Scan completed",
            ScanEvent::PreloadCompleted { .. } => "Directory preload completed",
            ScanEvent::Failed { .. } => "Scan failed",
            ScanEvent::Cancelled { .. } => "Scan cancelled",
        }
    }
}

// ============================================================================
// Task Events
// ============================================================================

/// Progress of a task sequencer invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TaskEvent {
    Dispatched {
        sequence_id: String,
        stage: usize,
        kind: String,
        target_ids: Vec<u32>,
    },
    StageCompleted {
        sequence_id: String,
        stage: usize,
        kind: String,
        /// Targets whose job ended in a failed state
        failed: Vec<u32>,
    },
    SequenceCompleted {
        sequence_id: String,
        title: String,
    },
    RefreshScheduled {
        sequence_id: String,
        target_ids: Vec<u32>,
        delay_secs: u64,
    },
    RefreshFired {
        target_ids: Vec<u32>,
    },
}

impl TaskEvent {
    fn description(&self) -> &str {
        match self {
            TaskEvent::Dispatched { .. } => "Jobs dispatched",
            TaskEvent::StageCompleted { .. } => "Stage completed",
            TaskEvent::SequenceCompleted { .. } => "Task sequence completed",
            TaskEvent::RefreshScheduled { .. } => "Library refresh scheduled",
            TaskEvent::RefreshFired { .. } => "Library refresh triggered",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cloning shares the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a bus whose subscribers lag after `capacity` unread events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event; errors only when nobody is subscribed.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let scans_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Scan(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_completed() -> CoreEvent {
        CoreEvent::Scan(ScanEvent::Completed {
            job_id: 1,
            batch_no: "20240101000000000".to_string(),
            directories: 12,
            records: 40,
            duration_ms: 900,
        })
    }

    #[test]
    fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(scan_completed()).is_err());
    }

    #[core_async::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = scan_completed();
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[core_async::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Task(_)));

        bus.emit(scan_completed()).ok();
        let task_event = CoreEvent::Task(TaskEvent::SequenceCompleted {
            sequence_id: "seq-1".to_string(),
            title: "sync finished".to_string(),
        });
        bus.emit(task_event.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), task_event);
    }

    #[core_async::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for job_id in 0..5 {
            bus.emit(CoreEvent::Scan(ScanEvent::Cancelled {
                job_id,
                directories: 0,
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Scan(ScanEvent::Failed {
            job_id: 1,
            message: "source missing".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(scan_completed().severity(), EventSeverity::Info);

        let partial = CoreEvent::Task(TaskEvent::StageCompleted {
            sequence_id: "s".to_string(),
            stage: 0,
            kind: "sync".to_string(),
            failed: vec![4],
        });
        assert_eq!(partial.severity(), EventSeverity::Warning);

        let dispatched = CoreEvent::Task(TaskEvent::Dispatched {
            sequence_id: "s".to_string(),
            stage: 0,
            kind: "scrape".to_string(),
            target_ids: vec![1, 2],
        });
        assert_eq!(dispatched.severity(), EventSeverity::Debug);
        assert_eq!(dispatched.description(), "Jobs dispatched");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Task(TaskEvent::RefreshScheduled {
            sequence_id: "seq-9".to_string(),
            target_ids: vec![1, 3],
            delay_secs: 30,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Task\""));
        assert!(json.contains("RefreshScheduled"));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn test_try_recv_empty_then_event() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(scan_completed()).ok();
        assert_eq!(stream.try_recv().unwrap().unwrap(), scan_completed());
    }
}
