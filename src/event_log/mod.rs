//! Event Log
//!
//! Delivery boundary for committed processor events.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::{ProcessorEvent, RecordedEvent};

/// Receives events once the operation that produced them has committed
pub trait EventSink: Send {
    fn publish(&mut self, event: RecordedEvent);
}

/// Shared in-memory event log. Clones observe the same events.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventLog {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<RecordedEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn recorded(&self) -> Vec<RecordedEvent> {
        self.guard().clone()
    }

    /// Bare events in emission order
    pub fn events(&self) -> Vec<ProcessorEvent> {
        self.guard().iter().map(|r| r.event.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl EventSink for InMemoryEventLog {
    fn publish(&mut self, event: RecordedEvent) {
        self.guard().push(event);
    }
}

/// Writes each event as a structured log line
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&mut self, event: RecordedEvent) {
        tracing::info!(
            sequence = event.sequence,
            event_type = event.event.event_type(),
            caller = %event.caller,
            correlation_id = ?event.correlation_id,
            amount = ?event.event.amount(),
            "Event published"
        );
    }
}

/// Fans each event out to several sinks
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl EventSink for FanoutSink {
    fn publish(&mut self, event: RecordedEvent) {
        for sink in &mut self.sinks {
            sink.publish(event.clone());
        }
    }
}
