//! Optional audit hook: append-only records of everything the scheduler
//! decides. The caller supplies the sink; the default sink drops them.

use serde::{Deserialize, Serialize};

use deadair_world::types::Timeline;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    Activated {
        timeline: Timeline,
        story_id: String,
        tick: u64,
    },
    BeatEmitted {
        timeline: Timeline,
        story_id: String,
        act: u32,
        tick: u64,
    },
    ActAdvanced {
        timeline: Timeline,
        story_id: String,
        act: u32,
        tick: u64,
    },
    Completed {
        timeline: Timeline,
        story_id: String,
        total_broadcasts: u32,
        engagement: f64,
        tick: u64,
    },
    Abandoned {
        timeline: Timeline,
        story_id: String,
        total_broadcasts: u32,
        tick: u64,
    },
    Escalated {
        from: Timeline,
        to: Timeline,
        story_id: String,
        follow_up_id: String,
        tick: u64,
    },
    SnapshotWritten {
        tick: u64,
    },
}

pub trait AuditSink {
    fn record(&mut self, event: AuditEvent);
}

/// Default sink: discard everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudit;

impl AuditSink for NullAudit {
    fn record(&mut self, _event: AuditEvent) {}
}

/// Test sink: keep everything for assertions.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    events: Vec<AuditEvent>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }
}

impl AuditSink for MemoryAudit {
    fn record(&mut self, event: AuditEvent) {
        self.events.push(event);
    }
}
