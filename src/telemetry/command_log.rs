//! Bounded history of emitted commands. Oldest entries are evicted first.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::algorithm::ring_buffer::RingBuffer;
use crate::models::events::{CommandEvent, CommandKind, CommandSource};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLogEntry {
    /// Sample timestamp of the emitting frame.
    pub t: f64,
    pub kind: CommandKind,
    pub confidence: f64,
    pub source: CommandSource,
    /// Wall-clock time the gate accepted the command.
    pub logged_at: DateTime<Utc>,
    /// false when simulation mode kept it from the sink.
    pub dispatched: bool,
}

#[derive(Debug, Clone)]
pub struct CommandLog {
    entries: RingBuffer<CommandLogEntry>,
}

impl CommandLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RingBuffer::new(capacity),
        }
    }

    pub fn record(&mut self, event: &CommandEvent, dispatched: bool) {
        self.entries.push(CommandLogEntry {
            t: event.t,
            kind: event.kind,
            confidence: event.confidence,
            source: event.source,
            logged_at: Utc::now(),
            dispatched,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &CommandLogEntry> + '_ {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&CommandLogEntry> {
        self.entries.last()
    }

    pub fn to_json(&self) -> Result<String, String> {
        let entries: Vec<&CommandLogEntry> = self.entries.iter().collect();
        serde_json::to_string_pretty(&entries)
            .map_err(|e| format!("Failed to serialize command log: {}", e))
    }
}
