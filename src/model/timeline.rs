//! Chronological event list of a back-end node or match thread.

use serde::Serialize;

use crate::render::cell::{Cell, Table};
use crate::value::Inspector;

const COMMENT: f64 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    /// Negative for comments, which carry no timestamp.
    pub timestamp_ms: f64,
    pub label: String,
}

impl TimelineEntry {
    pub fn is_comment(&self) -> bool {
        self.timestamp_ms < 0.0
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events come from entries with an `event`; other tagged entries
    /// (profiling dumps, nested plans, ...) are kept as comments.
    pub fn from_traces(traces: Inspector<'_>) -> Timeline {
        let mut timeline = Timeline::new();
        for entry in traces.entries() {
            let event = entry.field("event");
            if event.valid() {
                timeline.add(entry.field("timestamp_ms").as_double().max(0.0), event.as_str());
            } else if entry.field("tag").valid() {
                timeline.add_comment(entry.field("tag").as_str());
            }
        }
        timeline
    }

    pub fn add(&mut self, timestamp_ms: f64, label: impl Into<String>) {
        self.entries.push(TimelineEntry {
            timestamp_ms,
            label: label.into(),
        });
    }

    pub fn add_comment(&mut self, label: impl Into<String>) {
        self.add(COMMENT, label);
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn events(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.entries.iter().filter(|e| !e.is_comment())
    }

    /// Time from the first event labelled with `prefix` until the next event.
    /// Zero when there is no such event or nothing follows it.
    pub fn duration_of(&self, prefix: &str) -> f64 {
        let mut events = self.events().skip_while(|e| !e.label.starts_with(prefix));
        match (events.next(), events.next()) {
            (Some(start), Some(next)) => next.timestamp_ms - start.timestamp_ms,
            _ => 0.0,
        }
    }

    /// Time between the first and the last event.
    pub fn impact(&self) -> f64 {
        match (self.events().next(), self.events().last()) {
            (Some(first), Some(last)) => last.timestamp_ms - first.timestamp_ms,
            _ => 0.0,
        }
    }

    pub fn table(&self, wrap_width: usize) -> Table {
        let mut table = Table::new();
        table.add_row(["timestamp_ms", "event"]).add_line();
        for e in &self.entries {
            let ts = if e.is_comment() {
                String::new()
            } else {
                format!("{:.3}", e.timestamp_ms)
            };
            table.add_row([Cell::text(ts), Cell::wrapped(&e.label, wrap_width)]);
        }
        table
    }
}
