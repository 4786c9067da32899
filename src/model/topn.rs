//! Per-name sample totals with top-N retrieval by self time.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::render::cell::{Cell, Table};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopNEntry {
    pub name: String,
    pub count: u64,
    pub self_time_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TopN {
    entries: BTreeMap<String, TopNEntry>,
}

impl TopN {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, count: u64, self_time_ms: f64) {
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| TopNEntry {
                name: name.to_string(),
                count: 0,
                self_time_ms: 0.0,
            });
        entry.count += count;
        entry.self_time_ms += self_time_ms;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `n` entries with the most self time, descending. Fewer when there
    /// are not that many names.
    pub fn top_n(&self, n: usize) -> Vec<TopNEntry> {
        let mut sorted: Vec<TopNEntry> = self.entries.values().cloned().collect();
        sorted.sort_by(|a, b| {
            b.self_time_ms
                .partial_cmp(&a.self_time_ms)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        sorted.truncate(n);
        sorted
    }

    pub fn table(&self, n: usize, wrap_width: usize) -> Table {
        let mut table = Table::new();
        table.add_row(["count", "self_ms", "name"]).add_line();
        for e in self.top_n(n) {
            table.add_row([
                Cell::text(e.count.to_string()),
                Cell::text(format!("{:.3}", e.self_time_ms)),
                Cell::wrapped(&e.name, wrap_width),
            ]);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn filled() -> TopN {
        let mut top = TopN::new();
        top.add("b", 1, 2.0);
        top.add("a", 2, 1.0);
        top.add("c", 1, 0.5);
        top.add("a", 3, 1.5);
        top
    }

    #[test]
    fn accumulates_by_name() {
        let top = filled();
        assert_eq!(top.len(), 3);
        assert_eq!(
            top.top_n(1),
            vec![TopNEntry {
                name: "a".to_string(),
                count: 5,
                self_time_ms: 2.5
            }]
        );
    }

    #[test]
    fn oversized_n_returns_everything_sorted() {
        let names: Vec<String> = filled().top_n(10).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(TopN::new().top_n(3).is_empty());
    }

    #[test]
    fn ties_break_by_name() {
        let mut top = TopN::new();
        top.add("y", 1, 1.0);
        top.add("x", 1, 1.0);
        let names: Vec<String> = top.top_n(2).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["x", "y"]);
    }
}
