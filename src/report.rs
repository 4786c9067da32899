//! Report generation: pick the slowest back-end node and its slowest match
//! thread, rebuild the query plan, attribute the thread's profiling samples
//! and render everything as box-drawn tables.
//!
//! Trace JSON shape (abridged):
//! {
//!   "timing": { "querytime": 0.012, "summaryfetchtime": 0.001, "searchtime": 0.014 },
//!   "trace": { "children": [ ... {
//!     "distribution-key": 3, "document-type": "doc", "duration_ms": 9.5,
//!     "traces": [
//!       { "timestamp_ms": 0.1, "event": "Start query setup" },
//!       { "tag": "query_execution_plan", "optimized": { ...plan... } },
//!       { "tag": "query_execution", "threads": [ { "traces": [
//!         { "timestamp_ms": 1.2, "event": "Start match and first phase rank" },
//!         { "tag": "match_profiling", "total_time_ms": 3.1, "roots": [ ...samples... ] }
//!       ] } ] }
//!     ]
//!   } ... ] }
//! }

use std::io::Write;

use anyhow::{Context, bail};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::Result;
use crate::model::{NearestNeighbor, QueryTree, Timeline, TopN, samples};
use crate::render::cell::{Cell, Table, render};
use crate::value::Inspector;

const MATCH_PROFILING: &str = "match_profiling";
const FIRST_PHASE_PROFILING: &str = "first_phase_profiling";
const SECOND_PHASE_PROFILING: &str = "second_phase_profiling";

/// Well-known tasks: (display name, event label prefix). Each lasts until the
/// next event of its timeline.
const NODE_TASKS: [(&str, &str); 4] = [
    ("query setup", "Start query setup"),
    ("plan build", "Build query execution plan"),
    ("plan optimize", "Optimize query execution plan"),
    ("dictionary lookup", "Perform dictionary lookups"),
];
const THREAD_TASKS: [(&str, &str); 3] = [
    ("match + first phase", "Start match and first phase rank"),
    ("second phase", "Start second phase rerank"),
    ("result set", "Create result set"),
];

#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Entries per top-N table.
    pub top_n: usize,
    /// Target width of word-wrapped cells.
    pub wrap_width: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            wrap_width: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Timing {
    pub query_ms: f64,
    pub summary_fetch_ms: f64,
    pub search_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendNode {
    pub distribution_key: i64,
    pub document_type: String,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub name: String,
    pub duration_ms: f64,
}

/// Everything extracted from one trace, ready to render.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub timing: Timing,
    pub backend_nodes: usize,
    pub node: BackendNode,
    pub thread: usize,
    pub thread_profiling_ms: f64,
    pub tasks: Vec<Task>,
    pub node_timeline: Timeline,
    pub thread_timeline: Timeline,
    pub plan: Option<QueryTree>,
    pub nearest_neighbors: Vec<NearestNeighbor>,
    pub matched_samples: usize,
    pub dropped_samples: usize,
    pub match_samples: TopN,
    pub first_phase_samples: TopN,
    pub second_phase_samples: TopN,
}

fn tagged<'a>(traces: Inspector<'a>, tag: &str) -> Inspector<'a> {
    traces
        .entries()
        .find(|e| e.field("tag").as_str() == tag)
        .unwrap_or_else(Inspector::invalid)
}

fn is_backend_node(node: &Inspector<'_>) -> bool {
    ["distribution-key", "document-type", "duration_ms"]
        .iter()
        .all(|f| node.field(f).valid())
}

/// First item with the largest key.
fn slowest<T>(items: impl IntoIterator<Item = T>, key: impl Fn(&T) -> f64) -> Option<(usize, T)> {
    let mut best: Option<(usize, T, f64)> = None;
    for (i, item) in items.into_iter().enumerate() {
        let k = key(&item);
        if best.as_ref().is_none_or(|(_, _, b)| k > *b) {
            best = Some((i, item, k));
        }
    }
    best.map(|(i, item, _)| (i, item))
}

fn profiling_ms(thread: Inspector<'_>) -> f64 {
    let traces = thread.field("traces");
    [MATCH_PROFILING, FIRST_PHASE_PROFILING, SECOND_PHASE_PROFILING]
        .iter()
        .map(|tag| tagged(traces, tag).field("total_time_ms").as_double())
        .sum()
}

impl Analysis {
    pub fn from_trace(doc: Inspector<'_>) -> Result<Analysis> {
        let timing = doc.field("timing");
        let timing = Timing {
            query_ms: timing.field("querytime").as_double() * 1000.0,
            summary_fetch_ms: timing.field("summaryfetchtime").as_double() * 1000.0,
            search_ms: timing.field("searchtime").as_double() * 1000.0,
        };

        let candidates = doc.field("trace").find_all(is_backend_node);
        let Some((_, node)) = slowest(candidates.iter().copied(), |n| {
            n.field("duration_ms").as_double()
        }) else {
            bail!(
                "no back-end node trace found (an object with distribution-key, document-type and duration_ms)"
            );
        };
        let backend = BackendNode {
            distribution_key: node.field("distribution-key").as_long(),
            document_type: node.field("document-type").as_str().to_string(),
            duration_ms: node.field("duration_ms").as_double(),
        };
        debug!(
            "slowest of {} back-end nodes: distribution-key {} ({:.3} ms)",
            candidates.len(),
            backend.distribution_key,
            backend.duration_ms
        );

        let traces = node.field("traces");
        let threads = tagged(traces, "query_execution").field("threads");
        let Some((thread_idx, thread)) = slowest(threads.entries(), |t| profiling_ms(*t)) else {
            bail!(
                "no match thread traces found for back-end node with distribution-key {}",
                backend.distribution_key
            );
        };
        let thread_profiling_ms = profiling_ms(thread);
        debug!("slowest match thread: #{thread_idx} ({thread_profiling_ms:.3} ms profiled)");

        let plan_trace = tagged(traces, "query_execution_plan").field("optimized");
        let mut plan = plan_trace.valid().then(|| QueryTree::extract(plan_trace));
        if plan.is_none() {
            warn!("no optimized query execution plan in trace; samples will not be attributed");
        }
        let nearest_neighbors = NearestNeighbor::find_all(plan_trace);

        let thread_traces = thread.field("traces");
        let mut matched_samples = 0;
        let mut dropped_samples = 0;
        let mut phases = [TopN::new(), TopN::new(), TopN::new()];
        for (tag, top) in [MATCH_PROFILING, FIRST_PHASE_PROFILING, SECOND_PHASE_PROFILING]
            .iter()
            .zip(phases.iter_mut())
        {
            for sample in samples(tagged(thread_traces, tag)) {
                top.add(sample.name(), sample.count(), sample.self_time_ms());
                if plan.as_mut().is_some_and(|plan| plan.apply(&sample)) {
                    matched_samples += 1;
                } else {
                    dropped_samples += 1;
                }
            }
        }
        debug!("samples attributed to plan: {matched_samples}, unmatched: {dropped_samples}");
        let [match_samples, first_phase_samples, second_phase_samples] = phases;

        let node_timeline = Timeline::from_traces(traces);
        let thread_timeline = Timeline::from_traces(thread_traces);
        let mut tasks: Vec<Task> = NODE_TASKS
            .iter()
            .map(|(name, prefix)| (name, node_timeline.duration_of(prefix)))
            .chain(
                THREAD_TASKS
                    .iter()
                    .map(|(name, prefix)| (name, thread_timeline.duration_of(prefix))),
            )
            .map(|(name, duration_ms)| Task {
                name: name.to_string(),
                duration_ms,
            })
            .collect();
        tasks.push(Task {
            name: "match thread total".to_string(),
            duration_ms: thread_timeline.impact(),
        });

        Ok(Analysis {
            timing,
            backend_nodes: candidates.len(),
            node: backend,
            thread: thread_idx,
            thread_profiling_ms,
            tasks,
            node_timeline,
            thread_timeline,
            plan,
            nearest_neighbors,
            matched_samples,
            dropped_samples,
            match_samples,
            first_phase_samples,
            second_phase_samples,
        })
    }

    fn timing_table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(["query", "summary fetch", "search"]).add_line();
        table.add_row([
            format!("{:.3}", self.timing.query_ms),
            format!("{:.3}", self.timing.summary_fetch_ms),
            format!("{:.3}", self.timing.search_ms),
        ]);
        table
    }

    fn node_table(&self) -> Table {
        let mut table = Table::new();
        table.add_row([
            "back-end nodes".to_string(),
            self.backend_nodes.to_string(),
        ]);
        table.add_row([
            "distribution key".to_string(),
            self.node.distribution_key.to_string(),
        ]);
        table.add_row(["document type".to_string(), self.node.document_type.clone()]);
        table.add_row([
            "duration_ms".to_string(),
            format!("{:.3}", self.node.duration_ms),
        ]);
        table.add_row(["match thread".to_string(), format!("#{}", self.thread)]);
        table
            .add_row([
                "thread profiling_ms".to_string(),
                format!("{:.3}", self.thread_profiling_ms),
            ])
            .add_line();
        for task in &self.tasks {
            table.add_row([task.name.clone(), format!("{:.3}", task.duration_ms)]);
        }
        table
    }

    /// Titled sections in report order. Empty sections are left out.
    pub fn sections(&self, opts: &ReportOptions) -> Vec<(String, Cell)> {
        let mut out = vec![
            ("Timing (ms)".to_string(), Cell::framed(self.timing_table())),
            (
                "Slowest back-end node".to_string(),
                Cell::framed(self.node_table()),
            ),
        ];
        if !self.node_timeline.is_empty() {
            out.push((
                "Back-end node timeline".to_string(),
                Cell::framed(self.node_timeline.table(opts.wrap_width)),
            ));
        }
        if !self.thread_timeline.is_empty() {
            out.push((
                format!("Match thread #{} timeline", self.thread),
                Cell::framed(self.thread_timeline.table(opts.wrap_width)),
            ));
        }
        if let Some(plan) = &self.plan {
            out.push((
                format!(
                    "Query plan performance ({} samples matched, {} unmatched)",
                    self.matched_samples, self.dropped_samples
                ),
                Cell::framed(plan.perf_table()),
            ));
        }
        for nn in &self.nearest_neighbors {
            out.push((
                format!("Nearest neighbor search (node {})", nn.id),
                Cell::framed(nn.table(opts.wrap_width)),
            ));
        }
        for (title, top) in [
            ("match", &self.match_samples),
            ("first phase", &self.first_phase_samples),
            ("second phase", &self.second_phase_samples),
        ] {
            if !top.is_empty() {
                out.push((
                    format!("Top {} {title} samples by self time", opts.top_n.min(top.len())),
                    Cell::framed(top.table(opts.top_n, opts.wrap_width)),
                ));
            }
        }
        out
    }
}

/// Line sink that remembers the first write error and skips every write
/// after it. The error surfaces from [`Output::finish`].
pub struct Output<W: Write> {
    out: W,
    error: Option<std::io::Error>,
}

impl<W: Write> Output<W> {
    pub fn new(out: W) -> Self {
        Self { out, error: None }
    }

    pub fn line(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.out, "{text}") {
            self.error = Some(e);
        }
    }

    pub fn cell(&mut self, cell: &Cell) {
        for line in render(cell) {
            self.line(&line);
        }
    }

    pub fn finish(mut self) -> Result<()> {
        if let Some(e) = self.error.take() {
            return Err(e).context("write report");
        }
        self.out.flush().context("flush report")
    }
}

/// Analyze `doc` and write the text report to `out`. Nothing is written
/// when the trace lacks a back-end node or match thread.
pub fn write_report<W: Write>(doc: &Value, opts: &ReportOptions, out: W) -> Result<()> {
    let analysis = Analysis::from_trace(Inspector::new(doc))?;
    let mut output = Output::new(out);
    for (title, cell) in analysis.sections(opts) {
        output.line(&title);
        output.cell(&cell);
        output.line("");
    }
    output.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Fails every write and counts the attempts.
    struct FailingWriter {
        attempts: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            self.attempts += 1;
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn first_write_error_sticks() {
        let mut writer = FailingWriter { attempts: 0 };
        let mut out = Output::new(&mut writer);
        out.line("one");
        out.line("two");
        out.cell(&Cell::framed("three"));
        let err = out.finish().expect_err("sink failed");
        assert!(format!("{err:#}").contains("disk full"));
        assert_eq!(writer.attempts, 1);
    }

    #[test]
    fn output_writes_lines() {
        let mut sink = Vec::new();
        let mut out = Output::new(&mut sink);
        out.line("title");
        out.cell(&Cell::framed("x"));
        out.finish().expect("written");
        assert_eq!(String::from_utf8_lossy(&sink), "title\n┌───┐\n│ x │\n└───┘\n");
    }

    #[test]
    fn missing_backend_node_is_an_error() {
        let doc = json!({"timing": {"querytime": 0.1}, "trace": {"children": [{"message": "hi"}]}});
        let mut sink = Vec::new();
        let err = write_report(&doc, &ReportOptions::default(), &mut sink).expect_err("no node");
        assert!(err.to_string().contains("no back-end node"));
        assert!(sink.is_empty());
    }

    #[test]
    fn missing_threads_is_an_error() {
        let doc = json!({"trace": {"children": [
            {"distribution-key": 1, "document-type": "doc", "duration_ms": 3.0, "traces": []}
        ]}});
        let mut sink = Vec::new();
        let err = write_report(&doc, &ReportOptions::default(), &mut sink).expect_err("no thread");
        assert!(err.to_string().contains("no match thread"));
        assert!(sink.is_empty());
    }

    #[test]
    fn picks_slowest_node_and_thread() {
        let thread = |ms: f64| {
            json!({"traces": [
                {"tag": "match_profiling", "total_time_ms": ms},
                {"tag": "first_phase_profiling", "total_time_ms": 1.0}
            ]})
        };
        let doc = json!({"trace": {"children": [
            {"distribution-key": 1, "document-type": "a", "duration_ms": 3.0,
             "traces": [{"tag": "query_execution", "threads": [thread(1.0)]}]},
            {"distribution-key": 2, "document-type": "b", "duration_ms": 7.0,
             "traces": [{"tag": "query_execution", "threads": [thread(2.0), thread(5.0), thread(5.0)]}]},
            {"distribution-key": 3, "document-type": "c", "duration_ms": 7.0,
             "traces": [{"tag": "query_execution", "threads": [thread(9.0)]}]}
        ]}});
        let analysis = Analysis::from_trace(Inspector::new(&doc)).expect("analysis");
        assert_eq!(analysis.backend_nodes, 3);
        assert_eq!(analysis.node.distribution_key, 2);
        assert_eq!(analysis.node.document_type, "b");
        assert_eq!(analysis.thread, 1);
        assert_eq!(analysis.thread_profiling_ms, 6.0);
        assert!(analysis.plan.is_none());
    }
}
