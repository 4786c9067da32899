//! Profiling samples and the two naming grammars that tie them to plan nodes.
//!
//! Legacy names address a node by child indices from the plan root:
//!   /1/2/seek
//! Enumerated names list node ids followed by the profiled method:
//!   [3,7]search::queryeval::AndSearchStrict<...>::doSeek

use std::sync::LazyLock;

use regex::Regex;

use crate::value::Inspector;

static LEGACY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(?:(\d+(?:/\d+)*)/)?(\w+)$").expect("legacy sample regex")
});

// The class part may hold template arguments with commas and `::`; the
// method is whatever follows the last `::`.
static ENUMERATED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[([^\]]*)\](.*)::(\w+)$").expect("enumerated sample regex")
});

/// What a sample measured on its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleTag {
    Seek,
    Unpack,
    Init,
    Termwise,
}

impl SampleTag {
    fn from_legacy_suffix(suffix: &str) -> Option<SampleTag> {
        match suffix {
            "seek" => Some(SampleTag::Seek),
            "unpack" => Some(SampleTag::Unpack),
            "init" => Some(SampleTag::Init),
            "termwise" => Some(SampleTag::Termwise),
            _ => None,
        }
    }

    fn from_method(method: &str) -> Option<SampleTag> {
        match method {
            "doSeek" => Some(SampleTag::Seek),
            "doUnpack" => Some(SampleTag::Unpack),
            "initRange" => Some(SampleTag::Init),
            "and_hits_into" | "or_hits_into" | "get_hits" => Some(SampleTag::Termwise),
            m if m.contains("seek") || m.contains("Seek") => Some(SampleTag::Seek),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleName {
    Legacy { path: Vec<usize>, tag: SampleTag },
    Enumerated { ids: Vec<i64>, tag: SampleTag },
    Unrecognized,
}

impl SampleName {
    pub fn parse(name: &str) -> SampleName {
        if let Some(caps) = LEGACY_RE.captures(name) {
            let tag = caps.get(2).and_then(|m| SampleTag::from_legacy_suffix(m.as_str()));
            let path = caps.get(1).map_or(Some(Vec::new()), |m| {
                m.as_str()
                    .split('/')
                    .map(|p| p.parse::<usize>().ok())
                    .collect::<Option<Vec<_>>>()
            });
            return match (path, tag) {
                (Some(path), Some(tag)) => SampleName::Legacy { path, tag },
                _ => SampleName::Unrecognized,
            };
        }
        if let Some(caps) = ENUMERATED_RE.captures(name) {
            let tag = caps.get(3).and_then(|m| SampleTag::from_method(m.as_str()));
            let ids = caps.get(1).and_then(|m| parse_ids(m.as_str()));
            return match (ids, tag) {
                (Some(ids), Some(tag)) => SampleName::Enumerated { ids, tag },
                _ => SampleName::Unrecognized,
            };
        }
        SampleName::Unrecognized
    }
}

/// Parse "1, 2,3" into ids. Empty input gives an empty list.
fn parse_ids(s: &str) -> Option<Vec<i64>> {
    let inner = s.trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(',')
        .map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

/// One profiling sample, read straight from the trace.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    node: Inspector<'a>,
}

impl<'a> Sample<'a> {
    pub fn new(node: Inspector<'a>) -> Self {
        Self { node }
    }

    pub fn name(&self) -> &'a str {
        self.node.field("name").as_str()
    }

    pub fn count(&self) -> u64 {
        self.node.field("count").as_long().max(0) as u64
    }

    /// Falls back to the total time for samples that only carry a total.
    pub fn self_time_ms(&self) -> f64 {
        let own = self.node.field("self_time_ms");
        if own.valid() {
            own.as_double()
        } else {
            self.node.field("total_time_ms").as_double()
        }
    }

    pub fn total_time_ms(&self) -> Option<f64> {
        let total = self.node.field("total_time_ms");
        total.valid().then(|| total.as_double())
    }
}

/// Every sample below a profiling trace's `roots`, pre-order.
pub fn samples(profiling: Inspector<'_>) -> Vec<Sample<'_>> {
    fn walk<'a>(node: Inspector<'a>, out: &mut Vec<Sample<'a>>) {
        out.push(Sample::new(node));
        for child in node.field("children").entries() {
            walk(child, out);
        }
    }
    let mut out = Vec::new();
    for root in profiling.field("roots").entries() {
        walk(root, &mut out);
    }
    out
}
