//! Trace model: the query plan tree, profiling samples, timelines and
//! per-name sample totals.

pub mod query;
pub mod sample;
pub mod timeline;
pub mod topn;

pub use query::{NearestNeighbor, QueryNode, QueryTree};
pub use sample::{Sample, SampleName, SampleTag, samples};
pub use timeline::{Timeline, TimelineEntry};
pub use topn::{TopN, TopNEntry};
