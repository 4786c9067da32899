//! Turn a query trace into a text report of box-drawn tables.

pub mod model;
pub mod render;
pub mod report;
pub mod value;

pub use report::{Analysis, ReportOptions, write_report};

pub type Result<T> = anyhow::Result<T>;
