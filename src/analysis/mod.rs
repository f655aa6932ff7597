//! Statistics over fetched conversations.
//!
//! The aggregator walks the filtered conversations once; ERV parsing and
//! money formatting live in their own module.

pub mod aggregator;
pub mod erv;

pub use aggregator::{analyze, AggregationSettings};
pub use erv::format_money;
