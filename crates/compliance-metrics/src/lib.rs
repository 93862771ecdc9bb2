//! Metrics Source: a named scalar query interface the rest of the fleet
//! writes gauges/counters through, treated as an external collaborator
//! (spec.md §1). Grounded on `antifragile.rs::prometheus_metrics()`'s
//! hand-rendered text format — this crate generalizes that one-off
//! rendering into a small registry every pillar can publish through.

mod registry;

pub use registry::{MetricKind, MetricsSource, Sample};
