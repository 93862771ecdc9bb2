use std::collections::BTreeMap;
use std::fmt::Write as _;

use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

#[derive(Debug, Clone)]
struct Series {
    kind: MetricKind,
    help: &'static str,
    values: BTreeMap<Vec<(String, String)>, f64>,
}

/// A named scalar store, queried by name the way the orchestrator's
/// `get_status()` and the rule engine's `get_rule_metrics()` expose their
/// counters today, plus a Prometheus text renderer for `/metrics`.
#[derive(Default)]
pub struct MetricsSource {
    series: RwLock<std::collections::HashMap<&'static str, Series>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub value: f64,
}

impl MetricsSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_series(&self, name: &'static str, kind: MetricKind, help: &'static str) {
        let mut series = self.series.write();
        series.entry(name).or_insert_with(|| Series { kind, help, values: BTreeMap::new() });
    }

    pub fn incr(&self, name: &'static str, help: &'static str, labels: &[(&str, &str)]) {
        self.add(name, help, labels, 1.0);
    }

    pub fn add(&self, name: &'static str, help: &'static str, labels: &[(&str, &str)], delta: f64) {
        self.ensure_series(name, MetricKind::Counter, help);
        let key: Vec<(String, String)> = labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let mut series = self.series.write();
        let s = series.get_mut(name).expect("ensured above");
        *s.values.entry(key).or_insert(0.0) += delta;
    }

    pub fn set_gauge(&self, name: &'static str, help: &'static str, labels: &[(&str, &str)], value: f64) {
        self.ensure_series(name, MetricKind::Gauge, help);
        let key: Vec<(String, String)> = labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let mut series = self.series.write();
        let s = series.get_mut(name).expect("ensured above");
        s.values.insert(key, value);
    }

    /// Named scalar read, e.g. `get("orchestrator_tasks_submitted_total", &[("agent_type","kyc")])`.
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> Option<Sample> {
        let series = self.series.read();
        let s = series.get(name)?;
        let key: Vec<(String, String)> = labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        s.values.get(&key).map(|&value| Sample { value })
    }

    /// Prometheus exposition text, mirroring `prometheus_metrics()`'s
    /// `# HELP` / `# TYPE` preamble per series.
    pub fn render_prometheus(&self) -> String {
        let series = self.series.read();
        let mut out = String::new();
        for (name, s) in series.iter() {
            let kind = match s.kind {
                MetricKind::Counter => "counter",
                MetricKind::Gauge => "gauge",
            };
            let _ = writeln!(out, "# HELP {name} {}", s.help);
            let _ = writeln!(out, "# TYPE {name} {kind}");
            for (labels, value) in &s.values {
                if labels.is_empty() {
                    let _ = writeln!(out, "{name} {value}");
                } else {
                    let rendered: Vec<String> = labels.iter().map(|(k, v)| format!("{k}=\"{v}\"")).collect();
                    let _ = writeln!(out, "{name}{{{}}} {value}", rendered.join(","));
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_across_calls() {
        let metrics = MetricsSource::new();
        metrics.incr("orchestrator_tasks_submitted_total", "tasks submitted", &[("agent_type", "kyc")]);
        metrics.incr("orchestrator_tasks_submitted_total", "tasks submitted", &[("agent_type", "kyc")]);
        let sample = metrics.get("orchestrator_tasks_submitted_total", &[("agent_type", "kyc")]).unwrap();
        assert_eq!(sample.value, 2.0);
    }

    #[test]
    fn gauge_is_overwritten_not_accumulated() {
        let metrics = MetricsSource::new();
        metrics.set_gauge("rule_engine_queue_depth", "pending rule evaluations", &[], 5.0);
        metrics.set_gauge("rule_engine_queue_depth", "pending rule evaluations", &[], 2.0);
        assert_eq!(metrics.get("rule_engine_queue_depth", &[]).unwrap().value, 2.0);
    }

    #[test]
    fn prometheus_text_includes_help_and_type_lines() {
        let metrics = MetricsSource::new();
        metrics.incr("x", "example counter", &[]);
        let text = metrics.render_prometheus();
        assert!(text.contains("# HELP x example counter"));
        assert!(text.contains("# TYPE x counter"));
    }
}
