//! # End-of-run Reporting
//!
//! Human-readable summary for the console and a JSON export of the same data.

use crate::lifecycle::RunReport;
use crate::metrics::MetricSummary;
use crate::thresholds::ThresholdStatus;
use std::fmt::Write as _;
use std::path::Path;
use surge_core::{Error, Result};
use tracing::info;

const LABEL_WIDTH: usize = 32;

/// Render the summary table with threshold marks.
#[must_use]
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "  scenario: {}", report.requested_scenario);
    if report.fallback {
        let _ = writeln!(
            out,
            "  FALLBACK: '{}' is not a known scenario, ran {}",
            report.requested_scenario,
            report.scenarios.join(", ")
        );
    } else {
        let _ = writeln!(out, "  plan: {}", report.scenarios.join(" -> "));
    }
    let _ = writeln!(
        out,
        "  brokers: {}  topic: {}  connection: {}",
        report.setup.brokers,
        report.setup.topic,
        if report.setup.probe_ok { "ok" } else { "FAILED" }
    );
    if report.cancelled {
        let _ = writeln!(out, "  run was cancelled before the plan finished");
    }

    if !report.thresholds.results.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  THRESHOLDS");
        for (metric, results) in &report.thresholds.results {
            let _ = writeln!(out, "    {metric}");
            for result in results {
                let line = match result.status {
                    ThresholdStatus::Passed { observed } => format!("✓ '{}' observed {observed:.2}", result.expression),
                    ThresholdStatus::Failed { observed } => format!("✗ '{}' observed {observed:.2}", result.expression),
                    ThresholdStatus::NoData => format!("- '{}' no data", result.expression),
                };
                let _ = writeln!(out, "    {line}");
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  METRICS");
    for (name, summary) in &report.snapshot.metrics {
        let dots = ".".repeat(LABEL_WIDTH.saturating_sub(name.len()));
        let _ = writeln!(out, "    {name}{dots}: {}", format_summary(summary));
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  verdict: {}",
        if report.passed() { "PASSED" } else { "FAILED (thresholds crossed)" }
    );
    out
}

fn format_summary(summary: &MetricSummary) -> String {
    match summary {
        MetricSummary::Counter { count } => count.to_string(),
        MetricSummary::Rate { passes, fails, rate } => {
            format!("{:.2}% ✓ {passes} ✗ {fails}", rate * 100.0)
        },
        MetricSummary::Trend { summary: Some(t) } => format!(
            "avg={:.2} min={:.2} med={:.2} max={:.2} p(90)={:.2} p(95)={:.2} p(99)={:.2} count={}",
            t.avg, t.min, t.med, t.max, t.p90, t.p95, t.p99, t.count
        ),
        MetricSummary::Trend { summary: None } => "no samples".to_string(),
        MetricSummary::Gauge { value, max } => format!("{value} max={max}"),
    }
}

/// Write `report` as pretty JSON to `path`.
///
/// # Errors
/// Returns an error if serialization or the file write fails.
pub fn export_json(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).map_err(|e| Error::Internal {
        message: format!("Failed to write summary to {}: {e}", path.display()),
    })?;
    info!(path = %path.display(), "Summary exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::SetupData;
    use crate::metrics::{names, MetricsRegistry};
    use crate::thresholds::ThresholdSet;
    use chrono::Utc;
    use surge_core::config::ThresholdTable;
    use tempfile::TempDir;

    fn report(fallback: bool) -> RunReport {
        let registry = MetricsRegistry::new();
        registry.increment(names::MESSAGES_SENT, 42);
        registry.add_rate_sample(names::SUCCESS_RATE, true);
        registry.add_trend_sample(names::PRODUCE_LATENCY, 2.5);
        let snapshot = registry.snapshot();
        let thresholds = ThresholdSet::from_table(&ThresholdTable::default()).unwrap().evaluate(&snapshot);

        RunReport {
            requested_scenario: if fallback { "bogus" } else { "load" }.to_string(),
            scenarios: vec!["load".to_string()],
            fallback,
            setup: SetupData {
                start_time: Utc::now(),
                brokers: "localhost:9092".to_string(),
                topic: "high-volume-topic".to_string(),
                probe_ok: true,
            },
            cancelled: false,
            finished_at: Utc::now(),
            snapshot,
            thresholds,
        }
    }

    #[test]
    fn test_summary_lists_metrics_and_verdict() {
        let text = render_summary(&report(false));
        assert!(text.contains("kafka_messages_sent"));
        assert!(text.contains(": 42"));
        assert!(text.contains("✓ 'p(95)<100'"));
        assert!(text.contains("verdict: PASSED"));
        assert!(!text.contains("FALLBACK"));
    }

    #[test]
    fn test_summary_flags_fallback() {
        let text = render_summary(&report(true));
        assert!(text.contains("FALLBACK: 'bogus'"));
    }

    #[test]
    fn test_export_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.json");
        export_json(&report(false), &path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["snapshot"]["metrics"]["kafka_messages_sent"]["count"], 42);
        assert_eq!(json["snapshot"]["metrics"]["kafka_messages_sent"]["type"], "counter");
        assert_eq!(json["fallback"], false);
    }
}
