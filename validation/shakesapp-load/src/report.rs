//! Results reporting and formatting.

use crate::metrics::AggregateReport;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, CellAlignment, Table};

/// Formats test results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as console tables: a summary followed by term usage.
    pub fn format_table(results: &AggregateReport) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Load Test Results: {}", results.scenario_name)]);

        table.add_row(vec!["Target:", &results.target_endpoint]);
        table.add_row(vec!["Duration:", &format!("{:.1}s", results.duration_secs)]);
        table.add_row(vec![
            "Virtual Users:",
            &if results.is_degraded() {
                format!(
                    "{} of {} (degraded)",
                    results.active_users, results.configured_concurrency
                )
            } else {
                format!("{}", results.active_users)
            },
        ]);
        if results.lost_users > 0 {
            table.add_row(vec![
                "Lost Users:",
                &format!("{} (term counts exceed totals)", results.lost_users),
            ]);
        }
        table.add_row(vec![
            "Total Requests:",
            &format!("{}", results.total_requests),
        ]);
        table.add_row(vec![
            "Success Rate:",
            &format!("{:.1}%", results.success_rate()),
        ]);
        table.add_row(vec![
            "Requests/sec:",
            &format!("{:.2}", results.requests_per_second),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "p50 / p90 / p95 / p99 / max"]);
        table.add_row(vec![
            "",
            &format!(
                "{:.1} / {:.1} / {:.1} / {:.1} / {:.1}",
                results.latency_p50,
                results.latency_p90,
                results.latency_p95,
                results.latency_p99,
                results.latency_max
            ),
        ]);

        if results.failed_requests > 0 || results.abandoned_requests > 0 {
            table.add_row(vec!["", ""]);
            for (kind, count) in &results.failures_by_kind {
                table.add_row(vec![format!("Failed ({}):", kind), count.to_string()]);
            }
            table.add_row(vec![
                "Abandoned:".to_string(),
                results.abandoned_requests.to_string(),
            ]);
        }

        format!("{}\n{}", table, Self::format_terms(results))
    }

    /// Per-term usage with each term's share of all requests.
    pub fn format_terms(results: &AggregateReport) -> String {
        let total: u64 = results.term_counts.values().sum();

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec!["Term", "Requests", "Share"]);

        for (term, count) in &results.term_counts {
            let share = if total > 0 {
                *count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            table.add_row(vec![
                term.clone(),
                count.to_string(),
                format!("{:.1}%", share),
            ]);
        }
        for column in 1..3 {
            if let Some(column) = table.column_mut(column) {
                column.set_cell_alignment(CellAlignment::Right);
            }
        }

        table.to_string()
    }

    /// Format results as JSON.
    pub fn format_json(results: &AggregateReport) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(results)?)
    }

    /// Format results as CSV row.
    pub fn format_csv(results: &AggregateReport) -> String {
        format!(
            "{},{},{:.1},{},{},{:.2},{:.1},{:.1},{:.1}",
            results.timestamp,
            results.scenario_name,
            results.duration_secs,
            results.total_requests,
            results.failed_requests,
            results.requests_per_second,
            results.latency_p50,
            results.latency_p90,
            results.latency_p99
        )
    }

    /// CSV header row.
    pub fn csv_header() -> &'static str {
        "timestamp,scenario,duration,requests,failures,rps,p50,p90,p99"
    }
}
