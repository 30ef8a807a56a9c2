//! Console renderings of run search results.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use std::collections::BTreeMap;

use crate::run_types::{Run, TestMethod, TestStructure};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RunsFormat {
    Summary,
    Details,
    Raw,
    Json,
}

impl RunsFormat {
    /// Whether the server has to include per-method results for this format.
    pub fn needs_method_details(self) -> bool {
        matches!(self, Self::Details)
    }
}

pub fn format_runs(format: RunsFormat, runs: &[Run], api_server_url: &str) -> Result<String> {
    Ok(match format {
        RunsFormat::Summary => format_summary(runs),
        RunsFormat::Details => format_details(runs, api_server_url),
        RunsFormat::Raw => format_raw(runs, api_server_url),
        RunsFormat::Json => {
            let v = serde_json::json!({
                "amountOfRuns": runs.len(),
                "runs": runs,
            });
            format!("{}\n", serde_json::to_string_pretty(&v)?)
        }
    })
}

fn format_summary(runs: &[Run]) -> String {
    let mut rows = vec![vec![
        "submitted-time(UTC)".to_string(),
        "name".to_string(),
        "status".to_string(),
        "result".to_string(),
        "test-name".to_string(),
    ]];
    for run in runs {
        let ts = structure(run);
        rows.push(vec![
            display_time(ts.queued.as_deref()),
            text(&ts.run_name),
            ts.status.as_ref().map(|s| s.as_str().to_string()).unwrap_or_default(),
            text(&ts.result),
            test_name(ts),
        ]);
    }

    let mut out = String::new();
    if !runs.is_empty() {
        out.push_str(&render_table(&rows));
        out.push('\n');
    }
    out.push_str(&totals_line(runs));
    out
}

fn format_details(runs: &[Run], api_server_url: &str) -> String {
    let mut out = String::new();
    for run in runs {
        let ts = structure(run);
        let fields = [
            ("name", text(&ts.run_name)),
            (
                "status",
                ts.status.as_ref().map(|s| s.as_str().to_string()).unwrap_or_default(),
            ),
            ("result", text(&ts.result)),
            ("submitted-time(UTC)", display_time(ts.queued.as_deref())),
            ("start-time(UTC)", display_time(ts.start_time.as_deref())),
            ("end-time(UTC)", display_time(ts.end_time.as_deref())),
            (
                "duration(ms)",
                duration_ms(ts.start_time.as_deref(), ts.end_time.as_deref()),
            ),
            ("test-name", test_name(ts)),
            ("requestor", text(&ts.requestor)),
            ("bundle", text(&ts.bundle)),
            ("group", text(&ts.group)),
            ("tags", ts.tags.join(",")),
            ("run-log", run_log_url(run, api_server_url)),
        ];
        let width = fields.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (k, v) in fields {
            out.push_str(&format!("{:<width$} : {}\n", k, v, width = width));
        }

        if !ts.methods.is_empty() {
            out.push('\n');
            out.push_str(&render_table(&method_rows(&ts.methods)));
        }
        out.push_str("\n---\n\n");
    }
    out.push_str(&totals_line(runs));
    out
}

fn format_raw(runs: &[Run], api_server_url: &str) -> String {
    let mut out = String::new();
    for run in runs {
        let ts = structure(run);
        let fields = [
            text(&ts.run_name),
            ts.status.as_ref().map(|s| s.as_str().to_string()).unwrap_or_default(),
            text(&ts.result),
            text(&ts.queued),
            text(&ts.start_time),
            text(&ts.end_time),
            duration_ms(ts.start_time.as_deref(), ts.end_time.as_deref()),
            test_name(ts),
            text(&ts.requestor),
            text(&ts.bundle),
            text(&ts.group),
            run_log_url(run, api_server_url),
        ];
        out.push_str(&fields.join("|"));
        out.push('\n');
    }
    out
}

fn method_rows(methods: &[TestMethod]) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "method".to_string(),
        "type".to_string(),
        "status".to_string(),
        "result".to_string(),
        "start-time(UTC)".to_string(),
        "end-time(UTC)".to_string(),
        "duration(ms)".to_string(),
    ]];
    for m in methods {
        rows.push(vec![
            text(&m.method_name),
            text(&m.method_type),
            text(&m.status),
            text(&m.result),
            display_time(m.start_time.as_deref()),
            display_time(m.end_time.as_deref()),
            duration_ms(m.start_time.as_deref(), m.end_time.as_deref()),
        ]);
    }
    rows
}

fn totals_line(runs: &[Run]) -> String {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for run in runs {
        if let Some(result) = structure(run).result.as_deref().filter(|r| !r.is_empty()) {
            *counts.entry(result.to_string()).or_default() += 1;
        }
    }
    let mut parts = vec![format!("Total:{}", runs.len())];
    for (result, n) in counts {
        parts.push(format!("{}:{}", result, n));
    }
    format!("{}\n", parts.join(" "))
}

fn render_table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in rows {
        let line = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn structure(run: &Run) -> &TestStructure {
    static EMPTY: TestStructure = TestStructure {
        run_name: None,
        bundle: None,
        test_name: None,
        test_short_name: None,
        requestor: None,
        status: None,
        result: None,
        queued: None,
        start_time: None,
        end_time: None,
        group: None,
        tags: Vec::new(),
        methods: Vec::new(),
    };
    run.test_structure.as_ref().unwrap_or(&EMPTY)
}

fn text(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

fn test_name(ts: &TestStructure) -> String {
    ts.test_name
        .clone()
        .or_else(|| ts.test_short_name.clone())
        .unwrap_or_default()
}

fn run_log_url(run: &Run, api_server_url: &str) -> String {
    run.run_id
        .as_deref()
        .map(|id| format!("{}/ras/runs/{}/runlog", api_server_url.trim_end_matches('/'), id))
        .unwrap_or_default()
}

fn parse_time(v: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(v)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn display_time(v: Option<&str>) -> String {
    match v {
        Some(raw) => parse_time(raw)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| raw.to_string()),
        None => String::new(),
    }
}

fn duration_ms(start: Option<&str>, end: Option<&str>) -> String {
    match (start.and_then(parse_time), end.and_then(parse_time)) {
        (Some(s), Some(e)) if e >= s => (e - s).num_milliseconds().to_string(),
        _ => String::new(),
    }
}
