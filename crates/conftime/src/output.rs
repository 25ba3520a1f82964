//! Output formatting.
//!
//! Device reports go to stdout as JSON or YAML, one document per device.
//! The batch summary table and dry-run payloads go to stderr so stdout
//! stays machine-readable.

use std::io::{self, IsTerminal, Write};

use indexmap::IndexMap;
use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use conftime_core::{AttributeMap, DeviceFamily, JobReport, Outcome, ReportSink, WorkerStats};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Whether the summary on stderr should be colored.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

// ── Structured renderers ─────────────────────────────────────────────

pub fn render<T: serde::Serialize + ?Sized>(
    format: OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
    })
}

/// Print to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", output.trim_end());
}

// ── Device reports ───────────────────────────────────────────────────

/// Prints each device's attribute set before its transaction begins.
#[derive(Debug, Clone, Copy)]
pub struct StdoutReport {
    format: OutputFormat,
    quiet: bool,
}

impl StdoutReport {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }
}

impl ReportSink for StdoutReport {
    fn device_state(&self, host: &str, _family: DeviceFamily, attributes: &AttributeMap) {
        let mut doc: IndexMap<&str, &AttributeMap> = IndexMap::with_capacity(1);
        doc.insert(host, attributes);
        match render(self.format, &doc) {
            Ok(out) => print_output(&out, self.quiet),
            Err(e) => tracing::warn!(host, error = %e, "could not render device report"),
        }
    }
}

// ── Batch summary ────────────────────────────────────────────────────

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "HOST")]
    host: String,
    #[tabled(rename = "FAMILY")]
    family: String,
    #[tabled(rename = "RESULT")]
    result: String,
    #[tabled(rename = "DETAIL")]
    detail: String,
    #[tabled(rename = "ELAPSED")]
    elapsed: String,
}

impl SummaryRow {
    fn new(report: &JobReport, color: bool) -> Self {
        let (result, detail) = match &report.result {
            Ok(Outcome::Unchanged) => ("unchanged".to_owned(), String::new()),
            Ok(Outcome::DryRun { payloads }) => (
                "dry-run".to_owned(),
                payloads.keys().cloned().collect::<Vec<_>>().join(", "),
            ),
            Ok(Outcome::Applied { attributes }) => ("applied".to_owned(), attributes.join(", ")),
            Err(e) => (e.fault().to_string(), e.to_string()),
        };
        let result = match (color, report.is_ok()) {
            (false, _) => result,
            (true, true) => result.green().to_string(),
            (true, false) => result.red().to_string(),
        };
        let elapsed = report
            .elapsed()
            .to_std()
            .map(|d| humantime::format_duration(truncate_millis(d)).to_string())
            .unwrap_or_default();

        Self {
            host: report.host.clone(),
            family: report
                .family
                .map_or_else(|| "-".to_owned(), |f| f.to_string()),
            result,
            detail,
            elapsed,
        }
    }
}

fn truncate_millis(d: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

pub fn summary_table(reports: &[JobReport], color: bool) -> String {
    let rows: Vec<SummaryRow> = reports.iter().map(|r| SummaryRow::new(r, color)).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Summary table, then a one-line tally.
pub fn print_summary(reports: &[JobReport], color: bool, quiet: bool) {
    if quiet || reports.is_empty() {
        return;
    }
    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{}", summary_table(reports, color));
    let _ = writeln!(
        stderr,
        "{} host(s): {} ok, {failed} failed",
        reports.len(),
        reports.len() - failed
    );
}

/// Rendered payloads from dry runs, each under an XML comment header.
pub fn print_payloads(reports: &[JobReport], quiet: bool) {
    if quiet {
        return;
    }
    let mut stderr = io::stderr().lock();
    for report in reports {
        if let Ok(Outcome::DryRun { payloads }) = &report.result {
            for (attribute, payload) in payloads {
                let _ = writeln!(stderr, "<!-- {}: {attribute} -->", report.host);
                let _ = writeln!(stderr, "{}", payload.trim_end());
            }
        }
    }
}

pub fn print_worker_stats(stats: &WorkerStats, quiet: bool) {
    if quiet {
        return;
    }
    eprintln!(
        "received {}, succeeded {}, failed {}, undecodable {}",
        stats.received, stats.succeeded, stats.failed, stats.undecodable
    );
}

/// One line per finished job, for long-running workers.
pub fn print_worker_report(report: &JobReport, quiet: bool) {
    if quiet {
        return;
    }
    let status = match &report.result {
        Ok(outcome) => match outcome {
            Outcome::Unchanged => "unchanged".to_owned(),
            Outcome::DryRun { .. } => "dry-run".to_owned(),
            Outcome::Applied { attributes } => format!("applied {}", attributes.join(", ")),
        },
        Err(e) => format!("{}: {e}", e.fault()),
    };
    eprintln!("{} {}", report.host, status);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use conftime_core::{
        ApplyMode, AttributeValue, ConnectionOptions, CoreError, DesiredState, Job,
    };

    use super::*;

    fn report(host: &str, result: Result<Outcome, CoreError>) -> JobReport {
        let job = Job::new(
            host,
            DesiredState::new(),
            ConnectionOptions::default(),
            ApplyMode::default(),
        );
        let now = Utc::now();
        JobReport {
            id: job.id,
            host: job.host,
            family: Some(DeviceFamily::Junos),
            result,
            started: now,
            finished: now,
        }
    }

    #[test]
    fn report_renders_as_host_keyed_document() {
        let mut attrs = AttributeMap::new();
        attrs.insert("hostname", AttributeValue::from("vsrx"));
        attrs.insert("ntp_servers", AttributeValue::from(vec!["10.0.2.1"]));
        let mut doc: IndexMap<&str, &AttributeMap> = IndexMap::new();
        doc.insert("vsrx", &attrs);

        let out = render(OutputFormat::JsonCompact, &doc).unwrap();
        assert_eq!(
            out,
            r#"{"vsrx":{"hostname":"vsrx","ntp_servers":["10.0.2.1"]}}"#
        );

        let yaml = render(OutputFormat::Yaml, &doc).unwrap();
        assert!(yaml.starts_with("vsrx:\n  hostname: vsrx\n"), "{yaml}");
    }

    #[test]
    fn summary_lists_every_host() {
        let reports = vec![
            report(
                "r1",
                Ok(Outcome::Applied {
                    attributes: vec!["hostname".into()],
                }),
            ),
            report(
                "r2",
                Err(CoreError::ConnectionFailed {
                    host: "r2".into(),
                    reason: "refused".into(),
                }),
            ),
        ];
        let table = summary_table(&reports, false);
        assert!(table.contains("HOST"));
        assert!(table.contains("applied"));
        assert!(table.contains("hostname"));
        assert!(table.contains("connection"));
        assert!(table.contains("refused"));
    }
}
