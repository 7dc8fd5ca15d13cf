//! Output formatting for cnf-netcheck.
//!
//! Provides terminal, JSON, and JUnit XML output formatters.
//!
//! # Graceful Degradation
//!
//! - Non-TTY output: color disabled via NO_COLOR or --no-color
//! - Empty reports: valid output with zero checks
//! - Checks without a result: rendered as not executed
//!
//! All formatters produce valid output for any ValidationReport input.

use crate::cli::args::OutputFormat;
use crate::engine::result::{ResultSummary, ValidationReport};
use crate::{Check, CheckCategory, CheckResult};
use serde::Serialize;

const RULE: &str =
    "--------------------------------------------------------------------------------";

const CATEGORIES: [(CheckCategory, &str, &str); 3] = [
    (CheckCategory::Connectivity, "CONNECTIVITY CHECKS", "connectivity"),
    (CheckCategory::Ports, "PORT CHECKS", "ports"),
    (CheckCategory::Services, "SERVICE CHECKS", "services"),
];

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format a validation report into a string
    fn format(&self, report: &ValidationReport) -> String;
}

/// Terminal (human-readable) formatter
pub struct TerminalFormatter {
    color: bool,
    verbose: bool,
    quiet: bool,
}

impl TerminalFormatter {
    pub fn new(color: bool, verbose: bool, quiet: bool) -> Self {
        TerminalFormatter {
            color,
            verbose,
            quiet,
        }
    }

    fn colorize(&self, text: &str, color_code: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", color_code, text)
        } else {
            text.to_string()
        }
    }

    fn status(&self, result: Option<&CheckResult>) -> String {
        match result {
            Some(CheckResult::Pass { .. }) => self.colorize("[PASS]", "32"),
            Some(CheckResult::Fail { .. }) => self.colorize("[FAIL]", "31"),
            Some(CheckResult::Skip { .. }) => self.colorize("[SKIP]", "33"),
            None => self.colorize("[----]", "90"),
        }
    }

    fn message(&self, result: Option<&CheckResult>) -> String {
        match result {
            Some(CheckResult::Pass { message, duration_ms }) if self.verbose => {
                format!("{} ({}ms)", message, duration_ms)
            }
            Some(CheckResult::Pass { message, .. }) => message.clone(),
            Some(CheckResult::Fail { message, details, duration_ms }) if self.verbose => {
                format!("{} - {} ({}ms)", message, details, duration_ms)
            }
            Some(CheckResult::Fail { message, .. }) => message.clone(),
            Some(CheckResult::Skip { reason }) => reason.clone(),
            None => "Not executed".to_string(),
        }
    }

    fn write_check(&self, output: &mut String, check: &Check) {
        output.push_str(&format!(
            "  {} {}: {} ({})\n",
            self.status(check.result.as_ref()),
            check.id,
            check.name,
            self.message(check.result.as_ref())
        ));

        if self.verbose {
            for line in &check.claims {
                output.push_str(&format!("      {}\n", self.colorize(line, "90")));
            }
        }
    }
}

impl OutputFormatter for TerminalFormatter {
    fn format(&self, report: &ValidationReport) -> String {
        let mut output = String::new();

        output.push_str(RULE);
        output.push_str("\ncnf-netcheck report\n");
        output.push_str(&format!("Source: {}\n", report.source));
        output.push_str(&format!("Timestamp: {}\n", format_timestamp(report.timestamp)));
        output.push_str(RULE);
        output.push_str("\n\n");

        if !report.discovery_errors.is_empty() {
            output.push_str(&format!("{}\n", self.colorize("DISCOVERY ERRORS", "31")));
            for line in &report.discovery_errors {
                output.push_str(&format!("  {}\n", line));
            }
            output.push('\n');
        }

        for (category, header, _) in CATEGORIES.iter() {
            let checks: Vec<&Check> = report
                .checks
                .iter()
                .filter(|c| c.category == *category)
                .filter(|c| !self.quiet || matches!(c.result, Some(CheckResult::Fail { .. })))
                .collect();

            if checks.is_empty() {
                continue;
            }

            output.push_str(&format!("{}\n", header));
            for check in checks {
                self.write_check(&mut output, check);
            }
            output.push('\n');
        }

        let summary = report.summary();
        output.push_str(RULE);
        output.push_str(&format!(
            "\nSUMMARY: {} passed, {} failed, {} skipped\n",
            summary.passed, summary.failed, summary.skipped
        ));
        output.push_str(&format!(
            "Total time: {:.1}s\n",
            report.total_duration_ms as f64 / 1000.0
        ));

        let (code, desc) = if summary.failed > 0 {
            (1, "failures detected")
        } else {
            (0, "no failures")
        };
        output.push_str(&format!("Exit code: {} ({})\n", code, desc));
        output.push_str(RULE);

        output
    }
}

/// JSON formatter
pub struct JsonFormatter {
    pretty: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    timestamp: String,
    source: &'a str,
    summary: ResultSummary,
    checks: &'a [Check],
    total_duration_ms: u64,
    discovery_errors: &'a [String],
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        JsonFormatter { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &ValidationReport) -> String {
        let doc = JsonReport {
            version: crate::version::VERSION,
            timestamp: format_timestamp(report.timestamp),
            source: &report.source,
            summary: report.summary(),
            checks: &report.checks,
            total_duration_ms: report.total_duration_ms,
            discovery_errors: &report.discovery_errors,
        };

        let rendered = if self.pretty {
            serde_json::to_string_pretty(&doc)
        } else {
            serde_json::to_string(&doc)
        };
        rendered.unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("failed to serialize report: {}", e) }).to_string()
        })
    }
}

/// JUnit XML formatter, one test suite per category
pub struct JunitFormatter;

impl JunitFormatter {
    pub fn new() -> Self {
        JunitFormatter
    }

    fn escape_xml(s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '&' => result.push_str("&amp;"),
                '<' => result.push_str("&lt;"),
                '>' => result.push_str("&gt;"),
                '"' => result.push_str("&quot;"),
                '\'' => result.push_str("&apos;"),
                c => result.push(c),
            }
        }
        result
    }

    fn system_out(check: &Check, lead: Option<&str>) -> String {
        let mut lines: Vec<&str> = Vec::with_capacity(check.claims.len() + 1);
        lines.extend(lead);
        lines.extend(check.claims.iter().map(String::as_str));
        if lines.is_empty() {
            return String::new();
        }
        format!(
            "      <system-out>{}</system-out>\n",
            Self::escape_xml(&lines.join("\n"))
        )
    }
}

impl Default for JunitFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_of(check: &Check) -> u64 {
    match &check.result {
        Some(CheckResult::Pass { duration_ms, .. }) | Some(CheckResult::Fail { duration_ms, .. }) => {
            *duration_ms
        }
        _ => 0,
    }
}

impl OutputFormatter for JunitFormatter {
    fn format(&self, report: &ValidationReport) -> String {
        let mut output = String::new();
        output.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        let summary = report.summary();
        output.push_str(&format!(
            "<testsuites name=\"cnf-netcheck\" tests=\"{}\" failures=\"{}\" errors=\"0\" skipped=\"{}\" time=\"{:.3}\">\n",
            summary.total,
            summary.failed,
            summary.skipped,
            report.total_duration_ms as f64 / 1000.0
        ));

        for (category, _, suite_name) in CATEGORIES.iter() {
            let checks: Vec<&Check> = report
                .checks
                .iter()
                .filter(|c| c.category == *category)
                .collect();

            if checks.is_empty() {
                continue;
            }

            let failures = checks
                .iter()
                .filter(|c| matches!(c.result, Some(CheckResult::Fail { .. })))
                .count();
            let skipped = checks
                .iter()
                .filter(|c| matches!(c.result, Some(CheckResult::Skip { .. })))
                .count();
            let suite_time: u64 = checks.iter().map(|c| duration_of(c)).sum();

            output.push_str(&format!(
                "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"0\" skipped=\"{}\" time=\"{:.3}\">\n",
                suite_name,
                checks.len(),
                failures,
                skipped,
                suite_time as f64 / 1000.0
            ));

            for check in checks {
                output.push_str(&format!(
                    "    <testcase name=\"{}\" classname=\"cnf-netcheck.{}\" time=\"{:.3}\"",
                    Self::escape_xml(&check.id),
                    suite_name,
                    duration_of(check) as f64 / 1000.0
                ));

                match &check.result {
                    Some(CheckResult::Pass { message, .. }) => {
                        output.push_str(">\n");
                        output.push_str(&Self::system_out(check, Some(message.as_str())));
                        output.push_str("    </testcase>\n");
                    }
                    Some(CheckResult::Fail { message, details, .. }) => {
                        output.push_str(">\n");
                        output.push_str(&format!(
                            "      <failure message=\"{}\">{}</failure>\n",
                            Self::escape_xml(message),
                            Self::escape_xml(details)
                        ));
                        output.push_str(&Self::system_out(check, None));
                        output.push_str("    </testcase>\n");
                    }
                    Some(CheckResult::Skip { reason }) => {
                        output.push_str(">\n");
                        output.push_str(&format!(
                            "      <skipped message=\"{}\" />\n",
                            Self::escape_xml(reason)
                        ));
                        output.push_str(&Self::system_out(check, None));
                        output.push_str("    </testcase>\n");
                    }
                    None => output.push_str(" />\n"),
                }
            }

            output.push_str("  </testsuite>\n");
        }

        output.push_str("</testsuites>");
        output
    }
}

/// Get a formatter based on the output format
pub fn get_formatter(
    format: OutputFormat,
    no_color: bool,
    verbose: bool,
    quiet: bool,
) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TerminalFormatter::new(!no_color, verbose, quiet)),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Junit => Box::new(JunitFormatter::new()),
    }
}

/// Format a Unix timestamp as ISO 8601 (UTC)
pub fn format_timestamp(timestamp: u64) -> String {
    let days = timestamp / 86_400;
    let time_of_day = timestamp % 86_400;

    let mut year = 1970;
    let mut remaining = days;
    loop {
        let len = if is_leap_year(year) { 366 } else { 365 };
        if remaining < len {
            break;
        }
        remaining -= len;
        year += 1;
    }

    let mut month = 1;
    while remaining >= days_in_month(year, month) {
        remaining -= days_in_month(year, month);
        month += 1;
    }

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        remaining + 1,
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60
    )
}

fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u64, month: u64) -> u64 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}
