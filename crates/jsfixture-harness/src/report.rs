//! Result aggregation and reporting

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;

use crate::compare::{ComparisonResult, Outcome};
use crate::fixture::OutputMode;

/// Per-file totals
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileReport {
    pub path: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Set when the file could not be read or parsed; no blocks ran
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl FileReport {
    pub fn from_results(path: &str, results: &[ComparisonResult], duration: Duration) -> Self {
        let mut report = Self {
            path: path.to_string(),
            total: results.len(),
            duration_ms: duration.as_millis() as u64,
            ..Self::default()
        };
        for result in results {
            match result.outcome {
                Outcome::Pass => report.passed += 1,
                Outcome::Fail => report.failed += 1,
                Outcome::Skipped => report.skipped += 1,
            }
        }
        report
    }

    pub fn errored(path: &str, error: String) -> Self {
        Self {
            path: path.to_string(),
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Everything needed to show one failing block
#[derive(Debug, Clone, Serialize)]
pub struct BlockFailure {
    pub file: String,
    pub index: u64,
    pub label: Option<String>,
    /// Line of the OUTPUT tag
    pub line: usize,
    pub mode: OutputMode,
    /// 0-based output line where the block first went wrong
    pub first_mismatch: usize,
    pub expected: Vec<String>,
    pub actual: Vec<String>,
    pub diagnostics: Vec<String>,
}

impl BlockFailure {
    pub fn from_result(file: &str, result: &ComparisonResult) -> Self {
        Self {
            file: file.to_string(),
            index: result.block.index,
            label: result.block.label.clone(),
            line: result.block.line,
            mode: result.block.mode,
            first_mismatch: result.first_mismatch.unwrap_or(0),
            expected: result.expected.clone(),
            actual: result.actual.clone(),
            diagnostics: result.diagnostics.clone(),
        }
    }

    fn title(&self) -> String {
        let name = match &self.label {
            Some(label) => format!("Index {} ({})", self.index, label),
            None => format!("Index {}", self.index),
        };
        format!("{}:{} {} [{}]", self.file, self.line, name, self.mode)
    }

    /// Plain-text description: the first diverging line and up to
    /// `context_lines` lines after it, expected against actual
    pub fn render(&self, context_lines: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title());
        let _ = writeln!(out, "  first difference at output line {}", self.first_mismatch + 1);
        let last = (self.first_mismatch + context_lines).min(self.expected.len().max(self.actual.len()).max(1) - 1);
        for line in self.first_mismatch..=last.max(self.first_mismatch) {
            let _ = writeln!(out, "  {:>4} - expected: {}", line + 1, show(self.expected.get(line)));
            let _ = writeln!(out, "  {:>4} + actual:   {}", line + 1, show(self.actual.get(line)));
        }
        for diagnostic in &self.diagnostics {
            let _ = writeln!(out, "  note: {diagnostic}");
        }
        out
    }
}

fn show(line: Option<&String>) -> &str {
    line.map(String::as_str).unwrap_or("<missing>")
}

/// Whole-run report
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub timestamp: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Files that could not be read or parsed
    pub file_errors: usize,
    /// Pass rate as percentage, skipped blocks excluded
    pub pass_rate: f64,
    pub files: Vec<FileReport>,
    /// Failure details, capped at the configured maximum
    pub failures: Vec<BlockFailure>,
    /// Failures counted but not detailed because of the cap
    pub omitted_failures: usize,
}

impl SuiteReport {
    /// Print a summary to stdout
    pub fn print_summary(&self, context_lines: usize) {
        println!("\n{}", "=== Fixture Results ===".bold());
        println!("Total:   {}", self.total);
        println!(
            "Passed:  {} ({:.1}%)",
            self.passed.to_string().green(),
            self.pass_rate
        );
        println!("Failed:  {}", self.failed.to_string().red());
        println!("Skipped: {}", self.skipped.to_string().yellow());
        if self.file_errors > 0 {
            println!("File errors: {}", self.file_errors.to_string().red());
            for file in self.files.iter().filter(|f| f.error.is_some()) {
                println!("  {} - {}", file.path, file.error.as_deref().unwrap_or_default());
            }
        }

        if !self.failures.is_empty() {
            println!("\n{}", "=== Failures ===".red().bold());
            for failure in &self.failures {
                print!("{}", failure.render(context_lines));
            }
            if self.omitted_failures > 0 {
                println!("  ... and {} more", self.omitted_failures);
            }
        }
    }

    /// Export to JSON
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Collects per-block results across files
#[derive(Debug)]
pub struct Aggregator {
    max_failures: usize,
    files: Vec<FileReport>,
    failures: Vec<BlockFailure>,
    omitted_failures: usize,
}

impl Aggregator {
    pub fn new(max_failures: usize) -> Self {
        Self {
            max_failures,
            files: Vec::new(),
            failures: Vec::new(),
            omitted_failures: 0,
        }
    }

    pub fn add_file(&mut self, path: &str, results: &[ComparisonResult], duration: Duration) {
        let report = FileReport::from_results(path, results, duration);
        tracing::info!(
            file = path,
            passed = report.passed,
            failed = report.failed,
            skipped = report.skipped,
            "finished fixture file"
        );
        for result in results.iter().filter(|r| r.outcome == Outcome::Fail) {
            if self.failures.len() < self.max_failures {
                self.failures.push(BlockFailure::from_result(path, result));
            } else {
                self.omitted_failures += 1;
            }
        }
        self.files.push(report);
    }

    pub fn add_file_error(&mut self, path: &str, error: String) {
        tracing::info!(file = path, error = %error, "fixture file not run");
        self.files.push(FileReport::errored(path, error));
    }

    pub fn finish(self) -> SuiteReport {
        let mut report = SuiteReport {
            timestamp: Utc::now(),
            total: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            file_errors: 0,
            pass_rate: 0.0,
            files: Vec::new(),
            failures: self.failures,
            omitted_failures: self.omitted_failures,
        };
        for file in &self.files {
            report.total += file.total;
            report.passed += file.passed;
            report.failed += file.failed;
            report.skipped += file.skipped;
            if file.error.is_some() {
                report.file_errors += 1;
            }
        }
        report.files = self.files;

        // Calculate pass rate (excluding skipped)
        let run_count = report.passed + report.failed;
        if run_count > 0 {
            report.pass_rate = (report.passed as f64 / run_count as f64) * 100.0;
        }
        report
    }
}
