//! Fixture runner: parse, execute, compare, aggregate

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::compare::{Comparator, ComparisonResult};
use crate::config::HarnessConfig;
use crate::error::{ParseError, Result};
use crate::fixture::{OutputMode, SourceFile, TestBlock};
use crate::report::{Aggregator, SuiteReport};
use crate::sandbox::{EngineFactory, Sandbox};

/// Results of every selected block in one file
#[derive(Debug, Clone)]
pub struct FileRun {
    pub path: String,
    pub results: Vec<ComparisonResult>,
    pub duration: Duration,
}

/// Runs fixture files against engines built by `F`
pub struct FixtureRunner<F> {
    factory: F,
    sandbox: Sandbox,
    comparator: Comparator,
    config: HarnessConfig,
}

impl<F: EngineFactory> FixtureRunner<F> {
    pub fn new(factory: F, config: HarnessConfig) -> Result<Self> {
        Ok(Self {
            factory,
            sandbox: Sandbox::from_config(&config),
            comparator: Comparator::from_config(&config)?,
            config,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one block in a fresh sandbox and compare its output
    pub fn run_block(&self, block: &Arc<TestBlock>) -> ComparisonResult {
        if block.mode == OutputMode::Disabled && !self.config.execute_disabled {
            tracing::debug!(index = block.index, "skipping disabled block");
            return self.comparator.skipped(block, Vec::new());
        }

        let execution = self.sandbox.run(&self.factory, &block.code);
        tracing::debug!(
            index = block.index,
            lines = execution.lines.len(),
            status = ?execution.status,
            elapsed_ms = execution.duration.as_millis() as u64,
            "block executed"
        );
        self.comparator.compare(block, &execution.lines)
    }

    /// Run the blocks of an already parsed file that pass the configured filter
    pub fn run_source(&self, file: &SourceFile) -> FileRun {
        let start = Instant::now();
        let filter = &self.config.filter;
        if !filter.is_empty() {
            tracing::debug!(
                file = %file.path.display(),
                index = ?filter.index,
                label = ?filter.label,
                "applying block filter"
            );
        }
        let results = file
            .blocks
            .iter()
            .filter(|block| filter.matches(block))
            .map(|block| self.run_block(block))
            .collect();
        FileRun {
            path: file.display_path(),
            results,
            duration: start.elapsed(),
        }
    }

    /// Parse fixture text and run it
    pub fn run_text(&self, path: impl Into<PathBuf>, text: &str) -> std::result::Result<FileRun, ParseError> {
        let file = SourceFile::parse(path, text)?;
        Ok(self.run_source(&file))
    }

    /// Load, parse and run one fixture file
    pub fn run_file(&self, path: &Path) -> Result<FileRun> {
        let file = SourceFile::load(path)?;
        Ok(self.run_source(&file))
    }

    /// Run every file. A file that cannot be read or parsed is reported
    /// and skipped; the remaining files still run.
    pub fn run_files<P: AsRef<Path>>(&self, paths: &[P]) -> SuiteReport {
        let mut aggregator = Aggregator::new(self.config.max_failures);
        for path in paths {
            let path = path.as_ref();
            match self.run_file(path) {
                Ok(run) => aggregator.add_file(&run.path, &run.results, run.duration),
                Err(e) => {
                    tracing::warn!(error = %e, "fixture file aborted");
                    aggregator.add_file_error(&path.display().to_string(), e.to_string());
                }
            }
        }
        aggregator.finish()
    }

    /// Failure details with `context_lines` from the config
    pub fn render_failures(&self, report: &SuiteReport) -> Vec<String> {
        report
            .failures
            .iter()
            .map(|failure| failure.render(self.config.context_lines))
            .collect()
    }

    /// Print the summary of a report this runner produced
    pub fn print_summary(&self, report: &SuiteReport) {
        report.print_summary(self.config.context_lines);
    }
}
