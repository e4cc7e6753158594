//! Comparator
//!
//! Lines are compared one-to-one after flattening the captured output:
//! multi-line log text is split on `\n`, and leading and trailing blank
//! lines are dropped on both sides, the same way recorded output was
//! trimmed when the fixtures were written.

use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::fixture::{OutputMode, TestBlock};
use crate::sandbox::{CapturedLine, LineKind};

/// DevTools level markers some fixtures keep in front of console.warn/error output
const LEVEL_PREFIXES: &[&str] = &["[error] ", "[warn] ", "[info] ", "[debug] "];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skipped,
}

/// One differing output position, 0-based
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineDiff {
    pub line: usize,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Verdict for one block
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub block: Arc<TestBlock>,
    pub outcome: Outcome,
    /// First output line that differs or could not be trusted
    pub first_mismatch: Option<usize>,
    pub diff_lines: Vec<LineDiff>,
    /// Expected lines as compared (after prefix stripping and overrides)
    pub expected: Vec<String>,
    /// Actual lines as compared
    pub actual: Vec<String>,
    /// Timeout, panic and unprintable notes that forced a failure
    pub diagnostics: Vec<String>,
}

impl ComparisonResult {
    pub fn is_pass(&self) -> bool {
        self.outcome == Outcome::Pass
    }
}

#[derive(Debug, Clone)]
struct LineOverride {
    regex: Regex,
    replacement: String,
}

/// Compares captured output to a block's expected text
#[derive(Debug, Clone)]
pub struct Comparator {
    overrides: Vec<LineOverride>,
    strip_level_prefixes: bool,
}

impl Default for Comparator {
    fn default() -> Self {
        Self {
            overrides: Vec::new(),
            strip_level_prefixes: true,
        }
    }
}

impl Comparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        let mut comparator = Self::new().strip_level_prefixes(config.strip_level_prefixes);
        for rule in &config.fixed_overrides {
            comparator = comparator.with_override(&rule.pattern, &rule.replacement)?;
        }
        Ok(comparator)
    }

    /// Add a rewrite applied to both sides of OUTPUT-FIXED comparisons
    pub fn with_override(mut self, pattern: &str, replacement: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| HarnessError::InvalidOverride {
            pattern: pattern.to_string(),
            source,
        })?;
        self.overrides.push(LineOverride {
            regex,
            replacement: replacement.to_string(),
        });
        Ok(self)
    }

    pub fn strip_level_prefixes(mut self, strip: bool) -> Self {
        self.strip_level_prefixes = strip;
        self
    }

    pub fn compare(&self, block: &Arc<TestBlock>, captured: &[CapturedLine]) -> ComparisonResult {
        let flat = flatten(captured);
        if block.mode == OutputMode::Disabled {
            return self.skipped(block, flat.lines);
        }

        let fixed = block.mode == OutputMode::Fixed;
        let expected: Vec<String> = block
            .expected
            .iter()
            .map(|line| self.normalize_expected(line, fixed))
            .collect();
        let actual: Vec<String> = flat
            .lines
            .into_iter()
            .map(|line| self.normalize_actual(line, fixed))
            .collect();

        let mut diff_lines = Vec::new();
        for line in 0..expected.len().max(actual.len()) {
            let (want, got) = (expected.get(line), actual.get(line));
            if want != got {
                diff_lines.push(LineDiff {
                    line,
                    expected: want.cloned(),
                    actual: got.cloned(),
                });
            }
        }

        let first_diff = diff_lines.first().map(|diff| diff.line);
        let first_mismatch = match (first_diff, flat.first_forced) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let outcome = if first_mismatch.is_none() {
            Outcome::Pass
        } else {
            Outcome::Fail
        };

        ComparisonResult {
            block: Arc::clone(block),
            outcome,
            first_mismatch,
            diff_lines,
            expected,
            actual,
            diagnostics: flat.diagnostics,
        }
    }

    /// Result for a block whose output is never compared
    pub fn skipped(&self, block: &Arc<TestBlock>, actual: Vec<String>) -> ComparisonResult {
        ComparisonResult {
            block: Arc::clone(block),
            outcome: Outcome::Skipped,
            first_mismatch: None,
            diff_lines: Vec::new(),
            expected: block.expected.clone(),
            actual,
            diagnostics: Vec::new(),
        }
    }

    fn normalize_expected(&self, line: &str, fixed: bool) -> String {
        let line = if self.strip_level_prefixes {
            strip_level_prefix(line)
        } else {
            line
        };
        if fixed {
            self.apply_overrides(line)
        } else {
            line.to_string()
        }
    }

    fn normalize_actual(&self, line: String, fixed: bool) -> String {
        if fixed {
            self.apply_overrides(&line)
        } else {
            line
        }
    }

    fn apply_overrides(&self, line: &str) -> String {
        let mut text = line.to_string();
        for rule in &self.overrides {
            text = rule
                .regex
                .replace_all(&text, rule.replacement.as_str())
                .into_owned();
        }
        text
    }
}

fn strip_level_prefix(line: &str) -> &str {
    LEVEL_PREFIXES
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
        .unwrap_or(line)
}

struct Flattened {
    lines: Vec<String>,
    first_forced: Option<usize>,
    diagnostics: Vec<String>,
}

fn flatten(captured: &[CapturedLine]) -> Flattened {
    let mut lines: Vec<(String, bool)> = Vec::new();
    let mut diagnostics = Vec::new();
    for line in captured {
        let forced = line.forces_failure();
        if line.kind == LineKind::Diagnostic {
            diagnostics.push(line.text.clone());
        } else if line.unprintable {
            diagnostics.push(format!("unprintable value in: {}", line.text));
        }
        for part in line.text.split('\n') {
            lines.push((part.to_string(), forced));
        }
    }

    while lines.last().is_some_and(|(text, _)| text.trim().is_empty()) {
        lines.pop();
    }
    let leading = lines
        .iter()
        .take_while(|(text, _)| text.trim().is_empty())
        .count();
    lines.drain(..leading);

    let first_forced = lines.iter().position(|(_, forced)| *forced);
    Flattened {
        lines: lines.into_iter().map(|(text, _)| text).collect(),
        first_forced,
        diagnostics,
    }
}
