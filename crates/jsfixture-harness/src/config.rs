//! TOML configuration for the fixture harness

use jsfixture_core::TimeZone;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{HarnessError, Result};
use crate::fixture::TestBlock;

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "jsfixture.toml";

/// Fixture harness configuration loaded from a TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Wall-clock budget per block in milliseconds
    pub timeout_ms: u64,

    /// Run OUTPUT-DISABLED blocks anyway (their output is never compared)
    pub execute_disabled: bool,

    /// Lines of context printed after the first diverging line
    pub context_lines: usize,

    /// Failure details kept by the aggregator; totals are always complete
    pub max_failures: usize,

    /// Emit `Uncaught (in promise)` lines for unobserved rejections
    pub report_unhandled_rejections: bool,

    /// Compare `[error] `-style expected lines without the level marker
    pub strip_level_prefixes: bool,

    /// Local time zone seen by sandboxed Date values
    pub timezone: TimeZoneConfig,

    /// Regex rewrites applied to both sides of an OUTPUT-FIXED comparison
    pub fixed_overrides: Vec<FixedOverride>,

    /// Restrict a run to matching blocks
    pub filter: BlockFilter,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            execute_disabled: false,
            context_lines: 3,
            max_failures: 500,
            report_unhandled_rejections: false,
            strip_level_prefixes: true,
            timezone: TimeZoneConfig::default(),
            fixed_overrides: Vec::new(),
            filter: BlockFilter::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeZoneConfig {
    /// Minutes east of UTC
    pub offset_minutes: i32,
    pub name: String,
}

impl Default for TimeZoneConfig {
    fn default() -> Self {
        Self {
            offset_minutes: 480,
            name: "China Standard Time".to_string(),
        }
    }
}

impl TimeZoneConfig {
    pub fn to_time_zone(&self) -> TimeZone {
        TimeZone::new(self.offset_minutes, self.name.clone())
    }
}

/// One `pattern` -> `replacement` rewrite, `regex` replacement syntax
#[derive(Debug, Clone, Deserialize)]
pub struct FixedOverride {
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
}

/// Block selection by `// Index:` number and/or label substring
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockFilter {
    pub index: Option<u64>,
    pub label: Option<String>,
}

impl BlockFilter {
    pub fn is_empty(&self) -> bool {
        self.index.is_none() && self.label.is_none()
    }

    pub fn matches(&self, block: &TestBlock) -> bool {
        if let Some(index) = self.index {
            if block.index != index {
                return false;
            }
        }
        match (&self.label, &block.label) {
            (Some(wanted), Some(label)) => label.contains(wanted.as_str()),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
            .map_err(|e| HarnessError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| HarnessError::Config(e.to_string()))
    }

    /// Try the given path, then `jsfixture.toml`, falling back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if !default_path.exists() {
                    return Self::default();
                }
                default_path
            }
        };
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "falling back to default harness config");
                Self::default()
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn time_zone(&self) -> TimeZone {
        self.timezone.to_time_zone()
    }
}
