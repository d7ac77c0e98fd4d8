//! Configuration loading and typed config structures for the simulation.
//!
//! Baselines, bounds, and critical thresholds are product content, not
//! engine invariants, so they are injected here rather than hardcoded. The
//! canonical file is `crisou-config.yaml` at the project root; every section
//! has built-in defaults so the file (or any part of it) may be omitted.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but violates a structural rule.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Run length, input bounds, and model call limits.
    #[serde(default)]
    pub simulation: SimulationBounds,

    /// Resource catalogue keyed by resource name.
    #[serde(default = "default_resources")]
    pub resources: BTreeMap<String, QuantitySpec>,

    /// Status catalogue keyed by status category.
    #[serde(default = "default_status")]
    pub status: BTreeMap<String, QuantitySpec>,

    /// Baseline adjustments keyed by vulnerability tag.
    #[serde(default = "default_vulnerabilities")]
    pub vulnerabilities: BTreeMap<String, Adjustment>,

    /// Baseline adjustments keyed by a keyword matched against the location.
    #[serde(default = "default_locations")]
    pub locations: BTreeMap<String, Adjustment>,

    /// Household-size effects on the baseline.
    #[serde(default)]
    pub household: HouseholdConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationBounds::default(),
            resources: default_resources(),
            status: default_status(),
            vulnerabilities: default_vulnerabilities(),
            locations: default_locations(),
            household: HouseholdConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a structural rule is violated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] or [`ConfigError::Invalid`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check structural rules the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.max_days < 2 {
            return Err(ConfigError::Invalid(format!(
                "simulation.max_days must be at least 2 (got {})",
                self.simulation.max_days
            )));
        }
        if self.simulation.max_decision_chars == 0 {
            return Err(ConfigError::Invalid(
                "simulation.max_decision_chars must be positive".to_owned(),
            ));
        }
        if self.resources.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one resource must be configured".to_owned(),
            ));
        }
        for (section, catalogue) in [("resources", &self.resources), ("status", &self.status)] {
            for (name, spec) in catalogue {
                if spec.baseline > spec.max {
                    return Err(ConfigError::Invalid(format!(
                        "{section}.{name}: baseline {} exceeds max {}",
                        spec.baseline, spec.max
                    )));
                }
                if let Some(floor) = spec.critical_below
                    && floor > spec.max
                {
                    return Err(ConfigError::Invalid(format!(
                        "{section}.{name}: critical_below {floor} exceeds max {}",
                        spec.max
                    )));
                }
            }
        }
        Ok(())
    }

    /// Deadline for a single language model call.
    pub const fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.simulation.model_timeout_ms)
    }
}

/// Run length and input limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationBounds {
    /// Number of days that take a decision; the run ends with `days_elapsed`
    /// after the last of them.
    #[serde(default = "default_max_days")]
    pub max_days: u32,

    /// Longest decision text accepted, in characters.
    #[serde(default = "default_max_decision_chars")]
    pub max_decision_chars: usize,

    /// How many recent narrative entries are sent with each decision.
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Milliseconds allowed for one language model call.
    #[serde(default = "default_model_timeout_ms")]
    pub model_timeout_ms: u64,
}

impl Default for SimulationBounds {
    fn default() -> Self {
        Self {
            max_days: default_max_days(),
            max_decision_chars: default_max_decision_chars(),
            context_window: default_context_window(),
            model_timeout_ms: default_model_timeout_ms(),
        }
    }
}

/// Bounds and thresholds for one resource or status category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuantitySpec {
    /// Starting value before profile adjustments.
    pub baseline: u32,

    /// Inclusive upper bound. Values are clamped into `0..=max`.
    #[serde(default = "default_status_max")]
    pub max: u32,

    /// The run ends when the value drops strictly below this floor.
    #[serde(default)]
    pub critical_below: Option<u32>,

    /// Multiply `critical_below` by the household size.
    #[serde(default)]
    pub per_member: bool,
}

impl QuantitySpec {
    const fn new(baseline: u32, max: u32, critical_below: Option<u32>, per_member: bool) -> Self {
        Self {
            baseline,
            max,
            critical_below,
            per_member,
        }
    }

    /// The effective critical floor for a household of the given size.
    pub fn critical_floor(&self, household_size: u32) -> Option<u32> {
        self.critical_below.map(|floor| {
            if self.per_member {
                floor.saturating_mul(household_size.max(1)).min(self.max)
            } else {
                floor
            }
        })
    }
}

/// Signed baseline changes contributed by a vulnerability or location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Adjustment {
    /// Resource name to signed change.
    #[serde(default)]
    pub resources: BTreeMap<String, i64>,

    /// Status category to signed change.
    #[serde(default)]
    pub status: BTreeMap<String, i64>,
}

/// Household-size effects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HouseholdConfig {
    /// Resource name to amount removed from the baseline per additional member.
    #[serde(default = "default_per_member_consumption")]
    pub per_member_consumption: BTreeMap<String, u32>,
}

impl Default for HouseholdConfig {
    fn default() -> Self {
        Self {
            per_member_consumption: default_per_member_consumption(),
        }
    }
}

const fn default_max_days() -> u32 {
    10
}

const fn default_max_decision_chars() -> usize {
    1000
}

const fn default_context_window() -> usize {
    3
}

const fn default_model_timeout_ms() -> u64 {
    30_000
}

const fn default_status_max() -> u32 {
    100
}

fn default_resources() -> BTreeMap<String, QuantitySpec> {
    BTreeMap::from([
        ("water".to_owned(), QuantitySpec::new(40, 200, Some(2), true)),
        ("food".to_owned(), QuantitySpec::new(40, 200, Some(2), true)),
        ("medical_supplies".to_owned(), QuantitySpec::new(10, 50, None, false)),
        ("money".to_owned(), QuantitySpec::new(300, 10_000, None, false)),
    ])
}

fn default_status() -> BTreeMap<String, QuantitySpec> {
    BTreeMap::from([
        ("health".to_owned(), QuantitySpec::new(100, 100, Some(15), false)),
        ("morale".to_owned(), QuantitySpec::new(75, 100, Some(10), false)),
        ("shelter".to_owned(), QuantitySpec::new(90, 100, None, false)),
        ("safety".to_owned(), QuantitySpec::new(85, 100, Some(10), false)),
    ])
}

fn adjustment(resources: &[(&str, i64)], status: &[(&str, i64)]) -> Adjustment {
    Adjustment {
        resources: resources
            .iter()
            .map(|&(name, change)| (name.to_owned(), change))
            .collect(),
        status: status
            .iter()
            .map(|&(name, change)| (name.to_owned(), change))
            .collect(),
    }
}

fn default_vulnerabilities() -> BTreeMap<String, Adjustment> {
    BTreeMap::from([
        (
            "flood-prone".to_owned(),
            adjustment(&[("water", -4)], &[("shelter", -20), ("safety", -10)]),
        ),
        (
            "chronic-illness".to_owned(),
            adjustment(&[("medical_supplies", 5)], &[("health", -20)]),
        ),
        ("limited-mobility".to_owned(), adjustment(&[], &[("safety", -15)])),
        ("limited-savings".to_owned(), adjustment(&[("money", -200)], &[])),
        ("young-children".to_owned(), adjustment(&[], &[("morale", -10)])),
        ("elderly".to_owned(), adjustment(&[], &[("health", -10)])),
    ])
}

fn default_locations() -> BTreeMap<String, Adjustment> {
    BTreeMap::from([
        (
            "coastal".to_owned(),
            adjustment(&[("water", -6)], &[("safety", -10)]),
        ),
        ("river".to_owned(), adjustment(&[], &[("shelter", -10)])),
        (
            "mountain".to_owned(),
            adjustment(&[("food", -4)], &[("safety", -5)]),
        ),
        (
            "city".to_owned(),
            adjustment(&[("money", 100)], &[("morale", -5)]),
        ),
        (
            "rural".to_owned(),
            adjustment(&[("food", 6), ("money", -50)], &[]),
        ),
    ])
}

fn default_per_member_consumption() -> BTreeMap<String, u32> {
    BTreeMap::from([("water".to_owned(), 6), ("food".to_owned(), 6)])
}
