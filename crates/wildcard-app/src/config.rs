// Configuration loading and parsing (squad.toml, strategy.toml).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use wildcard_core::refinement::OwnershipBand;
use wildcard_core::{
    ConstraintSet, IlpSelector, Optimizer, OwnershipBands, OwnershipLimits,
    Position, RefinementPolicy,
};
use wildcard_fpl::{PoolFilter, WeightedMetricScoring};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub constraints: ConstraintSet,
    pub solver_timeout: Duration,
    /// `None` when mini-league mode is off.
    pub ownership_limits: Option<OwnershipLimits>,
    /// `None` when refinement is off.
    pub refinement: Option<RefinementPolicy>,
    pub report_path: Option<PathBuf>,
    pub source: SourceConfig,
    pub pool_filter: PoolFilter,
    pub scoring: WeightedMetricScoring,
}

impl Config {
    /// The optimizer these settings describe.
    pub fn optimizer(&self) -> Optimizer {
        let mut selector = IlpSelector::new().with_timeout(self.solver_timeout);
        if let Some(limits) = &self.ownership_limits {
            selector = selector.with_ownership_limits(limits.clone());
        }
        let mut optimizer = Optimizer::new(self.constraints.clone()).with_selector(selector);
        if let Some(policy) = &self.refinement {
            optimizer = optimizer.with_refinement(policy.clone());
        }
        optimizer
    }
}

// ---------------------------------------------------------------------------
// squad.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire squad.toml file.
#[derive(Debug, Clone, Deserialize)]
struct SquadFile {
    constraints: ConstraintSet,
    solver: SolverSection,
    #[serde(default)]
    mini_league: MiniLeagueSection,
    #[serde(default)]
    refinement: RefinementSection,
    #[serde(default)]
    report: ReportSection,
}

#[derive(Debug, Clone, Deserialize)]
struct SolverSection {
    timeout_secs: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct MiniLeagueSection {
    #[serde(default)]
    enabled: bool,
    #[serde(flatten)]
    limits: OwnershipLimits,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RefinementSection {
    enabled: bool,
    min_improvement: f64,
    max_swaps: usize,
    position_priority: Vec<Position>,
    enforce_club_cap: bool,
    ownership_bands: Vec<OwnershipBand>,
    above_multiplier: f64,
}

impl Default for RefinementSection {
    fn default() -> Self {
        let policy = RefinementPolicy::default();
        RefinementSection {
            enabled: true,
            min_improvement: policy.min_improvement,
            max_swaps: policy.max_swaps,
            position_priority: policy.position_priority,
            enforce_club_cap: policy.enforce_club_cap,
            ownership_bands: policy.bands.bands,
            above_multiplier: policy.bands.above_multiplier,
        }
    }
}

impl RefinementSection {
    fn into_policy(self) -> Option<RefinementPolicy> {
        if !self.enabled {
            return None;
        }
        Some(RefinementPolicy {
            bands: OwnershipBands {
                bands: self.ownership_bands,
                above_multiplier: self.above_multiplier,
            },
            min_improvement: self.min_improvement,
            max_swaps: self.max_swaps,
            position_priority: self.position_priority,
            enforce_club_cap: self.enforce_club_cap,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ReportSection {
    #[serde(default)]
    output_path: String,
}

// ---------------------------------------------------------------------------
// strategy.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire strategy.toml file.
#[derive(Debug, Clone, Deserialize)]
struct StrategyFile {
    source: SourceConfig,
    #[serde(default)]
    pool_filter: PoolFilter,
    scoring: BTreeMap<Position, BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Fpl,
    Csv,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: f64,
    #[serde(default)]
    pub csv_path: String,
}

fn default_base_url() -> String {
    wildcard_fpl::DEFAULT_BASE_URL.to_string()
}

fn default_source_timeout() -> f64 {
    wildcard_fpl::DEFAULT_TIMEOUT.as_secs_f64()
}

impl SourceConfig {
    /// Out-of-range values fall back to the client default; loading
    /// rejects them before a `Config` exists.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(wildcard_fpl::DEFAULT_TIMEOUT)
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/squad.toml` and
/// `config/strategy.toml`, relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- squad.toml (required) ---
    let squad_path = config_dir.join("squad.toml");
    let squad_text = read_file(&squad_path)?;
    let squad_file: SquadFile =
        toml::from_str(&squad_text).map_err(|e| ConfigError::ParseError {
            path: squad_path.clone(),
            source: e,
        })?;

    // --- strategy.toml (required) ---
    let strategy_path = config_dir.join("strategy.toml");
    let strategy_text = read_file(&strategy_path)?;
    let strategy_file: StrategyFile =
        toml::from_str(&strategy_text).map_err(|e| ConfigError::ParseError {
            path: strategy_path.clone(),
            source: e,
        })?;

    validate_squad(&squad_file)?;
    validate_source(&strategy_file.source)?;

    let scoring = WeightedMetricScoring::from_names(&strategy_file.scoring).map_err(|e| {
        ConfigError::ValidationError {
            field: "scoring".into(),
            message: e.to_string(),
        }
    })?;

    let solver_timeout =
        timeout_from_secs("solver.timeout_secs", squad_file.solver.timeout_secs)?;
    let ownership_limits = squad_file
        .mini_league
        .enabled
        .then_some(squad_file.mini_league.limits);
    let report_path = Some(squad_file.report.output_path.trim())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);

    Ok(Config {
        constraints: squad_file.constraints,
        solver_timeout,
        ownership_limits,
        refinement: squad_file.refinement.into_policy(),
        report_path,
        source: strategy_file.source,
        pool_filter: strategy_file.pool_filter,
        scoring,
    })
}

/// Seed `config/` from the shipped `defaults/`.
///
/// Every regular file in `defaults/` except `*.example` templates is copied
/// unless `config/` already has a file of that name. User edits are never
/// overwritten. Returns the paths written. A tree without `defaults/` is
/// fine as long as `config/` exists.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        return if config_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run wildcard from the directory holding them",
                    base_dir.display()
                ),
            })
        };
    }

    let copy_error = |what: &str, path: &Path, e: std::io::Error| ConfigError::DefaultsCopyError {
        message: format!("{what} {}: {e}", path.display()),
    };

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error("cannot create", &config_dir, e))?;

    let mut sources: Vec<PathBuf> = std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_error("cannot list", &defaults_dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| path.extension().map_or(true, |ext| ext != "example"))
        .collect();
    sources.sort();

    let mut copied = Vec::new();
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        // `create_new` makes the existence check and the create one step.
        let mut dest = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(copy_error("cannot create", &target, e)),
        };
        let mut src =
            std::fs::File::open(&source).map_err(|e| copy_error("cannot read", &source, e))?;
        std::io::copy(&mut src, &mut dest).map_err(|e| copy_error("cannot write", &target, e))?;
        info!("Copied default {}", target.display());
        copied.push(target);
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A positive number of seconds that fits in a `Duration`.
fn timeout_from_secs(field: &str, secs: f64) -> Result<Duration, ConfigError> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(invalid(field, format!("must be > 0, got {secs}")));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| invalid(field, format!("{e}, got {secs}")))
}

fn validate_squad(file: &SquadFile) -> Result<(), ConfigError> {
    file.constraints
        .validate()
        .map_err(|e| invalid("constraints", e.to_string()))?;

    timeout_from_secs("solver.timeout_secs", file.solver.timeout_secs)?;

    let limits = &file.mini_league.limits;
    for (name, val) in [
        ("mini_league.differential_threshold", limits.differential_threshold),
        ("mini_league.template_threshold", limits.template_threshold),
    ] {
        if !(0.0..=100.0).contains(&val) {
            return Err(invalid(
                name,
                format!("must be between 0 and 100 inclusive, got {val}"),
            ));
        }
    }
    if limits.min_differentials > file.constraints.squad_size {
        return Err(invalid(
            "mini_league.min_differentials",
            format!(
                "cannot exceed squad_size ({}), got {}",
                file.constraints.squad_size, limits.min_differentials
            ),
        ));
    }

    if let Some(policy) = file.refinement.clone().into_policy() {
        policy
            .validate()
            .map_err(|e| invalid("refinement", e.to_string()))?;
    }

    Ok(())
}

fn validate_source(source: &SourceConfig) -> Result<(), ConfigError> {
    timeout_from_secs("source.timeout_secs", source.timeout_secs)?;
    match source.kind {
        SourceKind::Fpl if source.base_url.trim().is_empty() => {
            Err(invalid("source.base_url", "required when kind = \"fpl\""))
        }
        SourceKind::Csv if source.csv_path.trim().is_empty() => {
            Err(invalid("source.csv_path", "required when kind = \"csv\""))
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
