use std::{
    env,
    error::Error,
    fmt, fs, io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;

use crate::{scheduler::SchedulerConfig, session::Hyperparameters, SchedulerError};

pub const CONFIG_VAR: &str = "PLAYGROUND_CONFIG";
pub const EPOCHS_VAR: &str = "PLAYGROUND_EPOCHS";
pub const HIDDEN_UNITS_VAR: &str = "PLAYGROUND_HIDDEN_UNITS";
pub const LEARNING_RATE_VAR: &str = "PLAYGROUND_LEARNING_RATE";
pub const SEED_VAR: &str = "PLAYGROUND_SEED";
pub const PARALLEL_VAR: &str = "PLAYGROUND_PARALLEL";
pub const SNAPSHOTS_VAR: &str = "PLAYGROUND_SNAPSHOTS";

/// Largest accepted canvas width or height, in pixels.
pub const MAX_CANVAS_SIDE: usize = 4096;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse(serde_json::Error),
    InvalidVar { name: &'static str, value: String },
    EmptyCanvas,
    CanvasTooLarge { width: usize, height: usize },
    Hyperparameters(SchedulerError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {}: {source}", path.display()),
            Self::Parse(e) => write!(f, "malformed config: {e}"),
            Self::InvalidVar { name, value } => write!(f, "invalid value for {name}: {value:?}"),
            Self::EmptyCanvas => write!(f, "canvas width and height must be positive"),
            Self::CanvasTooLarge { width, height } => write!(
                f,
                "canvas {width}x{height} is too large, each side must be at most {MAX_CANVAS_SIDE}"
            ),
            Self::Hyperparameters(e) => write!(f, "{e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
            Self::Hyperparameters(e) => Some(e),
            Self::InvalidVar { .. } | Self::EmptyCanvas | Self::CanvasTooLarge { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

impl From<SchedulerError> for ConfigError {
    fn from(e: SchedulerError) -> Self {
        Self::Hyperparameters(e)
    }
}

/// Settings of the headless playground host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    /// Canvas width in pixels.
    pub width: usize,
    /// Canvas height in pixels.
    pub height: usize,
    pub hyperparameters: Hyperparameters,
    pub chunk_size: NonZeroUsize,
    /// Train on a worker thread when possible.
    pub parallel: bool,
    /// Makes model initialisation reproducible.
    pub seed: Option<u64>,
    /// Where a PPM snapshot is written on every refresh.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 400,
            hyperparameters: Hyperparameters::default(),
            chunk_size: SchedulerConfig::DEFAULT_CHUNK_SIZE,
            parallel: true,
            seed: None,
            snapshot_dir: None,
        }
    }
}

impl PlaygroundConfig {
    /// Loads the config the way the host binary does: the JSON file at
    /// `path` (or at `$PLAYGROUND_CONFIG`), then the environment overrides.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed, a variable
    /// does not parse, or the result is out of range.
    pub fn from_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_var = env::var_os(CONFIG_VAR).map(PathBuf::from);
        let mut config = Self::load(path.or(from_var.as_deref()))?;
        config.apply_env(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file; every field is optional. Without a path the
    /// defaults are returned.
    ///
    /// # Errors
    /// Returns `ConfigError::Io` or `ConfigError::Parse`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overrides fields from variables found through `lookup`.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidVar` for the first value that does not parse.
    pub fn apply_env<L>(&mut self, lookup: L) -> Result<(), ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        if let Some(epochs) = parse_var(&lookup, EPOCHS_VAR)? {
            self.hyperparameters.epochs = epochs;
        }
        if let Some(hidden_units) = parse_var(&lookup, HIDDEN_UNITS_VAR)? {
            self.hyperparameters.hidden_units = hidden_units;
        }
        if let Some(learning_rate) = parse_var(&lookup, LEARNING_RATE_VAR)? {
            self.hyperparameters.learning_rate = learning_rate;
        }
        if let Some(seed) = parse_var(&lookup, SEED_VAR)? {
            self.seed = Some(seed);
        }
        if let Some(parallel) = parse_var(&lookup, PARALLEL_VAR)? {
            self.parallel = parallel;
        }
        if let Some(dir) = lookup(SNAPSHOTS_VAR).filter(|dir| !dir.is_empty()) {
            self.snapshot_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// # Errors
    /// Returns `ConfigError::EmptyCanvas` or `ConfigError::CanvasTooLarge` for
    /// an unusable canvas and `ConfigError::Hyperparameters` otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyCanvas);
        }
        if self.width > MAX_CANVAS_SIDE || self.height > MAX_CANVAS_SIDE {
            return Err(ConfigError::CanvasTooLarge {
                width: self.width,
                height: self.height,
            });
        }
        self.hyperparameters.validate()?;
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            chunk_size: self.chunk_size,
        }
    }
}

fn parse_var<L, T>(lookup: &L, name: &'static str) -> Result<Option<T>, ConfigError>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };

    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidVar { name, value })
}
