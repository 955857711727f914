use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs,
    ops::{Bound, RangeBounds},
    path::Path,
};

/// Configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Epidemic and movement parameters.
    #[serde(default)]
    pub model: ModelConfig,
    /// Output parameters.
    pub output: OutputConfig,
}

/// Parameters of the epidemic model.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of agents.
    pub agents_number: usize,
    /// Fraction of agents infected at tick 0.
    pub initial_infection_rate: f64,
    /// Contact distance below which infection can happen.
    pub infection_radius: f64,
    /// Probability of infection per contact and tick.
    pub infection_probability: f64,
    /// Probability of recovery per tick.
    pub recovery_probability: f64,
    /// Side length of the square plane.
    pub grid_size: f64,
}

/// Parameters of the output files.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Maximum number of ticks simulated per trajectory file.
    pub ticks_per_file: usize,
    /// Number of ticks between population snapshots.
    pub ticks_per_save: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            agents_number: 500,
            initial_infection_rate: 0.01,
            infection_radius: 5.0,
            infection_probability: 0.2,
            recovery_probability: 0.015,
            grid_size: 200.0,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be a TOML document containing a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;

        check_num(self.output.ticks_per_file, 1..=1_000_000)
            .context("invalid ticks_per_file")?;
        check_num(self.output.ticks_per_save, 1..=1_000_000)
            .context("invalid ticks_per_save")?;

        Ok(())
    }
}

impl ModelConfig {
    /// Check every parameter against its domain.
    ///
    /// # Errors
    /// The error context names the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_num(self.agents_number, 1..).context("invalid agents_number")?;
        check_num(self.initial_infection_rate, 0.0..=1.0)
            .context("invalid initial_infection_rate")?;
        check_num(self.infection_radius, 0.0..=f64::MAX).context("invalid infection_radius")?;
        check_num(self.infection_probability, 0.0..=1.0)
            .context("invalid infection_probability")?;
        check_num(self.recovery_probability, 0.0..=1.0)
            .context("invalid recovery_probability")?;
        check_num(
            self.grid_size,
            (Bound::Excluded(0.0), Bound::Included(f64::MAX)),
        )
        .context("invalid grid_size")?;

        Ok(())
    }

    /// Number of agents infected at tick 0.
    pub fn initial_infected(&self) -> usize {
        (self.agents_number as f64 * self.initial_infection_rate).round() as usize
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
