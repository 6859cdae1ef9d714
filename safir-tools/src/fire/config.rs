//! Scheduler configuration

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SafirError, SafirResult};

/// Refinement applied after the plateau estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimization {
    /// Plateau estimate only
    #[default]
    None,
    /// Corrector perturbation of the plateau formula
    Coeff,
    /// Iterative ignition time shifting
    Iter,
}

impl FromStr for Optimization {
    type Err = SafirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "no" | "false" | "0" => Ok(Self::None),
            "coeff" => Ok(Self::Coeff),
            "iter" => Ok(Self::Iter),
            other => Err(SafirError::InvalidInput(format!("unknown optimization '{other}'"))),
        }
    }
}

/// Options of a scheduler run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Fire growth factor of the t-squared target [W/s^2]
    pub alpha: Option<f64>,
    /// Time step [s] of the error evaluation
    pub time_step: usize,
    pub optimization: Optimization,
    /// Mean error the corrector optimization stops at
    pub precision: f64,
    /// Use relative rather than absolute error in the corrector optimization
    pub relative: bool,
    /// Lowest accepted relative error of the iterative optimization
    pub bottom: f64,
    /// Highest accepted relative error of the iterative optimization
    pub top: f64,
    /// First time [s] checked by the iterative optimization
    pub initial_time: usize,
    /// Step [s] of the iterative optimization (time step when absent)
    pub optim_step: Option<usize>,
    /// Iteration cap of both optimizations
    pub max_iterations: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            alpha: None,
            time_step: 1,
            optimization: Optimization::None,
            precision: 0.001,
            relative: true,
            bottom: -0.05,
            top: 0.1,
            initial_time: 10,
            optim_step: None,
            max_iterations: 10_000,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> SafirResult<bool> {
    match value.to_lowercase().as_str() {
        "yes" | "y" | "true" | "t" | "1" => Ok(true),
        "no" | "n" | "false" | "f" | "0" => Ok(false),
        other => Err(SafirError::InvalidInput(format!("'{key}' expects yes or no, got '{other}'"))),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> SafirResult<T> {
    value
        .parse()
        .map_err(|_| SafirError::InvalidInput(format!("invalid value '{value}' for '{key}'")))
}

impl SchedulerConfig {
    /// Read `key value` lines; unknown keys are skipped with a warning
    pub fn from_key_values(text: &str) -> SafirResult<Self> {
        let mut config = Self::default();
        for line in text.lines() {
            let mut tokens = line.split_whitespace();
            let (Some(key), Some(value)) = (tokens.next(), tokens.next()) else {
                continue;
            };
            match key {
                "alpha" => config.alpha = Some(parse_value(key, value)?),
                "time_step" => config.time_step = parse_value(key, value)?,
                "optimization" | "optimize" => config.optimization = value.parse()?,
                "precision" => config.precision = parse_value(key, value)?,
                "relative" => config.relative = parse_bool(key, value)?,
                "bottom" => config.bottom = parse_value(key, value)?,
                "top" | "upper" => config.top = parse_value(key, value)?,
                "initial_time" | "int_time" => config.initial_time = parse_value(key, value)?,
                "optim_step" => config.optim_step = Some(parse_value(key, value)?),
                "max_iterations" => config.max_iterations = parse_value(key, value)?,
                other => log::warn!("Unknown scheduler option '{other}' ignored"),
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> SafirResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON or `key value` configuration file
    pub fn load(path: impl AsRef<Path>) -> SafirResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = if text.trim_start().starts_with('{') {
            Self::from_json(&text)?
        } else {
            Self::from_key_values(&text)?
        };
        log::info!("Scheduler config imported from {}", path.as_ref().display());
        Ok(config)
    }

    /// Step of the iterative optimization
    pub fn optim_step(&self) -> usize {
        self.optim_step.unwrap_or(self.time_step)
    }

    pub fn validate(&self) -> SafirResult<()> {
        if self.time_step == 0 || self.optim_step == Some(0) {
            return Err(SafirError::InvalidInput("time steps must be positive".to_string()));
        }
        if self.precision <= 0.0 {
            return Err(SafirError::InvalidInput("precision must be positive".to_string()));
        }
        if self.bottom >= self.top {
            return Err(SafirError::InvalidInput(format!(
                "bottom tolerance {} is not below top tolerance {}",
                self.bottom, self.top
            )));
        }
        if self.alpha.is_some_and(|a| a <= 0.0) {
            return Err(SafirError::InvalidInput("alpha must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.time_step, 1);
        assert_eq!(config.optim_step(), 1);
        assert_eq!(config.optimization, Optimization::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_key_values() {
        let text = "alpha 46.8\noptimization iter\nrelative no\nint_time 20\nupper 0.2\ncolour red\n";
        let config = SchedulerConfig::from_key_values(text).unwrap();
        assert_eq!(config.alpha, Some(46.8));
        assert_eq!(config.optimization, Optimization::Iter);
        assert!(!config.relative);
        assert_eq!(config.initial_time, 20);
        assert_eq!(config.top, 0.2);
    }

    #[test]
    fn test_json() {
        let config = SchedulerConfig::from_json(r#"{"alpha": 11.7, "optimization": "coeff", "optim_step": 5}"#).unwrap();
        assert_eq!(config.optimization, Optimization::Coeff);
        assert_eq!(config.optim_step(), 5);
        assert_eq!(config.bottom, -0.05);
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(SchedulerConfig::from_key_values("bottom 0.2\ntop 0.1\n").is_err());
        assert!(SchedulerConfig::from_key_values("relative maybe\n").is_err());
    }
}
