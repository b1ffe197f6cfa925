use crate::numerics::EigenOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Numerical acceptance thresholds for a solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverConfig {
    /// Largest accepted `|A A^{-1} - I|∞` for inversions in the propagator.
    pub residual_tolerance: f64,
    /// Largest accepted `|ΣR + ΣT - 1|` for lossless stacks.
    pub energy_tolerance: f64,
    /// Slack around `[0, 1]` before an efficiency counts as unphysical.
    pub efficiency_tolerance: f64,
    pub eigen: EigenOptions,
    /// `Re kz` at or below this (k0-normalized) marks an order as evanescent.
    pub propagation_threshold: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            residual_tolerance: 1.0e-6,
            energy_tolerance: 1.0e-6,
            efficiency_tolerance: 1.0e-6,
            eigen: EigenOptions::default(),
            propagation_threshold: 1.0e-10,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), String> {
        let thresholds = [
            ("residualTolerance", self.residual_tolerance),
            ("energyTolerance", self.energy_tolerance),
            ("efficiencyTolerance", self.efficiency_tolerance),
            ("eigen.deflationTolerance", self.eigen.deflation_tolerance),
            ("eigen.residualTolerance", self.eigen.residual_tolerance),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{name} must be positive and finite, got {value}"));
            }
        }
        if !self.propagation_threshold.is_finite() || self.propagation_threshold < 0.0 {
            return Err(format!(
                "propagationThreshold must be non-negative and finite, got {}",
                self.propagation_threshold
            ));
        }
        if self.eigen.max_iterations_per_eigenvalue == 0 {
            return Err("eigen.maxIterationsPerEigenvalue must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SolverConfigError {
    #[error("failed to read solver config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse solver config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid solver config '{}': {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

pub fn load_solver_config(config_path: impl AsRef<Path>) -> Result<SolverConfig, SolverConfigError> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| SolverConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    let config: SolverConfig =
        serde_json::from_str(&source).map_err(|source| SolverConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;
    config
        .validate()
        .map_err(|reason| SolverConfigError::Invalid {
            path: config_path.to_path_buf(),
            reason,
        })?;
    Ok(config)
}
