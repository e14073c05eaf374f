#![allow(non_snake_case)]

extern crate nlp;
extern crate prelude;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate thiserror;
extern crate toml;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use prelude::*;
use serde::de::DeserializeOwned;

pub use nlp::SolverOptions;

/// Hyperparameters of the controller. Built once and shared read-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpcConfig {
    /// Horizon length in timesteps.
    pub N: usize,
    /// Discretisation timestep in seconds.
    pub dt: float,
    /// Front axle to centre of gravity. Found by matching the turning radius
    /// of the simulated car at constant steering and speed.
    pub Lf: float,
    /// Target speed in m/s.
    pub v_ref: float,
    pub weights: Weights,
    pub limits: Limits,
    pub solver: SolverOptions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub cte: float,
    pub epsi: float,
    pub v: float,
    pub delta: float,
    pub a: float,
    pub delta_rate: float,
    pub a_rate: float,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Speed magnitude bound in m/s.
    pub max_speed: float,
    /// Steering magnitude bound in radians.
    pub max_steering: float,
    /// Normalised throttle magnitude bound.
    pub max_throttle: float,
    /// Stand-in for an unbounded variable.
    pub unbounded: float,
}

impl Default for MpcConfig {
    fn default() -> MpcConfig {
        MpcConfig {
            N: 10,
            dt: 0.1,
            Lf: 2.67,
            v_ref: 40.0 * MPH_TO_MPS,
            weights: Weights::default(),
            limits: Limits::default(),
            solver: SolverOptions::default(),
        }
    }
}

impl Default for Weights {
    fn default() -> Weights {
        Weights {
            cte: 40.0,
            epsi: 1000.0,
            v: 1.0,
            delta: 500.0,
            a: 1.0,
            delta_rate: 250.0,
            a_rate: 1.0,
        }
    }
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            max_speed: 200.0 * MPH_TO_MPS,
            // 25 degrees
            max_steering: 0.436332,
            max_throttle: 1.0,
            unbounded: 1.0e19,
        }
    }
}

impl MpcConfig {
    /// Panics on values no formulation can be built from.
    pub fn validate(&self) {
        assert!(self.N >= 2, "horizon must have at least two steps, got {}", self.N);
        assert!(self.dt > 0.0, "dt must be positive");
        assert!(self.Lf > 0.0, "Lf must be positive");
        assert!(self.limits.max_speed > 0.0, "max_speed must be positive");
        assert!(self.limits.max_steering > 0.0, "max_steering must be positive");
        assert!(self.limits.max_throttle > 0.0, "max_throttle must be positive");
        assert!(self.limits.unbounded > 0.0, "unbounded must be positive");

        let w = &self.weights;
        for &(name, value) in &[
            ("cte", w.cte),
            ("epsi", w.epsi),
            ("v", w.v),
            ("delta", w.delta),
            ("a", w.a),
            ("delta_rate", w.delta_rate),
            ("a_rate", w.a_rate),
        ] {
            assert!(value >= 0.0, "weight {} must be non-negative", name);
        }

        let s = &self.solver;
        assert!(
            s.max_cpu_time.is_finite() && s.max_cpu_time >= 0.0,
            "max_cpu_time must be finite and non-negative, got {}",
            s.max_cpu_time
        );
        for &(name, value) in &[
            ("tolerance", s.tolerance),
            ("constraint_tolerance", s.constraint_tolerance),
            ("initial_penalty", s.initial_penalty),
            ("max_penalty", s.max_penalty),
        ] {
            assert!(
                value.is_finite() && value > 0.0,
                "{} must be finite and positive, got {}",
                name,
                value
            );
        }
        assert!(
            s.penalty_update_factor > 1.0,
            "penalty_update_factor must be greater than one"
        );
        assert!(
            s.max_penalty >= s.initial_penalty,
            "max_penalty must not be below initial_penalty"
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to deserialise config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn from_str(config_str: &str) -> Result<MpcConfig, ConfigError> {
    Ok(toml::from_str(config_str)?)
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<MpcConfig, ConfigError> {
    load_toml(path)
}

/// Reads any TOML-deserialisable settings file.
pub fn load_toml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })?;
    Ok(toml::from_str(&config_str)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MpcConfig::default();
        config.validate();
        assert_eq!(config.N, 10);
        assert!((config.v_ref - 17.88).abs() < 1e-9);
        assert!((config.limits.max_speed - 89.4).abs() < 1e-9);
        assert_eq!(config.weights.epsi, 1000.0);
        assert_eq!(config.solver.max_cpu_time, 0.5);
    }

    #[test]
    fn partial_override() {
        let config = from_str(
            r#"
            N = 25
            v_ref = 5.0

            [weights]
            cte = 100.0

            [solver]
            max_cpu_time = 2.0
            sparse_reverse = false
            "#,
        ).unwrap();

        assert_eq!(config.N, 25);
        assert_eq!(config.v_ref, 5.0);
        assert_eq!(config.dt, 0.1);
        assert_eq!(config.weights.cte, 100.0);
        assert_eq!(config.weights.epsi, 1000.0);
        assert_eq!(config.solver.max_cpu_time, 2.0);
        assert!(!config.solver.sparse_reverse);
        assert!(config.solver.sparse_forward);
    }

    #[test]
    fn empty_is_default() {
        assert_eq!(from_str("").unwrap(), MpcConfig::default());
    }

    #[test]
    fn parse_error() {
        match from_str("N = \"ten\"") {
            Err(ConfigError::Parse(_)) => {}
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn missing_file() {
        match load("does/not/exist.toml") {
            Err(ConfigError::Io { .. }) => {}
            other => panic!("expected io error, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "horizon")]
    fn horizon_too_short() {
        let config = MpcConfig {
            N: 1,
            ..MpcConfig::default()
        };
        config.validate();
    }

    #[test]
    #[should_panic(expected = "max_cpu_time")]
    fn nan_time_budget() {
        from_str("[solver]\nmax_cpu_time = nan").unwrap().validate();
    }

    #[test]
    #[should_panic(expected = "max_cpu_time")]
    fn infinite_time_budget() {
        from_str("[solver]\nmax_cpu_time = inf").unwrap().validate();
    }

    #[test]
    #[should_panic(expected = "constraint_tolerance")]
    fn zero_constraint_tolerance() {
        from_str("[solver]\nconstraint_tolerance = 0.0").unwrap().validate();
    }

    #[test]
    #[should_panic(expected = "penalty_update_factor")]
    fn penalty_must_grow() {
        let mut config = MpcConfig::default();
        config.solver.penalty_update_factor = 1.0;
        config.validate();
    }

    #[test]
    fn zero_time_budget_is_valid() {
        from_str("[solver]\nmax_cpu_time = 0.0").unwrap().validate();
    }
}
