//! Boundary between the MPC formulation and the nonlinear program solver.
//!
//! A problem is `min f(z)` subject to `zl <= z <= zu` and `cl <= c(z) <= cu`.
//! Equality rows have `cl == cu`.

extern crate optimization_engine;
extern crate prelude;
#[macro_use]
extern crate log;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate thiserror;

use std::fmt;
use std::time::Duration;

use prelude::*;

mod jacobian;
pub use jacobian::Jacobian;

mod panoc;
pub use panoc::PanocSolver;

/// Objective and constraint evaluator handed to a solver.
pub trait NlpProblem {
    fn num_variables(&self) -> usize;

    fn num_constraints(&self) -> usize;

    fn objective(&self, z: &[float]) -> float;

    fn objective_gradient(&self, z: &[float], grad: &mut [float]);

    fn constraints(&self, z: &[float], c: &mut [float]);

    /// Structural non-zeros of the constraint Jacobian as `(row, column)`.
    fn jacobian_sparsity(&self) -> Vec<(usize, usize)>;

    /// Jacobian values in the order returned by `jacobian_sparsity`.
    fn jacobian_values(&self, z: &[float], values: &mut [float]);
}

pub trait NlpSolver {
    fn solve<P: NlpProblem>(
        &self,
        problem: &P,
        x0: &[float],
        variable_bounds: &Bounds,
        constraint_bounds: &Bounds,
        options: &SolverOptions,
    ) -> Result<SolveResult, SolverError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    pub lower: Vec<float>,
    pub upper: Vec<float>,
}

impl Bounds {
    pub fn new(lower: Vec<float>, upper: Vec<float>) -> Bounds {
        assert_eq!(lower.len(), upper.len(), "bound vectors differ in length");
        Bounds { lower, upper }
    }

    pub fn from_element(len: usize, lower: float, upper: float) -> Bounds {
        Bounds::new(vec![lower; len], vec![upper; len])
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn set(&mut self, i: usize, lower: float, upper: float) {
        self.lower[i] = lower;
        self.upper[i] = upper;
    }

    /// Pins index `i` to a single value.
    pub fn fix(&mut self, i: usize, value: float) {
        self.set(i, value, value);
    }

    /// Index of the first entry with `lower > upper` or a NaN bound.
    pub fn first_inconsistent(&self) -> Option<usize> {
        self.lower
            .iter()
            .zip(&self.upper)
            .position(|(l, u)| !(l <= u))
    }

    pub fn project(&self, i: usize, v: float) -> float {
        clamp(v, self.lower[i], self.upper[i])
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// 0 is silent, anything higher logs solver progress at info.
    pub print_level: u32,
    /// Evaluate the constraint Jacobian on its structural non-zeros only.
    pub sparse_forward: bool,
    /// Accumulate Jacobian-transpose products from the sparse entries only.
    pub sparse_reverse: bool,
    /// Wall clock budget in seconds.
    pub max_cpu_time: float,
    pub tolerance: float,
    pub constraint_tolerance: float,
    pub max_outer_iterations: usize,
    pub max_inner_iterations: usize,
    pub lbfgs_memory: usize,
    pub initial_penalty: float,
    pub penalty_update_factor: float,
    pub max_penalty: float,
}

impl Default for SolverOptions {
    fn default() -> SolverOptions {
        SolverOptions {
            print_level: 0,
            sparse_forward: true,
            sparse_reverse: true,
            max_cpu_time: 0.5,
            tolerance: 1e-6,
            constraint_tolerance: 1e-4,
            max_outer_iterations: 50,
            max_inner_iterations: 500,
            lbfgs_memory: 10,
            initial_penalty: 10.0,
            penalty_update_factor: 10.0,
            max_penalty: 1e8,
        }
    }
}

impl SolverOptions {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs_f64(max(self.max_cpu_time, 0.0))
    }
}

/// Solver termination status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverStatus {
    Success,
    MaxIterationsExceeded,
    MaxCpuTimeExceeded,
    LocalInfeasibility,
    InvalidNumberDetected,
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            SolverStatus::Success => "success",
            SolverStatus::MaxIterationsExceeded => "maximum iterations exceeded",
            SolverStatus::MaxCpuTimeExceeded => "maximum cpu time exceeded",
            SolverStatus::LocalInfeasibility => "converged to a point of local infeasibility",
            SolverStatus::InvalidNumberDetected => "invalid number detected",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug)]
pub struct SolveResult {
    pub status: SolverStatus,
    pub obj_value: float,
    pub x: Vec<float>,
    /// Largest distance of a constraint row from its bounds.
    pub constraint_violation: float,
    pub iterations: usize,
    pub inner_iterations: usize,
    pub solve_time: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("solver backend failed: {0}")]
    Backend(String),
}

/// Largest distance of `c` from the box `bounds`.
pub fn constraint_violation(c: &[float], bounds: &Bounds) -> float {
    c.iter()
        .enumerate()
        .map(|(i, &v)| (v - bounds.project(i, v)).abs())
        .fold(0.0, float::max)
}
