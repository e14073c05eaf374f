use log::Level;
use optimization_engine::constraints::Rectangle;
use optimization_engine::core::ExitStatus;
use optimization_engine::panoc::{PANOCCache, PANOCOptimizer};
use optimization_engine::{Optimizer, Problem, SolverError as EngineError};
use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

use crate::{
    constraint_violation, Bounds, Jacobian, NlpProblem, NlpSolver, SolveResult, SolverError,
    SolverOptions, SolverStatus,
};
use prelude::*;

const LAMBDA_MAX: float = 1e12;

/// Augmented Lagrangian method around PANOC.
///
/// PANOC only handles the variable box. Constraint rows are moved into the
/// cost as `rho / 2 * dist(c(z) + lambda / rho, [cl, cu])^2` and the
/// multipliers are updated between inner solves.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanocSolver;

struct Scratch {
    c: Vec<float>,
    y: Vec<float>,
    jt_y: Vec<float>,
    jacobian: Jacobian,
}

impl NlpSolver for PanocSolver {
    fn solve<P: NlpProblem>(
        &self,
        problem: &P,
        x0: &[float],
        variable_bounds: &Bounds,
        constraint_bounds: &Bounds,
        options: &SolverOptions,
    ) -> Result<SolveResult, SolverError> {
        let _guard = flame::start_guard("nlp solve");
        let start = Instant::now();

        let n = problem.num_variables();
        let m = problem.num_constraints();
        assert_eq!(x0.len(), n, "initial guess length");
        assert_eq!(variable_bounds.len(), n, "variable bounds length");
        assert_eq!(constraint_bounds.len(), m, "constraint bounds length");
        if let Some(i) = variable_bounds.first_inconsistent() {
            panic!("variable bounds inconsistent at {}", i);
        }
        if let Some(i) = constraint_bounds.first_inconsistent() {
            panic!("constraint bounds inconsistent at {}", i);
        }

        let level = if options.print_level > 0 {
            Level::Info
        } else {
            Level::Debug
        };
        let time_limit = options.time_limit();

        let mut z: Vec<float> = x0
            .iter()
            .enumerate()
            .map(|(i, &v)| variable_bounds.project(i, v))
            .collect();
        let mut lambda = vec![0.0; m];
        let mut rho = options.initial_penalty;
        let mut c = vec![0.0; m];
        let mut prev_violation = INFINITY;
        let mut inner_iterations = 0;

        let mut cache = PANOCCache::new(n, options.tolerance, options.lbfgs_memory);
        let scratch = RefCell::new(Scratch {
            c: vec![0.0; m],
            y: vec![0.0; m],
            jt_y: vec![0.0; n],
            jacobian: Jacobian::new(problem, options),
        });
        let non_finite = Cell::new(false);

        let finish = |status: SolverStatus, x: Vec<float>, outer: usize, inner: usize| {
            let mut c = vec![0.0; m];
            problem.constraints(&x, &mut c);
            SolveResult {
                status,
                obj_value: problem.objective(&x),
                constraint_violation: constraint_violation(&c, constraint_bounds),
                x,
                iterations: outer,
                inner_iterations: inner,
                solve_time: start.elapsed(),
            }
        };

        for outer in 0..options.max_outer_iterations {
            let remaining = match time_limit.checked_sub(start.elapsed()) {
                Some(remaining) if remaining > Duration::from_secs(0) => remaining,
                _ => {
                    return Ok(finish(
                        SolverStatus::MaxCpuTimeExceeded,
                        z,
                        outer,
                        inner_iterations,
                    ))
                }
            };

            let inner = {
                let _guard = flame::start_guard("panoc");
                let lambda = &lambda;
                let scratch = &scratch;
                let non_finite = &non_finite;

                let cost = move |u: &[float], value: &mut float| -> Result<(), EngineError> {
                    let mut s = scratch.borrow_mut();
                    problem.constraints(u, &mut s.c);
                    let mut penalty = 0.0;
                    for (i, &c_i) in s.c.iter().enumerate() {
                        let w = c_i + lambda[i] / rho;
                        let d = w - constraint_bounds.project(i, w);
                        penalty += d * d;
                    }
                    *value = problem.objective(u) + 0.5 * rho * penalty;
                    if !value.is_finite() {
                        non_finite.set(true);
                    }
                    Ok(())
                };

                let gradient = move |u: &[float], grad: &mut [float]| -> Result<(), EngineError> {
                    let mut s = scratch.borrow_mut();
                    let s = &mut *s;
                    problem.objective_gradient(u, grad);
                    problem.constraints(u, &mut s.c);
                    for (i, (y_i, &c_i)) in s.y.iter_mut().zip(&s.c).enumerate() {
                        let w = c_i + lambda[i] / rho;
                        *y_i = rho * (w - constraint_bounds.project(i, w));
                    }
                    s.jacobian.update(problem, u);
                    s.jacobian.transpose_mul(&s.y, &mut s.jt_y);
                    for (g, &v) in grad.iter_mut().zip(&s.jt_y) {
                        *g += v;
                    }
                    if grad.iter().any(|g| !g.is_finite()) {
                        non_finite.set(true);
                    }
                    Ok(())
                };

                let bounds = Rectangle::new(
                    Some(&variable_bounds.lower[..]),
                    Some(&variable_bounds.upper[..]),
                );
                let inner_problem = Problem::new(&bounds, gradient, cost);
                let mut panoc = PANOCOptimizer::new(inner_problem, &mut cache)
                    .with_max_iter(options.max_inner_iterations)
                    .with_max_duration(remaining);
                panoc.solve(&mut z)
            };

            let status = match inner {
                Ok(status) => status,
                Err(_) if non_finite.get() => {
                    return Ok(finish(
                        SolverStatus::InvalidNumberDetected,
                        z,
                        outer + 1,
                        inner_iterations,
                    ))
                }
                Err(e) => return Err(SolverError::Backend(format!("{:?}", e))),
            };
            inner_iterations += status.iterations();

            if non_finite.get() {
                return Ok(finish(
                    SolverStatus::InvalidNumberDetected,
                    z,
                    outer + 1,
                    inner_iterations,
                ));
            }
            if let ExitStatus::NotConvergedOutOfTime = status.exit_status() {
                return Ok(finish(
                    SolverStatus::MaxCpuTimeExceeded,
                    z,
                    outer + 1,
                    inner_iterations,
                ));
            }

            problem.constraints(&z, &mut c);
            if c.iter().any(|v| !v.is_finite()) {
                return Ok(finish(
                    SolverStatus::InvalidNumberDetected,
                    z,
                    outer + 1,
                    inner_iterations,
                ));
            }
            let violation = constraint_violation(&c, constraint_bounds);

            log!(
                level,
                "outer {} rho {:.1e} inner {} ({:?}) fpr {:.3e} violation {:.3e}",
                outer,
                rho,
                status.iterations(),
                status.exit_status(),
                status.norm_fpr(),
                violation
            );

            if status.has_converged() && violation <= options.constraint_tolerance {
                return Ok(finish(
                    SolverStatus::Success,
                    z,
                    outer + 1,
                    inner_iterations,
                ));
            }

            // Multiplier update
            for (i, (l, &c_i)) in lambda.iter_mut().zip(&c).enumerate() {
                let w = c_i + *l / rho;
                *l = clamp(
                    rho * (w - constraint_bounds.project(i, w)),
                    -LAMBDA_MAX,
                    LAMBDA_MAX,
                );
            }

            // The penalty can't grow any more and the violation is stuck
            if rho >= options.max_penalty
                && violation > options.constraint_tolerance
                && violation > 0.99 * prev_violation
            {
                return Ok(finish(
                    SolverStatus::LocalInfeasibility,
                    z,
                    outer + 1,
                    inner_iterations,
                ));
            }

            if violation > 0.25 * prev_violation {
                rho = min(rho * options.penalty_update_factor, options.max_penalty);
            }
            prev_violation = violation;
        }

        Ok(finish(
            SolverStatus::MaxIterationsExceeded,
            z,
            options.max_outer_iterations,
            inner_iterations,
        ))
    }
}
