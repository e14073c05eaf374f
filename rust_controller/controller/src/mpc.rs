use std::time::Duration;

use config::MpcConfig;
use control_model::{Actuation, KinematicBicycle, PathPolynomial, VehicleState};
use nlp::{Bounds, NlpSolver, PanocSolver, SolverStatus};
use prelude::*;

use crate::bounds::BoundsBuilder;
use crate::cost::CostModel;
use crate::formulation::MpcFormulation;
use crate::layout::{InputField, StateField, VariableLayout};
use crate::{Controller, MpcError};

/// Clamping decoded actuators by more than this is worth a warning.
const CLAMP_WARN: float = 1e-2;

/// First command of a solved horizon and the positions it predicts.
#[derive(Clone, Debug, PartialEq)]
pub struct MpcOutput {
    pub actuation: Actuation,
    /// Predicted (x, y) for timesteps 1..N-1.
    pub trajectory: Vec<(float, float)>,
    pub cost: float,
    pub iterations: usize,
    pub solve_time: Duration,
}

impl MpcOutput {
    /// `[steering, throttle, x1, y1, x2, y2, ...]`
    pub fn to_vec(&self) -> Vec<float> {
        let mut out = Vec::with_capacity(2 + 2 * self.trajectory.len());
        out.push(self.actuation.steering);
        out.push(self.actuation.throttle);
        for &(x, y) in &self.trajectory {
            out.push(x);
            out.push(y);
        }
        out
    }
}

pub struct Mpc<S: NlpSolver = PanocSolver> {
    config: MpcConfig,
    layout: VariableLayout,
    model: KinematicBicycle,
    solver: S,
}

impl Mpc<PanocSolver> {
    pub fn new(config: MpcConfig) -> Mpc<PanocSolver> {
        Mpc::with_solver(config, PanocSolver)
    }
}

impl<S: NlpSolver> Mpc<S> {
    pub fn with_solver(config: MpcConfig, solver: S) -> Mpc<S> {
        config.validate();
        let layout = VariableLayout::new(config.N);
        let model = KinematicBicycle::new(config.Lf);
        Mpc {
            config,
            layout,
            model,
            solver,
        }
    }

    pub fn config(&self) -> &MpcConfig {
        &self.config
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    /// Zeros everywhere except the first state, which is the measurement.
    pub fn initial_guess(&self, state: &VehicleState) -> Vec<float> {
        let mut z = vec![0.0; self.layout.len()];
        self.layout.set_state(&mut z, 0, &state.to_vector());
        z
    }

    pub fn solve(
        &self,
        state: &VehicleState,
        path: &PathPolynomial,
    ) -> Result<MpcOutput, MpcError> {
        let _guard = flame::start_guard("mpc solve");

        if !state.is_finite() {
            return Err(MpcError::InvalidInput("vehicle state is not finite"));
        }
        if !path.is_finite() {
            return Err(MpcError::InvalidInput("path coefficients are not finite"));
        }

        let guard = flame::start_guard("mpc setup");
        let l = &self.layout;
        let builder = BoundsBuilder::new(&self.config, l);
        let variable_bounds = builder.variables();
        let constraint_bounds = builder.constraints(state);
        let x0 = self.initial_guess(state);

        assert_eq!(x0.len(), l.len());
        assert_eq!(variable_bounds.len(), l.len());
        assert_eq!(constraint_bounds.len(), l.num_constraints());
        assert_eq!(variable_bounds.first_inconsistent(), None);
        assert_eq!(constraint_bounds.first_inconsistent(), None);

        let violation = self.pin_violation(&variable_bounds, &constraint_bounds);
        if violation > 0.0 {
            debug!("initial state lies {:.3e} outside the variable bounds", violation);
            return Err(MpcError::Infeasible { violation });
        }

        let problem = MpcFormulation::new(
            l,
            CostModel::new(&self.config, l),
            &self.model,
            self.config.dt,
            path,
        );
        guard.end();

        let result = self.solver.solve(
            &problem,
            &x0,
            &variable_bounds,
            &constraint_bounds,
            &self.config.solver,
        )?;

        match result.status {
            SolverStatus::Success => {}
            SolverStatus::MaxCpuTimeExceeded => {
                return Err(MpcError::Timeout {
                    elapsed: result.solve_time,
                })
            }
            SolverStatus::LocalInfeasibility => {
                return Err(MpcError::Infeasible {
                    violation: result.constraint_violation,
                })
            }
            status => return Err(MpcError::NonConvergent { status }),
        }
        assert_eq!(result.x.len(), l.len(), "solution length");

        debug!(
            "cost {} after {} iterations in {:?}",
            result.obj_value, result.iterations, result.solve_time
        );
        trace!("cost terms {:?}", problem.cost().terms(&result.x));

        let _guard = flame::start_guard("mpc decode");
        let z = &result.x;
        let limits = &self.config.limits;
        let actuation = Actuation::new(
            clamp_logged(
                "steering",
                z[l.input_index(InputField::Steering, 0)],
                limits.max_steering,
            ),
            clamp_logged(
                "throttle",
                z[l.input_index(InputField::Throttle, 0)],
                limits.max_throttle,
            ),
        );
        let trajectory = (1..l.horizon())
            .map(|t| {
                (
                    z[l.state_index(StateField::X, t)],
                    z[l.state_index(StateField::Y, t)],
                )
            })
            .collect();

        Ok(MpcOutput {
            actuation,
            trajectory,
            cost: result.obj_value,
            iterations: result.iterations,
            solve_time: result.solve_time,
        })
    }

    /// How far the pinned first state sits outside the variable box.
    fn pin_violation(&self, variable_bounds: &Bounds, constraint_bounds: &Bounds) -> float {
        let l = &self.layout;
        StateField::ALL
            .iter()
            .map(|&field| {
                let v = constraint_bounds.lower[l.constraint_row(field, 0)];
                let i = l.state_index(field, 0);
                (v - variable_bounds.project(i, v)).abs()
            })
            .fold(0.0, float::max)
    }
}

impl<S: NlpSolver> Controller for Mpc<S> {
    fn step(&self, state: &VehicleState, path: &PathPolynomial) -> Result<MpcOutput, MpcError> {
        self.solve(state, path)
    }
}

fn clamp_logged(name: &str, v: float, limit: float) -> float {
    let clamped = clamp(v, -limit, limit);
    if (clamped - v).abs() > CLAMP_WARN {
        warn!("{} {} clamped to {}", name, v, clamped);
    }
    clamped
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use nlp::{NlpProblem, SolveResult, SolverError, SolverOptions};

    use super::*;

    /// Returns a fixed status and either the initial guess or a chosen vector.
    struct ScriptedSolver {
        status: SolverStatus,
        x: Option<Vec<float>>,
        fail: bool,
        calls: Cell<usize>,
        seen_x0: RefCell<Vec<float>>,
    }

    impl ScriptedSolver {
        fn new(status: SolverStatus) -> ScriptedSolver {
            ScriptedSolver {
                status,
                x: None,
                fail: false,
                calls: Cell::new(0),
                seen_x0: RefCell::new(Vec::new()),
            }
        }
    }

    impl<'a> NlpSolver for &'a ScriptedSolver {
        fn solve<P: NlpProblem>(
            &self,
            problem: &P,
            x0: &[float],
            _variable_bounds: &Bounds,
            constraint_bounds: &Bounds,
            _options: &SolverOptions,
        ) -> Result<SolveResult, SolverError> {
            self.calls.set(self.calls.get() + 1);
            *self.seen_x0.borrow_mut() = x0.to_vec();
            assert_eq!(problem.num_constraints(), constraint_bounds.len());
            if self.fail {
                return Err(SolverError::Backend("scripted".to_owned()));
            }
            let x = self.x.clone().unwrap_or_else(|| x0.to_vec());
            Ok(SolveResult {
                status: self.status,
                obj_value: problem.objective(&x),
                x,
                constraint_violation: 0.5,
                iterations: 3,
                inner_iterations: 30,
                solve_time: Duration::from_millis(7),
            })
        }
    }

    fn state() -> VehicleState {
        VehicleState::new(1.0, 2.0, 0.1, 5.0, 0.2, -0.1)
    }

    #[test]
    fn initial_guess_holds_measurement() {
        let mpc = Mpc::new(MpcConfig::default());
        let z = mpc.initial_guess(&state());
        let l = mpc.layout();
        assert_eq!(z.len(), 78);
        assert_eq!(l.state_at(&z, 0), state().to_vector());
        let nonzero = z.iter().filter(|&&v| v != 0.0).count();
        assert_eq!(nonzero, 6);
    }

    #[test]
    fn decodes_first_actuation_and_trajectory() {
        let config = MpcConfig {
            N: 4,
            ..MpcConfig::default()
        };
        let layout = VariableLayout::new(4);
        let mut x = vec![0.0; layout.len()];
        for t in 0..4 {
            x[layout.state_index(StateField::X, t)] = t as float;
            x[layout.state_index(StateField::Y, t)] = 10.0 * t as float;
        }
        x[layout.input_index(InputField::Steering, 0)] = 0.1;
        x[layout.input_index(InputField::Throttle, 0)] = 0.2;
        x[layout.input_index(InputField::Steering, 1)] = -0.3;

        let mut solver = ScriptedSolver::new(SolverStatus::Success);
        solver.x = Some(x);
        let mpc = Mpc::with_solver(config, &solver);
        let out = mpc.solve(&state(), &PathPolynomial::default()).unwrap();

        assert_eq!(out.actuation, Actuation::new(0.1, 0.2));
        assert_eq!(out.trajectory, vec![(1.0, 10.0), (2.0, 20.0), (3.0, 30.0)]);
        assert_eq!(
            out.to_vec(),
            vec![0.1, 0.2, 1.0, 10.0, 2.0, 20.0, 3.0, 30.0]
        );
        assert_eq!(out.iterations, 3);
        assert_eq!(out.solve_time, Duration::from_millis(7));
        assert_eq!(solver.calls.get(), 1);
        assert_eq!(*solver.seen_x0.borrow(), mpc.initial_guess(&state()));
    }

    #[test]
    fn actuators_are_clamped() {
        let config = MpcConfig::default();
        let layout = VariableLayout::new(config.N);
        let mut x = vec![0.0; layout.len()];
        x[layout.input_index(InputField::Steering, 0)] = -0.9;
        x[layout.input_index(InputField::Throttle, 0)] = 1.0 + 1e-9;

        let mut solver = ScriptedSolver::new(SolverStatus::Success);
        solver.x = Some(x);
        let mpc = Mpc::with_solver(config, &solver);
        let out = mpc.solve(&state(), &PathPolynomial::default()).unwrap();
        assert_eq!(out.actuation.steering, -0.436332);
        assert_eq!(out.actuation.throttle, 1.0);
    }

    #[test]
    fn status_maps_to_error() {
        let cases = [
            SolverStatus::MaxCpuTimeExceeded,
            SolverStatus::LocalInfeasibility,
            SolverStatus::MaxIterationsExceeded,
            SolverStatus::InvalidNumberDetected,
        ];
        for &status in &cases {
            let solver = ScriptedSolver::new(status);
            let mpc = Mpc::with_solver(MpcConfig::default(), &solver);
            let err = mpc.solve(&state(), &PathPolynomial::default()).unwrap_err();
            match (status, err) {
                (SolverStatus::MaxCpuTimeExceeded, MpcError::Timeout { elapsed }) => {
                    assert_eq!(elapsed, Duration::from_millis(7))
                }
                (SolverStatus::LocalInfeasibility, MpcError::Infeasible { violation }) => {
                    assert_eq!(violation, 0.5)
                }
                (SolverStatus::MaxIterationsExceeded, MpcError::NonConvergent { status: s })
                | (SolverStatus::InvalidNumberDetected, MpcError::NonConvergent { status: s }) => {
                    assert_eq!(s, status)
                }
                (status, err) => panic!("{:?} mapped to {:?}", status, err),
            }
        }
    }

    #[test]
    fn backend_error_propagates() {
        let mut solver = ScriptedSolver::new(SolverStatus::Success);
        solver.fail = true;
        let mpc = Mpc::with_solver(MpcConfig::default(), &solver);
        match mpc.solve(&state(), &PathPolynomial::default()) {
            Err(MpcError::Solver(SolverError::Backend(_))) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn non_finite_input_skips_solver() {
        let solver = ScriptedSolver::new(SolverStatus::Success);
        let mpc = Mpc::with_solver(MpcConfig::default(), &solver);

        let mut bad = state();
        bad.v = NAN;
        match mpc.solve(&bad, &PathPolynomial::default()) {
            Err(MpcError::InvalidInput(_)) => {}
            other => panic!("unexpected {:?}", other),
        }

        let path = PathPolynomial::new([0.0, INFINITY, 0.0, 0.0]);
        match mpc.solve(&state(), &path) {
            Err(MpcError::InvalidInput(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(solver.calls.get(), 0);
    }

    #[test]
    fn heading_outside_bounds_is_infeasible() {
        let solver = ScriptedSolver::new(SolverStatus::Success);
        let mpc = Mpc::with_solver(MpcConfig::default(), &solver);
        let mut s = state();
        s.psi = 4.0;
        match mpc.solve(&s, &PathPolynomial::default()) {
            Err(MpcError::Infeasible { violation }) => {
                assert!((violation - (4.0 - PI)).abs() < 1e-12)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(solver.calls.get(), 0);
    }

    #[test]
    fn controller_trait_delegates() {
        let solver = ScriptedSolver::new(SolverStatus::Success);
        let mpc = Mpc::with_solver(MpcConfig::default(), &solver);
        let controller: &dyn Controller = &mpc;
        let out = controller.step(&state(), &PathPolynomial::default()).unwrap();
        assert_eq!(out.trajectory.len(), 9);
        assert_eq!(out.actuation, Actuation::new(0.0, 0.0));
    }
}
