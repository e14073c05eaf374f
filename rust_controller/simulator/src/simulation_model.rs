use control_model::{Actuation, KinematicBicycle, PathPolynomial, VehicleState};
use prelude::*;

/// The simulated vehicle. Holds the true pose and measures the tracking
/// errors against the reference path.
pub struct Plant {
    model: KinematicBicycle,
    path: PathPolynomial,
    state: VehicleState,
}

impl Plant {
    pub fn new(model: KinematicBicycle, path: PathPolynomial, initial: VehicleState) -> Plant {
        let mut plant = Plant {
            model,
            path,
            state: initial,
        };
        plant.state = plant.with_errors(initial);
        plant
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    /// Noisy pose with tracking errors recomputed from it.
    pub fn measure(&self, position_noise: float, heading_noise: float) -> VehicleState {
        let mut s = self.state;
        if position_noise > 0.0 {
            s.x += randn() * position_noise;
            s.y += randn() * position_noise;
        }
        if heading_noise > 0.0 {
            s.psi += randn() * heading_noise;
        }
        s.psi = wrap_angle(s.psi);
        self.with_errors(s)
    }

    pub fn step(&mut self, dt: float, actuation: &Actuation) {
        let x = self.model.step(dt, &self.state.to_vector(), &actuation.to_vector(), &self.path);
        let mut next = VehicleState::from_vector(&x);
        next.psi = wrap_angle(next.psi);
        self.state = self.with_errors(next);
    }

    fn with_errors(&self, mut s: VehicleState) -> VehicleState {
        s.cte = self.path.evaluate(s.x) - s.y;
        s.epsi = s.psi - self.path.heading(s.x);
        s
    }
}
