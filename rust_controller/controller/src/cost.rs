use config::{MpcConfig, Weights};
use prelude::*;

use crate::layout::{InputField, StateField, VariableLayout};

/// Objective split by term, for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CostTerms {
    pub tracking: float,
    pub actuation: float,
    pub actuation_rate: float,
}

impl CostTerms {
    pub fn total(&self) -> float {
        self.tracking + self.actuation + self.actuation_rate
    }
}

/// Weighted sum of squared tracking errors, actuator magnitudes and actuator
/// rates over the horizon.
pub struct CostModel<'a> {
    layout: &'a VariableLayout,
    weights: &'a Weights,
    v_ref: float,
}

impl<'a> CostModel<'a> {
    pub fn new(config: &'a MpcConfig, layout: &'a VariableLayout) -> CostModel<'a> {
        CostModel {
            layout,
            weights: &config.weights,
            v_ref: config.v_ref,
        }
    }

    pub fn evaluate(&self, z: &[float]) -> float {
        self.terms(z).total()
    }

    pub fn terms(&self, z: &[float]) -> CostTerms {
        let w = self.weights;
        let l = self.layout;
        let cte = l.states(z, StateField::Cte);
        let epsi = l.states(z, StateField::Epsi);
        let v = l.states(z, StateField::V);
        let delta = l.inputs(z, InputField::Steering);
        let a = l.inputs(z, InputField::Throttle);

        let mut terms = CostTerms::default();

        for t in 0..l.horizon() {
            terms.tracking += w.cte * cte[t].powi(2);
            terms.tracking += w.epsi * epsi[t].powi(2);
            terms.tracking += w.v * (self.v_ref - v[t]).powi(2);
        }

        for t in 0..delta.len() {
            terms.actuation += w.delta * delta[t].powi(2);
            terms.actuation += w.a * a[t].powi(2);
        }

        for t in 1..delta.len() {
            terms.actuation_rate += w.delta_rate * (delta[t] - delta[t - 1]).powi(2);
            terms.actuation_rate += w.a_rate * (a[t] - a[t - 1]).powi(2);
        }

        terms
    }

    pub fn gradient(&self, z: &[float], grad: &mut [float]) {
        assert_eq!(grad.len(), self.layout.len());
        let w = self.weights;
        let l = self.layout;

        for g in grad.iter_mut() {
            *g = 0.0;
        }

        for t in 0..l.horizon() {
            let i = l.state_index(StateField::Cte, t);
            grad[i] = 2.0 * w.cte * z[i];
            let i = l.state_index(StateField::Epsi, t);
            grad[i] = 2.0 * w.epsi * z[i];
            let i = l.state_index(StateField::V, t);
            grad[i] = -2.0 * w.v * (self.v_ref - z[i]);
        }

        for &(field, weight, rate_weight) in &[
            (InputField::Steering, w.delta, w.delta_rate),
            (InputField::Throttle, w.a, w.a_rate),
        ] {
            let range = l.input(field);
            for i in range.clone() {
                grad[i] += 2.0 * weight * z[i];
            }
            for i in range.start + 1..range.end {
                let d = 2.0 * rate_weight * (z[i] - z[i - 1]);
                grad[i] += d;
                grad[i - 1] -= d;
            }
        }
    }
}
