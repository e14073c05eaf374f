use control_model::{KinematicBicycle, PathPolynomial};
use nlp::NlpProblem;
use prelude::*;

use crate::cost::CostModel;
use crate::dynamics::DynamicsConstraints;
use crate::layout::VariableLayout;

/// Cost and dynamics evaluated against one reference path.
pub struct MpcFormulation<'a> {
    layout: &'a VariableLayout,
    cost: CostModel<'a>,
    dynamics: DynamicsConstraints<'a>,
    path: &'a PathPolynomial,
}

impl<'a> MpcFormulation<'a> {
    pub fn new(
        layout: &'a VariableLayout,
        cost: CostModel<'a>,
        model: &'a KinematicBicycle,
        dt: float,
        path: &'a PathPolynomial,
    ) -> MpcFormulation<'a> {
        MpcFormulation {
            layout,
            cost,
            dynamics: DynamicsConstraints::new(layout, model, dt),
            path,
        }
    }

    pub fn cost(&self) -> &CostModel<'a> {
        &self.cost
    }
}

impl<'a> NlpProblem for MpcFormulation<'a> {
    fn num_variables(&self) -> usize {
        self.layout.len()
    }

    fn num_constraints(&self) -> usize {
        self.dynamics.num_constraints()
    }

    fn objective(&self, z: &[float]) -> float {
        self.cost.evaluate(z)
    }

    fn objective_gradient(&self, z: &[float], grad: &mut [float]) {
        self.cost.gradient(z, grad)
    }

    fn constraints(&self, z: &[float], c: &mut [float]) {
        self.dynamics.evaluate(z, self.path, c)
    }

    fn jacobian_sparsity(&self) -> Vec<(usize, usize)> {
        self.dynamics.jacobian_sparsity()
    }

    fn jacobian_values(&self, z: &[float], values: &mut [float]) {
        self.dynamics.jacobian_values(z, self.path, values)
    }
}
