use control_model::{KinematicBicycle, PathPolynomial, NI, NS};
use prelude::*;

use crate::layout::{InputField, StateField, VariableLayout};

/// Equality rows tying consecutive states together through the vehicle model.
///
/// Rows at t = 0 hold the first state itself so that the bounds can pin it to
/// the measurement. Rows at t >= 1 hold the residual
/// `s_t - step(s_{t-1}, u_{t-1})`, which must be zero.
pub struct DynamicsConstraints<'a> {
    layout: &'a VariableLayout,
    model: &'a KinematicBicycle,
    dt: float,
}

impl<'a> DynamicsConstraints<'a> {
    pub fn new(
        layout: &'a VariableLayout,
        model: &'a KinematicBicycle,
        dt: float,
    ) -> DynamicsConstraints<'a> {
        DynamicsConstraints { layout, model, dt }
    }

    pub fn num_constraints(&self) -> usize {
        self.layout.num_constraints()
    }

    pub fn evaluate(&self, z: &[float], p: &PathPolynomial, c: &mut [float]) {
        let l = self.layout;
        assert_eq!(z.len(), l.len());
        assert_eq!(c.len(), l.num_constraints());

        for &field in &StateField::ALL {
            c[l.constraint_row(field, 0)] = z[l.state_index(field, 0)];
        }

        for t in 1..l.horizon() {
            let x_prev = l.state_at(z, t - 1);
            let u_prev = l.input_at(z, t - 1);
            let x_pred = self.model.step(self.dt, &x_prev, &u_prev, p);

            for &field in &StateField::ALL {
                c[l.constraint_row(field, t)] =
                    z[l.state_index(field, t)] - x_pred[field.index()];
            }
        }
    }

    /// Structural non-zeros of the constraint Jacobian as `(row, column)`.
    ///
    /// `jacobian_values` writes values in exactly this order.
    pub fn jacobian_sparsity(&self) -> Vec<(usize, usize)> {
        let l = self.layout;
        let (A_mask, B_mask) = self.model.linearise_sparsity();
        let mut entries = Vec::new();

        for &field in &StateField::ALL {
            entries.push((l.constraint_row(field, 0), l.state_index(field, 0)));
        }

        for t in 1..l.horizon() {
            for &row_field in &StateField::ALL {
                let row = l.constraint_row(row_field, t);
                let i = row_field.index();

                entries.push((row, l.state_index(row_field, t)));

                for &col_field in &StateField::ALL {
                    if A_mask[(i, col_field.index())] {
                        entries.push((row, l.state_index(col_field, t - 1)));
                    }
                }

                for &col_field in &InputField::ALL {
                    if B_mask[(i, col_field.index())] {
                        entries.push((row, l.input_index(col_field, t - 1)));
                    }
                }
            }
        }

        entries
    }

    pub fn jacobian_values(&self, z: &[float], p: &PathPolynomial, values: &mut [float]) {
        let l = self.layout;
        let (A_mask, B_mask) = self.model.linearise_sparsity();
        let mut k = 0;

        for _ in 0..NS {
            values[k] = 1.0;
            k += 1;
        }

        for t in 1..l.horizon() {
            let x_prev = l.state_at(z, t - 1);
            let u_prev = l.input_at(z, t - 1);
            let (A, B) = self.model.linearise(self.dt, &x_prev, &u_prev, p);

            for i in 0..NS {
                values[k] = 1.0;
                k += 1;

                for j in 0..NS {
                    if A_mask[(i, j)] {
                        values[k] = -A[(i, j)];
                        k += 1;
                    }
                }

                for j in 0..NI {
                    if B_mask[(i, j)] {
                        values[k] = -B[(i, j)];
                        k += 1;
                    }
                }
            }
        }

        assert_eq!(k, values.len(), "jacobian value count does not match sparsity");
    }
}
