use prelude::*;

use crate::{NlpProblem, SolverOptions};

/// Relative step of the dense forward difference.
const FD_STEP: float = 1e-7;

/// Constraint Jacobian storage. Entries are `(row, column, value)` triplets;
/// without `sparse_forward` the pattern is every cell in column-major order.
pub struct Jacobian {
    nrows: usize,
    ncols: usize,
    pattern: Vec<(usize, usize)>,
    values: Vec<float>,
    sparse_forward: bool,
    sparse_reverse: bool,
    c0: Vec<float>,
    c1: Vec<float>,
    z1: Vec<float>,
}

impl Jacobian {
    pub fn new<P: NlpProblem>(problem: &P, options: &SolverOptions) -> Jacobian {
        let nrows = problem.num_constraints();
        let ncols = problem.num_variables();

        let pattern = if options.sparse_forward {
            let pattern = problem.jacobian_sparsity();
            for &(r, c) in &pattern {
                assert!(
                    r < nrows && c < ncols,
                    "jacobian entry ({}, {}) outside {}x{}",
                    r,
                    c,
                    nrows,
                    ncols
                );
            }
            pattern
        } else {
            (0..ncols)
                .flat_map(|c| (0..nrows).map(move |r| (r, c)))
                .collect()
        };

        Jacobian {
            nrows,
            ncols,
            values: vec![0.0; pattern.len()],
            pattern,
            sparse_forward: options.sparse_forward,
            sparse_reverse: options.sparse_reverse,
            c0: vec![0.0; nrows],
            c1: vec![0.0; nrows],
            z1: vec![0.0; ncols],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn nnz(&self) -> usize {
        self.pattern.len()
    }

    pub fn update<P: NlpProblem>(&mut self, problem: &P, z: &[float]) {
        if self.sparse_forward {
            problem.jacobian_values(z, &mut self.values);
            return;
        }

        // One forward difference per column
        problem.constraints(z, &mut self.c0);
        self.z1.copy_from_slice(z);
        for col in 0..self.ncols {
            let h = FD_STEP * max(1.0, z[col].abs());
            self.z1[col] = z[col] + h;
            problem.constraints(&self.z1, &mut self.c1);
            self.z1[col] = z[col];

            let column = &mut self.values[col * self.nrows..(col + 1) * self.nrows];
            for ((v, &c1), &c0) in column.iter_mut().zip(&self.c1).zip(&self.c0) {
                *v = (c1 - c0) / h;
            }
        }
    }

    /// `out = J^T y`
    pub fn transpose_mul(&self, y: &[float], out: &mut [float]) {
        assert_eq!(y.len(), self.nrows);
        assert_eq!(out.len(), self.ncols);

        if self.sparse_reverse {
            for v in out.iter_mut() {
                *v = 0.0;
            }
            for (&(r, c), &v) in self.pattern.iter().zip(&self.values) {
                out[c] += v * y[r];
            }
        } else {
            let jt_y = self.to_dense().tr_mul(&DVector::from_column_slice(y));
            out.copy_from_slice(jt_y.as_slice());
        }
    }

    pub fn to_dense(&self) -> DMatrix<float> {
        let mut jac = DMatrix::zeros(self.nrows, self.ncols);
        for (&(r, c), &v) in self.pattern.iter().zip(&self.values) {
            jac[(r, c)] += v;
        }
        jac
    }
}
