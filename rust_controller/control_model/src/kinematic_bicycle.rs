// Kinematic bicycle with path tracking error states, forward Euler discretised.
//
// x = [x, y, psi, v, cte, epsi], u = [delta, a]

use prelude::nalgebra::{Matrix6, Matrix6x2, Vector6};
use prelude::*;

use crate::{InputVector, PathPolynomial, StateVector};

pub struct KinematicBicycle {
    Lf: float,
}

impl KinematicBicycle {
    /// `Lf` is the distance from the front axle to the centre of gravity.
    pub fn new(Lf: float) -> KinematicBicycle {
        assert!(Lf > 0.0, "Lf must be positive");
        KinematicBicycle { Lf }
    }

    /// Advances the state by one timestep. `p` is the reference path the
    /// error states are measured against.
    pub fn step(
        &self,
        dt: float,
        x: &StateVector,
        u: &InputVector,
        p: &PathPolynomial,
    ) -> StateVector {
        let [x0, y0, psi0, v0, _cte0, epsi0, delta0, a0] = unpack(x, u);

        let f0 = p.evaluate(x0);
        let psides0 = p.heading(x0);
        let psi_dot = v0 / self.Lf * delta0;

        Vector6::new(
            x0 + v0 * psi0.cos() * dt,
            y0 + v0 * psi0.sin() * dt,
            psi0 + psi_dot * dt,
            v0 + a0 * dt,
            f0 - y0 + v0 * epsi0.sin() * dt,
            psi0 - psides0 + psi_dot * dt,
        )
    }

    /// Jacobians of `step` with respect to the state and the input.
    pub fn linearise(
        &self,
        dt: float,
        x: &StateVector,
        u: &InputVector,
        p: &PathPolynomial,
    ) -> (Matrix6<float>, Matrix6x2<float>) {
        let [x0, _y0, psi0, v0, _cte0, epsi0, delta0, _a0] = unpack(x, u);

        let (sin_psi, cos_psi) = psi0.sin_cos();
        let (sin_epsi, cos_epsi) = epsi0.sin_cos();
        let df0 = p.derivative(x0);
        let dpsides0 = p.heading_derivative(x0);
        let inv_Lf = 1.0 / self.Lf;

        #[cfg_attr(rustfmt, rustfmt_skip)]
        let A = Matrix6::new(
            1.0, 0.0, -v0 * sin_psi * dt, cos_psi * dt, 0.0, 0.0,
            0.0, 1.0, v0 * cos_psi * dt, sin_psi * dt, 0.0, 0.0,
            0.0, 0.0, 1.0, inv_Lf * delta0 * dt, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0,
            df0, -1.0, 0.0, sin_epsi * dt, 0.0, v0 * cos_epsi * dt,
            -dpsides0, 0.0, 1.0, inv_Lf * delta0 * dt, 0.0, 0.0,
        );

        #[cfg_attr(rustfmt, rustfmt_skip)]
        let B = Matrix6x2::new(
            0.0, 0.0,
            0.0, 0.0,
            inv_Lf * v0 * dt, 0.0,
            0.0, dt,
            0.0, 0.0,
            inv_Lf * v0 * dt, 0.0,
        );

        (A, B)
    }

    /// Returns two boolean matrices with true everywhere A and B could contain a non-zero value
    pub fn linearise_sparsity(&self) -> (Matrix6<bool>, Matrix6x2<bool>) {
        #[cfg_attr(rustfmt, rustfmt_skip)]
        let A_mask = Matrix6::new(
            true, false, true, true, false, false,
            false, true, true, true, false, false,
            false, false, true, true, false, false,
            false, false, false, true, false, false,
            true, true, false, true, false, true,
            true, false, true, true, false, false,
        );

        #[cfg_attr(rustfmt, rustfmt_skip)]
        let B_mask = Matrix6x2::new(
            false, false,
            false, false,
            true, false,
            false, true,
            false, false,
            true, false,
        );

        (A_mask, B_mask)
    }
}

#[inline(always)]
fn unpack(x: &StateVector, u: &InputVector) -> [float; 8] {
    // [x, y, psi, v, cte, epsi, delta, a]
    [x[0], x[1], x[2], x[3], x[4], x[5], u[0], u[1]]
}

#[cfg(test)]
mod tests {
    use prelude::nalgebra::{Vector2, Vector6};

    use super::*;

    fn model() -> KinematicBicycle {
        KinematicBicycle::new(2.67)
    }

    #[test]
    fn stationary_vehicle_only_updates_errors() {
        let p = PathPolynomial::new([0.5, 0.2, -0.1, 0.01]);
        let x = Vector6::new(1.0, -0.3, 0.4, 0.0, 0.9, 0.1);
        let u = Vector2::new(0.0, 0.0);
        let x1 = model().step(0.1, &x, &u, &p);

        assert_eq!(x1[0], 1.0);
        assert_eq!(x1[1], -0.3);
        assert_eq!(x1[2], 0.4);
        assert_eq!(x1[3], 0.0);
        assert!((x1[4] - (p.evaluate(1.0) + 0.3)).abs() < 1e-12);
        assert!((x1[5] - (0.4 - p.heading(1.0))).abs() < 1e-12);
    }

    #[test]
    fn straight_line_at_speed() {
        let p = PathPolynomial::default();
        let x = Vector6::new(0.0, 0.0, 0.0, 10.0, 0.0, 0.0);
        let u = Vector2::new(0.0, 0.5);
        let x1 = model().step(0.1, &x, &u, &p);
        assert!((x1[0] - 1.0).abs() < 1e-12);
        assert!((x1[3] - 10.05).abs() < 1e-12);
        assert_eq!(x1[1], 0.0);
        assert_eq!(x1[2], 0.0);
    }

    #[test]
    fn steering_turns_left() {
        let p = PathPolynomial::default();
        let x = Vector6::new(0.0, 0.0, 0.0, 10.0, 0.0, 0.0);
        let u = Vector2::new(0.1, 0.0);
        let x1 = model().step(0.1, &x, &u, &p);
        let expected = 10.0 / 2.67 * 0.1 * 0.1;
        assert!((x1[2] - expected).abs() < 1e-12);
        assert!((x1[5] - expected).abs() < 1e-12);
    }

    #[test]
    fn linearise_matches_finite_difference() {
        let m = model();
        let dt = 0.1;
        let p = PathPolynomial::new([0.3, -0.2, 0.05, -0.004]);
        let x = Vector6::new(1.2, -0.4, 0.3, 7.5, 0.2, -0.15);
        let u = Vector2::new(0.12, -0.4);
        let (A, B) = m.linearise(dt, &x, &u, &p);

        let h = 1e-6;
        for j in 0..6 {
            let mut xp = x;
            let mut xm = x;
            xp[j] += h;
            xm[j] -= h;
            let col = (m.step(dt, &xp, &u, &p) - m.step(dt, &xm, &u, &p)) / (2.0 * h);
            for i in 0..6 {
                assert!(
                    (A[(i, j)] - col[i]).abs() < 1e-6,
                    "A[({}, {})] = {}, expected {}",
                    i,
                    j,
                    A[(i, j)],
                    col[i]
                );
            }
        }
        for j in 0..2 {
            let mut up = u;
            let mut um = u;
            up[j] += h;
            um[j] -= h;
            let col = (m.step(dt, &x, &up, &p) - m.step(dt, &x, &um, &p)) / (2.0 * h);
            for i in 0..6 {
                assert!((B[(i, j)] - col[i]).abs() < 1e-6, "B[({}, {})]", i, j);
            }
        }
    }

    #[test]
    fn sparsity_covers_jacobian() {
        let m = model();
        let (A_mask, B_mask) = m.linearise_sparsity();
        let p = PathPolynomial::new([0.3, -0.2, 0.05, -0.004]);
        let x = Vector6::new(1.2, -0.4, 0.3, 7.5, 0.2, -0.15);
        let u = Vector2::new(0.12, -0.4);
        let (A, B) = m.linearise(0.1, &x, &u, &p);
        for (v, &mask) in A.iter().zip(A_mask.iter()) {
            assert!(mask || *v == 0.0);
        }
        for (v, &mask) in B.iter().zip(B_mask.iter()) {
            assert!(mask || *v == 0.0);
        }
    }
}
