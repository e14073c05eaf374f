use prelude::*;

/// Cubic fit of the reference path, `y = c0 + c1 x + c2 x^2 + c3 x^3`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PathPolynomial {
    coeffs: [float; 4],
}

impl PathPolynomial {
    pub fn new(coeffs: [float; 4]) -> PathPolynomial {
        PathPolynomial { coeffs }
    }

    /// Returns `None` unless exactly four coefficients are given.
    pub fn from_slice(coeffs: &[float]) -> Option<PathPolynomial> {
        if coeffs.len() != 4 {
            return None;
        }
        let mut c = [0.0; 4];
        c.copy_from_slice(coeffs);
        Some(PathPolynomial::new(c))
    }

    pub fn coeffs(&self) -> &[float; 4] {
        &self.coeffs
    }

    pub fn is_finite(&self) -> bool {
        self.coeffs.iter().all(|c| c.is_finite())
    }

    pub fn evaluate(&self, x: float) -> float {
        let [c0, c1, c2, c3] = self.coeffs;
        c0 + c1 * x + c2 * x * x + c3 * x * x * x
    }

    pub fn derivative(&self, x: float) -> float {
        let [_, c1, c2, c3] = self.coeffs;
        3.0 * c3 * x * x + 2.0 * c2 * x + c1
    }

    pub fn second_derivative(&self, x: float) -> float {
        let [_, _, c2, c3] = self.coeffs;
        6.0 * c3 * x + 2.0 * c2
    }

    /// Tangent direction of the path at `x`.
    pub fn heading(&self, x: float) -> float {
        self.derivative(x).atan()
    }

    /// d(heading)/dx
    pub fn heading_derivative(&self, x: float) -> float {
        let g = self.derivative(x);
        self.second_derivative(x) / (1.0 + g * g)
    }
}
