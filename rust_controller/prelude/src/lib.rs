pub extern crate flame;
pub extern crate nalgebra;
extern crate rand;
extern crate rand_distr;

#[allow(non_camel_case_types)]
pub type float = f64;
pub use std::f64::consts::PI;
pub use std::f64::{INFINITY, NAN, NEG_INFINITY};

/// Miles per hour to metres per second.
pub const MPH_TO_MPS: float = 0.447;

pub fn min<T: Copy + PartialOrd>(a: T, b: T) -> T {
    *nalgebra::partial_min(&a, &b).expect("NaN")
}

pub fn max<T: Copy + PartialOrd>(a: T, b: T) -> T {
    *nalgebra::partial_max(&a, &b).expect("NaN")
}

/// NaN in `v` passes through.
pub fn clamp(v: float, lo: float, hi: float) -> float {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

pub fn phase_unwrap(a: float, mut b: float) -> float {
    if a.is_infinite() || b.is_infinite() {
        return b;
    }
    while b > a + PI {
        b -= 2.0 * PI;
    }
    while b < a - PI {
        b += 2.0 * PI;
    }
    b
}

/// Wraps an angle into [-pi, pi].
pub fn wrap_angle(a: float) -> float {
    phase_unwrap(0.0, a)
}

pub fn randn() -> float {
    use rand::Rng;
    rand::thread_rng().sample(rand_distr::StandardNormal)
}

pub type Vector<N> = nalgebra::OVector<float, N>;

pub use nalgebra::{DMatrix, DVector, U2, U6};
