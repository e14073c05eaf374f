#![allow(non_snake_case)]

extern crate prelude;
extern crate serde;
#[macro_use]
extern crate serde_derive;

use prelude::nalgebra::{Vector2, Vector6};
use prelude::*;

mod kinematic_bicycle;
pub use kinematic_bicycle::KinematicBicycle;

mod polynomial;
pub use polynomial::PathPolynomial;

/// Number of model states: x, y, psi, v, cte, epsi.
pub const NS: usize = 6;
/// Number of model inputs: steering, throttle.
pub const NI: usize = 2;

pub type StateVector = Vector<U6>;
pub type InputVector = Vector<U2>;

/// Pose and tracking error snapshot of the vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub x: float,
    pub y: float,
    pub psi: float,
    pub v: float,
    pub cte: float,
    pub epsi: float,
}

impl VehicleState {
    pub fn new(x: float, y: float, psi: float, v: float, cte: float, epsi: float) -> VehicleState {
        VehicleState {
            x,
            y,
            psi,
            v,
            cte,
            epsi,
        }
    }

    /// Components in model order.
    pub fn to_array(&self) -> [float; NS] {
        [self.x, self.y, self.psi, self.v, self.cte, self.epsi]
    }

    pub fn to_vector(&self) -> StateVector {
        Vector6::from_column_slice(&self.to_array())
    }

    pub fn from_vector(x: &StateVector) -> VehicleState {
        VehicleState::new(x[0], x[1], x[2], x[3], x[4], x[5])
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Actuator command. Steering in radians, throttle normalised to [-1, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Actuation {
    pub steering: float,
    pub throttle: float,
}

impl Actuation {
    pub fn new(steering: float, throttle: float) -> Actuation {
        Actuation { steering, throttle }
    }

    pub fn to_vector(&self) -> InputVector {
        Vector2::new(self.steering, self.throttle)
    }

    pub fn from_vector(u: &InputVector) -> Actuation {
        Actuation::new(u[0], u[1])
    }

    /// Fallback when no fresh command is available: keep the wheel where it
    /// was and brake fully.
    pub fn hold_or_brake(previous: Option<Actuation>) -> Actuation {
        Actuation {
            steering: previous.map_or(0.0, |p| p.steering),
            throttle: -1.0,
        }
    }
}
