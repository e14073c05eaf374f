#![allow(non_snake_case)]

extern crate config;
extern crate control_model;
#[macro_use]
extern crate log;
extern crate nlp;
extern crate prelude;
extern crate thiserror;

use control_model::{PathPolynomial, VehicleState};

mod bounds;
pub use bounds::BoundsBuilder;

mod cost;
pub use cost::{CostModel, CostTerms};

mod dynamics;
pub use dynamics::DynamicsConstraints;

mod error;
pub use error::MpcError;

mod formulation;
pub use formulation::MpcFormulation;

mod layout;
pub use layout::{InputField, StateField, VariableLayout};

mod mpc;
pub use mpc::{Mpc, MpcOutput};

/// One control cycle: measured state and reference path in, first command out.
pub trait Controller {
    fn step(&self, state: &VehicleState, path: &PathPolynomial) -> Result<MpcOutput, MpcError>;
}
