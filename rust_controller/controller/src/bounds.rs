use std::ops::Range;

use config::{Limits, MpcConfig};
use control_model::VehicleState;
use nlp::Bounds;
use prelude::*;

use crate::layout::{InputField, StateField, VariableLayout};

pub struct BoundsBuilder<'a> {
    layout: &'a VariableLayout,
    limits: &'a Limits,
}

impl<'a> BoundsBuilder<'a> {
    pub fn new(config: &'a MpcConfig, layout: &'a VariableLayout) -> BoundsBuilder<'a> {
        BoundsBuilder {
            layout,
            limits: &config.limits,
        }
    }

    /// Per-variable box. Position and error states are free, heading is
    /// limited to one turn, speed and actuators to their physical limits.
    pub fn variables(&self) -> Bounds {
        let l = self.layout;
        let unbounded = self.limits.unbounded;
        let mut bounds = Bounds::from_element(l.len(), -unbounded, unbounded);

        let mut set_block = |range: Range<usize>, magnitude: float| {
            for i in range {
                bounds.set(i, -magnitude, magnitude);
            }
        };

        set_block(l.state(StateField::Psi), PI);
        set_block(l.state(StateField::V), self.limits.max_speed);
        set_block(l.input(InputField::Steering), self.limits.max_steering);
        set_block(l.input(InputField::Throttle), self.limits.max_throttle);

        bounds
    }

    /// Every dynamics row must be zero, except the first row of each state
    /// block which is pinned to the measured state.
    pub fn constraints(&self, state: &VehicleState) -> Bounds {
        let l = self.layout;
        let mut bounds = Bounds::from_element(l.num_constraints(), 0.0, 0.0);
        let measured = state.to_array();

        for &field in &StateField::ALL {
            bounds.fix(l.constraint_row(field, 0), measured[field.index()]);
        }

        bounds
    }
}
