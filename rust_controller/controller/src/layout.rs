use std::ops::Range;

use control_model::{InputVector, StateVector, NI, NS};
use prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateField {
    X = 0,
    Y = 1,
    Psi = 2,
    V = 3,
    Cte = 4,
    Epsi = 5,
}

impl StateField {
    pub const ALL: [StateField; NS] = [
        StateField::X,
        StateField::Y,
        StateField::Psi,
        StateField::V,
        StateField::Cte,
        StateField::Epsi,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputField {
    Steering = 0,
    Throttle = 1,
}

impl InputField {
    pub const ALL: [InputField; NI] = [InputField::Steering, InputField::Throttle];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Where each named quantity lives in the flat decision vector.
///
/// Six state blocks of length N (x, y, psi, v, cte, epsi) are followed by two
/// input blocks of length N - 1 (steering, throttle). Constraint rows use the
/// same block order as the states, one row per state per timestep.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableLayout {
    N: usize,
    states: [Range<usize>; NS],
    inputs: [Range<usize>; NI],
}

impl VariableLayout {
    pub fn new(N: usize) -> VariableLayout {
        assert!(N >= 2, "horizon must have at least two steps");

        let block = |i: usize, len: usize, offset: usize| (offset + i * len)..(offset + (i + 1) * len);
        let inputs_start = NS * N;

        VariableLayout {
            N,
            states: [
                block(0, N, 0),
                block(1, N, 0),
                block(2, N, 0),
                block(3, N, 0),
                block(4, N, 0),
                block(5, N, 0),
            ],
            inputs: [
                block(0, N - 1, inputs_start),
                block(1, N - 1, inputs_start),
            ],
        }
    }

    pub fn horizon(&self) -> usize {
        self.N
    }

    /// Length of the decision vector, `N * 6 + (N - 1) * 2`.
    pub fn len(&self) -> usize {
        self.inputs[NI - 1].end
    }

    pub fn num_constraints(&self) -> usize {
        self.N * NS
    }

    pub fn state(&self, field: StateField) -> Range<usize> {
        self.states[field.index()].clone()
    }

    pub fn input(&self, field: InputField) -> Range<usize> {
        self.inputs[field.index()].clone()
    }

    pub fn state_index(&self, field: StateField, t: usize) -> usize {
        debug_assert!(t < self.N);
        self.states[field.index()].start + t
    }

    pub fn input_index(&self, field: InputField, t: usize) -> usize {
        debug_assert!(t < self.N - 1);
        self.inputs[field.index()].start + t
    }

    pub fn constraint_row(&self, field: StateField, t: usize) -> usize {
        debug_assert!(t < self.N);
        field.index() * self.N + t
    }

    pub fn states<'a>(&self, z: &'a [float], field: StateField) -> &'a [float] {
        &z[self.state(field)]
    }

    pub fn inputs<'a>(&self, z: &'a [float], field: InputField) -> &'a [float] {
        &z[self.input(field)]
    }

    pub fn state_at(&self, z: &[float], t: usize) -> StateVector {
        StateVector::from_fn(|i, _| z[self.states[i].start + t])
    }

    pub fn input_at(&self, z: &[float], t: usize) -> InputVector {
        InputVector::from_fn(|i, _| z[self.inputs[i].start + t])
    }

    pub fn set_state(&self, z: &mut [float], t: usize, x: &StateVector) {
        for (range, &v) in self.states.iter().zip(x.iter()) {
            z[range.start + t] = v;
        }
    }

    pub fn set_input(&self, z: &mut [float], t: usize, u: &InputVector) {
        for (range, &v) in self.inputs.iter().zip(u.iter()) {
            z[range.start + t] = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use prelude::nalgebra::{Vector2, Vector6};

    use super::*;

    #[test]
    fn decision_vector_length() {
        for N in 2..40 {
            let layout = VariableLayout::new(N);
            assert_eq!(layout.len(), N * 6 + (N - 1) * 2);
            assert_eq!(layout.num_constraints(), N * 6);
        }
    }

    #[test]
    fn blocks_partition_the_vector() {
        let layout = VariableLayout::new(7);
        let mut owner = vec![None; layout.len()];

        let mut claim = |range: Range<usize>, name: String| {
            for i in range {
                assert!(owner[i].is_none(), "index {} claimed twice", i);
                owner[i] = Some(name.clone());
            }
        };
        for &f in &StateField::ALL {
            assert_eq!(layout.state(f).len(), 7);
            claim(layout.state(f), format!("{:?}", f));
        }
        for &f in &InputField::ALL {
            assert_eq!(layout.input(f).len(), 6);
            claim(layout.input(f), format!("{:?}", f));
        }

        assert!(owner.iter().all(|o| o.is_some()));
    }

    #[test]
    fn block_order() {
        let N = 10;
        let layout = VariableLayout::new(N);
        assert_eq!(layout.state(StateField::X), 0..10);
        assert_eq!(layout.state(StateField::Epsi), 50..60);
        // Steering starts after the last heading error entry
        assert_eq!(layout.input(InputField::Steering), 60..69);
        assert_eq!(layout.input(InputField::Throttle), 69..78);
        assert_eq!(layout.state_index(StateField::V, 3), 33);
        assert_eq!(layout.input_index(InputField::Throttle, 0), 69);
        assert_eq!(layout.constraint_row(StateField::Cte, 0), 40);
    }

    #[test]
    fn gather_and_scatter() {
        let layout = VariableLayout::new(4);
        let mut z = vec![0.0; layout.len()];
        let x = Vector6::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let u = Vector2::new(-0.1, 0.2);
        layout.set_state(&mut z, 2, &x);
        layout.set_input(&mut z, 1, &u);

        assert_eq!(layout.state_at(&z, 2), x);
        assert_eq!(layout.input_at(&z, 1), u);
        assert_eq!(layout.state_at(&z, 1), Vector6::zeros());
        assert_eq!(layout.states(&z, StateField::Psi), &[0.0, 0.0, 3.0, 0.0]);
        assert_eq!(layout.inputs(&z, InputField::Throttle), &[0.0, 0.2, 0.0]);
    }
}
