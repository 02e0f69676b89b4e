//! Random generation and mutation of controller weights.

use rand::prelude::*;
use rand_distr::StandardNormal;

use crate::compute::{RecurrentController, SynapseMatrix};

/// Which weight a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynapseLayer {
    Hidden,
    Motor,
}

/// Record of a single point mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mutation {
    pub layer: SynapseLayer,
    pub row: usize,
    pub col: usize,
    pub before: f32,
    pub after: f32,
}

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Matrix of N(0, 1) weights.
    pub fn normal_matrix(&mut self, rows: usize, cols: usize) -> SynapseMatrix {
        let mut m = SynapseMatrix::zeros(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                m.set(r, c, self.rng.sample(StandardNormal));
            }
        }
        m
    }

    /// Fresh controller with N(0, 1) weights.
    pub fn random_controller(
        &mut self,
        hidden_neurons: usize,
        sensor_neurons: usize,
        motor_neurons: usize,
    ) -> RecurrentController {
        let (hr, hc) = RecurrentController::hidden_shape(hidden_neurons, sensor_neurons);
        let (mr, mc) = RecurrentController::motor_shape(hidden_neurons, motor_neurons);
        let h_synapses = self.normal_matrix(hr, hc);
        let m_synapses = self.normal_matrix(mr, mc);
        RecurrentController::new(
            hidden_neurons,
            sensor_neurons,
            motor_neurons,
            h_synapses,
            m_synapses,
        )
        .unwrap_or_else(|e| unreachable!("shapes derived from neuron counts: {e}"))
    }

    /// Point mutation: pick a layer with equal odds, then one weight `w` uniformly,
    /// and resample it from N(w, |w|).
    ///
    /// The spread scales with the weight, so a weight of exactly zero never moves.
    pub fn mutate(&mut self, controller: &mut RecurrentController) -> Mutation {
        let layer = if self.rng.gen_bool(0.5) {
            SynapseLayer::Hidden
        } else {
            SynapseLayer::Motor
        };
        let matrix = match layer {
            SynapseLayer::Hidden => controller.h_synapses_mut(),
            SynapseLayer::Motor => controller.m_synapses_mut(),
        };

        let row = self.rng.gen_range(0..matrix.rows());
        let col = self.rng.gen_range(0..matrix.cols());
        let before = matrix.get(row, col);
        let noise: f32 = self.rng.sample(StandardNormal);
        let after = before + before.abs() * noise;
        matrix.set(row, col, after);

        Mutation {
            layer,
            row,
            col,
            before,
            after,
        }
    }

    /// Uniform index in `0..n`.
    pub fn index(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }

    /// Generate next u64 for seeding child RNGs.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }

    /// Underlying generator, for shuffles and choices.
    pub fn inner(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

/// Mean absolute weight difference between two controllers of equal shape.
pub fn genome_distance(a: &RecurrentController, b: &RecurrentController) -> f32 {
    let pairs = a
        .h_synapses()
        .as_slice()
        .iter()
        .zip(b.h_synapses().as_slice())
        .chain(a.m_synapses().as_slice().iter().zip(b.m_synapses().as_slice()));

    let (sum, count) = pairs.fold((0.0f32, 0usize), |(s, n), (x, y)| (s + (x - y).abs(), n + 1));
    if count > 0 { sum / count as f32 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_controller_shapes() {
        let mut rng = GenomeRng::new(42);
        let c = rng.random_controller(5, 4, 8);
        assert_eq!(c.h_synapses().shape(), (5, 10));
        assert_eq!(c.m_synapses().shape(), (8, 5));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_weights_look_standard_normal() {
        let mut rng = GenomeRng::new(7);
        let m = rng.normal_matrix(100, 100);
        let n = m.as_slice().len() as f32;
        let mean = m.as_slice().iter().sum::<f32>() / n;
        let var = m.as_slice().iter().map(|w| (w - mean).powi(2)).sum::<f32>() / n;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_same_seed_same_controller() {
        let a = GenomeRng::new(3).random_controller(4, 1, 2);
        let b = GenomeRng::new(3).random_controller(4, 1, 2);
        assert_eq!(a, b);
        assert_eq!(genome_distance(&a, &b), 0.0);
    }

    #[test]
    fn test_mutation_changes_exactly_one_weight() {
        let mut rng = GenomeRng::new(11);
        let original = rng.random_controller(5, 0, 8);

        for _ in 0..50 {
            let mut c = original.clone();
            let m = rng.mutate(&mut c);

            let (before, after) = match m.layer {
                SynapseLayer::Hidden => (original.h_synapses(), c.h_synapses()),
                SynapseLayer::Motor => (original.m_synapses(), c.m_synapses()),
            };
            let changed = before
                .as_slice()
                .iter()
                .zip(after.as_slice())
                .filter(|(x, y)| x != y)
                .count();
            assert!(changed <= 1);
            assert_eq!(after.get(m.row, m.col), m.after);
            assert_eq!(before.get(m.row, m.col), m.before);
        }
    }

    #[test]
    fn test_zero_weight_is_fixed_point() {
        let mut rng = GenomeRng::new(5);
        let zeros = RecurrentController::new(
            2,
            0,
            1,
            SynapseMatrix::zeros(2, 3),
            SynapseMatrix::zeros(1, 2),
        )
        .unwrap();
        let mut c = zeros.clone();
        for _ in 0..20 {
            let m = rng.mutate(&mut c);
            assert_eq!(m.after, 0.0);
        }
        assert_eq!(c, zeros);
    }

    #[test]
    fn test_both_layers_get_mutated() {
        let mut rng = GenomeRng::new(9);
        let mut c = rng.random_controller(3, 0, 2);
        let layers: Vec<_> = (0..100).map(|_| rng.mutate(&mut c).layer).collect();
        assert!(layers.contains(&SynapseLayer::Hidden));
        assert!(layers.contains(&SynapseLayer::Motor));
    }
}
