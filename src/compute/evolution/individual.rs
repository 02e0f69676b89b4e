//! Members of the population.

use crate::compute::Robot;
use crate::schema::{CommandSet, IndividualSnapshot, SummaryRow};

use super::fitness::FitnessTable;
use super::genome::{GenomeRng, Mutation};

/// A robot with its lineage, age and scores.
#[derive(Debug, Clone)]
pub struct Individual {
    pub id: u64,
    pub parent_id: Option<u64>,
    /// Generations since this lineage was last seeded with a random genome.
    pub age: usize,
    pub robot: Robot,
    pub fitness: FitnessTable,
    pub needs_evaluation: bool,
}

impl Individual {
    /// Newcomer with age 0, not yet evaluated.
    pub fn new(id: u64, robot: Robot) -> Self {
        Self {
            id,
            parent_id: None,
            age: 0,
            robot,
            fitness: FitnessTable::default(),
            needs_evaluation: true,
        }
    }

    /// Turn this individual into its own offspring: take a new id, remember the
    /// old one as parent, drop the scores and apply one point mutation. Age is
    /// inherited.
    pub fn mutate(&mut self, id: u64, rng: &mut GenomeRng) -> Mutation {
        self.parent_id = Some(self.id);
        self.id = id;
        self.fitness = FitnessTable::default();
        self.needs_evaluation = true;
        rng.mutate(&mut self.robot.controller)
    }

    /// Mutated copy of `self` with the given id.
    pub fn spawn_child(&self, id: u64, rng: &mut GenomeRng) -> Self {
        let mut child = self.clone();
        let mutation = child.mutate(id, rng);
        log::trace!("Child {} of {}: {:?}", id, self.id, mutation);
        child
    }

    /// Aggregate train fitness, the selection objective.
    pub fn fitness(&self) -> f32 {
        self.fitness.aggregate(false)
    }

    /// Aggregate train plus test fitness, when test commands were scored.
    pub fn test_fitness(&self) -> Option<f32> {
        (!self.fitness.test.is_empty()).then(|| self.fitness.aggregate(true))
    }

    /// Pareto dominance on (lower age, higher train fitness).
    ///
    /// Exact ties on both objectives go to the newer individual so that two
    /// clones never protect each other.
    pub fn dominates(&self, other: &Individual) -> bool {
        let (fa, fb) = (self.fitness(), other.fitness());
        if self.age == other.age && fa == fb {
            return self.id > other.id;
        }
        self.age <= other.age && fa >= fb
    }

    /// Column names matching [`Individual::summary_row`] scores:
    /// `Train_<task>_<i>` then `Test_<task>_<i>`, tasks in sorted order.
    pub fn summary_columns(commands: &CommandSet, include_test: bool) -> Vec<String> {
        let mut columns = Vec::with_capacity(commands.evaluation_count(include_test));
        for (task, list) in &commands.train {
            columns.extend((0..list.len()).map(|i| format!("Train_{}_{}", task.name(), i)));
        }
        if include_test {
            for (task, list) in &commands.test {
                columns.extend((0..list.len()).map(|i| format!("Test_{}_{}", task.name(), i)));
            }
        }
        columns
    }

    pub fn summary_row(&self, generation: usize) -> SummaryRow {
        let scores = self
            .fitness
            .train
            .values()
            .chain(self.fitness.test.values())
            .flatten()
            .copied()
            .collect();

        SummaryRow {
            generation,
            id: self.id,
            parent_id: self.parent_id,
            age: self.age,
            fitness: self.fitness(),
            test_fitness: self.test_fitness(),
            scores,
        }
    }

    pub fn snapshot(&self) -> IndividualSnapshot {
        IndividualSnapshot {
            id: self.id,
            parent_id: self.parent_id,
            age: self.age,
            fitness: self.fitness(),
            test_fitness: self.test_fitness(),
            scores: self.fitness.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Morphology;
    use crate::schema::{Command, Task};

    fn individual(id: u64, age: usize, forward: f32) -> Individual {
        let robot = Robot::random(Morphology::default(), 3, &mut GenomeRng::new(id));
        let mut ind = Individual::new(id, robot);
        ind.age = age;
        ind.fitness.train.insert(Task::Forward, vec![forward]);
        ind.needs_evaluation = false;
        ind
    }

    #[test]
    fn test_spawn_child_tracks_lineage() {
        let mut rng = GenomeRng::new(2);
        let parent = individual(7, 4, 1.5);
        let child = parent.spawn_child(12, &mut rng);

        assert_eq!(child.id, 12);
        assert_eq!(child.parent_id, Some(7));
        assert_eq!(child.age, 4);
        assert!(child.needs_evaluation);
        assert!(child.fitness.is_empty());
        assert_ne!(child.robot.controller, parent.robot.controller);
        assert_eq!(parent.fitness(), 1.5);
    }

    #[test]
    fn test_dominance() {
        let young_fit = individual(1, 0, 2.0);
        let old_weak = individual(2, 3, 1.0);
        let old_fit = individual(3, 3, 5.0);

        assert!(young_fit.dominates(&old_weak));
        assert!(!old_weak.dominates(&young_fit));
        // Trade-off: neither dominates.
        assert!(!young_fit.dominates(&old_fit));
        assert!(!old_fit.dominates(&young_fit));
        assert!(!old_weak.dominates(&old_weak.clone()));
    }

    #[test]
    fn test_exact_tie_goes_to_newer() {
        let older = individual(4, 2, 1.0);
        let newer = individual(9, 2, 1.0);
        assert!(newer.dominates(&older));
        assert!(!older.dominates(&newer));
    }

    #[test]
    fn test_summary_columns_and_row_line_up() {
        let cmd = |w: &str| Command {
            words: vec![w.to_string()],
            encoding: vec![vec![0.0]],
        };
        let mut commands = CommandSet::default();
        commands.train.insert(Task::Stop, vec![cmd("stop"), cmd("cease")]);
        commands.train.insert(Task::Forward, vec![cmd("forward")]);
        commands.test.insert(Task::Stop, vec![cmd("halt")]);

        let columns = Individual::summary_columns(&commands, true);
        assert_eq!(
            columns,
            ["Train_forward_0", "Train_stop_0", "Train_stop_1", "Test_stop_0"]
        );
        assert_eq!(Individual::summary_columns(&commands, false).len(), 3);

        let mut ind = individual(1, 0, 0.5);
        ind.fitness.train.insert(Task::Stop, vec![-0.1, -0.2]);
        ind.fitness.test.insert(Task::Stop, vec![-0.3]);
        let row = ind.summary_row(6);
        assert_eq!(row.generation, 6);
        assert_eq!(row.scores, vec![0.5, -0.1, -0.2, -0.3]);
        assert!((row.fitness - 0.2).abs() < 1e-6);
        assert!((row.test_fitness.unwrap() + 0.1).abs() < 1e-6);
    }
}
