//! Age-fitness Pareto optimisation (AFPO).
//!
//! Each generation every individual grows one year older, the population is
//! doubled with mutated offspring and a single random newcomer, and the
//! doubled population is thinned back by discarding individuals that are both
//! older and less fit than someone else.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::compute::{Morphology, Robot};
use crate::schema::{
    EvolutionHistory, EvolutionPhase, EvolutionProgress, EvolutionResult, EvolutionStats,
    ExperimentConfig, PopulationConfig, StopReason,
};

use super::fitness::FitnessEvaluator;
use super::genome::{GenomeRng, genome_distance};
use super::individual::Individual;

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: PopulationConfig,
    morphology: Morphology,
    hidden_neurons: usize,
    rng: GenomeRng,
    evaluator: FitnessEvaluator,
    include_test: bool,
    population: Vec<Individual>,
    history: EvolutionHistory,
    generation: usize,
    /// Individuals evaluated in the latest generation.
    evaluated: usize,
    total_evaluations: u64,
    total_simulations: u64,
    started: Instant,
    next_id: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create an engine for `config`, scoring robots with `evaluator`.
    pub fn new(config: &ExperimentConfig, evaluator: FitnessEvaluator) -> Self {
        let include_test = evaluator.commands().test_count() > 0;
        Self {
            config: config.population.clone(),
            morphology: config.morphology,
            hidden_neurons: config.hidden_neurons,
            rng: GenomeRng::new(config.seed),
            evaluator,
            include_test,
            population: Vec::new(),
            history: EvolutionHistory::default(),
            generation: 0,
            evaluated: 0,
            total_evaluations: 0,
            total_simulations: 0,
            started: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Whether test commands are scored alongside train commands.
    pub fn includes_test(&self) -> bool {
        self.include_test
    }

    pub fn evaluator(&self) -> &FitnessEvaluator {
        &self.evaluator
    }

    fn newcomer(&mut self) -> Individual {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let robot = Robot::random(self.morphology, self.hidden_neurons, &mut self.rng);
        Individual::new(id, robot)
    }

    /// Fill the population with random robots.
    pub fn initialize(&mut self) {
        self.population.clear();
        self.generation = 0;
        for _ in 0..self.config.size {
            let individual = self.newcomer();
            self.population.push(individual);
        }
    }

    /// Evaluate every individual whose scores are stale.
    fn evaluate_population(&mut self) -> usize {
        let evaluator = &self.evaluator;
        let include_test = self.include_test;

        let pending = self
            .population
            .iter()
            .filter(|ind| ind.needs_evaluation)
            .count();

        self.population
            .par_iter_mut()
            .filter(|ind| ind.needs_evaluation)
            .for_each(|ind| {
                ind.fitness = evaluator.evaluate(&ind.robot, include_test);
                ind.needs_evaluation = false;
                log::debug!(
                    "Individual {} (age {}): fitness {:.4}",
                    ind.id,
                    ind.age,
                    ind.fitness()
                );
            });

        self.evaluated = pending;
        self.total_evaluations += pending as u64;
        self.total_simulations +=
            (pending * self.evaluator.commands().evaluation_count(include_test)) as u64;
        pending
    }

    /// Indices of individuals dominated by at least one other.
    fn dominated(&self) -> Vec<usize> {
        (0..self.population.len())
            .filter(|&i| {
                self.population
                    .iter()
                    .enumerate()
                    .any(|(j, other)| j != i && other.dominates(&self.population[i]))
            })
            .collect()
    }

    /// Thin the population back to its target size.
    ///
    /// Dominated individuals are removed at random. Removing a dominated
    /// individual never un-dominates another, so the dominated set is computed
    /// once. If the Pareto front alone is larger than the target, the least fit
    /// members of the front are dropped.
    fn reduce(&mut self) {
        let target = self.config.size;
        if self.population.len() <= target {
            return;
        }

        let excess = self.population.len() - target;
        let mut dominated = self.dominated();
        dominated.shuffle(self.rng.inner());
        let doomed: HashSet<u64> = dominated
            .into_iter()
            .take(excess)
            .map(|i| self.population[i].id)
            .collect();
        self.population.retain(|ind| !doomed.contains(&ind.id));

        if self.population.len() > target {
            log::debug!(
                "Pareto front of {} exceeds population size; truncating by fitness",
                self.population.len()
            );
            self.population.sort_by(|a, b| {
                b.fitness()
                    .total_cmp(&a.fitness())
                    .then(a.age.cmp(&b.age))
            });
            self.population.truncate(target);
        }
    }

    /// `size - 1` mutated copies of random parents plus one age-0 newcomer.
    fn reproduce(&mut self) -> Vec<Individual> {
        let parents = self.population.len();
        let mut offspring = Vec::with_capacity(self.config.size);
        for _ in 0..self.config.size.saturating_sub(1) {
            let parent = self.rng.index(parents);
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            offspring.push(self.population[parent].spawn_child(id, &mut self.rng));
        }
        let newcomer = self.newcomer();
        offspring.push(newcomer);
        offspring
    }

    /// Run a single generation: age, reproduce, evaluate, reduce.
    fn step_generation(&mut self) {
        for ind in &mut self.population {
            ind.age += 1;
        }

        let offspring = self.reproduce();
        self.population.extend(offspring);

        self.evaluate_population();
        self.reduce();
        self.generation += 1;
    }

    fn best(&self) -> Option<&Individual> {
        self.population
            .iter()
            .max_by(|a, b| a.fitness().total_cmp(&b.fitness()).then(b.age.cmp(&a.age)))
    }

    fn avg_fitness(&self) -> f32 {
        if self.population.is_empty() {
            return 0.0;
        }
        self.population.iter().map(Individual::fitness).sum::<f32>() / self.population.len() as f32
    }

    fn mean_age(&self) -> f32 {
        if self.population.is_empty() {
            return 0.0;
        }
        self.population.iter().map(|i| i.age as f32).sum::<f32>() / self.population.len() as f32
    }

    /// Mean pairwise weight distance.
    fn compute_diversity(&self) -> f32 {
        let n = self.population.len();
        if n < 2 {
            return 0.0;
        }
        let mut total = 0.0f32;
        for i in 0..n {
            for j in (i + 1)..n {
                total += genome_distance(
                    &self.population[i].robot.controller,
                    &self.population[j].robot.controller,
                );
            }
        }
        total / (n * (n - 1) / 2) as f32
    }

    fn record_history(&mut self) {
        let best = self.best().map_or(0.0, Individual::fitness);
        let avg = self.avg_fitness();
        let age = self.mean_age();
        let diversity = self.compute_diversity();
        self.history.best_fitness.push(best);
        self.history.avg_fitness.push(avg);
        self.history.mean_age.push(age);
        self.history.diversity.push(diversity);

        log::info!(
            "Generation {}: best {:.4}, mean {:.4}, mean age {:.1}",
            self.generation,
            best,
            avg,
            age
        );
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        let phase = if self.cancelled.load(Ordering::Relaxed) {
            EvolutionPhase::Stopped
        } else if self.population.iter().any(|i| i.needs_evaluation) {
            EvolutionPhase::Initializing
        } else {
            EvolutionPhase::Evaluating
        };

        EvolutionProgress {
            generation: self.generation,
            total_generations: self.config.max_generations,
            evaluations_completed: self.evaluated,
            best_fitness: self.best().map_or(0.0, Individual::fitness),
            avg_fitness: self.avg_fitness(),
            mean_age: self.mean_age(),
            pareto_front_size: self.population.len() - self.dominated().len(),
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
            best: self.best().map(Individual::snapshot),
            phase,
        }
    }

    /// Check if evolution should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if self.generation >= self.config.max_generations {
            return Some(StopReason::MaxGenerations);
        }

        if let Some(target) = self.config.target_fitness
            && self.best().is_some_and(|b| b.fitness() >= target)
        {
            return Some(StopReason::TargetReached);
        }

        if self.started.elapsed().as_secs_f64() >= self.config.max_runtime_hours * 3600.0 {
            return Some(StopReason::MaxRuntime);
        }

        None
    }

    /// Run evolution, calling `callback` with the progress and the current
    /// population after the initial evaluation and after every generation.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> EvolutionResult
    where
        F: FnMut(&EvolutionProgress, &[Individual]),
    {
        self.started = Instant::now();
        self.history = EvolutionHistory::default();
        self.evaluated = 0;
        self.total_evaluations = 0;
        self.total_simulations = 0;

        self.initialize();
        log::info!(
            "Evaluating initial population of {} {} robots",
            self.population.len(),
            self.morphology.name()
        );
        self.evaluate_population();
        self.record_history();
        callback(&self.progress(), &self.population);

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }

            self.step_generation();
            self.record_history();
            callback(&self.progress(), &self.population);
        };
        log::info!("Stopped after {} generations: {:?}", self.generation, stop_reason);

        self.result(stop_reason)
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> EvolutionResult {
        self.run_with_callback(|_, _| {})
    }

    fn result(&self, stop_reason: StopReason) -> EvolutionResult {
        let elapsed = self.started.elapsed().as_secs_f64();
        let best = self
            .best()
            .cloned()
            .unwrap_or_else(|| unreachable!("population is never empty after initialize"));

        EvolutionResult {
            best: best.snapshot(),
            best_robot: best.robot,
            population: self.population.iter().map(Individual::snapshot).collect(),
            stats: EvolutionStats {
                generations: self.generation,
                total_evaluations: self.total_evaluations,
                total_simulations: self.total_simulations,
                best_fitness: self.best().map_or(0.0, Individual::fitness),
                best_test_fitness: self.best().and_then(Individual::test_fitness),
                final_avg_fitness: self.avg_fitness(),
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    self.total_evaluations as f64 / elapsed
                } else {
                    0.0
                },
                stop_reason,
            },
            history: self.history.clone(),
        }
    }
}
