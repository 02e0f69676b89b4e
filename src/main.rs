//! w2v-robots CLI - Run evolution experiments from JSON configuration.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use w2v_robots::{
    compute::{
        Robot,
        evolution::{
            ArchiveError, BEST_FILE, EvolutionEngine, FitnessEvaluator, GenomeRng, Individual,
            RunArchive, load_best,
        },
    },
    schema::{Command, CommandSet, ExperimentConfig, Task},
    vectors::{JsonVectorSpace, VectorSpace, cosine_similarity},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "--example" => {
            let name = args.get(2).map_or("Quad_HDN_05", String::as_str);
            let seed = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);
            print_example_config(name, seed);
        }
        "--compare" if args.len() >= 5 => compare_words(Path::new(&args[2]), &args[3], &args[4]),
        "--show" if args.len() >= 4 => show_word(Path::new(&args[2]), &args[3]),
        flag if flag.starts_with("--") => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
        path => run_experiment(Path::new(path)),
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <experiment.json>", program);
    eprintln!("       {} --example [name] [seed]", program);
    eprintln!("       {} --compare <vectors.json> <word> <word>", program);
    eprintln!("       {} --show <experiment.json> <word>", program);
    eprintln!();
    eprintln!("Evolve robot controllers that respond to spoken commands.");
    eprintln!();
    eprintln!("Experiment names may contain Quad, Twig or Ball (body), No_Sensors,");
    eprintln!("1DOF, HDN_nn (hidden neurons), Control (shuffled vectors) and Balance.");
    eprintln!("An example configuration is generated with the --example flag.");
}

fn fail(context: &str, err: impl Display) -> ! {
    eprintln!("{}: {}", context, err);
    std::process::exit(1);
}

fn load_config(path: &Path) -> ExperimentConfig {
    let config_str =
        fs::read_to_string(path).unwrap_or_else(|e| fail("Error reading config file", e));
    let config: ExperimentConfig =
        serde_json::from_str(&config_str).unwrap_or_else(|e| fail("Error parsing config", e));
    config
        .validate()
        .unwrap_or_else(|e| fail("Invalid config", e));
    config
}

fn load_vectors(path: &Path) -> JsonVectorSpace {
    JsonVectorSpace::load(path).unwrap_or_else(|e| fail("Error loading word vectors", e))
}

fn run_experiment(config_path: &Path) {
    let config = load_config(config_path);

    if let Some(threads) = config.threads
        && let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
    {
        log::warn!("Could not size thread pool: {}", e);
    }

    let space = load_vectors(&config.vectors);
    let commands = config
        .commands
        .resolve(&space, GenomeRng::new(config.seed).inner())
        .unwrap_or_else(|e| fail("Error resolving commands", e));

    println!("w2v Robot Evolution");
    println!("===================");
    println!("Experiment: {} (seed {})", config.name, config.seed);
    println!(
        "Robot: {} with {} hidden neurons",
        config.morphology.name(),
        config.hidden_neurons
    );
    print_commands(&commands);
    println!(
        "Population: {}, generations: {}, runtime limit: {}h",
        config.population.size,
        config.population.max_generations,
        config.population.max_runtime_hours
    );
    println!();

    let include_test = commands.test_count() > 0;
    let columns = Individual::summary_columns(&commands, include_test);
    let mut archive = RunArchive::create(config.run_dir(), &config, columns)
        .unwrap_or_else(|e| fail("Error creating run directory", e));

    let evaluator = FitnessEvaluator::new(
        commands,
        config.evaluation.clone(),
        config.simulator.backend(),
    );
    let mut engine = EvolutionEngine::new(&config, evaluator);
    let cancel = engine.cancel_handle();
    let mut archive_error: Option<ArchiveError> = None;

    let result = engine.run_with_callback(|progress, population| {
        if archive_error.is_some() {
            return;
        }
        if let Err(e) = archive.record_generation(progress.generation, population) {
            log::error!("Stopping: could not write summary: {}", e);
            archive_error = Some(e);
            cancel.store(true, Ordering::Relaxed);
            return;
        }
        if progress.generation % 10 == 0 {
            println!(
                "  Generation {}/{}: best={:.4}, mean={:.4}, age={:.1}, front={}",
                progress.generation,
                progress.total_generations,
                progress.best_fitness,
                progress.avg_fitness,
                progress.mean_age,
                progress.pareto_front_size
            );
        }
    });

    if let Some(e) = archive_error {
        fail("Error writing summary", e);
    }
    let best_path = archive
        .save_best(&result)
        .unwrap_or_else(|e| fail("Error saving best robot", e));

    let stats = &result.stats;
    println!();
    println!("Stopped: {:?}", stats.stop_reason);
    println!("Generations: {}", stats.generations);
    println!(
        "Evaluations: {} ({} simulations, {:.1}/s)",
        stats.total_evaluations, stats.total_simulations, stats.evaluations_per_second
    );
    println!(
        "Best: id {} (age {}), train fitness {:.4}",
        result.best.id, result.best.age, stats.best_fitness
    );
    if let Some(test) = stats.best_test_fitness {
        println!("Best train+test fitness: {:.4}", test);
    }
    println!("Saved {}", best_path.display());
}

fn print_commands(commands: &CommandSet) {
    for (task, list) in &commands.train {
        let labels: Vec<String> = list.iter().map(Command::label).collect();
        println!("Train {}: {}", task, labels.join(", "));
    }
    for (task, list) in &commands.test {
        let labels: Vec<String> = list.iter().map(Command::label).collect();
        println!("Test {}: {}", task, labels.join(", "));
    }
}

fn compare_words(vectors: &Path, first: &str, second: &str) {
    let space = load_vectors(vectors);
    let a = space
        .vector(first)
        .unwrap_or_else(|e| fail("Error looking up word", e));
    let b = space
        .vector(second)
        .unwrap_or_else(|e| fail("Error looking up word", e));
    println!(
        "cosine({}, {}) = {:.6}",
        first,
        second,
        cosine_similarity(&a, &b)
    );
}

/// Evaluate `word` as a forward command, using the run's best robot when one
/// has been saved and a fresh random robot otherwise.
fn show_word(config_path: &Path, word: &str) {
    let config = load_config(config_path);
    let space = load_vectors(&config.vectors);
    let encoding = space
        .vector(word)
        .unwrap_or_else(|e| fail("Error looking up word", e));

    let best_path: PathBuf = config.run_dir().join(BEST_FILE);
    let robot = if best_path.exists() {
        let best = load_best(&best_path).unwrap_or_else(|e| fail("Error loading best robot", e));
        println!("Using robot {} from {}", best.individual.id, best_path.display());
        best.robot
    } else {
        println!("No saved robot; using a fresh random one");
        Robot::random(
            config.morphology,
            config.hidden_neurons,
            &mut GenomeRng::new(config.seed),
        )
    };
    robot
        .validate()
        .unwrap_or_else(|e| fail("Robot does not fit its body", e));

    let command = Command {
        words: vec![word.to_string()],
        encoding: vec![encoding],
    };
    let evaluator = FitnessEvaluator::new(
        CommandSet::default(),
        config.evaluation.clone(),
        config.simulator.backend(),
    );

    let blueprint = robot.build(&command.encoding);
    println!(
        "{}: {} bodies, {} joints, {} neurons, {} synapses",
        robot.morphology.name(),
        blueprint.bodies.len(),
        blueprint.joints.len(),
        blueprint.neurons.len(),
        blueprint.synapses.len()
    );
    let score = evaluator.evaluate_command(&robot, Task::Forward, &command);
    println!("Forward fitness for '{}': {:.4}", word, score);
}

fn print_example_config(name: &str, seed: u64) {
    let config =
        ExperimentConfig::from_name(name, seed).unwrap_or_else(|e| fail("Bad experiment name", e));

    println!("Example configuration (experiment.json):");
    println!(
        "{}",
        serde_json::to_string_pretty(&config)
            .unwrap_or_else(|e| fail("Error serializing config", e))
    );
}
