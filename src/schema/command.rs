//! Command vocabulary: which words are spoken to the robot and which are held out.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::vectors::{VectorError, VectorSpace};

/// Behavior a command asks for.
///
/// Variant order defines summary column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Backward,
    Forward,
    Stop,
}

impl Task {
    pub fn name(self) -> &'static str {
        match self {
            Task::Backward => "backward",
            Task::Forward => "forward",
            Task::Stop => "stop",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Word lists per task. Each inner list is one command (possibly several words).
pub type WordTable = BTreeMap<Task, Vec<Vec<String>>>;

/// Which words make up the training vocabulary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "words")]
pub enum Vocabulary {
    /// One word each for forward and backward, four stop synonyms.
    #[default]
    Standard,
    /// Two words per task (including the misspelling "foward").
    Balanced,
    /// Explicit word table.
    Custom(WordTable),
}

impl Vocabulary {
    /// Expand to the full word table.
    pub fn words(&self) -> WordTable {
        fn table(entries: &[(Task, &[&str])]) -> WordTable {
            entries
                .iter()
                .map(|(task, words)| {
                    let commands = words.iter().map(|w| vec![w.to_string()]).collect();
                    (*task, commands)
                })
                .collect()
        }

        match self {
            Vocabulary::Standard => table(&[
                (Task::Forward, &["forward"][..]),
                (Task::Backward, &["backward"][..]),
                (Task::Stop, &["stop", "cease", "suspend", "halt"][..]),
            ]),
            Vocabulary::Balanced => table(&[
                (Task::Forward, &["forward", "foward"][..]),
                (Task::Backward, &["backward", "backwards"][..]),
                (Task::Stop, &["stop", "cease", "suspend"][..]),
            ]),
            Vocabulary::Custom(words) => words.clone(),
        }
    }
}

/// Command configuration for an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default)]
    pub vocabulary: Vocabulary,
    /// Task from which one randomly chosen command is withheld for testing.
    #[serde(default = "default_holdout")]
    pub holdout: Option<Task>,
    /// Control treatment: scramble the components of every word vector.
    #[serde(default)]
    pub shuffle_vectors: bool,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            vocabulary: Vocabulary::default(),
            holdout: default_holdout(),
            shuffle_vectors: false,
        }
    }
}

fn default_holdout() -> Option<Task> {
    Some(Task::Stop)
}

/// A spoken command: its words and their embedding vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub words: Vec<String>,
    pub encoding: Vec<Vec<f32>>,
}

impl Command {
    pub fn label(&self) -> String {
        self.words.join(" ")
    }
}

/// Train and test commands, grouped by task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSet {
    pub train: BTreeMap<Task, Vec<Command>>,
    pub test: BTreeMap<Task, Vec<Command>>,
}

impl CommandSet {
    pub fn train_count(&self) -> usize {
        self.train.values().map(Vec::len).sum()
    }

    pub fn test_count(&self) -> usize {
        self.test.values().map(Vec::len).sum()
    }

    /// Number of simulations needed to evaluate one individual.
    pub fn evaluation_count(&self, include_test: bool) -> usize {
        if include_test {
            self.train_count() + self.test_count()
        } else {
            self.train_count()
        }
    }
}

impl CommandConfig {
    /// Look up every word, withhold the test command and apply the control shuffle.
    pub fn resolve<V, R>(&self, space: &V, rng: &mut R) -> Result<CommandSet, VectorError>
    where
        V: VectorSpace + ?Sized,
        R: Rng,
    {
        let mut train: BTreeMap<Task, Vec<Command>> = BTreeMap::new();
        for (task, commands) in self.vocabulary.words() {
            let mut resolved = Vec::with_capacity(commands.len());
            for words in commands {
                let encoding = words
                    .iter()
                    .map(|w| space.vector(w))
                    .collect::<Result<Vec<_>, _>>()?;
                resolved.push(Command { words, encoding });
            }
            train.insert(task, resolved);
        }

        let mut test = BTreeMap::new();
        if let Some(task) = self.holdout
            && let Some(commands) = train.get_mut(&task)
            && commands.len() > 1
        {
            let idx = rng.gen_range(0..commands.len());
            let held = commands.remove(idx);
            log::info!("Holding out '{}' ({}) for testing", held.label(), task);
            test.insert(task, vec![held]);
        }

        let mut set = CommandSet { train, test };
        if self.shuffle_vectors {
            shuffle_encodings(&mut set, rng);
        }
        Ok(set)
    }
}

fn shuffle_encodings<R: Rng>(set: &mut CommandSet, rng: &mut R) {
    let commands = set
        .train
        .values_mut()
        .chain(set.test.values_mut())
        .flat_map(|commands| commands.iter_mut());
    for command in commands {
        for vector in &mut command.encoding {
            vector.shuffle(rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectors::JsonVectorSpace;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn space() -> JsonVectorSpace {
        let words = [
            "forward", "foward", "backward", "backwards", "stop", "cease", "suspend", "halt",
        ];
        JsonVectorSpace::from_pairs(
            words
                .iter()
                .enumerate()
                .map(|(i, w)| (w.to_string(), vec![i as f32, 1.0, 2.0, 3.0])),
        )
    }

    #[test]
    fn test_standard_holdout_moves_one_stop_word() {
        let config = CommandConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let set = config.resolve(&space(), &mut rng).unwrap();

        assert_eq!(set.train[&Task::Forward].len(), 1);
        assert_eq!(set.train[&Task::Backward].len(), 1);
        assert_eq!(set.train[&Task::Stop].len(), 3);
        assert_eq!(set.test[&Task::Stop].len(), 1);
        assert_eq!(set.train_count(), 5);
        assert_eq!(set.evaluation_count(true), 6);

        let held = &set.test[&Task::Stop][0];
        assert!(set.train[&Task::Stop].iter().all(|c| c.words != held.words));
    }

    #[test]
    fn test_balanced_vocabulary() {
        let config = CommandConfig {
            vocabulary: Vocabulary::Balanced,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let set = config.resolve(&space(), &mut rng).unwrap();
        assert_eq!(set.train[&Task::Forward].len(), 2);
        assert_eq!(set.train[&Task::Stop].len(), 2);
        assert_eq!(set.test_count(), 1);
    }

    #[test]
    fn test_single_command_task_is_not_held_out() {
        let config = CommandConfig {
            holdout: Some(Task::Forward),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let set = config.resolve(&space(), &mut rng).unwrap();
        assert!(set.test.is_empty());
        assert_eq!(set.train_count(), 6);
    }

    #[test]
    fn test_shuffle_keeps_components() {
        let config = CommandConfig {
            shuffle_vectors: true,
            holdout: None,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let set = config.resolve(&space(), &mut rng).unwrap();
        let mut v = set.train[&Task::Stop][0].encoding[0].clone();
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(v, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_missing_word_is_an_error() {
        let config = CommandConfig {
            vocabulary: Vocabulary::Custom(
                [(Task::Forward, vec![vec!["onward".to_string()]])].into(),
            ),
            holdout: None,
            shuffle_vectors: false,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let err = config.resolve(&space(), &mut rng).unwrap_err();
        assert!(matches!(err, VectorError::NotFound(w) if w == "onward"));
    }
}
