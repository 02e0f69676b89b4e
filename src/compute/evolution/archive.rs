//! Run directory: configuration, per-generation summary log and best robot.
//!
//! Layout:
//!
//! ```text
//! <run_dir>/config.json     experiment configuration
//! <run_dir>/summary.jsonl   header line with column names, then one row per
//!                           individual per generation
//! <run_dir>/best.json       best robot with its scores and run statistics
//! ```

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compute::{Robot, ShapeError};
use crate::schema::{
    EvolutionHistory, EvolutionResult, EvolutionStats, ExperimentConfig, IndividualSnapshot,
    SummaryHeader, SummaryRow,
};

use super::individual::Individual;

pub const CONFIG_FILE: &str = "config.json";
pub const SUMMARY_FILE: &str = "summary.jsonl";
pub const BEST_FILE: &str = "best.json";

/// Archive I/O errors.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Archive I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("Archive JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Summary log {0} has no header line")]
    MissingHeader(PathBuf),
    #[error("Summary row {line} has {found} scores, header has {expected} columns")]
    RowWidth {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Saved robot does not fit its body: {0}")]
    Shape(#[from] ShapeError),
}

/// Contents of `best.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestExport {
    pub individual: IndividualSnapshot,
    pub robot: Robot,
    pub stats: EvolutionStats,
    pub history: EvolutionHistory,
}

/// Output directory of one run.
pub struct RunArchive {
    dir: PathBuf,
    columns: usize,
    summary: BufWriter<File>,
    rows_written: usize,
}

impl RunArchive {
    /// Create the run directory, write `config.json` and start a fresh
    /// `summary.jsonl` with the given column names.
    pub fn create<P: AsRef<Path>>(
        dir: P,
        config: &ExperimentConfig,
        columns: Vec<String>,
    ) -> Result<Self, ArchiveError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(config)?;
        fs::write(dir.join(CONFIG_FILE), json)?;

        let mut summary = BufWriter::new(File::create(dir.join(SUMMARY_FILE))?);
        let width = columns.len();
        serde_json::to_writer(&mut summary, &SummaryHeader { columns })?;
        summary.write_all(b"\n")?;
        summary.flush()?;

        log::info!("Writing run to {}", dir.display());
        Ok(Self {
            dir,
            columns: width,
            summary,
            rows_written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Append one row per individual and flush.
    pub fn record_generation(
        &mut self,
        generation: usize,
        population: &[Individual],
    ) -> Result<(), ArchiveError> {
        for individual in population {
            let row = individual.summary_row(generation);
            if row.scores.len() != self.columns {
                log::warn!(
                    "Individual {} has {} scores for {} summary columns",
                    row.id,
                    row.scores.len(),
                    self.columns
                );
            }
            serde_json::to_writer(&mut self.summary, &row)?;
            self.summary.write_all(b"\n")?;
            self.rows_written += 1;
        }
        self.summary.flush()?;
        Ok(())
    }

    /// Write `best.json`.
    pub fn save_best(&mut self, result: &EvolutionResult) -> Result<PathBuf, ArchiveError> {
        let export = BestExport {
            individual: result.best.clone(),
            robot: result.best_robot.clone(),
            stats: result.stats.clone(),
            history: result.history.clone(),
        };
        let path = self.dir.join(BEST_FILE);
        fs::write(&path, serde_json::to_string_pretty(&export)?)?;
        Ok(path)
    }
}

/// Load a saved `best.json`, rejecting a robot whose controller does not fit
/// its body.
pub fn load_best<P: AsRef<Path>>(path: P) -> Result<BestExport, ArchiveError> {
    let content = fs::read_to_string(path)?;
    let export: BestExport = serde_json::from_str(&content)?;
    export.robot.validate()?;
    Ok(export)
}

/// Read back a `summary.jsonl`.
pub fn read_summary<P: AsRef<Path>>(
    path: P,
) -> Result<(SummaryHeader, Vec<SummaryRow>), ArchiveError> {
    let path = path.as_ref();
    let mut lines = BufReader::new(File::open(path)?).lines();

    let header: SummaryHeader = match lines.next() {
        Some(line) => serde_json::from_str(&line?)?,
        None => return Err(ArchiveError::MissingHeader(path.to_path_buf())),
    };

    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: SummaryRow = serde_json::from_str(&line)?;
        if row.scores.len() != header.columns.len() {
            return Err(ArchiveError::RowWidth {
                line: i + 2,
                expected: header.columns.len(),
                found: row.scores.len(),
            });
        }
        rows.push(row);
    }
    Ok((header, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Morphology;
    use crate::compute::evolution::GenomeRng;
    use crate::schema::{StopReason, Task};

    fn individual(id: u64, forward: f32, stop: f32) -> Individual {
        let robot = Robot::random(Morphology::default(), 2, &mut GenomeRng::new(id));
        let mut ind = Individual::new(id, robot);
        ind.fitness.train.insert(Task::Forward, vec![forward]);
        ind.fitness.train.insert(Task::Stop, vec![stop]);
        ind.needs_evaluation = false;
        ind
    }

    fn columns() -> Vec<String> {
        vec!["Train_forward_0".into(), "Train_stop_0".into()]
    }

    #[test]
    fn test_create_writes_config_and_header() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ExperimentConfig::from_name("Quad", 2).unwrap();
        let archive = RunArchive::create(tmp.path().join("Quad_2"), &config, columns()).unwrap();

        let saved: ExperimentConfig =
            serde_json::from_str(&fs::read_to_string(archive.dir().join(CONFIG_FILE)).unwrap())
                .unwrap();
        assert_eq!(saved.name, "Quad");
        assert_eq!(saved.seed, 2);

        let (header, rows) = read_summary(archive.dir().join(SUMMARY_FILE)).unwrap();
        assert_eq!(header.columns, columns());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_summary_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ExperimentConfig::from_name("Quad", 0).unwrap();
        let mut archive = RunArchive::create(tmp.path(), &config, columns()).unwrap();

        let population = vec![individual(1, 0.4, -0.1), individual(2, 0.2, 0.0)];
        archive.record_generation(0, &population).unwrap();
        archive.record_generation(1, &population[..1]).unwrap();
        assert_eq!(archive.rows_written(), 3);

        let (_, rows) = read_summary(tmp.path().join(SUMMARY_FILE)).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].scores, vec![0.4, -0.1]);
        assert_eq!(rows[2].generation, 1);
    }

    #[test]
    fn test_read_summary_rejects_bad_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty.jsonl");
        fs::write(&empty, "").unwrap();
        assert!(matches!(
            read_summary(&empty),
            Err(ArchiveError::MissingHeader(_))
        ));

        let narrow = tmp.path().join("narrow.jsonl");
        fs::write(
            &narrow,
            concat!(
                r#"{"columns":["a","b"]}"#,
                "\n",
                r#"{"generation":0,"id":1,"parent_id":null,"age":0,"fitness":0.0,"test_fitness":null,"scores":[1.0]}"#,
                "\n"
            ),
        )
        .unwrap();
        assert!(matches!(
            read_summary(&narrow),
            Err(ArchiveError::RowWidth { line: 2, .. })
        ));
    }

    fn result_for(best: &Individual) -> EvolutionResult {
        EvolutionResult {
            best: best.snapshot(),
            best_robot: best.robot.clone(),
            population: vec![best.snapshot()],
            stats: EvolutionStats {
                generations: 3,
                total_evaluations: 10,
                total_simulations: 20,
                best_fitness: best.fitness(),
                best_test_fitness: None,
                final_avg_fitness: best.fitness(),
                elapsed_seconds: 1.0,
                evaluations_per_second: 10.0,
                stop_reason: StopReason::MaxGenerations,
            },
            history: EvolutionHistory::default(),
        }
    }

    #[test]
    fn test_best_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ExperimentConfig::from_name("Twig", 0).unwrap();
        let mut archive = RunArchive::create(tmp.path(), &config, columns()).unwrap();

        let best = individual(5, 0.9, -0.05);
        let path = archive.save_best(&result_for(&best)).unwrap();
        let loaded = load_best(&path).unwrap();
        assert_eq!(loaded.individual.id, 5);
        assert_eq!(loaded.robot, best.robot);
        assert_eq!(loaded.stats.stop_reason, StopReason::MaxGenerations);
    }

    #[test]
    fn test_load_best_rejects_misshapen_robot() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ExperimentConfig::from_name("Quad", 0).unwrap();
        let mut archive = RunArchive::create(tmp.path(), &config, columns()).unwrap();
        let path = archive.save_best(&result_for(&individual(3, 0.5, 0.0))).unwrap();

        let mut json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        json["robot"]["controller"]["h_synapses"]["cols"] = 3.into();
        fs::write(&path, json.to_string()).unwrap();

        assert!(matches!(
            load_best(&path),
            Err(ArchiveError::Shape(ShapeError::Data { cols: 3, .. }))
        ));
    }
}
