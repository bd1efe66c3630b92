use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bootstrap::bootstrap_spearman;
use crate::error::AppError;
use crate::matrix::PairMatrix;
use crate::pairs::{pair_tasks, PairTask};
use crate::progress::ProgressObserver;
use crate::table::OmicsTable;

/// Tunables for one parallel correlation run.
#[derive(Debug, Clone)]
pub struct CorrelateConfig {
    /// Column metadata level that groups replicates.
    pub replicate_level: String,
    /// Worker pool size.
    pub n_workers: usize,
    /// Bootstrap iterations per pair (must be >= 1).
    pub n_iterations: usize,
    /// Tasks per dispatch chunk; throughput only, never affects results.
    pub chunk_size: usize,
    /// Base RNG seed; None draws from entropy (non-reproducible).
    pub seed: Option<u64>,
}

impl CorrelateConfig {
    pub fn new(replicate_level: &str) -> Self {
        Self {
            replicate_level: replicate_level.to_string(),
            n_workers: 4,
            n_iterations: 10,
            chunk_size: 10,
            seed: None,
        }
    }
}

type PairOutcome = Result<(String, String, f64, f64), String>;

/// Bootstrap Spearman correlation over all unordered entity pairs of a table,
/// fanned out across a fixed-size worker pool.
///
/// Returns the correlation and combined p-value matrices, each populated only
/// at `[a][b]` for the generated pair orientation (never symmetrized).
/// Results are folded in completion order by this thread alone; a failed
/// worker task aborts the whole run.
pub fn bootstrap_correlate_parallel(
    table: &OmicsTable,
    config: &CorrelateConfig,
    progress: &mut dyn ProgressObserver,
) -> Result<(PairMatrix, PairMatrix), AppError> {
    if config.n_iterations < 1 {
        return Err(AppError::InvalidParameter(
            "n_iterations must be at least 1".to_string(),
        ));
    }
    if config.n_workers < 1 {
        return Err(AppError::InvalidParameter(
            "n_workers must be at least 1".to_string(),
        ));
    }
    if config.chunk_size < 1 {
        return Err(AppError::InvalidParameter(
            "chunk_size must be at least 1".to_string(),
        ));
    }

    // Normalize the column layout before any work is dispatched; an unknown
    // replicate level is a configuration error.
    let collapsed = table.collapse_to_level(&config.replicate_level)?;

    let mut correlations = PairMatrix::new(collapsed.entities.clone());
    let mut pvalues = PairMatrix::new(collapsed.entities.clone());

    let tasks: Vec<(usize, PairTask)> = pair_tasks(&collapsed, config.n_iterations)
        .enumerate()
        .collect();
    let total = tasks.len();
    if total == 0 {
        return Ok((correlations, pvalues));
    }

    let chunks = chunk_tasks(tasks, config.chunk_size);

    // Dedicated pool so worker count is exactly what the config asks for and
    // teardown is tied to this run. A panicking task is swallowed by the
    // handler; the shortfall is detected when the channel closes early.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.n_workers)
        .panic_handler(|_| {})
        .build()
        .map_err(|e| AppError::Worker(e.to_string()))?;

    let (tx, rx) = mpsc::channel::<PairOutcome>();
    let poison = Arc::new(AtomicBool::new(false));
    let seed = config.seed;

    for chunk in chunks {
        let tx = tx.clone();
        let poison = Arc::clone(&poison);
        pool.spawn(move || {
            for (task_index, task) in chunk {
                if poison.load(Ordering::Relaxed) {
                    return;
                }
                let outcome = compute_pair(task, seed, task_index);
                if tx.send(outcome).is_err() {
                    return;
                }
            }
        });
    }
    drop(tx);

    // Single-writer fold, in completion order
    progress.start(total);
    let mut done = 0;
    let mut failure: Option<AppError> = None;
    for outcome in rx {
        match outcome {
            Ok((a, b, corr, pval)) => {
                correlations.set(&a, &b, corr)?;
                pvalues.set(&a, &b, pval)?;
                done += 1;
                progress.update(done);
            }
            Err(message) => {
                poison.store(true, Ordering::Relaxed);
                failure = Some(AppError::Worker(message));
                break;
            }
        }
    }
    // Dropping the pool joins all outstanding tasks
    drop(pool);

    if let Some(error) = failure {
        return Err(error);
    }
    if done != total {
        return Err(AppError::Worker(format!(
            "only {done} of {total} pair results arrived; a worker terminated early"
        )));
    }
    progress.finish();

    Ok((correlations, pvalues))
}

fn chunk_tasks(tasks: Vec<(usize, PairTask)>, chunk_size: usize) -> Vec<Vec<(usize, PairTask)>> {
    let mut chunks = Vec::with_capacity(tasks.len() / chunk_size + 1);
    let mut current = Vec::with_capacity(chunk_size);
    for task in tasks {
        current.push(task);
        if current.len() == chunk_size {
            chunks.push(mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn compute_pair(task: PairTask, seed: Option<u64>, task_index: usize) -> PairOutcome {
    if task.series_a.labels.len() != task.series_a.values.len()
        || task.series_b.labels.len() != task.series_b.values.len()
    {
        return Err(format!(
            "pair ({}, {}): series length does not match its replicate labels",
            task.entity_a, task.entity_b
        ));
    }
    // Derive the task RNG from the base seed and the task's position in the
    // pair stream, so completion order cannot change results.
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(mix_seed(s, task_index as u64)),
        None => StdRng::from_entropy(),
    };
    let result = bootstrap_spearman(&task.series_a, &task.series_b, task.n_iterations, &mut rng);
    Ok((
        task.entity_a,
        task.entity_b,
        result.mean_correlation,
        result.combined_p_value,
    ))
}

fn mix_seed(seed: u64, index: u64) -> u64 {
    // splitmix64 step over seed + index
    let mut z = seed
        .wrapping_add(index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::combinations_count;
    use crate::progress::NoProgress;
    use ndarray::array;

    fn replicate_table() -> OmicsTable {
        // Four time points with two replicates each; e1/e2 share a monotone
        // trend with tight replicate noise, e3/e4 are flat noise
        let samples: Vec<String> = (1..=8).map(|i| format!("s{i}")).collect();
        let table = OmicsTable::new(
            vec!["e1".into(), "e2".into(), "e3".into(), "e4".into()],
            samples.clone(),
            array![
                [1.0, 1.1, 10.0, 10.1, 20.0, 20.1, 30.0, 30.1],
                [5.0, 5.1, 50.0, 50.1, 100.0, 100.1, 150.0, 150.1],
                [3.0, 2.9, 3.1, 3.0, 2.95, 3.05, 3.02, 2.98],
                [7.0, 7.1, 6.9, 7.05, 7.02, 6.95, 7.03, 6.97]
            ],
        )
        .unwrap();
        let header = vec!["sample".to_string(), "time".to_string()];
        let times = ["t0", "t0", "t1", "t1", "t2", "t2", "t3", "t3"];
        let rows: Vec<Vec<String>> = samples
            .iter()
            .zip(times.iter())
            .map(|(s, t)| vec![s.clone(), t.to_string()])
            .collect();
        table.attach_metadata(&header, &rows, "sample").unwrap()
    }

    fn config() -> CorrelateConfig {
        CorrelateConfig {
            replicate_level: "time".to_string(),
            n_workers: 2,
            n_iterations: 20,
            chunk_size: 2,
            seed: Some(11),
        }
    }

    #[test]
    fn test_invalid_parameters_rejected_before_dispatch() {
        let table = replicate_table();
        let mut bad = config();
        bad.n_iterations = 0;
        assert!(bootstrap_correlate_parallel(&table, &bad, &mut NoProgress).is_err());

        let mut bad = config();
        bad.chunk_size = 0;
        assert!(bootstrap_correlate_parallel(&table, &bad, &mut NoProgress).is_err());
    }

    #[test]
    fn test_missing_level_is_config_error() {
        let table = replicate_table();
        let mut cfg = config();
        cfg.replicate_level = "condition".to_string();
        let err = bootstrap_correlate_parallel(&table, &cfg, &mut NoProgress).unwrap_err();
        assert!(matches!(err, AppError::MissingReplicateLevel { .. }));
    }

    #[test]
    fn test_all_pairs_folded_once_upper_triangular() {
        let table = replicate_table();
        let (corr, pval) =
            bootstrap_correlate_parallel(&table, &config(), &mut NoProgress).unwrap();

        let entities = ["e1", "e2", "e3", "e4"];
        let mut populated = 0;
        for (i, a) in entities.iter().enumerate() {
            for b in entities.iter().skip(i + 1) {
                assert!(!corr.get(a, b).is_nan(), "missing pair ({a}, {b})");
                assert!(!pval.get(a, b).is_nan());
                // Only the generated orientation is written
                assert!(corr.get(b, a).is_nan());
                populated += 1;
            }
        }
        assert_eq!(populated, combinations_count(entities.len(), 2));
        // The correlated pair stands out
        assert!(corr.get("e1", "e2") > 0.9);
    }

    #[test]
    fn test_seeded_runs_reproduce_and_ignore_chunk_size() {
        let table = replicate_table();
        let (corr_a, pval_a) =
            bootstrap_correlate_parallel(&table, &config(), &mut NoProgress).unwrap();

        let mut other = config();
        other.chunk_size = 5;
        other.n_workers = 4;
        let (corr_b, pval_b) =
            bootstrap_correlate_parallel(&table, &other, &mut NoProgress).unwrap();

        let entities = ["e1", "e2", "e3", "e4"];
        for (i, a) in entities.iter().enumerate() {
            for b in entities.iter().skip(i + 1) {
                assert_eq!(corr_a.get(a, b), corr_b.get(a, b));
                assert_eq!(pval_a.get(a, b), pval_b.get(a, b));
            }
        }
    }

    #[test]
    fn test_fewer_than_two_entities_is_empty_run() {
        let table = OmicsTable::new(
            vec!["only".into()],
            vec!["t0".into(), "t0".into()],
            array![[1.0, 2.0]],
        )
        .unwrap();
        let mut cfg = config();
        cfg.replicate_level = "sample".to_string();
        let (corr, pval) = bootstrap_correlate_parallel(&table, &cfg, &mut NoProgress).unwrap();
        assert_eq!(corr.len(), 1);
        assert!(pval.get("only", "only").is_nan());
    }
}
