use crate::table::{MeasurementSeries, OmicsTable};

/// Immutable unit of work: one unordered entity pair with its two series.
#[derive(Debug, Clone)]
pub struct PairTask {
    pub entity_a: String,
    pub entity_b: String,
    pub series_a: MeasurementSeries,
    pub series_b: MeasurementSeries,
    pub n_iterations: usize,
}

/// Number of ways to choose r elements from n (0 when r > n).
pub fn combinations_count(n: usize, r: usize) -> usize {
    if r > n {
        return 0;
    }
    let mut result: usize = 1;
    for k in 1..=r {
        result = result * (n - r + k) / k;
    }
    result
}

/// Lazily yield one task per unordered entity pair, in combinatorial order
/// of the table's row order. Fewer than two entities yield no tasks.
pub fn pair_tasks(table: &OmicsTable, n_iterations: usize) -> impl Iterator<Item = PairTask> + '_ {
    let n = table.n_entities();
    (0..n).flat_map(move |i| {
        (i + 1..n).map(move |j| PairTask {
            entity_a: table.entities[i].clone(),
            entity_b: table.entities[j].clone(),
            series_a: table.row_series(i),
            series_b: table.row_series(j),
            n_iterations,
        })
    })
}
