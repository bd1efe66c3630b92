use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::StandardNormal;

use crate::stats::{combine_pvalues_pearson, mean, percentile, spearman};
use crate::table::MeasurementSeries;

/// Normal distribution fitted to one replicate group.
///
/// A group with a single observation has an undefined standard deviation;
/// the NaN scale is kept and surfaces as NaN draws rather than an error.
#[derive(Debug, Clone)]
pub struct ReplicateNormal {
    pub mean: f64,
    pub sd: f64,
}

impl ReplicateNormal {
    /// Fit from all observations of one replicate group (sample std, ddof = 1).
    pub fn fit(values: &[f64]) -> Self {
        let n = values.len() as f64;
        let m = values.iter().sum::<f64>() / n;
        let sd = if values.len() < 2 {
            f64::NAN
        } else {
            (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        };
        Self { mean: m, sd }
    }

    /// Draw one value; a NaN scale propagates into the draw.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        self.mean + self.sd * z
    }
}

/// One fitted normal per distinct replicate label, sorted by label.
#[derive(Debug, Clone)]
pub struct ReplicateDistributionSet {
    pub entries: Vec<(String, ReplicateNormal)>,
}

impl ReplicateDistributionSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Draw one value per replicate label, in label order.
    pub fn draw_vector<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.entries.iter().map(|(_, d)| d.draw(rng)).collect()
    }
}

/// Fit one normal distribution per distinct replicate label in the series.
pub fn fit_replicate_distributions(series: &MeasurementSeries) -> ReplicateDistributionSet {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (label, value) in series.labels.iter().zip(series.values.iter()) {
        groups.entry(label.as_str()).or_default().push(*value);
    }
    let entries = groups
        .into_iter()
        .map(|(label, values)| (label.to_string(), ReplicateNormal::fit(&values)))
        .collect();
    ReplicateDistributionSet { entries }
}

/// Aggregated outcome of one bootstrap correlation run for a single pair.
#[derive(Debug, Clone)]
pub struct BootstrapResult {
    /// Mean Spearman coefficient over all iterations.
    pub mean_correlation: f64,
    /// 2.5th and 97.5th percentiles of the per-iteration coefficients.
    pub interval: (f64, f64),
    /// Per-iteration p-values combined with Pearson's method.
    pub combined_p_value: f64,
}

/// Bootstrap Spearman correlation between two replicate-labelled series.
///
/// Each iteration draws one synthetic value per replicate label from both
/// fitted distribution sets (each in its own label order; the two series are
/// expected to carry matching label sets) and computes a Spearman coefficient
/// with its two-sided p-value. NaN iteration results from degenerate groups
/// are kept and propagate into the aggregates.
pub fn bootstrap_spearman<R: Rng + ?Sized>(
    series_1: &MeasurementSeries,
    series_2: &MeasurementSeries,
    n_iterations: usize,
    rng: &mut R,
) -> BootstrapResult {
    let dist_1 = fit_replicate_distributions(series_1);
    let dist_2 = fit_replicate_distributions(series_2);

    let mut correlations = Vec::with_capacity(n_iterations);
    let mut pvalues = Vec::with_capacity(n_iterations);
    for _ in 0..n_iterations {
        let a = dist_1.draw_vector(rng);
        let b = dist_2.draw_vector(rng);
        let (corr, pvalue) = spearman(&a, &b);
        correlations.push(corr);
        pvalues.push(pvalue);
    }

    BootstrapResult {
        mean_correlation: mean(&correlations),
        interval: (percentile(&correlations, 2.5), percentile(&correlations, 97.5)),
        combined_p_value: combine_pvalues_pearson(&pvalues),
    }
}
