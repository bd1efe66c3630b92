use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};

/// Assign average ranks (1-based) to a slice of values, ties sharing their mean rank.
///
/// NaN values sort after every number (total order) and receive trailing
/// ranks instead of tying with each other.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        // Find the run of tied values starting at i; starting the scan at
        // i + 1 guarantees progress when values[order[i]] is NaN (NaN != NaN)
        let mut j = i + 1;
        while j < order.len() && values[order[j]] == values[order[i]] {
            j += 1;
        }
        let avg_rank = ((i + 1) + j) as f64 / 2.0;
        for k in i..j {
            ranks[order[k]] = avg_rank;
        }
        i = j;
    }
    ranks
}

/// Spearman rank correlation with a two-sided t-approximation p-value.
///
/// Returns (rho, p_value). Constant input or NaN values give (NaN, NaN);
/// fewer than 3 observations give a NaN p-value.
pub fn spearman(a: &[f64], b: &[f64]) -> (f64, f64) {
    let n = a.len();
    if n != b.len() || n < 2 {
        return (f64::NAN, f64::NAN);
    }
    if a.iter().chain(b.iter()).any(|v| v.is_nan()) {
        return (f64::NAN, f64::NAN);
    }

    let ra = average_ranks(a);
    let rb = average_ranks(b);

    let nf = n as f64;
    let mean_a = ra.iter().sum::<f64>() / nf;
    let mean_b = rb.iter().sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = ra[i] - mean_a;
        let db = rb[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    // A constant vector has zero rank variance; the coefficient is undefined
    if var_a == 0.0 || var_b == 0.0 {
        return (f64::NAN, f64::NAN);
    }

    // Single sqrt over the product keeps rho exactly 1 for identical ranks
    let rho = cov / (var_a * var_b).sqrt();
    let rho = rho.clamp(-1.0, 1.0);

    let df = nf - 2.0;
    if df <= 0.0 {
        return (rho, f64::NAN);
    }
    let denom = 1.0 - rho * rho;
    if denom <= 0.0 {
        // |rho| = 1: the t statistic diverges
        return (rho, 0.0);
    }
    let t = rho * (df / denom).sqrt();
    let p = match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => 2.0 * (1.0 - dist.cdf(t.abs())),
        Err(_) => f64::NAN,
    };
    (rho, p)
}

/// Linear-interpolation percentile (numpy default), q in [0, 100].
///
/// NaN inputs propagate to a NaN result; the empty slice yields NaN.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let h = (sorted.len() - 1) as f64 * q / 100.0;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Arithmetic mean; NaN values propagate, the empty slice yields NaN.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Combine p-values with Pearson's method.
///
/// The statistic is -2 * sum(ln(1 - p_i)), referred to the lower tail of a
/// chi-squared distribution with 2k degrees of freedom.
pub fn combine_pvalues_pearson(pvalues: &[f64]) -> f64 {
    if pvalues.is_empty() {
        return f64::NAN;
    }
    if pvalues.iter().any(|p| p.is_nan()) {
        return f64::NAN;
    }
    let statistic = -2.0 * pvalues.iter().map(|p| (1.0 - p).ln()).sum::<f64>();
    if statistic.is_infinite() {
        // Some p_i was exactly 1
        return 1.0;
    }
    match ChiSquared::new(2.0 * pvalues.len() as f64) {
        Ok(dist) => dist.cdf(statistic),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_ranks_with_ties() {
        let ranks = average_ranks(&[3.0, 1.0, 2.0, 2.0]);
        assert_eq!(ranks, vec![4.0, 1.0, 2.5, 2.5]);
    }

    #[test]
    fn test_average_ranks_nan_sorts_last() {
        let ranks = average_ranks(&[f64::NAN, 2.0, 1.0]);
        assert_eq!(ranks[0], 3.0);
        assert_eq!(ranks[1], 2.0);
        assert_eq!(ranks[2], 1.0);
    }

    #[test]
    fn test_spearman_perfect_monotone() {
        let (rho, p) = spearman(&[1.0, 2.0, 3.0, 4.0], &[10.0, 20.0, 30.0, 40.0]);
        assert!((rho - 1.0).abs() < 1e-12);
        assert_eq!(p, 0.0);

        let (rho, _) = spearman(&[1.0, 2.0, 3.0, 4.0], &[8.0, 4.0, 2.0, 1.0]);
        assert!((rho + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_spearman_constant_input_is_nan() {
        let (rho, p) = spearman(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]);
        assert!(rho.is_nan());
        assert!(p.is_nan());
    }

    #[test]
    fn test_spearman_nan_input_is_nan() {
        let (rho, p) = spearman(&[1.0, f64::NAN, 3.0], &[1.0, 2.0, 3.0]);
        assert!(rho.is_nan());
        assert!(p.is_nan());
    }

    #[test]
    fn test_spearman_p_value_range() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0];
        let (rho, p) = spearman(&a, &b);
        assert!(rho > 0.0 && rho < 1.0);
        assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn test_percentile_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&values, 2.5) - 1.075).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_nan_propagates() {
        assert!(percentile(&[1.0, f64::NAN], 50.0).is_nan());
        assert!(percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_combine_pvalues_pearson_known_value() {
        // statistic = -4 ln(0.5) = 2.77259, chi2(4) lower tail = 0.40343
        let combined = combine_pvalues_pearson(&[0.5, 0.5]);
        assert!((combined - 0.40343).abs() < 1e-3);
    }

    #[test]
    fn test_combine_pvalues_small_inputs_stay_small() {
        let combined = combine_pvalues_pearson(&[0.001, 0.002, 0.001]);
        assert!(combined < 0.05);
    }

    #[test]
    fn test_combine_pvalues_nan_propagates() {
        assert!(combine_pvalues_pearson(&[0.5, f64::NAN]).is_nan());
        assert!(combine_pvalues_pearson(&[]).is_nan());
    }
}
