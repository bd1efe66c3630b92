use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::Array2;

use crate::error::AppError;

/// Square matrix keyed by entity id on both axes, populated incrementally.
///
/// Only the cells for computed pairs are written (one orientation per pair),
/// so the matrix is partial and not symmetric by construction. Unset cells
/// are NaN. Consumers that need pair semantics go through [`value_between`],
/// which checks both orientations.
///
/// [`value_between`]: PairMatrix::value_between
#[derive(Debug, Clone)]
pub struct PairMatrix {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    values: Array2<f64>,
}

impl PairMatrix {
    pub fn new(labels: Vec<String>) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        let n = labels.len();
        Self {
            labels,
            index,
            values: Array2::from_elem((n, n), f64::NAN),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Write the cell [a][b] exactly as oriented.
    pub fn set(&mut self, a: &str, b: &str, value: f64) -> Result<(), AppError> {
        let (i, j) = self.resolve(a, b)?;
        self.values[[i, j]] = value;
        Ok(())
    }

    /// Directed lookup of [a][b]; NaN when the cell is unset or a label is unknown.
    pub fn get(&self, a: &str, b: &str) -> f64 {
        match self.resolve(a, b) {
            Ok((i, j)) => self.values[[i, j]],
            Err(_) => f64::NAN,
        }
    }

    /// Undirected lookup: [a][b] if set, otherwise [b][a].
    pub fn value_between(&self, a: &str, b: &str) -> f64 {
        let forward = self.get(a, b);
        if !forward.is_nan() {
            forward
        } else {
            self.get(b, a)
        }
    }

    pub fn value_between_indices(&self, i: usize, j: usize) -> f64 {
        let forward = self.values[[i, j]];
        if !forward.is_nan() {
            forward
        } else {
            self.values[[j, i]]
        }
    }

    fn resolve(&self, a: &str, b: &str) -> Result<(usize, usize), AppError> {
        let i = *self.index.get(a).ok_or_else(|| {
            AppError::InvalidParameter(format!("unknown entity '{a}' in matrix access"))
        })?;
        let j = *self.index.get(b).ok_or_else(|| {
            AppError::InvalidParameter(format!("unknown entity '{b}' in matrix access"))
        })?;
        Ok((i, j))
    }

    /// Write as CSV with a label header/index column; NaN cells are empty.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), AppError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, ",{}", self.labels.join(","))?;
        for (i, label) in self.labels.iter().enumerate() {
            let cells: Vec<String> = (0..self.len())
                .map(|j| {
                    let v = self.values[[i, j]];
                    if v.is_nan() {
                        String::new()
                    } else {
                        format!("{v}")
                    }
                })
                .collect();
            writeln!(writer, "{},{}", label, cells.join(","))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a matrix written by [`to_csv`]; empty cells become NaN.
    ///
    /// Rows are matched to header labels by their index column, so a file
    /// whose rows were reordered still loads correctly; a row label absent
    /// from the header is an error.
    ///
    /// [`to_csv`]: PairMatrix::to_csv
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let labels: Vec<String> = reader.headers()?.iter().skip(1).map(|s| s.to_string()).collect();
        let mut matrix = Self::new(labels.clone());
        for record in reader.records() {
            let record = record?;
            let row_label = record.get(0).unwrap_or("").trim().to_string();
            let i = *matrix.index.get(&row_label).ok_or_else(|| {
                AppError::MetadataMismatch(format!(
                    "matrix CSV row '{row_label}' is not among the header labels"
                ))
            })?;
            for (j, field) in record.iter().skip(1).enumerate() {
                if j >= matrix.len() {
                    return Err(AppError::MetadataMismatch(
                        "matrix CSV has more cells than header labels".to_string(),
                    ));
                }
                let trimmed = field.trim();
                if !trimmed.is_empty() {
                    matrix.values[[i, j]] = trimmed.parse::<f64>().map_err(|_| {
                        AppError::MetadataMismatch(format!(
                            "cell [{row_label},{}] is not a number: '{trimmed}'",
                            labels[j]
                        ))
                    })?;
                }
            }
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_population_is_directed() {
        let mut m = PairMatrix::new(labels(&["a", "b", "c"]));
        m.set("a", "b", 0.5).unwrap();
        assert_eq!(m.get("a", "b"), 0.5);
        assert!(m.get("b", "a").is_nan());
        assert!(m.get("a", "c").is_nan());
    }

    #[test]
    fn test_value_between_checks_both_orientations() {
        let mut m = PairMatrix::new(labels(&["a", "b"]));
        m.set("b", "a", -0.3).unwrap();
        assert_eq!(m.value_between("a", "b"), -0.3);
        assert_eq!(m.value_between("b", "a"), -0.3);
        assert_eq!(m.value_between_indices(0, 1), -0.3);
    }

    #[test]
    fn test_unknown_label_rejected_on_write() {
        let mut m = PairMatrix::new(labels(&["a"]));
        assert!(m.set("a", "zz", 1.0).is_err());
        assert!(m.get("a", "zz").is_nan());
    }

    #[test]
    fn test_csv_round_trip_preserves_partial_population() {
        let mut m = PairMatrix::new(labels(&["g1", "g2", "g3"]));
        m.set("g1", "g2", 0.8).unwrap();
        m.set("g1", "g3", -0.25).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corr.csv");
        m.to_csv(&path).unwrap();

        let loaded = PairMatrix::from_csv(&path).unwrap();
        assert_eq!(loaded.labels(), m.labels());
        assert_eq!(loaded.get("g1", "g2"), 0.8);
        assert_eq!(loaded.get("g1", "g3"), -0.25);
        assert!(loaded.get("g2", "g1").is_nan());
        assert!(loaded.get("g2", "g3").is_nan());
    }

    #[test]
    fn test_csv_rows_matched_by_label_not_position() {
        // Rows shuffled out of header order still land on the right cells
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reordered.csv");
        std::fs::write(&path, ",a,b,c\nb,,,0.9\na,,0.5,\nc,,,\n").unwrap();

        let m = PairMatrix::from_csv(&path).unwrap();
        assert_eq!(m.get("b", "c"), 0.9);
        assert_eq!(m.get("a", "b"), 0.5);
        assert!(m.get("a", "c").is_nan());
        assert!(m.get("b", "a").is_nan());
    }

    #[test]
    fn test_csv_unknown_row_label_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, ",a,b\nzz,0.1,\n").unwrap();
        assert!(PairMatrix::from_csv(&path).is_err());
    }
}
