use std::collections::HashSet;
use std::path::Path;

use ndarray::Array2;

use crate::error::AppError;

/// One entity's measurements, keyed by replicate label.
///
/// Labels are not unique: all samples sharing a label are replicates of one
/// condition or time point.
#[derive(Debug, Clone)]
pub struct MeasurementSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Wide omics table: rows are entities, columns are samples carrying
/// multi-level column metadata (one value per level per column).
#[derive(Debug, Clone)]
pub struct OmicsTable {
    pub entities: Vec<String>,
    pub level_names: Vec<String>,
    /// levels[l][c] = value of level l for column c
    pub levels: Vec<Vec<String>>,
    /// entities x columns
    pub values: Array2<f64>,
}

impl OmicsTable {
    /// Build an in-memory table with a single `sample` column level.
    pub fn new(
        entities: Vec<String>,
        sample_names: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self, AppError> {
        if values.nrows() != entities.len() || values.ncols() != sample_names.len() {
            return Err(AppError::MetadataMismatch(format!(
                "value matrix is {}x{} but there are {} entities and {} samples",
                values.nrows(),
                values.ncols(),
                entities.len(),
                sample_names.len()
            )));
        }
        let mut seen = HashSet::new();
        for entity in &entities {
            if !seen.insert(entity.clone()) {
                return Err(AppError::InvalidParameter(format!(
                    "duplicate entity id '{}' in input table",
                    entity
                )));
            }
        }
        Ok(Self {
            entities,
            level_names: vec!["sample".to_string()],
            levels: vec![sample_names],
            values,
        })
    }

    /// Read a wide CSV: first column entity ids, header row sample names.
    /// Empty or unparseable cells become NaN.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let sample_names: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();

        let mut entities = Vec::new();
        let mut rows: Vec<Vec<f64>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut fields = record.iter();
            let entity = match fields.next() {
                Some(id) => id.to_string(),
                None => continue,
            };
            let row: Vec<f64> = fields
                .map(|f| f.trim().parse::<f64>().unwrap_or(f64::NAN))
                .collect();
            if row.len() != sample_names.len() {
                return Err(AppError::MetadataMismatch(format!(
                    "row '{}' has {} values but the header names {} samples",
                    entity,
                    row.len(),
                    sample_names.len()
                )));
            }
            entities.push(entity);
            rows.push(row);
        }

        let n_rows = entities.len();
        let n_cols = sample_names.len();
        let mut values = Array2::from_elem((n_rows, n_cols), f64::NAN);
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                values[[i, j]] = *v;
            }
        }
        Self::new(entities, sample_names, values)
    }

    pub fn n_entities(&self) -> usize {
        self.entities.len()
    }

    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    pub fn level_index(&self, name: &str) -> Option<usize> {
        self.level_names.iter().position(|n| n == name)
    }

    /// Install multi-level column metadata from a metadata table.
    ///
    /// `metadata_header` names one level per metadata column; `index_column`
    /// is the metadata column matching this table's current column names.
    /// Both sides are sorted by that key and must match exactly.
    pub fn attach_metadata(
        &self,
        metadata_header: &[String],
        metadata_rows: &[Vec<String>],
        index_column: &str,
    ) -> Result<Self, AppError> {
        let index_pos = metadata_header
            .iter()
            .position(|h| h == index_column)
            .ok_or_else(|| {
                AppError::MetadataMismatch(format!(
                    "column '{}' is not in the metadata header {:?}",
                    index_column, metadata_header
                ))
            })?;
        if metadata_rows.len() != self.n_columns() {
            return Err(AppError::MetadataMismatch(format!(
                "metadata has {} rows but the table has {} sample columns",
                metadata_rows.len(),
                self.n_columns()
            )));
        }
        for row in metadata_rows {
            if row.len() != metadata_header.len() {
                return Err(AppError::MetadataMismatch(format!(
                    "metadata row {:?} does not match the header length {}",
                    row,
                    metadata_header.len()
                )));
            }
        }

        // Sort the table columns by their current name and the metadata rows
        // by the index column, then require an exact match.
        let current_names = &self.levels[0];
        let mut col_order: Vec<usize> = (0..self.n_columns()).collect();
        col_order.sort_by(|&a, &b| current_names[a].cmp(&current_names[b]));

        let mut meta_order: Vec<usize> = (0..metadata_rows.len()).collect();
        meta_order.sort_by(|&a, &b| metadata_rows[a][index_pos].cmp(&metadata_rows[b][index_pos]));

        for (c, m) in col_order.iter().zip(meta_order.iter()) {
            if current_names[*c] != metadata_rows[*m][index_pos] {
                return Err(AppError::MetadataMismatch(format!(
                    "sample column '{}' has no matching '{}' entry in the metadata",
                    current_names[*c], index_column
                )));
            }
        }

        let mut levels: Vec<Vec<String>> = vec![Vec::with_capacity(self.n_columns()); metadata_header.len()];
        for m in &meta_order {
            for (l, value) in metadata_rows[*m].iter().enumerate() {
                levels[l].push(value.clone());
            }
        }

        let mut values = Array2::from_elem((self.n_entities(), self.n_columns()), f64::NAN);
        for (new_c, old_c) in col_order.iter().enumerate() {
            for r in 0..self.n_entities() {
                values[[r, new_c]] = self.values[[r, *old_c]];
            }
        }

        Ok(Self {
            entities: self.entities.clone(),
            level_names: metadata_header.to_vec(),
            levels,
            values,
        })
    }

    /// Collapse the column metadata to a single level, with columns sorted by
    /// that level's values. This is the normalized layout the dispatcher
    /// groups replicates on.
    pub fn collapse_to_level(&self, level: &str) -> Result<Self, AppError> {
        let level_idx = self
            .level_index(level)
            .ok_or_else(|| AppError::MissingReplicateLevel {
                requested: level.to_string(),
                available: self.level_names.clone(),
            })?;

        let labels = &self.levels[level_idx];
        let mut order: Vec<usize> = (0..self.n_columns()).collect();
        order.sort_by(|&a, &b| labels[a].cmp(&labels[b]));

        let sorted_labels: Vec<String> = order.iter().map(|&c| labels[c].clone()).collect();
        let mut values = Array2::from_elem((self.n_entities(), self.n_columns()), f64::NAN);
        for (new_c, old_c) in order.iter().enumerate() {
            for r in 0..self.n_entities() {
                values[[r, new_c]] = self.values[[r, *old_c]];
            }
        }

        Ok(Self {
            entities: self.entities.clone(),
            level_names: vec![level.to_string()],
            levels: vec![sorted_labels],
            values,
        })
    }

    /// Extract one entity's series, labelled by the first column level.
    pub fn row_series(&self, row: usize) -> MeasurementSeries {
        MeasurementSeries {
            labels: self.levels[0].clone(),
            values: self.values.row(row).to_vec(),
        }
    }
}

/// Read a metadata CSV into (header, rows), all fields as strings.
pub fn read_metadata_csv<P: AsRef<Path>>(path: P) -> Result<(Vec<String>, Vec<Vec<String>>), AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let header: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok((header, rows))
}
