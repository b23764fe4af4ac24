//! Appliance trace dataset
//!
//! Each record is a feature row of two equal-length halves (current, then
//! voltage) with a class label, a device-name id and a house id.

use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::path::Path;

use crate::{ApplianceError, Result};

/// Number of trailing metadata columns in the trace bundle (house, name, label)
pub const METADATA_COLUMNS: usize = 3;

/// In-memory table of labelled appliance traces
#[derive(Debug, Clone)]
pub struct TraceDataset {
    /// Row-major feature matrix, `num_features` values per record
    features: Vec<f32>,
    num_features: usize,
    labels: Vec<usize>,
    names: Vec<usize>,
    houses: Vec<usize>,
    class_names: Vec<String>,
}

impl TraceDataset {
    /// Build a dataset from parallel columns
    ///
    /// Fails with [`ApplianceError::ClassCountMismatch`] if the number of class
    /// names is not `max(label) + 1`.
    pub fn new(
        features: Vec<f32>,
        num_features: usize,
        labels: Vec<usize>,
        names: Vec<usize>,
        houses: Vec<usize>,
        class_names: Vec<String>,
    ) -> Result<Self> {
        let n = labels.len();
        if num_features == 0 || num_features % 2 != 0 {
            return Err(ApplianceError::Dataset(format!(
                "feature width must be a positive even number, got {}",
                num_features
            )));
        }
        if features.len() != n * num_features {
            return Err(ApplianceError::Dataset(format!(
                "expected {} feature values for {} records, got {}",
                n * num_features,
                n,
                features.len()
            )));
        }
        if names.len() != n || houses.len() != n {
            return Err(ApplianceError::Dataset(format!(
                "column lengths differ: {} labels, {} names, {} houses",
                n,
                names.len(),
                houses.len()
            )));
        }

        let label_count = labels.iter().max().map_or(0, |max| max + 1);
        if label_count != class_names.len() {
            return Err(ApplianceError::ClassCountMismatch {
                names: class_names.len(),
                labels: label_count,
            });
        }

        Ok(TraceDataset {
            features,
            num_features,
            labels,
            names,
            houses,
            class_names,
        })
    }

    /// Build a dataset from a bundle matrix laid out as
    /// `[features.., house, name, label]` per row
    pub fn from_bundle(bundle: &Array2<f64>, class_names: Vec<String>) -> Result<Self> {
        let (rows, cols) = bundle.dim();
        if cols <= METADATA_COLUMNS {
            return Err(ApplianceError::Dataset(format!(
                "bundle has {} columns, need features plus {} metadata columns",
                cols, METADATA_COLUMNS
            )));
        }
        let num_features = cols - METADATA_COLUMNS;

        let mut features = Vec::with_capacity(rows * num_features);
        let mut labels = Vec::with_capacity(rows);
        let mut names = Vec::with_capacity(rows);
        let mut houses = Vec::with_capacity(rows);

        for (row_index, row) in bundle.rows().into_iter().enumerate() {
            features.extend(row.iter().take(num_features).map(|v| *v as f32));
            houses.push(metadata_id(row[num_features], row_index, "house")?);
            names.push(metadata_id(row[num_features + 1], row_index, "name")?);
            labels.push(metadata_id(row[num_features + 2], row_index, "label")?);
        }

        Self::new(features, num_features, labels, names, houses, class_names)
    }

    /// Load the trace bundle (`.npy`) and class map (JSON array of strings)
    ///
    /// Rows are shuffled with `rng` and both signal channels are normalized,
    /// matching how the experiments prepare data before training.
    pub fn load<R: Rng + ?Sized>(
        bundle_path: impl AsRef<Path>,
        class_map_path: impl AsRef<Path>,
        rng: &mut R,
    ) -> Result<Self> {
        let bundle_path = bundle_path.as_ref();
        let bundle: Array2<f64> = ndarray_npy::read_npy(bundle_path).map_err(|e| {
            ApplianceError::Npy(format!("Failed to read {}: {}", bundle_path.display(), e))
        })?;

        let class_map = std::fs::read_to_string(class_map_path.as_ref())?;
        let class_names: Vec<String> = serde_json::from_str(&class_map)?;

        let mut dataset = Self::from_bundle(&bundle, class_names)?;
        dataset.shuffle(rng);
        dataset.normalize_channels();

        log::info!(
            "Loaded {} traces ({} features, {} classes, {} houses) from {}",
            dataset.len(),
            dataset.num_features(),
            dataset.num_classes(),
            dataset.num_houses(),
            bundle_path.display()
        );

        Ok(dataset)
    }

    /// Shuffle records in place
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);

        let mut features = Vec::with_capacity(self.features.len());
        for &i in &order {
            features.extend_from_slice(self.features(i));
        }
        self.features = features;
        self.labels = order.iter().map(|&i| self.labels[i]).collect();
        self.names = order.iter().map(|&i| self.names[i]).collect();
        self.houses = order.iter().map(|&i| self.houses[i]).collect();
    }

    /// Scale the current half and the voltage half of every row by the
    /// largest absolute value found in that half across the dataset
    pub fn normalize_channels(&mut self) {
        let half = self.num_features / 2;
        for channel in [0..half, half..self.num_features] {
            let peak = self
                .features
                .chunks_exact(self.num_features)
                .flat_map(|row| row[channel.clone()].iter())
                .fold(0.0f32, |acc, v| acc.max(v.abs()));

            if peak == 0.0 {
                log::warn!("Channel {:?} is all zeros, leaving it unscaled", channel);
                continue;
            }

            for row in self.features.chunks_exact_mut(self.num_features) {
                for v in &mut row[channel.clone()] {
                    *v /= peak;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Number of houses, `max(house) + 1`
    pub fn num_houses(&self) -> usize {
        self.houses.iter().max().map_or(0, |max| max + 1)
    }

    /// Feature row for record `i`
    pub fn features(&self, i: usize) -> &[f32] {
        &self.features[i * self.num_features..(i + 1) * self.num_features]
    }

    pub fn label(&self, i: usize) -> usize {
        self.labels[i]
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn name(&self, i: usize) -> usize {
        self.names[i]
    }

    pub fn house(&self, i: usize) -> usize {
        self.houses[i]
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Class name right-padded to the longest name, for aligned output
    pub fn padded_class_name(&self, class: usize) -> String {
        let width = self
            .class_names
            .iter()
            .map(|s| s.chars().count())
            .max()
            .unwrap_or(0);
        format!("{:<width$}", self.class_names[class], width = width)
    }

    /// Per-house record counts for each class, indexed `[house][class]`
    pub fn class_histogram_by_house(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut histogram: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (&house, &label) in self.houses.iter().zip(&self.labels) {
            histogram
                .entry(house)
                .or_insert_with(|| vec![0; self.class_names.len()])[label] += 1;
        }
        histogram
    }
}

/// Convert a float metadata cell into a non-negative integer id
fn metadata_id(value: f64, row: usize, column: &str) -> Result<usize> {
    if value < 0.0 || value.fract() != 0.0 || !value.is_finite() {
        return Err(ApplianceError::Dataset(format!(
            "row {}: {} must be a non-negative integer, got {}",
            row, column, value
        )));
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("class{}", i)).collect()
    }

    #[test]
    fn test_class_count_mismatch_is_fatal() {
        let result = TraceDataset::new(
            vec![0.0; 4],
            2,
            vec![0, 2],
            vec![0, 0],
            vec![0, 1],
            names(2),
        );
        match result {
            Err(ApplianceError::ClassCountMismatch { names, labels }) => {
                assert_eq!(names, 2);
                assert_eq!(labels, 3);
            }
            other => panic!("expected class count mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_from_bundle_splits_metadata_columns() {
        let bundle = array![
            [1.0, 2.0, 3.0, 4.0, 0.0, 7.0, 1.0],
            [5.0, 6.0, 7.0, 8.0, 1.0, 3.0, 0.0],
        ];
        let dataset = TraceDataset::from_bundle(&bundle, names(2)).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.num_features(), 4);
        assert_eq!(dataset.features(1), &[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(dataset.house(0), 0);
        assert_eq!(dataset.name(0), 7);
        assert_eq!(dataset.label(0), 1);
        assert_eq!(dataset.num_houses(), 2);
    }

    #[test]
    fn test_from_bundle_rejects_fractional_label() {
        let bundle = array![[1.0, 2.0, 0.0, 0.0, 0.5]];
        assert!(TraceDataset::from_bundle(&bundle, names(1)).is_err());
    }

    #[test]
    fn test_normalize_channels_scales_halves_independently() {
        let mut dataset = TraceDataset::new(
            vec![2.0, -4.0, 10.0, 5.0, 1.0, 1.0, -20.0, 0.0],
            4,
            vec![0, 0],
            vec![0, 0],
            vec![0, 0],
            names(1),
        )
        .unwrap();

        dataset.normalize_channels();

        assert_eq!(dataset.features(0), &[0.5, -1.0, 0.5, 0.25]);
        assert_eq!(dataset.features(1), &[0.25, 0.25, -1.0, 0.0]);
    }

    #[test]
    fn test_shuffle_keeps_rows_together() {
        let mut dataset = TraceDataset::new(
            (0..20).map(|v| v as f32).collect(),
            2,
            (0..10).map(|i| i % 2).collect(),
            (0..10).collect(),
            (0..10).map(|i| i % 3).collect(),
            names(2),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        dataset.shuffle(&mut rng);

        for i in 0..dataset.len() {
            // name doubles as the original row index
            let original = dataset.name(i);
            assert_eq!(
                dataset.features(i),
                &[(original * 2) as f32, (original * 2 + 1) as f32]
            );
            assert_eq!(dataset.label(i), original % 2);
            assert_eq!(dataset.house(i), original % 3);
        }
    }

    #[test]
    fn test_padded_class_names_share_width() {
        let dataset = TraceDataset::new(
            vec![0.0; 4],
            2,
            vec![0, 1],
            vec![0, 0],
            vec![0, 0],
            vec!["Fan".to_string(), "Microwave".to_string()],
        )
        .unwrap();
        assert_eq!(dataset.padded_class_name(0), "Fan      ");
        assert_eq!(dataset.padded_class_name(1), "Microwave");
    }

    #[test]
    fn test_load_reads_npy_bundle_and_class_map() {
        let dir = tempfile::tempdir().unwrap();
        let bundle_path = dir.path().join("traces_bundle.npy");
        let class_map_path = dir.path().join("traces_class_map.json");

        let bundle = array![
            [1.0, 4.0, 0.0, 0.0, 0.0],
            [-2.0, 2.0, 1.0, 1.0, 1.0],
            [0.5, -8.0, 1.0, 2.0, 0.0],
        ];
        ndarray_npy::write_npy(&bundle_path, &bundle).unwrap();
        std::fs::write(&class_map_path, r#"["Fan", "Heater"]"#).unwrap();

        let mut rng = StdRng::seed_from_u64(21);
        let dataset = TraceDataset::load(&bundle_path, &class_map_path, &mut rng).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.num_classes(), 2);
        assert_eq!(dataset.num_houses(), 2);
        for i in 0..dataset.len() {
            assert!(dataset.features(i).iter().all(|v| v.abs() <= 1.0));
        }
        let histogram = dataset.class_histogram_by_house();
        assert_eq!(histogram[&0], vec![1, 0]);
        assert_eq!(histogram[&1], vec![1, 1]);
    }
}
