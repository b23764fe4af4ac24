//! Leave-one-house-out splits and class-pair index sets

use crate::data::dataset::TraceDataset;
use crate::ClassPair;

/// Every unordered pair of classes, in lexicographic order
pub fn class_pairs(num_classes: usize) -> Vec<ClassPair> {
    (0..num_classes)
        .flat_map(|a| (a + 1..num_classes).map(move |b| ClassPair { a, b }))
        .collect()
}

/// Records whose label belongs to a class pair
#[derive(Debug, Clone)]
pub struct PairIndex {
    pub pair: ClassPair,
    /// Sorted record indices
    pub indices: Vec<usize>,
}

impl PairIndex {
    pub fn new(dataset: &TraceDataset, pair: ClassPair) -> Self {
        let indices = dataset
            .labels()
            .iter()
            .enumerate()
            .filter(|(_, &label)| pair.contains(label))
            .map(|(i, _)| i)
            .collect();
        PairIndex { pair, indices }
    }

    /// Index sets for every class pair of the dataset
    pub fn all(dataset: &TraceDataset) -> Vec<Self> {
        class_pairs(dataset.num_classes())
            .into_iter()
            .map(|pair| Self::new(dataset, pair))
            .collect()
    }
}

/// Training/validation partition holding one house out
#[derive(Debug, Clone)]
pub struct HouseSplit {
    pub house: usize,
    /// Sorted indices of records from every other house
    pub training: Vec<usize>,
    /// Sorted indices of records from the held-out house
    pub validation: Vec<usize>,
}

impl HouseSplit {
    pub fn new(dataset: &TraceDataset, house: usize) -> Self {
        let (validation, training): (Vec<usize>, Vec<usize>) =
            (0..dataset.len()).partition(|&i| dataset.house(i) == house);
        HouseSplit {
            house,
            training,
            validation,
        }
    }

    /// Restrict both sides of the split to one class pair
    pub fn restrict(&self, pair_index: &PairIndex) -> (Vec<usize>, Vec<usize>) {
        (
            intersect_sorted(&self.training, &pair_index.indices),
            intersect_sorted(&self.validation, &pair_index.indices),
        )
    }
}

/// Intersection of two ascending, duplicate-free index lists
pub fn intersect_sorted(left: &[usize], right: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(left.len().min(right.len()));
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(left[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(labels: Vec<usize>, houses: Vec<usize>, num_classes: usize) -> TraceDataset {
        let n = labels.len();
        TraceDataset::new(
            vec![0.0; n * 2],
            2,
            labels,
            vec![0; n],
            houses,
            (0..num_classes).map(|c| c.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_pair_count_is_n_choose_two() {
        for n in 0..8 {
            assert_eq!(class_pairs(n).len(), n * n.saturating_sub(1) / 2);
        }
        assert_eq!(
            class_pairs(3),
            vec![ClassPair::new(0, 1), ClassPair::new(0, 2), ClassPair::new(1, 2)]
        );
    }

    #[test]
    fn test_house_split_partitions_all_indices() {
        let data = dataset(vec![0, 1, 2, 0, 1, 2, 0], vec![0, 1, 2, 1, 0, 2, 1], 3);
        for house in 0..data.num_houses() {
            let split = HouseSplit::new(&data, house);
            assert!(intersect_sorted(&split.training, &split.validation).is_empty());

            let mut union: Vec<usize> =
                split.training.iter().chain(&split.validation).copied().collect();
            union.sort_unstable();
            assert_eq!(union, (0..data.len()).collect::<Vec<_>>());
            assert!(split.validation.iter().all(|&i| data.house(i) == house));
        }
    }

    #[test]
    fn test_restrict_to_pair() {
        let data = dataset(vec![0, 1, 2, 0, 1, 2], vec![0, 0, 0, 1, 1, 1], 3);
        let split = HouseSplit::new(&data, 1);
        let pair_index = PairIndex::new(&data, ClassPair::new(0, 2));
        assert_eq!(pair_index.indices, vec![0, 2, 3, 5]);

        let (training, validation) = split.restrict(&pair_index);
        assert_eq!(training, vec![0, 2]);
        assert_eq!(validation, vec![3, 5]);
    }

    #[test]
    fn test_intersect_sorted() {
        assert_eq!(intersect_sorted(&[1, 3, 5, 7], &[2, 3, 4, 7, 9]), vec![3, 7]);
        assert!(intersect_sorted(&[], &[1, 2]).is_empty());
    }
}
