//! Tensor batches for class-pair sub-models

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::data::dataset::TraceDataset;
use crate::ClassPair;

/// One record as seen by a class-pair sub-model
#[derive(Debug, Clone, Copy)]
pub struct PairItem<'a> {
    pub features: &'a [f32],
    /// One-hot target over `(a, b)`
    pub target: [f32; 2],
}

impl<'a> PairItem<'a> {
    /// Items for the given record indices, all of which must carry a label in `pair`
    pub fn collect(dataset: &'a TraceDataset, pair: ClassPair, indices: &[usize]) -> Vec<Self> {
        indices
            .iter()
            .filter_map(|&i| {
                pair.one_hot(dataset.label(i)).map(|target| PairItem {
                    features: dataset.features(i),
                    target,
                })
            })
            .collect()
    }
}

/// Batch of pair items on a device
#[derive(Debug, Clone)]
pub struct PairBatch<B: Backend> {
    /// Input features: [batch, features]
    pub inputs: Tensor<B, 2>,
    /// One-hot targets: [batch, 2]
    pub targets: Tensor<B, 2>,
}

/// Batcher turning pair items into tensors
#[derive(Debug, Clone, Copy, Default)]
pub struct PairBatcher;

impl<'a, B: Backend> Batcher<B, PairItem<'a>, PairBatch<B>> for PairBatcher {
    fn batch(&self, items: Vec<PairItem<'a>>, device: &B::Device) -> PairBatch<B> {
        let batch_size = items.len();
        let width = items.first().map(|item| item.features.len()).unwrap_or(0);

        let mut input_data = Vec::with_capacity(batch_size * width);
        let mut target_data = Vec::with_capacity(batch_size * 2);
        for item in &items {
            input_data.extend_from_slice(item.features);
            target_data.extend_from_slice(&item.target);
        }

        let inputs = Tensor::<B, 1>::from_floats(input_data.as_slice(), device)
            .reshape([batch_size, width]);
        let targets = Tensor::<B, 1>::from_floats(target_data.as_slice(), device)
            .reshape([batch_size, 2]);

        PairBatch { inputs, targets }
    }
}
