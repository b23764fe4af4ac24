//! Burn-backed class-pair sub-model

use burn::data::dataloader::batcher::Batcher;
use burn::module::{AutodiffModule, Module};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use std::path::{Path, PathBuf};

use crate::data::split::class_pairs;
use crate::data::{PairBatch, PairBatcher, PairItem};
use crate::model::pair_net::{accuracy, softmax_cross_entropy};
use crate::model::{PairModel, PairNet, PairNetConfig};
use crate::training::metrics::Evaluation;
use crate::{ApplianceError, ClassPair, Result};

/// Pair network plus its Adam optimizer state
pub struct PairTrainer<B: AutodiffBackend> {
    pair: ClassPair,
    config: PairNetConfig,
    model: PairNet<B>,
    optimizer: OptimizerAdaptor<Adam, PairNet<B>, B>,
    learning_rate: f64,
}

impl<B: AutodiffBackend> PairTrainer<B> {
    pub fn new(
        device: &B::Device,
        pair: ClassPair,
        config: PairNetConfig,
        learning_rate: f64,
    ) -> Self {
        let model = PairNet::new(device, &config);
        PairTrainer {
            pair,
            config,
            model,
            optimizer: AdamConfig::new().init(),
            learning_rate,
        }
    }
}

/// One trainer per class pair, in [`class_pairs`] order
pub fn build_pair_trainers<B: AutodiffBackend>(
    device: &B::Device,
    num_classes: usize,
    config: &PairNetConfig,
    learning_rate: f64,
) -> Vec<PairTrainer<B>> {
    class_pairs(num_classes)
        .into_iter()
        .map(|pair| PairTrainer::new(device, pair, config.clone(), learning_rate))
        .collect()
}

impl<B: AutodiffBackend> PairModel for PairTrainer<B> {
    type Context = B::Device;

    fn pair(&self) -> ClassPair {
        self.pair
    }

    fn reset(&mut self, device: &B::Device) {
        self.model = PairNet::new(device, &self.config);
        self.optimizer = AdamConfig::new().init();
    }

    fn train_step(&mut self, device: &B::Device, items: Vec<PairItem<'_>>) -> Result<()> {
        if items.is_empty() {
            return Err(ApplianceError::Model(format!(
                "empty training batch for pair {}",
                self.pair
            )));
        }
        let batch: PairBatch<B> = PairBatcher.batch(items, device);

        let logits = self.model.forward(batch.inputs);
        let loss = softmax_cross_entropy(logits, batch.targets);

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self
            .optimizer
            .step(self.learning_rate, self.model.clone(), grads);

        Ok(())
    }

    fn evaluate(&self, device: &B::Device, items: Vec<PairItem<'_>>) -> Result<Evaluation> {
        if items.is_empty() {
            return Err(ApplianceError::Model(format!(
                "nothing to evaluate for pair {}",
                self.pair
            )));
        }
        let model = self.model.valid();
        let batch: PairBatch<B::InnerBackend> = PairBatcher.batch(items, device);

        let logits = model.forward(batch.inputs);
        let loss: f32 = softmax_cross_entropy(logits.clone(), batch.targets.clone())
            .into_scalar()
            .elem();

        Ok(Evaluation {
            loss,
            accuracy: accuracy(logits, batch.targets),
        })
    }

    fn save(&self, path: &Path) -> Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.model.clone().into_record(), record_path(path))
            .map_err(|e| ApplianceError::Checkpoint(e.to_string()))
    }

    fn load(&mut self, device: &B::Device, path: &Path) -> Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(record_path(path), device)
            .map_err(|e| ApplianceError::Checkpoint(e.to_string()))?;
        self.model = self.model.clone().load_record(record);
        Ok(())
    }
}

/// The recorder replaces any extension, so keep the full name and add its own
fn record_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".mpk");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TraceDataset;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    /// Two linearly separable classes: sign of the first feature
    fn separable() -> TraceDataset {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let class = i % 2;
            let sign = if class == 0 { 1.0 } else { -1.0 };
            let jitter = (i as f32) * 0.01;
            features.extend_from_slice(&[sign * (0.5 + jitter), 0.1, -sign * 0.3, jitter]);
            labels.push(class);
        }
        TraceDataset::new(
            features,
            4,
            labels,
            vec![0; 40],
            vec![0; 40],
            vec!["on".into(), "off".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_build_one_trainer_per_pair() {
        let device = Default::default();
        let trainers =
            build_pair_trainers::<TestBackend>(&device, 4, &PairNetConfig::new(8, 30), 0.001);
        assert_eq!(trainers.len(), 6);
        assert_eq!(trainers[0].pair(), ClassPair::new(0, 1));
        assert_eq!(trainers[5].pair(), ClassPair::new(2, 3));
    }

    #[test]
    fn test_training_reduces_loss() {
        let device = Default::default();
        let dataset = separable();
        let pair = ClassPair::new(0, 1);
        let indices: Vec<usize> = (0..dataset.len()).collect();
        let mut trainer =
            PairTrainer::<TestBackend>::new(&device, pair, PairNetConfig::new(4, 30), 0.01);

        let before = trainer
            .evaluate(&device, PairItem::collect(&dataset, pair, &indices))
            .unwrap();
        for _ in 0..150 {
            trainer
                .train_step(&device, PairItem::collect(&dataset, pair, &indices))
                .unwrap();
        }
        let after = trainer
            .evaluate(&device, PairItem::collect(&dataset, pair, &indices))
            .unwrap();

        assert!(after.loss < before.loss, "{} -> {}", before.loss, after.loss);
        assert!(after.accuracy >= 0.95, "accuracy {}", after.accuracy);
    }

    #[test]
    fn test_save_and_load_parameters() {
        let device = Default::default();
        let dataset = separable();
        let pair = ClassPair::new(0, 1);
        let indices: Vec<usize> = (0..dataset.len()).collect();
        let config = PairNetConfig::new(4, 30);

        let mut trained = PairTrainer::<TestBackend>::new(&device, pair, config.clone(), 0.01);
        for _ in 0..20 {
            trained
                .train_step(&device, PairItem::collect(&dataset, pair, &indices))
                .unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair-0-1");
        trained.save(&path).unwrap();

        let mut fresh = PairTrainer::<TestBackend>::new(&device, pair, config, 0.01);
        fresh.load(&device, &path).unwrap();

        let expected = trained
            .evaluate(&device, PairItem::collect(&dataset, pair, &indices))
            .unwrap();
        let actual = fresh
            .evaluate(&device, PairItem::collect(&dataset, pair, &indices))
            .unwrap();
        assert!((expected.loss - actual.loss).abs() < 1e-6);
        assert_eq!(expected.accuracy, actual.accuracy);
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        let device = Default::default();
        let mut trainer = PairTrainer::<TestBackend>::new(
            &device,
            ClassPair::new(0, 1),
            PairNetConfig::new(4, 30),
            0.01,
        );
        assert!(trainer.train_step(&device, Vec::new()).is_err());
        assert!(trainer.evaluate(&device, Vec::new()).is_err());
    }
}
