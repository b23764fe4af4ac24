//! Leave-one-house-out training of every class-pair sub-model

use rand::Rng;
use std::time::Instant;

use crate::data::{BatchSampler, HouseSplit, PairIndex, PairItem, TraceDataset};
use crate::model::PairModel;
use crate::training::checkpoint::Checkpoint;
use crate::training::metrics::{CrossValReport, EvalRecord, PairOutcome, PairRun, SkipReason};
use crate::{ApplianceError, Result, TrainingConfig};

/// Drives training of all pair models across held-out houses
pub struct CrossValidator<'a> {
    dataset: &'a TraceDataset,
    config: TrainingConfig,
    checkpoint: Option<Checkpoint>,
}

impl<'a> CrossValidator<'a> {
    pub fn new(dataset: &'a TraceDataset, config: TrainingConfig) -> Self {
        CrossValidator {
            dataset,
            config,
            checkpoint: None,
        }
    }

    /// Save to (and resume from) this checkpoint
    pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Run the full sweep
    ///
    /// `models` must hold one model per class pair, in the order produced by
    /// [`crate::data::class_pairs`]. Every house starts from freshly reset
    /// parameters, or from that house's own snapshot when one exists.
    pub fn run<M: PairModel, R: Rng + ?Sized>(
        &self,
        ctx: &M::Context,
        models: &mut [M],
        rng: &mut R,
    ) -> Result<CrossValReport> {
        self.config.validate()?;
        let start = Instant::now();

        let pair_indices = PairIndex::all(self.dataset);
        check_models(&pair_indices, models)?;

        let mut report = CrossValReport::new();
        for house in 0..self.dataset.num_houses() {
            log::info!("Leave one out: House {}", house + 1);
            let split = HouseSplit::new(self.dataset, house);
            let checkpoint = self.checkpoint.as_ref().map(|c| c.for_house(house));

            for model in models.iter_mut() {
                model.reset(ctx);
            }
            if let Some(checkpoint) = checkpoint.as_ref().filter(|c| c.exists()) {
                log::info!("Restoring models from {}", checkpoint.prefix().display());
                checkpoint.restore(ctx, models)?;
            }

            for (position, pair_index) in pair_indices.iter().enumerate() {
                let outcome = self.run_pair(
                    ctx,
                    models,
                    position,
                    pair_index,
                    &split,
                    checkpoint.as_ref(),
                    rng,
                )?;
                report.record(PairRun {
                    house,
                    pair: pair_index.pair,
                    outcome,
                });
            }
            log::info!("Done with all pairs for house {}", house + 1);
        }

        report.elapsed_secs = start.elapsed().as_secs_f64();
        log::info!("Finished in {:.1} seconds", report.elapsed_secs);
        Ok(report)
    }

    /// Train and evaluate one pair model against one house split
    fn run_pair<M: PairModel, R: Rng + ?Sized>(
        &self,
        ctx: &M::Context,
        models: &mut [M],
        position: usize,
        pair_index: &PairIndex,
        split: &HouseSplit,
        checkpoint: Option<&Checkpoint>,
        rng: &mut R,
    ) -> Result<PairOutcome> {
        let pair = pair_index.pair;
        let label = |class: usize| self.dataset.padded_class_name(class);
        let (training, validation) = split.restrict(pair_index);
        let training_labels: Vec<usize> = training.iter().map(|&i| self.dataset.label(i)).collect();

        let skip = if validation.is_empty() {
            Some(SkipReason::NoValidationRecords)
        } else if self.config.skip_untrainable_pairs {
            [pair.a, pair.b]
                .into_iter()
                .find(|class| !training_labels.contains(class))
                .map(|class| SkipReason::MissingTrainingClass { class })
        } else {
            None
        };

        if let Some(reason) = skip {
            log::info!(
                " Skipping House {} [{} {}]",
                split.house + 1,
                label(pair.a),
                label(pair.b)
            );
            if let SkipReason::MissingTrainingClass { class } = reason {
                log::debug!("  no training records of {}", self.dataset.class_names()[class]);
            }
            return Ok(PairOutcome::Skipped { reason });
        }
        log::info!(
            " Running  House {} [{} {}]",
            split.house + 1,
            label(pair.a),
            label(pair.b)
        );

        let sampler = BatchSampler::balanced(&training_labels, pair)?;

        let mut history = Vec::new();
        let mut step = 0;
        loop {
            step += 1;

            let batch: Vec<usize> = sampler
                .sample(rng, self.config.batch_size)
                .into_iter()
                .map(|draw| training[draw])
                .collect();
            models[position].train_step(ctx, PairItem::collect(self.dataset, pair, &batch))?;

            if step % self.config.display_step != 0 && step != 1 {
                continue;
            }

            if let Some(checkpoint) = checkpoint {
                checkpoint.save(models)?;
            }

            let model = &models[position];
            let record = EvalRecord {
                step,
                training: model.evaluate(ctx, PairItem::collect(self.dataset, pair, &training))?,
                validation: model
                    .evaluate(ctx, PairItem::collect(self.dataset, pair, &validation))?,
            };
            log::info!(
                "\tStep {}, Training Loss= {:>8.3}, Validation Loss= {:>8.3}",
                step,
                record.training.loss,
                record.validation.loss
            );
            log::info!(
                "\t  Training Accuracy= {:.3} Validation Accuracy= {:.3}",
                record.training.accuracy,
                record.validation.accuracy
            );
            if !record.training.is_finite() || !record.validation.is_finite() {
                log::warn!(
                    "\tLoss diverged at step {} for House {} [{} {}]",
                    step,
                    split.house + 1,
                    label(pair.a),
                    label(pair.b)
                );
            }
            history.push(record);

            if self.config.max_steps.is_some_and(|max| step >= max) {
                log::info!("\tCompleted at step {}", step);
                break;
            }
        }

        Ok(PairOutcome::Trained {
            steps: step,
            history,
        })
    }
}

/// Models must line up one-to-one with the dataset's class pairs
fn check_models<M: PairModel>(pair_indices: &[PairIndex], models: &[M]) -> Result<()> {
    if models.len() != pair_indices.len() {
        return Err(ApplianceError::ModelCountMismatch {
            expected: pair_indices.len(),
            actual: models.len(),
        });
    }
    for (index, (pair_index, model)) in pair_indices.iter().zip(models).enumerate() {
        if model.pair() != pair_index.pair {
            return Err(ApplianceError::PairMismatch {
                index,
                expected: pair_index.pair,
                actual: model.pair(),
            });
        }
    }
    Ok(())
}
