//! Evaluation metrics and cross-validation results

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::ClassPair;

/// Loss and accuracy of a sub-model on one set of records
///
/// A diverged loss is kept as is; it serializes to JSON `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub loss: f32,
    pub accuracy: f32,
}

impl Evaluation {
    /// False once the loss has become NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.loss.is_finite()
    }
}

/// Metrics taken at one evaluation step
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvalRecord {
    pub step: usize,
    pub training: Evaluation,
    pub validation: Evaluation,
}

/// Why a sub-model was not trained for a held-out house
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The held-out house has no records of either class
    NoValidationRecords,
    /// The remaining houses have no records of this class
    MissingTrainingClass { class: usize },
}

/// What happened to one sub-model for one held-out house
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairOutcome {
    Skipped {
        reason: SkipReason,
    },
    Trained {
        steps: usize,
        history: Vec<EvalRecord>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairRun {
    pub house: usize,
    pub pair: ClassPair,
    pub outcome: PairOutcome,
}

impl PairRun {
    /// Metrics at the last evaluation step, if the pair was trained
    pub fn final_record(&self) -> Option<&EvalRecord> {
        match &self.outcome {
            PairOutcome::Trained { history, .. } => history.last(),
            PairOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, PairOutcome::Skipped { .. })
    }
}

/// Mean final validation metrics over a group of trained runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    pub trained: usize,
    pub skipped: usize,
    pub mean_validation_loss: f64,
    pub mean_validation_accuracy: f64,
}

impl RunSummary {
    fn from_runs<'a>(runs: impl Iterator<Item = &'a PairRun>) -> Self {
        let mut summary = RunSummary {
            trained: 0,
            skipped: 0,
            mean_validation_loss: 0.0,
            mean_validation_accuracy: 0.0,
        };
        for run in runs {
            match run.final_record() {
                Some(record) => {
                    summary.trained += 1;
                    summary.mean_validation_loss += record.validation.loss as f64;
                    summary.mean_validation_accuracy += record.validation.accuracy as f64;
                }
                None => summary.skipped += 1,
            }
        }
        if summary.trained > 0 {
            summary.mean_validation_loss /= summary.trained as f64;
            summary.mean_validation_accuracy /= summary.trained as f64;
        }
        summary
    }
}

/// Every sub-model run of a leave-one-house-out sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrossValReport {
    pub runs: Vec<PairRun>,
    pub elapsed_secs: f64,
}

impl CrossValReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, run: PairRun) {
        self.runs.push(run);
    }

    pub fn trained(&self) -> impl Iterator<Item = &PairRun> {
        self.runs.iter().filter(|r| !r.is_skipped())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &PairRun> {
        self.runs.iter().filter(|r| r.is_skipped())
    }

    /// Run for a given house and pair
    pub fn get(&self, house: usize, pair: ClassPair) -> Option<&PairRun> {
        self.runs.iter().find(|r| r.house == house && r.pair == pair)
    }

    /// Mean final validation accuracy over all trained runs
    pub fn mean_validation_accuracy(&self) -> Option<f64> {
        let summary = self.overall();
        (summary.trained > 0).then_some(summary.mean_validation_accuracy)
    }

    pub fn overall(&self) -> RunSummary {
        RunSummary::from_runs(self.runs.iter())
    }

    /// Summary per class pair, across held-out houses
    pub fn pair_summaries(&self) -> BTreeMap<ClassPair, RunSummary> {
        let mut pairs: Vec<ClassPair> = self.runs.iter().map(|r| r.pair).collect();
        pairs.sort();
        pairs.dedup();
        pairs
            .into_iter()
            .map(|pair| {
                let summary = RunSummary::from_runs(self.runs.iter().filter(|r| r.pair == pair));
                (pair, summary)
            })
            .collect()
    }

    /// Summary per held-out house, across class pairs
    pub fn house_summaries(&self) -> BTreeMap<usize, RunSummary> {
        let mut houses: Vec<usize> = self.runs.iter().map(|r| r.house).collect();
        houses.sort_unstable();
        houses.dedup();
        houses
            .into_iter()
            .map(|house| {
                let summary = RunSummary::from_runs(self.runs.iter().filter(|r| r.house == house));
                (house, summary)
            })
            .collect()
    }
}

impl fmt::Display for CrossValReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let overall = self.overall();
        writeln!(
            f,
            "{} runs trained, {} skipped in {:.1}s",
            overall.trained, overall.skipped, self.elapsed_secs
        )?;
        writeln!(f, "{:<8} {:>8} {:>10} {:>10}", "House", "Trained", "Val Loss", "Val Acc")?;
        for (house, summary) in self.house_summaries() {
            writeln!(
                f,
                "{:<8} {:>8} {:>10.3} {:>10.3}",
                house + 1,
                summary.trained,
                summary.mean_validation_loss,
                summary.mean_validation_accuracy
            )?;
        }
        writeln!(f, "{:<8} {:>8} {:>10} {:>10}", "Pair", "Trained", "Val Loss", "Val Acc")?;
        for (pair, summary) in self.pair_summaries() {
            writeln!(
                f,
                "{:<8} {:>8} {:>10.3} {:>10.3}",
                pair.to_string(),
                summary.trained,
                summary.mean_validation_loss,
                summary.mean_validation_accuracy
            )?;
        }
        match self.mean_validation_accuracy() {
            Some(accuracy) => write!(f, "Mean validation accuracy: {:.3}", accuracy),
            None => write!(f, "No pair models were trained"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained(house: usize, pair: ClassPair, val_acc: f32) -> PairRun {
        let eval = |accuracy: f32| Evaluation {
            loss: 1.0 - accuracy,
            accuracy,
        };
        PairRun {
            house,
            pair,
            outcome: PairOutcome::Trained {
                steps: 200,
                history: vec![
                    EvalRecord {
                        step: 1,
                        training: eval(0.5),
                        validation: eval(0.5),
                    },
                    EvalRecord {
                        step: 200,
                        training: eval(0.9),
                        validation: eval(val_acc),
                    },
                ],
            },
        }
    }

    #[test]
    fn test_summaries_use_final_records() {
        let p01 = ClassPair::new(0, 1);
        let p02 = ClassPair::new(0, 2);
        let mut report = CrossValReport::new();
        report.record(trained(0, p01, 0.8));
        report.record(trained(1, p01, 0.6));
        report.record(PairRun {
            house: 0,
            pair: p02,
            outcome: PairOutcome::Skipped {
                reason: SkipReason::NoValidationRecords,
            },
        });

        assert_eq!(report.trained().count(), 2);
        assert_eq!(report.skipped().count(), 1);
        assert!((report.mean_validation_accuracy().unwrap() - 0.7).abs() < 1e-6);

        let pairs = report.pair_summaries();
        assert_eq!(pairs[&p01].trained, 2);
        assert_eq!(pairs[&p02].trained, 0);
        assert_eq!(pairs[&p02].skipped, 1);

        let houses = report.house_summaries();
        assert!((houses[&0].mean_validation_accuracy - 0.8).abs() < 1e-6);
        assert_eq!(houses[&0].skipped, 1);

        assert_eq!(report.get(1, p01).unwrap().final_record().unwrap().step, 200);
    }

    #[test]
    fn test_empty_report_has_no_mean() {
        let report = CrossValReport::new();
        assert!(report.mean_validation_accuracy().is_none());
        let text = report.to_string();
        assert!(text.contains("0 runs trained"));
        assert!(text.contains("No pair models were trained"));
    }

    #[test]
    fn test_report_serializes_outcome_tag() {
        let mut report = CrossValReport::new();
        report.record(PairRun {
            house: 2,
            pair: ClassPair::new(1, 3),
            outcome: PairOutcome::Skipped {
                reason: SkipReason::MissingTrainingClass { class: 3 },
            },
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["runs"][0]["outcome"]["status"], "skipped");
        assert_eq!(
            json["runs"][0]["outcome"]["reason"]["missing_training_class"]["class"],
            3
        );
        assert_eq!(json["runs"][0]["pair"]["b"], 3);
    }
}
