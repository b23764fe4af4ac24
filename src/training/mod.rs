//! Model training
//!
//! Leave-one-house-out orchestration, the burn sub-model trainer,
//! checkpointing and result collection.

pub mod checkpoint;
pub mod crossval;
pub mod metrics;
pub mod pair_trainer;

pub use checkpoint::Checkpoint;
pub use crossval::CrossValidator;
pub use metrics::{CrossValReport, EvalRecord, Evaluation, PairOutcome, PairRun, SkipReason};
pub use pair_trainer::{build_pair_trainers, PairTrainer};
