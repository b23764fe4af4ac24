//! Class-pair sub-models
//!
//! The orchestrator only sees [`PairModel`]; `pair_net` provides the burn
//! network used by the CLI.

pub mod pair_net;

use std::path::Path;

use crate::data::PairItem;
use crate::training::metrics::Evaluation;
use crate::{ClassPair, Result};

pub use pair_net::{PairNet, PairNetConfig};

/// A trainable binary classifier bound to one class pair
///
/// Every operation receives the execution context explicitly (for burn
/// backends, the device the parameters live on).
pub trait PairModel {
    type Context;

    /// The class pair this model separates
    fn pair(&self) -> ClassPair;

    /// Discard learned parameters and optimizer state
    fn reset(&mut self, ctx: &Self::Context);

    /// Apply one optimization step on a mini-batch
    fn train_step(&mut self, ctx: &Self::Context, items: Vec<PairItem<'_>>) -> Result<()>;

    /// Loss and accuracy on a set of items, without updating parameters
    fn evaluate(&self, ctx: &Self::Context, items: Vec<PairItem<'_>>) -> Result<Evaluation>;

    /// Persist parameters to `path`
    fn save(&self, path: &Path) -> Result<()>;

    /// Replace parameters with those stored at `path`
    fn load(&mut self, ctx: &Self::Context, path: &Path) -> Result<()>;
}
