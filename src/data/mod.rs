//! Trace data loading, house splits, sampling and batching

pub mod batch;
pub mod dataset;
pub mod sampling;
pub mod split;

pub use batch::{PairBatch, PairBatcher, PairItem};
pub use dataset::TraceDataset;
pub use sampling::BatchSampler;
pub use split::{class_pairs, HouseSplit, PairIndex};
