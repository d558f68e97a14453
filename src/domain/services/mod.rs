pub mod batch_builder;

pub use batch_builder::{BatchBuilder, SweepBatch};
