//! Experience storage for on-policy training

pub mod trajectory;

pub use trajectory::{
    MinibatchSampling, TrajectoryBatch, TrajectoryBuffer, Transition, compute_advantages,
    minibatch_schedule, partition_indices,
};
