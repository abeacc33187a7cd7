//! Index partitions and minibatch schedules
//!
//! The buffer hands out a contiguous partition of its indices. How that
//! partition is consumed during each training epoch is decided here.

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

/// How minibatches are drawn within one epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MinibatchSampling {
    /// Each slot picks one index group uniformly at random; groups may
    /// repeat or be skipped within an epoch
    WithReplacement,

    /// Every transition is visited exactly once per epoch through a freshly
    /// shuffled partition
    #[default]
    ShuffledEpoch,
}

/// Split `0..n` into contiguous groups of `batch_size`
///
/// The last group holds the remainder when `n` is not a multiple of
/// `batch_size`. Returns no groups for `n == 0`.
///
/// # Panics
///
/// Panics if `batch_size` is zero.
pub fn partition_indices(n: usize, batch_size: usize) -> Vec<Vec<usize>> {
    assert!(batch_size > 0, "batch_size must be positive");
    (0..n)
        .collect::<Vec<_>>()
        .chunks(batch_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Minibatches to train on during one epoch
///
/// `batches` is the contiguous partition produced by the buffer; `n` is the
/// number of transitions it covers.
pub fn minibatch_schedule<R: Rng + ?Sized>(
    batches: &[Vec<usize>],
    n: usize,
    sampling: MinibatchSampling,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    if batches.is_empty() {
        return Vec::new();
    }

    match sampling {
        MinibatchSampling::WithReplacement => (0..batches.len())
            .map(|_| batches[rng.gen_range(0..batches.len())].clone())
            .collect(),
        MinibatchSampling::ShuffledEpoch => {
            let batch_size = batches[0].len();
            let mut indices: Vec<usize> = (0..n).collect();
            indices.shuffle(rng);
            indices.chunks(batch_size).map(|chunk| chunk.to_vec()).collect()
        }
    }
}
