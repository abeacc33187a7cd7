//! Trajectory buffer storage
//!
//! Transitions are appended one at a time and read back as a frozen,
//! index-aligned batch.

use super::sampling::partition_indices;
use crate::env::{Action, Observation};

/// One environment interaction as seen by the learner
#[derive(Debug, Clone)]
pub struct Transition {
    /// Observation the action was chosen from
    pub state: Observation,

    /// Sampled action in `[0, 1]^3`
    pub action: Action,

    /// Summed log-probability of `action` under the sampling policy
    pub log_prob: f32,

    /// Reward accumulated over the repeated substeps
    pub reward: f32,

    /// Observation after the step
    pub next_state: Observation,

    /// Value estimate of `state`
    pub value: f32,
}

/// Trajectory buffer for a single environment
///
/// Stores each transition field in its own sequence so the learner can
/// build one tensor per field.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryBuffer {
    /// States [n]
    states: Vec<Observation>,

    /// Actions [n]
    actions: Vec<Action>,

    /// Log probabilities [n]
    log_probs: Vec<f32>,

    /// Rewards [n]
    rewards: Vec<f32>,

    /// Next states [n]
    next_states: Vec<Observation>,

    /// Value estimates [n]
    values: Vec<f32>,
}

impl TrajectoryBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one transition
    pub fn memory(&mut self, transition: Transition) {
        let Transition { state, action, log_prob, reward, next_state, value } = transition;
        self.states.push(state);
        self.actions.push(action);
        self.log_probs.push(log_prob);
        self.rewards.push(reward);
        self.next_states.push(next_state);
        self.values.push(value);
    }

    /// Freeze the buffer into aligned field slices plus contiguous index
    /// groups of `batch_size` (the last group may be shorter)
    ///
    /// # Panics
    ///
    /// Panics if the buffered fields have diverged in length or if
    /// `batch_size` is zero.
    pub fn generate_batch(&self, batch_size: usize) -> TrajectoryBatch<'_> {
        let n = self.values.len();
        assert_eq!(self.states.len(), n, "states/values length mismatch");
        assert_eq!(self.actions.len(), n, "actions/values length mismatch");
        assert_eq!(self.log_probs.len(), n, "log_probs/values length mismatch");
        assert_eq!(self.rewards.len(), n, "rewards/values length mismatch");
        assert_eq!(self.next_states.len(), n, "next_states/values length mismatch");

        TrajectoryBatch {
            states: &self.states,
            actions: &self.actions,
            log_probs: &self.log_probs,
            rewards: &self.rewards,
            next_states: &self.next_states,
            values: &self.values,
            batches: partition_indices(n, batch_size),
        }
    }

    /// Discard all transitions
    pub fn clear(&mut self) {
        self.states.clear();
        self.actions.clear();
        self.log_probs.clear();
        self.rewards.clear();
        self.next_states.clear();
        self.values.clear();
    }

    /// Number of buffered transitions
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Frozen view of a buffer, fields aligned by index
#[derive(Debug)]
pub struct TrajectoryBatch<'a> {
    /// States \[n\]
    pub states: &'a [Observation],

    /// Actions \[n\]
    pub actions: &'a [Action],

    /// Old log probabilities \[n\]
    pub log_probs: &'a [f32],

    /// Rewards \[n\]
    pub rewards: &'a [f32],

    /// Next states \[n\]
    pub next_states: &'a [Observation],

    /// Old value estimates \[n\]
    pub values: &'a [f32],

    /// Contiguous index groups partitioning `0..n`
    pub batches: Vec<Vec<usize>>,
}

impl TrajectoryBatch<'_> {
    /// Number of transitions
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All states flattened channel-first, one after another
    pub fn flat_states(&self) -> Vec<f32> {
        let per_state = self.states.first().map_or(0, Observation::len);
        let mut flat = Vec::with_capacity(per_state * self.states.len());
        for state in self.states {
            flat.extend_from_slice(state.data());
        }
        flat
    }

    /// All actions flattened, three components each
    pub fn flat_actions(&self) -> Vec<f32> {
        self.actions.iter().flat_map(|a| a.as_slice().iter().copied()).collect()
    }
}
