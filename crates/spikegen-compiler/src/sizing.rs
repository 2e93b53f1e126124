// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Padded work sizes per kernel kind
//!
//! Each synaptic kernel kind has its own sizing function, looked up through
//! [`sizing_fn`] so the finalizer and emitter never branch on kind directly.

use crate::plan::KernelKind;
use crate::projection::Projection;
use crate::matrix::SpanType;

/// Computes a projection's padded unit count for one kernel, given the
/// kernel's execution-group width
pub type SizingFn = fn(&Projection, usize) -> usize;

/// Smallest multiple of `block_size` that is `>= size`
#[inline]
pub fn padded(size: usize, block_size: usize) -> usize {
    if block_size == 0 {
        return size;
    }
    size.div_ceil(block_size) * block_size
}

/// Synaptic event propagation
///
/// Postsynaptic span: one unit per target neuron, or per row slot when the
/// connectivity is sparse. Presynaptic span: one unit per source neuron per
/// thread-per-spike.
pub fn presynaptic_update_size(projection: &Projection, block_size: usize) -> usize {
    match projection.span_type {
        SpanType::Postsynaptic => {
            if projection.storage.is_sparse() {
                padded(projection.max_connections, block_size)
            } else {
                padded(projection.target_size, block_size)
            }
        }
        SpanType::Presynaptic => padded(
            projection.source_size * projection.num_threads_per_spike,
            block_size,
        ),
    }
}

/// Post-learning: one unit per source neuron (a column of the matrix)
pub fn postsynaptic_learning_size(projection: &Projection, block_size: usize) -> usize {
    padded(projection.source_size, block_size)
}

/// Synapse dynamics: one unit per synapse
pub fn synapse_dynamics_size(projection: &Projection, block_size: usize) -> usize {
    padded(projection.synapse_capacity(), block_size)
}

pub fn sizing_fn(kind: KernelKind) -> Option<SizingFn> {
    match kind {
        KernelKind::PresynapticUpdate => Some(presynaptic_update_size),
        KernelKind::PostsynapticLearning => Some(postsynaptic_learning_size),
        KernelKind::SynapseDynamics => Some(synapse_dynamics_size),
        KernelKind::NeuronUpdate | KernelKind::CustomUpdate => None,
    }
}
