// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Kernel Backend Abstraction
//!
//! A backend owns the *structure* of every kernel: launch indexing, the
//! guarded dispatch chain over plan ranges, spike-buffer protocol and where
//! synaptic input accumulates. What happens for one neuron, synapse or
//! custom-update element is delegated to [`KernelHandlers`].

mod cuda;

pub use cuda::{CudaBackend, NEURON_RESET_KERNEL};

use spikegen_compiler::{CustomUpdate, FinalizedModel, Population, Projection};

use crate::code_stream::CodeStream;
use crate::error::CodegenResult;
use crate::handlers::KernelHandlers;

/// Where a synaptic kernel accumulates input to `inSyn` before it reaches
/// global memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulation {
    /// Per-thread register, one target per thread
    LinSyn,
    /// Block-shared array indexed by target, flushed once per block
    SharedMemory,
    /// Atomic add straight into the target's global `inSyn`
    GlobalAtomic,
}

/// True spikes or spike-like events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpikeKind {
    True,
    Event,
}

impl SpikeKind {
    /// Buffer-name suffix
    pub fn suffix(&self) -> &'static str {
        match self {
            SpikeKind::True => "",
            SpikeKind::Event => "Evnt",
        }
    }
}

/// Names visible to a neuron handler
#[derive(Debug, Clone, Copy)]
pub struct NeuronContext<'a> {
    pub population: &'a Population,
    /// Local neuron index
    pub id: &'a str,
    /// Offset of the slot written last step (delayed populations only)
    pub read_delay_offset: Option<&'a str>,
    /// Offset of the slot written this step (delayed populations only)
    pub write_delay_offset: Option<&'a str>,
}

/// Names visible to a synapse handler
#[derive(Debug, Clone, Copy)]
pub struct SynapseContext<'a> {
    pub projection: &'a Projection,
    pub source: &'a Population,
    pub target: &'a Population,
    pub pre_idx: &'a str,
    pub post_idx: &'a str,
    pub syn_address: &'a str,
    pub accumulation: Accumulation,
    pub pre_delay_offset: Option<&'a str>,
    pub post_delay_offset: Option<&'a str>,
}

/// Names visible to a custom-update handler
#[derive(Debug, Clone, Copy)]
pub struct CustomUpdateContext<'a> {
    pub custom_update: &'a CustomUpdate,
    pub id: &'a str,
    pub batch_offset: Option<&'a str>,
    pub delay_offset: Option<&'a str>,
    pub batch_delay_offset: Option<&'a str>,
}

/// Kernel backend trait (CUDA today)
pub trait KernelBackend {
    /// Backend name for logging
    fn backend_name(&self) -> &str;

    /// Prefix of device-side state arrays
    fn var_prefix(&self) -> &str;

    /// `<prefix><var><owner>`
    fn state_var(&self, var: &str, owner: &str) -> String {
        format!("{}{}{}", self.var_prefix(), var, owner)
    }

    /// Accumulation strategy for a projection in the presynaptic kernel
    fn accumulation(&self, projection: &Projection) -> Accumulation;

    /// Expansion of `$(addToInSyn, x)` for a strategy; `$(0)` is the argument
    fn add_to_in_syn(&self, accumulation: Accumulation, projection: &Projection, post_idx: &str) -> String;

    /// Kernel run ahead of the state update when the plan places the spike
    /// reset there
    fn gen_neuron_reset_kernel(&self, os: &mut CodeStream, model: &FinalizedModel) -> CodegenResult<()>;

    fn gen_neuron_update_kernel(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()>;

    fn gen_presynaptic_update_kernel(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()>;

    fn gen_postsynaptic_learning_kernel(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()>;

    fn gen_synapse_dynamics_kernel(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()>;

    fn gen_custom_update_kernel(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        group: &str,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()>;

    fn gen_emit_true_spike(&self, os: &mut CodeStream, population: &Population, neuron_id: &str);

    fn gen_emit_spike_like_event(&self, os: &mut CodeStream, population: &Population, neuron_id: &str);

    fn gen_record_spike_time(&self, os: &mut CodeStream, population: &Population, neuron_id: &str);
}
