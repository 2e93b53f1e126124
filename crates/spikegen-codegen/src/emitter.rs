// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Kernel emission driver
//!
//! Walks the kernel plan of a finalized model and asks the backend for one
//! kernel per kernel kind that has groups, plus one kernel per custom-update
//! group. The state-update kernel is always emitted, preceded by a reset
//! kernel when no synaptic kernel hosts the spike reset.

use std::collections::BTreeMap;
use std::fmt;

use spikegen_compiler::{FinalizedModel, KernelKind};
use tracing::{debug, info};

use crate::backend::KernelBackend;
use crate::code_stream::CodeStream;
use crate::error::CodegenResult;
use crate::handlers::KernelHandlers;

/// Kernel sources of one model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedKernels {
    /// Spike reset ahead of the state update, when no synaptic kernel hosts it
    pub neuron_reset: Option<String>,
    pub neuron_update: String,
    pub presynaptic_update: Option<String>,
    pub postsynaptic_learning: Option<String>,
    pub synapse_dynamics: Option<String>,
    /// Update-group tag to kernel source
    pub custom_updates: BTreeMap<String, String>,
}

impl GeneratedKernels {
    /// Source of a per-model kernel, `None` when the model has no groups for it
    pub fn kernel(&self, kind: KernelKind) -> Option<&str> {
        match kind {
            KernelKind::NeuronUpdate => Some(&self.neuron_update),
            KernelKind::PresynapticUpdate => self.presynaptic_update.as_deref(),
            KernelKind::PostsynapticLearning => self.postsynaptic_learning.as_deref(),
            KernelKind::SynapseDynamics => self.synapse_dynamics.as_deref(),
            KernelKind::CustomUpdate => None,
        }
    }

    pub fn custom_update(&self, group: &str) -> Option<&str> {
        self.custom_updates.get(group).map(String::as_str)
    }

    /// Number of kernels emitted
    pub fn kernel_count(&self) -> usize {
        1 + [
            &self.neuron_reset,
            &self.presynaptic_update,
            &self.postsynaptic_learning,
            &self.synapse_dynamics,
        ]
        .iter()
        .filter(|k| k.is_some())
        .count()
            + self.custom_updates.len()
    }
}

/// All kernels as one translation unit in step order
impl fmt::Display for GeneratedKernels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let synaptic = [
            &self.presynaptic_update,
            &self.postsynaptic_learning,
            &self.synapse_dynamics,
        ];
        if let Some(reset) = &self.neuron_reset {
            writeln!(f, "{}", reset)?;
        }
        writeln!(f, "{}", self.neuron_update)?;
        for kernel in synaptic.into_iter().flatten() {
            writeln!(f, "{}", kernel)?;
        }
        for kernel in self.custom_updates.values() {
            writeln!(f, "{}", kernel)?;
        }
        Ok(())
    }
}

pub struct KernelEmitter<B: KernelBackend> {
    backend: B,
}

impl<B: KernelBackend> KernelEmitter<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Emit every kernel the plan calls for
    ///
    /// # Errors
    ///
    /// `CodegenError::Fragment` when a template fragment cannot be rewritten,
    /// `CodegenError::Unsupported` when the backend has no mapping for a
    /// projection's layout.
    pub fn emit(
        &self,
        model: &FinalizedModel,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<GeneratedKernels> {
        info!(
            target: "spikegen-codegen",
            "🧬 Emitting kernels for model '{}' ({} backend)",
            model.name(),
            self.backend.backend_name()
        );
        let plan = model.plan();

        let neuron_reset = if plan.reset_kernel == KernelKind::NeuronUpdate {
            let mut os = CodeStream::new();
            self.backend.gen_neuron_reset_kernel(&mut os, model)?;
            Some(os.into_string())
        } else {
            None
        };

        let mut os = CodeStream::new();
        self.backend.gen_neuron_update_kernel(&mut os, model, handlers)?;
        let neuron_update = os.into_string();

        let presynaptic_update = if plan.groups(KernelKind::PresynapticUpdate).is_empty() {
            None
        } else {
            let mut os = CodeStream::new();
            self.backend.gen_presynaptic_update_kernel(&mut os, model, handlers)?;
            Some(os.into_string())
        };

        let postsynaptic_learning = if plan.groups(KernelKind::PostsynapticLearning).is_empty() {
            None
        } else {
            let mut os = CodeStream::new();
            self.backend.gen_postsynaptic_learning_kernel(&mut os, model, handlers)?;
            Some(os.into_string())
        };

        let synapse_dynamics = if plan.groups(KernelKind::SynapseDynamics).is_empty() {
            None
        } else {
            let mut os = CodeStream::new();
            self.backend.gen_synapse_dynamics_kernel(&mut os, model, handlers)?;
            Some(os.into_string())
        };

        let mut custom_updates = BTreeMap::new();
        for group in model.custom_update_groups() {
            let mut os = CodeStream::new();
            self.backend.gen_custom_update_kernel(&mut os, model, group, handlers)?;
            debug!(target: "spikegen-codegen", "Custom update group '{}' emitted", group);
            custom_updates.insert(group.to_string(), os.into_string());
        }

        let kernels = GeneratedKernels {
            neuron_reset,
            neuron_update,
            presynaptic_update,
            postsynaptic_learning,
            synapse_dynamics,
            custom_updates,
        };
        info!(
            target: "spikegen-codegen",
            "✅ Emitted {} kernel(s) for model '{}'",
            kernels.kernel_count(),
            model.name()
        );
        Ok(kernels)
    }
}
