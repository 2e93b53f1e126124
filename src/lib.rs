// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikegen - Model-to-Kernel Compiler for Spiking Neural Networks
//!
//! spikegen takes a network description (populations of neurons, projections
//! between them and custom updates over their state), validates and resolves
//! it once, and emits massively parallel simulation kernels that execute the
//! resulting plan every time step.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! spikegen = "0.1"  # Default: finalization + CUDA kernel emission
//! ```
//!
//! ## Feature Flags
//!
//! - **`codegen`** (default): kernel emission ([`codegen`])
//! - **`observability`**: logging bootstrap for front ends ([`observability`])
//!
//! Without `codegen` only the finalization pass is built, which is enough
//! for tools that inspect the [`KernelPlan`](compiler::KernelPlan) as JSON.
//!
//! ## Pipeline
//!
//! 1. Register templates in a [`TemplateRegistry`](models::TemplateRegistry)
//! 2. Build the graph with a [`ModelBuilder`](compiler::ModelBuilder)
//! 3. `finalize()` once into a [`FinalizedModel`](compiler::FinalizedModel)
//! 4. Emit kernels from the finalized model
//!
//! ```rust
//! use spikegen::prelude::*;
//!
//! let mut registry = TemplateRegistry::new();
//! registry.register_neuron_model(
//!     "Counter",
//!     NeuronModel {
//!         vars: vec![Var::new("count", "unsigned int", VarAccess::ReadWrite)],
//!         sim_code: "$(count)++;".into(),
//!         ..Default::default()
//!     },
//! )?;
//!
//! let mut builder = ModelBuilder::new(registry);
//! builder.add_population("Counters", 40, "Counter", &[], &[0.0])?;
//! let model = builder.finalize()?;
//! assert_eq!(model.plan().total_size(KernelKind::NeuronUpdate), 64);
//!
//! # #[cfg(feature = "codegen")]
//! # {
//! let kernels = emit_cuda(&model, &SpikegenConfig::default().codegen)?;
//! assert!(kernels.neuron_update.contains("unsigned int lcount = dd_countCounters[lid];"));
//! # }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use spikegen_compiler as compiler;
pub use spikegen_config as config;
pub use spikegen_models as models;

#[cfg(feature = "codegen")]
pub use spikegen_codegen as codegen;

#[cfg(feature = "observability")]
pub use spikegen_observability as observability;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::compiler::{
        CompileError, CompileResult, Conductance, Connectivity, FinalizedModel, KernelKind,
        KernelPlan, ModelBuilder, ModelGraph, ModelInstance, ProjectionSpec, SpanType,
        VarReference,
    };
    pub use crate::config::{load_config, Precision, SpikegenConfig};
    pub use crate::models::{
        CustomUpdateModel, NeuronModel, PostsynapticModel, TemplateRegistry, Var, VarAccess,
        VarRefDecl, WeightUpdateModel,
    };

    #[cfg(feature = "codegen")]
    pub use crate::codegen::{emit_cuda, CudaBackend, FragmentHandlers, GeneratedKernels, KernelEmitter};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let config = SpikegenConfig::default();
        assert_eq!(config.model.precision, Precision::Float);
        assert_eq!(KernelKind::NeuronUpdate.kernel_name(), "updateNeuronsKernel");
    }
}
