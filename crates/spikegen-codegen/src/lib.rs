// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikegen Kernel Emitter
//!
//! Turns a [`FinalizedModel`] into device kernel source. The work is split in
//! two layers:
//!
//! - a [`KernelBackend`] lays out each kernel: launch indexing, the guarded
//!   dispatch chain over plan ranges, spike staging and the accumulation
//!   strategy of every projection;
//! - [`KernelHandlers`] write the per-element body. [`FragmentHandlers`]
//!   rewrites the model templates' code fragments.
//!
//! ```rust,ignore
//! use spikegen_codegen::emit_cuda;
//!
//! let model = builder.finalize()?;
//! let kernels = emit_cuda(&model, &config.codegen)?;
//! println!("{}", kernels);
//! ```

pub mod backend;
pub mod code_stream;
pub mod emitter;
pub mod error;
pub mod handlers;

pub use backend::{
    Accumulation, CudaBackend, CustomUpdateContext, KernelBackend, NeuronContext, SpikeKind,
    SynapseContext, NEURON_RESET_KERNEL,
};
pub use code_stream::CodeStream;
pub use emitter::{GeneratedKernels, KernelEmitter};
pub use error::{CodegenError, CodegenResult};
pub use handlers::{FragmentHandlers, KernelHandlers};

use spikegen_compiler::FinalizedModel;
use spikegen_config::CodegenConfig;

/// Emit all kernels of `model` with the CUDA backend and template fragments
pub fn emit_cuda(model: &FinalizedModel, codegen: &CodegenConfig) -> CodegenResult<GeneratedKernels> {
    let backend = CudaBackend::from_config(model.kernel_config(), codegen);
    KernelEmitter::new(backend).emit(model, &mut FragmentHandlers)
}
