// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use spikegen_compiler::CompileError;
use spikegen_models::ModelError;

pub type CodegenResult<T> = Result<T, CodegenError>;

/// Errors raised while emitting kernels
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodegenError {
    #[error("Model lookup failed during emission: {0}")]
    Compile(#[from] CompileError),

    #[error("Code fragment error in '{entity}': {source}")]
    Fragment {
        entity: String,
        #[source]
        source: ModelError,
    },

    #[error("Backend '{backend}' does not support {what}")]
    Unsupported { backend: String, what: String },
}

impl CodegenError {
    pub(crate) fn fragment(entity: &str) -> impl FnOnce(ModelError) -> CodegenError + '_ {
        move |source| CodegenError::Fragment {
            entity: entity.to_string(),
            source,
        }
    }
}
