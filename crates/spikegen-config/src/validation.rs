// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures configuration values are consistent and within the ranges the
//! compiler can lay kernels out for.

use crate::{ConfigError, ConfigResult, SpikegenConfig};

/// Width every execution group must be a multiple of (one warp)
pub const WARP_SIZE: usize = 32;

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    InvalidBlockSize { field: String, size: usize },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBlockSize { field, size } => {
                write!(
                    f,
                    "Block size {} = {} must be a non-zero multiple of {}",
                    field, size, WARP_SIZE
                )
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Block sizes (non-zero multiples of the warp width)
/// - Time step (finite, positive)
/// - Batch size and delay-slot bounds
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &SpikegenConfig) -> ConfigResult<()> {
    let errors = collect_validation_errors(config);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

/// Collect all validation errors without failing on the first
pub fn collect_validation_errors(config: &SpikegenConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_block_sizes(config, &mut errors);
    validate_model(config, &mut errors);
    errors
}

fn validate_block_sizes(config: &SpikegenConfig, errors: &mut Vec<ConfigValidationError>) {
    for (field, size) in config.kernels.block_sizes() {
        if size == 0 || size % WARP_SIZE != 0 {
            errors.push(ConfigValidationError::InvalidBlockSize {
                field: format!("kernels.{}", field),
                size,
            });
        }
    }
}

fn validate_model(config: &SpikegenConfig, errors: &mut Vec<ConfigValidationError>) {
    let model = &config.model;

    if !model.dt.is_finite() || model.dt <= 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "model.dt".to_string(),
            reason: format!("must be finite and > 0, got {}", model.dt),
        });
    }
    if model.batch_size == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "model.batch_size".to_string(),
            reason: "must be >= 1".to_string(),
        });
    }
    if model.max_delay_slots == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "model.max_delay_slots".to_string(),
            reason: "must be >= 1".to_string(),
        });
    }
    if model.name.trim().is_empty() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "model.name".to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if config.codegen.var_prefix.chars().any(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "codegen.var_prefix".to_string(),
            reason: format!("'{}' is not a valid identifier prefix", config.codegen.var_prefix),
        });
    }
}
