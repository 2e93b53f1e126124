// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `spikegen.toml`.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpikegenConfig {
    pub system: SystemConfig,
    pub model: ModelConfig,
    pub kernels: KernelConfig,
    pub codegen: CodegenConfig,
}

/// System-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Floating-point precision of generated `scalar` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Float,
    Double,
}

impl Precision {
    /// Device type name used in generated code
    pub fn type_name(&self) -> &'static str {
        match self {
            Precision::Float => "float",
            Precision::Double => "double",
        }
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::Float
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl std::str::FromStr for Precision {
    type Err = crate::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "float" | "f32" => Ok(Precision::Float),
            "double" | "f64" => Ok(Precision::Double),
            _ => Err(crate::ConfigError::InvalidValue(format!(
                "unknown precision '{}' (expected 'float' or 'double')",
                s
            ))),
        }
    }
}

/// Model-wide simulation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    /// Integration time step (ms)
    pub dt: f64,
    pub precision: Precision,
    /// Timing request carried on the finalized model for the host runtime;
    /// kernels are emitted the same either way
    pub timing: bool,
    /// RNG seed carried on the finalized model for the host runtime
    /// (0 = runtime chooses); not read by kernel emission
    pub seed: u64,
    /// Number of independent simulation batches sharing one model
    pub batch_size: u32,
    /// Upper bound on the delay-slot ring of any population
    pub max_delay_slots: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "model".to_string(),
            dt: 0.5,
            precision: Precision::Float,
            timing: false,
            seed: 0,
            batch_size: 1,
            max_delay_slots: 65_536,
        }
    }
}

/// Execution-group (thread block) widths per kernel kind
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KernelConfig {
    pub neuron_update_block_size: usize,
    pub presynaptic_update_block_size: usize,
    pub postsynaptic_learning_block_size: usize,
    pub synapse_dynamics_block_size: usize,
    pub custom_update_block_size: usize,
    /// Device implements shared-memory atomics natively (Maxwell and newer).
    /// When false, presynaptic-span projections never accumulate in shared memory.
    pub shared_atomics_native: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            neuron_update_block_size: 32,
            presynaptic_update_block_size: 32,
            postsynaptic_learning_block_size: 32,
            synapse_dynamics_block_size: 32,
            custom_update_block_size: 32,
            shared_atomics_native: true,
        }
    }
}

impl KernelConfig {
    /// All block sizes with their config keys, for validation and logging
    pub fn block_sizes(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("neuron_update_block_size", self.neuron_update_block_size),
            ("presynaptic_update_block_size", self.presynaptic_update_block_size),
            ("postsynaptic_learning_block_size", self.postsynaptic_learning_block_size),
            ("synapse_dynamics_block_size", self.synapse_dynamics_block_size),
            ("custom_update_block_size", self.custom_update_block_size),
        ]
    }
}

/// Generated-source conventions
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Prefix of device-side state arrays
    pub var_prefix: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            var_prefix: "dd_".to_string(),
        }
    }
}
