// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, Precision, SpikegenConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "spikegen.toml";

/// Find the spikegen configuration file
///
/// Search order:
/// 1. `SPIKEGEN_CONFIG_PATH` environment variable
/// 2. Current working directory: `./spikegen.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("SPIKEGEN_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        } else {
            return Err(ConfigError::FileNotFound(format!(
                "Config file specified by SPIKEGEN_CONFIG_PATH not found: {}",
                path.display()
            )));
        }
    }

    let mut search_paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "spikegen configuration file '{}' not found in any of these locations:\n{}\n\nSet SPIKEGEN_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<SpikegenConfig> {
    let config_file = if let Some(path) = config_path {
        path.to_path_buf()
    } else {
        find_config_file()?
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: SpikegenConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    crate::validate_config(&config)?;

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `SPIKEGEN_DT` -> `model.dt`
/// - `SPIKEGEN_BATCH_SIZE` -> `model.batch_size`
/// - `SPIKEGEN_PRECISION` -> `model.precision`
/// - `SPIKEGEN_SEED` -> `model.seed`
/// - `SPIKEGEN_LOG_LEVEL` -> `system.log_level`
/// - `SPIKEGEN_NEURON_BLOCK_SIZE` -> `kernels.neuron_update_block_size`
/// - `SPIKEGEN_PRESYNAPTIC_BLOCK_SIZE` -> `kernels.presynaptic_update_block_size`
pub fn apply_environment_overrides(config: &mut SpikegenConfig) {
    if let Ok(value) = env::var("SPIKEGEN_DT") {
        if let Ok(dt) = value.parse::<f64>() {
            config.model.dt = dt;
        }
    }
    if let Ok(value) = env::var("SPIKEGEN_BATCH_SIZE") {
        if let Ok(batch_size) = value.parse::<u32>() {
            config.model.batch_size = batch_size;
        }
    }
    if let Ok(value) = env::var("SPIKEGEN_PRECISION") {
        if let Ok(precision) = value.parse::<Precision>() {
            config.model.precision = precision;
        }
    }
    if let Ok(value) = env::var("SPIKEGEN_SEED") {
        if let Ok(seed) = value.parse::<u64>() {
            config.model.seed = seed;
        }
    }
    if let Ok(value) = env::var("SPIKEGEN_LOG_LEVEL") {
        config.system.log_level = value;
    }

    if let Ok(value) = env::var("SPIKEGEN_NEURON_BLOCK_SIZE") {
        if let Ok(size) = value.parse::<usize>() {
            config.kernels.neuron_update_block_size = size;
        }
    }
    if let Ok(value) = env::var("SPIKEGEN_PRESYNAPTIC_BLOCK_SIZE") {
        if let Ok(size) = value.parse::<usize>() {
            config.kernels.presynaptic_update_block_size = size;
        }
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"dt": "0.1", "batch_size": "4"}`)
pub fn apply_cli_overrides(config: &mut SpikegenConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("name") {
        config.model.name = value.clone();
    }
    if let Some(value) = cli_args.get("dt") {
        if let Ok(dt) = value.parse::<f64>() {
            config.model.dt = dt;
        }
    }
    if let Some(value) = cli_args.get("batch_size") {
        if let Ok(batch_size) = value.parse::<u32>() {
            config.model.batch_size = batch_size;
        }
    }
    if let Some(value) = cli_args.get("precision") {
        if let Ok(precision) = value.parse::<Precision>() {
            config.model.precision = precision;
        }
    }
    if let Some(value) = cli_args.get("timing") {
        config.model.timing = value.to_lowercase() == "true" || value == "1";
    }
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }

    if let Some(value) = cli_args.get("neuron_block_size") {
        if let Ok(size) = value.parse::<usize>() {
            config.kernels.neuron_update_block_size = size;
        }
    }
    if let Some(value) = cli_args.get("presynaptic_block_size") {
        if let Ok(size) = value.parse::<usize>() {
            config.kernels.presynaptic_update_block_size = size;
        }
    }
    if let Some(value) = cli_args.get("var_prefix") {
        config.codegen.var_prefix = value.clone();
    }
}
