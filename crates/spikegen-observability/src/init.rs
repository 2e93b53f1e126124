// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Console logging initialization

use anyhow::{Context, Result};
use spikegen_config::SpikegenConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::CrateDebugFlags;

/// Install a console subscriber
///
/// The base level comes from `system.log_level`; crates named in
/// `debug_flags` are raised to `debug`. `RUST_LOG`, when set, replaces
/// the computed filter entirely.
///
/// # Errors
///
/// Fails if the filter directives do not parse or a global subscriber is
/// already installed.
pub fn init_logging(config: &SpikegenConfig, debug_flags: &CrateDebugFlags) -> Result<()> {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::try_new(&directives)
            .with_context(|| format!("Invalid RUST_LOG directives: {}", directives))?,
        Err(_) => {
            let filter = debug_flags.to_filter_string(&config.system.log_level);
            EnvFilter::try_new(&filter)
                .with_context(|| format!("Invalid log filter: {}", filter))?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::debug!(
        target: "spikegen-observability",
        "Logging initialized (debug crates: {:?})",
        debug_flags.enabled_crates.keys().collect::<Vec<_>>()
    );

    Ok(())
}

/// Initialize logging from the process arguments and `SPIKEGEN_DEBUG`
pub fn init_logging_default(config: &SpikegenConfig) -> Result<()> {
    init_logging(config, &crate::cli::parse_debug_flags())
}
