// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikegen-observability
//!
//! Logging bootstrap for spikegen front ends with per-crate debug flag support.
//!
//! Library crates only emit `tracing` events under their crate-name target
//! (`spikegen-compiler`, `spikegen-codegen`, ...). Binaries and tests call
//! [`init_logging`] once to install a subscriber.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known spikegen crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "spikegen-config",
    "spikegen-models",
    "spikegen-compiler",
    "spikegen-codegen",
];
