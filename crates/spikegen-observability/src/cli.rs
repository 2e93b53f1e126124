// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-spikegen-compiler`, `--debug-spikegen-codegen`, etc.

use std::collections::HashMap;
use std::env;

use crate::KNOWN_CRATES;

/// Per-crate debug switches
///
/// # Example
/// ```rust
/// use spikegen_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-spikegen-compiler".to_string()]);
/// assert!(flags.is_enabled("spikegen-compiler"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: HashMap<String, bool>,
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching `--debug-{crate-name}`.
    /// `--debug-all` enables every known crate.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();

        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
                continue;
            }

            if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enabled_crates.insert(crate_name.to_string(), true);
            }
        }

        flags
    }

    /// Parse a `SPIKEGEN_DEBUG`-style value: `all` or comma-separated crate names
    pub fn from_env_value(value: &str) -> Self {
        let mut flags = CrateDebugFlags::default();
        flags.merge_env_value(value);
        flags
    }

    fn merge_env_value(&mut self, value: &str) {
        if value.trim() == "all" {
            self.enable_all();
            return;
        }
        for crate_name in value.split(',') {
            let crate_name = crate_name.trim();
            if !crate_name.is_empty() {
                self.enabled_crates.insert(crate_name.to_string(), true);
            }
        }
    }

    fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enabled_crates.insert(crate_name.to_string(), true);
        }
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains_key(crate_name)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// `DEBUG` for enabled crates, `INFO` otherwise
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Build an `EnvFilter` directive string
    ///
    /// Enabled crates get `{crate}=debug`; everything else falls back to
    /// `default_level`. Crate order is sorted so the string is stable.
    pub fn to_filter_string(&self, default_level: &str) -> String {
        let mut crates: Vec<&String> = self.enabled_crates.keys().collect();
        crates.sort();

        let mut filters: Vec<String> = crates
            .into_iter()
            .map(|crate_name| format!("{}=debug", crate_name))
            .collect();
        filters.push(default_level.to_string());
        filters.join(",")
    }
}

/// Debug flags from the process arguments plus the `SPIKEGEN_DEBUG` variable
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());

    if let Ok(env_var) = env::var("SPIKEGEN_DEBUG") {
        flags.merge_env_value(&env_var);
    }

    flags
}

/// Generate help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  SPIKEGEN_DEBUG={{crate-name}}[,{{crate-name}}]  Enable debug for crates (comma-separated)
  SPIKEGEN_DEBUG=all                               Enable debug for all crates
"#,
        KNOWN_CRATES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-spikegen-compiler".to_string()]);
        assert!(flags.is_enabled("spikegen-compiler"));
        assert!(!flags.is_enabled("spikegen-codegen"));
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_env_value_parsing() {
        let flags = CrateDebugFlags::from_env_value(" spikegen-codegen , ,spikegen-models");
        assert!(flags.is_enabled("spikegen-codegen"));
        assert!(flags.is_enabled("spikegen-models"));
        assert_eq!(flags.enabled_crates.len(), 2);

        let all = CrateDebugFlags::from_env_value("all");
        assert_eq!(all.enabled_crates.len(), KNOWN_CRATES.len());
    }

    #[test]
    fn test_filter_string() {
        let flags = CrateDebugFlags::from_args(vec![
            "--debug-spikegen-compiler".to_string(),
            "--debug-spikegen-codegen".to_string(),
        ]);
        assert_eq!(
            flags.to_filter_string("warn"),
            "spikegen-codegen=debug,spikegen-compiler=debug,warn"
        );
        assert_eq!(CrateDebugFlags::default().to_filter_string("info"), "info");
    }

    #[test]
    fn test_log_level() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-spikegen-compiler".to_string()]);
        assert_eq!(flags.log_level("spikegen-compiler"), tracing::Level::DEBUG);
        assert_eq!(flags.log_level("spikegen-codegen"), tracing::Level::INFO);
    }
}
