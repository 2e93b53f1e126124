// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The frozen, internally consistent model produced by finalization

use spikegen_config::{KernelConfig, ModelConfig, Precision};
use std::collections::BTreeMap;

use crate::custom_update::CustomUpdate;
use crate::error::{CompileError, CompileResult, EntityCategory};
use crate::plan::{KernelKind, KernelPlan};
use crate::population::Population;
use crate::projection::Projection;

/// Literal for `value` in the model's precision (`0.500000f` / `0.500000`)
///
/// Six decimals when they reproduce the value exactly, otherwise the
/// shortest exponent form that does (`1e-7f`). Values are finite: builder
/// and finalization reject anything else.
pub fn scalar_expr(precision: Precision, value: f64) -> String {
    let fixed = format!("{:.6}", value);
    let literal = if fixed.parse::<f64>() == Ok(value) {
        fixed
    } else {
        format!("{:e}", value)
    };
    match precision {
        Precision::Float => format!("{}f", literal),
        Precision::Double => literal,
    }
}

/// Read-only view of a finalized model
///
/// Entities are iterated in name order, which is also plan order.
#[derive(Debug, Clone)]
pub struct FinalizedModel {
    pub(crate) settings: ModelConfig,
    pub(crate) kernels: KernelConfig,
    pub(crate) populations: BTreeMap<String, Population>,
    pub(crate) projections: BTreeMap<String, Projection>,
    pub(crate) custom_updates: BTreeMap<String, CustomUpdate>,
    pub(crate) plan: KernelPlan,
}

impl FinalizedModel {
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &ModelConfig {
        &self.settings
    }

    pub fn kernel_config(&self) -> &KernelConfig {
        &self.kernels
    }

    pub fn dt(&self) -> f64 {
        self.settings.dt
    }

    pub fn precision(&self) -> Precision {
        self.settings.precision
    }

    pub fn batch_size(&self) -> u32 {
        self.settings.batch_size
    }

    pub fn plan(&self) -> &KernelPlan {
        &self.plan
    }

    pub fn population(&self, name: &str) -> CompileResult<&Population> {
        self.populations
            .get(name)
            .ok_or_else(|| CompileError::UnknownEntity {
                category: EntityCategory::Population,
                name: name.to_string(),
            })
    }

    pub fn projection(&self, name: &str) -> CompileResult<&Projection> {
        self.projections
            .get(name)
            .ok_or_else(|| CompileError::UnknownEntity {
                category: EntityCategory::Projection,
                name: name.to_string(),
            })
    }

    pub fn custom_update(&self, name: &str) -> CompileResult<&CustomUpdate> {
        self.custom_updates
            .get(name)
            .ok_or_else(|| CompileError::UnknownEntity {
                category: EntityCategory::CustomUpdate,
                name: name.to_string(),
            })
    }

    pub fn populations(&self) -> impl Iterator<Item = &Population> {
        self.populations.values()
    }

    pub fn projections(&self) -> impl Iterator<Item = &Projection> {
        self.projections.values()
    }

    pub fn custom_updates(&self) -> impl Iterator<Item = &CustomUpdate> {
        self.custom_updates.values()
    }

    /// Update-group tags in name order
    pub fn custom_update_groups(&self) -> impl Iterator<Item = &str> {
        self.plan.custom_updates.keys().map(String::as_str)
    }

    pub fn has_projections(&self) -> bool {
        !self.projections.is_empty()
    }

    /// Any spike buffer or variable placed in host-mapped memory
    pub fn zero_copy_in_use(&self) -> bool {
        self.populations.values().any(Population::is_zero_copy_enabled)
            || self.projections.values().any(Projection::is_zero_copy_enabled)
    }

    pub fn is_synapse_group_dynamics_required(&self, name: &str) -> bool {
        self.projections
            .get(name)
            .map(|p| p.range(KernelKind::SynapseDynamics).is_some())
            .unwrap_or(false)
    }

    pub fn is_synapse_group_post_learning_required(&self, name: &str) -> bool {
        self.projections
            .get(name)
            .map(|p| p.range(KernelKind::PostsynapticLearning).is_some())
            .unwrap_or(false)
    }

    /// Literal for `value` in this model's precision
    pub fn scalar_expr(&self, value: f64) -> String {
        scalar_expr(self.settings.precision, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_expr() {
        assert_eq!(scalar_expr(Precision::Float, 0.5), "0.500000f");
        assert_eq!(scalar_expr(Precision::Double, 0.5), "0.500000");
        assert_eq!(scalar_expr(Precision::Float, -65.0), "-65.000000f");
    }

    #[test]
    fn test_scalar_expr_keeps_small_values() {
        assert_eq!(scalar_expr(Precision::Float, 1e-7), "1e-7f");
        assert_eq!(scalar_expr(Precision::Double, 1e-9), "1e-9");
        assert_eq!(scalar_expr(Precision::Double, -2.5e-12), "-2.5e-12");

        let min = f32::MIN_POSITIVE as f64;
        let literal = scalar_expr(Precision::Float, min);
        let digits = literal.strip_suffix('f').unwrap();
        assert_eq!(digits.parse::<f64>().unwrap(), min);
        assert_eq!(digits.parse::<f32>().unwrap(), f32::MIN_POSITIVE);
    }

    #[test]
    fn test_scalar_expr_round_trips() {
        for value in [0.1, 1.0 / 3.0, 0.1 + 0.2, 123456.789, -1e-300, 6.02e23] {
            let literal = scalar_expr(Precision::Double, value);
            assert_eq!(literal.parse::<f64>().unwrap(), value, "{}", literal);
        }
    }
}
