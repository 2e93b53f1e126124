// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Model Templates
//!
//! Four template kinds, one per role an entity can play:
//!
//! | Template | Used by | Fragments |
//! |---|---|---|
//! | [`NeuronModel`] | populations | sim, threshold, reset |
//! | [`WeightUpdateModel`] | projections | sim, event, event threshold, learn post, dynamics |
//! | [`PostsynapticModel`] | projections | apply input, decay |
//! | [`CustomUpdateModel`] | custom updates | update |
//!
//! Fragment text uses `$(name)` tokens for parameters and variables and
//! `$(name_pre)` / `$(name_post)` for the source / target population's
//! variables as seen across the projection's delay.

use crate::types::{DerivedParam, ExtraGlobalParam, Var, VarRefDecl};

/// Arity information every template exposes
pub trait TemplateShape {
    fn params(&self) -> &[String];
    fn vars(&self) -> &[Var];
    fn derived_params(&self) -> &[DerivedParam];

    fn extra_global_params(&self) -> &[ExtraGlobalParam] {
        &[]
    }

    fn var(&self, name: &str) -> Option<&Var> {
        self.vars().iter().find(|v| v.name == name)
    }

    fn param_names(&self) -> Vec<&str> {
        self.params().iter().map(String::as_str).collect()
    }

    fn derived_param_names(&self) -> Vec<&str> {
        self.derived_params().iter().map(|d| d.name.as_str()).collect()
    }

    /// Evaluate every derived parameter in declaration order
    fn evaluate_derived_params(&self, params: &[f64], dt: f64) -> Vec<f64> {
        self.derived_params()
            .iter()
            .map(|d| d.evaluate(params, dt))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NeuronModel {
    pub params: Vec<String>,
    pub vars: Vec<Var>,
    pub derived_params: Vec<DerivedParam>,
    pub extra_global_params: Vec<ExtraGlobalParam>,
    pub sim_code: String,
    pub threshold_condition_code: String,
    pub reset_code: String,
}

#[derive(Debug, Clone, Default)]
pub struct WeightUpdateModel {
    pub params: Vec<String>,
    pub vars: Vec<Var>,
    pub derived_params: Vec<DerivedParam>,
    pub extra_global_params: Vec<ExtraGlobalParam>,
    /// Run for each true spike of the source population
    pub sim_code: String,
    /// Run for each spike-like event of the source population
    pub event_code: String,
    /// Predicate on source state deciding whether a spike-like event fires
    pub event_threshold_condition_code: String,
    /// Run for each spike of the target population
    pub learn_post_code: String,
    /// Run every step for every synapse
    pub synapse_dynamics_code: String,
    /// Helper code shared by the fragments above, emitted in its own namespace
    pub sim_support_code: String,
    pub needs_pre_spike_time: bool,
    pub needs_post_spike_time: bool,
}

impl WeightUpdateModel {
    /// Fragments that may read source or target state through the delay
    pub fn consumer_code(&self) -> [&str; 5] {
        [
            &self.sim_code,
            &self.event_code,
            &self.event_threshold_condition_code,
            &self.learn_post_code,
            &self.synapse_dynamics_code,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostsynapticModel {
    pub params: Vec<String>,
    pub vars: Vec<Var>,
    pub derived_params: Vec<DerivedParam>,
    /// Moves accumulated input into the target's `Isyn`
    pub apply_input_code: String,
    pub decay_code: String,
}

#[derive(Debug, Clone, Default)]
pub struct CustomUpdateModel {
    pub params: Vec<String>,
    pub vars: Vec<Var>,
    pub var_refs: Vec<VarRefDecl>,
    pub derived_params: Vec<DerivedParam>,
    pub update_code: String,
}

macro_rules! impl_template_shape {
    ($ty:ty, egps) => {
        impl TemplateShape for $ty {
            fn params(&self) -> &[String] {
                &self.params
            }
            fn vars(&self) -> &[Var] {
                &self.vars
            }
            fn derived_params(&self) -> &[DerivedParam] {
                &self.derived_params
            }
            fn extra_global_params(&self) -> &[ExtraGlobalParam] {
                &self.extra_global_params
            }
        }
    };
    ($ty:ty) => {
        impl TemplateShape for $ty {
            fn params(&self) -> &[String] {
                &self.params
            }
            fn vars(&self) -> &[Var] {
                &self.vars
            }
            fn derived_params(&self) -> &[DerivedParam] {
                &self.derived_params
            }
        }
    };
}

impl_template_shape!(NeuronModel, egps);
impl_template_shape!(WeightUpdateModel, egps);
impl_template_shape!(PostsynapticModel);
impl_template_shape!(CustomUpdateModel);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VarAccess;

    #[test]
    fn test_shape_lookup() {
        let model = NeuronModel {
            params: vec!["a".into(), "b".into()],
            vars: vec![
                Var::new("V", "scalar", VarAccess::ReadWrite),
                Var::new("U", "scalar", VarAccess::ReadWrite),
            ],
            derived_params: vec![DerivedParam::new("ab", |p, _| p[0] * p[1])],
            ..Default::default()
        };

        assert_eq!(model.param_names(), vec!["a", "b"]);
        assert_eq!(model.var("U").map(|v| v.ty.as_str()), Some("scalar"));
        assert!(model.var("W").is_none());
        assert_eq!(model.evaluate_derived_params(&[2.0, 3.0], 0.1), vec![6.0]);
        assert!(model.extra_global_params().is_empty());
    }

    #[test]
    fn test_consumer_code_order() {
        let wu = WeightUpdateModel {
            sim_code: "sim".into(),
            learn_post_code: "learn".into(),
            ..Default::default()
        };
        assert_eq!(wu.consumer_code(), ["sim", "", "", "learn", ""]);
    }
}
