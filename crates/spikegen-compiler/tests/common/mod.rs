// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared template catalog for compiler integration tests

#![allow(dead_code)]

use spikegen_compiler::{Conductance, Connectivity, ModelBuilder, ModelInstance, ProjectionSpec};
use spikegen_config::SpikegenConfig;
use spikegen_models::{
    CustomUpdateModel, DerivedParam, ExtraGlobalParam, NeuronModel, PostsynapticModel,
    TemplateRegistry, Var, VarAccess, VarRefDecl, WeightUpdateModel,
};

pub const IZK_PARAMS: [f64; 4] = [0.02, 0.2, -65.0, 8.0];
pub const IZK_VARS: [f64; 2] = [0.0, 0.0];

pub fn izhikevich() -> NeuronModel {
    NeuronModel {
        params: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        vars: vec![
            Var::new("V", "scalar", VarAccess::ReadWrite),
            Var::new("U", "scalar", VarAccess::ReadWrite),
        ],
        sim_code: "$(V) += 0.5 * (0.04 * $(V) * $(V) + 5.0 * $(V) + 140.0 - $(U) + $(Isyn)) * DT;\n\
                   $(U) += $(a) * ($(b) * $(V) - $(U)) * DT;"
            .into(),
        threshold_condition_code: "$(V) >= 29.99".into(),
        reset_code: "$(V) = $(c);\n$(U) += $(d);".into(),
        ..Default::default()
    }
}

/// Izhikevich with its parameters held as per-neuron read-only variables
pub fn izhikevich_variable() -> NeuronModel {
    NeuronModel {
        params: vec![],
        vars: vec![
            Var::new("V", "scalar", VarAccess::ReadWrite),
            Var::new("U", "scalar", VarAccess::ReadWrite),
            Var::new("a", "scalar", VarAccess::ReadOnly),
            Var::new("b", "scalar", VarAccess::ReadOnly),
            Var::new("c", "scalar", VarAccess::ReadOnly),
            Var::new("d", "scalar", VarAccess::ReadOnly),
        ],
        ..izhikevich()
    }
}

pub fn registry() -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    registry.register_neuron_model("Izhikevich", izhikevich()).unwrap();
    registry
        .register_neuron_model("IzhikevichVariable", izhikevich_variable())
        .unwrap();

    registry
        .register_weight_update_model(
            "StaticPulse",
            WeightUpdateModel {
                vars: vec![Var::new("g", "scalar", VarAccess::ReadOnly)],
                sim_code: "$(addToInSyn, $(g));\n".into(),
                ..Default::default()
            },
        )
        .unwrap();
    registry
        .register_weight_update_model(
            "StaticPulseDendriticDelay",
            WeightUpdateModel {
                vars: vec![
                    Var::new("g", "scalar", VarAccess::ReadOnly),
                    Var::new("d", "uint8_t", VarAccess::ReadOnly),
                ],
                sim_code: "$(addToInSynDelay, $(g), $(d));\n".into(),
                ..Default::default()
            },
        )
        .unwrap();
    // Continuous coupling through the presynaptic membrane potential
    registry
        .register_weight_update_model(
            "Cont",
            WeightUpdateModel {
                vars: vec![Var::new("g", "scalar", VarAccess::ReadWrite)],
                synapse_dynamics_code: "$(addToInSyn, $(g) * $(V_pre));\n".into(),
                ..Default::default()
            },
        )
        .unwrap();
    registry
        .register_weight_update_model(
            "Graded",
            WeightUpdateModel {
                params: vec!["Epre".into(), "Vslope".into()],
                vars: vec![Var::new("g", "scalar", VarAccess::ReadWrite)],
                derived_params: vec![DerivedParam::new("VslopeInv", |p: &[f64], _dt: f64| {
                    1.0 / p[1]
                })],
                extra_global_params: vec![ExtraGlobalParam::new("gain", "scalar")],
                event_code: "$(addToInSyn, $(g) * tanh(($(V_pre) - $(Epre)) * $(VslopeInv)));\n"
                    .into(),
                event_threshold_condition_code: "$(V_pre) > $(Epre) * $(gain)".into(),
                sim_support_code: "SUPPORT_CODE_FUNC scalar clip(scalar x) { return fmax(x, 0.0); }"
                    .into(),
                ..Default::default()
            },
        )
        .unwrap();
    registry
        .register_weight_update_model(
            "STDP",
            WeightUpdateModel {
                params: vec!["tauPlus".into()],
                vars: vec![Var::new("g", "scalar", VarAccess::ReadWrite)],
                sim_code: "$(addToInSyn, $(g));\n".into(),
                learn_post_code: "$(g) += exp(-($(t) - $(sT_pre)) / $(tauPlus));\n".into(),
                needs_pre_spike_time: true,
                ..Default::default()
            },
        )
        .unwrap();

    registry
        .register_postsynaptic_model(
            "DeltaCurr",
            PostsynapticModel {
                apply_input_code: "$(Isyn) += $(inSyn); $(inSyn) = 0;".into(),
                ..Default::default()
            },
        )
        .unwrap();

    registry
        .register_custom_update_model(
            "Sum",
            CustomUpdateModel {
                vars: vec![Var::new("sum", "scalar", VarAccess::ReadWrite)],
                var_refs: vec![
                    VarRefDecl::new("a", "scalar", VarAccess::ReadOnly),
                    VarRefDecl::new("b", "scalar", VarAccess::ReadOnly),
                ],
                update_code: "$(sum) = $(a) + $(b);\n".into(),
                ..Default::default()
            },
        )
        .unwrap();
    registry
        .register_custom_update_model(
            "Sum2",
            CustomUpdateModel {
                vars: vec![Var::new("mult", "scalar", VarAccess::ReadOnly)],
                var_refs: vec![
                    VarRefDecl::new("a", "scalar", VarAccess::ReadWrite),
                    VarRefDecl::new("b", "scalar", VarAccess::ReadWrite),
                ],
                update_code: "$(a) = $(mult) * ($(a) + $(b));\n".into(),
                ..Default::default()
            },
        )
        .unwrap();
    registry
}

pub fn builder() -> ModelBuilder {
    ModelBuilder::new(registry())
}

pub fn builder_with(config: &SpikegenConfig) -> ModelBuilder {
    ModelBuilder::with_config(config, registry())
}

pub fn add_izhikevich(builder: &mut ModelBuilder, name: &str, size: usize) {
    builder
        .add_population(name, size, "Izhikevich", &IZK_PARAMS, &IZK_VARS)
        .expect("Failed to add population");
}

pub fn projection(
    name: &str,
    connectivity: Connectivity,
    conductance: Conductance,
    source: &str,
    target: &str,
    weight_update: &str,
    wu_params: Vec<f64>,
    wu_vars: Vec<f64>,
) -> ProjectionSpec {
    ProjectionSpec::new(
        name,
        connectivity,
        conductance,
        source,
        target,
        ModelInstance::new(weight_update, wu_params, wu_vars),
        ModelInstance::new("DeltaCurr", vec![], vec![]),
    )
}

pub fn static_pulse(
    name: &str,
    connectivity: Connectivity,
    conductance: Conductance,
    source: &str,
    target: &str,
) -> ProjectionSpec {
    projection(name, connectivity, conductance, source, target, "StaticPulse", vec![], vec![0.1])
}

pub fn cont(name: &str, source: &str, target: &str, delay_steps: u32) -> ProjectionSpec {
    projection(
        name,
        Connectivity::Dense,
        Conductance::IndividualG,
        source,
        target,
        "Cont",
        vec![],
        vec![0.1],
    )
    .with_delay(delay_steps)
}
