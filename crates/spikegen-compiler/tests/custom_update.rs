// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Custom-update validation, sizing, batching and delay consistency

mod common;

use common::*;
use spikegen_compiler::{CompileError, Conductance, Connectivity, EntityCategory, KernelKind, VarReference};
use spikegen_config::SpikegenConfig;

#[test]
fn test_var_reference_type_checks() {
    let mut builder = builder();
    add_izhikevich(&mut builder, "Pre", 10);
    add_izhikevich(&mut builder, "Post", 25);
    builder
        .add_projection(projection(
            "Synapses1",
            Connectivity::Dense,
            Conductance::IndividualG,
            "Pre",
            "Post",
            "StaticPulseDendriticDelay",
            vec![],
            vec![1.0, 4.0],
        ))
        .unwrap();

    builder
        .add_custom_update(
            "SumWeight1",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![
                VarReference::weight_update("Synapses1", "g"),
                VarReference::weight_update("Synapses1", "g"),
            ],
        )
        .expect("Matching reference types should be accepted");

    // 'd' is a uint8_t, the template slot is scalar
    let err = builder
        .add_custom_update(
            "SumWeight2",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![
                VarReference::weight_update("Synapses1", "g"),
                VarReference::weight_update("Synapses1", "d"),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, CompileError::InconsistentVariableReference { .. }));
    assert!(builder.custom_update("SumWeight2").is_none());

    let model = builder.finalize().unwrap();
    // Weight-update references span the whole 10 x 25 matrix
    assert_eq!(model.custom_update("SumWeight1").unwrap().size, 250);
}

#[test]
fn test_var_size_checks() {
    let mut builder = builder();
    add_izhikevich(&mut builder, "Neuron1", 10);
    add_izhikevich(&mut builder, "Neuron2", 10);
    add_izhikevich(&mut builder, "Neuron3", 25);

    builder
        .add_custom_update(
            "Sum1",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![VarReference::population("Neuron1", "V"), VarReference::population("Neuron1", "U")],
        )
        .unwrap();
    builder
        .add_custom_update(
            "Sum2",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![VarReference::population("Neuron1", "V"), VarReference::population("Neuron2", "V")],
        )
        .unwrap();
    let model = builder.clone().finalize().unwrap();
    assert_eq!(model.custom_update("Sum2").unwrap().size, 10);

    builder
        .add_custom_update(
            "Sum3",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![VarReference::population("Neuron1", "V"), VarReference::population("Neuron3", "V")],
        )
        .unwrap();
    let (err, _) = builder.finalize().unwrap_err().into_parts();
    match err {
        CompileError::InconsistentVariableReference { custom_update, reason } => {
            assert_eq!(custom_update, "Sum3");
            assert!(reason.contains("same size"));
        }
        other => panic!("Unexpected error: {}", other),
    }
}

#[test]
fn test_var_delay_checks() {
    let mut builder = builder();
    add_izhikevich(&mut builder, "Pre1", 10);
    add_izhikevich(&mut builder, "Post", 10);
    builder.add_projection(cont("Syn1", "Pre1", "Post", 10)).unwrap();
    builder
        .add_custom_update(
            "Sum1",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![VarReference::population("Pre1", "V"), VarReference::population("Post", "V")],
        )
        .unwrap();

    // One delayed and one undelayed reference is fine
    let model = builder.finalize().unwrap();
    let sum = model.custom_update("Sum1").unwrap();
    assert_eq!(sum.delay_population.as_deref(), Some("Pre1"));
}

#[test]
fn test_var_mixed_delay_checks() {
    let mut builder = builder();
    add_izhikevich(&mut builder, "Pre1", 10);
    add_izhikevich(&mut builder, "Pre2", 10);
    add_izhikevich(&mut builder, "Post", 10);
    builder.add_projection(cont("Syn1", "Pre1", "Post", 10)).unwrap();
    builder.add_projection(cont("Syn2", "Pre2", "Post", 5)).unwrap();
    builder
        .add_custom_update(
            "Sum1",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![VarReference::population("Pre1", "V"), VarReference::population("Pre2", "V")],
        )
        .unwrap();

    let err: CompileError = builder.finalize().unwrap_err().into();
    match err {
        CompileError::InconsistentVariableReference { reason, .. } => {
            assert!(reason.contains("11 slots"));
            assert!(reason.contains("6"));
        }
        other => panic!("Unexpected error: {}", other),
    }
}

#[test]
fn test_mismatched_delays_reported_before_sizes() {
    let mut builder = builder();
    add_izhikevich(&mut builder, "Pre", 10);
    add_izhikevich(&mut builder, "Post", 25);
    add_izhikevich(&mut builder, "Sink", 10);
    builder.add_projection(cont("Syn1", "Pre", "Sink", 10)).unwrap();
    builder.add_projection(cont("Syn2", "Post", "Sink", 5)).unwrap();
    builder
        .add_custom_update(
            "Sum1",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![VarReference::population("Pre", "V"), VarReference::population("Post", "V")],
        )
        .unwrap();

    let err: CompileError = builder.finalize().unwrap_err().into();
    match err {
        CompileError::InconsistentVariableReference { reason, .. } => {
            assert!(reason.contains("different delays"));
        }
        other => panic!("Unexpected error: {}", other),
    }
}

#[test]
fn test_wu_var_synapse_group_checks() {
    let mut builder = builder();
    add_izhikevich(&mut builder, "Pre", 10);
    add_izhikevich(&mut builder, "Post", 25);
    for name in ["Synapses1", "Synapses2"] {
        builder
            .add_projection(projection(
                name,
                Connectivity::Dense,
                Conductance::IndividualG,
                "Pre",
                "Post",
                "StaticPulseDendriticDelay",
                vec![],
                vec![1.0, 4.0],
            ))
            .unwrap();
    }

    builder
        .add_custom_update(
            "SumWeight1",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![
                VarReference::weight_update("Synapses1", "g"),
                VarReference::weight_update("Synapses1", "g"),
            ],
        )
        .unwrap();
    let err = builder
        .add_custom_update(
            "SumWeight2",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![
                VarReference::weight_update("Synapses1", "g"),
                VarReference::weight_update("Synapses2", "g"),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, CompileError::InconsistentVariableReference { .. }));

    let err = builder
        .add_custom_update(
            "Mixed",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![
                VarReference::population("Pre", "V"),
                VarReference::weight_update("Synapses1", "g"),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, CompileError::InconsistentVariableReference { .. }));

    builder.finalize().expect("Finalize failed");
}

#[test]
fn test_reference_and_arity_errors() {
    let mut builder = builder();
    add_izhikevich(&mut builder, "Pop", 10);

    let err = builder
        .add_custom_update(
            "Short",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![VarReference::population("Pop", "V")],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::ArityMismatch { what: "variable references", expected: 2, actual: 1, .. }
    ));

    let err = builder
        .add_custom_update(
            "Missing",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![VarReference::population("Pop", "V"), VarReference::population("Pop", "W")],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnknownEntity { category: EntityCategory::Variable, .. }
    ));

    let err = builder
        .add_custom_update(
            "Nowhere",
            "CustomUpdate",
            "Sum",
            &[],
            &[0.0],
            vec![VarReference::population("Pop", "V"), VarReference::population("Ghost", "V")],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnknownEntity { category: EntityCategory::Population, .. }
    ));
}

#[test]
fn test_batching_vars() {
    let mut config = SpikegenConfig::default();
    config.model.batch_size = 5;
    let mut builder = builder_with(&config);
    builder
        .add_population("Pop", 10, "IzhikevichVariable", &[], &[0.0, 0.0, 0.02, 0.2, -65.0, 8.0])
        .unwrap();

    let refs = |a: &str, b: &str| {
        vec![VarReference::population("Pop", a), VarReference::population("Pop", b)]
    };
    // Own variable replicated, references shared
    builder.add_custom_update("Sum0", "CustomUpdate", "Sum", &[], &[0.0], refs("a", "b")).unwrap();
    // Own variable shared, references vary
    builder.add_custom_update("Sum1", "CustomUpdate", "Sum2", &[], &[1.0], refs("V", "U")).unwrap();
    builder.add_custom_update("Sum2", "CustomUpdate", "Sum2", &[], &[1.0], refs("a", "b")).unwrap();
    builder.add_custom_update("Sum3", "CustomUpdate", "Sum2", &[], &[1.0], refs("V", "a")).unwrap();

    let model = builder.finalize().unwrap();
    assert!(model.custom_update("Sum0").unwrap().batched);
    assert!(model.custom_update("Sum1").unwrap().batched);
    assert!(!model.custom_update("Sum2").unwrap().batched);
    assert!(model.custom_update("Sum3").unwrap().batched);
}

#[test]
fn test_nothing_batched_with_single_batch() {
    let mut builder = builder();
    add_izhikevich(&mut builder, "Pop", 10);
    builder
        .add_custom_update(
            "Sum1",
            "CustomUpdate",
            "Sum2",
            &[],
            &[1.0],
            vec![VarReference::population("Pop", "V"), VarReference::population("Pop", "U")],
        )
        .unwrap();

    let model = builder.finalize().unwrap();
    assert!(!model.custom_update("Sum1").unwrap().batched);
}

#[test]
fn test_update_groups_get_separate_kernels() {
    let mut builder = builder();
    add_izhikevich(&mut builder, "Small", 10);
    add_izhikevich(&mut builder, "Large", 100);
    let refs = |pop: &str| vec![VarReference::population(pop, "V"), VarReference::population(pop, "U")];
    builder.add_custom_update("ResetSmall", "Reset", "Sum", &[], &[0.0], refs("Small")).unwrap();
    builder.add_custom_update("ResetLarge", "Reset", "Sum", &[], &[0.0], refs("Large")).unwrap();
    builder.add_custom_update("Decay", "Plasticity", "Sum", &[], &[0.0], refs("Small")).unwrap();

    let model = builder.finalize().unwrap();
    let groups: Vec<&str> = model.custom_update_groups().collect();
    assert_eq!(groups, vec!["Plasticity", "Reset"]);

    let reset = model.plan().custom_update_groups("Reset");
    assert_eq!(reset.len(), 2);
    assert_eq!(reset[0].name, "ResetLarge");
    assert_eq!(reset[0].range.padded_size, 128);
    assert_eq!(reset[1].name, "ResetSmall");
    assert_eq!(reset[1].range.start, 128);
    assert_eq!(model.plan().custom_update_groups("Plasticity")[0].range.start, 0);
    assert!(model.plan().groups(KernelKind::CustomUpdate).is_empty());
}
