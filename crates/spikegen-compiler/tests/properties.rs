// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Property tests over id-range layout

mod common;

use common::*;
use proptest::prelude::*;
use spikegen_compiler::sizing::{padded, sizing_fn};
use spikegen_compiler::{
    Conductance, Connectivity, FinalizedModel, KernelGroup, KernelKind, SpanType, VarReference,
};

/// One random projection: endpoints, rule, layout and span settings
#[derive(Debug, Clone)]
struct ProjectionCase {
    source: usize,
    target: usize,
    rule: usize,
    sparse: bool,
    row_percent: usize,
    pre_span: bool,
    threads: usize,
}

fn projection_case(populations: usize) -> impl Strategy<Value = ProjectionCase> {
    (
        0..populations,
        0..populations,
        0usize..3,
        any::<bool>(),
        1usize..=100,
        any::<bool>(),
        1usize..4,
    )
        .prop_map(|(source, target, rule, sparse, row_percent, pre_span, threads)| ProjectionCase {
            source,
            target,
            rule,
            sparse,
            row_percent,
            pre_span,
            threads,
        })
}

/// Groups start at zero, follow each other without gaps and end at the total
fn assert_partition(groups: &[KernelGroup], total: usize, block_size: usize) -> Result<(), TestCaseError> {
    let mut expected_start = 0;
    for group in groups {
        prop_assert_eq!(group.range.start, expected_start);
        prop_assert_eq!(group.range.padded_size % block_size, 0);
        prop_assert!(group.range.padded_size > 0);
        expected_start = group.range.end();
    }
    prop_assert_eq!(total, expected_start);
    Ok(())
}

fn build_mixed_model(sizes: &[usize], cases: &[ProjectionCase], wu_refs: usize) -> FinalizedModel {
    let mut builder = builder();
    for (i, size) in sizes.iter().enumerate() {
        add_izhikevich(&mut builder, &format!("Pop{}", i), *size);
    }
    for (i, case) in cases.iter().enumerate() {
        let name = format!("Syn{}", i);
        let source = format!("Pop{}", case.source);
        let target = format!("Pop{}", case.target);
        let connectivity = if case.sparse { Connectivity::Sparse } else { Connectivity::Dense };
        let (rule, params) = match case.rule {
            0 => ("StaticPulse", vec![]),
            1 => ("STDP", vec![20.0]),
            _ => ("Cont", vec![]),
        };
        builder
            .add_projection(projection(
                &name,
                connectivity,
                Conductance::IndividualG,
                &source,
                &target,
                rule,
                params,
                vec![0.1],
            ))
            .unwrap();
        if case.sparse {
            let target_size = sizes[case.target];
            let row = (target_size * case.row_percent / 100).max(1);
            builder.set_max_connections(&name, row).unwrap();
        }
        if case.pre_span {
            builder.set_span_type(&name, SpanType::Presynaptic).unwrap();
            builder.set_num_threads_per_spike(&name, case.threads).unwrap();
        }
    }
    for (i, _) in sizes.iter().enumerate() {
        let pop = format!("Pop{}", i);
        builder
            .add_custom_update(
                &format!("Scale{}", i),
                if i % 2 == 0 { "Even" } else { "Odd" },
                "Sum2",
                &[],
                &[1.0],
                vec![VarReference::population(&pop, "V"), VarReference::population(&pop, "U")],
            )
            .unwrap();
    }
    for i in 0..wu_refs.min(cases.len()) {
        let syn = format!("Syn{}", i);
        builder
            .add_custom_update(
                &format!("Weights{}", i),
                "Weights",
                "Sum",
                &[],
                &[0.0],
                vec![VarReference::weight_update(&syn, "g"), VarReference::weight_update(&syn, "g")],
            )
            .unwrap();
    }
    builder.finalize().unwrap()
}

proptest! {
    #[test]
    fn prop_padding_is_minimal_multiple(size in 0usize..10_000, blocks in 1usize..8) {
        let block_size = blocks * 32;
        let p = padded(size, block_size);
        prop_assert!(p >= size);
        prop_assert_eq!(p % block_size, 0);
        prop_assert!(p < size + block_size);
    }

    #[test]
    fn prop_neuron_ranges_are_contiguous(sizes in prop::collection::vec(1usize..500, 1..8)) {
        let mut builder = builder();
        for (i, size) in sizes.iter().enumerate() {
            add_izhikevich(&mut builder, &format!("Pop{}", i), *size);
        }
        let model = builder.finalize().unwrap();
        let groups = model.plan().groups(KernelKind::NeuronUpdate);

        let mut expected_start = 0;
        for group in groups {
            let pop = model.population(&group.name).unwrap();
            prop_assert_eq!(group.range.start, expected_start);
            prop_assert_eq!(group.range.padded_size, padded(pop.size, 32));
            expected_start = group.range.end();
        }
        prop_assert_eq!(model.plan().total_size(KernelKind::NeuronUpdate), expected_start);
    }

    #[test]
    fn prop_synaptic_ranges_do_not_overlap(
        targets in prop::collection::vec(1usize..300, 1..6),
        source in 1usize..300,
    ) {
        let mut builder = builder();
        add_izhikevich(&mut builder, "Src", source);
        for (i, size) in targets.iter().enumerate() {
            let target = format!("Tgt{}", i);
            add_izhikevich(&mut builder, &target, *size);
            builder
                .add_projection(static_pulse(&format!("Syn{}", i), Connectivity::Dense, Conductance::IndividualG, "Src", &target))
                .unwrap();
        }
        let model = builder.finalize().unwrap();
        let groups = model.plan().groups(KernelKind::PresynapticUpdate);
        prop_assert_eq!(groups.len(), targets.len());
        for pair in groups.windows(2) {
            prop_assert_eq!(pair[0].range.end(), pair[1].range.start);
        }
        for group in groups {
            let proj = model.projection(&group.name).unwrap();
            prop_assert_eq!(group.range.padded_size, padded(proj.target_size, 32));
        }
    }

    #[test]
    fn prop_every_kernel_kind_is_partitioned(
        sizes in prop::collection::vec(1usize..300, 2..5),
        cases in prop::collection::vec(projection_case(2), 1..8),
        wu_refs in 0usize..4,
    ) {
        let model = build_mixed_model(&sizes, &cases, wu_refs);
        let plan = model.plan();

        for kind in [
            KernelKind::NeuronUpdate,
            KernelKind::PresynapticUpdate,
            KernelKind::PostsynapticLearning,
            KernelKind::SynapseDynamics,
        ] {
            let block_size = plan.block_size(kind);
            assert_partition(plan.groups(kind), plan.total_size(kind), block_size)?;

            if let Some(sizing) = sizing_fn(kind) {
                for group in plan.groups(kind) {
                    let proj = model.projection(&group.name).unwrap();
                    prop_assert_eq!(group.range.padded_size, sizing(proj, block_size));
                }
            }
        }

        for case_index in 0..cases.len() {
            let name = format!("Syn{}", case_index);
            let in_kind = |kind: KernelKind| plan.groups(kind).iter().any(|g| g.name == name);
            prop_assert_eq!(
                in_kind(KernelKind::PostsynapticLearning),
                model.is_synapse_group_post_learning_required(&name)
            );
            prop_assert_eq!(
                in_kind(KernelKind::SynapseDynamics),
                model.is_synapse_group_dynamics_required(&name)
            );
        }

        let block_size = plan.block_size(KernelKind::CustomUpdate);
        for (group, groups) in &plan.custom_updates {
            let total = groups.last().map(|g| g.range.end()).unwrap_or(0);
            assert_partition(groups, total, block_size)?;
            for entry in groups {
                let custom_update = model.custom_update(&entry.name).unwrap();
                prop_assert_eq!(&custom_update.group, group);
                prop_assert_eq!(entry.range.padded_size, padded(custom_update.size, block_size));
            }
        }
        prop_assert_eq!(plan.custom_updates.contains_key("Weights"), wu_refs > 0);
    }
}
