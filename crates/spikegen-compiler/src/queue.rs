// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Delay rings and variable queueing
//!
//! Both are whole-graph properties: a population's ring must hold the
//! longest delay any consumer applies to it, and a variable is queued when
//! *any* consumer reads it through the delay. They are recomputed from
//! scratch over every (population, consumer code) pair so the result does not
//! depend on the order entities were added in.

use spikegen_models::code::references_var;
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::builder::check_delay_representable;
use crate::error::CompileResult;
use crate::population::Population;
use crate::projection::Projection;

/// Size every population's delay ring
///
/// Sources need `delay_steps + 1` slots, targets `back_prop_delay_steps + 1`.
pub(crate) fn assign_delay_slots(
    populations: &mut BTreeMap<String, Population>,
    projections: &BTreeMap<String, Projection>,
    max_slots: u32,
) -> CompileResult<()> {
    for pop in populations.values_mut() {
        pop.num_delay_slots = 1;
    }

    for proj in projections.values() {
        let source_slots =
            check_delay_representable(&proj.name, &proj.source, proj.delay_steps, max_slots)?;
        let target_slots = check_delay_representable(
            &proj.name,
            &proj.target,
            proj.back_prop_delay_steps,
            max_slots,
        )?;

        if let Some(source) = populations.get_mut(&proj.source) {
            source.require_delay_slots(source_slots);
        }
        if let Some(target) = populations.get_mut(&proj.target) {
            target.require_delay_slots(target_slots);
        }
    }

    for pop in populations.values().filter(|p| p.is_delay_required()) {
        debug!(
            target: "spikegen-compiler",
            "  Population '{}' keeps {} delay slots",
            pop.name, pop.num_delay_slots
        );
    }
    Ok(())
}

/// Mark every variable read as `$(var_pre)` by an outgoing projection or as
/// `$(var_post)` by an incoming one; returns how many were marked
pub(crate) fn propagate_var_queues(
    populations: &mut BTreeMap<String, Population>,
    projections: &BTreeMap<String, Projection>,
) -> usize {
    let mut queued = 0;

    for (pop_name, pop) in populations.iter_mut() {
        let consumers: Vec<(&str, &str)> = projections
            .values()
            .flat_map(|proj| {
                let mut suffixes = Vec::with_capacity(2);
                if &proj.source == pop_name {
                    suffixes.push("_pre");
                }
                if &proj.target == pop_name {
                    suffixes.push("_post");
                }
                let codes = proj.wu_model.consumer_code();
                suffixes
                    .into_iter()
                    .flat_map(move |suffix| codes.into_iter().map(move |code| (code, suffix)))
            })
            .collect();

        for (index, var) in pop.model.vars.iter().enumerate() {
            let required = consumers
                .iter()
                .any(|(code, suffix)| references_var(code, &var.name, suffix));
            pop.var_queue_required[index] = required;
            if required {
                queued += 1;
                trace!(target: "spikegen-compiler", "  Queue required for {}.{}", pop_name, var.name);
            }
        }
    }

    queued
}
