// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Custom-update resolution: size, batching and delay consistency

use spikegen_models::TemplateShape;
use std::collections::BTreeMap;
use tracing::debug;

use crate::builder::check_finite;
use crate::custom_update::{CustomUpdate, VarReference};
use crate::error::{CompileError, CompileResult, EntityCategory};
use crate::population::Population;
use crate::projection::Projection;

/// Resolve everything about a custom update that depends on the finalized graph
///
/// - size: the referenced population size, or the projection's synapse capacity
/// - batched: batch size > 1 and some own variable or referenced variable
///   is replicated per batch (read-write)
/// - delay population: the owner of any delayed population reference; all
///   delayed references must agree on their ring length
/// - referenced populations must all have the same size (checked after delays)
pub(crate) fn resolve_custom_update(
    custom_update: &mut CustomUpdate,
    populations: &BTreeMap<String, Population>,
    projections: &BTreeMap<String, Projection>,
    batch_size: u32,
    dt: f64,
) -> CompileResult<()> {
    let name = custom_update.name.clone();
    custom_update.derived_params = custom_update
        .model
        .evaluate_derived_params(&custom_update.params, dt);
    check_finite(&name, "derived parameter", &custom_update.derived_params)?;

    custom_update.size = reference_size(&name, custom_update, populations, projections)?;

    let mut delayed: Vec<(&str, u32)> = Vec::new();
    for var_ref in &custom_update.var_refs {
        if let VarReference::Population { population, var } = &var_ref.target {
            let pop = populations.get(population).ok_or_else(|| CompileError::UnknownEntity {
                category: EntityCategory::Population,
                name: population.clone(),
            })?;
            if pop.is_var_delayed(var) {
                delayed.push((pop.name.as_str(), pop.num_delay_slots));
            }
        }
    }

    if let Some(&(first_pop, first_slots)) = delayed.first() {
        if let Some(&(other_pop, other_slots)) =
            delayed.iter().find(|(_, slots)| *slots != first_slots)
        {
            return Err(CompileError::InconsistentVariableReference {
                custom_update: name,
                reason: format!(
                    "referenced variables have different delays ('{}' has {} slots, '{}' has {})",
                    first_pop, first_slots, other_pop, other_slots
                ),
            });
        }
        custom_update.delay_population = Some(first_pop.to_string());
    }

    if custom_update.references_populations() {
        let mismatched = custom_update.var_refs.iter().find_map(|r| {
            populations
                .get(r.target.target_name())
                .filter(|p| p.size != custom_update.size)
        });
        if let Some(pop) = mismatched {
            return Err(CompileError::InconsistentVariableReference {
                custom_update: name,
                reason: format!(
                    "all referenced populations must have the same size ('{}' has {}, expected {})",
                    pop.name, pop.size, custom_update.size
                ),
            });
        }
    }

    let own_replicated = custom_update
        .model
        .vars
        .iter()
        .any(|v| v.access.is_replicated_per_batch());
    let ref_replicated = custom_update
        .var_refs
        .iter()
        .any(|r| r.target_access.is_replicated_per_batch());
    custom_update.batched = batch_size > 1 && (own_replicated || ref_replicated);

    debug!(
        target: "spikegen-compiler",
        "  Custom update '{}': size {}, batched={}, delay population {:?}",
        custom_update.name, custom_update.size, custom_update.batched, custom_update.delay_population
    );
    Ok(())
}

fn reference_size(
    name: &str,
    custom_update: &CustomUpdate,
    populations: &BTreeMap<String, Population>,
    projections: &BTreeMap<String, Projection>,
) -> CompileResult<usize> {
    let first = custom_update
        .var_refs
        .first()
        .ok_or_else(|| CompileError::InvalidSetting {
            entity: name.to_string(),
            reason: "a custom update must reference at least one variable".to_string(),
        })?;

    match &first.target {
        VarReference::Population { population, .. } => populations
            .get(population)
            .map(|p| p.size)
            .ok_or_else(|| CompileError::UnknownEntity {
                category: EntityCategory::Population,
                name: population.clone(),
            }),
        VarReference::WeightUpdate { projection, .. } => projections
            .get(projection)
            .map(Projection::synapse_capacity)
            .ok_or_else(|| CompileError::UnknownEntity {
                category: EntityCategory::Projection,
                name: projection.clone(),
            }),
    }
}
