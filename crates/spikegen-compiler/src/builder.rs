// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Model Builder
//!
//! The open, mutable phase of a model. Every `add_*` call validates against
//! the template registry before touching the graph, so a failed call leaves
//! the builder exactly as it was. [`ModelBuilder::finalize`] consumes the
//! builder; no mutation is reachable on the finalized model.

use spikegen_config::{KernelConfig, ModelConfig, Precision, SpikegenConfig};
use spikegen_models::{TemplateRegistry, TemplateShape};
use std::collections::BTreeMap;
use tracing::debug;

use crate::custom_update::{CustomUpdate, ResolvedVarRef, VarReference};
use crate::error::{CompileError, CompileResult, EntityCategory};
use crate::matrix::{select_storage, SpanType, VarLocation};
use crate::plan::IdRange;
use crate::population::Population;
use crate::projection::{Projection, ProjectionSpec};

#[derive(Debug, Clone)]
pub struct ModelBuilder {
    pub(crate) settings: ModelConfig,
    pub(crate) kernels: KernelConfig,
    pub(crate) registry: TemplateRegistry,
    pub(crate) populations: BTreeMap<String, Population>,
    pub(crate) projections: BTreeMap<String, Projection>,
    pub(crate) custom_updates: BTreeMap<String, CustomUpdate>,
}

fn check_arity(entity: &str, what: &'static str, expected: usize, actual: usize) -> CompileResult<()> {
    if expected != actual {
        return Err(CompileError::ArityMismatch {
            entity: entity.to_string(),
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Values are baked into kernels as literals, so each must be finite
pub(crate) fn check_finite(entity: &str, what: &str, values: &[f64]) -> CompileResult<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(CompileError::InvalidSetting {
            entity: entity.to_string(),
            reason: format!("{} #{} is {}, expected a finite value", what, index, values[index]),
        }),
        None => Ok(()),
    }
}

/// `steps` of delay need `steps + 1` ring slots on `population`
pub(crate) fn check_delay_representable(
    projection: &str,
    population: &str,
    steps: u32,
    max_slots: u32,
) -> CompileResult<u32> {
    let required_slots = steps.saturating_add(1);
    if steps == u32::MAX || required_slots > max_slots {
        return Err(CompileError::DelayNotRepresentable {
            projection: projection.to_string(),
            population: population.to_string(),
            required_slots,
            max_slots,
        });
    }
    Ok(required_slots)
}

fn unknown(category: EntityCategory, name: &str) -> CompileError {
    CompileError::UnknownEntity {
        category,
        name: name.to_string(),
    }
}

fn inconsistent(custom_update: &str, reason: String) -> CompileError {
    CompileError::InconsistentVariableReference {
        custom_update: custom_update.to_string(),
        reason,
    }
}

impl ModelBuilder {
    /// Builder with default settings
    pub fn new(registry: TemplateRegistry) -> Self {
        Self::with_config(&SpikegenConfig::default(), registry)
    }

    /// Builder taking model settings and block sizes from configuration
    pub fn with_config(config: &SpikegenConfig, registry: TemplateRegistry) -> Self {
        Self {
            settings: config.model.clone(),
            kernels: config.kernels.clone(),
            registry,
            populations: BTreeMap::new(),
            projections: BTreeMap::new(),
            custom_updates: BTreeMap::new(),
        }
    }

    pub fn settings(&self) -> &ModelConfig {
        &self.settings
    }

    pub fn kernel_config(&self) -> &KernelConfig {
        &self.kernels
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn population(&self, name: &str) -> Option<&Population> {
        self.populations.get(name)
    }

    pub fn projection(&self, name: &str) -> Option<&Projection> {
        self.projections.get(name)
    }

    pub fn custom_update(&self, name: &str) -> Option<&CustomUpdate> {
        self.custom_updates.get(name)
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    pub fn add_population(
        &mut self,
        name: &str,
        size: usize,
        kind: &str,
        params: &[f64],
        var_inits: &[f64],
    ) -> CompileResult<()> {
        if self.populations.contains_key(name) {
            return Err(CompileError::DuplicateName {
                category: EntityCategory::Population,
                name: name.to_string(),
            });
        }
        let model = self.registry.neuron_model(kind)?;
        check_arity(name, "parameter values", model.params.len(), params.len())?;
        check_arity(name, "variable initial values", model.vars.len(), var_inits.len())?;
        check_finite(name, "parameter value", params)?;
        check_finite(name, "variable initial value", var_inits)?;
        if size == 0 {
            return Err(CompileError::InvalidSetting {
                entity: name.to_string(),
                reason: "population size must be at least 1".to_string(),
            });
        }

        debug!(target: "spikegen-compiler", "Added population '{}' ({} x {})", name, size, kind);
        self.populations.insert(
            name.to_string(),
            Population::new(name, size, kind, model, params.to_vec(), var_inits.to_vec()),
        );
        Ok(())
    }

    pub fn add_projection(&mut self, spec: ProjectionSpec) -> CompileResult<()> {
        let name = spec.name.as_str();
        if self.projections.contains_key(name) {
            return Err(CompileError::DuplicateName {
                category: EntityCategory::Projection,
                name: name.to_string(),
            });
        }

        let source = self
            .populations
            .get(&spec.source)
            .ok_or_else(|| unknown(EntityCategory::Population, &spec.source))?;
        let target = self
            .populations
            .get(&spec.target)
            .ok_or_else(|| unknown(EntityCategory::Population, &spec.target))?;

        let wu_model = self.registry.weight_update_model(&spec.weight_update.kind)?;
        let ps_model = self.registry.postsynaptic_model(&spec.postsynaptic.kind)?;
        check_arity(
            name,
            "weight update parameter values",
            wu_model.params.len(),
            spec.weight_update.params.len(),
        )?;
        check_arity(
            name,
            "weight update variable initial values",
            wu_model.vars.len(),
            spec.weight_update.var_inits.len(),
        )?;
        check_arity(
            name,
            "postsynaptic parameter values",
            ps_model.params.len(),
            spec.postsynaptic.params.len(),
        )?;
        check_arity(
            name,
            "postsynaptic variable initial values",
            ps_model.vars.len(),
            spec.postsynaptic.var_inits.len(),
        )?;
        check_finite(name, "weight update parameter value", &spec.weight_update.params)?;
        check_finite(name, "weight update variable initial value", &spec.weight_update.var_inits)?;
        check_finite(name, "postsynaptic parameter value", &spec.postsynaptic.params)?;
        check_finite(name, "postsynaptic variable initial value", &spec.postsynaptic.var_inits)?;

        let storage = select_storage(name, spec.connectivity, spec.conductance)?;
        check_delay_representable(
            name,
            &spec.source,
            spec.delay_steps,
            self.settings.max_delay_slots,
        )?;

        let projection = Projection {
            name: name.to_string(),
            source: spec.source.clone(),
            target: spec.target.clone(),
            source_size: source.size,
            target_size: target.size,
            delay_steps: spec.delay_steps,
            back_prop_delay_steps: 0,
            connectivity: spec.connectivity,
            conductance: spec.conductance,
            storage,
            span_type: SpanType::Postsynaptic,
            max_connections: target.size,
            num_threads_per_spike: 1,
            wu_kind: spec.weight_update.kind.clone(),
            wu_var_locations: vec![VarLocation::Device; wu_model.vars.len()],
            wu_model,
            wu_params: spec.weight_update.params.clone(),
            wu_var_inits: spec.weight_update.var_inits.clone(),
            wu_derived_params: Vec::new(),
            ps_kind: spec.postsynaptic.kind.clone(),
            ps_var_locations: vec![VarLocation::Device; ps_model.vars.len()],
            ps_model,
            ps_params: spec.postsynaptic.params.clone(),
            ps_var_inits: spec.postsynaptic.var_inits.clone(),
            ps_derived_params: Vec::new(),
            true_spike_required: false,
            spike_event_required: false,
            event_threshold_retest_required: false,
            event_threshold_condition: None,
            ranges: BTreeMap::new(),
        };

        let needs_pre_spike_time = projection.wu_model.needs_pre_spike_time;
        let needs_post_spike_time = projection.wu_model.needs_post_spike_time;

        // Endpoints were checked above; nothing below can fail
        if let Some(source) = self.populations.get_mut(&spec.source) {
            source.out_projections.insert(name.to_string());
            if needs_pre_spike_time {
                source.spike_time_required = true;
            }
        }
        if let Some(target) = self.populations.get_mut(&spec.target) {
            target.in_projections.insert(name.to_string());
            if needs_post_spike_time {
                target.spike_time_required = true;
            }
        }

        debug!(
            target: "spikegen-compiler",
            "Added projection '{}' {} -> {} ({:?}, delay {})",
            name, spec.source, spec.target, storage, spec.delay_steps
        );
        self.projections.insert(name.to_string(), projection);
        Ok(())
    }

    pub fn add_custom_update(
        &mut self,
        name: &str,
        group: &str,
        kind: &str,
        params: &[f64],
        var_inits: &[f64],
        var_refs: Vec<VarReference>,
    ) -> CompileResult<()> {
        if self.custom_updates.contains_key(name) {
            return Err(CompileError::DuplicateName {
                category: EntityCategory::CustomUpdate,
                name: name.to_string(),
            });
        }
        let model = self.registry.custom_update_model(kind)?;
        check_arity(name, "parameter values", model.params.len(), params.len())?;
        check_arity(name, "variable initial values", model.vars.len(), var_inits.len())?;
        check_arity(name, "variable references", model.var_refs.len(), var_refs.len())?;
        check_finite(name, "parameter value", params)?;
        check_finite(name, "variable initial value", var_inits)?;
        if var_refs.is_empty() {
            return Err(CompileError::InvalidSetting {
                entity: name.to_string(),
                reason: "a custom update must reference at least one variable".to_string(),
            });
        }

        let resolved = self.resolve_var_refs(name, &model.var_refs, var_refs)?;
        self.check_reference_targets(name, &resolved)?;

        debug!(
            target: "spikegen-compiler",
            "Added custom update '{}' in group '{}' with {} reference(s)",
            name, group, resolved.len()
        );
        self.custom_updates.insert(
            name.to_string(),
            CustomUpdate {
                name: name.to_string(),
                group: group.to_string(),
                model_kind: kind.to_string(),
                var_locations: vec![VarLocation::Device; model.vars.len()],
                model,
                params: params.to_vec(),
                var_inits: var_inits.to_vec(),
                derived_params: Vec::new(),
                var_refs: resolved,
                size: 0,
                batched: false,
                delay_population: None,
                id_range: IdRange::default(),
            },
        );
        Ok(())
    }

    fn resolve_var_refs(
        &self,
        custom_update: &str,
        slots: &[spikegen_models::VarRefDecl],
        var_refs: Vec<VarReference>,
    ) -> CompileResult<Vec<ResolvedVarRef>> {
        slots
            .iter()
            .zip(var_refs)
            .map(|(slot, target)| {
                let var = match &target {
                    VarReference::Population { population, var } => self
                        .populations
                        .get(population)
                        .ok_or_else(|| unknown(EntityCategory::Population, population))?
                        .model
                        .var(var)
                        .cloned(),
                    VarReference::WeightUpdate { projection, var } => self
                        .projections
                        .get(projection)
                        .ok_or_else(|| unknown(EntityCategory::Projection, projection))?
                        .wu_model
                        .var(var)
                        .cloned(),
                }
                .ok_or_else(|| unknown(EntityCategory::Variable, &target.to_string()))?;

                if var.ty != slot.ty {
                    return Err(inconsistent(
                        custom_update,
                        format!(
                            "reference '{}' has type '{}' but {} has type '{}'",
                            slot.name, slot.ty, target, var.ty
                        ),
                    ));
                }

                Ok(ResolvedVarRef {
                    slot: slot.name.clone(),
                    target,
                    ty: var.ty,
                    access: slot.access,
                    target_access: var.access,
                })
            })
            .collect()
    }

    /// References are all population variables or all variables of one projection
    fn check_reference_targets(
        &self,
        custom_update: &str,
        refs: &[ResolvedVarRef],
    ) -> CompileResult<()> {
        let Some(first) = refs.first() else {
            return Ok(());
        };

        if refs
            .iter()
            .any(|r| r.target.is_population() != first.target.is_population())
        {
            return Err(inconsistent(
                custom_update,
                "cannot mix population and weight update variable references".to_string(),
            ));
        }

        if !first.target.is_population() {
            if let Some(other) = refs
                .iter()
                .find(|r| r.target.target_name() != first.target.target_name())
            {
                return Err(inconsistent(
                    custom_update,
                    format!(
                        "all weight update variable references must target the same projection ('{}' and '{}')",
                        first.target.target_name(),
                        other.target.target_name()
                    ),
                ));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Projection settings
    // ------------------------------------------------------------------

    fn population_mut(&mut self, name: &str) -> CompileResult<&mut Population> {
        self.populations
            .get_mut(name)
            .ok_or_else(|| unknown(EntityCategory::Population, name))
    }

    fn projection_mut(&mut self, name: &str) -> CompileResult<&mut Projection> {
        self.projections
            .get_mut(name)
            .ok_or_else(|| unknown(EntityCategory::Projection, name))
    }

    pub fn set_span_type(&mut self, projection: &str, span_type: SpanType) -> CompileResult<()> {
        self.projection_mut(projection)?.span_type = span_type;
        Ok(())
    }

    /// Narrow the longest row of a sparse projection
    pub fn set_max_connections(&mut self, projection: &str, max_connections: usize) -> CompileResult<()> {
        let proj = self.projection_mut(projection)?;
        if !proj.storage.is_sparse() {
            return Err(CompileError::InvalidSetting {
                entity: projection.to_string(),
                reason: "max connections can only be set on sparse projections".to_string(),
            });
        }
        if max_connections == 0 || max_connections > proj.target_size {
            return Err(CompileError::InvalidSetting {
                entity: projection.to_string(),
                reason: format!(
                    "max connections must be between 1 and the target size {}, got {}",
                    proj.target_size, max_connections
                ),
            });
        }
        proj.max_connections = max_connections;
        Ok(())
    }

    pub fn set_num_threads_per_spike(&mut self, projection: &str, threads: usize) -> CompileResult<()> {
        if threads == 0 {
            return Err(CompileError::InvalidSetting {
                entity: projection.to_string(),
                reason: "threads per spike must be at least 1".to_string(),
            });
        }
        self.projection_mut(projection)?.num_threads_per_spike = threads;
        Ok(())
    }

    /// Delay, in steps, of target state read through `$(var_post)`
    pub fn set_back_prop_delay_steps(&mut self, projection: &str, steps: u32) -> CompileResult<()> {
        let max_slots = self.settings.max_delay_slots;
        let proj = self.projection_mut(projection)?;
        check_delay_representable(projection, &proj.target, steps, max_slots)?;
        proj.back_prop_delay_steps = steps;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Zero-copy placement
    // ------------------------------------------------------------------

    pub fn set_population_spike_zero_copy(&mut self, population: &str) -> CompileResult<()> {
        self.population_mut(population)?.spike_location = VarLocation::ZeroCopy;
        Ok(())
    }

    pub fn set_population_spike_event_zero_copy(&mut self, population: &str) -> CompileResult<()> {
        self.population_mut(population)?.spike_event_location = VarLocation::ZeroCopy;
        Ok(())
    }

    pub fn set_population_spike_time_zero_copy(&mut self, population: &str) -> CompileResult<()> {
        self.population_mut(population)?.spike_time_location = VarLocation::ZeroCopy;
        Ok(())
    }

    pub fn set_population_var_zero_copy(&mut self, population: &str, var: &str) -> CompileResult<()> {
        let pop = self.population_mut(population)?;
        let index = pop
            .var_index(var)
            .ok_or_else(|| unknown(EntityCategory::Variable, &format!("{}.{}", population, var)))?;
        pop.var_locations[index] = VarLocation::ZeroCopy;
        Ok(())
    }

    pub fn set_weight_update_var_zero_copy(&mut self, projection: &str, var: &str) -> CompileResult<()> {
        let proj = self.projection_mut(projection)?;
        let index = proj
            .wu_model
            .vars
            .iter()
            .position(|v| v.name == var)
            .ok_or_else(|| unknown(EntityCategory::Variable, &format!("{}.{}", projection, var)))?;
        proj.wu_var_locations[index] = VarLocation::ZeroCopy;
        Ok(())
    }

    pub fn set_postsynaptic_var_zero_copy(&mut self, projection: &str, var: &str) -> CompileResult<()> {
        let proj = self.projection_mut(projection)?;
        let index = proj
            .ps_model
            .vars
            .iter()
            .position(|v| v.name == var)
            .ok_or_else(|| unknown(EntityCategory::Variable, &format!("{}.{}", projection, var)))?;
        proj.ps_var_locations[index] = VarLocation::ZeroCopy;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Model settings
    // ------------------------------------------------------------------

    pub fn set_name(&mut self, name: &str) -> CompileResult<()> {
        if name.trim().is_empty() {
            return Err(CompileError::InvalidSetting {
                entity: "model".to_string(),
                reason: "name must not be empty".to_string(),
            });
        }
        self.settings.name = name.to_string();
        Ok(())
    }

    pub fn set_dt(&mut self, dt: f64) -> CompileResult<()> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(CompileError::InvalidSetting {
                entity: self.settings.name.clone(),
                reason: format!("dt must be finite and > 0, got {}", dt),
            });
        }
        self.settings.dt = dt;
        Ok(())
    }

    pub fn set_precision(&mut self, precision: Precision) {
        self.settings.precision = precision;
    }

    /// Recorded in [`crate::FinalizedModel::settings`] for the host runtime
    pub fn set_timing(&mut self, timing: bool) {
        self.settings.timing = timing;
    }

    /// Recorded in [`crate::FinalizedModel::settings`] for the host runtime
    pub fn set_seed(&mut self, seed: u64) {
        self.settings.seed = seed;
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> CompileResult<()> {
        if batch_size == 0 {
            return Err(CompileError::InvalidSetting {
                entity: self.settings.name.clone(),
                reason: "batch size must be at least 1".to_string(),
            });
        }
        self.settings.batch_size = batch_size;
        Ok(())
    }
}
