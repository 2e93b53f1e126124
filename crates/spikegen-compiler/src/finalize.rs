// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Finalization - resolving an open model into a kernel plan.

Runs once over a builder, in stages:

1. **Populations**: derived parameters, padded neuron-kernel ranges,
   extra global parameters as kernel parameters
2. **Projections**: storage representation, derived parameters, required
   kernels and their padded ranges (one running offset per kernel kind)
3. **Delay queues**: ring sizes and queued variables, from a whole-graph scan
4. **Spike events**: substituted threshold conditions per source population,
   re-test flags where conditions are shared
5. **Custom updates**: size, batching, delay consistency, per-group ranges
6. **Reset placement**: which kernel clears spike counters

All work happens on copies of the builder's entities, so a failure leaves
the builder untouched and finalizable again.
*/

use spikegen_config::{KernelConfig, ModelConfig};
use spikegen_models::code::{has_code, name_substitutions, references_var, value_substitutions};
use spikegen_models::TemplateShape;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::batching::resolve_custom_update;
use crate::builder::{check_finite, ModelBuilder};
use crate::custom_update::CustomUpdate;
use crate::error::{CompileError, CompileResult};
use crate::finalized::{scalar_expr, FinalizedModel};
use crate::matrix::select_storage;
use crate::plan::{IdRange, KernelGroup, KernelKind, KernelPlan};
use crate::population::{Population, SpikeEventCondition};
use crate::projection::Projection;
use crate::queue::{assign_delay_slots, propagate_var_queues};
use crate::sizing::{padded, sizing_fn};

/// Finalization stage, for progress logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeStage {
    Populations,
    Projections,
    DelayQueues,
    SpikeEvents,
    CustomUpdates,
    ResetPlacement,
}

/// A failed finalization, handing the untouched builder back
#[derive(Debug, thiserror::Error)]
#[error("Finalization failed: {error}")]
pub struct FinalizeError {
    pub error: CompileError,
    pub builder: ModelBuilder,
}

impl FinalizeError {
    pub fn into_parts(self) -> (CompileError, ModelBuilder) {
        (self.error, self.builder)
    }
}

impl From<FinalizeError> for CompileError {
    fn from(err: FinalizeError) -> Self {
        err.error
    }
}

impl ModelBuilder {
    /// Resolve the model into its kernel plan
    ///
    /// Consumes the builder: a finalized model cannot be mutated or finalized
    /// again. On failure the builder is returned inside the error.
    pub fn finalize(self) -> Result<FinalizedModel, FinalizeError> {
        match self.resolve() {
            Ok(model) => Ok(model),
            Err(error) => {
                warn!(target: "spikegen-compiler", "⚠️ Finalization of '{}' failed: {}", self.settings.name, error);
                Err(FinalizeError {
                    error,
                    builder: self,
                })
            }
        }
    }

    pub(crate) fn resolve(&self) -> CompileResult<FinalizedModel> {
        info!(
            target: "spikegen-compiler",
            "🧬 Finalizing model '{}': {} populations, {} projections, {} custom updates",
            self.settings.name,
            self.populations.len(),
            self.projections.len(),
            self.custom_updates.len()
        );

        let mut finalizer = Finalizer {
            settings: &self.settings,
            kernels: &self.kernels,
            populations: self.populations.clone(),
            projections: self.projections.clone(),
            custom_updates: self.custom_updates.clone(),
            plan: KernelPlan::new(&self.kernels),
        };

        finalizer.populations()?;
        finalizer.projections()?;
        finalizer.delay_queues()?;
        finalizer.spike_events()?;
        finalizer.custom_updates()?;
        finalizer.reset_placement();

        let model = finalizer.finish();
        info!(
            target: "spikegen-compiler",
            "✅ Finalized '{}': neuron={} presynaptic={} post-learning={} dynamics={} units, reset in {:?}",
            model.name(),
            model.plan.total_size(KernelKind::NeuronUpdate),
            model.plan.total_size(KernelKind::PresynapticUpdate),
            model.plan.total_size(KernelKind::PostsynapticLearning),
            model.plan.total_size(KernelKind::SynapseDynamics),
            model.plan.reset_kernel
        );
        Ok(model)
    }
}

struct Finalizer<'a> {
    settings: &'a ModelConfig,
    kernels: &'a KernelConfig,
    populations: BTreeMap<String, Population>,
    projections: BTreeMap<String, Projection>,
    custom_updates: BTreeMap<String, CustomUpdate>,
    plan: KernelPlan,
}

impl<'a> Finalizer<'a> {
    fn stage(&self, stage: FinalizeStage) {
        debug!(target: "spikegen-compiler", "Stage {:?}", stage);
    }

    /// Stage 1
    fn populations(&mut self) -> CompileResult<()> {
        self.stage(FinalizeStage::Populations);
        let block_size = KernelKind::NeuronUpdate.block_size(self.kernels);
        let dt = self.settings.dt;
        let mut offset = 0;

        for (name, pop) in self.populations.iter_mut() {
            pop.derived_params = pop.model.evaluate_derived_params(&pop.params, dt);
            check_finite(name, "derived parameter", &pop.derived_params)?;

            let padded_size = padded(pop.size, block_size);
            pop.id_range = IdRange::new(offset, padded_size);
            offset += padded_size;

            for egp in &pop.model.extra_global_params {
                self.plan.add_kernel_param(
                    KernelKind::NeuronUpdate,
                    format!("{}{}", egp.name, name),
                    &egp.ty,
                );
            }
            self.plan.neuron_update.push(KernelGroup {
                name: name.clone(),
                range: pop.id_range,
            });
        }

        info!(
            target: "spikegen-compiler",
            "  ✓ Populations: {} groups over {} neuron update units",
            self.populations.len(),
            offset
        );
        Ok(())
    }

    /// Stage 2
    fn projections(&mut self) -> CompileResult<()> {
        self.stage(FinalizeStage::Projections);
        let dt = self.settings.dt;
        let mut offsets: BTreeMap<KernelKind, usize> = BTreeMap::new();

        for (name, proj) in self.projections.iter_mut() {
            proj.storage = select_storage(name, proj.connectivity, proj.conductance)?;
            proj.wu_derived_params = proj.wu_model.evaluate_derived_params(&proj.wu_params, dt);
            proj.ps_derived_params = proj.ps_model.evaluate_derived_params(&proj.ps_params, dt);
            check_finite(name, "weight update derived parameter", &proj.wu_derived_params)?;
            check_finite(name, "postsynaptic derived parameter", &proj.ps_derived_params)?;

            if has_code(&proj.wu_model.sim_code) {
                proj.true_spike_required = true;
                for endpoint in [&proj.source, &proj.target] {
                    if let Some(pop) = self.populations.get_mut(endpoint) {
                        pop.true_spike_required = true;
                    }
                }
            }
            if proj.is_post_learning_required() {
                if let Some(target) = self.populations.get_mut(&proj.target) {
                    target.true_spike_required = true;
                }
            }

            for kind in proj.required_kernels() {
                let Some(sizing) = sizing_fn(kind) else {
                    continue;
                };
                let padded_size = sizing(proj, kind.block_size(self.kernels));
                let offset = offsets.entry(kind).or_insert(0);
                let range = IdRange::new(*offset, padded_size);
                *offset += padded_size;

                proj.ranges.insert(kind, range);
                if let Some(groups) = self.plan.groups_mut(kind) {
                    groups.push(KernelGroup {
                        name: name.clone(),
                        range,
                    });
                }
                for egp in &proj.wu_model.extra_global_params {
                    self.plan
                        .add_kernel_param(kind, format!("{}{}", egp.name, name), &egp.ty);
                }
                debug!(
                    target: "spikegen-compiler",
                    "  Projection '{}' ({:?}, {:?} span) -> {:?} [{}, {})",
                    name, proj.storage, proj.span_type, kind, range.start, range.end()
                );
            }
        }

        info!(
            target: "spikegen-compiler",
            "  ✓ Projections: presynaptic={} post-learning={} dynamics={} groups",
            self.plan.presynaptic_update.len(),
            self.plan.postsynaptic_learning.len(),
            self.plan.synapse_dynamics.len()
        );
        Ok(())
    }

    /// Stage 3
    fn delay_queues(&mut self) -> CompileResult<()> {
        self.stage(FinalizeStage::DelayQueues);
        assign_delay_slots(
            &mut self.populations,
            &self.projections,
            self.settings.max_delay_slots,
        )?;
        let queued = propagate_var_queues(&mut self.populations, &self.projections);

        for proj in self.projections.values().filter(|p| p.delay_steps > 0) {
            let source_queues = self
                .populations
                .get(&proj.source)
                .map(|p| p.var_queue_required.iter().any(|q| *q))
                .unwrap_or(false);
            if !source_queues && !proj.true_spike_required && !has_code(&proj.wu_model.event_code) {
                warn!(
                    target: "spikegen-compiler",
                    "  ⚠️ Projection '{}' is delayed by {} steps but reads nothing through the delay",
                    proj.name, proj.delay_steps
                );
            }
        }

        info!(target: "spikegen-compiler", "  ✓ Delay queues: {} queued variables", queued);
        Ok(())
    }

    /// Stage 4
    fn spike_events(&mut self) -> CompileResult<()> {
        self.stage(FinalizeStage::SpikeEvents);
        let precision = self.settings.precision;
        let format_value = |v: f64| scalar_expr(precision, v);

        for (pop_name, pop) in self.populations.iter_mut() {
            let mut contributors = Vec::new();

            for proj_name in &pop.out_projections {
                let Some(proj) = self.projections.get_mut(proj_name) else {
                    continue;
                };
                let wu = proj.wu_model.clone();
                if !has_code(&wu.event_code) {
                    continue;
                }
                if !has_code(&wu.event_threshold_condition_code) {
                    return Err(CompileError::InvalidSetting {
                        entity: proj_name.clone(),
                        reason: "weight update model has event code but no event threshold condition"
                            .to_string(),
                    });
                }

                proj.spike_event_required = true;
                pop.spike_event_required = true;

                let threshold = &wu.event_threshold_condition_code;
                let mut code = value_substitutions(
                    threshold,
                    &wu.param_names(),
                    &proj.wu_params,
                    "",
                    format_value,
                );
                code = value_substitutions(
                    &code,
                    &wu.derived_param_names(),
                    &proj.wu_derived_params,
                    "",
                    format_value,
                );

                let egp_names: Vec<&str> = wu
                    .extra_global_params
                    .iter()
                    .map(|egp| egp.name.as_str())
                    .collect();
                for egp in &wu.extra_global_params {
                    if references_var(threshold, &egp.name, "") {
                        self.plan.add_kernel_param(
                            KernelKind::NeuronUpdate,
                            format!("{}{}", egp.name, proj_name),
                            &egp.ty,
                        );
                    }
                }
                code = name_substitutions(&code, "", &egp_names, proj_name);

                let support_code_namespace = if has_code(&wu.sim_support_code) {
                    Some(format!("{}_weightupdate_simCode", proj_name))
                } else {
                    None
                };

                pop.spike_event_conditions.insert(SpikeEventCondition {
                    code: code.clone(),
                    support_code_namespace,
                });
                proj.event_threshold_condition = Some(code);
                contributors.push(proj_name.clone());
            }

            if pop.spike_event_conditions.len() > 1 {
                debug!(
                    target: "spikegen-compiler",
                    "  Population '{}' has {} spike event conditions, re-testing in {:?}",
                    pop_name,
                    pop.spike_event_conditions.len(),
                    contributors
                );
                for proj_name in &contributors {
                    if let Some(proj) = self.projections.get_mut(proj_name) {
                        proj.event_threshold_retest_required = true;
                    }
                }
            }
        }

        let conditions: usize = self
            .populations
            .values()
            .map(|p| p.spike_event_conditions.len())
            .sum();
        info!(target: "spikegen-compiler", "  ✓ Spike events: {} conditions", conditions);
        Ok(())
    }

    /// Stage 5
    fn custom_updates(&mut self) -> CompileResult<()> {
        self.stage(FinalizeStage::CustomUpdates);
        let block_size = KernelKind::CustomUpdate.block_size(self.kernels);
        let mut offsets: BTreeMap<String, usize> = BTreeMap::new();

        for (name, custom_update) in self.custom_updates.iter_mut() {
            resolve_custom_update(
                custom_update,
                &self.populations,
                &self.projections,
                self.settings.batch_size,
                self.settings.dt,
            )?;

            let offset = offsets.entry(custom_update.group.clone()).or_insert(0);
            let padded_size = padded(custom_update.size, block_size);
            custom_update.id_range = IdRange::new(*offset, padded_size);
            *offset += padded_size;

            self.plan
                .custom_updates
                .entry(custom_update.group.clone())
                .or_default()
                .push(KernelGroup {
                    name: name.clone(),
                    range: custom_update.id_range,
                });
        }

        info!(
            target: "spikegen-compiler",
            "  ✓ Custom updates: {} updates in {} groups",
            self.custom_updates.len(),
            self.plan.custom_updates.len()
        );
        Ok(())
    }

    /// Stage 6: the reset runs after all per-step accumulation
    fn reset_placement(&mut self) {
        self.stage(FinalizeStage::ResetPlacement);
        self.plan.reset_kernel = if self.projections.is_empty() {
            KernelKind::NeuronUpdate
        } else if self
            .projections
            .values()
            .any(Projection::is_post_learning_required)
        {
            KernelKind::PostsynapticLearning
        } else if self.projections.values().any(Projection::is_dynamics_required) {
            KernelKind::SynapseDynamics
        } else {
            KernelKind::PresynapticUpdate
        };
    }

    fn finish(self) -> FinalizedModel {
        let mut model = FinalizedModel {
            settings: self.settings.clone(),
            kernels: self.kernels.clone(),
            populations: self.populations,
            projections: self.projections,
            custom_updates: self.custom_updates,
            plan: self.plan,
        };
        model.plan.zero_copy = model.zero_copy_in_use();
        if model.plan.zero_copy {
            debug!(target: "spikegen-compiler", "Zero-copy placement in use");
        }
        model
    }
}
