// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-element code generation
//!
//! The backend decides which element a thread works on; a [`KernelHandlers`]
//! implementation writes what that element does. [`FragmentHandlers`] does
//! this by rewriting the model templates' code fragments into device array
//! accesses and literals.

use spikegen_compiler::{FinalizedModel, Population, Projection, VarReference};
use spikegen_models::code::{
    function_substitute, has_code, name_substitutions, substitute, value_substitutions,
};
use spikegen_models::{TemplateShape, VarAccess};

use crate::backend::{
    Accumulation, CustomUpdateContext, KernelBackend, NeuronContext, SpikeKind, SynapseContext,
};
use crate::code_stream::CodeStream;
use crate::error::{CodegenError, CodegenResult};

pub trait KernelHandlers {
    /// Body of the state-update kernel for one neuron
    fn neuron_update(
        &mut self,
        os: &mut CodeStream,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &NeuronContext<'_>,
    ) -> CodegenResult<()>;

    /// Effect of one spike (or spike-like event) on one synapse
    fn presynaptic_update(
        &mut self,
        os: &mut CodeStream,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &SynapseContext<'_>,
        kind: SpikeKind,
    ) -> CodegenResult<()>;

    /// Condition re-tested per presynaptic event when a population shares
    /// its event buffer between several conditions
    fn event_threshold(
        &mut self,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &SynapseContext<'_>,
    ) -> CodegenResult<String>;

    fn postsynaptic_learning(
        &mut self,
        os: &mut CodeStream,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &SynapseContext<'_>,
    ) -> CodegenResult<()>;

    fn synapse_dynamics(
        &mut self,
        os: &mut CodeStream,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &SynapseContext<'_>,
    ) -> CodegenResult<()>;

    fn custom_update(
        &mut self,
        os: &mut CodeStream,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &CustomUpdateContext<'_>,
    ) -> CodegenResult<()>;
}

/// Handlers driven entirely by template code fragments
#[derive(Debug, Default, Clone, Copy)]
pub struct FragmentHandlers;

fn device_type(ty: &str, model: &FinalizedModel) -> String {
    if ty == "scalar" {
        model.precision().type_name().to_string()
    } else {
        ty.to_string()
    }
}

fn values<T: TemplateShape + ?Sized>(
    code: &str,
    template: &T,
    params: &[f64],
    derived_params: &[f64],
    model: &FinalizedModel,
) -> String {
    let code = value_substitutions(code, &template.param_names(), params, "", |v| {
        model.scalar_expr(v)
    });
    value_substitutions(&code, &template.derived_param_names(), derived_params, "", |v| {
        model.scalar_expr(v)
    })
}

fn indexed(array: String, offset: Option<&str>, idx: &str) -> String {
    match offset {
        Some(offset) => format!("{}[{} + {}]", array, offset, idx),
        None => format!("{}[{}]", array, idx),
    }
}

/// `$(name<suffix>)` → `l<name>` for every variable of a population
fn local_vars(code: &str, population: &Population, suffix: &str) -> String {
    population.model.vars.iter().fold(code.to_string(), |acc, var| {
        substitute(&acc, &format!("{}{}", var.name, suffix), &format!("l{}", var.name))
    })
}

/// Population variables read across a projection (`_pre` / `_post`)
fn remote_vars(
    code: &str,
    backend: &dyn KernelBackend,
    population: &Population,
    suffix: &str,
    delay_offset: Option<&str>,
    idx: &str,
) -> String {
    let code = population.model.vars.iter().fold(code.to_string(), |acc, var| {
        let offset = delay_offset.filter(|_| population.is_var_delayed(&var.name));
        substitute(
            &acc,
            &format!("{}{}", var.name, suffix),
            &indexed(backend.state_var(&var.name, &population.name), offset, idx),
        )
    });
    let offset = delay_offset.filter(|_| population.is_delay_required());
    substitute(
        &code,
        &format!("sT{}", suffix),
        &indexed(backend.state_var("sT", &population.name), offset, idx),
    )
}

impl FragmentHandlers {
    fn neuron_code(
        &self,
        code: &str,
        model: &FinalizedModel,
        ctx: &NeuronContext<'_>,
    ) -> String {
        let pop = ctx.population;
        let code = local_vars(code, pop, "");
        let code = values(&code, pop.model.as_ref(), &pop.params, &pop.derived_params, model);
        let egps: Vec<&str> = pop
            .model
            .extra_global_params
            .iter()
            .map(|egp| egp.name.as_str())
            .collect();
        let code = name_substitutions(&code, "", &egps, &pop.name);
        let code = substitute(&code, "Isyn", "Isyn");
        let code = substitute(&code, "sT", "lsT");
        let code = substitute(&code, "id", ctx.id);
        substitute(&code, "t", "t")
    }

    fn synapse_code(
        &self,
        code: &str,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &SynapseContext<'_>,
        accumulation: Accumulation,
    ) -> CodegenResult<String> {
        let proj = ctx.projection;
        let wu = proj.wu_model.as_ref();

        let mut code = if proj.storage.has_individual_weights() {
            wu.vars.iter().fold(code.to_string(), |acc, var| {
                substitute(
                    &acc,
                    &var.name,
                    &format!("{}[{}]", backend.state_var(&var.name, &proj.name), ctx.syn_address),
                )
            })
        } else {
            let names: Vec<&str> = wu.vars.iter().map(|v| v.name.as_str()).collect();
            value_substitutions(code, &names, &proj.wu_var_inits, "", |v| model.scalar_expr(v))
        };
        code = values(&code, wu, &proj.wu_params, &proj.wu_derived_params, model);

        let egps: Vec<&str> = wu
            .extra_global_params
            .iter()
            .map(|egp| egp.name.as_str())
            .collect();
        code = name_substitutions(&code, "", &egps, &proj.name);
        code = remote_vars(&code, backend, ctx.source, "_pre", ctx.pre_delay_offset, ctx.pre_idx);
        code = remote_vars(&code, backend, ctx.target, "_post", ctx.post_delay_offset, ctx.post_idx);
        code = substitute(&code, "id_pre", ctx.pre_idx);
        code = substitute(&code, "id_post", ctx.post_idx);
        code = substitute(&code, "id_syn", ctx.syn_address);
        code = substitute(&code, "t", "t");

        let template = backend.add_to_in_syn(accumulation, proj, ctx.post_idx);
        function_substitute(&code, "addToInSyn", 1, &template)
            .map_err(CodegenError::fragment(&proj.name))
    }

    fn postsynaptic_input(
        &self,
        os: &mut CodeStream,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &NeuronContext<'_>,
        proj: &Projection,
    ) {
        let scalar = model.precision().type_name();
        let ps = proj.ps_model.as_ref();
        let lin_syn = format!("linSyn{}", proj.name);

        os.line(&format!("// pull inSyn values in a coalesced access from '{}'", proj.name));
        os.line(&format!(
            "{} {} = {}[{}];",
            scalar,
            lin_syn,
            backend.state_var("inSyn", &proj.name),
            ctx.id
        ));
        for var in &ps.vars {
            os.line(&format!(
                "{} lps{}{} = {}[{}];",
                device_type(&var.ty, model),
                var.name,
                proj.name,
                backend.state_var(&var.name, &proj.name),
                ctx.id
            ));
        }

        let rewrite = |code: &str| {
            let code = substitute(code, "inSyn", &lin_syn);
            let code = ps.vars.iter().fold(code, |acc, var| {
                substitute(&acc, &var.name, &format!("lps{}{}", var.name, proj.name))
            });
            let code = values(&code, ps, &proj.ps_params, &proj.ps_derived_params, model);
            self.neuron_code(&code, model, ctx)
        };
        if has_code(&ps.apply_input_code) {
            os.line(&rewrite(&ps.apply_input_code));
        }
        if has_code(&ps.decay_code) {
            os.line(&rewrite(&ps.decay_code));
        }

        os.line(&format!(
            "{}[{}] = {};",
            backend.state_var("inSyn", &proj.name),
            ctx.id,
            lin_syn
        ));
        for var in ps.vars.iter().filter(|v| v.access == VarAccess::ReadWrite) {
            os.line(&format!(
                "{}[{}] = lps{}{};",
                backend.state_var(&var.name, &proj.name),
                ctx.id,
                var.name,
                proj.name
            ));
        }
    }
}

impl KernelHandlers for FragmentHandlers {
    fn neuron_update(
        &mut self,
        os: &mut CodeStream,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &NeuronContext<'_>,
    ) -> CodegenResult<()> {
        let pop = ctx.population;
        let nm = pop.model.as_ref();
        let scalar = model.precision().type_name();

        let read_offset = |queued: bool| if queued { ctx.read_delay_offset } else { None };
        let write_offset = |queued: bool| if queued { ctx.write_delay_offset } else { None };

        for (i, var) in nm.vars.iter().enumerate() {
            os.line(&format!(
                "{} l{} = {};",
                device_type(&var.ty, model),
                var.name,
                indexed(
                    backend.state_var(&var.name, &pop.name),
                    read_offset(pop.var_queue_required[i]),
                    ctx.id
                )
            ));
        }
        if pop.spike_time_required {
            os.line(&format!(
                "const {} lsT = {};",
                scalar,
                indexed(backend.state_var("sT", &pop.name), ctx.read_delay_offset, ctx.id)
            ));
        }
        os.blank();

        os.line(&format!("{} Isyn = 0;", scalar));
        for proj_name in &pop.in_projections {
            let proj = model.projection(proj_name)?;
            self.postsynaptic_input(os, backend, model, ctx, proj);
        }

        if has_code(&nm.sim_code) {
            os.line("// calculate membrane potential");
            os.line(&self.neuron_code(&nm.sim_code, model, ctx));
        }

        if pop.spike_event_required {
            os.line("bool spikeLikeEvent = false;");
            for condition in &pop.spike_event_conditions {
                let test = self.neuron_code(&local_vars(&condition.code, pop, "_pre"), model, ctx);
                match &condition.support_code_namespace {
                    Some(namespace) => {
                        os.block("", |os| {
                            os.line(&format!("using namespace {};", namespace));
                            os.line(&format!("spikeLikeEvent |= ({});", test));
                        });
                    }
                    None => {
                        os.line(&format!("spikeLikeEvent |= ({});", test));
                    }
                }
            }
            os.block("if (spikeLikeEvent)", |os| {
                backend.gen_emit_spike_like_event(os, pop, ctx.id);
            });
        }

        if has_code(&nm.threshold_condition_code) {
            let threshold = self.neuron_code(&nm.threshold_condition_code, model, ctx);
            os.line("// test for and register a true spike");
            os.block(&format!("if ({})", threshold), |os| {
                backend.gen_emit_true_spike(os, pop, ctx.id);
                if pop.spike_time_required {
                    backend.gen_record_spike_time(os, pop, ctx.id);
                }
                if has_code(&nm.reset_code) {
                    os.line("// spike reset code");
                    os.line(&self.neuron_code(&nm.reset_code, model, ctx));
                }
            });
        }

        for (i, var) in nm.vars.iter().enumerate() {
            if var.access != VarAccess::ReadWrite {
                continue;
            }
            os.line(&format!(
                "{} = l{};",
                indexed(
                    backend.state_var(&var.name, &pop.name),
                    write_offset(pop.var_queue_required[i]),
                    ctx.id
                ),
                var.name
            ));
        }
        Ok(())
    }

    fn presynaptic_update(
        &mut self,
        os: &mut CodeStream,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &SynapseContext<'_>,
        kind: SpikeKind,
    ) -> CodegenResult<()> {
        let wu = &ctx.projection.wu_model;
        let code = match kind {
            SpikeKind::True => &wu.sim_code,
            SpikeKind::Event => &wu.event_code,
        };
        os.line(&self.synapse_code(code, backend, model, ctx, ctx.accumulation)?);
        Ok(())
    }

    fn event_threshold(
        &mut self,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &SynapseContext<'_>,
    ) -> CodegenResult<String> {
        let condition = ctx.projection.event_threshold_condition.as_deref().unwrap_or("true");
        self.synapse_code(condition, backend, model, ctx, ctx.accumulation)
    }

    fn postsynaptic_learning(
        &mut self,
        os: &mut CodeStream,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &SynapseContext<'_>,
    ) -> CodegenResult<()> {
        let code = &ctx.projection.wu_model.learn_post_code;
        os.line(&self.synapse_code(code, backend, model, ctx, Accumulation::GlobalAtomic)?);
        Ok(())
    }

    fn synapse_dynamics(
        &mut self,
        os: &mut CodeStream,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &SynapseContext<'_>,
    ) -> CodegenResult<()> {
        let code = &ctx.projection.wu_model.synapse_dynamics_code;
        os.line(&self.synapse_code(code, backend, model, ctx, Accumulation::GlobalAtomic)?);
        Ok(())
    }

    fn custom_update(
        &mut self,
        os: &mut CodeStream,
        backend: &dyn KernelBackend,
        model: &FinalizedModel,
        ctx: &CustomUpdateContext<'_>,
    ) -> CodegenResult<()> {
        let cu = ctx.custom_update;
        let cm = cu.model.as_ref();

        let mut code = cm.vars.iter().fold(cm.update_code.clone(), |acc, var| {
            let offset = ctx
                .batch_offset
                .filter(|_| cu.batched && var.access.is_replicated_per_batch());
            substitute(&acc, &var.name, &indexed(backend.state_var(&var.name, &cu.name), offset, ctx.id))
        });

        for var_ref in &cu.var_refs {
            let delayed = match &var_ref.target {
                VarReference::Population { population, var } => {
                    model.population(population)?.is_var_delayed(var)
                }
                VarReference::WeightUpdate { .. } => false,
            };
            let batched = cu.batched && var_ref.target_access.is_replicated_per_batch();
            let offset = match (delayed, batched) {
                (true, true) => ctx.batch_delay_offset,
                (true, false) => ctx.delay_offset,
                (false, true) => ctx.batch_offset,
                (false, false) => None,
            };
            let array = backend.state_var(var_ref.target.var_name(), var_ref.target.target_name());
            code = substitute(&code, &var_ref.slot, &indexed(array, offset, ctx.id));
        }

        code = values(&code, cm, &cu.params, &cu.derived_params, model);
        code = substitute(&code, "t", "t");
        os.line(&code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_with_and_without_offset() {
        assert_eq!(indexed("dd_VPop".to_string(), None, "lid"), "dd_VPop[lid]");
        assert_eq!(
            indexed("dd_VPop".to_string(), Some("readDelayOffset"), "lid"),
            "dd_VPop[readDelayOffset + lid]"
        );
    }
}
