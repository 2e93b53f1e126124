// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CUDA kernel backend
//!
//! Every kernel is launched over a flat 1-D index space laid out by the
//! kernel plan. Each group owns a padded range, so an execution group
//! (thread block) never straddles two groups and `__syncthreads()` inside a
//! group's dispatch block is uniform. Custom updates add a `blockIdx.y`
//! batch dimension.

use spikegen_compiler::{
    FinalizedModel, KernelGroup, KernelKind, Population, Projection, SpanType,
    StorageRepresentation,
};
use spikegen_config::{CodegenConfig, KernelConfig};
use tracing::{debug, trace};

use super::{
    Accumulation, CustomUpdateContext, KernelBackend, NeuronContext, SpikeKind, SynapseContext,
};
use crate::code_stream::CodeStream;
use crate::error::{CodegenError, CodegenResult};
use crate::handlers::KernelHandlers;

const BACKEND_NAME: &str = "cuda";

/// Single-thread kernel launched before the state update when no synaptic
/// kernel hosts the reset
pub const NEURON_RESET_KERNEL: &str = "preNeuronResetKernel";

/// Delay-ring names a synaptic group declares before its body
struct DelayOffsets {
    pre_slot: Option<String>,
    pre_offset: Option<String>,
    post_slot: Option<String>,
    post_offset: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CudaBackend {
    kernels: KernelConfig,
    var_prefix: String,
}

impl CudaBackend {
    pub fn new(kernels: KernelConfig, var_prefix: impl Into<String>) -> Self {
        Self {
            kernels,
            var_prefix: var_prefix.into(),
        }
    }

    pub fn from_config(kernels: &KernelConfig, codegen: &CodegenConfig) -> Self {
        Self::new(kernels.clone(), codegen.var_prefix.clone())
    }

    pub fn kernel_config(&self) -> &KernelConfig {
        &self.kernels
    }

    /// One thread per target with a register accumulator
    pub fn should_accumulate_in_lin_syn(&self, projection: &Projection) -> bool {
        projection.span_type == SpanType::Postsynaptic
            && matches!(
                projection.storage,
                StorageRepresentation::DenseIndividualG | StorageRepresentation::BitmaskGlobalG
            )
    }

    /// Sparse rows into a target small enough for one block's shared array
    pub fn should_accumulate_in_shared_memory(&self, projection: &Projection) -> bool {
        if self.should_accumulate_in_lin_syn(projection) || !projection.storage.is_sparse() {
            return false;
        }
        if projection.target_size > self.kernels.presynaptic_update_block_size {
            return false;
        }
        projection.span_type == SpanType::Postsynaptic || self.kernels.shared_atomics_native
    }

    fn spike_ptr(&self, population: &Population) -> String {
        self.state_var("spkQuePtr", &population.name)
    }

    fn signature(&self, model: &FinalizedModel, kind: KernelKind, name: &str) -> String {
        let scalar = model.precision().type_name();
        let params: Vec<String> = std::iter::once(format!("{} t", scalar))
            .chain(
                model
                    .plan()
                    .kernel_params(kind)
                    .map(|(param, ty)| format!("{} {}", ty.replace("scalar", scalar), param)),
            )
            .collect();
        format!("extern \"C\" __global__ void {}({})", name, params.join(", "))
    }

    fn gen_thread_id(&self, os: &mut CodeStream, model: &FinalizedModel, kind: KernelKind) {
        os.line(&format!(
            "const unsigned int id = {} * blockIdx.x + threadIdx.x;",
            model.plan().block_size(kind)
        ));
    }

    /// Zero this step's spike counters and advance every delay ring
    fn gen_reset(&self, os: &mut CodeStream, model: &FinalizedModel) {
        for pop in model.populations() {
            let kinds: Vec<SpikeKind> = if pop.spike_event_required {
                vec![SpikeKind::True, SpikeKind::Event]
            } else {
                vec![SpikeKind::True]
            };

            if pop.is_delay_required() {
                let ptr = self.spike_ptr(pop);
                os.line(&format!("{ptr} = ({ptr} + 1) % {};", pop.num_delay_slots));
                for kind in kinds {
                    os.line(&format!(
                        "{}[{}] = 0;",
                        self.state_var(&format!("glbSpkCnt{}", kind.suffix()), &pop.name),
                        ptr
                    ));
                }
            } else {
                for kind in kinds {
                    os.line(&format!(
                        "{}[0] = 0;",
                        self.state_var(&format!("glbSpkCnt{}", kind.suffix()), &pop.name)
                    ));
                }
            }
        }
    }

    /// Block-completion counter of the kernel hosting the reset
    fn done_counter(&self) -> String {
        format!("{}done", self.var_prefix)
    }

    fn gen_done_counter_decl(&self, os: &mut CodeStream, model: &FinalizedModel, kind: KernelKind) {
        if model.plan().reset_kernel == kind {
            os.line(&format!("__device__ unsigned int {};", self.done_counter()));
        }
    }

    /// Reset at the end of a synaptic kernel, run by the last block to
    /// finish so no block still reads this step's counters or ring pointers
    fn gen_reset_if_placed(&self, os: &mut CodeStream, model: &FinalizedModel, kind: KernelKind) {
        if model.plan().reset_kernel != kind {
            return;
        }
        debug!(target: "spikegen-codegen", "Spike reset placed in {}", kind.kernel_name());
        let done = self.done_counter();
        os.line("// reset spike counters and advance delay queues once every block is done");
        os.line("__threadfence();");
        os.line("__syncthreads();");
        os.block("if (threadIdx.x == 0)", |os| {
            os.line(&format!("const unsigned int j = atomicAdd(&{}, 1);", done));
            os.block("if (j == gridDim.x - 1)", |os| {
                self.gen_reset(os, model);
                os.line(&format!("{} = 0;", done));
            });
        });
    }

    fn gen_emit_spike(
        &self,
        os: &mut CodeStream,
        population: &Population,
        neuron_id: &str,
        kind: SpikeKind,
    ) {
        let sfx = kind.suffix();
        let count = self.state_var(&format!("glbSpkCnt{}", sfx), &population.name);
        let spikes = self.state_var(&format!("glbSpk{}", sfx), &population.name);
        if population.is_delay_required() {
            os.line(&format!(
                "const unsigned int spk{}Idx = atomicAdd(&{}[{}], 1);",
                sfx,
                count,
                self.spike_ptr(population)
            ));
            os.line(&format!(
                "{}[writeDelayOffset + spk{}Idx] = {};",
                spikes, sfx, neuron_id
            ));
        } else {
            os.line(&format!("const unsigned int spk{}Idx = atomicAdd(&{}[0], 1);", sfx, count));
            os.line(&format!("{}[spk{}Idx] = {};", spikes, sfx, neuron_id));
        }
    }

    /// Open `if(id >= start && id < end)`, rebase to `lid` and run `body`
    fn gen_group<F>(&self, os: &mut CodeStream, group: &KernelGroup, body: F) -> CodegenResult<()>
    where
        F: FnOnce(&mut CodeStream) -> CodegenResult<()>,
    {
        trace!(
            target: "spikegen-codegen",
            "Dispatch '{}' over [{}, {})",
            group.name,
            group.range.start,
            group.range.end()
        );
        os.line(&format!("// {}", group.name));
        os.try_block(
            &format!("if(id >= {} && id < {})", group.range.start, group.range.end()),
            |os| {
                os.line(&format!("const unsigned int lid = id - {};", group.range.start));
                body(os)
            },
        )?;
        Ok(())
    }

    /// Read slots for `_pre` state (axonal delay) and `_post` state
    /// (back-propagation delay)
    fn gen_synapse_delays(
        &self,
        os: &mut CodeStream,
        projection: &Projection,
        source: &Population,
        target: &Population,
    ) -> DelayOffsets {
        let mut offsets = DelayOffsets {
            pre_slot: None,
            pre_offset: None,
            post_slot: None,
            post_offset: None,
        };
        if source.is_delay_required() {
            os.line(&format!(
                "const unsigned int preReadDelaySlot = ({} + {}) % {};",
                self.spike_ptr(source),
                source.num_delay_slots - projection.delay_steps,
                source.num_delay_slots
            ));
            os.line(&format!(
                "const unsigned int preReadDelayOffset = preReadDelaySlot * {};",
                source.size
            ));
            offsets.pre_slot = Some("preReadDelaySlot".to_string());
            offsets.pre_offset = Some("preReadDelayOffset".to_string());
        }
        if target.is_delay_required() {
            os.line(&format!(
                "const unsigned int postReadDelaySlot = ({} + {}) % {};",
                self.spike_ptr(target),
                target.num_delay_slots - projection.back_prop_delay_steps,
                target.num_delay_slots
            ));
            os.line(&format!(
                "const unsigned int postReadDelayOffset = postReadDelaySlot * {};",
                target.size
            ));
            offsets.post_slot = Some("postReadDelaySlot".to_string());
            offsets.post_offset = Some("postReadDelayOffset".to_string());
        }
        offsets
    }

    /// Body of one synapse, wrapped in the event re-test when required
    fn gen_synapse_body(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        ctx: &SynapseContext<'_>,
        kind: SpikeKind,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()> {
        if kind == SpikeKind::Event && ctx.projection.event_threshold_retest_required {
            let condition = handlers.event_threshold(self, model, ctx)?;
            os.try_block(&format!("if ({})", condition), |os| {
                handlers.presynaptic_update(os, self, model, ctx, kind)
            })?;
            Ok(())
        } else {
            handlers.presynaptic_update(os, self, model, ctx, kind)
        }
    }

    /// Postsynaptic span: each thread owns a target (or row slot) and walks
    /// the source's spikes staged block-wise through shared memory
    fn gen_post_span(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        ctx: SynapseContext<'_>,
        kind: SpikeKind,
        delays: &DelayOffsets,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()> {
        let proj = ctx.projection;
        let source = ctx.source;
        let block = model.plan().block_size(KernelKind::PresynapticUpdate);
        let sfx = kind.suffix();
        let slot = delays.pre_slot.as_deref().unwrap_or("0");
        let spikes = self.state_var(&format!("glbSpk{}", sfx), &source.name);
        let spike_index = match &delays.pre_offset {
            Some(offset) => format!("{} + (r * {}) + threadIdx.x", offset, block),
            None => format!("(r * {}) + threadIdx.x", block),
        };

        os.try_block("", |os| {
            os.line(&format!(
                "const unsigned int numSpikes = {}[{}];",
                self.state_var(&format!("glbSpkCnt{}", sfx), &source.name),
                slot
            ));
            os.line(&format!(
                "const unsigned int numSpikeBlocks = (numSpikes + {} - 1) / {};",
                block, block
            ));
            os.try_block("for (unsigned int r = 0; r < numSpikeBlocks; r++)", |os| {
                os.line(&format!(
                    "const unsigned int numSpikesInBlock = (r == numSpikeBlocks - 1) ? ((numSpikes - 1) % {}) + 1 : {};",
                    block, block
                ));
                os.line("__syncthreads();");
                os.block("if (threadIdx.x < numSpikesInBlock)", |os| {
                    os.line(&format!("shSpk{}[threadIdx.x] = {}[{}];", sfx, spikes, spike_index));
                });
                os.line("__syncthreads();");

                os.line("// loop through all incoming spikes");
                os.try_block("for (unsigned int j = 0; j < numSpikesInBlock; j++)", |os| {
                    os.line(&format!("const unsigned int ipre = shSpk{}[j];", sfx));
                    match proj.storage {
                        StorageRepresentation::SparseIndividualG
                        | StorageRepresentation::SparseGlobalG => {
                            os.try_block(
                                &format!("if (lid < {}[ipre])", self.state_var("rowLength", &proj.name)),
                                |os| {
                                    os.line(&format!(
                                        "const unsigned int synAddress = (ipre * {}) + lid;",
                                        proj.max_connections
                                    ));
                                    os.line(&format!(
                                        "const unsigned int ipost = {}[synAddress];",
                                        self.state_var("ind", &proj.name)
                                    ));
                                    self.gen_synapse_body(os, model, &ctx, kind, handlers)
                                },
                            )?;
                        }
                        StorageRepresentation::BitmaskGlobalG => {
                            os.try_block(&format!("if (lid < {})", proj.target_size), |os| {
                                os.line(&format!(
                                    "const uint64_t gid = (ipre * (uint64_t){}) + lid;",
                                    proj.target_size
                                ));
                                os.try_block(
                                    &format!("if (B({}[gid / 32], gid & 31))", self.state_var("gp", &proj.name)),
                                    |os| {
                                        os.line("const unsigned int ipost = lid;");
                                        let ctx = SynapseContext { syn_address: "gid", ..ctx };
                                        self.gen_synapse_body(os, model, &ctx, kind, handlers)
                                    },
                                )?;
                                Ok(())
                            })?;
                        }
                        StorageRepresentation::DenseIndividualG => {
                            os.try_block(&format!("if (lid < {})", proj.target_size), |os| {
                                os.line(&format!(
                                    "const unsigned int synAddress = (ipre * {}) + lid;",
                                    proj.target_size
                                ));
                                os.line("const unsigned int ipost = lid;");
                                self.gen_synapse_body(os, model, &ctx, kind, handlers)
                            })?;
                        }
                    }
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(())
    }

    /// Presynaptic span: `num_threads_per_spike` threads share one spike and
    /// stride through its row
    fn gen_pre_span(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        ctx: SynapseContext<'_>,
        kind: SpikeKind,
        delays: &DelayOffsets,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()> {
        let proj = ctx.projection;
        let source = ctx.source;
        let threads = proj.num_threads_per_spike;
        let sfx = kind.suffix();
        let slot = delays.pre_slot.as_deref().unwrap_or("0");
        let spike_index = match &delays.pre_offset {
            Some(offset) => format!("{} + spike", offset),
            None => "spike".to_string(),
        };

        os.try_block("", |os| {
            os.line(&format!("const unsigned int spike = lid / {};", threads));
            os.line(&format!("const unsigned int thread = lid % {};", threads));
            os.line(&format!(
                "const unsigned int numSpikes = {}[{}];",
                self.state_var(&format!("glbSpkCnt{}", sfx), &source.name),
                slot
            ));
            os.try_block("if (spike < numSpikes)", |os| {
                os.line(&format!(
                    "const unsigned int ipre = {}[{}];",
                    self.state_var(&format!("glbSpk{}", sfx), &source.name),
                    spike_index
                ));
                let row_length = if proj.storage.is_sparse() {
                    os.line(&format!(
                        "const unsigned int npost = {}[ipre];",
                        self.state_var("rowLength", &proj.name)
                    ));
                    "npost".to_string()
                } else {
                    proj.target_size.to_string()
                };
                os.try_block(
                    &format!(
                        "for (unsigned int j = thread; j < {}; j += {})",
                        row_length, threads
                    ),
                    |os| match proj.storage {
                        StorageRepresentation::SparseIndividualG
                        | StorageRepresentation::SparseGlobalG => {
                            os.line(&format!(
                                "const unsigned int synAddress = (ipre * {}) + j;",
                                proj.max_connections
                            ));
                            os.line(&format!(
                                "const unsigned int ipost = {}[synAddress];",
                                self.state_var("ind", &proj.name)
                            ));
                            self.gen_synapse_body(os, model, &ctx, kind, handlers)
                        }
                        StorageRepresentation::BitmaskGlobalG => {
                            os.line(&format!(
                                "const uint64_t gid = (ipre * (uint64_t){}) + j;",
                                proj.target_size
                            ));
                            os.try_block(
                                &format!("if (B({}[gid / 32], gid & 31))", self.state_var("gp", &proj.name)),
                                |os| {
                                    os.line("const unsigned int ipost = j;");
                                    let ctx = SynapseContext { syn_address: "gid", ..ctx };
                                    self.gen_synapse_body(os, model, &ctx, kind, handlers)
                                },
                            )?;
                            Ok(())
                        }
                        StorageRepresentation::DenseIndividualG => {
                            os.line(&format!(
                                "const unsigned int synAddress = (ipre * {}) + j;",
                                proj.target_size
                            ));
                            os.line("const unsigned int ipost = j;");
                            self.gen_synapse_body(os, model, &ctx, kind, handlers)
                        }
                    },
                )?;
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(())
    }

    fn unsupported(&self, what: String) -> CodegenError {
        CodegenError::Unsupported {
            backend: BACKEND_NAME.to_string(),
            what,
        }
    }
}

impl KernelBackend for CudaBackend {
    fn backend_name(&self) -> &str {
        BACKEND_NAME
    }

    fn var_prefix(&self) -> &str {
        &self.var_prefix
    }

    fn accumulation(&self, projection: &Projection) -> Accumulation {
        if self.should_accumulate_in_lin_syn(projection) {
            Accumulation::LinSyn
        } else if self.should_accumulate_in_shared_memory(projection) {
            Accumulation::SharedMemory
        } else {
            Accumulation::GlobalAtomic
        }
    }

    fn add_to_in_syn(&self, accumulation: Accumulation, projection: &Projection, post_idx: &str) -> String {
        match accumulation {
            Accumulation::LinSyn => "linSyn += $(0)".to_string(),
            Accumulation::SharedMemory => format!("atomicAdd(&shLg[{}], $(0))", post_idx),
            Accumulation::GlobalAtomic => format!(
                "atomicAdd(&{}[{}], $(0))",
                self.state_var("inSyn", &projection.name),
                post_idx
            ),
        }
    }

    fn gen_neuron_update_kernel(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()> {
        let kind = KernelKind::NeuronUpdate;
        os.try_block(&self.signature(model, kind, kind.kernel_name()), |os| {
            self.gen_thread_id(os, model, kind);
            os.blank();

            for group in model.plan().groups(kind) {
                let pop = model.population(&group.name)?;
                self.gen_group(os, group, |os| {
                    let delayed = pop.is_delay_required();
                    if delayed {
                        let ptr = self.spike_ptr(pop);
                        os.line(&format!(
                            "const unsigned int readDelayOffset = (({} + {}) % {}) * {};",
                            ptr,
                            pop.num_delay_slots - 1,
                            pop.num_delay_slots,
                            pop.size
                        ));
                        os.line(&format!("const unsigned int writeDelayOffset = {} * {};", ptr, pop.size));
                    }
                    let ctx = NeuronContext {
                        population: pop,
                        id: "lid",
                        read_delay_offset: delayed.then_some("readDelayOffset"),
                        write_delay_offset: delayed.then_some("writeDelayOffset"),
                    };
                    os.try_block(&format!("if (lid < {})", pop.size), |os| {
                        handlers.neuron_update(os, self, model, &ctx)
                    })?;
                    Ok(())
                })?;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn gen_neuron_reset_kernel(&self, os: &mut CodeStream, model: &FinalizedModel) -> CodegenResult<()> {
        debug!(target: "spikegen-codegen", "Spike reset placed in {}", NEURON_RESET_KERNEL);
        os.try_block(
            &format!("extern \"C\" __global__ void {}()", NEURON_RESET_KERNEL),
            |os| {
                self.gen_thread_id(os, model, KernelKind::NeuronUpdate);
                os.block("if (id == 0)", |os| self.gen_reset(os, model));
                Ok(())
            },
        )?;
        Ok(())
    }

    fn gen_presynaptic_update_kernel(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()> {
        let kind = KernelKind::PresynapticUpdate;
        let block = model.plan().block_size(kind);
        let groups = model.plan().groups(kind);
        let scalar = model.precision().type_name();

        let mut projections = Vec::with_capacity(groups.len());
        for group in groups {
            projections.push(model.projection(&group.name)?);
        }
        let post_span: Vec<&Projection> = projections
            .iter()
            .copied()
            .filter(|p| p.span_type == SpanType::Postsynaptic)
            .collect();

        if projections.iter().any(|p| p.storage.is_bitmask()) {
            os.line("#define B(x, i) ((x) & (0x80000000 >> (i)))");
        }
        self.gen_done_counter_decl(os, model, kind);
        os.try_block(&self.signature(model, kind, kind.kernel_name()), |os| {
            self.gen_thread_id(os, model, kind);
            if post_span.iter().any(|p| p.true_spike_required) {
                os.line(&format!("__shared__ unsigned int shSpk[{}];", block));
            }
            if post_span.iter().any(|p| p.spike_event_required) {
                os.line(&format!("__shared__ unsigned int shSpkEvnt[{}];", block));
            }
            if projections.iter().any(|p| self.should_accumulate_in_shared_memory(p)) {
                os.line(&format!("__shared__ {} shLg[{}];", scalar, block));
            }
            os.blank();

            for (group, &proj) in groups.iter().zip(&projections) {
                let source = model.population(&proj.source)?;
                let target = model.population(&proj.target)?;
                let accumulation = self.accumulation(proj);
                debug!(
                    target: "spikegen-codegen",
                    "Presynaptic update '{}': {:?} span, {:?} accumulation",
                    proj.name,
                    proj.span_type,
                    accumulation
                );

                self.gen_group(os, group, |os| {
                    let delays = self.gen_synapse_delays(os, proj, source, target);
                    match accumulation {
                        Accumulation::LinSyn => {
                            os.line(&format!("{} linSyn = 0;", scalar));
                        }
                        Accumulation::SharedMemory => {
                            os.block(&format!("if (threadIdx.x < {})", target.size), |os| {
                                os.line("shLg[threadIdx.x] = 0;");
                            });
                            os.line("__syncthreads();");
                        }
                        Accumulation::GlobalAtomic => {}
                    }

                    let ctx = SynapseContext {
                        projection: proj,
                        source,
                        target,
                        pre_idx: "ipre",
                        post_idx: "ipost",
                        syn_address: "synAddress",
                        accumulation,
                        pre_delay_offset: delays.pre_offset.as_deref(),
                        post_delay_offset: delays.post_offset.as_deref(),
                    };
                    let mut kinds = Vec::with_capacity(2);
                    if proj.spike_event_required {
                        kinds.push(SpikeKind::Event);
                    }
                    if proj.true_spike_required {
                        kinds.push(SpikeKind::True);
                    }
                    for spike_kind in kinds {
                        os.line(&format!("// process presynaptic {:?} spikes", spike_kind));
                        match proj.span_type {
                            SpanType::Postsynaptic => {
                                self.gen_post_span(os, model, ctx, spike_kind, &delays, handlers)?
                            }
                            SpanType::Presynaptic => {
                                self.gen_pre_span(os, model, ctx, spike_kind, &delays, handlers)?
                            }
                        }
                    }

                    match accumulation {
                        Accumulation::LinSyn => {
                            os.line("// copy linSyn back to global memory");
                            os.block(&format!("if (lid < {})", target.size), |os| {
                                os.line(&format!("{}[lid] += linSyn;", self.state_var("inSyn", &proj.name)));
                            });
                        }
                        Accumulation::SharedMemory => {
                            os.line("__syncthreads();");
                            os.block(&format!("if (threadIdx.x < {})", target.size), |os| {
                                os.line(&format!(
                                    "atomicAdd(&{}[threadIdx.x], shLg[threadIdx.x]);",
                                    self.state_var("inSyn", &proj.name)
                                ));
                            });
                        }
                        Accumulation::GlobalAtomic => {}
                    }
                    Ok(())
                })?;
            }

            self.gen_reset_if_placed(os, model, kind);
            Ok(())
        })?;
        Ok(())
    }

    fn gen_postsynaptic_learning_kernel(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()> {
        let kind = KernelKind::PostsynapticLearning;
        let block = model.plan().block_size(kind);

        self.gen_done_counter_decl(os, model, kind);
        os.try_block(&self.signature(model, kind, kind.kernel_name()), |os| {
            self.gen_thread_id(os, model, kind);
            os.line(&format!("__shared__ unsigned int shSpk[{}];", block));
            os.blank();

            for group in model.plan().groups(kind) {
                let proj = model.projection(&group.name)?;
                if proj.storage.is_bitmask() {
                    return Err(self.unsupported(format!(
                        "postsynaptic learning on bitmask projection '{}'",
                        proj.name
                    )));
                }
                let source = model.population(&proj.source)?;
                let target = model.population(&proj.target)?;

                self.gen_group(os, group, |os| {
                    let delays = self.gen_synapse_delays(os, proj, source, target);
                    let slot = delays.post_slot.as_deref().unwrap_or("0");
                    let spike_index = match &delays.post_offset {
                        Some(offset) => format!("{} + (r * {}) + threadIdx.x", offset, block),
                        None => format!("(r * {}) + threadIdx.x", block),
                    };
                    let ctx = SynapseContext {
                        projection: proj,
                        source,
                        target,
                        pre_idx: "ipre",
                        post_idx: "ipost",
                        syn_address: "synAddress",
                        accumulation: Accumulation::GlobalAtomic,
                        pre_delay_offset: delays.pre_offset.as_deref(),
                        post_delay_offset: delays.post_offset.as_deref(),
                    };

                    os.line(&format!(
                        "const unsigned int numSpikes = {}[{}];",
                        self.state_var("glbSpkCnt", &target.name),
                        slot
                    ));
                    os.line(&format!(
                        "const unsigned int numSpikeBlocks = (numSpikes + {} - 1) / {};",
                        block, block
                    ));
                    os.try_block("for (unsigned int r = 0; r < numSpikeBlocks; r++)", |os| {
                        os.line(&format!(
                            "const unsigned int numSpikesInBlock = (r == numSpikeBlocks - 1) ? ((numSpikes - 1) % {}) + 1 : {};",
                            block, block
                        ));
                        os.line("__syncthreads();");
                        os.block("if (threadIdx.x < numSpikesInBlock)", |os| {
                            os.line(&format!(
                                "shSpk[threadIdx.x] = {}[{}];",
                                self.state_var("glbSpk", &target.name),
                                spike_index
                            ));
                        });
                        os.line("__syncthreads();");
                        os.line("// only work on existing neurons");
                        os.try_block("for (unsigned int j = 0; j < numSpikesInBlock; j++)", |os| {
                            os.line("const unsigned int ipost = shSpk[j];");
                            if proj.storage.is_sparse() {
                                os.try_block(
                                    &format!("if (lid < {}[ipost])", self.state_var("colLength", &proj.name)),
                                    |os| {
                                        os.line(&format!(
                                            "const unsigned int synAddress = {}[(ipost * {}) + lid];",
                                            self.state_var("remap", &proj.name),
                                            source.size
                                        ));
                                        os.line(&format!(
                                            "const unsigned int ipre = synAddress / {};",
                                            proj.max_connections
                                        ));
                                        handlers.postsynaptic_learning(os, self, model, &ctx)
                                    },
                                )?;
                            } else {
                                os.try_block(&format!("if (lid < {})", source.size), |os| {
                                    os.line(&format!(
                                        "const unsigned int synAddress = (lid * {}) + ipost;",
                                        target.size
                                    ));
                                    os.line("const unsigned int ipre = lid;");
                                    handlers.postsynaptic_learning(os, self, model, &ctx)
                                })?;
                            }
                            Ok(())
                        })?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
            }

            self.gen_reset_if_placed(os, model, kind);
            Ok(())
        })?;
        Ok(())
    }

    fn gen_synapse_dynamics_kernel(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()> {
        let kind = KernelKind::SynapseDynamics;

        self.gen_done_counter_decl(os, model, kind);
        os.try_block(&self.signature(model, kind, kind.kernel_name()), |os| {
            self.gen_thread_id(os, model, kind);
            os.blank();

            for group in model.plan().groups(kind) {
                let proj = model.projection(&group.name)?;
                if proj.storage.is_bitmask() {
                    return Err(self.unsupported(format!(
                        "synapse dynamics on bitmask projection '{}'",
                        proj.name
                    )));
                }
                let source = model.population(&proj.source)?;
                let target = model.population(&proj.target)?;

                self.gen_group(os, group, |os| {
                    let delays = self.gen_synapse_delays(os, proj, source, target);
                    let ctx = SynapseContext {
                        projection: proj,
                        source,
                        target,
                        pre_idx: "ipre",
                        post_idx: "ipost",
                        syn_address: "lid",
                        accumulation: Accumulation::GlobalAtomic,
                        pre_delay_offset: delays.pre_offset.as_deref(),
                        post_delay_offset: delays.post_offset.as_deref(),
                    };

                    os.try_block(&format!("if (lid < {})", proj.synapse_capacity()), |os| {
                        if proj.storage.is_sparse() {
                            os.line(&format!("const unsigned int ipre = lid / {};", proj.max_connections));
                            os.try_block(
                                &format!(
                                    "if ((lid % {}) < {}[ipre])",
                                    proj.max_connections,
                                    self.state_var("rowLength", &proj.name)
                                ),
                                |os| {
                                    os.line(&format!(
                                        "const unsigned int ipost = {}[lid];",
                                        self.state_var("ind", &proj.name)
                                    ));
                                    handlers.synapse_dynamics(os, self, model, &ctx)
                                },
                            )?;
                            Ok(())
                        } else {
                            os.line(&format!("const unsigned int ipre = lid / {};", target.size));
                            os.line(&format!("const unsigned int ipost = lid % {};", target.size));
                            handlers.synapse_dynamics(os, self, model, &ctx)
                        }
                    })?;
                    Ok(())
                })?;
            }

            self.gen_reset_if_placed(os, model, kind);
            Ok(())
        })?;
        Ok(())
    }

    fn gen_custom_update_kernel(
        &self,
        os: &mut CodeStream,
        model: &FinalizedModel,
        group: &str,
        handlers: &mut dyn KernelHandlers,
    ) -> CodegenResult<()> {
        let kind = KernelKind::CustomUpdate;
        let groups = model.plan().custom_update_groups(group);
        let mut updates = Vec::with_capacity(groups.len());
        for g in groups {
            updates.push(model.custom_update(&g.name)?);
        }

        let name = format!("{}{}", kind.kernel_name(), group);
        os.try_block(&self.signature(model, kind, &name), |os| {
            self.gen_thread_id(os, model, kind);
            if updates.iter().any(|cu| cu.batched) {
                os.line("const unsigned int batch = blockIdx.y;");
            }
            os.blank();

            for (g, &cu) in groups.iter().zip(&updates) {
                let delay_population = match &cu.delay_population {
                    Some(name) => Some(model.population(name)?),
                    None => None,
                };

                self.gen_group(os, g, |os| {
                    if cu.batched {
                        os.line(&format!("const unsigned int batchOffset = batch * {};", cu.size));
                    }
                    if let Some(pop) = delay_population {
                        os.line(&format!(
                            "const unsigned int delayOffset = {} * {};",
                            self.spike_ptr(pop),
                            cu.size
                        ));
                        if cu.batched {
                            os.line(&format!(
                                "const unsigned int batchDelayOffset = delayOffset + (batchOffset * {});",
                                pop.num_delay_slots
                            ));
                        }
                    }
                    let delayed = delay_population.is_some();
                    let ctx = CustomUpdateContext {
                        custom_update: cu,
                        id: "lid",
                        batch_offset: cu.batched.then_some("batchOffset"),
                        delay_offset: delayed.then_some("delayOffset"),
                        batch_delay_offset: (delayed && cu.batched).then_some("batchDelayOffset"),
                    };
                    os.try_block(&format!("if (lid < {})", cu.size), |os| {
                        handlers.custom_update(os, self, model, &ctx)
                    })?;
                    Ok(())
                })?;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn gen_emit_true_spike(&self, os: &mut CodeStream, population: &Population, neuron_id: &str) {
        self.gen_emit_spike(os, population, neuron_id, SpikeKind::True);
    }

    fn gen_emit_spike_like_event(&self, os: &mut CodeStream, population: &Population, neuron_id: &str) {
        self.gen_emit_spike(os, population, neuron_id, SpikeKind::Event);
    }

    fn gen_record_spike_time(&self, os: &mut CodeStream, population: &Population, neuron_id: &str) {
        let spike_times = self.state_var("sT", &population.name);
        if population.is_delay_required() {
            os.line(&format!("{}[writeDelayOffset + {}] = t;", spike_times, neuron_id));
        } else {
            os.line(&format!("{}[{}] = t;", spike_times, neuron_id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_uses_prefix() {
        let codegen = CodegenConfig {
            var_prefix: "d_".to_string(),
        };
        let backend = CudaBackend::from_config(&KernelConfig::default(), &codegen);
        assert_eq!(backend.backend_name(), "cuda");
        assert_eq!(backend.state_var("inSyn", "Syn"), "d_inSynSyn");
    }
}
