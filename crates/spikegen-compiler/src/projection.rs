// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Projections: directed synaptic connections between two populations

use spikegen_models::code::has_code;
use spikegen_models::{PostsynapticModel, WeightUpdateModel};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::matrix::{Conductance, Connectivity, SpanType, StorageRepresentation, VarLocation};
use crate::plan::{IdRange, KernelKind};

/// A model kind together with the values resolving it
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInstance {
    pub kind: String,
    pub params: Vec<f64>,
    pub var_inits: Vec<f64>,
}

impl ModelInstance {
    pub fn new(kind: impl Into<String>, params: Vec<f64>, var_inits: Vec<f64>) -> Self {
        Self {
            kind: kind.into(),
            params,
            var_inits,
        }
    }
}

/// Arguments of `add_projection`
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionSpec {
    pub name: String,
    pub connectivity: Connectivity,
    pub conductance: Conductance,
    pub delay_steps: u32,
    pub source: String,
    pub target: String,
    pub weight_update: ModelInstance,
    pub postsynaptic: ModelInstance,
}

impl ProjectionSpec {
    pub fn new(
        name: impl Into<String>,
        connectivity: Connectivity,
        conductance: Conductance,
        source: impl Into<String>,
        target: impl Into<String>,
        weight_update: ModelInstance,
        postsynaptic: ModelInstance,
    ) -> Self {
        Self {
            name: name.into(),
            connectivity,
            conductance,
            delay_steps: 0,
            source: source.into(),
            target: target.into(),
            weight_update,
            postsynaptic,
        }
    }

    pub fn with_delay(mut self, delay_steps: u32) -> Self {
        self.delay_steps = delay_steps;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Projection {
    pub name: String,
    pub source: String,
    pub target: String,
    /// Cached endpoint sizes; population sizes never change
    pub source_size: usize,
    pub target_size: usize,

    pub delay_steps: u32,
    /// Delay applied to target (`_post`) state seen by learning code
    pub back_prop_delay_steps: u32,
    pub connectivity: Connectivity,
    pub conductance: Conductance,
    pub storage: StorageRepresentation,
    pub span_type: SpanType,
    /// Longest sparse row; the target size unless narrowed
    pub max_connections: usize,
    pub num_threads_per_spike: usize,

    pub wu_kind: String,
    pub wu_model: Arc<WeightUpdateModel>,
    pub wu_params: Vec<f64>,
    pub wu_var_inits: Vec<f64>,
    pub wu_derived_params: Vec<f64>,
    pub wu_var_locations: Vec<VarLocation>,

    pub ps_kind: String,
    pub ps_model: Arc<PostsynapticModel>,
    pub ps_params: Vec<f64>,
    pub ps_var_inits: Vec<f64>,
    pub ps_derived_params: Vec<f64>,
    pub ps_var_locations: Vec<VarLocation>,

    pub true_spike_required: bool,
    pub spike_event_required: bool,
    pub event_threshold_retest_required: bool,
    /// Substituted event threshold, when the rule has event code
    pub event_threshold_condition: Option<String>,

    pub ranges: BTreeMap<KernelKind, IdRange>,
}

impl Projection {
    /// Units per source row
    pub fn row_stride(&self) -> usize {
        if self.storage.is_sparse() {
            self.max_connections
        } else {
            self.target_size
        }
    }

    /// Synapse slots allocated for the whole matrix
    pub fn synapse_capacity(&self) -> usize {
        self.source_size * self.row_stride()
    }

    pub fn is_post_learning_required(&self) -> bool {
        has_code(&self.wu_model.learn_post_code)
    }

    pub fn is_dynamics_required(&self) -> bool {
        has_code(&self.wu_model.synapse_dynamics_code)
    }

    /// Synaptic kernel kinds this projection contributes to, in step order
    pub fn required_kernels(&self) -> Vec<KernelKind> {
        let mut kinds = Vec::with_capacity(3);
        if has_code(&self.wu_model.sim_code) || has_code(&self.wu_model.event_code) {
            kinds.push(KernelKind::PresynapticUpdate);
        }
        if self.is_post_learning_required() {
            kinds.push(KernelKind::PostsynapticLearning);
        }
        if self.is_dynamics_required() {
            kinds.push(KernelKind::SynapseDynamics);
        }
        kinds
    }

    pub fn range(&self, kind: KernelKind) -> Option<IdRange> {
        self.ranges.get(&kind).copied()
    }

    pub fn wu_var_location(&self, var: &str) -> Option<VarLocation> {
        self.wu_model
            .vars
            .iter()
            .position(|v| v.name == var)
            .map(|i| self.wu_var_locations[i])
    }

    pub fn is_zero_copy_enabled(&self) -> bool {
        self.wu_var_locations.iter().any(VarLocation::is_zero_copy)
            || self.ps_var_locations.iter().any(VarLocation::is_zero_copy)
    }
}
