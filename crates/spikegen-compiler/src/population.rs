// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Populations: named groups of units sharing one neuron model

use spikegen_models::{NeuronModel, TemplateShape};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::matrix::VarLocation;
use crate::plan::IdRange;

/// A substituted event-threshold predicate contributed by one outgoing projection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpikeEventCondition {
    pub code: String,
    /// Namespace holding the projection's support code, if it has any
    pub support_code_namespace: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Population {
    pub name: String,
    pub size: usize,
    pub model_kind: String,
    pub model: Arc<NeuronModel>,
    pub params: Vec<f64>,
    pub var_inits: Vec<f64>,
    pub derived_params: Vec<f64>,

    /// Ring length of spikes and queued variables; 1 means no delay
    pub num_delay_slots: u32,
    pub true_spike_required: bool,
    pub spike_event_required: bool,
    pub spike_time_required: bool,

    pub spike_location: VarLocation,
    pub spike_event_location: VarLocation,
    pub spike_time_location: VarLocation,
    pub var_locations: Vec<VarLocation>,
    pub var_queue_required: Vec<bool>,

    pub out_projections: BTreeSet<String>,
    pub in_projections: BTreeSet<String>,
    pub spike_event_conditions: BTreeSet<SpikeEventCondition>,

    /// Slot in the neuron update kernel
    pub id_range: IdRange,
}

impl Population {
    pub(crate) fn new(
        name: &str,
        size: usize,
        model_kind: &str,
        model: Arc<NeuronModel>,
        params: Vec<f64>,
        var_inits: Vec<f64>,
    ) -> Self {
        let num_vars = model.vars.len();
        Self {
            name: name.to_string(),
            size,
            model_kind: model_kind.to_string(),
            model,
            params,
            var_inits,
            derived_params: Vec::new(),
            num_delay_slots: 1,
            true_spike_required: false,
            spike_event_required: false,
            spike_time_required: false,
            spike_location: VarLocation::Device,
            spike_event_location: VarLocation::Device,
            spike_time_location: VarLocation::Device,
            var_locations: vec![VarLocation::Device; num_vars],
            var_queue_required: vec![false; num_vars],
            out_projections: BTreeSet::new(),
            in_projections: BTreeSet::new(),
            spike_event_conditions: BTreeSet::new(),
            id_range: IdRange::default(),
        }
    }

    pub(crate) fn var_index(&self, var: &str) -> Option<usize> {
        self.model.vars.iter().position(|v| v.name == var)
    }

    #[inline]
    pub fn is_delay_required(&self) -> bool {
        self.num_delay_slots > 1
    }

    pub fn is_var_queue_required(&self, var: &str) -> bool {
        self.var_index(var)
            .map(|i| self.var_queue_required[i])
            .unwrap_or(false)
    }

    /// Queued and actually backed by more than one slot
    pub fn is_var_delayed(&self, var: &str) -> bool {
        self.is_delay_required() && self.is_var_queue_required(var)
    }

    pub fn var_location(&self, var: &str) -> Option<VarLocation> {
        self.var_index(var).map(|i| self.var_locations[i])
    }

    pub fn derived_param(&self, name: &str) -> Option<f64> {
        self.model
            .derived_params()
            .iter()
            .position(|d| d.name == name)
            .and_then(|i| self.derived_params.get(i).copied())
    }

    pub fn is_zero_copy_enabled(&self) -> bool {
        self.spike_location.is_zero_copy()
            || self.spike_event_location.is_zero_copy()
            || self.spike_time_location.is_zero_copy()
            || self.var_locations.iter().any(VarLocation::is_zero_copy)
    }

    pub(crate) fn require_delay_slots(&mut self, slots: u32) {
        self.num_delay_slots = self.num_delay_slots.max(slots);
    }
}
