// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Kernel Plan
//!
//! The layout finalization produces: for each kernel kind, the ordered list
//! of entities it dispatches over and the contiguous padded index range each
//! one owns, plus the kernel parameters each kernel takes and which kernel
//! resets the spike counters.
//!
//! ```text
//! presynaptic update kernel
//!   id: 0 ........ 64 ........... 96 ............ 160
//!       |  SynA    |    SynB      |     SynC      |
//! ```

use serde::Serialize;
use spikegen_config::KernelConfig;
use std::collections::BTreeMap;

/// A contiguous, padded slice of a kernel's flat index space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IdRange {
    pub start: usize,
    pub padded_size: usize,
}

impl IdRange {
    pub fn new(start: usize, padded_size: usize) -> Self {
        Self { start, padded_size }
    }

    /// One past the last index
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.padded_size
    }

    #[inline]
    pub fn contains(&self, id: usize) -> bool {
        id >= self.start && id < self.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum KernelKind {
    NeuronUpdate,
    PresynapticUpdate,
    PostsynapticLearning,
    SynapseDynamics,
    CustomUpdate,
}

impl KernelKind {
    pub const ALL: [KernelKind; 5] = [
        KernelKind::NeuronUpdate,
        KernelKind::PresynapticUpdate,
        KernelKind::PostsynapticLearning,
        KernelKind::SynapseDynamics,
        KernelKind::CustomUpdate,
    ];

    /// Kernel kinds projections contribute to, in step order
    pub const SYNAPTIC: [KernelKind; 3] = [
        KernelKind::PresynapticUpdate,
        KernelKind::PostsynapticLearning,
        KernelKind::SynapseDynamics,
    ];

    /// Generated function name
    pub fn kernel_name(&self) -> &'static str {
        match self {
            KernelKind::NeuronUpdate => "updateNeuronsKernel",
            KernelKind::PresynapticUpdate => "updatePresynapticKernel",
            KernelKind::PostsynapticLearning => "learnSynapsesPostKernel",
            KernelKind::SynapseDynamics => "updateSynapseDynamicsKernel",
            KernelKind::CustomUpdate => "customUpdate",
        }
    }

    /// Execution-group width this kind pads to
    pub fn block_size(&self, config: &KernelConfig) -> usize {
        match self {
            KernelKind::NeuronUpdate => config.neuron_update_block_size,
            KernelKind::PresynapticUpdate => config.presynaptic_update_block_size,
            KernelKind::PostsynapticLearning => config.postsynaptic_learning_block_size,
            KernelKind::SynapseDynamics => config.synapse_dynamics_block_size,
            KernelKind::CustomUpdate => config.custom_update_block_size,
        }
    }
}

/// One entity's slot in a kernel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelGroup {
    pub name: String,
    pub range: IdRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelPlan {
    pub neuron_update: Vec<KernelGroup>,
    pub presynaptic_update: Vec<KernelGroup>,
    pub postsynaptic_learning: Vec<KernelGroup>,
    pub synapse_dynamics: Vec<KernelGroup>,
    /// Update-group tag to the custom updates it launches
    pub custom_updates: BTreeMap<String, Vec<KernelGroup>>,
    /// Kernel that clears spike counters and advances delay rings
    pub reset_kernel: KernelKind,
    /// Kernel parameter name to device type, per kernel
    pub kernel_params: BTreeMap<KernelKind, BTreeMap<String, String>>,
    pub block_sizes: BTreeMap<KernelKind, usize>,
    /// Some state lives in host-mapped memory the runtime must allocate
    pub zero_copy: bool,
}

impl KernelPlan {
    pub(crate) fn new(config: &KernelConfig) -> Self {
        Self {
            neuron_update: Vec::new(),
            presynaptic_update: Vec::new(),
            postsynaptic_learning: Vec::new(),
            synapse_dynamics: Vec::new(),
            custom_updates: BTreeMap::new(),
            reset_kernel: KernelKind::NeuronUpdate,
            kernel_params: BTreeMap::new(),
            zero_copy: false,
            block_sizes: KernelKind::ALL
                .iter()
                .map(|kind| (*kind, kind.block_size(config)))
                .collect(),
        }
    }

    /// Groups of a per-model kernel; custom updates are per update group,
    /// see [`KernelPlan::custom_update_groups`]
    pub fn groups(&self, kind: KernelKind) -> &[KernelGroup] {
        match kind {
            KernelKind::NeuronUpdate => &self.neuron_update,
            KernelKind::PresynapticUpdate => &self.presynaptic_update,
            KernelKind::PostsynapticLearning => &self.postsynaptic_learning,
            KernelKind::SynapseDynamics => &self.synapse_dynamics,
            KernelKind::CustomUpdate => &[],
        }
    }

    pub(crate) fn groups_mut(&mut self, kind: KernelKind) -> Option<&mut Vec<KernelGroup>> {
        match kind {
            KernelKind::NeuronUpdate => Some(&mut self.neuron_update),
            KernelKind::PresynapticUpdate => Some(&mut self.presynaptic_update),
            KernelKind::PostsynapticLearning => Some(&mut self.postsynaptic_learning),
            KernelKind::SynapseDynamics => Some(&mut self.synapse_dynamics),
            KernelKind::CustomUpdate => None,
        }
    }

    pub fn custom_update_groups(&self, group: &str) -> &[KernelGroup] {
        self.custom_updates
            .get(group)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of execution units a kernel launches
    pub fn total_size(&self, kind: KernelKind) -> usize {
        self.groups(kind).last().map(|g| g.range.end()).unwrap_or(0)
    }

    pub fn block_size(&self, kind: KernelKind) -> usize {
        self.block_sizes.get(&kind).copied().unwrap_or(0)
    }

    pub(crate) fn add_kernel_param(&mut self, kind: KernelKind, name: String, ty: &str) {
        self.kernel_params
            .entry(kind)
            .or_default()
            .insert(name, ty.to_string());
    }

    /// Kernel parameters for a kernel in name order
    pub fn kernel_params(&self, kind: KernelKind) -> impl Iterator<Item = (&str, &str)> {
        self.kernel_params
            .get(&kind)
            .into_iter()
            .flat_map(|params| params.iter().map(|(n, t)| (n.as_str(), t.as_str())))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        let range = IdRange::new(32, 64);
        assert_eq!(range.end(), 96);
        assert!(range.contains(32));
        assert!(range.contains(95));
        assert!(!range.contains(96));
    }

    #[test]
    fn test_plan_json_has_kernel_keys() {
        let mut plan = KernelPlan::new(&KernelConfig::default());
        plan.neuron_update.push(KernelGroup {
            name: "Pop".to_string(),
            range: IdRange::new(0, 32),
        });
        plan.add_kernel_param(KernelKind::NeuronUpdate, "ratePop".to_string(), "scalar*");

        let json = plan.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["neuron_update"][0]["range"]["padded_size"], 32);
        assert_eq!(value["kernel_params"]["NeuronUpdate"]["ratePop"], "scalar*");
        assert_eq!(value["reset_kernel"], "NeuronUpdate");
        assert_eq!(plan.total_size(KernelKind::NeuronUpdate), 32);
        assert_eq!(plan.total_size(KernelKind::SynapseDynamics), 0);
    }
}
