// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Two-phase model graph
//!
//! A [`ModelGraph`] is open for mutation until [`ModelGraph::finalize`]
//! succeeds, after which every mutating call fails with
//! [`CompileError::AlreadyFinalized`]. A failed finalization leaves the graph
//! open and unchanged.

use spikegen_config::SpikegenConfig;
use spikegen_models::TemplateRegistry;
use tracing::info;

use crate::builder::ModelBuilder;
use crate::custom_update::VarReference;
use crate::error::{CompileError, CompileResult};
use crate::finalized::FinalizedModel;
use crate::projection::ProjectionSpec;

#[derive(Debug, Clone)]
enum Phase {
    Open(Box<ModelBuilder>),
    Finalized(Box<FinalizedModel>),
}

#[derive(Debug, Clone)]
pub struct ModelGraph {
    phase: Phase,
}

impl ModelGraph {
    pub fn new(registry: TemplateRegistry) -> Self {
        Self::from_builder(ModelBuilder::new(registry))
    }

    pub fn with_config(config: &SpikegenConfig, registry: TemplateRegistry) -> Self {
        Self::from_builder(ModelBuilder::with_config(config, registry))
    }

    pub fn from_builder(builder: ModelBuilder) -> Self {
        Self {
            phase: Phase::Open(Box::new(builder)),
        }
    }

    pub fn name(&self) -> &str {
        match &self.phase {
            Phase::Open(builder) => &builder.settings().name,
            Phase::Finalized(model) => model.name(),
        }
    }

    /// Mutable access to the builder while the graph is open
    pub fn builder_mut(&mut self) -> CompileResult<&mut ModelBuilder> {
        match &mut self.phase {
            Phase::Open(builder) => Ok(&mut **builder),
            Phase::Finalized(model) => Err(CompileError::AlreadyFinalized(model.name().to_string())),
        }
    }

    pub fn builder(&self) -> Option<&ModelBuilder> {
        match &self.phase {
            Phase::Open(builder) => Some(&**builder),
            Phase::Finalized(_) => None,
        }
    }

    pub fn add_population(
        &mut self,
        name: &str,
        size: usize,
        kind: &str,
        params: &[f64],
        var_inits: &[f64],
    ) -> CompileResult<()> {
        self.builder_mut()?
            .add_population(name, size, kind, params, var_inits)
    }

    pub fn add_projection(&mut self, spec: ProjectionSpec) -> CompileResult<()> {
        self.builder_mut()?.add_projection(spec)
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
        self.builder_mut()?
            .add_custom_update(name, group, kind, params, var_inits, var_refs)
    }

    /// Finalize in place
    ///
    /// Succeeds at most once. On error the graph remains open and can be
    /// corrected and finalized again.
    pub fn finalize(&mut self) -> CompileResult<()> {
        let model = match &self.phase {
            Phase::Open(builder) => builder.resolve()?,
            Phase::Finalized(model) => {
                return Err(CompileError::AlreadyFinalized(model.name().to_string()))
            }
        };
        info!(target: "spikegen-compiler", "✅ Model graph '{}' is now read-only", model.name());
        self.phase = Phase::Finalized(Box::new(model));
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.phase, Phase::Finalized(_))
    }

    pub fn finalized(&self) -> Option<&FinalizedModel> {
        match &self.phase {
            Phase::Finalized(model) => Some(&**model),
            Phase::Open(_) => None,
        }
    }

    pub fn into_finalized(self) -> Option<FinalizedModel> {
        match self.phase {
            Phase::Finalized(model) => Some(*model),
            Phase::Open(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikegen_models::{NeuronModel, Var, VarAccess};

    fn registry() -> TemplateRegistry {
        let mut registry = TemplateRegistry::new();
        registry
            .register_neuron_model(
                "Poisson",
                NeuronModel {
                    params: vec!["rate".to_string()],
                    vars: vec![Var::new("timeStepToSpike", "scalar", VarAccess::ReadWrite)],
                    ..Default::default()
                },
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_finalize_once() {
        let mut graph = ModelGraph::new(registry());
        graph.add_population("Stim", 10, "Poisson", &[20.0], &[0.0]).unwrap();
        assert!(!graph.is_finalized());

        graph.finalize().unwrap();
        assert!(graph.is_finalized());
        assert!(matches!(graph.finalize(), Err(CompileError::AlreadyFinalized(_))));
        assert!(matches!(
            graph.add_population("More", 1, "Poisson", &[1.0], &[0.0]),
            Err(CompileError::AlreadyFinalized(_))
        ));
        assert_eq!(graph.finalized().unwrap().populations().count(), 1);
    }

    #[test]
    fn test_empty_graph_finalizes() {
        let mut graph = ModelGraph::new(registry());
        graph.finalize().unwrap();
        let model = graph.into_finalized().unwrap();
        assert!(!model.has_projections());
        assert_eq!(model.plan().total_size(crate::KernelKind::NeuronUpdate), 0);
    }
}
