// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Read-only catalog of model templates keyed by kind name
//!
//! The compiler never owns a built-in catalog: front ends register the
//! templates they need and hand the registry to the model builder.

use ahash::AHashMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::templates::{CustomUpdateModel, NeuronModel, PostsynapticModel, WeightUpdateModel};
use crate::{ModelError, ModelResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TemplateCategory {
    Neuron,
    WeightUpdate,
    Postsynaptic,
    CustomUpdate,
}

impl fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TemplateCategory::Neuron => "neuron",
            TemplateCategory::WeightUpdate => "weight update",
            TemplateCategory::Postsynaptic => "postsynaptic",
            TemplateCategory::CustomUpdate => "custom update",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    neuron_models: AHashMap<String, Arc<NeuronModel>>,
    weight_update_models: AHashMap<String, Arc<WeightUpdateModel>>,
    postsynaptic_models: AHashMap<String, Arc<PostsynapticModel>>,
    custom_update_models: AHashMap<String, Arc<CustomUpdateModel>>,
}

fn insert<T>(
    map: &mut AHashMap<String, Arc<T>>,
    category: TemplateCategory,
    name: &str,
    model: T,
) -> ModelResult<()> {
    if map.contains_key(name) {
        return Err(ModelError::DuplicateTemplate {
            category,
            name: name.to_string(),
        });
    }
    debug!(target: "spikegen-models", "Registered {} template '{}'", category, name);
    map.insert(name.to_string(), Arc::new(model));
    Ok(())
}

fn lookup<T>(
    map: &AHashMap<String, Arc<T>>,
    category: TemplateCategory,
    name: &str,
) -> ModelResult<Arc<T>> {
    map.get(name)
        .cloned()
        .ok_or_else(|| ModelError::UnknownTemplate {
            category,
            name: name.to_string(),
        })
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_neuron_model(&mut self, name: &str, model: NeuronModel) -> ModelResult<()> {
        insert(&mut self.neuron_models, TemplateCategory::Neuron, name, model)
    }

    pub fn register_weight_update_model(
        &mut self,
        name: &str,
        model: WeightUpdateModel,
    ) -> ModelResult<()> {
        insert(
            &mut self.weight_update_models,
            TemplateCategory::WeightUpdate,
            name,
            model,
        )
    }

    pub fn register_postsynaptic_model(
        &mut self,
        name: &str,
        model: PostsynapticModel,
    ) -> ModelResult<()> {
        insert(
            &mut self.postsynaptic_models,
            TemplateCategory::Postsynaptic,
            name,
            model,
        )
    }

    pub fn register_custom_update_model(
        &mut self,
        name: &str,
        model: CustomUpdateModel,
    ) -> ModelResult<()> {
        insert(
            &mut self.custom_update_models,
            TemplateCategory::CustomUpdate,
            name,
            model,
        )
    }

    pub fn neuron_model(&self, name: &str) -> ModelResult<Arc<NeuronModel>> {
        lookup(&self.neuron_models, TemplateCategory::Neuron, name)
    }

    pub fn weight_update_model(&self, name: &str) -> ModelResult<Arc<WeightUpdateModel>> {
        lookup(&self.weight_update_models, TemplateCategory::WeightUpdate, name)
    }

    pub fn postsynaptic_model(&self, name: &str) -> ModelResult<Arc<PostsynapticModel>> {
        lookup(&self.postsynaptic_models, TemplateCategory::Postsynaptic, name)
    }

    pub fn custom_update_model(&self, name: &str) -> ModelResult<Arc<CustomUpdateModel>> {
        lookup(&self.custom_update_models, TemplateCategory::CustomUpdate, name)
    }

    /// Total number of registered templates across all categories
    pub fn len(&self) -> usize {
        self.neuron_models.len()
            + self.weight_update_models.len()
            + self.postsynaptic_models.len()
            + self.custom_update_models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = TemplateRegistry::new();
        registry
            .register_postsynaptic_model("DeltaCurr", PostsynapticModel::default())
            .unwrap();

        assert!(registry.postsynaptic_model("DeltaCurr").is_ok());
        assert_eq!(
            registry.postsynaptic_model("ExpCurr").unwrap_err(),
            ModelError::UnknownTemplate {
                category: TemplateCategory::Postsynaptic,
                name: "ExpCurr".to_string(),
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_categories_are_independent() {
        let mut registry = TemplateRegistry::new();
        registry
            .register_neuron_model("Same", NeuronModel::default())
            .unwrap();
        registry
            .register_custom_update_model("Same", CustomUpdateModel::default())
            .unwrap();

        let err = registry
            .register_neuron_model("Same", NeuronModel::default())
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateTemplate { .. }));
        assert!(registry.weight_update_model("Same").is_err());
    }
}
