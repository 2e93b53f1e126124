// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for model construction and finalization

use serde::Serialize;
use spikegen_models::{ModelError, TemplateCategory};
use std::fmt;

use crate::matrix::{Conductance, Connectivity};

pub type CompileResult<T> = Result<T, CompileError>;

/// Which kind of named thing an error is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityCategory {
    Population,
    Projection,
    CustomUpdate,
    NeuronModel,
    WeightUpdateModel,
    PostsynapticModel,
    CustomUpdateModel,
    Variable,
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityCategory::Population => "population",
            EntityCategory::Projection => "projection",
            EntityCategory::CustomUpdate => "custom update",
            EntityCategory::NeuronModel => "neuron model",
            EntityCategory::WeightUpdateModel => "weight update model",
            EntityCategory::PostsynapticModel => "postsynaptic model",
            EntityCategory::CustomUpdateModel => "custom update model",
            EntityCategory::Variable => "variable",
        };
        write!(f, "{}", s)
    }
}

impl From<TemplateCategory> for EntityCategory {
    fn from(category: TemplateCategory) -> Self {
        match category {
            TemplateCategory::Neuron => EntityCategory::NeuronModel,
            TemplateCategory::WeightUpdate => EntityCategory::WeightUpdateModel,
            TemplateCategory::Postsynaptic => EntityCategory::PostsynapticModel,
            TemplateCategory::CustomUpdate => EntityCategory::CustomUpdateModel,
        }
    }
}

/// Errors raised while building or finalizing a model
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("Cannot add {category} with duplicate name '{name}'")]
    DuplicateName {
        category: EntityCategory,
        name: String,
    },

    #[error("The number of {what} for '{entity}' does not match its model: {actual} != {expected}")]
    ArityMismatch {
        entity: String,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{category} '{name}' not found")]
    UnknownEntity {
        category: EntityCategory,
        name: String,
    },

    #[error("Model '{0}' has already been finalized")]
    AlreadyFinalized(String),

    #[error("Projection '{projection}': {connectivity:?} connectivity with {conductance:?} conductance is not supported")]
    UnsupportedMatrixConfiguration {
        projection: String,
        connectivity: Connectivity,
        conductance: Conductance,
    },

    #[error("Custom update '{custom_update}': {reason}")]
    InconsistentVariableReference {
        custom_update: String,
        reason: String,
    },

    #[error("Projection '{projection}' requires {required_slots} delay slots on population '{population}' but at most {max_slots} are representable")]
    DelayNotRepresentable {
        projection: String,
        population: String,
        required_slots: u32,
        max_slots: u32,
    },

    #[error("Invalid setting for '{entity}': {reason}")]
    InvalidSetting { entity: String, reason: String },

    #[error("Model template error: {0}")]
    Template(ModelError),
}

impl From<ModelError> for CompileError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnknownTemplate { category, name } => CompileError::UnknownEntity {
                category: category.into(),
                name,
            },
            other => CompileError::Template(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_template_maps_to_unknown_entity() {
        let err: CompileError = ModelError::UnknownTemplate {
            category: TemplateCategory::WeightUpdate,
            name: "STDP".to_string(),
        }
        .into();
        assert_eq!(
            err,
            CompileError::UnknownEntity {
                category: EntityCategory::WeightUpdateModel,
                name: "STDP".to_string(),
            }
        );
        assert_eq!(err.to_string(), "weight update model 'STDP' not found");
    }

    #[test]
    fn test_arity_message_names_entity() {
        let err = CompileError::ArityMismatch {
            entity: "Pre".to_string(),
            what: "parameter values",
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "The number of parameter values for 'Pre' does not match its model: 3 != 4"
        );
    }
}
