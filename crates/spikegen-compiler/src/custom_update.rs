// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Custom updates and the variable references they operate through

use spikegen_models::{CustomUpdateModel, VarAccess};
use std::fmt;
use std::sync::Arc;

use crate::matrix::VarLocation;
use crate::plan::IdRange;

/// Named alias of another entity's variable; never owns data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VarReference {
    Population { population: String, var: String },
    WeightUpdate { projection: String, var: String },
}

impl VarReference {
    pub fn population(population: impl Into<String>, var: impl Into<String>) -> Self {
        VarReference::Population {
            population: population.into(),
            var: var.into(),
        }
    }

    pub fn weight_update(projection: impl Into<String>, var: impl Into<String>) -> Self {
        VarReference::WeightUpdate {
            projection: projection.into(),
            var: var.into(),
        }
    }

    /// Name of the population or projection owning the variable
    pub fn target_name(&self) -> &str {
        match self {
            VarReference::Population { population, .. } => population,
            VarReference::WeightUpdate { projection, .. } => projection,
        }
    }

    pub fn var_name(&self) -> &str {
        match self {
            VarReference::Population { var, .. } | VarReference::WeightUpdate { var, .. } => var,
        }
    }

    pub fn is_population(&self) -> bool {
        matches!(self, VarReference::Population { .. })
    }
}

impl fmt::Display for VarReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target_name(), self.var_name())
    }
}

/// A reference checked against the template slot it fills
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVarRef {
    /// Slot name in the custom-update template
    pub slot: String,
    pub target: VarReference,
    pub ty: String,
    /// Access the custom update requests
    pub access: VarAccess,
    /// Access of the variable on its owner; read-write means per-batch copies
    pub target_access: VarAccess,
}

#[derive(Debug, Clone)]
pub struct CustomUpdate {
    pub name: String,
    pub group: String,
    pub model_kind: String,
    pub model: Arc<CustomUpdateModel>,
    pub params: Vec<f64>,
    pub var_inits: Vec<f64>,
    pub derived_params: Vec<f64>,
    pub var_refs: Vec<ResolvedVarRef>,
    pub var_locations: Vec<VarLocation>,

    /// Units shared by every reference
    pub size: usize,
    pub batched: bool,
    /// Population whose ring pointer delayed references follow
    pub delay_population: Option<String>,
    /// Slot in its update group's kernel
    pub id_range: IdRange,
}

impl CustomUpdate {
    pub fn references_populations(&self) -> bool {
        self.var_refs
            .first()
            .map(|r| r.target.is_population())
            .unwrap_or(false)
    }
}
