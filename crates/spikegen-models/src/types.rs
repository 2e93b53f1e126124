// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Building blocks shared by every template kind

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How a variable may be accessed
///
/// On a template variable this also decides batching: read-write state is
/// replicated per simulation batch, read-only state is shared by all batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarAccess {
    ReadWrite,
    ReadOnly,
}

impl VarAccess {
    #[inline]
    pub fn is_replicated_per_batch(&self) -> bool {
        matches!(self, VarAccess::ReadWrite)
    }
}

/// A per-unit state variable declared by a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Var {
    pub name: String,
    /// Device type name, e.g. `scalar` or `unsigned int`
    pub ty: String,
    pub access: VarAccess,
}

impl Var {
    pub fn new(name: impl Into<String>, ty: impl Into<String>, access: VarAccess) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            access,
        }
    }
}

/// A variable reference slot declared by a custom-update template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarRefDecl {
    pub name: String,
    pub ty: String,
    pub access: VarAccess,
}

impl VarRefDecl {
    pub fn new(name: impl Into<String>, ty: impl Into<String>, access: VarAccess) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            access,
        }
    }
}

/// A runtime-supplied parameter shared by all units (not per-unit state)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraGlobalParam {
    pub name: String,
    pub ty: String,
}

impl ExtraGlobalParam {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

type DerivedFn = dyn Fn(&[f64], f64) -> f64 + Send + Sync;

/// A parameter computed once from the resolved parameters and the time step
#[derive(Clone)]
pub struct DerivedParam {
    pub name: String,
    func: Arc<DerivedFn>,
}

impl DerivedParam {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[f64], f64) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Evaluate against resolved parameter values and `dt`
    #[inline]
    pub fn evaluate(&self, params: &[f64], dt: f64) -> f64 {
        (self.func)(params, dt)
    }
}

impl fmt::Debug for DerivedParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedParam")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_param_evaluation() {
        let exp_decay = DerivedParam::new("ExpDecay", |p, dt| (-dt / p[0]).exp());
        let value = exp_decay.evaluate(&[10.0], 0.1);
        assert!((value - (-0.01f64).exp()).abs() < 1e-12);
        assert!(format!("{:?}", exp_decay).contains("ExpDecay"));
    }

    #[test]
    fn test_access_batching() {
        assert!(VarAccess::ReadWrite.is_replicated_per_batch());
        assert!(!VarAccess::ReadOnly.is_replicated_per_batch());
    }

    #[test]
    fn test_var_serializes() {
        let var = Var::new("V", "scalar", VarAccess::ReadOnly);
        let json = serde_json::to_string(&var).unwrap();
        assert!(json.contains("\"ReadOnly\""));
    }
}
