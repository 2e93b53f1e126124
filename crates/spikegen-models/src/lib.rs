// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikegen-models
//!
//! The contract between the compiler and a catalog of model templates.
//!
//! A template is data: ordered parameter names, variables with their access
//! mode, derived-parameter formulas, extra global parameters and code
//! fragments. The compiler never interprets fragment text beyond scanning
//! it for delayed-access markers and the handful of rewrites in [`code`].
//!
//! ```rust
//! use spikegen_models::{NeuronModel, TemplateRegistry, Var, VarAccess};
//!
//! let mut registry = TemplateRegistry::new();
//! registry
//!     .register_neuron_model(
//!         "Leaky",
//!         NeuronModel {
//!             params: vec!["tau".into()],
//!             vars: vec![Var::new("V", "scalar", VarAccess::ReadWrite)],
//!             sim_code: "$(V) += -$(V) / $(tau) * DT;".into(),
//!             ..Default::default()
//!         },
//!     )
//!     .unwrap();
//! assert_eq!(registry.neuron_model("Leaky").unwrap().vars.len(), 1);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod code;
pub mod registry;
pub mod templates;
pub mod types;

pub use registry::{TemplateCategory, TemplateRegistry};
pub use templates::{
    CustomUpdateModel, NeuronModel, PostsynapticModel, TemplateShape, WeightUpdateModel,
};
pub use types::{DerivedParam, ExtraGlobalParam, Var, VarAccess, VarRefDecl};

/// Errors raised by the template registry and fragment helpers
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Unknown {category} template '{name}'")]
    UnknownTemplate {
        category: TemplateCategory,
        name: String,
    },

    #[error("{category} template '{name}' is already registered")]
    DuplicateTemplate {
        category: TemplateCategory,
        name: String,
    },

    #[error("Malformed code fragment: {0}")]
    MalformedCode(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
