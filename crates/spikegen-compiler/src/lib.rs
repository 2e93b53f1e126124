// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikegen-compiler
//!
//! Builds a spiking network description and resolves it into a kernel plan.
//!
//! ## Phases
//!
//! 1. **Build**: [`ModelBuilder`] (or the in-place [`ModelGraph`]) accepts
//!    populations, projections and custom updates, checking names, template
//!    arities and storage support as they are added.
//! 2. **Finalize**: derived parameters, spike and delay requirements, padded
//!    per-kernel id ranges, spike-event conditions, custom-update batching
//!    and reset placement are fixed in one pass.
//! 3. **Read**: the resulting [`FinalizedModel`] is immutable and feeds the
//!    kernel emitter.
//!
//! ```rust
//! use spikegen_compiler::{KernelKind, ModelBuilder};
//! use spikegen_models::{NeuronModel, TemplateRegistry, Var, VarAccess};
//!
//! let mut registry = TemplateRegistry::new();
//! registry
//!     .register_neuron_model(
//!         "Counter",
//!         NeuronModel {
//!             vars: vec![Var::new("n", "unsigned int", VarAccess::ReadWrite)],
//!             sim_code: "$(n)++;".into(),
//!             ..Default::default()
//!         },
//!     )
//!     .unwrap();
//!
//! let mut builder = ModelBuilder::new(registry);
//! builder.add_population("A", 40, "Counter", &[], &[0.0]).unwrap();
//! let model = builder.finalize().unwrap();
//!
//! // 40 neurons padded to the default block of 32
//! assert_eq!(model.plan().total_size(KernelKind::NeuronUpdate), 64);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod batching;
pub mod builder;
pub mod custom_update;
pub mod error;
pub mod finalize;
pub mod finalized;
pub mod graph;
pub mod matrix;
pub mod plan;
pub mod population;
pub mod projection;
mod queue;
pub mod sizing;

pub use builder::ModelBuilder;
pub use custom_update::{CustomUpdate, ResolvedVarRef, VarReference};
pub use error::{CompileError, CompileResult, EntityCategory};
pub use finalize::{FinalizeError, FinalizeStage};
pub use finalized::{scalar_expr, FinalizedModel};
pub use graph::ModelGraph;
pub use matrix::{Conductance, Connectivity, SpanType, StorageRepresentation, VarLocation};
pub use plan::{IdRange, KernelGroup, KernelKind, KernelPlan};
pub use population::{Population, SpikeEventCondition};
pub use projection::{ModelInstance, Projection, ProjectionSpec};
