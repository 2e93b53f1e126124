// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Connectivity, conductance and the storage representation they select

use serde::Serialize;

use crate::error::{CompileError, CompileResult};

/// How synapses between two populations are enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Connectivity {
    Dense,
    AllToAll,
    Sparse,
}

/// How synaptic conductance values are held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Conductance {
    /// One value shared by every synapse
    GlobalG,
    /// One value per synapse
    IndividualG,
    /// Connection existence only, one bit per synapse
    IndividualId,
}

/// Layout of a projection's connectivity and weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StorageRepresentation {
    DenseIndividualG,
    SparseIndividualG,
    SparseGlobalG,
    BitmaskGlobalG,
}

impl StorageRepresentation {
    #[inline]
    pub fn is_sparse(&self) -> bool {
        matches!(
            self,
            StorageRepresentation::SparseIndividualG | StorageRepresentation::SparseGlobalG
        )
    }

    #[inline]
    pub fn is_bitmask(&self) -> bool {
        matches!(self, StorageRepresentation::BitmaskGlobalG)
    }

    #[inline]
    pub fn has_individual_weights(&self) -> bool {
        matches!(
            self,
            StorageRepresentation::DenseIndividualG | StorageRepresentation::SparseIndividualG
        )
    }
}

/// Select the storage representation for a projection
///
/// | connectivity | conductance | representation |
/// |---|---|---|
/// | Sparse | GlobalG | SparseGlobalG |
/// | Sparse | IndividualG | SparseIndividualG |
/// | Dense, AllToAll | IndividualG | DenseIndividualG |
/// | Dense, AllToAll | IndividualId | BitmaskGlobalG |
///
/// Anything else is `UnsupportedMatrixConfiguration`.
pub fn select_storage(
    projection: &str,
    connectivity: Connectivity,
    conductance: Conductance,
) -> CompileResult<StorageRepresentation> {
    use Conductance::*;
    use Connectivity::*;

    match (connectivity, conductance) {
        (Sparse, GlobalG) => Ok(StorageRepresentation::SparseGlobalG),
        (Sparse, IndividualG) => Ok(StorageRepresentation::SparseIndividualG),
        (Dense | AllToAll, IndividualG) => Ok(StorageRepresentation::DenseIndividualG),
        (Dense | AllToAll, IndividualId) => Ok(StorageRepresentation::BitmaskGlobalG),
        _ => Err(CompileError::UnsupportedMatrixConfiguration {
            projection: projection.to_string(),
            connectivity,
            conductance,
        }),
    }
}

/// Which side of a projection maps one-to-one onto execution units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SpanType {
    /// One unit per target neuron (or sparse row slot), iterating incoming spikes
    #[default]
    Postsynaptic,
    /// One unit per source spike, iterating its targets
    Presynaptic,
}

/// Where a buffer lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum VarLocation {
    #[default]
    Device,
    /// Host memory mapped into the device address space
    ZeroCopy,
}

impl VarLocation {
    #[inline]
    pub fn is_zero_copy(&self) -> bool {
        matches!(self, VarLocation::ZeroCopy)
    }
}
