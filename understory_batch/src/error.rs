// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use understory_hash_grid::GridError;

use crate::mesh::MeshHandle;

/// Largest vertex capacity an indexed mesh can address with 16-bit indices.
pub const MAX_INDEXED_VERTEX_CAPACITY: u32 = 0xFFFF;

/// Invalid preprocessor configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The grid could not be built.
    #[error("invalid grid configuration")]
    Grid(#[from] GridError),
}

/// Misuse of the [`MeshManager`](crate::MeshManager) API.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    /// An indexed mesh asked for more vertices than 16-bit indices can address.
    #[error("vertex capacity {requested} exceeds 0xFFFF")]
    VertexCapacityExceeded {
        /// Requested vertex capacity.
        requested: u32,
    },
    /// The sprite kind does not support the requested material index.
    #[error("material index {index} is not supported for this sprite kind")]
    UnsupportedMaterialIndex {
        /// Requested material index.
        index: u32,
    },
    /// The sprite does not carry the materials its kind needs.
    #[error("sprite has {found} materials, {required} required")]
    MissingMaterials {
        /// Materials the sprite kind needs.
        required: u32,
        /// Materials the sprite has.
        found: u32,
    },
    /// Text was set on a mesh that is not a font mesh.
    #[error("mesh {0:?} is not a font mesh")]
    NotAFont(MeshHandle),
    /// Index capacity was requested for a non-indexed mesh.
    #[error("mesh {0:?} is not indexed and cannot hold index capacity")]
    IndexCapacityOnBasicMesh(MeshHandle),
    /// The handle does not refer to a live mesh.
    #[error("mesh handle {0:?} is stale or unknown")]
    InvalidHandle(MeshHandle),
}
