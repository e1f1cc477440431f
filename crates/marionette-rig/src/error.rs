// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for the rig layer.
//!
//! Policy: precondition failures (missing markup, empty chains) are *not*
//! represented here — builders log a warning and return `Ok(None)` so batch
//! builds continue. These enums cover structural invariant violations, where
//! continuing would corrupt the graph.

use marionette_scene::{NodeId, SceneError};
use thiserror::Error;

/// Structural failures raised while building or resolving components.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Scene store failure under the build.
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// Skeleton markup failure under the build.
    #[error(transparent)]
    Markup(#[from] MarkupError),
    /// A singleton-per-root node was created under the wrong parent type.
    #[error("{kind} must be created under {expected}")]
    WrongParent {
        /// Kind being created.
        kind: &'static str,
        /// Required parent kind.
        expected: &'static str,
    },
    /// A fixed-arity build was handed the wrong number of joints.
    #[error("{kind} requires {expected} joints, got {got}")]
    ChainArity {
        /// Kind being built.
        kind: &'static str,
        /// Human-readable arity requirement.
        expected: &'static str,
        /// Actual chain length.
        got: usize,
    },
    /// A stored type tag did not match any registered component kind.
    #[error("unknown component kind {0:?}")]
    UnknownKind(String),
    /// The node is not a graph node (wrong kind or missing type tag).
    #[error("{0} is not a graph node")]
    NotAGraphNode(NodeId),
    /// Captured build parameters failed to round-trip through serde.
    #[error("build parameter capture failed: {0}")]
    Kwargs(#[from] serde_json::Error),
}

/// Failures while indexing skeleton markup.
#[derive(Debug, Error)]
pub enum MarkupError {
    /// Scene store failure during the scan.
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// Two chains landed on the same (side, region) key.
    ///
    /// The index refuses to guess which chain wins; fix the markup.
    #[error("chain collision on ({side}, {region})")]
    ChainCollision {
        /// Side tag of the colliding chains.
        side: String,
        /// Region tag of the colliding chains.
        region: String,
    },
}

/// Failures while migrating stored component versions forward.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Scene store failure mid-migration.
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// The node being migrated could not be resolved as a component.
    #[error(transparent)]
    Build(#[from] BuildError),
    /// A migration table was registered with a hole in its step sequence.
    #[error("{kind} migration table has no step from version {missing_from}")]
    Gap {
        /// Kind the table belongs to.
        kind: String,
        /// First version with no outgoing step.
        missing_from: u32,
    },
    /// A step ran but did not advance the stored version.
    ///
    /// Raised instead of looping forever; the step must bump the version.
    #[error("{kind} migration from version {version} did not advance")]
    Stalled {
        /// Kind being migrated.
        kind: String,
        /// Version the instance was stuck at.
        version: u32,
    },
    /// No table is registered for a kind that needs migrating.
    #[error("no migration table registered for {0}")]
    NoTable(String),
}

/// Failures while reading or writing rig definitions.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// Scene store failure during the walk.
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// Skeleton markup failure while resolving symbolic targets.
    #[error(transparent)]
    Markup(#[from] MarkupError),
    /// Component graph failure during the walk.
    #[error(transparent)]
    Build(#[from] BuildError),
    /// The rig has no root joint to resolve symbolic targets against.
    #[error("rig has no skeleton root joint")]
    NoSkeleton,
    /// Definition file could not be read or written.
    #[error("rig definition io: {0}")]
    Io(#[from] std::io::Error),
    /// Definition payload was not valid JSON.
    #[error("rig definition decode: {0}")]
    Json(#[from] serde_json::Error),
}
