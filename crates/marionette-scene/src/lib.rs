// SPDX-License-Identifier: Apache-2.0
//! Scene graph adapter for marionette rigs.
//!
//! This crate is the contract between the rig layer and the host scene
//! graph: node/attribute create-get-set, parent/children, message
//! connections, constraint creation and channel links. The in-memory store
//! here is the same surface the host adapter implements, so the component
//! layer and its tests run against identical semantics.
//!
//! # Design
//!
//! - **Deterministic** — `BTreeMap` buckets and creation-ordered drivers;
//!   repeated evaluation of an unmutated scene is a fixed point.
//! - **No solving** — IK handles are retained records; solving is the
//!   host's concern, not this crate's.
//! - **Single-threaded** — one globally shared store, command-style
//!   mutation, no locking discipline to get wrong.

use thiserror::Error;

/// Error type for scene store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    /// The referenced node does not exist (or was deleted).
    #[error("missing node {0}")]
    MissingNode(ident::NodeId),
    /// A channel read referenced an attribute that does not exist.
    #[error("missing attribute {attr} on {node}")]
    MissingAttr {
        /// Node the lookup ran against.
        node: ident::NodeId,
        /// Attribute name that was missing.
        attr: String,
    },
    /// Reparenting would create a hierarchy cycle.
    #[error("parenting {child} under {parent} would cycle")]
    WouldCycle {
        /// Node being reparented.
        child: ident::NodeId,
        /// Requested parent.
        parent: ident::NodeId,
    },
    /// A constraint was requested with no targets.
    #[error("constraint requested with no targets")]
    EmptyTargets,
}

mod attr;
mod driver;
mod ident;
mod node;
mod scene;
mod transform;

pub use attr::AttrValue;
pub use driver::{ConstraintKind, Driver, LinkOp};
pub use ident::{DriverId, NodeId, Plug};
pub use node::NodeKind;
pub use scene::{
    Scene, ROTATION_CHANNELS, SCALE_CHANNELS, TRANSFORM_CHANNELS, TRANSLATION_CHANNELS,
};
pub use transform::Transform;
