// SPDX-License-Identifier: Apache-2.0
//! Rig component-graph framework.
//!
//! A retained graph of typed, versioned rig-building components layered on
//! the [`marionette_scene`] transform hierarchy. Components capture their
//! build parameters for deterministic reconstruction, migrate forward
//! through explicit per-kind version tables, and (re)bind their controls
//! to arbitrary skeleton instances through side/region name markup.
//!
//! # Layers
//!
//! - [`GraphNode`]: typed wrapper over one scene object; weak parent link,
//!   children by reverse query.
//! - [`SkeletonHierarchy`]: the markup index; `(side, region)` to ordered
//!   joint chain, built once per root joint.
//! - [`RigComponent`] / [`Component`]: the create/attach/bake/remove
//!   contract plus its thirteen variants under [`components`].
//! - [`AssetRoot`] / [`Rig`]: per-asset anchor and the singleton container
//!   owning components in creation order.
//! - [`serialize_rig`] / [`build_rig`]: symbolic record lists and their
//!   replay; [`update_all_components`]: the migration sweep.

mod bake;
mod chain;
mod component;
pub mod components;
mod error;
mod flag;
mod kind;
mod markup;
mod migrate;
mod node;
mod rig;
mod root;
mod serialize;

pub use bake::{bake_objects, BakedAnimation, JointTrack};
pub use chain::{between_joints, duplicate_chain, duplicate_joint, primary_axis, rotate_channel};
pub use component::{
    detach, AnyComponent, Attachment, BakeSet, Component, RigComponent, BAKE_HELPER_ATTR,
    BIND_JOINTS_ATTR, BUILD_KWARGS_ATTR, FLAGS_ATTR, FLAGS_GROUP_ATTR, NO_TOUCH_ATTR,
    PARENTS_ATTR,
};
pub use error::{BuildError, MarkupError, MigrationError, SerializeError};
pub use flag::{is_flag_node, Flag, FlagType};
pub use kind::{ComponentKind, RIG_COMPONENT_KINDS};
pub use markup::{
    joint_region, joint_side, set_chain_end, set_chain_start, set_chain_twist,
    set_hierarchy_start, set_joint_region, set_joint_side, ChainEntry, SkeletonHierarchy,
    TwistBucket, ANIM_EXPORT_ATTR, CHAIN_END_ATTR, CHAIN_START_ATTR, CHAIN_TWIST_ATTR,
    HIERARCHY_START_ATTR, SK_EXPORT_ATTR,
};
pub use migrate::{
    table_for, update_all_components, update_component, MigrationStep, MigrationTable,
};
pub use node::{
    all_graph_nodes, is_graph_node, GraphNode, PARENT_ATTR, REGION_ATTR, SIDE_ATTR, TYPE_ATTR,
    VERSION_ATTR,
};
pub use rig::{Rig, RIG_SCALE_ATTR};
pub use root::{all_asset_roots, asset_root_by_id, AssetRoot};
pub use serialize::{
    build_rig, serialize_rig, AttachRecord, ComponentRecord, RecordTargets, RigDefinition,
    TargetRef, FORMAT_VERSION,
};
