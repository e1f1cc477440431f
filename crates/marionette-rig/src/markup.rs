// SPDX-License-Identifier: Apache-2.0
//! Skeleton markup and the chain index built from it.
//!
//! Joints carry symbolic tags (side, region, chain start/end, twist bucket)
//! so rig components can find their targets without hardcoded paths. The
//! index is built once per root joint by a single scan; every query after
//! that is a dictionary lookup.

use std::collections::BTreeMap;

use marionette_scene::{AttrValue, NodeId, NodeKind, Scene};
use tracing::warn;

use crate::error::MarkupError;

/// Chain-start tag; the value names the chain's region.
pub const CHAIN_START_ATTR: &str = "chainStart";
/// Chain-end tag; the value names the region the end belongs to.
pub const CHAIN_END_ATTR: &str = "chainEnd";
/// Twist tag; the value names the twist bucket's region.
pub const CHAIN_TWIST_ATTR: &str = "chainTwist";
/// Marks the first joint of the exportable hierarchy.
pub const HIERARCHY_START_ATTR: &str = "hierarchyStart";
/// Skeletal-mesh export toggle (defaults on).
pub const SK_EXPORT_ATTR: &str = "skExport";
/// Animation export toggle (defaults on).
pub const ANIM_EXPORT_ATTR: &str = "animationExport";

fn str_attr(scene: &Scene, joint: NodeId, attr: &str) -> Option<String> {
    scene
        .attr(joint, attr)
        .and_then(|v| v.as_str().map(str::to_owned))
        .filter(|s| !s.is_empty())
}

/// Side tag of a joint.
#[must_use]
pub fn joint_side(scene: &Scene, joint: NodeId) -> Option<String> {
    str_attr(scene, joint, crate::node::SIDE_ATTR)
}

/// Region tag of a joint, falling back to chain start/end/twist tags the
/// way untagged mid-chain joints inherit their region.
#[must_use]
pub fn joint_region(scene: &Scene, joint: NodeId) -> Option<String> {
    str_attr(scene, joint, crate::node::REGION_ATTR)
        .or_else(|| str_attr(scene, joint, CHAIN_START_ATTR))
        .or_else(|| str_attr(scene, joint, CHAIN_TWIST_ATTR))
        .or_else(|| str_attr(scene, joint, CHAIN_END_ATTR))
}

/// Stamps side markup on a joint.
pub fn set_joint_side(scene: &mut Scene, joint: NodeId, side: &str) {
    let _ = scene.set_attr(joint, crate::node::SIDE_ATTR, side.to_lowercase());
}

/// Stamps region markup on a joint.
pub fn set_joint_region(scene: &mut Scene, joint: NodeId, region: &str) {
    let _ = scene.set_attr(joint, crate::node::REGION_ATTR, region);
}

/// Marks a joint as the start of the `region` chain (also stamps region).
pub fn set_chain_start(scene: &mut Scene, joint: NodeId, region: &str) {
    let _ = scene.set_attr(joint, CHAIN_START_ATTR, region);
    let _ = scene.set_attr(joint, crate::node::REGION_ATTR, region);
}

/// Marks a joint as the end of the `region` chain.
pub fn set_chain_end(scene: &mut Scene, joint: NodeId, region: &str) {
    let _ = scene.set_attr(joint, CHAIN_END_ATTR, region);
}

/// Marks a joint as part of the `twist_region` twist bucket.
pub fn set_chain_twist(scene: &mut Scene, joint: NodeId, twist_region: &str) {
    let _ = scene.set_attr(joint, CHAIN_TWIST_ATTR, twist_region);
}

/// Marks a joint as the first joint of the hierarchy.
pub fn set_hierarchy_start(scene: &mut Scene, joint: NodeId) {
    let _ = scene.set_attr(joint, HIERARCHY_START_ATTR, true);
}

fn export_flag(scene: &Scene, joint: NodeId, attr: &str) -> bool {
    scene
        .attr(joint, attr)
        .and_then(AttrValue::as_bool)
        .unwrap_or(true)
}

/// One indexed chain: start, untagged mids, end, in scan order.
#[derive(Debug, Clone, Default)]
pub struct ChainEntry {
    start: Option<NodeId>,
    mid: Vec<NodeId>,
    end: Option<NodeId>,
}

impl ChainEntry {
    /// Ordered joints of the chain (start, mids, end).
    ///
    /// A single-joint chain carries its start and end tags on the same
    /// joint; it still lists that joint once.
    #[must_use]
    pub fn full_chain(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.mid.len() + 2);
        out.extend(self.start);
        out.extend(self.mid.iter().copied());
        if self.end != self.start {
            out.extend(self.end);
        }
        out
    }
}

/// Twist joints grouped under one driving parent joint.
#[derive(Debug, Clone, Default)]
pub struct TwistBucket {
    /// Joint the bucket hangs off (parent of the first twist joint seen).
    pub parent: Option<NodeId>,
    /// Twist joints in scan order.
    pub joints: Vec<NodeId>,
}

/// Index of a marked-up skeleton, keyed by (side, region).
///
/// Built once per root joint; queries are pure lookups of
/// construction-time state and never touch the scene again.
#[derive(Debug, Clone)]
pub struct SkeletonHierarchy {
    root: NodeId,
    hierarchy_start: Option<NodeId>,
    chains: BTreeMap<(String, String), ChainEntry>,
    twists: BTreeMap<(String, String), TwistBucket>,
    sk_joints: Vec<NodeId>,
    animation_joints: Vec<NodeId>,
    invalid_joints: Vec<NodeId>,
}

impl SkeletonHierarchy {
    /// Scans the joint hierarchy under `root` and builds the index.
    ///
    /// # Errors
    /// [`MarkupError::ChainCollision`] when two chain starts land on the
    /// same (side, region) key — the earlier chain would be silently
    /// shadowed otherwise.
    pub fn build(scene: &Scene, root: NodeId) -> Result<Self, MarkupError> {
        let mut joints = vec![root];
        joints.extend(
            scene
                .descendants(root)
                .into_iter()
                .filter(|j| scene.kind(*j) == Ok(NodeKind::Joint)),
        );

        let mut index = Self {
            root,
            hierarchy_start: None,
            chains: BTreeMap::new(),
            twists: BTreeMap::new(),
            sk_joints: Vec::new(),
            animation_joints: Vec::new(),
            invalid_joints: Vec::new(),
        };

        for joint in joints {
            if scene
                .attr(joint, HIERARCHY_START_ATTR)
                .and_then(AttrValue::as_bool)
                .unwrap_or(false)
            {
                index.hierarchy_start = Some(joint);
            }
            if export_flag(scene, joint, SK_EXPORT_ATTR) {
                index.sk_joints.push(joint);
            }
            if export_flag(scene, joint, ANIM_EXPORT_ATTR) {
                index.animation_joints.push(joint);
            }

            let side = joint_side(scene, joint);
            if let (Some(side), Some(twist_region)) =
                (side.clone(), str_attr(scene, joint, CHAIN_TWIST_ATTR))
            {
                let bucket = index.twists.entry((side, twist_region)).or_default();
                if bucket.parent.is_none() {
                    bucket.parent = scene.parent(joint).ok().flatten();
                }
                bucket.joints.push(joint);
                continue;
            }

            let Some(region) = joint_region(scene, joint) else {
                index.invalid_joints.push(joint);
                continue;
            };
            let Some(side) = side else {
                continue;
            };

            let is_start = str_attr(scene, joint, CHAIN_START_ATTR).is_some();
            let end_region = str_attr(scene, joint, CHAIN_END_ATTR);

            if is_start {
                let key = (side.clone(), region.clone());
                let entry = index.chains.entry(key.clone()).or_default();
                if entry.start.is_some() {
                    return Err(MarkupError::ChainCollision {
                        side: key.0,
                        region: key.1,
                    });
                }
                entry.start = Some(joint);
            }
            if let Some(end_region) = end_region.clone() {
                let entry = index
                    .chains
                    .entry((side.clone(), end_region))
                    .or_default();
                entry.end = Some(joint);
            }
            if !is_start && end_region.is_none() {
                index
                    .chains
                    .entry((side, region))
                    .or_default()
                    .mid
                    .push(joint);
            }
        }
        Ok(index)
    }

    /// Root joint the index was built from.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Joint tagged as first in the hierarchy, if any.
    #[must_use]
    pub fn hierarchy_start(&self) -> Option<NodeId> {
        self.hierarchy_start
    }

    /// `true` when every joint carried enough markup to index.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.invalid_joints.is_empty()
    }

    /// Joints exported with the skeletal mesh.
    #[must_use]
    pub fn sk_joints(&self) -> &[NodeId] {
        &self.sk_joints
    }

    /// Joints exported with animation.
    #[must_use]
    pub fn animation_joints(&self) -> &[NodeId] {
        &self.animation_joints
    }

    /// Start joint of the (side, region) chain.
    #[must_use]
    pub fn get_start(&self, side: &str, region: &str) -> Option<NodeId> {
        self.chains
            .get(&(side.to_owned(), region.to_owned()))
            .and_then(|e| e.start)
    }

    /// End joint of the (side, region) chain.
    #[must_use]
    pub fn get_chain_end(&self, side: &str, region: &str) -> Option<NodeId> {
        self.chains
            .get(&(side.to_owned(), region.to_owned()))
            .and_then(|e| e.end)
    }

    /// Ordered joints of the (side, region) chain; empty (with a warning)
    /// when the lookup misses.
    #[must_use]
    pub fn get_full_chain(&self, side: &str, region: &str) -> Vec<NodeId> {
        let chain = self
            .chains
            .get(&(side.to_owned(), region.to_owned()))
            .map(ChainEntry::full_chain)
            .unwrap_or_default();
        if chain.is_empty() {
            warn!(side, region, "no joints match chain lookup");
        }
        chain
    }

    /// Twist bucket for (side, twist-region).
    #[must_use]
    pub fn twist_bucket(&self, side: &str, twist_region: &str) -> Option<&TwistBucket> {
        self.twists.get(&(side.to_owned(), twist_region.to_owned()))
    }

    /// All twist buckets, in key order.
    pub fn twist_buckets(&self) -> impl Iterator<Item = (&(String, String), &TwistBucket)> {
        self.twists.iter()
    }

    /// Index of `joint` within its own chain.
    #[must_use]
    pub fn joint_index(&self, scene: &Scene, joint: NodeId) -> Option<usize> {
        let side = joint_side(scene, joint)?;
        let region = joint_region(scene, joint)?;
        self.get_full_chain(&side, &region)
            .iter()
            .position(|j| *j == joint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marionette_scene::Transform;

    fn joint(scene: &mut Scene, name: &str, parent: Option<NodeId>) -> NodeId {
        let j = scene.create_node(name, NodeKind::Joint);
        if let Some(p) = parent {
            scene.set_parent(j, Some(p)).unwrap();
        }
        scene
            .set_local(j, Transform::from_translation(glam::DVec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        j
    }

    fn arm_skeleton(scene: &mut Scene) -> (NodeId, NodeId, NodeId, NodeId) {
        let root = joint(scene, "root", None);
        set_joint_side(scene, root, "center");
        set_chain_start(scene, root, "root");
        set_chain_end(scene, root, "root");
        let shoulder = joint(scene, "shoulder_l", Some(root));
        set_joint_side(scene, shoulder, "left");
        set_chain_start(scene, shoulder, "arm");
        let elbow = joint(scene, "elbow_l", Some(shoulder));
        set_joint_side(scene, elbow, "left");
        set_joint_region(scene, elbow, "arm");
        let wrist = joint(scene, "wrist_l", Some(elbow));
        set_joint_side(scene, wrist, "left");
        set_chain_end(scene, wrist, "arm");
        (root, shoulder, elbow, wrist)
    }

    #[test]
    fn full_chain_is_ordered_and_pure() {
        let mut scene = Scene::new();
        let (root, shoulder, elbow, wrist) = arm_skeleton(&mut scene);
        let skel = SkeletonHierarchy::build(&scene, root).unwrap();

        let chain = skel.get_full_chain("left", "arm");
        assert_eq!(chain, vec![shoulder, elbow, wrist]);
        // Pure function of construction-time state.
        for _ in 0..3 {
            assert_eq!(skel.get_full_chain("left", "arm"), chain);
        }
        assert_eq!(skel.get_start("left", "arm"), Some(shoulder));
        assert_eq!(skel.get_chain_end("left", "arm"), Some(wrist));
        assert!(skel.get_full_chain("right", "arm").is_empty());
    }

    #[test]
    fn chain_collision_raises() {
        let mut scene = Scene::new();
        let (root, _, _, _) = arm_skeleton(&mut scene);
        let rogue = joint(&mut scene, "rogue_l", Some(root));
        set_joint_side(&mut scene, rogue, "left");
        set_chain_start(&mut scene, rogue, "arm");

        let err = SkeletonHierarchy::build(&scene, root);
        assert!(matches!(
            err,
            Err(MarkupError::ChainCollision { .. })
        ));
    }

    #[test]
    fn twist_joints_index_under_parent_region() {
        let mut scene = Scene::new();
        let (root, shoulder, _, _) = arm_skeleton(&mut scene);
        let t0 = joint(&mut scene, "arm_twist0_l", Some(shoulder));
        set_joint_side(&mut scene, t0, "left");
        set_chain_twist(&mut scene, t0, "arm_twist");
        let t1 = joint(&mut scene, "arm_twist1_l", Some(shoulder));
        set_joint_side(&mut scene, t1, "left");
        set_chain_twist(&mut scene, t1, "arm_twist");

        let skel = SkeletonHierarchy::build(&scene, root).unwrap();
        let bucket = skel.twist_bucket("left", "arm_twist").unwrap();
        assert_eq!(bucket.parent, Some(shoulder));
        assert_eq!(bucket.joints, vec![t0, t1]);
        // Twist joints never pollute the main chain.
        assert_eq!(skel.get_full_chain("left", "arm").len(), 3);
    }
}
