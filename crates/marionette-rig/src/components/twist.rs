// SPDX-License-Identifier: Apache-2.0
//! Twist fixup drive.
//!
//! Distributes a limb segment's roll across the segment's twist joints.
//! The drive direction is decided geometrically: the bucket is reversed
//! when its first twist joint is not strictly farther from the segment's
//! child joint than from its parent joint. Twist components are derived
//! from markup, so serialization skips them and replay rebuilds them after
//! every other component exists.

use marionette_scene::{ConstraintKind, LinkOp, NodeId, Plug, Scene};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chain::{duplicate_joint, primary_axis, rotate_channel};
use crate::component::{Component, RigComponent};
use crate::error::BuildError;
use crate::kind::ComponentKind;
use crate::markup::SkeletonHierarchy;
use crate::rig::Rig;

/// Most twist joints one segment may carry.
pub const MAX_TWIST_JOINTS: usize = 3;

/// Rotation share of twist joint `index` out of `count`.
///
/// The ramp is `(index + 1) / (count + 1) * 2`, so a two-joint segment
/// lands on roughly 0.667 and 1.333.
#[must_use]
pub fn twist_multiplier(index: usize, count: usize) -> f64 {
    (index as f64 + 1.0) / (count as f64 + 1.0) * 2.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TwistKwargs {
    twist_region: String,
}

/// Per-segment twist distribution over a helper joint's extracted roll.
#[derive(Debug, Clone)]
pub struct TwistComponent {
    base: RigComponent,
}

impl TwistComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Builds the twist drive for one (side, twist-region) bucket.
    ///
    /// Preconditions that warn and skip: no bucket under that key, an empty
    /// or oversized bucket, a bucket whose parent joint has no chain child
    /// to measure direction against.
    pub fn create(
        scene: &mut Scene,
        rig: &Rig,
        hierarchy: &SkeletonHierarchy,
        side: &str,
        twist_region: &str,
    ) -> Result<Option<Self>, BuildError> {
        let Some(bucket) = hierarchy.twist_bucket(side, twist_region) else {
            warn!(side, twist_region, "twist skipped: no bucket in markup");
            return Ok(None);
        };
        let Some(parent) = bucket.parent else {
            warn!(side, twist_region, "twist skipped: bucket has no parent joint");
            return Ok(None);
        };
        let joints = bucket.joints.clone();
        if joints.is_empty() || joints.len() > MAX_TWIST_JOINTS {
            warn!(
                side,
                twist_region,
                count = joints.len(),
                "twist skipped: bucket size out of range"
            );
            return Ok(None);
        }
        let Some(child) = scene
            .children(parent)?
            .into_iter()
            .find(|n| {
                scene.kind(*n) == Ok(marionette_scene::NodeKind::Joint) && !joints.contains(n)
            })
        else {
            warn!(side, twist_region, "twist skipped: segment has no chain child");
            return Ok(None);
        };

        let first = scene.world_transform(joints[0])?.translation;
        let to_parent = (first - scene.world_transform(parent)?.translation).length();
        let to_child = (first - scene.world_transform(child)?.translation).length();
        let reversed = to_child <= to_parent;
        let source = if reversed { parent } else { child };

        let component = scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::Twist,
                Self::VERSION,
                side,
                twist_region,
                Some(parent),
            )?;
            base.store_kwargs(
                scene,
                &TwistKwargs {
                    twist_region: twist_region.to_owned(),
                },
            )?;
            let (_flag_grp, nt_grp) = base.groups(scene)?;

            // Helper rides the source joint; its roll channel is the one
            // scalar the twist joints read.
            let helper_name = format!("{}_twist_ref", scene.name(source)?);
            let helper = duplicate_joint(scene, source, &helper_name)?;
            let world = scene.world_transform(source)?;
            scene.set_parent(helper, Some(nt_grp))?;
            scene.set_world(helper, world)?;
            scene.add_constraint(ConstraintKind::Orient, &[source], helper, true)?;

            let (axis, _) = primary_axis(scene, parent);
            let channel = rotate_channel(axis);
            let sign = if reversed { -1.0 } else { 1.0 };
            for (i, joint) in joints.iter().enumerate() {
                let mult = twist_multiplier(i, joints.len()) * sign;
                scene.add_link(
                    Plug::new(helper, channel),
                    LinkOp::Mul(mult),
                    Plug::new(*joint, channel),
                )?;
            }

            base.node().connect_nodes(scene, &[helper], "twistHelper", true)?;
            base.set_bind_joints(scene, &joints)?;
            Ok::<_, BuildError>(Self { base })
        })?;
        Ok(Some(component))
    }

    /// Rebuilds the wrapper from a resolved base.
    #[must_use]
    pub fn from_base(base: RigComponent) -> Self {
        Self { base }
    }

    /// The helper joint whose roll feeds the twist joints.
    #[must_use]
    pub fn helper(&self, scene: &Scene) -> Option<NodeId> {
        self.base.node().connected_node(scene, "twistHelper")
    }
}

impl Component for TwistComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Twist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn two_joint_ramp_matches_the_fixup_shares() {
        assert!((twist_multiplier(0, 2) - 2.0 / 3.0).abs() < 1e-9);
        assert!((twist_multiplier(1, 2) - 4.0 / 3.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn multipliers_stay_in_range_and_grow(count in 1usize..=MAX_TWIST_JOINTS) {
            let mut last = 0.0;
            for index in 0..count {
                let m = twist_multiplier(index, count);
                prop_assert!(m > 0.0 && m < 2.0);
                prop_assert!(m > last);
                last = m;
            }
        }
    }
}
