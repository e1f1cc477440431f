// SPDX-License-Identifier: Apache-2.0
//! Reversed pelvis chain.
//!
//! The private chain is built upside down: the duplicate of the chain end
//! is the root and the duplicate of the chain start hangs under it, so
//! rotating the single pelvis flag swings the hips around the spine base
//! instead of the other way around.

use marionette_scene::{ConstraintKind, NodeId, Scene};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chain::{between_joints, duplicate_joint};
use crate::component::{Component, RigComponent};
use crate::error::BuildError;
use crate::flag::Flag;
use crate::kind::ComponentKind;
use crate::rig::Rig;

/// Build parameters for [`PelvisComponent::create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PelvisParams {
    /// Control shape scale.
    pub scale: f64,
}

impl Default for PelvisParams {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

/// Single-flag reversed two-joint chain driving the start bind joint.
#[derive(Debug, Clone)]
pub struct PelvisComponent {
    base: RigComponent,
}

impl PelvisComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Builds the reversed chain between `start` and `end`.
    ///
    /// # Errors
    /// [`BuildError::ChainArity`] when the chain is not exactly two joints.
    pub fn create(
        scene: &mut Scene,
        rig: &Rig,
        start: NodeId,
        end: NodeId,
        side: &str,
        region: &str,
        params: PelvisParams,
    ) -> Result<Option<Self>, BuildError> {
        let Some(bind_chain) = between_joints(scene, start, end) else {
            warn!(side, region, "pelvis skipped: end joint does not descend from start");
            return Ok(None);
        };
        if bind_chain.len() != 2 {
            return Err(BuildError::ChainArity {
                kind: "PelvisComponent",
                expected: "2",
                got: bind_chain.len(),
            });
        }
        let component = scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::Pelvis,
                Self::VERSION,
                side,
                region,
                Some(start),
            )?;
            base.store_kwargs(scene, &params)?;
            let (flag_grp, nt_grp) = base.groups(scene)?;

            let dup_end_name = format!("{}_pelvis_chain", scene.name(bind_chain[1])?);
            let dup_end = duplicate_joint(scene, bind_chain[1], &dup_end_name)?;
            let end_world = scene.world_transform(bind_chain[1])?;
            scene.set_parent(dup_end, Some(nt_grp))?;
            scene.set_world(dup_end, end_world)?;

            let dup_start_name = format!("{}_pelvis_chain", scene.name(bind_chain[0])?);
            let dup_start = duplicate_joint(scene, bind_chain[0], &dup_start_name)?;
            let start_world = scene.world_transform(bind_chain[0])?;
            scene.set_parent(dup_start, Some(dup_end))?;
            scene.set_world(dup_start, start_world)?;

            let label = scene.name(bind_chain[0])?;
            let flag = Flag::create(scene, bind_chain[0], &label, side, region)?;
            if let Some(align) = flag.align_transform(scene) {
                scene.reparent_keep_world(align, Some(flag_grp))?;
            }
            flag.lock_and_hide(scene, &["sx", "sy", "sz", "v"])?;

            scene.add_constraint(ConstraintKind::Parent, &[flag.node()], dup_end, true)?;
            scene.add_constraint(ConstraintKind::Parent, &[dup_start], bind_chain[0], true)?;

            base.add_flags(scene, &[flag])?;
            base.node()
                .connect_nodes(scene, &[dup_end, dup_start], "pelvisChain", true)?;
            base.set_bind_joints(scene, &[bind_chain[0]])?;
            Ok::<_, BuildError>(Self { base })
        })?;
        Ok(Some(component))
    }

    /// Rebuilds the wrapper from a resolved base.
    #[must_use]
    pub fn from_base(base: RigComponent) -> Self {
        Self { base }
    }

    /// The pelvis flag.
    #[must_use]
    pub fn pelvis_flag(&self, scene: &Scene) -> Option<Flag> {
        self.flags(scene).into_iter().next()
    }
}

impl Component for PelvisComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Pelvis
    }
}
