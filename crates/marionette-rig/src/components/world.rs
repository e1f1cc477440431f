// SPDX-License-Identifier: Apache-2.0
//! World root controls.

use marionette_scene::{ConstraintKind, NodeId, Scene};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chain::duplicate_joint;
use crate::component::{Component, RigComponent};
use crate::error::BuildError;
use crate::flag::{Flag, FlagType};
use crate::kind::ComponentKind;
use crate::rig::Rig;

/// Build parameters for [`WorldComponent::create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldParams {
    /// Control shape scale.
    pub scale: f64,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

/// World flag, offset flag and root flag stacked over one duplicated root
/// joint.
#[derive(Debug, Clone)]
pub struct WorldComponent {
    base: RigComponent,
}

impl WorldComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Builds the world control stack over `root_joint`.
    pub fn create(
        scene: &mut Scene,
        rig: &Rig,
        root_joint: NodeId,
        side: &str,
        region: &str,
        params: WorldParams,
    ) -> Result<Option<Self>, BuildError> {
        if !scene.exists(root_joint) {
            warn!(side, region, "world build skipped: root joint is missing");
            return Ok(None);
        }
        let component = scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::World,
                Self::VERSION,
                side,
                region,
                Some(root_joint),
            )?;
            base.store_kwargs(scene, &params)?;
            let (flag_grp, nt_grp) = base.groups(scene)?;

            let dup_name = format!("{}_world_chain", scene.name(root_joint)?);
            let dup = duplicate_joint(scene, root_joint, &dup_name)?;
            let world_pose = scene.world_transform(root_joint)?;
            scene.set_parent(dup, Some(nt_grp))?;
            scene.set_world(dup, world_pose)?;

            let world_flag = Flag::create(scene, root_joint, "world", side, region)?;
            if let Some(align) = world_flag.align_transform(scene) {
                scene.reparent_keep_world(align, Some(flag_grp))?;
            }
            world_flag.lock_and_hide(scene, &["v"])?;

            let offset_flag = Flag::create(scene, root_joint, "world_offset", side, region)?;
            offset_flag.set_flag_type(scene, FlagType::Detail)?;
            if let Some(align) = offset_flag.align_transform(scene) {
                scene.reparent_keep_world(align, Some(world_flag.node()))?;
            }
            offset_flag.lock_and_hide(scene, &["sx", "sy", "sz", "v"])?;

            let root_flag = Flag::create(scene, root_joint, "root", side, region)?;
            root_flag.set_flag_type(scene, FlagType::Sub)?;
            if let Some(align) = root_flag.align_transform(scene) {
                scene.reparent_keep_world(align, Some(offset_flag.node()))?;
            }
            root_flag.lock_and_hide(scene, &["sx", "sy", "sz", "v"])?;

            scene.add_constraint(ConstraintKind::Parent, &[root_flag.node()], dup, true)?;
            scene.add_constraint(ConstraintKind::Parent, &[dup], root_joint, true)?;

            base.add_flags(scene, &[world_flag, offset_flag, root_flag])?;
            base.node().connect_nodes(scene, &[dup], "worldChain", true)?;
            base.set_bind_joints(scene, &[root_joint])?;
            Ok::<_, BuildError>(Self { base })
        })?;
        Ok(Some(component))
    }

    /// Rebuilds the wrapper from a resolved base.
    #[must_use]
    pub fn from_base(base: RigComponent) -> Self {
        Self { base }
    }

    /// The top world flag.
    #[must_use]
    pub fn world_flag(&self, scene: &Scene) -> Option<Flag> {
        self.flags(scene).into_iter().next()
    }

    /// The root (sub) flag at the bottom of the stack.
    #[must_use]
    pub fn root_flag(&self, scene: &Scene) -> Option<Flag> {
        self.flags(scene).into_iter().nth(2)
    }
}

impl Component for WorldComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::World
    }
}
