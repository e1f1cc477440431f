// SPDX-License-Identifier: Apache-2.0
//! Look-at control.

use glam::DVec3;
use marionette_scene::{ConstraintKind, NodeId, NodeKind, Scene, Transform};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::component::{Component, RigComponent};
use crate::error::BuildError;
use crate::flag::Flag;
use crate::kind::ComponentKind;
use crate::rig::Rig;

/// Build parameters for [`AimComponent::create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AimParams {
    /// Control shape scale.
    pub scale: f64,
    /// Local axis pointed at the target flag.
    pub aim_axis: [f64; 3],
    /// Local axis aligned with the up locator.
    pub up_axis: [f64; 3],
    /// Distance the target flag and up locator sit from the joint.
    pub distance: f64,
    /// Proxy mode: build the look-at pair but leave the bind joint alone.
    pub proxy: bool,
}

impl Default for AimParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            aim_axis: [1.0, 0.0, 0.0],
            up_axis: [0.0, 1.0, 0.0],
            distance: 5.0,
            proxy: false,
        }
    }
}

/// Aim-constraint pair (rotate locator + up locator) driving one joint.
#[derive(Debug, Clone)]
pub struct AimComponent {
    base: RigComponent,
}

impl AimComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Builds the look-at setup for `joint`.
    pub fn create(
        scene: &mut Scene,
        rig: &Rig,
        joint: NodeId,
        side: &str,
        region: &str,
        params: AimParams,
    ) -> Result<Option<Self>, BuildError> {
        if !scene.exists(joint) {
            warn!(side, region, "aim skipped: target joint is missing");
            return Ok(None);
        }
        let component = scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::Aim,
                Self::VERSION,
                side,
                region,
                Some(joint),
            )?;
            base.store_kwargs(scene, &params)?;
            let (flag_grp, nt_grp) = base.groups(scene)?;

            let joint_world = scene.world_transform(joint)?;
            let aim_axis = DVec3::from_array(params.aim_axis);
            let up_axis = DVec3::from_array(params.up_axis);

            let rotate_loc =
                scene.create_node(format!("{side}_{region}_aim_rot"), NodeKind::Locator);
            scene.set_parent(rotate_loc, Some(nt_grp))?;
            scene.set_world(rotate_loc, joint_world)?;

            // Target flag out along the aim axis in the joint's frame.
            let label = scene.name(joint)?;
            let flag = Flag::create(scene, joint, &format!("{label}_aim"), side, region)?;
            if let Some(align) = flag.align_transform(scene) {
                scene.reparent_keep_world(align, Some(flag_grp))?;
                let offset = Transform::from_translation(aim_axis * params.distance);
                scene.set_world(align, joint_world.mul(&offset))?;
            }
            flag.lock_and_hide(scene, &["rx", "ry", "rz", "sx", "sy", "sz", "v"])?;

            // Up locator rides the flag so twisting the control rolls the
            // look-at.
            let up_loc = scene.create_node(format!("{side}_{region}_aim_up"), NodeKind::Locator);
            scene.set_parent(up_loc, Some(flag.node()))?;
            let up_offset = Transform::from_translation(up_axis * params.distance);
            scene.set_world(up_loc, joint_world.mul(&up_offset))?;

            scene.add_aim(rotate_loc, flag.node(), aim_axis, up_axis, Some(up_loc))?;
            if !params.proxy {
                scene.add_constraint(ConstraintKind::Orient, &[rotate_loc], joint, true)?;
                base.set_bind_joints(scene, &[joint])?;
            }

            base.node().connect_nodes(scene, &[rotate_loc], "rotateLocator", true)?;
            base.node().connect_nodes(scene, &[up_loc], "upLocator", true)?;
            base.add_flags(scene, &[flag])?;
            Ok::<_, BuildError>(Self { base })
        })?;
        Ok(Some(component))
    }

    /// Rebuilds the wrapper from a resolved base.
    #[must_use]
    pub fn from_base(base: RigComponent) -> Self {
        Self { base }
    }

    /// The aim target flag.
    #[must_use]
    pub fn aim_flag(&self, scene: &Scene) -> Option<Flag> {
        self.flags(scene).into_iter().next()
    }

    /// The locator carrying the solved look-at rotation.
    #[must_use]
    pub fn rotate_locator(&self, scene: &Scene) -> Option<NodeId> {
        self.base.node().connected_node(scene, "rotateLocator")
    }
}

impl Component for AimComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Aim
    }
}
