// SPDX-License-Identifier: Apache-2.0
//! Surface-pinned single control.

use marionette_scene::{ConstraintKind, NodeId, NodeKind, Scene};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chain::duplicate_joint;
use crate::component::{Component, RigComponent};
use crate::error::BuildError;
use crate::flag::Flag;
use crate::kind::ComponentKind;
use crate::rig::Rig;

/// Plug holding the surface object the pivot hangs under.
pub const SURFACE_ATTR: &str = "surface";
/// Plug holding the pivot locator.
pub const PIVOT_ATTR: &str = "pivot";

/// Build parameters for [`PinComponent::create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinParams {
    /// Control shape scale.
    pub scale: f64,
    /// UV coordinates recorded on the surface attachment pivot.
    pub uv: [f64; 2],
}

impl Default for PinParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            uv: [0.5, 0.5],
        }
    }
}

/// One joint pinned to a surface through a UV pivot, with an FK control on
/// top.
#[derive(Debug, Clone)]
pub struct PinComponent {
    base: RigComponent,
}

impl PinComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Pins `joint` under `surface` (or under the component's own
    /// do-not-touch group when no surface is given).
    pub fn create(
        scene: &mut Scene,
        rig: &Rig,
        joint: NodeId,
        surface: Option<NodeId>,
        side: &str,
        region: &str,
        params: PinParams,
    ) -> Result<Option<Self>, BuildError> {
        if !scene.exists(joint) {
            warn!(side, region, "pin skipped: target joint is missing");
            return Ok(None);
        }
        let component = scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::Pin,
                Self::VERSION,
                side,
                region,
                Some(joint),
            )?;
            base.store_kwargs(scene, &params)?;
            let (_flag_grp, nt_grp) = base.groups(scene)?;

            // UV-style attachment point; the host surface node owns where
            // it actually lands on the mesh.
            let pivot = scene.create_node(format!("{side}_{region}_pin_pivot"), NodeKind::Locator);
            scene.set_parent(pivot, Some(surface.unwrap_or(nt_grp)))?;
            let world = scene.world_transform(joint)?;
            scene.set_world(pivot, world)?;
            scene.set_attr(pivot, "u", params.uv[0])?;
            scene.set_attr(pivot, "v", params.uv[1])?;

            let dup_name = format!("{}_pin", scene.name(joint)?);
            let dup = duplicate_joint(scene, joint, &dup_name)?;
            scene.set_parent(dup, Some(pivot))?;
            scene.set_world(dup, world)?;

            // Single-joint FK control riding the pivot.
            let label = scene.name(joint)?;
            let flag = Flag::create(scene, dup, &label, side, region)?;
            if let Some(align) = flag.align_transform(scene) {
                scene.reparent_keep_world(align, Some(pivot))?;
            }
            flag.lock_and_hide(scene, &["sx", "sy", "sz", "v"])?;
            scene.add_constraint(ConstraintKind::Parent, &[flag.node()], dup, true)?;
            scene.add_constraint(ConstraintKind::Parent, &[dup], joint, true)?;

            if let Some(surface) = surface {
                base.node().connect_nodes(scene, &[surface], SURFACE_ATTR, false)?;
            }
            base.node().connect_nodes(scene, &[pivot], PIVOT_ATTR, true)?;
            base.add_flags(scene, &[flag])?;
            base.set_bind_joints(scene, &[joint])?;
            Ok::<_, BuildError>(Self { base })
        })?;
        Ok(Some(component))
    }

    /// Rebuilds the wrapper from a resolved base.
    #[must_use]
    pub fn from_base(base: RigComponent) -> Self {
        Self { base }
    }

    /// The UV pivot locator.
    #[must_use]
    pub fn pivot(&self, scene: &Scene) -> Option<NodeId> {
        self.base.node().connected_node(scene, PIVOT_ATTR)
    }

    /// The surface the pivot hangs under, if one was given.
    #[must_use]
    pub fn surface(&self, scene: &Scene) -> Option<NodeId> {
        self.base.node().connected_node(scene, SURFACE_ATTR)
    }
}

impl Component for PinComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Pin
    }

    /// Deletes the pivot subtree first: when the pivot hangs under an
    /// external surface the base teardown would not reach it.
    fn remove(&self, scene: &mut Scene) {
        match self.pivot(scene) {
            Some(pivot) => scene.delete(pivot),
            None => debug!("pin pivot already gone"),
        }
        self.base.remove_base(scene);
    }
}
