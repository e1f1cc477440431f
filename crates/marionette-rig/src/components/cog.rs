// SPDX-License-Identifier: Apache-2.0
//! Center-of-gravity control.

use glam::DVec3;
use marionette_scene::{ConstraintKind, NodeId, Scene};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::component::{Attachment, Component, RigComponent};
use crate::error::BuildError;
use crate::flag::Flag;
use crate::kind::ComponentKind;
use crate::markup::SkeletonHierarchy;
use crate::rig::Rig;

/// Build parameters for [`CogComponent::create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CogParams {
    /// Control shape scale.
    pub scale: f64,
    /// Euler-degree orientation offset applied to the control's zero pose.
    pub orientation: [f64; 3],
}

impl Default for CogParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            orientation: [0.0; 3],
        }
    }
}

/// Single-joint control with an orientation offset.
#[derive(Debug, Clone)]
pub struct CogComponent {
    base: RigComponent,
}

impl CogComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Builds the cog control over `joint`.
    pub fn create(
        scene: &mut Scene,
        rig: &Rig,
        joint: NodeId,
        side: &str,
        region: &str,
        params: CogParams,
    ) -> Result<Option<Self>, BuildError> {
        if !scene.exists(joint) {
            warn!(side, region, "cog skipped: target joint is missing");
            return Ok(None);
        }
        let component = scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::Cog,
                Self::VERSION,
                side,
                region,
                Some(joint),
            )?;
            base.store_kwargs(scene, &params)?;
            let (flag_grp, _nt_grp) = base.groups(scene)?;

            let label = scene.name(joint)?;
            let flag = Flag::create(scene, joint, &label, side, region)?;
            if let Some(align) = flag.align_transform(scene) {
                scene.reparent_keep_world(align, Some(flag_grp))?;
                let mut local = scene.local(align)?;
                let euler = local.euler_deg() + DVec3::from_array(params.orientation);
                local.set_euler_deg(euler);
                scene.set_local(align, local)?;
            }
            flag.lock_and_hide(scene, &["sx", "sy", "sz", "v"])?;

            scene.add_constraint(ConstraintKind::Parent, &[flag.node()], joint, true)?;

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

    /// The cog flag.
    #[must_use]
    pub fn cog_flag(&self, scene: &Scene) -> Option<Flag> {
        self.flags(scene).into_iter().next()
    }
}

impl Component for CogComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Cog
    }

    /// Like the default attach, but a missed chain lookup falls back to the
    /// skeleton's hierarchy-start joint before giving up.
    fn attach_to_skeleton(
        &self,
        scene: &mut Scene,
        root: NodeId,
        hierarchy: Option<&SkeletonHierarchy>,
    ) -> Result<Option<Attachment>, BuildError> {
        let built;
        let skel = match hierarchy {
            Some(h) => h,
            None => {
                built = SkeletonHierarchy::build(scene, root)?;
                &built
            }
        };
        let (side, region) = self.base.resolve_attach_key(scene);
        let target = skel
            .get_full_chain(&side, &region)
            .last()
            .copied()
            .or_else(|| skel.hierarchy_start());
        let Some(target) = target else {
            warn!(side, region, "cog attach skipped: no chain and no hierarchy start");
            return Ok(None);
        };
        let Some(flag) = self.cog_flag(scene) else {
            warn!(side, region, "cog attach skipped: missing flag");
            return Ok(None);
        };
        let link = scene.add_constraint(ConstraintKind::Parent, &[target], flag.node(), true)?;
        Ok(Some(Attachment {
            hierarchy: skel.clone(),
            links: vec![link],
            helpers: Vec::new(),
        }))
    }
}
