// SPDX-License-Identifier: Apache-2.0
//! Forward-kinematics chain component.

use marionette_scene::{ConstraintKind, LinkOp, NodeId, Plug, Scene, SCALE_CHANNELS};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chain::{between_joints, duplicate_joint};
use crate::component::{Component, RigComponent};
use crate::error::BuildError;
use crate::flag::{Flag, FlagType};
use crate::kind::ComponentKind;
use crate::rig::Rig;

fn translation_axes() -> Vec<String> {
    vec!["tx".into(), "ty".into(), "tz".into()]
}

fn scale_axes() -> Vec<String> {
    vec!["sx".into(), "sy".into(), "sz".into()]
}

/// Build parameters for [`FkComponent::create`], captured verbatim on the
/// node for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FkParams {
    /// Control shape scale.
    pub scale: f64,
    /// Channels locked on the first control.
    pub lock_root_translate_axes: Vec<String>,
    /// Rotation channels locked on the first control.
    pub lock_root_rotate_axes: Vec<String>,
    /// Channels locked on every child control.
    pub lock_child_translate_axes: Vec<String>,
    /// Rotation channels locked on every child control.
    pub lock_child_rotate_axes: Vec<String>,
    /// Scale channels locked on every control.
    pub lock_scale_axes: Vec<String>,
    /// Drive bind translation.
    pub constrain_translate: bool,
    /// Drive bind rotation.
    pub constrain_rotate: bool,
    /// Pass scale through onto the bind chain.
    pub constrain_scale: bool,
    /// Layer a fine-orientation offset flag on the last control.
    pub offset_flag: bool,
}

impl Default for FkParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            lock_root_translate_axes: translation_axes(),
            lock_root_rotate_axes: Vec::new(),
            lock_child_translate_axes: translation_axes(),
            lock_child_rotate_axes: Vec::new(),
            lock_scale_axes: scale_axes(),
            constrain_translate: true,
            constrain_rotate: true,
            constrain_scale: false,
            offset_flag: false,
        }
    }
}

/// One rotation-style control per joint over a privately duplicated chain.
#[derive(Debug, Clone)]
pub struct FkComponent {
    base: RigComponent,
}

impl FkComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Builds an FK chain between `start` and `end`.
    ///
    /// Returns `Ok(None)` (with a warning) when `end` does not descend from
    /// `start` — a batch build continues past it.
    pub fn create(
        scene: &mut Scene,
        rig: &Rig,
        start: NodeId,
        end: NodeId,
        side: &str,
        region: &str,
        params: FkParams,
    ) -> Result<Option<Self>, BuildError> {
        let Some(bind_chain) = between_joints(scene, start, end) else {
            warn!(side, region, "fk build skipped: end joint does not descend from start");
            return Ok(None);
        };
        let component = scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::Fk,
                Self::VERSION,
                side,
                region,
                Some(start),
            )?;
            base.store_kwargs(scene, &params)?;
            let (flag_grp, nt_grp) = base.groups(scene)?;

            // Private duplicate of the bind sub-chain.
            let mut dups: Vec<NodeId> = Vec::with_capacity(bind_chain.len());
            for joint in &bind_chain {
                let name = format!("{}_fk_chain", scene.name(*joint)?);
                let dup = duplicate_joint(scene, *joint, &name)?;
                match dups.last() {
                    Some(prev) => scene.set_parent(dup, Some(*prev))?,
                    None => {
                        let world = scene.world_transform(*joint)?;
                        scene.set_parent(dup, Some(nt_grp))?;
                        scene.set_world(dup, world)?;
                    }
                }
                dups.push(dup);
            }

            // One control per joint, aligns nested control-to-control.
            let mut flags: Vec<Flag> = Vec::with_capacity(dups.len());
            for (i, dup) in dups.iter().enumerate() {
                let label = scene.name(bind_chain[i])?;
                let flag = Flag::create(scene, *dup, &label, side, region)?;
                if let Some(align) = flag.align_transform(scene) {
                    let parent = match flags.last() {
                        Some(prev) => prev.node(),
                        None => flag_grp,
                    };
                    scene.reparent_keep_world(align, Some(parent))?;
                }
                let mut locked: Vec<&str> = vec!["v"];
                let (t_axes, r_axes) = if i == 0 {
                    (&params.lock_root_translate_axes, &params.lock_root_rotate_axes)
                } else {
                    (&params.lock_child_translate_axes, &params.lock_child_rotate_axes)
                };
                locked.extend(t_axes.iter().map(String::as_str));
                locked.extend(r_axes.iter().map(String::as_str));
                locked.extend(params.lock_scale_axes.iter().map(String::as_str));
                flag.lock_and_hide(scene, &locked)?;
                flags.push(flag);
            }

            // Optional offset flag layered on the end control.
            let mut end_driver = flags[flags.len() - 1];
            if params.offset_flag {
                let label = format!("{}_offset", scene.name(bind_chain[bind_chain.len() - 1])?);
                let offset = Flag::create(
                    scene,
                    dups[dups.len() - 1],
                    &label,
                    side,
                    region,
                )?;
                offset.set_flag_type(scene, FlagType::Detail)?;
                if let Some(align) = offset.align_transform(scene) {
                    scene.reparent_keep_world(align, Some(end_driver.node()))?;
                }
                offset.lock_and_hide(scene, &["tx", "ty", "tz", "sx", "sy", "sz", "v"])?;
                base.node().connect_nodes(scene, &[offset.node()], "offsetFlag", true)?;
                end_driver = offset;
            }

            // Controls drive the duplicate chain.
            for (i, dup) in dups.iter().enumerate() {
                let driver = if i == dups.len() - 1 {
                    end_driver
                } else {
                    flags[i]
                };
                scene.add_constraint(ConstraintKind::Parent, &[driver.node()], *dup, true)?;
            }

            // The duplicate chain drives the bind chain.
            for (dup, bind) in dups.iter().zip(&bind_chain) {
                match (params.constrain_translate, params.constrain_rotate) {
                    (true, true) => {
                        scene.add_constraint(ConstraintKind::Parent, &[*dup], *bind, true)?;
                    }
                    (true, false) => {
                        scene.add_constraint(ConstraintKind::Point, &[*dup], *bind, true)?;
                    }
                    (false, true) => {
                        scene.add_constraint(ConstraintKind::Orient, &[*dup], *bind, true)?;
                    }
                    (false, false) => {}
                }
                if params.constrain_scale {
                    // Direct channel links handle scaled parents better than
                    // a scale constraint here.
                    for ch in SCALE_CHANNELS {
                        scene.add_link(
                            Plug::new(*dup, ch),
                            LinkOp::Direct,
                            Plug::new(*bind, ch),
                        )?;
                    }
                }
            }

            base.add_flags(scene, &flags)?;
            base.node().connect_nodes(scene, &dups, "fkChain", true)?;
            base.set_bind_joints(scene, &bind_chain)?;
            Ok::<_, BuildError>(Self { base })
        })?;
        Ok(Some(component))
    }

    /// Rebuilds the wrapper from a resolved base.
    #[must_use]
    pub fn from_base(base: RigComponent) -> Self {
        Self { base }
    }

    /// First control of the chain.
    #[must_use]
    pub fn start_flag(&self, scene: &Scene) -> Option<Flag> {
        self.flags(scene).into_iter().next()
    }

    /// Last control of the chain.
    #[must_use]
    pub fn end_flag(&self, scene: &Scene) -> Option<Flag> {
        self.flags(scene).into_iter().last()
    }

    /// The offset flag, when the build asked for one.
    #[must_use]
    pub fn offset_flag(&self, scene: &Scene) -> Option<Flag> {
        self.base
            .node()
            .connected_node(scene, "offsetFlag")
            .and_then(|id| Flag::from_node(scene, id))
    }
}

impl Component for FkComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Fk
    }
}
