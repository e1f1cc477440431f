// SPDX-License-Identifier: Apache-2.0
//! IK chain component (2–4 joints).

use glam::DVec3;
use marionette_scene::{ConstraintKind, LinkOp, NodeId, NodeKind, Plug, Scene, Transform};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chain::{between_joints, duplicate_joint};
use crate::component::{Attachment, Component, RigComponent, BAKE_HELPER_ATTR};
use crate::error::BuildError;
use crate::flag::{Flag, FlagType};
use crate::kind::ComponentKind;
use crate::markup::SkeletonHierarchy;
use crate::rig::Rig;

/// World position where a pole vector belongs for a joint chain.
///
/// The mid joint is projected onto the start→end line; the pole sits along
/// the rejection, pushed out by the chain length so the solve plane stays
/// unambiguous. Even-length chains take the midpoint of the two middle
/// joints.
#[must_use]
pub fn pole_vector_position(positions: &[DVec3]) -> DVec3 {
    let root = positions[0];
    let end = positions[positions.len() - 1];
    let mid = if positions.len() % 2 == 1 {
        positions[(positions.len() - 1) / 2]
    } else {
        let prev = positions[positions.len() / 2 - 1];
        let next = positions[positions.len() / 2];
        (prev + next) * 0.5
    };

    let line = end - root;
    let point = mid - root;
    let denom = line.dot(line);
    let projected = if denom < 1e-12 {
        root
    } else {
        line * (line.dot(point) / denom) + root
    };
    let total_len = (mid - root).length() + (end - mid).length();
    let out = mid - projected;
    let out = if out.length_squared() < 1e-12 {
        line.any_orthogonal_vector().normalize_or_zero()
    } else {
        out.normalize()
    };
    out * total_len + mid
}

/// Build parameters for [`IkComponent::create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IkParams {
    /// Control shape scale.
    pub scale: f64,
    /// Optional world-space euler orientation for the end flag.
    pub ik_flag_orient: Option<[f64; 3]>,
    /// Rotate order recorded on the end flag.
    pub ik_flag_rotate_order: Option<String>,
    /// Channels locked on the pole-vector flag.
    pub lock_pv_axes: Vec<String>,
}

impl Default for IkParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            ik_flag_orient: None,
            ik_flag_rotate_order: None,
            lock_pv_axes: vec![
                "rx".into(),
                "ry".into(),
                "rz".into(),
                "sx".into(),
                "sy".into(),
                "sz".into(),
            ],
        }
    }
}

/// IK solve over a private chain with pole-vector and offset controls.
#[derive(Debug, Clone)]
pub struct IkComponent {
    base: RigComponent,
}

impl IkComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Builds an IK setup between `start` and `end`.
    ///
    /// # Errors
    /// [`BuildError::ChainArity`] when the chain is not 2–4 joints —
    /// continuing would build an unsolvable setup.
    pub fn create(
        scene: &mut Scene,
        rig: &Rig,
        start: NodeId,
        end: NodeId,
        side: &str,
        region: &str,
        params: IkParams,
    ) -> Result<Option<Self>, BuildError> {
        let Some(bind_chain) = between_joints(scene, start, end) else {
            warn!(side, region, "ik build skipped: end joint does not descend from start");
            return Ok(None);
        };
        if !(2..=4).contains(&bind_chain.len()) {
            return Err(BuildError::ChainArity {
                kind: "IkComponent",
                expected: "2-4",
                got: bind_chain.len(),
            });
        }
        let component = scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::Ik,
                Self::VERSION,
                side,
                region,
                Some(start),
            )?;
            base.store_kwargs(scene, &params)?;
            let (flag_grp, nt_grp) = base.groups(scene)?;

            let mut dups: Vec<NodeId> = Vec::with_capacity(bind_chain.len());
            for joint in &bind_chain {
                let name = format!("{}_ik_chain", scene.name(*joint)?);
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

            // Retained handle record; the host solver owns the actual solve.
            let handle = scene.create_node(
                format!("{side}_{region}_ikhandle"),
                NodeKind::IkHandle,
            );
            scene.set_parent(handle, Some(nt_grp))?;
            scene.set_attr(handle, "twist", 0.0_f64)?;
            scene.connect(dups[0], handle, "startJoint")?;
            scene.connect(dups[dups.len() - 1], handle, "endJoint")?;

            // Primary flag at the chain end, orientation parametrized.
            let end_label = scene.name(bind_chain[bind_chain.len() - 1])?;
            let ik_flag = Flag::create(
                scene,
                dups[dups.len() - 1],
                &end_label,
                side,
                region,
            )?;
            if let Some(align) = ik_flag.align_transform(scene) {
                scene.reparent_keep_world(align, Some(flag_grp))?;
                if let Some(euler) = params.ik_flag_orient {
                    let mut world = scene.world_transform(align)?;
                    world.set_euler_deg(DVec3::from_array(euler));
                    scene.set_world(align, world)?;
                }
            }
            if let Some(order) = &params.ik_flag_rotate_order {
                scene.set_attr(ik_flag.node(), "rotateOrder", order.as_str())?;
            }
            ik_flag.lock_and_hide(scene, &["sx", "sy", "sz", "v"])?;

            // Twist scalar rides the primary flag into the handle.
            scene.set_attr(ik_flag.node(), "ikTwist", 0.0_f64)?;
            scene.add_link(
                Plug::new(ik_flag.node(), "ikTwist"),
                LinkOp::Direct,
                Plug::new(handle, "twist"),
            )?;

            // Pole-vector flag on the solve plane.
            let positions: Vec<DVec3> = bind_chain
                .iter()
                .map(|j| scene.world_transform(*j).map(|w| w.translation))
                .collect::<Result<_, _>>()?;
            let pv_pos = pole_vector_position(&positions);
            let pv_flag = Flag::create(
                scene,
                dups[dups.len() / 2],
                &format!("{side}_{region}_pv"),
                side,
                region,
            )?;
            if let Some(align) = pv_flag.align_transform(scene) {
                scene.reparent_keep_world(align, Some(flag_grp))?;
                scene.set_world(align, Transform::from_translation(pv_pos))?;
            }
            let lock_pv: Vec<&str> = params
                .lock_pv_axes
                .iter()
                .map(String::as_str)
                .chain(std::iter::once("v"))
                .collect();
            pv_flag.lock_and_hide(scene, &lock_pv)?;

            // Offset flag layered on the solve for fine orientation.
            let offset_flag = Flag::create(
                scene,
                dups[dups.len() - 1],
                &format!("{end_label}_offset"),
                side,
                region,
            )?;
            offset_flag.set_flag_type(scene, FlagType::Detail)?;
            if let Some(align) = offset_flag.align_transform(scene) {
                scene.reparent_keep_world(align, Some(ik_flag.node()))?;
            }
            offset_flag.lock_and_hide(scene, &["tx", "ty", "tz", "sx", "sy", "sz", "v"])?;

            // The primary flag carries the handle, the offset flag owns the
            // end orientation after the solve.
            scene.add_constraint(ConstraintKind::Parent, &[ik_flag.node()], handle, true)?;
            scene.add_constraint(
                ConstraintKind::Orient,
                &[offset_flag.node()],
                dups[dups.len() - 1],
                true,
            )?;

            for (dup, bind) in dups.iter().zip(&bind_chain) {
                scene.add_constraint(ConstraintKind::Parent, &[*dup], *bind, true)?;
            }

            base.add_flags(scene, &[ik_flag, pv_flag, offset_flag])?;
            base.node().connect_nodes(scene, &dups, "ikChain", true)?;
            base.node().connect_nodes(scene, &[handle], "ikHandle", true)?;
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

    /// The primary (end) flag.
    #[must_use]
    pub fn ik_flag(&self, scene: &Scene) -> Option<Flag> {
        self.flags(scene).into_iter().next()
    }

    /// The pole-vector flag.
    #[must_use]
    pub fn pv_flag(&self, scene: &Scene) -> Option<Flag> {
        self.flags(scene).into_iter().nth(1)
    }
}

impl Component for IkComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Ik
    }

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
        let chain = skel.get_full_chain(&side, &region);
        if chain.len() < 3 {
            warn!(side, region, "ik attach skipped: target chain too short");
            return Ok(None);
        }
        let Some(ik_flag) = self.ik_flag(scene) else {
            warn!(side, region, "ik attach skipped: missing primary flag");
            return Ok(None);
        };
        let Some(pv_flag) = self.pv_flag(scene) else {
            warn!(side, region, "ik attach skipped: missing pole-vector flag");
            return Ok(None);
        };

        let mut links = Vec::new();
        links.push(scene.add_constraint(
            ConstraintKind::Parent,
            &[chain[chain.len() - 1]],
            ik_flag.node(),
            true,
        )?);

        // Throwaway pole locator keeps the pv flag on the live solve plane
        // while baking; deleted with the attachment.
        let positions: Vec<DVec3> = chain
            .iter()
            .take(3)
            .map(|j| scene.world_transform(*j).map(|w| w.translation))
            .collect::<Result<_, _>>()?;
        let pv_locator = scene.create_node(format!("{side}_{region}_pv_loc"), NodeKind::Locator);
        scene.set_attr(pv_locator, BAKE_HELPER_ATTR, true)?;
        scene.set_world(
            pv_locator,
            Transform::from_translation(pole_vector_position(&positions)),
        )?;
        scene.reparent_keep_world(pv_locator, Some(chain[1]))?;
        links.push(scene.add_constraint(
            ConstraintKind::Parent,
            &[pv_locator],
            pv_flag.node(),
            true,
        )?);

        Ok(Some(Attachment {
            hierarchy: skel.clone(),
            links,
            helpers: vec![pv_locator],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pole_sits_on_the_bend_plane() {
        // Right-angle arm in the XY plane bending toward +Y.
        let positions = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(2.0, 0.0, 0.0),
        ];
        let pv = pole_vector_position(&positions);
        // Coplanar with the chain and on the mid joint's side of the line.
        assert!(pv.z.abs() < 1e-9);
        assert!(pv.y > 1.0);
        assert!((pv.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn straight_chain_still_produces_an_offset_pole() {
        let positions = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(2.0, 0.0, 0.0),
        ];
        let pv = pole_vector_position(&positions);
        assert!((pv - positions[1]).length() > 1.0);
    }
}
