// SPDX-License-Identifier: Apache-2.0
//! Reverse-foot pivot stack.
//!
//! The foot flag carries one scalar per pivot; each scalar rotates exactly
//! one pivot transform about its declared axis. `footLean` is the odd one
//! out: a signed scalar split through a dual clamp into two unsigned
//! halves, [0, 180] onto the exterior pivot and [-180, 0] onto the
//! interior pivot.

use marionette_scene::{ConstraintKind, LinkOp, NodeId, NodeKind, Plug, Scene};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chain::{between_joints, duplicate_joint};
use crate::component::{Component, RigComponent};
use crate::error::BuildError;
use crate::flag::Flag;
use crate::kind::ComponentKind;
use crate::markup::SkeletonHierarchy;
use crate::rig::Rig;

/// Foot attributes on the flag, in pivot order.
pub const FOOT_ATTRS: [&str; 6] = [
    "toePivot",
    "toeLift",
    "ballPivot",
    "ballLift",
    "heelLift",
    "footLean",
];

/// Contact-region suffixes looked up under the component's own region.
const CONTACT_SUFFIXES: [&str; 5] = ["toe", "ball", "heel", "exterior", "interior"];

/// Build parameters for [`ReverseFootComponent::create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverseFootParams {
    /// Control shape scale.
    pub scale: f64,
    /// Channel the toe pivot swivels on.
    pub toe_pivot_axis: String,
    /// Channel the toe contact lifts on.
    pub toe_lift_axis: String,
    /// Channel the ball pivot swivels on.
    pub ball_pivot_axis: String,
    /// Channel the ball pivot lifts on.
    pub ball_lift_axis: String,
    /// Channel the heel contact lifts on.
    pub heel_lift_axis: String,
    /// Channel the lean halves write to on the side pivots.
    pub lean_axis: String,
}

impl Default for ReverseFootParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            toe_pivot_axis: "ry".into(),
            toe_lift_axis: "rx".into(),
            ball_pivot_axis: "ry".into(),
            ball_lift_axis: "rx".into(),
            heel_lift_axis: "rx".into(),
            lean_axis: "rz".into(),
        }
    }
}

/// Fixed pivot stack rolling a foot chain around its contact joints.
#[derive(Debug, Clone)]
pub struct ReverseFootComponent {
    base: RigComponent,
}

impl ReverseFootComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Builds the pivot stack for the `start..=end` foot chain.
    ///
    /// The five contact joints are resolved from `<region>_toe`,
    /// `<region>_ball`, `<region>_heel`, `<region>_exterior` and
    /// `<region>_interior` markup; any missing contact warns and skips the
    /// build.
    ///
    /// # Errors
    /// [`BuildError::ChainArity`] when the foot chain is not exactly four
    /// joints (ankle, ball, toe, toe tip).
    pub fn create(
        scene: &mut Scene,
        rig: &Rig,
        hierarchy: &SkeletonHierarchy,
        start: NodeId,
        end: NodeId,
        side: &str,
        region: &str,
        params: ReverseFootParams,
    ) -> Result<Option<Self>, BuildError> {
        let Some(bind_chain) = between_joints(scene, start, end) else {
            warn!(side, region, "reverse foot skipped: end joint does not descend from start");
            return Ok(None);
        };
        if bind_chain.len() != 4 {
            return Err(BuildError::ChainArity {
                kind: "ReverseFootComponent",
                expected: "4",
                got: bind_chain.len(),
            });
        }
        let mut contacts = Vec::with_capacity(CONTACT_SUFFIXES.len());
        for suffix in CONTACT_SUFFIXES {
            let contact_region = format!("{region}_{suffix}");
            let Some(joint) = hierarchy.get_start(side, &contact_region) else {
                warn!(side, contact_region, "reverse foot skipped: contact joint not marked up");
                return Ok(None);
            };
            contacts.push(joint);
        }
        let (toe, ball, heel, exterior, interior) =
            (contacts[0], contacts[1], contacts[2], contacts[3], contacts[4]);

        let component = scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::ReverseFoot,
                Self::VERSION,
                side,
                region,
                Some(start),
            )?;
            base.store_kwargs(scene, &params)?;
            let (flag_grp, _nt_grp) = base.groups(scene)?;

            let label = scene.name(start)?;
            let flag = Flag::create(scene, start, &label, side, region)?;
            if let Some(align) = flag.align_transform(scene) {
                scene.reparent_keep_world(align, Some(flag_grp))?;
            }
            flag.lock_and_hide(scene, &["sx", "sy", "sz", "v"])?;
            for attr in FOOT_ATTRS {
                scene.set_attr(flag.node(), attr, 0.0_f64)?;
            }

            // Pivot stack nested under the flag, outermost first. The
            // stack order is fixed: toe_pivot, toe_contact, ball_pivot,
            // ext_contact, int_contact, heel_contact.
            let stack = [
                ("toe_pivot", toe),
                ("toe_contact", toe),
                ("ball_pivot", ball),
                ("ext_contact", exterior),
                ("int_contact", interior),
                ("heel_contact", heel),
            ];
            let mut pivots: Vec<NodeId> = Vec::with_capacity(stack.len());
            let mut parent = flag.node();
            for (suffix, target) in stack {
                let pivot =
                    scene.create_node(format!("{side}_{region}_{suffix}"), NodeKind::Transform);
                scene.set_parent(pivot, Some(parent))?;
                scene.align_to(pivot, target)?;
                parent = pivot;
                pivots.push(pivot);
            }

            let wire = |scene: &mut Scene, attr: &str, pivot: NodeId, axis: &str, op: LinkOp| {
                scene.add_link(Plug::new(flag.node(), attr), op, Plug::new(pivot, axis))
            };
            wire(scene, "toePivot", pivots[0], &params.toe_pivot_axis, LinkOp::Direct)?;
            wire(scene, "toeLift", pivots[1], &params.toe_lift_axis, LinkOp::Direct)?;
            wire(scene, "ballPivot", pivots[2], &params.ball_pivot_axis, LinkOp::Direct)?;
            wire(scene, "ballLift", pivots[2], &params.ball_lift_axis, LinkOp::Direct)?;
            wire(
                scene,
                "footLean",
                pivots[3],
                &params.lean_axis,
                LinkOp::Clamp { min: 0.0, max: 180.0 },
            )?;
            wire(
                scene,
                "footLean",
                pivots[4],
                &params.lean_axis,
                LinkOp::Clamp { min: -180.0, max: 0.0 },
            )?;
            wire(scene, "heelLift", pivots[5], &params.heel_lift_axis, LinkOp::Direct)?;

            // Private foot chain rides the innermost pivot and drives the
            // bind chain.
            let mut dups: Vec<NodeId> = Vec::with_capacity(bind_chain.len());
            for joint in &bind_chain {
                let name = format!("{}_foot_chain", scene.name(*joint)?);
                let dup = duplicate_joint(scene, *joint, &name)?;
                match dups.last() {
                    Some(prev) => scene.set_parent(dup, Some(*prev))?,
                    None => {
                        let world = scene.world_transform(*joint)?;
                        scene.set_parent(dup, Some(pivots[5]))?;
                        scene.set_world(dup, world)?;
                    }
                }
                dups.push(dup);
            }
            for (dup, bind) in dups.iter().zip(&bind_chain) {
                scene.add_constraint(ConstraintKind::Parent, &[*dup], *bind, true)?;
            }

            base.add_flags(scene, &[flag])?;
            base.node().connect_nodes(scene, &pivots, "pivots", true)?;
            base.node().connect_nodes(scene, &dups, "footChain", true)?;
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

    /// The pivot stack, outermost first.
    #[must_use]
    pub fn pivots(&self, scene: &Scene) -> Vec<NodeId> {
        self.base.node().connected_nodes(scene, "pivots")
    }

    /// The foot flag.
    #[must_use]
    pub fn foot_flag(&self, scene: &Scene) -> Option<Flag> {
        self.flags(scene).into_iter().next()
    }
}

impl Component for ReverseFootComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::ReverseFoot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{set_chain_end, set_chain_start, set_joint_region, set_joint_side};
    use crate::root::AssetRoot;
    use glam::DVec3;
    use marionette_scene::Transform;

    fn joint(scene: &mut Scene, name: &str, parent: Option<NodeId>, t: DVec3) -> NodeId {
        let j = scene.create_node(name, NodeKind::Joint);
        if let Some(p) = parent {
            scene.set_parent(j, Some(p)).unwrap();
        }
        scene.set_local(j, Transform::from_translation(t)).unwrap();
        j
    }

    fn foot_fixture(scene: &mut Scene) -> (Rig, SkeletonHierarchy, NodeId, NodeId) {
        let root = joint(scene, "root", None, DVec3::ZERO);
        set_joint_side(scene, root, "center");
        set_chain_start(scene, root, "root");
        set_chain_end(scene, root, "root");

        let ankle = joint(scene, "ankle_l", Some(root), DVec3::new(0.0, 1.0, 0.0));
        set_joint_side(scene, ankle, "left");
        set_chain_start(scene, ankle, "foot");
        let ball = joint(scene, "ball_l", Some(ankle), DVec3::new(0.0, -0.8, 1.0));
        set_joint_side(scene, ball, "left");
        set_joint_region(scene, ball, "foot");
        let toe = joint(scene, "toe_l", Some(ball), DVec3::new(0.0, 0.0, 0.8));
        set_joint_side(scene, toe, "left");
        set_joint_region(scene, toe, "foot");
        let tip = joint(scene, "toe_tip_l", Some(toe), DVec3::new(0.0, 0.0, 0.4));
        set_joint_side(scene, tip, "left");
        set_chain_end(scene, tip, "foot");

        for (name, region, t) in [
            ("toe_contact_l", "foot_toe", DVec3::new(0.0, -0.2, 2.2)),
            ("ball_contact_l", "foot_ball", DVec3::new(0.0, -0.2, 1.0)),
            ("heel_contact_l", "foot_heel", DVec3::new(0.0, -0.2, -0.4)),
            ("ext_contact_l", "foot_exterior", DVec3::new(0.5, -0.2, 1.0)),
            ("int_contact_l", "foot_interior", DVec3::new(-0.5, -0.2, 1.0)),
        ] {
            let c = joint(scene, name, Some(ankle), t);
            set_joint_side(scene, c, "left");
            set_chain_start(scene, c, region);
        }

        let asset_root = AssetRoot::create(scene, root, "character", "ch_001", "biped").unwrap();
        let rig = Rig::create(scene, &asset_root).unwrap();
        let skel = SkeletonHierarchy::build(scene, root).unwrap();
        (rig, skel, ankle, tip)
    }

    #[test]
    fn foot_lean_splits_into_unsigned_halves() {
        let mut scene = Scene::new();
        let (rig, skel, ankle, tip) = foot_fixture(&mut scene);
        let foot = ReverseFootComponent::create(
            &mut scene,
            &rig,
            &skel,
            ankle,
            tip,
            "left",
            "foot",
            ReverseFootParams::default(),
        )
        .unwrap()
        .unwrap();

        let flag = foot.foot_flag(&scene).unwrap();
        let pivots = foot.pivots(&scene);
        let lean_of = |scene: &Scene, pivot: NodeId| scene.local(pivot).unwrap().euler_deg().z;

        for (lean, ext, int) in [(90.0, 90.0, 0.0), (-90.0, 0.0, -90.0), (0.0, 0.0, 0.0)] {
            scene.set_attr(flag.node(), "footLean", lean).unwrap();
            scene.evaluate();
            assert!((lean_of(&scene, pivots[3]) - ext).abs() < 1e-6, "ext at lean {lean}");
            assert!((lean_of(&scene, pivots[4]) - int).abs() < 1e-6, "int at lean {lean}");
        }
    }

    #[test]
    fn missing_contact_markup_skips_the_build() {
        let mut scene = Scene::new();
        let (rig, _, ankle, tip) = foot_fixture(&mut scene);
        // Rebuild the index against a skeleton whose heel contact is gone.
        let heel = scene.find_by_name("heel_contact_l").unwrap();
        scene.delete(heel);
        let root = scene.find_by_name("root").unwrap();
        let skel = SkeletonHierarchy::build(&scene, root).unwrap();

        let before = scene.node_count();
        let result = ReverseFootComponent::create(
            &mut scene,
            &rig,
            &skel,
            ankle,
            tip,
            "left",
            "foot",
            ReverseFootParams::default(),
        )
        .unwrap();
        assert!(result.is_none());
        assert_eq!(scene.node_count(), before);
    }

    #[test]
    fn short_chain_is_structural() {
        let mut scene = Scene::new();
        let (rig, skel, ankle, _) = foot_fixture(&mut scene);
        let err = ReverseFootComponent::create(
            &mut scene,
            &rig,
            &skel,
            ankle,
            ankle,
            "left",
            "foot",
            ReverseFootParams::default(),
        );
        assert!(matches!(err, Err(BuildError::ChainArity { .. })));
    }
}
