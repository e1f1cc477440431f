// SPDX-License-Identifier: Apache-2.0
//! Paired look-at joints.
//!
//! Two duplicated joints track their bind joints' positions and aim at
//! each other, then hand the solved rotations back. The rig moves the
//! endpoints; this component only keeps the pair staring down the same
//! line, the way a hydraulic piston stays seated in its housing.

use glam::DVec3;
use marionette_scene::{ConstraintKind, NodeId, Scene};
use serde::Serialize;
use tracing::warn;

use crate::chain::{between_joints, duplicate_joint, primary_axis};
use crate::component::{Component, RigComponent};
use crate::error::BuildError;
use crate::kind::ComponentKind;
use crate::rig::Rig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
struct PistonKwargs {}

/// Two-joint look-at pair.
#[derive(Debug, Clone)]
pub struct PistonComponent {
    base: RigComponent,
}

impl PistonComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Builds the piston pair over the `start..=end` chain.
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
    ) -> Result<Option<Self>, BuildError> {
        let Some(bind_chain) = between_joints(scene, start, end) else {
            warn!(side, region, "piston skipped: end joint does not descend from start");
            return Ok(None);
        };
        if bind_chain.len() != 2 {
            return Err(BuildError::ChainArity {
                kind: "PistonComponent",
                expected: "2",
                got: bind_chain.len(),
            });
        }
        let component = scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::Piston,
                Self::VERSION,
                side,
                region,
                Some(start),
            )?;
            base.store_kwargs(scene, &PistonKwargs {})?;
            let (_flag_grp, nt_grp) = base.groups(scene)?;

            let mut dups: Vec<NodeId> = Vec::with_capacity(2);
            for joint in &bind_chain {
                let name = format!("{}_piston", scene.name(*joint)?);
                let dup = duplicate_joint(scene, *joint, &name)?;
                let world = scene.world_transform(*joint)?;
                scene.set_parent(dup, Some(nt_grp))?;
                scene.set_world(dup, world)?;
                dups.push(dup);
            }

            // Dups track the bind positions, aim at each other, and hand
            // the rotations back. Creation order doubles as evaluation
            // order: point, then aim, then orient.
            for (dup, bind) in dups.iter().zip(&bind_chain) {
                scene.add_constraint(ConstraintKind::Point, &[*bind], *dup, false)?;
            }
            let (axis, positive) = primary_axis(scene, bind_chain[0]);
            let mut aim = DVec3::ZERO;
            aim[axis] = if positive { 1.0 } else { -1.0 };
            scene.add_aim(dups[0], dups[1], aim, DVec3::Y, None)?;
            // The far end looks back along the same axis.
            scene.add_aim(dups[1], dups[0], -aim, DVec3::Y, None)?;
            for (dup, bind) in dups.iter().zip(&bind_chain) {
                scene.add_constraint(ConstraintKind::Orient, &[*dup], *bind, true)?;
            }

            base.node().connect_nodes(scene, &dups, "pistonPair", true)?;
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

    /// The duplicated pair, start first.
    #[must_use]
    pub fn pair(&self, scene: &Scene) -> Vec<NodeId> {
        self.base.node().connected_nodes(scene, "pistonPair")
    }
}

impl Component for PistonComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Piston
    }
}
