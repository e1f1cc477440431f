// SPDX-License-Identifier: Apache-2.0
//! Version migration for stored component instances.
//!
//! Each kind carries an explicit ordered table of migration steps keyed by
//! the version they migrate *from*. Tables are gap-checked when they are
//! built, so a hole in the upgrade path is caught at registration instead
//! of surfacing as a stuck instance mid-update. The update loop itself is
//! guarded: a step that runs without advancing the stored version raises
//! rather than spinning.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::MigrationError;
use crate::kind::ComponentKind;
use crate::node::{all_graph_nodes, GraphNode};
use crate::rig::Rig;
use crate::root::AssetRoot;
use marionette_scene::Scene;

/// One migration step: upgrade an instance from exactly one stored version
/// to the next.
pub type MigrationStep = fn(&mut Scene, GraphNode) -> Result<(), MigrationError>;

/// Ordered upgrade path for one component kind.
#[derive(Debug, Clone)]
pub struct MigrationTable {
    kind: ComponentKind,
    current: u32,
    steps: BTreeMap<u32, MigrationStep>,
}

impl MigrationTable {
    /// Builds a table whose steps must cover every version below
    /// `current`.
    ///
    /// # Errors
    /// [`MigrationError::Gap`] when any version in `1..current` has no
    /// outgoing step.
    pub fn new(
        kind: ComponentKind,
        current: u32,
        steps: &[(u32, MigrationStep)],
    ) -> Result<Self, MigrationError> {
        let steps: BTreeMap<u32, MigrationStep> = steps.iter().copied().collect();
        for from in 1..current {
            if !steps.contains_key(&from) {
                return Err(MigrationError::Gap {
                    kind: kind.as_str().to_owned(),
                    missing_from: from,
                });
            }
        }
        Ok(Self {
            kind,
            current,
            steps,
        })
    }

    /// The version instances end up at.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Migrates `node` forward until its stored version reaches the
    /// table's current version. Returns the final version.
    ///
    /// # Errors
    /// [`MigrationError::Stalled`] when a step runs but the stored version
    /// does not advance.
    pub fn update(&self, scene: &mut Scene, node: GraphNode) -> Result<u32, MigrationError> {
        loop {
            let version = node.version(scene);
            if version >= self.current {
                return Ok(version);
            }
            let step = self.steps.get(&version).ok_or(MigrationError::Gap {
                kind: self.kind.as_str().to_owned(),
                missing_from: version,
            })?;
            debug!(kind = %self.kind, from = version, "running migration step");
            step(scene, node)?;
            if node.version(scene) <= version {
                return Err(MigrationError::Stalled {
                    kind: self.kind.as_str().to_owned(),
                    version,
                });
            }
        }
    }
}

/// Registered upgrade paths, one per kind. Every kind is currently at
/// version 1, so every table is step-free; new steps land here next to the
/// version bump that makes them necessary.
static REGISTRY: Lazy<BTreeMap<ComponentKind, MigrationTable>> = Lazy::new(|| {
    let versions = [
        (ComponentKind::AssetRoot, AssetRoot::VERSION),
        (ComponentKind::Rig, Rig::VERSION),
        (ComponentKind::Fk, crate::components::FkComponent::VERSION),
        (ComponentKind::Ik, crate::components::IkComponent::VERSION),
        (
            ComponentKind::ReverseFoot,
            crate::components::ReverseFootComponent::VERSION,
        ),
        (ComponentKind::Twist, crate::components::TwistComponent::VERSION),
        (
            ComponentKind::MultiConstraint,
            crate::components::MultiConstraintComponent::VERSION,
        ),
        (ComponentKind::Pin, crate::components::PinComponent::VERSION),
        (ComponentKind::Aim, crate::components::AimComponent::VERSION),
        (
            ComponentKind::Piston,
            crate::components::PistonComponent::VERSION,
        ),
        (ComponentKind::World, crate::components::WorldComponent::VERSION),
        (
            ComponentKind::Pelvis,
            crate::components::PelvisComponent::VERSION,
        ),
        (ComponentKind::Cog, crate::components::CogComponent::VERSION),
        (
            ComponentKind::ChannelFloat,
            crate::components::ChannelFloatComponent::VERSION,
        ),
        (
            ComponentKind::Display,
            crate::components::DisplayComponent::VERSION,
        ),
    ];
    versions
        .into_iter()
        .map(|(kind, current)| {
            // Registration-time gap check; a hole here is a programming
            // error, not a runtime condition.
            #[allow(clippy::expect_used)]
            let table =
                MigrationTable::new(kind, current, &[]).expect("migration table has a gap");
            (kind, table)
        })
        .collect()
});

/// The registered table for a kind.
///
/// # Errors
/// [`MigrationError::NoTable`] for kinds outside the registry.
pub fn table_for(kind: ComponentKind) -> Result<&'static MigrationTable, MigrationError> {
    REGISTRY
        .get(&kind)
        .ok_or_else(|| MigrationError::NoTable(kind.as_str().to_owned()))
}

/// Migrates one graph node to its kind's current version.
pub fn update_component(scene: &mut Scene, node: GraphNode) -> Result<u32, MigrationError> {
    let kind = node.kind(scene)?;
    table_for(kind)?.update(scene, node)
}

/// Sweeps every graph node in the scene forward; returns how many
/// instances actually advanced.
pub fn update_all_components(scene: &mut Scene) -> Result<usize, MigrationError> {
    let mut advanced = 0;
    for node in all_graph_nodes(scene) {
        let before = node.version(scene);
        let after = update_component(scene, node)?;
        if after > before {
            advanced += 1;
        }
    }
    Ok(advanced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump(scene: &mut Scene, node: GraphNode) -> Result<(), MigrationError> {
        let v = node.version(scene);
        node.set_version(scene, v + 1)?;
        Ok(())
    }

    fn stall(_scene: &mut Scene, _node: GraphNode) -> Result<(), MigrationError> {
        Ok(())
    }

    fn v1_node(scene: &mut Scene) -> GraphNode {
        GraphNode::create(scene, None, ComponentKind::Fk, 1).unwrap()
    }

    #[test]
    fn two_steps_take_a_v1_instance_to_v3() {
        let mut scene = Scene::new();
        let node = v1_node(&mut scene);
        let table =
            MigrationTable::new(ComponentKind::Fk, 3, &[(1, bump), (2, bump)]).unwrap();
        assert_eq!(table.update(&mut scene, node).unwrap(), 3);
        assert_eq!(node.version(&scene), 3);
        // Already-current instances are untouched.
        assert_eq!(table.update(&mut scene, node).unwrap(), 3);
    }

    #[test]
    fn non_advancing_step_raises_instead_of_spinning() {
        let mut scene = Scene::new();
        let node = v1_node(&mut scene);
        let table =
            MigrationTable::new(ComponentKind::Fk, 3, &[(1, stall), (2, bump)]).unwrap();
        let err = table.update(&mut scene, node);
        assert!(matches!(err, Err(MigrationError::Stalled { version: 1, .. })));
    }

    #[test]
    fn gap_is_caught_at_registration() {
        let err = MigrationTable::new(ComponentKind::Fk, 3, &[(2, bump)]);
        assert!(matches!(
            err,
            Err(MigrationError::Gap { missing_from: 1, .. })
        ));
    }

    #[test]
    fn registry_covers_every_kind() {
        for kind in crate::kind::RIG_COMPONENT_KINDS {
            assert!(table_for(kind).is_ok());
        }
        assert!(table_for(ComponentKind::Rig).is_ok());
        assert!(table_for(ComponentKind::AssetRoot).is_ok());
    }
}
