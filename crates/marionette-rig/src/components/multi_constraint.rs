// SPDX-License-Identifier: Apache-2.0
//! Discrete space switch.
//!
//! On the host this is one matrix multiply-then-decompose chain per target
//! feeding a single blend-free choice; the scene adapter retains the same
//! shape as a [`marionette_scene::Driver::SpaceSwitch`] with per-target
//! offsets captured at build time. The integer `follow` attribute on the
//! source object picks the active target, and switching is instantaneous.

use marionette_scene::{NodeId, Plug, Scene};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::component::{Component, RigComponent};
use crate::error::BuildError;
use crate::flag::Flag;
use crate::kind::ComponentKind;
use crate::rig::Rig;

/// Selector attribute created on the source object.
pub const FOLLOW_ATTR: &str = "follow";
/// Plug holding the constrained source object.
pub const SOURCE_ATTR: &str = "source";
/// Plug listing the candidate target spaces, in selector order.
pub const SPACES_ATTR: &str = "spaces";

/// Build parameters for [`MultiConstraintComponent::create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiConstraintParams {
    /// Whether translation follows the active space.
    pub translate: bool,
    /// Whether rotation follows the active space.
    pub rotate: bool,
    /// Whether scale follows the active space.
    pub scale: bool,
    /// Selector value the switch starts at.
    pub default_space: i64,
}

impl Default for MultiConstraintParams {
    fn default() -> Self {
        Self {
            translate: true,
            rotate: true,
            scale: false,
            default_space: 0,
        }
    }
}

/// Multi-target follow with a discrete selector.
#[derive(Debug, Clone)]
pub struct MultiConstraintComponent {
    base: RigComponent,
}

impl MultiConstraintComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Switches `source` between `targets`.
    ///
    /// When the source is a flag, the constraint lands on its align
    /// transform so the animator's own channels stay writable. An empty
    /// target list warns and skips.
    pub fn create(
        scene: &mut Scene,
        rig: &Rig,
        source: NodeId,
        targets: &[NodeId],
        side: &str,
        region: &str,
        params: MultiConstraintParams,
    ) -> Result<Option<Self>, BuildError> {
        if targets.is_empty() {
            warn!(side, region, "multi constraint skipped: no target spaces");
            return Ok(None);
        }
        let driven = Flag::from_node(scene, source)
            .and_then(|f| f.align_transform(scene))
            .unwrap_or(source);

        let component = scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::MultiConstraint,
                Self::VERSION,
                side,
                region,
                Some(source),
            )?;
            base.store_kwargs(scene, &params)?;

            scene.set_attr(source, FOLLOW_ATTR, params.default_space)?;
            scene.add_space_switch(
                driven,
                targets,
                Plug::new(source, FOLLOW_ATTR),
                params.translate,
                params.rotate,
                params.scale,
            )?;

            base.node().connect_nodes(scene, &[source], SOURCE_ATTR, false)?;
            base.node().connect_nodes(scene, targets, SPACES_ATTR, false)?;
            Ok::<_, BuildError>(Self { base })
        })?;
        Ok(Some(component))
    }

    /// Rebuilds the wrapper from a resolved base.
    #[must_use]
    pub fn from_base(base: RigComponent) -> Self {
        Self { base }
    }

    /// The switched source object.
    #[must_use]
    pub fn source(&self, scene: &Scene) -> Option<NodeId> {
        self.base.node().connected_node(scene, SOURCE_ATTR)
    }

    /// Candidate target spaces, in selector order.
    #[must_use]
    pub fn spaces(&self, scene: &Scene) -> Vec<NodeId> {
        self.base.node().connected_nodes(scene, SPACES_ATTR)
    }

    /// The transform the switch actually drives.
    #[must_use]
    pub fn driven(&self, scene: &Scene) -> Option<NodeId> {
        let source = self.source(scene)?;
        Some(
            Flag::from_node(scene, source)
                .and_then(|f| f.align_transform(scene))
                .unwrap_or(source),
        )
    }
}

impl Component for MultiConstraintComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::MultiConstraint
    }

    /// Removes the switch driver along with the owned groups; the source
    /// object and its spaces belong to other components and stay put.
    fn remove(&self, scene: &mut Scene) {
        if let Some(driven) = self.driven(scene) {
            for id in scene.pose_links_on(driven) {
                let is_switch = matches!(
                    scene.driver(id),
                    Some(marionette_scene::Driver::SpaceSwitch { .. })
                );
                if is_switch {
                    scene.remove_driver(id);
                }
            }
        }
        self.base.remove_base(scene);
    }
}
