// SPDX-License-Identifier: Apache-2.0
//! Exported custom float channels.
//!
//! Engine-facing scalar channels live on an animator-visible control and
//! mirror onto a skeleton joint attribute through a clamped link, so they
//! bake and export with the joint like any transform channel. Keyability
//! is recorded in the captured parameters; the scene store itself has no
//! keyable notion to enforce.

use marionette_scene::{LinkOp, NodeId, Plug, Scene};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::component::{Component, RigComponent};
use crate::error::BuildError;
use crate::kind::ComponentKind;
use crate::rig::Rig;

/// Plug holding the control object carrying the channels.
pub const SOURCE_ATTR: &str = "source";

/// One custom channel definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Attribute name on both the control and the joint.
    pub name: String,
    /// Lower bound enforced on the mirrored value.
    pub min: f64,
    /// Upper bound enforced on the mirrored value.
    pub max: f64,
    /// Starting value.
    pub default: f64,
    /// Whether the channel is keyable on the control.
    pub keyable: bool,
}

impl ChannelSpec {
    /// A keyable unit-range channel starting at zero.
    #[must_use]
    pub fn unit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min: 0.0,
            max: 1.0,
            default: 0.0,
            keyable: true,
        }
    }
}

/// Build parameters for [`ChannelFloatComponent::create`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelFloatParams {
    /// Channels to create, in declaration order.
    pub channels: Vec<ChannelSpec>,
}

/// Custom float channels mirrored from a control onto a joint.
#[derive(Debug, Clone)]
pub struct ChannelFloatComponent {
    base: RigComponent,
}

impl ChannelFloatComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Creates the channels on `control` and mirrors them onto `joint`.
    pub fn create(
        scene: &mut Scene,
        rig: &Rig,
        control: NodeId,
        joint: NodeId,
        side: &str,
        region: &str,
        params: ChannelFloatParams,
    ) -> Result<Option<Self>, BuildError> {
        if params.channels.is_empty() {
            warn!(side, region, "channel float skipped: no channels declared");
            return Ok(None);
        }
        let component = scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::ChannelFloat,
                Self::VERSION,
                side,
                region,
                None,
            )?;
            base.store_kwargs(scene, &params)?;

            for spec in &params.channels {
                scene.set_attr(control, spec.name.clone(), spec.default)?;
                scene.set_attr(joint, spec.name.clone(), spec.default)?;
                scene.add_link(
                    Plug::new(control, spec.name.clone()),
                    LinkOp::Clamp {
                        min: spec.min,
                        max: spec.max,
                    },
                    Plug::new(joint, spec.name.clone()),
                )?;
            }

            base.node().connect_nodes(scene, &[control], SOURCE_ATTR, false)?;
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

    /// The control the channels live on.
    #[must_use]
    pub fn source(&self, scene: &Scene) -> Option<NodeId> {
        self.base.node().connected_node(scene, SOURCE_ATTR)
    }

    /// Declared channel specs, from the captured parameters.
    #[must_use]
    pub fn channels(&self, scene: &Scene) -> Vec<ChannelSpec> {
        serde_json::from_value::<ChannelFloatParams>(self.base.kwargs_value(scene))
            .map(|p| p.channels)
            .unwrap_or_default()
    }
}

impl Component for ChannelFloatComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::ChannelFloat
    }

    /// The mirror links live between two external objects, so the base
    /// teardown's cascade never reaches them; drop them explicitly.
    fn remove(&self, scene: &mut Scene) {
        let control = self.source(scene);
        for joint in self.base.bind_joints(scene) {
            for id in scene.links_into(joint) {
                let from_control = matches!(
                    scene.driver(id),
                    Some(marionette_scene::Driver::Link { src, .. }) if Some(src.node) == control
                );
                if from_control {
                    scene.remove_driver(id);
                }
            }
        }
        self.base.remove_base(scene);
    }
}
