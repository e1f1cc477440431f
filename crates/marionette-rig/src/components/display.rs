// SPDX-License-Identifier: Apache-2.0
//! Display layer management.

use marionette_scene::{AttrValue, NodeId, NodeKind, Scene};
use serde::Serialize;

use crate::component::{Component, RigComponent};
use crate::error::BuildError;
use crate::kind::ComponentKind;
use crate::rig::Rig;

/// Plug listing the owned display layers.
pub const LAYERS_ATTR: &str = "layers";
/// Plug listing a layer's member nodes.
pub const MEMBERS_ATTR: &str = "members";
/// Attribute carrying a layer's display mode.
pub const MODE_ATTR: &str = "displayMode";

/// The standard rig layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLayerKind {
    /// Animator controls.
    Flags,
    /// The bind skeleton.
    Skeleton,
    /// Render meshes.
    Meshes,
}

impl DisplayLayerKind {
    /// All layers, creation order.
    pub const ALL: [Self; 3] = [Self::Flags, Self::Skeleton, Self::Meshes];

    /// The layer node's name.
    #[must_use]
    pub const fn layer_name(self) -> &'static str {
        match self {
            Self::Flags => "flags_display",
            Self::Skeleton => "skeleton_display",
            Self::Meshes => "meshes_display",
        }
    }

    /// Mode a fresh layer starts in: controls selectable, everything else
    /// reference-only.
    #[must_use]
    pub const fn default_mode(self) -> DisplayMode {
        match self {
            Self::Flags => DisplayMode::Normal,
            Self::Skeleton | Self::Meshes => DisplayMode::Reference,
        }
    }
}

/// How a layer's members respond to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Selectable and editable.
    Normal,
    /// Visible but unselectable.
    Reference,
    /// Visible only during playback.
    Playback,
}

impl DisplayMode {
    /// Stable tag stored on the layer node.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Reference => "reference",
            Self::Playback => "playback",
        }
    }

    /// Resolves a stored tag; unknown tags fall back to `Normal`.
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        match tag {
            "reference" => Self::Reference,
            "playback" => Self::Playback,
            _ => Self::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
struct DisplayKwargs {}

/// Owns the flags/skeleton/meshes display layers and their membership.
#[derive(Debug, Clone)]
pub struct DisplayComponent {
    base: RigComponent,
}

impl DisplayComponent {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Creates the three standard layers under the rig.
    pub fn create(scene: &mut Scene, rig: &Rig) -> Result<Self, BuildError> {
        scene.scoped(|scene| {
            let base = RigComponent::create_base(
                scene,
                rig,
                ComponentKind::Display,
                Self::VERSION,
                "center",
                "display",
                None,
            )?;
            base.store_kwargs(scene, &DisplayKwargs {})?;

            for kind in DisplayLayerKind::ALL {
                let layer = scene.create_node(kind.layer_name(), NodeKind::DisplayLayer);
                scene.set_attr(layer, MODE_ATTR, kind.default_mode().as_str())?;
                base.node().connect_nodes(scene, &[layer], LAYERS_ATTR, true)?;
            }
            Ok(Self { base })
        })
    }

    /// Rebuilds the wrapper from a resolved base.
    #[must_use]
    pub fn from_base(base: RigComponent) -> Self {
        Self { base }
    }

    /// The scene node backing a layer.
    #[must_use]
    pub fn layer(&self, scene: &Scene, kind: DisplayLayerKind) -> Option<NodeId> {
        self.base
            .node()
            .connected_nodes(scene, LAYERS_ATTR)
            .into_iter()
            .find(|id| scene.name(*id).as_deref() == Ok(kind.layer_name()))
    }

    /// Adds nodes to a layer's membership (idempotent).
    pub fn add_members(
        &self,
        scene: &mut Scene,
        kind: DisplayLayerKind,
        nodes: &[NodeId],
    ) -> Result<(), BuildError> {
        let Some(layer) = self.layer(scene, kind) else {
            return Ok(());
        };
        for node in nodes {
            scene.connect(*node, layer, MEMBERS_ATTR)?;
        }
        Ok(())
    }

    /// A layer's members, in membership order.
    #[must_use]
    pub fn members(&self, scene: &Scene, kind: DisplayLayerKind) -> Vec<NodeId> {
        self.layer(scene, kind)
            .map(|layer| scene.connected(layer, MEMBERS_ATTR))
            .unwrap_or_default()
    }

    /// Switches a layer's display mode.
    pub fn set_mode(
        &self,
        scene: &mut Scene,
        kind: DisplayLayerKind,
        mode: DisplayMode,
    ) -> Result<(), BuildError> {
        if let Some(layer) = self.layer(scene, kind) {
            scene.set_attr(layer, MODE_ATTR, mode.as_str())?;
        }
        Ok(())
    }

    /// A layer's current display mode.
    #[must_use]
    pub fn mode(&self, scene: &Scene, kind: DisplayLayerKind) -> DisplayMode {
        self.layer(scene, kind)
            .and_then(|layer| scene.attr(layer, MODE_ATTR))
            .and_then(AttrValue::as_str)
            .map(DisplayMode::parse)
            .unwrap_or(DisplayMode::Normal)
    }
}

impl Component for DisplayComponent {
    fn base(&self) -> RigComponent {
        self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Display
    }

    /// Layers are owned nodes outside the group hierarchy; delete them
    /// before the base teardown.
    fn remove(&self, scene: &mut Scene) {
        for id in self.base.node().connected_nodes(scene, LAYERS_ATTR) {
            scene.delete(id);
        }
        self.base.remove_base(scene);
    }
}
