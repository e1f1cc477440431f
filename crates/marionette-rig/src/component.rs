// SPDX-License-Identifier: Apache-2.0
//! Component base: the contract every rig component implements.
//!
//! A component owns a flags group (animator-facing) and a do-not-touch
//! group (internal plumbing) whose lifetimes equal the component's. Every
//! constructor parameter record is captured onto the node at create time so
//! a serialized rig can be replayed deterministically.

use marionette_scene::{
    ConstraintKind, DriverId, LinkOp, NodeId, NodeKind, Plug, Scene, SCALE_CHANNELS,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::bake::{bake_objects, BakedAnimation};
use crate::error::BuildError;
use crate::flag::Flag;
use crate::kind::ComponentKind;
use crate::markup::{joint_region, joint_side, SkeletonHierarchy};
use crate::node::GraphNode;
use crate::rig::{Rig, RIG_SCALE_ATTR};

/// Plug holding the component's flags group.
pub const FLAGS_GROUP_ATTR: &str = "flagsGroup";
/// Plug holding the component's do-not-touch group.
pub const NO_TOUCH_ATTR: &str = "noTouch";
/// Plug listing the component's flags, in creation order.
pub const FLAGS_ATTR: &str = "flags";
/// Plug listing the skeleton joints this component drives.
pub const BIND_JOINTS_ATTR: &str = "bindJoints";
/// Attribute carrying the captured build parameters.
pub const BUILD_KWARGS_ATTR: &str = "buildKwargs";
/// Marker attribute on throwaway helpers created for baking.
pub const BAKE_HELPER_ATTR: &str = "bakeHelper";
/// Plug listing parent objects this component was attached under.
pub const PARENTS_ATTR: &str = "parentComponents";
const ATTACH_POINT_ATTR: &str = "attachPoint";
const ATTACH_ORIENT_ATTR: &str = "attachOrient";

/// Everything attach created, handed back for later teardown.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// The hierarchy the lookup resolved against.
    pub hierarchy: SkeletonHierarchy,
    /// Pose-follow-links created by the attach pass.
    pub links: Vec<DriverId>,
    /// Helper nodes (pole-vector locators and the like) to delete after
    /// baking.
    pub helpers: Vec<NodeId>,
}

/// Removes everything an [`Attachment`] created.
pub fn detach(scene: &mut Scene, attachment: &Attachment) {
    for link in &attachment.links {
        scene.remove_driver(*link);
    }
    for helper in &attachment.helpers {
        scene.delete(*helper);
    }
}

/// Bakeable surface of a component: which flags move, which custom
/// channels carry values, and what to delete once baking is done.
#[derive(Debug, Clone, Default)]
pub struct BakeSet {
    /// Flags with upstream pose-follow-links or driven channels.
    pub flags: Vec<Flag>,
    /// Driven keyable custom channel names.
    pub attrs: Vec<String>,
    /// Pose-follow-links to remove after baking.
    pub links: Vec<DriverId>,
    /// Helper objects to delete after baking.
    pub helpers: Vec<NodeId>,
}

/// Shared state and plumbing of every rig component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RigComponent {
    node: GraphNode,
}

impl RigComponent {
    /// Builds the component node plus its flags and do-not-touch groups.
    ///
    /// Both groups align to `align` when given, land under the rig's master
    /// containers, and connect back onto the node so the graph stays
    /// traversable without external bookkeeping.
    pub fn create_base(
        scene: &mut Scene,
        rig: &Rig,
        kind: ComponentKind,
        version: u32,
        side: &str,
        region: &str,
        align: Option<NodeId>,
    ) -> Result<Self, BuildError> {
        let side = side.to_lowercase();
        let node = GraphNode::create(scene, Some(rig.node()), kind, version)?;
        scene.rename(node.id(), format!("{}_{side}_{region}", kind.as_str()))?;
        node.set_side_region(scene, &side, region)?;

        let nt_grp = scene.create_node(
            format!("NO_TOUCH_{side}_{region}"),
            NodeKind::Transform,
        );
        let flag_grp = scene.create_node(format!("flags_{side}_{region}"), NodeKind::Transform);
        if let Some(target) = align {
            scene.align_to(nt_grp, target)?;
            scene.align_to(flag_grp, target)?;
        }
        if let Some(master) = rig.do_not_touch(scene) {
            scene.set_parent(nt_grp, Some(master))?;
        }
        if let Some(master) = rig.flags_all(scene) {
            scene.set_parent(flag_grp, Some(master))?;
        }
        node.connect_nodes(scene, &[nt_grp], NO_TOUCH_ATTR, true)?;
        node.connect_nodes(scene, &[flag_grp], FLAGS_GROUP_ATTR, true)?;
        Ok(Self { node })
    }

    /// Wraps an existing component node.
    pub fn from_node(scene: &Scene, id: NodeId) -> Result<Self, BuildError> {
        Ok(Self {
            node: GraphNode::from_node(scene, id)?,
        })
    }

    /// Underlying graph node.
    #[must_use]
    pub fn node(self) -> GraphNode {
        self.node
    }

    /// Side markup.
    #[must_use]
    pub fn side(self, scene: &Scene) -> String {
        self.node.side(scene)
    }

    /// Region markup.
    #[must_use]
    pub fn region(self, scene: &Scene) -> String {
        self.node.region(scene)
    }

    /// The flags group, when still connected.
    #[must_use]
    pub fn flags_group(self, scene: &Scene) -> Option<NodeId> {
        self.node.connected_node(scene, FLAGS_GROUP_ATTR)
    }

    /// Both owned groups, for builders that just made them.
    pub fn groups(self, scene: &Scene) -> Result<(NodeId, NodeId), BuildError> {
        let flag_grp = self
            .flags_group(scene)
            .ok_or(BuildError::NotAGraphNode(self.node.id()))?;
        let nt_grp = self
            .no_touch_group(scene)
            .ok_or(BuildError::NotAGraphNode(self.node.id()))?;
        Ok((flag_grp, nt_grp))
    }

    /// The do-not-touch group, when still connected.
    #[must_use]
    pub fn no_touch_group(self, scene: &Scene) -> Option<NodeId> {
        self.node.connected_node(scene, NO_TOUCH_ATTR)
    }

    /// Registers flags, in order, on the node.
    pub fn add_flags(self, scene: &mut Scene, flags: &[Flag]) -> Result<(), BuildError> {
        let ids: Vec<NodeId> = flags.iter().map(|f| f.node()).collect();
        self.node.connect_nodes(scene, &ids, FLAGS_ATTR, true)
    }

    /// Ordered flags registered on the node.
    #[must_use]
    pub fn flags(self, scene: &Scene) -> Vec<Flag> {
        self.node
            .connected_nodes(scene, FLAGS_ATTR)
            .into_iter()
            .filter_map(|id| Flag::from_node(scene, id))
            .collect()
    }

    /// Registers the skeleton joints this component drives.
    pub fn set_bind_joints(self, scene: &mut Scene, joints: &[NodeId]) -> Result<(), BuildError> {
        self.node.connect_nodes(scene, joints, BIND_JOINTS_ATTR, false)
    }

    /// Ordered bind joints.
    #[must_use]
    pub fn bind_joints(self, scene: &Scene) -> Vec<NodeId> {
        self.node.connected_nodes(scene, BIND_JOINTS_ATTR)
    }

    /// Captures the constructor parameter record for serialization.
    pub fn store_kwargs<T: Serialize>(self, scene: &mut Scene, params: &T) -> Result<(), BuildError> {
        let value = serde_json::to_value(params)?;
        scene.set_attr(self.node.id(), BUILD_KWARGS_ATTR, value)?;
        Ok(())
    }

    /// The captured parameter record (`null` when nothing was captured).
    #[must_use]
    pub fn kwargs_value(self, scene: &Scene) -> serde_json::Value {
        scene
            .attr(self.node.id(), BUILD_KWARGS_ATTR)
            .and_then(|v| v.as_json().cloned())
            .unwrap_or(serde_json::Value::Null)
    }

    /// The (side, region) key attach lookups resolve with.
    ///
    /// Uniform policy across every variant: bind-joint markup wins when
    /// bind joints exist, else the component's own declared markup.
    #[must_use]
    pub fn resolve_attach_key(self, scene: &Scene) -> (String, String) {
        if let Some(first) = self.bind_joints(scene).first() {
            if let (Some(side), Some(region)) =
                (joint_side(scene, *first), joint_region(scene, *first))
            {
                return (side, region);
            }
        }
        (self.side(scene), self.region(scene))
    }

    /// FK-style attach: zip flags against the looked-up chain and
    /// parent-constrain each flag to its joint (plus scale pass-through).
    pub fn attach_zip(
        self,
        scene: &mut Scene,
        hierarchy: &SkeletonHierarchy,
        flags: &[Flag],
    ) -> Result<Option<Vec<DriverId>>, BuildError> {
        let (side, region) = self.resolve_attach_key(scene);
        let chain = hierarchy.get_full_chain(&side, &region);
        if chain.is_empty() {
            return Ok(None);
        }
        if flags.is_empty() || flags.len() > chain.len() {
            warn!(
                side,
                region,
                flags = flags.len(),
                joints = chain.len(),
                "flag count does not fit target chain"
            );
            return Ok(None);
        }
        let mut links = Vec::new();
        for (flag, joint) in flags.iter().zip(chain) {
            links.push(scene.add_constraint(
                ConstraintKind::Parent,
                &[joint],
                flag.node(),
                true,
            )?);
            for ch in SCALE_CHANNELS {
                links.push(scene.add_link(
                    Plug::new(joint, ch),
                    LinkOp::Direct,
                    Plug::new(flag.node(), ch),
                )?);
            }
        }
        Ok(Some(links))
    }

    /// Constrains this component's groups under parent objects.
    ///
    /// The first parent drives; extra parents are recorded so a space
    /// switch can be layered on later. The parents and the point/orient
    /// choice are stored on the node and travel through serialization as
    /// attach records.
    pub fn attach_component(
        self,
        scene: &mut Scene,
        parents: &[NodeId],
        point: bool,
        orient: bool,
    ) -> Result<(), BuildError> {
        if parents.is_empty() || (!point && !orient) {
            warn!(node = %self.node.id(), "attach skipped: nothing to constrain to");
            return Ok(());
        }
        let kind = match (point, orient) {
            (true, true) => ConstraintKind::Parent,
            (true, false) => ConstraintKind::Point,
            _ => ConstraintKind::Orient,
        };
        for group in [self.flags_group(scene), self.no_touch_group(scene)]
            .into_iter()
            .flatten()
        {
            scene.add_constraint(kind, parents, group, true)?;
        }
        self.node.connect_nodes(scene, parents, PARENTS_ATTR, false)?;
        scene.set_attr(self.node.id(), ATTACH_POINT_ATTR, point)?;
        scene.set_attr(self.node.id(), ATTACH_ORIENT_ATTR, orient)?;
        Ok(())
    }

    /// Parent objects recorded by [`RigComponent::attach_component`].
    #[must_use]
    pub fn attach_parents(self, scene: &Scene) -> Vec<NodeId> {
        self.node.connected_nodes(scene, PARENTS_ATTR)
    }

    /// The recorded (point, orient) attach choice.
    #[must_use]
    pub fn attach_channels(self, scene: &Scene) -> (bool, bool) {
        let read = |attr| {
            scene
                .attr(self.node.id(), attr)
                .and_then(marionette_scene::AttrValue::as_bool)
                .unwrap_or(true)
        };
        (read(ATTACH_POINT_ATTR), read(ATTACH_ORIENT_ATTR))
    }

    /// Deletes the owned groups and the node itself, best-effort.
    ///
    /// Teardown tolerates a partially-broken graph: missing pieces are
    /// logged and skipped, never raised.
    pub fn remove_base(self, scene: &mut Scene) {
        match self.flags_group(scene) {
            Some(grp) => scene.delete(grp),
            None => debug!(node = %self.node.id(), "flags group already gone"),
        }
        match self.no_touch_group(scene) {
            Some(grp) => scene.delete(grp),
            None => debug!(node = %self.node.id(), "do-not-touch group already gone"),
        }
        scene.delete(self.node.id());
    }

    /// Wires the do-not-touch group's scale to the inverse of the rig's
    /// global scale so build plumbing holds its size while the rig scales.
    pub fn wire_inverse_scale(self, scene: &mut Scene, rig: &Rig) -> Result<(), BuildError> {
        let Some(nt_grp) = self.no_touch_group(scene) else {
            return Ok(());
        };
        // finalize() may run repeatedly; drop stale wiring first.
        for id in scene.links_into(nt_grp) {
            let stale = scene.driver(id).is_some_and(|d| match d {
                marionette_scene::Driver::Link { dst, .. } => {
                    SCALE_CHANNELS.contains(&dst.attr.as_str())
                }
                _ => false,
            });
            if stale {
                scene.remove_driver(id);
            }
        }
        for ch in SCALE_CHANNELS {
            scene.add_link(
                Plug::new(rig.node().id(), RIG_SCALE_ATTR),
                LinkOp::InverseScale,
                Plug::new(nt_grp, ch),
            )?;
        }
        Ok(())
    }
}

/// The contract shared by every component variant.
pub trait Component {
    /// Shared base state.
    fn base(&self) -> RigComponent;

    /// This variant's kind tag.
    fn kind(&self) -> ComponentKind;

    /// Ordered control handles.
    fn flags(&self, scene: &Scene) -> Vec<Flag> {
        self.base().flags(scene)
    }

    /// Binds the built controls to an arbitrary skeleton instance.
    ///
    /// Resolves (side, region) by the uniform markup-first policy, looks up
    /// the matching chain and creates pose-follow-links from the found
    /// joints onto this component's flags. Returns the hierarchy used and
    /// the links created for later teardown, or `None` (with a warning)
    /// when the lookup misses.
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
        let flags = self.flags(scene);
        match self.base().attach_zip(scene, skel, &flags)? {
            None => Ok(None),
            Some(links) => Ok(Some(Attachment {
                hierarchy: skel.clone(),
                links,
                helpers: Vec::new(),
            })),
        }
    }

    /// Samples the driven joints over `range` into keyframe data.
    ///
    /// Warns and no-ops when the component has no bind joints.
    fn bake_to_skeleton(&self, scene: &mut Scene, range: (i64, i64)) -> Option<BakedAnimation> {
        let joints = self.base().bind_joints(scene);
        if joints.is_empty() {
            warn!(kind = %self.kind(), "bake skipped: component has no bind joints");
            return None;
        }
        Some(bake_objects(scene, &joints, range))
    }

    /// The subset of flags worth baking, plus what to clean up afterwards.
    fn bakeable_rig_nodes(&self, scene: &Scene) -> BakeSet {
        let mut set = BakeSet::default();
        for flag in self.flags(scene) {
            let links = scene.pose_links_on(flag.node());
            let mut attrs = Vec::new();
            for id in scene.links_into(flag.node()) {
                if let Some(marionette_scene::Driver::Link { dst, .. }) = scene.driver(id) {
                    if !marionette_scene::TRANSFORM_CHANNELS.contains(&dst.attr.as_str()) {
                        attrs.push(dst.attr.clone());
                    }
                }
            }
            for link in &links {
                if let Some(marionette_scene::Driver::Constraint { targets, .. }) =
                    scene.driver(*link)
                {
                    for target in targets {
                        if scene.has_attr(*target, BAKE_HELPER_ATTR) {
                            set.helpers.push(*target);
                        }
                    }
                }
            }
            if !links.is_empty() || !attrs.is_empty() {
                set.links.extend(links);
                set.attrs.extend(attrs);
                set.flags.push(flag);
            }
        }
        set
    }

    /// Deletes the component and everything it owns, best-effort.
    fn remove(&self, scene: &mut Scene) {
        self.base().remove_base(scene);
    }

    /// Hook for global-scale wiring; default components keep their
    /// do-not-touch group inverse-scaled against the rig.
    fn set_scale(&self, scene: &mut Scene, rig: &Rig) -> Result<(), BuildError> {
        self.base().wire_inverse_scale(scene, rig)
    }
}

/// Closed union over every component variant.
///
/// Dispatch by stored type-name string resolves through this enum; an
/// unknown tag is a hard error rather than a silently ignored node.
#[derive(Debug, Clone)]
pub enum AnyComponent {
    /// FK chain.
    Fk(crate::components::FkComponent),
    /// IK chain.
    Ik(crate::components::IkComponent),
    /// Reverse-foot pivots.
    ReverseFoot(crate::components::ReverseFootComponent),
    /// Twist fixup.
    Twist(crate::components::TwistComponent),
    /// Space switch.
    MultiConstraint(crate::components::MultiConstraintComponent),
    /// Surface pin.
    Pin(crate::components::PinComponent),
    /// Look-at control.
    Aim(crate::components::AimComponent),
    /// Paired look-at joints.
    Piston(crate::components::PistonComponent),
    /// World root controls.
    World(crate::components::WorldComponent),
    /// Reversed pelvis chain.
    Pelvis(crate::components::PelvisComponent),
    /// Center-of-gravity control.
    Cog(crate::components::CogComponent),
    /// Exported float channels.
    ChannelFloat(crate::components::ChannelFloatComponent),
    /// Display layers.
    Display(crate::components::DisplayComponent),
}

impl AnyComponent {
    /// Narrows an untyped scene node to its component wrapper.
    pub fn resolve(scene: &Scene, id: NodeId) -> Result<Self, BuildError> {
        let node = GraphNode::from_node(scene, id)?;
        let base = RigComponent::from_node(scene, id)?;
        match node.kind(scene)? {
            ComponentKind::Fk => Ok(Self::Fk(crate::components::FkComponent::from_base(base))),
            ComponentKind::Ik => Ok(Self::Ik(crate::components::IkComponent::from_base(base))),
            ComponentKind::ReverseFoot => Ok(Self::ReverseFoot(
                crate::components::ReverseFootComponent::from_base(base),
            )),
            ComponentKind::Twist => Ok(Self::Twist(
                crate::components::TwistComponent::from_base(base),
            )),
            ComponentKind::MultiConstraint => Ok(Self::MultiConstraint(
                crate::components::MultiConstraintComponent::from_base(base),
            )),
            ComponentKind::Pin => Ok(Self::Pin(crate::components::PinComponent::from_base(base))),
            ComponentKind::Aim => Ok(Self::Aim(crate::components::AimComponent::from_base(base))),
            ComponentKind::Piston => Ok(Self::Piston(
                crate::components::PistonComponent::from_base(base),
            )),
            ComponentKind::World => Ok(Self::World(
                crate::components::WorldComponent::from_base(base),
            )),
            ComponentKind::Pelvis => Ok(Self::Pelvis(
                crate::components::PelvisComponent::from_base(base),
            )),
            ComponentKind::Cog => Ok(Self::Cog(crate::components::CogComponent::from_base(base))),
            ComponentKind::ChannelFloat => Ok(Self::ChannelFloat(
                crate::components::ChannelFloatComponent::from_base(base),
            )),
            ComponentKind::Display => Ok(Self::Display(
                crate::components::DisplayComponent::from_base(base),
            )),
            other => Err(BuildError::UnknownKind(other.as_str().to_owned())),
        }
    }

    /// The wrapped component as the shared contract.
    #[must_use]
    pub fn as_component(&self) -> &dyn Component {
        match self {
            Self::Fk(c) => c,
            Self::Ik(c) => c,
            Self::ReverseFoot(c) => c,
            Self::Twist(c) => c,
            Self::MultiConstraint(c) => c,
            Self::Pin(c) => c,
            Self::Aim(c) => c,
            Self::Piston(c) => c,
            Self::World(c) => c,
            Self::Pelvis(c) => c,
            Self::Cog(c) => c,
            Self::ChannelFloat(c) => c,
            Self::Display(c) => c,
        }
    }

    /// Shared base state.
    #[must_use]
    pub fn base(&self) -> RigComponent {
        self.as_component().base()
    }

    /// This component's kind tag.
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.as_component().kind()
    }

    /// Ordered control handles.
    #[must_use]
    pub fn flags(&self, scene: &Scene) -> Vec<Flag> {
        self.as_component().flags(scene)
    }

    /// See [`Component::attach_to_skeleton`].
    pub fn attach_to_skeleton(
        &self,
        scene: &mut Scene,
        root: NodeId,
        hierarchy: Option<&SkeletonHierarchy>,
    ) -> Result<Option<Attachment>, BuildError> {
        self.as_component().attach_to_skeleton(scene, root, hierarchy)
    }

    /// See [`Component::bake_to_skeleton`].
    pub fn bake_to_skeleton(&self, scene: &mut Scene, range: (i64, i64)) -> Option<BakedAnimation> {
        self.as_component().bake_to_skeleton(scene, range)
    }

    /// See [`Component::remove`].
    pub fn remove(&self, scene: &mut Scene) {
        self.as_component().remove(scene);
    }

    /// See [`Component::set_scale`].
    pub fn set_scale(&self, scene: &mut Scene, rig: &Rig) -> Result<(), BuildError> {
        self.as_component().set_scale(scene, rig)
    }
}
