// SPDX-License-Identifier: Apache-2.0
//! In-memory scene store.
//!
//! One globally shared, single-threaded store: hierarchy, dynamic
//! attributes, message connections, retained drivers and keyframes. All
//! ordered containers are `BTreeMap`/insertion-ordered `Vec` so traversal
//! and evaluation are deterministic.

use std::collections::{BTreeMap, BTreeSet};

use glam::{DMat3, DQuat, DVec3};

use crate::attr::AttrValue;
use crate::driver::{ConstraintKind, Driver, LinkOp};
use crate::ident::{DriverId, NodeId, Plug};
use crate::node::{NodeKind, NodeRec};
use crate::transform::Transform;
use crate::SceneError;

/// Transform channel names, in `tx..sz` order.
pub const TRANSFORM_CHANNELS: [&str; 9] = [
    "tx", "ty", "tz", "rx", "ry", "rz", "sx", "sy", "sz",
];

/// Translation channel names.
pub const TRANSLATION_CHANNELS: [&str; 3] = ["tx", "ty", "tz"];
/// Rotation channel names.
pub const ROTATION_CHANNELS: [&str; 3] = ["rx", "ry", "rz"];
/// Scale channel names.
pub const SCALE_CHANNELS: [&str; 3] = ["sx", "sy", "sz"];

/// The in-memory scene graph.
///
/// Mutations act immediately; [`Scene::evaluate`] settles driven transforms.
/// Multi-step builds wrap themselves in [`Scene::scoped`] so a failed build
/// rolls back instead of leaving partial graph state behind.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    next_node: u64,
    next_driver: u64,
    nodes: BTreeMap<NodeId, NodeRec>,
    /// Ordered sources connected into a destination plug.
    conn_into: BTreeMap<(NodeId, String), Vec<NodeId>>,
    /// Reverse index: source node -> destination plugs, in connection order.
    conn_out: BTreeMap<NodeId, Vec<Plug>>,
    drivers: BTreeMap<DriverId, Driver>,
    keys: BTreeMap<(NodeId, String), BTreeMap<i64, f64>>,
}

impl Scene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── nodes ────────────────────────────────────────────────────────

    /// Allocates a new node.
    pub fn create_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        self.next_node += 1;
        let id = NodeId(self.next_node);
        self.nodes.insert(id, NodeRec::new(name.into(), kind));
        id
    }

    /// Returns `true` if the node is live.
    #[must_use]
    pub fn exists(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn rec(&self, id: NodeId) -> Result<&NodeRec, SceneError> {
        self.nodes.get(&id).ok_or(SceneError::MissingNode(id))
    }

    fn rec_mut(&mut self, id: NodeId) -> Result<&mut NodeRec, SceneError> {
        self.nodes.get_mut(&id).ok_or(SceneError::MissingNode(id))
    }

    /// Node name.
    pub fn name(&self, id: NodeId) -> Result<String, SceneError> {
        Ok(self.rec(id)?.name.clone())
    }

    /// Renames a node.
    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), SceneError> {
        self.rec_mut(id)?.name = name.into();
        Ok(())
    }

    /// Node classification.
    pub fn kind(&self, id: NodeId) -> Result<NodeKind, SceneError> {
        Ok(self.rec(id)?.kind)
    }

    /// All live nodes of a kind, in id order.
    #[must_use]
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, rec)| rec.kind == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Finds the first node with the given name, in id order.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, rec)| rec.name == name)
            .map(|(id, _)| *id)
    }

    // ── hierarchy ────────────────────────────────────────────────────

    /// Reparents `child` under `parent` (or unparents with `None`).
    ///
    /// # Errors
    /// [`SceneError::WouldCycle`] if `parent` is `child` or one of its
    /// descendants.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        self.rec(child)?;
        if let Some(p) = parent {
            self.rec(p)?;
            let mut cursor = Some(p);
            while let Some(n) = cursor {
                if n == child {
                    return Err(SceneError::WouldCycle { child, parent: p });
                }
                cursor = self.rec(n)?.parent;
            }
        }
        let old = self.rec(child)?.parent;
        if let Some(old_parent) = old {
            if let Some(rec) = self.nodes.get_mut(&old_parent) {
                rec.children.retain(|c| *c != child);
            }
        }
        if let Some(p) = parent {
            if let Some(rec) = self.nodes.get_mut(&p) {
                rec.children.push(child);
            }
        }
        self.rec_mut(child)?.parent = parent;
        Ok(())
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.rec(id)?.parent)
    }

    /// Children in insertion order.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        Ok(self.rec(id)?.children.clone())
    }

    /// Pre-order descendants, excluding `id` itself.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(&id)
            .map(|rec| rec.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(n) = stack.pop() {
            out.push(n);
            if let Some(rec) = self.nodes.get(&n) {
                stack.extend(rec.children.iter().rev().copied());
            }
        }
        out
    }

    // ── transforms ───────────────────────────────────────────────────

    /// Local transform of a node.
    pub fn local(&self, id: NodeId) -> Result<Transform, SceneError> {
        Ok(self.rec(id)?.local)
    }

    /// Replaces the local transform.
    pub fn set_local(&mut self, id: NodeId, t: Transform) -> Result<(), SceneError> {
        self.rec_mut(id)?.local = t;
        Ok(())
    }

    /// World transform, composed root-down.
    pub fn world_transform(&self, id: NodeId) -> Result<Transform, SceneError> {
        let rec = self.rec(id)?;
        match rec.parent {
            None => Ok(rec.local),
            Some(p) => Ok(self.world_transform(p)?.mul(&rec.local)),
        }
    }

    /// Sets the local transform so the node lands at `world`.
    pub fn set_world(&mut self, id: NodeId, world: Transform) -> Result<(), SceneError> {
        let local = match self.rec(id)?.parent {
            None => world,
            Some(p) => self.world_transform(p)?.inverse().mul(&world),
        };
        self.set_local(id, local)
    }

    /// Snaps `node` onto `target`'s world pose (align helper).
    pub fn align_to(&mut self, node: NodeId, target: NodeId) -> Result<(), SceneError> {
        let w = self.world_transform(target)?;
        self.set_world(node, w)
    }

    /// Reparents while preserving the node's world pose, the way a host
    /// parent command does. Plain [`Scene::set_parent`] keeps the local
    /// transform instead.
    pub fn reparent_keep_world(
        &mut self,
        child: NodeId,
        parent: Option<NodeId>,
    ) -> Result<(), SceneError> {
        let world = self.world_transform(child)?;
        self.set_parent(child, parent)?;
        self.set_world(child, world)
    }

    // ── dynamic attributes ───────────────────────────────────────────

    /// Sets (or creates) a dynamic attribute.
    pub fn set_attr(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> Result<(), SceneError> {
        self.rec_mut(id)?.attrs.insert(name.into(), value.into());
        Ok(())
    }

    /// Reads a dynamic attribute; `None` for missing node or attribute.
    #[must_use]
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&AttrValue> {
        self.nodes.get(&id).and_then(|rec| rec.attrs.get(name))
    }

    /// `true` when the attribute exists.
    #[must_use]
    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// Removes a dynamic attribute if present.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Result<(), SceneError> {
        self.rec_mut(id)?.attrs.remove(name);
        Ok(())
    }

    /// Dynamic attribute names carrying `Float` values, in name order.
    ///
    /// These are the "keyable custom channels" the bake pass samples next to
    /// the transform channels.
    #[must_use]
    pub fn float_attr_names(&self, id: NodeId) -> Vec<String> {
        self.nodes
            .get(&id)
            .map(|rec| {
                rec.attrs
                    .iter()
                    .filter(|(_, v)| matches!(v, AttrValue::Float(_)))
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ── message connections ──────────────────────────────────────────

    /// Connects `src` into the `dst.attr` plug (multi, ordered, idempotent).
    pub fn connect(&mut self, src: NodeId, dst: NodeId, attr: &str) -> Result<(), SceneError> {
        self.rec(src)?;
        self.rec(dst)?;
        let key = (dst, attr.to_owned());
        let bucket = self.conn_into.entry(key).or_default();
        if bucket.contains(&src) {
            return Ok(());
        }
        bucket.push(src);
        self.conn_out
            .entry(src)
            .or_default()
            .push(Plug::new(dst, attr));
        Ok(())
    }

    /// Removes one connection if present.
    pub fn disconnect(&mut self, src: NodeId, dst: NodeId, attr: &str) {
        if let Some(bucket) = self.conn_into.get_mut(&(dst, attr.to_owned())) {
            bucket.retain(|s| *s != src);
            if bucket.is_empty() {
                self.conn_into.remove(&(dst, attr.to_owned()));
            }
        }
        if let Some(plugs) = self.conn_out.get_mut(&src) {
            plugs.retain(|p| !(p.node == dst && p.attr == attr));
            if plugs.is_empty() {
                self.conn_out.remove(&src);
            }
        }
    }

    /// Clears every connection into the plug.
    pub fn disconnect_all(&mut self, dst: NodeId, attr: &str) {
        let sources = self.connected(dst, attr);
        for src in sources {
            self.disconnect(src, dst, attr);
        }
    }

    /// Ordered sources connected into `dst.attr`.
    #[must_use]
    pub fn connected(&self, dst: NodeId, attr: &str) -> Vec<NodeId> {
        self.conn_into
            .get(&(dst, attr.to_owned()))
            .cloned()
            .unwrap_or_default()
    }

    /// First source connected into `dst.attr`.
    #[must_use]
    pub fn connected_first(&self, dst: NodeId, attr: &str) -> Option<NodeId> {
        self.connected(dst, attr).first().copied()
    }

    /// Destination plugs this node is connected into, in connection order.
    ///
    /// This is the reverse index that makes "find nodes whose parent link
    /// points at me" an O(connections) lookup instead of a scene scan.
    #[must_use]
    pub fn outgoing(&self, src: NodeId) -> Vec<Plug> {
        self.conn_out.get(&src).cloned().unwrap_or_default()
    }

    // ── channels ─────────────────────────────────────────────────────

    fn channel_index(attr: &str) -> Option<(usize, usize)> {
        TRANSFORM_CHANNELS
            .iter()
            .position(|c| *c == attr)
            .map(|i| (i / 3, i % 3))
    }

    /// Reads a channel: transform channels from the local transform
    /// (rotation in degrees), anything else from the float attribute plane.
    pub fn channel_value(&self, plug: &Plug) -> Result<f64, SceneError> {
        if let Some((group, axis)) = Self::channel_index(&plug.attr) {
            let local = self.rec(plug.node)?.local;
            let v = match group {
                0 => local.translation,
                1 => local.euler_deg(),
                _ => local.scale,
            };
            return Ok(v[axis]);
        }
        self.attr(plug.node, &plug.attr)
            .and_then(AttrValue::as_float)
            .ok_or_else(|| SceneError::MissingAttr {
                node: plug.node,
                attr: plug.attr.clone(),
            })
    }

    /// Writes a channel (counterpart of [`Scene::channel_value`]).
    pub fn set_channel(&mut self, plug: &Plug, value: f64) -> Result<(), SceneError> {
        if let Some((group, axis)) = Self::channel_index(&plug.attr) {
            let rec = self.rec_mut(plug.node)?;
            match group {
                0 => rec.local.translation[axis] = value,
                1 => {
                    let mut e = rec.local.euler_deg();
                    e[axis] = value;
                    rec.local.set_euler_deg(e);
                }
                _ => rec.local.scale[axis] = value,
            }
            return Ok(());
        }
        self.set_attr(plug.node, plug.attr.clone(), value)
    }

    // ── drivers ──────────────────────────────────────────────────────

    fn push_driver(&mut self, driver: Driver) -> DriverId {
        self.next_driver += 1;
        let id = DriverId(self.next_driver);
        self.drivers.insert(id, driver);
        id
    }

    /// Creates a constraint from `targets` onto `driven`.
    ///
    /// `maintain_offset` captures the driven node's current world offset per
    /// target so an unposed rig evaluates to its bind pose.
    ///
    /// # Errors
    /// [`SceneError::EmptyTargets`] when no target is given.
    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        targets: &[NodeId],
        driven: NodeId,
        maintain_offset: bool,
    ) -> Result<DriverId, SceneError> {
        if targets.is_empty() {
            return Err(SceneError::EmptyTargets);
        }
        let driven_world = self.world_transform(driven)?;
        let mut offsets = Vec::with_capacity(targets.len());
        for target in targets {
            let offset = if maintain_offset {
                self.world_transform(*target)?.inverse().mul(&driven_world)
            } else {
                Transform::identity()
            };
            offsets.push(offset);
        }
        Ok(self.push_driver(Driver::Constraint {
            kind,
            driven,
            targets: targets.to_vec(),
            offsets,
        }))
    }

    /// Creates a discrete space switch; offsets are always captured.
    pub fn add_space_switch(
        &mut self,
        driven: NodeId,
        targets: &[NodeId],
        selector: Plug,
        translate: bool,
        rotate: bool,
        scale: bool,
    ) -> Result<DriverId, SceneError> {
        if targets.is_empty() {
            return Err(SceneError::EmptyTargets);
        }
        let driven_world = self.world_transform(driven)?;
        let mut offsets = Vec::with_capacity(targets.len());
        for target in targets {
            offsets.push(self.world_transform(*target)?.inverse().mul(&driven_world));
        }
        Ok(self.push_driver(Driver::SpaceSwitch {
            driven,
            targets: targets.to_vec(),
            offsets,
            selector,
            translate,
            rotate,
            scale,
        }))
    }

    /// Creates an aim driver; the rotation offset is captured so the driven
    /// node keeps its current pose at rest.
    pub fn add_aim(
        &mut self,
        driven: NodeId,
        target: NodeId,
        aim_axis: DVec3,
        up_axis: DVec3,
        up_object: Option<NodeId>,
    ) -> Result<DriverId, SceneError> {
        let current = self.world_transform(driven)?.rotation;
        let offset = match self.aim_rotation(driven, target, aim_axis, up_axis, up_object)? {
            Some(solved) => solved.inverse() * current,
            None => DQuat::IDENTITY,
        };
        Ok(self.push_driver(Driver::Aim {
            driven,
            target,
            aim_axis,
            up_axis,
            up_object,
            offset,
        }))
    }

    /// Creates a scalar channel link.
    pub fn add_link(&mut self, src: Plug, op: LinkOp, dst: Plug) -> Result<DriverId, SceneError> {
        self.rec(src.node)?;
        self.rec(dst.node)?;
        Ok(self.push_driver(Driver::Link { src, dst, op }))
    }

    /// Looks up a driver.
    #[must_use]
    pub fn driver(&self, id: DriverId) -> Option<&Driver> {
        self.drivers.get(&id)
    }

    /// Removes a driver; `true` if it existed.
    pub fn remove_driver(&mut self, id: DriverId) -> bool {
        self.drivers.remove(&id).is_some()
    }

    /// Pose-follow-links writing to `driven`, in creation order.
    #[must_use]
    pub fn pose_links_on(&self, driven: NodeId) -> Vec<DriverId> {
        self.drivers
            .iter()
            .filter(|(_, d)| d.is_pose_link() && d.driven_node() == driven)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Channel links writing into `driven`, in creation order.
    #[must_use]
    pub fn links_into(&self, driven: NodeId) -> Vec<DriverId> {
        self.drivers
            .iter()
            .filter(|(_, d)| matches!(d, Driver::Link { dst, .. } if dst.node == driven))
            .map(|(id, _)| *id)
            .collect()
    }

    // ── keys & evaluation ────────────────────────────────────────────

    /// Sets a keyframe on a channel.
    pub fn set_key(&mut self, plug: &Plug, frame: i64, value: f64) {
        self.keys
            .entry((plug.node, plug.attr.clone()))
            .or_default()
            .insert(frame, value);
    }

    /// Keyed value at `frame` (step interpolation: last key at or before the
    /// frame, else the first key).
    #[must_use]
    pub fn key_value(&self, plug: &Plug, frame: i64) -> Option<f64> {
        let track = self.keys.get(&(plug.node, plug.attr.clone()))?;
        track
            .range(..=frame)
            .next_back()
            .or_else(|| track.iter().next())
            .map(|(_, v)| *v)
    }

    /// Runs one driver pass over the current pose.
    pub fn evaluate(&mut self) {
        let ids: Vec<DriverId> = self.drivers.keys().copied().collect();
        for id in ids {
            if let Some(driver) = self.drivers.get(&id).cloned() {
                // A driver whose nodes vanished mid-pass is skipped; delete()
                // removes such drivers eagerly, this is the belt.
                let _ = self.apply_driver(&driver);
            }
        }
    }

    /// Applies keyed channel values for `frame`, then runs a driver pass.
    pub fn evaluate_at(&mut self, frame: i64) {
        let keyed: Vec<(NodeId, String)> = self.keys.keys().cloned().collect();
        for (node, attr) in keyed {
            let plug = Plug::new(node, attr);
            if let Some(v) = self.key_value(&plug, frame) {
                let _ = self.set_channel(&plug, v);
            }
        }
        self.evaluate();
    }

    fn apply_driver(&mut self, driver: &Driver) -> Result<(), SceneError> {
        match driver {
            Driver::Constraint {
                kind,
                driven,
                targets,
                offsets,
            } => self.apply_follow(*kind, *driven, targets[0], &offsets[0], true, true, true),
            Driver::SpaceSwitch {
                driven,
                targets,
                offsets,
                selector,
                translate,
                rotate,
                scale,
            } => {
                let raw = self.channel_value(selector).unwrap_or(0.0);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let idx = (raw.max(0.0) as usize).min(targets.len() - 1);
                self.apply_follow(
                    ConstraintKind::Parent,
                    *driven,
                    targets[idx],
                    &offsets[idx],
                    *translate,
                    *rotate,
                    *scale,
                )
            }
            Driver::Aim {
                driven,
                target,
                aim_axis,
                up_axis,
                up_object,
                offset,
            } => {
                if let Some(solved) =
                    self.aim_rotation(*driven, *target, *aim_axis, *up_axis, *up_object)?
                {
                    let world_rot = solved * *offset;
                    let parent_rot = match self.rec(*driven)?.parent {
                        None => DQuat::IDENTITY,
                        Some(p) => self.world_transform(p)?.rotation,
                    };
                    self.rec_mut(*driven)?.local.rotation = parent_rot.inverse() * world_rot;
                }
                Ok(())
            }
            Driver::Link { src, dst, op } => {
                let v = self.channel_value(src)?;
                self.set_channel(dst, op.apply(v))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_follow(
        &mut self,
        kind: ConstraintKind,
        driven: NodeId,
        target: NodeId,
        offset: &Transform,
        translate: bool,
        rotate: bool,
        scale: bool,
    ) -> Result<(), SceneError> {
        let desired_world = self.world_transform(target)?.mul(offset);
        let desired_local = match self.rec(driven)?.parent {
            None => desired_world,
            Some(p) => self.world_transform(p)?.inverse().mul(&desired_world),
        };
        let rec = self.rec_mut(driven)?;
        match kind {
            ConstraintKind::Parent => {
                if translate {
                    rec.local.translation = desired_local.translation;
                }
                if rotate {
                    rec.local.rotation = desired_local.rotation;
                }
                if scale {
                    rec.local.scale = desired_local.scale;
                }
            }
            ConstraintKind::Orient => rec.local.rotation = desired_local.rotation,
            ConstraintKind::Point => rec.local.translation = desired_local.translation,
            ConstraintKind::Scale => rec.local.scale = desired_local.scale,
        }
        Ok(())
    }

    /// World rotation that points `aim_axis` at `target`; `None` when the
    /// two nodes are coincident.
    fn aim_rotation(
        &self,
        driven: NodeId,
        target: NodeId,
        aim_axis: DVec3,
        up_axis: DVec3,
        up_object: Option<NodeId>,
    ) -> Result<Option<DQuat>, SceneError> {
        let from = self.world_transform(driven)?.translation;
        let to = self.world_transform(target)?.translation;
        let forward = to - from;
        if forward.length_squared() < 1e-12 {
            return Ok(None);
        }
        let forward = forward.normalize();
        let up_hint = match up_object {
            Some(obj) => {
                let hint = self.world_transform(obj)?.translation - from;
                if hint.length_squared() < 1e-12 {
                    DVec3::Y
                } else {
                    hint.normalize()
                }
            }
            None => DVec3::Y,
        };
        let mut right = up_hint.cross(forward);
        if right.length_squared() < 1e-12 {
            right = forward.any_orthogonal_vector();
        }
        let right = right.normalize();
        let up = forward.cross(right).normalize();

        let s_f = aim_axis.normalize_or_zero();
        let mut s_u = up_axis - s_f * up_axis.dot(s_f);
        if s_u.length_squared() < 1e-12 {
            s_u = s_f.any_orthogonal_vector();
        }
        let s_u = s_u.normalize();

        let world = DMat3::from_cols(forward, up, up.cross(forward));
        let source = DMat3::from_cols(s_f, s_u, s_u.cross(s_f));
        Ok(Some(DQuat::from_mat3(&(world * source.transpose()))))
    }

    // ── deletion & transactions ──────────────────────────────────────

    /// Deletes a node and its DAG subtree.
    ///
    /// Connections, drivers and keys touching any deleted node are removed
    /// with it. Deleting an already-missing node is a no-op (teardown runs
    /// against partially-broken graphs).
    pub fn delete(&mut self, id: NodeId) {
        if !self.nodes.contains_key(&id) {
            return;
        }
        let mut doomed: BTreeSet<NodeId> = self.descendants(id).into_iter().collect();
        doomed.insert(id);

        if let Some(parent) = self.nodes.get(&id).and_then(|rec| rec.parent) {
            if let Some(rec) = self.nodes.get_mut(&parent) {
                rec.children.retain(|c| !doomed.contains(c));
            }
        }
        for n in &doomed {
            self.nodes.remove(n);
        }
        self.conn_into.retain(|(dst, _), sources| {
            if doomed.contains(dst) {
                return false;
            }
            sources.retain(|s| !doomed.contains(s));
            !sources.is_empty()
        });
        self.conn_out.retain(|src, plugs| {
            if doomed.contains(src) {
                return false;
            }
            plugs.retain(|p| !doomed.contains(&p.node));
            !plugs.is_empty()
        });
        self.drivers
            .retain(|_, d| !doomed.iter().any(|n| d.touches(*n)));
        self.keys.retain(|(node, _), _| !doomed.contains(node));
    }

    /// Runs `f` inside a rollback scope: on `Err` the scene is restored to
    /// its state at entry.
    ///
    /// Even when a build cannot fail this wraps the mutation in an explicit
    /// transaction so a raised error never leaves partially constructed
    /// graph state behind.
    pub fn scoped<T, E>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let snapshot = self.clone();
        match f(self) {
            Ok(v) => Ok(v),
            Err(e) => {
                *self = snapshot;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_cascades_to_connections_and_drivers() {
        let mut scene = Scene::new();
        let a = scene.create_node("a", NodeKind::Transform);
        let b = scene.create_node("b", NodeKind::Transform);
        let net = scene.create_node("net", NodeKind::Network);
        scene.set_parent(b, Some(a)).unwrap();
        scene.connect(b, net, "members").unwrap();
        scene
            .add_constraint(ConstraintKind::Parent, &[b], net, false)
            .unwrap();

        scene.delete(a);
        assert!(!scene.exists(a));
        assert!(!scene.exists(b));
        assert!(scene.connected(net, "members").is_empty());
        assert!(scene.pose_links_on(net).is_empty());
    }

    #[test]
    fn scoped_rolls_back_on_error() {
        let mut scene = Scene::new();
        let before = scene.node_count();
        let result: Result<(), &str> = scene.scoped(|s| {
            s.create_node("junk", NodeKind::Transform);
            Err("boom")
        });
        assert!(result.is_err());
        assert_eq!(scene.node_count(), before);
    }

    #[test]
    fn maintain_offset_keeps_bind_pose_at_rest() {
        let mut scene = Scene::new();
        let target = scene.create_node("target", NodeKind::Transform);
        let driven = scene.create_node("driven", NodeKind::Joint);
        scene
            .set_local(driven, Transform::from_translation(glam::DVec3::new(3.0, 0.0, 0.0)))
            .unwrap();
        scene
            .add_constraint(ConstraintKind::Parent, &[target], driven, true)
            .unwrap();
        scene.evaluate();
        let t = scene.local(driven).unwrap().translation;
        assert!((t.x - 3.0).abs() < 1e-9);
    }

    #[test]
    fn clamp_link_splits_signed_channel() {
        let mut scene = Scene::new();
        let src = scene.create_node("ctrl", NodeKind::Transform);
        let dst = scene.create_node("pivot", NodeKind::Joint);
        scene.set_attr(src, "lean", 90.0).unwrap();
        scene
            .add_link(
                Plug::new(src, "lean"),
                LinkOp::Clamp { min: 0.0, max: 180.0 },
                Plug::new(dst, "rx"),
            )
            .unwrap();
        scene.evaluate();
        let e = scene.local(dst).unwrap().euler_deg();
        assert!((e.x - 90.0).abs() < 1e-9);
    }
}
