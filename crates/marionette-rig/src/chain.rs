// SPDX-License-Identifier: Apache-2.0
//! Joint chain helpers shared by the component builders.

use glam::DVec3;
use marionette_scene::{NodeId, NodeKind, Scene, SceneError};

/// Joints from `start` down to `end` inclusive, walking the hierarchy.
///
/// `None` when `end` is not `start` or one of its descendants. A single
/// joint chain is expressed as `start == end`.
#[must_use]
pub fn between_joints(scene: &Scene, start: NodeId, end: NodeId) -> Option<Vec<NodeId>> {
    let mut path = vec![end];
    let mut cursor = end;
    while cursor != start {
        cursor = scene.parent(cursor).ok().flatten()?;
        path.push(cursor);
    }
    path.reverse();
    Some(path)
}

/// Duplicates one joint: same local pose, same attributes, no parent.
pub fn duplicate_joint(
    scene: &mut Scene,
    joint: NodeId,
    name: &str,
) -> Result<NodeId, SceneError> {
    let dup = scene.create_node(name, NodeKind::Joint);
    let local = scene.local(joint)?;
    scene.set_local(dup, local)?;
    // Markup travels with the duplicate so serialization can identify it.
    for attr in [
        crate::node::SIDE_ATTR,
        crate::node::REGION_ATTR,
        crate::markup::CHAIN_START_ATTR,
        crate::markup::CHAIN_END_ATTR,
    ] {
        if let Some(v) = scene.attr(joint, attr).cloned() {
            scene.set_attr(dup, attr, v)?;
        }
    }
    Ok(dup)
}

/// Duplicates the `start..=end` sub-chain privately.
///
/// The duplicate root is left unparented; the caller owns where it lands
/// (normally a component's do-not-touch group). Returns `None` when `end`
/// does not descend from `start`.
pub fn duplicate_chain(
    scene: &mut Scene,
    start: NodeId,
    end: NodeId,
    suffix: &str,
) -> Result<Option<Vec<NodeId>>, SceneError> {
    let Some(source) = between_joints(scene, start, end) else {
        return Ok(None);
    };
    let mut dups: Vec<NodeId> = Vec::with_capacity(source.len());
    for joint in source {
        let name = format!("{}_{suffix}", scene.name(joint)?);
        let dup = duplicate_joint(scene, joint, &name)?;
        if let Some(prev) = dups.last() {
            scene.set_parent(dup, Some(*prev))?;
        } else {
            // Root duplicate keeps the source's world pose.
            let world = scene.world_transform(joint)?;
            scene.set_world(dup, world)?;
        }
        dups.push(dup);
    }
    Ok(Some(dups))
}

/// Primary axis of a joint: the local axis its first child lies along.
///
/// Returns the axis index (0 = x, 1 = y, 2 = z) and whether the child sits
/// on the positive side. Falls back to +x for leaf joints.
#[must_use]
pub fn primary_axis(scene: &Scene, joint: NodeId) -> (usize, bool) {
    let Some(child) = scene
        .children(joint)
        .ok()
        .and_then(|c| {
            c.into_iter()
                .find(|n| scene.kind(*n) == Ok(NodeKind::Joint))
        })
    else {
        return (0, true);
    };
    let t = scene
        .local(child)
        .map(|l| l.translation)
        .unwrap_or(DVec3::X);
    let abs = t.abs();
    let axis = if abs.x >= abs.y && abs.x >= abs.z {
        0
    } else if abs.y >= abs.z {
        1
    } else {
        2
    };
    (axis, t[axis] >= 0.0)
}

/// Channel name (`rx`/`ry`/`rz`) for a rotation axis index.
#[must_use]
pub fn rotate_channel(axis: usize) -> &'static str {
    ["rx", "ry", "rz"][axis.min(2)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use marionette_scene::Transform;

    #[test]
    fn between_walks_inclusive_path() {
        let mut scene = Scene::new();
        let a = scene.create_node("a", NodeKind::Joint);
        let b = scene.create_node("b", NodeKind::Joint);
        let c = scene.create_node("c", NodeKind::Joint);
        scene.set_parent(b, Some(a)).unwrap();
        scene.set_parent(c, Some(b)).unwrap();

        assert_eq!(between_joints(&scene, a, c), Some(vec![a, b, c]));
        assert_eq!(between_joints(&scene, a, a), Some(vec![a]));
        assert_eq!(between_joints(&scene, c, a), None);
    }

    #[test]
    fn duplicate_chain_preserves_pose() {
        let mut scene = Scene::new();
        let a = scene.create_node("a", NodeKind::Joint);
        let b = scene.create_node("b", NodeKind::Joint);
        scene.set_parent(b, Some(a)).unwrap();
        scene
            .set_local(b, Transform::from_translation(DVec3::new(0.0, 2.0, 0.0)))
            .unwrap();

        let dups = duplicate_chain(&mut scene, a, b, "fk").unwrap().unwrap();
        assert_eq!(dups.len(), 2);
        let src_w = scene.world_transform(b).unwrap().translation;
        let dup_w = scene.world_transform(dups[1]).unwrap().translation;
        assert!((src_w - dup_w).length() < 1e-9);
        assert!(scene.name(dups[0]).unwrap().ends_with("_fk"));
    }
}
