// SPDX-License-Identifier: Apache-2.0
#![allow(missing_docs)]
//! Integration tests for scene evaluation: constraint chains, space
//! switching, keyed playback and rollback scopes.

use glam::DVec3;
use marionette_scene::{ConstraintKind, LinkOp, NodeKind, Plug, Scene, Transform};

fn translated(scene: &mut Scene, name: &str, kind: NodeKind, t: DVec3) -> marionette_scene::NodeId {
    let id = scene.create_node(name, kind);
    scene.set_local(id, Transform::from_translation(t)).unwrap();
    id
}

#[test]
fn constraint_chain_settles_in_one_ordered_pass() {
    let mut scene = Scene::new();
    let ctrl = translated(&mut scene, "ctrl", NodeKind::Transform, DVec3::ZERO);
    let helper = translated(&mut scene, "helper", NodeKind::Joint, DVec3::ZERO);
    let bind = translated(&mut scene, "bind", NodeKind::Joint, DVec3::ZERO);

    // ctrl -> helper -> bind, created in dependency order.
    scene
        .add_constraint(ConstraintKind::Parent, &[ctrl], helper, true)
        .unwrap();
    scene
        .add_constraint(ConstraintKind::Parent, &[helper], bind, true)
        .unwrap();

    scene
        .set_local(ctrl, Transform::from_translation(DVec3::new(0.0, 2.0, 0.0)))
        .unwrap();
    scene.evaluate();

    let t = scene.world_transform(bind).unwrap().translation;
    assert!((t.y - 2.0).abs() < 1e-9);
}

#[test]
fn space_switch_is_instantaneous() {
    let mut scene = Scene::new();
    let a = translated(&mut scene, "a", NodeKind::Transform, DVec3::new(1.0, 0.0, 0.0));
    let b = translated(&mut scene, "b", NodeKind::Transform, DVec3::new(-1.0, 0.0, 0.0));
    let driven = translated(&mut scene, "driven", NodeKind::Transform, DVec3::ZERO);
    let switch = scene.create_node("switch", NodeKind::Transform);
    scene.set_attr(switch, "follow", 0i64).unwrap();

    scene
        .add_space_switch(driven, &[a, b], Plug::new(switch, "follow"), true, true, false)
        .unwrap();

    // Move target a; the driven node follows it exactly.
    scene
        .set_local(a, Transform::from_translation(DVec3::new(1.0, 5.0, 0.0)))
        .unwrap();
    scene.evaluate();
    assert!((scene.world_transform(driven).unwrap().translation.y - 5.0).abs() < 1e-9);

    // Flip the selector: the driven node snaps to b's space, no blend.
    scene.set_attr(switch, "follow", 1i64).unwrap();
    scene.evaluate();
    assert!(scene.world_transform(driven).unwrap().translation.y.abs() < 1e-9);
}

#[test]
fn keyed_channel_drives_link_over_frames() {
    let mut scene = Scene::new();
    let ctrl = scene.create_node("ctrl", NodeKind::Transform);
    let pivot = scene.create_node("pivot", NodeKind::Joint);
    scene.set_attr(ctrl, "lift", 0.0f64).unwrap();
    scene
        .add_link(
            Plug::new(ctrl, "lift"),
            LinkOp::Mul(2.0),
            Plug::new(pivot, "rz"),
        )
        .unwrap();

    let plug = Plug::new(ctrl, "lift");
    scene.set_key(&plug, 0, 0.0);
    scene.set_key(&plug, 10, 45.0);

    scene.evaluate_at(0);
    assert!(scene.local(pivot).unwrap().euler_deg().z.abs() < 1e-9);
    scene.evaluate_at(10);
    assert!((scene.local(pivot).unwrap().euler_deg().z - 90.0).abs() < 1e-6);
    // Step interpolation holds the last key.
    scene.evaluate_at(20);
    assert!((scene.local(pivot).unwrap().euler_deg().z - 90.0).abs() < 1e-6);
}

#[test]
fn repeated_evaluation_is_a_fixed_point() {
    let mut scene = Scene::new();
    let root = translated(&mut scene, "root", NodeKind::Joint, DVec3::ZERO);
    let child = translated(&mut scene, "child", NodeKind::Joint, DVec3::new(0.0, 1.0, 0.0));
    scene.set_parent(child, Some(root)).unwrap();
    let ctrl = translated(&mut scene, "ctrl", NodeKind::Transform, DVec3::new(2.0, 0.0, 0.0));
    scene
        .add_constraint(ConstraintKind::Parent, &[ctrl], child, true)
        .unwrap();

    scene.evaluate();
    let first = scene.world_transform(child).unwrap();
    for _ in 0..5 {
        scene.evaluate();
    }
    let settled = scene.world_transform(child).unwrap();
    assert!((first.translation - settled.translation).length() < 1e-9);
}
