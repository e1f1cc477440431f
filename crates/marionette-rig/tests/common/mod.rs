// SPDX-License-Identifier: Apache-2.0
//! Shared marked-up biped fixture for the integration suites.
#![allow(dead_code)]

use glam::DVec3;
use marionette_rig::{
    set_chain_end, set_chain_start, set_chain_twist, set_hierarchy_start, set_joint_region,
    set_joint_side, AssetRoot, Rig, SkeletonHierarchy,
};
use marionette_scene::{NodeId, NodeKind, Scene, Transform};

/// One built biped: skeleton, anchor, rig and the markup index.
pub struct Fixture {
    pub root: NodeId,
    pub pelvis: NodeId,
    pub spine_01: NodeId,
    pub spine_02: NodeId,
    pub shoulder: NodeId,
    pub elbow: NodeId,
    pub wrist: NodeId,
    pub hip: NodeId,
    pub ankle: NodeId,
    pub toe_tip: NodeId,
    pub asset_root: AssetRoot,
    pub rig: Rig,
    pub skel: SkeletonHierarchy,
}

pub fn joint(scene: &mut Scene, name: &str, parent: Option<NodeId>, t: DVec3) -> NodeId {
    let j = scene.create_node(name, NodeKind::Joint);
    if let Some(p) = parent {
        scene.set_parent(j, Some(p)).unwrap();
    }
    scene.set_local(j, Transform::from_translation(t)).unwrap();
    j
}

/// Builds the standard biped used across the suites: root, pelvis chain,
/// spine chain, a bent left arm with two twist joints, a left leg with two
/// reversed twist joints, and a four-joint foot with its five contact
/// joints.
pub fn build_biped(scene: &mut Scene) -> Fixture {
    let root = joint(scene, "root", None, DVec3::ZERO);
    set_joint_side(scene, root, "center");
    set_chain_start(scene, root, "root");
    set_chain_end(scene, root, "root");
    set_hierarchy_start(scene, root);

    let pelvis = joint(scene, "pelvis", Some(root), DVec3::new(0.0, 1.0, 0.0));
    set_joint_side(scene, pelvis, "center");
    set_chain_start(scene, pelvis, "pelvis");

    let spine_01 = joint(scene, "spine_01", Some(pelvis), DVec3::new(0.0, 0.3, 0.0));
    set_joint_side(scene, spine_01, "center");
    set_chain_end(scene, spine_01, "pelvis");
    set_chain_start(scene, spine_01, "spine");

    let spine_02 = joint(scene, "spine_02", Some(spine_01), DVec3::new(0.0, 0.4, 0.0));
    set_joint_side(scene, spine_02, "center");
    set_chain_end(scene, spine_02, "spine");

    // Left arm, bent slightly forward so ik solves have a plane.
    let shoulder = joint(scene, "shoulder_l", Some(spine_02), DVec3::new(0.2, 0.1, 0.0));
    set_joint_side(scene, shoulder, "left");
    set_chain_start(scene, shoulder, "arm");
    let elbow = joint(scene, "elbow_l", Some(shoulder), DVec3::new(1.0, 0.0, 0.2));
    set_joint_side(scene, elbow, "left");
    set_joint_region(scene, elbow, "arm");
    let wrist = joint(scene, "wrist_l", Some(elbow), DVec3::new(1.0, 0.0, -0.2));
    set_joint_side(scene, wrist, "left");
    set_chain_end(scene, wrist, "arm");

    // Arm twists sit near the shoulder, so the bucket reads non-reversed.
    for (name, t) in [
        ("arm_twist_01_l", DVec3::new(0.33, 0.0, 0.07)),
        ("arm_twist_02_l", DVec3::new(0.66, 0.0, 0.13)),
    ] {
        let tw = joint(scene, name, Some(shoulder), t);
        set_joint_side(scene, tw, "left");
        set_chain_twist(scene, tw, "arm_twist");
    }

    // Left leg.
    let hip = joint(scene, "hip_l", Some(pelvis), DVec3::new(0.2, -0.1, 0.0));
    set_joint_side(scene, hip, "left");
    set_chain_start(scene, hip, "leg");
    let knee = joint(scene, "knee_l", Some(hip), DVec3::new(0.0, -1.0, 0.1));
    set_joint_side(scene, knee, "left");
    set_joint_region(scene, knee, "leg");
    let ankle = joint(scene, "ankle_l", Some(knee), DVec3::new(0.0, -1.0, -0.1));
    set_joint_side(scene, ankle, "left");
    set_chain_end(scene, ankle, "leg");
    set_chain_start(scene, ankle, "foot");

    // Leg twists sit near the knee, so the bucket reads reversed.
    for (name, t) in [
        ("leg_twist_01_l", DVec3::new(0.0, -0.7, 0.07)),
        ("leg_twist_02_l", DVec3::new(0.0, -0.85, 0.085)),
    ] {
        let tw = joint(scene, name, Some(hip), t);
        set_joint_side(scene, tw, "left");
        set_chain_twist(scene, tw, "leg_twist");
    }

    // Foot chain and its contact joints.
    let ball = joint(scene, "ball_l", Some(ankle), DVec3::new(0.0, -0.3, 0.5));
    set_joint_side(scene, ball, "left");
    set_joint_region(scene, ball, "foot");
    let toe = joint(scene, "toe_l", Some(ball), DVec3::new(0.0, 0.0, 0.3));
    set_joint_side(scene, toe, "left");
    set_joint_region(scene, toe, "foot");
    let toe_tip = joint(scene, "toe_tip_l", Some(toe), DVec3::new(0.0, 0.0, 0.2));
    set_joint_side(scene, toe_tip, "left");
    set_chain_end(scene, toe_tip, "foot");
    for (name, region, t) in [
        ("toe_contact_l", "foot_toe", DVec3::new(0.0, -0.3, 1.0)),
        ("ball_contact_l", "foot_ball", DVec3::new(0.0, -0.3, 0.5)),
        ("heel_contact_l", "foot_heel", DVec3::new(0.0, -0.3, -0.3)),
        ("ext_contact_l", "foot_exterior", DVec3::new(0.2, -0.3, 0.5)),
        ("int_contact_l", "foot_interior", DVec3::new(-0.2, -0.3, 0.5)),
    ] {
        let c = joint(scene, name, Some(ankle), t);
        set_joint_side(scene, c, "left");
        set_chain_start(scene, c, region);
    }

    let asset_root = AssetRoot::create(scene, root, "character", "ch_001", "biped").unwrap();
    let rig = Rig::create(scene, &asset_root).unwrap();
    let skel = SkeletonHierarchy::build(scene, root).unwrap();
    Fixture {
        root,
        pelvis,
        spine_01,
        spine_02,
        shoulder,
        elbow,
        wrist,
        hip,
        ankle,
        toe_tip,
        asset_root,
        rig,
        skel,
    }
}

/// World poses of every joint under (and including) `root`.
pub fn pose_snapshot(scene: &Scene, root: NodeId) -> Vec<(NodeId, Transform)> {
    let mut joints = vec![root];
    joints.extend(
        scene
            .descendants(root)
            .into_iter()
            .filter(|j| scene.kind(*j) == Ok(NodeKind::Joint)),
    );
    joints
        .into_iter()
        .map(|j| (j, scene.world_transform(j).unwrap()))
        .collect()
}

pub fn assert_pose_matches(scene: &Scene, snapshot: &[(NodeId, Transform)]) {
    for (j, expected) in snapshot {
        let got = scene.world_transform(*j).unwrap();
        assert!(
            (got.translation - expected.translation).length() < 1e-6,
            "joint {} moved: {:?} -> {:?}",
            scene.name(*j).unwrap(),
            expected.translation,
            got.translation
        );
        assert!(
            got.rotation.dot(expected.rotation).abs() > 1.0 - 1e-9,
            "joint {} rotated",
            scene.name(*j).unwrap()
        );
    }
}
