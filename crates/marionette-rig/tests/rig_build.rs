// SPDX-License-Identifier: Apache-2.0
#![allow(missing_docs)]
//! Integration tests for component builds: bind-pose round trips, control
//! drives, twist distribution, space switching, baking and scale wiring.

mod common;

use common::{build_biped, joint, pose_snapshot, assert_pose_matches, Fixture};
use glam::DVec3;
use marionette_rig::components::{
    AimComponent, AimParams, ChannelFloatComponent, ChannelFloatParams, ChannelSpec,
    CogComponent, CogParams, DisplayComponent, FkComponent, FkParams, IkComponent, IkParams,
    MultiConstraintComponent, MultiConstraintParams, PelvisComponent, PelvisParams, PinComponent,
    PinParams, PistonComponent, ReverseFootComponent, ReverseFootParams, TwistComponent,
    WorldComponent, WorldParams,
};
use marionette_rig::{detach, Component};
use marionette_scene::{Driver, LinkOp, NodeKind, Plug, Scene, Transform};

type Builder = fn(&mut Scene, &Fixture) -> Option<Box<dyn Component>>;

fn boxed<C: Component + 'static>(c: C) -> Box<dyn Component> {
    Box::new(c)
}

fn build_fk(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    FkComponent::create(scene, &fx.rig, fx.shoulder, fx.wrist, "left", "arm", FkParams::default())
        .unwrap()
        .map(boxed)
}

fn build_ik(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    IkComponent::create(scene, &fx.rig, fx.hip, fx.ankle, "left", "leg", IkParams::default())
        .unwrap()
        .map(boxed)
}

fn build_reverse_foot(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    ReverseFootComponent::create(
        scene,
        &fx.rig,
        &fx.skel,
        fx.ankle,
        fx.toe_tip,
        "left",
        "foot",
        ReverseFootParams::default(),
    )
    .unwrap()
    .map(boxed)
}

fn build_twist(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    TwistComponent::create(scene, &fx.rig, &fx.skel, "left", "arm_twist")
        .unwrap()
        .map(boxed)
}

fn build_world(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    WorldComponent::create(scene, &fx.rig, fx.root, "center", "world", WorldParams::default())
        .unwrap()
        .map(boxed)
}

fn build_pelvis(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    PelvisComponent::create(
        scene,
        &fx.rig,
        fx.pelvis,
        fx.spine_01,
        "center",
        "pelvis",
        PelvisParams::default(),
    )
    .unwrap()
    .map(boxed)
}

fn build_cog(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    CogComponent::create(scene, &fx.rig, fx.pelvis, "center", "cog", CogParams::default())
        .unwrap()
        .map(boxed)
}

fn build_aim(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    AimComponent::create(scene, &fx.rig, fx.spine_02, "center", "look", AimParams::default())
        .unwrap()
        .map(boxed)
}

fn build_piston(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    PistonComponent::create(scene, &fx.rig, fx.shoulder, fx.elbow, "left", "arm_piston")
        .unwrap()
        .map(boxed)
}

fn build_pin(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    PinComponent::create(scene, &fx.rig, fx.wrist, None, "left", "hand_pin", PinParams::default())
        .unwrap()
        .map(boxed)
}

fn build_multi_constraint(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    let world = WorldComponent::create(
        scene,
        &fx.rig,
        fx.root,
        "center",
        "world",
        WorldParams::default(),
    )
    .unwrap()?;
    let source = world.root_flag(scene)?;
    let a = scene.create_node("space_a", NodeKind::Transform);
    let b = scene.create_node("space_b", NodeKind::Transform);
    MultiConstraintComponent::create(
        scene,
        &fx.rig,
        source.node(),
        &[a, b],
        "center",
        "world_space",
        MultiConstraintParams::default(),
    )
    .unwrap()
    .map(boxed)
}

fn build_channel_float(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    let ctrl = scene.create_node("settings_ctrl", NodeKind::Transform);
    ChannelFloatComponent::create(
        scene,
        &fx.rig,
        ctrl,
        fx.root,
        "center",
        "settings",
        ChannelFloatParams {
            channels: vec![ChannelSpec::unit("ikFk")],
        },
    )
    .unwrap()
    .map(boxed)
}

fn build_display(scene: &mut Scene, fx: &Fixture) -> Option<Box<dyn Component>> {
    Some(boxed(DisplayComponent::create(scene, &fx.rig).unwrap()))
}

#[test]
fn every_component_round_trips_the_bind_pose() {
    let builders: [(&str, Builder); 13] = [
        ("fk", build_fk),
        ("ik", build_ik),
        ("reverse_foot", build_reverse_foot),
        ("twist", build_twist),
        ("world", build_world),
        ("pelvis", build_pelvis),
        ("cog", build_cog),
        ("aim", build_aim),
        ("piston", build_piston),
        ("pin", build_pin),
        ("multi_constraint", build_multi_constraint),
        ("channel_float", build_channel_float),
        ("display", build_display),
    ];
    for (name, builder) in builders {
        let mut scene = Scene::new();
        let fx = build_biped(&mut scene);
        let snapshot = pose_snapshot(&scene, fx.root);

        let component = builder(&mut scene, &fx)
            .unwrap_or_else(|| panic!("{name} build skipped unexpectedly"));
        let attachment = component
            .attach_to_skeleton(&mut scene, fx.root, Some(&fx.skel))
            .unwrap();
        scene.evaluate();
        assert_pose_matches(&scene, &snapshot);

        if let Some(att) = &attachment {
            detach(&mut scene, att);
        }
        component.remove(&mut scene);
        scene.evaluate();
        assert_pose_matches(&scene, &snapshot);
    }
}

#[test]
fn fk_controls_drive_the_bind_chain() {
    let mut scene = Scene::new();
    let fx = build_biped(&mut scene);
    let fk = FkComponent::create(
        &mut scene,
        &fx.rig,
        fx.shoulder,
        fx.wrist,
        "left",
        "arm",
        FkParams::default(),
    )
    .unwrap()
    .unwrap();

    let wrist_before = scene.world_transform(fx.wrist).unwrap().translation;
    let start = fk.start_flag(&scene).unwrap();
    let mut local = scene.local(start.node()).unwrap();
    local.set_euler_deg(DVec3::new(0.0, 0.0, 90.0));
    scene.set_local(start.node(), local).unwrap();
    scene.evaluate();
    scene.evaluate();

    let wrist_after = scene.world_transform(fx.wrist).unwrap().translation;
    assert!(
        (wrist_after - wrist_before).length() > 0.5,
        "rotating the first control must swing the wrist"
    );
}

#[test]
fn twist_links_follow_the_ramp_and_reverse() {
    let mut scene = Scene::new();
    let fx = build_biped(&mut scene);

    let mults = |scene: &Scene, joints: &[marionette_scene::NodeId]| -> Vec<f64> {
        joints
            .iter()
            .map(|j| {
                let links = scene.links_into(*j);
                assert_eq!(links.len(), 1);
                match scene.driver(links[0]) {
                    Some(Driver::Link { op: LinkOp::Mul(m), .. }) => *m,
                    other => panic!("expected mul link, got {other:?}"),
                }
            })
            .collect()
    };

    // Arm twists sit near the shoulder: non-reversed, positive ramp.
    TwistComponent::create(&mut scene, &fx.rig, &fx.skel, "left", "arm_twist")
        .unwrap()
        .unwrap();
    let arm = fx.skel.twist_bucket("left", "arm_twist").unwrap().joints.clone();
    let m = mults(&scene, &arm);
    assert!((m[0] - 2.0 / 3.0).abs() < 1e-9);
    assert!((m[1] - 4.0 / 3.0).abs() < 1e-9);

    // Leg twists sit near the knee: reversed, negated ramp.
    TwistComponent::create(&mut scene, &fx.rig, &fx.skel, "left", "leg_twist")
        .unwrap()
        .unwrap();
    let leg = fx.skel.twist_bucket("left", "leg_twist").unwrap().joints.clone();
    let m = mults(&scene, &leg);
    assert!((m[0] + 2.0 / 3.0).abs() < 1e-9);
    assert!((m[1] + 4.0 / 3.0).abs() < 1e-9);
}

#[test]
fn space_switch_snaps_between_spaces() {
    let mut scene = Scene::new();
    let fx = build_biped(&mut scene);
    let world = WorldComponent::create(
        &mut scene,
        &fx.rig,
        fx.root,
        "center",
        "world",
        WorldParams::default(),
    )
    .unwrap()
    .unwrap();
    let source = world.root_flag(&scene).unwrap();
    let a = scene.create_node("space_a", NodeKind::Transform);
    scene
        .set_local(a, Transform::from_translation(DVec3::new(1.0, 0.0, 0.0)))
        .unwrap();
    let b = scene.create_node("space_b", NodeKind::Transform);
    let mc = MultiConstraintComponent::create(
        &mut scene,
        &fx.rig,
        source.node(),
        &[a, b],
        "center",
        "world_space",
        MultiConstraintParams::default(),
    )
    .unwrap()
    .unwrap();

    let driven = mc.driven(&scene).unwrap();
    scene.evaluate();
    let rest = scene.world_transform(driven).unwrap().translation;

    // Move the active space: the driven align follows.
    scene
        .set_local(a, Transform::from_translation(DVec3::new(1.0, 2.0, 0.0)))
        .unwrap();
    scene.evaluate();
    let followed = scene.world_transform(driven).unwrap().translation;
    assert!((followed.y - (rest.y + 2.0)).abs() < 1e-9);

    // Flip the selector: instantaneous snap into the other space.
    scene.set_attr(source.node(), "follow", 1i64).unwrap();
    scene.evaluate();
    let snapped = scene.world_transform(driven).unwrap().translation;
    assert!((snapped - rest).length() < 1e-9);

    // Removing the switch leaves the source flag alive and undriven.
    mc.remove(&mut scene);
    assert!(scene.exists(source.node()));
    assert!(scene.pose_links_on(driven).is_empty());
}

#[test]
fn bake_records_the_keyed_drive_on_bind_joints() {
    let mut scene = Scene::new();
    let fx = build_biped(&mut scene);
    let fk = FkComponent::create(
        &mut scene,
        &fx.rig,
        fx.shoulder,
        fx.wrist,
        "left",
        "arm",
        FkParams::default(),
    )
    .unwrap()
    .unwrap();

    let start = fk.start_flag(&scene).unwrap();
    let plug = Plug::new(start.node(), "rz");
    scene.set_key(&plug, 1, 0.0);
    scene.set_key(&plug, 4, 60.0);

    let baked = fk.bake_to_skeleton(&mut scene, (1, 4)).unwrap();
    let track = baked.track(fx.shoulder).unwrap();
    assert_eq!(track.samples.len(), 4);
    let first = track.samples[0].1.euler_deg().z;
    let last = track.samples[3].1.euler_deg().z;
    assert!((last - first).abs() > 30.0, "keyed drive must reach the bind joint");

    // A component with no bind joints refuses to bake.
    let display = DisplayComponent::create(&mut scene, &fx.rig).unwrap();
    assert!(display.bake_to_skeleton(&mut scene, (1, 4)).is_none());
}

#[test]
fn bakeable_rig_nodes_reports_attached_flags() {
    let mut scene = Scene::new();
    let fx = build_biped(&mut scene);
    let fk = FkComponent::create(
        &mut scene,
        &fx.rig,
        fx.shoulder,
        fx.wrist,
        "left",
        "arm",
        FkParams::default(),
    )
    .unwrap()
    .unwrap();

    // Unattached controls have nothing upstream to bake from.
    assert!(fk.bakeable_rig_nodes(&scene).flags.is_empty());

    let attachment = fk
        .attach_to_skeleton(&mut scene, fx.root, Some(&fx.skel))
        .unwrap()
        .unwrap();
    let set = fk.bakeable_rig_nodes(&scene);
    assert_eq!(set.flags.len(), fk.flags(&scene).len());
    assert!(!set.links.is_empty());
    detach(&mut scene, &attachment);
    assert!(fk.bakeable_rig_nodes(&scene).flags.is_empty());
}

#[test]
fn cog_attach_falls_back_to_the_hierarchy_start() {
    let mut scene = Scene::new();
    let fx = build_biped(&mut scene);
    // A joint with no usable markup anywhere.
    let prop = joint(&mut scene, "prop", Some(fx.root), DVec3::new(0.0, 0.5, 0.5));
    let cog = CogComponent::create(
        &mut scene,
        &fx.rig,
        prop,
        "center",
        "prop_cog",
        CogParams::default(),
    )
    .unwrap()
    .unwrap();

    let attachment = cog
        .attach_to_skeleton(&mut scene, fx.root, Some(&fx.skel))
        .unwrap()
        .expect("fallback to hierarchy start");
    assert_eq!(attachment.links.len(), 1);
    match scene.driver(attachment.links[0]) {
        Some(Driver::Constraint { targets, .. }) => assert_eq!(targets[0], fx.root),
        other => panic!("expected constraint, got {other:?}"),
    }
}

#[test]
fn rig_scale_inverse_compensates_build_groups() {
    let mut scene = Scene::new();
    let fx = build_biped(&mut scene);
    let fk = FkComponent::create(
        &mut scene,
        &fx.rig,
        fx.shoulder,
        fx.wrist,
        "left",
        "arm",
        FkParams::default(),
    )
    .unwrap()
    .unwrap();

    fx.rig.finalize(&mut scene).unwrap();
    fx.rig.set_rig_scale(&mut scene, 2.0).unwrap();
    scene.evaluate();

    assert!((fx.rig.rig_scale(&scene) - 2.0).abs() < 1e-9);
    let nt = fk.base().no_touch_group(&scene).unwrap();
    let s = scene.local(nt).unwrap().scale;
    assert!((s.x - 0.5).abs() < 1e-9 && (s.y - 0.5).abs() < 1e-9 && (s.z - 0.5).abs() < 1e-9);
}
