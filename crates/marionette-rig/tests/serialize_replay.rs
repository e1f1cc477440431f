// SPDX-License-Identifier: Apache-2.0
#![allow(missing_docs)]
//! Integration tests for rig definitions: symbolic serialization, replay
//! onto a markup-equivalent skeleton, duplicate skipping and the document
//! round trip.

mod common;

use common::{build_biped, Fixture};
use marionette_rig::components::{
    AimComponent, AimParams, ChannelFloatComponent, ChannelFloatParams, ChannelSpec,
    DisplayComponent, FkComponent, FkParams, IkComponent, IkParams, MultiConstraintComponent,
    MultiConstraintParams, PelvisComponent, PelvisParams, PinComponent, PinParams,
    ReverseFootComponent, ReverseFootParams, TwistComponent, WorldComponent, WorldParams,
};
use marionette_rig::{
    build_rig, serialize_rig, AnyComponent, Component, ComponentKind, RigDefinition, TargetRef,
};
use marionette_scene::Scene;

/// Builds the reference rig: every serializable variant plus the derived
/// twists, with one attach record.
fn build_reference_rig(scene: &mut Scene, fx: &Fixture) {
    let world = WorldComponent::create(
        scene,
        &fx.rig,
        fx.root,
        "center",
        "world",
        WorldParams::default(),
    )
    .unwrap()
    .unwrap();
    let world_root_flag = world.root_flag(scene).unwrap();

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
    .unwrap();
    let fk_spine = FkComponent::create(
        scene,
        &fx.rig,
        fx.spine_01,
        fx.spine_02,
        "center",
        "spine",
        FkParams::default(),
    )
    .unwrap()
    .unwrap();
    let ik_arm = IkComponent::create(
        scene,
        &fx.rig,
        fx.shoulder,
        fx.wrist,
        "left",
        "arm",
        IkParams::default(),
    )
    .unwrap()
    .unwrap();
    IkComponent::create(scene, &fx.rig, fx.hip, fx.ankle, "left", "leg", IkParams::default())
        .unwrap()
        .unwrap();
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
    .unwrap();
    PinComponent::create(scene, &fx.rig, fx.wrist, None, "left", "hand", PinParams::default())
        .unwrap()
        .unwrap();
    AimComponent::create(scene, &fx.rig, fx.spine_02, "center", "look", AimParams::default())
        .unwrap()
        .unwrap();
    ChannelFloatComponent::create(
        scene,
        &fx.rig,
        world_root_flag.node(),
        fx.root,
        "center",
        "settings",
        ChannelFloatParams {
            channels: vec![ChannelSpec::unit("exportToggle")],
        },
    )
    .unwrap()
    .unwrap();
    TwistComponent::create(scene, &fx.rig, &fx.skel, "left", "arm_twist")
        .unwrap()
        .unwrap();
    TwistComponent::create(scene, &fx.rig, &fx.skel, "left", "leg_twist")
        .unwrap()
        .unwrap();
    let ik_flag = ik_arm.ik_flag(scene).unwrap();
    MultiConstraintComponent::create(
        scene,
        &fx.rig,
        ik_flag.node(),
        &[world_root_flag.node(), fx.root],
        "left",
        "arm_space",
        MultiConstraintParams::default(),
    )
    .unwrap()
    .unwrap();
    DisplayComponent::create(scene, &fx.rig).unwrap();

    fk_spine
        .base()
        .attach_component(scene, &[world_root_flag.node()], true, true)
        .unwrap();
}

/// (kind, side, region, flag count) for every component, sorted.
fn signatures(scene: &Scene, rig: &marionette_rig::Rig) -> Vec<(String, String, String, usize)> {
    let mut out: Vec<_> = rig
        .components(scene)
        .into_iter()
        .map(|c| {
            let base = c.base();
            (
                c.kind().as_str().to_owned(),
                base.side(scene),
                base.region(scene),
                c.flags(scene).len(),
            )
        })
        .collect();
    out.sort();
    out
}

fn find_component(
    scene: &Scene,
    rig: &marionette_rig::Rig,
    kind: ComponentKind,
    side: &str,
    region: &str,
) -> AnyComponent {
    rig.components(scene)
        .into_iter()
        .find(|c| {
            c.kind() == kind && c.base().side(scene) == side && c.base().region(scene) == region
        })
        .unwrap_or_else(|| panic!("missing {kind} {side} {region}"))
}

#[test]
fn definitions_resolve_targets_symbolically() {
    let mut scene = Scene::new();
    let fx = build_biped(&mut scene);
    build_reference_rig(&mut scene, &fx);

    let def = serialize_rig(&scene, &fx.rig).unwrap();
    // Twists are derived; everything else carries one record, in creation
    // order.
    assert_eq!(def.records.len(), 11);
    assert!(def.records.iter().all(|r| r.component_type != "TwistComponent"));
    assert_eq!(def.records[0].component_type, "WorldComponent");

    let fk = def
        .records
        .iter()
        .find(|r| r.component_type == "FkComponent")
        .unwrap();
    assert_eq!(
        fk.targets.start,
        Some(TargetRef::Joint {
            side: "center".into(),
            region: "spine".into(),
            index: 0,
        })
    );
    assert_eq!(
        fk.targets.end,
        Some(TargetRef::Joint {
            side: "center".into(),
            region: "spine".into(),
            index: -1,
        })
    );
    let attach = fk.attach.as_ref().expect("fk spine carries its attach record");
    assert!(attach.point && attach.orient);
    assert_eq!(
        attach.parents,
        vec![TargetRef::Flag {
            side: "center".into(),
            region: "world".into(),
            index: 2,
        }]
    );

    let mc = def
        .records
        .iter()
        .find(|r| r.component_type == "MultiConstraint")
        .unwrap();
    assert_eq!(
        mc.targets.source,
        Some(TargetRef::Flag {
            side: "left".into(),
            region: "arm".into(),
            index: 0,
        })
    );
    assert_eq!(mc.targets.spaces.len(), 2);
    assert!(matches!(mc.targets.spaces[1], TargetRef::Joint { ref region, index: -1, .. } if region == "root"));
}

#[test]
fn replay_on_an_equivalent_skeleton_matches_the_original() {
    let mut scene = Scene::new();
    let fx = build_biped(&mut scene);
    build_reference_rig(&mut scene, &fx);
    let def = serialize_rig(&scene, &fx.rig).unwrap();

    // A second, freshly built skeleton instance with the same markup.
    let mut scene2 = Scene::new();
    let fx2 = build_biped(&mut scene2);
    let created = build_rig(&mut scene2, &fx2.rig, &fx2.skel, &def).unwrap();
    assert_eq!(created.len(), 13, "11 records plus 2 derived twists");

    assert_eq!(signatures(&scene, &fx.rig), signatures(&scene2, &fx2.rig));

    // The multi constraint re-resolved its flag targets on the new rig.
    let mc = find_component(
        &scene2,
        &fx2.rig,
        ComponentKind::MultiConstraint,
        "left",
        "arm_space",
    );
    let AnyComponent::MultiConstraint(mc) = mc else { panic!() };
    let ik = find_component(&scene2, &fx2.rig, ComponentKind::Ik, "left", "arm");
    assert_eq!(mc.source(&scene2), Some(ik.flags(&scene2)[0].node()));
    assert_eq!(mc.spaces(&scene2).len(), 2);

    // The attach record landed on the replayed fk spine.
    let world = find_component(&scene2, &fx2.rig, ComponentKind::World, "center", "world");
    let fk = find_component(&scene2, &fx2.rig, ComponentKind::Fk, "center", "spine");
    assert_eq!(
        fk.base().attach_parents(&scene2),
        vec![world.flags(&scene2)[2].node()]
    );

    // Replaying the same definition again is a no-op: every record is a
    // duplicate and every twist bucket is already built.
    let again = build_rig(&mut scene2, &fx2.rig, &fx2.skel, &def).unwrap();
    assert!(again.is_empty());
    assert_eq!(signatures(&scene, &fx.rig), signatures(&scene2, &fx2.rig));
}

#[test]
fn definition_files_round_trip_and_tick_the_revision() {
    let mut scene = Scene::new();
    let fx = build_biped(&mut scene);
    build_reference_rig(&mut scene, &fx);
    let def = serialize_rig(&scene, &fx.rig).unwrap();
    assert_eq!(def.revision, 1);
    assert_eq!(def.asset_id, "ch_001");
    assert_eq!(def.asset_name, "biped");

    let path = std::env::temp_dir().join("marionette_rig_definition_test.json");
    def.save(&path).unwrap();
    let loaded = RigDefinition::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.revision, 2);
    assert_eq!(loaded.format, def.format);
    assert_eq!(loaded.records, def.records);
}
