// SPDX-License-Identifier: Apache-2.0
//! Frame sampling of driven joints.

use std::collections::BTreeMap;

use marionette_scene::{NodeId, Scene, Transform};

/// Sampled animation for one joint.
#[derive(Debug, Clone)]
pub struct JointTrack {
    /// The sampled joint.
    pub joint: NodeId,
    /// Per-frame local transforms, in frame order.
    pub samples: Vec<(i64, Transform)>,
    /// Per-frame values of keyable custom float channels.
    pub custom: BTreeMap<String, Vec<(i64, f64)>>,
}

/// Result of a bake pass over a frame range.
#[derive(Debug, Clone)]
pub struct BakedAnimation {
    /// Inclusive frame range that was sampled.
    pub range: (i64, i64),
    /// One track per requested joint, in request order.
    pub tracks: Vec<JointTrack>,
}

impl BakedAnimation {
    /// Track for a joint, if it was part of the bake.
    #[must_use]
    pub fn track(&self, joint: NodeId) -> Option<&JointTrack> {
        self.tracks.iter().find(|t| t.joint == joint)
    }
}

/// Samples `joints` over the inclusive frame range.
///
/// Each frame is evaluated through the scene's keyed channels and driver
/// pass, then every joint's local transform and custom float channels are
/// recorded. Custom channels ride along so engine-facing attributes survive
/// the round trip onto the export skeleton.
#[must_use]
pub fn bake_objects(scene: &mut Scene, joints: &[NodeId], range: (i64, i64)) -> BakedAnimation {
    let (start, end) = range;
    let mut tracks: Vec<JointTrack> = joints
        .iter()
        .map(|j| JointTrack {
            joint: *j,
            samples: Vec::new(),
            custom: BTreeMap::new(),
        })
        .collect();

    let mut frame = start;
    while frame <= end {
        scene.evaluate_at(frame);
        for track in &mut tracks {
            if let Ok(local) = scene.local(track.joint) {
                track.samples.push((frame, local));
            }
            for attr in scene.float_attr_names(track.joint) {
                let plug = marionette_scene::Plug::new(track.joint, attr.clone());
                if let Ok(value) = scene.channel_value(&plug) {
                    track.custom.entry(attr).or_default().push((frame, value));
                }
            }
        }
        frame += 1;
    }
    BakedAnimation {
        range,
        tracks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marionette_scene::{LinkOp, NodeKind, Plug};

    #[test]
    fn bake_samples_keyed_drive_per_frame() {
        let mut scene = Scene::new();
        let ctrl = scene.create_node("ctrl", NodeKind::Transform);
        let joint = scene.create_node("joint", NodeKind::Joint);
        scene.set_attr(ctrl, "spin", 0.0_f64).unwrap();
        scene
            .add_link(
                Plug::new(ctrl, "spin"),
                LinkOp::Direct,
                Plug::new(joint, "ry"),
            )
            .unwrap();
        let plug = Plug::new(ctrl, "spin");
        scene.set_key(&plug, 1, 10.0);
        scene.set_key(&plug, 3, 30.0);

        let baked = bake_objects(&mut scene, &[joint], (1, 3));
        let track = baked.track(joint).unwrap();
        assert_eq!(track.samples.len(), 3);
        let spin_at = |i: usize| track.samples[i].1.euler_deg().y;
        assert!((spin_at(0) - 10.0).abs() < 1e-6);
        assert!((spin_at(1) - 10.0).abs() < 1e-6);
        assert!((spin_at(2) - 30.0).abs() < 1e-6);
    }
}
