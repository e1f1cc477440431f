// SPDX-License-Identifier: Apache-2.0
//! Rig definitions: ordered component records and their replay.
//!
//! A definition is the walk of a rig's components in creation order, with
//! every object reference resolved to a *symbolic* identifier against the
//! skeleton's markup instead of a raw scene id. That indirection is the
//! whole point of the format: a record list written against one skeleton
//! replays cleanly onto any markup-equivalent skeleton instance.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::component::{AnyComponent, RigComponent};
use crate::components::{
    AimComponent, ChannelFloatComponent, CogComponent, DisplayComponent, FkComponent,
    IkComponent, MultiConstraintComponent, PelvisComponent, PinComponent, PistonComponent,
    ReverseFootComponent, TwistComponent, WorldComponent,
};
use crate::error::{BuildError, SerializeError};
use crate::flag::Flag;
use crate::kind::ComponentKind;
use crate::markup::{joint_region, joint_side, SkeletonHierarchy};
use crate::rig::Rig;
use marionette_scene::{NodeId, NodeKind, Scene};

/// Document format version written into every definition.
pub const FORMAT_VERSION: u32 = 1;

/// Symbolic reference to an object, resolved against markup at replay time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ref", rename_all = "snake_case")]
pub enum TargetRef {
    /// A skeleton joint by chain position; index `-1` means the chain end.
    Joint {
        /// Side tag of the chain.
        side: String,
        /// Region tag of the chain.
        region: String,
        /// Position in the chain, `-1` for the last joint.
        index: i64,
    },
    /// A control flag by its owning component's markup and flag position.
    Flag {
        /// Side tag of the owning component.
        side: String,
        /// Region tag of the owning component.
        region: String,
        /// Position in the component's flag list.
        index: i64,
    },
    /// Fallback by node name, for objects outside the markup (surfaces,
    /// props).
    Named {
        /// Scene node name.
        name: String,
    },
}

impl TargetRef {
    /// Symbolic reference for a skeleton joint.
    #[must_use]
    pub fn for_joint(scene: &Scene, hierarchy: &SkeletonHierarchy, joint: NodeId) -> Self {
        if let (Some(side), Some(region)) = (joint_side(scene, joint), joint_region(scene, joint))
        {
            let chain = hierarchy.get_full_chain(&side, &region);
            if let Some(pos) = chain.iter().position(|j| *j == joint) {
                let index = if pos + 1 == chain.len() {
                    -1
                } else {
                    pos as i64
                };
                return Self::Joint { side, region, index };
            }
        }
        Self::Named {
            name: scene.name(joint).unwrap_or_default(),
        }
    }

    /// Symbolic reference for an arbitrary node: flags by owner, joints by
    /// chain position, everything else by name.
    #[must_use]
    pub fn for_node(scene: &Scene, hierarchy: &SkeletonHierarchy, node: NodeId) -> Self {
        if let Some(flag) = Flag::from_node(scene, node) {
            if let Some(owner) = scene.connected_first(node, "owner") {
                if let Ok(base) = RigComponent::from_node(scene, owner) {
                    if let Some(pos) = base.flags(scene).iter().position(|f| *f == flag) {
                        return Self::Flag {
                            side: base.side(scene),
                            region: base.region(scene),
                            index: pos as i64,
                        };
                    }
                }
            }
        }
        if scene.kind(node) == Ok(NodeKind::Joint) {
            return Self::for_joint(scene, hierarchy, node);
        }
        Self::Named {
            name: scene.name(node).unwrap_or_default(),
        }
    }

    /// Resolves the reference against a (possibly different) skeleton
    /// instance, and against `rig` for flag references.
    #[must_use]
    pub fn resolve(
        &self,
        scene: &Scene,
        hierarchy: &SkeletonHierarchy,
        rig: Option<&Rig>,
    ) -> Option<NodeId> {
        match self {
            Self::Joint { side, region, index } => {
                let chain = hierarchy.get_full_chain(side, region);
                if *index < 0 {
                    chain.last().copied()
                } else {
                    chain.get(usize::try_from(*index).ok()?).copied()
                }
            }
            Self::Flag { side, region, index } => {
                let rig = rig?;
                let index = usize::try_from(*index).ok()?;
                rig.components(scene)
                    .into_iter()
                    .map(|c| c.base())
                    .find(|base| base.side(scene) == *side && base.region(scene) == *region)
                    .and_then(|base| base.flags(scene).get(index).map(|f| f.node()))
            }
            Self::Named { name } => scene.find_by_name(name),
        }
    }
}

/// Attach wiring recorded by `attach_component`, replayed after every
/// component exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachRecord {
    /// Parent objects, first one driving.
    pub parents: Vec<TargetRef>,
    /// Whether translation was constrained.
    pub point: bool,
    /// Whether rotation was constrained.
    pub orient: bool,
}

/// Per-kind symbolic targets of one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordTargets {
    /// Chain start (or the single target joint).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<TargetRef>,
    /// Chain end, absent for single-joint components.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<TargetRef>,
    /// Constrained source object (space switches, channel controls).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<TargetRef>,
    /// Surface object a pin pivot hangs under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface: Option<TargetRef>,
    /// Candidate spaces of a multi constraint, in selector order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub spaces: Vec<TargetRef>,
}

/// One serialized component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Kind tag, as stamped on the node.
    pub component_type: String,
    /// Stored version at serialization time.
    pub version: u32,
    /// Side markup.
    pub side: String,
    /// Region markup.
    pub region: String,
    /// Captured constructor parameters, verbatim.
    #[serde(default)]
    pub build_kwargs: serde_json::Value,
    /// Symbolic object references.
    #[serde(default)]
    pub targets: RecordTargets,
    /// Attach wiring, when the component was parented onto others.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach: Option<AttachRecord>,
}

/// A rig's full definition document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigDefinition {
    /// Document format version.
    pub format: u32,
    /// Monotonic revision, ticked on every load so a rebuilt-and-resaved
    /// rig is distinguishable from its source document.
    pub revision: u32,
    /// Asset identifier of the rig's asset root.
    pub asset_id: String,
    /// Asset display name.
    pub asset_name: String,
    /// Component records in creation order.
    pub records: Vec<ComponentRecord>,
}

impl RigDefinition {
    /// Writes the definition as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), SerializeError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reads a definition back, ticking its revision.
    pub fn load(path: &Path) -> Result<Self, SerializeError> {
        let text = fs::read_to_string(path)?;
        let mut def: Self = serde_json::from_str(&text)?;
        def.revision += 1;
        Ok(def)
    }
}

/// Walks a rig's components in creation order into a definition.
///
/// Twist components are derived from markup and carry no record; replay
/// rebuilds them from the target skeleton's twist buckets instead.
pub fn serialize_rig(scene: &Scene, rig: &Rig) -> Result<RigDefinition, SerializeError> {
    let root = rig
        .asset_root(scene)
        .and_then(|r| r.root_joint(scene))
        .ok_or(SerializeError::NoSkeleton)?;
    let hierarchy = SkeletonHierarchy::build(scene, root)?;

    let mut records = Vec::new();
    for component in rig.components(scene) {
        let kind = component.kind();
        if kind == ComponentKind::Twist {
            continue;
        }
        let base = component.base();
        let mut targets = RecordTargets::default();
        match &component {
            AnyComponent::MultiConstraint(mc) => {
                targets.source = mc
                    .source(scene)
                    .map(|n| TargetRef::for_node(scene, &hierarchy, n));
                targets.spaces = mc
                    .spaces(scene)
                    .into_iter()
                    .map(|n| TargetRef::for_node(scene, &hierarchy, n))
                    .collect();
            }
            AnyComponent::ChannelFloat(cf) => {
                targets.source = cf
                    .source(scene)
                    .map(|n| TargetRef::for_node(scene, &hierarchy, n));
                targets.start = base
                    .bind_joints(scene)
                    .first()
                    .map(|j| TargetRef::for_joint(scene, &hierarchy, *j));
            }
            AnyComponent::Pin(pin) => {
                targets.start = base
                    .bind_joints(scene)
                    .first()
                    .map(|j| TargetRef::for_joint(scene, &hierarchy, *j));
                targets.surface = pin
                    .surface(scene)
                    .map(|n| TargetRef::for_node(scene, &hierarchy, n));
            }
            _ => {
                let joints = base.bind_joints(scene);
                targets.start = joints
                    .first()
                    .map(|j| TargetRef::for_joint(scene, &hierarchy, *j));
                if joints.len() > 1 {
                    targets.end = joints
                        .last()
                        .map(|j| TargetRef::for_joint(scene, &hierarchy, *j));
                }
            }
        }
        let parents = base.attach_parents(scene);
        let attach = if parents.is_empty() {
            None
        } else {
            let (point, orient) = base.attach_channels(scene);
            Some(AttachRecord {
                parents: parents
                    .into_iter()
                    .map(|p| TargetRef::for_node(scene, &hierarchy, p))
                    .collect(),
                point,
                orient,
            })
        };
        records.push(ComponentRecord {
            component_type: kind.as_str().to_owned(),
            version: base.node().version(scene),
            side: base.side(scene),
            region: base.region(scene),
            build_kwargs: base.kwargs_value(scene),
            targets,
            attach,
        });
    }

    let asset_root = rig.asset_root(scene);
    Ok(RigDefinition {
        format: FORMAT_VERSION,
        revision: 1,
        asset_id: asset_root.map(|r| r.asset_id(scene)).unwrap_or_default(),
        asset_name: asset_root.map(|r| r.asset_name(scene)).unwrap_or_default(),
        records,
    })
}

fn decode<T: DeserializeOwned + Default>(value: &serde_json::Value) -> Result<T, BuildError> {
    if value.is_null() {
        Ok(T::default())
    } else {
        Ok(serde_json::from_value(value.clone())?)
    }
}

fn resolve_or_warn(
    scene: &Scene,
    hierarchy: &SkeletonHierarchy,
    rig: &Rig,
    target: Option<&TargetRef>,
    what: &str,
    record: &ComponentRecord,
) -> Option<NodeId> {
    let resolved = target.and_then(|t| t.resolve(scene, hierarchy, Some(rig)));
    if resolved.is_none() {
        warn!(
            component_type = record.component_type,
            side = record.side,
            region = record.region,
            what,
            "record skipped: symbolic target did not resolve"
        );
    }
    resolved
}

fn replay_record(
    scene: &mut Scene,
    rig: &Rig,
    hierarchy: &SkeletonHierarchy,
    kind: ComponentKind,
    record: &ComponentRecord,
) -> Result<Option<AnyComponent>, BuildError> {
    let side = record.side.as_str();
    let region = record.region.as_str();
    let start = |scene: &Scene| {
        resolve_or_warn(scene, hierarchy, rig, record.targets.start.as_ref(), "start", record)
    };
    let end_or_start = |scene: &Scene, start: NodeId| {
        record
            .targets
            .end
            .as_ref()
            .and_then(|t| t.resolve(scene, hierarchy, Some(rig)))
            .unwrap_or(start)
    };

    match kind {
        ComponentKind::Fk => {
            let Some(s) = start(scene) else { return Ok(None) };
            let e = end_or_start(scene, s);
            Ok(FkComponent::create(scene, rig, s, e, side, region, decode(&record.build_kwargs)?)?
                .map(AnyComponent::Fk))
        }
        ComponentKind::Ik => {
            let Some(s) = start(scene) else { return Ok(None) };
            let e = end_or_start(scene, s);
            Ok(IkComponent::create(scene, rig, s, e, side, region, decode(&record.build_kwargs)?)?
                .map(AnyComponent::Ik))
        }
        ComponentKind::ReverseFoot => {
            let Some(s) = start(scene) else { return Ok(None) };
            let e = end_or_start(scene, s);
            Ok(ReverseFootComponent::create(
                scene,
                rig,
                hierarchy,
                s,
                e,
                side,
                region,
                decode(&record.build_kwargs)?,
            )?
            .map(AnyComponent::ReverseFoot))
        }
        ComponentKind::Pelvis => {
            let Some(s) = start(scene) else { return Ok(None) };
            let e = end_or_start(scene, s);
            Ok(PelvisComponent::create(
                scene,
                rig,
                s,
                e,
                side,
                region,
                decode(&record.build_kwargs)?,
            )?
            .map(AnyComponent::Pelvis))
        }
        ComponentKind::Piston => {
            let Some(s) = start(scene) else { return Ok(None) };
            let e = end_or_start(scene, s);
            Ok(PistonComponent::create(scene, rig, s, e, side, region)?
                .map(AnyComponent::Piston))
        }
        ComponentKind::World => {
            let Some(s) = start(scene) else { return Ok(None) };
            Ok(
                WorldComponent::create(scene, rig, s, side, region, decode(&record.build_kwargs)?)?
                    .map(AnyComponent::World),
            )
        }
        ComponentKind::Cog => {
            let Some(s) = start(scene) else { return Ok(None) };
            Ok(
                CogComponent::create(scene, rig, s, side, region, decode(&record.build_kwargs)?)?
                    .map(AnyComponent::Cog),
            )
        }
        ComponentKind::Aim => {
            let Some(s) = start(scene) else { return Ok(None) };
            Ok(
                AimComponent::create(scene, rig, s, side, region, decode(&record.build_kwargs)?)?
                    .map(AnyComponent::Aim),
            )
        }
        ComponentKind::Pin => {
            let Some(s) = start(scene) else { return Ok(None) };
            let surface = record
                .targets
                .surface
                .as_ref()
                .and_then(|t| t.resolve(scene, hierarchy, Some(rig)));
            Ok(PinComponent::create(
                scene,
                rig,
                s,
                surface,
                side,
                region,
                decode(&record.build_kwargs)?,
            )?
            .map(AnyComponent::Pin))
        }
        ComponentKind::ChannelFloat => {
            let Some(control) = resolve_or_warn(
                scene,
                hierarchy,
                rig,
                record.targets.source.as_ref(),
                "source",
                record,
            ) else {
                return Ok(None);
            };
            let Some(joint) = start(scene) else { return Ok(None) };
            Ok(ChannelFloatComponent::create(
                scene,
                rig,
                control,
                joint,
                side,
                region,
                decode(&record.build_kwargs)?,
            )?
            .map(AnyComponent::ChannelFloat))
        }
        ComponentKind::MultiConstraint => {
            let Some(source) = resolve_or_warn(
                scene,
                hierarchy,
                rig,
                record.targets.source.as_ref(),
                "source",
                record,
            ) else {
                return Ok(None);
            };
            let spaces: Vec<NodeId> = record
                .targets
                .spaces
                .iter()
                .filter_map(|t| t.resolve(scene, hierarchy, Some(rig)))
                .collect();
            if spaces.len() < record.targets.spaces.len() {
                warn!(side, region, "some multi constraint spaces did not resolve");
            }
            Ok(MultiConstraintComponent::create(
                scene,
                rig,
                source,
                &spaces,
                side,
                region,
                decode(&record.build_kwargs)?,
            )?
            .map(AnyComponent::MultiConstraint))
        }
        ComponentKind::Display => {
            Ok(Some(AnyComponent::Display(DisplayComponent::create(scene, rig)?)))
        }
        ComponentKind::Twist => {
            debug!(side, region, "twist record ignored: rebuilt from markup");
            Ok(None)
        }
        ComponentKind::AssetRoot | ComponentKind::Rig => {
            warn!(component_type = record.component_type, "anchor record ignored");
            Ok(None)
        }
    }
}

/// Replays a definition onto `rig`, resolving every record against
/// `hierarchy`.
///
/// Records whose (type, side, region) already exist on the rig are
/// skipped, multi constraints are deferred until every other component
/// exists, twist fixups are rebuilt from the target skeleton's markup, and
/// attach records are applied last. Returns the components the replay
/// created.
pub fn build_rig(
    scene: &mut Scene,
    rig: &Rig,
    hierarchy: &SkeletonHierarchy,
    def: &RigDefinition,
) -> Result<Vec<AnyComponent>, BuildError> {
    let mut existing: BTreeSet<(String, String, String)> = rig
        .components(scene)
        .into_iter()
        .map(|c| {
            let base = c.base();
            (
                c.kind().as_str().to_owned(),
                base.side(scene),
                base.region(scene),
            )
        })
        .collect();

    let mut created: Vec<(usize, AnyComponent)> = Vec::new();
    let mut deferred: Vec<(usize, &ComponentRecord)> = Vec::new();
    for (i, record) in def.records.iter().enumerate() {
        let kind = ComponentKind::parse(&record.component_type)?;
        if kind == ComponentKind::MultiConstraint {
            deferred.push((i, record));
            continue;
        }
        let key = (
            record.component_type.clone(),
            record.side.clone(),
            record.region.clone(),
        );
        if existing.contains(&key) {
            warn!(
                component_type = record.component_type,
                side = record.side,
                region = record.region,
                "duplicate record skipped"
            );
            continue;
        }
        if let Some(component) = replay_record(scene, rig, hierarchy, kind, record)? {
            existing.insert(key);
            created.push((i, component));
        }
    }
    for (i, record) in deferred {
        let key = (
            record.component_type.clone(),
            record.side.clone(),
            record.region.clone(),
        );
        if existing.contains(&key) {
            warn!(
                side = record.side,
                region = record.region,
                "duplicate multi constraint record skipped"
            );
            continue;
        }
        if let Some(component) =
            replay_record(scene, rig, hierarchy, ComponentKind::MultiConstraint, record)?
        {
            existing.insert(key);
            created.push((i, component));
        }
    }

    // Twist fixups carry no records; the target skeleton's own buckets
    // decide what gets built.
    let twist_keys: Vec<(String, String)> = hierarchy
        .twist_buckets()
        .map(|(key, _)| key.clone())
        .collect();
    for (side, twist_region) in twist_keys {
        let already = existing.contains(&(
            ComponentKind::Twist.as_str().to_owned(),
            side.clone(),
            twist_region.clone(),
        ));
        if !already {
            if let Some(component) =
                TwistComponent::create(scene, rig, hierarchy, &side, &twist_region)?
            {
                created.push((usize::MAX, AnyComponent::Twist(component)));
            }
        }
    }

    // Attach wiring goes last so flag references resolve no matter which
    // record order the components were declared in.
    for (i, component) in &created {
        let Some(record) = def.records.get(*i) else { continue };
        let Some(attach) = &record.attach else { continue };
        let parents: Vec<NodeId> = attach
            .parents
            .iter()
            .filter_map(|t| t.resolve(scene, hierarchy, Some(rig)))
            .collect();
        if parents.is_empty() {
            warn!(
                component_type = record.component_type,
                side = record.side,
                region = record.region,
                "attach skipped: no parent resolved"
            );
            continue;
        }
        component
            .base()
            .attach_component(scene, &parents, attach.point, attach.orient)?;
    }

    rig.finalize(scene)?;
    Ok(created.into_iter().map(|(_, c)| c).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_round_trip_through_json() {
        let record = ComponentRecord {
            component_type: "FkComponent".into(),
            version: 1,
            side: "left".into(),
            region: "arm".into(),
            build_kwargs: serde_json::json!({ "scale": 1.0 }),
            targets: RecordTargets {
                start: Some(TargetRef::Joint {
                    side: "left".into(),
                    region: "arm".into(),
                    index: 0,
                }),
                end: Some(TargetRef::Joint {
                    side: "left".into(),
                    region: "arm".into(),
                    index: -1,
                }),
                ..RecordTargets::default()
            },
            attach: None,
        };
        let def = RigDefinition {
            format: FORMAT_VERSION,
            revision: 1,
            asset_id: "ch_001".into(),
            asset_name: "biped".into(),
            records: vec![record],
        };
        let text = serde_json::to_string(&def).unwrap();
        let back: RigDefinition = serde_json::from_str(&text).unwrap();
        assert_eq!(back, def);
    }
}
