// SPDX-License-Identifier: Apache-2.0
//! Closed registry of component kinds.
//!
//! Graph nodes carry their kind as a string tag so serialized rigs stay
//! readable; the tag resolves back through this enum, and an unrecognized
//! tag is an error rather than a silent no-op.

use crate::error::BuildError;

/// Every node kind the component graph can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    /// Per-asset anchor node.
    AssetRoot,
    /// Rig container, singleton under an asset root.
    Rig,
    /// Forward-kinematics chain.
    Fk,
    /// Ik chain with pole vector and twist.
    Ik,
    /// Reverse-foot pivot stack.
    ReverseFoot,
    /// Twist fixup drive.
    Twist,
    /// Discrete space switch.
    MultiConstraint,
    /// Surface-pinned single control.
    Pin,
    /// Look-at control.
    Aim,
    /// Paired look-at joints.
    Piston,
    /// World root controls.
    World,
    /// Reversed pelvis chain.
    Pelvis,
    /// Center-of-gravity control.
    Cog,
    /// Exported custom float channels.
    ChannelFloat,
    /// Display layer management.
    Display,
}

/// The kinds that build rig controls (everything but the anchors).
pub const RIG_COMPONENT_KINDS: [ComponentKind; 13] = [
    ComponentKind::Fk,
    ComponentKind::Ik,
    ComponentKind::ReverseFoot,
    ComponentKind::Twist,
    ComponentKind::MultiConstraint,
    ComponentKind::Pin,
    ComponentKind::Aim,
    ComponentKind::Piston,
    ComponentKind::World,
    ComponentKind::Pelvis,
    ComponentKind::Cog,
    ComponentKind::ChannelFloat,
    ComponentKind::Display,
];

impl ComponentKind {
    /// The stable string tag stamped on nodes and serialized records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AssetRoot => "AssetRoot",
            Self::Rig => "Rig",
            Self::Fk => "FkComponent",
            Self::Ik => "IkComponent",
            Self::ReverseFoot => "ReverseFootComponent",
            Self::Twist => "TwistComponent",
            Self::MultiConstraint => "MultiConstraint",
            Self::Pin => "PinComponent",
            Self::Aim => "AimComponent",
            Self::Piston => "PistonComponent",
            Self::World => "WorldComponent",
            Self::Pelvis => "PelvisComponent",
            Self::Cog => "CogComponent",
            Self::ChannelFloat => "ChannelFloatComponent",
            Self::Display => "DisplayComponent",
        }
    }

    /// Resolves a stored tag.
    ///
    /// # Errors
    /// [`BuildError::UnknownKind`] for tags outside the registry.
    pub fn parse(tag: &str) -> Result<Self, BuildError> {
        match tag {
            "AssetRoot" => Ok(Self::AssetRoot),
            "Rig" => Ok(Self::Rig),
            "FkComponent" => Ok(Self::Fk),
            "IkComponent" => Ok(Self::Ik),
            "ReverseFootComponent" => Ok(Self::ReverseFoot),
            "TwistComponent" => Ok(Self::Twist),
            "MultiConstraint" => Ok(Self::MultiConstraint),
            "PinComponent" => Ok(Self::Pin),
            "AimComponent" => Ok(Self::Aim),
            "PistonComponent" => Ok(Self::Piston),
            "WorldComponent" => Ok(Self::World),
            "PelvisComponent" => Ok(Self::Pelvis),
            "CogComponent" => Ok(Self::Cog),
            "ChannelFloatComponent" => Ok(Self::ChannelFloat),
            "DisplayComponent" => Ok(Self::Display),
            other => Err(BuildError::UnknownKind(other.to_owned())),
        }
    }
}

impl core::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for kind in RIG_COMPONENT_KINDS {
            assert_eq!(ComponentKind::parse(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_tag_is_an_error() {
        assert!(matches!(
            ComponentKind::parse("SplineIkComponent"),
            Err(BuildError::UnknownKind(_))
        ));
    }
}
