// SPDX-License-Identifier: Apache-2.0
//! Component variants.
//!
//! Every variant follows the same contract: `create` captures its
//! parameter record onto the node, builds its control topology under the
//! component's groups, and connects flags/joints/helpers onto the node so
//! the graph is fully traversable afterwards. Precondition misses warn and
//! return `Ok(None)`; structural violations error.

mod aim;
mod channel_float;
mod cog;
mod display;
mod fk;
mod ik;
mod multi_constraint;
mod pelvis;
mod pin;
mod piston;
mod reverse_foot;
mod twist;
mod world;

pub use aim::{AimComponent, AimParams};
pub use channel_float::{ChannelFloatComponent, ChannelFloatParams, ChannelSpec};
pub use cog::{CogComponent, CogParams};
pub use display::{DisplayComponent, DisplayLayerKind, DisplayMode};
pub use fk::{FkComponent, FkParams};
pub use ik::{pole_vector_position, IkComponent, IkParams};
pub use multi_constraint::{MultiConstraintComponent, MultiConstraintParams};
pub use pelvis::{PelvisComponent, PelvisParams};
pub use pin::{PinComponent, PinParams};
pub use piston::PistonComponent;
pub use reverse_foot::{ReverseFootComponent, ReverseFootParams};
pub use twist::{twist_multiplier, TwistComponent, MAX_TWIST_JOINTS};
pub use world::{WorldComponent, WorldParams};
