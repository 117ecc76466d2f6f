//! Host-engine collaborators.
//!
//! The core never constructs, moves or destroys world objects itself; it
//! asks the host through these traits. [`crate::sim::SimWorld`] is the
//! in-memory implementation used by tests and the CLI.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::direction::HandSide;
use crate::quaternion::Pose;
use crate::vector::Vec3;

/// Opaque id of a live world object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(pub Uuid);

impl Handle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form is plenty for logs
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// Catalog entry for a spawnable resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub resource_id: String,
}

impl Descriptor {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
        }
    }
}

pub trait Catalog {
    fn lookup(&self, resource_id: &str) -> Option<Descriptor>;
}

pub trait Spawner {
    /// Create a world object. `None` when the factory produced nothing.
    fn spawn(&mut self, descriptor: &Descriptor, pose: Pose) -> Option<Handle>;
    /// Destroy a world object. Unknown handles are ignored.
    fn destroy(&mut self, handle: Handle);
    fn is_alive(&self, handle: Handle) -> bool;
    /// Hand currently gripping the object, if any.
    fn holder(&self, handle: Handle) -> Option<HandSide>;
    fn resource_of(&self, handle: Handle) -> Option<String>;

    fn is_held(&self, handle: Handle) -> bool {
        self.holder(handle).is_some()
    }
}

pub trait Physics {
    fn set_kinematic(&mut self, handle: Handle, kinematic: bool);
    fn set_velocity(&mut self, handle: Handle, velocity: Vec3);
    fn set_angular_velocity(&mut self, handle: Handle, velocity: Vec3);
    /// Live objects whose position lies within `radius` of `center`.
    fn overlap_query(&self, center: Vec3, radius: f64) -> Vec<Handle>;
    fn pose(&self, handle: Handle) -> Option<Pose>;
    fn set_pose(&mut self, handle: Handle, pose: Pose);
}

/// Everything the armory needs from the host.
pub trait World: Catalog + Spawner + Physics {}

impl<T: Catalog + Spawner + Physics> World for T {}
