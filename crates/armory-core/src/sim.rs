//! Deterministic in-memory world.
//!
//! Implements every collaborator trait with plain maps so the whole armory
//! can run headless. Objects keep insertion order, which makes overlap
//! queries and therefore capture searches reproducible.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::direction::HandSide;
use crate::quaternion::Pose;
use crate::vector::Vec3;
use crate::world::{Catalog, Descriptor, Handle, Physics, Spawner};

#[derive(Clone, Debug, PartialEq)]
pub struct SimObject {
    pub resource_id: String,
    pub pose: Pose,
    pub kinematic: bool,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub holder: Option<HandSide>,
    /// Times physics was switched off through [`Physics::set_kinematic`].
    pub suspends: usize,
    /// Times physics was switched back on through [`Physics::set_kinematic`].
    pub restores: usize,
}

impl SimObject {
    fn new(resource_id: &str, pose: Pose) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            pose,
            kinematic: false,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            holder: None,
            suspends: 0,
            restores: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct SimWorld {
    catalog: BTreeSet<String>,
    broken: BTreeSet<String>,
    objects: HashMap<Handle, SimObject>,
    order: Vec<Handle>,
    spawned: usize,
    destroyed: usize,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut world = Self::new();
        for id in ids {
            world.register(id);
        }
        world
    }

    pub fn register(&mut self, resource_id: impl Into<String>) {
        self.catalog.insert(resource_id.into());
    }

    pub fn unregister(&mut self, resource_id: &str) {
        self.catalog.remove(resource_id);
    }

    /// Catalog lookups still succeed but spawning this id yields nothing.
    pub fn break_factory(&mut self, resource_id: impl Into<String>) {
        self.broken.insert(resource_id.into());
    }

    /// Drop an object into the world directly, bypassing the catalog.
    pub fn place(&mut self, resource_id: &str, pose: Pose) -> Handle {
        let handle = Handle::new();
        self.objects.insert(handle, SimObject::new(resource_id, pose));
        self.order.push(handle);
        handle
    }

    pub fn grab(&mut self, handle: Handle, hand: HandSide) {
        if let Some(obj) = self.objects.get_mut(&handle) {
            obj.holder = Some(hand);
        }
    }

    pub fn release(&mut self, handle: Handle) {
        if let Some(obj) = self.objects.get_mut(&handle) {
            obj.holder = None;
        }
    }

    pub fn move_to(&mut self, handle: Handle, position: Vec3) {
        if let Some(obj) = self.objects.get_mut(&handle) {
            obj.pose.position = position;
        }
    }

    /// Another system turns gravity back on behind our back.
    pub fn wake(&mut self, handle: Handle) {
        if let Some(obj) = self.objects.get_mut(&handle) {
            obj.kinematic = false;
        }
    }

    /// Remove an object without going through [`Spawner::destroy`].
    pub fn vanish(&mut self, handle: Handle) {
        self.objects.remove(&handle);
        self.order.retain(|h| *h != handle);
    }

    pub fn object(&self, handle: Handle) -> Option<&SimObject> {
        self.objects.get(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.objects.len()
    }

    pub fn count_of(&self, resource_id: &str) -> usize {
        self.objects
            .values()
            .filter(|o| o.resource_id == resource_id)
            .count()
    }

    /// Every live handle, in the order it entered the world.
    pub fn handles(&self) -> Vec<Handle> {
        self.order.clone()
    }

    pub fn handles_of(&self, resource_id: &str) -> Vec<Handle> {
        self.order
            .iter()
            .copied()
            .filter(|h| {
                self.objects
                    .get(h)
                    .is_some_and(|o| o.resource_id == resource_id)
            })
            .collect()
    }

    pub fn spawned(&self) -> usize {
        self.spawned
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed
    }
}

impl Catalog for SimWorld {
    fn lookup(&self, resource_id: &str) -> Option<Descriptor> {
        self.catalog
            .contains(resource_id)
            .then(|| Descriptor::new(resource_id))
    }
}

impl Spawner for SimWorld {
    fn spawn(&mut self, descriptor: &Descriptor, pose: Pose) -> Option<Handle> {
        if self.broken.contains(&descriptor.resource_id) {
            return None;
        }
        let handle = self.place(&descriptor.resource_id, pose);
        self.spawned += 1;
        debug!("sim spawned {} as {handle}", descriptor.resource_id);
        Some(handle)
    }

    fn destroy(&mut self, handle: Handle) {
        if self.objects.remove(&handle).is_some() {
            self.order.retain(|h| *h != handle);
            self.destroyed += 1;
        }
    }

    fn is_alive(&self, handle: Handle) -> bool {
        self.objects.contains_key(&handle)
    }

    fn holder(&self, handle: Handle) -> Option<HandSide> {
        self.objects.get(&handle).and_then(|o| o.holder)
    }

    fn resource_of(&self, handle: Handle) -> Option<String> {
        self.objects.get(&handle).map(|o| o.resource_id.clone())
    }
}

impl Physics for SimWorld {
    fn set_kinematic(&mut self, handle: Handle, kinematic: bool) {
        if let Some(obj) = self.objects.get_mut(&handle) {
            if kinematic {
                obj.suspends += 1;
            } else {
                obj.restores += 1;
            }
            obj.kinematic = kinematic;
        }
    }

    fn set_velocity(&mut self, handle: Handle, velocity: Vec3) {
        if let Some(obj) = self.objects.get_mut(&handle) {
            obj.velocity = velocity;
        }
    }

    fn set_angular_velocity(&mut self, handle: Handle, velocity: Vec3) {
        if let Some(obj) = self.objects.get_mut(&handle) {
            obj.angular_velocity = velocity;
        }
    }

    fn overlap_query(&self, center: Vec3, radius: f64) -> Vec<Handle> {
        self.order
            .iter()
            .copied()
            .filter(|h| {
                self.objects
                    .get(h)
                    .is_some_and(|o| o.pose.position.distance(center) <= radius)
            })
            .collect()
    }

    fn pose(&self, handle: Handle) -> Option<Pose> {
        self.objects.get(&handle).map(|o| o.pose)
    }

    fn set_pose(&mut self, handle: Handle, pose: Pose) {
        if let Some(obj) = self.objects.get_mut(&handle) {
            obj.pose = pose;
        }
    }
}
