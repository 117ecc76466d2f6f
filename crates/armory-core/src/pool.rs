//! Capped, time-expiring pools of live world objects.
//!
//! A pool exclusively owns the handles it tracks: nothing else destroys
//! them. Every operation reconciles against the world first, so objects
//! destroyed externally are pruned silently instead of erroring.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{ITEM_CAPACITY, ITEM_GRACE, PORTAL_CAPACITY, PORTAL_LIFETIME};
use crate::error::PoolError;
use crate::world::{Handle, Spawner};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// Transient spawn marker, expires by age.
    Portal,
    /// Recalled item, expires only after being held and let go.
    SpawnedItem,
}

impl PoolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PoolKind::Portal => "portal",
            PoolKind::SpawnedItem => "item",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub capacity: usize,
    /// Max age (s) of a portal.
    pub lifetime: f64,
    /// Seconds an item may lie unheld after release before it despawns.
    pub grace: f64,
}

impl PoolConfig {
    pub fn portals() -> Self {
        Self {
            capacity: PORTAL_CAPACITY,
            lifetime: PORTAL_LIFETIME,
            grace: ITEM_GRACE,
        }
    }

    pub fn items() -> Self {
        Self {
            capacity: ITEM_CAPACITY,
            lifetime: PORTAL_LIFETIME,
            grace: ITEM_GRACE,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::portals()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PooledInstance {
    pub handle: Handle,
    pub created_at: f64,
    pub kind: PoolKind,
    pub resource_id: String,
    pub held: bool,
    pub ever_held: bool,
    /// When the item last left a hand; cleared while held.
    pub released_at: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Handles found dead and dropped without a destroy call.
    pub pruned: usize,
    /// Handles destroyed because their time ran out.
    pub expired: usize,
}

/// Lifetime totals, for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub spawned: usize,
    pub evicted: usize,
    pub expired: usize,
    pub pruned: usize,
}

#[derive(Debug)]
pub struct ResourcePool {
    kind: PoolKind,
    config: PoolConfig,
    /// Creation order, oldest first.
    instances: Vec<PooledInstance>,
    stats: PoolStats,
}

impl ResourcePool {
    pub fn new(kind: PoolKind, config: PoolConfig) -> Self {
        Self {
            kind,
            config,
            instances: Vec::new(),
            stats: PoolStats::default(),
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> &[PooledInstance] {
        &self.instances
    }

    pub fn handles(&self) -> Vec<Handle> {
        self.instances.iter().map(|i| i.handle).collect()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.instances.iter().any(|i| i.handle == handle)
    }

    pub fn get(&self, handle: Handle) -> Option<&PooledInstance> {
        self.instances.iter().find(|i| i.handle == handle)
    }

    /// Drop handles the world no longer knows about.
    fn prune<W: Spawner + ?Sized>(&mut self, world: &W) -> usize {
        let before = self.instances.len();
        self.instances.retain(|i| world.is_alive(i.handle));
        let pruned = before - self.instances.len();
        if pruned > 0 {
            debug!("{} pool pruned {pruned} stale handles", self.kind.as_str());
            self.stats.pruned += pruned;
        }
        pruned
    }

    /// Refresh held flags from the world and stamp release times.
    fn observe_holds<W: Spawner + ?Sized>(&mut self, world: &W, now: f64) {
        if self.kind != PoolKind::SpawnedItem {
            return;
        }
        for inst in &mut self.instances {
            let held = world.is_held(inst.handle);
            if held {
                inst.ever_held = true;
                inst.released_at = None;
            } else if inst.held {
                inst.released_at = Some(now);
            }
            inst.held = held;
        }
    }

    fn evictable(&self) -> Option<usize> {
        match self.kind {
            PoolKind::Portal => (!self.instances.is_empty()).then_some(0),
            PoolKind::SpawnedItem => self.instances.iter().position(|i| !i.held),
        }
    }

    /// Spawn through `factory`, then evict the oldest evictable instance if
    /// the pool was already full. A failed spawn evicts nothing. Held items
    /// are never evicted; when every item is held the pool runs over capacity.
    pub fn spawn<W, F>(
        &mut self,
        world: &mut W,
        now: f64,
        resource_id: &str,
        factory: F,
    ) -> Result<Handle, PoolError>
    where
        W: Spawner + ?Sized,
        F: FnOnce(&mut W) -> Option<Handle>,
    {
        self.prune(world);
        self.observe_holds(world, now);

        let handle =
            factory(world).ok_or_else(|| PoolError::FactoryFailed(resource_id.to_string()))?;

        if self.instances.len() >= self.config.capacity {
            match self.evictable() {
                Some(idx) => {
                    let victim = self.instances.remove(idx);
                    world.destroy(victim.handle);
                    self.stats.evicted += 1;
                    debug!(
                        "{} pool evicted {} ({})",
                        self.kind.as_str(),
                        victim.handle,
                        victim.resource_id
                    );
                }
                None => warn!(
                    "{} pool at capacity {} with every instance held, allowing overflow",
                    self.kind.as_str(),
                    self.config.capacity
                ),
            }
        }

        self.instances.push(PooledInstance {
            handle,
            created_at: now,
            kind: self.kind,
            resource_id: resource_id.to_string(),
            held: false,
            ever_held: false,
            released_at: None,
        });
        self.stats.spawned += 1;
        debug!(
            "{} pool spawned {handle} ({resource_id}), {} live",
            self.kind.as_str(),
            self.instances.len()
        );
        Ok(handle)
    }

    /// Per-frame maintenance: prune stale handles, then expire.
    pub fn tick<W: Spawner + ?Sized>(&mut self, world: &mut W, now: f64) -> PoolReport {
        let pruned = self.prune(world);
        self.observe_holds(world, now);

        let kind = self.kind;
        let lifetime = self.config.lifetime;
        let grace = self.config.grace;
        let expired: Vec<Handle> = self
            .instances
            .iter()
            .filter(|i| match kind {
                PoolKind::Portal => now - i.created_at >= lifetime,
                PoolKind::SpawnedItem => {
                    i.ever_held && !i.held && i.released_at.is_some_and(|t| now - t >= grace)
                }
            })
            .map(|i| i.handle)
            .collect();

        for handle in &expired {
            world.destroy(*handle);
        }
        self.instances.retain(|i| !expired.contains(&i.handle));
        self.stats.expired += expired.len();
        if !expired.is_empty() {
            debug!("{} pool expired {}", kind.as_str(), expired.len());
        }

        PoolReport {
            pruned,
            expired: expired.len(),
        }
    }

    /// Destroy one tracked instance. False if the pool does not own it.
    pub fn evict<W: Spawner + ?Sized>(&mut self, world: &mut W, handle: Handle) -> bool {
        let Some(idx) = self.instances.iter().position(|i| i.handle == handle) else {
            return false;
        };
        self.instances.remove(idx);
        if world.is_alive(handle) {
            world.destroy(handle);
        }
        self.stats.evicted += 1;
        true
    }

    /// Destroy everything. Returns how many live objects were destroyed;
    /// already-dead handles are skipped.
    pub fn clear<W: Spawner + ?Sized>(&mut self, world: &mut W) -> usize {
        let mut destroyed = 0;
        for inst in self.instances.drain(..) {
            if world.is_alive(inst.handle) {
                world.destroy(inst.handle);
                destroyed += 1;
            }
        }
        if destroyed > 0 {
            debug!("{} pool cleared {destroyed}", self.kind.as_str());
        }
        destroyed
    }

    /// Destroy every instance not currently in a hand.
    pub fn clear_unheld<W: Spawner + ?Sized>(&mut self, world: &mut W) -> usize {
        self.prune(world);
        let mut destroyed = 0;
        self.instances.retain(|inst| {
            if world.is_held(inst.handle) {
                return true;
            }
            world.destroy(inst.handle);
            destroyed += 1;
            false
        });
        destroyed
    }
}
