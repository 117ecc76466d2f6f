//! Recall: turn a direction (explicit or gestured) into a spawned item.
//!
//! Owns both pools. Pool maintenance always runs before the first spawn of
//! a tick so capacity checks see a pruned set.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::binding::{BindingStore, KeyValueStore, default_resource};
use crate::constants::RECALL_DEBOUNCE;
use crate::direction::{Direction, HandSide};
use crate::error::RecallError;
use crate::gesture::{GestureClassifier, GestureSample};
use crate::pool::{PoolConfig, PoolKind, PoolReport, ResourcePool};
use crate::quaternion::{Pose, Quaternion};
use crate::timer::Cooldown;
use crate::vector::Vec3;
use crate::world::{Handle, World};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    /// Minimum seconds between gesture recalls per hand.
    pub debounce: f64,
    /// How far in front of the hand (m) the item appears.
    pub spawn_distance: f64,
    pub portal_resource: String,
    pub open_portal: bool,
    /// Close portals and destroy unheld recalled items once no hand is casting.
    pub cleanup_on_end: bool,
    /// Seconds a casting gesture may take before tracking restarts.
    pub gesture_window: f64,
    pub portals: PoolConfig,
    pub items: PoolConfig,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            debounce: RECALL_DEBOUNCE,
            spawn_distance: 0.3,
            portal_resource: "Rift".to_string(),
            open_portal: true,
            cleanup_on_end: true,
            gesture_window: 1.0,
            portals: PoolConfig::portals(),
            items: PoolConfig::items(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecallOutcome {
    pub hand: HandSide,
    pub direction: Direction,
    /// What the bindings resolved to.
    pub requested: String,
    /// What was actually spawned (differs after a not-found fallback).
    pub resource_id: String,
    pub item: Handle,
    pub portal: Option<Handle>,
    pub pose: Pose,
}

impl RecallOutcome {
    pub fn fell_back(&self) -> bool {
        self.requested != self.resource_id
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub portals: PoolReport,
    pub items: PoolReport,
}

#[derive(Debug)]
pub struct RecallController {
    config: RecallConfig,
    portals: ResourcePool,
    items: ResourcePool,
    trackers: [Option<GestureSample>; 2],
    debounce: [Cooldown; 2],
    maintained_at: Option<f64>,
}

impl RecallController {
    pub fn new(config: RecallConfig) -> Self {
        let debounce = Cooldown::new(config.debounce);
        Self {
            portals: ResourcePool::new(PoolKind::Portal, config.portals.clone()),
            items: ResourcePool::new(PoolKind::SpawnedItem, config.items.clone()),
            config,
            trackers: [None, None],
            debounce: [debounce; 2],
            maintained_at: None,
        }
    }

    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    pub fn portals(&self) -> &ResourcePool {
        &self.portals
    }

    pub fn items(&self) -> &ResourcePool {
        &self.items
    }

    /// Per-frame pool upkeep.
    pub fn maintain<W: World + ?Sized>(&mut self, world: &mut W, now: f64) -> MaintenanceReport {
        self.maintained_at = Some(now);
        MaintenanceReport {
            portals: self.portals.tick(world, now),
            items: self.items.tick(world, now),
        }
    }

    fn ensure_maintained<W: World + ?Sized>(&mut self, world: &mut W, now: f64) {
        if self.maintained_at != Some(now) {
            self.maintain(world, now);
        }
    }

    /// Resolve and spawn the item bound to `(hand, direction)` in front of
    /// `hand_pose`.
    pub fn recall<W, P>(
        &mut self,
        world: &mut W,
        bindings: &BindingStore<P>,
        hand: HandSide,
        direction: Direction,
        hand_pose: Pose,
        now: f64,
    ) -> Result<RecallOutcome, RecallError>
    where
        W: World + ?Sized,
        P: KeyValueStore,
    {
        let requested = bindings
            .resolve(hand, direction)
            .ok_or(RecallError::NoDirection)?
            .to_string();

        let descriptor = match world.lookup(&requested) {
            Some(d) => d,
            None => {
                let fallback = default_resource(direction)
                    .and_then(|id| world.lookup(id))
                    .ok_or_else(|| RecallError::NotFound(requested.clone()))?;
                warn!(
                    "{requested} is not in the catalog, recalling {} instead",
                    fallback.resource_id
                );
                fallback
            }
        };

        self.ensure_maintained(world, now);

        let pose = Pose::new(
            hand_pose.position + hand_pose.forward() * self.config.spawn_distance,
            hand_pose.rotation,
        );

        let portal = if self.config.open_portal {
            self.open_portal(world, pose, now)
        } else {
            None
        };

        let item = self
            .items
            .spawn(world, now, &descriptor.resource_id, |w| w.spawn(&descriptor, pose))?;

        info!(
            "{hand} hand recalled {} via {direction}",
            descriptor.resource_id
        );
        Ok(RecallOutcome {
            hand,
            direction,
            requested,
            resource_id: descriptor.resource_id,
            item,
            portal,
            pose,
        })
    }

    fn open_portal<W: World + ?Sized>(&mut self, world: &mut W, pose: Pose, now: f64) -> Option<Handle> {
        let Some(descriptor) = world.lookup(&self.config.portal_resource) else {
            debug!("no portal resource '{}' in catalog", self.config.portal_resource);
            return None;
        };
        match self
            .portals
            .spawn(world, now, &descriptor.resource_id, |w| w.spawn(&descriptor, pose))
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("portal did not open: {e}");
                None
            }
        }
    }

    /// Start watching `hand` for a recall gesture.
    pub fn begin_gesture(&mut self, hand: HandSide, position: Vec3, now: f64) {
        self.trackers[hand.index()] = Some(GestureSample::begin(position, now));
    }

    pub fn is_tracking(&self, hand: HandSide) -> bool {
        self.trackers[hand.index()].is_some()
    }

    /// Stop watching `hand`. When no hand is casting any more and cleanup is
    /// enabled, every portal and every unheld recalled item is destroyed.
    /// Returns how many objects went.
    pub fn end_gesture<W: World + ?Sized>(&mut self, world: &mut W, hand: HandSide) -> usize {
        if self.trackers[hand.index()].take().is_none() {
            return 0;
        }
        if !self.config.cleanup_on_end || self.trackers.iter().any(Option::is_some) {
            return 0;
        }
        let cleared = self.portals.clear(world) + self.items.clear_unheld(world);
        if cleared > 0 {
            debug!("cast ended, cleaned up {cleared} objects");
        }
        cleared
    }

    /// Feed the hand's latest pose to its tracker. Yields a result only when
    /// a gesture resolved to a direction this tick.
    #[allow(clippy::too_many_arguments)]
    pub fn track<W, P>(
        &mut self,
        world: &mut W,
        bindings: &BindingStore<P>,
        classifier: &GestureClassifier,
        hand: HandSide,
        hand_pose: Pose,
        observer: Quaternion,
        now: f64,
    ) -> Option<Result<RecallOutcome, RecallError>>
    where
        W: World + ?Sized,
        P: KeyValueStore,
    {
        let sample = self.trackers[hand.index()].as_mut()?;
        sample.update(hand_pose.position, now);

        if !sample.exceeds(classifier.config().distance_threshold) {
            if sample.elapsed() > self.config.gesture_window {
                sample.reset(hand_pose.position, now);
            }
            return None;
        }

        let direction =
            classifier.classify_world(sample.displacement(), sample.elapsed(), hand, observer);
        sample.reset(hand_pose.position, now);
        if direction == Direction::None {
            return None;
        }

        let debounce = &self.debounce[hand.index()];
        if !debounce.ready(now) {
            return Some(Err(RecallError::CoolingDown {
                hand,
                remaining: debounce.remaining(now),
            }));
        }

        let result = self.recall(world, bindings, hand, direction, hand_pose, now);
        if result.is_ok() {
            self.debounce[hand.index()].trigger(now);
        }
        Some(result)
    }

    /// Destroy everything both pools own and forget gesture state.
    pub fn clear<W: World + ?Sized>(&mut self, world: &mut W) -> usize {
        self.trackers = [None, None];
        self.portals.clear(world) + self.items.clear(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingConfig, MemoryPrefs};
    use crate::sim::SimWorld;
    use crate::world::Spawner;

    const CATALOG: [&str; 7] = [
        "Rift",
        "SwordShortCommon",
        "DaggerCommon",
        "AxeShortHatchet",
        "ShieldPartisan",
        "SpearFighter",
        "BowRecurve",
    ];

    fn bindings() -> BindingStore<MemoryPrefs> {
        BindingStore::load(MemoryPrefs::new(), BindingConfig::default())
    }

    fn hand_pose() -> Pose {
        Pose::at(Vec3::new(0.0, 1.2, 0.0))
    }

    #[test]
    fn test_recall_spawns_in_front_of_hand() {
        let mut world = SimWorld::with_catalog(CATALOG);
        let mut recall = RecallController::new(RecallConfig::default());
        let out = recall
            .recall(&mut world, &bindings(), HandSide::Right, Direction::Down, hand_pose(), 0.0)
            .unwrap();

        assert_eq!(out.resource_id, "DaggerCommon");
        assert!(!out.fell_back());
        assert!((out.pose.position.z - 0.3).abs() < 1e-12);
        assert_eq!(world.resource_of(out.item).as_deref(), Some("DaggerCommon"));
        assert!(out.portal.is_some());
        assert_eq!(recall.portals().len(), 1);
        assert_eq!(recall.items().len(), 1);
    }

    #[test]
    fn test_portal_spawns_before_item() {
        let mut world = SimWorld::with_catalog(CATALOG);
        let mut recall = RecallController::new(RecallConfig::default());
        let out = recall
            .recall(&mut world, &bindings(), HandSide::Left, Direction::Up, hand_pose(), 0.0)
            .unwrap();
        let portal = out.portal.unwrap();
        let order: Vec<Handle> = world
            .handles()
            .into_iter()
            .filter(|h| *h == portal || *h == out.item)
            .collect();
        assert_eq!(order, vec![portal, out.item]);
    }

    #[test]
    fn test_missing_portal_resource_still_recalls() {
        let mut world = SimWorld::with_catalog(CATALOG);
        world.unregister("Rift");
        let mut recall = RecallController::new(RecallConfig::default());
        let out = recall
            .recall(&mut world, &bindings(), HandSide::Right, Direction::Up, hand_pose(), 0.0)
            .unwrap();
        assert!(out.portal.is_none());
    }

    #[test]
    fn test_unknown_binding_falls_back_to_default() {
        let mut world = SimWorld::with_catalog(CATALOG);
        let mut store = bindings();
        store
            .assign(HandSide::Right, Direction::Left, "LostRelic")
            .unwrap();
        let mut recall = RecallController::new(RecallConfig::default());
        let out = recall
            .recall(&mut world, &store, HandSide::Right, Direction::Left, hand_pose(), 0.0)
            .unwrap();
        assert_eq!(out.requested, "LostRelic");
        assert_eq!(out.resource_id, "AxeShortHatchet");
        assert!(out.fell_back());
    }

    #[test]
    fn test_not_found_when_default_missing_too() {
        let mut world = SimWorld::with_catalog(["Rift"]);
        let mut recall = RecallController::new(RecallConfig::default());
        let err = recall
            .recall(&mut world, &bindings(), HandSide::Right, Direction::Up, hand_pose(), 0.0)
            .unwrap_err();
        assert_eq!(err, RecallError::NotFound("SwordShortCommon".to_string()));
        assert_eq!(world.live_count(), 0);
    }

    #[test]
    fn test_factory_failure_is_non_fatal() {
        let mut world = SimWorld::with_catalog(CATALOG);
        world.break_factory("BowRecurve");
        let mut recall = RecallController::new(RecallConfig::default());
        let err = recall
            .recall(&mut world, &bindings(), HandSide::Right, Direction::Backward, hand_pose(), 0.0)
            .unwrap_err();
        assert_eq!(err, RecallError::SpawnFailed("BowRecurve".to_string()));
    }

    #[test]
    fn test_none_direction_recalls_nothing() {
        let mut world = SimWorld::with_catalog(CATALOG);
        let mut recall = RecallController::new(RecallConfig::default());
        let err = recall
            .recall(&mut world, &bindings(), HandSide::Right, Direction::None, hand_pose(), 0.0)
            .unwrap_err();
        assert_eq!(err, RecallError::NoDirection);
    }

    #[test]
    fn test_gesture_recall_and_debounce() {
        let mut world = SimWorld::with_catalog(CATALOG);
        let store = bindings();
        let classifier = GestureClassifier::default();
        let mut recall = RecallController::new(RecallConfig::default());
        let observer = Quaternion::identity();

        let at = |x: f64| Pose::at(Vec3::new(x, 1.2, 0.0));
        recall.begin_gesture(HandSide::Right, at(0.0).position, 0.0);
        assert!(recall
            .track(&mut world, &store, &classifier, HandSide::Right, at(0.05), observer, 0.05)
            .is_none());
        let out = recall
            .track(&mut world, &store, &classifier, HandSide::Right, at(0.2), observer, 0.1)
            .unwrap()
            .unwrap();
        assert_eq!(out.direction, Direction::Right);
        assert_eq!(out.resource_id, "ShieldPartisan");

        // a second swipe inside the debounce window is refused
        let err = recall
            .track(&mut world, &store, &classifier, HandSide::Right, at(0.4), observer, 0.2)
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, RecallError::CoolingDown { .. }));
        assert_eq!(recall.items().len(), 1);
    }

    #[test]
    fn test_untracked_hand_yields_nothing() {
        let mut world = SimWorld::with_catalog(CATALOG);
        let mut recall = RecallController::new(RecallConfig::default());
        let got = recall.track(
            &mut world,
            &bindings(),
            &GestureClassifier::default(),
            HandSide::Left,
            hand_pose(),
            Quaternion::identity(),
            0.0,
        );
        assert!(got.is_none());
    }

    #[test]
    fn test_end_gesture_cleans_unheld_items() {
        let mut world = SimWorld::with_catalog(CATALOG);
        let store = bindings();
        let mut recall = RecallController::new(RecallConfig::default());
        let kept = recall
            .recall(&mut world, &store, HandSide::Right, Direction::Up, hand_pose(), 0.0)
            .unwrap()
            .item;
        let dropped = recall
            .recall(&mut world, &store, HandSide::Right, Direction::Down, hand_pose(), 0.0)
            .unwrap()
            .item;
        world.grab(kept, HandSide::Right);

        recall.begin_gesture(HandSide::Right, Vec3::ZERO, 0.0);
        recall.begin_gesture(HandSide::Left, Vec3::ZERO, 0.0);
        assert_eq!(recall.end_gesture(&mut world, HandSide::Right), 0);
        // two portals plus the dropped item
        assert_eq!(recall.end_gesture(&mut world, HandSide::Left), 3);
        assert!(world.is_alive(kept));
        assert!(!world.is_alive(dropped));
        assert!(recall.portals().is_empty());
    }
}
