//! Per-hand direction → resource bindings with layered fallback.
//!
//! Resolution order for `(hand, direction)`:
//! 1. an explicit binding on that exact hand
//! 2. the opposite hand's explicit binding, when cross-hand fallback is on
//! 3. the legacy single-hand table (state written before per-hand keys), for
//!    the right hand or through cross-hand fallback
//! 4. the hard-coded default for the direction
//!
//! Persistence is an injected [`KeyValueStore`]; its failures are logged and
//! degrade to "no data", never to an error for the caller.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::direction::{Direction, HandSide};
use crate::error::{BindingError, PersistenceError};

pub type ResourceId = String;

pub const SNAPSHOT_VERSION: u32 = 1;

const KEY_PREFIX: &str = "armory.binding";
const LEGACY_SCOPE: &str = "legacy";

/// Blocking string key-value persistence (the host's preference store).
pub trait KeyValueStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set_string(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&mut self, key: &str) -> Result<(), PersistenceError>;
    fn flush(&mut self) -> Result<(), PersistenceError>;
}

/// HashMap-backed store for headless runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryPrefs {
    values: HashMap<String, String>,
    failing: bool,
    flushes: usize,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail, simulating broken storage.
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing {
            return Err(PersistenceError("storage unavailable".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryPrefs {
    fn get_string(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.check()?;
        Ok(self.values.get(key).cloned())
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.check()?;
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.check()?;
        self.values.remove(key);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        self.check()?;
        self.flushes += 1;
        Ok(())
    }
}

/// Persisted key for a hand's binding.
pub fn hand_key(hand: HandSide, direction: Direction) -> String {
    format!("{KEY_PREFIX}.{hand}.{direction}")
}

/// Persisted key in the legacy single-hand table.
pub fn legacy_key(direction: Direction) -> String {
    format!("{KEY_PREFIX}.{LEGACY_SCOPE}.{direction}")
}

/// Hard-coded resource for each bindable direction.
pub fn default_resource(direction: Direction) -> Option<&'static str> {
    match direction {
        Direction::Up => Some("SwordShortCommon"),
        Direction::Down => Some("DaggerCommon"),
        Direction::Left => Some("AxeShortHatchet"),
        Direction::Right => Some("ShieldPartisan"),
        Direction::Forward => Some("SpearFighter"),
        Direction::Backward => Some("BowRecurve"),
        Direction::None => None,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Let a hand with no binding borrow the other hand's.
    pub cross_hand_fallback: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            cross_hand_fallback: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Read back from persistence.
    Persisted,
    /// Written by `assign` this session.
    Assigned,
    /// Filled from the hard-coded table.
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub resource: ResourceId,
    pub origin: Origin,
}

/// Which fallback step produced a resolved resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingSource {
    Exact,
    OtherHand,
    Legacy,
    Default,
}

impl BindingSource {
    pub fn as_str(self) -> &'static str {
        match self {
            BindingSource::Exact => "exact",
            BindingSource::OtherHand => "other-hand",
            BindingSource::Legacy => "legacy",
            BindingSource::Default => "default",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub hand: HandSide,
    pub direction: Direction,
    pub resource: ResourceId,
    pub source: BindingSource,
}

/// Portable form of every explicit binding, for export/import.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSnapshot {
    pub version: u32,
    #[serde(default)]
    pub right: BTreeMap<Direction, ResourceId>,
    #[serde(default)]
    pub left: BTreeMap<Direction, ResourceId>,
    #[serde(default)]
    pub legacy: BTreeMap<Direction, ResourceId>,
}

pub struct BindingStore<P> {
    prefs: P,
    config: BindingConfig,
    hands: [BTreeMap<Direction, Binding>; 2],
    legacy: BTreeMap<Direction, ResourceId>,
}

impl<P: KeyValueStore> BindingStore<P> {
    /// Empty store. Nothing is read until [`BindingStore::reload`].
    pub fn new(prefs: P, config: BindingConfig) -> Self {
        Self {
            prefs,
            config,
            hands: [BTreeMap::new(), BTreeMap::new()],
            legacy: BTreeMap::new(),
        }
    }

    /// Construct and hydrate from persistence in one step.
    pub fn load(prefs: P, config: BindingConfig) -> Self {
        let mut store = Self::new(prefs, config);
        store.reload();
        store
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    pub fn set_cross_hand_fallback(&mut self, enabled: bool) {
        self.config.cross_hand_fallback = enabled;
    }

    pub fn prefs(&self) -> &P {
        &self.prefs
    }

    pub fn prefs_mut(&mut self) -> &mut P {
        &mut self.prefs
    }

    pub fn into_prefs(self) -> P {
        self.prefs
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.prefs.get_string(key) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                warn!("failed to read '{key}': {e}");
                None
            }
        }
    }

    fn write(&mut self, key: &str, value: &str) {
        if let Err(e) = self.prefs.set_string(key, value) {
            warn!("failed to write '{key}': {e}");
        }
    }

    fn erase(&mut self, key: &str) {
        if let Err(e) = self.prefs.remove(key) {
            warn!("failed to remove '{key}': {e}");
        }
    }

    fn commit(&mut self) {
        if let Err(e) = self.prefs.flush() {
            warn!("failed to flush bindings: {e}");
        }
    }

    /// Rebuild the whole table from persistence, then fill every missing
    /// slot with its default so both hands cover all six directions.
    pub fn reload(&mut self) {
        self.hands = [BTreeMap::new(), BTreeMap::new()];
        self.legacy.clear();

        for direction in Direction::BINDABLE {
            for hand in HandSide::BOTH {
                if let Some(resource) = self.read(&hand_key(hand, direction)) {
                    debug!("loaded {hand} {direction} → {resource}");
                    self.hands[hand.index()].insert(
                        direction,
                        Binding {
                            resource,
                            origin: Origin::Persisted,
                        },
                    );
                }
            }

            // A legacy key alongside a right-hand key is just its mirror.
            if !self.hands[HandSide::Right.index()].contains_key(&direction) {
                if let Some(resource) = self.read(&legacy_key(direction)) {
                    debug!("loaded legacy {direction} → {resource}");
                    self.legacy.insert(direction, resource);
                }
            }

            for hand in HandSide::BOTH {
                if let Some(resource) = default_resource(direction) {
                    self.hands[hand.index()]
                        .entry(direction)
                        .or_insert_with(|| Binding {
                            resource: resource.to_string(),
                            origin: Origin::Default,
                        });
                }
            }
        }
    }

    /// Persist every explicit binding. Returns the number of keys written.
    pub fn save(&mut self) -> usize {
        let mut writes: Vec<(String, String)> = Vec::new();
        for hand in HandSide::BOTH {
            for (direction, binding) in &self.hands[hand.index()] {
                if binding.origin == Origin::Default {
                    continue;
                }
                writes.push((hand_key(hand, *direction), binding.resource.clone()));
                if hand == HandSide::Right {
                    writes.push((legacy_key(*direction), binding.resource.clone()));
                }
            }
        }
        for (direction, resource) in &self.legacy {
            writes.push((legacy_key(*direction), resource.clone()));
        }

        for (key, value) in &writes {
            self.write(key, value);
        }
        self.commit();
        writes.len()
    }

    fn explicit(&self, hand: HandSide, direction: Direction) -> Option<&str> {
        self.hands[hand.index()]
            .get(&direction)
            .filter(|b| b.origin != Origin::Default)
            .map(|b| b.resource.as_str())
    }

    /// Resolve a resource and report which fallback step produced it.
    pub fn resolve_with_source(
        &self,
        hand: HandSide,
        direction: Direction,
    ) -> Option<(&str, BindingSource)> {
        if !direction.is_bindable() {
            return None;
        }
        if let Some(r) = self.explicit(hand, direction) {
            return Some((r, BindingSource::Exact));
        }
        if self.config.cross_hand_fallback {
            if let Some(r) = self.explicit(hand.opposite(), direction) {
                return Some((r, BindingSource::OtherHand));
            }
        }
        // Legacy keys belong to the right hand; the left hand only sees them
        // through cross-hand fallback.
        let legacy_visible = hand == HandSide::Right || self.config.cross_hand_fallback;
        if legacy_visible {
            if let Some(r) = self.legacy.get(&direction) {
                return Some((r.as_str(), BindingSource::Legacy));
            }
        }
        default_resource(direction).map(|r| (r, BindingSource::Default))
    }

    pub fn resolve(&self, hand: HandSide, direction: Direction) -> Option<&str> {
        self.resolve_with_source(hand, direction).map(|(r, _)| r)
    }

    /// Bind `resource` to `(hand, direction)`, last write wins, and persist
    /// immediately. Right-hand writes are mirrored into the legacy keys.
    pub fn assign(
        &mut self,
        hand: HandSide,
        direction: Direction,
        resource: &str,
    ) -> Result<(), BindingError> {
        if !direction.is_bindable() {
            return Err(BindingError::UnbindableDirection(direction));
        }
        let resource = resource.trim();
        if resource.is_empty() {
            return Err(BindingError::EmptyResource);
        }

        self.hands[hand.index()].insert(
            direction,
            Binding {
                resource: resource.to_string(),
                origin: Origin::Assigned,
            },
        );

        self.write(&hand_key(hand, direction), resource);
        if hand == HandSide::Right {
            self.legacy.remove(&direction);
            self.write(&legacy_key(direction), resource);
        }
        self.commit();

        info!("assigned {hand} hand {direction} → {resource}");
        Ok(())
    }

    /// Drop explicit bindings (one hand, or all) back to defaults.
    /// Returns how many explicit entries were cleared.
    pub fn reset(&mut self, hand: Option<HandSide>) -> usize {
        let hands: Vec<HandSide> = match hand {
            Some(h) => vec![h],
            None => HandSide::BOTH.to_vec(),
        };

        let mut cleared = 0;
        for h in hands {
            for direction in Direction::BINDABLE {
                if self.explicit(h, direction).is_some() {
                    cleared += 1;
                }
                if let Some(resource) = default_resource(direction) {
                    self.hands[h.index()].insert(
                        direction,
                        Binding {
                            resource: resource.to_string(),
                            origin: Origin::Default,
                        },
                    );
                }
                self.erase(&hand_key(h, direction));
                if h == HandSide::Right {
                    if self.legacy.remove(&direction).is_some() {
                        cleared += 1;
                    }
                    self.erase(&legacy_key(direction));
                }
            }
        }
        self.commit();
        info!("reset {cleared} bindings");
        cleared
    }

    /// All twelve resolved `(hand, direction)` slots.
    pub fn table(&self) -> Vec<TableRow> {
        let mut rows = Vec::with_capacity(12);
        for hand in HandSide::BOTH {
            for direction in Direction::BINDABLE {
                if let Some((resource, source)) = self.resolve_with_source(hand, direction) {
                    rows.push(TableRow {
                        hand,
                        direction,
                        resource: resource.to_string(),
                        source,
                    });
                }
            }
        }
        rows
    }

    pub fn snapshot(&self) -> BindingSnapshot {
        let mut snapshot = BindingSnapshot {
            version: SNAPSHOT_VERSION,
            legacy: self.legacy.clone(),
            ..Default::default()
        };
        for direction in Direction::BINDABLE {
            if let Some(r) = self.explicit(HandSide::Right, direction) {
                snapshot.right.insert(direction, r.to_string());
            }
            if let Some(r) = self.explicit(HandSide::Left, direction) {
                snapshot.left.insert(direction, r.to_string());
            }
        }
        snapshot
    }

    /// Replace every explicit binding with the snapshot's. The snapshot is
    /// validated first; an invalid one changes nothing.
    pub fn restore(&mut self, snapshot: &BindingSnapshot) -> Result<usize, BindingError> {
        let entries = snapshot
            .right
            .iter()
            .map(|(d, r)| (HandSide::Right, *d, r))
            .chain(snapshot.left.iter().map(|(d, r)| (HandSide::Left, *d, r)));

        for (_, direction, resource) in entries.clone().chain(
            snapshot
                .legacy
                .iter()
                .map(|(d, r)| (HandSide::Right, *d, r)),
        ) {
            if !direction.is_bindable() {
                return Err(BindingError::UnbindableDirection(direction));
            }
            if resource.trim().is_empty() {
                return Err(BindingError::EmptyResource);
            }
        }

        self.reset(None);
        let mut restored = 0;
        for (hand, direction, resource) in entries {
            self.assign(hand, direction, resource)?;
            restored += 1;
        }
        for (direction, resource) in &snapshot.legacy {
            if snapshot.right.contains_key(direction) {
                continue;
            }
            self.legacy.insert(*direction, resource.trim().to_string());
            self.write(&legacy_key(*direction), resource.trim());
            restored += 1;
        }
        self.commit();
        Ok(restored)
    }
}
