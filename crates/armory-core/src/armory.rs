//! Frame-level orchestration of bindings, capture sessions and recall.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::binding::{BindingStore, KeyValueStore};
use crate::capture::{CaptureConfig, CaptureContext, CaptureEvent, CaptureSession, EndReason};
use crate::config::ArmoryConfig;
use crate::direction::{Direction, HandSide};
use crate::error::{CaptureError, RecallError};
use crate::gesture::GestureClassifier;
use crate::quaternion::{Pose, Quaternion};
use crate::recall::{MaintenanceReport, RecallController, RecallOutcome};
use crate::world::{Handle, World};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandInput {
    pub side: HandSide,
    pub pose: Pose,
}

/// Discrete input for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    /// Alternate-use pressed on a held binder.
    CaptureStart { binder: Handle, hand: HandSide },
    CaptureStop { binder: Handle },
    /// The recall spell started or stopped on a hand.
    CastStart { hand: HandSide },
    CastStop { hand: HandSide },
    /// Recall a direction without a gesture.
    Recall { hand: HandSide, direction: Direction },
    /// A binder left the world; its session goes with it.
    BinderDespawned { binder: Handle },
    /// The player despawned. Cancels everything.
    Despawn,
    /// A new level loaded. Cancels everything and reloads bindings.
    LevelChanged,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    pub now: f64,
    pub dt: f64,
    /// Orientation gestures are judged against (usually the head).
    pub observer: Quaternion,
    pub hands: Vec<HandInput>,
    pub signals: Vec<Signal>,
}

impl FrameInput {
    pub fn new(now: f64, dt: f64) -> Self {
        Self {
            now,
            dt,
            ..Default::default()
        }
    }

    pub fn with_hand(mut self, side: HandSide, pose: Pose) -> Self {
        self.hands.push(HandInput { side, pose });
        self
    }

    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn hand(&self, side: HandSide) -> Option<Pose> {
        self.hands.iter().find(|h| h.side == side).map(|h| h.pose)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ArmoryEvent {
    Capture { binder: Handle, event: CaptureEvent },
    CaptureRefused { binder: Handle, error: CaptureError },
    Recalled(RecallOutcome),
    RecallFailed { hand: HandSide, error: RecallError },
    PoolsMaintained(MaintenanceReport),
    /// Hard cancel: every session torn down and every pooled object destroyed.
    Cleared { destroyed: usize },
    BindingsReloaded,
}

impl fmt::Display for ArmoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmoryEvent::Capture { binder, event } => match event {
                CaptureEvent::Started { hand } => write!(f, "capture[{binder}] started by {hand} hand"),
                CaptureEvent::Found {
                    handle,
                    resource_id,
                } => write!(f, "capture[{binder}] hovering {resource_id} ({handle})"),
                CaptureEvent::Lost { handle } => write!(f, "capture[{binder}] lost {handle}"),
                CaptureEvent::GestureReset => write!(f, "capture[{binder}] gesture reset"),
                CaptureEvent::Committed {
                    hand,
                    direction,
                    resource_id,
                } => write!(f, "capture[{binder}] bound {hand}/{direction} → {resource_id}"),
                CaptureEvent::Ended { reason } => write!(f, "capture[{binder}] ended ({reason:?})"),
            },
            ArmoryEvent::CaptureRefused { binder, error } => {
                write!(f, "capture[{binder}] refused: {error}")
            }
            ArmoryEvent::Recalled(out) => {
                write!(
                    f,
                    "recalled {} for {}/{} as {}",
                    out.resource_id, out.hand, out.direction, out.item
                )?;
                if out.fell_back() {
                    write!(f, " (wanted {})", out.requested)?;
                }
                Ok(())
            }
            ArmoryEvent::RecallFailed { hand, error } => write!(f, "{hand} recall failed: {error}"),
            ArmoryEvent::PoolsMaintained(r) => write!(
                f,
                "pools: {} portals expired, {} items expired, {} stale pruned",
                r.portals.expired,
                r.items.expired,
                r.portals.pruned + r.items.pruned
            ),
            ArmoryEvent::Cleared { destroyed } => write!(f, "cleared {destroyed} objects"),
            ArmoryEvent::BindingsReloaded => write!(f, "bindings reloaded"),
        }
    }
}

/// Owns every piece of armory state for one player.
pub struct Armory<P> {
    classifier: GestureClassifier,
    bindings: BindingStore<P>,
    recall: RecallController,
    capture_config: CaptureConfig,
    sessions: BTreeMap<Handle, CaptureSession>,
}

impl<P: KeyValueStore> Armory<P> {
    /// Build from config and hydrate bindings from `prefs`.
    pub fn new(config: ArmoryConfig, prefs: P) -> Self {
        Self {
            classifier: GestureClassifier::new(config.gesture),
            bindings: BindingStore::load(prefs, config.bindings),
            recall: RecallController::new(config.recall),
            capture_config: config.capture,
            sessions: BTreeMap::new(),
        }
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    pub fn bindings(&self) -> &BindingStore<P> {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut BindingStore<P> {
        &mut self.bindings
    }

    pub fn recall(&self) -> &RecallController {
        &self.recall
    }

    pub fn session(&self, binder: Handle) -> Option<&CaptureSession> {
        self.sessions.get(&binder)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.values().filter(|s| s.is_active()).count()
    }

    /// Process one frame. See [`Signal`] for inputs; ordering within the
    /// frame is hard cancels, pool upkeep, capture signals, capture ticks,
    /// then recall.
    pub fn tick<W, R>(&mut self, world: &mut W, frame: &FrameInput, rng: &mut R) -> Vec<ArmoryEvent>
    where
        W: World + ?Sized,
        R: Rng + ?Sized,
    {
        let mut events = Vec::new();

        self.hard_cancel(world, frame, rng, &mut events);

        let report = self.recall.maintain(world, frame.now);
        if report != MaintenanceReport::default() {
            events.push(ArmoryEvent::PoolsMaintained(report));
        }

        self.capture_signals(world, frame, rng, &mut events);
        self.tick_sessions(world, frame, rng, &mut events);
        self.recall_phase(world, frame, &mut events);

        events
    }

    fn hard_cancel<W, R>(
        &mut self,
        world: &mut W,
        frame: &FrameInput,
        rng: &mut R,
        events: &mut Vec<ArmoryEvent>,
    ) where
        W: World + ?Sized,
        R: Rng + ?Sized,
    {
        for signal in &frame.signals {
            if let Signal::BinderDespawned { binder } = signal {
                if let Some(mut session) = self.sessions.remove(binder) {
                    if let Some(event) = session.teardown(world, EndReason::Cancelled, rng) {
                        events.push(ArmoryEvent::Capture {
                            binder: *binder,
                            event,
                        });
                    }
                }
            }
        }

        let despawn = frame.signals.contains(&Signal::Despawn);
        let level = frame.signals.contains(&Signal::LevelChanged);
        if !despawn && !level {
            return;
        }

        info!(
            "hard cancel ({})",
            if level { "level changed" } else { "despawn" }
        );
        for (binder, session) in &mut self.sessions {
            if let Some(event) = session.teardown(world, EndReason::Cancelled, rng) {
                events.push(ArmoryEvent::Capture {
                    binder: *binder,
                    event,
                });
            }
        }
        let destroyed = self.recall.clear(world);
        events.push(ArmoryEvent::Cleared { destroyed });

        if level {
            self.bindings.reload();
            events.push(ArmoryEvent::BindingsReloaded);
        }
    }

    fn capture_signals<W, R>(
        &mut self,
        world: &mut W,
        frame: &FrameInput,
        rng: &mut R,
        events: &mut Vec<ArmoryEvent>,
    ) where
        W: World + ?Sized,
        R: Rng + ?Sized,
    {
        for signal in &frame.signals {
            match *signal {
                Signal::CaptureStart { binder, hand } => {
                    let config = &self.capture_config;
                    let session = self
                        .sessions
                        .entry(binder)
                        .or_insert_with(|| CaptureSession::new(binder, config.clone()));
                    match session.activate(world, hand, frame.now, rng) {
                        Ok(started) => events.extend(
                            started
                                .into_iter()
                                .map(|event| ArmoryEvent::Capture { binder, event }),
                        ),
                        Err(error) => {
                            debug!("capture on {binder} refused: {error}");
                            events.push(ArmoryEvent::CaptureRefused { binder, error });
                        }
                    }
                }
                Signal::CaptureStop { binder } => {
                    if let Some(session) = self.sessions.get_mut(&binder) {
                        if let Some(event) = session.teardown(world, EndReason::Cancelled, rng) {
                            events.push(ArmoryEvent::Capture { binder, event });
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn tick_sessions<W, R>(
        &mut self,
        world: &mut W,
        frame: &FrameInput,
        rng: &mut R,
        events: &mut Vec<ArmoryEvent>,
    ) where
        W: World + ?Sized,
        R: Rng + ?Sized,
    {
        let binders: Vec<Handle> = self.sessions.keys().copied().collect();
        for binder in &binders {
            // Read after earlier sessions ticked, so a find this frame is
            // already claimed.
            let claimed: BTreeSet<Handle> = self
                .sessions
                .iter()
                .filter(|(other, _)| *other != binder)
                .filter_map(|(_, s)| s.hovered())
                .collect();
            let Some(session) = self.sessions.get_mut(binder) else {
                continue;
            };
            let Some(hand) = session.hand() else {
                continue;
            };
            // The binder sits in the hand, so it stands in when the frame
            // carries no pose for it.
            let Some(hand_position) = frame
                .hand(hand)
                .or_else(|| world.pose(*binder))
                .map(|p| p.position)
            else {
                continue;
            };
            let ctx = CaptureContext {
                now: frame.now,
                dt: frame.dt,
                hand_position,
                observer: frame.observer,
                classifier: &self.classifier,
                claimed: &claimed,
            };
            for event in session.tick(world, &mut self.bindings, &ctx, rng) {
                events.push(ArmoryEvent::Capture {
                    binder: *binder,
                    event,
                });
            }
        }
    }

    fn recall_phase<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        frame: &FrameInput,
        events: &mut Vec<ArmoryEvent>,
    ) {
        for signal in &frame.signals {
            match *signal {
                Signal::CastStart { hand } => match frame.hand(hand) {
                    Some(pose) => self.recall.begin_gesture(hand, pose.position, frame.now),
                    None => warn!("cast started on {hand} hand with no hand pose"),
                },
                Signal::CastStop { hand } => {
                    self.recall.end_gesture(world, hand);
                }
                Signal::Recall { hand, direction } => {
                    let Some(pose) = frame.hand(hand) else {
                        warn!("recall on {hand} hand with no hand pose");
                        continue;
                    };
                    let result =
                        self.recall
                            .recall(world, &self.bindings, hand, direction, pose, frame.now);
                    events.push(recall_event(hand, result));
                }
                _ => {}
            }
        }

        for hand in HandSide::BOTH {
            if !self.recall.is_tracking(hand) {
                continue;
            }
            let Some(pose) = frame.hand(hand) else {
                continue;
            };
            if let Some(result) = self.recall.track(
                world,
                &self.bindings,
                &self.classifier,
                hand,
                pose,
                frame.observer,
                frame.now,
            ) {
                events.push(recall_event(hand, result));
            }
        }
    }

    /// Tear everything down and persist bindings. Returns how many pooled
    /// objects were destroyed.
    pub fn shutdown<W, R>(&mut self, world: &mut W, rng: &mut R) -> usize
    where
        W: World + ?Sized,
        R: Rng + ?Sized,
    {
        for session in self.sessions.values_mut() {
            session.teardown(world, EndReason::Cancelled, rng);
        }
        self.sessions.clear();
        let destroyed = self.recall.clear(world);
        let written = self.bindings.save();
        info!("armory shut down: {destroyed} objects destroyed, {written} binding keys saved");
        destroyed
    }

    pub fn into_prefs(self) -> P {
        self.bindings.into_prefs()
    }
}

fn recall_event(hand: HandSide, result: Result<RecallOutcome, RecallError>) -> ArmoryEvent {
    match result {
        Ok(outcome) => ArmoryEvent::Recalled(outcome),
        Err(error) => {
            match &error {
                RecallError::CoolingDown { .. } => debug!("{hand} recall: {error}"),
                _ => warn!("{hand} recall failed: {error}"),
            }
            ArmoryEvent::RecallFailed { hand, error }
        }
    }
}
