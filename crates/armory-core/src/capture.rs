//! Capture sessions: find a loose resource near a binder, hover it, and
//! bind it to whatever direction the hand then gestures.
//!
//! ```text
//! Idle ──activate──▶ Searching ──found──▶ Hovering ──gesture──▶ Committing
//!   ▲                    │  ▲                 │                    │
//!   │              attempts  └──lost/cycle────┘                    │
//!   └──────────── teardown (timeout, release, cancel, commit) ◀────┘
//! ```
//!
//! Each session owns at most one borrowed resource. The borrow is physics
//! suspended every tick it is hovered and always restored on release.

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::binding::{BindingStore, KeyValueStore};
use crate::constants::{
    CAPTURE_SESSION_TIMEOUT, HOVER_HEIGHT, MAX_SEARCH_ATTEMPTS, SEARCH_RADIUS,
};
use crate::direction::{Direction, HandSide};
use crate::error::CaptureError;
use crate::gesture::{GestureClassifier, GestureSample};
use crate::quaternion::{Pose, Quaternion};
use crate::timer::{Cooldown, Deadline};
use crate::vector::Vec3;
use crate::world::{Handle, World};

const MIN_POSITION_LERP: f64 = 10.0;
const MIN_ROTATION_LERP: f64 = 5.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub search_radius: f64,
    /// Height (m) above the binder the resource hovers at.
    pub hover_height: f64,
    pub max_search_attempts: u32,
    /// Seconds between failed search attempts.
    pub settle_delay: f64,
    /// Absolute session lifetime regardless of phase.
    pub session_timeout: f64,
    /// Restart gesture tracking when it times out below threshold.
    pub auto_reset_gesture: bool,
    pub keep_hovering_after_assign: bool,
    /// With `keep_hovering_after_assign`, drop the bound resource after
    /// `cycle_delay` and search for the next one.
    pub cycle_after_assign: bool,
    pub cycle_delay: f64,
    /// Per-hand wait after a committed session before the next may start.
    pub pickup_cooldown: f64,
    pub position_lerp_speed: f64,
    pub rotation_lerp_speed: f64,
    pub spin_degrees_per_sec: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            search_radius: SEARCH_RADIUS,
            hover_height: HOVER_HEIGHT,
            max_search_attempts: MAX_SEARCH_ATTEMPTS,
            settle_delay: 0.1,
            session_timeout: CAPTURE_SESSION_TIMEOUT,
            auto_reset_gesture: true,
            keep_hovering_after_assign: false,
            cycle_after_assign: true,
            cycle_delay: 0.5,
            pickup_cooldown: 0.5,
            position_lerp_speed: 15.0,
            rotation_lerp_speed: 7.0,
            spin_degrees_per_sec: 40.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapturePhase {
    Idle,
    Searching,
    Hovering,
    Committing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    NothingFound,
    Timeout,
    Committed,
    /// The binder left the hand (or the world).
    Released,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CaptureEvent {
    Started {
        hand: HandSide,
    },
    Found {
        handle: Handle,
        resource_id: String,
    },
    Lost {
        handle: Handle,
    },
    GestureReset,
    Committed {
        hand: HandSide,
        direction: Direction,
        resource_id: String,
    },
    Ended {
        reason: EndReason,
    },
}

/// Per-tick inputs a session reads but does not own.
#[derive(Clone, Copy, Debug)]
pub struct CaptureContext<'a> {
    pub now: f64,
    pub dt: f64,
    /// World position of the session's hand.
    pub hand_position: Vec3,
    pub observer: Quaternion,
    pub classifier: &'a GestureClassifier,
    /// Items other sessions are hovering; never picked by a search.
    pub claimed: &'a BTreeSet<Handle>,
}

#[derive(Clone, Debug, PartialEq)]
struct Hovered {
    handle: Handle,
    resource_id: String,
    offset: Vec3,
    spin: f64,
    snapped: bool,
}

#[derive(Debug)]
pub struct CaptureSession {
    binder: Handle,
    config: CaptureConfig,
    phase: CapturePhase,
    hand: Option<HandSide>,
    hovered: Option<Hovered>,
    gesture: Option<GestureSample>,
    attempts: u32,
    deadline: Option<Deadline>,
    next_search: Option<Deadline>,
    cycle_at: Option<Deadline>,
    /// Resource just bound; skipped by the next search.
    exclude: Option<Handle>,
    cooldowns: [Cooldown; 2],
}

impl CaptureSession {
    pub fn new(binder: Handle, config: CaptureConfig) -> Self {
        let cooldown = Cooldown::new(config.pickup_cooldown);
        Self {
            binder,
            config,
            phase: CapturePhase::Idle,
            hand: None,
            hovered: None,
            gesture: None,
            attempts: 0,
            deadline: None,
            next_search: None,
            cycle_at: None,
            exclude: None,
            cooldowns: [cooldown; 2],
        }
    }

    pub fn binder(&self) -> Handle {
        self.binder
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != CapturePhase::Idle
    }

    pub fn hand(&self) -> Option<HandSide> {
        self.hand
    }

    pub fn hovered(&self) -> Option<Handle> {
        self.hovered.as_ref().map(|h| h.handle)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn gesture(&self) -> Option<&GestureSample> {
        self.gesture.as_ref()
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    /// Start searching on behalf of `hand`. Any running session on this
    /// binder is torn down first.
    pub fn activate<W, R>(
        &mut self,
        world: &mut W,
        hand: HandSide,
        now: f64,
        rng: &mut R,
    ) -> Result<Vec<CaptureEvent>, CaptureError>
    where
        W: World + ?Sized,
        R: Rng + ?Sized,
    {
        if world.holder(self.binder) != Some(hand) {
            return Err(CaptureError::NotHeld(hand));
        }
        let cooldown = &self.cooldowns[hand.index()];
        if !cooldown.ready(now) {
            return Err(CaptureError::CoolingDown {
                hand,
                remaining: cooldown.remaining(now),
            });
        }

        let mut events = Vec::new();
        events.extend(self.teardown(world, EndReason::Cancelled, rng));

        self.phase = CapturePhase::Searching;
        self.hand = Some(hand);
        self.attempts = 0;
        self.deadline = Some(Deadline::after(now, self.config.session_timeout));
        self.next_search = None;
        self.cycle_at = None;
        self.exclude = None;

        info!("capture started on {} by {hand} hand", self.binder);
        events.push(CaptureEvent::Started { hand });
        Ok(events)
    }

    /// Advance one frame.
    pub fn tick<W, P, R>(
        &mut self,
        world: &mut W,
        bindings: &mut BindingStore<P>,
        ctx: &CaptureContext<'_>,
        rng: &mut R,
    ) -> Vec<CaptureEvent>
    where
        W: World + ?Sized,
        P: KeyValueStore,
        R: Rng + ?Sized,
    {
        let mut events = Vec::new();
        let Some(hand) = self.hand else {
            return events;
        };
        if self.phase == CapturePhase::Idle {
            return events;
        }

        if self.deadline.is_some_and(|d| d.reached(ctx.now)) {
            debug!("capture on {} hit its safety timeout", self.binder);
            events.extend(self.teardown(world, EndReason::Timeout, rng));
            return events;
        }
        if world.holder(self.binder) != Some(hand) {
            events.extend(self.teardown(world, EndReason::Released, rng));
            return events;
        }

        match self.phase {
            CapturePhase::Searching => self.search(world, ctx, rng, &mut events),
            CapturePhase::Hovering => self.hover(world, bindings, ctx, rng, &mut events),
            // Committing never outlives the tick that entered it.
            CapturePhase::Committing => self.phase = CapturePhase::Hovering,
            CapturePhase::Idle => {}
        }
        events
    }

    /// End the session from any phase, restoring the hovered resource.
    /// Calling it on an idle session does nothing.
    pub fn teardown<W, R>(
        &mut self,
        world: &mut W,
        reason: EndReason,
        rng: &mut R,
    ) -> Option<CaptureEvent>
    where
        W: World + ?Sized,
        R: Rng + ?Sized,
    {
        if self.phase == CapturePhase::Idle {
            return None;
        }
        if let Some(hovered) = self.hovered.take() {
            release(world, hovered.handle, rng);
        }
        self.phase = CapturePhase::Idle;
        self.hand = None;
        self.gesture = None;
        self.attempts = 0;
        self.deadline = None;
        self.next_search = None;
        self.cycle_at = None;
        self.exclude = None;

        info!("capture on {} ended: {reason:?}", self.binder);
        Some(CaptureEvent::Ended { reason })
    }

    fn search<W, R>(
        &mut self,
        world: &mut W,
        ctx: &CaptureContext<'_>,
        rng: &mut R,
        events: &mut Vec<CaptureEvent>,
    ) where
        W: World + ?Sized,
        R: Rng + ?Sized,
    {
        if self.next_search.is_some_and(|d| !d.reached(ctx.now)) {
            return;
        }
        let Some(binder) = world.pose(self.binder) else {
            events.extend(self.teardown(world, EndReason::Released, rng));
            return;
        };

        self.attempts += 1;
        match self.nearest_candidate(world, binder.position, ctx.claimed) {
            Some((handle, resource_id)) => {
                debug!(
                    "found {resource_id} ({handle}) after {} attempts",
                    self.attempts
                );
                let offset = Vec3::new(
                    rng.random_range(-0.05..=0.05),
                    rng.random_range(0.05..=0.1),
                    rng.random_range(-0.05..=0.05),
                );
                let mut hovered = Hovered {
                    handle,
                    resource_id: resource_id.clone(),
                    offset,
                    spin: 0.0,
                    snapped: false,
                };
                suspend(world, handle);
                self.place(world, &mut hovered, binder, ctx.dt);
                self.hovered = Some(hovered);
                self.gesture = Some(GestureSample::begin(ctx.hand_position, ctx.now));
                self.phase = CapturePhase::Hovering;
                self.attempts = 0;
                self.next_search = None;
                events.push(CaptureEvent::Found {
                    handle,
                    resource_id,
                });
            }
            None if self.attempts >= self.config.max_search_attempts => {
                debug!("nothing to capture near {}", self.binder);
                events.extend(self.teardown(world, EndReason::NothingFound, rng));
            }
            None => {
                self.next_search = Some(Deadline::after(ctx.now, self.config.settle_delay));
            }
        }
    }

    fn nearest_candidate<W: World + ?Sized>(
        &self,
        world: &W,
        center: Vec3,
        claimed: &BTreeSet<Handle>,
    ) -> Option<(Handle, String)> {
        world
            .overlap_query(center, self.config.search_radius)
            .into_iter()
            .filter(|h| *h != self.binder && Some(*h) != self.exclude && !world.is_held(*h))
            .filter(|h| !claimed.contains(h))
            .filter_map(|h| {
                let resource_id = world.resource_of(h)?;
                let distance = world.pose(h)?.position.distance(center);
                Some((h, resource_id, distance))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(h, resource_id, _)| (h, resource_id))
    }

    fn hover<W, P, R>(
        &mut self,
        world: &mut W,
        bindings: &mut BindingStore<P>,
        ctx: &CaptureContext<'_>,
        rng: &mut R,
        events: &mut Vec<CaptureEvent>,
    ) where
        W: World + ?Sized,
        P: KeyValueStore,
        R: Rng + ?Sized,
    {
        let Some(mut hovered) = self.hovered.take() else {
            self.phase = CapturePhase::Searching;
            return;
        };
        let handle = hovered.handle;

        if !world.is_alive(handle) || world.is_held(handle) {
            debug!("lost hovered {} ({handle})", hovered.resource_id);
            if world.is_alive(handle) {
                release(world, handle, rng);
            }
            self.back_to_search(ctx.now, None);
            events.push(CaptureEvent::Lost { handle });
            return;
        }

        if self.cycle_at.is_some_and(|d| d.reached(ctx.now)) {
            release(world, handle, rng);
            self.back_to_search(ctx.now, Some(handle));
            events.push(CaptureEvent::Lost { handle });
            return;
        }

        let Some(binder) = world.pose(self.binder) else {
            self.hovered = Some(hovered);
            events.extend(self.teardown(world, EndReason::Released, rng));
            return;
        };

        // Something else may have turned physics back on since last tick.
        suspend(world, handle);
        hovered.spin = (hovered.spin + self.config.spin_degrees_per_sec * ctx.dt) % 360.0;
        self.place(world, &mut hovered, binder, ctx.dt);
        self.hovered = Some(hovered);

        let Some(sample) = self.gesture.as_mut() else {
            self.gesture = Some(GestureSample::begin(ctx.hand_position, ctx.now));
            return;
        };
        sample.update(ctx.hand_position, ctx.now);

        let classifier = ctx.classifier;
        if sample.exceeds(classifier.config().distance_threshold) {
            self.phase = CapturePhase::Committing;
            self.commit(world, bindings, ctx, rng, events);
        } else if self.config.auto_reset_gesture && sample.timed_out(classifier.config().timeout) {
            debug!("gesture timed out, restarting tracking");
            sample.reset(ctx.hand_position, ctx.now);
            events.push(CaptureEvent::GestureReset);
        }
    }

    fn commit<W, P, R>(
        &mut self,
        world: &mut W,
        bindings: &mut BindingStore<P>,
        ctx: &CaptureContext<'_>,
        rng: &mut R,
        events: &mut Vec<CaptureEvent>,
    ) where
        W: World + ?Sized,
        P: KeyValueStore,
        R: Rng + ?Sized,
    {
        let (Some(hand), Some(sample), Some(hovered)) =
            (self.hand, self.gesture, self.hovered.as_ref())
        else {
            self.phase = CapturePhase::Hovering;
            return;
        };
        let resource_id = hovered.resource_id.clone();

        let direction = ctx.classifier.classify_world(
            sample.displacement(),
            sample.elapsed(),
            hand,
            ctx.observer,
        );

        let committed = if direction == Direction::None {
            debug!("gesture unclassified, nothing bound");
            false
        } else {
            match bindings.assign(hand, direction, &resource_id) {
                Ok(()) => true,
                Err(e) => {
                    warn!("could not bind {resource_id}: {e}");
                    false
                }
            }
        };

        if !committed {
            self.restart_gesture(ctx);
            events.push(CaptureEvent::GestureReset);
            return;
        }

        info!("{hand} hand bound {resource_id} to {direction}");
        events.push(CaptureEvent::Committed {
            hand,
            direction,
            resource_id,
        });

        if self.config.keep_hovering_after_assign {
            self.restart_gesture(ctx);
            if self.config.cycle_after_assign {
                self.cycle_at = Some(Deadline::after(ctx.now, self.config.cycle_delay));
            }
        } else {
            events.extend(self.teardown(world, EndReason::Committed, rng));
            self.cooldowns[hand.index()].trigger(ctx.now);
        }
    }

    fn restart_gesture(&mut self, ctx: &CaptureContext<'_>) {
        self.gesture = Some(GestureSample::begin(ctx.hand_position, ctx.now));
        self.phase = CapturePhase::Hovering;
    }

    fn back_to_search(&mut self, now: f64, exclude: Option<Handle>) {
        self.hovered = None;
        self.gesture = None;
        self.cycle_at = None;
        self.exclude = exclude;
        self.attempts = 0;
        self.next_search = Some(Deadline::at(now));
        self.phase = CapturePhase::Searching;
    }

    /// Move the hovered resource toward its anchor above the binder. The
    /// first placement snaps, later ones ease in.
    fn place<W: World + ?Sized>(&self, world: &mut W, hovered: &mut Hovered, binder: Pose, dt: f64) {
        let target = Pose::new(
            binder.position + Vec3::UP * self.config.hover_height + hovered.offset,
            Quaternion::from_yaw_degrees(hovered.spin),
        );

        let pose = match world.pose(hovered.handle) {
            Some(current) if hovered.snapped => {
                let pt = (self.config.position_lerp_speed.max(MIN_POSITION_LERP) * dt).clamp(0.0, 1.0);
                let rt = (self.config.rotation_lerp_speed.max(MIN_ROTATION_LERP) * dt).clamp(0.0, 1.0);
                Pose::new(
                    current.position.lerp(target.position, pt),
                    current.rotation.slerp(target.rotation, rt),
                )
            }
            _ => target,
        };
        world.set_pose(hovered.handle, pose);
        hovered.snapped = true;
    }
}

fn suspend<W: World + ?Sized>(world: &mut W, handle: Handle) {
    world.set_kinematic(handle, true);
    world.set_velocity(handle, Vec3::ZERO);
    world.set_angular_velocity(handle, Vec3::ZERO);
}

/// Hand physics back with a small random downward-outward nudge.
fn release<W, R>(world: &mut W, handle: Handle, rng: &mut R)
where
    W: World + ?Sized,
    R: Rng + ?Sized,
{
    if !world.is_alive(handle) {
        return;
    }
    let nudge = Vec3::new(
        rng.random_range(-0.2..=0.2),
        rng.random_range(-0.3..=-0.1),
        rng.random_range(-0.2..=0.2),
    );
    world.set_kinematic(handle, false);
    world.set_velocity(handle, nudge);
    debug!("released {handle}");
}
