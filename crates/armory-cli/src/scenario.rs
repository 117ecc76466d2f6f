//! Scripted capture → bind → recall run against the in-memory world.
//!
//! Timeline, in simulated seconds:
//!
//! ```text
//! 0.0  right hand starts a capture on the binder it holds
//! 0.3  flick right: binds the hovered dagger to right/right
//! 1.0  start casting
//! 1.2  flick right again: recalls the dagger through a portal, hand grabs it
//! 1.5  stop casting: the portal closes
//! end  despawn: everything still alive is torn down
//! ```

use std::time::Duration;

use armory_core::{
    Armory, ArmoryConfig, ArmoryEvent, CaptureEvent, FrameInput, HandSide, Handle, KeyValueStore,
    Pose, Signal, SimWorld, Vec3,
};
use anyhow::{Result, bail};
use rand::SeedableRng;
use rand::rngs::SmallRng;

const CAPTURE_AT: f64 = 0.0;
const BIND_FLICK_AT: f64 = 0.3;
const CAST_AT: f64 = 1.0;
const RECALL_FLICK_AT: f64 = 1.2;
const CAST_END_AT: f64 = 1.5;

/// Sideways travel of a flick (m).
const FLICK: f64 = 0.2;

pub const CATALOG: [&str; 7] = [
    "Rift",
    "SwordShortCommon",
    "DaggerCommon",
    "AxeShortHatchet",
    "ShieldPartisan",
    "SpearFighter",
    "BowRecurve",
];

#[derive(Debug, Default)]
pub struct ScenarioReport {
    pub frames: usize,
    pub bound: Option<String>,
    pub recalled: Vec<String>,
    pub destroyed: usize,
    pub interrupted: bool,
}

pub struct Scenario<P> {
    armory: Armory<P>,
    world: SimWorld,
    rng: SmallRng,
    dt: f64,
    frame: usize,
    binder: Handle,
    base: Vec3,
    report: ScenarioReport,
}

impl<P: KeyValueStore> Scenario<P> {
    pub fn new(config: ArmoryConfig, prefs: P, hz: u32, seed: u64) -> Result<Self> {
        if hz == 0 {
            bail!("tick rate must be positive");
        }
        let mut world = SimWorld::with_catalog(CATALOG);
        let base = Vec3::new(0.0, 1.0, 0.0);
        let binder = world.place("ShadowCrystal", Pose::at(base));
        world.grab(binder, HandSide::Right);
        world.place("DaggerCommon", Pose::at(Vec3::new(1.2, 0.9, 0.3)));

        Ok(Self {
            armory: Armory::new(config, prefs),
            world,
            rng: SmallRng::seed_from_u64(seed),
            dt: 1.0 / f64::from(hz),
            frame: 0,
            binder,
            base,
            report: ScenarioReport::default(),
        })
    }

    /// Frames needed to play the whole timeline at `hz`.
    pub fn min_ticks(hz: u32) -> usize {
        (CAST_END_AT * f64::from(hz)).ceil() as usize + 2
    }

    pub fn now(&self) -> f64 {
        self.frame as f64 * self.dt
    }

    fn crossed(&self, mark: f64) -> bool {
        let now = self.now();
        now >= mark && now - self.dt < mark
    }

    fn hand_position(&self) -> Vec3 {
        let now = self.now();
        let flicked = (BIND_FLICK_AT..CAST_AT).contains(&now) || now >= RECALL_FLICK_AT;
        if flicked {
            self.base + Vec3::new(FLICK, 0.0, 0.0)
        } else {
            self.base
        }
    }

    /// Advance one frame and return what happened.
    pub fn step(&mut self) -> Vec<ArmoryEvent> {
        let mut frame = FrameInput::new(self.now(), self.dt)
            .with_hand(HandSide::Right, Pose::at(self.hand_position()));
        if self.crossed(CAPTURE_AT) {
            frame = frame.with_signal(Signal::CaptureStart {
                binder: self.binder,
                hand: HandSide::Right,
            });
        }
        if self.crossed(CAST_AT) {
            frame = frame.with_signal(Signal::CastStart {
                hand: HandSide::Right,
            });
        }
        if self.crossed(CAST_END_AT) {
            frame = frame.with_signal(Signal::CastStop {
                hand: HandSide::Right,
            });
        }

        let events = self.armory.tick(&mut self.world, &frame, &mut self.rng);
        self.observe(&events);
        self.frame += 1;
        self.report.frames = self.frame;
        events
    }

    /// Hard-cancel everything and persist bindings.
    pub fn finish(&mut self, interrupted: bool) -> Vec<ArmoryEvent> {
        let frame = FrameInput::new(self.now(), self.dt).with_signal(Signal::Despawn);
        let events = self.armory.tick(&mut self.world, &frame, &mut self.rng);
        self.observe(&events);
        self.armory.shutdown(&mut self.world, &mut self.rng);
        self.report.interrupted = interrupted;
        events
    }

    fn observe(&mut self, events: &[ArmoryEvent]) {
        for event in events {
            match event {
                ArmoryEvent::Capture {
                    event: CaptureEvent::Committed { resource_id, .. },
                    ..
                } => self.report.bound = Some(resource_id.clone()),
                ArmoryEvent::Recalled(out) => {
                    self.world.grab(out.item, out.hand);
                    self.report.recalled.push(out.resource_id.clone());
                }
                ArmoryEvent::Cleared { destroyed } => self.report.destroyed += destroyed,
                _ => {}
            }
        }
    }

    pub fn into_report(self) -> ScenarioReport {
        self.report
    }
}

/// Run `ticks` frames paced at `hz`, printing each event. Ctrl-C stops the
/// run early with a despawn.
pub async fn run<P: KeyValueStore>(
    mut scenario: Scenario<P>,
    hz: u32,
    ticks: usize,
) -> Result<ScenarioReport> {
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(hz)));
    let mut interrupted = false;

    for _ in 0..ticks {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, despawning");
                interrupted = true;
                break;
            }
        }
        let now = scenario.now();
        for event in scenario.step() {
            if !matches!(event, ArmoryEvent::PoolsMaintained(_)) {
                println!("[{now:6.3}] {event}");
            }
        }
    }

    let now = scenario.now();
    for event in scenario.finish(interrupted) {
        println!("[{now:6.3}] {event}");
    }
    Ok(scenario.into_report())
}
