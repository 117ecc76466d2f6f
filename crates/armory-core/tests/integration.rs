//! End-to-end tests driving the armory frame by frame against the
//! in-memory world: capture → bind → recall, pool caps, hard cancels.

use armory_core::{
    Armory, ArmoryConfig, ArmoryEvent, CaptureEvent, CapturePhase, Direction, EndReason,
    FrameInput, HandSide, Handle, MemoryPrefs, Pose, Signal, SimWorld, Spawner, Vec3,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;

const DT: f64 = 1.0 / 60.0;

fn rng() -> SmallRng {
    SmallRng::seed_from_u64(42)
}

fn world() -> SimWorld {
    SimWorld::with_catalog([
        "Rift",
        "SwordShortCommon",
        "DaggerCommon",
        "AxeShortHatchet",
        "ShieldPartisan",
        "SpearFighter",
        "BowRecurve",
    ])
}

fn right_hand(now: f64, position: Vec3) -> FrameInput {
    FrameInput::new(now, DT).with_hand(HandSide::Right, Pose::at(position))
}

fn recalled(events: &[ArmoryEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ArmoryEvent::Recalled(out) => Some(out.resource_id.clone()),
            _ => None,
        })
        .collect()
}

/// Capture a dagger with a rightward flick, then recall it with the same flick.
#[test]
fn capture_then_recall_end_to_end() {
    let mut world = world();
    let mut rng = rng();
    // Make sure the recalled item is the bound one, not the default.
    world.unregister("ShieldPartisan");

    let hand = Vec3::new(0.0, 1.0, 0.0);
    let binder = world.place("ShadowCrystal", Pose::at(hand));
    world.grab(binder, HandSide::Right);
    let dagger = world.place("DaggerCommon", Pose::at(Vec3::new(1.2, 0.9, 0.3)));

    let mut armory = Armory::new(ArmoryConfig::default(), MemoryPrefs::new());

    // Frame 0: alternate use on the binder starts the search, which finds
    // the dagger on the same frame.
    let events = armory.tick(
        &mut world,
        &right_hand(0.0, hand).with_signal(Signal::CaptureStart {
            binder,
            hand: HandSide::Right,
        }),
        &mut rng,
    );
    assert!(events.contains(&ArmoryEvent::Capture {
        binder,
        event: CaptureEvent::Started {
            hand: HandSide::Right
        },
    }));
    assert!(events.contains(&ArmoryEvent::Capture {
        binder,
        event: CaptureEvent::Found {
            handle: dagger,
            resource_id: "DaggerCommon".to_string(),
        },
    }));
    assert!(world.object(dagger).unwrap().kinematic);

    // Hover for a few frames, hand still.
    let mut now = 0.0;
    for _ in 0..5 {
        now += DT;
        armory.tick(&mut world, &right_hand(now, hand), &mut rng);
        let obj = world.object(dagger).unwrap();
        assert!(obj.kinematic);
        assert_eq!(obj.velocity, Vec3::ZERO);
    }
    assert_eq!(
        armory.session(binder).map(|s| s.phase()),
        Some(CapturePhase::Hovering)
    );

    // Flick 0.2 m to the right over 0.1 s.
    now += 0.1;
    let events = armory.tick(
        &mut world,
        &right_hand(now, hand + Vec3::new(0.2, 0.0, 0.0)),
        &mut rng,
    );
    assert!(events.contains(&ArmoryEvent::Capture {
        binder,
        event: CaptureEvent::Committed {
            hand: HandSide::Right,
            direction: Direction::Right,
            resource_id: "DaggerCommon".to_string(),
        },
    }));
    assert!(events.contains(&ArmoryEvent::Capture {
        binder,
        event: CaptureEvent::Ended {
            reason: EndReason::Committed
        },
    }));
    assert!(!world.object(dagger).unwrap().kinematic);
    assert_eq!(
        armory.bindings().resolve(HandSide::Right, Direction::Right),
        Some("DaggerCommon")
    );

    // Cast, then flick right again.
    now += 1.0;
    armory.tick(
        &mut world,
        &right_hand(now, hand).with_signal(Signal::CastStart {
            hand: HandSide::Right,
        }),
        &mut rng,
    );
    now += 0.1;
    let events = armory.tick(
        &mut world,
        &right_hand(now, hand + Vec3::new(0.2, 0.0, 0.0)),
        &mut rng,
    );
    assert_eq!(recalled(&events), vec!["DaggerCommon"]);
    assert_eq!(world.count_of("DaggerCommon"), 2);
    assert_eq!(armory.recall().portals().len(), 1);
}

#[test]
fn bindings_survive_restart() {
    let mut world = world();
    let mut rng = rng();
    let mut armory = Armory::new(ArmoryConfig::default(), MemoryPrefs::new());
    armory
        .bindings_mut()
        .assign(HandSide::Left, Direction::Forward, "BowRecurve")
        .unwrap();
    armory.shutdown(&mut world, &mut rng);

    let mut armory = Armory::new(ArmoryConfig::default(), armory.into_prefs());
    let events = armory.tick(
        &mut world,
        &FrameInput::new(0.0, DT)
            .with_hand(HandSide::Left, Pose::default())
            .with_signal(Signal::Recall {
                hand: HandSide::Left,
                direction: Direction::Forward,
            }),
        &mut rng,
    );
    assert_eq!(recalled(&events), vec!["BowRecurve"]);
}

#[test]
fn portal_pool_stays_capped() {
    let mut world = world();
    let mut rng = rng();
    let mut armory = Armory::new(ArmoryConfig::default(), MemoryPrefs::new());

    let mut first_portal: Option<Handle> = None;
    for i in 0..6 {
        let events = armory.tick(
            &mut world,
            &right_hand(i as f64 * 0.1, Vec3::ZERO).with_signal(Signal::Recall {
                hand: HandSide::Right,
                direction: Direction::Up,
            }),
            &mut rng,
        );
        if let Some(ArmoryEvent::Recalled(out)) = events.iter().find(|e| matches!(e, ArmoryEvent::Recalled(_))) {
            first_portal = first_portal.or(out.portal);
        }
    }
    assert_eq!(armory.recall().portals().len(), 5);
    assert_eq!(world.count_of("Rift"), 5);
    assert!(!world.is_alive(first_portal.unwrap()));
    assert_eq!(armory.recall().items().len(), 6);
}

#[test]
fn portals_expire_on_a_later_tick() {
    let mut world = world();
    let mut rng = rng();
    let mut armory = Armory::new(ArmoryConfig::default(), MemoryPrefs::new());
    armory.tick(
        &mut world,
        &right_hand(1.0, Vec3::ZERO).with_signal(Signal::Recall {
            hand: HandSide::Right,
            direction: Direction::Down,
        }),
        &mut rng,
    );
    armory.tick(&mut world, &right_hand(5.5, Vec3::ZERO), &mut rng);
    assert_eq!(world.count_of("Rift"), 1);
    armory.tick(&mut world, &right_hand(6.0, Vec3::ZERO), &mut rng);
    assert_eq!(world.count_of("Rift"), 0);
    // never-held item stays
    assert_eq!(world.count_of("DaggerCommon"), 1);
}

#[test]
fn held_items_overflow_the_cap() {
    let mut world = world();
    let mut rng = rng();
    let mut armory = Armory::new(ArmoryConfig::default(), MemoryPrefs::new());
    for i in 0..11 {
        let events = armory.tick(
            &mut world,
            &right_hand(i as f64, Vec3::ZERO).with_signal(Signal::Recall {
                hand: HandSide::Right,
                direction: Direction::Left,
            }),
            &mut rng,
        );
        for e in &events {
            if let ArmoryEvent::Recalled(out) = e {
                world.grab(out.item, HandSide::Right);
            }
        }
    }
    assert_eq!(armory.recall().items().len(), 11);
    assert_eq!(world.count_of("AxeShortHatchet"), 11);
}

#[test]
fn despawn_is_a_hard_cancel() {
    let mut world = world();
    let mut rng = rng();
    let binder = world.place("ShadowCrystal", Pose::default());
    world.grab(binder, HandSide::Right);
    let sword = world.place("SwordShortCommon", Pose::at(Vec3::new(0.3, 0.0, 0.0)));
    let mut armory = Armory::new(ArmoryConfig::default(), MemoryPrefs::new());

    armory.tick(
        &mut world,
        &right_hand(0.0, Vec3::ZERO)
            .with_signal(Signal::CaptureStart {
                binder,
                hand: HandSide::Right,
            })
            .with_signal(Signal::Recall {
                hand: HandSide::Right,
                direction: Direction::Backward,
            }),
        &mut rng,
    );
    assert_eq!(armory.active_sessions(), 1);

    let events = armory.tick(
        &mut world,
        &right_hand(0.1, Vec3::ZERO).with_signal(Signal::Despawn),
        &mut rng,
    );
    assert!(events.contains(&ArmoryEvent::Cleared { destroyed: 2 }));
    assert!(!events.contains(&ArmoryEvent::BindingsReloaded));
    assert_eq!(armory.active_sessions(), 0);
    assert_eq!(world.object(sword).unwrap().restores, 1);
    assert!(armory.recall().items().is_empty());
}
