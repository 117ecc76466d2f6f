//! Bindings written through the SQLite store survive closing and reopening
//! the database file.

use armory_core::{
    Armory, ArmoryConfig, BindingConfig, BindingSource, BindingStore, Direction, HandSide,
    KeyValueStore, SimWorld, legacy_key,
};
use armory_store::{PrefsStore, load_config};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tempfile::TempDir;

#[test]
fn assign_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let prefs = PrefsStore::open_in_dir(dir.path()).unwrap();
        let mut bindings = BindingStore::load(prefs, BindingConfig::default());
        bindings
            .assign(HandSide::Left, Direction::Up, "SpearFighter")
            .unwrap();
        bindings
            .assign(HandSide::Right, Direction::Down, "BowRecurve")
            .unwrap();
    }

    let prefs = PrefsStore::open_in_dir(dir.path()).unwrap();
    let bindings = BindingStore::load(prefs, BindingConfig::default());
    assert_eq!(
        bindings.resolve(HandSide::Left, Direction::Up),
        Some("SpearFighter")
    );
    assert_eq!(
        bindings.resolve(HandSide::Right, Direction::Down),
        Some("BowRecurve")
    );
    assert_eq!(
        bindings.resolve(HandSide::Left, Direction::Down),
        Some("DaggerCommon")
    );
}

#[test]
fn legacy_key_is_read_for_the_right_hand() {
    let dir = TempDir::new().unwrap();
    {
        let mut prefs = PrefsStore::open_in_dir(dir.path()).unwrap();
        prefs.set(&legacy_key(Direction::Forward), "Halberd");
        prefs.flush().unwrap();
    }

    let prefs = PrefsStore::open_in_dir(dir.path()).unwrap();
    let bindings = BindingStore::load(prefs, BindingConfig::default());
    assert_eq!(
        bindings.resolve_with_source(HandSide::Right, Direction::Forward),
        Some(("Halberd", BindingSource::Legacy))
    );
    assert_eq!(
        bindings.resolve(HandSide::Left, Direction::Forward),
        Some("SpearFighter")
    );
}

#[test]
fn armory_shutdown_saves_to_disk() {
    let dir = TempDir::new().unwrap();
    let config = load_config(dir.path()).unwrap();
    let mut world = SimWorld::new();
    let mut rng = SmallRng::seed_from_u64(42);

    let prefs = PrefsStore::open_in_dir(dir.path()).unwrap();
    let mut armory = Armory::new(config.clone(), prefs);
    armory
        .bindings_mut()
        .assign(HandSide::Right, Direction::Backward, "AxeShortHatchet")
        .unwrap();
    armory.shutdown(&mut world, &mut rng);
    drop(armory);

    let prefs = PrefsStore::open_in_dir(dir.path()).unwrap();
    assert!(
        prefs
            .get_string(&armory_core::hand_key(HandSide::Right, Direction::Backward))
            .unwrap()
            .is_some()
    );
    let armory = Armory::new(ArmoryConfig::default(), prefs);
    assert_eq!(
        armory.bindings().resolve(HandSide::Right, Direction::Backward),
        Some("AxeShortHatchet")
    );
}
