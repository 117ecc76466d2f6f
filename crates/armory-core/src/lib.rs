//! Gesture weapon-binding armory.
//!
//! Binds world resources to six hand-gesture directions per hand and
//! recalls them with a matching gesture. A capture session hovers a nearby
//! resource above a binder until the hand gestures a direction; recall
//! resolves the direction through layered bindings and spawns the result
//! into capped, self-expiring pools.
//!
//! Zero I/O: the host world, its catalog and its preference storage are
//! injected through traits.

pub mod armory;
pub mod binding;
pub mod capture;
pub mod config;
pub mod constants;
pub mod direction;
pub mod error;
pub mod gesture;
pub mod pool;
pub mod quaternion;
pub mod recall;
pub mod sim;
pub mod timer;
pub mod vector;
pub mod world;

pub use armory::{Armory, ArmoryEvent, FrameInput, HandInput, Signal};
pub use binding::{
    BindingConfig, BindingSnapshot, BindingSource, BindingStore, KeyValueStore, MemoryPrefs,
    SNAPSHOT_VERSION, TableRow, default_resource, hand_key, legacy_key,
};
pub use capture::{CaptureConfig, CaptureEvent, CapturePhase, CaptureSession, EndReason};
pub use config::ArmoryConfig;
pub use constants::{EPSILON, GESTURE_DISTANCE_THRESHOLD, MIN_GESTURE_SPEED, SLERP_THRESHOLD};
pub use direction::{Direction, HandSide};
pub use error::{BindingError, CaptureError, PersistenceError, PoolError, RecallError};
pub use gesture::{GestureClassifier, GestureConfig, GestureSample, GestureScore};
pub use pool::{PoolConfig, PoolKind, PooledInstance, ResourcePool};
pub use quaternion::{Pose, Quaternion};
pub use recall::{RecallConfig, RecallController, RecallOutcome};
pub use sim::SimWorld;
pub use vector::Vec3;
pub use world::{Catalog, Descriptor, Handle, Physics, Spawner, World};
