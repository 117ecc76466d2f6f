/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;

/// SLERP near-parallel threshold; above this dot product we NLERP instead
pub const SLERP_THRESHOLD: f64 = 0.9995;

/// An axis dominates only when it beats every other axis by this factor
pub const DOMINANCE_MARGIN: f64 = 1.2;

/// Minimum hand speed (m/s) for a motion to count as a gesture
pub const MIN_GESTURE_SPEED: f64 = 0.3;

/// Displacement (m) a hand must travel before a gesture is classified
pub const GESTURE_DISTANCE_THRESHOLD: f64 = 0.12;

/// Seconds of sub-threshold motion before gesture tracking restarts
pub const GESTURE_TIMEOUT: f64 = 3.0;

/// Minimum interval (s) between two gesture recalls on the same hand
pub const RECALL_DEBOUNCE: f64 = 0.5;

/// Absolute lifetime cap (s) of a capture session
pub const CAPTURE_SESSION_TIMEOUT: f64 = 15.0;

/// Radius (m) around the binder searched for a free weapon
pub const SEARCH_RADIUS: f64 = 2.0;

/// Height (m) above the binder at which a captured weapon hovers
pub const HOVER_HEIGHT: f64 = 0.25;

/// Failed search ticks tolerated before a capture session gives up
pub const MAX_SEARCH_ATTEMPTS: u32 = 40;

/// Portal pool: live cap and lifetime (s)
pub const PORTAL_CAPACITY: usize = 5;
pub const PORTAL_LIFETIME: f64 = 5.0;

/// Spawned item pool: live cap and dropped-item grace period (s)
pub const ITEM_CAPACITY: usize = 10;
pub const ITEM_GRACE: f64 = 5.0;
