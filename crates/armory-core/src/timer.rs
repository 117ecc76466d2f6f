//! Explicit time checks, polled once per tick.
//!
//! All times are game-clock seconds supplied by the caller.

/// A point in time that something waits for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Deadline {
    at: f64,
}

impl Deadline {
    pub fn at(at: f64) -> Self {
        Self { at }
    }

    pub fn after(now: f64, secs: f64) -> Self {
        Self { at: now + secs }
    }

    pub fn when(&self) -> f64 {
        self.at
    }

    pub fn reached(&self, now: f64) -> bool {
        now >= self.at
    }

    pub fn remaining(&self, now: f64) -> f64 {
        (self.at - now).max(0.0)
    }
}

/// Rate limiter: once triggered, not ready again for `duration` seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cooldown {
    duration: f64,
    ready_at: Option<f64>,
}

impl Cooldown {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            ready_at: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn trigger(&mut self, now: f64) {
        self.ready_at = Some(now + self.duration);
    }

    pub fn ready(&self, now: f64) -> bool {
        self.ready_at.is_none_or(|t| now >= t)
    }

    pub fn remaining(&self, now: f64) -> f64 {
        self.ready_at.map_or(0.0, |t| (t - now).max(0.0))
    }

    pub fn clear(&mut self) {
        self.ready_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline() {
        let d = Deadline::after(10.0, 15.0);
        assert!(!d.reached(24.9));
        assert!(d.reached(25.0));
        assert_eq!(d.remaining(20.0), 5.0);
        assert_eq!(d.remaining(30.0), 0.0);
    }

    #[test]
    fn test_cooldown_starts_ready() {
        let c = Cooldown::new(0.5);
        assert!(c.ready(0.0));
        assert_eq!(c.remaining(0.0), 0.0);
    }

    #[test]
    fn test_cooldown_cycle() {
        let mut c = Cooldown::new(0.5);
        c.trigger(1.0);
        assert!(!c.ready(1.25));
        assert!((c.remaining(1.25) - 0.25).abs() < 1e-12);
        assert!(c.ready(1.5));
        c.trigger(2.0);
        c.clear();
        assert!(c.ready(2.0));
    }
}
