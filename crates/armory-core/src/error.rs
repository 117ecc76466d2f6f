use std::fmt;

use crate::direction::{Direction, HandSide};

/// Failure reported by a persistence collaborator. Never fatal: callers log
/// it and fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceError(pub String);

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "persistence error: {}", self.0)
    }
}

impl std::error::Error for PersistenceError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    UnbindableDirection(Direction),
    EmptyResource,
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingError::UnbindableDirection(d) => write!(f, "direction '{d}' cannot be bound"),
            BindingError::EmptyResource => write!(f, "resource id is empty"),
        }
    }
}

impl std::error::Error for BindingError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    FactoryFailed(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::FactoryFailed(id) => write!(f, "factory failed to spawn '{id}'"),
        }
    }
}

impl std::error::Error for PoolError {}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// The binder is not in the requesting hand.
    NotHeld(HandSide),
    /// The hand finished a capture moments ago.
    CoolingDown { hand: HandSide, remaining: f64 },
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NotHeld(hand) => write!(f, "binder is not held by the {hand} hand"),
            CaptureError::CoolingDown { hand, remaining } => {
                write!(f, "{hand} hand cooling down for {remaining:.2}s")
            }
        }
    }
}

impl std::error::Error for CaptureError {}

#[derive(Debug, Clone, PartialEq)]
pub enum RecallError {
    /// Neither the bound resource nor the direction default exists in the catalog.
    NotFound(String),
    /// The catalog knows the resource but the factory produced nothing.
    SpawnFailed(String),
    /// The direction cannot be recalled (`None`).
    NoDirection,
    CoolingDown { hand: HandSide, remaining: f64 },
}

impl fmt::Display for RecallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecallError::NotFound(id) => write!(f, "resource '{id}' not found in catalog"),
            RecallError::SpawnFailed(id) => write!(f, "failed to spawn '{id}'"),
            RecallError::NoDirection => write!(f, "no direction to recall"),
            RecallError::CoolingDown { hand, remaining } => {
                write!(f, "{hand} hand recall debounced for {remaining:.2}s")
            }
        }
    }
}

impl std::error::Error for RecallError {}

impl From<PoolError> for RecallError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::FactoryFailed(id) => RecallError::SpawnFailed(id),
        }
    }
}
