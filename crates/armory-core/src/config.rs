use serde::{Deserialize, Serialize};

use crate::binding::BindingConfig;
use crate::capture::CaptureConfig;
use crate::gesture::GestureConfig;
use crate::recall::RecallConfig;

/// Every tunable, grouped by subsystem. Each section defaults on its own so
/// a partial file only overrides what it names.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmoryConfig {
    pub gesture: GestureConfig,
    pub bindings: BindingConfig,
    pub capture: CaptureConfig,
    pub recall: RecallConfig,
}
