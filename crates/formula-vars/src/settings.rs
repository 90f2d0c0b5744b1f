use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;

/// Engine-wide evaluation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalSettings {
    /// Memoize dependent variables for the duration of a pass.
    ///
    /// When enabled, a dependent variable evaluates its formula at most once between a pre-mark
    /// and the matching post-mark. Callers must bracket every pass for results to stay fresh.
    pub pass_caching: bool,
    /// Domain given to new variables and restored by `clear_constraints`.
    pub default_bounds: Bounds,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            pass_caching: false,
            default_bounds: Bounds::default(),
        }
    }
}
