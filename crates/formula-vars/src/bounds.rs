use serde::{Deserialize, Serialize};

pub const DEFAULT_LOWER_BOUND: f64 = -1e26;
pub const DEFAULT_UPPER_BOUND: f64 = 1e26;

/// Tolerance below the lower bound that still snaps to the lower bound on assignment.
pub const CLAMP_EPSILON: f64 = 1e-50;

/// Inset from both bounds used by [`Bounds::check`].
pub const CHECKED_EPSILON: f64 = 1e-30;

/// Closed numeric domain of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            lower: DEFAULT_LOWER_BOUND,
            upper: DEFAULT_UPPER_BOUND,
        }
    }
}

impl Bounds {
    #[must_use]
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Clamp `value` into the domain.
    ///
    /// Values below the domain (or within [`CLAMP_EPSILON`] of its lower edge) snap to `lower`,
    /// anything above `upper` snaps to `upper`. NaN passes through untouched.
    #[must_use]
    pub fn clamp(self, value: f64) -> f64 {
        if value < self.lower || value > self.upper {
            if value <= self.lower + CLAMP_EPSILON {
                self.lower
            } else {
                self.upper
            }
        } else {
            value
        }
    }

    /// Validate `value` against the domain shrunk by [`CHECKED_EPSILON`] on both sides.
    ///
    /// Returns `Ok(value)` when it lies inside the shrunk domain and `Err(edge)` with the
    /// nearest edge of the shrunk domain otherwise.
    pub fn check(self, value: f64) -> Result<f64, f64> {
        let lower = self.lower + CHECKED_EPSILON;
        let upper = self.upper - CHECKED_EPSILON;
        if value < lower {
            Err(lower)
        } else if value > upper {
            Err(upper)
        } else {
            Ok(value)
        }
    }
}
