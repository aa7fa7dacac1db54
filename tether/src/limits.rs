//! Depth/budget limit pair consumed by the step loop.

use thiserror::Error;

/// Hard limits for a bounded run: remaining recursion depth and step budget.
///
/// Both axes count down together, one unit per executed step. Zero (or below)
/// on either axis means no further step may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub depth: i64,
    pub budget: i64,
}

/// Rejection of a limit pair containing a negative value.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("limits must be non-negative (depth {depth}, budget {budget})")]
pub struct InvalidLimitsError {
    pub depth: i64,
    pub budget: i64,
}

impl Limits {
    pub fn new(depth: i64, budget: i64) -> Self {
        Self { depth, budget }
    }

    /// Reject negative limits. Zero is valid: it means "no steps allowed",
    /// not a configuration mistake.
    pub fn validate(&self) -> Result<(), InvalidLimitsError> {
        if self.depth < 0 || self.budget < 0 {
            return Err(InvalidLimitsError {
                depth: self.depth,
                budget: self.budget,
            });
        }
        Ok(())
    }

    /// True when either axis is used up.
    pub fn exhausted(&self) -> bool {
        self.depth <= 0 || self.budget <= 0
    }

    /// Limits after one executed step: both axes decremented.
    pub fn after_step(&self) -> Self {
        Self {
            depth: self.depth - 1,
            budget: self.budget - 1,
        }
    }
}
