//! Bounded step loop with per-round failure context.

use anyhow::Result;
use thiserror::Error;
use tracing::debug;

use crate::limits::Limits;

/// Knobs for a bounded run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Value returned verbatim when the limits run out before completion.
    pub fallback: String,
    /// Precomputed result: when set, the run returns it immediately without
    /// executing any step.
    pub direct_result: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            fallback: "limit reached".to_string(),
            direct_result: None,
        }
    }
}

/// How a bounded run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The step function signalled completion before the limits ran out.
    Completed { steps: u64 },
    /// Either limit ran out first; carries the configured fallback value.
    LimitReached { fallback: String, steps: u64 },
    /// A precomputed result short-circuited the loop.
    Direct { value: String },
}

impl RunOutcome {
    /// The outcome's value: the fallback or direct string, or `"completed"`.
    pub fn value(&self) -> &str {
        match self {
            Self::Completed { .. } => "completed",
            Self::LimitReached { fallback, .. } => fallback,
            Self::Direct { value } => value,
        }
    }

    /// Steps executed before termination (zero for a direct result).
    pub fn steps(&self) -> u64 {
        match self {
            Self::Completed { steps } | Self::LimitReached { steps, .. } => *steps,
            Self::Direct { .. } => 0,
        }
    }
}

/// Context for one round of the loop, attached to step failures.
///
/// `depth_remaining` and `budget_remaining` are the limit values as they
/// stood when the round's step was invoked. Frames nest outermost-first: the
/// round-0 wrapper is the surfaced error, and each `source` is the
/// next-deeper frame or, at the bottom, the step function's own error.
#[derive(Debug, Error)]
#[error("step {step} failed (depth remaining {depth_remaining}, budget remaining {budget_remaining})")]
pub struct StepFrameError {
    pub step: u64,
    pub depth_remaining: i64,
    pub budget_remaining: i64,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

/// Round bookkeeping recorded on the way down, folded into
/// [`StepFrameError`]s only when a step fails.
#[derive(Debug, Clone, Copy)]
struct Frame {
    step: u64,
    depth_remaining: i64,
    budget_remaining: i64,
}

impl Frame {
    fn wrap(self, source: Box<dyn std::error::Error + Send + Sync>) -> StepFrameError {
        StepFrameError {
            step: self.step,
            depth_remaining: self.depth_remaining,
            budget_remaining: self.budget_remaining,
            source,
        }
    }
}

/// Drive `step` until it signals completion or the limits run out.
///
/// `step` receives the number of steps already executed (its first call sees
/// 0) and returns `Ok(true)` to continue or `Ok(false)` when the work is
/// done. Each executed step consumes one unit of depth and one of budget;
/// when either hits zero the run stops with [`RunOutcome::LimitReached`] and
/// the configured fallback value.
///
/// Limits are validated before anything else, including the `direct_result`
/// shortcut. A step failure is surfaced wrapped in one [`StepFrameError`]
/// per executed round, outermost round first, so the error reads like the
/// unwinding of a recursive descent; [`frame_trail`] recovers the rounds.
pub fn run_bounded<F>(limits: Limits, config: &RunConfig, mut step: F) -> Result<RunOutcome>
where
    F: FnMut(u64) -> Result<bool>,
{
    limits.validate()?;

    if let Some(value) = &config.direct_result {
        debug!("returning precomputed result without stepping");
        return Ok(RunOutcome::Direct {
            value: value.clone(),
        });
    }

    let mut remaining = limits;
    let mut frames: Vec<Frame> = Vec::new();
    let mut steps = 0u64;
    loop {
        if remaining.exhausted() {
            debug!(steps, fallback = %config.fallback, "limits exhausted");
            return Ok(RunOutcome::LimitReached {
                fallback: config.fallback.clone(),
                steps,
            });
        }

        frames.push(Frame {
            step: steps,
            depth_remaining: remaining.depth,
            budget_remaining: remaining.budget,
        });

        match step(steps) {
            Ok(true) => {
                steps += 1;
                remaining = remaining.after_step();
            }
            Ok(false) => {
                debug!(steps, "step loop completed");
                return Ok(RunOutcome::Completed { steps });
            }
            Err(err) => return Err(wrap_frames(&frames, err)),
        }
    }
}

/// Wrap `err` in one [`StepFrameError`] per recorded round, deepest round
/// innermost. `frames` is never empty here: a frame is pushed before every
/// step invocation and only step invocations fail.
fn wrap_frames(frames: &[Frame], err: anyhow::Error) -> anyhow::Error {
    let Some((outermost, inner)) = frames.split_first() else {
        return err;
    };
    let mut chain: Box<dyn std::error::Error + Send + Sync> = err.into();
    for frame in inner.iter().rev() {
        chain = Box::new(frame.wrap(chain));
    }
    anyhow::Error::new(outermost.wrap(chain))
}

/// Collect every [`StepFrameError`] in `err`'s cause chain, outermost first.
pub fn frame_trail(err: &anyhow::Error) -> Vec<&StepFrameError> {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<StepFrameError>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::InvalidLimitsError;
    use anyhow::anyhow;

    #[test]
    fn exhaustion_returns_fallback_and_min_steps() {
        let mut calls = 0u64;
        let outcome = run_bounded(Limits::new(3, 5), &RunConfig::default(), |_| {
            calls += 1;
            Ok(true)
        })
        .expect("run");

        assert_eq!(
            outcome,
            RunOutcome::LimitReached {
                fallback: "limit reached".to_string(),
                steps: 3,
            }
        );
        assert_eq!(outcome.value(), "limit reached");
        assert_eq!(calls, 3);
    }

    #[test]
    fn zero_limits_stop_before_the_first_step() {
        let mut calls = 0u64;
        let outcome = run_bounded(Limits::new(0, 10), &RunConfig::default(), |_| {
            calls += 1;
            Ok(true)
        })
        .expect("run");
        assert_eq!(outcome.steps(), 0);
        assert_eq!(calls, 0);

        let outcome =
            run_bounded(Limits::new(10, 0), &RunConfig::default(), |_| Ok(true)).expect("run");
        assert_eq!(outcome.steps(), 0);
    }

    #[test]
    fn completion_counts_only_continuing_steps() {
        let target = 4u64;
        let mut calls = 0u64;
        let outcome = run_bounded(Limits::new(10, 10), &RunConfig::default(), |step| {
            calls += 1;
            Ok(step < target)
        })
        .expect("run");

        assert_eq!(outcome, RunOutcome::Completed { steps: target });
        assert_eq!(outcome.value(), "completed");
        assert_eq!(calls, target + 1);
    }

    #[test]
    fn completion_on_the_first_invocation_counts_zero_steps() {
        let outcome =
            run_bounded(Limits::new(5, 5), &RunConfig::default(), |_| Ok(false)).expect("run");
        assert_eq!(outcome, RunOutcome::Completed { steps: 0 });
    }

    #[test]
    fn custom_fallback_is_returned_verbatim() {
        let config = RunConfig {
            fallback: "out of fuel".to_string(),
            ..RunConfig::default()
        };
        let outcome = run_bounded(Limits::new(2, 2), &config, |_| Ok(true)).expect("run");
        assert_eq!(
            outcome,
            RunOutcome::LimitReached {
                fallback: "out of fuel".to_string(),
                steps: 2,
            }
        );
    }

    #[test]
    fn direct_result_skips_the_step_function() {
        let config = RunConfig {
            direct_result: Some("precomputed".to_string()),
            ..RunConfig::default()
        };
        let mut calls = 0u64;
        let outcome = run_bounded(Limits::new(5, 5), &config, |_| {
            calls += 1;
            Err(anyhow!("must not run"))
        })
        .expect("run");

        assert_eq!(
            outcome,
            RunOutcome::Direct {
                value: "precomputed".to_string(),
            }
        );
        assert_eq!(outcome.steps(), 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn negative_limits_fail_before_the_direct_shortcut() {
        let config = RunConfig {
            direct_result: Some("precomputed".to_string()),
            ..RunConfig::default()
        };
        let err = run_bounded(Limits::new(-1, 0), &config, |_| Ok(true)).expect_err("invalid");
        let invalid = err
            .downcast_ref::<InvalidLimitsError>()
            .expect("invalid limits error");
        assert_eq!(invalid.depth, -1);
        assert_eq!(invalid.budget, 0);

        assert!(run_bounded(Limits::new(0, -1), &config, |_| Ok(true)).is_err());
        assert!(run_bounded(Limits::new(-5, -5), &config, |_| Ok(true)).is_err());
    }

    #[test]
    fn step_failure_is_wrapped_once_per_round() {
        let err = run_bounded(Limits::new(3, 3), &RunConfig::default(), |step| {
            if step < 1 {
                Ok(true)
            } else {
                Err(anyhow!("boom at step {step}"))
            }
        })
        .expect_err("failure");

        let trail = frame_trail(&err);
        assert_eq!(trail.len(), 2);
        assert_eq!(
            (
                trail[0].step,
                trail[0].depth_remaining,
                trail[0].budget_remaining
            ),
            (0, 3, 3)
        );
        assert_eq!(
            (
                trail[1].step,
                trail[1].depth_remaining,
                trail[1].budget_remaining
            ),
            (1, 2, 2)
        );
        assert_eq!(err.root_cause().to_string(), "boom at step 1");
    }

    #[test]
    fn failure_on_the_first_step_has_a_single_frame() {
        let err = run_bounded(Limits::new(4, 4), &RunConfig::default(), |_| {
            Err(anyhow!("immediate"))
        })
        .expect_err("failure");

        let trail = frame_trail(&err);
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].step, 0);
        assert_eq!(trail[0].depth_remaining, 4);
        assert_eq!(trail[0].budget_remaining, 4);
        assert_eq!(err.root_cause().to_string(), "immediate");
    }

    #[test]
    fn frame_display_names_step_and_remaining_limits() {
        let err = run_bounded(Limits::new(2, 7), &RunConfig::default(), |_| {
            Err(anyhow!("nope"))
        })
        .expect_err("failure");
        assert_eq!(
            err.to_string(),
            "step 0 failed (depth remaining 2, budget remaining 7)"
        );
    }
}
