//! Bounded execution primitives: a step loop under dual limits and a
//! memoizing lookup over a caller-supplied store.
//!
//! The crate is pure logic with no I/O:
//!
//! - **[`limits`]**: The depth/budget limit pair, its validation and its
//!   per-step countdown.
//! - **[`run`]**: The step loop, its outcomes, and the per-round frame
//!   errors a failing step is wrapped in.
//! - **[`cache`]**: [`cache::get_or_compute`] over the [`cache::Store`]
//!   capability.

pub mod cache;
pub mod limits;
pub mod run;
