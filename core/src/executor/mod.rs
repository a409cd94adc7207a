//! Campaign executor: runs one campaign's trial loop
//!
//! The executor is the leaf execution unit, responsible for the loop:
//! **generate -> wait -> classify -> record -> report -> repeat**.
//!
//! Each started executor is one tokio task that:
//!
//! 1. Checks tool prerequisites (failing fast to `Failed` without a loop)
//! 2. Generates the next trial input from a `TrialGenerator`
//! 3. Waits the rate-derived delay, racing cancellation and the deadline
//! 4. Samples an outcome from the `OutcomeModel`, bounded by a timeout
//! 5. Records the trial, updates counters, and reports progress
//! 6. Repeats until cancelled, a bound fires, a terminal success occurs, or
//!    the error threshold is exceeded
//!
//! # Example
//!
//! ```ignore
//! use campaign_core::executor::ExecutorBuilder;
//!
//! let handle = ExecutorBuilder::new("flood-1")
//!     .config(config)
//!     .generator(generator)
//!     .model(model)
//!     .start()?;
//!
//! let summary = handle.wait().await;
//! println!("{}: {} attempts", summary.status, summary.counts.attempts);
//! ```

mod builder;
mod handle;
mod rate_limiter;
mod runner;
mod stats;

pub use builder::ExecutorBuilder;
pub use handle::ExecutorHandle;
pub use rate_limiter::TrialRateLimiter;
pub use runner::CampaignExecutor;
pub use stats::CampaignState;
