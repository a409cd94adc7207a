//! Built-in trial generators, outcome models and tool registry
//!
//! This crate provides implementations of the campaign-core collaborator traits:
//!
//! - `TrialGenerator`: sequence-numbered inputs and wordlist walking
//! - `OutcomeModel`: fixed outcomes, Bernoulli draws, lookup-table boosting
//! - `ToolRegistry`: `BuiltinRegistry` with the `flood` and `wordlist` tools
//!
//! Every model here is a simulation. Nothing is sent anywhere.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod generators;
mod models;
mod registry;

pub use generators::{SequenceGenerator, WordlistGenerator};
pub use models::{BernoulliModel, FixedOutcomeModel, LookupBoostModel};
pub use registry::{BuiltinRegistry, DEFAULT_WORDLIST, FLOOD_TOOL, WORDLIST_TOOL};
