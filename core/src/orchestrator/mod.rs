//! Orchestrator for concurrent campaign management
//!
//! The Orchestrator is the process-wide registry of campaigns:
//! - Admission control (policy flag, tool lookup, concurrency ceiling)
//! - Starting executors and tracking them while active
//! - Releasing the admission slot when a campaign terminates
//! - Recording start/stop events in the bounded, persisted history log
//! - Status and statistics queries
//!
//! All registry mutations happen under a single lock that is never held
//! across an await point.
//!
//! # Example
//!
//! ```ignore
//! use campaign_core::{CampaignBounds, CampaignConfig, OrchestratorBuilder, TrialRate};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .max_concurrent(2)
//!     .registry(registry)
//!     .store(store)
//!     .build()?;
//!
//! orchestrator.accept_terms();
//! let handle = orchestrator.start_campaign(
//!     "flood",
//!     CampaignConfig::new(TrialRate::PerSecond(10.0), CampaignBounds::attempts(100)),
//! )?;
//! let summary = orchestrator.wait(handle.campaign_id()).await?;
//! ```

mod aggregator;
mod builder;
mod executor;

pub use aggregator::{aggregate_history, OrchestratorStatistics};
pub use builder::OrchestratorBuilder;
pub use executor::{CampaignHandle, Orchestrator};
