//! Application layer
//!
//! Page discovery, the generic stage runner and the harvest pipeline built on
//! top of them.

pub mod harvest_service;
pub mod page_discovery_service;
pub mod stage_runner;

pub use harvest_service::{Harvest, HarvestError, HarvestReport, HarvestService, ListingPage};
pub use page_discovery_service::{DiscoveryError, PageDiscoveryService};
pub use stage_runner::{StageError, StageOperation, StageRunner, StageSummary, StageTicket};
