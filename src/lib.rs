//! Contract Harvester - procurement contract harvesting library
//!
//! Walks the paginated contract search of the public procurement portal and
//! enriches every contract with its detail, documents and announcements
//! pages. The remote side is slow and rate sensitive, so every fetch is
//! retried with a linear backoff and every stage issues its requests at a
//! fixed pace.

pub mod application;
pub mod domain;
pub mod infrastructure;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use application::{Harvest, HarvestError, HarvestReport, HarvestService};
pub use domain::{ContractRecord, ContractUrl, DetailField, HarvestStage};
pub use infrastructure::{HarvesterConfig, LoggingHandle};
