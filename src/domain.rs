//! Domain module: contract records and the harvest stages
//!
//! Each module is its own file in the domain/ directory; the commonly used
//! types are re-exported here.

pub mod contract;
pub mod contract_url;
pub mod stage;

pub use contract::{ContractRecord, DetailField};
pub use contract_url::ContractUrl;
pub use stage::HarvestStage;
