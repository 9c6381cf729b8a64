use serde::{Deserialize, Serialize};
use std::fmt;

/// One full pass over the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarvestStage {
    Listing,
    Details,
    Documents,
    Announcements,
}

impl HarvestStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Details => "details",
            Self::Documents => "documents",
            Self::Announcements => "announcements",
        }
    }
}

impl fmt::Display for HarvestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
