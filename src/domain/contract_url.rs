use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical contract detail URL, the identity of a contract across all stages.
///
/// The documents and announcements sub-pages live under the same path with a
/// different segment, so they are derived from it by substitution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractUrl(String);

impl ContractUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Replace the `from` path segment with `to`, e.g. `/detail/` → `/dokumenty/`.
    ///
    /// Only the first occurrence is replaced; a URL without the segment is
    /// returned unchanged.
    pub fn sub_page(&self, from: &str, to: &str) -> String {
        self.0.replacen(from, to, 1)
    }
}

impl From<ContractUrl> for String {
    fn from(url: ContractUrl) -> Self {
        url.0
    }
}

impl AsRef<str> for ContractUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
