//! HTML extraction for the four page kinds
//!
//! Every extractor is a pure function of an already parsed page, so running
//! it twice over the same document gives the same result.

pub mod announcements;
pub mod detail;
pub mod documents;
pub mod dom;
pub mod listing;

pub use announcements::AnnouncementsExtractor;
pub use detail::{DetailExtractor, DetailTable};
pub use documents::DocumentsExtractor;
pub use listing::ListingExtractor;

use scraper::Html;

/// Typed extraction from a parsed page
pub trait PageExtractor {
    type Output;

    fn extract(&self, page: &Html) -> Self::Output;
}
