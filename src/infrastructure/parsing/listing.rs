//! Listing page rows → contract record seeds

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::dom::{cell_text, resolve_url};
use super::PageExtractor;
use crate::domain::contract::ContractRecord;
use crate::domain::contract_url::ContractUrl;

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table#lists-table").expect("static selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("static selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("static selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.ul-link").expect("static selector"));

/// Extracts one seed per row of the search results table.
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    origin: String,
}

impl ListingExtractor {
    pub fn new(origin: impl Into<String>) -> Self {
        Self { origin: origin.into() }
    }

    fn extract_row(&self, row: &ElementRef<'_>, index: usize) -> Option<ContractRecord> {
        let cols: Vec<ElementRef<'_>> = row.select(&CELL).collect();
        if cols.len() <= 1 {
            // spacer or header-like row
            return None;
        }

        let Some(name_link) = cols[0].select(&LINK).next() else {
            warn!("Skipping listing row {}: no contract link", index);
            return None;
        };
        let Some(url) = name_link
            .value()
            .attr("href")
            .and_then(|href| resolve_url(href, &self.origin))
        else {
            warn!("Skipping listing row {}: unusable contract href", index);
            return None;
        };
        let Some(authority_link) = cols[1].select(&LINK).next() else {
            warn!("Skipping listing row {} ({}): no authority link", index, url);
            return None;
        };

        Some(ContractRecord::new(
            ContractUrl::new(url),
            cell_text(&name_link),
            cell_text(&authority_link),
        ))
    }
}

impl PageExtractor for ListingExtractor {
    type Output = Vec<ContractRecord>;

    fn extract(&self, page: &Html) -> Self::Output {
        let Some(table) = page.select(&TABLE).next() else {
            return Vec::new();
        };

        let records: Vec<ContractRecord> = table
            .select(&ROW)
            .skip(1) // header row
            .enumerate()
            .filter_map(|(index, row)| self.extract_row(&row, index + 1))
            .collect();

        debug!("Extracted {} contracts from listing page", records.len());
        records
    }
}
