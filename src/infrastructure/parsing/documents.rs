//! Documents sub-page → document descriptors
//!
//! Column order and presence differ between contracts, so cells are looked up
//! through the header labels rather than by position.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use tracing::warn;

use super::dom::cell_text;
use super::PageExtractor;

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table#lists-table").expect("static selector"));
static HEADER_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("thead th").expect("static selector"));
static BODY_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").expect("static selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("static selector"));

pub const KIND_COLUMN: &str = "Druh dokumentu";
pub const NAME_COLUMN: &str = "Názov dokumentu";
pub const PUBLISHED_COLUMN: &str = "Zverejnenie";
pub const REVISED_COLUMN: &str = "Úprava";

/// `"<kind> - <name> - <published>"`, plus `" (<revised>)"` when the table has that column.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentsExtractor;

impl DocumentsExtractor {
    fn describe(columns: &HashMap<String, usize>, cells: &[ElementRef<'_>]) -> Option<String> {
        let text = |label: &str| columns.get(label).and_then(|&i| cells.get(i)).map(cell_text);

        let mut descriptor = format!(
            "{} - {} - {}",
            text(KIND_COLUMN)?,
            text(NAME_COLUMN)?,
            text(PUBLISHED_COLUMN)?
        );
        if let Some(revised) = text(REVISED_COLUMN) {
            descriptor.push_str(&format!(" ({revised})"));
        }
        Some(descriptor)
    }
}

impl PageExtractor for DocumentsExtractor {
    type Output = Vec<String>;

    fn extract(&self, page: &Html) -> Self::Output {
        let Some(table) = page.select(&TABLE).next() else {
            return Vec::new();
        };

        let columns: HashMap<String, usize> = table
            .select(&HEADER_CELL)
            .enumerate()
            .map(|(index, th)| (cell_text(&th), index))
            .collect();
        if columns.is_empty() {
            warn!("Documents table has no header row");
            return Vec::new();
        }

        let mut documents = Vec::new();
        for (index, row) in table.select(&BODY_ROW).enumerate() {
            let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
            if cells.len() != columns.len() {
                // "no records" row or a differently shaped row
                continue;
            }
            match Self::describe(&columns, &cells) {
                Some(descriptor) => documents.push(descriptor),
                None => warn!("Skipping document row {}: required column missing", index + 1),
            }
        }
        documents
    }
}
