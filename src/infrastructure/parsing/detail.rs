//! Contract detail page → labelled detail fields
//!
//! The page carries two `table.table-info` tables with identical markup; the
//! first one describes the authority, the second one the contract. Rows can
//! come in any order and any of them may be absent.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use tracing::trace;

use super::dom::{cell_text, multiline_cell_value};
use super::PageExtractor;
use crate::domain::contract::DetailField;

static INFO_TABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table.table.table-info").expect("static selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("static selector"));
static HEADER: Lazy<Selector> = Lazy::new(|| Selector::parse("th").expect("static selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("static selector"));

/// Fields found in the contract info table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailTable {
    pub fields: BTreeMap<DetailField, String>,
}

impl DetailTable {
    /// Expected labels that were not on the page, in display order.
    pub fn missing(&self) -> Vec<DetailField> {
        DetailField::ALL
            .into_iter()
            .filter(|field| !self.fields.contains_key(field))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DetailExtractor;

impl PageExtractor for DetailExtractor {
    /// `None` when the contract info table is not on the page.
    type Output = Option<DetailTable>;

    fn extract(&self, page: &Html) -> Self::Output {
        let table = page.select(&INFO_TABLE).nth(1)?;

        let mut fields = BTreeMap::new();
        for row in table.select(&ROW) {
            let (Some(th), Some(td)) = (row.select(&HEADER).next(), row.select(&CELL).next()) else {
                continue;
            };
            let label = cell_text(&th);
            let label = label.trim_end_matches(':').trim_end();
            match DetailField::from_label(label) {
                Some(field) => {
                    fields.insert(field, multiline_cell_value(&td));
                }
                None => trace!("Ignoring detail row '{}'", label),
            }
        }

        Some(DetailTable { fields })
    }
}
