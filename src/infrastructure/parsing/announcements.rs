//! Announcements sub-page → announcement descriptors

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::dom::{cell_text, resolve_url, text_with_breaks, BREAK_MARKER};
use super::PageExtractor;

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table#lists-table").expect("static selector"));
static BODY_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").expect("static selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("static selector"));

/// Placeholder for a title that has no `"<id> - <name>"` shape.
pub const NO_SHORT_NAME: &str = "N/A";

/// `"<short name> - <date> - <url>"` per announcement row.
///
/// The row's link lives in its `onclick` handler as the first single-quoted
/// string; rows without one are skipped.
#[derive(Debug, Clone)]
pub struct AnnouncementsExtractor {
    origin: String,
}

impl AnnouncementsExtractor {
    pub fn new(origin: impl Into<String>) -> Self {
        Self { origin: origin.into() }
    }

    fn describe(&self, row: &ElementRef<'_>, index: usize) -> Option<String> {
        let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
        if cells.len() < 3 {
            return None;
        }

        let Some(onclick) = row.value().attr("onclick") else {
            warn!("Skipping announcement row {}: no link", index);
            return None;
        };
        let Some(url) = onclick
            .split('\'')
            .nth(1)
            .and_then(|target| resolve_url(target, &self.origin))
        else {
            warn!("Skipping announcement row {}: unusable link '{}'", index, onclick);
            return None;
        };

        let title = text_with_breaks(&cells[0]);
        let date = cell_text(&cells[1]);
        Some(format!("{} - {} - {}", short_name(&title), date, url))
    }
}

/// Title segment between the first and second `-`, up to its first line break.
fn short_name(title: &str) -> String {
    match title.split('-').nth(1) {
        Some(segment) => segment
            .trim()
            .split(BREAK_MARKER)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string(),
        None => NO_SHORT_NAME.to_string(),
    }
}

impl PageExtractor for AnnouncementsExtractor {
    type Output = Vec<String>;

    fn extract(&self, page: &Html) -> Self::Output {
        let Some(table) = page.select(&TABLE).next() else {
            return Vec::new();
        };
        table
            .select(&BODY_ROW)
            .enumerate()
            .filter_map(|(index, row)| self.describe(&row, index + 1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ORIGIN: &str = "https://www.uvo.gov.sk";

    fn announcements_page(rows: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><body><table id="lists-table"><thead><tr><th>Oznámenie</th><th>Dátum</th><th>Vestník</th></tr></thead>
               <tbody>{rows}</tbody></table></body></html>"#
        ))
    }

    fn row(id: u32, title: &str, date: &str) -> String {
        format!(
            r#"<tr onclick="window.location='/vestnik/oznamenie/detail/{id}'"><td>{title}</td><td> {date} </td><td>12/2023</td></tr>"#
        )
    }

    #[rstest]
    #[case("12345 - VZS<br>Výzva na predkladanie ponúk", "VZS")]
    #[case("  IZ-99 -  Oznámenie o výsledku  ", "99")]
    #[case("123 - VZS - Výzva<br>detail", "VZS")]
    #[case("Bez oddeľovača", "N/A")]
    #[case("7 -<br>druhý riadok", "")]
    fn short_name_cases(#[case] title: &str, #[case] expected: &str) {
        let page = announcements_page(&row(1, title, "01.01.2023"));
        let row = page.select(&BODY_ROW).next().unwrap();
        let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
        assert_eq!(short_name(&text_with_breaks(&cells[0])), expected);
    }

    #[test]
    fn formats_rows_with_resolved_links() {
        let rows = format!(
            "{}{}",
            row(10, "100 - VZS<br>Výzva", "05.05.2023"),
            row(11, "101 - IZ", "06.05.2023")
        );
        let page = announcements_page(&rows);

        assert_eq!(
            AnnouncementsExtractor::new(ORIGIN).extract(&page),
            [
                "VZS - 05.05.2023 - https://www.uvo.gov.sk/vestnik/oznamenie/detail/10",
                "IZ - 06.05.2023 - https://www.uvo.gov.sk/vestnik/oznamenie/detail/11",
            ]
        );
    }

    #[test]
    fn skips_rows_without_onclick_or_enough_cells() {
        let rows = format!(
            r#"<tr><td>200 - bez odkazu</td><td>01.01.2023</td><td>-</td></tr>
               <tr onclick="go('/x')"><td colspan="3">Žiadny záznam</td></tr>
               {}"#,
            row(12, "201 - OK", "02.01.2023")
        );
        let page = announcements_page(&rows);

        assert_eq!(
            AnnouncementsExtractor::new(ORIGIN).extract(&page),
            ["OK - 02.01.2023 - https://www.uvo.gov.sk/vestnik/oznamenie/detail/12"]
        );
    }

    #[test]
    fn ignores_rows_outside_the_lists_table() {
        let page = Html::parse_document(
            r#"<html><body>
               <table class="menu"><tbody><tr onclick="go('/menu/1')"><td>Menu - x</td><td>x</td><td>-</td></tr></tbody></table>
               <strong class="red">Žiadny záznam</strong></body></html>"#,
        );
        assert!(AnnouncementsExtractor::new(ORIGIN).extract(&page).is_empty());
    }

    #[test]
    fn extraction_is_repeatable() {
        let rows: String = (1..=3).map(|i| row(i, &format!("{i} - A{i}"), "01.01.2023")).collect();
        let page = announcements_page(&rows);
        let extractor = AnnouncementsExtractor::new(ORIGIN);

        let first = extractor.extract(&page);
        assert_eq!(first.len(), 3);
        assert_eq!(first, extractor.extract(&page));
    }
}
