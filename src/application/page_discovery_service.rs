//! Page discovery service
//!
//! Loads the first listing page once and reads the total page count off the
//! "last page" pagination link.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info};

use crate::infrastructure::http_client::TransportError;
use crate::infrastructure::page_loader::{PageCheck, PageLoader, PageOutcome};

static LAST_PAGE_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.pag-last").expect("static selector"));
static PAGE_PARAMETER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]page=(\d+)").expect("static regex"));

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Listing page has no last-page link")]
    MissingLastPageLink,

    #[error("Last-page link has no usable page parameter: {href}")]
    MalformedPageParameter { href: String },

    #[error("Listing page did not render after {attempts} attempts")]
    NotRendered { attempts: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Finds how many listing pages there are
#[derive(Clone)]
pub struct PageDiscoveryService {
    loader: PageLoader,
}

impl PageDiscoveryService {
    pub fn new(loader: PageLoader) -> Self {
        Self { loader }
    }

    /// Total number of listing pages behind `listing_url`.
    pub async fn discover(&self, listing_url: &str) -> Result<u32, DiscoveryError> {
        info!("Discovering page count: {}", listing_url);

        let body = match self.loader.load(listing_url, &PageCheck::any()).await? {
            PageOutcome::Accepted(body) | PageOutcome::Terminal(body) => body,
            PageOutcome::Exhausted { attempts } => return Err(DiscoveryError::NotRendered { attempts }),
        };

        let total = last_page_from(&Html::parse_document(&body))?;
        info!("Found {} listing pages", total);
        Ok(total)
    }
}

/// Page number of the `a.pag-last` link.
pub fn last_page_from(page: &Html) -> Result<u32, DiscoveryError> {
    let href = page
        .select(&LAST_PAGE_LINK)
        .next()
        .and_then(|link| link.value().attr("href"))
        .ok_or(DiscoveryError::MissingLastPageLink)?;
    debug!("Last page link: {}", href);

    extract_page_number(href).ok_or_else(|| DiscoveryError::MalformedPageParameter {
        href: href.to_string(),
    })
}

fn extract_page_number(href: &str) -> Option<u32> {
    PAGE_PARAMETER
        .captures(href)
        .and_then(|captures| captures.get(1))
        .and_then(|number| number.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::HttpFetcher;
    use crate::infrastructure::retry::BackoffPolicy;
    use crate::test_utils::{Scripted, ScriptedTransport};
    use rstest::rstest;
    use std::sync::Arc;

    const LISTING: &str = "https://www.uvo.gov.sk/vyhladavanie/vyhladavanie-zakaziek?cpv=48000000-8";

    fn service(transport: Arc<ScriptedTransport>) -> PageDiscoveryService {
        let fetcher = HttpFetcher::new(transport, BackoffPolicy::none(2));
        PageDiscoveryService::new(PageLoader::new(fetcher, BackoffPolicy::none(3)))
    }

    fn pager(href: &str) -> String {
        format!(r#"<html><body><ul class="pagination"><li><a class="pag-last" href="{href}">»</a></li></ul></body></html>"#)
    }

    #[rstest]
    #[case("/vyhladavanie/vyhladavanie-zakaziek?cpv=48000000-8&page=3", 3)]
    #[case("?page=120", 120)]
    #[case("/x?page=7&sort=date", 7)]
    fn reads_page_parameter(#[case] href: &str, #[case] expected: u32) {
        let page = Html::parse_document(&pager(href));
        assert_eq!(last_page_from(&page).unwrap(), expected);
    }

    #[test]
    fn missing_link_is_an_error() {
        let page = Html::parse_document("<html><body><p>nothing</p></body></html>");
        assert!(matches!(last_page_from(&page), Err(DiscoveryError::MissingLastPageLink)));
    }

    #[rstest]
    #[case("/vyhladavanie?cpv=1")]
    #[case("/vyhladavanie?page=last")]
    #[case("/vyhladavanie?subpage=4")]
    fn malformed_parameter_is_an_error(#[case] href: &str) {
        let page = Html::parse_document(&pager(href));
        assert!(matches!(
            last_page_from(&page),
            Err(DiscoveryError::MalformedPageParameter { .. })
        ));
    }

    #[tokio::test]
    async fn discovers_from_base_url_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(LISTING, pager("?cpv=48000000-8&page=12"));

        let total = service(transport.clone()).discover(LISTING).await.unwrap();

        assert_eq!(total, 12);
        assert_eq!(transport.requested(), [LISTING]);
    }

    #[tokio::test]
    async fn transport_failure_is_fatal() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(LISTING, [Scripted::fail("connection refused")]);

        let err = service(transport).discover(LISTING).await.unwrap_err();

        assert!(matches!(err, DiscoveryError::Transport(TransportError::Exhausted { .. })));
    }
}
