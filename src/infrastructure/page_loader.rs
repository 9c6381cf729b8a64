//! Validated page loader
//!
//! Wraps the fetcher: fetch, then check the parsed document against two
//! structural predicates. A page that shows the "no records" marker is a
//! valid empty result and is returned at once; a page that is missing its
//! data-bearing element is re-fetched after a backoff. Running out of attempts
//! is not an error, it is [`PageOutcome::Exhausted`].
//!
//! `scraper::Html` is not `Send`, so the parsed document never outlives
//! [`PageCheck::verdict`]. Outcomes carry the raw body and callers parse it
//! after their last await.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::infrastructure::http_client::{HttpFetcher, TransportError};
use crate::infrastructure::retry::BackoffPolicy;

/// Text of the site's "no records" marker.
pub const NO_RECORDS_TEXT: &str = "Žiadny záznam";

static NO_RECORDS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("strong.red").expect("static selector"));

/// Acceptance and terminal checks for one page kind.
#[derive(Debug, Clone)]
pub struct PageCheck {
    /// Element that must be present for the page to count as rendered
    accept: Option<Selector>,
    /// Whether the "no records" marker ends the retry loop
    terminal_on_no_records: bool,
}

impl PageCheck {
    /// Accept whatever renders.
    pub fn any() -> Self {
        Self {
            accept: None,
            terminal_on_no_records: false,
        }
    }

    /// Require `selector` to match. Panics on an invalid selector literal.
    pub fn require(selector: &str) -> Self {
        Self {
            accept: Some(Selector::parse(selector).expect("valid acceptance selector")),
            terminal_on_no_records: false,
        }
    }

    /// Also stop on the "no records" marker.
    #[must_use]
    pub fn or_no_records(mut self) -> Self {
        self.terminal_on_no_records = true;
        self
    }

    pub fn is_terminal(&self, page: &Html) -> bool {
        self.terminal_on_no_records && has_no_records_marker(page)
    }

    pub fn is_accepted(&self, page: &Html) -> bool {
        self.accept
            .as_ref()
            .is_none_or(|selector| page.select(selector).next().is_some())
    }

    /// Parse `body` and judge it. The terminal check wins over acceptance.
    pub fn verdict(&self, body: &str) -> Verdict {
        let page = Html::parse_document(body);
        if self.is_terminal(&page) {
            Verdict::Terminal
        } else if self.is_accepted(&page) {
            Verdict::Accepted
        } else {
            Verdict::Retry
        }
    }
}

/// What one fetched body means for the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Terminal,
    Accepted,
    Retry,
}

/// True when the page carries `<strong class="red">Žiadny záznam</strong>`.
pub fn has_no_records_marker(page: &Html) -> bool {
    page.select(&NO_RECORDS_SELECTOR)
        .any(|el| el.text().collect::<String>().trim() == NO_RECORDS_TEXT)
}

/// Result of loading one page. Bodies are kept unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The expected element is present
    Accepted(String),
    /// The page explicitly has no data
    Terminal(String),
    /// Never rendered within the attempt budget
    Exhausted { attempts: u32 },
}

impl PageOutcome {
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Accepted(body) | Self::Terminal(body) => Some(body),
            Self::Exhausted { .. } => None,
        }
    }

    /// Parse the body, if any. Do not hold the result across an await.
    pub fn into_page(self) -> Option<Html> {
        self.body().map(Html::parse_document)
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Fetch + parse + validate, with its own attempt budget.
#[derive(Clone)]
pub struct PageLoader {
    fetcher: HttpFetcher,
    policy: BackoffPolicy,
}

impl PageLoader {
    pub fn new(fetcher: HttpFetcher, policy: BackoffPolicy) -> Self {
        Self { fetcher, policy }
    }

    /// Load `url` until `check` accepts it, it turns out terminal, or the budget runs out.
    ///
    /// Transport errors are not retried here; the fetcher already did.
    pub async fn load(&self, url: &str, check: &PageCheck) -> Result<PageOutcome, TransportError> {
        debug!("Scraping page: {}", url);

        for attempt in 0..self.policy.max_attempts {
            let body = self.fetcher.fetch(url).await?;

            // Re-checked on every attempt: a page may go from "not rendered" to "empty"
            match check.verdict(&body) {
                Verdict::Terminal => {
                    debug!("No records found: {}", url);
                    return Ok(PageOutcome::Terminal(body));
                }
                Verdict::Accepted => {
                    debug!("Success: {}", url);
                    return Ok(PageOutcome::Accepted(body));
                }
                Verdict::Retry => {}
            }

            warn!(
                "Expected element not found on {}, retrying... {}/{}",
                url,
                attempt + 1,
                self.policy.max_attempts
            );
            if self.policy.has_next(attempt) {
                sleep(self.policy.delay_for(attempt)).await;
            }
        }

        error!(
            "Failed to find the required element after {} attempts on {}",
            self.policy.max_attempts, url
        );
        Ok(PageOutcome::Exhausted {
            attempts: self.policy.max_attempts,
        })
    }
}
