//! Harvest pipeline
//!
//! discovery → listing pages → details → documents → announcements
//!
//! Every stage opens its own transport (a fresh connection pool) and runs its
//! per-item operation through the [`StageRunner`]. Only discovery can fail the
//! run; everything after it degrades to missing fields on single records.

use async_trait::async_trait;
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::application::page_discovery_service::{DiscoveryError, PageDiscoveryService};
use crate::application::stage_runner::{StageError, StageOperation, StageRunner, StageSummary, StageTicket};
use crate::domain::contract::ContractRecord;
use crate::domain::stage::HarvestStage;
use crate::infrastructure::config::{HarvesterConfig, SiteConfig};
use crate::infrastructure::http_client::{HttpFetcher, TransportError, TransportFactory};
use crate::infrastructure::page_loader::{PageCheck, PageLoader, PageOutcome};
use crate::infrastructure::parsing::{
    AnnouncementsExtractor, DetailExtractor, DocumentsExtractor, ListingExtractor, PageExtractor,
};
use crate::infrastructure::sink::JsonSnapshot;

/// Data-bearing table of the listing and both sub-pages
const LISTING_TABLE: &str = "table#lists-table";
const INFO_TABLE: &str = ".table.table-info";

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Page discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Could not open HTTP session: {0}")]
    Transport(#[from] TransportError),
}

/// Timings and counts of a finished run.
#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    pub total_pages: u32,
    pub contracts: usize,
    /// Contracts with at least one detail field unset
    pub incomplete: usize,
    pub stages: Vec<StageSummary>,
    pub elapsed: Duration,
}

impl HarvestReport {
    pub fn stage(&self, stage: HarvestStage) -> Option<&StageSummary> {
        self.stages.iter().find(|summary| summary.stage == stage)
    }

    pub fn log(&self) {
        info!("📊 Harvested {} contracts from {} listing pages", self.contracts, self.total_pages);
        if self.incomplete > 0 {
            info!("{} contracts have incomplete details", self.incomplete);
        }
        for summary in &self.stages {
            info!(
                "Time taken for {}: {:.2?} ({} items, {} failed)",
                summary.stage, summary.elapsed, summary.items, summary.failed
            );
        }
        info!("Total time: {:.2?}", self.elapsed);
    }
}

/// Result of [`HarvestService::run`]: records in listing order plus the report.
#[derive(Debug, Clone)]
pub struct Harvest {
    pub records: Vec<ContractRecord>,
    pub report: HarvestReport,
}

/// `listing_url` with `page=<number>` appended.
pub fn listing_page_url(listing_url: &str, number: u32) -> String {
    let separator = if listing_url.contains('?') { '&' } else { '?' };
    format!("{listing_url}{separator}page={number}")
}

/// One listing page and the rows it yielded.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub number: u32,
    pub url: String,
    pub rows: Vec<ContractRecord>,
}

impl ListingPage {
    pub fn new(listing_url: &str, number: u32) -> Self {
        Self {
            number,
            url: listing_page_url(listing_url, number),
            rows: Vec::new(),
        }
    }
}

struct ListingOperation {
    loader: PageLoader,
    check: PageCheck,
    extractor: ListingExtractor,
}

#[async_trait]
impl StageOperation<ListingPage> for ListingOperation {
    async fn apply(&self, page: &mut ListingPage, _ticket: StageTicket) -> Result<(), StageError> {
        let Some(document) = self.loader.load(&page.url, &self.check).await?.into_page() else {
            warn!("Listing page {} never rendered, no rows taken from it", page.number);
            return Ok(());
        };
        page.rows = self.extractor.extract(&document);
        Ok(())
    }
}

struct DetailOperation {
    loader: PageLoader,
    check: PageCheck,
}

#[async_trait]
impl StageOperation<ContractRecord> for DetailOperation {
    async fn apply(&self, record: &mut ContractRecord, _ticket: StageTicket) -> Result<(), StageError> {
        let url = record.url().as_str().to_string();
        let Some(document) = self.loader.load(&url, &self.check).await?.into_page() else {
            warn!("No detail page for {}", url);
            return Ok(());
        };

        let Some(table) = DetailExtractor.extract(&document) else {
            error!("Contract info table not found: {}", url);
            return Ok(());
        };
        let missing = table.missing();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|field| field.label()).collect();
            warn!("Missing detail fields for {}: {}", url, names.join(", "));
        }
        record.apply_detail(table.fields);
        Ok(())
    }
}

/// Documents or announcements, whichever `extractor` handles.
struct SubPageOperation<E> {
    loader: PageLoader,
    check: PageCheck,
    extractor: E,
    detail_segment: String,
    sub_page_segment: String,
    store: fn(&mut ContractRecord, Vec<String>),
}

#[async_trait]
impl<E> StageOperation<ContractRecord> for SubPageOperation<E>
where
    E: PageExtractor<Output = Vec<String>> + Send + Sync,
{
    async fn apply(&self, record: &mut ContractRecord, _ticket: StageTicket) -> Result<(), StageError> {
        let url = record.url().sub_page(&self.detail_segment, &self.sub_page_segment);
        match self.loader.load(&url, &self.check).await? {
            PageOutcome::Accepted(body) | PageOutcome::Terminal(body) => {
                let entries = self.extractor.extract(&Html::parse_document(&body));
                (self.store)(record, entries);
            }
            PageOutcome::Exhausted { attempts } => {
                warn!("Gave up on {} after {} attempts, leaving it empty", url, attempts);
            }
        }
        Ok(())
    }
}

/// Runs the full four-stage harvest.
pub struct HarvestService {
    config: HarvesterConfig,
    transports: Arc<dyn TransportFactory>,
    runner: StageRunner,
}

impl HarvestService {
    pub fn new(config: HarvesterConfig, transports: Arc<dyn TransportFactory>) -> Self {
        let runner = StageRunner::from_config(&config.pacing);
        Self {
            config,
            transports,
            runner,
        }
    }

    fn site(&self) -> &SiteConfig {
        &self.config.site
    }

    /// A page loader on a freshly opened transport.
    fn open_loader(&self) -> Result<PageLoader, TransportError> {
        let fetcher = HttpFetcher::new(self.transports.open()?, self.config.retry.transport);
        Ok(PageLoader::new(fetcher, self.config.retry.page))
    }

    /// Harvest everything, or the first `max_pages` listing pages.
    pub async fn run(&self, max_pages: Option<u32>) -> Result<Harvest, HarvestError> {
        let started = Instant::now();
        let mut report = HarvestReport::default();

        let discovery = PageDiscoveryService::new(self.open_loader()?);
        let discovered = discovery.discover(&self.site().listing_url).await?;
        report.total_pages = match max_pages {
            Some(cap) if cap < discovered => {
                info!("Limiting harvest to {} of {} listing pages", cap, discovered);
                cap
            }
            _ => discovered,
        };

        let mut records = self.listing_stage(report.total_pages, &mut report).await?;
        report.contracts = records.len();

        self.detail_stage(&mut records, &mut report).await?;
        self.sub_page_stage(
            HarvestStage::Documents,
            &mut records,
            &mut report,
            DocumentsExtractor,
            self.site().documents_segment.clone(),
            ContractRecord::apply_documents,
        )
        .await?;
        self.sub_page_stage(
            HarvestStage::Announcements,
            &mut records,
            &mut report,
            AnnouncementsExtractor::new(self.site().origin.clone()),
            self.site().announcements_segment.clone(),
            ContractRecord::apply_announcements,
        )
        .await?;

        report.incomplete = records
            .iter()
            .filter(|record| !record.missing_details().is_empty())
            .count();
        report.elapsed = started.elapsed();
        Ok(Harvest { records, report })
    }

    async fn listing_stage(&self, total_pages: u32, report: &mut HarvestReport) -> Result<Vec<ContractRecord>, HarvestError> {
        let operation = ListingOperation {
            loader: self.open_loader()?,
            check: PageCheck::require(LISTING_TABLE),
            extractor: ListingExtractor::new(self.site().origin.clone()),
        };
        let mut pages: Vec<ListingPage> = (1..=total_pages)
            .map(|number| ListingPage::new(&self.site().listing_url, number))
            .collect();

        let summary = self.runner.run(HarvestStage::Listing, &mut pages, &operation).await;
        report.stages.push(summary);

        let records: Vec<ContractRecord> = pages.into_iter().flat_map(|page| page.rows).collect();
        info!("Collected {} contracts from {} listing pages", records.len(), total_pages);
        self.write_stage_snapshot(HarvestStage::Listing, &records).await;
        Ok(records)
    }

    async fn detail_stage(&self, records: &mut [ContractRecord], report: &mut HarvestReport) -> Result<(), HarvestError> {
        let operation = DetailOperation {
            loader: self.open_loader()?,
            check: PageCheck::require(INFO_TABLE),
        };
        let summary = self.runner.run(HarvestStage::Details, records, &operation).await;
        report.stages.push(summary);
        self.write_stage_snapshot(HarvestStage::Details, records).await;
        Ok(())
    }

    async fn sub_page_stage<E>(
        &self,
        stage: HarvestStage,
        records: &mut [ContractRecord],
        report: &mut HarvestReport,
        extractor: E,
        sub_page_segment: String,
        store: fn(&mut ContractRecord, Vec<String>),
    ) -> Result<(), HarvestError>
    where
        E: PageExtractor<Output = Vec<String>> + Send + Sync,
    {
        let operation = SubPageOperation {
            loader: self.open_loader()?,
            check: PageCheck::require(LISTING_TABLE).or_no_records(),
            extractor,
            detail_segment: self.site().detail_segment.clone(),
            sub_page_segment,
            store,
        };
        let summary = self.runner.run(stage, records, &operation).await;
        report.stages.push(summary);
        self.write_stage_snapshot(stage, records).await;
        Ok(())
    }

    async fn write_stage_snapshot(&self, stage: HarvestStage, records: &[ContractRecord]) {
        if !self.config.output.write_stage_snapshots {
            return;
        }
        let snapshot = JsonSnapshot::new(&self.config.output.snapshot_path).with_suffix(stage.as_str());
        if let Err(e) = snapshot.save(records).await {
            warn!("Failed to write {} snapshot: {}", stage, e);
        }
    }
}
