//! End-to-end harvest runs against a scripted site

use std::sync::Arc;
use std::time::Duration;

use contract_harvester::application::harvest_service::listing_page_url;
use contract_harvester::application::{HarvestError, HarvestService};
use contract_harvester::domain::{DetailField, HarvestStage};
use contract_harvester::infrastructure::config::PacingConfig;
use contract_harvester::infrastructure::sink::sort_for_sink;
use contract_harvester::infrastructure::{BackoffPolicy, HarvesterConfig};
use contract_harvester::test_utils::{Scripted, ScriptedFactory, ScriptedTransport};

const ORIGIN: &str = "https://www.uvo.gov.sk";
const LISTING: &str = "https://www.uvo.gov.sk/vyhladavanie/vyhladavanie-zakaziek?cpv=48000000-8+72000000-5+73000000-2";
const NO_RECORDS: &str = r#"<html><body><p>Dokumenty</p><strong class="red">Žiadny záznam</strong></body></html>"#;

fn config() -> HarvesterConfig {
    let mut config = HarvesterConfig::default();
    config.site.listing_url = LISTING.to_string();
    config.pacing = PacingConfig::immediate();
    config.retry.transport = BackoffPolicy::none(3);
    config.retry.page = BackoffPolicy::none(3);
    config
}

fn detail_url(id: u32) -> String {
    format!("{ORIGIN}/vyhladavanie/detail/{id}")
}

fn discovery_page(last: u32) -> String {
    format!(
        r#"<html><body><table id="lists-table"></table>
           <ul class="pagination"><li><a class="pag-first" href="?page=1">«</a></li>
           <li><a class="pag-last" href="/vyhladavanie/vyhladavanie-zakaziek?cpv=48000000-8&amp;page={last}">»</a></li></ul>
           </body></html>"#
    )
}

fn listing_page(ids: impl IntoIterator<Item = u32>) -> String {
    let rows: String = ids
        .into_iter()
        .map(|id| {
            format!(
                r#"<tr><td><a class="ul-link" href="/vyhladavanie/detail/{id}">Zákazka {id}</a></td>
                   <td><a class="ul-link" href="/vyhladavanie/obstaravatel/{id}">Obstarávateľ {id}</a></td>
                   <td>Nadlimitná</td></tr>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><table id="lists-table"><thead><tr><th>Názov</th><th>Obstarávateľ</th><th>Druh</th></tr></thead>
           <tbody>{rows}</tbody></table></body></html>"#
    )
}

fn detail_page(id: u32) -> String {
    // every tenth contract has a last update, so the sink order is not listing order
    let updated = if id % 10 == 0 {
        format!("<tr><th>Dátum poslednej aktualizácie:</th><td>{:02}.06.2023 12:00</td></tr>", id % 28 + 1)
    } else {
        String::new()
    };
    format!(
        r#"<html><body>
           <table class="table table-info"><tr><th>Názov:</th><td>Obstarávateľ {id}</td></tr></table>
           <table class="table table-info">
             <tr><th>Dátum vytvorenia:</th><td>01.01.2020 10:00</td></tr>
             {updated}
             <tr><th>Stav zákazky:</th><td>Prebieha</td></tr>
             <tr><th>CPV zákazky:</th><td>48000000-8<br>72000000-5</td></tr>
             <tr><th>Druh zákazky:</th><td>Služby</td></tr>
             <tr><th>Dátum zverejnenia:</th><td>02.01.2020 08:00</td></tr>
           </table></body></html>"#
    )
}

fn documents_page(id: u32) -> String {
    format!(
        r#"<html><body><table id="lists-table">
           <thead><tr><th>Názov dokumentu</th><th>Druh dokumentu</th><th>Zverejnenie</th></tr></thead>
           <tbody><tr><td>podklady_{id}.pdf</td><td>Súťažné podklady</td><td>03.01.2020</td></tr></tbody>
           </table></body></html>"#
    )
}

/// Listing pages of `pages[i]` contracts each, every sub-page rendered.
fn script_site(transport: &ScriptedTransport, pages: &[u32]) -> Vec<u32> {
    transport.page(LISTING, discovery_page(pages.len() as u32));
    let mut all_ids = Vec::new();
    let mut next_id = 1;
    for (index, count) in pages.iter().enumerate() {
        let ids: Vec<u32> = (next_id..next_id + count).collect();
        next_id += count;
        transport.page(&listing_page_url(LISTING, index as u32 + 1), listing_page(ids.clone()));
        for id in &ids {
            transport.page(&detail_url(*id), detail_page(*id));
            transport.page(&format!("{ORIGIN}/vyhladavanie/dokumenty/{id}"), documents_page(*id));
            transport.page(&format!("{ORIGIN}/vyhladavanie/oznamenia/{id}"), NO_RECORDS);
        }
        all_ids.extend(ids);
    }
    all_ids
}

#[tokio::test]
async fn unreachable_details_keep_listing_fields() {
    let transport = Arc::new(ScriptedTransport::new());
    let ids = script_site(&transport, &[100, 100, 50]);
    let unreachable = [7, 42, 101, 199, 250];
    for id in unreachable {
        transport.script(&detail_url(id), [Scripted::fail("connection reset by peer")]);
    }

    let harvest = HarvestService::new(config(), Arc::new(ScriptedFactory::new(transport.clone())))
        .run(None)
        .await
        .unwrap();

    assert_eq!(harvest.records.len(), 250);
    let listed: Vec<String> = harvest.records.iter().map(|r| r.url().to_string()).collect();
    let expected: Vec<String> = ids.iter().map(|id| detail_url(*id)).collect();
    assert_eq!(listed, expected);

    for record in &harvest.records {
        let id: u32 = record.url().as_str().rsplit('/').next().unwrap().parse().unwrap();
        assert_eq!(record.title, format!("Zákazka {id}"));
        assert_eq!(record.authority, format!("Obstarávateľ {id}"));
        if unreachable.contains(&id) {
            assert_eq!(record.missing_details().len(), 6, "contract {id}");
        } else {
            assert_eq!(record.detail(DetailField::Status), Some("Prebieha"));
            assert_eq!(record.detail(DetailField::CpvCodes), Some("48000000-8\n72000000-5"));
        }
        // sub-pages are derived from the canonical URL, so they still load
        assert_eq!(record.documents, [format!("Súťažné podklady - podklady_{id}.pdf - 03.01.2020")]);
        assert!(record.announcements.is_empty());
    }

    let details = harvest.report.stage(HarvestStage::Details).unwrap();
    assert_eq!((details.items, details.failed), (250, 5));
    // fetcher budget exhausted for each of them, never more
    assert_eq!(transport.calls(&detail_url(42)), 3);
}

#[tokio::test]
async fn each_listing_page_is_fetched_once_and_empty_pages_add_nothing() {
    let transport = Arc::new(ScriptedTransport::new());
    script_site(&transport, &[3, 3, 3, 3]);
    // page 3 never renders its table
    let broken = listing_page_url(LISTING, 3);
    transport.page(&broken, "<html><body><div class=\"loading\"></div></body></html>");

    let mut config = config();
    config.retry.page = BackoffPolicy::none(1);
    let harvest = HarvestService::new(config, Arc::new(ScriptedFactory::new(transport.clone())))
        .run(None)
        .await
        .unwrap();

    for page in 1..=4 {
        assert_eq!(transport.calls(&listing_page_url(LISTING, page)), 1, "page {page}");
    }
    let titles: Vec<&str> = harvest.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        [
            "Zákazka 1", "Zákazka 2", "Zákazka 3", "Zákazka 4", "Zákazka 5", "Zákazka 6",
            "Zákazka 10", "Zákazka 11", "Zákazka 12",
        ]
    );
    assert_eq!(harvest.report.stage(HarvestStage::Listing).unwrap().failed, 0);
}

#[tokio::test]
async fn discovery_failure_aborts_the_run() {
    let transport = Arc::new(ScriptedTransport::new());
    script_site(&transport, &[2]);
    transport.page(LISTING, listing_page([1, 2]));
    let factory = ScriptedFactory::new(transport.clone());

    let result = HarvestService::new(config(), Arc::new(factory.clone())).run(None).await;

    assert!(matches!(result, Err(HarvestError::Discovery(_))));
    assert_eq!(transport.total_calls(), 1);
    assert_eq!(factory.sessions_opened(), 1);
}

#[tokio::test]
async fn every_stage_opens_its_own_session() {
    let transport = Arc::new(ScriptedTransport::new());
    script_site(&transport, &[2, 1]);
    let factory = ScriptedFactory::new(transport);

    let harvest = HarvestService::new(config(), Arc::new(factory.clone())).run(None).await.unwrap();

    let stages: Vec<HarvestStage> = harvest.report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        [HarvestStage::Listing, HarvestStage::Details, HarvestStage::Documents, HarvestStage::Announcements]
    );
    assert_eq!(factory.sessions_opened(), 5);
}

#[tokio::test(start_paused = true)]
async fn stages_are_paced_by_configuration() {
    let transport = Arc::new(ScriptedTransport::new());
    script_site(&transport, &[2, 1]);
    let mut config = config();
    config.pacing = PacingConfig::default();

    let started = tokio::time::Instant::now();
    let harvest = HarvestService::new(config, Arc::new(ScriptedFactory::new(transport)))
        .run(None)
        .await
        .unwrap();

    // listing: 5s warm-up + 1 gap; three contract stages: 5s warm-up + 2 gaps
    let expected = Duration::from_millis(5_100 + 3 * 5_200);
    assert_eq!(started.elapsed(), expected);
    assert_eq!(harvest.records.len(), 3);
}

#[tokio::test]
async fn sink_order_is_newest_first() {
    let transport = Arc::new(ScriptedTransport::new());
    script_site(&transport, &[30]);

    let mut records = HarvestService::new(config(), Arc::new(ScriptedFactory::new(transport)))
        .run(None)
        .await
        .unwrap()
        .records;
    sort_for_sink(&mut records);

    let head: Vec<&str> = records.iter().take(3).map(|r| r.title.as_str()).collect();
    // updated 21.06, 11.06 and 03.06.2023; the rest only have the shared creation time
    assert_eq!(head, ["Zákazka 20", "Zákazka 10", "Zákazka 30"]);
    let rest: Vec<&str> = records.iter().skip(3).take(2).map(|r| r.title.as_str()).collect();
    assert_eq!(rest, ["Zákazka 1", "Zákazka 2"]);
}
