//! Integration tests for the harvester
//!
//! These tests use wiremock to serve listing, parental-guide and title pages
//! and run the full harvest cycle end-to-end against a temporary database.

use reel_harvest::config::{parse_config, Config};
use reel_harvest::crawler::Coordinator;
use reel_harvest::state::{Stage, TaskState};
use reel_harvest::storage::{RunStatus, Storage};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TITLE_IDS: [&str; 3] = ["tt0000001", "tt0000002", "tt0000003"];
const TITLE_NAMES: [&str; 3] = ["Alpha (2001)", "Beta (2002)", "Gamma (2003)"];

/// Creates a test configuration seeded with one start URL
fn create_test_config(start_url: &str, max_items: Option<u64>, db_path: &str, extra: &str) -> Config {
    create_test_config_with_concurrency(start_url, max_items, db_path, extra, 1)
}

fn create_test_config_with_concurrency(
    start_url: &str,
    max_items: Option<u64>,
    db_path: &str,
    extra: &str,
    concurrency: u32,
) -> Config {
    let max_items = max_items
        .map(|n| format!("max-items = {}", n))
        .unwrap_or_default();

    parse_config(&format!(
        r#"
[run]
start-urls = [{{ url = "{start_url}" }}]
{max_items}
max-concurrent-pages-open = {concurrency}
max-request-retries = 0
retry-delay-ms = 10

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{db_path}"
{extra}
"#
    ))
    .expect("test config is valid")
}

fn db_path(dir: &TempDir) -> String {
    dir.path().join("harvest.db").display().to_string()
}

fn listing_page(count_text: &str, ids: &[&str]) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="lister-item mode-advanced">
                     <h3 class="lister-item-header"><a href="/title/{id}/?ref_=adv_li_tt">Title {id}</a></h3>
                   </div>"#
            )
        })
        .collect();

    format!(
        r#"<html><body>
             <div class="desc"><span>{count_text}</span></div>
             <div class="lister-list">{items}</div>
           </body></html>"#
    )
}

fn guide_page(certificate: &str) -> String {
    format!(
        r#"<html><body><section id="certificates"><h4>Certification</h4>
             <ul><li class="ipl-inline-list__item">{certificate}</li></ul>
           </section></body></html>"#
    )
}

fn title_page(id: &str, name: &str, runtime: Option<&str>) -> String {
    let runtime_row = runtime
        .map(|r| format!(r#"<div class="txt-block"><h4 class="inline">Runtime:</h4> <time>{r}</time></div>"#))
        .unwrap_or_default();

    format!(
        r#"<html><head><meta property="pageId" content="{id}"></head><body>
             <div class="title_wrapper"><h1>{name}</h1></div>
             <div class="ratingValue"><strong><span>8.1</span></strong>/10</div>
             <span class="release-year">1999</span>
             <div id="titleDetails">
               <div class="txt-block"><h4 class="inline">Country:</h4> <a>USA</a></div>
               {runtime_row}
             </div>
           </body></html>"#
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts a listing under /search/title/ plus guide and title pages for
/// every linked title
async fn mount_site(server: &MockServer) {
    mount_page(server, "/search/title/", listing_page("1 of 120 titles.", &TITLE_IDS)).await;

    for (i, id) in TITLE_IDS.iter().enumerate() {
        mount_page(
            server,
            &format!("/title/{id}/parentalguide"),
            guide_page(&format!("United States:PG-{}", i + 10)),
        )
        .await;
        mount_page(
            server,
            &format!("/title/{id}"),
            title_page(id, TITLE_NAMES[i], Some("120 min")),
        )
        .await;
    }
}

fn stored_titles(storage: &dyn Storage) -> Vec<serde_json::Value> {
    storage
        .load_records()
        .unwrap()
        .iter()
        .filter(|r| !r.is_failed)
        .map(|r| serde_json::from_str(&r.payload).unwrap())
        .collect()
}

#[tokio::test]
async fn test_listing_harvest_stops_at_quota() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let start_url = format!("{}/search/title/?genre=x", server.uri());
    let config = create_test_config(&start_url, Some(2), &db_path(&dir), "");

    let coordinator = Coordinator::new(config, "test".to_string(), false).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.total_records, 2);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();

    // Exactly two records despite a third title being queued
    assert_eq!(storage.count_records(false).unwrap(), 2);
    assert_eq!(storage.count_records(true).unwrap(), 0);

    let by_stage = storage.count_tasks_by_stage().unwrap();
    assert_eq!(by_stage.get(&Stage::Start), Some(&1));
    assert_eq!(by_stage.get(&Stage::List), Some(&1));
    assert_eq!(by_stage.get(&Stage::DetailAux), Some(&3));
    assert_eq!(by_stage.get(&Stage::Detail), Some(&3));

    // The second listing page was queued with the merged offset
    let pending = storage.load_pending_tasks().unwrap();
    let list_task = pending
        .iter()
        .find(|t| t.stage == Stage::List)
        .expect("listing page still pending");
    assert_eq!(list_task.url, format!("{}/search/title/?genre=x&start=51", server.uri()));

    // Certificates travel from the guide page to the record
    let titles = stored_titles(&*storage);
    assert_eq!(titles[0]["certificate"], "United States:PG-10");
    assert_eq!(titles[0]["title"], "Alpha (2001)");
    assert_eq!(titles[0]["year"], "2001");
    assert_eq!(titles[0]["runtime"], "120 min");
    assert_eq!(titles[0]["rating"], "8.1");
    assert_eq!(titles[0]["id"], "tt0000001");
    assert_eq!(titles[1]["certificate"], "United States:PG-11");
    assert_eq!(titles[1]["#debug"]["method"], "GET");
    assert_eq!(titles[1]["#debug"]["statusCode"], 200);

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(run.config_hash, "test");
}

#[tokio::test]
async fn test_concurrent_fetches_respect_quota() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let start_url = format!("{}/search/title/?genre=x", server.uri());
    let config = create_test_config_with_concurrency(&start_url, Some(2), &db_path(&dir), "", 8);

    let coordinator = Coordinator::new(config.clone(), "test".to_string(), false).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.total_records, 2);
    // The third title's chain was still in flight when the quota hit
    assert!(report.released > 0);

    {
        let storage = coordinator.storage();
        let storage = storage.lock().unwrap();
        assert_eq!(storage.count_records(false).unwrap(), 2);

        let states = storage.count_tasks_by_state().unwrap();
        assert_eq!(states.get(&TaskState::InFlight).copied().unwrap_or(0), 0);
        assert!(states.get(&TaskState::Pending).copied().unwrap_or(0) >= report.released);
    }

    // A resumed run with one more item collects only the missing title
    let mut resumed_config = config;
    resumed_config.run.max_items = Some(3);
    let resumed = Coordinator::new(resumed_config, "test".to_string(), false).unwrap();
    let report = resumed.run().await.unwrap();
    assert_eq!(report.total_records, 3);

    let storage = resumed.storage();
    let storage = storage.lock().unwrap();
    let mut ids: Vec<String> = stored_titles(&*storage)
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, TITLE_IDS);
}

#[tokio::test]
async fn test_resume_counts_prior_records() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let start_url = format!("{}/search/title/?genre=x", server.uri());

    let first = Coordinator::new(
        create_test_config(&start_url, Some(2), &db_path(&dir), ""),
        "test".to_string(),
        false,
    )
    .unwrap();
    assert_eq!(first.run().await.unwrap().total_records, 2);
    drop(first);

    // Raising the quota by one resumes the queue and stops after one more record
    let second = Coordinator::new(
        create_test_config(&start_url, Some(3), &db_path(&dir), ""),
        "test".to_string(),
        false,
    )
    .unwrap();
    let report = second.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.total_records, 3);

    let storage = second.storage();
    let storage = storage.lock().unwrap();
    let titles = stored_titles(&*storage);
    assert_eq!(titles.len(), 3);
    assert_eq!(titles[2]["id"], "tt0000003");
}

#[tokio::test]
async fn test_quota_already_met_does_nothing() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let start_url = format!("{}/search/title/?genre=x", server.uri());
    let config = create_test_config(&start_url, Some(2), &db_path(&dir), "");

    let first = Coordinator::new(config.clone(), "test".to_string(), false).unwrap();
    first.run().await.unwrap();
    drop(first);

    let second = Coordinator::new(config, "test".to_string(), false).unwrap();
    let report = second.run().await.unwrap();

    assert_eq!(report.tasks_processed, 0);
    assert_eq!(report.total_records, 2);
}

#[tokio::test]
async fn test_missing_page_writes_failure_record() {
    let server = MockServer::start().await;

    let dir = TempDir::new().unwrap();
    let start_url = format!("{}/title/tt0000404/", server.uri());
    let config = create_test_config(&start_url, Some(1), &db_path(&dir), "");

    let coordinator = Coordinator::new(config, "test".to_string(), false).unwrap();
    let report = coordinator.run().await.unwrap();

    // Failures do not count toward the quota, so the queue simply drains
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.failures, 1);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_records(false).unwrap(), 0);

    let records = storage.load_records().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_failed);

    let failure: serde_json::Value = serde_json::from_str(&records[0].payload).unwrap();
    assert_eq!(failure["#isFailed"], true);
    assert_eq!(failure["#debug"]["statusCode"], 404);
    assert_eq!(
        failure["#debug"]["url"],
        format!("{}/title/tt0000404/parentalguide", server.uri())
    );

    let states = storage.count_tasks_by_state().unwrap();
    assert_eq!(states.get(&TaskState::Failed), Some(&1));
}

#[tokio::test]
async fn test_extension_overrides_and_adds_fields() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let start_url = format!("{}/title/tt0000001/", server.uri());
    let extension = r#"
[[extension.fields]]
name = "year"
selector = ".release-year"

[[extension.fields]]
name = "pageId"
selector = "meta[property=pageId]"
attribute = "content"
"#;
    let config = create_test_config(&start_url, None, &db_path(&dir), extension);

    let coordinator = Coordinator::new(config, "test".to_string(), false).unwrap();
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let titles = stored_titles(&*storage);
    assert_eq!(titles.len(), 1);
    assert_eq!(titles[0]["year"], "1999");
    assert_eq!(titles[0]["pageId"], "tt0000001");
    assert_eq!(titles[0]["title"], "Alpha (2001)");
}

#[tokio::test]
async fn test_required_extension_field_fails_run() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let start_url = format!("{}/title/tt0000001/", server.uri());
    let extension = r#"
[[extension.fields]]
name = "poster"
selector = ".poster img"
attribute = "src"
required = true
"#;
    let config = create_test_config(&start_url, None, &db_path(&dir), extension);

    let coordinator = Coordinator::new(config, "test".to_string(), false).unwrap();
    assert!(coordinator.run().await.is_err());

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_records(false).unwrap(), 0);
    assert_eq!(
        storage.get_latest_run().unwrap().unwrap().status,
        RunStatus::Failed
    );
}

#[tokio::test]
async fn test_title_without_runtime_row() {
    let server = MockServer::start().await;
    mount_page(&server, "/title/tt0000009/parentalguide", guide_page("R")).await;
    mount_page(
        &server,
        "/title/tt0000009",
        title_page("tt0000009", "Short Film (2010)", None),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let start_url = format!("{}/title/tt0000009", server.uri());
    let config = create_test_config(&start_url, None, &db_path(&dir), "");

    let coordinator = Coordinator::new(config, "test".to_string(), false).unwrap();
    coordinator.run().await.unwrap();

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let titles = stored_titles(&*storage);
    assert_eq!(titles[0]["runtime"], "");
    assert_eq!(titles[0]["country"], "USA");
    assert_eq!(titles[0]["certificate"], "R");
}

#[tokio::test]
async fn test_fresh_run_forgets_processed_tasks() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let start_url = format!("{}/title/tt0000002/", server.uri());
    let config = create_test_config(&start_url, None, &db_path(&dir), "");

    let first = Coordinator::new(config.clone(), "test".to_string(), false).unwrap();
    first.run().await.unwrap();
    drop(first);

    // Resuming finds the seed already processed
    let resumed = Coordinator::new(config.clone(), "test".to_string(), false).unwrap();
    assert_eq!(resumed.run().await.unwrap().tasks_processed, 0);
    drop(resumed);

    // A fresh run fetches it again; records are kept and appended to
    let fresh = Coordinator::new(config, "test".to_string(), true).unwrap();
    let report = fresh.run().await.unwrap();
    assert_eq!(report.tasks_processed, 2);
    assert_eq!(report.total_records, 2);
}

#[test]
fn test_empty_start_urls_is_rejected() {
    let result = parse_config(
        r#"
[run]
start-urls = []

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "./unused.db"
"#,
    );

    assert!(result.is_err());
}
