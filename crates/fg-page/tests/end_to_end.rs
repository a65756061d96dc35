//! Whole-pipeline scenarios: storage → policy store → page runtime.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use fg_page::{
    Document, FeedgateConfig, GatePhase, LinkInterceptor, LinkVerdict, MemoryDocument, MemoryHost,
    PageRuntime, SessionReasonSlot, SiteConfig, SiteProfile,
};
use fg_policy::{
    Clock, DenyReason, GrantNegotiator, JsonFileStorage, KeyValueStore, ManualClock,
    MemoryStorage, PolicyConfig, PolicyStore, SectionsEditor, StorageArea, SystemClock, Verdict,
    GRANTS_KEY, SECTIONS_KEY,
};
use tokio::task::LocalSet;
use url::Url;

struct Page {
    clock: Arc<ManualClock>,
    storage: Arc<MemoryStorage>,
    store: Arc<PolicyStore>,
    doc: Rc<MemoryDocument>,
    host: Rc<MemoryHost>,
    runtime: PageRuntime<MemoryDocument>,
}

fn page_at(url: &str) -> Page {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let storage = Arc::new(MemoryStorage::new());
    let shared: Arc<dyn KeyValueStore> = storage.clone();
    let store = Arc::new(PolicyStore::new(
        PolicyConfig::default(),
        Some(shared),
        clock.clone(),
    ));
    let doc = Rc::new(MemoryDocument::new());
    let host = Rc::new(MemoryHost::new(Url::parse(url).unwrap()));
    let runtime = PageRuntime::new(
        &FeedgateConfig::default(),
        Arc::clone(&store),
        doc.clone(),
        host.clone(),
        Rc::new(SessionReasonSlot::new()),
    )
    .unwrap();
    Page {
        clock,
        storage,
        store,
        doc,
        host,
        runtime,
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn feed_visit_is_redirected_to_default_section() {
    let page = page_at("https://www.reddit.com/r/all/");
    LocalSet::new()
        .run_until(async {
            assert!(!page.runtime.start());
            assert_eq!(
                page.host.replaced(),
                vec![Url::parse("https://www.reddit.com/r/freelance/").unwrap()]
            );
            assert!(matches!(
                page.store.decide("/r/all/"),
                Verdict::Deny {
                    reason: DenyReason::FeedBlocked(_)
                }
            ));

            // The next allowed navigation shows the reason, once.
            tokio::time::sleep(Duration::from_millis(600)).await;
            let banners = page.host.banners();
            assert_eq!(
                banners.first().cloned().flatten().as_deref(),
                Some("Redirected: Blocked path: /r/all/")
            );
            assert!(banners.iter().skip(1).all(Option::is_none));
            page.runtime.shutdown();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn page_allowed_by_defaults_is_redirected_once_policy_loads() {
    let page = page_at("https://www.reddit.com/r/freelance/");
    page.storage
        .set(StorageArea::Sync, SECTIONS_KEY, serde_json::json!(["rust"]))
        .unwrap();
    LocalSet::new()
        .run_until(async {
            assert!(page.runtime.start());
            assert!(page.host.replaced().is_empty());

            settle().await;
            assert_eq!(page.runtime.gate().phase(), GatePhase::Settled);
            assert_eq!(
                page.host.replaced(),
                vec![Url::parse("https://www.reddit.com/r/rust/").unwrap()]
            );
            page.runtime.shutdown();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn default_policy_decisions() {
    let page = page_at("https://www.reddit.com/r/freelance/");
    page.store.refresh().await;
    assert!(page.store.decide("/r/freelance/top").is_allowed());
    assert!(page.store.decide("/user/someone").is_allowed());
    assert!(!page.store.decide("/r/freelance2").is_allowed());
    assert!(!page.store.decide("/r/all/freelance").is_allowed());
}

#[tokio::test(start_paused = true)]
async fn negotiated_grant_opens_section_until_expiry() {
    let page = page_at("https://www.reddit.com/r/freelance/");
    LocalSet::new()
        .run_until(async {
            page.runtime.start();
            settle().await;
            assert!(!page.store.decide("/r/otherhobby").is_allowed());

            let negotiator = GrantNegotiator::new(page.storage.clone())
                .with_grant_ttl(chrono::Duration::hours(1));
            negotiator.start("r/OtherHobby", page.clock.now()).unwrap();
            assert!(negotiator.confirm("otherhobby", page.clock.now()).await.is_err());

            page.clock.advance(chrono::Duration::minutes(3));
            negotiator.confirm("otherhobby", page.clock.now()).await.unwrap();
            settle().await;

            // The runtime's change feed applied the grant.
            assert!(page.store.decide("/r/otherhobby/comments/1").is_allowed());
            assert_eq!(page.store.effective_sections(), vec!["freelance", "otherhobby"]);

            // Links to the granted section are no longer locked.
            let body = page.doc.append_new(page.doc.root(), "body");
            let link = page.doc.append_link(body, "/r/otherhobby/");
            page.runtime.notify_mutations(page.doc.take_mutations());
            tokio::time::sleep(Duration::from_millis(150)).await;
            assert!(page.doc.attribute(&link, "href").is_some());

            page.clock.advance(chrono::Duration::minutes(61));
            assert!(!page.store.decide("/r/otherhobby").is_allowed());
            assert_eq!(page.store.effective_sections(), vec!["freelance"]);
            assert_eq!(
                page.storage.peek(StorageArea::Local, GRANTS_KEY),
                Some(serde_json::json!([]))
            );
            page.runtime.shutdown();
        })
        .await;
}

#[tokio::test]
async fn sections_saved_to_disk_are_loaded_by_a_new_store() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn KeyValueStore> = Arc::new(JsonFileStorage::new(dir.path()).unwrap());
    let editor = SectionsEditor::new(Arc::clone(&storage), vec!["freelance".to_string()]);
    let saved = editor.save(["r/Rust", "/r/homelab", "rust", "   "]).unwrap();
    assert_eq!(saved, vec!["rust", "homelab"]);

    let reopened: Arc<dyn KeyValueStore> = Arc::new(JsonFileStorage::new(dir.path()).unwrap());
    let store = Arc::new(PolicyStore::new(
        PolicyConfig::default(),
        Some(reopened),
        Arc::new(SystemClock),
    ));
    store.refresh().await;
    assert!(store.decide("/r/rust/comments/1").is_allowed());
    assert!(!store.decide("/r/freelance").is_allowed());

    let site = SiteProfile::new(&SiteConfig::default()).unwrap();
    let interceptor = LinkInterceptor::new(store, site);
    let target = Url::parse("https://www.reddit.com/r/homelab/").unwrap();
    assert_eq!(interceptor.evaluate_url(&target), LinkVerdict::Allowed);
}
