//! HTTP API tests driving the router in-process with `oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use civitas::citations::index_record_citations;
use civitas::config::Config;
use civitas::db;
use civitas::migrate::run_migrations;
use civitas::server::{build_router, AppState};
use civitas::sqlite_store::SqliteStore;
use civitas_core::models::{Bill, Opinion, SourceRecord};
use civitas_core::store::Store;

fn opinion() -> SourceRecord {
    SourceRecord::Opinion(Opinion {
        id: "scotus-70-18".into(),
        case_name: "Roe v. Wade".into(),
        docket: Some("70-18".into()),
        us_cite: Some("410 U.S. 113".into()),
        decided_date: Some("1973-01-22".into()),
        term: Some("1972".into()),
        author: Some("Blackmun".into()),
        authors: Vec::new(),
        body: "This appeal presents constitutional challenges to state abortion statutes. \
               The Court holds the statutes unconstitutional."
            .into(),
        source: "scotus".into(),
        source_url: None,
        updated_at: 100,
    })
}

fn bill() -> SourceRecord {
    SourceRecord::Bill(Bill {
        id: Bill::make_id("ca", "20232024", "sb", 345),
        jurisdiction: "ca".into(),
        session: "20232024".into(),
        bill_type: "sb".into(),
        number: 345,
        title: "Reproductive health care".into(),
        summary_text: None,
        sponsor: None,
        introduced_date: None,
        latest_action: None,
        latest_action_date: None,
        public_law: None,
        body: "Protects reproductive health care providers. See Roe v. Wade, 410 U.S. 113."
            .into(),
        source: "california".into(),
        source_url: None,
        updated_at: 200,
    })
}

async fn setup(summarizer: &str) -> (TempDir, Router) {
    let tmp = TempDir::new().unwrap();
    let toml = format!(
        "[db]\npath = \"{}/civ.sqlite\"\n\n[summarizer]\nprovider = \"{}\"\n",
        tmp.path().display(),
        summarizer
    );
    let config: Config = toml::from_str(&toml).unwrap();
    run_migrations(&config).await.unwrap();

    let pool = db::connect(&config).await.unwrap();
    let store = SqliteStore::new(pool.clone());
    for record in [opinion(), bill()] {
        store.upsert_record(&record).await.unwrap();
        index_record_citations(&store, &record).await.unwrap();
    }
    pool.close().await;

    (tmp, build_router(AppState::new(config)))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    call(app, Method::GET, uri, None).await
}

#[tokio::test]
async fn test_health() {
    let (_tmp, app) = setup("disabled").await;
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_search_endpoint() {
    let (_tmp, app) = setup("disabled").await;

    let (status, body) = get(&app, "/api/search?q=abortion&explain=true").await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["kind"], "opinion");
    assert!(results[0]["explain"].is_object());

    let (status, body) = get(&app, "/api/search?q=410%20U.S.%20113&kind=opinion").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["id"], "scotus-70-18");
    assert_eq!(body["results"][0]["score"], 1.0);

    let (status, body) = get(&app, "/api/search?q=reproductive&jurisdiction=CA&limit=500").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["id"], "ca-20232024-sb345");

    let (status, body) = get(&app, "/api/search?q=%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = get(&app, "/api/search?q=x&kind=statute").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/api/search?q=x&since=last-week").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_and_get_records() {
    let (_tmp, app) = setup("disabled").await;

    let (status, body) = get(&app, "/api/bills?jurisdiction=ca&session=20232024").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);

    let (status, body) = get(&app, "/api/executive-orders").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["results"].as_array().unwrap().is_empty());

    let (status, body) = get(&app, "/api/bills/ca-20232024-sb345").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "bill");
    assert_eq!(body["record"]["session"], "20232024");
    assert_eq!(body["citations"][0]["target"]["id"], "scotus-70-18");
    assert!(body["summary"].is_null());

    let (status, body) = get(&app, "/api/opinions/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = get(&app, "/api/statutes").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_citation_endpoints() {
    let (_tmp, app) = setup("disabled").await;

    let (status, body) = get(&app, "/api/bills/ca-20232024-sb345/citations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["citations"][0]["normalized"], "410 U.S. 113");

    let (status, body) = get(&app, "/api/opinions/scotus-70-18/cited-by").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cited_by"][0]["id"], "ca-20232024-sb345");

    let (status, _) = get(&app, "/api/opinions/scotus-00-0/cited-by").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/citations/resolve",
        Some(json!({ "text": "Roe v. Wade, 410 U.S. 113 (1973); id. at 153; 42 U.S.C. § 1983" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let citations = body["citations"].as_array().unwrap();
    assert_eq!(citations.len(), 3);
    assert_eq!(citations[0]["target"]["id"], "scotus-70-18");
    assert_eq!(citations[1]["target"]["id"], "scotus-70-18");
    assert!(citations[2]["target"].is_null());

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/citations/resolve",
        Some(json!({ "text": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_summarize_endpoint() {
    let (_tmp, app) = setup("disabled").await;
    let (status, body) = call(&app, Method::POST, "/api/opinions/scotus-70-18/summarize", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "summaries_disabled");

    let (_tmp, app) = setup("extractive").await;
    let (status, body) = call(&app, Method::POST, "/api/opinions/scotus-70-18/summarize", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "extractive");
    assert!(body["summary"].as_str().unwrap().starts_with("This appeal"));

    let (_, body) = get(&app, "/api/opinions/scotus-70-18").await;
    assert_eq!(body["summary"]["stale"], false);

    let (status, _) = call(&app, Method::POST, "/api/opinions/nope/summarize", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let (_tmp, app) = setup("disabled").await;
    let (status, body) = get(&app, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["citations"]["total"], 1);
    assert_eq!(body["citations"]["resolved"], 1);
    assert_eq!(body["records"].as_array().unwrap().len(), 2);
}
