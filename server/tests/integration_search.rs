use ads_core::store::{MemoryMultiMap, MemoryStore, SledStore};
use ads_core::{Engine, Stores};
use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use server::{build_app, AppState, Templates};
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

const SYNONYMS: &str = r#"{"word": "sneaker", "synonyms": ["shoe"]}"#;
const CAMPAIGNS: &str = r#"{"campaign_id": 1, "budget": 500}"#;
const ADS: &str = r#"[
{"ad_id": [1], "campaign_id": [1], "title": ["Red Running Shoes"], "price": [30], "brand": ["Acme"]},
{"ad_id": [2], "campaign_id": [1], "title": ["Kids <Light-Up> Shoes"], "price": [20]},
{"ad_id": [3], "campaign_id": [1], "title": ["Wool Socks"]}
]"#;

fn app_with(stores: Stores) -> Router {
    let engine = Engine::new(stores);
    engine.ingest(SYNONYMS.as_bytes(), CAMPAIGNS.as_bytes(), ADS.as_bytes()).unwrap();
    build_app(AppState {
        engine: Arc::new(engine),
        templates: Arc::new(Templates::default()),
        query_timeout: None,
    })
}

async fn call(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

#[tokio::test]
async fn api_search_returns_ads_in_discovery_order() {
    let app = app_with(Stores::in_memory());

    let (status, body) = call(app, "/api/search?q=sneakers").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 2);
    assert_eq!(json["complete"], true);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr[0]["ad_id"], 1);
    assert_eq!(arr[1]["ad_id"], 2);
    assert_eq!(arr[0]["brand"], "Acme");
}

#[tokio::test]
async fn html_page_renders_escaped_titles() {
    let app = app_with(Stores::in_memory());

    let (status, body) = call(app, "/search-ads?q=shoes").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("Red Running Shoes"));
    assert!(html.contains("Kids &lt;Light-Up&gt; Shoes"));
    assert!(!html.contains("Wool Socks"));
    assert!(html.contains(r#"value="shoes""#));
}

#[tokio::test]
async fn missing_query_renders_empty_page() {
    let app = app_with(Stores::in_memory());
    let (status, body) = call(app, "/search-ads").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(!html.contains("class=\"ad\""));
}

#[tokio::test]
async fn unreachable_index_degrades_to_empty_results() {
    let index = Arc::new(MemoryMultiMap::new("inverted_index"));
    let stores = Stores {
        records: Arc::new(MemoryStore::new()),
        inverted_index: index.clone(),
        synonyms: Arc::new(MemoryMultiMap::new("synonyms")),
    };
    let app = app_with(stores);
    index.set_available(false);

    let (status, body) = call(app, "/api/search?q=shoes").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 0);
    assert_eq!(json["complete"], false);
}

#[tokio::test]
async fn ad_route_reads_from_sled() {
    let dir = tempdir().unwrap();
    let store = SledStore::open(dir.path()).unwrap();
    let app = app_with(Stores::sled(&store));

    let (status, body) = call(app.clone(), "/ad/3").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["title"], "Wool Socks");
    assert_eq!(json["price"], 100.0);

    let (status, _) = call(app, "/ad/404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn engine_that_never_ingested_reports_unavailable() {
    let app = build_app(AppState {
        engine: Arc::new(Engine::new(Stores::in_memory())),
        templates: Arc::new(Templates::default()),
        query_timeout: None,
    });
    let (status, _) = call(app, "/api/search?q=shoes").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
