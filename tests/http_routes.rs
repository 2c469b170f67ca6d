mod support;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use folio::domain::entities::{CategoryEntry, CategoryMeta, Crumb};
use folio::infra::http::{FlushResponse, HttpState, build_admin_router, build_router};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use support::{after_debounce, engine, post, seeded_repo};

const RELEASE_NOTES: i64 = 40;

async fn send(router: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let request = builder.body(body).expect("request should build");
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

async fn get_json<T: DeserializeOwned>(router: &Router, uri: &str) -> T {
    let (status, body) = send(router, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::OK, "GET {uri}: {body}");
    serde_json::from_str(&body).expect("json body")
}

#[tokio::test]
async fn public_routes_serve_fragments_and_json() {
    let state = HttpState::new(engine(seeded_repo(12), 5));
    let router = build_router(state);

    let (status, html) = send(&router, Method::GET, "/news", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Item 12"));
    assert!(!html.contains("Item 7<"));

    let (status, html) = send(&router, Method::GET, "/news/page/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Item 2"));

    let meta: CategoryMeta = get_json(&router, "/news/meta").await;
    assert_eq!(meta.total_items, 12);
    assert_eq!(meta.total_pages, 3);

    let entries: Vec<CategoryEntry> = get_json(&router, "/categories").await;
    assert_eq!(
        entries.iter().filter(|entry| entry.slug == "news").count(),
        3
    );

    let crumbs: Vec<Crumb> = get_json(&router, "/news/breadcrumbs?page=2").await;
    assert_eq!(crumbs.len(), 3);
    assert_eq!(crumbs[2].label, "Page 2");

    let (status, root) = send(&router, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(root.contains("News"));
}

#[tokio::test]
async fn malformed_and_out_of_range_pages_render_the_placeholder() {
    let router = build_router(HttpState::new(engine(seeded_repo(12), 5)));

    for uri in ["/news/page/abc", "/news/page/0", "/news/page/-1", "/news/page/99", "/nowhere"] {
        let (status, html) = send(&router, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(html.contains("listing-empty"), "{uri} should be empty");
    }

    let meta: CategoryMeta = get_json(&router, "/nowhere/meta").await;
    assert_eq!(meta.total_items, 0);
}

#[tokio::test]
async fn stored_slugs_are_reachable_verbatim() {
    let repo = seeded_repo(0);
    repo.add_term(RELEASE_NOTES, "release_notes", "Release notes", None);
    repo.insert_item(post(42), &[RELEASE_NOTES]);
    let router = build_router(HttpState::new(engine(repo, 5)));

    let (_, root) = send(&router, Method::GET, "/", None).await;
    assert!(root.contains("release_notes"), "{root}");

    let (status, html) = send(&router, Method::GET, "/release_notes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Item 42"), "{html}");

    let meta: CategoryMeta = get_json(&router, "/release_notes/meta").await;
    assert_eq!(meta.total_items, 1);

    // Lookups are exact; a differently cased slug is another category.
    let meta: CategoryMeta = get_json(&router, "/RELEASE_NOTES/meta").await;
    assert_eq!(meta.total_items, 0);

    let meta: CategoryMeta = get_json(&router, "/a%3Ab/meta").await;
    assert_eq!(meta.total_items, 0);
}

#[tokio::test]
async fn admin_transition_schedules_and_flush_drops_jobs() {
    let engine = engine(seeded_repo(3), 5);
    let admin = build_admin_router(HttpState::new(engine.clone()));

    let payload = r#"{
        "new_status": "published",
        "old_status": "draft",
        "item": { "id": 2, "content_type": "post" }
    }"#;
    let (status, body) = send(&admin, Method::POST, "/transitions", Some(payload)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("news"));

    let (status, body) = send(&admin, Method::GET, "/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("news"));

    let (status, body) = send(&admin, Method::POST, "/jobs/flush", None).await;
    assert_eq!(status, StatusCode::OK);
    let flushed: FlushResponse = serde_json::from_str(&body).expect("flush body");
    assert_eq!(flushed.removed, 1);
    assert!(engine.queue.pending().await.expect("pending").is_empty());
}

#[tokio::test]
async fn admin_regenerate_and_cache_flush() {
    let engine = engine(seeded_repo(3), 5);
    let admin = build_admin_router(HttpState::new(engine.clone()));

    let (status, body) = send(&admin, Method::POST, "/categories/news/regenerate", None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("\"category\":\"news\""));
    assert!(body.contains("scheduled"));

    let tick = engine
        .worker
        .run_due(after_debounce())
        .await
        .expect("queue available");
    assert_eq!(tick.completed.len(), 1);

    let (status, body) = send(&admin, Method::POST, "/cache/flush", None).await;
    assert_eq!(status, StatusCode::OK);
    let flushed: FlushResponse = serde_json::from_str(&body).expect("flush body");
    assert!(flushed.removed > 0);
}

#[tokio::test]
async fn admin_rejects_malformed_transitions() {
    let admin = build_admin_router(HttpState::new(engine(seeded_repo(3), 5)));

    let (status, _) = send(
        &admin,
        Method::POST,
        "/transitions",
        Some(r#"{"new_status":"exploded"}"#),
    )
    .await;
    assert!(status.is_client_error());

    let (status, _) = send(&admin, Method::POST, "/categories/a%3Ab/regenerate", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
