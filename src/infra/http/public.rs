use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header::CACHE_CONTROL},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::debug;

use crate::application::pagination::parse_page;
use crate::domain::entities::CategoryMeta;

use super::{
    HttpState, category_slug, db_health_response,
    middleware::{log_responses, set_request_context},
};

/// Read surface. `/categories` and `/_health` shadow categories of the same slug.
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/categories", get(categories))
        .route("/_health", get(health))
        .route("/{slug}", get(first_page))
        .route("/{slug}/page/{page}", get(category_page))
        .route("/{slug}/meta", get(meta))
        .route("/{slug}/breadcrumbs", get(breadcrumbs))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContextQuery {
    context: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

async fn root(State(state): State<HttpState>) -> Response {
    fragment_response(state.engine.listing.root_fragment().await)
}

async fn categories(
    State(state): State<HttpState>,
    Query(query): Query<ContextQuery>,
) -> Response {
    let entries = state
        .engine
        .listing
        .list_categories(query.context.as_deref())
        .await;
    Json(entries).into_response()
}

async fn first_page(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    render_page(&state, &slug, Some(1)).await
}

async fn category_page(
    State(state): State<HttpState>,
    Path((slug, page)): Path<(String, String)>,
) -> Response {
    render_page(&state, &slug, parse_page(&page)).await
}

async fn render_page(state: &HttpState, raw_slug: &str, page: Option<u32>) -> Response {
    // Page zero is never in range, so malformed input falls through to the placeholder.
    let page = page.unwrap_or(0);
    let slug = match category_slug(raw_slug) {
        Ok(slug) => slug,
        Err(err) => {
            debug!(slug = raw_slug, error = %err, "unusable category slug");
            String::new()
        }
    };
    fragment_response(
        state
            .engine
            .listing
            .category_page_fragment(&slug, page)
            .await,
    )
}

async fn meta(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    let meta = match category_slug(&slug) {
        Ok(slug) => state.engine.listing.category_meta(&slug).await,
        Err(_) => CategoryMeta::empty(),
    };
    Json(meta).into_response()
}

async fn breadcrumbs(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let page = query.page.as_deref().and_then(parse_page).unwrap_or(1);
    let crumbs = match category_slug(&slug) {
        Ok(slug) => state.engine.listing.breadcrumbs(&slug, page).await,
        Err(_) => Vec::new(),
    };
    Json(crumbs).into_response()
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.db.as_ref() {
        Some(db) => db_health_response(db.health_check().await),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

fn fragment_response(html: String) -> Response {
    let mut response = Html(html).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}
