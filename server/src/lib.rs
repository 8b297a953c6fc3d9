use ads_core::{Ad, AdId, Deadline, Engine, EngineError, Selection, StoreError};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const DEFAULT_PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Search Ads</title></head>
<body>
<form action="/search-ads" method="get"><input name="q" value="$query$"><button type="submit">Search</button></form>
<ul class="ads">
$list$
</ul>
</body>
</html>
"#;

pub const DEFAULT_AD_TEMPLATE: &str = r#"<li class="ad"><a href="$detail_url$"><img src="$thumbnail$" alt=""> $title$</a> <span class="brand">$brand$</span> <span class="category">$category$</span> <span class="price">$price$</span></li>
"#;

#[derive(Deserialize)]
pub struct SearchParams {
    /// Absent is treated as the empty query.
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    /// False when a store failure may have hidden some matches.
    pub complete: bool,
    pub results: Vec<Ad>,
}

/// Page and per-ad HTML templates with `$name$` placeholders.
pub struct Templates {
    pub page: String,
    pub ad: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self { page: DEFAULT_PAGE_TEMPLATE.to_string(), ad: DEFAULT_AD_TEMPLATE.to_string() }
    }
}

impl Templates {
    pub fn load(page: Option<&std::path::Path>, ad: Option<&std::path::Path>) -> Result<Self> {
        let read = |p: &std::path::Path| std::fs::read_to_string(p).with_context(|| format!("reading template {}", p.display()));
        Ok(Self {
            page: match page { Some(p) => read(p)?, None => DEFAULT_PAGE_TEMPLATE.to_string() },
            ad: match ad { Some(p) => read(p)?, None => DEFAULT_AD_TEMPLATE.to_string() },
        })
    }

    pub fn render(&self, query: &str, ads: &[Ad]) -> String {
        let mut list = String::new();
        for ad in ads {
            list.push_str(&fill(&self.ad, |name| match name {
                "title" => Some(escape_html(&ad.title)),
                "brand" => Some(escape_html(&ad.brand)),
                "thumbnail" => Some(escape_html(&ad.thumbnail)),
                "detail_url" => Some(escape_html(&ad.detail_url)),
                "category" => Some(escape_html(&ad.category)),
                "price" => Some(format!("{:.2}", ad.price)),
                "ad_id" => Some(ad.ad_id.to_string()),
                _ => None,
            }));
        }
        fill(&self.page, |name| match name {
            "query" => Some(escape_html(query)),
            "list" => Some(list.clone()),
            _ => None,
        })
    }
}

/// Single pass over `template`; substituted text is never rescanned and unknown
/// `$name$` pairs are left as written. The `$name$` syntax is what the existing
/// results-page and ad template files use, which no templating engine reads as is.
fn fill(template: &str, value: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('$') else {
            rest = &rest[start..];
            break;
        };
        let name = &after[..end];
        match value(name) {
            Some(v) => {
                out.push_str(&v);
                rest = &after[end + 1..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub templates: Arc<Templates>,
    pub query_timeout: Option<Duration>,
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search-ads", get(search_page))
        .route("/api/search", get(search_api))
        .route("/ad/:ad_id", get(ad_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Runs the engine off the async workers.
async fn select(state: &AppState, query: String) -> Result<Selection, EngineError> {
    let engine = Arc::clone(&state.engine);
    let deadline = state.query_timeout.map(Deadline::after).unwrap_or_default();
    joined(tokio::task::spawn_blocking(move || engine.select_ads_within(&query, deadline)).await)
}

/// A worker that died counts as an empty, incomplete result.
fn joined(result: Result<Result<Selection, EngineError>, tokio::task::JoinError>) -> Result<Selection, EngineError> {
    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "query task failed");
        Ok(Selection { ads: Vec::new(), errors: vec![StoreError::operation("query worker", e)] })
    })
}

/// HTML results page. Never an error page: failures render as an empty list.
pub async fn search_page(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Html<String> {
    let query = params.q.unwrap_or_default();
    let ads = match select(&state, query.clone()).await {
        Ok(selection) => selection.ads,
        Err(e) => {
            tracing::warn!(error = %e, "search page served without results");
            Vec::new()
        }
    };
    Html(state.templates.render(&query, &ads))
}

pub async fn search_api(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = Instant::now();
    let query = params.q.unwrap_or_default();
    let selection = select(&state, query.clone()).await.map_err(unavailable)?;
    let complete = selection.is_complete();
    Ok(Json(SearchResponse {
        query,
        took_s: start.elapsed().as_secs_f64(),
        total_hits: selection.ads.len(),
        complete,
        results: selection.ads,
    }))
}

pub async fn ad_handler(
    State(state): State<AppState>,
    Path(ad_id): Path<AdId>,
) -> Result<Json<Ad>, (StatusCode, String)> {
    let engine = Arc::clone(&state.engine);
    let found = tokio::task::spawn_blocking(move || engine.get_ad(ad_id))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(unavailable)?;
    found.map(Json).ok_or_else(|| (StatusCode::NOT_FOUND, format!("ad {ad_id} not found")))
}

fn unavailable(err: EngineError) -> (StatusCode, String) {
    (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_substitutes_known_names_once() {
        let out = fill("a $x$ b $y$ $$ c $", |n| (n == "x").then(|| "$y$".to_string()));
        assert_eq!(out, "a $y$ b $y$ $$ c $");
    }

    #[test]
    fn render_escapes_ad_fields() {
        let templates = Templates { page: "<ul>$list$</ul>".into(), ad: "<li>$title$</li>".into() };
        let ad = Ad::new(1, 1, "Shoes <b>&</b> socks");
        assert_eq!(templates.render("q", &[ad]), "<ul><li>Shoes &lt;b&gt;&amp;&lt;/b&gt; socks</li></ul>");
    }

    #[tokio::test]
    async fn dead_query_worker_is_an_incomplete_result() {
        let died = tokio::task::spawn_blocking(|| -> Result<Selection, EngineError> { panic!("worker died") }).await;
        let selection = joined(died).unwrap();
        assert!(selection.ads.is_empty());
        assert!(!selection.is_complete());
    }
}
