//! Admin-facing JSON API over the ingestion service.
//!
//! Every response carries the `{"success": …}` envelope the admin panel
//! already speaks: `{"success": true, "data": …}` on 2xx and
//! `{"success": false, "error": message}` otherwise. Validation failures
//! map to 400, an unresolvable settings row to 404, everything else that
//! goes wrong inside an operation to 500.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use gamekeys_ingest::{IngestError, IngestService};

pub const CRATE_NAME: &str = "gamekeys-web";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IngestService>,
}

impl AppState {
    pub fn new(service: Arc<IngestService>) -> Self {
        Self { service }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/admin/scrape-game", post(scrape_game_handler))
        .route("/admin/bulk-scrape", post(bulk_scrape_handler))
        .route("/admin/update-prices", post(update_prices_handler))
        .route("/admin/calculate-price", post(calculate_price_handler))
        .route("/admin/settings", get(get_settings_handler))
        .route("/admin/settings", put(update_settings_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeGameRequest {
    url: Option<String>,
    category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkScrapeRequest {
    urls: Option<Vec<String>>,
    category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePricesRequest {
    game_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalculatePriceRequest {
    uah_price: Option<f64>,
    custom_markup: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSettingsRequest {
    exchange_rate: Option<f64>,
    markup_percent: Option<f64>,
}

async fn healthz_handler() -> Response {
    ok(json!({ "service": CRATE_NAME, "status": "ok" }))
}

async fn scrape_game_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ScrapeGameRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let Some(url) = request.url.filter(|url| !url.trim().is_empty()) else {
        return bad_request("Please provide a game URL");
    };

    match state.service.scrape_one(&url, request.category_id).await {
        Ok(record) => ok(record),
        Err(err) => ingest_error(err),
    }
}

async fn bulk_scrape_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BulkScrapeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let Some(urls) = request.urls.filter(|urls| !urls.is_empty()) else {
        return bad_request("Please provide an array of game URLs");
    };

    ok(state.service.scrape_bulk(&urls, request.category_id).await)
}

async fn update_prices_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdatePricesRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let Some(game_ids) = request.game_ids.filter(|ids| !ids.is_empty()) else {
        return bad_request("Please provide an array of game IDs");
    };

    ok(state.service.refresh_prices(&game_ids).await)
}

async fn calculate_price_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CalculatePriceRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let Some(uah_price) = request.uah_price else {
        return bad_request("Please provide a UAH price");
    };

    match state
        .service
        .calculate_price(uah_price, request.custom_markup)
        .await
    {
        Ok(breakdown) => ok(breakdown),
        Err(err) => ingest_error(err),
    }
}

async fn get_settings_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.service.get_or_init_settings().await {
        Ok(settings) => ok(settings),
        Err(err) => ingest_error(err),
    }
}

async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdateSettingsRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    match state
        .service
        .update_settings(request.exchange_rate, request.markup_percent)
        .await
    {
        Ok(settings) => ok(settings),
        Err(err) => ingest_error(err),
    }
}

fn ok<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": data })),
    )
        .into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    fail(StatusCode::BAD_REQUEST, message.into())
}

fn fail(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": message })),
    )
        .into_response()
}

fn ingest_error(err: IngestError) -> Response {
    let status = match &err {
        IngestError::Validation(_) => StatusCode::BAD_REQUEST,
        IngestError::Settings(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!(error = %err, "admin operation failed");
    }
    fail(status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use gamekeys_ingest::memory::{MemoryCatalogStore, MemorySettingsStore, StaticPageFetcher};

    const PRODUCT_URL: &str = "https://store.playstation.com/ru-ua/product/STRAY";

    const PRODUCT_PAGE: &str = r#"<html><body>
        <h1 class="psw-m-b-5">Stray</h1>
        <div class="psw-fill-x psw-l-stack-left">
            <span data-qa="mfeCtaMain#offer0#finalPrice">599,40 UAH</span>
            <span data-qa="mfeCtaMain#offer0#originalPrice">999 UAH</span>
            <span data-qa="mfeCtaMain#offer0#discountInfo">Сэкономьте 40%</span>
        </div>
        <script type="application/ld+json">{"@type":"Product","sku":"EP4365-PPSA04841_00-STRAY"}</script>
        <dd data-qa="gameInfo#releaseInformation#releaseDate-value">19.7.2022</dd>
        </body></html>"#;

    fn test_app() -> Router {
        let fetcher = StaticPageFetcher::new().with_page(PRODUCT_URL, PRODUCT_PAGE);
        let service = IngestService::new(
            Box::new(fetcher),
            Box::new(MemoryCatalogStore::new()),
            Box::new(MemorySettingsStore::new()),
        );
        app(AppState::new(Arc::new(service)))
    }

    fn broken_settings_app() -> Router {
        let service = IngestService::new(
            Box::new(StaticPageFetcher::new()),
            Box::new(MemoryCatalogStore::new()),
            Box::new(MemorySettingsStore::broken()),
        );
        app(AppState::new(Arc::new(service)))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.expect("body").to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let resp = test_app()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn scrape_game_requires_a_url() {
        let resp = test_app()
            .oneshot(post_json("/admin/scrape-game", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Please provide a game URL");
    }

    #[tokio::test]
    async fn scrape_game_rejects_foreign_hosts() {
        let resp = test_app()
            .oneshot(post_json(
                "/admin/scrape-game",
                json!({ "url": "https://example.com/product/X" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn scrape_game_returns_the_persisted_record() {
        let resp = test_app()
            .oneshot(post_json(
                "/admin/scrape-game",
                json!({ "url": PRODUCT_URL }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["title"], "Stray");
        assert_eq!(body["data"]["originalPrice"], 999.0);
        assert_eq!(body["data"]["discountPercentage"], "40%");
        assert!(body["data"]["id"].is_string());
    }

    #[tokio::test]
    async fn scrape_game_maps_fetch_failures_to_500() {
        let resp = test_app()
            .oneshot(post_json(
                "/admin/scrape-game",
                json!({ "url": "https://store.playstation.com/ru-ua/product/MISSING" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn bulk_scrape_requires_a_url_list() {
        for body in [json!({}), json!({ "urls": [] })] {
            let resp = test_app()
                .oneshot(post_json("/admin/bulk-scrape", body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }

        let resp = test_app()
            .oneshot(post_json("/admin/bulk-scrape", json!({ "urls": "one" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bulk_scrape_reports_partial_failure_as_200() {
        let resp = test_app()
            .oneshot(post_json(
                "/admin/bulk-scrape",
                json!({ "urls": [
                    PRODUCT_URL,
                    "https://store.playstation.com/ru-ua/product/MISSING",
                ] }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["totalProcessed"], 2);
        assert_eq!(body["data"]["successCount"], 1);
        assert_eq!(body["data"]["failedCount"], 1);
        assert_eq!(
            body["data"]["failures"][0]["url"],
            "https://store.playstation.com/ru-ua/product/MISSING"
        );
    }

    #[tokio::test]
    async fn update_prices_requires_an_id_list() {
        let resp = test_app()
            .oneshot(post_json("/admin/update-prices", json!({ "gameIds": [] })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_prices_reports_unknown_ids_per_item() {
        let resp = test_app()
            .oneshot(post_json(
                "/admin/update-prices",
                json!({ "gameIds": ["not-a-uuid"] }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["failedCount"], 1);
        assert_eq!(body["data"]["failures"][0]["error"], "Game not found");
    }

    #[tokio::test]
    async fn calculate_price_validates_and_uses_default_markup() {
        let resp = test_app()
            .oneshot(post_json("/admin/calculate-price", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test_app()
            .oneshot(post_json(
                "/admin/calculate-price",
                json!({ "uahPrice": 100.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["costPrice"], 250.0);
        assert_eq!(body["data"]["finalPrice"], 375);

        let resp = test_app()
            .oneshot(post_json(
                "/admin/calculate-price",
                json!({ "uahPrice": 100.0, "customMarkup": 0.0 }),
            ))
            .await
            .unwrap();
        let body = body_json(resp).await;
        assert_eq!(body["data"]["finalPrice"], 250);
    }

    #[tokio::test]
    async fn calculate_price_maps_missing_settings_to_404() {
        let resp = broken_settings_app()
            .oneshot(post_json(
                "/admin/calculate-price",
                json!({ "uahPrice": 100.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn settings_roundtrip_lazily_creates_then_updates() {
        let app = test_app();

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/admin/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["exchangeRate"], 2.5);
        assert_eq!(body["data"]["markupPercent"], 50.0);

        let resp = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/admin/settings")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "exchangeRate": 3.2, "markupPercent": 35.0 }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["exchangeRate"], 3.2);
        assert_eq!(body["data"]["markupPercent"], 35.0);
    }

    #[tokio::test]
    async fn malformed_json_bodies_map_to_400() {
        let resp = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/scrape-game")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
    }
}
