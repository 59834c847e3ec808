//! HTTP surface of the service.
//!
//! Handlers only orchestrate: URL validation lives in [`crate::post_url`],
//! ranking in [`crate::formats`], the cache in [`crate::cache`] and the
//! cookie transforms in [`crate::cookies`]. Extractor calls block, so they
//! run on tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

use crate::cache::{VideoCache, cache_key};
use crate::config::DetectionStrategy;
use crate::cookies::{
    BrowserCookie, CookieError, count_jar_entries, parse_cookie_export, render_cookie_jar,
    render_uploaded_jar, write_cookie_jar,
};
use crate::error::FetchError;
use crate::extractor::{Extractor, probe_cookies};
use crate::post_url::PostUrl;
use crate::video::{VideoSummary, build_summary};

#[derive(Clone)]
pub struct AppState {
    cache: Arc<VideoCache>,
    extractor: Arc<dyn Extractor>,
    cookies_file: Arc<PathBuf>,
    detection: DetectionStrategy,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        let status = match &err {
            FetchError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            FetchError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            FetchError::Forbidden(_) => StatusCode::FORBIDDEN,
            FetchError::NotFound(_) => StatusCode::NOT_FOUND,
            FetchError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.user_message(),
        }
    }
}

impl From<CookieError> for ApiError {
    fn from(err: CookieError) -> Self {
        match err {
            CookieError::Json(_) => Self::bad_request("Invalid JSON format"),
            CookieError::Shape => Self::bad_request(err.to_string()),
            CookieError::Io(_) => Self::internal(format!("Error processing cookies: {err}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let body = json!({
            "error": self.message,
        });
        (self.status, headers, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

const COOKIE_MANAGER_PAGE: &str = include_str!("cookie_manager.html");

#[derive(Debug, Deserialize)]
struct VideoRequest {
    url: String,
    #[serde(default)]
    is_adult_content: bool,
}

#[derive(Debug, Deserialize)]
struct TestParams {
    url: Option<String>,
    adult: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CookiesRequest {
    #[serde(default)]
    cookies: Vec<BrowserCookie>,
}

#[derive(Debug, Deserialize)]
struct RawCookiesRequest {
    raw_cookies: String,
}

#[derive(Debug, Serialize)]
struct CookiesResponse {
    success: bool,
    message: String,
    cookies_count: usize,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/video/fetch", post(fetch_video))
        .route("/test", get(test_extraction))
        .route("/auth/cookies", post(upload_cookies).delete(clear_cookies))
        .route("/auth/status", get(auth_status))
        .route("/cookies/add-raw", post(add_raw_cookies))
        .route("/cookies/validate", get(validate_cookies).post(validate_cookies))
        .route("/cookies/status", get(cookies_status))
        .route("/cookies/manager", get(cookie_manager))
        .route("/cache/stats", get(cache_stats))
        .route("/cache/clear", post(clear_cache))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "xgrab video URL service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "fetch_video": "POST /video/fetch",
            "test": "GET /test?url=...&adult=true",
            "upload_cookies": "POST /auth/cookies",
            "clear_cookies": "DELETE /auth/cookies",
            "auth_status": "GET /auth/status",
            "add_raw_cookies": "POST /cookies/add-raw",
            "validate_cookies": "GET /cookies/validate",
            "cookies_status": "GET /cookies/status",
            "cookie_manager": "GET /cookies/manager",
            "cache_stats": "GET /cache/stats",
            "cache_clear": "POST /cache/clear",
        },
    }))
}

async fn fetch_video(
    State(state): State<AppState>,
    Json(request): Json<VideoRequest>,
) -> ApiResult<Json<VideoSummary>> {
    let url = PostUrl::parse(&request.url)?;
    let summary = state
        .fetch(url, request.is_adult_content)
        .await
        .inspect_err(|err| warn!(error = %err, "video extraction failed"))?;
    Ok(Json(summary))
}

/// Browser-friendly probe: never cached, and failures still answer 200 with
/// a short hint so they render nicely in a tab.
async fn test_extraction(
    State(state): State<AppState>,
    Query(params): Query<TestParams>,
) -> Json<Value> {
    let raw = params.url.unwrap_or_default();
    let adult = params.adult.unwrap_or(true);

    let url = match PostUrl::parse(&raw) {
        Ok(url) => url,
        Err(_) => {
            return Json(json!({
                "error": "Invalid Twitter/X URL",
                "example": "https://x.com/user/status/123456789",
            }));
        }
    };

    match state.extract_summary(&url, adult).await {
        Ok(summary) => Json(json!({
            "status": "SUCCESS",
            "title": summary.title,
            "duration": summary.duration_formatted,
            "quality": summary.quality,
            "uploader": summary.uploader,
            "content_rating": summary.content_rating,
            "format": summary.format,
            "filename": summary.filename,
            "download_url": summary.download_url,
            "thumbnail": summary.thumbnail,
            "file_size": summary.file_size,
            "expires_at": summary.expires_at,
            "test_info": {
                "url_tested": url.as_str(),
                "adult_content": adult,
                "timestamp": Utc::now().timestamp(),
            },
        })),
        Err(err) => Json(json!({
            "status": "ERROR",
            "error": err.short_hint(),
            "url_tested": raw,
            "adult_content": adult,
            "help": {
                "cookie_status": "/auth/status",
                "upload_cookies": "Drop raw_cookies.json into the watched folder",
                "cookie_manager": "/cookies/manager",
            },
        })),
    }
}

async fn upload_cookies(
    State(state): State<AppState>,
    Json(request): Json<CookiesRequest>,
) -> ApiResult<Json<Value>> {
    if request.cookies.is_empty() {
        return Err(ApiError::bad_request("No cookies provided"));
    }
    let jar = render_uploaded_jar(&request.cookies);
    let path = state.cookies_file.clone();
    blocking(move || write_cookie_jar(&path, &jar)).await??;
    info!(count = request.cookies.len(), "stored uploaded cookies");

    Ok(Json(json!({
        "message": "Cookies uploaded successfully! You can now access private/restricted content.",
        "cookies_count": request.cookies.len(),
    })))
}

async fn clear_cookies(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let path = state.cookies_file.clone();
    blocking(move || match std::fs::remove_file(path.as_path()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    })
    .await?
    .map_err(|err| ApiError::internal(format!("Error clearing cookies: {err}")))?;

    Ok(Json(json!({ "message": "Cookies cleared successfully" })))
}

async fn auth_status(State(state): State<AppState>) -> Json<Value> {
    let count = state.jar_entries().await;
    let authenticated = count.is_some();
    Json(json!({
        "authenticated": authenticated,
        "cookie_count": count.unwrap_or(0),
        "status": if authenticated {
            "Ready for private content"
        } else {
            "Upload cookies to access private content"
        },
    }))
}

async fn add_raw_cookies(
    State(state): State<AppState>,
    Json(request): Json<RawCookiesRequest>,
) -> ApiResult<Json<CookiesResponse>> {
    let value: Value = serde_json::from_str(&request.raw_cookies)
        .map_err(|_| ApiError::bad_request("Invalid JSON format"))?;
    if !value.is_array() {
        return Err(ApiError::bad_request("Cookies must be an array"));
    }
    let cookies = parse_cookie_export(&request.raw_cookies)?;
    let jar = render_cookie_jar(&cookies);
    let count = jar.records_seen;

    let path = state.cookies_file.clone();
    blocking(move || write_cookie_jar(&path, &jar)).await??;
    info!(count, "converted raw cookies");

    Ok(Json(CookiesResponse {
        success: true,
        message: format!("Successfully converted {count} cookies to Netscape format"),
        cookies_count: count,
    }))
}

async fn validate_cookies(State(state): State<AppState>) -> ApiResult<Json<CookiesResponse>> {
    if !state.cookies_file.exists() {
        return Ok(Json(CookiesResponse {
            success: false,
            message: "No cookies file found. Please add cookies first.".to_owned(),
            cookies_count: 0,
        }));
    }

    let extractor = state.extractor.clone();
    let jar = state.cookies_file.clone();
    let probe = blocking(move || probe_cookies(extractor.as_ref(), &jar)).await?;
    let count = state.jar_entries().await.unwrap_or(0);

    Ok(Json(CookiesResponse {
        success: probe.valid,
        message: probe.message,
        cookies_count: count,
    }))
}

async fn cookies_status(State(state): State<AppState>) -> Json<CookiesResponse> {
    let response = match state.jar_entries().await {
        Some(count) => CookiesResponse {
            success: true,
            message: format!("Cookies file exists with {count} entries"),
            cookies_count: count,
        },
        None => CookiesResponse {
            success: false,
            message: "No cookies file found".to_owned(),
            cookies_count: 0,
        },
    };
    Json(response)
}

/// Browser page that drives the cookie endpoints.
async fn cookie_manager() -> Html<&'static str> {
    Html(COOKIE_MANAGER_PAGE)
}

async fn cache_stats(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "cache_size": state.cache.len(),
        "cache_enabled": true,
        "ttl_seconds": state.cache.ttl().num_seconds(),
    }))
}

async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    let removed = state.cache.clear();
    info!(removed, "cache cleared");
    Json(json!({
        "message": format!("Cache cleared. Removed {removed} entries."),
        "removed": removed,
    }))
}

async fn blocking<T, F>(job: F) -> ApiResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(job)
        .await
        .map_err(|err| ApiError::internal(format!("task join error: {err}")))
}

impl AppState {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        cache: Arc<VideoCache>,
        cookies_file: impl Into<PathBuf>,
        detection: DetectionStrategy,
    ) -> Self {
        Self {
            cache,
            extractor,
            cookies_file: Arc::new(cookies_file.into()),
            detection,
        }
    }

    pub fn cache(&self) -> &VideoCache {
        &self.cache
    }

    /// Cache-aware extraction used by `/video/fetch`.
    async fn fetch(&self, url: PostUrl, adult: bool) -> Result<VideoSummary, FetchError> {
        let key = cache_key(&url);
        if let Some(entry) = self.cache.fresh(&key, Utc::now()) {
            debug!(url = %url, "returning cached extraction");
            return Ok(self.rerate(entry.summary, adult));
        }

        info!(url = %url, "extracting video data");
        let summary = self.extract_summary(&url, adult).await?;
        self.cache.insert(key, summary.clone());
        info!(
            title = %summary.title,
            quality = %summary.quality,
            rating = %summary.content_rating,
            "extraction succeeded"
        );
        Ok(summary)
    }

    /// Manual mode rates by the request flag alone. Auto mode keeps a rating
    /// that detection already raised to adult.
    fn rerate(&self, summary: VideoSummary, adult: bool) -> VideoSummary {
        match self.detection {
            DetectionStrategy::Manual => summary.with_rating(adult),
            DetectionStrategy::Auto if adult => summary.with_rating(true),
            DetectionStrategy::Auto => summary,
        }
    }

    async fn extract_summary(
        &self,
        url: &PostUrl,
        adult: bool,
    ) -> Result<VideoSummary, FetchError> {
        let jar = self.cookies_file.exists().then(|| self.cookies_file.to_path_buf());

        match self.detection {
            DetectionStrategy::Manual => {
                let cookies = jar.filter(|_| adult);
                if cookies.is_some() {
                    debug!("using cookies for adult content");
                }
                let info = self.run_extractor(url, cookies).await?;
                build_summary(&info, adult, Utc::now())
            }
            DetectionStrategy::Auto => match self.run_extractor(url, None).await {
                Ok(info) => build_summary(&info, adult, Utc::now()),
                Err(err) if err.hints_at_restriction() && jar.is_some() => {
                    info!(
                        error = %err,
                        "anonymous extraction looked restricted; retrying with cookies"
                    );
                    let info = self.run_extractor(url, jar).await?;
                    build_summary(&info, true, Utc::now())
                }
                Err(err) => Err(err),
            },
        }
    }

    async fn run_extractor(
        &self,
        url: &PostUrl,
        cookies: Option<PathBuf>,
    ) -> Result<crate::extractor::VideoInfo, FetchError> {
        let extractor = self.extractor.clone();
        let url = url.as_str().to_owned();
        task::spawn_blocking(move || extractor.extract(&url, cookies.as_deref()))
            .await
            .map_err(|err| FetchError::Upstream(format!("extractor task failed: {err}")))?
    }

    /// `None` when the jar does not exist or cannot be read.
    async fn jar_entries(&self) -> Option<usize> {
        let path = self.cookies_file.clone();
        task::spawn_blocking(move || jar_entries_at(&path))
            .await
            .ok()
            .flatten()
    }
}

fn jar_entries_at(path: &Path) -> Option<usize> {
    if !path.exists() {
        return None;
    }
    match count_jar_entries(path) {
        Ok(count) => Some(count),
        Err(err) => {
            warn!(jar = %path.display(), error = %err, "could not read cookie jar");
            Some(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::VideoInfo;
    use crate::video::tests::sample_info;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use parking_lot::Mutex;
    use std::fs;
    use tempfile::{TempDir, tempdir};
    use tower::ServiceExt;

    type Reply = Result<VideoInfo, FetchError>;
    type Responder = Box<dyn Fn(Option<&Path>) -> Reply + Send + Sync>;

    const JAR_STUB: &str = "# Netscape HTTP Cookie File\n";

    struct FakeExtractor {
        calls: Mutex<Vec<Option<PathBuf>>>,
        respond: Responder,
    }

    impl FakeExtractor {
        fn new(
            respond: impl Fn(Option<&Path>) -> Reply + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn succeeding() -> Arc<Self> {
            Self::new(|_| Ok(sample_info()))
        }

        fn failing(text: &'static str) -> Arc<Self> {
            Self::new(move |_| Err(FetchError::classify(text)))
        }

        fn calls(&self) -> Vec<Option<PathBuf>> {
            self.calls.lock().clone()
        }
    }

    impl Extractor for FakeExtractor {
        fn extract(&self, _url: &str, cookies: Option<&Path>) -> Result<VideoInfo, FetchError> {
            self.calls.lock().push(cookies.map(Path::to_path_buf));
            (self.respond)(cookies)
        }
    }

    struct Harness {
        _dir: TempDir,
        jar: PathBuf,
        state: AppState,
    }

    fn harness(extractor: Arc<FakeExtractor>, detection: DetectionStrategy) -> Harness {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("cookies.txt");
        let state = AppState::new(
            extractor,
            Arc::new(VideoCache::default()),
            jar.clone(),
            detection,
        );
        Harness {
            _dir: dir,
            jar,
            state,
        }
    }

    async fn send(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        router(state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn call(
        state: &AppState,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = send(state, method, uri, body).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn get(state: &AppState, uri: &str) -> (StatusCode, Value) {
        call(state, Method::GET, uri, None).await
    }

    async fn fetch(state: &AppState, url: &str, adult: bool) -> (StatusCode, Value) {
        let body = json!({ "url": url, "is_adult_content": adult });
        call(state, Method::POST, "/video/fetch", Some(body)).await
    }

    async fn add_raw(state: &AppState, raw: &str) -> (StatusCode, Value) {
        let body = json!({ "raw_cookies": raw });
        call(state, Method::POST, "/cookies/add-raw", Some(body)).await
    }

    #[tokio::test]
    async fn fetch_returns_best_format_and_caches_it() {
        let extractor = FakeExtractor::succeeding();
        let h = harness(extractor.clone(), DetectionStrategy::Manual);

        let (status, body) = fetch(&h.state, "https://twitter.com/a/status/1", false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["download_url"], "https://video.twimg.com/720.mp4");
        assert_eq!(body["mp4_formats_found"], 2);

        let (status, _) = fetch(&h.state, "https://x.com/a/status/1", false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(extractor.calls().len(), 1);

        let (_, stats) = get(&h.state, "/cache/stats").await;
        assert_eq!(stats["cache_size"], 1);
        assert_eq!(stats["ttl_seconds"], 3600);
    }

    #[tokio::test]
    async fn cache_hits_follow_the_request_rating() {
        let h = harness(FakeExtractor::succeeding(), DetectionStrategy::Manual);
        fetch(&h.state, "https://x.com/a/status/1", false).await;
        let (_, body) = fetch(&h.state, "https://x.com/a/status/1", true).await;
        assert_eq!(body["content_rating"], "Adult (18+)");
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_before_extraction() {
        let extractor = FakeExtractor::succeeding();
        let h = harness(extractor.clone(), DetectionStrategy::Manual);
        let (status, body) = fetch(&h.state, "https://example.com/a/status/1", false).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("valid Twitter/X URL"));
        assert!(extractor.calls().is_empty());
    }

    #[tokio::test]
    async fn upstream_errors_map_to_status_and_hint() {
        let extractor = FakeExtractor::failing("ERROR: HTTP Error 403: Forbidden");
        let h = harness(extractor, DetectionStrategy::Manual);
        let (status, body) = fetch(&h.state, "https://x.com/a/status/1", false).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].as_str().unwrap().contains("Try uploading cookies"));
        assert_eq!(h.state.cache().len(), 0);
    }

    #[tokio::test]
    async fn manual_mode_uses_cookies_only_for_flagged_requests() {
        let extractor = FakeExtractor::succeeding();
        let h = harness(extractor.clone(), DetectionStrategy::Manual);
        fs::write(&h.jar, JAR_STUB).unwrap();

        fetch(&h.state, "https://x.com/a/status/1", false).await;
        fetch(&h.state, "https://x.com/a/status/2", true).await;
        assert_eq!(extractor.calls(), vec![None, Some(h.jar.clone())]);
    }

    #[tokio::test]
    async fn auto_mode_retries_restricted_posts_with_cookies() {
        let extractor = FakeExtractor::new(|cookies| match cookies {
            None => Err(FetchError::classify("ERROR: This post is from a private account")),
            Some(_) => Ok(sample_info()),
        });
        let h = harness(extractor.clone(), DetectionStrategy::Auto);
        fs::write(&h.jar, JAR_STUB).unwrap();

        let (status, body) = fetch(&h.state, "https://x.com/a/status/1", false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content_rating"], "Adult (18+)");
        assert_eq!(extractor.calls(), vec![None, Some(h.jar.clone())]);

        // Cached auto-detected rating survives an unflagged repeat.
        let (_, body) = fetch(&h.state, "https://x.com/a/status/1", false).await;
        assert_eq!(body["content_rating"], "Adult (18+)");
    }

    #[tokio::test]
    async fn auto_mode_without_jar_does_not_retry() {
        let extractor = FakeExtractor::failing("HTTP Error 403: Forbidden");
        let h = harness(extractor.clone(), DetectionStrategy::Auto);
        let (status, _) = fetch(&h.state, "https://x.com/a/status/1", false).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(extractor.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_endpoint_reports_errors_in_body() {
        let extractor = FakeExtractor::failing("HTTP Error 404: Not Found");
        let h = harness(extractor, DetectionStrategy::Manual);

        let (status, body) = get(&h.state, "/test?url=https://x.com/a/status/1&adult=false").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ERROR");
        assert_eq!(body["error"], "Tweet not found or deleted");
        assert_eq!(body["help"]["cookie_manager"], "/cookies/manager");

        let (_, body) = get(&h.state, "/test?url=nope").await;
        assert_eq!(body["error"], "Invalid Twitter/X URL");
    }

    #[tokio::test]
    async fn test_endpoint_bypasses_the_cache() {
        let h = harness(FakeExtractor::succeeding(), DetectionStrategy::Manual);
        let (_, body) = get(&h.state, "/test?url=https://x.com/a/status/1").await;
        assert_eq!(body["status"], "SUCCESS");
        assert_eq!(body["quality"], "720p");
        assert_eq!(h.state.cache().len(), 0);
    }

    #[tokio::test]
    async fn cookie_manager_page_is_html() {
        let h = harness(FakeExtractor::succeeding(), DetectionStrategy::Manual);
        let response = send(&h.state, Method::GET, "/cookies/manager", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        for endpoint in ["/cookies/status", "/cookies/add-raw", "/cookies/validate", "/test?url="] {
            assert!(page.contains(endpoint), "page does not call {endpoint}");
        }

        let (_, index) = get(&h.state, "/").await;
        assert_eq!(index["endpoints"]["cookie_manager"], "GET /cookies/manager");
    }

    #[tokio::test]
    async fn add_raw_converts_and_status_counts_lines() {
        let h = harness(FakeExtractor::succeeding(), DetectionStrategy::Manual);
        let raw = r#"[
            {"domain":"x.com","name":"a","value":"b","secure":true},
            {"domain":"x.com","name":"c"}
        ]"#;
        let (status, body) = add_raw(&h.state, raw).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["cookies_count"], 2);

        let (_, status_body) = get(&h.state, "/cookies/status").await;
        assert_eq!(status_body["cookies_count"], 2);
        let (_, auth) = get(&h.state, "/auth/status").await;
        assert_eq!(auth["authenticated"], true);
        let jar = fs::read_to_string(&h.jar).unwrap();
        assert!(jar.contains(".twitter.com\tTRUE\t/\tTRUE\t0\ta\tb"));
    }

    #[tokio::test]
    async fn add_raw_rejects_bad_payloads() {
        let h = harness(FakeExtractor::succeeding(), DetectionStrategy::Manual);
        let (status, body) = add_raw(&h.state, "{oops").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON format");

        let (status, body) = add_raw(&h.state, r#"{"cookies": []}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Cookies must be an array");
        assert!(!h.jar.exists());
    }

    #[tokio::test]
    async fn upload_status_and_delete_cookies() {
        let h = harness(FakeExtractor::succeeding(), DetectionStrategy::Manual);
        let empty = json!({ "cookies": [] });
        let (status, _) = call(&h.state, Method::POST, "/auth/cookies", Some(empty)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let cookies = json!({
            "cookies": [{
                "domain": ".x.com",
                "name": "ct0",
                "value": "v",
                "expirationDate": 1800000000.5
            }]
        });
        let (status, _) = call(&h.state, Method::POST, "/auth/cookies", Some(cookies)).await;
        assert_eq!(status, StatusCode::OK);
        let jar = fs::read_to_string(&h.jar).unwrap();
        assert!(jar.contains(".x.com\tTRUE\t/\tFALSE\t1800000000\tct0\tv"));

        let (status, _) = call(&h.state, Method::DELETE, "/auth/cookies", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!h.jar.exists());
        let (status, _) = call(&h.state, Method::DELETE, "/auth/cookies", None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, auth) = get(&h.state, "/auth/status").await;
        assert_eq!(auth["authenticated"], false);
    }

    #[tokio::test]
    async fn validate_without_jar_short_circuits() {
        let extractor = FakeExtractor::succeeding();
        let h = harness(extractor.clone(), DetectionStrategy::Manual);
        let (_, body) = get(&h.state, "/cookies/validate").await;
        assert_eq!(body["success"], false);
        assert!(extractor.calls().is_empty());

        fs::write(&h.jar, format!("{JAR_STUB}.x.com\tTRUE\t/\tFALSE\t0\ta\tb\n")).unwrap();
        let (_, body) = call(&h.state, Method::POST, "/cookies/validate", None).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["cookies_count"], 1);
        assert_eq!(extractor.calls(), vec![Some(h.jar.clone())]);
    }

    #[tokio::test]
    async fn clear_cache_reports_removed_entries() {
        let h = harness(FakeExtractor::succeeding(), DetectionStrategy::Manual);
        fetch(&h.state, "https://x.com/a/status/1", false).await;
        fetch(&h.state, "https://x.com/b/status/2", false).await;
        let (_, body) = call(&h.state, Method::POST, "/cache/clear", None).await;
        assert_eq!(body["removed"], 2);
        assert_eq!(h.state.cache().len(), 0);
    }
}
