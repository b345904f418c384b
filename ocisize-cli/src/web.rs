//! HTTP front end of [ocisize::query]
//!
//! | route                   | response                                  |
//! |-------------------------|-------------------------------------------|
//! | `GET /`                 | HTML form                                 |
//! | `GET /api/ocisize`      | JSON result for `?image=<ref>`            |
//! | `POST /api/ocisize`     | same, with form or JSON body `{"image"}`  |
//! | `GET /query`            | HTML table fragment for `?image=<ref>`    |

use crate::format;
use axum::{
    extract::{FromRequest, Query, Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use ocisize::{
    distribution::Transport, error::Error, query_with, Cancellation, QueryOptions, QueryResult,
};
use serde::Deserialize;
use std::sync::Arc;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Shared by all requests. Each query gets its own client and token.
#[derive(Clone)]
pub struct AppState {
    pub transport: Arc<dyn Transport>,
    pub options: QueryOptions,
}

impl AppState {
    pub fn new(transport: impl Transport + 'static, options: QueryOptions) -> Self {
        AppState {
            transport: Arc::new(transport),
            options,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/ocisize", get(api_get).post(api_post))
        .route("/query", get(fragment))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageParams {
    image: Option<String>,
}

impl ImageParams {
    fn image(self) -> Result<String, WebError> {
        match self.image {
            Some(image) if !image.trim().is_empty() => Ok(image.trim().to_string()),
            _ => Err(WebError::MissingImage),
        }
    }
}

/// `POST` body, either `application/json` or `application/x-www-form-urlencoded`
pub struct ImageBody(ImageParams);

impl<S: Send + Sync> FromRequest<S> for ImageBody {
    type Rejection = WebError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |value| value.starts_with("application/json"));
        let params = if is_json {
            Json::<ImageParams>::from_request(req, state)
                .await
                .map_err(|e| WebError::BadRequest(e.body_text()))?
                .0
        } else {
            Form::<ImageParams>::from_request(req, state)
                .await
                .map_err(|e| WebError::BadRequest(e.body_text()))?
                .0
        };
        Ok(ImageBody(params))
    }
}

#[derive(Debug)]
pub enum WebError {
    MissingImage,
    BadRequest(String),
    Query(Error),
    Internal(String),
}

impl From<Error> for WebError {
    fn from(e: Error) -> Self {
        WebError::Query(e)
    }
}

impl WebError {
    fn status(&self) -> StatusCode {
        match self {
            WebError::MissingImage | WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Query(e) if e.is_user_error() => StatusCode::BAD_REQUEST,
            WebError::Query(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            WebError::Query(Error::Cancelled) => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            WebError::Query(_) => StatusCode::BAD_GATEWAY,
            WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            WebError::MissingImage => "No image parameter provided".to_string(),
            WebError::BadRequest(message) | WebError::Internal(message) => message.clone(),
            WebError::Query(e) => e.to_string(),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message() });
        (self.status(), Json(body)).into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn api_get(
    State(state): State<AppState>,
    Query(params): Query<ImageParams>,
) -> Result<Json<QueryResult>, WebError> {
    Ok(Json(run_query(&state, params.image()?).await?))
}

async fn api_post(
    State(state): State<AppState>,
    ImageBody(params): ImageBody,
) -> Result<Json<QueryResult>, WebError> {
    Ok(Json(run_query(&state, params.image()?).await?))
}

async fn fragment(State(state): State<AppState>, Query(params): Query<ImageParams>) -> Response {
    let result = match params.image() {
        Ok(image) => run_query(&state, image).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(result) => Html(format::html(&result)).into_response(),
        Err(e) => (e.status(), Html(format::html_error(&e.message()))).into_response(),
    }
}

/// Run the blocking query off the async runtime
///
/// The query is cancelled when this future is dropped, i.e. when the client disconnects.
async fn run_query(state: &AppState, image: String) -> Result<QueryResult, WebError> {
    log::info!("Query {}", image);
    let cancellation = Cancellation::new();
    let guard = cancellation.guard();
    let transport = Arc::clone(&state.transport);
    let options = state.options.clone();
    let task = tokio::task::spawn_blocking(move || {
        query_with(transport.as_ref(), &image, &options, cancellation)
    });
    let result = task
        .await
        .map_err(|e| WebError::Internal(format!("Query task failed: {}", e)))?;
    guard.disarm();
    match result {
        Ok(result) => {
            for warning in &result.warnings {
                log::warn!("{}: {}", result.image, warning);
            }
            Ok(result)
        }
        Err(e) => {
            log::warn!("Query failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use ocisize::{media_types::ManifestKind, testing::*};
    use tower::ServiceExt;

    const REPO: &str = "https://registry-1.docker.io/v2/library/nginx";

    fn app() -> Router {
        let transport = StubTransport::new()
            .with_token("registry-1.docker.io", "library/nginx")
            .protected_manifest(
                &format!("{}/manifests/latest", REPO),
                ManifestKind::OciIndex,
                &index_json(&[("linux", "amd64", None), ("linux", "arm", Some("v7"))]),
            )
            .protected_manifest(
                &format!("{}/manifests/{}", REPO, digest(1)),
                ManifestKind::OciManifest,
                &manifest_json(1024, &[2048]),
            )
            .protected_manifest(
                &format!("{}/manifests/{}", REPO, digest(2)),
                ManifestKind::OciManifest,
                &manifest_json(1024, &[1024]),
            );
        router(AppState::new(transport, QueryOptions::default()))
    }

    async fn send(req: Request<Body>) -> (StatusCode, String) {
        let res = app().oneshot(req).await.unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn get(uri: &str) -> (StatusCode, String) {
        send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    #[tokio::test]
    async fn index_page() {
        let (status, body) = get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<form"));
    }

    #[tokio::test]
    async fn api_json() {
        let (status, body) = get("/api/ocisize?image=nginx").await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["image"], "registry-1.docker.io/library/nginx:latest");
        assert_eq!(value["platforms"][0]["platform"], "linux/amd64");
        assert_eq!(value["platforms"][0]["sizeBytes"], 3072);
        assert_eq!(value["platforms"][1]["platform"], "linux/arm/v7");
        assert_eq!(value["platforms"][1]["size"], "2.00K");
    }

    #[tokio::test]
    async fn api_post_form_and_json() {
        let form = Request::post("/api/ocisize")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("image=nginx%3Alatest"))
            .unwrap();
        let (status, form_body) = send(form).await;
        assert_eq!(status, StatusCode::OK);

        let json = Request::post("/api/ocisize")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"image": "nginx:latest"}"#))
            .unwrap();
        let (status, json_body) = send(json).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(form_body, json_body);
    }

    #[tokio::test]
    async fn missing_image() {
        let (status, body) = get("/api/ocisize").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["error"], "No image parameter provided");

        let (status, _) = get("/api/ocisize?image=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn status_codes() {
        let (status, _) = get("/api/ocisize?image=nginx@sha256:abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get("/api/ocisize?image=nginx:1.0").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("not found"));
    }

    #[tokio::test]
    async fn html_fragment() {
        let (status, body) = get("/query?image=nginx").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<td>linux/arm/v7</td>"));

        let (status, body) = get("/query?image=nginx:1.0").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.starts_with("<p class=\"error\">"));
    }

    #[test]
    fn registry_failure_is_bad_gateway() {
        let e = WebError::from(Error::Registry {
            status: 500,
            registry: "quay.io".to_string(),
            repository: "skopeo/stable".to_string(),
            detail: None,
        });
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
    }
}
