//! In-memory registry for tests
//!
//! Routes are keyed by URL without the query string. Unknown URLs answer 404.

use crate::{
    distribution::{Response, Transport, TransportError},
    media_types::ManifestKind,
};
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};
use url::Url;

pub const TOKEN_URL: &str = "https://auth.example.com/token";
pub const TOKEN: &str = "stub-token";

/// Request as seen by a route handler
#[derive(Debug, Clone)]
pub struct StubRequest {
    pub url: String,
    pub query: String,
    pub headers: Vec<(String, String)>,
}

impl StubRequest {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

type Handler = Box<dyn Fn(&StubRequest) -> Response + Send + Sync>;

#[derive(Default)]
pub struct StubTransport {
    routes: HashMap<String, Handler>,
    unreachable: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        url: &str,
        handler: impl Fn(&StubRequest) -> Response + Send + Sync + 'static,
    ) -> Self {
        self.routes.insert(url.to_string(), Box::new(handler));
        self
    }

    /// Fail requests to `url` as if the host could not be reached
    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }

    pub fn manifest(self, url: &str, kind: ManifestKind, body: &str) -> Self {
        let body = body.to_string();
        self.route(url, move |_| Response::manifest(&kind, &body))
    }

    /// Manifest answering 401 with a bearer challenge unless [TOKEN] is presented
    pub fn protected_manifest(self, url: &str, kind: ManifestKind, body: &str) -> Self {
        let body = body.to_string();
        let registry = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let repository = url
            .split("/v2/")
            .nth(1)
            .and_then(|path| path.split("/manifests/").next())
            .unwrap_or_default()
            .to_string();
        self.route(url, move |req| {
            if req.header("Authorization") == Some(format!("Bearer {}", TOKEN).as_str()) {
                Response::manifest(&kind, &body)
            } else {
                Response::unauthorized(&bearer_challenge(&registry, &repository))
            }
        })
    }

    /// Token endpoint at [TOKEN_URL] issuing [TOKEN]
    pub fn with_token(self, service: &str, repository: &str) -> Self {
        let scope = format!("scope=repository%3A{}%3Apull", repository.replace('/', "%2F"));
        let service = format!("service={}", service);
        self.route(TOKEN_URL, move |req| {
            if req.query.contains(&scope) && req.query.contains(&service) {
                Response::json(200, &format!(r#"{{"token": "{}"}}"#, TOKEN))
            } else {
                Response::json(401, r#"{"details": "bad scope"}"#)
            }
        })
    }

    /// URLs requested so far, in order, without query strings
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Transport for StubTransport {
    fn get(&self, url: &Url, headers: &[(&str, &str)]) -> Result<Response, TransportError> {
        let mut key = url.clone();
        key.set_query(None);
        let key = key.to_string();
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.clone());

        if self.unreachable.contains(&key) {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "connection timed out",
            )));
        }
        let req = StubRequest {
            url: key.clone(),
            query: url.query().unwrap_or_default().to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        Ok(match self.routes.get(&key) {
            Some(handler) => handler(&req),
            None => Response::json(
                404,
                r#"{"errors":[{"code":"NAME_UNKNOWN","message":"repository name not known to registry"}]}"#,
            ),
        })
    }
}

impl Response {
    pub fn json(status: u16, body: &str) -> Self {
        Response {
            status,
            content_type: Some("application/json".to_string()),
            www_authenticate: None,
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn manifest(kind: &ManifestKind, body: &str) -> Self {
        Response {
            status: 200,
            content_type: Some(kind.media_type()),
            www_authenticate: None,
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn unauthorized(challenge: &str) -> Self {
        Response {
            status: 401,
            www_authenticate: Some(challenge.to_string()),
            ..Response::json(
                401,
                r#"{"errors":[{"code":"UNAUTHORIZED","message":"authentication required"}]}"#,
            )
        }
    }
}

pub fn bearer_challenge(service: &str, repository: &str) -> String {
    format!(
        r#"Bearer realm="{}",service="{}",scope="repository:{}:pull""#,
        TOKEN_URL, service, repository
    )
}

/// Valid sha256 digest derived from `n`
pub fn digest(n: u64) -> String {
    format!("sha256:{:064x}", n)
}

/// OCI image manifest with given config and layer sizes
pub fn manifest_json(config_size: u64, layer_sizes: &[u64]) -> String {
    manifest_json_with_layers(
        config_size,
        &layer_sizes
            .iter()
            .map(|size| ("application/vnd.oci.image.layer.v1.tar+gzip", *size))
            .collect::<Vec<_>>(),
    )
}

/// OCI image manifest with given layer media types and sizes
pub fn manifest_json_with_layers(config_size: u64, layers: &[(&str, u64)]) -> String {
    let layers: Vec<serde_json::Value> = layers
        .iter()
        .enumerate()
        .map(|(i, (media_type, size))| {
            serde_json::json!({
                "mediaType": media_type,
                "digest": digest(1000 + i as u64),
                "size": size,
            })
        })
        .collect();
    serde_json::json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.manifest.v1+json",
        "config": {
            "mediaType": "application/vnd.oci.image.config.v1+json",
            "digest": digest(999),
            "size": config_size,
        },
        "layers": layers,
    })
    .to_string()
}

/// OCI image index listing `(os, architecture, variant)` entries; the n-th entry has digest `digest(n + 1)`
pub fn index_json(platforms: &[(&str, &str, Option<&str>)]) -> String {
    let manifests: Vec<serde_json::Value> = platforms
        .iter()
        .enumerate()
        .map(|(i, (os, architecture, variant))| {
            let mut platform = serde_json::json!({
                "os": os,
                "architecture": architecture,
            });
            if let Some(variant) = variant {
                platform["variant"] = serde_json::json!(variant);
            }
            serde_json::json!({
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "digest": digest(i as u64 + 1),
                "size": 1024,
                "platform": platform,
            })
        })
        .collect();
    serde_json::json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.index.v1+json",
        "manifests": manifests,
    })
    .to_string()
}
