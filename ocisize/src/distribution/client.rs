use crate::{cancel::Cancellation, distribution::*, error::*, media_types::ManifestKind, ImageName};
use serde::Deserialize;
use std::sync::Mutex;
use url::Url;

/// A client for `/v2/<name>/` API endpoint
///
/// One client serves one query against one repository. The bearer token
/// obtained from an authentication challenge lives in the client and is
/// dropped with it.
pub struct Client<'t> {
    transport: &'t dyn Transport,
    /// URL to registry server
    url: Url,
    /// Registry host used in error messages
    registry: String,
    /// Name of repository
    name: Name,
    /// Token for this registry and repository
    token: Mutex<Option<AuthToken>>,
    cancellation: Cancellation,
}

impl<'t> Client<'t> {
    pub fn new(
        transport: &'t dyn Transport,
        image: &ImageName,
        cancellation: Cancellation,
    ) -> Result<Self> {
        Ok(Client {
            transport,
            url: image.registry_url()?,
            registry: image.registry.clone(),
            name: image.name.clone(),
            token: Mutex::new(None),
            cancellation,
        })
    }

    fn current_token(&self) -> Option<AuthToken> {
        let mut token = self.token.lock().unwrap_or_else(|e| e.into_inner());
        if token.as_ref().map_or(false, AuthToken::is_expired) {
            log::debug!("Token for {}/{} expired", self.registry, self.name);
            *token = None;
        }
        token.clone()
    }

    fn send(&self, url: &Url, accept: &str, token: Option<&AuthToken>) -> Result<Response> {
        self.cancellation.check()?;
        let authorization = token.map(AuthToken::header_value);
        let mut headers = vec![("Accept", accept)];
        if let Some(authorization) = authorization.as_deref() {
            headers.push(("Authorization", authorization));
        }
        self.transport
            .get(url, &headers)
            .map_err(|source| Error::Transport {
                registry: self.registry.clone(),
                source,
            })
    }

    /// GET with the anonymous token exchange on `401 Unauthorized`
    ///
    /// The exchange happens at most once per call. A second 401 means the
    /// image needs real credentials.
    fn call(&self, url: &Url, accept: &str) -> Result<Response> {
        let res = self.send(url, accept, self.current_token().as_ref())?;
        if res.status != 401 {
            return Ok(res);
        }

        let failed = || Error::AuthorizationFailed {
            registry: self.registry.clone(),
            repository: self.name.to_string(),
        };
        let challenge = match res.www_authenticate.as_deref() {
            Some(header) => AuthChallenge::from_header(header)?,
            None => return Err(failed()),
        };
        self.cancellation.check()?;
        let token = challenge.request_token(self.transport, &self.registry, &self.name)?;
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());

        let res = self.send(url, accept, Some(&token))?;
        if res.status == 401 {
            return Err(failed());
        }
        Ok(res)
    }

    fn registry_error(&self, res: &Response) -> Error {
        Error::Registry {
            status: res.status,
            registry: self.registry.clone(),
            repository: self.name.to_string(),
            detail: error_detail(&res.body),
        }
    }

    /// Get manifest or manifest list for given reference
    ///
    /// ```text
    /// GET /v2/<name>/manifests/<reference>
    /// ```
    ///
    /// Which one is returned is decided by the registry through content negotiation.
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#pulling-manifests) for detail.
    pub fn get_manifest(&self, reference: &Reference) -> Result<(Vec<u8>, ManifestKind)> {
        let url = self
            .url
            .join(&format!("/v2/{}/manifests/{}", self.name, reference))?;
        let res = self.call(&url, &ManifestKind::accept_header())?;
        if res.status == 404 {
            return Err(Error::ManifestNotFound {
                registry: self.registry.clone(),
                repository: self.name.to_string(),
                reference: reference.to_string(),
            });
        }
        if !res.is_success() {
            return Err(self.registry_error(&res));
        }
        let kind = manifest_kind(res.content_type.as_deref(), &res.body);
        log::debug!("{}/{}@{} is {}", self.registry, self.name, reference, kind);
        Ok((res.body, kind))
    }

    /// Get blob for given digest
    ///
    /// ```text
    /// GET /v2/<name>/blobs/<digest>
    /// ```
    ///
    /// Only used for small blobs like the image config.
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#pulling-blobs) for detail.
    pub fn get_blob(&self, digest: &str) -> Result<Vec<u8>> {
        let url = self
            .url
            .join(&format!("/v2/{}/blobs/{}", self.name, digest))?;
        let res = self.call(&url, "*/*")?;
        if !res.is_success() {
            return Err(self.registry_error(&res));
        }
        Ok(res.body)
    }
}

/// Decide the manifest kind from `Content-Type`, then from the document itself
///
/// Some registries answer with `application/json` or omit the header,
/// and OCI documents may omit `mediaType`.
fn manifest_kind(content_type: Option<&str>, body: &[u8]) -> ManifestKind {
    if let Some(kind) = content_type.map(ManifestKind::from_media_type) {
        if kind.is_index() || kind.is_manifest() {
            return kind;
        }
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Document {
        media_type: Option<String>,
        manifests: Option<serde_json::Value>,
        layers: Option<serde_json::Value>,
    }
    match serde_json::from_slice::<Document>(body) {
        Ok(Document {
            media_type: Some(media_type),
            ..
        }) => ManifestKind::from_media_type(&media_type),
        Ok(Document {
            manifests: Some(_), ..
        }) => ManifestKind::OciIndex,
        Ok(Document {
            layers: Some(_), ..
        }) => ManifestKind::OciManifest,
        _ => ManifestKind::Unsupported(content_type.unwrap_or("unknown").to_string()),
    }
}

/// Message of an [OCI error response](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#error-codes)
fn error_detail(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorResponse {
        errors: Vec<ErrorInfo>,
    }
    #[derive(Deserialize)]
    struct ErrorInfo {
        code: Option<String>,
        message: Option<String>,
    }

    let res: ErrorResponse = serde_json::from_slice(body).ok()?;
    let messages: Vec<String> = res
        .errors
        .into_iter()
        .filter_map(|e| match (e.code, e.message) {
            (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
            (code, message) => code.or(message),
        })
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}
