use crate::{
    distribution::{Name, Transport},
    error::*,
};
use regex::Regex;
use serde::Deserialize;
use std::time::{Duration, Instant};
use url::Url;

/// WWW-Authentication challenge
///
/// ```
/// use ocisize::distribution::AuthChallenge;
///
/// let auth = AuthChallenge::from_header(
///   r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/nginx:pull""#,
/// ).unwrap();
///
/// assert_eq!(auth, AuthChallenge {
///   realm: "https://auth.docker.io/token".to_string(),
///   service: Some("registry.docker.io".to_string()),
///   scope: Some("repository:library/nginx:pull".to_string()),
/// });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

lazy_static::lazy_static! {
    static ref PARAM_RE: Regex = Regex::new(r#"([A-Za-z_]+)\s*=\s*"([^"]*)""#).unwrap();
}

impl AuthChallenge {
    pub fn from_header(header: &str) -> Result<Self> {
        let err = || Error::UnSupportedAuthHeader(header.to_string());
        let (ty, params) = header.trim().split_once(' ').ok_or_else(err)?;
        if !ty.eq_ignore_ascii_case("Bearer") {
            return Err(err());
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for cap in PARAM_RE.captures_iter(params) {
            let value = cap[2].to_string();
            match &cap[1] {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => continue,
            }
        }
        Ok(Self {
            realm: realm.ok_or_else(err)?,
            service,
            scope,
        })
    }

    /// Get an anonymous token from the realm
    ///
    /// `scope` falls back to pull access of `name` when the challenge does not set it.
    pub fn request_token(
        &self,
        transport: &dyn Transport,
        registry: &str,
        name: &Name,
    ) -> Result<AuthToken> {
        let failed = || Error::AuthorizationFailed {
            registry: registry.to_string(),
            repository: name.to_string(),
        };
        let mut url = Url::parse(&self.realm)?;
        let scope = self.scope.clone().unwrap_or_else(|| name.pull_scope());
        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = &self.service {
                query.append_pair("service", service);
            }
            query.append_pair("scope", &scope);
        }

        log::info!("Request anonymous token for {} from {}", scope, self.realm);
        let res = transport
            .get(&url, &[("Accept", "application/json")])
            .map_err(|source| Error::Transport {
                registry: url.host_str().unwrap_or(registry).to_string(),
                source,
            })?;
        if !res.is_success() {
            log::warn!("Token endpoint {} returned {}", self.realm, res.status);
            return Err(failed());
        }
        let token: TokenResponse = serde_json::from_slice(&res.body)?;
        // Lifetimes beyond what `Instant` can hold never expire
        let expires_at = token
            .expires_in
            .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)));
        match token.token.or(token.access_token) {
            Some(token) if !token.is_empty() => Ok(AuthToken {
                token,
                scope,
                expires_at,
            }),
            _ => Err(failed()),
        }
    }
}

/// Bearer token valid for one registry and repository, held for one query only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    pub scope: String,
    pub expires_at: Option<Instant>,
}

impl AuthToken {
    pub fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if at <= Instant::now())
    }

    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Token endpoints return `token`, `access_token` (OAuth2), or both
#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
    expires_in: Option<u64>,
}
