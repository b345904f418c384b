use crate::config::Config;
use std::io::Read;
use url::Url;

/// Manifests and configs are small; anything larger than this is not a document we understand
const MAX_BODY_SIZE: u64 = 16 * 1024 * 1024;

/// Error of the underlying HTTP stack: DNS, TLS, connect or read timeout
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Response of a registry, kept for any HTTP status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub www_authenticate: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP capability used by [crate::distribution::Client]
///
/// Implementations must return non-2xx responses as `Ok(Response)`,
/// `Err` is reserved for failures where no response was received.
/// A transport is shared between queries, it must not hold per-query state like tokens.
pub trait Transport: Send + Sync {
    fn get(&self, url: &Url, headers: &[(&str, &str)]) -> Result<Response, TransportError>;
}

/// [Transport] based on a blocking [ureq::Agent]
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();
        UreqTransport { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &Url, headers: &[(&str, &str)]) -> Result<Response, TransportError> {
        log::debug!("GET {}", url);
        let mut req = self.agent.get(url.as_str());
        for (key, value) in headers {
            req = req.set(key, value);
        }
        let res = match req.call() {
            Ok(res) => res,
            Err(ureq::Error::Status(_status, res)) => res,
            Err(ureq::Error::Transport(e)) => return Err(Box::new(e)),
        };
        let status = res.status();
        let content_type = res.header("Content-Type").map(str::to_string);
        let www_authenticate = res.header("WWW-Authenticate").map(str::to_string);
        let body = read_body(res.into_reader())?;
        log::debug!("{} {} ({} bytes)", status, url, body.len());
        Ok(Response {
            status,
            content_type,
            www_authenticate,
            body,
        })
    }
}

/// Read a whole response body, refusing bodies over [MAX_BODY_SIZE] instead of truncating them
fn read_body(reader: impl Read) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    reader.take(MAX_BODY_SIZE + 1).read_to_end(&mut body)?;
    if body.len() as u64 > MAX_BODY_SIZE {
        return Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("response body exceeds {} bytes", MAX_BODY_SIZE),
        )));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_size_limit() {
        let body = read_body(&b"{}"[..]).unwrap();
        assert_eq!(body, b"{}");

        let exact = read_body(std::io::repeat(b' ').take(MAX_BODY_SIZE)).unwrap();
        assert_eq!(exact.len() as u64, MAX_BODY_SIZE);

        let err = read_body(std::io::repeat(b' ').take(MAX_BODY_SIZE + 1)).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    //
    // Following test needs network access to a public registry.
    // It is ignored by default.
    //

    #[test]
    #[ignore]
    fn unauthenticated_request_is_challenged() -> Result<(), TransportError> {
        let transport = UreqTransport::default();
        let url = Url::parse("https://registry-1.docker.io/v2/library/alpine/manifests/latest")?;
        let res = transport.get(&url, &[])?;
        assert_eq!(res.status, 401);
        assert!(res.www_authenticate.unwrap().starts_with("Bearer "));
        Ok(())
    }
}
