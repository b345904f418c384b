#[derive(Debug, thiserror::Error)]
pub enum Error {
    //
    // Invalid user input
    //
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),
    #[error("Invalid name for repository: {0}")]
    InvalidName(String),
    #[error("Invalid reference to image: {0}")]
    InvalidReference(String),
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    //
    // Invalid registry response
    //
    #[error("Unsupported manifest media type: {0}")]
    UnsupportedMediaType(String),
    #[error(transparent)]
    InvalidJson(#[from] serde_json::error::Error),

    //
    // Error from OCI registry
    //
    #[error("Image or tag not found: {registry}/{repository}:{reference}")]
    ManifestNotFound {
        registry: String,
        repository: String,
        reference: String,
    },
    #[error("Registry {registry} returned HTTP {status} for {repository}{}", detail_suffix(.detail))]
    Registry {
        status: u16,
        registry: String,
        repository: String,
        detail: Option<String>,
    },
    #[error("Authorization failed for {registry}/{repository}")]
    AuthorizationFailed { registry: String, repository: String },
    #[error("Unsupported WWW-Authentication header: {0}")]
    UnSupportedAuthHeader(String),

    //
    // Network error
    //
    #[error("Network error while contacting {registry}: {source}")]
    Transport {
        registry: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Query cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(": {}", detail),
        None => String::new(),
    }
}

impl Error {
    /// The image, tag or digest does not exist in the registry
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ManifestNotFound { .. })
    }

    /// Errors caused by the input string rather than by the registry
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidDigest(_)
                | Error::InvalidName(_)
                | Error::InvalidReference(_)
                | Error::InvalidUrl(_)
        )
    }
}
