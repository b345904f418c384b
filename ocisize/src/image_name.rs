use crate::{
    config::DEFAULT_REGISTRY,
    distribution::{Name, Reference},
    error::*,
    Digest,
};
use std::fmt;
use url::Url;

/// Image reference given by user, e.g. `nginx:latest` or `quay.io/skopeo/stable@sha256:...`
///
/// ```
/// use ocisize::ImageName;
///
/// let name = ImageName::parse("nginx").unwrap();
/// assert_eq!(name.registry, "registry-1.docker.io");
/// assert_eq!(name.name.as_str(), "library/nginx");
/// assert_eq!(name.reference().to_string(), "latest");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageName {
    /// Registry host, including the port if any
    pub registry: String,
    pub name: Name,
    pub tag: Option<String>,
    pub digest: Option<Digest>,
}

impl ImageName {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &dyn fmt::Display| {
            Error::InvalidReference(format!("{}: {}", input, reason))
        };
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidReference("empty image name".to_string()));
        }

        let (rest, digest) = match input.split_once('@') {
            Some((rest, digest)) => (rest, Some(Digest::new(digest).map_err(|e| invalid(&e))?)),
            None => (input, None),
        };

        let (registry, path) = match rest.split_once('/') {
            Some((host, path)) if is_registry_host(host) => (host, path),
            _ => (DEFAULT_REGISTRY, rest),
        };
        let registry = match registry {
            "docker.io" | "index.docker.io" => DEFAULT_REGISTRY,
            _ => registry,
        };

        let (path, tag) = match path.rsplit_once(':') {
            Some((path, tag)) if !tag.contains('/') => (path, Some(tag)),
            _ => (path, None),
        };
        if let Some(tag) = tag {
            Reference::tag(tag).map_err(|e| invalid(&e))?;
        }

        let name = Name::in_registry(registry, path).map_err(|e| invalid(&e))?;

        let tag = match (tag, &digest) {
            (Some(tag), _) => Some(tag.to_string()),
            (None, Some(_)) => None,
            (None, None) => Some("latest".to_string()),
        };

        Ok(ImageName {
            registry: registry.to_string(),
            name,
            tag,
            digest,
        })
    }

    /// Tag or digest used to look up the manifest. Digest wins if both are given.
    pub fn reference(&self) -> Reference {
        match (&self.digest, &self.tag) {
            (Some(digest), _) => Reference::Digest(digest.clone()),
            (None, Some(tag)) => Reference::Tag(tag.clone()),
            (None, None) => Reference::latest(),
        }
    }

    /// Base URL of the registry API
    pub fn registry_url(&self) -> Result<Url> {
        let host = self.registry.split(':').next().unwrap_or_default();
        let url = if host == "localhost" || host == "127.0.0.1" {
            format!("http://{}", self.registry)
        } else {
            format!("https://{}", self.registry)
        };
        Ok(Url::parse(&url)?)
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// The first path component is a host only if it looks like one
fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}
