use crate::{config::DEFAULT_REGISTRY, error::*};
use regex::Regex;
use std::fmt;

/// Repository path within a registry, e.g. `library/nginx` or `skopeo/stable`
///
/// Path components are checked against the `<name>` grammar of the
/// [OCI distribution spec 1.1.0](https://github.com/opencontainers/distribution-spec/blob/v1.1.0/spec.md):
///
/// ```regex
/// [a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*(\/[a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*)*
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(String);

/// Registries reject longer `<registry>/<name>` strings
const MAX_NAME_LENGTH: usize = 255;

lazy_static::lazy_static! {
    static ref COMPONENT_RE: Regex = Regex::new(r"^[a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*$").unwrap();
}

impl Name {
    pub fn new(name: &str) -> Result<Self> {
        let valid = !name.is_empty()
            && name.len() <= MAX_NAME_LENGTH
            && name.split('/').all(|component| COMPONENT_RE.is_match(component));
        if valid {
            Ok(Name(name.to_string()))
        } else {
            Err(Error::InvalidName(name.to_string()))
        }
    }

    /// Name as stored in `registry`
    ///
    /// Official images on Docker Hub live under `library/`, so `nginx` becomes `library/nginx` there.
    pub fn in_registry(registry: &str, path: &str) -> Result<Self> {
        if registry == DEFAULT_REGISTRY && !path.contains('/') {
            Self::new(&format!("library/{}", path))
        } else {
            Self::new(path)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scope requested from a token endpoint when the challenge does not name one
    pub fn pull_scope(&self) -> String {
        format!("repository:{}:pull", self.0)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name() -> Result<()> {
        assert_eq!(Name::new("skopeo/stable")?.as_str(), "skopeo/stable");
        assert_eq!(Name::new("a__b/c-d.e")?.as_str(), "a__b/c-d.e");
        // Head must be alphanum
        assert!(Name::new("_nginx").is_err());
        assert!(Name::new("/nginx").is_err());
        assert!(Name::new("nginx/").is_err());
        assert!(Name::new("").is_err());
        // Capital letter is not allowed
        assert!(Name::new("immich-app/Immich-server").is_err());
        assert!(Name::new(&"a".repeat(MAX_NAME_LENGTH + 1)).is_err());
        Ok(())
    }

    #[test]
    fn official_images() -> Result<()> {
        assert_eq!(Name::in_registry(DEFAULT_REGISTRY, "nginx")?.as_str(), "library/nginx");
        assert_eq!(
            Name::in_registry(DEFAULT_REGISTRY, "linuxserver/jellyfin")?.as_str(),
            "linuxserver/jellyfin"
        );
        assert_eq!(Name::in_registry("quay.io", "busybox")?.as_str(), "busybox");
        Ok(())
    }

    #[test]
    fn pull_scope() -> Result<()> {
        assert_eq!(
            Name::new("skopeo/stable")?.pull_scope(),
            "repository:skopeo/stable:pull"
        );
        Ok(())
    }
}
