use crate::{error::*, Digest};
use regex::Regex;
use std::fmt;

/// Reference of container image stored in the repository, a tag or a digest
///
/// In [OCI distribution spec](https://github.com/opencontainers/distribution-spec/blob/main/spec.md):
/// > `<reference>` as a tag MUST be at most 128 characters
/// > in length and MUST match the following regular expression:
/// > ```text
/// > [a-zA-Z0-9_][a-zA-Z0-9._-]{0,127}
/// > ```
/// Tags are checked against this restriction at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Tag(String),
    Digest(Digest),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Tag(tag) => write!(f, "{}", tag),
            Reference::Digest(digest) => write!(f, "{}", digest),
        }
    }
}

lazy_static::lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9._-]{0,127}$").unwrap();
}

impl Reference {
    pub fn tag(tag: &str) -> Result<Self> {
        if TAG_RE.is_match(tag) {
            Ok(Reference::Tag(tag.to_string()))
        } else {
            Err(Error::InvalidReference(format!("invalid tag: {}", tag)))
        }
    }

    pub fn digest(digest: &str) -> Result<Self> {
        Ok(Reference::Digest(Digest::new(digest)?))
    }

    pub fn latest() -> Self {
        Reference::Tag("latest".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference() {
        assert_eq!(Reference::tag("latest").unwrap(), Reference::latest());
        assert_eq!(Reference::tag("v2.45.0").unwrap().to_string(), "v2.45.0");
        // @ is not allowed
        assert!(Reference::tag("my_super_tag@2").is_err());
        // Head must not be `.` or `-`
        assert!(Reference::tag(".hidden").is_err());
        assert!(Reference::tag(&"a".repeat(129)).is_err());
    }

    #[test]
    fn digest_reference() {
        let digest = format!("sha256:{}", "a".repeat(64));
        assert_eq!(Reference::digest(&digest).unwrap().to_string(), digest);
        assert!(Reference::digest("sha256:abc").is_err());
    }
}
