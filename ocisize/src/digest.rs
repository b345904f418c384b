use crate::error::*;
use regex::Regex;
use std::fmt;

/// Digest of contents
///
/// Digest is defined in [OCI image spec](https://github.com/opencontainers/image-spec/blob/v1.0.1/descriptor.md#digests)
/// as `algorithm ":" encoded`. Only `sha256` is accepted from user input,
/// and the encoded part must be exactly 64 lowercase hex characters:
///
/// ```text
/// sha256:6c3c624b58dbbcd3c0dd82b4c53f04194d1247c6eebdaab7c610cf7d66709b3b
/// ```
///
/// The digest is used only as a lookup key, it is never verified against content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    pub algorithm: String,
    pub encoded: String,
}

lazy_static::lazy_static! {
    static ref SHA256_RE: Regex = Regex::new(r"^[a-f0-9]{64}$").unwrap();
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.encoded)
    }
}

impl Digest {
    pub fn new(input: &str) -> Result<Self> {
        match input.split_once(':') {
            Some(("sha256", encoded)) if SHA256_RE.is_match(encoded) => Ok(Digest {
                algorithm: "sha256".to_string(),
                encoded: encoded.to_string(),
            }),
            _ => Err(Error::InvalidDigest(input.to_string())),
        }
    }
}
