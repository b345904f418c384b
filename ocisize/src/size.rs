use crate::media_types::is_foreign_layer;
use oci_spec::image::{Descriptor, ImageManifest};
use serde::{ser::SerializeStruct, Serialize, Serializer};
use std::fmt;

/// Which declared blobs count towards the size of a platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizePolicy {
    /// Skip Docker foreign layers and OCI non-distributable layers
    pub exclude_foreign_layers: bool,
}

/// Total declared size of one platform of an image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformSize {
    /// e.g. `linux/amd64` or `linux/arm/v7`
    pub platform: String,
    pub size_bytes: u64,
}

impl PlatformSize {
    pub fn human_size(&self) -> String {
        human_size(self.size_bytes)
    }
}

impl fmt::Display for PlatformSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.platform, self.human_size())
    }
}

impl Serialize for PlatformSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("PlatformSize", 3)?;
        s.serialize_field("platform", &self.platform)?;
        s.serialize_field("sizeBytes", &self.size_bytes)?;
        s.serialize_field("size", &self.human_size())?;
        s.end()
    }
}

/// Sum of the config blob and layer sizes declared in the manifest
///
/// Nothing is downloaded; the declared sizes are trusted as-is.
pub fn aggregate(platform: &str, manifest: &ImageManifest, policy: SizePolicy) -> PlatformSize {
    let layers: u64 = manifest
        .layers()
        .iter()
        .filter(|layer| !(policy.exclude_foreign_layers && is_foreign_layer(layer.media_type())))
        .map(declared_size)
        .fold(0, u64::saturating_add);
    PlatformSize {
        platform: platform.to_string(),
        size_bytes: declared_size(manifest.config()).saturating_add(layers),
    }
}

fn declared_size(descriptor: &Descriptor) -> u64 {
    u64::try_from(descriptor.size()).unwrap_or_default()
}

/// Binary-scaled size with two decimals, e.g. `78.86M`. Sizes below 1 KiB are plain integers.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["", "K", "M", "G", "T", "P"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        bytes.to_string()
    } else {
        format!("{:.2}{}", size, UNITS[unit])
    }
}
