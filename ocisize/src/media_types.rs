use oci_spec::image::MediaType;
use std::fmt;

pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_FOREIGN_LAYER: &str = "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip";

/// Media types of top-level documents returned by `GET /v2/<name>/manifests/<reference>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    /// `application/vnd.oci.image.index.v1+json`
    OciIndex,
    /// `application/vnd.docker.distribution.manifest.list.v2+json`
    DockerManifestList,
    /// `application/vnd.oci.image.manifest.v1+json`
    OciManifest,
    /// `application/vnd.docker.distribution.manifest.v2+json`
    DockerManifest,
    /// Anything else, e.g. Docker schema 1 manifests
    Unsupported(String),
}

impl ManifestKind {
    /// All supported kinds, in the order sent in the `Accept` header
    pub const SUPPORTED: [ManifestKind; 4] = [
        ManifestKind::OciIndex,
        ManifestKind::DockerManifestList,
        ManifestKind::OciManifest,
        ManifestKind::DockerManifest,
    ];

    /// Classify a `Content-Type` header or a `mediaType` field. Parameters like `; charset=utf-8` are ignored.
    pub fn from_media_type(media_type: &str) -> Self {
        let essence = media_type.split(';').next().unwrap_or_default().trim();
        Self::SUPPORTED
            .into_iter()
            .find(|kind| kind.media_type().eq_ignore_ascii_case(essence))
            .unwrap_or_else(|| ManifestKind::Unsupported(essence.to_string()))
    }

    pub fn media_type(&self) -> String {
        match self {
            ManifestKind::OciIndex => MediaType::ImageIndex.to_string(),
            ManifestKind::OciManifest => MediaType::ImageManifest.to_string(),
            ManifestKind::DockerManifestList => DOCKER_MANIFEST_LIST.to_string(),
            ManifestKind::DockerManifest => DOCKER_MANIFEST.to_string(),
            ManifestKind::Unsupported(media_type) => media_type.clone(),
        }
    }

    /// Multi-platform document listing per-platform manifests
    pub fn is_index(&self) -> bool {
        matches!(self, ManifestKind::OciIndex | ManifestKind::DockerManifestList)
    }

    pub fn is_manifest(&self) -> bool {
        matches!(self, ManifestKind::OciManifest | ManifestKind::DockerManifest)
    }

    /// Value of the `Accept` header for manifest requests
    pub fn accept_header() -> String {
        Self::SUPPORTED
            .iter()
            .map(ManifestKind::media_type)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.media_type())
    }
}

/// Layers which registries may refuse to serve, and which are fetched from URLs given in the descriptor
///
/// This covers Docker foreign layers (Windows base layers) and the deprecated
/// OCI non-distributable layer types.
pub fn is_foreign_layer(media_type: &MediaType) -> bool {
    let media_type = media_type.to_string();
    media_type == DOCKER_FOREIGN_LAYER
        || media_type.starts_with("application/vnd.oci.image.layer.nondistributable.")
}
