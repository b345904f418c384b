//! Walk from a reference to the manifest of every platform

use crate::{
    distribution::{Client, Reference},
    error::*,
    media_types::ManifestKind,
};
use oci_spec::image::{Descriptor, ImageIndex, ImageManifest, MediaType};
use serde::Deserialize;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

/// Platform reported when neither the index nor the image config names one
pub const UNKNOWN_PLATFORM: &str = "unknown/unknown";

/// Annotation set by BuildKit on attestation entries of an index
const REFERENCE_TYPE_ANNOTATION: &str = "vnd.docker.reference.type";

/// Manifest of one platform
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformManifest {
    pub platform: String,
    pub manifest: ImageManifest,
}

/// Platform manifests in index order, and what went wrong for the missing ones
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolved {
    pub platforms: Vec<PlatformManifest>,
    pub warnings: Vec<String>,
}

/// Resolve a reference into per-platform manifests
pub struct Resolver<'c, 't> {
    client: &'c Client<'t>,
    concurrency: usize,
    strict: bool,
}

impl<'c, 't> Resolver<'c, 't> {
    pub fn new(client: &'c Client<'t>) -> Self {
        Resolver {
            client,
            concurrency: 1,
            strict: false,
        }
    }

    /// Fetch at most `n` platform manifests at once
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Fail the whole resolution when any platform manifest cannot be fetched
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn resolve(&self, reference: &Reference) -> Result<Resolved> {
        let (body, kind) = self.client.get_manifest(reference)?;
        match kind {
            ManifestKind::OciIndex | ManifestKind::DockerManifestList => {
                let index: ImageIndex = serde_json::from_slice(&body)?;
                let platforms: IndexPlatforms = serde_json::from_slice(&body)?;
                self.resolve_index(&index, &platforms)
            }
            ManifestKind::OciManifest | ManifestKind::DockerManifest => {
                let manifest: ImageManifest = serde_json::from_slice(&body)?;
                self.resolve_single(manifest)
            }
            ManifestKind::Unsupported(media_type) => Err(Error::UnsupportedMediaType(media_type)),
        }
    }

    fn resolve_index(&self, index: &ImageIndex, platforms: &IndexPlatforms) -> Result<Resolved> {
        let (entries, labels): (Vec<&Descriptor>, Vec<String>) = index
            .manifests()
            .iter()
            .enumerate()
            .filter(|(_, descriptor)| {
                let skip = is_attestation(descriptor);
                if skip {
                    log::debug!("Skip attestation manifest {}", descriptor.digest());
                }
                !skip
            })
            .map(|(i, descriptor)| (descriptor, platforms.id(i)))
            .unzip();

        let mut resolved = Resolved::default();
        let mut first_error = None;
        for (platform, result) in labels.into_iter().zip(self.fetch_all(&entries)) {
            match result {
                Ok(manifest) => resolved.platforms.push(PlatformManifest { platform, manifest }),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) if self.strict => return Err(e),
                Err(e) => {
                    log::warn!("Skip platform {}: {}", platform, e);
                    resolved.warnings.push(format!("{}: {}", platform, e));
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if resolved.platforms.is_empty() => Err(e),
            _ => Ok(resolved),
        }
    }

    /// Fetch platform manifests on up to `concurrency` threads, keeping the input order
    fn fetch_all(&self, descriptors: &[&Descriptor]) -> Vec<Result<ImageManifest>> {
        let workers = self.concurrency.min(descriptors.len());
        if workers <= 1 {
            return descriptors
                .iter()
                .map(|descriptor| self.fetch_platform(descriptor))
                .collect();
        }

        let next = AtomicUsize::new(0);
        let slots: Vec<Mutex<Option<Result<ImageManifest>>>> =
            descriptors.iter().map(|_| Mutex::new(None)).collect();
        std::thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| loop {
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    let Some(descriptor) = descriptors.get(i) else {
                        break;
                    };
                    let result = self.fetch_platform(descriptor);
                    *slots[i].lock().unwrap_or_else(|e| e.into_inner()) = Some(result);
                });
            }
        });
        slots
            .into_iter()
            .map(|slot| {
                slot.into_inner()
                    .unwrap_or_else(|e| e.into_inner())
                    .unwrap_or(Err(Error::Cancelled))
            })
            .collect()
    }

    fn fetch_platform(&self, descriptor: &Descriptor) -> Result<ImageManifest> {
        let reference = Reference::digest(&descriptor.digest().to_string())?;
        let (body, kind) = self.client.get_manifest(&reference)?;
        if !kind.is_manifest() {
            return Err(Error::UnsupportedMediaType(kind.media_type()));
        }
        Ok(serde_json::from_slice(&body)?)
    }

    fn resolve_single(&self, manifest: ImageManifest) -> Result<Resolved> {
        let mut warnings = Vec::new();
        let platform = match self.config_platform(&manifest) {
            Ok(Some(platform)) => platform,
            Ok(None) => UNKNOWN_PLATFORM.to_string(),
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                log::warn!("Cannot read platform from image config: {}", e);
                warnings.push(format!("platform unknown: {}", e));
                UNKNOWN_PLATFORM.to_string()
            }
        };
        Ok(Resolved {
            platforms: vec![PlatformManifest { platform, manifest }],
            warnings,
        })
    }

    /// Single manifests carry no platform; the image config does
    fn config_platform(&self, manifest: &ImageManifest) -> Result<Option<String>> {
        let config = manifest.config();
        if !is_image_config(config.media_type()) {
            return Ok(None);
        }
        let blob = self.client.get_blob(&config.digest().to_string())?;
        let config: PlatformFields = serde_json::from_slice(&blob)?;
        Ok(config.id())
    }
}

/// Platform fields shared by index entries and image configs
///
/// Decoded on its own since [oci_spec::image::Platform] drops `os.version`.
#[derive(Debug, Default, Deserialize)]
pub struct PlatformFields {
    os: Option<String>,
    architecture: Option<String>,
    variant: Option<String>,
    #[serde(rename = "os.version")]
    os_version: Option<String>,
}

impl PlatformFields {
    /// `os/architecture[/variant][/os.version]`, e.g. `linux/arm/v7`
    pub fn id(&self) -> Option<String> {
        join_platform(&[
            self.os.as_deref(),
            self.architecture.as_deref(),
            self.variant.as_deref(),
            self.os_version.as_deref(),
        ])
    }
}

#[derive(Debug, Default, Deserialize)]
struct IndexPlatforms {
    #[serde(default)]
    manifests: Vec<IndexEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct IndexEntry {
    platform: Option<PlatformFields>,
}

impl IndexPlatforms {
    /// Platform of the `i`-th index entry
    fn id(&self, i: usize) -> String {
        self.manifests
            .get(i)
            .and_then(|entry| entry.platform.as_ref())
            .and_then(PlatformFields::id)
            .unwrap_or_else(|| UNKNOWN_PLATFORM.to_string())
    }
}

fn is_image_config(media_type: &MediaType) -> bool {
    matches!(media_type, MediaType::ImageConfig)
        || media_type.to_string() == "application/vnd.docker.container.image.v1+json"
}

fn join_platform(parts: &[Option<&str>]) -> Option<String> {
    let parts: Vec<&str> = parts
        .iter()
        .flatten()
        .copied()
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Attestation and signature entries of an index are not runnable images
///
/// BuildKit marks them with the `vnd.docker.reference.type: attestation-manifest`
/// annotation and an `unknown/unknown` platform.
pub fn is_attestation(descriptor: &Descriptor) -> bool {
    let annotated = descriptor
        .annotations()
        .as_ref()
        .and_then(|annotations| annotations.get(REFERENCE_TYPE_ANNOTATION))
        .map_or(false, |ty| ty == "attestation-manifest");
    let unknown = descriptor.platform().as_ref().map_or(false, |platform| {
        platform.os().to_string() == "unknown" || platform.architecture().to_string() == "unknown"
    });
    annotated || unknown
}
