use crate::{
    cancel::Cancellation,
    config::{Config, DEFAULT_CONCURRENCY},
    distribution::{Client, Transport, UreqTransport},
    error::*,
    resolve::Resolver,
    size::{aggregate, PlatformSize, SizePolicy},
    ImageName,
};
use serde::Serialize;

/// Knobs of one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Upper bound of parallel platform manifest fetches
    pub concurrency: usize,
    /// Fail the query when any platform manifest cannot be fetched
    pub strict: bool,
    pub exclude_foreign_layers: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            concurrency: DEFAULT_CONCURRENCY,
            strict: false,
            exclude_foreign_layers: false,
        }
    }
}

impl QueryOptions {
    pub fn from_config(config: &Config) -> Self {
        QueryOptions {
            concurrency: config.concurrency,
            ..Default::default()
        }
    }
}

/// Sizes of every platform of an image, in the order the registry lists them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    /// Fully qualified reference, e.g. `registry-1.docker.io/library/nginx:latest`
    pub image: String,
    pub platforms: Vec<PlatformSize>,
    /// Platforms skipped because their manifest could not be fetched
    pub warnings: Vec<String>,
}

/// Query sizes of all platforms of `image` with the settings from environment
///
/// ```no_run
/// let result = ocisize::query("nginx:latest")?;
/// for platform in &result.platforms {
///     println!("{}", platform);
/// }
/// # Ok::<(), ocisize::error::Error>(())
/// ```
pub fn query(image: &str) -> Result<QueryResult> {
    let config = Config::from_env();
    let transport = UreqTransport::new(&config);
    query_with(
        &transport,
        image,
        &QueryOptions::from_config(&config),
        Cancellation::new(),
    )
}

/// Same as [query] through a given transport, cancellable from another thread
pub fn query_with(
    transport: &dyn Transport,
    image: &str,
    options: &QueryOptions,
    cancellation: Cancellation,
) -> Result<QueryResult> {
    let image = ImageName::parse(image)?;
    log::debug!("Query {}", image);
    let client = Client::new(transport, &image, cancellation)?;
    let resolved = Resolver::new(&client)
        .concurrency(options.concurrency)
        .strict(options.strict)
        .resolve(&image.reference())?;

    let policy = SizePolicy {
        exclude_foreign_layers: options.exclude_foreign_layers,
    };
    let platforms = resolved
        .platforms
        .iter()
        .map(|p| aggregate(&p.platform, &p.manifest, policy))
        .collect();
    Ok(QueryResult {
        image: image.to_string(),
        platforms,
        warnings: resolved.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{distribution::Response, media_types::ManifestKind, testing::*};

    const REPO: &str = "https://quay.io/v2/skopeo/stable";
    const PLATFORMS: [(&str, &str, u64); 4] = [
        ("linux", "amd64", 82_690_703),
        ("linux", "arm64", 79_020_687),
        ("linux", "ppc64le", 89_307_218),
        ("linux", "s390x", 83_487_621),
    ];

    fn skopeo(protected: bool) -> StubTransport {
        let index = index_json(
            &PLATFORMS
                .iter()
                .map(|(os, arch, _)| (*os, *arch, None))
                .collect::<Vec<_>>(),
        );
        let mut transport = StubTransport::new();
        let latest = format!("{}/manifests/latest", REPO);
        transport = if protected {
            transport
                .with_token("quay.io", "skopeo/stable")
                .protected_manifest(&latest, ManifestKind::OciIndex, &index)
        } else {
            transport.manifest(&latest, ManifestKind::OciIndex, &index)
        };
        for (i, (_, _, total)) in PLATFORMS.iter().enumerate() {
            let url = format!("{}/manifests/{}", REPO, digest(i as u64 + 1));
            let body = manifest_json(7_000, &[total - 7_000 - 1_000, 1_000]);
            transport = if protected {
                transport.protected_manifest(&url, ManifestKind::OciManifest, &body)
            } else {
                transport.manifest(&url, ManifestKind::OciManifest, &body)
            };
        }
        transport
    }

    fn sizes(result: &QueryResult) -> Vec<(String, String)> {
        result
            .platforms
            .iter()
            .map(|p| (p.platform.clone(), p.human_size()))
            .collect()
    }

    #[test]
    fn four_platforms() -> Result<()> {
        let transport = skopeo(false);
        let result = query_with(
            &transport,
            "quay.io/skopeo/stable:latest",
            &QueryOptions::default(),
            Cancellation::new(),
        )?;
        assert_eq!(result.image, "quay.io/skopeo/stable:latest");
        assert_eq!(
            sizes(&result),
            vec![
                ("linux/amd64".to_string(), "78.86M".to_string()),
                ("linux/arm64".to_string(), "75.36M".to_string()),
                ("linux/ppc64le".to_string(), "85.17M".to_string()),
                ("linux/s390x".to_string(), "79.62M".to_string()),
            ]
        );
        assert_eq!(result.platforms[0].size_bytes, 82_690_703);
        assert!(result.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn behind_token() -> Result<()> {
        let transport = skopeo(true);
        let result = query_with(
            &transport,
            "quay.io/skopeo/stable",
            &QueryOptions::default(),
            Cancellation::new(),
        )?;
        assert_eq!(result.platforms.len(), 4);
        // one token exchange serves the whole query
        let tokens = transport
            .requests()
            .iter()
            .filter(|url| url.as_str() == TOKEN_URL)
            .count();
        assert_eq!(tokens, 1);
        Ok(())
    }

    #[test]
    fn three_of_four() -> Result<()> {
        let broken = format!("{}/manifests/{}", REPO, digest(3));
        let transport = skopeo(false).route(&broken, |_| {
            Response::json(500, r#"{"errors":[{"code":"UNKNOWN","message":"boom"}]}"#)
        });
        let result = query_with(
            &transport,
            "quay.io/skopeo/stable:latest",
            &QueryOptions::default(),
            Cancellation::new(),
        )?;
        let platforms: Vec<&str> = result.platforms.iter().map(|p| p.platform.as_str()).collect();
        assert_eq!(platforms, vec!["linux/amd64", "linux/arm64", "linux/s390x"]);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("linux/ppc64le"));

        let strict = QueryOptions {
            strict: true,
            ..Default::default()
        };
        assert!(query_with(
            &transport,
            "quay.io/skopeo/stable:latest",
            &strict,
            Cancellation::new()
        )
        .is_err());
        Ok(())
    }

    #[test]
    fn not_found() {
        let transport = StubTransport::new();
        let err = query_with(
            &transport,
            "quay.io/skopeo/stable:nope",
            &QueryOptions::default(),
            Cancellation::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ManifestNotFound { .. }), "{:?}", err);
    }

    #[test]
    fn invalid_reference_makes_no_request() {
        let transport = StubTransport::new();
        let err = query_with(
            &transport,
            "quay.io/Skopeo/stable:latest",
            &QueryOptions::default(),
            Cancellation::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidReference(_)), "{:?}", err);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn cancelled() {
        let transport = skopeo(false);
        let cancellation = Cancellation::new();
        cancellation.cancel();
        let err = query_with(
            &transport,
            "quay.io/skopeo/stable:latest",
            &QueryOptions::default(),
            cancellation,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn serialize() -> Result<()> {
        let result = QueryResult {
            image: "registry-1.docker.io/library/nginx:latest".to_string(),
            platforms: vec![PlatformSize {
                platform: "linux/amd64".to_string(),
                size_bytes: 1536,
            }],
            warnings: vec![],
        };
        assert_eq!(
            serde_json::to_value(&result)?,
            serde_json::json!({
                "image": "registry-1.docker.io/library/nginx:latest",
                "platforms": [{"platform": "linux/amd64", "sizeBytes": 1536, "size": "1.50K"}],
                "warnings": []
            })
        );
        Ok(())
    }

    #[test]
    #[ignore]
    fn live_registry() -> Result<()> {
        let result = query("quay.io/skopeo/stable:latest")?;
        assert!(!result.platforms.is_empty());
        Ok(())
    }
}
