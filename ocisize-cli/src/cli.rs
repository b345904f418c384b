//! The `ocisize` command, independent of the process it runs in

use crate::{
    format::{self, Format},
    spinner::Spinner,
};
use anyhow::{anyhow, Result};
use clap::Parser;
use colored::Colorize;
use ocisize::{config::Config, distribution::Transport, query_with, Cancellation, QueryOptions};
use std::io::Write;

/// Query OCI registries for container image sizes across platforms
#[derive(Debug, Parser)]
#[command(
    name = "ocisize",
    version,
    after_help = "Examples:
  ocisize nginx:latest
  ocisize ghcr.io/immich-app/immich-server:v2.3.1
  ocisize --format json lscr.io/linuxserver/jellyfin:amd64-10.11.4"
)]
pub struct Opt {
    /// Container image name, e.g. nginx:latest, quay.io/repo/image:tag
    pub image: String,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Suppress error messages and spinner
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Do not show the progress spinner
    #[arg(long = "no-spinner")]
    pub no_spinner: bool,

    /// Fail when the manifest of any platform cannot be fetched
    #[arg(long = "strict")]
    pub strict: bool,

    /// Do not count foreign (non-distributable) layers
    #[arg(long = "exclude-foreign")]
    pub exclude_foreign: bool,

    /// Sort platforms by name instead of registry order
    #[arg(long = "sort")]
    pub sort: bool,

    /// Number of platform manifests fetched in parallel
    #[arg(short = 'j', long = "jobs")]
    pub jobs: Option<usize>,
}

impl Opt {
    pub fn query_options(&self, config: &Config) -> QueryOptions {
        QueryOptions {
            concurrency: self.jobs.unwrap_or(config.concurrency).max(1),
            strict: self.strict,
            exclude_foreign_layers: self.exclude_foreign,
        }
    }
}

/// Run one query, writing the result to `out` and diagnostics to `err`
///
/// Returns the process exit code: `0` when at least one platform was sized, `1` otherwise.
/// Nothing is written to `err` with `--quiet`.
pub fn run(
    opt: &Opt,
    transport: &dyn Transport,
    config: &Config,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> u8 {
    match execute(opt, transport, config, out, err) {
        Ok(()) => 0,
        Err(e) => {
            if !opt.quiet {
                let _ = writeln!(err, "{} {}", "Error:".red().bold(), e);
            }
            1
        }
    }
}

fn execute(
    opt: &Opt,
    transport: &dyn Transport,
    config: &Config,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()> {
    let options = opt.query_options(config);
    let spinner = Spinner::new(
        format!("Fetching manifest for {}", opt.image),
        !opt.quiet && !opt.no_spinner,
    );
    let result = std::thread::scope(|s| {
        s.spawn(|| query_with(transport, &opt.image, &options, Cancellation::new()))
            .join()
    })
    .map_err(|_| anyhow!("Query thread panicked"));
    let mut result = match result {
        Ok(Ok(result)) => {
            spinner.finish();
            result
        }
        Ok(Err(e)) => {
            spinner.fail();
            return Err(e.into());
        }
        Err(e) => {
            spinner.fail();
            return Err(e);
        }
    };

    if !opt.quiet {
        for warning in &result.warnings {
            writeln!(err, "{} {}", "Warning:".yellow().bold(), warning)?;
        }
    }
    if opt.sort {
        format::sort_platforms(&mut result);
    }
    writeln!(out, "{}", format::render(&result, opt.format)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocisize::{distribution::Response, media_types::ManifestKind, testing::*};

    const REPO: &str = "https://quay.io/v2/skopeo/stable";
    const IMAGE: &str = "quay.io/skopeo/stable:latest";

    fn skopeo() -> StubTransport {
        let mut transport = StubTransport::new().manifest(
            &format!("{}/manifests/latest", REPO),
            ManifestKind::OciIndex,
            &index_json(&[
                ("linux", "amd64", None),
                ("linux", "arm64", None),
                ("linux", "ppc64le", None),
                ("linux", "s390x", None),
            ]),
        );
        for n in 1..=4 {
            transport = transport.manifest(
                &format!("{}/manifests/{}", REPO, digest(n)),
                ManifestKind::OciManifest,
                &manifest_json(1024, &[n * 1024 * 1024]),
            );
        }
        transport
    }

    fn exec(transport: &StubTransport, args: &[&str]) -> (u8, String, String) {
        let mut argv = vec!["ocisize", "--no-spinner"];
        argv.extend_from_slice(args);
        let opt = Opt::try_parse_from(argv).unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = run(&opt, transport, &Config::default(), &mut out, &mut err);
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn success() {
        let (code, out, err) = exec(&skopeo(), &[IMAGE]);
        assert_eq!(code, 0);
        assert!(err.is_empty());
        assert!(out.starts_with("Image: quay.io/skopeo/stable:latest\n"));
        assert_eq!(out.lines().filter(|line| line.starts_with("linux/")).count(), 4);
    }

    #[test]
    fn missing_tag() {
        let (code, out, err) = exec(&skopeo(), &["quay.io/skopeo/stable:v0"]);
        assert_eq!(code, 1);
        assert!(out.is_empty());
        assert!(err.contains("Error:"));
        assert!(err.contains("not found"));
    }

    #[test]
    fn quiet_failure_is_silent() {
        let (code, out, err) = exec(&skopeo(), &["--quiet", "quay.io/skopeo/stable:v0"]);
        assert_eq!(code, 1);
        assert!(out.is_empty());
        assert!(err.is_empty());
    }

    #[test]
    fn invalid_image() {
        let (code, _, err) = exec(&skopeo(), &["quay.io/Skopeo/stable"]);
        assert_eq!(code, 1);
        assert!(err.contains("Invalid"));
    }

    #[test]
    fn partial_failure_warns() {
        let transport = skopeo().route(&format!("{}/manifests/{}", REPO, digest(3)), |_| {
            Response::json(500, "{}")
        });
        let (code, out, err) = exec(&transport, &["--format", "csv", IMAGE]);
        assert_eq!(code, 0);
        assert!(err.contains("Warning:"));
        assert!(err.contains("linux/ppc64le"));
        assert!(!out.contains("linux/ppc64le"));
        assert!(out.contains("linux/amd64"));
        assert!(out.contains("linux/s390x"));

        let (code, _, err) = exec(&transport, &["--quiet", IMAGE]);
        assert_eq!(code, 0);
        assert!(err.is_empty());
    }

    #[test]
    fn strict_partial_failure() {
        let transport = skopeo().route(&format!("{}/manifests/{}", REPO, digest(3)), |_| {
            Response::json(500, "{}")
        });
        let (code, out, _) = exec(&transport, &["--strict", IMAGE]);
        assert_eq!(code, 1);
        assert!(out.is_empty());
    }

    #[test]
    fn jobs_override_config() {
        let config = Config::default();
        let opt = Opt::try_parse_from(["ocisize", "-j", "0", IMAGE]).unwrap();
        assert_eq!(opt.query_options(&config).concurrency, 1);
        let opt = Opt::try_parse_from(["ocisize", IMAGE]).unwrap();
        assert_eq!(opt.query_options(&config).concurrency, config.concurrency.max(1));
    }
}
