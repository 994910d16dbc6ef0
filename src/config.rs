//! Command-line arguments and the resolved pull configuration.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use blobpull_registry::store::DEFAULT_OUTPUT_DIR;
use blobpull_registry::{Credentials, RegistryConfig};
use clap::Parser;

use crate::pull::ErrorPolicy;
use crate::{Error, Result};

/// Tries to download all blobs from a docker image via docker registry.
#[derive(Debug, Parser)]
#[command(name = "blobpull", version, about)]
pub struct Args {
    /// The FULL URL for the docker registry
    #[arg(long = "registry_url", env = "BLOBPULL_REGISTRY_URL")]
    pub registry_url: String,

    /// Image name
    #[arg(long, env = "BLOBPULL_IMAGE")]
    pub image: String,

    /// Image tag; the last tag the registry lists when omitted
    #[arg(long, env = "BLOBPULL_TAG")]
    pub tag: Option<String>,

    /// Username to authenticate as
    #[arg(long, env = "BLOBPULL_USERNAME", default_value = "admin")]
    pub username: String,

    /// User password
    #[arg(
        long,
        env = "BLOBPULL_PASSWORD",
        default_value = "admin",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,

    /// Directory blobs are written to
    #[arg(long, env = "BLOBPULL_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Maximum number of concurrent blob downloads
    #[arg(long, env = "BLOBPULL_JOBS", default_value_t = 1)]
    pub jobs: usize,

    /// Keep downloading remaining layers after a layer fails
    #[arg(long)]
    pub keep_going: bool,

    /// Skip TLS certificate validation for this registry
    #[arg(long, env = "BLOBPULL_INSECURE")]
    pub insecure: bool,

    /// Per-request timeout in seconds (none by default)
    #[arg(long, env = "BLOBPULL_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
}

/// Everything one pull run needs, validated.
#[derive(Debug)]
pub struct PullConfig {
    pub registry: RegistryConfig,
    pub image: String,
    pub tag: Option<String>,
    pub output_dir: PathBuf,
    pub jobs: NonZeroUsize,
    pub policy: ErrorPolicy,
}

impl PullConfig {
    pub fn new(registry_url: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            registry: RegistryConfig::new(registry_url),
            image: image.into(),
            tag: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            jobs: NonZeroUsize::MIN,
            policy: ErrorPolicy::FailFast,
        }
    }
}

impl TryFrom<Args> for PullConfig {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self> {
        let image = args.image.trim().to_string();
        if image.is_empty() {
            return Err(Error::Config("--image must not be empty".to_string()));
        }
        let jobs = NonZeroUsize::new(args.jobs)
            .ok_or_else(|| Error::Config("--jobs must be at least 1".to_string()))?;
        // An empty --tag behaves like an omitted one.
        let tag = args.tag.filter(|t| !t.is_empty());

        let registry = RegistryConfig::new(args.registry_url)
            .credentials(Credentials::new(args.username, args.password))
            .accept_invalid_certs(args.insecure)
            .timeout(args.timeout_secs.map(Duration::from_secs));

        Ok(Self {
            registry,
            image,
            tag,
            output_dir: args.output_dir,
            jobs,
            policy: if args.keep_going {
                ErrorPolicy::Isolated
            } else {
                ErrorPolicy::FailFast
            },
        })
    }
}
