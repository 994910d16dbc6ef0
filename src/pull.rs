//! Pull pipeline: tag resolution, manifest fetch, and the layer download batch.
//!
//! The run is linear: resolve the tag (only when none was given), fetch the
//! manifest, then download every layer blob in manifest order. Downloads go
//! through an ordered buffer of at most `jobs` in-flight requests, so with
//! the default of one job the batch is strictly sequential.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use blobpull_registry::{BlobStore, Manifest, RegistryClient, RegistryError};
use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::PullConfig;
use crate::{Error, Result};

// ---------------------------------------------------------------------------
// ErrorPolicy
// ---------------------------------------------------------------------------

/// How the download batch reacts to a failed layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Abort on the first failed layer; in-flight downloads are cancelled.
    #[default]
    FailFast,
    /// Attempt every layer and report per-layer outcomes.
    Isolated,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Progress of a pull run, as shown on the console.
#[derive(Debug)]
pub enum PullEvent<'a> {
    TagResolved {
        tag: &'a str,
    },
    ManifestFetched {
        tag: &'a str,
    },
    BlobSaved {
        digest: &'a str,
        file_name: &'a str,
    },
    BlobFailed {
        digest: &'a str,
        error: &'a RegistryError,
    },
    Finished {
        image: &'a str,
        tag: &'a str,
        downloaded: usize,
    },
}

impl fmt::Display for PullEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TagResolved { tag } => write!(f, "[~] Latest tag: {}", tag),
            Self::ManifestFetched { tag } => write!(f, "[~] Got manifest for tag {}", tag),
            Self::BlobSaved { digest, file_name } => {
                write!(f, "[+] Downloaded and saved blob {} as {}", digest, file_name)
            }
            Self::BlobFailed { digest, error } => {
                write!(f, "[!] Failed to download blob {}: {}", digest, error)
            }
            Self::Finished {
                image,
                tag,
                downloaded,
            } => write!(
                f,
                "[~] Downloaded {} blobs for the image {} with tag {}",
                downloaded, image, tag
            ),
        }
    }
}

/// Receives [`PullEvent`]s as the run progresses.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &PullEvent<'_>);
}

/// Prints every event to standard output.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, event: &PullEvent<'_>) {
        println!("{}", event);
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn report(&self, _event: &PullEvent<'_>) {}
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Result of downloading one layer.
#[derive(Debug)]
pub struct LayerOutcome {
    pub digest: String,
    pub result: std::result::Result<PathBuf, RegistryError>,
}

/// Everything a finished pull produced, layers in manifest order.
#[derive(Debug)]
pub struct PullReport {
    pub image: String,
    pub tag: String,
    /// `true` when the tag came from the registry's tag list.
    pub tag_resolved: bool,
    pub layers: Vec<LayerOutcome>,
}

impl PullReport {
    /// Paths of the successfully written blobs, in manifest order.
    pub fn paths(&self) -> Vec<&PathBuf> {
        self.layers
            .iter()
            .filter_map(|l| l.result.as_ref().ok())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &LayerOutcome> {
        self.layers.iter().filter(|l| l.result.is_err())
    }

    /// Turn per-layer failures into a single error.
    pub fn check(&self) -> Result<()> {
        let failed = self.failures().count();
        if failed == 0 {
            Ok(())
        } else {
            Err(Error::LayerFailures {
                failed,
                total: self.layers.len(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Puller
// ---------------------------------------------------------------------------

/// Drives one image pull against a registry.
pub struct Puller {
    client: RegistryClient,
    store: BlobStore,
    jobs: NonZeroUsize,
    policy: ErrorPolicy,
    reporter: Box<dyn Reporter>,
}

impl Puller {
    pub fn new(client: RegistryClient, store: BlobStore) -> Self {
        Self {
            client,
            store,
            jobs: NonZeroUsize::MIN,
            policy: ErrorPolicy::default(),
            reporter: Box::new(SilentReporter),
        }
    }

    pub fn jobs(mut self, jobs: NonZeroUsize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Use `tag` when given, otherwise ask the registry for its last tag.
    /// Returns the tag and whether it was resolved remotely.
    pub async fn resolve_tag(&self, image: &str, tag: Option<&str>) -> Result<(String, bool)> {
        match tag {
            Some(tag) => Ok((tag.to_string(), false)),
            None => {
                let tag = self.client.latest_tag(image).await?;
                self.reporter.report(&PullEvent::TagResolved { tag: &tag });
                Ok((tag, true))
            }
        }
    }

    /// Run the full pipeline for `image`.
    pub async fn pull(&self, image: &str, tag: Option<&str>) -> Result<PullReport> {
        let (tag, tag_resolved) = self.resolve_tag(image, tag).await?;

        let manifest = self.client.fetch_manifest(image, &tag).await?;
        self.reporter
            .report(&PullEvent::ManifestFetched { tag: &tag });

        let layers = self.download_all(image, &manifest).await?;
        let downloaded = layers.iter().filter(|l| l.result.is_ok()).count();
        self.reporter.report(&PullEvent::Finished {
            image,
            tag: &tag,
            downloaded,
        });

        Ok(PullReport {
            image: image.to_string(),
            tag,
            tag_resolved,
            layers,
        })
    }

    /// Download every layer of `manifest`, returning outcomes in manifest
    /// order.
    ///
    /// Under [`ErrorPolicy::FailFast`] the first failure is returned as the
    /// error and no further layer is started; downloads already in flight
    /// (at most `jobs - 1` of them) are cancelled.
    pub async fn download_all(&self, image: &str, manifest: &Manifest) -> Result<Vec<LayerOutcome>> {
        let total = manifest.layers.len();

        let downloads = stream::iter(manifest.layer_digests())
            .map(|digest| async move {
                let result = self.client.download_blob(image, digest, &self.store).await;
                (digest, result)
            })
            .buffered(self.jobs.get());
        let mut downloads = std::pin::pin!(downloads);

        let mut outcomes = Vec::with_capacity(total);
        while let Some((digest, result)) = downloads.next().await {
            let result = match result {
                Ok(path) => {
                    let file_name = BlobStore::file_name(digest);
                    self.reporter.report(&PullEvent::BlobSaved {
                        digest,
                        file_name: &file_name,
                    });
                    Ok(path)
                }
                Err(error) => {
                    warn!(digest, %error, "layer download failed");
                    if self.policy == ErrorPolicy::FailFast {
                        return Err(error.into());
                    }
                    self.reporter.report(&PullEvent::BlobFailed {
                        digest,
                        error: &error,
                    });
                    Err(error)
                }
            };
            outcomes.push(LayerOutcome {
                digest: digest.to_string(),
                result,
            });
        }

        info!(
            image,
            total,
            failed = outcomes.iter().filter(|o| o.result.is_err()).count(),
            "layer batch finished"
        );
        Ok(outcomes)
    }
}

/// Pull the image described by `config`, reporting progress to `reporter`.
pub async fn run(config: PullConfig, reporter: Box<dyn Reporter>) -> Result<PullReport> {
    let client = RegistryClient::new(config.registry)?;
    let puller = Puller::new(client, BlobStore::new(config.output_dir))
        .jobs(config.jobs)
        .policy(config.policy)
        .reporter(reporter);
    puller.pull(&config.image, config.tag.as_deref()).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
