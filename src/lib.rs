//! blobpull: download every layer blob of a container image.
//!
//! Talks to a Docker Distribution v2 registry with HTTP Basic credentials,
//! resolving the tag when none is given, fetching the V2 manifest, and
//! streaming each layer to `<output_dir>/<12 hex chars>.tar.gz`.
//!
//! # Example
//!
//! ```no_run
//! use blobpull::pull::{self, ConsoleReporter};
//! use blobpull::PullConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = PullConfig::new("https://registry.local:5000/v2", "team/app");
//!     config.tag = Some("v1".to_string());
//!
//!     let report = pull::run(config, Box::new(ConsoleReporter)).await?;
//!     for path in report.paths() {
//!         println!("{}", path.display());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pull;

pub use config::{Args, PullConfig};
pub use error::{Error, Result};
pub use pull::{ErrorPolicy, PullReport, Puller};

pub use blobpull_registry as registry;
