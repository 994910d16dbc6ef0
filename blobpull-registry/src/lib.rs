//! Docker Distribution v2 registry client used by `blobpull`.
//!
//! Covers the three calls the pull pipeline needs: listing tags, fetching a
//! V2 manifest, and streaming a layer blob into a [`store::BlobStore`].

pub mod error;
pub mod manifest;
pub mod registry;
pub mod store;

pub use error::{ErrorKind, RegistryError, Result};
pub use manifest::{Descriptor, Manifest, TagList};
pub use registry::{Credentials, RegistryClient, RegistryConfig};
pub use store::BlobStore;
