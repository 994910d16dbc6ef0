use crate::error::{RegistryError, Result};
use crate::manifest::{Manifest, TagList, MEDIA_TYPE_DOCKER_MANIFEST};
use crate::store::BlobStore;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Credentials / RegistryConfig
// ---------------------------------------------------------------------------

/// HTTP Basic credentials sent on every request.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("admin", "admin")
    }
}

/// Connection settings for one registry endpoint.
#[derive(Debug)]
pub struct RegistryConfig {
    /// Full base URL, e.g. `https://registry.local:5000/v2`.
    pub base_url: String,
    pub credentials: Credentials,
    /// Skip TLS certificate and hostname validation for this client only.
    pub accept_invalid_certs: bool,
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl RegistryConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: Credentials::default(),
            accept_invalid_certs: false,
            timeout: None,
            user_agent: concat!("blobpull/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

// ---------------------------------------------------------------------------
// RegistryClient
// ---------------------------------------------------------------------------

/// Docker Distribution v2 HTTP client with Basic auth.
#[derive(Debug)]
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RegistryError::Config(format!(
                "registry URL must start with http:// or https://, got {:?}",
                config.base_url
            )));
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RegistryError::Config(format!("failed to build HTTP client: {}", e)))?;

        if config.accept_invalid_certs {
            debug!(%base_url, "TLS certificate validation disabled for this registry");
        }

        Ok(Self {
            client,
            base_url,
            credentials: config.credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -- public API ---------------------------------------------------------

    /// List every tag of `image`, in registry order.
    pub async fn list_tags(&self, image: &str) -> Result<TagList> {
        let url = self.url(image, "tags/list");
        let resp = self.get(&url, None).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Resolve the "latest" tag of `image`: the last tag the registry lists.
    pub async fn latest_tag(&self, image: &str) -> Result<String> {
        let tags = self.list_tags(image).await?;
        let tag = tags.last_tag()?.to_string();
        info!(image, %tag, "resolved latest tag");
        Ok(tag)
    }

    /// Fetch the V2 manifest for `image:tag`.
    pub async fn fetch_manifest(&self, image: &str, tag: &str) -> Result<Manifest> {
        let url = self.url(image, &format!("manifests/{}", tag));
        let resp = self.get(&url, Some(MEDIA_TYPE_DOCKER_MANIFEST)).await?;
        let body = resp.bytes().await?;
        let manifest: Manifest = serde_json::from_slice(&body)?;
        info!(image, tag, layers = manifest.layers.len(), "fetched manifest");
        Ok(manifest)
    }

    /// Stream the blob `digest` of `image` into `store`.  Returns the path of
    /// the written file.
    pub async fn download_blob(
        &self,
        image: &str,
        digest: &str,
        store: &BlobStore,
    ) -> Result<PathBuf> {
        BlobStore::check_digest(digest)?;
        let url = self.url(image, &format!("blobs/{}", digest));
        debug!(digest, "downloading blob");
        let resp = self.get(&url, None).await?;

        let (path, bytes) = store.write_stream(digest, resp.bytes_stream()).await?;
        info!(digest, bytes, path = %path.display(), "downloaded blob");
        Ok(path)
    }

    // -- internals ----------------------------------------------------------

    fn url(&self, image: &str, suffix: &str) -> String {
        format!("{}/{}/{}", self.base_url, image.trim_matches('/'), suffix)
    }

    /// Send an authenticated GET and reject non-success statuses.
    async fn get(&self, url: &str, accept: Option<&str>) -> Result<reqwest::Response> {
        let mut req = self.client.get(url).basic_auth(
            &self.credentials.username,
            Some(self.credentials.password.expose_secret()),
        );
        if let Some(a) = accept {
            req = req.header(ACCEPT, a);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(resp)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RegistryClient {
        RegistryClient::new(RegistryConfig::new(base)).unwrap()
    }

    #[test]
    fn url_joins_base_image_and_suffix() {
        let c = client("https://registry.local:5000/v2/");
        assert_eq!(c.base_url(), "https://registry.local:5000/v2");
        assert_eq!(
            c.url("team/app", "tags/list"),
            "https://registry.local:5000/v2/team/app/tags/list"
        );
        assert_eq!(
            c.url("/app/", "manifests/v1"),
            "https://registry.local:5000/v2/app/manifests/v1"
        );
    }

    #[test]
    fn rejects_url_without_scheme() {
        let err = RegistryClient::new(RegistryConfig::new("registry.local/v2")).unwrap_err();
        assert!(matches!(err, RegistryError::Config(_)));
    }

    #[test]
    fn config_defaults() {
        let cfg = RegistryConfig::new("https://r/v2");
        assert!(!cfg.accept_invalid_certs);
        assert!(cfg.timeout.is_none());
        assert_eq!(cfg.credentials.username, "admin");
        assert_eq!(cfg.credentials.password.expose_secret(), "admin");
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("alice", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn builder_methods_set_fields() {
        let cfg = RegistryConfig::new("https://r/v2")
            .credentials(Credentials::new("bob", "pw"))
            .accept_invalid_certs(true)
            .timeout(Some(Duration::from_secs(5)));
        assert_eq!(cfg.credentials.username, "bob");
        assert!(cfg.accept_invalid_certs);
        assert_eq!(cfg.timeout, Some(Duration::from_secs(5)));
    }
}
