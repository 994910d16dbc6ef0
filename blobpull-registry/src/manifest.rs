use serde::{Deserialize, Serialize};

use crate::{RegistryError, Result};

// ---------------------------------------------------------------------------
// Image Manifest
// ---------------------------------------------------------------------------

/// A Docker Distribution image manifest
/// (application/vnd.docker.distribution.manifest.v2+json).
///
/// Only `layers[].digest` is required; registries are free to omit the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "schemaVersion", default)]
    pub schema_version: u32,

    #[serde(rename = "mediaType", default)]
    pub media_type: String,

    #[serde(default)]
    pub config: Option<Descriptor>,

    pub layers: Vec<Descriptor>,
}

impl Manifest {
    /// Layer digests in manifest order.
    pub fn layer_digests(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.digest.as_str())
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// A content-addressable descriptor, as listed in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "mediaType", default)]
    pub media_type: Option<String>,

    pub digest: String,

    #[serde(default)]
    pub size: Option<u64>,
}

// ---------------------------------------------------------------------------
// Tag list
// ---------------------------------------------------------------------------

/// Body of `GET /<name>/tags/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagList {
    #[serde(default)]
    pub name: Option<String>,

    // `null` and absent are both rejected in `last_tag`.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl TagList {
    /// The last tag in registry order.
    ///
    /// Registries make no ordering promise, so this is not necessarily the
    /// most recently pushed tag.
    pub fn last_tag(&self) -> Result<&str> {
        let tags = self
            .tags
            .as_ref()
            .ok_or_else(|| RegistryError::Shape("tag list has no `tags` field".to_string()))?;
        tags.last()
            .map(String::as_str)
            .ok_or_else(|| RegistryError::Shape("tag list is empty".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Media type constants
// ---------------------------------------------------------------------------

pub const MEDIA_TYPE_DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MANIFEST: &str = r#"{
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "config": {
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "digest": "sha256:aaaa",
            "size": 1234
        },
        "layers": [
            {
                "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                "digest": "sha256:bbbb",
                "size": 5678
            },
            {
                "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                "digest": "sha256:cccc",
                "size": 91011
            }
        ]
    }"#;

    #[test]
    fn parse_manifest() {
        let m: Manifest = serde_json::from_str(SAMPLE_MANIFEST).unwrap();
        assert_eq!(m.schema_version, 2);
        assert_eq!(m.config.as_ref().unwrap().digest, "sha256:aaaa");
        assert_eq!(m.layers.len(), 2);
        assert_eq!(m.layers[1].size, Some(91011));
        assert_eq!(
            m.layer_digests().collect::<Vec<_>>(),
            vec!["sha256:bbbb", "sha256:cccc"]
        );
    }

    #[test]
    fn parse_minimal_layers() {
        let m: Manifest =
            serde_json::from_str(r#"{"layers":[{"digest":"sha256:dddd"}]}"#).unwrap();
        assert_eq!(m.layers[0].digest, "sha256:dddd");
        assert!(m.layers[0].media_type.is_none());
        assert!(m.config.is_none());
    }

    #[test]
    fn manifest_without_layers_is_rejected() {
        assert!(serde_json::from_str::<Manifest>(r#"{"schemaVersion":2}"#).is_err());
    }

    #[test]
    fn last_tag_is_last_in_registry_order() {
        let list: TagList =
            serde_json::from_str(r#"{"name":"app","tags":["v1","v2","v3"]}"#).unwrap();
        assert_eq!(list.last_tag().unwrap(), "v3");

        let unsorted: TagList = serde_json::from_str(r#"{"tags":["v9","v10","v2"]}"#).unwrap();
        assert_eq!(unsorted.last_tag().unwrap(), "v2");
    }

    #[test]
    fn empty_or_missing_tags_are_shape_errors() {
        let empty: TagList = serde_json::from_str(r#"{"tags":[]}"#).unwrap();
        assert!(matches!(empty.last_tag(), Err(RegistryError::Shape(_))));

        let null: TagList = serde_json::from_str(r#"{"name":"app","tags":null}"#).unwrap();
        assert!(matches!(null.last_tag(), Err(RegistryError::Shape(_))));

        let missing: TagList = serde_json::from_str(r#"{"name":"app"}"#).unwrap();
        assert!(matches!(missing.last_tag(), Err(RegistryError::Shape(_))));
    }
}
