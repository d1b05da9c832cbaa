//! Container image source resolution.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

const DEFAULT_REGISTRY: &str = "docker.io";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageSource {
    /// Pulled from a registry: `ghcr.io/open-webui/open-webui:main`,
    /// `oci://registry.example.com/team/api:v1`, or `postgres:15`.
    Registry {
        registry: String,
        repository: String,
        tag: String,
    },
    /// Built from a local directory at deploy time: `asset://./docker/gateway`.
    Asset { path: String },
}

impl ImageSource {
    pub fn parse(uri: &str) -> ConfigResult<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(ConfigError::UnsupportedSource(uri.to_string()));
        }
        if let Some(path) = uri.strip_prefix("asset://") {
            if path.is_empty() {
                return Err(ConfigError::UnsupportedSource(uri.to_string()));
            }
            return Ok(ImageSource::Asset {
                path: path.to_string(),
            });
        }
        if uri.contains("://") && !uri.starts_with("oci://") {
            return Err(ConfigError::UnsupportedSource(uri.to_string()));
        }

        let rest = uri.strip_prefix("oci://").unwrap_or(uri);
        // A tag separator is a ':' after the last '/', so registry ports survive.
        let last_slash = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (path, tag) = match rest[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (&rest[..split], &rest[split + 1..])
            }
            None => (rest, "latest"),
        };
        if path.is_empty() || tag.is_empty() {
            return Err(ConfigError::UnsupportedSource(uri.to_string()));
        }

        let (registry, repository) = match path.split_once('/') {
            Some((first, remainder))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), remainder.to_string())
            }
            Some(_) => (DEFAULT_REGISTRY.to_string(), path.to_string()),
            None => (DEFAULT_REGISTRY.to_string(), format!("library/{path}")),
        };

        Ok(ImageSource::Registry {
            registry,
            repository,
            tag: tag.to_string(),
        })
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            ImageSource::Registry { .. } => "registry",
            ImageSource::Asset { .. } => "asset",
        }
    }

    /// Whether this image must be built before the task definition can use it.
    pub fn needs_build(&self) -> bool {
        matches!(self, ImageSource::Asset { .. })
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Registry {
                registry,
                repository,
                tag,
            } => write!(f, "{registry}/{repository}:{tag}"),
            ImageSource::Asset { path } => write!(f, "asset://{path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_qualified_registry() {
        let src = ImageSource::parse("ghcr.io/open-webui/open-webui:main").unwrap();
        assert_eq!(
            src,
            ImageSource::Registry {
                registry: "ghcr.io".to_string(),
                repository: "open-webui/open-webui".to_string(),
                tag: "main".to_string(),
            }
        );
    }

    #[test]
    fn parse_official_image_defaults() {
        let src = ImageSource::parse("postgres").unwrap();
        assert_eq!(src.to_string(), "docker.io/library/postgres:latest");
    }

    #[test]
    fn parse_registry_with_port() {
        let src = ImageSource::parse("oci://localhost:5000/team/api").unwrap();
        assert_eq!(src.to_string(), "localhost:5000/team/api:latest");
    }

    #[test]
    fn parse_asset() {
        let src = ImageSource::parse("asset://./docker/bedrock-gateway").unwrap();
        assert_eq!(src.scheme(), "asset");
        assert!(src.needs_build());
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(ImageSource::parse("s3://bucket/image.tar").is_err());
        assert!(ImageSource::parse("").is_err());
        assert!(ImageSource::parse("asset://").is_err());
    }
}
