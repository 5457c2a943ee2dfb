//! Mirror backend configuration

use std::path::PathBuf;
use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SetupError;

/// Where mirrored files are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MirrorConfig {
    /// S3 or an S3-compatible service such as MinIO
    S3 {
        /// Custom endpoint, e.g. `http://localhost:9000`; AWS when unset
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<String>,
        bucket: String,
        /// Key prefix prepended to every mirrored path
        #[serde(default)]
        prefix: String,
        /// Taken from the environment when unset
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secret_key: Option<String>,
    },
    /// A directory on the local filesystem
    Local {
        path: PathBuf,
        #[serde(default)]
        prefix: String,
    },
    /// Process memory, lost on exit
    Memory {
        #[serde(default)]
        prefix: String,
    },
}

impl MirrorConfig {
    /// Parse `s3://access_key:secret_key@host:port/bucket[/prefix]`.
    ///
    /// The endpoint is plain http, which is what local MinIO setups expect.
    pub fn parse_s3_url(url: &str) -> Result<Self, SetupError> {
        let parsed = Url::parse(url).map_err(|e| SetupError::InvalidUrl(e.to_string()))?;
        if parsed.scheme() != "s3" {
            return Err(SetupError::InvalidUrl(format!(
                "expected s3:// scheme, got {}://",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| SetupError::InvalidUrl("missing host".to_string()))?;
        let endpoint = match parsed.port() {
            Some(port) => format!("http://{host}:{port}"),
            None => format!("http://{host}"),
        };

        let mut segments = parsed
            .path()
            .split('/')
            .filter(|segment| !segment.is_empty());
        let bucket = segments
            .next()
            .ok_or_else(|| SetupError::InvalidUrl("missing bucket".to_string()))?
            .to_string();
        let prefix = segments.collect::<Vec<_>>().join("/");

        let access_key = Some(parsed.username())
            .filter(|user| !user.is_empty())
            .map(str::to_string);
        let secret_key = parsed.password().map(str::to_string);

        Ok(MirrorConfig::S3 {
            endpoint: Some(endpoint),
            region: None,
            bucket,
            prefix,
            access_key,
            secret_key,
        })
    }

    pub fn prefix(&self) -> &str {
        match self {
            MirrorConfig::S3 { prefix, .. }
            | MirrorConfig::Local { prefix, .. }
            | MirrorConfig::Memory { prefix } => prefix,
        }
    }

    /// Short description for logs and CLI output, without credentials
    pub fn describe(&self) -> String {
        match self {
            MirrorConfig::S3 {
                endpoint, bucket, ..
            } => match endpoint {
                Some(endpoint) => format!("s3 ({endpoint}/{bucket})"),
                None => format!("s3 ({bucket})"),
            },
            MirrorConfig::Local { path, .. } => format!("local ({})", path.display()),
            MirrorConfig::Memory { .. } => "memory".to_string(),
        }
    }

    /// Build the backing store
    pub(crate) fn build(&self) -> Result<Arc<dyn ObjectStore>, SetupError> {
        match self {
            MirrorConfig::S3 {
                endpoint,
                region,
                bucket,
                access_key,
                secret_key,
                ..
            } => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some(endpoint) = endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }
                builder = builder.with_region(region.as_deref().unwrap_or("us-east-1"));
                if let Some(access_key) = access_key {
                    builder = builder.with_access_key_id(access_key);
                }
                if let Some(secret_key) = secret_key {
                    builder = builder.with_secret_access_key(secret_key);
                }
                Ok(Arc::new(builder.build()?))
            }
            MirrorConfig::Local { path, .. } => {
                std::fs::create_dir_all(path).map_err(|source| SetupError::CreateDirectory {
                    path: path.clone(),
                    source,
                })?;
                Ok(Arc::new(LocalFileSystem::new_with_prefix(path)?))
            }
            MirrorConfig::Memory { .. } => Ok(Arc::new(InMemory::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_url() {
        let config =
            MirrorConfig::parse_s3_url("s3://minioadmin:secret@localhost:9000/tierfs/mirror")
                .unwrap();
        assert_eq!(
            config,
            MirrorConfig::S3 {
                endpoint: Some("http://localhost:9000".to_string()),
                region: None,
                bucket: "tierfs".to_string(),
                prefix: "mirror".to_string(),
                access_key: Some("minioadmin".to_string()),
                secret_key: Some("secret".to_string()),
            }
        );
        assert_eq!(config.prefix(), "mirror");
        assert_eq!(config.describe(), "s3 (http://localhost:9000/tierfs)");
    }

    #[test]
    fn test_parse_s3_url_rejects_bad_input() {
        assert!(MirrorConfig::parse_s3_url("not a url").is_err());
        assert!(MirrorConfig::parse_s3_url("http://localhost:9000/bucket").is_err());
        assert!(MirrorConfig::parse_s3_url("s3://localhost:9000").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = MirrorConfig::Local {
            path: PathBuf::from("/srv/mirror"),
            prefix: "disk-a".to_string(),
        };
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("type = \"local\""));
        let parsed: MirrorConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);

        let parsed: MirrorConfig = toml::from_str("type = \"memory\"").unwrap();
        assert_eq!(parsed.prefix(), "");
    }
}
