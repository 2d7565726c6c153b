//! Bucket connection configuration.

use serde::{Deserialize, Serialize};

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Where the bucket lives and how to reach it.
///
/// ```toml
/// name = "my-bucket"
/// region = "eu-west-1"
/// endpoint = "http://localhost:9000"   # MinIO and friends
/// access_key_id = "..."
/// secret_access_key = "..."
/// ```
///
/// Without explicit keys the AWS default credential chain applies
/// (environment, shared profile, instance metadata).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketConfig {
    /// Bucket name.
    pub name: String,

    /// Region.
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint. Switches requests to path style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Static access key id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    /// Static secret access key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
}

impl BucketConfig {
    /// Config for `name` in the default region with ambient credentials.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set a custom endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Use static credentials.
    pub fn with_credentials(mut self, key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.access_key_id = Some(key_id.into());
        self.secret_access_key = Some(secret.into());
        self
    }

    /// Static credentials, when both halves are present.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}
