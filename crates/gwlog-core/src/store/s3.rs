//! S3 implementation of [`ObjectStore`].

use super::{ListPage, ObjectStore, StoreError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::Client;
use gwlog_common::{Marker, ObjectKey};
use tracing::debug;

/// Error codes S3 and STS use for expired or unusable sessions.
const CREDENTIAL_ERROR_CODES: &[&str] = &[
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidAccessKeyId",
    "InvalidToken",
    "TokenRefreshRequired",
    "SignatureDoesNotMatch",
];

/// Connection settings for the S3 client.
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    pub region: Option<String>,
    /// Custom endpoint (MinIO, LocalStack). Enables path-style addressing.
    pub endpoint: Option<String>,
    /// Named profile from the shared AWS config.
    pub profile: Option<String>,
}

impl S3Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }
}

/// Build an S3 client. The caller owns it and passes it down explicitly.
pub async fn create_s3_client(config: &S3Config) -> Client {
    use aws_config::Region;

    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    if let Some(profile) = &config.profile {
        loader = loader.profile_name(profile);
    }
    let sdk_config = loader.load().await;

    let builder = aws_sdk_s3::config::Builder::from(&sdk_config);
    let s3_config = if config.endpoint.is_some() {
        builder.force_path_style(true).build()
    } else {
        builder.build()
    };
    Client::from_conf(s3_config)
}

/// [`ObjectStore`] over `ListObjects` (v1, marker-based) and `GetObject`.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &Marker,
    ) -> Result<ListPage, StoreError> {
        let mut req = self.client.list_objects().bucket(bucket).prefix(prefix);
        if !marker.is_start() {
            req = req.marker(marker.as_str());
        }
        let resp = req.send().await.map_err(classify)?;

        let entries: Vec<ObjectKey> = resp
            .contents()
            .iter()
            .filter_map(|obj| obj.key())
            .filter(|key| !key.is_empty())
            .map(ObjectKey::from)
            .collect();
        let truncated = resp.is_truncated().unwrap_or(false);
        debug!(bucket, prefix, entries = entries.len(), truncated, "listed page");

        Ok(ListPage { entries, truncated })
    }

    async fn get(&self, bucket: &str, key: &ObjectKey) -> Result<Vec<u8>, StoreError> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(classify)?;
        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Transport(format!("reading {key}: {e}")))?;
        Ok(body.into_bytes().to_vec())
    }
}

/// Sort an SDK failure into credential problems and everything else.
fn classify<E>(err: aws_sdk_s3::error::SdkError<E>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err.code().map(str::to_string);
    let context = DisplayErrorContext(&err).to_string();
    if is_credential_failure(code.as_deref(), &context) {
        StoreError::Credentials(context)
    } else {
        StoreError::Transport(context)
    }
}

fn is_credential_failure(code: Option<&str>, context: &str) -> bool {
    if code.is_some_and(|c| CREDENTIAL_ERROR_CODES.contains(&c)) {
        return true;
    }
    let lower = context.to_ascii_lowercase();
    lower.contains("credential") || lower.contains("mfa") || lower.contains("expired token")
}
