use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::{primitives::ByteStream, Client};

use crate::error::{Error, Result};
use crate::store::{ObjectLocation, ObjectStore};

/// S3 settings layered on top of the shared SDK config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

impl ClientOptions {
    /// A custom endpoint means an S3-compatible service, which is addressed
    /// path-style (`http://host/bucket/key`).
    pub fn for_endpoint(endpoint_url: Option<&str>) -> Self {
        Self {
            endpoint_url: endpoint_url.map(|url| url.to_string()),
            force_path_style: endpoint_url.is_some(),
        }
    }

    pub fn s3_config(&self, sdk: &SdkConfig) -> aws_sdk_s3::Config {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk);
        if let Some(url) = &self.endpoint_url {
            builder = builder.endpoint_url(url);
        }
        builder.force_path_style(self.force_path_style).build()
    }
}

/// Builds a client from the default credential and region chain.
pub async fn make_s3_client(endpoint_url: Option<&str>) -> Client {
    let sdk = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let options = ClientOptions::for_endpoint(endpoint_url);
    if let Some(url) = &options.endpoint_url {
        tracing::info!(endpoint = %url, "using custom S3 endpoint");
    }
    Client::from_conf(options.s3_config(&sdk))
}

pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, location: &ObjectLocation) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&location.bucket)
                .prefix(&location.prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| Error::SourceNotFound {
                    location: location.to_string(),
                    reason: DisplayErrorContext(&e).to_string(),
                })?;

            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(|s| s.to_string())),
            );
            tracing::debug!(bucket = %location.bucket, listed = keys.len(), "listed page");

            match page.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::SourceRead {
                key: key.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        let collected = resp.body.collect().await.map_err(|e| Error::SourceRead {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        Ok(collected.into_bytes().to_vec())
    }

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("text/csv")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::TargetWrite {
                key: key.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}
