//! S3 object gateway.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{ObjectGateway, ObjectRef, StorageError};
use crate::{Error, Result};

/// [`ObjectGateway`] backed by AWS S3 or an S3-compatible store.
#[derive(Clone)]
pub struct S3Gateway {
    client: Client,
}

impl S3Gateway {
    /// Build a client from the default AWS credential chain.
    ///
    /// A custom `endpoint` switches to path-style addressing, which MinIO and
    /// most other S3-compatible stores require.
    pub async fn connect(region: &str, endpoint: Option<&str>) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::with_client(Client::from_conf(builder.build()))
    }

    /// Wrap an already configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectGateway for S3Gateway {
    async fn fetch(&self, object: &ObjectRef, dest: &Path) -> Result<u64> {
        debug!(bucket = %object.bucket, key = %object.key, "Fetching object");

        let response = self
            .client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    StorageError::NotFound {
                        uri: object.to_string(),
                    }
                } else {
                    StorageError::Fetch {
                        uri: object.to_string(),
                        message: DisplayErrorContext(&e).to_string(),
                    }
                }
            })?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::io_path("creating", dest, e))?;

        let mut body = response.body;
        let mut written = 0u64;
        while let Some(chunk) = body.try_next().await.map_err(|e| StorageError::Fetch {
            uri: object.to_string(),
            message: e.to_string(),
        })? {
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io_path("writing", dest, e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| Error::io_path("flushing", dest, e))?;

        info!(
            bucket = %object.bucket,
            key = %object.key,
            bytes = written,
            "Fetched object"
        );
        Ok(written)
    }

    async fn publish(&self, src: &Path, object: &ObjectRef) -> Result<()> {
        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| Error::io_path("reading", src, std::io::Error::other(e)))?;

        self.client
            .put_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Publish {
                uri: object.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        info!(bucket = %object.bucket, key = %object.key, "Published object");
        Ok(())
    }
}
