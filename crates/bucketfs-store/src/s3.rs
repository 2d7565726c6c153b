//! Amazon S3 bucket via `aws-sdk-s3`.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::{ByteStream as S3Body, DateTime};
use aws_sdk_s3::types::{Delete, ObjectCannedAcl, ObjectIdentifier};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::time::SystemTime;

use crate::acl::AccessLevel;
use crate::bucket::{ByteStream, ListPage, ListRequest, ObjectBucket, ObjectHead};
use crate::config::BucketConfig;
use crate::error::{StoreError, StoreResult};

/// DeleteObjects accepts at most this many keys per request.
const DELETE_BATCH: usize = 1000;

/// A single S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Bucket {
    client: Client,
    bucket: String,
}

impl S3Bucket {
    /// Wrap an existing client.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from `config` and the ambient AWS environment.
    ///
    /// A custom endpoint switches the client to path-style addressing,
    /// which S3-compatible servers generally expect.
    pub async fn from_config(config: &BucketConfig) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let Some((key_id, secret)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                key_id,
                secret,
                None,
                None,
                "bucketfs-config",
            ));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::debug!(
            bucket = %config.name,
            region = %config.region,
            endpoint = ?config.endpoint,
            "S3 client configured"
        );
        Self::new(Client::from_conf(builder.build()), config.name.clone())
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Map an SDK failure to a store error. Any 404 counts as not-found.
fn classify<E>(op: &'static str, key: &str, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    if status == Some(404) {
        return StoreError::not_found(key);
    }
    StoreError::backend(op, key, DisplayErrorContext(&err))
}

fn canned_acl(access: AccessLevel) -> ObjectCannedAcl {
    match access {
        AccessLevel::Private => ObjectCannedAcl::Private,
        AccessLevel::PublicRead => ObjectCannedAcl::PublicRead,
        AccessLevel::PublicReadWrite => ObjectCannedAcl::PublicReadWrite,
        AccessLevel::BucketOwnerRead => ObjectCannedAcl::BucketOwnerRead,
        AccessLevel::BucketOwnerFullControl => ObjectCannedAcl::BucketOwnerFullControl,
    }
}

fn system_time(t: Option<&DateTime>) -> SystemTime {
    t.and_then(|t| SystemTime::try_from(*t).ok())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

fn size(len: Option<i64>) -> u64 {
    len.and_then(|n| u64::try_from(n).ok()).unwrap_or(0)
}

#[async_trait]
impl ObjectBucket for S3Bucket {
    fn name(&self) -> &str {
        &self.bucket
    }

    #[tracing::instrument(skip(self), name = "s3.head")]
    async fn head(&self, key: &str) -> StoreResult<ObjectHead> {
        let out = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify("head", key, e))?;

        Ok(ObjectHead {
            key: key.to_string(),
            e_tag: out.e_tag().unwrap_or_default().to_string(),
            size: size(out.content_length()),
            last_modified: system_time(out.last_modified()),
        })
    }

    #[tracing::instrument(skip(self), name = "s3.get")]
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify("get", key, e))?;

        let data = out
            .body
            .collect()
            .await
            .map_err(|e| StoreError::backend("get", key, e))?;
        Ok(data.into_bytes())
    }

    async fn get_reader(&self, key: &str) -> StoreResult<ByteStream> {
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify("get", key, e))?;

        let key = key.to_string();
        let chunks = stream::try_unfold(out.body, move |mut body: S3Body| {
            let key = key.clone();
            async move {
                match body.try_next().await {
                    Ok(Some(chunk)) => Ok(Some((chunk, body))),
                    Ok(None) => Ok(None),
                    Err(e) => Err(StoreError::backend("get", key, e)),
                }
            }
        });
        Ok(chunks.boxed())
    }

    #[tracing::instrument(skip(self, data), fields(len = data.len()), name = "s3.put")]
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        access: AccessLevel,
    ) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .acl(canned_acl(access))
            .body(S3Body::from(data))
            .send()
            .await
            .map_err(|e| classify("put", key, e))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), name = "s3.delete")]
    async fn delete(&self, key: &str) -> StoreResult<()> {
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match classify("delete", key, e) {
                StoreError::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    #[tracing::instrument(skip(self, keys), fields(count = keys.len()), name = "s3.delete_multiple")]
    async fn delete_multiple(&self, keys: &[String]) -> StoreResult<()> {
        for batch in keys.chunks(DELETE_BATCH) {
            let first = batch.first().map(String::as_str).unwrap_or_default();

            let mut objects = Vec::with_capacity(batch.len());
            for key in batch {
                let id = ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|e| StoreError::backend("delete_multiple", key.as_str(), e))?;
                objects.push(id);
            }
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| StoreError::backend("delete_multiple", first, e))?;

            let out = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| classify("delete_multiple", first, e))?;

            if let Some(failed) = out.errors().first() {
                return Err(StoreError::backend(
                    "delete_multiple",
                    failed.key().unwrap_or(first),
                    failed.message().unwrap_or("delete rejected"),
                ));
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), name = "s3.list")]
    async fn list(&self, request: ListRequest) -> StoreResult<ListPage> {
        let out = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.clone())
            .set_continuation_token(request.continuation_token.clone())
            .set_max_keys(request.max_keys.and_then(|n| i32::try_from(n).ok()))
            .send()
            .await
            .map_err(|e| classify("list", &request.prefix, e))?;

        let entries = out
            .contents()
            .iter()
            .filter_map(|obj| {
                Some(ObjectHead {
                    key: obj.key()?.to_string(),
                    e_tag: obj.e_tag().unwrap_or_default().to_string(),
                    size: size(obj.size()),
                    last_modified: system_time(obj.last_modified()),
                })
            })
            .collect();
        let common_prefixes = out
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        Ok(ListPage {
            entries,
            common_prefixes,
            is_truncated: out.is_truncated().unwrap_or(false),
            next_token: out.next_continuation_token().map(str::to_string),
        })
    }

    #[tracing::instrument(skip(self), name = "s3.copy")]
    async fn copy(&self, dest_key: &str, access: AccessLevel, source_key: &str) -> StoreResult<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(dest_key)
            .copy_source(format!("{}/{}", self.bucket, source_key))
            .acl(canned_acl(access))
            .send()
            .await
            // A missing copy source comes back as 404 NoSuchKey.
            .map_err(|e| classify("copy", source_key, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canned_acl_names_match() {
        for access in [
            AccessLevel::Private,
            AccessLevel::PublicRead,
            AccessLevel::PublicReadWrite,
            AccessLevel::BucketOwnerRead,
            AccessLevel::BucketOwnerFullControl,
        ] {
            assert_eq!(canned_acl(access).as_str(), access.as_ref());
        }
    }

    #[test]
    fn test_missing_timestamps() {
        assert_eq!(system_time(None), SystemTime::UNIX_EPOCH);
        assert_eq!(size(None), 0);
        assert_eq!(size(Some(-1)), 0);
        assert_eq!(size(Some(42)), 42);
    }

    #[tokio::test]
    async fn test_from_config_uses_name() {
        let config = BucketConfig::new("photos")
            .with_region("eu-west-1")
            .with_endpoint("http://localhost:9000")
            .with_credentials("id", "secret");
        let bucket = S3Bucket::from_config(&config).await;
        assert_eq!(bucket.name(), "photos");
        assert_eq!(
            bucket.client().config().region().map(|r| r.as_ref()),
            Some("eu-west-1")
        );
    }
}
