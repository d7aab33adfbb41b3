//! S3-compatible storage backend.
//!
//! The AWS SDK is async-only; the store owns a current-thread Tokio runtime
//! and blocks on each request so callers keep a synchronous API.

use super::{ObjectStore, StorageError, StorageResult};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Runtime;

/// Smallest part S3 accepts for every part but the last.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// S3 storage implementation
pub struct S3Store {
    client: Client,
    runtime: Runtime,
    multipart_threshold: u64,
}

impl S3Store {
    /// Create a new S3 store.
    ///
    /// # Arguments
    /// * `endpoint` - Custom endpoint for S3-compatible providers (e.g. "http://localhost:9000" for MinIO)
    /// * `region` - Region name, or the provider-specific region identifier
    /// * `access_key` / `secret_key` - Explicit credentials
    /// * `multipart_threshold` - Files larger than this go through a multipart upload
    /// * `timeout` - Connect and read timeout applied to every request
    pub fn new(
        endpoint: Option<String>,
        region: String,
        access_key: String,
        secret_key: String,
        multipart_threshold: u64,
        timeout: Option<Duration>,
    ) -> StorageResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to start runtime: {}", e)))?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "dataphonia-config");
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region))
            // No automatic retries: a failed request fails the operation.
            .retry_config(RetryConfig::standard().with_max_attempts(1))
            // Path-style addressing for MinIO and other S3-compatible hosts
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            builder = builder.endpoint_url(endpoint_url);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(timeout)
                    .read_timeout(timeout)
                    .build(),
            );
        }

        Ok(S3Store {
            client: Client::from_conf(builder.build()),
            runtime,
            multipart_threshold,
        })
    }

    fn part_size(&self) -> u64 {
        self.multipart_threshold.max(MIN_PART_SIZE)
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("{}: {}", source.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .if_none_match("*")
            .send()
            .await
            .map_err(|e| write_error(bucket, key, e))?;
        Ok(())
    }

    /// Multipart upload reading one part at a time from disk. Any failure
    /// aborts the upload so no orphaned parts are left behind.
    async fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        size: u64,
        content_type: &str,
    ) -> StorageResult<()> {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| write_error(bucket, key, e))?;

        let upload_id = create
            .upload_id()
            .ok_or_else(|| {
                StorageError::UploadFailed(format!(
                    "{}/{}: CreateMultipartUpload returned no upload id",
                    bucket, key
                ))
            })?
            .to_string();

        let result = match self.put_parts(bucket, key, source, size, &upload_id).await {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.client
                    .complete_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .if_none_match("*")
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| write_error(bucket, key, e))
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            tracing::warn!(bucket = %bucket, key = %key, error = %e, "Multipart upload failed, aborting");
            if let Err(abort) = self
                .client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                tracing::warn!(
                    bucket = %bucket,
                    key = %key,
                    upload_id = %upload_id,
                    error = %DisplayErrorContext(&abort),
                    "Abort failed, uploaded parts may be orphaned"
                );
            }
        }
        result
    }

    async fn put_parts(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        size: u64,
        upload_id: &str,
    ) -> StorageResult<Vec<CompletedPart>> {
        let part_size = self.part_size();
        let mut file = tokio::fs::File::open(source).await?;
        let mut parts = Vec::new();
        let mut part_number: i32 = 1;
        let mut uploaded: u64 = 0;

        while uploaded < size {
            let chunk_size = (size - uploaded).min(part_size) as usize;
            let mut buf = vec![0u8; chunk_size];
            file.read_exact(&mut buf).await?;

            let output = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(buf))
                .send()
                .await
                .map_err(|e| write_error(bucket, key, e))?;

            parts.push(
                CompletedPart::builder()
                    .e_tag(output.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );

            uploaded += chunk_size as u64;
            tracing::debug!(
                bucket = %bucket,
                key = %key,
                part = part_number,
                uploaded_bytes = uploaded,
                size_bytes = size,
                "Uploaded part"
            );
            part_number += 1;
        }

        Ok(parts)
    }
}

/// Map a write failure, turning a failed `If-None-Match` precondition into
/// `AlreadyExists`.
fn write_error<E>(bucket: &str, key: &str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    if status == Some(412) {
        return StorageError::AlreadyExists(format!("{}/{}", bucket, key));
    }
    StorageError::UploadFailed(format!("{}/{}: {}", bucket, key, DisplayErrorContext(&err)))
}

impl ObjectStore for S3Store {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let result = self
            .runtime
            .block_on(self.client.head_object().bucket(bucket).key(key).send());

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(HeadObjectError::is_not_found)
                {
                    return Ok(false);
                }
                Err(StorageError::BackendError(format!(
                    "HEAD {}/{}: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&err)
                )))
            }
        }
    }

    fn put_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> StorageResult<u64> {
        let size = std::fs::metadata(source)?.len();
        let start = Instant::now();

        let result = self.runtime.block_on(async {
            if size > self.multipart_threshold {
                self.put_multipart(bucket, key, source, size, content_type)
                    .await
            } else {
                self.put_single(bucket, key, source, content_type).await
            }
        });

        if let Err(e) = &result {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
        }
        result?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            multipart = size > self.multipart_threshold,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(size)
    }

    fn get_to_file(&self, bucket: &str, key: &str, destination: &Path) -> StorageResult<u64> {
        let start = Instant::now();

        let written = self.runtime.block_on(async {
            let output = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|err| {
                    if err
                        .as_service_error()
                        .is_some_and(GetObjectError::is_no_such_key)
                    {
                        StorageError::NotFound(format!("{}/{}", bucket, key))
                    } else {
                        StorageError::DownloadFailed(format!(
                            "{}/{}: {}",
                            bucket,
                            key,
                            DisplayErrorContext(&err)
                        ))
                    }
                })?;

            // Stream straight to disk; objects can be larger than memory.
            let mut reader = output.body.into_async_read();
            let mut file = tokio::fs::File::create(destination).await?;
            let written = tokio::io::copy(&mut reader, &mut file)
                .await
                .map_err(|e| StorageError::DownloadFailed(format!("{}/{}: {}", bucket, key, e)))?;
            file.flush().await?;
            Ok::<u64, StorageError>(written)
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );
        Ok(written)
    }

    fn list(&self, bucket: &str) -> StorageResult<Vec<String>> {
        self.runtime.block_on(async {
            let mut keys = Vec::new();
            let mut continuation_token: Option<String> = None;

            loop {
                let mut request = self.client.list_objects_v2().bucket(bucket);
                if let Some(token) = &continuation_token {
                    request = request.continuation_token(token);
                }

                let output = request.send().await.map_err(|e| {
                    StorageError::BackendError(format!(
                        "LIST {}: {}",
                        bucket,
                        DisplayErrorContext(&e)
                    ))
                })?;

                keys.extend(output.contents().iter().filter_map(|o| o.key()).map(String::from));

                if output.is_truncated() == Some(true) {
                    continuation_token = output.next_continuation_token().map(String::from);
                } else {
                    break;
                }
            }

            tracing::debug!(bucket = %bucket, count = keys.len(), "Listed bucket");
            Ok(keys)
        })
    }
}
