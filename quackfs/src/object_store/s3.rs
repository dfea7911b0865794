//! `aws-sdk-s3`-backed `ObjectStore`.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use quackfs_api::{ByteRange, Error, Result};
use tokio::runtime::Handle;

use super::ObjectStore;

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    handle: Handle,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String, handle: Handle) -> Self {
        Self {
            client,
            bucket,
            handle,
        }
    }
}

impl ObjectStore for S3ObjectStore {
    fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        let body = ByteStream::from(bytes);
        self.handle
            .block_on(
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .body(body)
                    .send(),
            )
            .map_err(|e| Error::Transient(anyhow::Error::from(e.into_service_error())))?;
        Ok(())
    }

    fn get_range(&self, key: &str, range: ByteRange) -> Result<Bytes> {
        // Wire format is the inclusive-upper-bound `bytes=lo-hi` form;
        // `ByteRange` is half-open internally, so the conversion happens
        // right at this boundary and nowhere else.
        let wire_range = format!("bytes={}-{}", range.start, range.inclusive_end());

        let output = self
            .handle
            .block_on(
                self.client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .range(wire_range)
                    .send(),
            )
            .map_err(|e| Error::Transient(anyhow::Error::from(e.into_service_error())))?;

        let body = self
            .handle
            .block_on(output.body.collect())
            .map_err(|e| Error::Transient(anyhow::Error::from(e)))?
            .into_bytes();

        let expected_len = range.len() as usize;
        if body.len() != expected_len {
            return Err(Error::StorageCorruption(format!(
                "object {key} range {range} returned {} bytes, expected {expected_len}",
                body.len()
            )));
        }
        Ok(body)
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }
            let resp = self
                .handle
                .block_on(req.send())
                .map_err(|e| Error::Transient(anyhow::Error::from(e.into_service_error())))?;

            out.extend(resp.contents().iter().filter_map(|o| o.key().map(str::to_string)));

            if resp.is_truncated().unwrap_or(false) {
                continuation = resp.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(out)
    }
}
