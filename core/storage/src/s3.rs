//! S3-compatible connection backed by the AWS SDK.
//!
//! Serves both Amazon S3 and Google Cloud Storage, the latter through its
//! S3 interoperability endpoint with HMAC keys.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials as SdkCredentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use skyshelf_common::{Error, ObjectPath, Result};

use crate::credentials::{AwsCredentials, GoogleCredentials};
use crate::provider::{Connection, ObjectInfo, PutOptions};

const DEFAULT_AWS_REGION: &str = "us-east-1";
const GOOGLE_INTEROP_ENDPOINT: &str = "https://storage.googleapis.com";
const GOOGLE_REGION: &str = "auto";

/// S3-compatible connection.
pub struct S3Connection {
    client: Client,
    region: String,
    /// Only AWS understands location constraints on bucket creation.
    location_constraint: bool,
}

impl S3Connection {
    /// Connect to Amazon S3 (or an S3-compatible endpoint).
    pub async fn aws(credentials: &AwsCredentials) -> Self {
        let region = credentials
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());

        let client = build_client(
            &credentials.access_key_id,
            credentials.secret_access_key.expose(),
            &region,
            credentials.endpoint.as_deref(),
        )
        .await;

        Self {
            client,
            region,
            location_constraint: credentials.endpoint.is_none(),
        }
    }

    /// Connect to Google Cloud Storage through its interoperability endpoint.
    pub async fn google(credentials: &GoogleCredentials) -> Self {
        let client = build_client(
            &credentials.access_key_id,
            credentials.secret_access_key.expose(),
            GOOGLE_REGION,
            Some(GOOGLE_INTEROP_ENDPOINT),
        )
        .await;

        Self {
            client,
            region: GOOGLE_REGION.to_string(),
            location_constraint: false,
        }
    }
}

async fn build_client(
    access_key_id: &str,
    secret_access_key: &str,
    region: &str,
    endpoint: Option<&str>,
) -> Client {
    let credentials = SdkCredentials::new(
        access_key_id,
        secret_access_key,
        None,
        None,
        "skyshelf",
    );

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .credentials_provider(credentials)
        .region(Region::new(region.to_string()));
    if let Some(endpoint) = endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let shared = loader.load().await;

    let config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(endpoint.is_some())
        .build();
    Client::from_conf(config)
}

/// Translate an SDK failure into the common taxonomy.
fn map_sdk_error<E, R>(err: SdkError<E, R>, context: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = format!("{}: {}", context, DisplayErrorContext(&err));

    classify(err.as_service_error().and_then(|e| e.code()), message)
}

/// Pick the error kind for an S3 service error code.
fn classify(code: Option<&str>, message: String) -> Error {
    match code {
        Some(
            "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "AccessDenied" | "InvalidSecurity",
        ) => Error::Auth(message),
        Some("NoSuchKey" | "NoSuchBucket" | "NotFound") => Error::NotFound(message),
        _ => Error::Connection(message),
    }
}

fn to_chrono(time: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    time.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_else(Utc::now)
}

#[async_trait]
impl Connection for S3Connection {
    fn name(&self) -> &str {
        "s3"
    }

    async fn create_directory(&self, directory: &str, public: bool) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(directory);
        if public {
            request = request.acl(BucketCannedAcl::PublicRead);
        }
        if self.location_constraint && self.region != DEFAULT_AWS_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you())
                    .unwrap_or(false) =>
            {
                debug!(bucket = directory, "Bucket already exists");
                Ok(())
            }
            Err(err) => Err(map_sdk_error(err, &format!("create bucket {}", directory))),
        }
    }

    async fn delete_directory(&self, directory: &str) -> Result<()> {
        self.client
            .delete_bucket()
            .bucket(directory)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("delete bucket {}", directory)))?;
        Ok(())
    }

    async fn put_object(
        &self,
        directory: &str,
        path: &ObjectPath,
        data: Bytes,
        options: &PutOptions,
    ) -> Result<ObjectInfo> {
        let key = path.as_key();
        let size = data.len() as u64;

        let mut request = self
            .client
            .put_object()
            .bucket(directory)
            .key(&key)
            .body(ByteStream::from(data));
        if options.public {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }
        for (name, value) in &options.attributes {
            request = match name.as_str() {
                "content_type" => request.content_type(value),
                "cache_control" => request.cache_control(value),
                "content_disposition" => request.content_disposition(value),
                _ => request.metadata(name, value),
            };
        }

        let output = request
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("upload {}/{}", directory, key)))?;

        Ok(ObjectInfo {
            key,
            size,
            last_modified: Utc::now(),
            etag: output.e_tag().map(String::from),
            public: options.public,
            attributes: options.attributes.clone(),
        })
    }

    async fn get_object(&self, directory: &str, path: &ObjectPath) -> Result<Bytes> {
        let key = path.as_key();
        let output = self
            .client
            .get_object()
            .bucket(directory)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("download {}/{}", directory, key)))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| Error::Connection(format!("download {}/{}: {}", directory, key, e)))?;
        Ok(body.into_bytes())
    }

    async fn head_object(&self, directory: &str, path: &ObjectPath) -> Result<Option<ObjectInfo>> {
        let key = path.as_key();
        let output = match self.client.head_object().bucket(directory).key(&key).send().await {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false) =>
            {
                return Ok(None);
            }
            Err(err) => return Err(map_sdk_error(err, &format!("head {}/{}", directory, key))),
        };

        let mut attributes: BTreeMap<String, String> = output
            .metadata()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        if let Some(content_type) = output.content_type() {
            attributes.insert("content_type".to_string(), content_type.to_string());
        }

        Ok(Some(ObjectInfo {
            key,
            size: output.content_length().unwrap_or(0).max(0) as u64,
            last_modified: to_chrono(output.last_modified()),
            etag: output.e_tag().map(String::from),
            // ACLs need a separate request; visibility is tracked by the caller.
            public: false,
            attributes,
        }))
    }

    async fn delete_object(&self, directory: &str, path: &ObjectPath) -> Result<()> {
        let key = path.as_key();
        self.client
            .delete_object()
            .bucket(directory)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("delete {}/{}", directory, key)))?;
        Ok(())
    }

    async fn list_objects(&self, directory: &str) -> Result<Vec<ObjectInfo>> {
        let mut results = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(directory)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, &format!("list {}", directory)))?;

            for object in output.contents() {
                let Some(key) = object.key() else { continue };
                results.push(ObjectInfo {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: to_chrono(object.last_modified()),
                    etag: object.e_tag().map(String::from),
                    public: false,
                    attributes: BTreeMap::new(),
                });
            }

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(results)
    }
}
