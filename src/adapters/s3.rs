use std::{path::Path, time::Duration};

use aws_sdk_s3::{
    config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion, Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::put_object::builders::PutObjectFluentBuilder,
    primitives::{ByteStream, DateTime, DateTimeFormat},
    types::{
        ChecksumAlgorithm, Delete, Grant, ObjectCannedAcl, ObjectIdentifier, Permission,
        ServerSideEncryption,
    },
    Client,
};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::{
    adapters::ObjectClient,
    config::ClientConfig,
    listing::MAX_KEYS,
    model::{
        fs::FSError,
        object::{Acl, FSObject, ListPage, ListRequest, ObjectBody, ObjectData, ObjectMeta, PutOptions},
    },
    util::{
        object::{encode_key, endpoint_host, scheme},
        poll::Poller,
    },
};

const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// Client for any S3-compatible service (OSS, MinIO, AWS S3).
///
/// Every call blocks the calling thread until the service replies. Build and
/// use it from synchronous code; `new` fails inside an async runtime.
pub struct S3Client {
    client: Client,
    poller: Poller,
}

impl S3Client {
    /// Builds the SDK client once. Without a key/secret pair the ambient AWS
    /// credential chain is used.
    pub fn new(config: &ClientConfig) -> Result<Self, FSError> {
        let poller = Poller::new()?;

        let builder = if config.key.is_empty() || config.secret.is_empty() {
            info!("no static credentials configured, loading from environment");
            let sdk_config = poller.poll_until_ready(aws_config::load_from_env());
            aws_sdk_s3::config::Builder::from(&sdk_config)
        } else {
            aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(Credentials::new(
                    config.key.clone(),
                    config.secret.clone(),
                    config.security_token.clone(),
                    None,
                    "objectfs",
                ))
        };

        if let Some(proxy) = &config.request_proxy {
            warn!(request_proxy = %proxy, "request_proxy is not applied by the S3 transport");
        }

        let timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .read_timeout(Duration::from_secs(config.timeout))
            .build();

        let sdk_config = builder
            .region(Region::new(config.region.clone()))
            .endpoint_url(format!(
                "{}://{}",
                scheme(config.ssl),
                endpoint_host(&config.endpoint)
            ))
            .timeout_config(timeouts)
            .retry_config(retry_config(config.max_retries))
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            poller,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_client(client: Client) -> Result<Self, FSError> {
        Ok(Self {
            client,
            poller: Poller::new()?,
        })
    }

    fn put_request(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        options: &PutOptions,
    ) -> PutObjectFluentBuilder {
        let mut req = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .set_acl(options.acl.map(canned_acl))
            .set_content_type(options.content_type.clone())
            .set_cache_control(options.cache_control.clone())
            .set_content_disposition(options.content_disposition.clone())
            .set_content_language(options.content_language.clone())
            .set_content_encoding(options.content_encoding.clone())
            .set_server_side_encryption(
                options
                    .server_side_encryption
                    .as_deref()
                    .map(ServerSideEncryption::from),
            );

        if let Some(expires) = &options.expires {
            match DateTime::from_str(expires, DateTimeFormat::HttpDate) {
                Ok(dt) => req = req.expires(dt),
                Err(err) => warn!(expires = %expires, error_message = %err, "ignoring unparseable expires"),
            }
        }

        if !options.metadata.is_empty() {
            req = req.set_metadata(Some(options.metadata.clone().into_iter().collect()));
        }

        if options.verify_checksum {
            req = req.checksum_algorithm(ChecksumAlgorithm::Crc32);
        }

        req
    }
}

/// `max_retries` counts retries after the first attempt.
fn retry_config(max_retries: u32) -> RetryConfig {
    RetryConfig::standard().with_max_attempts(max_retries.saturating_add(1))
}

fn map_sdk_error<E>(operation: &'static str, key: &str, err: SdkError<E>) -> FSError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let not_found_status = err
        .raw_response()
        .map(|resp| resp.status().as_u16() == 404)
        .unwrap_or(false);
    let not_found_code = matches!(
        err.as_service_error().and_then(|e| e.code()),
        Some("NoSuchKey") | Some("NotFound")
    );
    let not_found = not_found_status || not_found_code;

    if not_found {
        return FSError::not_found(key);
    }

    FSError::transport(operation, key, DisplayErrorContext(err))
}

fn canned_acl(acl: Acl) -> ObjectCannedAcl {
    match acl {
        Acl::Private => ObjectCannedAcl::Private,
        Acl::PublicRead => ObjectCannedAcl::PublicRead,
        Acl::PublicReadWrite => ObjectCannedAcl::PublicReadWrite,
    }
}

/// Collapses an object's grants into the canned ACL they express for
/// anonymous users.
fn acl_from_grants(grants: &[Grant]) -> Acl {
    let mut read = false;
    let mut write = false;

    for grant in grants {
        let all_users = grant
            .grantee()
            .and_then(|grantee| grantee.uri())
            .map(|uri| uri == ALL_USERS_URI)
            .unwrap_or(false);

        if !all_users {
            continue;
        }

        match grant.permission() {
            Some(Permission::Read) => read = true,
            Some(Permission::Write) => write = true,
            Some(Permission::FullControl) => {
                read = true;
                write = true;
            }
            _ => {}
        }
    }

    match (read, write) {
        (true, true) => Acl::PublicReadWrite,
        (true, false) => Acl::PublicRead,
        _ => Acl::Private,
    }
}

fn format_date(dt: Option<&DateTime>, format: DateTimeFormat) -> Option<String> {
    dt.and_then(|dt| dt.fmt(format).ok())
}

impl ObjectClient for S3Client {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<(), FSError> {
        let req = self.put_request(bucket, key, ByteStream::from(body), options);

        self.poller
            .poll_until_ready(req.send())
            .map_err(|err| map_sdk_error("put_object", key, err))?;

        debug!(key = key, "put_object complete");
        Ok(())
    }

    fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        file: &Path,
        options: &PutOptions,
    ) -> Result<(), FSError> {
        let body = self
            .poller
            .poll_until_ready_error(ByteStream::from_path(file), "upload_file", key)?;
        let req = self.put_request(bucket, key, body, options);

        self.poller
            .poll_until_ready(req.send())
            .map_err(|err| map_sdk_error("upload_file", key, err))?;

        debug!(key = key, file = %file.display(), "upload_file complete");
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData, FSError> {
        let req = self.client.get_object().bucket(bucket).key(key);

        let output = match self.poller.poll_until_ready(req.send()) {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_no_such_key() {
                        return Err(FSError::not_found(key));
                    }
                }

                return Err(map_sdk_error("get_object", key, err));
            }
            Ok(output) => output,
        };

        let meta = ObjectMeta {
            content_length: output.content_length().map(|len| len.max(0) as u64),
            content_type: output.content_type().map(str::to_string),
            last_modified: format_date(output.last_modified(), DateTimeFormat::HttpDate),
            etag: output.e_tag().map(str::to_string),
            storage_class: output.storage_class().map(|sc| sc.as_str().to_string()),
        };

        let bytes = self
            .poller
            .poll_until_ready_error(output.body.collect(), "collect_body", key)?;

        Ok(ObjectData {
            meta,
            body: ObjectBody::Buffer(bytes.into_bytes()),
        })
    }

    fn get_object_acl(&self, bucket: &str, key: &str) -> Result<Acl, FSError> {
        let req = self.client.get_object_acl().bucket(bucket).key(key);

        let output = self
            .poller
            .poll_until_ready(req.send())
            .map_err(|err| map_sdk_error("get_object_acl", key, err))?;

        Ok(acl_from_grants(output.grants()))
    }

    fn put_object_acl(&self, bucket: &str, key: &str, acl: Acl) -> Result<(), FSError> {
        let req = self
            .client
            .put_object_acl()
            .bucket(bucket)
            .key(key)
            .acl(canned_acl(acl));

        self.poller
            .poll_until_ready(req.send())
            .map_err(|err| map_sdk_error("put_object_acl", key, err))?;

        Ok(())
    }

    fn copy_object(
        &self,
        from_bucket: &str,
        from_key: &str,
        to_bucket: &str,
        to_key: &str,
    ) -> Result<(), FSError> {
        let req = self
            .client
            .copy_object()
            .copy_source(format!("{}/{}", from_bucket, encode_key(from_key)))
            .bucket(to_bucket)
            .key(to_key);

        self.poller
            .poll_until_ready(req.send())
            .map_err(|err| map_sdk_error("copy_object", from_key, err))?;

        Ok(())
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), FSError> {
        let req = self.client.delete_object().bucket(bucket).key(key);

        self.poller
            .poll_until_ready(req.send())
            .map_err(|err| map_sdk_error("delete_object", key, err))?;

        Ok(())
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), FSError> {
        for chunk in keys.chunks(MAX_KEYS) {
            let first = chunk.first().map(|k| k.as_str()).unwrap_or("");

            let identifiers = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| FSError::transport("delete_objects", first, err))?;

            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(|err| FSError::transport("delete_objects", first, err))?;

            let req = self.client.delete_objects().bucket(bucket).delete(delete);

            let output = self
                .poller
                .poll_until_ready(req.send())
                .map_err(|err| map_sdk_error("delete_objects", first, err))?;

            let failed: Vec<&str> = output.errors().iter().filter_map(|e| e.key()).collect();
            if !failed.is_empty() {
                return Err(FSError::Inconsistent {
                    path: first.to_string(),
                    message: format!("failed to delete {} keys: {}", failed.len(), failed.join(", ")),
                });
            }
        }

        Ok(())
    }

    fn list_objects(&self, bucket: &str, request: &ListRequest<'_>) -> Result<ListPage, FSError> {
        let req = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(request.prefix)
            .delimiter(request.delimiter)
            .max_keys(request.max_keys.min(MAX_KEYS) as i32)
            .set_continuation_token(request.marker.map(str::to_string));

        let lo = self
            .poller
            .poll_until_ready(req.send())
            .map_err(|err| map_sdk_error("list_objects", request.prefix, err))?;

        let objects = lo
            .contents()
            .iter()
            .map(|o| FSObject {
                key: o.key().unwrap_or("").to_string(),
                size: o.size().unwrap_or(0).max(0) as u64,
                last_modified: format_date(o.last_modified(), DateTimeFormat::DateTime),
                content_type: None,
                storage_class: o.storage_class().map(|sc| sc.as_str().to_string()),
                etag: o.e_tag().map(str::to_string),
            })
            .collect();

        let prefixes = lo
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .map(str::to_string)
            .collect();

        let next_marker = if lo.is_truncated().unwrap_or(false) {
            lo.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            prefixes,
            next_marker,
        })
    }

    fn get_object_meta(&self, bucket: &str, key: &str) -> Result<ObjectMeta, FSError> {
        let req = self.client.head_object().bucket(bucket).key(key);

        let ho = self
            .poller
            .poll_until_ready(req.send())
            .map_err(|err| map_sdk_error("get_object_meta", key, err))?;

        Ok(ObjectMeta {
            content_length: ho.content_length().map(|len| len.max(0) as u64),
            content_type: ho.content_type().map(str::to_string),
            last_modified: format_date(ho.last_modified(), DateTimeFormat::HttpDate),
            etag: ho.e_tag().map(str::to_string),
            storage_class: ho.storage_class().map(|sc| sc.as_str().to_string()),
        })
    }

    fn create_object_dir(
        &self,
        bucket: &str,
        key: &str,
        options: &PutOptions,
    ) -> Result<(), FSError> {
        let req = self.put_request(bucket, key, ByteStream::from_static(b""), options);

        self.poller
            .poll_until_ready(req.send())
            .map_err(|err| map_sdk_error("create_object_dir", key, err))?;

        Ok(())
    }

    fn does_object_exist(&self, bucket: &str, key: &str) -> Result<bool, FSError> {
        match self.get_object_meta(bucket, key) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}
