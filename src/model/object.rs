use std::{collections::BTreeMap, fmt, io::Read};

use bytes::Bytes;
use serde::Deserialize;

/// Canned object ACLs understood by the storage service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acl {
    Private,
    PublicRead,
    PublicReadWrite,
}

impl Acl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
            Acl::PublicReadWrite => "public-read-write",
        }
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a list-objects page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FSObject {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
    pub storage_class: Option<String>,
    pub etag: Option<String>,
}

/// Reply of a head-object call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectMeta {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub storage_class: Option<String>,
}

/// Options sent along with a put. The adapter's configured defaults are
/// merged with each call's `WriteConfig` to produce these.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PutOptions {
    pub acl: Option<Acl>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub expires: Option<String>,
    pub server_side_encryption: Option<String>,
    pub content_disposition: Option<String>,
    pub content_language: Option<String>,
    pub content_encoding: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub verify_checksum: bool,
}

pub struct ListRequest<'a> {
    pub prefix: &'a str,
    pub delimiter: &'a str,
    pub max_keys: usize,
    pub marker: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct ListPage {
    pub objects: Vec<FSObject>,
    pub prefixes: Vec<String>,
    pub next_marker: Option<String>,
}

pub enum ObjectBody {
    Buffer(Bytes),
    Reader(Box<dyn Read + Send>),
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectBody::Buffer(b) => f.debug_tuple("Buffer").field(&b.len()).finish(),
            ObjectBody::Reader(_) => f.write_str("Reader"),
        }
    }
}

#[derive(Debug)]
pub struct ObjectData {
    pub meta: ObjectMeta,
    pub body: ObjectBody,
}

/// Raw view of a service reply as consumed by the normalizer.
///
/// `key` is absent for bare common prefixes, which carry `prefix` instead.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawMetadata {
    pub key: Option<String>,
    pub prefix: Option<String>,
    pub last_modified: Option<String>,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub storage_class: Option<String>,
}

impl RawMetadata {
    pub fn common_prefix(prefix: &str) -> Self {
        RawMetadata {
            prefix: Some(prefix.to_string()),
            ..Default::default()
        }
    }
}

impl From<&FSObject> for RawMetadata {
    fn from(object: &FSObject) -> Self {
        RawMetadata {
            key: Some(object.key.clone()),
            prefix: None,
            last_modified: object.last_modified.clone(),
            size: Some(object.size),
            content_type: object.content_type.clone(),
            storage_class: object.storage_class.clone(),
        }
    }
}

impl From<&ObjectMeta> for RawMetadata {
    fn from(meta: &ObjectMeta) -> Self {
        RawMetadata {
            key: None,
            prefix: None,
            last_modified: meta.last_modified.clone(),
            size: meta.content_length,
            content_type: meta.content_type.clone(),
            storage_class: meta.storage_class.clone(),
        }
    }
}

impl From<&PutOptions> for RawMetadata {
    fn from(options: &PutOptions) -> Self {
        RawMetadata {
            content_type: options.content_type.clone(),
            ..Default::default()
        }
    }
}
