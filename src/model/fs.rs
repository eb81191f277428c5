use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::object::Acl;

#[derive(Debug, Error)]
pub enum FSError {
    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("failed to {operation} at: {key}, {message}")]
    Transport {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("inconsistent state at: {path}, {message}")]
    Inconsistent { path: String, message: String },

    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("io failure at: {path}, {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FSError {
    pub fn transport(operation: &'static str, key: &str, err: impl fmt::Display) -> Self {
        FSError::Transport {
            operation,
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    pub fn not_found(path: &str) -> Self {
        FSError::NotFound {
            path: path.to_string(),
        }
    }

    pub fn io(path: &str, source: std::io::Error) -> Self {
        FSError::Io {
            path: path.to_string(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FSError::NotFound { .. })
    }
}

/// Host-facing visibility of a file. Stored by the service as an ACL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn to_acl(self) -> Acl {
        match self {
            Visibility::Public => Acl::PublicRead,
            Visibility::Private => Acl::Private,
        }
    }

    pub fn from_acl(acl: Acl) -> Self {
        match acl {
            Acl::PublicRead => Visibility::Public,
            _ => Visibility::Private,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => f.write_str("public"),
            Visibility::Private => f.write_str("private"),
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility: {}", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileEntry {
    pub path: String,
    pub dirname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DirEntry {
    pub path: String,
    pub dirname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Uniform description of one listing entry or one object.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Metadata {
    File(FileEntry),
    Dir(DirEntry),
}

impl Metadata {
    pub fn path(&self) -> &str {
        match self {
            Metadata::File(f) => &f.path,
            Metadata::Dir(d) => &d.path,
        }
    }

    pub fn dirname(&self) -> &str {
        match self {
            Metadata::File(f) => &f.dirname,
            Metadata::Dir(d) => &d.dirname,
        }
    }

    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Metadata::File(f) => f.timestamp,
            Metadata::Dir(d) => d.timestamp,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Metadata::Dir(_))
    }
}

/// Per-call options for write-type operations.
///
/// `visibility` is translated to an ACL; an explicit `acl` wins over it.
#[derive(Clone, Debug, Default)]
pub struct WriteConfig {
    pub visibility: Option<Visibility>,
    pub mimetype: Option<String>,
    pub acl: Option<Acl>,
    pub cache_control: Option<String>,
    pub expires: Option<String>,
    pub server_side_encryption: Option<String>,
    pub content_disposition: Option<String>,
    pub content_language: Option<String>,
    pub content_encoding: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl WriteConfig {
    pub fn with_visibility(visibility: Visibility) -> Self {
        WriteConfig {
            visibility: Some(visibility),
            ..Default::default()
        }
    }

    pub fn has_explicit_acl(&self) -> bool {
        self.visibility.is_some() || self.acl.is_some()
    }
}
