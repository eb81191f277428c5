use std::{
    fs::File,
    io::{self, Cursor, Read, Seek, SeekFrom},
    path::Path,
};

use bytes::Bytes;
use tracing::{error, info, span, Level};

use crate::{
    adapters::ObjectClient,
    config::AdapterConfig,
    listing::DirectoryLister,
    model::{
        fs::{DirEntry, FSError, Metadata, Visibility, WriteConfig},
        object::{Acl, ObjectBody, PutOptions, RawMetadata},
    },
    normalize::{emulate_directories, normalize_response, parse_timestamp},
    util::{
        object::{endpoint_host, object_url},
        path::{self, PathPrefixer, DELIMITER},
    },
};

#[derive(Debug)]
pub struct FileContents {
    pub metadata: Metadata,
    pub contents: Bytes,
}

/// Readable, seekable object body positioned at offset zero.
#[derive(Debug)]
pub enum ObjectStream {
    Memory(Cursor<Bytes>),
    Spooled(File),
}

impl Read for ObjectStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ObjectStream::Memory(cursor) => cursor.read(buf),
            ObjectStream::Spooled(file) => file.read(buf),
        }
    }
}

impl Seek for ObjectStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ObjectStream::Memory(cursor) => cursor.seek(pos),
            ObjectStream::Spooled(file) => file.seek(pos),
        }
    }
}

#[derive(Debug)]
pub struct StreamContents {
    pub metadata: Metadata,
    pub stream: ObjectStream,
}

fn log_err(group: &'static str) -> impl Fn(FSError) -> FSError {
    move |err| {
        error!(error_message=%err, error_group=group);
        err
    }
}

/// Filesystem view over one bucket of an object-storage service.
pub struct ObjectFS {
    pub client: Box<dyn ObjectClient>,
    pub bucket: String,
    config: AdapterConfig,
    prefixer: PathPrefixer,
}

impl ObjectFS {
    pub fn new(client: Box<dyn ObjectClient>, config: AdapterConfig) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            prefixer: PathPrefixer::new(&config.prefix),
            config,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn lister(&self) -> DirectoryLister<'_> {
        DirectoryLister::new(self.client.as_ref(), &self.bucket)
            .with_page_size(self.config.page_size())
    }

    /// Merges a call's write configuration over the configured defaults.
    fn options_from_config(&self, config: &WriteConfig) -> PutOptions {
        let mut options = self.config.options.clone();

        if let Some(visibility) = config.visibility {
            options.acl = Some(visibility.to_acl());
        }

        if let Some(mimetype) = &config.mimetype {
            options.content_type = Some(mimetype.clone());
        }

        if let Some(acl) = config.acl {
            options.acl = Some(acl);
        }

        let overrides = [
            (&config.cache_control, &mut options.cache_control),
            (&config.expires, &mut options.expires),
            (&config.server_side_encryption, &mut options.server_side_encryption),
            (&config.content_disposition, &mut options.content_disposition),
            (&config.content_language, &mut options.content_language),
            (&config.content_encoding, &mut options.content_encoding),
        ];
        for (value, target) in overrides {
            if value.is_some() {
                *target = value.clone();
            }
        }

        options.metadata.extend(config.metadata.clone());

        options
    }

    fn normalize_written(&self, raw: &RawMetadata, path: &str) -> Result<Metadata, FSError> {
        normalize_response(&self.prefixer, raw, Some(path)).ok_or_else(|| FSError::InvalidPath {
            path: path.to_string(),
        })
    }

    pub fn write(
        &self,
        path: &str,
        contents: impl Into<Bytes>,
        config: &WriteConfig,
    ) -> Result<Metadata, FSError> {
        let span = span!(Level::INFO, "write", context = "write");
        let _e = span.enter();

        let contents = contents.into();
        info!(path = path, size = contents.len(), "called");

        let key = self.prefixer.apply_prefix(path);
        let options = self.options_from_config(config);
        let size = contents.len() as u64;

        self.client
            .put_object(&self.bucket, &key, contents, &options)
            .map_err(log_err("put_object"))?;

        let mut raw = RawMetadata::from(&options);
        raw.size = Some(size);

        self.normalize_written(&raw, path)
    }

    pub fn write_stream(
        &self,
        path: &str,
        reader: &mut dyn Read,
        config: &WriteConfig,
    ) -> Result<Metadata, FSError> {
        let mut contents = Vec::new();
        reader
            .read_to_end(&mut contents)
            .map_err(|err| FSError::io(path, err))?;

        self.write(path, contents, config)
    }

    /// Uploads a local file, asking the service to verify its checksum.
    pub fn write_file(
        &self,
        path: &str,
        file: &Path,
        config: &WriteConfig,
    ) -> Result<Metadata, FSError> {
        let span = span!(Level::INFO, "write_file", context = "write_file");
        let _e = span.enter();
        info!(path = path, file = %file.display(), "called");

        let key = self.prefixer.apply_prefix(path);
        let mut options = self.options_from_config(config);
        options.verify_checksum = true;

        self.client
            .upload_file(&self.bucket, &key, file, &options)
            .map_err(log_err("upload_file"))?;

        let mut raw = RawMetadata::from(&options);
        raw.size = std::fs::metadata(file).ok().map(|m| m.len());

        self.normalize_written(&raw, path)
    }

    /// Overwrites a file. Unless the call sets a visibility or ACL, the
    /// object's current ACL is carried over so the overwrite does not reset
    /// it to the bucket default.
    pub fn update(
        &self,
        path: &str,
        contents: impl Into<Bytes>,
        config: &WriteConfig,
    ) -> Result<Metadata, FSError> {
        let span = span!(Level::INFO, "update", context = "update");
        let _e = span.enter();
        info!(path = path, "called");

        let mut config = config.clone();

        if !config.has_explicit_acl() {
            let key = self.prefixer.apply_prefix(path);
            let acl = match self.client.get_object_acl(&self.bucket, &key) {
                Ok(acl) => acl,
                Err(err) if err.is_not_found() => Acl::Private,
                Err(err) => return Err(log_err("get_object_acl")(err)),
            };
            config.acl = Some(acl);
        }

        self.write(path, contents, &config)
    }

    pub fn update_stream(
        &self,
        path: &str,
        reader: &mut dyn Read,
        config: &WriteConfig,
    ) -> Result<Metadata, FSError> {
        let mut contents = Vec::new();
        reader
            .read_to_end(&mut contents)
            .map_err(|err| FSError::io(path, err))?;

        self.update(path, contents, config)
    }

    fn read_object(&self, path: &str) -> Result<(Metadata, ObjectBody), FSError> {
        let key = self.prefixer.apply_prefix(path);

        let data = self
            .client
            .get_object(&self.bucket, &key)
            .map_err(log_err("get_object"))?;

        let metadata = self.normalize_written(&RawMetadata::from(&data.meta), path)?;

        Ok((metadata, data.body))
    }

    pub fn read(&self, path: &str) -> Result<FileContents, FSError> {
        let span = span!(Level::INFO, "read", context = "read");
        let _e = span.enter();
        info!(path = path, "called");

        let (metadata, body) = self.read_object(path)?;

        let contents = match body {
            ObjectBody::Buffer(bytes) => bytes,
            ObjectBody::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader
                    .read_to_end(&mut buf)
                    .map_err(|err| FSError::io(path, err))?;
                Bytes::from(buf)
            }
        };

        Ok(FileContents { metadata, contents })
    }

    /// Streams a file. Live bodies are spooled to a temporary file so the
    /// returned stream can always be rewound.
    pub fn read_stream(&self, path: &str) -> Result<StreamContents, FSError> {
        let span = span!(Level::INFO, "read_stream", context = "read_stream");
        let _e = span.enter();
        info!(path = path, "called");

        let (metadata, body) = self.read_object(path)?;

        let stream = match body {
            ObjectBody::Buffer(bytes) => ObjectStream::Memory(Cursor::new(bytes)),
            ObjectBody::Reader(mut reader) => {
                let spool = |reader: &mut dyn Read| -> io::Result<File> {
                    let mut file = tempfile::tempfile()?;
                    io::copy(reader, &mut file)?;
                    file.seek(SeekFrom::Start(0))?;
                    Ok(file)
                };

                let file = spool(&mut reader).map_err(|err| FSError::io(path, err))?;
                ObjectStream::Spooled(file)
            }
        };

        Ok(StreamContents { metadata, stream })
    }

    pub fn delete(&self, path: &str) -> Result<(), FSError> {
        let span = span!(Level::INFO, "delete", context = "delete");
        let _e = span.enter();
        info!(path = path, "called");

        let key = self.prefixer.apply_prefix(path);

        self.client
            .delete_object(&self.bucket, &key)
            .map_err(log_err("delete_object"))?;

        if self.has(path)? {
            return Err(log_err("delete_object")(FSError::Inconsistent {
                path: path.to_string(),
                message: "object still exists after delete".to_string(),
            }));
        }

        Ok(())
    }

    /// Deletes every object under a directory, then its marker. The marker
    /// is kept when the batch delete fails.
    pub fn delete_dir(&self, dirname: &str) -> Result<(), FSError> {
        let span = span!(Level::INFO, "delete_dir", context = "delete_dir");
        let _e = span.enter();
        info!(dirname = dirname, "called");

        let key = self.prefixer.directory_key(dirname);
        if key.trim_matches(DELIMITER).is_empty() {
            return Err(FSError::InvalidPath {
                path: dirname.to_string(),
            });
        }

        let listing = self.lister().list(&key, true)?;

        if !listing.objects.is_empty() {
            let keys: Vec<String> = listing.objects.into_iter().map(|o| o.key).collect();
            info!(dirname = dirname, objects = keys.len(), "deleting directory contents");

            self.client
                .delete_objects(&self.bucket, &keys)
                .map_err(log_err("delete_objects"))?;
        }

        self.client
            .delete_object(&self.bucket, &key)
            .map_err(log_err("delete_object"))?;

        Ok(())
    }

    pub fn create_dir(&self, dirname: &str, config: &WriteConfig) -> Result<Metadata, FSError> {
        let span = span!(Level::INFO, "create_dir", context = "create_dir");
        let _e = span.enter();
        info!(dirname = dirname, "called");

        let key = self.prefixer.directory_key(dirname);
        let options = self.options_from_config(config);

        self.client
            .create_object_dir(&self.bucket, &key, &options)
            .map_err(log_err("create_object_dir"))?;

        Ok(Metadata::Dir(DirEntry {
            path: dirname.trim_end_matches(DELIMITER).to_string(),
            dirname: path::dirname(dirname),
            timestamp: None,
        }))
    }

    pub fn copy(&self, path: &str, newpath: &str) -> Result<(), FSError> {
        let span = span!(Level::INFO, "copy", context = "copy");
        let _e = span.enter();
        info!(path = path, newpath = newpath, "called");

        let from = self.prefixer.apply_prefix(path);
        let to = self.prefixer.apply_prefix(newpath);

        self.client
            .copy_object(&self.bucket, &from, &self.bucket, &to)
            .map_err(log_err("copy_object"))
    }

    /// Copy followed by delete. Not atomic: when the delete fails the copy is
    /// kept and `FSError::Inconsistent` is returned.
    pub fn rename(&self, path: &str, newpath: &str) -> Result<(), FSError> {
        let span = span!(Level::INFO, "rename", context = "rename");
        let _e = span.enter();
        info!(path = path, newpath = newpath, "called");

        self.copy(path, newpath)?;

        self.delete(path).map_err(|err| FSError::Inconsistent {
            path: path.to_string(),
            message: format!("copied to {} but failed to remove source: {}", newpath, err),
        })
    }

    pub fn has(&self, path: &str) -> Result<bool, FSError> {
        let span = span!(Level::INFO, "has", context = "has");
        let _e = span.enter();
        info!(path = path, "called");

        let key = self.prefixer.apply_prefix(path);

        self.client
            .does_object_exist(&self.bucket, &key)
            .map_err(log_err("does_object_exist"))
    }

    pub fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<(), FSError> {
        let span = span!(Level::INFO, "set_visibility", context = "set_visibility");
        let _e = span.enter();
        info!(path = path, visibility = %visibility, "called");

        let key = self.prefixer.apply_prefix(path);

        self.client
            .put_object_acl(&self.bucket, &key, visibility.to_acl())
            .map_err(log_err("put_object_acl"))
    }

    pub fn get_visibility(&self, path: &str) -> Result<Visibility, FSError> {
        let span = span!(Level::INFO, "get_visibility", context = "get_visibility");
        let _e = span.enter();
        info!(path = path, "called");

        let key = self.prefixer.apply_prefix(path);

        self.client
            .get_object_acl(&self.bucket, &key)
            .map(Visibility::from_acl)
            .map_err(log_err("get_object_acl"))
    }

    pub fn get_metadata(&self, path: &str) -> Result<Metadata, FSError> {
        let span = span!(Level::INFO, "get_metadata", context = "get_metadata");
        let _e = span.enter();
        info!(path = path, "called");

        let key = self.prefixer.apply_prefix(path);

        let meta = self
            .client
            .get_object_meta(&self.bucket, &key)
            .map_err(log_err("get_object_meta"))?;

        self.normalize_written(&RawMetadata::from(&meta), path)
    }

    pub fn get_size(&self, path: &str) -> Result<Option<u64>, FSError> {
        let span = span!(Level::INFO, "get_size", context = "get_size");
        let _e = span.enter();
        info!(path = path, "called");

        let key = self.prefixer.apply_prefix(path);

        self.client
            .get_object_meta(&self.bucket, &key)
            .map(|meta| meta.content_length)
            .map_err(log_err("get_object_meta"))
    }

    pub fn get_mimetype(&self, path: &str) -> Result<Option<String>, FSError> {
        let span = span!(Level::INFO, "get_mimetype", context = "get_mimetype");
        let _e = span.enter();
        info!(path = path, "called");

        let key = self.prefixer.apply_prefix(path);

        self.client
            .get_object_meta(&self.bucket, &key)
            .map(|meta| meta.content_type)
            .map_err(log_err("get_object_meta"))
    }

    pub fn get_timestamp(&self, path: &str) -> Result<Option<i64>, FSError> {
        let span = span!(Level::INFO, "get_timestamp", context = "get_timestamp");
        let _e = span.enter();
        info!(path = path, "called");

        let key = self.prefixer.apply_prefix(path);

        self.client
            .get_object_meta(&self.bucket, &key)
            .map(|meta| meta.last_modified.as_deref().and_then(parse_timestamp))
            .map_err(log_err("get_object_meta"))
    }

    pub fn get_url(&self, path: &str) -> Result<String, FSError> {
        let span = span!(Level::INFO, "get_url", context = "get_url");
        let _e = span.enter();
        info!(path = path, "called");

        if !self.has(path)? {
            return Err(log_err("does_object_exist")(FSError::not_found(path)));
        }

        let client = &self.config.client;
        let endpoint = endpoint_host(&client.endpoint);

        let host = if client.is_cname {
            match self.config.domain.as_deref().filter(|d| !d.is_empty()) {
                Some(domain) => endpoint_host(domain).to_string(),
                None => endpoint.to_string(),
            }
        } else {
            format!("{}.{}", self.bucket, endpoint)
        };

        Ok(object_url(client.ssl, &host, &self.prefixer.apply_prefix(path)))
    }

    /// Lists a directory, synthesizing entries for implied parent
    /// directories.
    ///
    /// Unless `honor_list_recursion` is configured the listing is always
    /// recursive, whatever `recursive` says.
    pub fn list_contents(&self, directory: &str, recursive: bool) -> Result<Vec<Metadata>, FSError> {
        let span = span!(Level::INFO, "list_contents", context = "list_contents");
        let _e = span.enter();
        info!(directory = directory, recursive = recursive, "called");

        let prefix = if directory.trim_matches(DELIMITER).is_empty() {
            self.prefixer.prefix().to_string()
        } else {
            self.prefixer.directory_key(directory)
        };
        let recursive = recursive || !self.config.honor_list_recursion;

        let listing = self.lister().list(&prefix, recursive)?;

        let mut entries: Vec<Metadata> = listing
            .objects
            .iter()
            .filter_map(|object| normalize_response(&self.prefixer, &RawMetadata::from(object), None))
            .collect();

        if !recursive {
            entries.extend(listing.prefixes.iter().filter_map(|p| {
                normalize_response(&self.prefixer, &RawMetadata::common_prefix(p), None)
            }));
        }

        Ok(emulate_directories(entries))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::{
        adapters::mock::{MockClient, MockOp},
        config::ClientConfig,
    };

    fn config(prefix: &str) -> AdapterConfig {
        AdapterConfig {
            bucket: "demo".to_string(),
            domain: None,
            prefix: prefix.to_string(),
            client: ClientConfig {
                endpoint: "oss-cn-hangzhou.aliyuncs.com".to_string(),
                ..Default::default()
            },
            options: PutOptions::default(),
            list_page_size: 1000,
            honor_list_recursion: false,
        }
    }

    fn adapter(client: &Arc<MockClient>, prefix: &str) -> ObjectFS {
        ObjectFS::new(Box::new(client.clone()), config(prefix))
    }

    fn paths(entries: &[Metadata]) -> Vec<(&str, bool)> {
        entries.iter().map(|m| (m.path(), m.is_dir())).collect()
    }

    #[test]
    fn test_write_and_read() {
        let client = Arc::new(MockClient::new());
        let fs = adapter(&client, "uploads");

        let config = WriteConfig {
            mimetype: Some("text/plain".to_string()),
            ..Default::default()
        };
        let written = fs.write("notes/today.txt", "hello", &config).unwrap();

        match &written {
            Metadata::File(file) => {
                assert_eq!(file.path, "notes/today.txt");
                assert_eq!(file.dirname, "notes");
                assert_eq!(file.size, Some(5));
                assert_eq!(file.mimetype.as_deref(), Some("text/plain"));
            }
            other => panic!("expected file entry, got {:?}", other),
        }
        assert!(client.object("uploads/notes/today.txt").is_some());

        let read = fs.read("notes/today.txt").unwrap();
        assert_eq!(read.contents, Bytes::from_static(b"hello"));
        assert_eq!(read.metadata.path(), "notes/today.txt");
    }

    #[test]
    fn test_write_options_merge() {
        let client = Arc::new(MockClient::new());
        let mut cfg = config("");
        cfg.options.cache_control = Some("max-age=60".to_string());
        cfg.options.content_language = Some("en".to_string());
        let fs = ObjectFS::new(Box::new(client.clone()), cfg);

        let call = WriteConfig {
            visibility: Some(Visibility::Public),
            cache_control: Some("no-cache".to_string()),
            ..Default::default()
        };
        fs.write("a.txt", "x", &call).unwrap();

        let stored = client.object("a.txt").unwrap();
        assert_eq!(stored.acl, Acl::PublicRead);
        assert_eq!(stored.options.cache_control.as_deref(), Some("no-cache"));
        assert_eq!(stored.options.content_language.as_deref(), Some("en"));

        let call = WriteConfig {
            visibility: Some(Visibility::Public),
            acl: Some(Acl::PublicReadWrite),
            ..Default::default()
        };
        fs.write("b.txt", "x", &call).unwrap();
        assert_eq!(client.object("b.txt").unwrap().acl, Acl::PublicReadWrite);
    }

    #[test]
    fn test_write_stream_and_file() {
        let client = Arc::new(MockClient::new());
        let fs = adapter(&client, "");

        let mut reader = Cursor::new(b"streamed".to_vec());
        fs.write_stream("s.txt", &mut reader, &WriteConfig::default())
            .unwrap();
        assert_eq!(client.object("s.txt").unwrap().body, Bytes::from_static(b"streamed"));

        let mut local = tempfile::NamedTempFile::new().unwrap();
        local.write_all(b"from disk").unwrap();
        let written = fs
            .write_file("f.txt", local.path(), &WriteConfig::default())
            .unwrap();

        let stored = client.object("f.txt").unwrap();
        assert_eq!(stored.body, Bytes::from_static(b"from disk"));
        assert!(stored.options.verify_checksum);
        assert!(matches!(written, Metadata::File(ref f) if f.size == Some(9)));
    }

    #[test]
    fn test_update_preserves_private_acl() {
        let client = Arc::new(MockClient::new().with_default_acl(Acl::PublicRead));
        client.insert_with_acl("a.txt", "old", Acl::Private);
        let fs = adapter(&client, "");

        fs.update("a.txt", "new", &WriteConfig::default()).unwrap();

        let stored = client.object("a.txt").unwrap();
        assert_eq!(stored.body, Bytes::from_static(b"new"));
        assert_eq!(stored.acl, Acl::Private);
        assert_eq!(fs.get_visibility("a.txt").unwrap(), Visibility::Private);
    }

    #[test]
    fn test_update_with_explicit_visibility_skips_acl_read() {
        let client = Arc::new(MockClient::new());
        client.insert_with_acl("a.txt", "old", Acl::Private);
        let fs = adapter(&client, "");

        fs.update("a.txt", "new", &WriteConfig::with_visibility(Visibility::Public))
            .unwrap();

        assert_eq!(client.calls(MockOp::GetAcl), 0);
        assert_eq!(client.object("a.txt").unwrap().acl, Acl::PublicRead);
    }

    #[test]
    fn test_update_missing_file_is_private() {
        let client = Arc::new(MockClient::new().with_default_acl(Acl::PublicRead));
        let fs = adapter(&client, "");

        fs.update_stream("new.txt", &mut Cursor::new(b"x".to_vec()), &WriteConfig::default())
            .unwrap();

        assert_eq!(client.object("new.txt").unwrap().acl, Acl::Private);
    }

    #[test]
    fn test_update_propagates_acl_failure() {
        let client = Arc::new(MockClient::new());
        client.insert("a.txt", "old");
        client.fail_on(MockOp::GetAcl, None);
        let fs = adapter(&client, "");

        let result = fs.update("a.txt", "new", &WriteConfig::default());

        assert!(matches!(result, Err(FSError::Transport { .. })));
        assert_eq!(client.calls(MockOp::Put), 0);
    }

    #[test]
    fn test_read_stream() {
        let cases = vec![(false, "memory"), (true, "spooled")];

        for (streamed, name) in cases {
            let client = if streamed {
                Arc::new(MockClient::new().with_streamed_bodies())
            } else {
                Arc::new(MockClient::new())
            };
            client.insert("big.bin", "0123456789");
            let fs = adapter(&client, "");

            let mut result = fs.read_stream("big.bin").unwrap();
            assert_eq!(
                result.stream.stream_position().unwrap(),
                0,
                "failed for case: {}",
                name
            );

            let mut contents = String::new();
            result.stream.read_to_string(&mut contents).unwrap();
            assert_eq!(contents, "0123456789", "failed for case: {}", name);

            match (&result.stream, streamed) {
                (ObjectStream::Memory(_), false) | (ObjectStream::Spooled(_), true) => {}
                (other, _) => panic!("unexpected stream {:?} for case: {}", other, name),
            }
        }
    }

    #[test]
    fn test_read_missing_file() {
        let client = Arc::new(MockClient::new());
        let fs = adapter(&client, "");

        assert!(fs.read("missing.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_confirms_absence() {
        let client = Arc::new(MockClient::new());
        client.insert("a.txt", "x");
        let fs = adapter(&client, "");

        fs.delete("a.txt").unwrap();

        assert!(!fs.has("a.txt").unwrap());
        assert_eq!(client.calls(MockOp::Exists), 2);
    }

    #[test]
    fn test_delete_reports_lingering_object() {
        let client = Arc::new(MockClient::new());
        client.insert("a.txt", "x");
        client.set_stale_deletes(true);
        let fs = adapter(&client, "");

        let result = fs.delete("a.txt");

        assert!(matches!(result, Err(FSError::Inconsistent { .. })));
    }

    #[test]
    fn test_delete_call_failure() {
        let client = Arc::new(MockClient::new());
        client.insert("a.txt", "x");
        client.fail_on(MockOp::Delete, None);
        let fs = adapter(&client, "");

        assert!(matches!(fs.delete("a.txt"), Err(FSError::Transport { .. })));
        assert_eq!(client.calls(MockOp::Exists), 0);
    }

    #[test]
    fn test_rename() {
        let client = Arc::new(MockClient::new());
        client.insert("a.txt", "x");
        let fs = adapter(&client, "");

        fs.rename("a.txt", "b.txt").unwrap();

        assert!(!fs.has("a.txt").unwrap());
        assert!(fs.has("b.txt").unwrap());
    }

    #[test]
    fn test_rename_delete_failure_keeps_both() {
        let client = Arc::new(MockClient::new());
        client.insert("a.txt", "x");
        client.fail_on(MockOp::Delete, Some("a.txt"));
        let fs = adapter(&client, "");

        let result = fs.rename("a.txt", "b.txt");

        assert!(matches!(result, Err(FSError::Inconsistent { .. })));
        assert!(fs.has("a.txt").unwrap());
        assert!(fs.has("b.txt").unwrap());
    }

    #[test]
    fn test_rename_copy_failure_skips_delete() {
        let client = Arc::new(MockClient::new());
        client.insert("a.txt", "x");
        client.fail_on(MockOp::Copy, None);
        let fs = adapter(&client, "");

        let result = fs.rename("a.txt", "b.txt");

        assert!(matches!(result, Err(FSError::Transport { .. })));
        assert_eq!(client.calls(MockOp::Delete), 0);
        assert!(fs.has("a.txt").unwrap());
    }

    #[test]
    fn test_create_dir() {
        let client = Arc::new(MockClient::new());
        let fs = adapter(&client, "uploads");

        let created = fs.create_dir("photos/2024", &WriteConfig::default()).unwrap();

        assert_eq!(
            created,
            Metadata::Dir(DirEntry {
                path: "photos/2024".to_string(),
                dirname: "photos".to_string(),
                timestamp: None,
            })
        );
        assert_eq!(client.keys(), vec!["uploads/photos/2024/".to_string()]);
    }

    #[test]
    fn test_delete_dir() {
        let client = Arc::new(MockClient::new());
        for key in ["dir/", "dir/a.txt", "dir/sub/b.txt", "dir/sub/c/d.txt", "dirty.txt", "other/x"] {
            client.insert(key, "x");
        }
        let fs = adapter(&client, "");

        fs.delete_dir("dir").unwrap();

        assert_eq!(client.keys(), vec!["dirty.txt".to_string(), "other/x".to_string()]);
        assert_eq!(client.calls(MockOp::DeleteObjects), 1);
    }

    #[test]
    fn test_delete_dir_batch_failure_keeps_marker() {
        let client = Arc::new(MockClient::new());
        for key in ["dir/", "dir/a.txt"] {
            client.insert(key, "x");
        }
        client.fail_on(MockOp::DeleteObjects, None);
        let fs = adapter(&client, "");

        assert!(fs.delete_dir("dir").is_err());
        assert!(client.object("dir/").is_some());
        assert_eq!(client.calls(MockOp::Delete), 0);
    }

    #[test]
    fn test_delete_dir_empty_directory() {
        let client = Arc::new(MockClient::new());
        client.insert("empty/", "");
        let fs = adapter(&client, "");

        fs.delete_dir("empty/").unwrap();

        assert!(client.keys().is_empty());
    }

    #[test]
    fn test_delete_dir_rejects_bucket_root() {
        let client = Arc::new(MockClient::new());
        client.insert("a.txt", "x");
        let fs = adapter(&client, "");

        assert!(matches!(fs.delete_dir(""), Err(FSError::InvalidPath { .. })));
        assert!(client.object("a.txt").is_some());
    }

    #[test]
    fn test_visibility() {
        let client = Arc::new(MockClient::new());
        client.insert("a.txt", "x");
        let fs = adapter(&client, "");

        assert_eq!(fs.get_visibility("a.txt").unwrap(), Visibility::Private);

        fs.set_visibility("a.txt", Visibility::Public).unwrap();
        assert_eq!(fs.get_visibility("a.txt").unwrap(), Visibility::Public);
        assert_eq!(client.object("a.txt").unwrap().acl, Acl::PublicRead);
    }

    #[test]
    fn test_metadata_reads() {
        let client = Arc::new(MockClient::new());
        let fs = adapter(&client, "uploads");
        let config = WriteConfig {
            mimetype: Some("text/plain".to_string()),
            ..Default::default()
        };
        fs.write("docs/readme.txt", "hello", &config).unwrap();

        assert_eq!(fs.get_size("docs/readme.txt").unwrap(), Some(5));
        assert_eq!(
            fs.get_mimetype("docs/readme.txt").unwrap().as_deref(),
            Some("text/plain")
        );
        assert_eq!(fs.get_timestamp("docs/readme.txt").unwrap(), Some(1709296200));

        match fs.get_metadata("docs/readme.txt").unwrap() {
            Metadata::File(file) => {
                assert_eq!(file.path, "docs/readme.txt");
                assert_eq!(file.dirname, "docs");
                assert_eq!(file.timestamp, Some(1709296200));
            }
            other => panic!("expected file entry, got {:?}", other),
        }

        assert!(fs.get_size("docs/missing.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn test_get_url() {
        let client = Arc::new(MockClient::new());
        client.insert("a.txt", "x");
        client.insert("tenant/b c.txt", "x");

        let fs = adapter(&client, "");
        assert!(fs.get_url("missing.txt").unwrap_err().is_not_found());
        assert_eq!(
            fs.get_url("a.txt").unwrap(),
            "http://demo.oss-cn-hangzhou.aliyuncs.com/a.txt"
        );

        let mut cname = config("tenant");
        cname.domain = Some("cdn.example.com".to_string());
        cname.client.is_cname = true;
        cname.client.ssl = true;
        let fs = ObjectFS::new(Box::new(client.clone()), cname);
        assert_eq!(
            fs.get_url("b c.txt").unwrap(),
            "https://cdn.example.com/tenant/b%20c.txt"
        );
    }

    #[test]
    fn test_list_contents_always_recursive() {
        let client = Arc::new(MockClient::new());
        for key in ["a/1.txt", "a/b/2.txt", "a/b/3.txt", "z.txt"] {
            client.insert(key, "x");
        }
        let fs = adapter(&client, "");

        let entries = fs.list_contents("a", false).unwrap();

        assert_eq!(
            paths(&entries),
            vec![
                ("a/1.txt", false),
                ("a/b/2.txt", false),
                ("a/b/3.txt", false),
                ("a", true),
                ("a/b", true),
            ]
        );
    }

    #[test]
    fn test_list_contents_honoring_recursion() {
        let client = Arc::new(MockClient::new());
        for key in ["a/1.txt", "a/b/2.txt", "a/b/3.txt"] {
            client.insert(key, "x");
        }
        let mut cfg = config("");
        cfg.honor_list_recursion = true;
        let fs = ObjectFS::new(Box::new(client.clone()), cfg);

        let entries = fs.list_contents("a/", false).unwrap();
        assert_eq!(
            paths(&entries),
            vec![("a/1.txt", false), ("a/b", true), ("a", true)]
        );

        let entries = fs.list_contents("a/", true).unwrap();
        assert_eq!(entries.iter().filter(|m| !m.is_dir()).count(), 3);
    }

    #[test]
    fn test_list_contents_strips_prefix() {
        let client = Arc::new(MockClient::new());
        for key in ["tenant/", "tenant/x/1.txt", "other/2.txt"] {
            client.insert(key, "x");
        }
        let fs = adapter(&client, "tenant");

        let entries = fs.list_contents("", true).unwrap();

        assert_eq!(paths(&entries), vec![("x/1.txt", false), ("x", true)]);
    }

    #[test]
    fn test_list_contents_propagates_failure() {
        let client = Arc::new(MockClient::new());
        client.insert("a/1.txt", "x");
        client.fail_on(MockOp::List, None);
        let fs = adapter(&client, "");

        assert!(fs.list_contents("a", true).is_err());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_lookups_open_operation_spans() {
        let client = Arc::new(MockClient::new());
        client.insert("a.txt", "x");
        let fs = adapter(&client, "");

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            fs.has("a.txt").unwrap();
            fs.get_visibility("a.txt").unwrap();
            fs.get_size("a.txt").unwrap();
            fs.get_mimetype("a.txt").unwrap();
            fs.get_timestamp("a.txt").unwrap();
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let cases = vec!["has", "get_visibility", "get_size", "get_mimetype", "get_timestamp"];

        for op in cases {
            let span = format!("{}{{context=\"{}\"}}", op, op);
            assert!(output.contains(&span), "failed for case: {}", op);
        }
        assert_eq!(output.matches("called").count(), 5);
    }
}
