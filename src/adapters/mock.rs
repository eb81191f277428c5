use std::{
    collections::{BTreeMap, HashMap},
    io::Cursor,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
};

use bytes::Bytes;

use crate::{
    adapters::ObjectClient,
    model::{
        fs::FSError,
        object::{
            Acl, FSObject, ListPage, ListRequest, ObjectBody, ObjectData, ObjectMeta, PutOptions,
        },
    },
};

const LAST_MODIFIED_ISO: &str = "2024-03-01T12:30:00.000Z";
const LAST_MODIFIED_HTTP: &str = "Fri, 01 Mar 2024 12:30:00 GMT";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockOp {
    Put,
    Upload,
    Get,
    GetAcl,
    PutAcl,
    Copy,
    Delete,
    DeleteObjects,
    List,
    Head,
    CreateDir,
    Exists,
}

impl MockOp {
    fn name(&self) -> &'static str {
        match self {
            MockOp::Put => "put_object",
            MockOp::Upload => "upload_file",
            MockOp::Get => "get_object",
            MockOp::GetAcl => "get_object_acl",
            MockOp::PutAcl => "put_object_acl",
            MockOp::Copy => "copy_object",
            MockOp::Delete => "delete_object",
            MockOp::DeleteObjects => "delete_objects",
            MockOp::List => "list_objects",
            MockOp::Head => "get_object_meta",
            MockOp::CreateDir => "create_object_dir",
            MockOp::Exists => "does_object_exist",
        }
    }
}

#[derive(Clone, Debug)]
pub struct MockObject {
    pub body: Bytes,
    pub acl: Acl,
    pub options: PutOptions,
}

impl MockObject {
    fn content_type(&self) -> String {
        self.options
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }

    fn meta(&self) -> ObjectMeta {
        ObjectMeta {
            content_length: Some(self.body.len() as u64),
            content_type: Some(self.content_type()),
            last_modified: Some(LAST_MODIFIED_HTTP.to_string()),
            etag: Some(format!("\"{:x}\"", self.body.len())),
            storage_class: Some("Standard".to_string()),
        }
    }

    fn to_fs_object(&self, key: &str) -> FSObject {
        FSObject {
            key: key.to_string(),
            size: self.body.len() as u64,
            last_modified: Some(LAST_MODIFIED_ISO.to_string()),
            content_type: None,
            storage_class: Some("Standard".to_string()),
            etag: Some(format!("\"{:x}\"", self.body.len())),
        }
    }
}

/// In-memory bucket with the listing semantics of a real service.
///
/// Failures can be injected per operation (optionally per key) and every
/// call is counted.
pub struct MockClient {
    objects: Mutex<BTreeMap<String, MockObject>>,
    failures: Mutex<Vec<(MockOp, Option<String>)>>,
    calls: Mutex<HashMap<MockOp, usize>>,
    default_acl: Acl,
    stream_bodies: bool,
    stale_deletes: AtomicBool,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            failures: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            default_acl: Acl::Private,
            stream_bodies: false,
            stale_deletes: AtomicBool::new(false),
        }
    }

    /// ACL applied to objects written without an explicit one.
    pub fn with_default_acl(mut self, acl: Acl) -> Self {
        self.default_acl = acl;
        self
    }

    /// Serve bodies as readers instead of buffers.
    pub fn with_streamed_bodies(mut self) -> Self {
        self.stream_bodies = true;
        self
    }

    /// Deletes report success but leave the object in place.
    pub fn set_stale_deletes(&self, stale: bool) {
        self.stale_deletes.store(stale, Ordering::SeqCst);
    }

    pub fn fail_on(&self, op: MockOp, key: Option<&str>) {
        lock(&self.failures).push((op, key.map(|k| k.to_string())));
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    pub fn calls(&self, op: MockOp) -> usize {
        lock(&self.calls).get(&op).copied().unwrap_or(0)
    }

    pub fn insert(&self, key: &str, body: &str) {
        self.insert_with_acl(key, body, self.default_acl);
    }

    pub fn insert_with_acl(&self, key: &str, body: &str, acl: Acl) {
        lock(&self.objects).insert(
            key.to_string(),
            MockObject {
                body: Bytes::copy_from_slice(body.as_bytes()),
                acl,
                options: PutOptions::default(),
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<MockObject> {
        lock(&self.objects).get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    fn record(&self, op: MockOp, keys: &[&str]) -> Result<(), FSError> {
        *lock(&self.calls).entry(op).or_insert(0) += 1;

        let failures = lock(&self.failures);
        for (failing_op, failing_key) in failures.iter() {
            if *failing_op != op {
                continue;
            }

            let hit = match failing_key {
                None => true,
                Some(k) => keys.contains(&k.as_str()),
            };

            if hit {
                return Err(FSError::transport(
                    op.name(),
                    keys.first().copied().unwrap_or(""),
                    "injected failure",
                ));
            }
        }

        Ok(())
    }

    fn store(&self, key: &str, body: Bytes, options: &PutOptions) {
        lock(&self.objects).insert(
            key.to_string(),
            MockObject {
                body,
                acl: options.acl.unwrap_or(self.default_acl),
                options: options.clone(),
            },
        );
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ObjectClient for MockClient {
    fn put_object(
        &self,
        _bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<(), FSError> {
        self.record(MockOp::Put, &[key])?;
        self.store(key, body, options);
        Ok(())
    }

    fn upload_file(
        &self,
        _bucket: &str,
        key: &str,
        file: &Path,
        options: &PutOptions,
    ) -> Result<(), FSError> {
        self.record(MockOp::Upload, &[key])?;

        let body = std::fs::read(file)
            .map_err(|err| FSError::io(&file.to_string_lossy(), err))?;
        self.store(key, Bytes::from(body), options);
        Ok(())
    }

    fn get_object(&self, _bucket: &str, key: &str) -> Result<ObjectData, FSError> {
        self.record(MockOp::Get, &[key])?;

        let object = self.object(key).ok_or_else(|| FSError::not_found(key))?;
        let body = if self.stream_bodies {
            ObjectBody::Reader(Box::new(Cursor::new(object.body.to_vec())))
        } else {
            ObjectBody::Buffer(object.body.clone())
        };

        Ok(ObjectData {
            meta: object.meta(),
            body,
        })
    }

    fn get_object_acl(&self, _bucket: &str, key: &str) -> Result<Acl, FSError> {
        self.record(MockOp::GetAcl, &[key])?;

        self.object(key)
            .map(|object| object.acl)
            .ok_or_else(|| FSError::not_found(key))
    }

    fn put_object_acl(&self, _bucket: &str, key: &str, acl: Acl) -> Result<(), FSError> {
        self.record(MockOp::PutAcl, &[key])?;

        match lock(&self.objects).get_mut(key) {
            Some(object) => {
                object.acl = acl;
                Ok(())
            }
            None => Err(FSError::not_found(key)),
        }
    }

    fn copy_object(
        &self,
        _from_bucket: &str,
        from_key: &str,
        _to_bucket: &str,
        to_key: &str,
    ) -> Result<(), FSError> {
        self.record(MockOp::Copy, &[from_key, to_key])?;

        let source = self.object(from_key).ok_or_else(|| FSError::not_found(from_key))?;
        lock(&self.objects).insert(
            to_key.to_string(),
            MockObject {
                acl: self.default_acl,
                ..source
            },
        );
        Ok(())
    }

    fn delete_object(&self, _bucket: &str, key: &str) -> Result<(), FSError> {
        self.record(MockOp::Delete, &[key])?;

        if !self.stale_deletes.load(Ordering::SeqCst) {
            lock(&self.objects).remove(key);
        }
        Ok(())
    }

    fn delete_objects(&self, _bucket: &str, keys: &[String]) -> Result<(), FSError> {
        let refs: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        self.record(MockOp::DeleteObjects, &refs)?;

        if !self.stale_deletes.load(Ordering::SeqCst) {
            let mut objects = lock(&self.objects);
            for key in keys {
                objects.remove(key);
            }
        }
        Ok(())
    }

    fn list_objects(&self, _bucket: &str, request: &ListRequest<'_>) -> Result<ListPage, FSError> {
        self.record(MockOp::List, &[request.prefix])?;

        let objects = lock(&self.objects);
        let mut page = ListPage::default();
        let mut count = 0;
        let mut last: Option<String> = None;

        for (key, object) in objects.iter() {
            if !key.starts_with(request.prefix) {
                continue;
            }

            if let Some(marker) = request.marker {
                if key.as_str() <= marker {
                    continue;
                }
                // Everything under a rolled-up prefix was reported with it.
                if marker.ends_with(request.delimiter) && key.starts_with(marker) {
                    continue;
                }
            }

            let rest = &key[request.prefix.len()..];
            let common = if request.delimiter.is_empty() {
                None
            } else {
                rest.find(request.delimiter).map(|i| {
                    format!(
                        "{}{}",
                        request.prefix,
                        &rest[..i + request.delimiter.len()]
                    )
                })
            };

            if let Some(p) = &common {
                if page.prefixes.last() == Some(p) {
                    continue;
                }
            }

            if count == request.max_keys {
                page.next_marker = last;
                return Ok(page);
            }
            count += 1;

            match common {
                Some(p) => {
                    last = Some(p.clone());
                    page.prefixes.push(p);
                }
                None => {
                    last = Some(key.clone());
                    page.objects.push(object.to_fs_object(key));
                }
            }
        }

        Ok(page)
    }

    fn get_object_meta(&self, _bucket: &str, key: &str) -> Result<ObjectMeta, FSError> {
        self.record(MockOp::Head, &[key])?;

        self.object(key)
            .map(|object| object.meta())
            .ok_or_else(|| FSError::not_found(key))
    }

    fn create_object_dir(
        &self,
        _bucket: &str,
        key: &str,
        options: &PutOptions,
    ) -> Result<(), FSError> {
        self.record(MockOp::CreateDir, &[key])?;
        self.store(key, Bytes::new(), options);
        Ok(())
    }

    fn does_object_exist(&self, _bucket: &str, key: &str) -> Result<bool, FSError> {
        self.record(MockOp::Exists, &[key])?;
        Ok(lock(&self.objects).contains_key(key))
    }
}
