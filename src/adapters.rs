use std::{path::Path, sync::Arc};

use bytes::Bytes;

use crate::model::{
    fs::FSError,
    object::{Acl, ListPage, ListRequest, ObjectData, ObjectMeta, PutOptions},
};

pub mod mock;
pub mod s3;

/// Primitive object-storage operations the adapter is built on.
///
/// Implementations report a missing object as `FSError::NotFound` where the
/// service lets them tell it apart from other failures.
pub trait ObjectClient: Send + Sync {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<(), FSError>;

    fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        file: &Path,
        options: &PutOptions,
    ) -> Result<(), FSError>;

    fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData, FSError>;

    fn get_object_acl(&self, bucket: &str, key: &str) -> Result<Acl, FSError>;

    fn put_object_acl(&self, bucket: &str, key: &str, acl: Acl) -> Result<(), FSError>;

    fn copy_object(
        &self,
        from_bucket: &str,
        from_key: &str,
        to_bucket: &str,
        to_key: &str,
    ) -> Result<(), FSError>;

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), FSError>;

    /// Deletes a batch of keys. Any key the service fails to delete fails the
    /// whole call.
    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), FSError>;

    fn list_objects(&self, bucket: &str, request: &ListRequest<'_>) -> Result<ListPage, FSError>;

    fn get_object_meta(&self, bucket: &str, key: &str) -> Result<ObjectMeta, FSError>;

    /// Creates a zero-byte directory marker at `key`, which ends with `/`.
    fn create_object_dir(
        &self,
        bucket: &str,
        key: &str,
        options: &PutOptions,
    ) -> Result<(), FSError>;

    fn does_object_exist(&self, bucket: &str, key: &str) -> Result<bool, FSError>;
}

impl<T: ObjectClient + ?Sized> ObjectClient for Arc<T> {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<(), FSError> {
        (**self).put_object(bucket, key, body, options)
    }

    fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        file: &Path,
        options: &PutOptions,
    ) -> Result<(), FSError> {
        (**self).upload_file(bucket, key, file, options)
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData, FSError> {
        (**self).get_object(bucket, key)
    }

    fn get_object_acl(&self, bucket: &str, key: &str) -> Result<Acl, FSError> {
        (**self).get_object_acl(bucket, key)
    }

    fn put_object_acl(&self, bucket: &str, key: &str, acl: Acl) -> Result<(), FSError> {
        (**self).put_object_acl(bucket, key, acl)
    }

    fn copy_object(
        &self,
        from_bucket: &str,
        from_key: &str,
        to_bucket: &str,
        to_key: &str,
    ) -> Result<(), FSError> {
        (**self).copy_object(from_bucket, from_key, to_bucket, to_key)
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), FSError> {
        (**self).delete_object(bucket, key)
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), FSError> {
        (**self).delete_objects(bucket, keys)
    }

    fn list_objects(&self, bucket: &str, request: &ListRequest<'_>) -> Result<ListPage, FSError> {
        (**self).list_objects(bucket, request)
    }

    fn get_object_meta(&self, bucket: &str, key: &str) -> Result<ObjectMeta, FSError> {
        (**self).get_object_meta(bucket, key)
    }

    fn create_object_dir(
        &self,
        bucket: &str,
        key: &str,
        options: &PutOptions,
    ) -> Result<(), FSError> {
        (**self).create_object_dir(bucket, key, options)
    }

    fn does_object_exist(&self, bucket: &str, key: &str) -> Result<bool, FSError> {
        (**self).does_object_exist(bucket, key)
    }
}
