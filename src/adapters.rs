use futures::future::BoxFuture;

use crate::model::{
    error::StorageError,
    object::{BucketAttrs, Page},
};

pub mod gcs;
pub mod mock;
pub mod s3;

/// One method per remote call. Missing buckets and objects must surface as
/// [`StorageError::BucketNotFound`] and [`StorageError::ObjectNotFound`].
pub trait ObjectStore: Send + Sync {
    fn get_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<(), StorageError>>;

    fn insert_bucket<'a>(
        &'a self,
        project_id: &'a str,
        bucket: &'a str,
        attrs: &'a BucketAttrs,
    ) -> BoxFuture<'a, Result<(), StorageError>>;

    fn remove_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<(), StorageError>>;

    fn list_buckets_page<'a>(
        &'a self,
        project_id: &'a str,
        page_token: Option<String>,
    ) -> BoxFuture<'a, Result<Page, StorageError>>;

    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), StorageError>>;

    fn get_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, StorageError>>;

    fn list_objects_page<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
        page_token: Option<String>,
    ) -> BoxFuture<'a, Result<Page, StorageError>>;
}
