use futures::future::BoxFuture;
use google_cloud_storage::http::{
    buckets::{
        delete::DeleteBucketRequest,
        get::GetBucketRequest,
        insert::{BucketCreationConfig, InsertBucketParam, InsertBucketRequest},
        list::ListBucketsRequest,
    },
    objects::{
        download::Range,
        get::GetObjectRequest,
        list::ListObjectsRequest,
        upload::{Media, UploadObjectRequest, UploadType},
    },
};

use crate::{
    adapters,
    model::{
        error::StorageError,
        object::{BucketAttrs, Page},
    },
};

const DEFAULT_LOCATION: &str = "US";

fn object_path(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, key)
}

fn is_not_found(err: &google_cloud_storage::http::Error) -> bool {
    matches!(err, google_cloud_storage::http::Error::Response(resp) if resp.code == 404)
}

impl adapters::ObjectStore for google_cloud_storage::client::Client {
    fn get_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let req = GetBucketRequest {
                bucket: bucket.to_string(),
                ..Default::default()
            };

            match google_cloud_storage::http::storage_client::StorageClient::get_bucket(self, &req).await {
                Err(err) if is_not_found(&err) => Err(StorageError::bucket_not_found(bucket)),
                Err(err) => Err(StorageError::backend("get_bucket", bucket, err)),
                Ok(_) => Ok(()),
            }
        })
    }

    fn insert_bucket<'a>(
        &'a self,
        project_id: &'a str,
        bucket: &'a str,
        attrs: &'a BucketAttrs,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let req = InsertBucketRequest {
                name: bucket.to_string(),
                param: InsertBucketParam {
                    project: project_id.to_string(),
                    ..Default::default()
                },
                bucket: BucketCreationConfig {
                    location: attrs
                        .location
                        .clone()
                        .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
                    storage_class: attrs.storage_class.clone(),
                    ..Default::default()
                },
            };

            google_cloud_storage::http::storage_client::StorageClient::insert_bucket(self, &req)
                .await
                .map_err(|err| StorageError::backend("insert_bucket", bucket, err))?;

            Ok(())
        })
    }

    fn remove_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let req = DeleteBucketRequest {
                bucket: bucket.to_string(),
                ..Default::default()
            };

            match google_cloud_storage::http::storage_client::StorageClient::delete_bucket(self, &req).await {
                Err(err) if is_not_found(&err) => Err(StorageError::bucket_not_found(bucket)),
                Err(err) => Err(StorageError::backend("delete_bucket", bucket, err)),
                Ok(_) => Ok(()),
            }
        })
    }

    fn list_buckets_page<'a>(
        &'a self,
        project_id: &'a str,
        page_token: Option<String>,
    ) -> BoxFuture<'a, Result<Page, StorageError>> {
        Box::pin(async move {
            let req = ListBucketsRequest {
                project: project_id.to_string(),
                page_token,
                ..Default::default()
            };

            let lb = google_cloud_storage::http::storage_client::StorageClient::list_buckets(self, &req)
                .await
                .map_err(|err| StorageError::backend("list_buckets", project_id, err))?;

            Ok(Page {
                names: lb.items.into_iter().map(|b| b.name).collect(),
                next_page_token: lb.next_page_token,
            })
        })
    }

    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let req = UploadObjectRequest {
                bucket: bucket.to_string(),
                ..Default::default()
            };

            match self
                .upload_object(&req, body, &UploadType::Simple(Media::new(key.to_string())))
                .await
            {
                Err(err) if is_not_found(&err) => Err(StorageError::bucket_not_found(bucket)),
                Err(err) => Err(StorageError::backend("put_object", &object_path(bucket, key), err)),
                Ok(_) => Ok(()),
            }
        })
    }

    fn get_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, StorageError>> {
        Box::pin(async move {
            let req = GetObjectRequest {
                bucket: bucket.to_string(),
                object: key.to_string(),
                ..Default::default()
            };

            match self.download_object(&req, &Range::default()).await {
                Err(err) if is_not_found(&err) => Err(StorageError::object_not_found(bucket, key)),
                Err(err) => Err(StorageError::backend("get_object", &object_path(bucket, key), err)),
                Ok(bytes) => Ok(bytes),
            }
        })
    }

    fn list_objects_page<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
        page_token: Option<String>,
    ) -> BoxFuture<'a, Result<Page, StorageError>> {
        Box::pin(async move {
            let req = ListObjectsRequest {
                bucket: bucket.to_string(),
                prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
                page_token,
                ..Default::default()
            };

            let lo = match google_cloud_storage::http::storage_client::StorageClient::list_objects(self, &req).await {
                Err(err) if is_not_found(&err) => {
                    return Err(StorageError::bucket_not_found(bucket));
                }
                Err(err) => return Err(StorageError::backend("list_objects", bucket, err)),
                Ok(lo) => lo,
            };

            Ok(Page {
                names: lo.items.unwrap_or_default().into_iter().map(|o| o.name).collect(),
                next_page_token: lo.next_page_token,
            })
        })
    }
}
