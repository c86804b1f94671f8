use aws_sdk_s3::{
    error::{DisplayErrorContext, ProvideErrorMetadata},
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
};
use futures::future::BoxFuture;

use crate::{
    adapters,
    model::{
        error::StorageError,
        object::{BucketAttrs, Page},
    },
};

const NO_SUCH_BUCKET: &str = "NoSuchBucket";
const US_EAST_1: &str = "us-east-1";

fn backend<E: std::error::Error>(operation: &'static str, target: &str, err: E) -> StorageError {
    StorageError::backend(operation, target, DisplayErrorContext(err))
}

fn object_path(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, key)
}

/// Constraint sent on create. Falls back to the client's region and is omitted
/// for us-east-1, which S3 rejects as an explicit constraint.
fn location_constraint<'a>(requested: Option<&'a str>, region: Option<&'a str>) -> Option<&'a str> {
    requested
        .or(region)
        .filter(|location| !location.is_empty() && *location != US_EAST_1)
}

// S3 has no project scoping, `project_id` is ignored throughout.
impl adapters::ObjectStore for aws_sdk_s3::Client {
    fn get_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            match self.head_bucket().bucket(bucket).send().await {
                Err(err) => {
                    if let Some(svc_err) = err.as_service_error() {
                        if svc_err.is_not_found() {
                            return Err(StorageError::bucket_not_found(bucket));
                        }
                    }

                    Err(backend("get_bucket", bucket, err))
                }
                Ok(_) => Ok(()),
            }
        })
    }

    fn insert_bucket<'a>(
        &'a self,
        _project_id: &'a str,
        bucket: &'a str,
        attrs: &'a BucketAttrs,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let mut req = self.create_bucket().bucket(bucket);

            // storage class is per object on S3, only the location applies here
            let region: Option<&str> = self.config().region().map(|r| r.as_ref());
            if let Some(location) = location_constraint(attrs.location.as_deref(), region) {
                req = req.create_bucket_configuration(
                    CreateBucketConfiguration::builder()
                        .location_constraint(BucketLocationConstraint::from(location))
                        .build(),
                );
            }

            req.send()
                .await
                .map_err(|err| backend("insert_bucket", bucket, err))?;

            Ok(())
        })
    }

    fn remove_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            match self.delete_bucket().bucket(bucket).send().await {
                Err(err) => {
                    if err.as_service_error().and_then(|e| e.code()) == Some(NO_SUCH_BUCKET) {
                        return Err(StorageError::bucket_not_found(bucket));
                    }

                    Err(backend("delete_bucket", bucket, err))
                }
                Ok(_) => Ok(()),
            }
        })
    }

    fn list_buckets_page<'a>(
        &'a self,
        _project_id: &'a str,
        page_token: Option<String>,
    ) -> BoxFuture<'a, Result<Page, StorageError>> {
        Box::pin(async move {
            let lb = self
                .list_buckets()
                .set_continuation_token(page_token)
                .send()
                .await
                .map_err(|err| backend("list_buckets", "s3://", err))?;

            let names = lb
                .buckets()
                .iter()
                .filter_map(|b| b.name().map(|name| name.to_string()))
                .collect();

            Ok(Page {
                names,
                next_page_token: lb.continuation_token().map(|tok| tok.to_string()),
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
            let req = self
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from(body));

            match req.send().await {
                Err(err) => {
                    if err.as_service_error().and_then(|e| e.code()) == Some(NO_SUCH_BUCKET) {
                        return Err(StorageError::bucket_not_found(bucket));
                    }

                    Err(backend("put_object", &object_path(bucket, key), err))
                }
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
            let o = match self.get_object().bucket(bucket).key(key).send().await {
                Err(err) => {
                    if let Some(svc_err) = err.as_service_error() {
                        if svc_err.is_no_such_key() {
                            return Err(StorageError::object_not_found(bucket, key));
                        }
                        if svc_err.code() == Some(NO_SUCH_BUCKET) {
                            return Err(StorageError::bucket_not_found(bucket));
                        }
                    }

                    return Err(backend("get_object", &object_path(bucket, key), err));
                }
                Ok(o) => o,
            };

            let bytes = o
                .body
                .collect()
                .await
                .map_err(|err| backend("collect_body", &object_path(bucket, key), err))?;

            Ok(bytes.into_bytes().to_vec())
        })
    }

    fn list_objects_page<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
        page_token: Option<String>,
    ) -> BoxFuture<'a, Result<Page, StorageError>> {
        Box::pin(async move {
            let req = self
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(page_token);

            let lo = match req.send().await {
                Err(err) => {
                    if let Some(svc_err) = err.as_service_error() {
                        if svc_err.is_no_such_bucket() {
                            return Err(StorageError::bucket_not_found(bucket));
                        }
                    }

                    return Err(backend("list_objects", bucket, err));
                }
                Ok(lo) => lo,
            };

            let names = lo
                .contents()
                .iter()
                .filter_map(|o| o.key().map(|key| key.to_string()))
                .collect();

            Ok(Page {
                names,
                next_page_token: lo.next_continuation_token().map(|tok| tok.to_string()),
            })
        })
    }
}
