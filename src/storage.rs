//! Bucket and object helpers. Each function wraps one or two backend calls,
//! logs what it does and hands every error back to the caller.

use std::path::Path;

use futures::future::BoxFuture;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    adapters::ObjectStore,
    model::{
        error::StorageError,
        object::{BucketAttrs, Page},
    },
    util::{context::RequestContext, object::Provider},
};

/// Builds a client from the ambient credentials of the provider's SDK.
#[instrument(skip(ctx), fields(context = "create_client"))]
pub async fn create_client(
    ctx: &RequestContext,
    provider: Provider,
) -> Result<Box<dyn ObjectStore>, StorageError> {
    ctx.run("create_client", async {
        let client: Box<dyn ObjectStore> = match provider {
            Provider::GCS => {
                let config = google_cloud_storage::client::ClientConfig::default()
                    .with_auth()
                    .await
                    .map_err(|err| StorageError::Client(err.to_string()))?;
                Box::new(google_cloud_storage::client::Client::new(config))
            }
            Provider::AWS => {
                let config = aws_config::load_from_env().await;
                Box::new(aws_sdk_s3::Client::new(&config))
            }
        };

        Ok(client)
    })
    .await
    .inspect_err(|err| error!(error_message=%err, error_group="create_client"))
}

/// Creates `bucket` unless it already exists. Returns whether a bucket was created.
#[instrument(skip(client, ctx, attrs), fields(context = "create_bucket"))]
pub async fn create_bucket(
    client: &dyn ObjectStore,
    ctx: &RequestContext,
    project_id: &str,
    bucket: &str,
    attrs: &BucketAttrs,
) -> Result<bool, StorageError> {
    let res: Result<bool, StorageError> = async {
        match ctx.run("get_bucket", client.get_bucket(bucket)).await {
            Ok(()) => {
                debug!(bucket = bucket, "bucket exists, skipping create");
                return Ok(false);
            }
            Err(StorageError::BucketNotFound { .. }) => {}
            Err(err) => return Err(err),
        }

        debug!(bucket = bucket, project_id = project_id, "creating bucket");
        ctx.run("insert_bucket", client.insert_bucket(project_id, bucket, attrs))
            .await?;

        Ok(true)
    }
    .await;

    res.inspect_err(|err| error!(error_message=%err, error_group="create_bucket"))
}

/// Names of every bucket in `project_id`, across all pages.
#[instrument(skip(client, ctx), fields(context = "list_buckets"))]
pub async fn list_buckets(
    client: &dyn ObjectStore,
    ctx: &RequestContext,
    project_id: &str,
) -> Result<Vec<String>, StorageError> {
    collect_pages(ctx, "list_buckets", |page_token| {
        client.list_buckets_page(project_id, page_token)
    })
    .await
    .inspect_err(|err| error!(error_message=%err, error_group="list_buckets"))
}

/// Deletes `bucket`, failing with [`StorageError::BucketNotFound`] when it is absent.
#[instrument(skip(client, ctx), fields(context = "delete_bucket"))]
pub async fn delete_bucket(
    client: &dyn ObjectStore,
    ctx: &RequestContext,
    bucket: &str,
) -> Result<(), StorageError> {
    let res: Result<(), StorageError> = async {
        ctx.run("get_bucket", client.get_bucket(bucket)).await?;

        warn!(bucket = bucket, "deleting bucket");
        ctx.run("delete_bucket", client.remove_bucket(bucket)).await
    }
    .await;

    res.inspect_err(|err| error!(error_message=%err, error_group="delete_bucket"))
}

#[instrument(
    skip(client, ctx, local_path),
    fields(context = "upload_local_file", local_path = %local_path.display())
)]
pub async fn upload_local_file(
    client: &dyn ObjectStore,
    ctx: &RequestContext,
    bucket: &str,
    local_path: &Path,
    key: &str,
) -> Result<(), StorageError> {
    let res: Result<(), StorageError> = async {
        ctx.run("get_bucket", client.get_bucket(bucket)).await?;

        let body = ctx
            .run("read_local_file", async {
                tokio::fs::read(local_path)
                    .await
                    .map_err(|source| StorageError::Io {
                        path: local_path.to_path_buf(),
                        source,
                    })
            })
            .await?;

        info!(bucket = bucket, key = key, size = body.len(), "uploading object");
        ctx.run("put_object", client.put_object(bucket, key, body))
            .await
    }
    .await;

    res.inspect_err(|err| error!(error_message=%err, error_group="upload_local_file"))
}

/// Full contents of `bucket/key`.
#[instrument(skip(client, ctx), fields(context = "read_object"))]
pub async fn read_object(
    client: &dyn ObjectStore,
    ctx: &RequestContext,
    bucket: &str,
    key: &str,
) -> Result<Vec<u8>, StorageError> {
    ctx.run("get_object", client.get_object(bucket, key))
        .await
        .inspect(|body| debug!(bucket = bucket, key = key, size = body.len(), "read object"))
        .inspect_err(|err| error!(error_message=%err, error_group="read_object"))
}

pub async fn list_objects(
    client: &dyn ObjectStore,
    ctx: &RequestContext,
    bucket: &str,
) -> Result<Vec<String>, StorageError> {
    list_objects_with_prefix(client, ctx, bucket, "").await
}

/// Keys in `bucket` starting with `prefix`, across all pages.
#[instrument(skip(client, ctx), fields(context = "list_objects"))]
pub async fn list_objects_with_prefix(
    client: &dyn ObjectStore,
    ctx: &RequestContext,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<String>, StorageError> {
    collect_pages(ctx, "list_objects", |page_token| {
        client.list_objects_page(bucket, prefix, page_token)
    })
    .await
    .inspect_err(|err| error!(error_message=%err, error_group="list_objects"))
}

// An empty token is treated as the last page.
async fn collect_pages<'a, F>(
    ctx: &RequestContext,
    operation: &'static str,
    mut next_page: F,
) -> Result<Vec<String>, StorageError>
where
    F: FnMut(Option<String>) -> BoxFuture<'a, Result<Page, StorageError>>,
{
    let mut names = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = ctx.run(operation, next_page(page_token.take())).await?;
        names.extend(page.names);

        page_token = page.next_page_token.filter(|tok| !tok.is_empty());
        if page_token.is_none() {
            break;
        }
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, io::Write, sync::Mutex, time::Duration};

    use futures::future;

    use super::*;
    use crate::adapters::mock::MockClient;

    const PROJECT: &str = "test-project";

    /// Serves listing pages in a fixed order and records the tokens it was asked for.
    struct ScriptedPages {
        pages: Mutex<VecDeque<Page>>,
        tokens: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedPages {
        fn new(pages: Vec<Page>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                tokens: Mutex::new(Vec::new()),
            }
        }

        fn next(&self, page_token: Option<String>) -> Result<Page, StorageError> {
            self.tokens.lock().unwrap().push(page_token);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| StorageError::backend("list", "script", "no pages left"))
        }

        fn requested_tokens(&self) -> Vec<Option<String>> {
            self.tokens.lock().unwrap().clone()
        }
    }

    impl ObjectStore for ScriptedPages {
        fn get_bucket<'a>(&'a self, _bucket: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
            Box::pin(future::ready(Ok(())))
        }

        fn insert_bucket<'a>(
            &'a self,
            _project_id: &'a str,
            bucket: &'a str,
            _attrs: &'a BucketAttrs,
        ) -> BoxFuture<'a, Result<(), StorageError>> {
            Box::pin(future::ready(Err(StorageError::backend(
                "insert_bucket",
                bucket,
                "not scripted",
            ))))
        }

        fn remove_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
            Box::pin(future::ready(Err(StorageError::backend(
                "delete_bucket",
                bucket,
                "not scripted",
            ))))
        }

        fn list_buckets_page<'a>(
            &'a self,
            _project_id: &'a str,
            page_token: Option<String>,
        ) -> BoxFuture<'a, Result<Page, StorageError>> {
            Box::pin(future::ready(self.next(page_token)))
        }

        fn put_object<'a>(
            &'a self,
            _bucket: &'a str,
            key: &'a str,
            _body: Vec<u8>,
        ) -> BoxFuture<'a, Result<(), StorageError>> {
            Box::pin(future::ready(Err(StorageError::backend(
                "put_object",
                key,
                "not scripted",
            ))))
        }

        fn get_object<'a>(
            &'a self,
            _bucket: &'a str,
            key: &'a str,
        ) -> BoxFuture<'a, Result<Vec<u8>, StorageError>> {
            Box::pin(future::ready(Err(StorageError::backend(
                "get_object",
                key,
                "not scripted",
            ))))
        }

        fn list_objects_page<'a>(
            &'a self,
            _bucket: &'a str,
            _prefix: &'a str,
            page_token: Option<String>,
        ) -> BoxFuture<'a, Result<Page, StorageError>> {
            Box::pin(future::ready(self.next(page_token)))
        }
    }

    fn empty_then_terminal_pages() -> Vec<Page> {
        vec![
            Page {
                names: vec![],
                next_page_token: Some("t1".to_string()),
            },
            Page {
                names: vec!["a".to_string()],
                next_page_token: Some(String::new()),
            },
            Page {
                names: vec!["never".to_string()],
                next_page_token: None,
            },
        ]
    }

    #[tokio::test]
    async fn test_list_objects_empty_page_then_empty_token() {
        let client = ScriptedPages::new(empty_then_terminal_pages());
        let ctx = RequestContext::background();

        let keys = list_objects(&client, &ctx, "b").await.unwrap();

        assert_eq!(keys, vec!["a"]);
        assert_eq!(
            client.requested_tokens(),
            vec![None, Some("t1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_list_buckets_empty_page_then_empty_token() {
        let client = ScriptedPages::new(empty_then_terminal_pages());
        let ctx = RequestContext::background();

        let buckets = list_buckets(&client, &ctx, PROJECT).await.unwrap();

        assert_eq!(buckets, vec!["a"]);
        assert_eq!(client.requested_tokens().len(), 2);
    }

    #[tokio::test]
    async fn test_read_object_missing_bucket() {
        let client = MockClient::new();
        let ctx = RequestContext::background();

        let err = read_object(&client, &ctx, "nowhere", "k").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(matches!(err, StorageError::BucketNotFound { ref bucket } if bucket == "nowhere"));
    }

    #[tokio::test]
    async fn test_list_objects_missing_bucket() {
        let client = MockClient::new();
        let ctx = RequestContext::background();

        let err = list_objects(&client, &ctx, "nowhere").await.unwrap_err();

        assert!(matches!(err, StorageError::BucketNotFound { ref bucket } if bucket == "nowhere"));
        assert_eq!(client.calls("list_objects"), 1);
    }

    /// Cancels its context once the bucket existence check has answered.
    struct CancelAfterBucketCheck {
        inner: MockClient,
        ctx: RequestContext,
    }

    impl ObjectStore for CancelAfterBucketCheck {
        fn get_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
            Box::pin(async move {
                let res = self.inner.get_bucket(bucket).await;
                self.ctx.cancel();
                res
            })
        }

        fn insert_bucket<'a>(
            &'a self,
            project_id: &'a str,
            bucket: &'a str,
            attrs: &'a BucketAttrs,
        ) -> BoxFuture<'a, Result<(), StorageError>> {
            self.inner.insert_bucket(project_id, bucket, attrs)
        }

        fn remove_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
            self.inner.remove_bucket(bucket)
        }

        fn list_buckets_page<'a>(
            &'a self,
            project_id: &'a str,
            page_token: Option<String>,
        ) -> BoxFuture<'a, Result<Page, StorageError>> {
            self.inner.list_buckets_page(project_id, page_token)
        }

        fn put_object<'a>(
            &'a self,
            bucket: &'a str,
            key: &'a str,
            body: Vec<u8>,
        ) -> BoxFuture<'a, Result<(), StorageError>> {
            self.inner.put_object(bucket, key, body)
        }

        fn get_object<'a>(
            &'a self,
            bucket: &'a str,
            key: &'a str,
        ) -> BoxFuture<'a, Result<Vec<u8>, StorageError>> {
            self.inner.get_object(bucket, key)
        }

        fn list_objects_page<'a>(
            &'a self,
            bucket: &'a str,
            prefix: &'a str,
            page_token: Option<String>,
        ) -> BoxFuture<'a, Result<Page, StorageError>> {
            self.inner.list_objects_page(bucket, prefix, page_token)
        }
    }

    #[tokio::test]
    async fn test_upload_local_read_honours_cancel() {
        let ctx = RequestContext::background();
        let client = CancelAfterBucketCheck {
            inner: MockClient::new().with_bucket(PROJECT, "b"),
            ctx: ctx.clone(),
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();

        let err = upload_local_file(&client, &ctx, "b", file.path(), "k")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Cancelled { operation: "read_local_file" }));
        assert_eq!(client.inner.calls("get_bucket"), 1);
        assert_eq!(client.inner.calls("put_object"), 0);
    }

    #[tokio::test]
    async fn test_create_bucket() {
        let client = MockClient::new();
        let ctx = RequestContext::background();

        let created = create_bucket(&client, &ctx, PROJECT, "fresh", &BucketAttrs::default())
            .await
            .unwrap();

        assert!(created);
        assert!(client.has_bucket("fresh"));
        assert_eq!(client.calls("insert_bucket"), 1);
    }

    #[tokio::test]
    async fn test_create_bucket_existing_is_noop() {
        let client = MockClient::new().with_bucket(PROJECT, "taken");
        let ctx = RequestContext::background();

        let created = create_bucket(&client, &ctx, PROJECT, "taken", &BucketAttrs::default())
            .await
            .unwrap();

        assert!(!created);
        assert_eq!(client.calls("get_bucket"), 1);
        assert_eq!(client.calls("insert_bucket"), 0);
    }

    #[tokio::test]
    async fn test_create_bucket_existence_check_error() {
        let client = MockClient::new();
        client.fail_on("get_bucket", "403 forbidden");
        let ctx = RequestContext::background();

        let err = create_bucket(&client, &ctx, PROJECT, "b", &BucketAttrs::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Backend { operation: "get_bucket", .. }));
        assert_eq!(client.calls("insert_bucket"), 0);
        assert!(!client.has_bucket("b"));
    }

    #[tokio::test]
    async fn test_create_bucket_insert_error() {
        let client = MockClient::new();
        client.fail_on("insert_bucket", "429 too many requests");
        let ctx = RequestContext::background();

        let err = create_bucket(&client, &ctx, PROJECT, "b", &BucketAttrs::default())
            .await
            .unwrap_err();

        assert!(!err.is_not_found());
        assert_eq!(client.calls("insert_bucket"), 1);
    }

    #[tokio::test]
    async fn test_list_buckets() {
        let client = MockClient::new()
            .with_page_size(2)
            .with_bucket(PROJECT, "c")
            .with_bucket(PROJECT, "a")
            .with_bucket(PROJECT, "b")
            .with_bucket("other-project", "z");
        let ctx = RequestContext::background();

        let buckets = list_buckets(&client, &ctx, PROJECT).await.unwrap();

        assert_eq!(buckets, vec!["a", "b", "c"]);
        assert_eq!(client.calls("list_buckets"), 2);
    }

    #[tokio::test]
    async fn test_list_buckets_empty() {
        let client = MockClient::new();
        let ctx = RequestContext::background();

        let buckets = list_buckets(&client, &ctx, PROJECT).await.unwrap();

        assert!(buckets.is_empty());
        assert_eq!(client.calls("list_buckets"), 1);
    }

    #[tokio::test]
    async fn test_list_buckets_error() {
        let client = MockClient::new().with_bucket(PROJECT, "a");
        client.fail_on("list_buckets", "500 backend error");
        let ctx = RequestContext::background();

        let res = list_buckets(&client, &ctx, PROJECT).await;

        assert!(matches!(res, Err(StorageError::Backend { .. })));
    }

    #[tokio::test]
    async fn test_delete_bucket() {
        let client = MockClient::new().with_bucket(PROJECT, "old");
        let ctx = RequestContext::background();

        delete_bucket(&client, &ctx, "old").await.unwrap();

        assert!(!client.has_bucket("old"));
    }

    #[tokio::test]
    async fn test_delete_bucket_missing() {
        let client = MockClient::new();
        let ctx = RequestContext::background();

        let err = delete_bucket(&client, &ctx, "missing").await.unwrap_err();

        assert!(matches!(err, StorageError::BucketNotFound { ref bucket } if bucket == "missing"));
        assert_eq!(client.calls("remove_bucket"), 0);
    }

    #[tokio::test]
    async fn test_upload_and_read() {
        let client = MockClient::new().with_bucket(PROJECT, "b");
        let ctx = RequestContext::background();

        let body: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&body).unwrap();

        upload_local_file(&client, &ctx, "b", file.path(), "dir/blob.bin")
            .await
            .unwrap();
        let read = read_object(&client, &ctx, "b", "dir/blob.bin").await.unwrap();

        assert_eq!(read, body);
    }

    #[tokio::test]
    async fn test_upload_missing_bucket() {
        let client = MockClient::new();
        let ctx = RequestContext::background();
        let file = tempfile::NamedTempFile::new().unwrap();

        let err = upload_local_file(&client, &ctx, "missing", file.path(), "k")
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(client.calls("put_object"), 0);
    }

    #[tokio::test]
    async fn test_upload_missing_local_file() {
        let client = MockClient::new().with_bucket(PROJECT, "b");
        let ctx = RequestContext::background();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.txt");

        let err = upload_local_file(&client, &ctx, "b", &path, "k")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Io { path: ref p, .. } if *p == path));
        assert_eq!(client.calls("put_object"), 0);
    }

    #[tokio::test]
    async fn test_read_object_missing() {
        let client = MockClient::new().with_bucket(PROJECT, "b");
        let ctx = RequestContext::background();

        let err = read_object(&client, &ctx, "b", "ghost").await.unwrap_err();

        assert!(matches!(err, StorageError::ObjectNotFound { ref key, .. } if key == "ghost"));
    }

    #[tokio::test]
    async fn test_list_objects() {
        let client = MockClient::new()
            .with_page_size(3)
            .with_object("b", "a.txt", b"1")
            .with_object("b", "logs/1", b"2")
            .with_object("b", "logs/2", b"3")
            .with_object("b", "logs/3", b"4")
            .with_object("b", "z.txt", b"5");
        let ctx = RequestContext::background();

        let keys = list_objects(&client, &ctx, "b").await.unwrap();
        assert_eq!(keys, vec!["a.txt", "logs/1", "logs/2", "logs/3", "z.txt"]);
        assert_eq!(client.calls("list_objects"), 2);

        let keys = list_objects_with_prefix(&client, &ctx, "b", "logs/")
            .await
            .unwrap();
        assert_eq!(keys, vec!["logs/1", "logs/2", "logs/3"]);
    }

    #[tokio::test]
    async fn test_list_objects_exact_page_multiple() {
        let client = MockClient::new()
            .with_page_size(2)
            .with_object("b", "1", b"")
            .with_object("b", "2", b"")
            .with_object("b", "3", b"")
            .with_object("b", "4", b"");
        let ctx = RequestContext::background();

        let keys = list_objects(&client, &ctx, "b").await.unwrap();

        assert_eq!(keys, vec!["1", "2", "3", "4"]);
        assert_eq!(client.calls("list_objects"), 2);
    }

    #[tokio::test]
    async fn test_list_objects_empty_bucket() {
        let client = MockClient::new().with_bucket(PROJECT, "b");
        let ctx = RequestContext::background();

        let keys = list_objects(&client, &ctx, "b").await.unwrap();

        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_list_objects_error_propagates() {
        let client = MockClient::new().with_object("b", "k", b"v");
        client.fail_on("list_objects", "503 unavailable");
        let ctx = RequestContext::background();

        let res = list_objects(&client, &ctx, "b").await;

        assert!(matches!(res, Err(StorageError::Backend { operation: "list_objects", .. })));
        assert_eq!(client.calls("list_objects"), 1);
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let client = MockClient::new();
        let ctx = RequestContext::with_timeout(Duration::from_secs(30));
        ctx.cancel();

        let err = create_bucket(&client, &ctx, PROJECT, "b", &BucketAttrs::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Cancelled { operation: "get_bucket" }));
        assert!(!client.has_bucket("b"));
    }
}
