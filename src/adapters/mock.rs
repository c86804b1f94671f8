use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use futures::future::{self, BoxFuture};

use crate::{
    adapters,
    model::{
        error::StorageError,
        object::{BucketAttrs, Page},
    },
};

pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Default)]
struct MockBucket {
    project_id: String,
    objects: BTreeMap<String, Vec<u8>>,
}

/// In-memory backend. Names list in lexical order, paged by `page_size`.
pub struct MockClient {
    page_size: usize,
    buckets: Mutex<BTreeMap<String, MockBucket>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failures: Mutex<HashMap<&'static str, String>>,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buckets: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_bucket(self, project_id: &str, bucket: &str) -> Self {
        self.lock_buckets().insert(
            bucket.to_string(),
            MockBucket {
                project_id: project_id.to_string(),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_object(self, bucket: &str, key: &str, body: &[u8]) -> Self {
        self.lock_buckets()
            .entry(bucket.to_string())
            .or_default()
            .objects
            .insert(key.to_string(), body.to_vec());
        self
    }

    /// Every later call to `operation` fails with a backend error.
    pub fn fail_on(&self, operation: &'static str, message: &str) {
        self.failures
            .lock()
            .expect("failed to acquire `failures` guard")
            .insert(operation, message.to_string());
    }

    pub fn calls(&self, operation: &'static str) -> usize {
        self.calls
            .lock()
            .expect("failed to acquire `calls` guard")
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.lock_buckets().contains_key(bucket)
    }

    fn lock_buckets(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, MockBucket>> {
        self.buckets
            .lock()
            .expect("failed to acquire `buckets` guard")
    }

    fn record(&self, operation: &'static str, target: &str) -> Result<(), StorageError> {
        *self
            .calls
            .lock()
            .expect("failed to acquire `calls` guard")
            .entry(operation)
            .or_insert(0) += 1;

        match self
            .failures
            .lock()
            .expect("failed to acquire `failures` guard")
            .get(operation)
        {
            Some(message) => Err(StorageError::backend(operation, target, message)),
            None => Ok(()),
        }
    }

    fn page(&self, names: Vec<String>, page_token: Option<String>) -> Result<Page, StorageError> {
        let start = match page_token {
            Some(tok) => tok
                .parse::<usize>()
                .map_err(|_| StorageError::backend("list", &tok, "bad page token"))?,
            None => 0,
        };

        let end = (start + self.page_size).min(names.len());
        let next_page_token = if end < names.len() {
            Some(end.to_string())
        } else {
            None
        };

        Ok(Page {
            names: names.get(start..end).map(<[String]>::to_vec).unwrap_or_default(),
            next_page_token,
        })
    }
}

impl adapters::ObjectStore for MockClient {
    fn get_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        let res = self.record("get_bucket", bucket).and_then(|_| {
            if self.has_bucket(bucket) {
                Ok(())
            } else {
                Err(StorageError::bucket_not_found(bucket))
            }
        });

        Box::pin(future::ready(res))
    }

    fn insert_bucket<'a>(
        &'a self,
        project_id: &'a str,
        bucket: &'a str,
        _attrs: &'a BucketAttrs,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        let res = self.record("insert_bucket", bucket).and_then(|_| {
            let mut buckets = self.lock_buckets();
            if buckets.contains_key(bucket) {
                return Err(StorageError::backend(
                    "insert_bucket",
                    bucket,
                    "409 bucket already exists",
                ));
            }

            buckets.insert(
                bucket.to_string(),
                MockBucket {
                    project_id: project_id.to_string(),
                    ..Default::default()
                },
            );
            Ok(())
        });

        Box::pin(future::ready(res))
    }

    fn remove_bucket<'a>(&'a self, bucket: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        let res = self.record("remove_bucket", bucket).and_then(|_| {
            let mut buckets = self.lock_buckets();
            let is_empty = match buckets.get(bucket) {
                None => return Err(StorageError::bucket_not_found(bucket)),
                Some(b) => b.objects.is_empty(),
            };

            if !is_empty {
                return Err(StorageError::backend(
                    "delete_bucket",
                    bucket,
                    "409 bucket is not empty",
                ));
            }

            buckets.remove(bucket);
            Ok(())
        });

        Box::pin(future::ready(res))
    }

    fn list_buckets_page<'a>(
        &'a self,
        project_id: &'a str,
        page_token: Option<String>,
    ) -> BoxFuture<'a, Result<Page, StorageError>> {
        let res = self.record("list_buckets", project_id).and_then(|_| {
            let names: Vec<String> = self
                .lock_buckets()
                .iter()
                .filter(|(_, b)| b.project_id == project_id)
                .map(|(name, _)| name.clone())
                .collect();
            self.page(names, page_token)
        });

        Box::pin(future::ready(res))
    }

    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        let res = self.record("put_object", key).and_then(|_| {
            match self.lock_buckets().get_mut(bucket) {
                None => Err(StorageError::bucket_not_found(bucket)),
                Some(b) => {
                    b.objects.insert(key.to_string(), body);
                    Ok(())
                }
            }
        });

        Box::pin(future::ready(res))
    }

    fn get_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, StorageError>> {
        let res = self.record("get_object", key).and_then(|_| {
            match self.lock_buckets().get(bucket) {
                None => Err(StorageError::bucket_not_found(bucket)),
                Some(b) => b
                    .objects
                    .get(key)
                    .cloned()
                    .ok_or_else(|| StorageError::object_not_found(bucket, key)),
            }
        });

        Box::pin(future::ready(res))
    }

    fn list_objects_page<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
        page_token: Option<String>,
    ) -> BoxFuture<'a, Result<Page, StorageError>> {
        let res = self.record("list_objects", bucket).and_then(|_| {
            let names: Vec<String> = match self.lock_buckets().get(bucket) {
                None => return Err(StorageError::bucket_not_found(bucket)),
                Some(b) => b
                    .objects
                    .keys()
                    .filter(|key| key.starts_with(prefix))
                    .cloned()
                    .collect(),
            };
            self.page(names, page_token)
        });

        Box::pin(future::ready(res))
    }
}
