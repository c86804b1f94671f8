pub mod adapters;
pub mod model;
pub mod storage;
pub mod util;

pub use adapters::ObjectStore;
pub use model::{
    error::StorageError,
    object::{BucketAttrs, Page},
};
pub use storage::{
    create_bucket, create_client, delete_bucket, list_buckets, list_objects,
    list_objects_with_prefix, read_object, upload_local_file,
};
pub use util::{
    context::RequestContext,
    object::{parse_bucket_from_uri, parse_provider_from_uri, Provider},
};
