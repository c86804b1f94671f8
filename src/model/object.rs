/// Attributes passed through to the backend when a bucket is created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketAttrs {
    pub location: Option<String>,
    pub storage_class: Option<String>,
}

/// One page of a bucket or object listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub names: Vec<String>,
    pub next_page_token: Option<String>,
}
