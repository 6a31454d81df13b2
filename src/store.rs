use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// A bucket plus key prefix, written as `s3://bucket/prefix/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    /// Empty, or ends with `/`.
    pub prefix: String,
}

impl ObjectLocation {
    /// Accepts `bucket`, `bucket/prefix`, `s3://bucket/`, `s3://bucket/prefix/`.
    pub fn parse(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        let path = trimmed.strip_prefix("s3://").unwrap_or(trimmed);
        let path = path.trim_matches('/');

        let (bucket, prefix) = match path.split_once('/') {
            Some((bucket, rest)) => (bucket, rest.trim_matches('/')),
            None => (path, ""),
        };

        if bucket.is_empty() {
            return Err(Error::Config(format!("invalid bucket name {:?}", name)));
        }

        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        };

        Ok(Self {
            bucket: bucket.to_string(),
            prefix,
        })
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.prefix)
    }
}

/// Minimal object storage surface the job needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every key under `location`, recursively, in lexicographic order.
    async fn list(&self, location: &ObjectLocation) -> Result<Vec<String>>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()>;
}

/// Object store held in process memory. Buckets must be created before use,
/// mirroring S3's `NoSuchBucket` behaviour.
#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        self.buckets.lock().entry(bucket.to_string()).or_default();
        self
    }

    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.buckets
            .lock()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.into());
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .lock()
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, location: &ObjectLocation) -> Result<Vec<String>> {
        let buckets = self.buckets.lock();
        let objects = buckets
            .get(&location.bucket)
            .ok_or_else(|| Error::SourceNotFound {
                location: location.to_string(),
                reason: "no such bucket".to_string(),
            })?;

        Ok(objects
            .keys()
            .filter(|k| k.starts_with(&location.prefix))
            .cloned()
            .collect())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.object(bucket, key).ok_or_else(|| Error::SourceRead {
            key: key.to_string(),
            reason: "no such key".to_string(),
        })
    }

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let mut buckets = self.buckets.lock();
        let objects = buckets.get_mut(bucket).ok_or_else(|| Error::TargetWrite {
            key: key.to_string(),
            reason: "no such bucket".to_string(),
        })?;
        objects.insert(key.to_string(), data);
        Ok(())
    }
}
