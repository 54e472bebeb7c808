//! Durable seen-slot persistence.
//!
//! The whole set lives in a single JSON object that is always read in
//! full and written back in full. Writes carry a version precondition
//! (ETag or equivalent) so two overlapping runs cannot silently drop each
//! other's keys: a conflicting write fails the precondition and the merge
//! reloads and retries, bounded by a small attempt count.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{S3Config, StoreConfig};
use crate::slot::{slot_key, CandidateSlot, SeenSlotRecord, SeenSlotSet};

/// Give up merging after this many version conflicts in a row.
const MERGE_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version precondition failed")]
    PreconditionFailed,

    #[error("merge contention: gave up after {0} attempts")]
    Contention(usize),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Version token for optimistic concurrency (S3 ETag or equivalent).
pub type Version = String;

/// Expected state of the persisted object when writing.
#[derive(Debug, Clone)]
pub enum Precondition {
    /// The object must not exist yet.
    Absent,
    /// The object must still carry this version.
    Matches(Version),
}

/// Object-store boundary: one whole-object get and one conditional
/// whole-object put. No partial updates exist by design.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the object; `Ok(None)` when it does not exist.
    async fn get(&self) -> Result<Option<(Vec<u8>, Version)>, StoreError>;

    /// Write the object, failing with `PreconditionFailed` on a version
    /// conflict.
    async fn put(&self, bytes: Vec<u8>, expected: Precondition) -> Result<(), StoreError>;
}

/// Build the configured object-store backend.
pub async fn from_config(config: &StoreConfig) -> Result<Box<dyn ObjectStore>> {
    match config {
        StoreConfig::S3(s3) => Ok(Box::new(S3ObjectStore::connect(s3).await)),
        StoreConfig::Local { path } => {
            let path = match path {
                Some(path) => path.clone(),
                None => crate::config::default_local_store_path()?,
            };
            Ok(Box::new(FileObjectStore::new(path)))
        }
    }
}

// =============================================================================
// Merge
// =============================================================================

/// Idempotent accumulator over the persisted seen-slot set. Exclusively
/// owns the read-modify-write cycle; nothing else mutates the object.
pub struct SlotStore {
    store: Box<dyn ObjectStore>,
}

impl SlotStore {
    pub fn new(store: Box<dyn ObjectStore>) -> Self {
        SlotStore { store }
    }

    /// Load the persisted set for inspection.
    ///
    /// A missing object and a transient load error both degrade to an
    /// empty baseline, so a first-ever run and a flaky read behave
    /// identically.
    pub async fn load(&self) -> SeenSlotSet {
        self.load_versioned().await.0
    }

    async fn load_versioned(&self) -> (SeenSlotSet, Option<Version>) {
        match self.store.get().await {
            Ok(Some((bytes, version))) => match serde_json::from_slice(&bytes) {
                Ok(set) => (set, Some(version)),
                Err(err) => {
                    warn!("discarding unreadable seen-slot set: {err}");
                    (SeenSlotSet::default(), Some(version))
                }
            },
            Ok(None) => (SeenSlotSet::default(), None),
            Err(err) => {
                warn!("seen-slot load failed, starting from an empty set: {err}");
                (SeenSlotSet::default(), None)
            }
        }
    }

    /// Merge observed candidates into the persisted set and return only
    /// the ones that were not seen before, in input order.
    ///
    /// Monotone set union: a given key appears in the newly-added result
    /// of at most one successful call. Persist failures are fatal for the
    /// run; a dropped write would desynchronize every future dedup
    /// decision.
    pub async fn merge(
        &self,
        candidates: &[CandidateSlot],
    ) -> Result<Vec<CandidateSlot>, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let (mut set, version) = self.load_versioned().await;
            let found_at = Utc::now().to_rfc3339();

            let mut newly_added = Vec::new();
            for candidate in candidates {
                let key = slot_key(candidate);
                if set.contains(&key) {
                    continue;
                }
                set.slots.insert(
                    key,
                    SeenSlotRecord {
                        slot: candidate.clone(),
                        found_at: found_at.clone(),
                    },
                );
                newly_added.push(candidate.clone());
            }

            let bytes = serde_json::to_vec(&set)?;
            let expected = match version {
                Some(version) => Precondition::Matches(version),
                None => Precondition::Absent,
            };

            match self.store.put(bytes, expected).await {
                Ok(()) => {
                    debug!(
                        total = set.len(),
                        new = newly_added.len(),
                        "persisted seen-slot set"
                    );
                    return Ok(newly_added);
                }
                Err(StoreError::PreconditionFailed) if attempt < MERGE_ATTEMPTS => {
                    warn!(attempt, "seen-slot set changed underneath us, retrying merge");
                }
                Err(StoreError::PreconditionFailed) => {
                    return Err(StoreError::Contention(MERGE_ATTEMPTS));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// =============================================================================
// S3 backend
// =============================================================================

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    key: String,
}

impl S3ObjectStore {
    /// Connect using the SDK's default credential chain; region and
    /// optional custom endpoint come from config.
    pub async fn connect(config: &S3Config) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        S3ObjectStore {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            key: config.object_key.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self) -> Result<Option<(Vec<u8>, Version)>, StoreError> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) if is_no_such_key(&err) => return Ok(None),
            Err(err) => return Err(StoreError::Backend(err.to_string())),
        };

        let version = resp.e_tag().unwrap_or_default().to_string();
        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(Some((bytes, version)))
    }

    async fn put(&self, bytes: Vec<u8>, expected: Precondition) -> Result<(), StoreError> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type("application/json")
            .body(ByteStream::from(bytes));

        req = match expected {
            Precondition::Absent => req.if_none_match("*"),
            Precondition::Matches(version) => req.if_match(version),
        };

        match req.send().await {
            Ok(_) => Ok(()),
            Err(err) if is_precondition_failure(&err) => Err(StoreError::PreconditionFailed),
            Err(err) => Err(StoreError::Backend(err.to_string())),
        }
    }
}

fn is_no_such_key(err: &SdkError<GetObjectError>) -> bool {
    matches!(err, SdkError::ServiceError(service) if service.err().is_no_such_key())
}

/// S3 reports conditional-write conflicts as 412 (failed If-Match /
/// If-None-Match) or 409 (concurrent conditional writes).
fn is_precondition_failure<E>(err: &SdkError<E>) -> bool {
    match err {
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            status == 412 || status == 409
        }
        _ => false,
    }
}

// =============================================================================
// Local file backend
// =============================================================================

/// Object store backed by a single local JSON file, for running without
/// S3. The version token is a hash of the file contents.
pub struct FileObjectStore {
    path: PathBuf,
}

impl FileObjectStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileObjectStore { path: path.into() }
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn get(&self) -> Result<Option<(Vec<u8>, Version)>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let version = content_version(&bytes);
                Ok(Some((bytes, version)))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Backend(err.to_string())),
        }
    }

    async fn put(&self, bytes: Vec<u8>, expected: Precondition) -> Result<(), StoreError> {
        let current = match tokio::fs::read(&self.path).await {
            Ok(bytes) => Some(content_version(&bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(StoreError::Backend(err.to_string())),
        };

        match (&expected, current) {
            (Precondition::Absent, None) => {}
            (Precondition::Matches(version), Some(current)) if *version == current => {}
            _ => return Err(StoreError::PreconditionFailed),
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| StoreError::Backend(err.to_string()))?;
        }

        // Temp file + rename so readers never see a torn write.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        Ok(())
    }
}

fn content_version(bytes: &[u8]) -> Version {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

// =============================================================================
// Tests
// =============================================================================
