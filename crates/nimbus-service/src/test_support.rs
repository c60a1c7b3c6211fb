//! Shared fixtures for engine tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::events::{EventType, RealtimeEvent};
use nimbus_core::result::AppResult;
use nimbus_core::traits::{ByteStream, EventPublisher};
use nimbus_database::memory::MemoryDatabase;
use nimbus_database::{Database, FileRepository};
use nimbus_entity::file::{ContentUpdate, File, FilePatch, NewFile};
use nimbus_entity::storage::MimeUsage;
use nimbus_storage::MemoryBlobStore;

use nimbus_auth::PasswordHasher;
use nimbus_core::config::{AuthConfig, SharingConfig};

use crate::context::RequestContext;
use crate::file::FileEngine;
use crate::share::ShareEngine;

/// Captures published events.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<RealtimeEvent>>,
}

impl RecordingPublisher {
    pub fn types(&self) -> Vec<EventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type)
            .collect()
    }

    pub fn last(&self) -> RealtimeEvent {
        self.events.lock().unwrap().last().cloned().unwrap()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: RealtimeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// File repository whose inserts always fail.
#[derive(Debug)]
pub struct FailingInserts(pub MemoryDatabase);

#[async_trait]
impl FileRepository for FailingInserts {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<File>> {
        FileRepository::find_by_id(&self.0, id).await
    }
    async fn list_children(&self, owner_id: Uuid, parent_id: Option<Uuid>) -> AppResult<Vec<File>> {
        self.0.list_children(owner_id, parent_id).await
    }
    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<File>> {
        self.0.list_trashed(owner_id).await
    }
    async fn list_starred(&self, owner_id: Uuid) -> AppResult<Vec<File>> {
        self.0.list_starred(owner_id).await
    }
    async fn search(&self, owner_id: Uuid, query: &str, limit: i64) -> AppResult<Vec<File>> {
        self.0.search(owner_id, query, limit).await
    }
    async fn list_subtree(&self, id: Uuid) -> AppResult<Vec<File>> {
        self.0.list_subtree(id).await
    }
    async fn create(&self, _data: &NewFile) -> AppResult<File> {
        Err(AppError::database("insert rejected"))
    }
    async fn update_metadata(&self, id: Uuid, patch: &FilePatch) -> AppResult<File> {
        self.0.update_metadata(id, patch).await
    }
    async fn replace_content(&self, id: Uuid, content: &ContentUpdate) -> AppResult<File> {
        self.0.replace_content(id, content).await
    }
    async fn set_trashed(&self, id: Uuid, trashed: bool) -> AppResult<File> {
        self.0.set_trashed(id, trashed).await
    }
    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        FileRepository::delete(&self.0, id).await
    }
    async fn usage_by_mime_type(&self, owner_id: Uuid) -> AppResult<(i64, Vec<MimeUsage>)> {
        self.0.usage_by_mime_type(owner_id).await
    }
}

pub struct Harness {
    pub db: Database,
    pub blobs: MemoryBlobStore,
    pub events: Arc<RecordingPublisher>,
    pub engine: FileEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_db(Database::memory())
    }

    pub fn with_db(db: Database) -> Self {
        let blobs = MemoryBlobStore::new();
        let events = Arc::new(RecordingPublisher::default());
        let engine = FileEngine::new(&db, Arc::new(blobs.clone()), events.clone());
        Self {
            db,
            blobs,
            events,
            engine,
        }
    }

    /// A user with the given quota limit.
    pub async fn user(&self, quota_limit: i64) -> RequestContext {
        let id = Uuid::new_v4();
        self.db.users.ensure(id, "tester", quota_limit).await.unwrap();
        RequestContext::new(id, "tester")
    }

    pub async fn upload(&self, ctx: &RequestContext, parent: Option<Uuid>, name: &str, data: &[u8]) -> File {
        self.engine
            .upload_file(ctx, parent, name, data.len() as u64, body(data))
            .await
            .unwrap()
    }
}

/// A file engine harness plus a sharing engine over the same stores, with
/// one file owned by `owner` and a second user `other`.
pub struct ShareHarness {
    pub files: Harness,
    pub engine: ShareEngine,
    pub events: Arc<RecordingPublisher>,
    pub owner: RequestContext,
    pub other: RequestContext,
    pub file: File,
}

pub const SHARED_CONTENT: &[u8] = b"shared content";

impl ShareHarness {
    pub async fn new() -> Self {
        let files = Harness::new();
        let owner = files.user(0).await;
        let other = files.user(0).await;
        let file = files.upload(&owner, None, "shared.txt", SHARED_CONTENT).await;

        let hasher = PasswordHasher::new(&AuthConfig {
            bcrypt_cost: 4,
            ..AuthConfig::default()
        })
        .unwrap();
        let engine = ShareEngine::new(
            &files.db,
            Arc::new(files.blobs.clone()),
            Arc::new(hasher),
            files.events.clone(),
            SharingConfig::default(),
        );

        Self {
            events: files.events.clone(),
            files,
            engine,
            owner,
            other,
            file,
        }
    }
}

pub fn body(data: &[u8]) -> ByteStream {
    let data = Bytes::copy_from_slice(data);
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

pub async fn collect(stream: ByteStream) -> Vec<u8> {
    let chunks: Vec<_> = stream.collect().await;
    chunks
        .into_iter()
        .flat_map(|c| c.unwrap().to_vec())
        .collect()
}
