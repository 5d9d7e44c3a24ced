//! Document store: one JSON file, one owner task.
//!
//! `StoreActor` is the only code that touches the file. Every `read` and
//! `write` is a message on its channel, so file I/O is serialized
//! process-wide. A read-modify-write sequence is two separate messages: two
//! callers can read the same state and the later writer wins. `apply` keeps
//! that behavior; it does not hold the actor across the domain operation.

use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{domain::Document, errors::Error, ops::Applied, Result};

const CHANNEL_CAPACITY: usize = 64;

type Respond<T> = oneshot::Sender<Result<T>>;

#[derive(Debug)]
enum StoreRequest {
    Read {
        respond_to: Respond<Document>,
    },
    Write {
        doc: Box<Document>,
        respond_to: Respond<()>,
    },
}

/// Server half: owns the file path and processes requests one at a time.
pub struct StoreActor {
    path: PathBuf,
    receiver: mpsc::Receiver<StoreRequest>,
}

impl StoreActor {
    pub fn new(path: impl Into<PathBuf>, buffer_size: usize) -> (Self, DocumentStore) {
        let path = path.into();
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            path: path.clone(),
            receiver,
        };
        (actor, DocumentStore { sender, path })
    }

    pub async fn run(mut self) {
        info!(path = %self.path.display(), "document store started");

        while let Some(req) = self.receiver.recv().await {
            match req {
                StoreRequest::Read { respond_to } => {
                    let result = load_document(&self.path).await;
                    if let Err(e) = &result {
                        warn!(error = %e, "document read failed");
                    }
                    let _ = respond_to.send(result);
                }
                StoreRequest::Write { doc, respond_to } => {
                    let result = save_document(&self.path, &doc).await;
                    match &result {
                        Ok(()) => debug!(
                            users = doc.users.len(),
                            resources = doc.resources.len(),
                            "document written"
                        ),
                        Err(e) => warn!(error = %e, "document write failed"),
                    }
                    let _ = respond_to.send(result);
                }
            }
        }

        info!("document store stopped");
    }
}

/// Client half: cheap to clone, shared by the HTTP handlers and the bot.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    sender: mpsc::Sender<StoreRequest>,
    path: PathBuf,
}

impl DocumentStore {
    /// Create the file with an empty document if it does not exist yet, then
    /// spawn the owning actor on the current tokio runtime.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            info!(path = %path.display(), "database file not found, creating an empty one");
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| storage_err(&path, e))?;
            }
            save_document(&path, &Document::default()).await?;
        }

        let (actor, store) = StoreActor::new(path, CHANNEL_CAPACITY);
        tokio::spawn(actor.run());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Document> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Read { respond_to })
            .await
            .map_err(|_| actor_gone())?;
        response.await.map_err(|_| actor_gone())?
    }

    pub async fn write(&self, doc: &Document) -> Result<()> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Write {
                doc: Box::new(doc.clone()),
                respond_to,
            })
            .await
            .map_err(|_| actor_gone())?;
        response.await.map_err(|_| actor_gone())?
    }

    /// Read, run `op`, and write the result back when `op` reports a change.
    ///
    /// Returns the operation's value and its event text.
    pub async fn apply<T>(
        &self,
        op: impl FnOnce(Document) -> Result<Applied<T>>,
    ) -> Result<(T, Option<String>)> {
        let doc = self.read().await?;
        let applied = op(doc)?;
        if applied.event.is_some() {
            self.write(&applied.document).await?;
        }
        Ok((applied.value, applied.event))
    }
}

async fn load_document(path: &Path) -> Result<Document> {
    let txt = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| storage_err(path, e))?;
    serde_json::from_str(&txt).map_err(|e| {
        Error::StorageUnavailable(format!("{} is not a valid document: {e}", path.display()))
    })
}

async fn save_document(path: &Path, doc: &Document) -> Result<()> {
    let txt = serde_json::to_string_pretty(doc)?;
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, txt)
        .await
        .map_err(|e| storage_err(path, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| storage_err(path, e))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "database.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn storage_err(path: &Path, e: std::io::Error) -> Error {
    Error::StorageUnavailable(format!("{}: {e}", path.display()))
}

fn actor_gone() -> Error {
    Error::StorageUnavailable("document store task is not running".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Resource, User};
    use serde_json::json;

    fn sample_document() -> Document {
        let mut doc = Document::default();
        doc.settings.insert("access_code".to_string(), json!("9999"));
        doc.resources.push(Resource {
            id: 1,
            title: "Intro".to_string(),
            fields: serde_json::from_value(json!({ "url": "https://example.com" })).unwrap(),
        });
        doc.users.insert(
            "42".to_string(),
            User {
                username: "neo".to_string(),
                access_code: "123456".to_string(),
                credits: 50,
                is_premium: false,
                is_admin: false,
                last_login: None,
            },
        );
        doc.live_drop_pool.push("4111-0000-0000-0001".to_string());
        doc.stats.insert("logins".to_string(), 3);
        doc
    }

    #[tokio::test]
    async fn open_creates_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("database.json");

        let store = DocumentStore::open(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(store.read().await.unwrap(), Document::default());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("db.json")).await.unwrap();

        let doc = sample_document();
        store.write(&doc).await.unwrap();
        assert_eq!(store.read().await.unwrap(), doc);

        // Pretty-printed on disk, no temp file left behind.
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  \"settings\""));
        assert!(!dir.path().join("db.json.tmp").exists());
    }

    #[tokio::test]
    async fn open_keeps_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, serde_json::to_string(&sample_document()).unwrap()).unwrap();

        let store = DocumentStore::open(&path).await.unwrap();
        assert_eq!(store.read().await.unwrap(), sample_document());
    }

    #[tokio::test]
    async fn offsetless_last_login_does_not_poison_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let raw = json!({
            "users": {
                "1": { "username": "a", "access_code": "111111", "credits": 5,
                       "last_login": "2024-05-01T10:00:00.123456" },
                "2": { "username": "b", "access_code": "222222", "credits": 7,
                       "last_login": null }
            }
        });
        std::fs::write(&path, raw.to_string()).unwrap();

        let store = DocumentStore::open(&path).await.unwrap();
        let doc = store.read().await.unwrap();
        assert!(doc.users["1"].last_login.is_some());
        assert_eq!(doc.users["2"].last_login, None);

        store.write(&doc).await.unwrap();
        assert_eq!(store.read().await.unwrap(), doc);
    }

    #[tokio::test]
    async fn corrupt_or_missing_file_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let store = DocumentStore::open(&path).await.unwrap();

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            store.read().await,
            Err(Error::StorageUnavailable(_))
        ));

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            store.read().await,
            Err(Error::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let store = DocumentStore::open(&path).await.unwrap();
        drop(dir);

        assert!(matches!(
            store.write(&Document::default()).await,
            Err(Error::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_writes_leave_one_well_formed_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("db.json")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut doc = Document::default();
                doc.stats.insert("writer".to_string(), i);
                store.write(&doc).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let doc = store.read().await.unwrap();
        assert!(doc.stat("writer") < 16);
    }

    #[tokio::test]
    async fn apply_skips_write_when_nothing_changed() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("db.json")).await.unwrap();

        let (value, event) = store
            .apply(|doc| {
                Ok(Applied {
                    document: doc,
                    value: 7,
                    event: None,
                })
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert!(event.is_none());

        let (_, event) = store
            .apply(|mut doc| {
                doc.bump_stat("hits");
                Ok(Applied {
                    document: doc,
                    value: (),
                    event: Some("hit".to_string()),
                })
            })
            .await
            .unwrap();
        assert_eq!(event.as_deref(), Some("hit"));
        assert_eq!(store.read().await.unwrap().stat("hits"), 1);
    }

    #[tokio::test]
    async fn interleaved_read_modify_write_is_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("db.json")).await.unwrap();

        let mut first = store.read().await.unwrap();
        let mut second = store.read().await.unwrap();
        first.bump_stat("a");
        second.bump_stat("b");
        store.write(&first).await.unwrap();
        store.write(&second).await.unwrap();

        let doc = store.read().await.unwrap();
        assert_eq!(doc.stat("a"), 0);
        assert_eq!(doc.stat("b"), 1);
    }
}
