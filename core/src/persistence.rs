//! Saved projects: a flat storage encoding over a pluggable document store.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use slidesmith_common::{Meta, PresentationDocument, Slide};
use tokio::sync::Mutex;

use crate::auth::{AuthState, User};
use crate::error::PersistenceError;

pub const PROJECTS_COLLECTION: &str = "projects";
const OWNER_FIELD: &str = "userId";

/// A slide as stored: body items as a JSON string and every optional text
/// field as a plain string, empty when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSlide {
    #[serde(rename = "type", default)]
    pub slide_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub layout_guide: String,
    #[serde(default)]
    pub visual_prompt: String,
    #[serde(default)]
    pub visual_type: String,
    #[serde(default)]
    pub visual_caption: String,
    #[serde(default)]
    pub speaker_script: String,
    #[serde(default)]
    pub speaker_tone: String,
    #[serde(rename = "imgData", default)]
    pub img_data: String,
}

impl StoredSlide {
    pub fn encode(slide: &Slide) -> Result<Self, serde_json::Error> {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Ok(Self {
            slide_type: slide.slide_type.as_str().to_string(),
            title: slide.title.clone(),
            content: serde_json::to_string(&slide.content)?,
            layout_guide: text(&slide.layout_guide),
            visual_prompt: text(&slide.visual_prompt),
            visual_type: slide.visual_type.as_str().to_string(),
            visual_caption: text(&slide.visual_caption),
            speaker_script: text(&slide.speaker_script),
            speaker_tone: text(&slide.speaker_tone),
            img_data: text(&slide.img_data),
        })
    }

    pub fn decode(self) -> Result<Slide, serde_json::Error> {
        let content: Value = if self.content.trim().is_empty() {
            Value::Array(Vec::new())
        } else {
            serde_json::from_str(&self.content)?
        };
        serde_json::from_value(json!({
            "type": self.slide_type,
            "title": self.title,
            "content": content,
            "layout_guide": self.layout_guide,
            "visual_prompt": self.visual_prompt,
            "visual_type": self.visual_type,
            "visual_caption": self.visual_caption,
            "speaker_script": self.speaker_script,
            "speaker_tone": self.speaker_tone,
            "imgData": self.img_data,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProject {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub slides: Vec<StoredSlide>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub topic: String,
}

impl StoredProject {
    pub fn encode(
        doc: &PresentationDocument,
        user_id: &str,
        topic: String,
        created_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            meta: doc.meta.clone(),
            slides: doc
                .slides
                .iter()
                .map(StoredSlide::encode)
                .collect::<Result<_, _>>()?,
            user_id: user_id.to_string(),
            created_at,
            topic,
        })
    }

    pub fn decode(self) -> Result<PresentationDocument, serde_json::Error> {
        Ok(PresentationDocument {
            meta: self.meta,
            slides: self
                .slides
                .into_iter()
                .map(StoredSlide::decode)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Project label: the chosen name, else the deck title, else the topic the
/// deck was generated from.
pub fn project_topic(name: Option<&str>, doc: &PresentationDocument, topic: Option<&str>) -> String {
    [name, Some(doc.meta.title.as_str()), topic]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("Untitled")
        .to_string()
}

/// Schemaless document storage keyed by generated ids.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(&self, collection: &str, doc: Value) -> Result<String, PersistenceError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, PersistenceError>;

    /// Documents whose `userId` equals `owner`, in no particular order.
    async fn query_by_owner(
        &self,
        collection: &str,
        owner: &str,
    ) -> Result<Vec<(String, Value)>, PersistenceError>;

    /// Returns false when nothing was stored under `id`.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, PersistenceError>;
}

fn owned_by(doc: &Value, owner: &str) -> bool {
    doc.get(OWNER_FIELD).and_then(Value::as_str) == Some(owner)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, collection: &str, doc: Value) -> Result<String, PersistenceError> {
        let id = new_id();
        self.collections
            .lock()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), doc);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, PersistenceError> {
        let collections = self.collections.lock().await;
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn query_by_owner(
        &self,
        collection: &str,
        owner: &str,
    ) -> Result<Vec<(String, Value)>, PersistenceError> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, doc)| owned_by(doc, owner))
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, PersistenceError> {
        let mut collections = self.collections.lock().await;
        Ok(collections
            .get_mut(collection)
            .is_some_and(|c| c.remove(id).is_some()))
    }
}

/// One JSON file per document under `root/<collection>/<id>.json`.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root: PathBuf,
}

impl FileDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn document_path(&self, collection: &str, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        valid.then(|| self.collection_dir(collection).join(format!("{id}.json")))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn create(&self, collection: &str, doc: Value) -> Result<String, PersistenceError> {
        let dir = self.collection_dir(collection);
        tokio::fs::create_dir_all(&dir).await?;

        let id = new_id();
        let path = dir.join(format!("{id}.json"));
        let staging = dir.join(format!(".{id}.json.tmp"));
        tokio::fs::write(&staging, serde_json::to_vec_pretty(&doc)?).await?;
        tokio::fs::rename(&staging, &path).await?;
        tracing::debug!("stored {}", path.display());
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, PersistenceError> {
        let Some(path) = self.document_path(collection, id) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| PersistenceError::Corrupt {
                    id: id.to_string(),
                    reason: e.to_string(),
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn query_by_owner(
        &self,
        collection: &str,
        owner: &str,
    ) -> Result<Vec<(String, Value)>, PersistenceError> {
        let dir = self.collection_dir(collection);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if id.starts_with('.') {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(doc) if owned_by(&doc, owner) => found.push((id, doc)),
                Ok(_) => {}
                Err(e) => tracing::warn!("skipping unreadable document {}: {e}", path.display()),
            }
        }
        Ok(found)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, PersistenceError> {
        let Some(path) = self.document_path(collection, id) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Listing entry for a saved project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub topic: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub slide_count: usize,
}

/// Save, list, load and delete projects owned by the signed-in user.
#[derive(Clone)]
pub struct ProjectGateway {
    store: Arc<dyn DocumentStore>,
    auth: AuthState,
}

impl ProjectGateway {
    pub fn new(store: Arc<dyn DocumentStore>, auth: AuthState) -> Self {
        Self { store, auth }
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    fn require_user(&self) -> Result<User, PersistenceError> {
        self.auth.current().ok_or(PersistenceError::NotSignedIn)
    }

    pub async fn save(
        &self,
        doc: &PresentationDocument,
        name: Option<&str>,
        topic: Option<&str>,
    ) -> Result<String, PersistenceError> {
        self.save_at(doc, name, topic, Utc::now()).await
    }

    pub async fn save_at(
        &self,
        doc: &PresentationDocument,
        name: Option<&str>,
        topic: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<String, PersistenceError> {
        let user = self.require_user()?;
        let label = project_topic(name, doc, topic);
        let stored = StoredProject::encode(doc, &user.uid, label, created_at)?;
        let id = self
            .store
            .create(PROJECTS_COLLECTION, serde_json::to_value(&stored)?)
            .await?;
        tracing::info!(%id, topic = %stored.topic, "project saved");
        Ok(id)
    }

    /// The user's projects, newest first. Unreadable entries are skipped.
    pub async fn list(&self) -> Result<Vec<ProjectSummary>, PersistenceError> {
        let user = self.require_user()?;
        let docs = self.store.query_by_owner(PROJECTS_COLLECTION, &user.uid).await?;

        let mut projects: Vec<ProjectSummary> = docs
            .into_iter()
            .filter_map(|(id, value)| match serde_json::from_value::<StoredProject>(value) {
                Ok(p) => Some(ProjectSummary {
                    id,
                    title: p.meta.title,
                    slide_count: p.slides.len(),
                    topic: p.topic,
                    created_at: p.created_at,
                }),
                Err(e) => {
                    tracing::warn!(%id, "skipping corrupt project: {e}");
                    None
                }
            })
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn fetch_owned(&self, id: &str) -> Result<StoredProject, PersistenceError> {
        let user = self.require_user()?;
        let value = self
            .store
            .get(PROJECTS_COLLECTION, id)
            .await?
            .ok_or_else(|| PersistenceError::NotFound { id: id.to_string() })?;
        if !owned_by(&value, &user.uid) {
            return Err(PersistenceError::Forbidden { id: id.to_string() });
        }
        serde_json::from_value(value).map_err(|e| PersistenceError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn load(&self, id: &str) -> Result<PresentationDocument, PersistenceError> {
        self.fetch_owned(id)
            .await?
            .decode()
            .map_err(|e| PersistenceError::Corrupt {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    pub async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.fetch_owned(id).await?;
        if !self.store.delete(PROJECTS_COLLECTION, id).await? {
            return Err(PersistenceError::NotFound { id: id.to_string() });
        }
        tracing::info!(%id, "project deleted");
        Ok(())
    }
}
