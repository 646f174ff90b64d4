//! Roster store boundary.
//!
//! The [`RosterStore`] trait is the controller's only view of the
//! authoritative roster: a fetch of the current entities and an
//! asynchronous delete. [`InMemoryStore`] backs scenario playback and
//! tests, with failure injection and optional delete latency.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::RosterEntry;
use crate::error::StoreError;
use crate::lifecycle::EntityId;

/// A roster entity as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable unique identifier.
    pub id: EntityId,
    /// Server-owned data.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Entity {
    /// Creates an entity with no data.
    #[must_use]
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            data: serde_json::Value::Null,
        }
    }
}

impl From<&RosterEntry> for Entity {
    fn from(entry: &RosterEntry) -> Self {
        let data = match (&entry.name, &entry.data) {
            (Some(name), serde_json::Value::Null) => serde_json::json!({ "name": name }),
            (Some(name), serde_json::Value::Object(fields)) => {
                let mut fields = fields.clone();
                fields
                    .entry("name")
                    .or_insert_with(|| serde_json::Value::String(name.clone()));
                serde_json::Value::Object(fields)
            }
            (_, data) => data.clone(),
        };
        Self {
            id: entry.id.clone(),
            data,
        }
    }
}

impl From<EntityId> for Entity {
    fn from(id: EntityId) -> Self {
        Self {
            id,
            data: serde_json::Value::Null,
        }
    }
}

/// Authoritative source of the roster.
///
/// `delete` rejections carry a message the controller shows the user
/// verbatim.
#[async_trait::async_trait]
pub trait RosterStore: Send + Sync {
    /// Returns the current entities, in display order.
    async fn current_entities(&self) -> Result<Vec<Entity>, StoreError>;

    /// Deletes the entity with the given ID.
    async fn delete(&self, id: &EntityId) -> Result<(), StoreError>;
}

/// One delete call received by an [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteCall {
    /// Targeted entity.
    pub id: EntityId,
    /// When the call arrived.
    pub at: Instant,
    /// How the call settled.
    pub result: Result<(), StoreError>,
}

#[derive(Debug, Default)]
struct Inner {
    entities: IndexMap<EntityId, Entity>,
    delete_failures: VecDeque<String>,
    fetch_failures: VecDeque<String>,
    deletes: Vec<DeleteCall>,
    fetches: usize,
}

/// In-process roster store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    delete_latency: Duration,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `entities`, in order.
    #[must_use]
    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for entity in entities {
                inner.entities.insert(entity.id.clone(), entity);
            }
        }
        store
    }

    /// Makes every delete call take `latency` before settling.
    #[must_use]
    pub const fn with_delete_latency(mut self, latency: Duration) -> Self {
        self.delete_latency = latency;
        self
    }

    /// Adds an entity, as a successful create call would.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the ID is taken.
    pub fn insert(&self, entity: Entity) -> Result<EntityId, StoreError> {
        let mut inner = self.lock();
        if inner.entities.contains_key(&entity.id) {
            return Err(StoreError::AlreadyExists(entity.id));
        }
        let id = entity.id.clone();
        inner.entities.insert(id.clone(), entity);
        info!(%id, "entity created");
        Ok(id)
    }

    /// Creates an entity, generating an ID when none is given.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the ID is taken.
    pub fn create(&self, id: Option<EntityId>, name: Option<&str>) -> Result<EntityId, StoreError> {
        let id = id.unwrap_or_else(|| EntityId::new(uuid::Uuid::new_v4().to_string()));
        let data = name.map_or(serde_json::Value::Null, |name| {
            serde_json::json!({ "name": name })
        });
        self.insert(Entity { id, data })
    }

    /// Removes an entity without going through a delete call, as another
    /// client would.
    pub fn remove(&self, id: &EntityId) -> bool {
        self.lock().entities.shift_remove(id).is_some()
    }

    /// Rejects the next delete call with `message`. Calls queue up.
    pub fn fail_next_delete(&self, message: impl Into<String>) {
        self.lock().delete_failures.push_back(message.into());
    }

    /// Rejects the next fetch with `message`. Calls queue up.
    pub fn fail_next_fetch(&self, message: impl Into<String>) {
        self.lock().fetch_failures.push_back(message.into());
    }

    /// Returns whether the store holds `id`.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.lock().entities.contains_key(id)
    }

    /// Returns the IDs currently held, in order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.lock().entities.keys().cloned().collect()
    }

    /// Returns every delete call received so far.
    #[must_use]
    pub fn delete_calls(&self) -> Vec<DeleteCall> {
        self.lock().deletes.clone()
    }

    /// Returns how many delete calls targeted `id`.
    #[must_use]
    pub fn delete_count(&self, id: &EntityId) -> usize {
        self.lock().deletes.iter().filter(|c| &c.id == id).count()
    }

    /// Returns how many fetches were served or rejected.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl RosterStore for InMemoryStore {
    async fn current_entities(&self) -> Result<Vec<Entity>, StoreError> {
        let mut inner = self.lock();
        inner.fetches += 1;
        if let Some(message) = inner.fetch_failures.pop_front() {
            debug!(%message, "injected fetch failure");
            return Err(StoreError::FetchFailed(message));
        }
        Ok(inner.entities.values().cloned().collect())
    }

    async fn delete(&self, id: &EntityId) -> Result<(), StoreError> {
        let at = Instant::now();
        if !self.delete_latency.is_zero() {
            tokio::time::sleep(self.delete_latency).await;
        }

        let mut inner = self.lock();
        let result = if let Some(message) = inner.delete_failures.pop_front() {
            debug!(%id, %message, "injected delete failure");
            Err(StoreError::DeleteFailed(message))
        } else if inner.entities.shift_remove(id).is_some() {
            Ok(())
        } else {
            Err(StoreError::NotFound(id.clone()))
        };

        inner.deletes.push(DeleteCall {
            id: id.clone(),
            at,
            result: result.clone(),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    #[tokio::test]
    async fn fetch_preserves_insertion_order() {
        let store = InMemoryStore::with_entities([Entity::new("B"), Entity::new("A")]);
        store.create(Some(id("C")), Some("Cora")).unwrap();

        let entities = store.current_entities().await.unwrap();
        let ids: Vec<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
        assert_eq!(entities[2].data["name"], "Cora");
        assert_eq!(store.fetch_count(), 1);
    }

    #[test]
    fn create_generates_id_and_rejects_duplicates() {
        let store = InMemoryStore::new();
        let generated = store.create(None, None).unwrap();
        assert!(!generated.as_str().is_empty());
        assert_eq!(
            store.create(Some(generated.clone()), None),
            Err(StoreError::AlreadyExists(generated))
        );
    }

    #[tokio::test]
    async fn delete_removes_and_logs() {
        let store = InMemoryStore::with_entities([Entity::new("A")]);
        store.delete(&id("A")).await.unwrap();
        assert!(!store.contains(&id("A")));
        assert_eq!(
            store.delete(&id("A")).await,
            Err(StoreError::NotFound(id("A")))
        );
        assert_eq!(store.delete_count(&id("A")), 2);
    }

    #[tokio::test]
    async fn injected_delete_failure_keeps_entity() {
        let store = InMemoryStore::with_entities([Entity::new("A")]);
        store.fail_next_delete("character is in a guild");

        let err = store.delete(&id("A")).await.unwrap_err();
        assert_eq!(err.to_string(), "character is in a guild");
        assert!(store.contains(&id("A")));

        // Only the next call fails.
        store.delete(&id("A")).await.unwrap();
    }

    #[tokio::test]
    async fn injected_fetch_failure() {
        let store = InMemoryStore::with_entities([Entity::new("A")]);
        store.fail_next_fetch("backend unavailable");
        assert!(matches!(
            store.current_entities().await,
            Err(StoreError::FetchFailed(_))
        ));
        assert_eq!(store.current_entities().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_latency_is_observed() {
        let store = InMemoryStore::with_entities([Entity::new("A")])
            .with_delete_latency(Duration::from_millis(250));
        let start = Instant::now();
        store.delete(&id("A")).await.unwrap();
        assert!(Instant::now() - start >= Duration::from_millis(250));
        assert_eq!(store.delete_calls()[0].at, start);
    }

    #[test]
    fn roster_entry_name_folds_into_data() {
        let entry = RosterEntry {
            id: id("A"),
            name: Some("Aria".into()),
            data: serde_json::json!({ "level": 3 }),
        };
        let entity = Entity::from(&entry);
        assert_eq!(entity.data["name"], "Aria");
        assert_eq!(entity.data["level"], 3);
    }
}
