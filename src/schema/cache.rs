//! Lazily populated, resettable schema cache.
//!
//! The first caller of [`SchemaCache::get`] populates the cache; concurrent
//! callers wait on the same populate instead of starting their own. Once
//! published, a snapshot is an immutable `Arc<DatabaseSchema>` and readers
//! only take a short read lock to clone it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::debug;

use super::naming::NamingPolicy;
use super::provider::SchemaProvider;
use super::table::{DatabaseSchema, Table};
use crate::error::Result;

pub struct SchemaCache {
    provider: Arc<dyn SchemaProvider>,
    naming: NamingPolicy,
    snapshot: RwLock<Option<Arc<DatabaseSchema>>>,
    /// Serializes populate attempts.
    populate: Mutex<()>,
    /// Bumped by every reset; a populate that started in an older
    /// generation never publishes.
    generation: AtomicU64,
}

impl SchemaCache {
    pub fn new(provider: Arc<dyn SchemaProvider>, naming: NamingPolicy) -> Self {
        Self {
            provider,
            naming,
            snapshot: RwLock::new(None),
            populate: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn naming(&self) -> &NamingPolicy {
        &self.naming
    }

    /// The published snapshot, if any, without touching the provider.
    pub fn cached(&self) -> Option<Arc<DatabaseSchema>> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of resets so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Return the cached schema, populating it first if needed.
    pub async fn get(&self) -> Result<Arc<DatabaseSchema>> {
        if let Some(schema) = self.cached() {
            return Ok(schema);
        }

        let _guard = self.populate.lock().await;

        loop {
            // Someone else may have populated while we waited.
            if let Some(schema) = self.cached() {
                return Ok(schema);
            }

            let generation = self.generation();
            let schema = Arc::new(self.load().await?);

            if self.publish(generation, schema.clone()) {
                return Ok(schema);
            }
            debug!(generation, "schema reset during populate, retrying");
        }
    }

    /// Discard the cached schema; the next [`get`](Self::get) repopulates.
    pub fn reset(&self) {
        let mut slot = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *slot = None;
        debug!(generation, "schema cache reset");
    }

    /// Load a fresh schema and swap it in. On failure the previous snapshot
    /// stays published.
    pub async fn refresh(&self) -> Result<Arc<DatabaseSchema>> {
        let _guard = self.populate.lock().await;
        let generation = self.generation();
        let schema = Arc::new(self.load().await?);
        if !self.publish(generation, schema.clone()) {
            debug!(generation, "schema reset during refresh, result discarded");
        }
        Ok(schema)
    }

    fn publish(&self, generation: u64, schema: Arc<DatabaseSchema>) -> bool {
        let mut slot = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.generation() != generation {
            return false;
        }
        *slot = Some(schema);
        true
    }

    async fn load(&self) -> Result<DatabaseSchema> {
        let infos = self.provider.list_tables().await?;
        let described = self.provider.describe_tables(&infos).await?;
        let foreign_keys = self.provider.list_foreign_keys().await?;

        let tables: Vec<Table> = infos
            .into_iter()
            .zip(described)
            .map(|(info, (columns, primary_key))| Table::new(info, columns, primary_key))
            .collect();

        let schema = DatabaseSchema::new(tables, foreign_keys, self.naming.clone());
        debug!(
            tables = schema.tables().len(),
            foreign_keys = schema.foreign_keys().len(),
            "schema populated"
        );
        Ok(schema)
    }
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("populated", &self.cached().is_some())
            .field("generation", &self.generation())
            .finish()
    }
}
