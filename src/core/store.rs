/// The Store: the one thing the UI talks to for categories and items
///
/// Owns the database handle, opens it lazily, and checks form input before
/// anything is written.

use crate::config::StoreConfig;
use crate::db::{Blob, Category, Database, DatabaseStats, Item, NewCategory, NewItem};
use crate::error::{Result, SoundboardError};
use std::sync::OnceLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

static SHARED_STORE: OnceLock<Store> = OnceLock::new();

pub struct Store {
    config: StoreConfig,
    db: Mutex<Option<Database>>,
}

impl Store {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            db: Mutex::new(None),
        }
    }

    /// Process-wide store at the default location
    ///
    /// The database itself is still opened lazily on first use.
    pub fn shared() -> &'static Store {
        SHARED_STORE.get_or_init(|| Store::new(StoreConfig::default()))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open the database, creating the schema on first ever use.
    ///
    /// Safe to call any number of times. Concurrent first callers queue on
    /// the same slot and share one handle; a failed or closed handle is
    /// replaced on the next call.
    pub async fn open(&self) -> Result<Database> {
        let mut slot = self.db.lock().await;
        if let Some(db) = slot.as_ref() {
            if !db.is_closed() {
                return Ok(db.clone());
            }
        }

        info!(location = ?self.config.location, "opening store");
        let db = Database::open(&self.config).await?;
        *slot = Some(db.clone());
        Ok(db)
    }

    pub async fn is_open(&self) -> bool {
        self.db
            .lock()
            .await
            .as_ref()
            .is_some_and(|db| !db.is_closed())
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.open().await?.list_categories().await
    }

    pub async fn get_category(&self, id: i64) -> Result<Option<Category>> {
        self.open().await?.get_category_by_id(id).await
    }

    /// Validate and persist a category, returning its id
    pub async fn add_category(&self, input: NewCategory) -> Result<i64> {
        let name = validate_name(&input.name)?;
        let picture = require_blob(input.picture.as_ref(), "picture")?;

        let id = self.open().await?.insert_category(name, picture).await?;
        info!(id, "category added");
        Ok(id)
    }

    /// Remove a category. Missing ids are ignored.
    ///
    /// Items filed under it stay where they are.
    pub async fn delete_category(&self, id: i64) -> Result<()> {
        let removed = self.open().await?.delete_category(id).await?;
        if removed {
            info!(id, "category deleted");
        } else {
            debug!(id, "delete of unknown category ignored");
        }
        Ok(())
    }

    pub async fn list_items_by_category(&self, category_id: i64) -> Result<Vec<Item>> {
        self.open().await?.list_items_by_category(category_id).await
    }

    pub async fn get_item(&self, id: i64) -> Result<Option<Item>> {
        self.open().await?.get_item_by_id(id).await
    }

    /// Validate and persist an item, returning its id
    ///
    /// The category id only has to be present. Whether it names a live
    /// category is not checked.
    pub async fn add_item(&self, input: NewItem) -> Result<i64> {
        let category_id = input
            .category_id
            .ok_or_else(|| SoundboardError::Validation("category is required".to_string()))?;
        let name = validate_name(&input.name)?;
        let picture = require_blob(input.picture.as_ref(), "picture")?;
        let sound = require_blob(input.sound.as_ref(), "sound")?;

        let id = self
            .open()
            .await?
            .insert_item(category_id, name, picture, sound)
            .await?;
        info!(id, category_id, "item added");
        Ok(id)
    }

    /// Remove an item. Missing ids are ignored.
    pub async fn delete_item(&self, id: i64) -> Result<()> {
        let removed = self.open().await?.delete_item(id).await?;
        if removed {
            info!(id, "item deleted");
        } else {
            debug!(id, "delete of unknown item ignored");
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<DatabaseStats> {
        self.open().await?.stats().await
    }

    /// Close the pool if it was ever opened
    ///
    /// The store stays usable; the next operation opens it again.
    pub async fn close(&self) {
        if let Some(db) = self.db.lock().await.take() {
            db.close().await;
            info!("store closed");
        }
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SoundboardError::Validation("name is required".to_string()));
    }
    Ok(trimmed)
}

fn require_blob<'a>(blob: Option<&'a Blob>, field: &str) -> Result<&'a Blob> {
    match blob {
        Some(blob) if !blob.is_empty() => Ok(blob),
        _ => Err(SoundboardError::Validation(format!("{} is required", field))),
    }
}
