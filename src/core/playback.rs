/// Playback helper
///
/// Plays a blob once through an audio sink. The playable reference lives
/// exactly as long as the playback, even if the caller gives up midway.

use crate::core::object_url::{ObjectUrl, ObjectUrlTable};
use crate::db::{Blob, Item};
use crate::error::{Result, SoundboardError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Something that can play a referenced blob to completion
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, url: &ObjectUrl, blob: &Blob) -> std::result::Result<(), String>;
}

/// Revokes a reference when dropped
struct UrlLease<'a> {
    urls: &'a ObjectUrlTable,
    url: ObjectUrl,
}

impl Drop for UrlLease<'_> {
    fn drop(&mut self) {
        self.urls.revoke(&self.url);
    }
}

pub struct Player {
    sink: Arc<dyn AudioSink>,
    urls: ObjectUrlTable,
}

impl Player {
    pub fn new(sink: Arc<dyn AudioSink>, urls: ObjectUrlTable) -> Self {
        Self { sink, urls }
    }

    /// Play a blob once and release its reference afterwards
    pub async fn play_once(&self, blob: Blob) -> Result<()> {
        let blob = Arc::new(blob);
        let lease = UrlLease {
            urls: &self.urls,
            url: self.urls.create(Arc::clone(&blob)),
        };

        debug!(url = %lease.url, bytes = blob.len(), "playing");
        self.sink
            .play(&lease.url, &blob)
            .await
            .map_err(SoundboardError::Playback)
    }

    /// Play an item's sound
    pub async fn play_item(&self, item: &Item) -> Result<()> {
        self.play_once(item.sound.clone()).await
    }
}
