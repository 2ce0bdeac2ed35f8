use image::DynamicImage;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::cache::MemoryCache;
use super::config::Config;
use super::error::{FetchError, ResolveError};
use super::rickmorty::{CharacterRecord, decode_character};
use super::transport::Transport;

pub type CharacterImage = Arc<DynamicImage>;

/// Cache-first lookup of character records and their portraits.
///
/// Every reference resolves independently. Cache hits never touch the network
/// and network fetches are capped by a shared semaphore. Clones share caches
/// and the cap.
#[derive(Clone)]
pub struct CharacterResolver {
    transport: Arc<dyn Transport>,
    records: MemoryCache<CharacterRecord>,
    images: MemoryCache<CharacterImage>,
    fetch_limit: Arc<Semaphore>,
}

impl CharacterResolver {
    pub fn new(
        transport: Arc<dyn Transport>,
        records: MemoryCache<CharacterRecord>,
        images: MemoryCache<CharacterImage>,
        max_concurrent_fetches: usize,
    ) -> Self {
        Self {
            transport,
            records,
            images,
            fetch_limit: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self::new(
            transport,
            MemoryCache::new(config.record_cache_capacity),
            MemoryCache::new(config.image_cache_capacity),
            config.max_concurrent_fetches,
        )
    }

    pub async fn resolve(&self, reference: &str) -> Result<CharacterRecord, ResolveError> {
        if let Some(record) = self.records.get(reference).await {
            log::debug!("character cache hit: {reference}");
            return Ok(record);
        }

        let bytes = self.fetch(reference).await?;
        let record = decode_character(&bytes)?;
        self.records
            .insert(reference.to_string(), record.clone())
            .await;
        Ok(record)
    }

    pub async fn resolve_image(&self, image_ref: &str) -> Result<CharacterImage, ResolveError> {
        if let Some(image) = self.images.get(image_ref).await {
            log::debug!("image cache hit: {image_ref}");
            return Ok(image);
        }

        let bytes = self.fetch(image_ref).await?;
        let image = Arc::new(decode_image(bytes)?);
        self.images
            .insert(image_ref.to_string(), Arc::clone(&image))
            .await;
        Ok(image)
    }

    pub fn records(&self) -> &MemoryCache<CharacterRecord> {
        &self.records
    }

    pub fn images(&self) -> &MemoryCache<CharacterImage> {
        &self.images
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let _permit = self
            .fetch_limit
            .acquire()
            .await
            .map_err(|_| FetchError::Transport("fetch limiter closed".to_string()))?;

        log::debug!("cache miss, fetching {url}");
        self.transport.get_bytes(url).await.inspect_err(|e| {
            log::warn!("fetch of {url} failed: {e}");
        })
    }
}

fn decode_image(bytes: Vec<u8>) -> Result<DynamicImage, ResolveError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ResolveError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| ResolveError::Decode(e.to_string()))
}
