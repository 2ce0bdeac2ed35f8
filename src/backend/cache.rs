use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory cache keyed by reference URL, evicting the least recently used
/// entry once `capacity` is reached. Clones share the same storage.
#[derive(Clone)]
pub struct MemoryCache<V> {
    inner: Arc<RwLock<MemoryCacheInner<V>>>,
}

struct MemoryCacheInner<V> {
    entries: HashMap<String, V>,
    access_order: Vec<String>,
    capacity: usize,
}

impl<V: Clone> MemoryCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryCacheInner {
                entries: HashMap::new(),
                access_order: Vec::new(),
                capacity: capacity.max(1),
            })),
        }
    }

    /// `None` means a fetch is required.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.write().await;

        let value = inner.entries.get(key).cloned()?;
        inner.touch(key);
        Some(value)
    }

    pub async fn insert(&self, key: String, value: V) {
        let mut inner = self.inner.write().await;
        inner.insert(key, value);
    }

    pub async fn contains(&self, key: &str) -> bool {
        let inner = self.inner.read().await;
        inner.entries.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        let inner = self.inner.read().await;
        inner.entries.len()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.access_order.clear();
    }
}

impl<V> MemoryCacheInner<V> {
    fn touch(&mut self, key: &str) {
        self.access_order.retain(|k| k != key);
        self.access_order.push(key.to_string());
    }

    fn insert(&mut self, key: String, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self.access_order.first().cloned() {
                log::debug!("evicting {oldest}");
                self.entries.remove(&oldest);
                self.access_order.remove(0);
            }
        }

        self.touch(&key);
        self.entries.insert(key, value);
    }
}
