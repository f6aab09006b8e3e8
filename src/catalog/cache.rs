use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;
use tokio::sync::Mutex as AsyncMutex;

use crate::types::Component;

use super::resolver::UnresolvedReason;
use super::TypeDefinition;

type Slot = Arc<AsyncMutex<Option<CachedType>>>;

struct CachedType {
    def: Arc<TypeDefinition>,
    fetched_at: Instant,
}

/// Process-wide cache of remote type definitions, keyed by URL and the
/// component the definition was resolved for.
///
/// Each key has its own slot; a fetch holds the slot for its whole duration so
/// concurrent lookups of one URL wait for it instead of fetching again.
/// Failures are not cached.
pub struct TypeCache {
    ttl: Duration,
    slots: Mutex<HashMap<(String, Component), Slot>>,
}

impl TypeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_fetch<F, Fut>(
        &self,
        url: &str,
        component: Component,
        fetch: F,
    ) -> Result<Arc<TypeDefinition>, UnresolvedReason>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TypeDefinition, UnresolvedReason>>,
    {
        let slot = self.slot(url, component);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.def.clone());
            }
            debug!("Remote type {url} expired in cache");
        }

        let def = Arc::new(fetch().await?);
        *entry = Some(CachedType {
            def: def.clone(),
            fetched_at: Instant::now(),
        });
        Ok(def)
    }

    /// Drops `url` for every component.
    pub fn invalidate(&self, url: &str) {
        self.lock_slots().retain(|(key, _), _| key != url);
    }

    pub fn clear(&self) {
        self.lock_slots().clear();
    }

    fn slot(&self, url: &str, component: Component) -> Slot {
        self.lock_slots()
            .entry((url.to_string(), component))
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<(String, Component), Slot>> {
        // The map is only mutated by short non-panicking sections.
        match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::catalog::TypeRelations;
    use crate::types::TypeRef;

    use super::*;

    fn mock_def(url: &str) -> TypeDefinition {
        TypeDefinition {
            reference: TypeRef::remote(url),
            component: Component::Zrc,
            catalog: None,
            relations: TypeRelations::default(),
        }
    }

    #[tokio::test]
    async fn test_single_flight() {
        let cache = Arc::new(TypeCache::new(Duration::from_secs(600)));
        let calls = Arc::new(AtomicUsize::new(0));
        let url = "https://ztc.example.com/zaaktypen/1";

        let mut handles = vec![];
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(url, Component::Zrc, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(mock_def(url))
                    })
                    .await
            }));
        }
        for handle in handles {
            let def = handle.await.unwrap().unwrap();
            assert_eq!(def.reference, TypeRef::remote(url));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_not_cached() {
        let cache = TypeCache::new(Duration::from_secs(600));
        let url = "https://ztc.example.com/zaaktypen/2";

        let result = cache
            .get_or_fetch(url, Component::Zrc, || async { Err(UnresolvedReason::Timeout) })
            .await;
        assert_eq!(result.unwrap_err(), UnresolvedReason::Timeout);

        let def = cache
            .get_or_fetch(url, Component::Zrc, || async { Ok(mock_def(url)) })
            .await
            .unwrap();
        assert_eq!(def.reference, TypeRef::remote(url));

        // Served from cache now.
        let def = cache
            .get_or_fetch(url, Component::Zrc, || async { Err(UnresolvedReason::Timeout) })
            .await
            .unwrap();
        assert_eq!(def.reference, TypeRef::remote(url));
    }

    #[tokio::test]
    async fn test_ttl_and_invalidate() {
        let url = "https://ztc.example.com/zaaktypen/3";

        // Zero ttl: every lookup fetches.
        let cache = TypeCache::new(Duration::ZERO);
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            cache
                .get_or_fetch(url, Component::Zrc, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(mock_def(url))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let cache = TypeCache::new(Duration::from_secs(600));
        let calls = AtomicUsize::new(0);
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(mock_def(url))
        };
        cache.get_or_fetch(url, Component::Zrc, fetch).await.unwrap();
        cache.get_or_fetch(url, Component::Zrc, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(url);
        cache.get_or_fetch(url, Component::Zrc, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.clear();
        cache.get_or_fetch(url, Component::Zrc, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_components_cached_apart() {
        let cache = TypeCache::new(Duration::from_secs(600));
        let url = "https://ztc.example.com/types/4";

        let as_zrc = cache
            .get_or_fetch(url, Component::Zrc, || async { Ok(mock_def(url)) })
            .await
            .unwrap();
        assert_eq!(as_zrc.component, Component::Zrc);

        let as_drc = cache
            .get_or_fetch(url, Component::Drc, || async {
                let mut def = mock_def(url);
                def.component = Component::Drc;
                Ok(def)
            })
            .await
            .unwrap();
        assert_eq!(as_drc.component, Component::Drc);

        cache.invalidate(url);
        let calls = AtomicUsize::new(0);
        for component in [Component::Zrc, Component::Drc] {
            cache
                .get_or_fetch(url, component, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(mock_def(url))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
