//! Named refetch hooks registered by data-bound components.

use futures::future::{join_all, BoxFuture};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

pub type Refetcher = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Refetchers of one screen instance, keyed by node id.
#[derive(Default)]
pub struct RefreshRegistry {
    refetchers: RwLock<BTreeMap<String, Refetcher>>,
}

impl RefreshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the refetcher for `id`.
    pub fn register<F, Fut>(&self, id: impl Into<String>, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let refetcher: Refetcher = Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(f()) });
        if let Ok(mut map) = self.refetchers.write() {
            map.insert(id.into(), refetcher);
        }
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.refetchers
            .write()
            .map(|mut map| map.remove(id).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.refetchers.write() {
            map.clear();
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.refetchers
            .read()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// `None` selects every refetcher; unknown ids are ignored.
    fn select(&self, targets: Option<&[String]>) -> Vec<(String, Refetcher)> {
        let Ok(map) = self.refetchers.read() else {
            return Vec::new();
        };
        match targets {
            None => map.iter().map(|(k, f)| (k.clone(), Arc::clone(f))).collect(),
            Some(ids) => ids
                .iter()
                .filter_map(|id| map.get(id).map(|f| (id.clone(), Arc::clone(f))))
                .collect(),
        }
    }

    /// Fire the selected refetchers without waiting for them. Returns how
    /// many were started; `0` when no tokio runtime is available.
    pub fn refresh(&self, targets: Option<&[String]>) -> usize {
        let selected = self.select(targets);
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(count = selected.len(), "no async runtime, refresh skipped");
            return 0;
        };
        for (id, refetch) in &selected {
            tracing::debug!(refetcher = %id, "refresh");
            handle.spawn(refetch());
        }
        selected.len()
    }

    /// Run the selected refetchers and wait for all of them.
    pub async fn refresh_and_wait(&self, targets: Option<&[String]>) -> usize {
        let selected = self.select(targets);
        let count = selected.len();
        join_all(selected.into_iter().map(|(_, refetch)| refetch())).await;
        count
    }
}
