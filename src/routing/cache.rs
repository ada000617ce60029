// src/routing/cache.rs
//
// Le cache de routes par paire (input, output). Chaque entrée porte le
// graphe énuméré une seule fois, plus deux fetchs partagés démarrés à la
// demande : les tick arrays (pools concentrés) et les états simulés (pools
// à produit constant). Si un fetch échoue, l'entrée entière est retirée
// pour que la prochaine demande reparte de zéro ; les attendants déjà en
// vol reçoivent None.
//
// Contrairement au mémo d'origine, ce cache est borné : TTL par entrée et
// plafond de taille, l'entrée la plus ancienne sortant la première.

use std::{
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::monitoring::metrics;
use crate::routing::single_flight::SharedFetch;
use crate::routing::{ClmmTickCache, PairKey, PoolStateMap, RouteGraph};

pub struct RouteCacheEntry {
    pub graph: RouteGraph,
    tick: SharedFetch<ClmmTickCache>,
    sim: SharedFetch<PoolStateMap>,
    inserted_at: Instant,
}

impl RouteCacheEntry {
    fn new(graph: RouteGraph) -> Self {
        Self {
            graph,
            tick: SharedFetch::new(),
            sim: SharedFetch::new(),
            inserted_at: Instant::now(),
        }
    }
}

pub struct RouteCache {
    entries: RwLock<HashMap<PairKey, Arc<RouteCacheEntry>>>,
    max_entries: usize,
    ttl: Duration,
}

impl RouteCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    /// L'entrée de la paire, construite via `build_graph` au premier appel.
    /// L'énumération du graphe est synchrone et ne se produit qu'une fois
    /// par durée de vie de l'entrée.
    pub async fn get_or_build<F>(&self, key: PairKey, build_graph: F) -> Arc<RouteCacheEntry>
    where
        F: FnOnce() -> RouteGraph,
    {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&key) {
                if entry.inserted_at.elapsed() <= self.ttl {
                    metrics::ROUTE_CACHE_HITS.inc();
                    return Arc::clone(entry);
                }
            }
        }

        let mut entries = self.entries.write().await;
        // Un concurrent a pu construire pendant qu'on attendait le verrou.
        if let Some(entry) = entries.get(&key) {
            if entry.inserted_at.elapsed() <= self.ttl {
                metrics::ROUTE_CACHE_HITS.inc();
                return Arc::clone(entry);
            }
        }

        Self::evict_locked(&mut entries, self.max_entries, self.ttl);
        metrics::ROUTE_CACHE_MISSES.inc();
        let entry = Arc::new(RouteCacheEntry::new(build_graph()));
        entries.insert(key, Arc::clone(&entry));
        entry
    }

    /// Les états simulés des pools standard de l'entrée. Un seul fetch en
    /// vol par entrée ; en cas d'échec l'entrée est retirée du cache.
    pub async fn sim_cache<F, Fut>(
        &self,
        key: PairKey,
        entry: &Arc<RouteCacheEntry>,
        fetch: F,
    ) -> Option<Arc<PoolStateMap>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<PoolStateMap>>,
    {
        let out = entry.sim.get_or_fetch(fetch).await;
        if out.is_none() {
            self.remove_if_same(key, entry).await;
        }
        out
    }

    /// Les tick arrays des pools concentrés de l'entrée. Mêmes règles.
    pub async fn tick_cache<F, Fut>(
        &self,
        key: PairKey,
        entry: &Arc<RouteCacheEntry>,
        fetch: F,
    ) -> Option<Arc<ClmmTickCache>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<ClmmTickCache>>,
    {
        let out = entry.tick.get_or_fetch(fetch).await;
        if out.is_none() {
            self.remove_if_same(key, entry).await;
        }
        out
    }

    /// Vide tout. Appelé sur les évènements de refresh.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        debug!("Cache de routes vidé");
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Retire l'entrée seulement si c'est encore la même : une entrée
    /// reconstruite entre-temps par un autre appelant reste en place.
    async fn remove_if_same(&self, key: PairKey, entry: &Arc<RouteCacheEntry>) {
        let mut entries = self.entries.write().await;
        if let Some(current) = entries.get(&key) {
            if Arc::ptr_eq(current, entry) {
                entries.remove(&key);
                debug!(input = %key.input, output = %key.output, "Entrée de cache retirée après un fetch en échec");
            }
        }
    }

    fn evict_locked(
        entries: &mut HashMap<PairKey, Arc<RouteCacheEntry>>,
        max_entries: usize,
        ttl: Duration,
    ) {
        let before = entries.len();
        entries.retain(|_, e| e.inserted_at.elapsed() <= ttl);
        let mut evicted = before - entries.len();

        while entries.len() >= max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| *k);
            match oldest {
                Some(k) => {
                    entries.remove(&k);
                    evicted += 1;
                }
                None => break,
            }
        }
        if evicted > 0 {
            metrics::ROUTE_CACHE_EVICTIONS.inc_by(evicted as u64);
        }
    }
}
