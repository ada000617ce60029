// DANS : src/monitoring/metrics.rs

use lazy_static::lazy_static;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, TextEncoder,
    register_int_counter, register_int_counter_vec, register_int_gauge,
};

lazy_static! {
    // --- Cache HTTP (listes de pools, prix) ---
    pub static ref HTTP_CACHE_HITS: IntCounter = register_int_counter!(
        "quoter_http_cache_hits_total", "Réponses HTTP servies depuis le cache (fenêtre forte ou TTL)"
    ).unwrap();
    pub static ref HTTP_FETCHES: IntCounterVec = register_int_counter_vec!(
        "quoter_http_fetches_total",
        "Requêtes HTTP réellement parties sur le réseau, segmentées par statut",
        &["status"] // "success" / "failure"
    ).unwrap();

    // --- Cache de routes ---
    pub static ref ROUTE_CACHE_HITS: IntCounter = register_int_counter!(
        "quoter_route_cache_hits_total", "Entrées du cache de routes réutilisées"
    ).unwrap();
    pub static ref ROUTE_CACHE_MISSES: IntCounter = register_int_counter!(
        "quoter_route_cache_misses_total", "Paires pour lesquelles le graphe de routes a dû être énuméré"
    ).unwrap();
    pub static ref ROUTE_CACHE_EVICTIONS: IntCounter = register_int_counter!(
        "quoter_route_cache_evictions_total", "Entrées du cache de routes évincées (TTL ou taille)"
    ).unwrap();

    // --- Santé des Composants Internes ---
    pub static ref POOL_CATALOG_SIZE: IntGauge = register_int_gauge!(
        "quoter_pool_catalog_size", "Nombre de descripteurs de pools dans le snapshot courant"
    ).unwrap();
    pub static ref RPC_RETRIES: IntCounter = register_int_counter!(
        "quoter_rpc_retries_total", "Appels RPC ré-essayés après une erreur transitoire"
    ).unwrap();
}

/// Sérialise l'état courant du registre au format texte Prometheus.
/// L'hôte (service web, cron de debug) décide quoi en faire.
pub fn dump() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
