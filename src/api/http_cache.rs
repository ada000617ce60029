// DANS : src/api/http_cache.rs
//
// Le client HTTP commun à toutes les lectures d'API. Il ne lève jamais
// d'erreur vers l'appelant : un échec réseau, un statut non-2xx ou un JSON
// invalide deviennent `None` (loggé), et l'appelant affiche "pas encore de
// données". Deux mécanismes de cache :
//   1. une fenêtre "forte" de 2 secondes pendant laquelle une requête
//      identique (URL + corps) est TOUJOURS servie depuis le cache, même si
//      l'appelant demande de l'ignorer ;
//   2. au-delà, un TTL de fraîcheur optionnel fourni par l'appelant.
// Les requêtes identiques concurrentes partagent un seul appel réseau.

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::monitoring::metrics;

/// La fenêtre de cache "fort" : en dessous de cet âge, on ne repart jamais
/// sur le réseau pour une clé identique.
pub const STRONG_CACHE_WINDOW: Duration = Duration::from_secs(2);

/// Le nom du header de télémétrie attaché aux requêtes vers l'API Raydium.
const CLIENT_VERSION_HEADER: &str = "x-client-version";

/// Options de cache par appel.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Corps de requête (POST JSON). `None` = GET.
    pub body: Option<String>,
    /// Ignorer le cache de fraîcheur. La fenêtre forte s'applique quand même.
    pub ignore_cache: bool,
    /// Durée pendant laquelle une réponse passée reste "fraîche".
    pub cache_fresh_time: Option<Duration>,
}

/// L'accès réseau brut, isolé derrière un trait pour que les tests puissent
/// compter les appels sans toucher au réseau.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get_text(
        &self,
        url: &str,
        body: Option<&str>,
        headers: &[(&'static str, String)],
    ) -> Result<String>;
}

/// Le transport de production, au-dessus de reqwest.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_text(
        &self,
        url: &str,
        body: Option<&str>,
        headers: &[(&'static str, String)],
    ) -> Result<String> {
        let mut request = match body {
            Some(b) => self
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(b.to_string()),
            None => self.client.get(url),
        };
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            bail!("HTTP {} sur {}", response.status(), url);
        }
        Ok(response.text().await?)
    }
}

/// Une entrée du cache : le dernier texte reçu et sa date.
#[derive(Default)]
struct CacheSlot {
    text: Option<String>,
    fetched_at: Option<Instant>,
}

/// Le client HTTP avec cache. Construit explicitement et passé par référence
/// à tous les consommateurs : sa durée de vie est celle du service, pas du
/// processus.
pub struct CachedHttpClient {
    transport: Arc<dyn HttpTransport>,
    /// Les URLs contenant cet hôte reçoivent le header de version client.
    api_host: String,
    /// Un verrou par clé : les appels concurrents pour la même clé se
    /// sérialisent dessus, donc un seul part réellement sur le réseau.
    slots: Mutex<HashMap<String, Arc<Mutex<CacheSlot>>>>,
}

impl CachedHttpClient {
    pub fn new(transport: Arc<dyn HttpTransport>, api_host: impl Into<String>) -> Self {
        Self {
            transport,
            api_host: api_host.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Récupère le corps texte d'une URL, à travers le cache.
    pub async fn fetch_text(&self, url: &str, options: &FetchOptions) -> Option<String> {
        let key = match &options.body {
            Some(body) => format!("{url}{body}"),
            None => url.to_string(),
        };

        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(key).or_default())
        };
        // Prendre le verrou du slot sérialise les requêtes identiques : un
        // concurrent arrivé pendant le fetch retombera dans la fenêtre forte.
        let mut guard = slot.lock().await;

        if let (Some(text), Some(at)) = (&guard.text, guard.fetched_at) {
            let age = at.elapsed();
            if age <= STRONG_CACHE_WINDOW {
                metrics::HTTP_CACHE_HITS.inc();
                return Some(text.clone());
            }
            if !options.ignore_cache {
                if let Some(fresh) = options.cache_fresh_time {
                    if age <= fresh {
                        metrics::HTTP_CACHE_HITS.inc();
                        return Some(text.clone());
                    }
                }
            }
        }

        let mut headers: Vec<(&'static str, String)> = Vec::new();
        if url.contains(&self.api_host) {
            headers.push((CLIENT_VERSION_HEADER, env!("CARGO_PKG_VERSION").to_string()));
        }

        match self.transport.get_text(url, options.body.as_deref(), &headers).await {
            Ok(text) => {
                metrics::HTTP_FETCHES.with_label_values(&["success"]).inc();
                guard.text = Some(text.clone());
                guard.fetched_at = Some(Instant::now());
                Some(text)
            }
            Err(e) => {
                metrics::HTTP_FETCHES.with_label_values(&["failure"]).inc();
                warn!(url, error = %e, "Échec du fetch HTTP, réponse absorbée en None");
                None
            }
        }
    }

    /// Variante JSON : parse le texte en `T`, `None` si le parsing échoue.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str, options: &FetchOptions) -> Option<T> {
        let text = self.fetch_text(url, options).await?;
        match serde_json::from_str::<T>(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(url, error = %e, "JSON invalide, réponse absorbée en None");
                None
            }
        }
    }
}
