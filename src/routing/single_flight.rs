// src/routing/single_flight.rs
//
// La primitive "un seul fetch en vol" : un résultat partagé, initialisé au
// plus une fois, que tous les appelants concurrents attendent ensemble.
// L'échec est mémorisé comme `None` (les attardés le voient aussi) ; c'est
// au propriétaire du cache de jeter la cellule pour permettre un ré-essai.

use std::{future::Future, sync::Arc};
use tokio::sync::OnceCell;
use tracing::warn;

pub struct SharedFetch<T> {
    cell: OnceCell<Option<Arc<T>>>,
}

impl<T> SharedFetch<T> {
    pub fn new() -> Self {
        Self { cell: OnceCell::new() }
    }

    /// Lance `fetch` si personne ne l'a encore fait, sinon attend le
    /// résultat en cours. Tous les appelants reçoivent la même valeur.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Option<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.cell
            .get_or_init(|| async {
                match fetch().await {
                    Ok(value) => Some(Arc::new(value)),
                    Err(e) => {
                        warn!(error = %e, "Fetch partagé en échec, résultat None pour tous les attendants");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// La cellule a été initialisée et le fetch avait échoué.
    pub fn has_failed(&self) -> bool {
        matches!(self.cell.get(), Some(None))
    }
}

impl<T> Default for SharedFetch<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let shared: Arc<SharedFetch<u64>> = Arc::new(SharedFetch::new());

        let make = |shared: Arc<SharedFetch<u64>>, calls: Arc<AtomicUsize>| async move {
            shared
                .get_or_fetch(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    // On laisse le temps au concurrent de nous rejoindre.
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    Ok(42u64)
                })
                .await
        };

        let (a, b) = tokio::join!(
            make(Arc::clone(&shared), Arc::clone(&calls)),
            make(Arc::clone(&shared), Arc::clone(&calls)),
        );
        assert_eq!(a.as_deref(), Some(&42));
        assert_eq!(b.as_deref(), Some(&42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_resolves_to_none_and_is_remembered() {
        let shared: SharedFetch<u64> = SharedFetch::new();
        let out = shared
            .get_or_fetch(|| async { Err(anyhow!("panne simulée")) })
            .await;
        assert!(out.is_none());
        assert!(shared.has_failed());

        // Un appel suivant n'exécute plus rien : la cellule est consommée.
        let out = shared.get_or_fetch(|| async { Ok(7u64) }).await;
        assert!(out.is_none());
    }
}
