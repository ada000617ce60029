// DANS : src/state/chain_clock.rs
//
// L'horloge de chaîne estimée : l'heure murale locale corrigée d'un offset
// mesuré contre le sysvar Clock. L'offset est ré-échantillonné au plus une
// fois par TTL ; entre deux échantillons, l'estimation est purement locale
// et ne coûte aucun appel réseau.

use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tokio::sync::RwLock;
use tracing::warn;

use crate::rpc::ResilientRpcClient;

#[derive(Debug, Clone, Copy)]
struct OffsetSample {
    offset_ms: i64,
    sampled_at: Instant,
}

pub struct ChainClock {
    rpc: Option<Arc<ResilientRpcClient>>,
    ttl: Duration,
    sample: RwLock<Option<OffsetSample>>,
}

impl ChainClock {
    pub fn new(rpc: Arc<ResilientRpcClient>, ttl: Duration) -> Self {
        Self {
            rpc: Some(rpc),
            ttl,
            sample: RwLock::new(None),
        }
    }

    /// Une horloge sans RPC : chain time = heure locale. Pour les tests et
    /// les hôtes qui n'ont pas besoin de la correction.
    pub fn local_only() -> Self {
        Self {
            rpc: None,
            ttl: Duration::from_secs(u64::MAX / 2),
            sample: RwLock::new(None),
        }
    }

    fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// L'heure de chaîne estimée, en millisecondes Unix. Si l'offset n'est
    /// pas mesurable (RPC en panne), on retombe sur l'heure locale : une
    /// estimation approximative vaut mieux qu'aucune cotation.
    pub async fn chain_time_ms(&self) -> i64 {
        let offset = match &self.rpc {
            Some(rpc) => self.current_offset(rpc).await,
            None => 0,
        };
        Self::now_ms().saturating_add(offset)
    }

    async fn current_offset(&self, rpc: &Arc<ResilientRpcClient>) -> i64 {
        {
            let sample = self.sample.read().await;
            if let Some(s) = *sample {
                if s.sampled_at.elapsed() <= self.ttl {
                    return s.offset_ms;
                }
            }
        }

        let mut sample = self.sample.write().await;
        // Un concurrent a pu échantillonner pendant qu'on attendait.
        if let Some(s) = *sample {
            if s.sampled_at.elapsed() <= self.ttl {
                return s.offset_ms;
            }
        }

        match rpc.get_clock().await {
            Ok(clock) => {
                let offset_ms = clock
                    .unix_timestamp
                    .saturating_mul(1000)
                    .saturating_sub(Self::now_ms());
                *sample = Some(OffsetSample { offset_ms, sampled_at: Instant::now() });
                offset_ms
            }
            Err(e) => {
                warn!(error = %e, "Sysvar Clock illisible, offset conservé ou nul");
                sample.map(|s| s.offset_ms).unwrap_or(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_only_clock_tracks_wall_time() {
        let clock = ChainClock::local_only();
        let before = ChainClock::now_ms();
        let t = clock.chain_time_ms().await;
        let after = ChainClock::now_ms();
        assert!(t >= before && t <= after);
    }
}
