// src/rpc/resilient_client.rs

use anyhow::{Context, Result};
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
};
use solana_sdk::{
    account::Account,
    pubkey::Pubkey,
    sysvar::clock::{self, Clock},
};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;

use crate::monitoring::metrics;

/// Taille maximum d'un lot pour get_multiple_accounts (limite du RPC public).
const MULTIPLE_ACCOUNTS_BATCH_SIZE: usize = 100;

/// Un "wrapper" autour du RpcClient de Solana qui ajoute une logique de
/// ré-essai automatique pour les appels RPC qui échouent à cause d'erreurs
/// réseau temporaires. C'est la seule porte vers la blockchain : les caches
/// au-dessus existent uniquement pour éviter de repasser par ici.
#[derive(Clone)]
pub struct ResilientRpcClient {
    client: Arc<RpcClient>,
    max_retries: u8,
    delay_ms: u64,
}

impl ResilientRpcClient {
    pub fn new(rpc_url: String, max_retries: u8, delay_ms: u64) -> Self {
        Self {
            client: Arc::new(RpcClient::new(rpc_url)),
            max_retries,
            delay_ms,
        }
    }

    /// Détermine si une erreur du client est temporaire et si une nouvelle
    /// tentative doit être effectuée.
    fn is_retryable(error: &ClientError) -> bool {
        matches!(
            error.kind,
            ClientErrorKind::Reqwest(_) | ClientErrorKind::RpcError(_) | ClientErrorKind::Io(_)
        )
    }

    /// Récupère les données brutes d'un compte.
    pub async fn get_account_data(&self, pubkey: &Pubkey) -> Result<Vec<u8>> {
        for attempt in 0..=self.max_retries {
            match self.client.get_account_data(pubkey).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    if Self::is_retryable(&e) && attempt < self.max_retries {
                        metrics::RPC_RETRIES.inc();
                        sleep(Duration::from_millis(self.delay_ms)).await;
                    } else {
                        return Err(e).with_context(|| format!("Échec final de get_account_data pour {}", pubkey));
                    }
                }
            }
        }
        unreachable!()
    }

    /// Récupère un lot de comptes en une seule requête. Les adresses sont
    /// découpées en paquets de 100 (limite du RPC), et l'ordre de sortie
    /// correspond à l'ordre d'entrée.
    pub async fn get_multiple_accounts(&self, pubkeys: &[Pubkey]) -> Result<Vec<Option<Account>>> {
        let mut out = Vec::with_capacity(pubkeys.len());
        for chunk in pubkeys.chunks(MULTIPLE_ACCOUNTS_BATCH_SIZE) {
            out.extend(self.get_multiple_accounts_chunk(chunk).await?);
        }
        Ok(out)
    }

    async fn get_multiple_accounts_chunk(&self, pubkeys: &[Pubkey]) -> Result<Vec<Option<Account>>> {
        for attempt in 0..=self.max_retries {
            match self.client.get_multiple_accounts(pubkeys).await {
                Ok(accounts) => return Ok(accounts),
                Err(e) => {
                    if Self::is_retryable(&e) && attempt < self.max_retries {
                        metrics::RPC_RETRIES.inc();
                        sleep(Duration::from_millis(self.delay_ms)).await;
                    } else {
                        return Err(e).context("Échec final de get_multiple_accounts");
                    }
                }
            }
        }
        unreachable!()
    }

    /// Lit le sysvar Clock. C'est la source de vérité pour le "chain time"
    /// estimé par `state::chain_clock`.
    pub async fn get_clock(&self) -> Result<Clock> {
        let data = self.get_account_data(&clock::id()).await?;
        let decoded: Clock = bincode::deserialize(&data)
            .context("Désérialisation du sysvar Clock impossible")?;
        Ok(decoded)
    }
}
