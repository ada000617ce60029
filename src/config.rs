// src/config.rs

use serde::Deserialize;
use anyhow::Result;

fn default_api_base_url() -> String {
    "https://api.raydium.io".to_string()
}

fn default_route_cache_max_entries() -> usize {
    256
}

fn default_route_cache_ttl_secs() -> u64 {
    600
}

fn default_chain_clock_ttl_secs() -> u64 {
    60
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub solana_rpc_url: String,

    /// Origine des endpoints JSON de Raydium. Surchargable pour basculer
    /// entre mainnet et devnet sans recompiler.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Nombre maximum de paires gardées dans le cache de routes.
    #[serde(default = "default_route_cache_max_entries")]
    pub route_cache_max_entries: usize,

    /// Durée de vie d'une entrée du cache de routes, en secondes.
    #[serde(default = "default_route_cache_ttl_secs")]
    pub route_cache_ttl_secs: u64,

    /// Fréquence de ré-échantillonnage de l'horloge on-chain, en secondes.
    #[serde(default = "default_chain_clock_ttl_secs")]
    pub chain_clock_ttl_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()?;
        Ok(config)
    }
}
