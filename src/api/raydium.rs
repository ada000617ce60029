// DANS : src/api/raydium.rs
//
// Récupération des listes de pools publiées par l'API Raydium, et le cache
// "une fois par processus" qui les mémorise jusqu'à un clear explicite
// (changement d'endpoint, refresh liquidité/swap/wallet).

use arc_swap::ArcSwapOption;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api::{ClmmPoolDescriptor, PoolCatalog, PoolDescriptor, PoolVersion};
use crate::api::http_cache::{CachedHttpClient, FetchOptions};
use crate::monitoring::metrics;

/// Les listes de pools bougent peu : on tolère cinq minutes de fraîcheur
/// côté cache HTTP, en plus de la mémoïsation du catalogue lui-même.
const POOL_LIST_FRESH_TIME: Duration = Duration::from_secs(300);

// --- MODÈLES DE L'API (camelCase) ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LiquidityFile {
    #[serde(default)]
    official: Vec<LiquidityPoolJson>,
    #[serde(default)]
    un_official: Vec<LiquidityPoolJson>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LiquidityPoolJson {
    id: String,
    base_mint: String,
    quote_mint: String,
    lp_mint: String,
    base_vault: String,
    quote_vault: String,
    market_id: String,
    program_id: String,
    base_decimals: u8,
    quote_decimals: u8,
    lp_decimals: u8,
    version: u8,
}

#[derive(Deserialize, Debug)]
struct ClmmPoolsFile {
    #[serde(default)]
    data: Vec<ClmmPoolJson>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ClmmPoolJson {
    id: String,
    mint_a: String,
    mint_b: String,
    program_id: String,
    mint_decimals_a: u8,
    mint_decimals_b: u8,
    amm_config: ClmmConfigJson,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ClmmConfigJson {
    tick_spacing: u16,
    trade_fee_rate: u32,
}

// --- CONVERSIONS ---

fn parse_key(s: &str) -> Option<Pubkey> {
    Pubkey::from_str(s).ok()
}

impl LiquidityPoolJson {
    fn into_descriptor(self, official: bool) -> Option<PoolDescriptor> {
        let version = PoolVersion::from_tag(self.version)?;
        Some(PoolDescriptor {
            id: parse_key(&self.id)?,
            base_mint: parse_key(&self.base_mint)?,
            quote_mint: parse_key(&self.quote_mint)?,
            lp_mint: parse_key(&self.lp_mint)?,
            base_vault: parse_key(&self.base_vault)?,
            quote_vault: parse_key(&self.quote_vault)?,
            market_id: parse_key(&self.market_id)?,
            program_id: parse_key(&self.program_id)?,
            base_decimals: self.base_decimals,
            quote_decimals: self.quote_decimals,
            lp_decimals: self.lp_decimals,
            version,
            official,
        })
    }
}

impl ClmmPoolJson {
    fn into_descriptor(self) -> Option<ClmmPoolDescriptor> {
        Some(ClmmPoolDescriptor {
            id: parse_key(&self.id)?,
            mint_a: parse_key(&self.mint_a)?,
            mint_b: parse_key(&self.mint_b)?,
            program_id: parse_key(&self.program_id)?,
            mint_decimals_a: self.mint_decimals_a,
            mint_decimals_b: self.mint_decimals_b,
            tick_spacing: self.amm_config.tick_spacing,
            trade_fee_rate: self.amm_config.trade_fee_rate,
        })
    }
}

// --- FETCHERS ---

/// Télécharge la liste legacy (AMM V4 + stable) et la transforme en
/// descripteurs. Les entrées illisibles sont ignorées, pas fatales.
pub async fn fetch_liquidity_pools(
    http: &CachedHttpClient,
    base_url: &str,
) -> Option<Vec<PoolDescriptor>> {
    let url = format!("{base_url}/v2/sdk/liquidity/mainnet.json");
    let options = FetchOptions {
        cache_fresh_time: Some(POOL_LIST_FRESH_TIME),
        ..Default::default()
    };
    let file: LiquidityFile = http.fetch_json(&url, &options).await?;

    let mut pools = Vec::with_capacity(file.official.len() + file.un_official.len());
    let mut skipped = 0usize;
    for (list, official) in [(file.official, true), (file.un_official, false)] {
        for json in list {
            match json.into_descriptor(official) {
                Some(d) => pools.push(d),
                None => skipped += 1,
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, "Descripteurs de pools illisibles ignorés");
    }
    Some(pools)
}

/// Télécharge la liste des pools concentrés.
pub async fn fetch_clmm_pools(
    http: &CachedHttpClient,
    base_url: &str,
) -> Option<Vec<ClmmPoolDescriptor>> {
    let url = format!("{base_url}/ammV3/ammPools");
    let options = FetchOptions {
        cache_fresh_time: Some(POOL_LIST_FRESH_TIME),
        ..Default::default()
    };
    let file: ClmmPoolsFile = http.fetch_json(&url, &options).await?;
    Some(file.data.into_iter().filter_map(|j| j.into_descriptor()).collect())
}

// --- LE CACHE DE CATALOGUE ---

/// Mémoïse le catalogue complet. Le snapshot est un `ArcSwapOption` : les
/// lecteurs le clonent sans verrou, le rafraîchisseur le remplace d'un coup.
pub struct ApiCache {
    catalog: ArcSwapOption<PoolCatalog>,
    /// Sérialise le remplissage : un seul téléchargement à la fois.
    refill: Mutex<()>,
}

impl ApiCache {
    pub fn new() -> Self {
        Self {
            catalog: ArcSwapOption::empty(),
            refill: Mutex::new(()),
        }
    }

    /// Le catalogue courant, téléchargé au premier appel puis mémorisé
    /// jusqu'à `clear()`. `None` si le téléchargement échoue (ré-essayable).
    pub async fn get_or_fetch(
        &self,
        http: &CachedHttpClient,
        base_url: &str,
    ) -> Option<Arc<PoolCatalog>> {
        if let Some(catalog) = self.catalog.load_full() {
            return Some(catalog);
        }

        let _guard = self.refill.lock().await;
        // Un concurrent a pu remplir pendant qu'on attendait le verrou.
        if let Some(catalog) = self.catalog.load_full() {
            return Some(catalog);
        }

        let pools = fetch_liquidity_pools(http, base_url).await?;
        let clmm_pools = fetch_clmm_pools(http, base_url).await?;
        let catalog = Arc::new(PoolCatalog { pools, clmm_pools });
        info!(
            pools = catalog.pools.len(),
            clmm_pools = catalog.clmm_pools.len(),
            "Catalogue de pools chargé"
        );
        metrics::POOL_CATALOG_SIZE.set(catalog.len() as i64);
        self.catalog.store(Some(Arc::clone(&catalog)));
        Some(catalog)
    }

    /// Oublie le snapshot. Le prochain appel re-téléchargera.
    pub fn clear(&self) {
        self.catalog.store(None);
    }

    /// Injection directe d'un catalogue, pour les tests et les hôtes qui
    /// gèrent eux-mêmes leur source de pools.
    pub fn install(&self, catalog: PoolCatalog) {
        metrics::POOL_CATALOG_SIZE.set(catalog.len() as i64);
        self.catalog.store(Some(Arc::new(catalog)));
    }
}

impl Default for ApiCache {
    fn default() -> Self {
        Self::new()
    }
}
