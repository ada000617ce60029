// src/routing/engine.rs
//
// Le moteur de routes : énumération des candidats, lecture/décodage des
// comptes on-chain, cotation. Le trait est le seam du service : les caches
// ne connaissent que lui, les tests lui substituent un moteur compté.

use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::{collections::HashMap, sync::Arc};
use tracing::warn;

use crate::api::{ClmmPoolDescriptor, PoolCatalog, PoolDescriptor, PoolVersion, ROUTE_MIDDLE_MINTS};
use crate::decoders::{amm_v4, clmm_pool, spl_token, tick_array};
use crate::math::{fraction, swap_math};
use crate::routing::pair;
use crate::routing::{
    ClmmTickCache, ComputedRoute, OneHopRoute, ParsedPoolState, PoolKey, PoolStateMap, RouteGraph,
};
use crate::rpc::ResilientRpcClient;

/// Frais par défaut d'un pool dont le compte n'a pas pu être décodé
/// (les stable-pools ont leur propre layout) : 0,25 %.
const DEFAULT_FEE_NUMERATOR: u64 = 25;
const DEFAULT_FEE_DENOMINATOR: u64 = 10_000;

/// Dénominateur des frais CLMM (trade_fee_rate est en millionièmes).
const CLMM_FEE_DENOMINATOR: u32 = 1_000_000;

#[derive(Debug, Clone, Copy)]
pub struct ComputeParams {
    pub amount_in: u64,
    /// Tolérance de glissement en points de base (100 = 1 %).
    pub slippage_bps: u16,
    pub chain_time_ms: i64,
}

#[async_trait]
pub trait RouteEngine: Send + Sync {
    /// Énumère les routes directes et à un saut pour la paire. Synchrone :
    /// ne travaille que sur le catalogue en mémoire.
    fn enumerate_routes(&self, catalog: &PoolCatalog, input: &Pubkey, output: &Pubkey) -> RouteGraph;

    /// Lit et décode l'état on-chain des pools standard/stable du graphe.
    async fn fetch_pool_states(&self, graph: &RouteGraph, catalog: &PoolCatalog) -> Result<PoolStateMap>;

    /// Même lecture, pour une liste arbitraire de descripteurs (le chooser
    /// de paire s'en sert pour départager des candidats hors graphe).
    async fn fetch_pool_states_for(&self, pools: &[PoolDescriptor]) -> Result<PoolStateMap>;

    /// Lit l'état des pools concentrés du graphe et les tick arrays autour
    /// de leur tick courant.
    async fn fetch_tick_arrays(&self, graph: &RouteGraph, catalog: &PoolCatalog) -> Result<ClmmTickCache>;

    /// Cote chaque route du graphe et les ordonne de la meilleure à la
    /// moins bonne sortie.
    fn compute_routes(
        &self,
        params: &ComputeParams,
        graph: &RouteGraph,
        states: &PoolStateMap,
        ticks: &ClmmTickCache,
        catalog: &PoolCatalog,
    ) -> Result<Vec<ComputedRoute>>;

    /// Le pool par défaut à proposer pour un ajout de liquidité sur la paire.
    fn default_add_liquidity_pool(
        &self,
        graph: &RouteGraph,
        states: &PoolStateMap,
        catalog: &PoolCatalog,
    ) -> Option<PoolDescriptor>;
}

/// Le moteur de production : tout passe par le RPC.
pub struct OnchainRouteEngine {
    rpc: Arc<ResilientRpcClient>,
}

impl OnchainRouteEngine {
    pub fn new(rpc: Arc<ResilientRpcClient>) -> Self {
        Self { rpc }
    }

    fn first_pool_for_leg(catalog: &PoolCatalog, mint_a: &Pubkey, mint_b: &Pubkey) -> Option<PoolKey> {
        if let Some(p) = catalog.pools.iter().find(|p| p.matches_pair(mint_a, mint_b)) {
            return Some(PoolKey { id: p.id, version: p.version });
        }
        catalog
            .clmm_pools
            .iter()
            .find(|p| p.matches_pair(mint_a, mint_b))
            .map(|p| PoolKey { id: p.id, version: PoolVersion::Clmm })
    }

    fn quote_amm(
        state: &ParsedPoolState,
        input_mint: &Pubkey,
        amount_in: u64,
        chain_time_ms: i64,
    ) -> Option<(u64, Pubkey, bool)> {
        let (in_reserve, out_reserve, out_mint) = if state.base_mint == *input_mint {
            (state.base_reserve, state.quote_reserve, state.quote_mint)
        } else if state.quote_mint == *input_mint {
            (state.quote_reserve, state.base_reserve, state.base_mint)
        } else {
            return None;
        };

        let out = swap_math::constant_product_swap(
            amount_in as u128,
            in_reserve as u128,
            out_reserve as u128,
            state.trade_fee_numerator,
            state.trade_fee_denominator,
        )
        .ok()?;
        let out = u64::try_from(out).ok()?;

        let ready = in_reserve > 0
            && out_reserve > 0
            && (state.open_time_secs as i64).saturating_mul(1000) <= chain_time_ms;
        Some((out, out_mint, ready))
    }

    fn quote_clmm(
        pool_id: &Pubkey,
        ticks: &ClmmTickCache,
        descriptor: Option<&ClmmPoolDescriptor>,
        input_mint: &Pubkey,
        amount_in: u64,
    ) -> Option<(u64, Pubkey, bool)> {
        let pool = ticks.pools.get(pool_id)?;
        let (a_to_b, out_mint) = if pool.mint_a == *input_mint {
            (true, pool.mint_b)
        } else if pool.mint_b == *input_mint {
            (false, pool.mint_a)
        } else {
            return None;
        };

        let fee_rate = descriptor.map(|d| d.trade_fee_rate).unwrap_or(2500);
        let out = swap_math::clmm_spot_output(
            amount_in as u128,
            pool.sqrt_price_x64,
            a_to_b,
            fee_rate,
            CLMM_FEE_DENOMINATOR,
        )
        .ok()?;
        let out = u64::try_from(out).ok()?;

        let has_arrays = ticks.arrays.get(pool_id).map(|a| !a.is_empty()).unwrap_or(false);
        let ready = has_arrays && pool.liquidity > 0;
        Some((out, out_mint, ready))
    }

    /// Cote un saut de route, quelle que soit la famille du pool.
    fn quote_leg(
        key: &PoolKey,
        input_mint: &Pubkey,
        amount_in: u64,
        states: &PoolStateMap,
        ticks: &ClmmTickCache,
        catalog: &PoolCatalog,
        chain_time_ms: i64,
    ) -> Option<(u64, Pubkey, bool)> {
        if key.version.is_clmm() {
            let descriptor = catalog.clmm_pools.iter().find(|p| p.id == key.id);
            Self::quote_clmm(&key.id, ticks, descriptor, input_mint, amount_in)
        } else {
            let state = states.get(&key.id)?;
            Self::quote_amm(state, input_mint, amount_in, chain_time_ms)
        }
    }
}

#[async_trait]
impl RouteEngine for OnchainRouteEngine {
    fn enumerate_routes(&self, catalog: &PoolCatalog, input: &Pubkey, output: &Pubkey) -> RouteGraph {
        let mut graph = RouteGraph {
            input: *input,
            output: *output,
            direct: Vec::new(),
            one_hop: Vec::new(),
        };

        for p in catalog.pools_for_pair(input, output) {
            graph.direct.push(PoolKey { id: p.id, version: p.version });
        }
        for p in catalog.clmm_for_pair(input, output) {
            graph.direct.push(PoolKey { id: p.id, version: PoolVersion::Clmm });
        }

        // Routes à un saut : un seul pool par jambe, via un mint pivot.
        for middle in ROUTE_MIDDLE_MINTS.iter() {
            if middle == input || middle == output {
                continue;
            }
            let first = Self::first_pool_for_leg(catalog, input, middle);
            let second = Self::first_pool_for_leg(catalog, middle, output);
            if let (Some(first), Some(second)) = (first, second) {
                graph.one_hop.push(OneHopRoute { first, second, middle: *middle });
            }
        }
        graph
    }

    async fn fetch_pool_states(&self, graph: &RouteGraph, catalog: &PoolCatalog) -> Result<PoolStateMap> {
        let ids = graph.amm_pool_ids();
        let descriptors: Vec<PoolDescriptor> = ids
            .iter()
            .filter_map(|id| catalog.pools.iter().find(|p| p.id == *id).cloned())
            .collect();
        self.fetch_pool_states_for(&descriptors).await
    }

    async fn fetch_pool_states_for(&self, pools: &[PoolDescriptor]) -> Result<PoolStateMap> {
        if pools.is_empty() {
            return Ok(PoolStateMap::new());
        }

        // Premier lot : les comptes de pool eux-mêmes, pour open_time,
        // status et frais. Un échec de décodage (layout stable) n'est pas
        // fatal, on retombe sur des valeurs par défaut.
        let pool_ids: Vec<Pubkey> = pools.iter().map(|p| p.id).collect();
        let pool_accounts = self
            .rpc
            .get_multiple_accounts(&pool_ids)
            .await
            .context("Lecture des comptes de pool impossible")?;

        let mut decoded: HashMap<Pubkey, amm_v4::DecodedAmmPool> = HashMap::new();
        for (descriptor, account) in pools.iter().zip(pool_accounts.iter()) {
            if let Some(account) = account {
                match amm_v4::decode_pool(&descriptor.id, &account.data) {
                    Ok(pool) => {
                        decoded.insert(descriptor.id, pool);
                    }
                    Err(e) => {
                        warn!(pool = %descriptor.id, error = %e, "Compte de pool non décodable, valeurs par défaut");
                    }
                }
            }
        }

        // Second lot : vaults (réserves) et mint LP (supply) de chaque pool.
        let mut hydration_keys: Vec<Pubkey> = Vec::with_capacity(pools.len() * 3);
        for p in pools {
            hydration_keys.push(p.base_vault);
            hydration_keys.push(p.quote_vault);
            hydration_keys.push(p.lp_mint);
        }
        let hydration_accounts = self
            .rpc
            .get_multiple_accounts(&hydration_keys)
            .await
            .context("Lecture des vaults et mints LP impossible")?;

        let mut states = PoolStateMap::new();
        for (i, descriptor) in pools.iter().enumerate() {
            let base_vault = hydration_accounts.get(i * 3).and_then(|a| a.as_ref());
            let quote_vault = hydration_accounts.get(i * 3 + 1).and_then(|a| a.as_ref());
            let lp_mint = hydration_accounts.get(i * 3 + 2).and_then(|a| a.as_ref());

            let (Some(base_vault), Some(quote_vault), Some(lp_mint)) = (base_vault, quote_vault, lp_mint) else {
                warn!(pool = %descriptor.id, "Vault ou mint LP introuvable, pool ignoré");
                continue;
            };
            let base_reserve = match spl_token::decode_token_amount(&base_vault.data) {
                Ok(v) => v,
                Err(e) => {
                    warn!(pool = %descriptor.id, error = %e, "Vault base illisible, pool ignoré");
                    continue;
                }
            };
            let quote_reserve = match spl_token::decode_token_amount(&quote_vault.data) {
                Ok(v) => v,
                Err(e) => {
                    warn!(pool = %descriptor.id, error = %e, "Vault quote illisible, pool ignoré");
                    continue;
                }
            };
            let lp = match spl_token::decode_mint(&descriptor.lp_mint, &lp_mint.data) {
                Ok(v) => v,
                Err(e) => {
                    warn!(pool = %descriptor.id, error = %e, "Mint LP illisible, pool ignoré");
                    continue;
                }
            };

            let (open_time_secs, fee_num, fee_denom) = match decoded.get(&descriptor.id) {
                Some(pool) => (
                    pool.open_time_secs,
                    pool.trade_fee_numerator,
                    pool.trade_fee_denominator,
                ),
                None => (0, DEFAULT_FEE_NUMERATOR, DEFAULT_FEE_DENOMINATOR),
            };

            states.insert(
                descriptor.id,
                ParsedPoolState {
                    id: descriptor.id,
                    base_mint: descriptor.base_mint,
                    quote_mint: descriptor.quote_mint,
                    base_reserve,
                    quote_reserve,
                    lp_supply: lp.supply,
                    lp_decimals: lp.decimals,
                    open_time_secs,
                    trade_fee_numerator: fee_num,
                    trade_fee_denominator: fee_denom,
                },
            );
        }
        Ok(states)
    }

    async fn fetch_tick_arrays(&self, graph: &RouteGraph, catalog: &PoolCatalog) -> Result<ClmmTickCache> {
        let ids = graph.clmm_pool_ids();
        if ids.is_empty() {
            return Ok(ClmmTickCache::default());
        }

        let descriptors: Vec<ClmmPoolDescriptor> = ids
            .iter()
            .filter_map(|id| catalog.clmm_pools.iter().find(|p| p.id == *id).cloned())
            .collect();

        let pool_accounts = self
            .rpc
            .get_multiple_accounts(&ids)
            .await
            .context("Lecture des comptes CLMM impossible")?;

        let mut cache = ClmmTickCache::default();
        let mut array_keys: Vec<(Pubkey, Pubkey)> = Vec::new(); // (pool, array)
        for (id, account) in ids.iter().zip(pool_accounts.iter()) {
            let Some(account) = account else { continue };
            let Some(descriptor) = descriptors.iter().find(|d| d.id == *id) else { continue };
            match clmm_pool::decode_pool(id, &account.data, &descriptor.program_id) {
                Ok(pool) => {
                    // Les trois arrays autour du tick courant suffisent pour
                    // juger la liquidité immédiatement traversable.
                    let span = (tick_array::TICK_ARRAY_SIZE as i32) * (pool.tick_spacing as i32);
                    let start = tick_array::get_start_tick_index(pool.tick_current, pool.tick_spacing);
                    for start_index in [start - span, start, start + span] {
                        let address = tick_array::get_tick_array_address(
                            id,
                            start_index,
                            &descriptor.program_id,
                        );
                        array_keys.push((*id, address));
                    }
                    cache.pools.insert(*id, pool);
                }
                Err(e) => {
                    warn!(pool = %id, error = %e, "Compte CLMM non décodable, pool ignoré");
                }
            }
        }

        if !array_keys.is_empty() {
            let addresses: Vec<Pubkey> = array_keys.iter().map(|(_, a)| *a).collect();
            let accounts = self
                .rpc
                .get_multiple_accounts(&addresses)
                .await
                .context("Lecture des tick arrays impossible")?;
            for ((pool_id, address), account) in array_keys.iter().zip(accounts.iter()) {
                // Un array absent est normal : il n'est créé qu'à la
                // première position ouverte dans sa plage.
                let Some(account) = account else { continue };
                match tick_array::decode_tick_array(address, &account.data) {
                    Ok(snapshot) => cache.arrays.entry(*pool_id).or_default().push(snapshot),
                    Err(e) => {
                        warn!(array = %address, error = %e, "Tick array non décodable, ignoré");
                    }
                }
            }
        }
        Ok(cache)
    }

    fn compute_routes(
        &self,
        params: &ComputeParams,
        graph: &RouteGraph,
        states: &PoolStateMap,
        ticks: &ClmmTickCache,
        catalog: &PoolCatalog,
    ) -> Result<Vec<ComputedRoute>> {
        let mut routes: Vec<ComputedRoute> = Vec::new();

        for key in &graph.direct {
            let Some((amount_out, _, ready)) = Self::quote_leg(
                key,
                &graph.input,
                params.amount_in,
                states,
                ticks,
                catalog,
                params.chain_time_ms,
            ) else {
                continue;
            };
            routes.push(Self::build_route(
                vec![*key],
                None,
                params,
                amount_out,
                ready,
            ));
        }

        for hop in &graph.one_hop {
            let Some((mid_out, mid_mint, first_ready)) = Self::quote_leg(
                &hop.first,
                &graph.input,
                params.amount_in,
                states,
                ticks,
                catalog,
                params.chain_time_ms,
            ) else {
                continue;
            };
            if mid_mint != hop.middle || mid_out == 0 {
                continue;
            }
            let Some((amount_out, _, second_ready)) = Self::quote_leg(
                &hop.second,
                &hop.middle,
                mid_out,
                states,
                ticks,
                catalog,
                params.chain_time_ms,
            ) else {
                continue;
            };
            routes.push(Self::build_route(
                vec![hop.first, hop.second],
                Some(hop.middle),
                params,
                amount_out,
                first_ready && second_ready,
            ));
        }

        // De la meilleure à la moins bonne sortie. Le sélecteur en aval
        // fait confiance à cet ordre.
        routes.sort_by(|a, b| b.amount_out.cmp(&a.amount_out));
        Ok(routes)
    }

    fn default_add_liquidity_pool(
        &self,
        graph: &RouteGraph,
        states: &PoolStateMap,
        catalog: &PoolCatalog,
    ) -> Option<PoolDescriptor> {
        let candidates: Vec<PoolDescriptor> = graph
            .direct
            .iter()
            .filter(|k| !k.version.is_clmm())
            .filter_map(|k| catalog.pools.iter().find(|p| p.id == k.id).cloned())
            .collect();
        pair::pick_best(&candidates, states)
    }
}

impl OnchainRouteEngine {
    fn build_route(
        pool_keys: Vec<PoolKey>,
        middle_mint: Option<Pubkey>,
        params: &ComputeParams,
        amount_out: u64,
        ready: bool,
    ) -> ComputedRoute {
        let slippage_cut = (amount_out as u128) * (params.slippage_bps as u128) / 10_000;
        let min_amount_out = amount_out.saturating_sub(slippage_cut as u64);
        ComputedRoute {
            pool_keys,
            middle_mint,
            amount_in: params.amount_in,
            amount_out,
            min_amount_out,
            price: fraction::price_per_unit(params.amount_in, amount_out),
            pool_ready: ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(base: Pubkey, quote: Pubkey, version: PoolVersion, official: bool) -> PoolDescriptor {
        PoolDescriptor {
            id: Pubkey::new_unique(),
            base_mint: base,
            quote_mint: quote,
            lp_mint: Pubkey::new_unique(),
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            market_id: Pubkey::new_unique(),
            program_id: Pubkey::new_unique(),
            base_decimals: 9,
            quote_decimals: 6,
            lp_decimals: 9,
            version,
            official,
        }
    }

    fn state_for(d: &PoolDescriptor, base_reserve: u64, quote_reserve: u64, open_time_secs: u64) -> ParsedPoolState {
        ParsedPoolState {
            id: d.id,
            base_mint: d.base_mint,
            quote_mint: d.quote_mint,
            base_reserve,
            quote_reserve,
            lp_supply: 1_000_000,
            lp_decimals: 9,
            open_time_secs,
            trade_fee_numerator: 25,
            trade_fee_denominator: 10_000,
        }
    }

    fn engine() -> OnchainRouteEngine {
        OnchainRouteEngine::new(Arc::new(ResilientRpcClient::new(
            "http://localhost:8899".to_string(),
            0,
            1,
        )))
    }

    #[test]
    fn enumerate_finds_direct_and_one_hop_routes() {
        let input = Pubkey::new_unique();
        let output = Pubkey::new_unique();
        let middle = ROUTE_MIDDLE_MINTS[0];

        let catalog = PoolCatalog {
            pools: vec![
                descriptor(input, output, PoolVersion::AmmV4, true),
                descriptor(input, middle, PoolVersion::AmmV4, true),
                descriptor(middle, output, PoolVersion::AmmV4, false),
            ],
            clmm_pools: vec![],
        };

        let graph = engine().enumerate_routes(&catalog, &input, &output);
        assert_eq!(graph.direct.len(), 1);
        assert_eq!(graph.one_hop.len(), 1);
        assert_eq!(graph.one_hop[0].middle, middle);
    }

    #[test]
    fn enumerate_skips_middle_equal_to_endpoints() {
        let input = ROUTE_MIDDLE_MINTS[0];
        let output = ROUTE_MIDDLE_MINTS[1];
        let catalog = PoolCatalog {
            pools: vec![descriptor(input, output, PoolVersion::AmmV4, true)],
            clmm_pools: vec![],
        };
        let graph = engine().enumerate_routes(&catalog, &input, &output);
        // Ni WSOL ni USDC ne peuvent servir de pivot pour leur propre paire.
        assert!(graph.one_hop.iter().all(|h| h.middle != input && h.middle != output));
    }

    #[test]
    fn compute_routes_orders_by_output_desc() {
        let input = Pubkey::new_unique();
        let output = Pubkey::new_unique();
        let d1 = descriptor(input, output, PoolVersion::AmmV4, true);
        let d2 = descriptor(input, output, PoolVersion::AmmV4, false);
        let catalog = PoolCatalog {
            pools: vec![d1.clone(), d2.clone()],
            clmm_pools: vec![],
        };

        let mut states = PoolStateMap::new();
        // d2 a des réserves plus profondes : meilleure sortie.
        states.insert(d1.id, state_for(&d1, 1_000_000, 1_000_000, 0));
        states.insert(d2.id, state_for(&d2, 100_000_000, 100_000_000, 0));

        let eng = engine();
        let graph = eng.enumerate_routes(&catalog, &input, &output);
        let params = ComputeParams { amount_in: 10_000, slippage_bps: 50, chain_time_ms: 1_000_000 };
        let routes = eng
            .compute_routes(&params, &graph, &states, &ClmmTickCache::default(), &catalog)
            .unwrap();

        assert_eq!(routes.len(), 2);
        assert!(routes[0].amount_out >= routes[1].amount_out);
        assert_eq!(routes[0].pool_keys[0].id, d2.id);
        assert!(routes[0].pool_ready);
        assert!(routes[0].min_amount_out < routes[0].amount_out);
    }

    #[test]
    fn future_open_time_makes_route_not_ready() {
        let input = Pubkey::new_unique();
        let output = Pubkey::new_unique();
        let d = descriptor(input, output, PoolVersion::AmmV4, true);
        let catalog = PoolCatalog { pools: vec![d.clone()], clmm_pools: vec![] };

        let mut states = PoolStateMap::new();
        // Ouvre à t=2000s, l'horloge est à 1000s.
        states.insert(d.id, state_for(&d, 1_000_000, 1_000_000, 2_000));

        let eng = engine();
        let graph = eng.enumerate_routes(&catalog, &input, &output);
        let params = ComputeParams { amount_in: 10_000, slippage_bps: 0, chain_time_ms: 1_000_000 };
        let routes = eng
            .compute_routes(&params, &graph, &states, &ClmmTickCache::default(), &catalog)
            .unwrap();
        assert_eq!(routes.len(), 1);
        assert!(!routes[0].pool_ready);
    }
}
