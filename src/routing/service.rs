// src/routing/service.rs
//
// La façade du service de cotation. Toutes les dépendances sont
// construites explicitement et injectées : pas d'état global, chaque
// instance a ses caches et sa propre durée de vie.

use solana_sdk::pubkey::Pubkey;
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, warn};

use crate::api::http_cache::{CachedHttpClient, ReqwestTransport};
use crate::api::raydium::ApiCache;
use crate::api::{PoolCatalog, PoolDescriptor};
use crate::config::Config;
use crate::events::{EventBus, RefreshEvent};
use crate::routing::cache::{RouteCache, RouteCacheEntry};
use crate::routing::engine::{ComputeParams, OnchainRouteEngine, RouteEngine};
use crate::routing::pair::{self, PairPools};
use crate::routing::selector;
use crate::routing::{ClmmTickCache, PairKey, PoolStateMap, SwapRouteInfos};
use crate::rpc::ResilientRpcClient;
use crate::state::ChainClock;

pub struct QuoterService {
    config: Config,
    http: Arc<CachedHttpClient>,
    engine: Arc<dyn RouteEngine>,
    chain_clock: ChainClock,
    api_cache: ApiCache,
    route_cache: RouteCache,
}

impl QuoterService {
    /// Assemblage à la carte : l'appelant fournit le client HTTP, le moteur
    /// et l'horloge (les tests y injectent leurs doublures).
    pub fn new(
        config: Config,
        http: Arc<CachedHttpClient>,
        engine: Arc<dyn RouteEngine>,
        chain_clock: ChainClock,
    ) -> Self {
        let route_cache = RouteCache::new(
            config.route_cache_max_entries,
            Duration::from_secs(config.route_cache_ttl_secs),
        );
        Self {
            config,
            http,
            engine,
            chain_clock,
            api_cache: ApiCache::new(),
            route_cache,
        }
    }

    /// Le câblage de production : reqwest, RPC résilient, moteur on-chain.
    pub fn from_config(config: Config) -> Self {
        let rpc = Arc::new(ResilientRpcClient::new(config.solana_rpc_url.clone(), 3, 500));
        let http = Arc::new(CachedHttpClient::new(
            Arc::new(ReqwestTransport::new()),
            "api.raydium.io",
        ));
        let engine = Arc::new(OnchainRouteEngine::new(Arc::clone(&rpc)));
        let chain_clock = ChainClock::new(rpc, Duration::from_secs(config.chain_clock_ttl_secs));
        Self::new(config, http, engine, chain_clock)
    }

    /// Injecte un catalogue sans passer par l'API. Pour les tests et les
    /// hôtes qui gèrent leur propre source de pools.
    pub fn install_catalog(&self, catalog: PoolCatalog) {
        self.api_cache.install(catalog);
    }

    async fn catalog(&self) -> Option<Arc<PoolCatalog>> {
        self.api_cache
            .get_or_fetch(&self.http, &self.config.api_base_url)
            .await
    }

    async fn route_entry(&self, key: PairKey, catalog: &PoolCatalog) -> Arc<RouteCacheEntry> {
        let engine = Arc::clone(&self.engine);
        self.route_cache
            .get_or_build(key, || engine.enumerate_routes(catalog, &key.input, &key.output))
            .await
    }

    async fn sim_states(
        &self,
        key: PairKey,
        entry: &Arc<RouteCacheEntry>,
        catalog: &Arc<PoolCatalog>,
    ) -> Option<Arc<PoolStateMap>> {
        let engine = Arc::clone(&self.engine);
        let graph = entry.graph.clone();
        let catalog = Arc::clone(catalog);
        self.route_cache
            .sim_cache(key, entry, move || async move {
                engine.fetch_pool_states(&graph, &catalog).await
            })
            .await
    }

    async fn tick_states(
        &self,
        key: PairKey,
        entry: &Arc<RouteCacheEntry>,
        catalog: &Arc<PoolCatalog>,
    ) -> Option<Arc<ClmmTickCache>> {
        let engine = Arc::clone(&self.engine);
        let graph = entry.graph.clone();
        let catalog = Arc::clone(catalog);
        self.route_cache
            .tick_cache(key, entry, move || async move {
                engine.fetch_tick_arrays(&graph, &catalog).await
            })
            .await
    }

    /// Le pool par défaut à proposer pour "ajouter de la liquidité" sur la
    /// paire. `None` tant que les données nécessaires ne sont pas là.
    pub async fn get_add_liquidity_default_pool(
        &self,
        mint1: &Pubkey,
        mint2: &Pubkey,
    ) -> Option<PoolDescriptor> {
        let catalog = self.catalog().await?;
        let key = PairKey::new(*mint1, *mint2);
        let entry = self.route_entry(key, &catalog).await;
        let states = self.sim_states(key, &entry, &catalog).await?;
        self.engine.default_add_liquidity_pool(&entry.graph, &states, &catalog)
    }

    /// Toutes les routes échangeables pour la paire, cotées et départagées.
    /// `None` si l'un des caches dépendants a échoué (l'entrée est alors
    /// retirée, un nouvel appel repart de zéro).
    pub async fn get_all_swapable_route_infos(
        &self,
        input: &Pubkey,
        output: &Pubkey,
        amount_in: u64,
        slippage_bps: u16,
    ) -> Option<SwapRouteInfos> {
        let catalog = self.catalog().await?;
        let key = PairKey::new(*input, *output);
        let entry = self.route_entry(key, &catalog).await;

        let states = self.sim_states(key, &entry, &catalog).await?;
        let ticks = self.tick_states(key, &entry, &catalog).await?;
        let chain_time_ms = self.chain_clock.chain_time_ms().await;

        let params = ComputeParams { amount_in, slippage_bps, chain_time_ms };
        let routes = match self.engine.compute_routes(&params, &entry.graph, &states, &ticks, &catalog) {
            Ok(routes) => routes,
            Err(e) => {
                warn!(error = %e, "Cotation des routes impossible");
                return None;
            }
        };

        let selection = selector::best_calc_result(&routes, Some(&states), chain_time_ms);
        Some(SwapRouteInfos { routes, selection, chain_time_ms })
    }

    /// Scan d'une paire pour l'UI : pools disponibles, pool par défaut,
    /// pools de relais. Les entrées invalides donnent un résultat vide,
    /// jamais une erreur.
    pub async fn find_pool_by_mint_pair(&self, mint1: Option<&str>, mint2: Option<&str>) -> PairPools {
        let (Some(m1), Some(m2)) = (pair::normalize_mint(mint1), pair::normalize_mint(mint2)) else {
            return PairPools::default();
        };
        let Some(catalog) = self.catalog().await else {
            return PairPools::default();
        };

        let (availables, route_related) = pair::scan_pair(&catalog, &m1, &m2);

        let best = if availables.len() <= 1 {
            availables.first().cloned()
        } else {
            // Plusieurs candidats : il faut leur état on-chain pour
            // départager par supply LP.
            let states = match self.engine.fetch_pool_states_for(&availables).await {
                Ok(states) => states,
                Err(e) => {
                    warn!(error = %e, "États de pools illisibles, départage sans supply");
                    PoolStateMap::new()
                }
            };
            pair::pick_best(&availables, &states)
        };

        PairPools { availables, best, route_related }
    }

    /// Vide le cache de routes. Les listes de pools restent.
    pub async fn clear_sdk_cache(&self) {
        self.route_cache.clear().await;
    }

    /// Réaction aux évènements du bus.
    pub async fn handle_event(&self, event: RefreshEvent) {
        match event {
            RefreshEvent::WalletRefresh
            | RefreshEvent::LiquidityRefresh
            | RefreshEvent::SwapRefresh => {
                self.route_cache.clear().await;
            }
            RefreshEvent::ApiEndpointChange => {
                self.route_cache.clear().await;
                self.api_cache.clear();
            }
            RefreshEvent::PairSelected { input, output } => {
                self.warm_pair(&input, &output).await;
            }
        }
    }

    /// Préchauffe l'entrée d'une paire : graphe énuméré, fetchs lancés.
    /// Les résultats sont ignorés, ils seront dans le cache au prochain
    /// appel utile.
    async fn warm_pair(&self, input: &Pubkey, output: &Pubkey) {
        let Some(catalog) = self.catalog().await else { return };
        let key = PairKey::new(*input, *output);
        let entry = self.route_entry(key, &catalog).await;
        let _ = self.sim_states(key, &entry, &catalog).await;
        let _ = self.tick_states(key, &entry, &catalog).await;
        debug!(input = %input, output = %output, "Paire préchauffée");
    }

    /// Branche le service sur un bus d'évènements. La tâche vit tant que
    /// le bus a un émetteur.
    pub fn spawn_event_listener(self: &Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => service.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Évènements manqués, on continue");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PoolVersion;
    use crate::routing::engine::ComputeParams;
    use crate::routing::{ComputedRoute, ParsedPoolState, PoolKey, RouteGraph};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    // --- DOUBLURES ---

    struct NullTransport;

    #[async_trait]
    impl crate::api::http_cache::HttpTransport for NullTransport {
        async fn get_text(
            &self,
            _url: &str,
            _body: Option<&str>,
            _headers: &[(&'static str, String)],
        ) -> Result<String> {
            Err(anyhow!("pas de réseau dans les tests"))
        }
    }

    /// Un moteur compté : chaque fetch incrémente son compteur, et peut
    /// être mis en panne.
    struct CountingEngine {
        sim_calls: AtomicUsize,
        tick_calls: AtomicUsize,
        fail_sim: AtomicBool,
    }

    impl CountingEngine {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sim_calls: AtomicUsize::new(0),
                tick_calls: AtomicUsize::new(0),
                fail_sim: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl RouteEngine for CountingEngine {
        fn enumerate_routes(&self, catalog: &PoolCatalog, input: &Pubkey, output: &Pubkey) -> RouteGraph {
            let direct = catalog
                .pools_for_pair(input, output)
                .into_iter()
                .map(|p| PoolKey { id: p.id, version: p.version })
                .collect();
            RouteGraph { input: *input, output: *output, direct, one_hop: vec![] }
        }

        async fn fetch_pool_states(&self, graph: &RouteGraph, catalog: &PoolCatalog) -> Result<PoolStateMap> {
            self.sim_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail_sim.load(Ordering::SeqCst) {
                return Err(anyhow!("panne simulée"));
            }
            let mut states = PoolStateMap::new();
            for key in &graph.direct {
                if let Some(d) = catalog.pools.iter().find(|p| p.id == key.id) {
                    states.insert(
                        key.id,
                        ParsedPoolState {
                            id: key.id,
                            base_mint: d.base_mint,
                            quote_mint: d.quote_mint,
                            base_reserve: 1_000_000,
                            quote_reserve: 1_000_000,
                            lp_supply: 1_000_000,
                            lp_decimals: 9,
                            open_time_secs: 0,
                            trade_fee_numerator: 25,
                            trade_fee_denominator: 10_000,
                        },
                    );
                }
            }
            Ok(states)
        }

        async fn fetch_pool_states_for(&self, pools: &[PoolDescriptor]) -> Result<PoolStateMap> {
            self.sim_calls.fetch_add(1, Ordering::SeqCst);
            let mut states = PoolStateMap::new();
            for (i, d) in pools.iter().enumerate() {
                states.insert(
                    d.id,
                    ParsedPoolState {
                        id: d.id,
                        base_mint: d.base_mint,
                        quote_mint: d.quote_mint,
                        base_reserve: 1,
                        quote_reserve: 1,
                        lp_supply: 1_000 * (i as u64 + 1),
                        lp_decimals: 9,
                        open_time_secs: 0,
                        trade_fee_numerator: 25,
                        trade_fee_denominator: 10_000,
                    },
                );
            }
            Ok(states)
        }

        async fn fetch_tick_arrays(&self, _graph: &RouteGraph, _catalog: &PoolCatalog) -> Result<ClmmTickCache> {
            self.tick_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ClmmTickCache::default())
        }

        fn compute_routes(
            &self,
            params: &ComputeParams,
            graph: &RouteGraph,
            _states: &PoolStateMap,
            _ticks: &ClmmTickCache,
            _catalog: &PoolCatalog,
        ) -> Result<Vec<ComputedRoute>> {
            Ok(graph
                .direct
                .iter()
                .map(|k| ComputedRoute {
                    pool_keys: vec![*k],
                    middle_mint: None,
                    amount_in: params.amount_in,
                    amount_out: params.amount_in.saturating_sub(1),
                    min_amount_out: params.amount_in.saturating_sub(2),
                    price: None,
                    pool_ready: true,
                })
                .collect())
        }

        fn default_add_liquidity_pool(
            &self,
            graph: &RouteGraph,
            _states: &PoolStateMap,
            catalog: &PoolCatalog,
        ) -> Option<PoolDescriptor> {
            let key = graph.direct.first()?;
            catalog.pools.iter().find(|p| p.id == key.id).cloned()
        }
    }

    fn config() -> Config {
        Config {
            solana_rpc_url: "http://localhost:8899".to_string(),
            api_base_url: "https://api.raydium.io".to_string(),
            route_cache_max_entries: 16,
            route_cache_ttl_secs: 600,
            chain_clock_ttl_secs: 60,
        }
    }

    fn descriptor(base: Pubkey, quote: Pubkey) -> PoolDescriptor {
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
            version: PoolVersion::AmmV4,
            official: true,
        }
    }

    fn service_with(engine: Arc<CountingEngine>, catalog: PoolCatalog) -> Arc<QuoterService> {
        let http = Arc::new(CachedHttpClient::new(Arc::new(NullTransport), "api.raydium.io"));
        let service = Arc::new(QuoterService::new(
            config(),
            http,
            engine,
            ChainClock::local_only(),
        ));
        service.install_catalog(catalog);
        service
    }

    #[tokio::test]
    async fn concurrent_requests_for_a_pair_share_one_state_fetch() {
        let m1 = Pubkey::new_unique();
        let m2 = Pubkey::new_unique();
        let catalog = PoolCatalog { pools: vec![descriptor(m1, m2)], clmm_pools: vec![] };
        let engine = CountingEngine::new();
        let service = service_with(Arc::clone(&engine), catalog);

        let (a, b) = tokio::join!(
            service.get_add_liquidity_default_pool(&m1, &m2),
            service.get_add_liquidity_default_pool(&m1, &m2),
        );
        assert!(a.is_some());
        assert!(b.is_some());
        assert_eq!(engine.sim_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_then_repeat_triggers_a_fresh_fetch() {
        let m1 = Pubkey::new_unique();
        let m2 = Pubkey::new_unique();
        let catalog = PoolCatalog { pools: vec![descriptor(m1, m2)], clmm_pools: vec![] };
        let engine = CountingEngine::new();
        let service = service_with(Arc::clone(&engine), catalog);

        service.get_add_liquidity_default_pool(&m1, &m2).await;
        service.clear_sdk_cache().await;
        service.get_add_liquidity_default_pool(&m1, &m2).await;
        assert_eq!(engine.sim_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_state_fetch_propagates_as_none_then_recovers() {
        let m1 = Pubkey::new_unique();
        let m2 = Pubkey::new_unique();
        let catalog = PoolCatalog { pools: vec![descriptor(m1, m2)], clmm_pools: vec![] };
        let engine = CountingEngine::new();
        let service = service_with(Arc::clone(&engine), catalog);

        engine.fail_sim.store(true, Ordering::SeqCst);
        let out = service.get_all_swapable_route_infos(&m1, &m2, 1_000, 50).await;
        assert!(out.is_none());

        // L'entrée a été retirée : le prochain appel refait tout et réussit.
        engine.fail_sim.store(false, Ordering::SeqCst);
        let out = service.get_all_swapable_route_infos(&m1, &m2, 1_000, 50).await;
        assert!(out.is_some());
        let infos = out.unwrap();
        assert_eq!(infos.routes.len(), 1);
        assert!(infos.selection.is_some());
    }

    #[tokio::test]
    async fn missing_mint_yields_empty_pair_result() {
        let engine = CountingEngine::new();
        let service = service_with(engine, PoolCatalog::default());

        let out = service.find_pool_by_mint_pair(None, Some("So11111111111111111111111111111111111111112")).await;
        assert!(out.availables.is_empty());
        assert!(out.best.is_none());
        assert!(out.route_related.is_empty());
    }

    #[tokio::test]
    async fn api_endpoint_change_clears_the_catalog() {
        let m1 = Pubkey::new_unique();
        let m2 = Pubkey::new_unique();
        let catalog = PoolCatalog { pools: vec![descriptor(m1, m2)], clmm_pools: vec![] };
        let engine = CountingEngine::new();
        let service = service_with(Arc::clone(&engine), catalog);

        assert!(service.get_add_liquidity_default_pool(&m1, &m2).await.is_some());
        service.handle_event(RefreshEvent::ApiEndpointChange).await;
        // Catalogue perdu et transport en panne : plus de données.
        assert!(service.get_add_liquidity_default_pool(&m1, &m2).await.is_none());
    }

    #[tokio::test]
    async fn pair_selected_event_warms_the_caches() {
        let m1 = Pubkey::new_unique();
        let m2 = Pubkey::new_unique();
        let catalog = PoolCatalog { pools: vec![descriptor(m1, m2)], clmm_pools: vec![] };
        let engine = CountingEngine::new();
        let service = service_with(Arc::clone(&engine), catalog);

        service
            .handle_event(RefreshEvent::PairSelected { input: m1, output: m2 })
            .await;
        assert_eq!(engine.sim_calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.tick_calls.load(Ordering::SeqCst), 1);

        // La demande utile qui suit ne refait aucun fetch.
        service.get_add_liquidity_default_pool(&m1, &m2).await;
        assert_eq!(engine.sim_calls.load(Ordering::SeqCst), 1);
    }
}
