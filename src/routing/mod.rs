// src/routing/mod.rs

// Le cœur du service : énumération des routes entre deux mints, caches
// mémoïsés par paire, et les règles de choix du "meilleur" pool.
pub mod cache;
pub mod engine;
pub mod pair;
pub mod selector;
pub mod service;
pub mod single_flight;

use fixed::types::U64F64;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

use crate::api::PoolVersion;

/// La clé du cache de routes : la paire ORDONNÉE (input, output).
/// Le sens compte pour le prix, donc (A,B) et (B,A) sont deux entrées.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub input: Pubkey,
    pub output: Pubkey,
}

impl PairKey {
    pub fn new(input: Pubkey, output: Pubkey) -> Self {
        Self { input, output }
    }
}

/// Référence légère vers un pool dans un graphe de routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolKey {
    pub id: Pubkey,
    pub version: PoolVersion,
}

/// Une route indirecte : deux pools reliés par un mint pivot.
#[derive(Debug, Clone)]
pub struct OneHopRoute {
    pub first: PoolKey,
    pub second: PoolKey,
    pub middle: Pubkey,
}

/// Le graphe des routes candidates pour une paire, énuméré une fois par
/// entrée de cache.
#[derive(Debug, Clone, Default)]
pub struct RouteGraph {
    pub input: Pubkey,
    pub output: Pubkey,
    pub direct: Vec<PoolKey>,
    pub one_hop: Vec<OneHopRoute>,
}

impl RouteGraph {
    fn all_keys(&self) -> impl Iterator<Item = &PoolKey> {
        self.direct
            .iter()
            .chain(self.one_hop.iter().flat_map(|r| [&r.first, &r.second]))
    }

    /// Les pools standard/stable du graphe, sans doublon.
    pub fn amm_pool_ids(&self) -> Vec<Pubkey> {
        let mut ids: Vec<Pubkey> = Vec::new();
        for key in self.all_keys() {
            if !key.version.is_clmm() && !ids.contains(&key.id) {
                ids.push(key.id);
            }
        }
        ids
    }

    /// Les pools concentrés du graphe, sans doublon.
    pub fn clmm_pool_ids(&self) -> Vec<Pubkey> {
        let mut ids: Vec<Pubkey> = Vec::new();
        for key in self.all_keys() {
            if key.version.is_clmm() && !ids.contains(&key.id) {
                ids.push(key.id);
            }
        }
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.one_hop.is_empty()
    }
}

/// L'état on-chain décodé d'un pool standard/stable, tel que mémorisé.
#[derive(Debug, Clone)]
pub struct ParsedPoolState {
    pub id: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_reserve: u64,
    pub quote_reserve: u64,
    pub lp_supply: u64,
    pub lp_decimals: u8,
    /// Heure d'ouverture on-chain, en secondes Unix. 0 = ouvert.
    pub open_time_secs: u64,
    pub trade_fee_numerator: u64,
    pub trade_fee_denominator: u64,
}

pub type PoolStateMap = HashMap<Pubkey, ParsedPoolState>;

/// Le résultat du fetch "tick arrays" : l'état des pools concentrés du
/// graphe et les arrays autour de leur tick courant.
#[derive(Debug, Clone, Default)]
pub struct ClmmTickCache {
    pub pools: HashMap<Pubkey, crate::decoders::clmm_pool::DecodedClmmPool>,
    pub arrays: HashMap<Pubkey, Vec<crate::decoders::tick_array::TickArraySnapshot>>,
}

/// Une route cotée, prête à être départagée par le sélecteur.
#[derive(Debug, Clone)]
pub struct ComputedRoute {
    pub pool_keys: Vec<PoolKey>,
    pub middle_mint: Option<Pubkey>,
    pub amount_in: u64,
    pub amount_out: u64,
    pub min_amount_out: u64,
    pub price: Option<U64F64>,
    /// Le pool (ou les deux pools) de la route est échangeable maintenant.
    pub pool_ready: bool,
}

/// Un pool de la route choisie dont l'ouverture est encore dans le futur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStartTime {
    pub pool_id: Pubkey,
    /// Heure d'ouverture convertie en millisecondes Unix.
    pub open_time_ms: i64,
}

/// La sortie du sélecteur : la route retenue et, si elle n'est pas encore
/// échangeable, les heures d'ouverture à afficher.
#[derive(Debug, Clone)]
pub struct BestRouteSelection {
    pub best: ComputedRoute,
    pub start_times: Vec<PoolStartTime>,
}

/// Le résultat complet d'une demande de cotation.
#[derive(Debug, Clone)]
pub struct SwapRouteInfos {
    pub routes: Vec<ComputedRoute>,
    pub selection: Option<BestRouteSelection>,
    pub chain_time_ms: i64,
}
