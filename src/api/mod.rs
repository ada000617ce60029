// DANS : src/api/mod.rs

use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey, pubkey::Pubkey};

pub mod http_cache;
pub mod raydium;

/// Les tokens "pivots" autorisés au milieu d'une route indirecte.
/// Une route A -> B passe au plus par un de ces mints.
pub const ROUTE_MIDDLE_MINTS: [Pubkey; 7] = [
    pubkey!("So11111111111111111111111111111111111111112"),  // WSOL
    pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"), // USDC
    pubkey!("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"), // USDT
    pubkey!("4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R"), // RAY
    pubkey!("mSoLzYCxHdYgdzU16g5QSh3i5K3z3KZK7ytfqcJm7So"),  // mSOL
    pubkey!("7dHbWXmci3dT8UFYWYZweBLXgycu7Y3iL6trKn1Y7ARj"), // stSOL
    pubkey!("USDH1SM1ojwWUga67PGrgFWUHibbjqMvuMaDkRJTgkX"),  // USDH
];

pub fn is_middle_mint(mint: &Pubkey) -> bool {
    ROUTE_MIDDLE_MINTS.contains(mint)
}

/// Le tag de version d'un pool, tel que l'API le publie.
/// 4 = AMM à produit constant, 5 = stable-swap, 6 = liquidité concentrée.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolVersion {
    AmmV4,
    Stable,
    Clmm,
}

impl PoolVersion {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            4 => Some(Self::AmmV4),
            5 => Some(Self::Stable),
            6 => Some(Self::Clmm),
            _ => None,
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, Self::Stable)
    }

    pub fn is_clmm(&self) -> bool {
        matches!(self, Self::Clmm)
    }
}

/// Description statique d'un pool standard ou stable, telle que publiée par
/// l'API. Immuable : le catalogue entier est remplacé à chaque refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolDescriptor {
    pub id: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub market_id: Pubkey,
    pub program_id: Pubkey,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub lp_decimals: u8,
    pub version: PoolVersion,
    /// Le pool figure dans la liste "official" de l'API.
    pub official: bool,
}

impl PoolDescriptor {
    /// Teste l'appartenance à une paire, sans tenir compte de l'ordre.
    pub fn matches_pair(&self, mint_a: &Pubkey, mint_b: &Pubkey) -> bool {
        (self.base_mint == *mint_a && self.quote_mint == *mint_b)
            || (self.base_mint == *mint_b && self.quote_mint == *mint_a)
    }

    /// Le mint d'en face, si `mint` est un des deux côtés du pool.
    pub fn other_mint(&self, mint: &Pubkey) -> Option<Pubkey> {
        if self.base_mint == *mint {
            Some(self.quote_mint)
        } else if self.quote_mint == *mint {
            Some(self.base_mint)
        } else {
            None
        }
    }
}

/// Description statique d'un pool concentré (CLMM).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClmmPoolDescriptor {
    pub id: Pubkey,
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub program_id: Pubkey,
    pub mint_decimals_a: u8,
    pub mint_decimals_b: u8,
    pub tick_spacing: u16,
    pub trade_fee_rate: u32,
}

impl ClmmPoolDescriptor {
    pub fn matches_pair(&self, mint_a: &Pubkey, mint_b: &Pubkey) -> bool {
        (self.mint_a == *mint_a && self.mint_b == *mint_b)
            || (self.mint_a == *mint_b && self.mint_b == *mint_a)
    }
}

/// Le snapshot en mémoire des listes de pools de l'API.
#[derive(Debug, Clone, Default)]
pub struct PoolCatalog {
    pub pools: Vec<PoolDescriptor>,
    pub clmm_pools: Vec<ClmmPoolDescriptor>,
}

impl PoolCatalog {
    /// Tous les pools standard/stable dont la paire (non ordonnée) correspond.
    pub fn pools_for_pair(&self, mint_a: &Pubkey, mint_b: &Pubkey) -> Vec<&PoolDescriptor> {
        self.pools.iter().filter(|p| p.matches_pair(mint_a, mint_b)).collect()
    }

    /// Tous les pools CLMM de la paire.
    pub fn clmm_for_pair(&self, mint_a: &Pubkey, mint_b: &Pubkey) -> Vec<&ClmmPoolDescriptor> {
        self.clmm_pools.iter().filter(|p| p.matches_pair(mint_a, mint_b)).collect()
    }

    pub fn len(&self) -> usize {
        self.pools.len() + self.clmm_pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty() && self.clmm_pools.is_empty()
    }
}
